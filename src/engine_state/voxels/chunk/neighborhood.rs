use std::sync::Arc;

use super::{
    ChunkCoord, ChunkVoxels, Subchunk, SUBCHUNK_SIZE_X, SUBCHUNK_SIZE_Y, SUBCHUNK_SIZE_Z,
};
use crate::engine_state::voxels::block::Block;

/// Read access to a column and its four horizontal neighbours, bundled into one mesh task.
///
/// Holding the `Arc`s keeps all five voxel arrays alive even if the chunks are evicted
/// while the task runs.
#[derive(Clone)]
pub struct ChunkMeshInput {
    /// Column being meshed
    pub main: Arc<ChunkVoxels>,
    /// Neighbour at -Z
    pub north: Arc<ChunkVoxels>,
    /// Neighbour at +Z
    pub south: Arc<ChunkVoxels>,
    /// Neighbour at +X
    pub east: Arc<ChunkVoxels>,
    /// Neighbour at -X
    pub west: Arc<ChunkVoxels>,
}

impl ChunkMeshInput {
    /// Coordinate of the column being meshed.
    pub fn coord(&self) -> ChunkCoord {
        self.main.coord()
    }

    /// Views needed to mesh subchunk slot `index` of the main column.
    pub fn subchunk_neighborhood(&self, index: usize) -> SubchunkNeighborhood<'_> {
        let slot = index as isize;
        SubchunkNeighborhood {
            main: self.main.subchunk(index),
            top: self.main.subchunk_or_empty(slot + 1),
            bottom: self.main.subchunk_or_empty(slot - 1),
            north: self.north.subchunk(index),
            south: self.south.subchunk(index),
            east: self.east.subchunk(index),
            west: self.west.subchunk(index),
        }
    }
}

/// A subchunk together with the six subchunks touching its faces.
#[derive(Copy, Clone)]
pub struct SubchunkNeighborhood<'a> {
    /// Subchunk being meshed
    pub main: Subchunk<'a>,
    /// Subchunk above (+Y), empty above the column
    pub top: Subchunk<'a>,
    /// Subchunk below (-Y), empty below the column
    pub bottom: Subchunk<'a>,
    /// Same slot in the -Z column
    pub north: Subchunk<'a>,
    /// Same slot in the +Z column
    pub south: Subchunk<'a>,
    /// Same slot in the +X column
    pub east: Subchunk<'a>,
    /// Same slot in the -X column
    pub west: Subchunk<'a>,
}

impl SubchunkNeighborhood<'_> {
    /// Block at coordinates relative to the main subchunk, reaching at most one block past
    /// any face.
    pub fn get(&self, x: i32, y: i32, z: i32) -> Block {
        const SX: i32 = SUBCHUNK_SIZE_X as i32;
        const SY: i32 = SUBCHUNK_SIZE_Y as i32;
        const SZ: i32 = SUBCHUNK_SIZE_Z as i32;

        let (view, x, y, z) = if y >= SY {
            (&self.top, x, y - SY, z)
        } else if y < 0 {
            (&self.bottom, x, y + SY, z)
        } else if x >= SX {
            (&self.east, x - SX, y, z)
        } else if x < 0 {
            (&self.west, x + SX, y, z)
        } else if z >= SZ {
            (&self.south, x, y, z - SZ)
        } else if z < 0 {
            (&self.north, x, y, z + SZ)
        } else {
            (&self.main, x, y, z)
        };

        view.get(x as usize, y as usize, z as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::block_type::BlockType;

    fn column(coord: ChunkCoord, block_type: BlockType) -> Arc<ChunkVoxels> {
        let mut voxels = ChunkVoxels::new(coord);
        voxels.set(0, 0, 0, Block::new(block_type));
        voxels.set(15, 0, 15, Block::new(block_type));
        Arc::new(voxels)
    }

    #[test]
    fn test_lookups_cross_into_neighbors() {
        let input = ChunkMeshInput {
            main: column(ChunkCoord::new(0, 0), BlockType::STONE),
            north: column(ChunkCoord::new(0, -1), BlockType::DIRT),
            south: column(ChunkCoord::new(0, 1), BlockType::GRASS),
            east: column(ChunkCoord::new(1, 0), BlockType::WATER),
            west: column(ChunkCoord::new(-1, 0), BlockType::BEDROCK),
        };
        let hood = input.subchunk_neighborhood(0);

        assert_eq!(hood.get(0, 0, 0), Block::new(BlockType::STONE));
        assert_eq!(hood.get(16, 0, 0), Block::new(BlockType::WATER));
        assert_eq!(hood.get(-1, 0, 15), Block::new(BlockType::BEDROCK));
        assert_eq!(hood.get(15, 0, -1), Block::new(BlockType::DIRT));
        assert_eq!(hood.get(0, 0, 16), Block::new(BlockType::GRASS));
        assert_eq!(hood.get(0, -1, 0), Block::AIR);
        assert_eq!(hood.get(0, 16, 0), Block::AIR);
        assert_eq!(input.coord(), ChunkCoord::new(0, 0));
    }
}
