//! Face-culled meshing of a column and its four horizontal neighbours.
//!
//! Every block with a mesh emits one quad per face whose neighbouring block does not hide
//! it. Neighbour lookups cross into the adjacent subchunks and columns; above the top and
//! below the bottom of the column the neighbour is air. The output is a pure function of
//! the five voxel arrays and the block registry.

use log::debug;
use web_time::Instant;

use super::{
    face::{face_corners, CUBE_CORNERS, CUBE_FACE_CORNERS},
    mesh::{ChunkMeshes, PackedTerrainMesh, SubchunkMeshes},
};
use crate::engine_state::{
    rendering::vertex::TerrainVertex,
    voxels::{
        block::{block_side::BlockSide, Block, BlockRegistry},
        chunk::{ChunkMeshInput, SubchunkNeighborhood, SUBCHUNK_COUNT},
    },
};

/// Sub-block drop applied to the top corners of a water surface.
pub const WATER_SURFACE_OFFSET: u32 = 2;

/// Meshes every subchunk of `input.main`.
pub fn generate_chunk_meshes(input: &ChunkMeshInput, registry: &BlockRegistry) -> ChunkMeshes {
    let start = Instant::now();

    let subchunks = (0..SUBCHUNK_COUNT)
        .map(|index| generate_subchunk_meshes(&input.subchunk_neighborhood(index), registry))
        .collect();
    let meshes = ChunkMeshes { subchunks };

    debug!(
        "Meshed chunk {} ({} faces) in {:?}",
        input.coord(),
        meshes.face_count(),
        start.elapsed()
    );
    meshes
}

/// Meshes one subchunk into its solid and water passes.
pub fn generate_subchunk_meshes(
    neighborhood: &SubchunkNeighborhood<'_>,
    registry: &BlockRegistry,
) -> SubchunkMeshes {
    let mut meshes = SubchunkMeshes::default();
    if neighborhood.main.is_empty() {
        return meshes;
    }

    neighborhood.main.for_each_xyz(|x, y, z, block| {
        if !registry.has_mesh(block) {
            return;
        }

        let target = if registry.is_water(block) {
            &mut meshes.water
        } else {
            &mut meshes.solid
        };

        for side in BlockSide::all() {
            add_face_if_visible(
                [x as u32, y as u32, z as u32],
                block,
                side,
                target,
                neighborhood,
                registry,
            );
        }
    });

    meshes
}

/// Face visibility between a block and the block its face looks at.
pub fn should_draw_face(registry: &BlockRegistry, current: Block, neighbor: Block) -> bool {
    if !registry.has_mesh(neighbor) {
        return true;
    }
    if registry.is_solid(current) && registry.is_solid(neighbor) {
        return false;
    }
    if registry.is_water(current) && registry.is_water(neighbor) {
        return false;
    }
    true
}

fn add_face_if_visible(
    [x, y, z]: [u32; 3],
    block: Block,
    side: BlockSide,
    target: &mut PackedTerrainMesh,
    neighborhood: &SubchunkNeighborhood<'_>,
    registry: &BlockRegistry,
) {
    let offset = side.neighbor_offset();
    let neighbor = neighborhood.get(
        x as i32 + offset.x,
        y as i32 + offset.y,
        z as i32 + offset.z,
    );
    if !should_draw_face(registry, block, neighbor) {
        return;
    }

    let texture_id = registry.face_texture(block, side);
    let uv = registry.face_uv(block, side);

    // Only an exposed water surface is lowered.
    let surface_offset = if registry.is_water(block)
        && !registry.is_water(neighborhood.get(x as i32, y as i32 + 1, z as i32))
    {
        WATER_SURFACE_OFFSET
    } else {
        0
    };

    let corners = face_corners(x, y, z, side);
    let corner_ids = CUBE_FACE_CORNERS[side as usize];
    let vertices = std::array::from_fn(|i| {
        let position = corners[i];
        let y_offset = if CUBE_CORNERS[corner_ids[i]].y == 1 {
            surface_offset
        } else {
            0
        };
        TerrainVertex::new(
            position.x,
            position.y,
            position.z,
            y_offset,
            uv[i][0] as u32,
            uv[i][1] as u32,
            texture_id,
            side,
        )
    });

    target.add_face(vertices);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::{
        block::block_type::BlockType,
        chunk::{ChunkCoord, ChunkVoxels, CHUNK_SIZE_Y},
    };
    use std::sync::Arc;

    fn empty(x: i32, z: i32) -> ChunkVoxels {
        ChunkVoxels::new(ChunkCoord::new(x, z))
    }

    fn input_with(main: ChunkVoxels, east: ChunkVoxels) -> ChunkMeshInput {
        ChunkMeshInput {
            main: Arc::new(main),
            north: Arc::new(empty(0, -1)),
            south: Arc::new(empty(0, 1)),
            east: Arc::new(east),
            west: Arc::new(empty(-1, 0)),
        }
    }

    fn mesh_main(main: ChunkVoxels) -> ChunkMeshes {
        generate_chunk_meshes(&input_with(main, empty(1, 0)), &BlockRegistry::builtin())
    }

    fn stone() -> Block {
        Block::new(BlockType::STONE)
    }

    fn water() -> Block {
        Block::new(BlockType::WATER)
    }

    #[test]
    fn test_isolated_block_emits_six_faces() {
        let mut main = empty(0, 0);
        main.set(8, 8, 8, stone());
        let meshes = mesh_main(main);

        let solid = &meshes.subchunks[0].solid;
        assert_eq!(solid.face_count(), 6);
        assert_eq!(solid.vertices.len(), 24);
        assert_eq!(solid.indices.len(), 36);
        assert!(meshes.subchunks[0].water.is_empty());
        assert_eq!(meshes.face_count(), 6);
    }

    #[test]
    fn test_adjacent_solids_hide_shared_face() {
        let mut main = empty(0, 0);
        main.set(4, 4, 4, stone());
        main.set(5, 4, 4, Block::new(BlockType::DIRT));
        let meshes = mesh_main(main);

        let solid = &meshes.subchunks[0].solid;
        assert_eq!(solid.face_count(), 10);
        let east_faces_at_shared_plane = solid
            .vertices
            .chunks(4)
            .filter(|quad| quad[0].normal_id() == BlockSide::EAST as u32 && quad[0].x() == 5)
            .count();
        assert_eq!(east_faces_at_shared_plane, 0);
    }

    #[test]
    fn test_adjacent_water_hides_shared_face() {
        let mut main = empty(0, 0);
        main.set(4, 4, 4, water());
        main.set(4, 4, 5, water());
        let meshes = mesh_main(main);

        assert!(meshes.subchunks[0].solid.is_empty());
        assert_eq!(meshes.subchunks[0].water.face_count(), 10);
    }

    #[test]
    fn test_solid_and_water_both_draw_shared_face() {
        let mut main = empty(0, 0);
        main.set(4, 4, 4, stone());
        main.set(4, 5, 4, water());
        let meshes = mesh_main(main);

        assert_eq!(meshes.subchunks[0].solid.face_count(), 6);
        assert_eq!(meshes.subchunks[0].water.face_count(), 6);
    }

    #[test]
    fn test_culling_crosses_chunk_boundary() {
        let mut main = empty(0, 0);
        main.set(15, 20, 3, stone());
        let mut east = empty(1, 0);
        east.set(0, 20, 3, stone());

        let meshes = generate_chunk_meshes(&input_with(main, east), &BlockRegistry::builtin());
        let solid = &meshes.subchunks[1].solid;
        assert_eq!(solid.face_count(), 5);
        assert!(solid
            .vertices
            .chunks(4)
            .all(|quad| quad[0].normal_id() != BlockSide::EAST as u32));
    }

    #[test]
    fn test_culling_crosses_subchunk_boundary() {
        let mut main = empty(0, 0);
        main.set(2, 15, 2, stone());
        main.set(2, 16, 2, stone());
        let meshes = mesh_main(main);

        assert_eq!(meshes.subchunks[0].solid.face_count(), 5);
        assert_eq!(meshes.subchunks[1].solid.face_count(), 5);
    }

    #[test]
    fn test_column_top_and_bottom_face_empty_space() {
        let mut main = empty(0, 0);
        main.set(0, CHUNK_SIZE_Y - 1, 0, stone());
        main.set(0, 0, 0, stone());
        let meshes = mesh_main(main);

        assert_eq!(meshes.subchunks[SUBCHUNK_COUNT - 1].solid.face_count(), 6);
        assert_eq!(meshes.subchunks[0].solid.face_count(), 6);
    }

    #[test]
    fn test_water_surface_is_lowered() {
        let mut main = empty(0, 0);
        main.set(1, 1, 1, water());
        main.set(1, 2, 1, water());
        let meshes = mesh_main(main);

        let water = &meshes.subchunks[0].water;
        let top = water
            .vertices
            .chunks(4)
            .find(|quad| quad[0].normal_id() == BlockSide::TOP as u32)
            .unwrap();
        assert!(top.iter().all(|v| v.y() == 3 && v.y_offset() == WATER_SURFACE_OFFSET));
        assert!(water.vertices.iter().all(|v| v.y() != 2 || v.y_offset() == 0));
    }

    #[test]
    fn test_meshing_is_deterministic() {
        let registry = BlockRegistry::builtin();
        let mut main = empty(0, 0);
        for i in 0..16 {
            main.set(i, i * 3, 15 - i, stone());
            main.set(15 - i, i + 1, i, water());
        }
        let input = input_with(main, empty(1, 0));

        let first = generate_chunk_meshes(&input, &registry);
        let second = generate_chunk_meshes(&input, &registry);
        assert_eq!(first, second);
        for (a, b) in first.subchunks.iter().zip(&second.subchunks) {
            assert_eq!(a.solid.vertex_bytes(), b.solid.vertex_bytes());
            assert_eq!(a.water.index_bytes(), b.water.index_bytes());
        }
    }
}
