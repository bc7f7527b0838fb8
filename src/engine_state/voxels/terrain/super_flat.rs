use super::TerrainGenerator;
use crate::engine_state::voxels::{
    block::{block_type::BlockType, Block, BlockRegistry},
    chunk::{ChunkVoxels, CHUNK_SIZE_X, CHUNK_SIZE_Z},
};

/// Layers from the bottom of the column up; everything above is air.
const LAYERS: [BlockType; 5] = [
    BlockType::BEDROCK,
    BlockType::DIRT,
    BlockType::DIRT,
    BlockType::DIRT,
    BlockType::GRASS,
];

/// Bedrock at y = 0, dirt at y = 1..=3, grass at y = 4.
pub struct SuperFlatTerrainGenerator;

impl TerrainGenerator for SuperFlatTerrainGenerator {
    fn name(&self) -> &'static str {
        "super_flat"
    }

    fn generate_for(&self, voxels: &mut ChunkVoxels, _registry: &BlockRegistry) {
        for x in 0..CHUNK_SIZE_X {
            for z in 0..CHUNK_SIZE_Z {
                for (y, layer) in LAYERS.iter().enumerate() {
                    voxels.set(x, y, z, Block::new(*layer));
                }
            }
        }
    }
}
