use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use super::TerrainGenerator;
use crate::engine_state::voxels::{
    block::{block_type::BlockType, Block, BlockRegistry},
    chunk::{ChunkVoxels, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z},
};

/// Lowest surface height.
pub const BASE_HEIGHT: f64 = 64.0;
/// Surface heights span `BASE_HEIGHT..=BASE_HEIGHT + HEIGHT_RANGE`.
pub const HEIGHT_RANGE: f64 = 150.0;
/// Air at or below this height is filled with water.
pub const SEA_LEVEL: usize = 72;

const NOISE_OCTAVES: usize = 6;
const NOISE_FREQUENCY: f64 = 0.002;

/// Heightmap terrain: stone, a few blocks of dirt, grass on top, water up to sea level.
pub struct SimpleTerrainGenerator {
    seed: u32,
    heightmap: Fbm<Perlin>,
}

impl SimpleTerrainGenerator {
    /// Creates a generator; the same seed always produces the same world.
    pub fn new(seed: u32) -> Self {
        let heightmap = Fbm::<Perlin>::new(seed)
            .set_octaves(NOISE_OCTAVES)
            .set_frequency(NOISE_FREQUENCY);
        SimpleTerrainGenerator { seed, heightmap }
    }

    /// Surface height of the world column at block coordinates `(world_x, world_z)`.
    pub fn height_at(&self, world_x: i32, world_z: i32) -> usize {
        let noise_value = self.heightmap.get([world_x as f64, world_z as f64]);
        let normalized = ((noise_value + 1.0) / 2.0).clamp(0.0, 1.0);
        let height = (BASE_HEIGHT + normalized * HEIGHT_RANGE) as usize;
        height.min(CHUNK_SIZE_Y - 1)
    }

    /// Dirt depth under the surface, dithered per column.
    fn dirt_depth(&self, world_x: i32, world_z: i32) -> usize {
        let column_seed = (self.seed as u64)
            ^ (world_x as i64 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ (world_z as i64 as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
        let mut rng = fastrand::Rng::with_seed(column_seed);
        3 + rng.usize(0..2)
    }
}

impl TerrainGenerator for SimpleTerrainGenerator {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn generate_for(&self, voxels: &mut ChunkVoxels, _registry: &BlockRegistry) {
        let origin = voxels.coord().block_origin();

        for x in 0..CHUNK_SIZE_X {
            for z in 0..CHUNK_SIZE_Z {
                let world_x = origin.x + x as i32;
                let world_z = origin.z + z as i32;
                let height = self.height_at(world_x, world_z);
                let dirt_start = height.saturating_sub(self.dirt_depth(world_x, world_z));

                for y in 0..=height.max(SEA_LEVEL) {
                    let block_type = if y == 0 {
                        BlockType::BEDROCK
                    } else if y < dirt_start {
                        BlockType::STONE
                    } else if y < height {
                        BlockType::DIRT
                    } else if y == height {
                        if height < SEA_LEVEL {
                            BlockType::DIRT
                        } else {
                            BlockType::GRASS
                        }
                    } else {
                        BlockType::WATER
                    };
                    voxels.set(x, y, z, Block::new(block_type));
                }
            }
        }
    }
}
