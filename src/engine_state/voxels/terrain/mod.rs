//! # Terrain Generation
//!
//! Interchangeable procedures that fill a column's voxels from its coordinate.
//!
//! The active generator is picked once from [`TerrainKind`] when the world is created and
//! shared with every terrain task as an `Arc<dyn TerrainGenerator>`. Generators hold only
//! immutable state, so any number of tasks may call `generate_for` concurrently on
//! different columns.
//!
//! Available strategies:
//! - `super_flat`: fixed bedrock/dirt/grass layers, useful for tests and benchmarks
//! - `simple`: fractal Perlin heightmap with a sea level

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{block::BlockRegistry, chunk::ChunkVoxels};

mod simple;
mod super_flat;

pub use simple::SimpleTerrainGenerator;
pub use super_flat::SuperFlatTerrainGenerator;

/// A procedure that fills a freshly allocated, all-air column.
pub trait TerrainGenerator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Writes the column's blocks in place.
    fn generate_for(&self, voxels: &mut ChunkVoxels, registry: &BlockRegistry);
}

/// The terrain strategies selectable from configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainKind {
    /// Flat layered world
    SuperFlat,
    /// Noise heightmap
    Simple,
}

impl TerrainKind {
    /// Instantiates the generator for this kind.
    pub fn create(&self, seed: u32) -> Arc<dyn TerrainGenerator> {
        match self {
            TerrainKind::SuperFlat => Arc::new(SuperFlatTerrainGenerator),
            TerrainKind::Simple => Arc::new(SimpleTerrainGenerator::new(seed)),
        }
    }
}
