//! # Terrain Generation Task
//!
//! Fills one column's voxels on a terrain worker. The result carries the finished voxel
//! array back to the owning thread, which inserts it into the loaded-chunk map.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use crate::engine_state::{
    task_management::{panic_message, Task},
    voxels::{
        block::BlockRegistry,
        chunk::{ChunkCoord, ChunkVoxels},
        terrain::TerrainGenerator,
    },
};

/// Generates the voxels of one column.
pub struct TerrainGenerationTask {
    coord: ChunkCoord,
    generator: Arc<dyn TerrainGenerator>,
    registry: Arc<BlockRegistry>,
}

impl TerrainGenerationTask {
    /// Creates a task for `coord` using the world's active generator.
    pub fn new(
        coord: ChunkCoord,
        generator: Arc<dyn TerrainGenerator>,
        registry: Arc<BlockRegistry>,
    ) -> Self {
        TerrainGenerationTask {
            coord,
            generator,
            registry,
        }
    }

    /// The column this task generates.
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }
}

/// Outcome of a terrain generation task.
pub enum TerrainGenerationResult {
    /// The column was generated
    Generated(ChunkVoxels),
    /// The generator panicked
    Failed {
        /// Column that failed
        coord: ChunkCoord,
        /// Panic message
        reason: String,
    },
}

impl TerrainGenerationResult {
    /// The column this result belongs to.
    pub fn coord(&self) -> ChunkCoord {
        match self {
            TerrainGenerationResult::Generated(voxels) => voxels.coord(),
            TerrainGenerationResult::Failed { coord, .. } => *coord,
        }
    }
}

impl Task for TerrainGenerationTask {
    type Output = TerrainGenerationResult;

    fn process(self) -> TerrainGenerationResult {
        let TerrainGenerationTask {
            coord,
            generator,
            registry,
        } = self;

        let generated = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut voxels = ChunkVoxels::new(coord);
            generator.generate_for(&mut voxels, &registry);
            voxels
        }));

        match generated {
            Ok(voxels) => TerrainGenerationResult::Generated(voxels),
            Err(payload) => TerrainGenerationResult::Failed {
                coord,
                reason: panic_message(payload.as_ref()),
            },
        }
    }
}
