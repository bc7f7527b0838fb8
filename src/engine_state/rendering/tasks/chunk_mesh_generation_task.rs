//! Task for generating mesh data for chunks in a background thread.
//!
//! The task only reads voxels: the column and its four neighbours arrive as shared
//! `Arc<ChunkVoxels>` and stay valid even if the owning thread evicts them meanwhile.
//! Uploading the result is left to the owning thread.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use crate::engine_state::{
    rendering::meshing::mesh::{generate_chunk_meshes, ChunkMeshes},
    task_management::{panic_message, Task},
    voxels::{
        block::BlockRegistry,
        chunk::{ChunkCoord, ChunkMeshInput},
    },
};

/// Meshes one column against its loaded neighbours.
pub struct ChunkMeshGenerationTask {
    input: ChunkMeshInput,
    registry: Arc<BlockRegistry>,
}

impl ChunkMeshGenerationTask {
    /// Creates a task over a complete five-column neighbourhood.
    pub fn new(input: ChunkMeshInput, registry: Arc<BlockRegistry>) -> Self {
        ChunkMeshGenerationTask { input, registry }
    }

    /// The column being meshed.
    pub fn coord(&self) -> ChunkCoord {
        self.input.coord()
    }
}

/// Outcome of a mesh generation task.
pub enum ChunkMeshGenerationResult {
    /// Meshes for every subchunk of the column
    Generated {
        /// Column that was meshed
        coord: ChunkCoord,
        /// Solid and water meshes per subchunk
        meshes: ChunkMeshes,
    },
    /// Meshing panicked
    Failed {
        /// Column that failed
        coord: ChunkCoord,
        /// Panic message
        reason: String,
    },
}

impl ChunkMeshGenerationResult {
    /// The column this result belongs to.
    pub fn coord(&self) -> ChunkCoord {
        match self {
            ChunkMeshGenerationResult::Generated { coord, .. }
            | ChunkMeshGenerationResult::Failed { coord, .. } => *coord,
        }
    }
}

impl Task for ChunkMeshGenerationTask {
    type Output = ChunkMeshGenerationResult;

    fn process(self) -> ChunkMeshGenerationResult {
        let coord = self.coord();
        let meshed = panic::catch_unwind(AssertUnwindSafe(|| {
            generate_chunk_meshes(&self.input, &self.registry)
        }));

        match meshed {
            Ok(meshes) => ChunkMeshGenerationResult::Generated { coord, meshes },
            Err(payload) => ChunkMeshGenerationResult::Failed {
                coord,
                reason: panic_message(payload.as_ref()),
            },
        }
    }
}
