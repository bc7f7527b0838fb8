//! Error types for the streaming engine.

use thiserror::Error;

use super::rendering::meshing::{buddy_allocator::BuddyAllocatorError, MeshUploadError};

/// Errors surfaced by engine construction, configuration and teardown.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The world configuration failed validation
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A block registry definition could not be resolved
    #[error("invalid block registry: {0}")]
    Registry(String),

    /// A shared buffer allocator could not be created
    #[error("allocator error: {0}")]
    Allocator(#[from] BuddyAllocatorError),

    /// Mesh data did not fit into the shared buffers
    #[error("mesh upload failed: {0}")]
    MeshUpload(#[from] MeshUploadError),

    /// GPU adapter or device setup failed
    #[error("GPU error: {0}")]
    Gpu(String),

    /// Mesh handles outlived the chunks that owned them
    #[error("{0} mesh handle(s) still alive at mesh manager teardown")]
    LiveMeshHandles(usize),

    /// I/O error while spawning workers or reading files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
