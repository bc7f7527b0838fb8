//! Background tasks for the rendering system.
//!
//! # Available Tasks
//! - `ChunkMeshGenerationTask`: builds the CPU-side meshes of a column from its
//!   five-column neighbourhood

pub mod chunk_mesh_generation_task;

pub use chunk_mesh_generation_task::{ChunkMeshGenerationResult, ChunkMeshGenerationTask};
