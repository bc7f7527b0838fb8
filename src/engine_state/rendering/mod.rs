//! Rendering-side data for the voxel engine.
//!
//! This module owns what sits between voxel data and a draw call: the packed vertex
//! format, mesh generation, placement of meshes inside the shared GPU buffers and the
//! indirect draw commands built from the resulting handles. Pipelines, shaders and
//! surfaces belong to the embedding renderer.

pub mod draw_commands;
pub mod meshing;
pub mod tasks;
pub mod vertex;

// Re-export commonly used types
pub use draw_commands::DrawCommandBuilder;
pub use meshing::MeshManager;
pub use vertex::TerrainVertex;
