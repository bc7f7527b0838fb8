//! Mesh generation for voxel rendering.
//!
//! Converts the voxels of a column into packed, GPU-ready geometry.
//!
//! # Architecture
//! - [`PackedTerrainMesh`]: indexed geometry built from [`TerrainVertex`](crate::engine_state::rendering::TerrainVertex)s
//! - [`SubchunkMeshes`] / [`ChunkMeshes`]: solid and water passes per subchunk, per column
//! - `face`: unit cube corner tables shared by every quad
//! - `culled`: per-face visibility culling across subchunk and column borders
//!
//! # Usage
//! ```no_run
//! use std::sync::Arc;
//! use voxel_streamer::engine_state::{
//!     rendering::meshing::mesh::generate_chunk_meshes,
//!     voxels::{block::BlockRegistry, chunk::{ChunkCoord, ChunkMeshInput, ChunkVoxels}},
//! };
//!
//! let column = |x, z| Arc::new(ChunkVoxels::new(ChunkCoord::new(x, z)));
//! let input = ChunkMeshInput {
//!     main: column(0, 0),
//!     north: column(0, -1),
//!     south: column(0, 1),
//!     east: column(1, 0),
//!     west: column(-1, 0),
//! };
//! let meshes = generate_chunk_meshes(&input, &BlockRegistry::builtin());
//! assert_eq!(meshes.face_count(), 0);
//! ```

mod culled;
mod face;
mod mesh;

pub use culled::{generate_chunk_meshes, generate_subchunk_meshes, should_draw_face};
pub use face::{face_corners, CUBE_CORNERS, CUBE_FACE_CORNERS};
pub use mesh::*;
