//! # Voxel World
//!
//! Everything that describes and streams the voxel world itself.
//!
//! ## Architecture
//!
//! * **Block**: voxel values, faces and the read-only block registry
//! * **Chunk**: column coordinates, dense voxel storage, subchunk views and mesh state
//! * **Terrain**: interchangeable generators that fill a column
//! * **Tasks**: terrain generation work run on the terrain pool
//! * **Chunk Manager**: the per-frame load/mesh/evict coordinator
//!
//! ## Thread Safety
//!
//! Voxel arrays are written once by the terrain task that creates them and shared
//! read-only afterwards through `Arc`. The loaded-chunk map, in-flight sets and mesh state
//! belong to the owning thread.

pub mod block;
pub mod chunk;
pub mod chunk_manager;
pub mod tasks;
pub mod terrain;
