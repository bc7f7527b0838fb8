//! Mesh generation and management for voxel rendering.
//!
//! This module turns voxel columns into packed geometry and places that geometry inside
//! a pair of large shared GPU buffers.
//!
//! # Architecture
//! - `mesh/`: face-culled mesh generation and the packed mesh containers
//! - `buddy_allocator`: power-of-two offset allocation inside a fixed region
//! - `mesh_manager`: uploads meshes through two allocators and hands out RAII handles
//!
//! Generation is a pure function and runs on mesh workers. Allocation and upload happen
//! on the owning thread only.

pub mod buddy_allocator;
pub mod mesh;
pub mod mesh_manager;

pub use buddy_allocator::{BuddyAllocator, BuddyAllocatorError, BuddyBlock};
pub use mesh_manager::{
    BufferRegion, ChunkGpuMesh, GpuMeshHandle, MeshManager, MeshUploadError, SubchunkGpuMesh,
};
