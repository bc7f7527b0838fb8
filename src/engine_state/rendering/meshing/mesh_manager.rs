//! Placement of packed meshes inside the shared vertex and index buffers.
//!
//! Every upload reserves one vertex region and, when the mesh is indexed, one index region
//! from two independent buddy allocators, then copies the bytes in. The returned
//! [`GpuMeshHandle`] owns those reservations and gives them back when dropped.
//!
//! Allocators and handles live on the owning thread. Handles only hold a weak link to the
//! allocators, so dropping a handle after the manager is gone is a no-op; the manager's
//! [`MeshManager::teardown`] reports handles that outlived the chunks that owned them.

use log::{error, info};
use thiserror::Error;

use super::{
    buddy_allocator::{BuddyAllocator, BuddyBlock},
    mesh::{ChunkMeshes, PackedTerrainMesh},
};
use crate::{
    core::{StResource, StWeak},
    engine_state::{buffer_state::MeshBuffers, error::EngineError},
};

/// A mesh that does not fit into the remaining space of a shared buffer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshUploadError {
    /// No vertex-buffer block large enough
    #[error("vertex buffer cannot fit {requested} bytes (largest free block: {largest_free})")]
    VertexCapacity {
        /// Bytes the mesh needed
        requested: u64,
        /// Largest block that was still free
        largest_free: u64,
    },

    /// No index-buffer block large enough
    #[error("index buffer cannot fit {requested} bytes (largest free block: {largest_free})")]
    IndexCapacity {
        /// Bytes the mesh needed
        requested: u64,
        /// Largest block that was still free
        largest_free: u64,
    },
}

/// A byte range inside a shared buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferRegion {
    /// Start of the range
    pub offset: u64,
    /// Length of the data written, not of the reserved block
    pub size: u64,
}

/// Both allocators plus the number of handles still holding reservations.
struct MeshAllocators {
    vertex: BuddyAllocator,
    index: BuddyAllocator,
    live_handles: usize,
}

impl MeshAllocators {
    fn release(&mut self, vertex: BufferRegion, index: Option<BufferRegion>) {
        if !self.vertex.free(vertex.offset) {
            error!("Vertex region at offset {} was not allocated", vertex.offset);
        }
        if let Some(index) = index {
            if !self.index.free(index.offset) {
                error!("Index region at offset {} was not allocated", index.offset);
            }
        }
        self.live_handles -= 1;
    }
}

/// Owned reservation of one mesh's vertex and index ranges.
///
/// Dropping the handle frees both ranges. Handles are tied to the owning thread.
#[derive(Debug)]
pub struct GpuMeshHandle {
    vertex: BufferRegion,
    index: Option<BufferRegion>,
    vertex_stride: u64,
    index_format: wgpu::IndexFormat,
    allocators: StWeak<MeshAllocators>,
}

impl GpuMeshHandle {
    /// Vertex range inside the shared vertex buffer.
    pub fn vertex_region(&self) -> BufferRegion {
        self.vertex
    }

    /// Index range inside the shared index buffer, if the mesh is indexed.
    pub fn index_region(&self) -> Option<BufferRegion> {
        self.index
    }

    /// Bytes per vertex.
    pub fn vertex_stride(&self) -> u64 {
        self.vertex_stride
    }

    /// Format of the index data.
    pub fn index_format(&self) -> wgpu::IndexFormat {
        self.index_format
    }

    /// Number of vertices stored.
    pub fn vertex_count(&self) -> u32 {
        (self.vertex.size / self.vertex_stride) as u32
    }

    /// Number of indices stored.
    pub fn index_count(&self) -> u32 {
        self.index
            .map_or(0, |index| (index.size / INDEX_SIZE) as u32)
    }
}

impl Drop for GpuMeshHandle {
    fn drop(&mut self) {
        let (vertex, index) = (self.vertex, self.index);
        self.allocators
            .with_mut(|allocators| allocators.release(vertex, index));
    }
}

/// GPU geometry of one subchunk: an optional handle per render pass.
#[derive(Debug, Default)]
pub struct SubchunkGpuMesh {
    /// Opaque pass
    pub solid: Option<GpuMeshHandle>,
    /// Water pass
    pub water: Option<GpuMeshHandle>,
}

impl SubchunkGpuMesh {
    /// Whether neither pass has geometry.
    pub fn is_empty(&self) -> bool {
        self.solid.is_none() && self.water.is_none()
    }
}

/// GPU geometry of a whole column, one slot per subchunk.
#[derive(Debug, Default)]
pub struct ChunkGpuMesh {
    subchunks: Vec<SubchunkGpuMesh>,
}

impl ChunkGpuMesh {
    /// Handles of the subchunk at `index`, if uploaded.
    pub fn subchunk(&self, index: usize) -> Option<&SubchunkGpuMesh> {
        self.subchunks.get(index)
    }

    /// Subchunk handles, bottom to top.
    pub fn subchunks(&self) -> impl Iterator<Item = &SubchunkGpuMesh> {
        self.subchunks.iter()
    }

    /// Number of live handles held.
    pub fn handle_count(&self) -> usize {
        self.subchunks
            .iter()
            .map(|mesh| mesh.solid.is_some() as usize + mesh.water.is_some() as usize)
            .sum()
    }
}

const INDEX_SIZE: u64 = std::mem::size_of::<u32>() as u64;

/// Uploads chunk meshes into the shared buffers.
///
/// Buffer sizes are fixed at construction. Running out of space is reported as a
/// [`MeshUploadError`] and leaves the buffers unchanged.
pub struct MeshManager {
    vertex_stride: u64,
    buffers: MeshBuffers,
    allocators: StResource<MeshAllocators>,
}

impl MeshManager {
    /// Creates a manager over `buffers` for vertices described by `layout`.
    ///
    /// # Errors
    ///
    /// [`EngineError::Allocator`] if a buffer size or minimum block size is not a power of
    /// two, or a minimum block exceeds its buffer.
    pub fn new(
        layout: &wgpu::VertexBufferLayout<'_>,
        buffers: MeshBuffers,
        vertex_min_block_size: u64,
        index_min_block_size: u64,
    ) -> Result<Self, EngineError> {
        let vertex = BuddyAllocator::new(buffers.vertex.size(), vertex_min_block_size)?;
        let index = BuddyAllocator::new(buffers.index.size(), index_min_block_size)?;

        info!(
            "Mesh manager ready: {} vertex bytes, {} index bytes",
            vertex.total_size(),
            index.total_size()
        );

        Ok(MeshManager {
            vertex_stride: layout.array_stride,
            buffers,
            allocators: StResource::new(MeshAllocators {
                vertex,
                index,
                live_handles: 0,
            }),
        })
    }

    /// Copies `mesh` into the shared buffers.
    ///
    /// # Returns
    ///
    /// `Ok(None)` for a mesh without vertices, otherwise the handle owning the new regions.
    ///
    /// # Errors
    ///
    /// A capacity error if either buffer has no block large enough. Nothing stays
    /// reserved in that case.
    pub fn upload_mesh(
        &mut self,
        mesh: &PackedTerrainMesh,
    ) -> Result<Option<GpuMeshHandle>, MeshUploadError> {
        if mesh.is_empty() {
            return Ok(None);
        }

        let vertex_bytes = mesh.vertex_bytes();
        let index_bytes = mesh.index_bytes();
        let (vertex_block, index_block) =
            self.reserve(vertex_bytes.len() as u64, index_bytes.len() as u64)?;

        self.buffers.vertex.write(vertex_block.offset, vertex_bytes);
        if let Some(index_block) = index_block {
            self.buffers.index.write(index_block.offset, index_bytes);
        }

        Ok(Some(GpuMeshHandle {
            vertex: BufferRegion {
                offset: vertex_block.offset,
                size: vertex_bytes.len() as u64,
            },
            index: index_block.map(|block| BufferRegion {
                offset: block.offset,
                size: index_bytes.len() as u64,
            }),
            vertex_stride: self.vertex_stride,
            index_format: wgpu::IndexFormat::Uint32,
            allocators: self.allocators.downgrade(),
        }))
    }

    /// Uploads both passes of every subchunk.
    ///
    /// On error, handles already created for this column are dropped and their regions freed.
    pub fn upload_chunk(&mut self, meshes: &ChunkMeshes) -> Result<ChunkGpuMesh, MeshUploadError> {
        let mut gpu_mesh = ChunkGpuMesh {
            subchunks: Vec::with_capacity(meshes.subchunks.len()),
        };
        for subchunk in &meshes.subchunks {
            let solid = self.upload_mesh(&subchunk.solid)?;
            let water = self.upload_mesh(&subchunk.water)?;
            gpu_mesh.subchunks.push(SubchunkGpuMesh { solid, water });
        }
        Ok(gpu_mesh)
    }

    /// Releases a handle's regions now rather than when it goes out of scope.
    pub fn free_mesh(&mut self, handle: GpuMeshHandle) {
        drop(handle);
    }

    /// Number of handles whose regions are still reserved.
    pub fn live_handles(&self) -> usize {
        self.allocators.get().live_handles
    }

    /// Vertex-buffer bytes reserved, in whole blocks.
    pub fn vertex_bytes_in_use(&self) -> u64 {
        self.allocators.get().vertex.allocated_bytes()
    }

    /// Index-buffer bytes reserved, in whole blocks.
    pub fn index_bytes_in_use(&self) -> u64 {
        self.allocators.get().index.allocated_bytes()
    }

    /// Bytes per vertex of the layout this manager was built for.
    pub fn vertex_stride(&self) -> u64 {
        self.vertex_stride
    }

    /// The shared buffers.
    pub fn buffers(&self) -> &MeshBuffers {
        &self.buffers
    }

    /// Destroys the manager and its buffers.
    ///
    /// # Errors
    ///
    /// [`EngineError::LiveMeshHandles`] if any handle is still alive. Those handles become
    /// inert once the manager is gone.
    pub fn teardown(self) -> Result<(), EngineError> {
        let live_handles = self.live_handles();
        if live_handles > 0 {
            return Err(EngineError::LiveMeshHandles(live_handles));
        }

        info!(
            "Mesh manager torn down (vertex writes: {}, index writes: {})",
            self.buffers.vertex.analytics().times_written,
            self.buffers.index.analytics().times_written
        );
        Ok(())
    }

    fn reserve(
        &mut self,
        vertex_size: u64,
        index_size: u64,
    ) -> Result<(BuddyBlock, Option<BuddyBlock>), MeshUploadError> {
        let mut allocators = self.allocators.get_mut();

        let vertex_block = allocators.vertex.allocate(vertex_size).ok_or_else(|| {
            MeshUploadError::VertexCapacity {
                requested: vertex_size,
                largest_free: allocators.vertex.largest_free_block(),
            }
        })?;

        let index_block = if index_size == 0 {
            None
        } else {
            match allocators.index.allocate(index_size) {
                Some(block) => Some(block),
                None => {
                    allocators.vertex.free(vertex_block.offset);
                    return Err(MeshUploadError::IndexCapacity {
                        requested: index_size,
                        largest_free: allocators.index.largest_free_block(),
                    });
                }
            }
        };

        allocators.live_handles += 1;
        Ok((vertex_block, index_block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::{
        buffer_state::CpuMeshBuffer,
        rendering::{meshing::mesh::SubchunkMeshes, vertex::TerrainVertex},
        voxels::{block::block_side::BlockSide, chunk::SUBCHUNK_COUNT},
    };

    fn manager(vertex_size: u64, index_size: u64) -> MeshManager {
        let buffers = MeshBuffers::new(
            Box::new(CpuMeshBuffer::new("vertices", vertex_size)),
            Box::new(CpuMeshBuffer::new("indices", index_size)),
        );
        MeshManager::new(&TerrainVertex::desc(), buffers, 64, 64).unwrap()
    }

    fn quads(count: u32) -> PackedTerrainMesh {
        let mut mesh = PackedTerrainMesh::default();
        for i in 0..count {
            let corner = TerrainVertex::new(i % 16, 0, 0, 0, 0, 0, 1, BlockSide::TOP);
            mesh.add_face([corner; 4]);
        }
        mesh
    }

    #[test]
    fn test_empty_mesh_yields_no_handle() {
        let mut manager = manager(4096, 4096);
        assert!(manager.upload_mesh(&PackedTerrainMesh::default()).unwrap().is_none());
        assert_eq!(manager.live_handles(), 0);
    }

    #[test]
    fn test_upload_reserves_and_drop_frees() {
        let mut manager = manager(4096, 4096);
        let mesh = quads(3);
        let handle = manager.upload_mesh(&mesh).unwrap().unwrap();

        assert_eq!(handle.vertex_region().size, 12 * TerrainVertex::STRIDE);
        assert_eq!(handle.index_region().map(|r| r.size), Some(18 * 4));
        assert_eq!(handle.vertex_count(), 12);
        assert_eq!(handle.index_count(), 18);
        assert_eq!(handle.index_format(), wgpu::IndexFormat::Uint32);
        assert_eq!(manager.live_handles(), 1);
        assert_eq!(manager.vertex_bytes_in_use(), 128);
        assert_eq!(manager.index_bytes_in_use(), 128);

        drop(handle);
        assert_eq!(manager.live_handles(), 0);
        assert_eq!(manager.vertex_bytes_in_use(), 0);
        assert_eq!(manager.index_bytes_in_use(), 0);
    }

    #[test]
    fn test_upload_copies_bytes_to_reserved_offsets() {
        let mut manager = manager(4096, 4096);
        let _first = manager.upload_mesh(&quads(2)).unwrap().unwrap();
        let mesh = quads(1);
        let second = manager.upload_mesh(&mesh).unwrap().unwrap();

        assert_eq!(second.vertex_region().offset, 64);
        assert_eq!(manager.buffers().vertex.analytics().times_written, 2);
        assert_eq!(
            manager.buffers().vertex.analytics().used_memory,
            64 + mesh.vertex_bytes().len() as u64
        );
    }

    #[test]
    fn test_capacity_error_leaves_nothing_reserved() {
        let mut manager = manager(256, 64);
        let err = manager.upload_mesh(&quads(3)).unwrap_err();
        assert_eq!(
            err,
            MeshUploadError::IndexCapacity {
                requested: 72,
                largest_free: 64
            }
        );
        assert_eq!(manager.live_handles(), 0);
        assert_eq!(manager.vertex_bytes_in_use(), 0);

        let err = manager.upload_mesh(&quads(9)).unwrap_err();
        assert!(matches!(err, MeshUploadError::VertexCapacity { .. }));
    }

    #[test]
    fn test_upload_chunk_releases_partial_work_on_failure() {
        let mut manager = manager(1024, 1024);
        let mut meshes = ChunkMeshes::empty();
        meshes.subchunks[0] = SubchunkMeshes {
            solid: quads(2),
            water: quads(1),
        };
        let gpu_mesh = manager.upload_chunk(&meshes).unwrap();
        assert_eq!(gpu_mesh.subchunks().count(), SUBCHUNK_COUNT);
        assert_eq!(gpu_mesh.handle_count(), 2);
        assert!(gpu_mesh.subchunk(1).is_some_and(|mesh| mesh.is_empty()));
        drop(gpu_mesh);

        meshes.subchunks[3].solid = quads(40);
        assert!(manager.upload_chunk(&meshes).is_err());
        assert_eq!(manager.live_handles(), 0);
        assert_eq!(manager.vertex_bytes_in_use(), 0);
    }

    #[test]
    fn test_teardown_requires_released_handles() {
        let mut manager = manager(4096, 4096);
        let handle = manager.upload_mesh(&quads(1)).unwrap();
        assert!(matches!(
            manager.teardown(),
            Err(EngineError::LiveMeshHandles(1))
        ));
        // The manager is gone; dropping the orphaned handle must not panic.
        drop(handle);

        let mut manager = self::manager(4096, 4096);
        let handle = manager.upload_mesh(&quads(1)).unwrap();
        manager.free_mesh(handle.unwrap());
        assert!(manager.teardown().is_ok());
    }

    #[test]
    fn test_invalid_geometry_is_rejected() {
        let buffers = MeshBuffers::new(
            Box::new(CpuMeshBuffer::new("vertices", 1000)),
            Box::new(CpuMeshBuffer::new("indices", 1024)),
        );
        assert!(matches!(
            MeshManager::new(&TerrainVertex::desc(), buffers, 64, 64),
            Err(EngineError::Allocator(_))
        ));
    }
}
