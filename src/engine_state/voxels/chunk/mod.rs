//! # Chunk Module
//!
//! Voxel storage for one vertical column of the world and the owning-thread bookkeeping
//! attached to it.
//!
//! ## Storage layout
//!
//! A column is `CHUNK_SIZE_X × CHUNK_SIZE_Y × CHUNK_SIZE_Z` blocks held in one dense boxed
//! slice, split into `SUBCHUNK_COUNT` cubic subchunks stacked along Y. Each subchunk occupies
//! a contiguous run of `SUBCHUNK_VOLUME` blocks, indexed `x * SY * SZ + y * SZ + z` inside
//! the run, so a [`Subchunk`] view is just a borrowed slice.
//!
//! ## Ownership
//!
//! - [`ChunkVoxels`] is written by exactly one terrain task, then frozen behind an `Arc` and
//!   shared read-only with any number of mesh tasks.
//! - [`Chunk`] lives in the chunk manager's map on the owning thread and adds mesh state,
//!   the pending CPU mesh and the GPU mesh handles. Dropping it releases the handles.

use std::sync::Arc;

use super::block::Block;
use crate::engine_state::rendering::meshing::{
    mesh::ChunkMeshes,
    mesh_manager::{ChunkGpuMesh, SubchunkGpuMesh},
};

pub mod coord;
pub mod neighborhood;

pub use coord::ChunkCoord;
pub use neighborhood::{ChunkMeshInput, SubchunkNeighborhood};

/// Width of a subchunk along X, in blocks.
pub const SUBCHUNK_SIZE_X: usize = 16;
/// Height of a subchunk along Y, in blocks.
pub const SUBCHUNK_SIZE_Y: usize = 16;
/// Depth of a subchunk along Z, in blocks.
pub const SUBCHUNK_SIZE_Z: usize = 16;
/// Blocks per subchunk.
pub const SUBCHUNK_VOLUME: usize = SUBCHUNK_SIZE_X * SUBCHUNK_SIZE_Y * SUBCHUNK_SIZE_Z;
/// Subchunks stacked in one column.
pub const SUBCHUNK_COUNT: usize = 16;

/// Column width along X, in blocks.
pub const CHUNK_SIZE_X: usize = SUBCHUNK_SIZE_X;
/// Column height, in blocks.
pub const CHUNK_SIZE_Y: usize = SUBCHUNK_SIZE_Y * SUBCHUNK_COUNT;
/// Column depth along Z, in blocks.
pub const CHUNK_SIZE_Z: usize = SUBCHUNK_SIZE_Z;
/// Blocks per column.
pub const CHUNK_VOLUME: usize = SUBCHUNK_VOLUME * SUBCHUNK_COUNT;

static EMPTY_SUBCHUNK: [Block; SUBCHUNK_VOLUME] = [Block::AIR; SUBCHUNK_VOLUME];

/// Dense voxel array of one column.
pub struct ChunkVoxels {
    coord: ChunkCoord,
    blocks: Box<[Block]>,
}

impl ChunkVoxels {
    /// Creates a column filled with air.
    pub fn new(coord: ChunkCoord) -> Self {
        ChunkVoxels {
            coord,
            blocks: vec![Block::AIR; CHUNK_VOLUME].into_boxed_slice(),
        }
    }

    /// The column's coordinate.
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    #[inline]
    fn index(x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < CHUNK_SIZE_X && y < CHUNK_SIZE_Y && z < CHUNK_SIZE_Z);
        let subchunk = y / SUBCHUNK_SIZE_Y;
        let local_y = y % SUBCHUNK_SIZE_Y;
        subchunk * SUBCHUNK_VOLUME + subchunk_index(x, local_y, z)
    }

    /// Block at column-local coordinates.
    ///
    /// # Panics
    /// Panics if the coordinates lie outside the column.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Block {
        self.blocks[Self::index(x, y, z)]
    }

    /// Overwrites the block at column-local coordinates.
    ///
    /// # Panics
    /// Panics if the coordinates lie outside the column.
    pub fn set(&mut self, x: usize, y: usize, z: usize, block: Block) {
        self.blocks[Self::index(x, y, z)] = block;
    }

    /// Read-only view of the subchunk at vertical slot `index`.
    pub fn subchunk(&self, index: usize) -> Subchunk<'_> {
        let start = index * SUBCHUNK_VOLUME;
        Subchunk {
            index,
            blocks: &self.blocks[start..start + SUBCHUNK_VOLUME],
        }
    }

    /// Subchunk at `index`, or the shared empty subchunk when `index` lies above or below
    /// the column.
    pub fn subchunk_or_empty(&self, index: isize) -> Subchunk<'_> {
        if index < 0 || index as usize >= SUBCHUNK_COUNT {
            Subchunk::empty()
        } else {
            self.subchunk(index as usize)
        }
    }

    /// All subchunks, bottom to top.
    pub fn subchunks(&self) -> impl Iterator<Item = Subchunk<'_>> {
        (0..SUBCHUNK_COUNT).map(|index| self.subchunk(index))
    }

    /// Raw storage in layout order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }
}

#[inline]
fn subchunk_index(x: usize, y: usize, z: usize) -> usize {
    x * SUBCHUNK_SIZE_Y * SUBCHUNK_SIZE_Z + y * SUBCHUNK_SIZE_Z + z
}

/// Non-owning window onto one subchunk's blocks.
///
/// `index()` is the vertical slot of the subchunk inside its column. The same slot keys the
/// column's GPU mesh handles ([`Chunk::subchunk_mesh`]).
#[derive(Copy, Clone)]
pub struct Subchunk<'a> {
    index: usize,
    blocks: &'a [Block],
}

impl<'a> Subchunk<'a> {
    /// A statically allocated all-air subchunk.
    pub fn empty() -> Subchunk<'static> {
        Subchunk {
            index: usize::MAX,
            blocks: &EMPTY_SUBCHUNK,
        }
    }

    /// Vertical slot inside the parent column.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Block at subchunk-local coordinates.
    ///
    /// # Panics
    /// Panics if the coordinates lie outside the subchunk.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> Block {
        debug_assert!(x < SUBCHUNK_SIZE_X && y < SUBCHUNK_SIZE_Y && z < SUBCHUNK_SIZE_Z);
        self.blocks[subchunk_index(x, y, z)]
    }

    /// Whether every block is air.
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|block| !block.has_mesh())
    }

    /// Visits every block with its local coordinates, in layout order.
    pub fn for_each_xyz(&self, mut f: impl FnMut(usize, usize, usize, Block)) {
        for x in 0..SUBCHUNK_SIZE_X {
            for y in 0..SUBCHUNK_SIZE_Y {
                for z in 0..SUBCHUNK_SIZE_Z {
                    f(x, y, z, self.blocks[subchunk_index(x, y, z)]);
                }
            }
        }
    }
}

/// Mesh lifecycle of a loaded chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MeshState {
    /// No current mesh; eligible for mesh generation
    NoMesh,
    /// CPU mesh generated, waiting for upload
    DirtyMesh,
    /// GPU handles reflect the current voxels
    HaveMesh,
}

/// A loaded column as held by the chunk manager.
pub struct Chunk {
    voxels: Arc<ChunkVoxels>,
    mesh_state: MeshState,
    pending_mesh: Option<ChunkMeshes>,
    gpu_mesh: Option<ChunkGpuMesh>,
}

impl Chunk {
    /// Wraps freshly generated voxels. The chunk starts without a mesh.
    pub fn new(voxels: ChunkVoxels) -> Self {
        Chunk {
            voxels: Arc::new(voxels),
            mesh_state: MeshState::NoMesh,
            pending_mesh: None,
            gpu_mesh: None,
        }
    }

    /// The column's coordinate.
    pub fn coord(&self) -> ChunkCoord {
        self.voxels.coord()
    }

    /// Shared handle to the voxel data.
    pub fn voxels(&self) -> &Arc<ChunkVoxels> {
        &self.voxels
    }

    /// Current mesh state.
    pub fn mesh_state(&self) -> MeshState {
        self.mesh_state
    }

    /// Stores a generated CPU mesh and marks the chunk dirty.
    pub fn set_pending_mesh(&mut self, meshes: ChunkMeshes) {
        self.pending_mesh = Some(meshes);
        self.mesh_state = MeshState::DirtyMesh;
    }

    /// The CPU mesh waiting for upload, if any.
    pub fn pending_mesh(&self) -> Option<&ChunkMeshes> {
        self.pending_mesh.as_ref()
    }

    /// Installs uploaded handles, releasing the pending CPU mesh and any handles they
    /// supersede.
    pub fn attach_gpu_mesh(&mut self, gpu_mesh: ChunkGpuMesh) {
        self.pending_mesh = None;
        self.gpu_mesh = Some(gpu_mesh);
        self.mesh_state = MeshState::HaveMesh;
    }

    /// Uploaded handles, if any.
    pub fn gpu_mesh(&self) -> Option<&ChunkGpuMesh> {
        self.gpu_mesh.as_ref()
    }

    /// Drops the uploaded handles, freeing their buffer regions. The pending mesh and the
    /// mesh state are left as they are.
    ///
    /// # Returns
    /// `false` if the chunk held no handles.
    pub fn release_gpu_mesh(&mut self) -> bool {
        self.gpu_mesh.take().is_some()
    }

    /// Uploaded handles of one subchunk slot.
    pub fn subchunk_mesh(&self, index: usize) -> Option<&SubchunkGpuMesh> {
        self.gpu_mesh.as_ref()?.subchunk(index)
    }

    /// Marks the mesh stale so it is regenerated.
    ///
    /// Existing GPU handles stay attached and keep drawing until a new upload replaces them.
    pub fn invalidate_mesh(&mut self) {
        self.pending_mesh = None;
        self.mesh_state = MeshState::NoMesh;
    }
}
