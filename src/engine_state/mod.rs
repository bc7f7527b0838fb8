//! # Engine State Module
//!
//! The owning-thread façade over the streaming pipeline.
//!
//! ## Key Components
//!
//! * `EngineState` - Ties the chunk manager, mesh manager and draw commands together
//! * `buffer_state` - Shared vertex/index buffers on the CPU or a `wgpu` device
//! * `config` - World configuration
//! * `rendering` - Packed vertices, meshing, buffer placement and draw commands
//! * `task_management` - Worker pools, result channels and the `Task` trait
//! * `voxels` - Blocks, chunks, terrain and the chunk manager
//!
//! ## Lifecycle
//!
//! Create an [`EngineState`], call [`EngineState::update`] once per frame with the current
//! viewpoint, and finish with [`EngineState::teardown`], which stops the workers and
//! releases every mesh before the shared buffers go away.

use std::sync::Arc;

use cgmath::Point3;
use log::info;

use buffer_state::MeshBuffers;
use config::WorldConfig;
use error::EngineError;
use rendering::{DrawCommandBuilder, MeshManager, TerrainVertex};
use voxels::{
    block::BlockRegistry,
    chunk_manager::{ChunkManager, UpdateStats},
};

pub mod buffer_state;
pub mod config;
pub mod error;
pub mod rendering;
pub mod task_management;
pub mod voxels;

/// Per-frame summary returned by [`EngineState::update`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// What the chunk manager did this cycle
    pub chunks: UpdateStats,
    /// Chunks in the loaded map
    pub loaded_chunks: usize,
    /// Opaque-pass draw commands
    pub solid_draws: usize,
    /// Water-pass draw commands
    pub water_draws: usize,
    /// Mesh handles holding buffer space
    pub live_mesh_handles: usize,
    /// Vertex-buffer bytes reserved
    pub vertex_bytes_in_use: u64,
    /// Index-buffer bytes reserved
    pub index_bytes_in_use: u64,
}

/// The main state container for the streaming world.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use cgmath::Point3;
/// use voxel_streamer::engine_state::{
///     buffer_state::MeshBuffers, config::WorldConfig, voxels::block::BlockRegistry, EngineState,
/// };
///
/// let config = WorldConfig::default();
/// let buffers = MeshBuffers::cpu(&config);
/// let mut engine = EngineState::new(config, Arc::new(BlockRegistry::builtin()), buffers)?;
///
/// for frame in 0..100 {
///     let stats = engine.update(Point3::new(frame as f32, 100.0, 0.0));
///     println!("{} chunks loaded", stats.loaded_chunks);
/// }
/// engine.teardown()?;
/// # Ok::<(), voxel_streamer::engine_state::error::EngineError>(())
/// ```
pub struct EngineState {
    config: WorldConfig,
    registry: Arc<BlockRegistry>,
    chunk_manager: ChunkManager,
    mesh_manager: MeshManager,
    draw_commands: DrawCommandBuilder,
}

impl EngineState {
    /// Validates `config`, sets up the buffer allocators and starts the worker pools.
    pub fn new(
        config: WorldConfig,
        registry: Arc<BlockRegistry>,
        buffers: MeshBuffers,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let mesh_manager = MeshManager::new(
            &TerrainVertex::desc(),
            buffers,
            config.vertex_min_block_size,
            config.index_min_block_size,
        )?;
        let generator = config.terrain.create(config.seed);
        let chunk_manager = ChunkManager::new(&config, generator, registry.clone())?;

        Ok(EngineState {
            config,
            registry,
            chunk_manager,
            mesh_manager,
            draw_commands: DrawCommandBuilder::new(),
        })
    }

    /// Streams chunks around `viewpoint` and rebuilds the draw lists.
    pub fn update(&mut self, viewpoint: Point3<f32>) -> FrameStats {
        let chunks = self.chunk_manager.update(viewpoint, &mut self.mesh_manager);

        if let Some(center) = self.chunk_manager.center() {
            self.draw_commands.rebuild(
                self.chunk_manager.loaded_chunks(),
                center,
                self.chunk_manager.render_radius(),
            );
        }

        FrameStats {
            chunks,
            loaded_chunks: self.chunk_manager.loaded_chunks().len(),
            solid_draws: self.draw_commands.solid_commands().len(),
            water_draws: self.draw_commands.water_commands().len(),
            live_mesh_handles: self.mesh_manager.live_handles(),
            vertex_bytes_in_use: self.mesh_manager.vertex_bytes_in_use(),
            index_bytes_in_use: self.mesh_manager.index_bytes_in_use(),
        }
    }

    /// The chunk manager, for read access to loaded chunks.
    pub fn chunks(&self) -> &ChunkManager {
        &self.chunk_manager
    }

    /// The chunk manager, for invalidating meshes.
    pub fn chunks_mut(&mut self) -> &mut ChunkManager {
        &mut self.chunk_manager
    }

    /// Draw lists built by the last update.
    pub fn draw_commands(&self) -> &DrawCommandBuilder {
        &self.draw_commands
    }

    /// The mesh manager and its shared buffers.
    pub fn mesh_manager(&self) -> &MeshManager {
        &self.mesh_manager
    }

    /// The block registry shared with worker tasks.
    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    /// The configuration the world was created with.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Stops the workers, unloads every chunk and destroys the mesh manager, in that order.
    ///
    /// # Errors
    ///
    /// [`EngineError::LiveMeshHandles`] if mesh handles survived the unload.
    pub fn teardown(self) -> Result<(), EngineError> {
        let EngineState {
            mut chunk_manager,
            mesh_manager,
            mut draw_commands,
            ..
        } = self;

        chunk_manager.shutdown();
        let unloaded = chunk_manager.unload_all();
        draw_commands.clear();
        mesh_manager.teardown()?;

        info!("Engine torn down, {} chunk(s) unloaded", unloaded);
        Ok(())
    }
}
