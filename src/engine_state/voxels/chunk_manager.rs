//! # Chunk Manager
//!
//! Coordinates chunk streaming around a moving viewpoint. The manager owns the loaded-chunk
//! map, the terrain and mesh worker pools with their result channels, and one in-flight set
//! per task kind. Everything here runs on the owning thread; workers only ever see task
//! values moved into their queue.
//!
//! ## Per-coordinate tracks
//!
//! * Terrain: absent → in flight → loaded
//! * Mesh (loaded chunks only): `NoMesh` → in flight → `DirtyMesh` → `HaveMesh`, and back to
//!   `NoMesh` when invalidated
//!
//! ## Update cycle
//!
//! 1. Drain terrain results into the map
//! 2. Drain mesh results into their chunks
//! 3. Upload pending meshes through the [`MeshManager`]
//! 4. Dispatch terrain for unloaded coordinates of the load window
//! 5. Dispatch meshing for render-window chunks whose four neighbours are loaded
//! 6. Evict chunks outside the load window
//!
//! The owning thread never waits on workers: each cycle works with whatever results have
//! arrived so far.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use cgmath::Point3;
use log::{debug, error, info, trace, warn};

use super::{
    block::BlockRegistry,
    chunk::{Chunk, ChunkCoord, ChunkMeshInput, MeshState},
    tasks::terrain_generation_task::{TerrainGenerationResult, TerrainGenerationTask},
    terrain::TerrainGenerator,
};
use crate::engine_state::{
    config::WorldConfig,
    error::EngineError,
    rendering::{
        meshing::MeshManager,
        tasks::{ChunkMeshGenerationResult, ChunkMeshGenerationTask},
    },
    task_management::{result_channel::ResultChannel, WorkerPool},
};

/// What one update cycle did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Generated columns inserted into the map
    pub terrain_received: usize,
    /// Meshes attached to loaded chunks
    pub meshes_received: usize,
    /// Results dropped because their chunk left the load window or was already handled
    pub stale_dropped: usize,
    /// Failed task results drained
    pub task_failures: usize,
    /// Chunks whose meshes were uploaded
    pub meshes_uploaded: usize,
    /// Chunks whose upload did not fit into the shared buffers
    pub capacity_failures: usize,
    /// Terrain tasks submitted
    pub terrain_dispatched: usize,
    /// Mesh tasks submitted
    pub mesh_dispatched: usize,
    /// Render-window chunks skipped because a neighbour is not loaded yet
    pub mesh_deferred: usize,
    /// Chunks removed from the map
    pub evicted: usize,
}

/// Failed attempts per coordinate for one task kind.
struct FailureTracker {
    kind: &'static str,
    max_attempts: u32,
    failures: HashMap<ChunkCoord, u32>,
}

impl FailureTracker {
    fn new(kind: &'static str, max_attempts: u32) -> Self {
        FailureTracker {
            kind,
            max_attempts,
            failures: HashMap::new(),
        }
    }

    fn record(&mut self, coord: ChunkCoord, reason: &str) {
        let attempts = self.failures.entry(coord).or_insert(0);
        *attempts += 1;
        if *attempts >= self.max_attempts {
            error!(
                "Giving up on {} for chunk {} after {} failed attempts: {}",
                self.kind, coord, attempts, reason
            );
        } else {
            warn!(
                "{} for chunk {} failed (attempt {}/{}): {}",
                self.kind, coord, attempts, self.max_attempts, reason
            );
        }
    }

    fn is_abandoned(&self, coord: &ChunkCoord) -> bool {
        self.failures
            .get(coord)
            .is_some_and(|&attempts| attempts >= self.max_attempts)
    }

    fn forget(&mut self, coord: &ChunkCoord) {
        self.failures.remove(coord);
    }

    fn retain(&mut self, mut keep: impl FnMut(&ChunkCoord) -> bool) {
        self.failures.retain(|coord, _| keep(coord));
    }

    fn abandoned(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<_> = self
            .failures
            .keys()
            .filter(|coord| self.is_abandoned(coord))
            .copied()
            .collect();
        coords.sort();
        coords
    }
}

/// Streams chunks in and out around the viewpoint and feeds meshes to the GPU buffers.
pub struct ChunkManager {
    load_radius: i32,
    render_radius: i32,
    generator: Arc<dyn TerrainGenerator>,
    registry: Arc<BlockRegistry>,
    chunks: BTreeMap<ChunkCoord, Chunk>,
    terrain_pool: WorkerPool<TerrainGenerationTask>,
    mesh_pool: WorkerPool<ChunkMeshGenerationTask>,
    terrain_results: ResultChannel<TerrainGenerationResult>,
    mesh_results: ResultChannel<ChunkMeshGenerationResult>,
    terrain_in_flight: HashSet<ChunkCoord>,
    mesh_in_flight: HashSet<ChunkCoord>,
    /// In-flight mesh tasks whose chunk was invalidated after dispatch
    superseded_meshes: HashSet<ChunkCoord>,
    terrain_failures: FailureTracker,
    mesh_failures: FailureTracker,
    center: Option<ChunkCoord>,
}

impl ChunkManager {
    /// Starts both worker pools.
    ///
    /// # Errors
    ///
    /// [`EngineError::Config`] if `settings` fails validation,
    /// [`EngineError::Io`] if a worker thread cannot be spawned.
    pub fn new(
        settings: &WorldConfig,
        generator: Arc<dyn TerrainGenerator>,
        registry: Arc<BlockRegistry>,
    ) -> Result<Self, EngineError> {
        settings.validate()?;

        let terrain_results = ResultChannel::new();
        let mesh_results = ResultChannel::new();
        let terrain_pool: WorkerPool<TerrainGenerationTask> =
            WorkerPool::for_tasks("terrain", settings.terrain_threads, terrain_results.clone())?;
        let mesh_pool: WorkerPool<ChunkMeshGenerationTask> =
            WorkerPool::for_tasks("mesh", settings.mesh_threads, mesh_results.clone())?;

        info!(
            "Chunk manager using '{}' terrain, load radius {}, render radius {}",
            generator.name(),
            settings.load_radius,
            settings.render_radius
        );

        Ok(ChunkManager {
            load_radius: settings.load_radius as i32,
            render_radius: settings.render_radius as i32,
            generator,
            registry,
            chunks: BTreeMap::new(),
            terrain_pool,
            mesh_pool,
            terrain_results,
            mesh_results,
            terrain_in_flight: HashSet::new(),
            mesh_in_flight: HashSet::new(),
            superseded_meshes: HashSet::new(),
            terrain_failures: FailureTracker::new(
                "terrain generation",
                settings.max_task_attempts,
            ),
            mesh_failures: FailureTracker::new("mesh generation", settings.max_task_attempts),
            center: None,
        })
    }

    /// Runs one streaming cycle for a viewpoint in world space.
    pub fn update(
        &mut self,
        viewpoint: Point3<f32>,
        mesh_manager: &mut MeshManager,
    ) -> UpdateStats {
        let center = ChunkCoord::from_world(viewpoint);
        if self.center != Some(center) {
            debug!("Viewpoint entered chunk {}", center);
            self.center = Some(center);
        }

        let mut stats = UpdateStats::default();
        self.drain_terrain_results(center, &mut stats);
        self.drain_mesh_results(&mut stats);
        self.upload_pending_meshes(mesh_manager, &mut stats);
        self.dispatch_terrain(center, &mut stats);
        self.dispatch_meshing(center, &mut stats);
        self.evict(center, &mut stats);

        trace!("Chunk update at {}: {:?}", center, stats);
        stats
    }

    /// Marks a loaded chunk for remeshing. Its current GPU mesh keeps drawing until the new
    /// one is uploaded.
    ///
    /// # Returns
    /// `false` if the chunk is not loaded.
    pub fn invalidate_mesh(&mut self, coord: ChunkCoord) -> bool {
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return false;
        };
        chunk.invalidate_mesh();
        if self.mesh_in_flight.contains(&coord) {
            self.superseded_meshes.insert(coord);
        }
        self.mesh_failures.forget(&coord);
        true
    }

    /// The loaded chunk at `coord`.
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    /// All loaded chunks in coordinate order.
    pub fn loaded_chunks(&self) -> &BTreeMap<ChunkCoord, Chunk> {
        &self.chunks
    }

    /// Whether `coord` is in the loaded map.
    pub fn is_loaded(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// Coordinates with an outstanding terrain task.
    pub fn terrain_in_flight(&self) -> &HashSet<ChunkCoord> {
        &self.terrain_in_flight
    }

    /// Coordinates with an outstanding mesh task.
    pub fn mesh_in_flight(&self) -> &HashSet<ChunkCoord> {
        &self.mesh_in_flight
    }

    /// Terrain results waiting to be drained.
    pub fn pending_terrain_results(&self) -> usize {
        self.terrain_results.len()
    }

    /// Mesh results waiting to be drained.
    pub fn pending_mesh_results(&self) -> usize {
        self.mesh_results.len()
    }

    /// Coordinates whose terrain failed too often to be retried, in coordinate order.
    pub fn abandoned_terrain(&self) -> Vec<ChunkCoord> {
        self.terrain_failures.abandoned()
    }

    /// Coordinates whose meshing failed too often to be retried, in coordinate order.
    pub fn abandoned_meshes(&self) -> Vec<ChunkCoord> {
        self.mesh_failures.abandoned()
    }

    /// Chebyshev radius of the load window.
    pub fn load_radius(&self) -> i32 {
        self.load_radius
    }

    /// Chebyshev radius of the render window.
    pub fn render_radius(&self) -> i32 {
        self.render_radius
    }

    /// Chunk containing the viewpoint of the last update.
    pub fn center(&self) -> Option<ChunkCoord> {
        self.center
    }

    /// Discards queued tasks, then stops and joins both pools. Calling it again has no
    /// effect.
    ///
    /// Results of tasks that were already running are dropped with their channels' contents.
    pub fn shutdown(&mut self) {
        let discarded = self.terrain_pool.clear_queue() + self.mesh_pool.clear_queue();
        self.terrain_pool.shutdown();
        self.mesh_pool.shutdown();
        self.terrain_pool.join();
        self.mesh_pool.join();

        let dropped = self.terrain_results.drain().len() + self.mesh_results.drain().len();
        self.terrain_in_flight.clear();
        self.mesh_in_flight.clear();
        self.superseded_meshes.clear();

        if discarded + dropped > 0 {
            debug!(
                "Chunk manager stopped: {} queued task(s) discarded, {} result(s) dropped",
                discarded, dropped
            );
        }
    }

    /// Removes every loaded chunk, releasing its GPU mesh handles.
    ///
    /// # Returns
    /// The number of chunks removed.
    pub fn unload_all(&mut self) -> usize {
        let unloaded = self.chunks.len();
        self.chunks.clear();
        unloaded
    }

    fn in_window(coord: &ChunkCoord, center: &ChunkCoord, radius: i32) -> bool {
        coord.chebyshev_distance(center) <= radius
    }

    fn drain_terrain_results(&mut self, center: ChunkCoord, stats: &mut UpdateStats) {
        for result in self.terrain_results.drain() {
            let coord = result.coord();
            self.terrain_in_flight.remove(&coord);

            match result {
                TerrainGenerationResult::Generated(voxels) => {
                    if !Self::in_window(&coord, &center, self.load_radius) {
                        debug!("Dropping terrain for chunk {} outside the load window", coord);
                        stats.stale_dropped += 1;
                    } else if self.chunks.contains_key(&coord) {
                        debug!("Dropping duplicate terrain for loaded chunk {}", coord);
                        stats.stale_dropped += 1;
                    } else {
                        self.terrain_failures.forget(&coord);
                        self.chunks.insert(coord, Chunk::new(voxels));
                        stats.terrain_received += 1;
                    }
                }
                TerrainGenerationResult::Failed { reason, .. } => {
                    stats.task_failures += 1;
                    self.terrain_failures.record(coord, &reason);
                }
            }
        }
    }

    fn drain_mesh_results(&mut self, stats: &mut UpdateStats) {
        for result in self.mesh_results.drain() {
            let coord = result.coord();
            self.mesh_in_flight.remove(&coord);

            if self.superseded_meshes.remove(&coord) {
                debug!("Dropping superseded mesh for chunk {}", coord);
                stats.stale_dropped += 1;
                continue;
            }

            match result {
                ChunkMeshGenerationResult::Generated { meshes, .. } => {
                    match self.chunks.get_mut(&coord) {
                        Some(chunk) => {
                            chunk.set_pending_mesh(meshes);
                            self.mesh_failures.forget(&coord);
                            stats.meshes_received += 1;
                        }
                        None => {
                            debug!("Dropping mesh for unloaded chunk {}", coord);
                            stats.stale_dropped += 1;
                        }
                    }
                }
                ChunkMeshGenerationResult::Failed { reason, .. } => {
                    stats.task_failures += 1;
                    if self.chunks.contains_key(&coord) {
                        self.mesh_failures.record(coord, &reason);
                    }
                }
            }
        }
    }

    fn upload_pending_meshes(&mut self, mesh_manager: &mut MeshManager, stats: &mut UpdateStats) {
        for chunk in self.chunks.values_mut() {
            if chunk.mesh_state() != MeshState::DirtyMesh {
                continue;
            }
            let Some(meshes) = chunk.pending_mesh() else {
                continue;
            };

            let mut upload = mesh_manager.upload_chunk(meshes);
            // A remesh may only fit into the space its predecessor holds.
            if upload.is_err() && chunk.release_gpu_mesh() {
                debug!("Released old mesh of chunk {} to make room", chunk.coord());
                if let Some(meshes) = chunk.pending_mesh() {
                    upload = mesh_manager.upload_chunk(meshes);
                }
            }

            match upload {
                Ok(gpu_mesh) => {
                    chunk.attach_gpu_mesh(gpu_mesh);
                    stats.meshes_uploaded += 1;
                }
                Err(err) => {
                    warn!("Upload of chunk {} deferred: {}", chunk.coord(), err);
                    stats.capacity_failures += 1;
                }
            }
        }
    }

    fn dispatch_terrain(&mut self, center: ChunkCoord, stats: &mut UpdateStats) {
        let mut coords: Vec<ChunkCoord> = center
            .square_around(self.load_radius)
            .filter(|coord| {
                !self.chunks.contains_key(coord)
                    && !self.terrain_in_flight.contains(coord)
                    && !self.terrain_failures.is_abandoned(coord)
            })
            .collect();
        if coords.is_empty() {
            return;
        }
        coords.sort_by_key(|coord| coord.chebyshev_distance(&center));

        let tasks = coords
            .iter()
            .map(|&coord| {
                TerrainGenerationTask::new(coord, self.generator.clone(), self.registry.clone())
            })
            .collect();

        if self.terrain_pool.submit_batch(tasks) {
            stats.terrain_dispatched += coords.len();
            self.terrain_in_flight.extend(coords);
        } else {
            warn!("Terrain pool rejected {} task(s)", coords.len());
        }
    }

    fn dispatch_meshing(&mut self, center: ChunkCoord, stats: &mut UpdateStats) {
        let mut coords = Vec::new();
        let mut tasks = Vec::new();

        for coord in center.square_around(self.render_radius) {
            let Some(chunk) = self.chunks.get(&coord) else {
                continue;
            };
            if chunk.mesh_state() != MeshState::NoMesh
                || self.mesh_in_flight.contains(&coord)
                || self.mesh_failures.is_abandoned(&coord)
            {
                continue;
            }

            match self.mesh_input(coord) {
                Some(input) => {
                    coords.push(coord);
                    tasks.push(ChunkMeshGenerationTask::new(input, self.registry.clone()));
                }
                None => stats.mesh_deferred += 1,
            }
        }

        if tasks.is_empty() {
            return;
        }
        if self.mesh_pool.submit_batch(tasks) {
            stats.mesh_dispatched += coords.len();
            self.mesh_in_flight.extend(coords);
        } else {
            warn!("Mesh pool rejected {} task(s)", coords.len());
        }
    }

    /// The chunk and its four neighbours, or `None` if any of them is not loaded.
    fn mesh_input(&self, coord: ChunkCoord) -> Option<ChunkMeshInput> {
        let voxels = |coord: ChunkCoord| {
            self.chunks
                .get(&coord)
                .map(|chunk| chunk.voxels().clone())
        };
        let [north, south, east, west] = coord.neighbors();

        Some(ChunkMeshInput {
            main: voxels(coord)?,
            north: voxels(north)?,
            south: voxels(south)?,
            east: voxels(east)?,
            west: voxels(west)?,
        })
    }

    fn evict(&mut self, center: ChunkCoord, stats: &mut UpdateStats) {
        let load_radius = self.load_radius;
        let before = self.chunks.len();
        self.chunks
            .retain(|coord, _| Self::in_window(coord, &center, load_radius));
        stats.evicted = before - self.chunks.len();

        self.terrain_failures
            .retain(|coord| Self::in_window(coord, &center, load_radius));
        self.mesh_failures
            .retain(|coord| Self::in_window(coord, &center, load_radius));

        if stats.evicted > 0 {
            debug!("Evicted {} chunk(s) around {}", stats.evicted, center);
        }
    }
}

impl Drop for ChunkManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::{
        buffer_state::MeshBuffers,
        rendering::vertex::TerrainVertex,
        voxels::{
            chunk::ChunkVoxels,
            terrain::{SuperFlatTerrainGenerator, TerrainKind},
        },
    };
    use parking_lot::{Condvar, Mutex};
    use std::{
        thread,
        time::{Duration, Instant},
    };

    fn config(load_radius: u32, render_radius: u32) -> WorldConfig {
        WorldConfig {
            load_radius,
            render_radius,
            terrain: TerrainKind::SuperFlat,
            max_task_attempts: 2,
            vertex_buffer_size: 1 << 20,
            index_buffer_size: 1 << 20,
            ..Default::default()
        }
    }

    fn mesh_manager(config: &WorldConfig) -> MeshManager {
        MeshManager::new(
            &TerrainVertex::desc(),
            MeshBuffers::cpu(config),
            config.vertex_min_block_size,
            config.index_min_block_size,
        )
        .unwrap()
    }

    fn manager_with(config: &WorldConfig, generator: Arc<dyn TerrainGenerator>) -> ChunkManager {
        ChunkManager::new(config, generator, Arc::new(BlockRegistry::builtin())).unwrap()
    }

    fn viewpoint(x: i32, z: i32) -> Point3<f32> {
        Point3::new(x as f32 * 16.0 + 8.0, 80.0, z as f32 * 16.0 + 8.0)
    }

    fn wait_until(what: &str, done: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(20);
        while !done() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::sleep(Duration::from_millis(2));
        }
    }

    /// Flat terrain that blocks until the gate opens.
    struct GatedFlat {
        open: Mutex<bool>,
        opened: Condvar,
    }

    impl GatedFlat {
        fn new() -> Arc<Self> {
            Arc::new(GatedFlat {
                open: Mutex::new(false),
                opened: Condvar::new(),
            })
        }

        fn open(&self) {
            *self.open.lock() = true;
            self.opened.notify_all();
        }
    }

    impl TerrainGenerator for GatedFlat {
        fn name(&self) -> &'static str {
            "gated"
        }

        fn generate_for(&self, voxels: &mut ChunkVoxels, registry: &BlockRegistry) {
            let mut open = self.open.lock();
            while !*open {
                self.opened.wait(&mut open);
            }
            drop(open);
            SuperFlatTerrainGenerator.generate_for(voxels, registry);
        }
    }

    /// Flat terrain that panics for one column.
    struct FailsAt(ChunkCoord);

    impl TerrainGenerator for FailsAt {
        fn name(&self) -> &'static str {
            "fails-at"
        }

        fn generate_for(&self, voxels: &mut ChunkVoxels, registry: &BlockRegistry) {
            if voxels.coord() == self.0 {
                panic!("cannot generate {}", self.0);
            }
            SuperFlatTerrainGenerator.generate_for(voxels, registry);
        }
    }

    #[test]
    fn test_render_radius_must_fit_load_radius() {
        let result = ChunkManager::new(
            &config(1, 2),
            TerrainKind::SuperFlat.create(0),
            Arc::new(BlockRegistry::builtin()),
        );
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_no_duplicate_dispatch_under_movement() {
        let config = config(1, 0);
        let gate = GatedFlat::new();
        let mut mesh_manager = mesh_manager(&config);
        let mut manager = manager_with(&config, gate.clone());

        let mut dispatched = 0;
        for (x, z) in [(0, 0), (1, 0), (0, 0), (0, 1), (0, 0), (1, 0)] {
            let stats = manager.update(viewpoint(x, z), &mut mesh_manager);
            dispatched += stats.terrain_dispatched;
            assert_eq!(stats.mesh_dispatched, 0);
        }

        // Union of the windows around (0,0), (1,0) and (0,1).
        assert_eq!(dispatched, 15);
        assert_eq!(manager.terrain_in_flight().len(), 15);

        gate.open();
        wait_until("terrain", || manager.pending_terrain_results() == 15);
        let stats = manager.update(viewpoint(1, 0), &mut mesh_manager);
        assert_eq!(stats.terrain_received, 9);
        assert_eq!(stats.stale_dropped, 6);
        assert_eq!(stats.terrain_dispatched, 0);
        assert!(manager.terrain_in_flight().is_empty());
    }

    #[test]
    fn test_meshing_waits_for_all_neighbors() {
        let config = config(1, 1);
        let mut mesh_manager = mesh_manager(&config);
        let mut manager = manager_with(&config, TerrainKind::SuperFlat.create(0));

        let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(stats.terrain_dispatched, 9);
        assert_eq!(stats.mesh_dispatched, 0);

        wait_until("terrain", || manager.pending_terrain_results() == 9);
        let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(stats.terrain_received, 9);
        // Only the centre has all four neighbours inside the load window.
        assert_eq!(stats.mesh_dispatched, 1);
        assert_eq!(stats.mesh_deferred, 8);
        assert!(manager.mesh_in_flight().contains(&ChunkCoord::new(0, 0)));

        wait_until("mesh", || manager.pending_mesh_results() == 1);
        let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(stats.meshes_received, 1);
        assert_eq!(stats.meshes_uploaded, 1);
        assert_eq!(stats.mesh_dispatched, 0);

        let chunk = manager.chunk(ChunkCoord::new(0, 0)).unwrap();
        assert_eq!(chunk.mesh_state(), MeshState::HaveMesh);
        assert!(chunk.subchunk_mesh(0).is_some_and(|mesh| mesh.solid.is_some()));
        assert_eq!(mesh_manager.live_handles(), 1);
    }

    #[test]
    fn test_invalidated_chunk_is_remeshed_and_old_handles_released() {
        let config = config(1, 0);
        let mut mesh_manager = mesh_manager(&config);
        let mut manager = manager_with(&config, TerrainKind::SuperFlat.create(0));
        let origin = ChunkCoord::new(0, 0);

        manager.update(viewpoint(0, 0), &mut mesh_manager);
        wait_until("terrain", || manager.pending_terrain_results() == 9);
        manager.update(viewpoint(0, 0), &mut mesh_manager);
        wait_until("mesh", || manager.pending_mesh_results() == 1);
        manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(mesh_manager.live_handles(), 1);

        assert!(manager.invalidate_mesh(origin));
        assert!(!manager.invalidate_mesh(ChunkCoord::new(7, 7)));
        assert_eq!(manager.chunk(origin).unwrap().mesh_state(), MeshState::NoMesh);
        assert!(manager.chunk(origin).unwrap().gpu_mesh().is_some());

        let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(stats.mesh_dispatched, 1);
        wait_until("remesh", || manager.pending_mesh_results() == 1);
        let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(stats.meshes_uploaded, 1);
        assert_eq!(mesh_manager.live_handles(), 1);

        assert_eq!(manager.unload_all(), 9);
        assert_eq!(mesh_manager.live_handles(), 0);
    }

    #[test]
    fn test_capacity_failure_keeps_mesh_pending() {
        let config = WorldConfig {
            vertex_buffer_size: 4096,
            vertex_min_block_size: 1024,
            ..config(1, 0)
        };
        let mut mesh_manager = mesh_manager(&config);
        let mut manager = manager_with(&config, TerrainKind::SuperFlat.create(0));

        manager.update(viewpoint(0, 0), &mut mesh_manager);
        wait_until("terrain", || manager.pending_terrain_results() == 9);
        manager.update(viewpoint(0, 0), &mut mesh_manager);
        wait_until("mesh", || manager.pending_mesh_results() == 1);

        for _ in 0..2 {
            let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
            assert_eq!(stats.capacity_failures, 1);
            assert_eq!(stats.mesh_dispatched, 0);
        }
        let chunk = manager.chunk(ChunkCoord::new(0, 0)).unwrap();
        assert_eq!(chunk.mesh_state(), MeshState::DirtyMesh);
        assert!(chunk.pending_mesh().is_some());
        assert_eq!(mesh_manager.live_handles(), 0);
    }

    #[test]
    fn test_remesh_reuses_space_of_replaced_mesh() {
        // Each buffer holds exactly one block, enough for one flat column.
        let config = WorldConfig {
            vertex_buffer_size: 1 << 16,
            vertex_min_block_size: 1 << 16,
            index_buffer_size: 1 << 16,
            index_min_block_size: 1 << 16,
            ..config(1, 0)
        };
        let mut mesh_manager = mesh_manager(&config);
        let mut manager = manager_with(&config, TerrainKind::SuperFlat.create(0));
        let origin = ChunkCoord::new(0, 0);

        manager.update(viewpoint(0, 0), &mut mesh_manager);
        wait_until("terrain", || manager.pending_terrain_results() == 9);
        manager.update(viewpoint(0, 0), &mut mesh_manager);
        wait_until("mesh", || manager.pending_mesh_results() == 1);
        let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(stats.meshes_uploaded, 1);
        assert_eq!(mesh_manager.live_handles(), 1);

        assert!(manager.invalidate_mesh(origin));
        let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(stats.mesh_dispatched, 1);
        wait_until("remesh", || manager.pending_mesh_results() == 1);

        let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(stats.meshes_uploaded, 1);
        assert_eq!(stats.capacity_failures, 0);
        assert_eq!(manager.chunk(origin).unwrap().mesh_state(), MeshState::HaveMesh);
        assert_eq!(mesh_manager.live_handles(), 1);
    }

    #[test]
    fn test_mesh_result_for_evicted_chunk_is_dropped() {
        let config = config(1, 0);
        let mut mesh_manager = mesh_manager(&config);
        let mut manager = manager_with(&config, TerrainKind::SuperFlat.create(0));
        let origin = ChunkCoord::new(0, 0);
        let far = ChunkCoord::new(10, 10);

        manager.update(viewpoint(0, 0), &mut mesh_manager);
        wait_until("terrain", || manager.pending_terrain_results() == 9);
        let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(stats.mesh_dispatched, 1);
        wait_until("mesh", || manager.pending_mesh_results() == 1);

        // The window moves away before the finished mesh is drained.
        let mut stats = UpdateStats::default();
        manager.evict(far, &mut stats);
        assert_eq!(stats.evicted, 9);
        assert!(manager.mesh_in_flight().contains(&origin));

        let stats = manager.update(viewpoint(10, 10), &mut mesh_manager);
        assert_eq!(stats.stale_dropped, 1);
        assert_eq!(stats.meshes_received, 0);
        assert!(!manager.is_loaded(origin));
        assert!(manager.mesh_in_flight().is_empty());
        assert_eq!(mesh_manager.live_handles(), 0);
    }

    #[test]
    fn test_invalidate_while_meshing_drops_superseded_result() {
        let config = config(1, 0);
        let mut mesh_manager = mesh_manager(&config);
        let mut manager = manager_with(&config, TerrainKind::SuperFlat.create(0));
        let origin = ChunkCoord::new(0, 0);

        manager.update(viewpoint(0, 0), &mut mesh_manager);
        wait_until("terrain", || manager.pending_terrain_results() == 9);
        let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(stats.mesh_dispatched, 1);

        assert!(manager.invalidate_mesh(origin));
        wait_until("superseded mesh", || manager.pending_mesh_results() == 1);

        let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(stats.stale_dropped, 1);
        assert_eq!(stats.meshes_received, 0);
        assert_eq!(stats.mesh_dispatched, 1);
        assert_eq!(manager.chunk(origin).unwrap().mesh_state(), MeshState::NoMesh);
        assert!(manager.mesh_in_flight().contains(&origin));

        wait_until("fresh mesh", || manager.pending_mesh_results() == 1);
        let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(stats.meshes_uploaded, 1);
        assert_eq!(manager.chunk(origin).unwrap().mesh_state(), MeshState::HaveMesh);
    }

    #[test]
    fn test_failed_terrain_is_retried_then_abandoned() {
        let config = config(0, 0);
        let origin = ChunkCoord::new(0, 0);
        let mut mesh_manager = mesh_manager(&config);
        let mut manager = manager_with(&config, Arc::new(FailsAt(origin)));

        let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(stats.terrain_dispatched, 1);

        wait_until("first failure", || manager.pending_terrain_results() == 1);
        let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(stats.task_failures, 1);
        assert_eq!(stats.terrain_dispatched, 1);
        assert!(manager.abandoned_terrain().is_empty());

        wait_until("second failure", || manager.pending_terrain_results() == 1);
        let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(stats.task_failures, 1);
        assert_eq!(stats.terrain_dispatched, 0);
        assert_eq!(manager.abandoned_terrain(), vec![origin]);
        assert!(manager.terrain_in_flight().is_empty());
        assert!(!manager.is_loaded(origin));

        // Leaving the load window forgets the failures.
        manager.update(viewpoint(5, 5), &mut mesh_manager);
        assert!(manager.abandoned_terrain().is_empty());
    }

    #[test]
    fn test_moving_away_evicts_window_and_drops_late_results() {
        let config = config(3, 1);
        let mut mesh_manager = mesh_manager(&config);
        let mut manager = manager_with(&config, TerrainKind::SuperFlat.create(0));

        let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(stats.terrain_dispatched, 49);
        assert_eq!(stats.mesh_dispatched, 0);

        wait_until("terrain", || manager.pending_terrain_results() == 49);
        let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(stats.terrain_received, 49);
        assert_eq!(stats.mesh_dispatched, 9);

        wait_until("meshes", || manager.pending_mesh_results() == 9);
        manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(mesh_manager.live_handles(), 9);

        let old_window: Vec<_> = ChunkCoord::new(0, 0).square_around(3).collect();
        let stats = manager.update(viewpoint(10, 10), &mut mesh_manager);
        assert_eq!(stats.evicted, 49);
        assert_eq!(stats.terrain_dispatched, 49);
        assert!(old_window.iter().all(|coord| !manager.is_loaded(*coord)));
        assert_eq!(mesh_manager.live_handles(), 0);

        let gate = GatedFlat::new();
        let mut manager = manager_with(&config, gate.clone());
        manager.update(viewpoint(0, 0), &mut mesh_manager);
        manager.update(viewpoint(10, 10), &mut mesh_manager);
        assert_eq!(manager.terrain_in_flight().len(), 98);

        gate.open();
        wait_until("late terrain", || manager.pending_terrain_results() == 98);
        let stats = manager.update(viewpoint(10, 10), &mut mesh_manager);
        assert_eq!(stats.stale_dropped, 49);
        assert_eq!(stats.terrain_received, 49);
        assert!(old_window.iter().all(|coord| !manager.is_loaded(*coord)));
        assert!(manager.terrain_in_flight().is_empty());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let config = config(2, 1);
        let mut mesh_manager = mesh_manager(&config);
        let mut manager = manager_with(&config, TerrainKind::SuperFlat.create(0));
        manager.update(viewpoint(0, 0), &mut mesh_manager);

        manager.shutdown();
        manager.shutdown();
        assert!(manager.terrain_in_flight().is_empty());
        assert_eq!(manager.pending_terrain_results(), 0);

        let stats = manager.update(viewpoint(0, 0), &mut mesh_manager);
        assert_eq!(stats.terrain_dispatched, 0);
    }
}
