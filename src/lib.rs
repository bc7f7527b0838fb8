#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Streamer
//!
//! Streams an unbounded voxel world around a moving viewpoint without blocking the owning
//! thread on terrain generation or meshing.
//!
//! ## Key Modules
//!
//! * `core` - Single-threaded shared resources
//! * `engine_state` - The streaming pipeline: worker pools, chunks, meshing and the shared
//!   GPU buffers
//!
//! ## Architecture
//!
//! Each frame the owning thread drains finished work from two worker pools (terrain and
//! meshing), uploads finished meshes into two large shared buffers through buddy
//! allocators, dispatches new work for the load and render windows around the viewpoint,
//! and evicts chunks that fell out of range.
//!
//! ## Usage
//!
//! ```no_run
//! fn main() {
//!     if let Err(err) = voxel_streamer::run() {
//!         eprintln!("{}", err);
//!     }
//! }
//! ```
//!
//! ## Environment
//!
//! * `RUST_LOG` - log filter
//! * `VOXEL_WORLD_CONFIG` - path to a JSON [`WorldConfig`](engine_state::config::WorldConfig)
//! * `VOXEL_BLOCK_REGISTRY` - path to a JSON block registry

use std::{env, sync::Arc, thread, time::Duration};

use cgmath::Point3;
use log::{info, warn};
use web_time::Instant;

use engine_state::{
    buffer_state::MeshBuffers, config::WorldConfig, error::EngineError,
    voxels::block::BlockRegistry, EngineState,
};

pub mod core;
pub mod engine_state;

/// Environment variable naming a world configuration file
pub const WORLD_CONFIG_ENV: &str = "VOXEL_WORLD_CONFIG";
/// Environment variable naming a block registry file
pub const BLOCK_REGISTRY_ENV: &str = "VOXEL_BLOCK_REGISTRY";

const DEMO_FRAMES: u32 = 600;
const DEMO_SPEED: f32 = 0.5;
const FRAME_TIME: Duration = Duration::from_millis(16);

/// Flies a viewpoint along +X through a freshly generated world, then tears it down.
///
/// Uses GPU buffers on a headless device when one is available, host memory otherwise.
pub fn run() -> Result<(), EngineError> {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    let config = match env::var_os(WORLD_CONFIG_ENV) {
        Some(path) => WorldConfig::from_path(path)?,
        None => WorldConfig::default(),
    };
    let registry = match env::var_os(BLOCK_REGISTRY_ENV) {
        Some(path) => BlockRegistry::from_path(path)?,
        None => BlockRegistry::builtin(),
    };

    let buffers = match pollster::block_on(MeshBuffers::wgpu_headless(&config)) {
        Ok(buffers) => buffers,
        Err(err) => {
            warn!("{}; falling back to host-memory mesh buffers", err);
            MeshBuffers::cpu(&config)
        }
    };

    let mut engine = EngineState::new(config, Arc::new(registry), buffers)?;
    let start = Instant::now();

    for frame in 0..DEMO_FRAMES {
        let viewpoint = Point3::new(frame as f32 * DEMO_SPEED, 100.0, 8.0);
        let stats = engine.update(viewpoint);

        if frame % 60 == 0 {
            info!(
                "Frame {}: {} chunks loaded, {} solid / {} water draws, {} KiB vertex data, {} capacity failures",
                frame,
                stats.loaded_chunks,
                stats.solid_draws,
                stats.water_draws,
                stats.vertex_bytes_in_use / 1024,
                stats.chunks.capacity_failures
            );
        }
        thread::sleep(FRAME_TIME);
    }

    let abandoned =
        engine.chunks().abandoned_terrain().len() + engine.chunks().abandoned_meshes().len();
    if abandoned > 0 {
        warn!("{} chunk(s) were abandoned after repeated failures", abandoned);
    }
    info!("Flew {} frames in {:?}", DEMO_FRAMES, start.elapsed());

    engine.teardown()
}
