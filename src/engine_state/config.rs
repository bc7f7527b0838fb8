//! # World Configuration
//!
//! Runtime settings for the streaming world, loaded from JSON. Every field has a default,
//! so a partial file (or `{}`) is valid. Chunk dimensions are compile-time constants in
//! [`chunk`](crate::engine_state::voxels::chunk) and are not configurable.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{error::EngineError, rendering::vertex::TerrainVertex, voxels::terrain::TerrainKind};

/// Largest accepted load radius, in chunks. Window coordinates are computed in `i32`.
pub const MAX_LOAD_RADIUS: u32 = i16::MAX as u32;

/// Settings supplied when the world is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Chebyshev radius, in chunks, of the window kept loaded around the viewpoint
    pub load_radius: u32,
    /// Chebyshev radius, in chunks, of the window that gets meshed; at most `load_radius`
    pub render_radius: u32,
    /// Terrain worker threads
    pub terrain_threads: usize,
    /// Mesh worker threads
    pub mesh_threads: usize,
    /// Terrain strategy
    pub terrain: TerrainKind,
    /// Seed for noise-based terrain
    pub seed: u32,
    /// Failures after which a chunk stops being retried
    pub max_task_attempts: u32,
    /// Shared vertex buffer size in bytes
    pub vertex_buffer_size: u64,
    /// Shared index buffer size in bytes
    pub index_buffer_size: u64,
    /// Smallest vertex-buffer block
    pub vertex_min_block_size: u64,
    /// Smallest index-buffer block
    pub index_min_block_size: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            load_radius: 8,
            render_radius: 6,
            terrain_threads: 2,
            mesh_threads: 2,
            terrain: TerrainKind::Simple,
            seed: 1337,
            max_task_attempts: 3,
            vertex_buffer_size: 1 << 26,
            index_buffer_size: 1 << 25,
            vertex_min_block_size: 1024,
            index_min_block_size: 512,
        }
    }
}

impl WorldConfig {
    /// Loads and validates a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Parses and validates a configuration.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: WorldConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the cross-field constraints the type system does not express.
    ///
    /// # Errors
    /// [`EngineError::Config`] describing the first violated constraint.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.load_radius > MAX_LOAD_RADIUS {
            return Err(EngineError::Config(format!(
                "load_radius {} exceeds {}",
                self.load_radius, MAX_LOAD_RADIUS
            )));
        }
        if self.render_radius > self.load_radius {
            return Err(EngineError::Config(format!(
                "render_radius {} exceeds load_radius {}",
                self.render_radius, self.load_radius
            )));
        }
        if self.terrain_threads == 0 || self.mesh_threads == 0 {
            return Err(EngineError::Config(
                "terrain_threads and mesh_threads must be positive".to_owned(),
            ));
        }
        if self.max_task_attempts == 0 {
            return Err(EngineError::Config(
                "max_task_attempts must be positive".to_owned(),
            ));
        }

        check_buffer(
            "vertex",
            self.vertex_buffer_size,
            self.vertex_min_block_size,
            TerrainVertex::STRIDE,
        )?;
        check_buffer(
            "index",
            self.index_buffer_size,
            self.index_min_block_size,
            std::mem::size_of::<u32>() as u64,
        )
    }
}

fn check_buffer(name: &str, total: u64, min_block: u64, element: u64) -> Result<(), EngineError> {
    if !total.is_power_of_two() || !min_block.is_power_of_two() {
        return Err(EngineError::Config(format!(
            "{} buffer size {} and min block size {} must be powers of two",
            name, total, min_block
        )));
    }
    if min_block > total {
        return Err(EngineError::Config(format!(
            "{} min block size {} exceeds buffer size {}",
            name, min_block, total
        )));
    }
    if min_block % element != 0 {
        return Err(EngineError::Config(format!(
            "{} min block size {} is not a multiple of {}",
            name, min_block, element
        )));
    }
    Ok(())
}
