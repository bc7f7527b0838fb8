//! # Voxel Task System
//!
//! Tasks related to world generation, run on the terrain worker pool.

pub mod terrain_generation_task;

pub use terrain_generation_task::{TerrainGenerationResult, TerrainGenerationTask};
