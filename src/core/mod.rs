//! # Core Module
//!
//! Resource containers shared across the engine.
//!
//! ## Key Components
//! - `StResource`: Single-threaded reference-counted resource with interior mutability
//! - `StWeak`: Non-owning link to an `StResource`, used by values that must never keep
//!   the resource alive on their own (GPU mesh handles pointing back at their allocators)

pub mod st_resource;

pub use st_resource::{StResource, StWeak};
