//! Per-frame slot pipeline for 2D skeletal armatures.
//!
//! This crate is renderer-agnostic: slots decide what changed and report it through a
//! [`DisplayAdapter`] supplied by the engine integration.

#![forbid(unsafe_code)]

mod error;
mod geometry;
mod model;
mod runtime;
mod transform;

pub use error::*;
pub use geometry::*;
pub use model::*;
pub use runtime::*;
pub use transform::*;
