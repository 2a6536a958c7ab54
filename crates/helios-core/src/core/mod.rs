//! # Core Module
//!
//! Fundamental building blocks shared by every plugin model.
//!
//! - **Geometry** ([`geometry`]) - Vector aliases, spherical coordinates, colors,
//!   transforms and the BVH used for ray casting
//! - **Scene** ([`context`]) - Primitives, compound objects, typed data, time and timeseries
//! - **File I/O** ([`io`]) - OBJ/PLY model exchange and tabular timeseries loading
//! - **Constants** ([`constants`]) - Physical constants used by the models

pub mod constants;
pub mod context;
pub mod geometry;
pub mod io;
