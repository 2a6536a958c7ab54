//! # Helios Core Library
//!
//! A plant and radiation simulation engine built around a single scene container,
//! the [`Context`](core::context::Context), and a family of physical plugin models
//! that read and write per-primitive data stored in it.
//!
//! ## Architectural Philosophy
//!
//! The library is split into two layers:
//!
//! - **[`core`]: The Foundation.** Geometry value types, the ray-casting BVH, the
//!   scene context (primitives, compound objects, typed data, date/time and
//!   timeseries), and model file I/O.
//!
//! - **[`plugins`]: The Models.** Radiation transport, photosynthesis, stomatal
//!   conductance, surface energy balance, boundary-layer conductance, solar
//!   position, sky-view factors, procedural plant architecture, Weber-Penn trees
//!   and a headless visualizer. Each plugin is gated behind a Cargo feature of
//!   the same name and communicates with the others only through primitive data
//!   (for example, the radiation model writes `radiation_flux_PAR`, which the
//!   photosynthesis model reads).

pub mod core;
pub mod plugins;
