//! # Helios Native Interface
//!
//! A flat C-linkage surface over the [`helios`] simulation engine, meant to be
//! loaded by a dynamic host language through its foreign-function interface.
//!
//! ## Conventions
//!
//! - **Handles.** Engine objects are heap-allocated by `create*` calls and handed
//!   out as opaque pointers; each one is released by exactly one matching
//!   `destroy*` call. Plugin handles keep a pointer to the context they were
//!   created with, so the context must be destroyed last.
//! - **Errors.** Nothing unwinds across the boundary. A failed call returns a
//!   sentinel (`0`, `0.0`, `false`, null or untouched outputs) and records a code
//!   and message in thread-local state, read with `getLastErrorCode` and
//!   `getLastErrorMessage`. Every fallible call clears that state on entry.
//! - **Arrays.** Variable-length results are owned by the caller: a pointer plus a
//!   `size_t` count out-parameter, released with the matching `free*` function.
//!   Fixed-size results (points, colors, dates) are written into caller arrays.
//! - **Packing.** Points are 3 floats, sizes 2 floats, colors 3 (RGB) or 4 (RGBA)
//!   floats, rotations `(radius, elevation, azimuth)`.
//! - **Features.** Each plugin group follows a Cargo feature of the same name.
//!   With a feature off its symbols still exist and report code 6.

// Exported functions dereference pointers supplied by C callers.
#![allow(clippy::not_unsafe_ptr_arg_deref)]
#![allow(non_snake_case)]

#[macro_use]
mod macros;

pub mod buffer;
pub mod context;
pub mod error;
pub mod handle;
pub mod logging;

pub mod boundary_layer;
pub mod energy_balance;
pub mod photosynthesis;
pub mod plant_architecture;
pub mod radiation;
pub mod sky_view_factor;
pub mod solar_position;
pub mod stomatal;
pub mod visualizer;
pub mod weber_penn;

pub use error::{ErrorCode, FfiError};

/// Names accepted by `isPluginAvailable` that are compiled into this build.
pub fn available_plugins() -> Vec<&'static str> {
    let mut plugins = Vec::new();
    if cfg!(feature = "radiation") {
        plugins.push("radiation");
    }
    if cfg!(feature = "photosynthesis") {
        plugins.push("photosynthesis");
    }
    if cfg!(feature = "stomatalconductance") {
        plugins.push("stomatalconductance");
    }
    if cfg!(feature = "energybalance") {
        plugins.push("energybalance");
    }
    if cfg!(feature = "plantarchitecture") {
        plugins.push("plantarchitecture");
    }
    if cfg!(feature = "weberpenntree") {
        plugins.push("weberpenntree");
    }
    if cfg!(feature = "solarposition") {
        plugins.push("solarposition");
    }
    if cfg!(feature = "skyviewfactor") {
        plugins.push("skyviewfactor");
    }
    if cfg!(feature = "boundarylayer") {
        plugins.push("boundarylayer");
    }
    if cfg!(feature = "visualizer") {
        plugins.push("visualizer");
    }
    plugins
}
