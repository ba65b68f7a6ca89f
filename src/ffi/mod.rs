//! C ABI for host applications (renderers, editors, scripting runtimes).
//!
//! Every function is `#[no_mangle] extern "C"` and takes an opaque
//! `GridEngine` pointer from `vl_create`. These are thin wrappers: they
//! handle null checks, pointer safety and C-to-Rust conversions, and
//! return neutral values instead of failing.

pub mod grid;
pub mod lifecycle;
pub mod region;

pub use grid::{vl_get_cell, vl_run, vl_set_cell, vl_set_rule, vl_step};
pub use lifecycle::{
    vl_create, vl_destroy, vl_get_generation, vl_get_population, vl_initialize, vl_reset,
};
pub use region::{vl_extract_region, vl_import_region};

/// Status codes returned by fallible calls.
pub const VL_OK: i32 = 0;
pub const VL_NULL_POINTER: i32 = 1;
pub const VL_INVALID_ARGUMENT: i32 = 2;
pub const VL_STEP_FAILED: i32 = 3;
