//! Engine creation, destruction, sizing and counters.

use tracing::warn;

use crate::automaton::engine::GridEngine;
use crate::automaton::rules::SimulationParams;
use crate::ffi::{VL_INVALID_ARGUMENT, VL_NULL_POINTER, VL_OK};
use crate::state::Dimensions;

/// Creates a new engine with default parameters and returns an opaque pointer.
///
/// `workers == 0` uses the detected parallelism.
///
/// # Returns
/// A pointer to a new engine, or null if the worker pool could not be built.
///
/// # Safety
/// The returned pointer must eventually be freed with `vl_destroy()`.
#[no_mangle]
pub extern "C" fn vl_create(workers: u32) -> *mut GridEngine {
    match GridEngine::with_workers(SimulationParams::default(), workers as usize) {
        Ok(engine) => Box::into_raw(Box::new(engine)),
        Err(err) => {
            warn!(%err, "vl_create failed");
            std::ptr::null_mut()
        }
    }
}

/// Destroys an engine and frees its memory.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by `vl_create()`, or null
/// - `ptr` must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn vl_destroy(ptr: *mut GridEngine) {
    if !ptr.is_null() {
        drop(Box::from_raw(ptr));
    }
}

/// Allocates (or reallocates) an all-dead grid of the given size.
///
/// # Safety
/// - `ptr` must be a valid pointer to an engine, or null
///
/// # Returns
/// `VL_OK`, `VL_NULL_POINTER`, or `VL_INVALID_ARGUMENT` for zero, negative
/// or over-capacity extents.
#[no_mangle]
pub unsafe extern "C" fn vl_initialize(
    ptr: *mut GridEngine,
    width: i16,
    height: i16,
    depth: i16,
) -> i32 {
    if ptr.is_null() {
        return VL_NULL_POINTER;
    }
    if width <= 0 || height <= 0 || depth <= 0 {
        return VL_INVALID_ARGUMENT;
    }

    let engine = &mut *ptr;
    let dims = Dimensions::new(width as u32, height as u32, depth as u32);
    match engine.initialize(dims) {
        Ok(()) => VL_OK,
        Err(_) => VL_INVALID_ARGUMENT,
    }
}

/// Gets the current generation counter.
///
/// # Safety
/// - `ptr` must be a valid pointer to an engine, or null
///
/// # Returns
/// The generation counter, or 0 if ptr is null.
#[no_mangle]
pub unsafe extern "C" fn vl_get_generation(ptr: *const GridEngine) -> u64 {
    if ptr.is_null() {
        return 0;
    }
    (*ptr).generation()
}

/// Gets the number of live cells.
///
/// # Safety
/// - `ptr` must be a valid pointer to an engine, or null
///
/// # Returns
/// The population, or 0 if ptr is null or the grid is uninitialized.
#[no_mangle]
pub unsafe extern "C" fn vl_get_population(ptr: *const GridEngine) -> u64 {
    if ptr.is_null() {
        return 0;
    }
    (*ptr).live_cell_count() as u64
}

/// Kills every cell and sets the generation back to 0.
///
/// # Safety
/// - `ptr` must be a valid pointer to an engine, or null
#[no_mangle]
pub unsafe extern "C" fn vl_reset(ptr: *mut GridEngine) {
    if ptr.is_null() {
        return;
    }
    (*ptr).reset_simulation();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn test_create_and_destroy() {
        unsafe {
            let engine = vl_create(1);
            assert!(!engine.is_null());

            // Should not crash
            vl_destroy(engine);
        }
    }

    #[test]
    fn test_initial_counters() {
        unsafe {
            let engine = vl_create(1);
            assert_eq!(vl_get_generation(engine), 0);
            assert_eq!(vl_get_population(engine), 0);
            vl_destroy(engine);
        }
    }

    #[test]
    fn test_initialize() {
        unsafe {
            let engine = vl_create(2);
            assert_eq!(vl_initialize(engine, 8, 8, 8), VL_OK);
            assert_eq!((*engine).dimensions(), Some(Dimensions::cube(8)));

            assert_eq!(vl_initialize(engine, 0, 8, 8), VL_INVALID_ARGUMENT);
            assert_eq!(vl_initialize(engine, 8, -1, 8), VL_INVALID_ARGUMENT);
            assert_eq!(vl_initialize(engine, 4096, 1, 1), VL_INVALID_ARGUMENT);
            // A rejected resize leaves the previous grid in place
            assert_eq!((*engine).dimensions(), Some(Dimensions::cube(8)));

            vl_destroy(engine);
        }
    }

    #[test]
    fn test_null_pointer_handling() {
        unsafe {
            vl_destroy(ptr::null_mut());
            assert_eq!(vl_initialize(ptr::null_mut(), 4, 4, 4), VL_NULL_POINTER);
            assert_eq!(vl_get_generation(ptr::null()), 0);
            assert_eq!(vl_get_population(ptr::null()), 0);
            vl_reset(ptr::null_mut());
        }
    }
}
