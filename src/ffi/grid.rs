//! Cell access, stepping and rule selection.

use std::ffi::{c_char, CStr};

use tracing::warn;

use crate::automaton::engine::GridEngine;
use crate::automaton::grid::DEFAULT_ENERGY;
use crate::automaton::rules::{BoundaryPolicy, RuleSet};
use crate::ffi::{VL_INVALID_ARGUMENT, VL_NULL_POINTER, VL_OK, VL_STEP_FAILED};
use crate::state::Position;

/// Sets a cell to alive (non-zero) or dead (0). New cells get the default
/// energy.
///
/// # Safety
/// - `ptr` must be a valid pointer to an engine, or null
///
/// Out-of-bounds coordinates and uninitialized grids are silently ignored.
#[no_mangle]
pub unsafe extern "C" fn vl_set_cell(ptr: *mut GridEngine, x: i16, y: i16, z: i16, alive: u8) {
    if ptr.is_null() {
        return;
    }

    let engine = &mut *ptr;
    let pos = Position::new(x as i32, y as i32, z as i32);
    let _ = engine.set_cell(pos, alive != 0, DEFAULT_ENERGY);
}

/// Gets the state of a cell (0 = dead, 1 = alive).
///
/// # Safety
/// - `ptr` must be a valid pointer to an engine, or null
///
/// # Returns
/// 0 if out of bounds, null pointer, uninitialized or dead; 1 if alive.
#[no_mangle]
pub unsafe extern "C" fn vl_get_cell(ptr: *const GridEngine, x: i16, y: i16, z: i16) -> u8 {
    if ptr.is_null() {
        return 0;
    }

    let engine = &*ptr;
    let pos = Position::new(x as i32, y as i32, z as i32);
    engine.get_cell(pos).map_or(0, |cell| cell.alive as u8)
}

/// Advances the automaton by one generation with the current rule.
///
/// # Safety
/// - `ptr` must be a valid pointer to an engine, or null
///
/// # Returns
/// `VL_OK`, `VL_NULL_POINTER`, or `VL_STEP_FAILED` when the grid is
/// uninitialized or a worker failed. A failed step commits nothing.
#[no_mangle]
pub unsafe extern "C" fn vl_step(ptr: *mut GridEngine) -> i32 {
    if ptr.is_null() {
        return VL_NULL_POINTER;
    }

    match (*ptr).step() {
        Ok(()) => VL_OK,
        Err(_) => VL_STEP_FAILED,
    }
}

/// Advances the automaton by `generations`, stopping at the first failure.
///
/// # Safety
/// - `ptr` must be a valid pointer to an engine, or null
///
/// # Returns
/// Same codes as `vl_step`.
#[no_mangle]
pub unsafe extern "C" fn vl_run(ptr: *mut GridEngine, generations: u32) -> i32 {
    if ptr.is_null() {
        return VL_NULL_POINTER;
    }

    match (*ptr).run_simulation(generations as u64) {
        Ok(()) => VL_OK,
        Err(_) => VL_STEP_FAILED,
    }
}

/// Selects the rule by preset name (`"5766"`) or notation (`"B5-7/S6"`).
///
/// `boundary` is 0 for toroidal, 1 for dead-bounded.
///
/// # Safety
/// - `ptr` must be a valid pointer to an engine, or null
/// - `rule` must be a valid NUL-terminated string, or null
///
/// # Returns
/// `VL_OK`, `VL_NULL_POINTER`, or `VL_INVALID_ARGUMENT` for an unknown
/// rule or boundary. The previous rule stays in effect on failure.
#[no_mangle]
pub unsafe extern "C" fn vl_set_rule(
    ptr: *mut GridEngine,
    rule: *const c_char,
    boundary: u8,
) -> i32 {
    if ptr.is_null() || rule.is_null() {
        return VL_NULL_POINTER;
    }

    let boundary = match boundary {
        0 => BoundaryPolicy::Toroidal,
        1 => BoundaryPolicy::DeadBounded,
        _ => return VL_INVALID_ARGUMENT,
    };
    let Ok(text) = CStr::from_ptr(rule).to_str() else {
        return VL_INVALID_ARGUMENT;
    };
    let rules = match RuleSet::preset(text) {
        Some(rules) => rules,
        None => match RuleSet::parse(text) {
            Ok(rules) => rules,
            Err(err) => {
                warn!(%err, "vl_set_rule rejected rule");
                return VL_INVALID_ARGUMENT;
            }
        },
    };

    (*ptr).set_rule_set(rules.with_boundary(boundary));
    VL_OK
}
