//! Region extraction and import FFI functions.

use crate::automaton::engine::GridEngine;
use crate::automaton::region::Region;
use crate::state::Position;

/// Byte length of the half-open box, or 0 if any axis is empty.
fn box_volume(min: [i16; 3], max: [i16; 3]) -> usize {
    (0..3)
        .map(|axis| (max[axis] as i32 - min[axis] as i32).max(0) as usize)
        .product()
}

fn region_of(min: [i16; 3], max: [i16; 3]) -> Region {
    Region::new(
        Position::new(min[0] as i32, min[1] as i32, min[2] as i32),
        Position::new(max[0] as i32, max[1] as i32, max[2] as i32),
    )
}

/// Extracts a rectangular region of cells into a flat output buffer.
///
/// # Layout
/// The buffer is filled in z,y,x order (z changes slowest, x changes fastest).
/// The box is first clamped to the grid; only the clamped cells are written.
/// This matches the layout expected by `vl_import_region`.
///
/// # Safety
/// - `ptr` must be a valid pointer to an engine, or null
/// - `out_buf` must point to a buffer with at least
///   `(max_x - min_x) * (max_y - min_y) * (max_z - min_z)` bytes
///
/// # Returns
/// Number of bytes written, or 0 on error.
#[no_mangle]
pub unsafe extern "C" fn vl_extract_region(
    ptr: *const GridEngine,
    out_buf: *mut u8,
    min_x: i16,
    min_y: i16,
    min_z: i16,
    max_x: i16,
    max_y: i16,
    max_z: i16,
) -> u64 {
    if ptr.is_null() || out_buf.is_null() {
        return 0;
    }

    let engine = &*ptr;
    let (min, max) = ([min_x, min_y, min_z], [max_x, max_y, max_z]);
    let len = box_volume(min, max);
    if len == 0 {
        return 0;
    }

    let buf_slice = std::slice::from_raw_parts_mut(out_buf, len);
    engine.extract_region(buf_slice, region_of(min, max))
}

/// Imports a rectangular region of cells from a flat buffer.
///
/// # Layout
/// The buffer is expected to be in z,y,x order (matching `vl_extract_region`).
/// Input values are normalized: 0 = dead, non-zero = alive.
///
/// # Safety
/// - `ptr` must be a valid pointer to an engine, or null
/// - `in_buf` must point to a buffer with at least
///   `(max_x - min_x) * (max_y - min_y) * (max_z - min_z)` bytes
///
/// # Returns
/// Number of bytes read, or 0 on error.
#[no_mangle]
pub unsafe extern "C" fn vl_import_region(
    ptr: *mut GridEngine,
    in_buf: *const u8,
    min_x: i16,
    min_y: i16,
    min_z: i16,
    max_x: i16,
    max_y: i16,
    max_z: i16,
) -> u64 {
    if ptr.is_null() || in_buf.is_null() {
        return 0;
    }

    let engine = &mut *ptr;
    let (min, max) = ([min_x, min_y, min_z], [max_x, max_y, max_z]);
    let len = box_volume(min, max);
    if len == 0 {
        return 0;
    }

    let buf_slice = std::slice::from_raw_parts(in_buf, len);
    engine.import_region(buf_slice, region_of(min, max))
}
