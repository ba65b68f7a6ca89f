//! Pattern load/save and dense region extraction and import.

use crate::automaton::grid::{checked_index, index_of, Grid, DEFAULT_ENERGY};
use crate::state::{CellState, Dimensions, Position};

/// Half-open box `[min, max)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub min: Position,
    pub max: Position,
}

/// A region clipped to a grid, in unsigned grid coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClampedRegion {
    pub min: [u32; 3],
    pub max: [u32; 3],
}

impl ClampedRegion {
    pub fn volume(&self) -> usize {
        (0..3)
            .map(|a| (self.max[a] - self.min[a]) as usize)
            .product()
    }

    /// The min corner as a grid coordinate.
    pub fn origin(&self) -> Position {
        Position::new(self.min[0] as i32, self.min[1] as i32, self.min[2] as i32)
    }

    pub fn contains(&self, pos: Position) -> bool {
        let axes = [pos.x, pos.y, pos.z];
        (0..3).all(|a| {
            u32::try_from(axes[a]).is_ok_and(|v| v >= self.min[a] && v < self.max[a])
        })
    }

    /// Every coordinate inside, z slowest and x fastest.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (self.min[2]..self.max[2]).flat_map(move |z| {
            (self.min[1]..self.max[1]).flat_map(move |y| {
                (self.min[0]..self.max[0])
                    .map(move |x| Position::new(x as i32, y as i32, z as i32))
            })
        })
    }
}

impl Region {
    pub const fn new(min: Position, max: Position) -> Self {
        Region { min, max }
    }

    /// The whole of a grid.
    pub fn full(dims: Dimensions) -> Self {
        Region::new(
            Position::ORIGIN,
            Position::new(dims.width as i32, dims.height as i32, dims.depth as i32),
        )
    }

    /// Clip to `dims`; `None` when nothing is left.
    pub fn clamp(&self, dims: Dimensions) -> Option<ClampedRegion> {
        let clip = |v: i32, limit: u32| v.clamp(0, limit as i32) as u32;
        let min = [
            clip(self.min.x, dims.width),
            clip(self.min.y, dims.height),
            clip(self.min.z, dims.depth),
        ];
        let max = [
            clip(self.max.x, dims.width),
            clip(self.max.y, dims.height),
            clip(self.max.z, dims.depth),
        ];
        if (0..3).any(|a| min[a] >= max[a]) {
            return None;
        }
        Some(ClampedRegion { min, max })
    }
}

/// Place every cell of `cells` shifted by `offset` as a fresh live cell.
///
/// Cells landing outside the grid, or whose shifted coordinate does not
/// fit in an `i32`, are skipped. Returns how many were placed.
pub fn load_pattern(grid: &mut Grid, cells: &[Position], offset: Position) -> usize {
    let dims = grid.dimensions();
    let mut placed = 0;
    for &rel in cells {
        let Some(pos) = rel.checked_add(offset) else {
            continue;
        };
        if let Some(idx) = checked_index(dims, pos) {
            grid.set_index(idx, CellState::spawned(DEFAULT_ENERGY));
            placed += 1;
        }
    }
    placed
}

/// Live cells inside `region`, in z,y,x order, relative to the region's
/// min corner after clipping it to the grid.
///
/// For a region that starts inside the grid that corner is `region.min`.
/// Loading the result at the clipped corner reproduces the live set.
pub fn save_pattern(grid: &Grid, region: Region) -> Vec<Position> {
    let Some(clamped) = region.clamp(grid.dimensions()) else {
        return Vec::new();
    };
    let origin = clamped.origin();
    clamped
        .positions()
        .filter(|&p| grid.is_alive(p))
        .filter_map(|p| p.checked_sub(origin))
        .collect()
}

/// Extract a rectangular region into a flat buffer of 0/1 bytes.
///
/// # Layout
/// The buffer is filled in z,y,x order (z changes slowest, x changes fastest).
/// This order matches the order used by [`import_region`].
///
/// # Returns
/// Number of bytes written, or 0 if the region is empty after clamping or
/// the buffer is too small.
pub fn extract_region(grid: &Grid, out_buf: &mut [u8], region: Region) -> u64 {
    let dims = grid.dimensions();
    let Some(clamped) = region.clamp(dims) else {
        return 0;
    };
    let total = clamped.volume();
    if out_buf.len() < total {
        return 0;
    }

    let cells = grid.cells();
    for (slot, p) in out_buf.iter_mut().zip(clamped.positions()) {
        let idx = index_of(dims, p.x as u32, p.y as u32, p.z as u32);
        *slot = cells[idx].alive as u8;
    }
    total as u64
}

/// Import a rectangular region from a flat buffer.
///
/// # Layout
/// The buffer is expected in z,y,x order (matching [`extract_region`]).
/// Input values are normalized: 0 = dead, any non-zero = alive. Cells that
/// are already alive and stay alive keep their age and energy.
///
/// # Returns
/// Number of bytes read, or 0 on error.
pub fn import_region(grid: &mut Grid, in_buf: &[u8], region: Region) -> u64 {
    let dims = grid.dimensions();
    let Some(clamped) = region.clamp(dims) else {
        return 0;
    };
    let total = clamped.volume();
    if in_buf.len() < total {
        return 0;
    }

    for (&value, p) in in_buf.iter().zip(clamped.positions()) {
        let idx = index_of(dims, p.x as u32, p.y as u32, p.z as u32);
        let alive_now = grid.cells()[idx].alive;
        match (value != 0, alive_now) {
            (true, false) => grid.set_index(idx, CellState::spawned(DEFAULT_ENERGY)),
            (false, true) => grid.set_index(idx, CellState::DEAD),
            _ => {}
        }
    }
    total as u64
}
