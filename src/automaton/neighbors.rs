//! Interchangeable neighbor-counting routines.
//!
//! The stepping kernel only needs "how many alive neighbors, and how much
//! energy do they carry" for a cell. Everything behind that question lives
//! here so a faster routine can replace the scalar one without touching
//! buffer management or the worker pool.

use crate::automaton::grid::{resolve_neighbor, MOORE_OFFSETS};
use crate::automaton::rules::BoundaryPolicy;
use crate::state::{CellState, Dimensions, Position};

/// Read-only view over a committed generation.
#[derive(Clone, Copy)]
pub struct GridView<'a> {
    pub dims: Dimensions,
    pub cells: &'a [CellState],
    pub boundary: BoundaryPolicy,
}

/// What one cell sees of its 26 neighbors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Neighborhood {
    pub alive: u8,
    pub energy_sum: u32,
}

impl Neighborhood {
    #[inline]
    fn add(&mut self, cell: &CellState) {
        if cell.alive {
            self.alive += 1;
            self.energy_sum += cell.energy as u32;
        }
    }
}

/// Inner-loop strategy used by the stepping kernel.
///
/// Implementations are called concurrently from every worker and must only
/// read from `view`.
pub trait NeighborCounter: Send + Sync {
    fn name(&self) -> &'static str;

    fn count(&self, view: &GridView<'_>, index: usize, pos: Position) -> Neighborhood;
}

/// Scalar 26-offset walk with per-offset boundary resolution.
#[derive(Clone, Copy, Debug, Default)]
pub struct MooreCounter;

impl NeighborCounter for MooreCounter {
    fn name(&self) -> &'static str {
        "moore"
    }

    fn count(&self, view: &GridView<'_>, _index: usize, pos: Position) -> Neighborhood {
        let mut hood = Neighborhood::default();
        for &offset in MOORE_OFFSETS.iter() {
            if let Some(idx) = resolve_neighbor(view.dims, pos, offset, view.boundary) {
                hood.add(&view.cells[idx]);
            }
        }
        hood
    }
}

/// Flat-offset walk for interior cells.
///
/// Cells at least one step away from every face are counted by adding
/// fixed linear offsets to their index, with no modulo or bounds checks.
/// Face cells go through [`MooreCounter`].
#[derive(Clone, Copy, Debug, Default)]
pub struct FlatOffsetCounter;

impl FlatOffsetCounter {
    #[inline]
    fn is_interior(dims: Dimensions, pos: Position) -> bool {
        pos.x >= 1
            && pos.y >= 1
            && pos.z >= 1
            && (pos.x as u32) + 1 < dims.width
            && (pos.y as u32) + 1 < dims.height
            && (pos.z as u32) + 1 < dims.depth
    }
}

impl NeighborCounter for FlatOffsetCounter {
    fn name(&self) -> &'static str {
        "flat-offset"
    }

    fn count(&self, view: &GridView<'_>, index: usize, pos: Position) -> Neighborhood {
        if !Self::is_interior(view.dims, pos) {
            return MooreCounter.count(view, index, pos);
        }
        let row = view.dims.width as isize;
        let plane = row * view.dims.height as isize;
        let base = index as isize;

        let mut hood = Neighborhood::default();
        for off in MOORE_OFFSETS.iter() {
            let idx = base + off.z as isize * plane + off.y as isize * row + off.x as isize;
            hood.add(&view.cells[idx as usize]);
        }
        hood
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::grid::{index_of, position_of, Grid};

    fn cross_grid() -> Grid {
        let mut grid = Grid::new(Dimensions::cube(8)).unwrap();
        // Center + 4 orthogonal neighbors in the z = 4 plane
        for (x, y) in [(4, 4), (3, 4), (5, 4), (4, 3), (4, 5)] {
            grid.set(Position::new(x, y, 4), CellState::spawned(10)).unwrap();
        }
        grid
    }

    fn count_at(counter: &dyn NeighborCounter, grid: &Grid, boundary: BoundaryPolicy, p: Position) -> Neighborhood {
        let view = GridView {
            dims: grid.dimensions(),
            cells: grid.cells(),
            boundary,
        };
        let idx = index_of(grid.dimensions(), p.x as u32, p.y as u32, p.z as u32);
        counter.count(&view, idx, p)
    }

    #[test]
    fn test_count_neighbors() {
        let grid = cross_grid();
        let c = &MooreCounter;
        let b = BoundaryPolicy::DeadBounded;

        // Center sees the 4 arms
        let hood = count_at(c, &grid, b, Position::new(4, 4, 4));
        assert_eq!(hood.alive, 4);
        assert_eq!(hood.energy_sum, 40);

        // Each arm sees the center and the two adjacent arms
        assert_eq!(count_at(c, &grid, b, Position::new(3, 4, 4)).alive, 3);
        assert_eq!(count_at(c, &grid, b, Position::new(5, 4, 4)).alive, 3);
        assert_eq!(count_at(c, &grid, b, Position::new(4, 3, 4)).alive, 3);
        assert_eq!(count_at(c, &grid, b, Position::new(4, 5, 4)).alive, 3);

        // Directly above the center, all five are in range
        assert_eq!(count_at(c, &grid, b, Position::new(4, 4, 5)).alive, 5);

        assert_eq!(count_at(c, &grid, b, Position::new(0, 0, 0)).alive, 0);
    }

    #[test]
    fn test_wrap_sees_opposite_corner() {
        let mut grid = Grid::new(Dimensions::cube(5)).unwrap();
        grid.set(Position::new(4, 4, 4), CellState::spawned(30)).unwrap();

        let origin = Position::ORIGIN;
        let wrapped = count_at(&MooreCounter, &grid, BoundaryPolicy::Toroidal, origin);
        assert_eq!(wrapped.alive, 1);
        assert_eq!(wrapped.energy_sum, 30);

        let clipped = count_at(&MooreCounter, &grid, BoundaryPolicy::DeadBounded, origin);
        assert_eq!(clipped.alive, 0);
    }

    #[test]
    fn test_tiny_torus_counts_duplicates() {
        // On a 1x1x1 torus every offset wraps back onto the cell itself.
        let mut grid = Grid::new(Dimensions::cube(1)).unwrap();
        grid.set(Position::ORIGIN, CellState::spawned(1)).unwrap();
        let hood = count_at(&MooreCounter, &grid, BoundaryPolicy::Toroidal, Position::ORIGIN);
        assert_eq!(hood.alive, 26);
    }

    #[test]
    fn test_flat_offset_matches_moore() {
        let dims = Dimensions::new(6, 5, 7);
        let mut grid = Grid::new(dims).unwrap();
        for idx in (0..dims.cell_count()).filter(|i| i % 3 == 0 || i % 7 == 1) {
            grid.set(position_of(dims, idx), CellState::spawned((idx % 200) as u8))
                .unwrap();
        }

        for boundary in [BoundaryPolicy::Toroidal, BoundaryPolicy::DeadBounded] {
            for idx in 0..dims.cell_count() {
                let p = position_of(dims, idx);
                assert_eq!(
                    count_at(&FlatOffsetCounter, &grid, boundary, p),
                    count_at(&MooreCounter, &grid, boundary, p),
                    "mismatch at {p} under {boundary:?}"
                );
            }
        }
    }
}
