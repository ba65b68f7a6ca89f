//! Index math, boundary resolution and the double-buffered dense grid.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::automaton::rules::BoundaryPolicy;
use crate::error::{BoundsError, ConfigurationError};
use crate::state::{CellState, Dimensions, Position};

/// Largest extent accepted on any single axis.
pub const MAX_AXIS: u32 = 2048;

/// Largest total cell count accepted for one grid.
pub const MAX_CELLS: usize = 1 << 28;

/// Energy given to cells placed by patterns and seeding.
pub const DEFAULT_ENERGY: u8 = 100;

/// The 26 offsets of the 3D Moore neighborhood, z-major.
pub const MOORE_OFFSETS: [Position; 26] = moore_offsets();

const fn moore_offsets() -> [Position; 26] {
    let mut out = [Position::ORIGIN; 26];
    let mut n = 0;
    let mut dz = -1;
    while dz <= 1 {
        let mut dy = -1;
        while dy <= 1 {
            let mut dx = -1;
            while dx <= 1 {
                if !(dx == 0 && dy == 0 && dz == 0) {
                    out[n] = Position::new(dx, dy, dz);
                    n += 1;
                }
                dx += 1;
            }
            dy += 1;
        }
        dz += 1;
    }
    out
}

/// Check extents against the non-zero and capacity rules.
pub fn validate_dimensions(dims: Dimensions) -> Result<(), ConfigurationError> {
    if dims.is_empty() {
        return Err(ConfigurationError::InvalidDimensions(dims));
    }
    let too_wide = dims.width > MAX_AXIS || dims.height > MAX_AXIS || dims.depth > MAX_AXIS;
    if too_wide || dims.cell_count() > MAX_CELLS {
        return Err(ConfigurationError::CapacityExceeded {
            dimensions: dims,
            max_axis: MAX_AXIS,
            max_cells: MAX_CELLS,
        });
    }
    Ok(())
}

/// Calculate the linear index for an in-range coordinate.
#[inline]
pub fn index_of(dims: Dimensions, x: u32, y: u32, z: u32) -> usize {
    z as usize * dims.height as usize * dims.width as usize
        + y as usize * dims.width as usize
        + x as usize
}

/// Check if a coordinate is within grid bounds.
#[inline]
pub fn in_bounds(dims: Dimensions, pos: Position) -> bool {
    pos.x >= 0
        && pos.y >= 0
        && pos.z >= 0
        && (pos.x as u32) < dims.width
        && (pos.y as u32) < dims.height
        && (pos.z as u32) < dims.depth
}

/// Linear index of `pos`, or `None` when it lies outside the grid.
#[inline]
pub fn checked_index(dims: Dimensions, pos: Position) -> Option<usize> {
    in_bounds(dims, pos).then(|| index_of(dims, pos.x as u32, pos.y as u32, pos.z as u32))
}

/// Inverse of [`index_of`].
#[inline]
pub fn position_of(dims: Dimensions, index: usize) -> Position {
    let w = dims.width as usize;
    let plane = w * dims.height as usize;
    let z = index / plane;
    let rem = index % plane;
    Position::new((rem % w) as i32, (rem / w) as i32, z as i32)
}

/// Resolve the neighbor of `pos` at `offset` under `boundary`.
///
/// Toroidal wraps every axis with a non-negative modulo, so on axes of
/// extent 1 or 2 the same cell (or the cell itself) can be reached through
/// several offsets and is counted once per offset. DeadBounded returns
/// `None` for anything outside the grid.
#[inline]
pub fn resolve_neighbor(
    dims: Dimensions,
    pos: Position,
    offset: Position,
    boundary: BoundaryPolicy,
) -> Option<usize> {
    let target = pos + offset;
    match boundary {
        BoundaryPolicy::Toroidal => {
            let x = target.x.rem_euclid(dims.width as i32) as u32;
            let y = target.y.rem_euclid(dims.height as i32) as u32;
            let z = target.z.rem_euclid(dims.depth as i32) as u32;
            Some(index_of(dims, x, y, z))
        }
        BoundaryPolicy::DeadBounded => checked_index(dims, target),
    }
}

/// Indices picked alive by a seeded Bernoulli draw over the whole volume,
/// in ascending order. Both engines seed through this so equal seeds give
/// equal live sets.
pub(crate) fn seeded_live_indices(dims: Dimensions, density: f64, seed: u64) -> Vec<usize> {
    let density = density.clamp(0.0, 1.0);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..dims.cell_count())
        .filter(|_| rng.gen::<f64>() < density)
        .collect()
}

/// Dense double-buffered cell storage.
///
/// `current` holds the committed generation. `next` is scratch space that
/// the stepping kernel fills completely before [`Grid::commit`] swaps the
/// two. `population` always equals the number of alive cells in `current`.
#[derive(Clone, Debug)]
pub struct Grid {
    dims: Dimensions,
    current: Vec<CellState>,
    next: Vec<CellState>,
    generation: u64,
    population: usize,
}

impl Grid {
    /// Allocate two all-dead buffers.
    pub fn new(dims: Dimensions) -> Result<Self, ConfigurationError> {
        validate_dimensions(dims)?;
        let size = dims.cell_count();
        Ok(Grid {
            dims,
            current: vec![CellState::DEAD; size],
            next: vec![CellState::DEAD; size],
            generation: 0,
            population: 0,
        })
    }

    #[inline]
    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn population(&self) -> usize {
        self.population
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.current.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// The committed generation.
    #[inline]
    pub fn cells(&self) -> &[CellState] {
        &self.current
    }

    /// Committed cells for reading plus the scratch buffer for writing.
    pub(crate) fn split_buffers(&mut self) -> (&[CellState], &mut [CellState]) {
        (&self.current, &mut self.next)
    }

    fn bounds_error(&self, pos: Position) -> BoundsError {
        BoundsError {
            position: pos,
            dimensions: self.dims,
        }
    }

    pub fn get(&self, pos: Position) -> Result<CellState, BoundsError> {
        checked_index(self.dims, pos)
            .map(|idx| self.current[idx])
            .ok_or_else(|| self.bounds_error(pos))
    }

    #[inline]
    pub fn is_alive(&self, pos: Position) -> bool {
        checked_index(self.dims, pos).is_some_and(|idx| self.current[idx].alive)
    }

    /// Overwrite one committed cell, keeping `population` in step.
    pub fn set(&mut self, pos: Position, cell: CellState) -> Result<(), BoundsError> {
        let idx = checked_index(self.dims, pos).ok_or_else(|| self.bounds_error(pos))?;
        self.set_index(idx, cell);
        Ok(())
    }

    pub(crate) fn set_index(&mut self, idx: usize, cell: CellState) {
        let was = self.current[idx].alive;
        self.current[idx] = cell;
        match (was, cell.alive) {
            (false, true) => self.population += 1,
            (true, false) => self.population -= 1,
            _ => {}
        }
    }

    /// Zero both buffers and the counters.
    pub fn clear(&mut self) {
        self.current.fill(CellState::DEAD);
        self.next.fill(CellState::DEAD);
        self.generation = 0;
        self.population = 0;
    }

    /// Swap buffer roles after `next` has been fully written.
    pub(crate) fn commit(&mut self, population: usize) {
        std::mem::swap(&mut self.current, &mut self.next);
        self.generation += 1;
        self.population = population;
    }

    /// Count alive cells from scratch and store the result.
    pub fn recount_population(&mut self) -> usize {
        self.population = self.current.iter().filter(|c| c.alive).count();
        self.population
    }

    /// Positions of all alive cells in ascending index order.
    pub fn live_positions(&self) -> Vec<Position> {
        self.current
            .iter()
            .enumerate()
            .filter(|(_, c)| c.alive)
            .map(|(i, _)| position_of(self.dims, i))
            .collect()
    }

    /// One bool per cell of the committed generation.
    pub fn alive_mask(&self) -> Vec<bool> {
        self.current.iter().map(|c| c.alive).collect()
    }

    /// Bytes held by both buffers, and the share of allocated capacity in use.
    pub fn buffer_usage(&self) -> (usize, f64) {
        let cell = std::mem::size_of::<CellState>();
        let used = (self.current.len() + self.next.len()) * cell;
        let capacity = (self.current.capacity() + self.next.capacity()) * cell;
        let efficiency = if capacity == 0 {
            0.0
        } else {
            used as f64 / capacity as f64 * 100.0
        };
        (used, efficiency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_grid() {
        let grid = Grid::new(Dimensions::cube(8)).unwrap();
        assert_eq!(grid.dimensions(), Dimensions::cube(8));
        assert_eq!(grid.len(), 512);
        assert_eq!(grid.generation(), 0);
        assert_eq!(grid.population(), 0);
        assert!(grid.cells().iter().all(|c| !c.alive));
    }

    #[test]
    fn test_validate_dimensions() {
        assert!(matches!(
            validate_dimensions(Dimensions::new(0, 4, 4)),
            Err(ConfigurationError::InvalidDimensions(_))
        ));
        assert!(matches!(
            validate_dimensions(Dimensions::new(2049, 1, 1)),
            Err(ConfigurationError::CapacityExceeded { .. })
        ));
        // Every axis in range but the volume is too large.
        assert!(matches!(
            validate_dimensions(Dimensions::new(2048, 2048, 128)),
            Err(ConfigurationError::CapacityExceeded { .. })
        ));
        assert!(validate_dimensions(Dimensions::new(2048, 1, 1)).is_ok());
    }

    #[test]
    fn test_index_of() {
        let dims = Dimensions::cube(4);

        // First cell
        assert_eq!(index_of(dims, 0, 0, 0), 0);
        // Last cell
        assert_eq!(index_of(dims, 3, 3, 3), 63);
        assert_eq!(index_of(dims, 1, 0, 0), 1);
        assert_eq!(index_of(dims, 0, 1, 0), 4);
        assert_eq!(index_of(dims, 0, 0, 1), 16);
    }

    #[test]
    fn test_position_of_inverts_index_of() {
        let dims = Dimensions::new(3, 5, 7);
        for idx in 0..dims.cell_count() {
            let pos = position_of(dims, idx);
            assert_eq!(checked_index(dims, pos), Some(idx));
        }
    }

    #[test]
    fn test_in_bounds() {
        let dims = Dimensions::cube(4);

        assert!(in_bounds(dims, Position::new(0, 0, 0)));
        assert!(in_bounds(dims, Position::new(3, 3, 3)));
        assert!(in_bounds(dims, Position::new(2, 2, 2)));

        assert!(!in_bounds(dims, Position::new(-1, 0, 0)));
        assert!(!in_bounds(dims, Position::new(4, 0, 0)));
        assert!(!in_bounds(dims, Position::new(0, -1, 0)));
        assert!(!in_bounds(dims, Position::new(0, 4, 0)));
        assert!(!in_bounds(dims, Position::new(0, 0, -1)));
        assert!(!in_bounds(dims, Position::new(0, 0, 4)));
    }

    #[test]
    fn test_moore_offsets() {
        assert_eq!(MOORE_OFFSETS.len(), 26);
        assert!(!MOORE_OFFSETS.contains(&Position::ORIGIN));
        let mut sorted = MOORE_OFFSETS.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 26, "offsets must be distinct");
    }

    #[test]
    fn test_resolve_neighbor_wraps_and_clips() {
        let dims = Dimensions::cube(5);
        let corner = Position::ORIGIN;
        let back = Position::new(-1, -1, -1);

        assert_eq!(
            resolve_neighbor(dims, corner, back, BoundaryPolicy::Toroidal),
            Some(index_of(dims, 4, 4, 4))
        );
        assert_eq!(
            resolve_neighbor(dims, corner, back, BoundaryPolicy::DeadBounded),
            None
        );
        assert_eq!(
            resolve_neighbor(dims, corner, Position::new(1, 0, 0), BoundaryPolicy::DeadBounded),
            Some(1)
        );
    }

    #[test]
    fn test_single_cell_axis_wraps_onto_itself() {
        let dims = Dimensions::new(1, 3, 3);
        let pos = Position::new(0, 1, 1);
        let idx = resolve_neighbor(dims, pos, Position::new(1, 0, 0), BoundaryPolicy::Toroidal);
        assert_eq!(idx, checked_index(dims, pos));
    }

    #[test]
    fn test_set_tracks_population() {
        let mut grid = Grid::new(Dimensions::cube(4)).unwrap();
        let pos = Position::new(1, 2, 3);

        grid.set(pos, CellState::spawned(50)).unwrap();
        grid.set(pos, CellState::spawned(60)).unwrap();
        assert_eq!(grid.population(), 1);
        assert_eq!(grid.get(pos).unwrap().energy, 60);

        grid.set(pos, CellState::DEAD).unwrap();
        assert_eq!(grid.population(), 0);

        let err = grid.set(Position::new(4, 0, 0), CellState::spawned(1));
        assert!(err.is_err());
        assert!(grid.get(Position::new(0, 0, -1)).is_err());
    }

    #[test]
    fn test_commit_swaps_buffers() {
        let mut grid = Grid::new(Dimensions::cube(2)).unwrap();
        {
            let (_, next) = grid.split_buffers();
            next[3] = CellState::spawned(9);
        }
        grid.commit(1);
        assert_eq!(grid.generation(), 1);
        assert_eq!(grid.population(), 1);
        assert!(grid.cells()[3].alive);
        assert_eq!(grid.recount_population(), 1);
    }

    #[test]
    fn test_seeded_live_indices_are_reproducible() {
        let dims = Dimensions::cube(6);
        let a = seeded_live_indices(dims, 0.3, 7);
        let b = seeded_live_indices(dims, 0.3, 7);
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
        assert!(seeded_live_indices(dims, 0.0, 7).is_empty());
        assert_eq!(seeded_live_indices(dims, 1.0, 7).len(), dims.cell_count());
    }
}
