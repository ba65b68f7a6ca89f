//! Core cell, coordinate and extent types.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// The state of a single cell.
///
/// Dead cells always carry `age == 0` and `energy == 0`. `neighbor_count`
/// is rewritten for every cell on every generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CellState {
    pub alive: bool,
    pub age: u32,
    pub energy: u8,
    pub neighbor_count: u8,
}

impl CellState {
    /// A dead cell with no cached neighbors.
    pub const DEAD: CellState = CellState {
        alive: false,
        age: 0,
        energy: 0,
        neighbor_count: 0,
    };

    /// A freshly placed live cell (age 1).
    pub fn spawned(energy: u8) -> Self {
        CellState {
            alive: true,
            age: 1,
            energy,
            neighbor_count: 0,
        }
    }
}

/// A signed 3D grid coordinate.
///
/// Signed so that neighbor offsets and out-of-range requests can be
/// expressed without wrapping.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0, y: 0, z: 0 };

    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Position { x, y, z }
    }

    /// Component-wise sum, `None` if any axis overflows.
    pub fn checked_add(self, rhs: Position) -> Option<Position> {
        Some(Position::new(
            self.x.checked_add(rhs.x)?,
            self.y.checked_add(rhs.y)?,
            self.z.checked_add(rhs.z)?,
        ))
    }

    /// Component-wise difference, `None` if any axis overflows.
    pub fn checked_sub(self, rhs: Position) -> Option<Position> {
        Some(Position::new(
            self.x.checked_sub(rhs.x)?,
            self.y.checked_sub(rhs.y)?,
            self.z.checked_sub(rhs.z)?,
        ))
    }
}

impl Add for Position {
    type Output = Position;

    #[inline]
    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Position {
    type Output = Position;

    #[inline]
    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Grid extents along each axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Dimensions {
    #[inline]
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Dimensions {
            width,
            height,
            depth,
        }
    }

    /// Shorthand for an `n x n x n` cube.
    pub const fn cube(n: u32) -> Self {
        Dimensions::new(n, n, n)
    }

    /// Total number of cells. Saturates instead of overflowing so that
    /// capacity checks on absurd extents stay well-defined.
    pub fn cell_count(&self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(self.depth as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.depth == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.depth)
    }
}
