//! Relative live-cell patterns and helpers for moving them around.

use serde::{Deserialize, Serialize};

use crate::automaton::grid::in_bounds;
use crate::error::ConfigurationError;
use crate::state::{Dimensions, Position};

const PACK_BITS: u32 = 10;
const PACK_MASK: u32 = (1 << PACK_BITS) - 1;

/// A set of live cells, relative to an arbitrary origin.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub cells: Vec<Position>,
}

impl Pattern {
    pub fn new(name: impl Into<String>, cells: Vec<Position>) -> Self {
        Pattern {
            name: name.into(),
            description: String::new(),
            cells,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 2x2x2 solid block.
    pub fn block() -> Self {
        let mut cells = Vec::with_capacity(8);
        for z in 0..2 {
            for y in 0..2 {
                for x in 0..2 {
                    cells.push(Position::new(x, y, z));
                }
            }
        }
        Pattern::new("block", cells).with_description("2x2x2 solid block")
    }

    /// Planar plus sign: a center with its four in-plane arms.
    pub fn cross() -> Self {
        let cells = vec![
            Position::new(1, 0, 0),
            Position::new(0, 1, 0),
            Position::new(1, 1, 0),
            Position::new(2, 1, 0),
            Position::new(1, 2, 0),
        ];
        Pattern::new("cross", cells).with_description("Center cell with four in-plane arms")
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Inclusive min and max corners, or `None` for an empty pattern.
    pub fn bounds(&self) -> Option<(Position, Position)> {
        let first = *self.cells.first()?;
        Some(self.cells.iter().fold((first, first), |(lo, hi), p| {
            (
                Position::new(lo.x.min(p.x), lo.y.min(p.y), lo.z.min(p.z)),
                Position::new(hi.x.max(p.x), hi.y.max(p.y), hi.z.max(p.z)),
            )
        }))
    }

    /// Size of the bounding box, saturating at `u32::MAX` per axis; zero
    /// for an empty pattern.
    pub fn extent(&self) -> Dimensions {
        let span = |lo: i32, hi: i32| {
            (i64::from(hi) - i64::from(lo) + 1).min(i64::from(u32::MAX)) as u32
        };
        match self.bounds() {
            Some((lo, hi)) => {
                Dimensions::new(span(lo.x, hi.x), span(lo.y, hi.y), span(lo.z, hi.z))
            }
            None => Dimensions::default(),
        }
    }

    /// Shift so the bounding box starts at the origin. Cells more than
    /// `i32::MAX` past the min corner cannot be represented and are dropped.
    pub fn normalized(&self) -> Pattern {
        let Some((lo, _)) = self.bounds() else {
            return self.clone();
        };
        Pattern {
            cells: self.cells.iter().filter_map(|&p| p.checked_sub(lo)).collect(),
            ..self.clone()
        }
    }

    /// Sort cells z-major, then y, then x, matching grid memory order.
    pub fn sort_for_cache(&mut self) {
        self.cells.sort_by_key(|p| (p.z, p.y, p.x));
    }

    /// True when every cell lies inside a grid of `dims`.
    pub fn fits_within(&self, dims: Dimensions) -> bool {
        self.cells.iter().all(|&p| in_bounds(dims, p))
    }

    /// Pack each cell into one `u32`, 10 bits per axis (z high, x low).
    ///
    /// Every coordinate must be in `0..1024`.
    pub fn compress(&self) -> Result<Vec<u32>, ConfigurationError> {
        self.cells
            .iter()
            .map(|p| {
                let fits = |v: i32| (0..=PACK_MASK as i32).contains(&v);
                if fits(p.x) && fits(p.y) && fits(p.z) {
                    Ok((p.z as u32) << (2 * PACK_BITS) | (p.y as u32) << PACK_BITS | p.x as u32)
                } else {
                    Err(ConfigurationError::InvalidParameter(format!(
                        "cell {p} does not fit in 10-bit packing"
                    )))
                }
            })
            .collect()
    }

    pub fn decompress(packed: &[u32]) -> Vec<Position> {
        packed
            .iter()
            .map(|&v| {
                Position::new(
                    (v & PACK_MASK) as i32,
                    ((v >> PACK_BITS) & PACK_MASK) as i32,
                    ((v >> (2 * PACK_BITS)) & PACK_MASK) as i32,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_and_extent() {
        let p = Pattern::new(
            "l",
            vec![
                Position::new(3, -1, 2),
                Position::new(5, 0, 2),
                Position::new(4, 2, 7),
            ],
        );
        assert_eq!(
            p.bounds(),
            Some((Position::new(3, -1, 2), Position::new(5, 2, 7)))
        );
        assert_eq!(p.extent(), Dimensions::new(3, 4, 6));

        let n = p.normalized();
        assert_eq!(n.bounds().unwrap().0, Position::ORIGIN);
        assert_eq!(n.extent(), p.extent());

        assert_eq!(Pattern::default().bounds(), None);
        assert_eq!(Pattern::default().extent(), Dimensions::default());
    }

    #[test]
    fn test_extreme_coordinates() {
        let wide = Pattern::new(
            "wide",
            vec![Position::new(i32::MIN, 0, 0), Position::new(i32::MAX, 0, 0)],
        );
        assert_eq!(wide.extent(), Dimensions::new(u32::MAX, 1, 1));
        assert_eq!(wide.normalized().cells, vec![Position::ORIGIN]);

        let edge = Pattern::new("edge", vec![Position::new(i32::MAX, -3, 0)]);
        assert_eq!(edge.extent(), Dimensions::new(1, 1, 1));
        assert_eq!(edge.normalized().cells, vec![Position::ORIGIN]);
    }

    #[test]
    fn test_builtins() {
        let block = Pattern::block();
        assert_eq!(block.len(), 8);
        assert_eq!(block.extent(), Dimensions::cube(2));

        let cross = Pattern::cross();
        assert_eq!(cross.len(), 5);
        assert_eq!(cross.extent(), Dimensions::new(3, 3, 1));
        assert!(cross.fits_within(Dimensions::new(3, 3, 1)));
        assert!(!cross.fits_within(Dimensions::new(2, 3, 1)));
    }

    #[test]
    fn test_sort_for_cache() {
        let mut p = Pattern::new(
            "s",
            vec![
                Position::new(0, 0, 1),
                Position::new(1, 1, 0),
                Position::new(0, 1, 0),
                Position::new(2, 0, 0),
            ],
        );
        p.sort_for_cache();
        assert_eq!(
            p.cells,
            vec![
                Position::new(2, 0, 0),
                Position::new(0, 1, 0),
                Position::new(1, 1, 0),
                Position::new(0, 0, 1),
            ]
        );
    }

    #[test]
    fn test_compress_layout() {
        let p = Pattern::new("c", vec![Position::new(1, 2, 3), Position::new(1023, 0, 0)]);
        let packed = p.compress().unwrap();
        assert_eq!(packed[0], (3 << 20) | (2 << 10) | 1);
        assert_eq!(Pattern::decompress(&packed), p.cells);

        let too_far = Pattern::new("f", vec![Position::new(1024, 0, 0)]);
        assert!(too_far.compress().is_err());
        let negative = Pattern::new("n", vec![Position::new(0, -1, 0)]);
        assert!(negative.compress().is_err());
    }
}
