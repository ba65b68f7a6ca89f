//! Live-cell-set engine for large, mostly dead universes.
//!
//! Memory is proportional to population. A step scatters one count from
//! every live cell to each of its resolved neighbors, so only live cells
//! and their neighborhoods are ever visited. Given the same rule and start
//! state, the live set after any number of generations matches the dense
//! engine's.

use std::mem::size_of;

use ahash::{AHashMap, AHashSet};
use tracing::{debug, info};

use crate::automaton::grid::{
    checked_index, position_of, resolve_neighbor, seeded_live_indices, validate_dimensions,
    MOORE_OFFSETS,
};
use crate::automaton::region::Region;
use crate::automaton::rules::RuleSet;
use crate::error::{BoundsError, ConfigurationError, StepError};
use crate::state::{Dimensions, Position};

const AXIS_BITS: u32 = 20;
const AXIS_MASK: u64 = (1 << AXIS_BITS) - 1;

#[inline]
fn pack(pos: Position) -> u64 {
    (pos.z as u64) << (2 * AXIS_BITS) | (pos.y as u64) << AXIS_BITS | pos.x as u64
}

#[inline]
fn unpack(key: u64) -> Position {
    Position::new(
        (key & AXIS_MASK) as i32,
        ((key >> AXIS_BITS) & AXIS_MASK) as i32,
        ((key >> (2 * AXIS_BITS)) & AXIS_MASK) as i32,
    )
}

/// Neighbor counts for one generation, keyed like the live set.
#[derive(Debug, Default)]
struct NeighborMemo {
    generation: u64,
    counts: AHashMap<u64, u8>,
}

impl NeighborMemo {
    /// Drop every count from the previous generation.
    fn begin(&mut self, generation: u64) {
        self.counts.clear();
        self.generation = generation;
    }

    #[inline]
    fn bump(&mut self, key: u64) {
        *self.counts.entry(key).or_insert(0) += 1;
    }

    #[inline]
    fn get(&self, key: u64) -> u8 {
        self.counts.get(&key).copied().unwrap_or(0)
    }
}

#[derive(Debug)]
pub struct SparseGridEngine {
    dims: Option<Dimensions>,
    live: AHashSet<u64>,
    rules: RuleSet,
    generation: u64,
    memo: NeighborMemo,
}

impl SparseGridEngine {
    pub fn new(rules: RuleSet) -> Self {
        SparseGridEngine {
            dims: None,
            live: AHashSet::new(),
            rules,
            generation: 0,
            memo: NeighborMemo::default(),
        }
    }

    pub fn initialize(&mut self, dims: Dimensions) -> Result<(), ConfigurationError> {
        validate_dimensions(dims)?;
        self.dims = Some(dims);
        self.live.clear();
        self.memo.begin(0);
        self.generation = 0;
        info!(%dims, "sparse grid initialized");
        Ok(())
    }

    /// Reinitialize at new extents, discarding every live cell.
    pub fn resize_grid(&mut self, dims: Dimensions) -> Result<(), ConfigurationError> {
        self.initialize(dims)
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dims
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn set_rule_set(&mut self, rules: RuleSet) {
        self.rules = rules;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn population(&self) -> usize {
        self.live.len()
    }

    fn checked(&self, pos: Position) -> Result<Dimensions, BoundsError> {
        let dims = self.dims.unwrap_or_default();
        match checked_index(dims, pos) {
            Some(_) => Ok(dims),
            None => Err(BoundsError {
                position: pos,
                dimensions: dims,
            }),
        }
    }

    pub fn set_cell(&mut self, pos: Position, alive: bool) -> Result<(), BoundsError> {
        self.checked(pos)?;
        if alive {
            self.live.insert(pack(pos));
        } else {
            self.live.remove(&pack(pos));
        }
        Ok(())
    }

    pub fn is_alive(&self, pos: Position) -> Result<bool, BoundsError> {
        self.checked(pos)?;
        Ok(self.live.contains(&pack(pos)))
    }

    /// Live cells sorted z-major, the same order the dense grid reports.
    pub fn live_positions(&self) -> Vec<Position> {
        let mut out: Vec<Position> = self.live.iter().map(|&k| unpack(k)).collect();
        out.sort_by_key(|p| (p.z, p.y, p.x));
        out
    }

    /// Advance exactly one generation.
    pub fn step(&mut self) -> Result<(), StepError> {
        let dims = self.dims.ok_or(StepError::Uninitialized)?;
        let boundary = self.rules.boundary;

        self.memo.begin(self.generation);
        for &key in &self.live {
            let pos = unpack(key);
            for &offset in MOORE_OFFSETS.iter() {
                if let Some(idx) = resolve_neighbor(dims, pos, offset, boundary) {
                    self.memo.bump(pack(position_of(dims, idx)));
                }
            }
        }

        let mut next = AHashSet::with_capacity(self.live.len());
        if self.rules.birth.contains(0) {
            // Isolated dead cells are born too, so every cell is a candidate.
            for idx in 0..dims.cell_count() {
                let key = pack(position_of(dims, idx));
                if self.rules.next_alive(self.live.contains(&key), self.memo.get(key)) {
                    next.insert(key);
                }
            }
        } else {
            for &key in &self.live {
                if self.rules.next_alive(true, self.memo.get(key)) {
                    next.insert(key);
                }
            }
            for (&key, &count) in &self.memo.counts {
                if !self.live.contains(&key) && self.rules.next_alive(false, count) {
                    next.insert(key);
                }
            }
        }

        debug!(
            generation = self.generation + 1,
            population = next.len(),
            candidates = self.memo.counts.len(),
            "sparse step committed"
        );
        self.live = next;
        self.generation += 1;
        Ok(())
    }

    pub fn run_simulation(&mut self, generations: u64) -> Result<(), StepError> {
        for _ in 0..generations {
            self.step()?;
        }
        Ok(())
    }

    pub fn reset_simulation(&mut self) {
        self.live.clear();
        self.memo.begin(0);
        self.generation = 0;
    }

    /// Same seeded fill as the dense engine: equal seeds, equal live sets.
    /// Restarts the generation count at 0.
    pub fn randomize(&mut self, density: f64, seed: u64) -> usize {
        let Some(dims) = self.dims else {
            return 0;
        };
        self.live = seeded_live_indices(dims, density, seed)
            .into_iter()
            .map(|idx| pack(position_of(dims, idx)))
            .collect();
        self.memo.begin(0);
        self.generation = 0;
        self.live.len()
    }

    pub fn load_pattern(&mut self, cells: &[Position], offset: Position) -> usize {
        let Some(dims) = self.dims else {
            return 0;
        };
        let mut placed = 0;
        for &rel in cells {
            let Some(pos) = rel.checked_add(offset) else {
                continue;
            };
            if checked_index(dims, pos).is_some() {
                self.live.insert(pack(pos));
                placed += 1;
            }
        }
        placed
    }

    /// Live cells inside `bounds`, z-major, relative to its min corner
    /// clipped to the grid.
    pub fn save_pattern(&self, bounds: Region) -> Vec<Position> {
        let Some(clamped) = self.dims.and_then(|d| bounds.clamp(d)) else {
            return Vec::new();
        };
        let origin = clamped.origin();
        self.live_positions()
            .into_iter()
            .filter(|&p| clamped.contains(p))
            .filter_map(|p| p.checked_sub(origin))
            .collect()
    }

    /// Approximate heap plus inline footprint in bytes.
    pub fn memory_usage(&self) -> usize {
        size_of::<Self>()
            + self.live.capacity() * size_of::<u64>()
            + self.memo.counts.capacity() * (size_of::<u64>() + size_of::<u8>())
    }
}
