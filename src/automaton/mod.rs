//! Core automaton logic.
//!
//! `grid` owns the storage and index math, `stepping` the transition and
//! the parallel kernel, `engine` and `sparse` the two simulation engines.
//! The FFI layer in `ffi/` calls into `engine`.

pub mod engine;
pub mod grid;
pub mod neighbors;
pub mod pattern;
pub mod region;
pub mod rules;
pub mod sparse;
pub mod stepping;

pub use engine::GridEngine;
pub use grid::{in_bounds, index_of, Grid, MAX_AXIS, MAX_CELLS};
pub use neighbors::{FlatOffsetCounter, MooreCounter, NeighborCounter};
pub use pattern::Pattern;
pub use region::{extract_region, import_region, Region};
pub use rules::{BoundaryPolicy, NeighborSet, RuleCategory, RuleSet, SimulationParams};
pub use sparse::SparseGridEngine;
pub use stepping::{CellUpdate, StepOutcome};
