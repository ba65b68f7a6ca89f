//! Voxel Life - 3D cellular automata kernel.
//!
//! Two engines share one rule model: [`GridEngine`] keeps a dense
//! double-buffered grid and steps it in parallel chunks on a rayon pool,
//! [`SparseGridEngine`] keeps only live cells. [`RuleAnalyzer`] classifies
//! rules by running them on a detached copy of a grid.
//!
//! The `ffi` module exposes a C ABI for host applications.

pub mod analysis;
pub mod automaton;
pub mod config;
pub mod error;
pub mod ffi;
pub mod metrics;
pub mod state;


pub use analysis::{
    AnalysisResult, AnalysisWorker, AnalyzerConfig, PatternCategory, RuleAnalyzer, StabilityClass,
};
pub use automaton::{
    BoundaryPolicy, GridEngine, NeighborSet, Pattern, Region, RuleSet, SimulationParams,
    SparseGridEngine,
};
pub use config::EngineConfig;
pub use error::{AnalysisError, BoundsError, ConfigError, ConfigurationError, StepError};
pub use metrics::{MetricsSnapshot, PerformanceMetrics};
pub use state::{CellState, Dimensions, Position};
