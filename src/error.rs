//! Error taxonomy for the simulation kernel.

use thiserror::Error;

use crate::state::{Dimensions, Position};

/// Setup-time failures: bad extents, capacity, parameters, worker pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("invalid grid dimensions {0}: every axis must be non-zero")]
    InvalidDimensions(Dimensions),

    #[error("grid {dimensions} exceeds capacity ({max_axis} cells per axis, {max_cells} cells total)")]
    CapacityExceeded {
        dimensions: Dimensions,
        max_axis: u32,
        max_cells: usize,
    },

    #[error("invalid simulation parameter: {0}")]
    InvalidParameter(String),

    #[error("worker pool could not be built: {0}")]
    WorkerPool(String),
}

/// A cell access outside the grid. Never fatal.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("position {position} is outside the {dimensions} grid")]
pub struct BoundsError {
    pub position: Position,
    pub dimensions: Dimensions,
}

/// A generation could not be committed. The grid stays at its previous
/// generation when this is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("grid has not been initialized")]
    Uninitialized,

    #[error("worker for chunk {chunk} (cells {start}..{end}) failed: {message}")]
    WorkerFailure {
        chunk: usize,
        start: usize,
        end: usize,
        message: String,
    },
}

/// Failures surfaced by the rule analyzer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Step(#[from] StepError),
}

/// Failures loading or applying an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown rule preset: {0}")]
    UnknownPreset(String),

    #[error(transparent)]
    Invalid(#[from] ConfigurationError),
}

/// Failures of the background analysis worker.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("could not spawn analysis thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("analysis worker has shut down")]
    Disconnected,
}
