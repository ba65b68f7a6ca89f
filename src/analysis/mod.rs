//! Rule analysis: classifying what a rule does to a seeded grid.
//!
//! The analyzer never touches the caller's engine; it steps a detached
//! clone so a live simulation keeps its generation.

pub mod analyzer;
pub mod measures;
pub mod worker;

pub use analyzer::{AnalysisResult, AnalyzerConfig, PatternCategory, RuleAnalyzer, StabilityClass};
pub use worker::{AnalysisOutcome, AnalysisRequest, AnalysisWorker};
