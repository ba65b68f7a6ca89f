//! Rule analysis on private grid copies.
//!
//! Every classifier takes the caller's engine by shared reference, copies it
//! with [`GridEngine::detached_clone`] and runs the copy. The caller's state,
//! metrics and listeners are never touched.

use std::collections::BTreeMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::measures;
use crate::automaton::engine::GridEngine;
use crate::automaton::rules::{RuleSet, SimulationParams};
use crate::error::{AnalysisError, StepError};
use crate::state::Dimensions;

/// Horizons and thresholds for the heuristic classifiers.
///
/// The direction and speed thresholds and the window lengths are empirical;
/// tune them per rule family rather than treating them as exact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Generations simulated by `analyze_rule`, and the horizon for the
    /// stability and growth scores.
    pub generations: u32,
    pub max_oscillator_period: u32,
    pub stability_window: u32,
    pub spaceship_window: u32,
    /// Minimum cosine between consecutive centroid displacements.
    pub direction_threshold: f64,
    /// Largest allowed change in displacement length between generations.
    pub speed_tolerance: f64,
    pub growth_window: u32,
    pub growth_threshold: f64,
    pub chaos_entropy_threshold: f64,
    /// Chebyshev radius for the interaction score.
    pub interaction_radius: u32,
    pub initial_density: f64,
    pub seed: u64,
    pub worker_count: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            generations: 100,
            max_oscillator_period: 20,
            stability_window: 5,
            spaceship_window: 10,
            direction_threshold: 0.9,
            speed_tolerance: 0.1,
            growth_window: 10,
            growth_threshold: 0.1,
            chaos_entropy_threshold: 0.7,
            interaction_radius: 5,
            initial_density: 0.2,
            seed: 12345,
            worker_count: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PatternCategory {
    Stable,
    Oscillator,
    Spaceship,
    Growing,
    Dying,
    Chaotic,
}

/// Bucketed share of a category's appearances in which the state was also
/// stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StabilityClass {
    HighlyStable,
    ModeratelyStable,
    Unstable,
    HighlyUnstable,
}

impl StabilityClass {
    pub fn from_score(score: f64) -> Self {
        if score > 0.8 {
            StabilityClass::HighlyStable
        } else if score > 0.5 {
            StabilityClass::ModeratelyStable
        } else if score > 0.2 {
            StabilityClass::Unstable
        } else {
            StabilityClass::HighlyUnstable
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub rule: String,
    pub dimensions: Dimensions,
    pub stability: f64,
    pub growth_rate: f64,
    pub complexity: f64,
    /// Population before each simulated generation.
    pub population_history: Vec<usize>,
    /// Distinct categories in the order they were first seen.
    pub observed_patterns: Vec<PatternCategory>,
    /// Generations in which each category was seen.
    pub pattern_frequencies: BTreeMap<PatternCategory, u32>,
}

#[derive(Clone, Debug, Default)]
pub struct RuleAnalyzer {
    config: AnalyzerConfig,
}

impl RuleAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        RuleAnalyzer { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Seed a fresh grid under `rules`, simulate it for the configured
    /// horizon and summarize what happened.
    pub fn analyze_rule(
        &self,
        rules: &RuleSet,
        dims: Dimensions,
    ) -> Result<AnalysisResult, AnalysisError> {
        let cfg = &self.config;
        let mut engine =
            GridEngine::with_workers(SimulationParams::with_rules(rules.clone()), cfg.worker_count)?;
        engine.initialize(dims)?;
        engine.randomize(cfg.initial_density, cfg.seed);

        let mut history = Vec::with_capacity(cfg.generations as usize);
        let mut observed = Vec::new();
        let mut frequencies = BTreeMap::new();
        for _ in 0..cfg.generations {
            history.push(engine.live_cell_count());
            engine.step()?;
            for category in self.identify_patterns(&engine)? {
                if !observed.contains(&category) {
                    observed.push(category);
                }
                *frequencies.entry(category).or_insert(0) += 1;
            }
        }

        let result = AnalysisResult {
            rule: rules.name.clone(),
            dimensions: dims,
            stability: self.calculate_stability(&engine)?,
            growth_rate: self.calculate_growth_rate(&engine)?,
            complexity: self.calculate_complexity(&engine),
            population_history: history,
            observed_patterns: observed,
            pattern_frequencies: frequencies,
        };
        info!(
            rule = %result.rule,
            %dims,
            stability = result.stability,
            growth_rate = result.growth_rate,
            complexity = result.complexity,
            "rule analysis complete"
        );
        Ok(result)
    }

    /// Every category the current state exhibits.
    pub fn identify_patterns(
        &self,
        engine: &GridEngine,
    ) -> Result<Vec<PatternCategory>, AnalysisError> {
        let cfg = &self.config;
        let mut found = Vec::new();
        if self.is_stable(engine, cfg.stability_window)? {
            found.push(PatternCategory::Stable);
        }
        if self.is_oscillator(engine, cfg.max_oscillator_period)? {
            found.push(PatternCategory::Oscillator);
        }
        if self.is_spaceship(engine)? {
            found.push(PatternCategory::Spaceship);
        }
        let growth = self.growth_over(engine, cfg.growth_window)?;
        if growth > cfg.growth_threshold {
            found.push(PatternCategory::Growing);
        } else if growth < -cfg.growth_threshold {
            found.push(PatternCategory::Dying);
        }
        if self.calculate_entropy(engine) > cfg.chaos_entropy_threshold {
            found.push(PatternCategory::Chaotic);
        }
        debug!(generation = engine.generation(), ?found, "patterns identified");
        Ok(found)
    }

    /// True if the current live set comes back within `max_generations`
    /// steps. A still life returns true after the first step.
    pub fn is_stable(&self, engine: &GridEngine, max_generations: u32) -> Result<bool, AnalysisError> {
        let mut trial = engine.detached_clone();
        let initial = alive_mask(&trial);
        for _ in 0..max_generations {
            trial.step()?;
            if alive_mask(&trial) == initial {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// True if any state within `max_period` steps repeats an earlier one.
    /// Still lifes count as period-1 oscillators.
    pub fn is_oscillator(&self, engine: &GridEngine, max_period: u32) -> Result<bool, AnalysisError> {
        Ok(self.oscillation_period(engine, max_period)?.is_some())
    }

    /// Distance between the first repeated state and its earlier copy.
    pub fn oscillation_period(
        &self,
        engine: &GridEngine,
        max_period: u32,
    ) -> Result<Option<u32>, AnalysisError> {
        let mut trial = engine.detached_clone();
        let mut history = vec![alive_mask(&trial)];
        for _ in 0..max_period {
            trial.step()?;
            let state = alive_mask(&trial);
            if let Some(at) = history.iter().position(|s| *s == state) {
                return Ok(Some((history.len() - at) as u32));
            }
            history.push(state);
        }
        Ok(None)
    }

    /// True when the live centroid moves with near-constant velocity over
    /// the spaceship window.
    pub fn is_spaceship(&self, engine: &GridEngine) -> Result<bool, AnalysisError> {
        let cfg = &self.config;
        let mut trial = engine.detached_clone();
        let mut centers = Vec::with_capacity(cfg.spaceship_window as usize);
        for _ in 0..cfg.spaceship_window {
            if let Some(c) = trial.grid().and_then(measures::centroid) {
                centers.push(c);
            }
            trial.step()?;
        }
        if centers.len() < 3 {
            return Ok(false);
        }

        let moves: Vec<DVec3> = centers.windows(2).map(|w| w[1] - w[0]).collect();
        if moves.iter().any(|m| m.length() == 0.0) {
            return Ok(false);
        }
        Ok(moves.windows(2).all(|pair| {
            let (a, b) = (pair[0], pair[1]);
            let cos = a.normalize().dot(b.normalize());
            cos >= cfg.direction_threshold && (a.length() - b.length()).abs() <= cfg.speed_tolerance
        }))
    }

    /// Normalized 2x2x2 block entropy of the current state.
    pub fn calculate_entropy(&self, engine: &GridEngine) -> f64 {
        engine.grid().map_or(0.0, measures::block_entropy)
    }

    /// Population steadiness over the configured horizon, in `[0, 1]`.
    pub fn calculate_stability(&self, engine: &GridEngine) -> Result<f64, AnalysisError> {
        let series = population_series(engine, self.config.generations)?;
        let total = engine.dimensions().map_or(0, |d| d.cell_count());
        Ok(measures::stability_score(&series, total))
    }

    /// Relative population change per generation over the configured
    /// horizon.
    pub fn calculate_growth_rate(&self, engine: &GridEngine) -> Result<f64, AnalysisError> {
        self.growth_over(engine, self.config.generations)
    }

    fn growth_over(&self, engine: &GridEngine, generations: u32) -> Result<f64, AnalysisError> {
        let series = population_series(engine, generations)?;
        Ok(measures::growth_rate(&series, generations))
    }

    pub fn calculate_complexity(&self, engine: &GridEngine) -> f64 {
        engine.grid().map_or(0.0, measures::complexity)
    }

    /// For every category seen over the configured horizon, the fraction
    /// of those generations in which the state was also stable within the
    /// stability window.
    pub fn pattern_stability_scores(
        &self,
        engine: &GridEngine,
    ) -> Result<BTreeMap<PatternCategory, f64>, AnalysisError> {
        let cfg = &self.config;
        let mut trial = engine.detached_clone();
        let mut tally: BTreeMap<PatternCategory, (u32, u32)> = BTreeMap::new();
        for _ in 0..cfg.generations {
            let found = self.identify_patterns(&trial)?;
            if !found.is_empty() {
                let stable = self.is_stable(&trial, cfg.stability_window)?;
                for category in found {
                    let (seen, held) = tally.entry(category).or_insert((0, 0));
                    *seen += 1;
                    *held += stable as u32;
                }
            }
            trial.step()?;
        }
        Ok(tally
            .into_iter()
            .map(|(category, (seen, held))| (category, held as f64 / seen as f64))
            .collect())
    }

    pub fn classify_pattern_stability(
        &self,
        engine: &GridEngine,
    ) -> Result<BTreeMap<PatternCategory, StabilityClass>, AnalysisError> {
        let classes: BTreeMap<_, _> = self
            .pattern_stability_scores(engine)?
            .into_iter()
            .map(|(category, score)| (category, StabilityClass::from_score(score)))
            .collect();
        debug!(generation = engine.generation(), ?classes, "pattern stability classified");
        Ok(classes)
    }

    /// How often each category shows up in the next `horizon` generations,
    /// as a fraction of `horizon`. Most likely first; ties keep category
    /// order. Empty for a zero horizon.
    pub fn predict_pattern_evolution(
        &self,
        engine: &GridEngine,
        horizon: u32,
    ) -> Result<Vec<(PatternCategory, f64)>, AnalysisError> {
        if horizon == 0 {
            return Ok(Vec::new());
        }
        let mut trial = engine.detached_clone();
        let mut counts: BTreeMap<PatternCategory, u32> = BTreeMap::new();
        for _ in 0..horizon {
            trial.step()?;
            for category in self.identify_patterns(&trial)? {
                *counts.entry(category).or_insert(0) += 1;
            }
        }
        let mut predictions: Vec<(PatternCategory, f64)> = counts
            .into_iter()
            .map(|(category, n)| (category, n as f64 / horizon as f64))
            .collect();
        predictions.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(predictions)
    }

    /// Mean [`measures::interaction_density`] over the configured horizon,
    /// starting with the current state.
    pub fn pattern_interaction_score(&self, engine: &GridEngine) -> Result<f64, AnalysisError> {
        let cfg = &self.config;
        let generations = cfg.generations.max(1);
        let mut trial = engine.detached_clone();
        let mut total = 0.0;
        for i in 0..generations {
            let grid = trial.grid().ok_or(StepError::Uninitialized)?;
            total += measures::interaction_density(grid, cfg.interaction_radius);
            if i + 1 < generations {
                trial.step()?;
            }
        }
        Ok(total / generations as f64)
    }
}

fn alive_mask(engine: &GridEngine) -> Vec<bool> {
    engine.grid().map(|g| g.alive_mask()).unwrap_or_default()
}

/// Population before each of `generations` steps of a private copy.
fn population_series(engine: &GridEngine, generations: u32) -> Result<Vec<usize>, AnalysisError> {
    let mut trial = engine.detached_clone();
    let mut series = Vec::with_capacity(generations as usize);
    for _ in 0..generations {
        series.push(trial.live_cell_count());
        trial.step()?;
    }
    Ok(series)
}
