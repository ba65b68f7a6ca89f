//! TOML configuration for the engine and the analyzer.
//!
//! Every section is optional; a missing section takes its defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::AnalyzerConfig;
use crate::automaton::engine::{detected_parallelism, GridEngine};
use crate::automaton::rules::{BoundaryPolicy, NeighborSet, RuleSet, SimulationParams};
use crate::error::{ConfigError, ConfigurationError};
use crate::state::Dimensions;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSection {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Default for GridSection {
    fn default() -> Self {
        GridSection {
            width: 32,
            height: 32,
            depth: 32,
        }
    }
}

/// Either a named preset or explicit birth/survival counts. Explicit
/// counts win when either list is non-empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSection {
    pub preset: String,
    pub birth: Vec<u8>,
    pub survival: Vec<u8>,
    pub boundary: BoundaryPolicy,
}

impl Default for RuleSection {
    fn default() -> Self {
        RuleSection {
            preset: "5766".to_string(),
            birth: Vec::new(),
            survival: Vec::new(),
            boundary: BoundaryPolicy::Toroidal,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSection {
    pub energy_decay_rate: f32,
    pub max_age: u32,
    pub energy_floor: u8,
}

impl Default for SimulationSection {
    fn default() -> Self {
        let params = SimulationParams::default();
        SimulationSection {
            energy_decay_rate: params.energy_decay_rate,
            max_age: params.max_age,
            energy_floor: params.energy_floor,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedSection {
    pub seed: u64,
    pub density: f64,
}

impl Default for SeedSection {
    fn default() -> Self {
        SeedSection {
            seed: 42,
            density: 0.2,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads for the dense engine; detected parallelism if unset.
    pub workers: Option<usize>,
    pub grid: GridSection,
    pub rule: RuleSection,
    pub simulation: SimulationSection,
    pub seed: SeedSection,
    pub analysis: AnalyzerConfig,
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.grid.width, self.grid.height, self.grid.depth)
    }

    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(n) if n > 0 => n,
            _ => detected_parallelism(),
        }
    }

    pub fn rule_set(&self) -> Result<RuleSet, ConfigError> {
        let rule = &self.rule;
        let rules = if rule.birth.is_empty() && rule.survival.is_empty() {
            RuleSet::preset(&rule.preset)
                .ok_or_else(|| ConfigError::UnknownPreset(rule.preset.clone()))?
        } else {
            RuleSet::new(
                counts_to_set(&rule.birth)?,
                counts_to_set(&rule.survival)?,
                rule.boundary,
            )
        };
        Ok(rules.with_boundary(rule.boundary))
    }

    pub fn simulation_params(&self) -> Result<SimulationParams, ConfigError> {
        let params = SimulationParams {
            energy_decay_rate: self.simulation.energy_decay_rate,
            max_age: self.simulation.max_age,
            energy_floor: self.simulation.energy_floor,
            rules: self.rule_set()?,
        };
        params.validate()?;
        Ok(params)
    }

    /// An initialized engine with the configured parameters and a seeded
    /// random fill.
    pub fn build_engine(&self) -> Result<GridEngine, ConfigError> {
        if !(0.0..=1.0).contains(&self.seed.density) {
            return Err(ConfigurationError::InvalidParameter(format!(
                "seed density must be within [0, 1], got {}",
                self.seed.density
            ))
            .into());
        }
        let mut engine = GridEngine::with_workers(self.simulation_params()?, self.worker_count())?;
        engine.initialize(self.dimensions())?;
        engine.randomize(self.seed.density, self.seed.seed);
        Ok(engine)
    }
}

fn counts_to_set(counts: &[u8]) -> Result<NeighborSet, ConfigurationError> {
    let mut set = NeighborSet::EMPTY;
    for &n in counts {
        if !set.insert(n) {
            return Err(ConfigurationError::InvalidParameter(format!(
                "neighbor count {n} is above 26"
            )));
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.dimensions(), Dimensions::cube(32));
        assert_eq!(config.rule_set().unwrap().name, "5766");
        assert_eq!(config.analysis.generations, 100);
    }

    #[test]
    fn test_full_document() {
        let config = EngineConfig::from_toml_str(
            r#"
            workers = 2

            [grid]
            width = 8
            height = 6
            depth = 4

            [rule]
            birth = [4]
            survival = [4]
            boundary = "dead_bounded"

            [simulation]
            energy_decay_rate = 0.5
            max_age = 10

            [seed]
            seed = 7
            density = 0.3

            [analysis]
            generations = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.worker_count(), 2);
        let rules = config.rule_set().unwrap();
        assert_eq!(rules.notation(), "B4/S4");
        assert_eq!(rules.boundary, BoundaryPolicy::DeadBounded);

        let params = config.simulation_params().unwrap();
        assert_eq!(params.energy_decay_rate, 0.5);
        assert_eq!(params.energy_floor, 1);
        assert_eq!(config.analysis.generations, 12);
        assert_eq!(config.analysis.max_oscillator_period, 20);

        let engine = config.build_engine().unwrap();
        assert_eq!(engine.dimensions(), Some(Dimensions::new(8, 6, 4)));
        assert_eq!(engine.worker_count(), 2);
        assert_eq!(engine.generation(), 0);
        assert!(engine.live_cell_count() > 0);
    }

    #[test]
    fn test_preset_boundary_override() {
        let config = EngineConfig::from_toml_str(
            "[rule]\npreset = \"4555\"\nboundary = \"dead_bounded\"\n",
        )
        .unwrap();
        let rules = config.rule_set().unwrap();
        assert_eq!(rules.name, "4555");
        assert_eq!(rules.boundary, BoundaryPolicy::DeadBounded);
    }

    #[test]
    fn test_rejections() {
        let unknown = EngineConfig::from_toml_str("[rule]\npreset = \"nope\"\n").unwrap();
        assert!(matches!(
            unknown.rule_set(),
            Err(ConfigError::UnknownPreset(name)) if name == "nope"
        ));

        let big = EngineConfig::from_toml_str("[rule]\nbirth = [27]\n").unwrap();
        assert!(matches!(big.rule_set(), Err(ConfigError::Invalid(_))));

        let flat = EngineConfig::from_toml_str("[grid]\nwidth = 0\n").unwrap();
        assert!(matches!(
            flat.build_engine(),
            Err(ConfigError::Invalid(ConfigurationError::InvalidDimensions(_)))
        ));

        let decay = EngineConfig::from_toml_str("[simulation]\nenergy_decay_rate = 2.0\n").unwrap();
        assert!(matches!(decay.simulation_params(), Err(ConfigError::Invalid(_))));

        let density = EngineConfig::from_toml_str("[seed]\ndensity = 1.5\n").unwrap();
        assert!(matches!(density.build_engine(), Err(ConfigError::Invalid(_))));

        assert!(matches!(
            EngineConfig::from_toml_str("workers = \"many\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::load("/nonexistent/voxel-life.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
