//! Birth/survival rules, boundary policies and simulation parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Highest neighbor count a 26-cell neighborhood can produce.
pub const MAX_NEIGHBORS: u8 = 26;

/// A set of neighbor counts in `0..=26`, stored as a bitmask.
///
/// Serializes as a sorted list of counts.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<u8>", into = "Vec<u8>")]
pub struct NeighborSet(u32);

impl NeighborSet {
    pub const EMPTY: NeighborSet = NeighborSet(0);

    /// Inclusive range of counts; bounds above 26 are clipped.
    pub fn range(lo: u8, hi: u8) -> Self {
        (lo..=hi.min(MAX_NEIGHBORS)).collect()
    }

    #[inline]
    pub fn contains(&self, count: u8) -> bool {
        count <= MAX_NEIGHBORS && self.0 & (1 << count) != 0
    }

    /// Adds `count`, returning false if it can never be observed.
    pub fn insert(&mut self, count: u8) -> bool {
        if count > MAX_NEIGHBORS {
            return false;
        }
        self.0 |= 1 << count;
        true
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=MAX_NEIGHBORS).filter(move |&n| self.contains(n))
    }
}

impl FromIterator<u8> for NeighborSet {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut set = NeighborSet::EMPTY;
        for n in iter {
            set.insert(n);
        }
        set
    }
}

impl From<Vec<u8>> for NeighborSet {
    fn from(counts: Vec<u8>) -> Self {
        counts.into_iter().collect()
    }
}

impl From<NeighborSet> for Vec<u8> {
    fn from(set: NeighborSet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Debug for NeighborSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for NeighborSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for n in self.iter() {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{n}")?;
            first = false;
        }
        Ok(())
    }
}

/// How out-of-range neighbor lookups are resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Every axis wraps around.
    #[default]
    Toroidal,
    /// Anything outside the grid is dead with zero energy.
    DeadBounded,
}

/// Broad behaviour family a named rule belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleCategory {
    Classic,
    Growth,
    Dense,
    Oscillator,
    Custom,
}

struct Preset {
    name: &'static str,
    birth: (u8, u8),
    survival: (u8, u8),
    category: RuleCategory,
    description: &'static str,
}

const PRESETS: &[Preset] = &[
    Preset {
        name: "5766",
        birth: (5, 7),
        survival: (6, 6),
        category: RuleCategory::Classic,
        description: "Born with 5-7 neighbors, survives with 6",
    },
    Preset {
        name: "4555",
        birth: (4, 5),
        survival: (5, 5),
        category: RuleCategory::Classic,
        description: "Born with 4-5 neighbors, survives with 5",
    },
    Preset {
        name: "2333",
        birth: (2, 3),
        survival: (3, 3),
        category: RuleCategory::Growth,
        description: "Born with 2-3 neighbors, survives with 3; expands rapidly",
    },
    Preset {
        name: "3444",
        birth: (3, 4),
        survival: (4, 4),
        category: RuleCategory::Growth,
        description: "Born with 3-4 neighbors, survives with 4; balanced expansion",
    },
    Preset {
        name: "6777",
        birth: (6, 7),
        survival: (7, 7),
        category: RuleCategory::Dense,
        description: "Born with 6-7 neighbors, survives with 7; dense clusters",
    },
    Preset {
        name: "7888",
        birth: (7, 8),
        survival: (8, 8),
        category: RuleCategory::Dense,
        description: "Born with 7-8 neighbors, survives with 8; very dense structures",
    },
    Preset {
        name: "4556",
        birth: (4, 5),
        survival: (5, 6),
        category: RuleCategory::Oscillator,
        description: "Born with 4-5 neighbors, survives with 5-6; favors oscillation",
    },
    Preset {
        name: "5667",
        birth: (5, 6),
        survival: (6, 7),
        category: RuleCategory::Oscillator,
        description: "Born with 5-6 neighbors, survives with 6-7; complex oscillation",
    },
];

/// Birth/survival predicates plus the boundary policy they run under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "custom_category")]
    pub category: RuleCategory,
    #[serde(default)]
    pub boundary: BoundaryPolicy,
    pub birth: NeighborSet,
    pub survival: NeighborSet,
}

fn custom_category() -> RuleCategory {
    RuleCategory::Custom
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::from_preset(&PRESETS[0])
    }
}

impl RuleSet {
    /// An unnamed rule; its name is the canonical notation.
    pub fn new(birth: NeighborSet, survival: NeighborSet, boundary: BoundaryPolicy) -> Self {
        let mut rule = RuleSet {
            name: String::new(),
            description: String::new(),
            category: RuleCategory::Custom,
            boundary,
            birth,
            survival,
        };
        rule.name = rule.notation();
        rule
    }

    fn from_preset(p: &Preset) -> Self {
        RuleSet {
            name: p.name.to_string(),
            description: p.description.to_string(),
            category: p.category,
            boundary: BoundaryPolicy::Toroidal,
            birth: NeighborSet::range(p.birth.0, p.birth.1),
            survival: NeighborSet::range(p.survival.0, p.survival.1),
        }
    }

    /// Every built-in rule, in a stable order.
    pub fn presets() -> Vec<RuleSet> {
        PRESETS.iter().map(Self::from_preset).collect()
    }

    pub fn preset(name: &str) -> Option<RuleSet> {
        PRESETS.iter().find(|p| p.name == name).map(Self::from_preset)
    }

    pub fn by_category(category: RuleCategory) -> Vec<RuleSet> {
        PRESETS
            .iter()
            .filter(|p| p.category == category)
            .map(Self::from_preset)
            .collect()
    }

    pub fn with_boundary(mut self, boundary: BoundaryPolicy) -> Self {
        self.boundary = boundary;
        self
    }

    /// Parse `B<counts>/S<counts>` where counts are comma separated values
    /// or `lo-hi` ranges, e.g. `B5-7/S6` or `B3/S2,3`. Either side may be
    /// empty (`B/S`).
    pub fn parse(text: &str) -> Result<RuleSet, ConfigurationError> {
        let bad = || ConfigurationError::InvalidParameter(format!("malformed rule notation {text:?}"));
        let (b, s) = text.trim().split_once('/').ok_or_else(bad)?;
        let b = b.trim().strip_prefix(['B', 'b']).ok_or_else(bad)?;
        let s = s.trim().strip_prefix(['S', 's']).ok_or_else(bad)?;
        let birth = parse_counts(b).ok_or_else(bad)?;
        let survival = parse_counts(s).ok_or_else(bad)?;
        Ok(RuleSet::new(birth, survival, BoundaryPolicy::default()))
    }

    /// Canonical `B../S..` label with comma separated counts.
    pub fn notation(&self) -> String {
        format!("B{}/S{}", self.birth, self.survival)
    }

    /// Whether a cell is alive in the next generation.
    #[inline]
    pub fn next_alive(&self, alive: bool, neighbors: u8) -> bool {
        if alive {
            self.survival.contains(neighbors)
        } else {
            self.birth.contains(neighbors)
        }
    }
}

fn parse_counts(text: &str) -> Option<NeighborSet> {
    let mut set = NeighborSet::EMPTY;
    for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (lo, hi) = match part.split_once('-') {
            Some((lo, hi)) => (lo.trim().parse::<u8>().ok()?, hi.trim().parse::<u8>().ok()?),
            None => {
                let n = part.parse::<u8>().ok()?;
                (n, n)
            }
        };
        if lo > hi || hi > MAX_NEIGHBORS {
            return None;
        }
        for n in lo..=hi {
            set.insert(n);
        }
    }
    Some(set)
}

impl FromStr for RuleSet {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleSet::parse(s)
    }
}

/// Per-engine tuning of the cell transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Fraction of energy lost per surviving generation, in `[0, 1]`.
    pub energy_decay_rate: f32,
    /// Ages saturate here.
    pub max_age: u32,
    /// Surviving cells never drop below this energy.
    pub energy_floor: u8,
    pub rules: RuleSet,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            energy_decay_rate: 0.01,
            max_age: 1000,
            energy_floor: 1,
            rules: RuleSet::default(),
        }
    }
}

impl SimulationParams {
    pub fn with_rules(rules: RuleSet) -> Self {
        SimulationParams {
            rules,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(0.0..=1.0).contains(&self.energy_decay_rate) {
            return Err(ConfigurationError::InvalidParameter(format!(
                "energy_decay_rate must be within [0, 1], got {}",
                self.energy_decay_rate
            )));
        }
        if self.max_age == 0 {
            return Err(ConfigurationError::InvalidParameter(
                "max_age must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbor_set_basics() {
        let mut set = NeighborSet::range(5, 7);
        assert_eq!(set.len(), 3);
        assert!(set.contains(5) && set.contains(7));
        assert!(!set.contains(4) && !set.contains(8));

        assert!(!set.insert(27), "counts above 26 are unobservable");
        assert!(!set.contains(200));
        assert!(set.insert(0));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 5, 6, 7]);
        assert_eq!(NeighborSet::range(20, 40).len(), 7);
    }

    #[test]
    fn test_presets() {
        let presets = RuleSet::presets();
        assert_eq!(presets.len(), 8);
        assert_eq!(presets[0], RuleSet::default());

        let r = RuleSet::preset("4556").unwrap();
        assert_eq!(r.category, RuleCategory::Oscillator);
        assert_eq!(r.notation(), "B4,5/S5,6");
        assert!(RuleSet::preset("9999").is_none());

        let dense = RuleSet::by_category(RuleCategory::Dense);
        let names: Vec<_> = dense.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["6777", "7888"]);
    }

    #[test]
    fn test_parse_notation() {
        let r = RuleSet::parse("B5-7/S6").unwrap();
        assert_eq!(r.birth, NeighborSet::range(5, 7));
        assert_eq!(r.survival, NeighborSet::range(6, 6));
        assert_eq!(r.notation(), "B5,6,7/S6");
        assert_eq!(r.name, "B5,6,7/S6");

        let r: RuleSet = "b3/s2,3".parse().unwrap();
        assert!(r.next_alive(false, 3));
        assert!(r.next_alive(true, 2));
        assert!(!r.next_alive(true, 4));

        let empty = RuleSet::parse("B/S").unwrap();
        assert!(empty.birth.is_empty() && empty.survival.is_empty());

        assert!(RuleSet::parse("B3").is_err());
        assert!(RuleSet::parse("B3/S30").is_err());
        assert!(RuleSet::parse("B7-5/S1").is_err());
        assert!(RuleSet::parse("X3/S2").is_err());
    }

    #[test]
    fn test_rule_serde_shape() {
        let rule = RuleSet::parse("B4/S4")
            .unwrap()
            .with_boundary(BoundaryPolicy::DeadBounded);
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["birth"], serde_json::json!([4]));
        assert_eq!(json["boundary"], "dead_bounded");
        let back: RuleSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_params_validation() {
        assert!(SimulationParams::default().validate().is_ok());

        let bad = SimulationParams {
            energy_decay_rate: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = SimulationParams {
            max_age: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
