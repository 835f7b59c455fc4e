//! Diff configuration file
//!
//! # Example execdiff.toml
//!
//! ```toml
//! strategy = "hierarchical"
//! skip_cost = 1
//! repeat_skip_cost = 1
//! mismatch_cost = 1
//! ignore_properties = ["^ts$", "_ns$"]
//!
//! [limits]
//! distance_bound = 6000
//! max_dp_states = 20000000
//! max_nesting_depth = 256
//!
//! [repetition]
//! min_chunk = 2
//! max_chunk = 8
//! ```
//!
//! Every key is optional; missing keys take the defaults shown.

use crate::diff::Strategy;
use crate::matcher::{MatchConfig, MatchLimits};
use crate::repetition::{DEFAULT_MAX_CHUNK, DEFAULT_MIN_CHUNK};
use crate::step_model::PropertyFilter;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Chunk sizes scanned for repeated runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepetitionConfig {
    pub min_chunk: usize,
    pub max_chunk: usize,
}

impl Default for RepetitionConfig {
    fn default() -> Self {
        Self {
            min_chunk: DEFAULT_MIN_CHUNK,
            max_chunk: DEFAULT_MAX_CHUNK,
        }
    }
}

/// Everything a trace comparison can be tuned with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiffConfig {
    /// Matcher used for the comparison
    pub strategy: Strategy,

    /// Cost per unmatched step
    pub skip_cost: u64,

    /// Cost per step of loop iterations only one run executed
    pub repeat_skip_cost: u64,

    /// Cost of pairing two steps with the same name but different properties
    pub mismatch_cost: u64,

    /// Regexes over property keys excluded from comparison
    pub ignore_properties: Vec<String>,

    pub limits: MatchLimits,

    pub repetition: RepetitionConfig,
}

impl Default for DiffConfig {
    fn default() -> Self {
        let matching = MatchConfig::default();
        Self {
            strategy: Strategy::default(),
            skip_cost: matching.skip_cost,
            repeat_skip_cost: matching.repeat_skip_cost,
            mismatch_cost: 1,
            ignore_properties: Vec::new(),
            limits: matching.limits,
            repetition: RepetitionConfig::default(),
        }
    }
}

impl DiffConfig {
    /// Defaults with no distance band and a larger state budget
    pub fn exhaustive() -> Self {
        Self {
            limits: MatchLimits::exhaustive(),
            ..Self::default()
        }
    }

    /// Load a configuration from a TOML file
    ///
    /// # Example
    ///
    /// ```no_run
    /// use execdiff::config::DiffConfig;
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = DiffConfig::from_file("execdiff.toml")?;
    /// println!("skip cost {}", config.skip_cost);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::from_toml_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DiffConfig = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Matcher settings carried by this configuration
    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            skip_cost: self.skip_cost,
            repeat_skip_cost: self.repeat_skip_cost,
            min_chunk: self.repetition.min_chunk,
            max_chunk: self.repetition.max_chunk,
            limits: self.limits,
        }
    }

    pub fn property_filter(&self) -> Result<PropertyFilter> {
        PropertyFilter::new(&self.ignore_properties).context("Invalid ignore_properties pattern")
    }

    pub fn validate(&self) -> Result<()> {
        self.match_config().validate()?;
        self.property_filter()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::DEFAULT_DISTANCE_BOUND;

    #[test]
    fn test_empty_document_is_default() {
        let config = DiffConfig::from_toml_str("").unwrap();
        assert_eq!(config, DiffConfig::default());
        assert_eq!(config.strategy, Strategy::Hierarchical);
        assert_eq!(config.match_config(), MatchConfig::default());
    }

    #[test]
    fn test_full_document() {
        let toml = r#"
            strategy = "flat"
            skip_cost = 3
            repeat_skip_cost = 2
            mismatch_cost = 5
            ignore_properties = ["^ts$"]

            [limits]
            distance_bound = 100
            max_dp_states = 5000
            max_nesting_depth = 16

            [repetition]
            min_chunk = 3
            max_chunk = 6
        "#;
        let config = DiffConfig::from_toml_str(toml).unwrap();

        assert_eq!(config.strategy, Strategy::Flat);
        assert_eq!(config.mismatch_cost, 5);
        let matching = config.match_config();
        assert_eq!(matching.skip_cost, 3);
        assert_eq!(matching.repeat_skip_cost, 2);
        assert_eq!(matching.min_chunk, 3);
        assert_eq!(matching.max_chunk, 6);
        assert_eq!(matching.limits.distance_bound, 100);
        assert_eq!(matching.limits.max_nesting_depth, 16);
        assert!(!config.property_filter().unwrap().keeps("ts"));
    }

    #[test]
    fn test_partial_limits_keep_defaults() {
        let config = DiffConfig::from_toml_str("[limits]\nmax_dp_states = 10\n").unwrap();
        assert_eq!(config.limits.max_dp_states, 10);
        assert_eq!(config.limits.distance_bound, DEFAULT_DISTANCE_BOUND);
    }

    #[test]
    fn test_rejects_zero_skip_cost() {
        assert!(DiffConfig::from_toml_str("skip_cost = 0").is_err());
    }

    #[test]
    fn test_rejects_bad_regex() {
        let err = DiffConfig::from_toml_str(r#"ignore_properties = ["("]"#).unwrap_err();
        assert!(err.to_string().contains("ignore_properties"));
    }

    #[test]
    fn test_rejects_unknown_key() {
        assert!(DiffConfig::from_toml_str("skip = 1").is_err());
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        assert!(DiffConfig::from_toml_str(r#"strategy = "fuzzy""#).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("execdiff.toml");
        fs::write(&path, "skip_cost = 9\n").unwrap();
        assert_eq!(DiffConfig::from_file(&path).unwrap().skip_cost, 9);
        assert!(DiffConfig::from_file(dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_exhaustive_preset() {
        assert_eq!(DiffConfig::exhaustive().limits.distance_bound, usize::MAX);
    }
}
