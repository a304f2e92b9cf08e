//! Configuration management for community tracking and flow layout

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How persistent dynamic-community identities are assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityPolicy {
    /// Communities sharing a raw `community_id` across slices share an identity
    RawLabel,

    /// Identities follow tracked matches between adjacent slices
    TrackedChain,
}

/// How a slice's `[0, 1]` range is split among its ordered communities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntervalMode {
    /// Every community gets the same height
    Equal,

    /// Heights proportional to member count
    BySize,
}

/// Tunables for the tracker, assembler and ordering optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Jaccard similarity a pair must exceed to produce a transition curve
    pub match_threshold: f64,

    /// Jaccard similarity a match needs to carry a dynamic identity forward
    pub track_threshold: f64,

    /// Weight of rank displacement relative to crossings (lambda)
    pub stability_weight: f64,

    /// Number of independent optimizer starting points
    pub restarts: usize,

    /// Upper bound on alternating sweeps per restart
    pub sweeps_max: usize,

    /// Consecutive non-improving sweeps before a restart stops early
    pub early_stop_threshold: usize,

    /// Seed for the shuffled starting order
    pub seed: u64,

    pub identity_policy: IdentityPolicy,

    pub interval_mode: IntervalMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            match_threshold: 0.1,
            track_threshold: 0.4,
            stability_weight: 0.05,
            restarts: 4,
            sweeps_max: 15,
            early_stop_threshold: 5,
            seed: 42,
            identity_policy: IdentityPolicy::TrackedChain,
            interval_mode: IntervalMode::Equal,
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every tunable is in its usable range
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        for (name, value) in [
            ("match_threshold", self.match_threshold),
            ("track_threshold", self.track_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }

        if !self.stability_weight.is_finite() || self.stability_weight < 0.0 {
            return Err(ConfigError::InvalidStabilityWeight(self.stability_weight));
        }

        if self.restarts == 0 {
            return Err(ConfigError::ZeroCount("restarts"));
        }
        if self.early_stop_threshold == 0 {
            return Err(ConfigError::ZeroCount("early_stop_threshold"));
        }

        if self.track_threshold < self.match_threshold {
            log::warn!(
                "track threshold {} is below match threshold {}; identities only follow emitted matches",
                self.track_threshold,
                self.match_threshold
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sweeps_max, 15);
        assert_eq!(config.early_stop_threshold, 5);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let config = Config {
            match_threshold: 1.5,
            ..Config::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ThresholdOutOfRange {
                name: "match_threshold",
                value: 1.5
            })
        );
    }

    #[test]
    fn rejects_zero_restarts_and_negative_lambda() {
        let config = Config {
            restarts: 0,
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroCount("restarts")));

        let config = Config {
            stability_weight: -0.1,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidStabilityWeight(_))
        ));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "restarts": 8, "identity_policy": "raw-label" }"#).unwrap();
        assert_eq!(config.restarts, 8);
        assert_eq!(config.identity_policy, IdentityPolicy::RawLabel);
        assert_eq!(config.match_threshold, 0.1);
    }
}
