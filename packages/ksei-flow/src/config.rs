//! Screener configuration.
//!
//! Loaded from TOML. Every field has a default, so a missing file or a partial
//! file both yield a usable configuration.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{AlignmentMode, Lookback, ScoringPolicy};
use crate::{Error, Result};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "KSEI_FLOW_CONFIG";

// ============================================================================
// Accumulation Weights
// ============================================================================

/// Weights for the accumulation policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AccumulationWeights {
    /// Weight of z(Δ local institution)
    #[serde(default = "default_institution_weight")]
    pub local_institution: f64,

    /// Weight of z(Δ foreign institution)
    #[serde(default = "default_institution_weight")]
    pub foreign_institution: f64,

    /// Weight of the sign-inverted z(Δ local retail)
    #[serde(default = "default_retail_weight")]
    pub local_retail: f64,

    /// Added when the period price change is positive
    #[serde(default = "default_price_bonus")]
    pub price_bonus: f64,
}

impl Default for AccumulationWeights {
    fn default() -> Self {
        Self {
            local_institution: default_institution_weight(),
            foreign_institution: default_institution_weight(),
            local_retail: default_retail_weight(),
            price_bonus: default_price_bonus(),
        }
    }
}

impl AccumulationWeights {
    fn validate(&self) -> Result<()> {
        let all = [
            ("local_institution", self.local_institution),
            ("foreign_institution", self.foreign_institution),
            ("local_retail", self.local_retail),
            ("price_bonus", self.price_bonus),
        ];
        match all.iter().find(|(_, w)| !w.is_finite()) {
            Some((name, w)) => Err(Error::InvalidParameter(format!(
                "weight {} must be finite, got {}",
                name, w
            ))),
            None => Ok(()),
        }
    }
}

fn default_institution_weight() -> f64 {
    0.4
}

fn default_retail_weight() -> f64 {
    0.2
}

fn default_price_bonus() -> f64 {
    0.5
}

// ============================================================================
// Screener Configuration
// ============================================================================

/// Defaults applied when a screen request leaves a field unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreenerConfig {
    /// Scoring policy
    #[serde(default)]
    pub policy: ScoringPolicy,

    /// Lookback window, e.g. `{ days = 30 }` or `{ snapshots = 1 }`
    #[serde(default)]
    pub lookback: Lookback,

    /// Global or per-security period alignment
    #[serde(default)]
    pub mode: AlignmentMode,

    /// Number of securities kept after ranking
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Securities scoring below this are dropped before truncation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,

    /// Accumulation policy weights
    #[serde(default)]
    pub weights: AccumulationWeights,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            policy: ScoringPolicy::default(),
            lookback: Lookback::default(),
            mode: AlignmentMode::default(),
            top_n: default_top_n(),
            min_score: None,
            weights: AccumulationWeights::default(),
        }
    }
}

fn default_top_n() -> usize {
    27
}

impl ScreenerConfig {
    /// Default config file path.
    ///
    /// Default path: `<config dir>/ksei-flow/config.toml`
    /// Can be overridden with `KSEI_FLOW_CONFIG` environment variable.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }

        directories::ProjectDirs::from("", "", "ksei-flow")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("ksei-flow.toml"))
    }

    /// Load from the default path, falling back to defaults when the file is absent.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_path())
    }

    /// Load from a specific path. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject zero lookbacks and non-finite weights or thresholds.
    pub fn validate(&self) -> Result<()> {
        self.lookback.validate()?;
        self.weights.validate()?;
        if let Some(min) = self.min_score {
            if !min.is_finite() {
                return Err(Error::InvalidParameter(format!(
                    "min_score must be finite, got {}",
                    min
                )));
            }
        }
        Ok(())
    }
}
