//! Ownership-shift analysis pipeline.
//!
//! Period alignment, deltas, normalization, scoring and ranking:
//!
//! - **Period**: nearest-past start date for a lookback window
//! - **Delta**: per-category and aggregate changes between two snapshots
//! - **Normalize**: cross-sectional z-scores with a zero clamp
//! - **Score**: accumulation and switching policies
//! - **Rank**: deterministic top-N ordering

mod delta;
mod normalize;
mod period;
mod rank;
mod score;

pub use delta::{compute_delta, cross_sectional_deltas, per_security_deltas, price_change_pct};
pub use normalize::{mean_std, z_scores};
pub use period::{resolve_period, target_start};
pub use rank::{rank, SignalTable, TableStatus};
pub use score::{accumulation_scores, score};

use serde::{Deserialize, Serialize};

use crate::config::ScreenerConfig;
use crate::store::SnapshotStore;
use crate::types::{AlignmentMode, DeltaRecord, Lookback, Period, ScoringPolicy};
use crate::{Error, Result};

/// Parameters of one screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreenRequest {
    pub policy: ScoringPolicy,
    pub lookback: Lookback,
    #[serde(default)]
    pub mode: AlignmentMode,
    /// Falls back to `ScreenerConfig::top_n`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
    /// Falls back to `ScreenerConfig::min_score`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,
    /// Keep only securities in this sector (case-insensitive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
}

impl ScreenRequest {
    /// Cross-sectional request with config defaults for everything else.
    pub fn new(policy: ScoringPolicy, lookback: Lookback) -> Self {
        Self {
            policy,
            lookback,
            mode: AlignmentMode::CrossSectional,
            top_n: None,
            min_score: None,
            sector: None,
        }
    }

    /// Request built entirely from configured defaults.
    pub fn from_config(config: &ScreenerConfig) -> Self {
        Self {
            policy: config.policy,
            lookback: config.lookback,
            mode: config.mode,
            top_n: Some(config.top_n),
            min_score: config.min_score,
            sector: None,
        }
    }

    pub fn with_mode(mut self, mode: AlignmentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = Some(top_n);
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }
}

/// Run a full screen: align, diff, score, filter and rank.
///
/// Missing history never fails the call; it produces a table whose
/// `status()` is `TableStatus::InsufficientHistory`. Only invalid parameters
/// return an error.
pub fn screen(
    store: &SnapshotStore,
    request: &ScreenRequest,
    config: &ScreenerConfig,
) -> Result<SignalTable> {
    request.lookback.validate()?;
    config.validate()?;
    if let Some(min) = request.min_score.filter(|m| !m.is_finite()) {
        return Err(Error::InvalidParameter(format!(
            "min_score must be finite, got {}",
            min
        )));
    }

    let (period, deltas) = collect_deltas(store, request)?;

    let scored = deltas.len();
    let mut records = score(&deltas, request.policy, &config.weights);

    if let Some(sector) = request.sector.as_deref() {
        records.retain(|r| {
            r.sector
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(sector))
        });
    }
    if let Some(min) = request.min_score.or(config.min_score) {
        records.retain(|r| r.score >= min);
    }

    let selected = records.len();
    let top_n = request.top_n.unwrap_or(config.top_n);
    let records = rank(records, top_n);

    tracing::info!(
        "Screen {} ({}, {:?}): {} scored, {} selected, {} returned",
        request.policy,
        request.lookback,
        request.mode,
        scored,
        selected,
        records.len()
    );

    Ok(SignalTable {
        policy: request.policy,
        mode: request.mode,
        lookback: request.lookback,
        period,
        as_of: store.as_of(),
        scored,
        selected,
        records,
    })
}

fn collect_deltas(
    store: &SnapshotStore,
    request: &ScreenRequest,
) -> Result<(Option<Period>, Vec<DeltaRecord>)> {
    match request.mode {
        AlignmentMode::CrossSectional => match resolve_period(&store.dates(), request.lookback) {
            Ok(period) => {
                tracing::debug!("Resolved {} to {}", request.lookback, period);
                Ok((Some(period), cross_sectional_deltas(store, &period)))
            }
            Err(Error::InsufficientHistory(reason)) => {
                tracing::info!("No cross-section for {}: {}", request.lookback, reason);
                Ok((None, Vec::new()))
            }
            Err(e) => Err(e),
        },
        AlignmentMode::PerSecurity => Ok((None, per_security_deltas(store, request.lookback))),
    }
}
