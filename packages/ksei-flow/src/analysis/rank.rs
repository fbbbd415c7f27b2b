//! Ranking and the final signal table.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{AlignmentMode, Lookback, Period, ScoreRecord, ScoringPolicy};

/// Sort by score descending, ties by code ascending, then keep the first `top_n`.
///
/// NaN sorts below every other score.
pub fn rank(mut records: Vec<ScoreRecord>, top_n: usize) -> Vec<ScoreRecord> {
    records.sort_by(|a, b| {
        sort_key(b.score)
            .total_cmp(&sort_key(a.score))
            .then_with(|| a.code.cmp(&b.code))
    });
    records.truncate(top_n);
    records
}

fn sort_key(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

/// Why a table has (or lacks) rows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    /// No security had both a start and an end snapshot for the window
    InsufficientHistory,
    /// Securities were scored, but none passed the sector filter or score threshold
    NoneAboveThreshold,
    /// At least one security was selected
    Ranked,
}

/// Ranked output of one screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalTable {
    pub policy: ScoringPolicy,
    pub mode: AlignmentMode,
    pub lookback: Lookback,
    /// Shared period (cross-sectional mode only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    /// Latest snapshot date in the store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDate>,
    /// Securities with a delta record
    pub scored: usize,
    /// Securities left after filtering, before truncation
    pub selected: usize,
    /// Ranked rows, at most `top_n`
    pub records: Vec<ScoreRecord>,
}

impl SignalTable {
    pub fn status(&self) -> TableStatus {
        if self.scored == 0 {
            TableStatus::InsufficientHistory
        } else if self.selected == 0 {
            TableStatus::NoneAboveThreshold
        } else {
            TableStatus::Ranked
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Aggregates;

    fn record(code: &str, score: f64) -> ScoreRecord {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        ScoreRecord {
            code: code.to_string(),
            name: code.to_string(),
            sector: None,
            policy: ScoringPolicy::SwitchingNet,
            score,
            period: Period::new(date, date).unwrap(),
            end_price: 0.0,
            price_change_pct: None,
            deltas: Aggregates::default(),
            gross_turnover: 0.0,
            normalized: None,
        }
    }

    fn codes(records: &[ScoreRecord]) -> Vec<&str> {
        records.iter().map(|r| r.code.as_str()).collect()
    }

    #[test]
    fn test_rank_descending() {
        let ranked = rank(
            vec![record("B", -40.0), record("A", 100.0), record("C", 5.0)],
            10,
        );
        assert_eq!(codes(&ranked), vec!["A", "C", "B"]);
    }

    #[test]
    fn test_ties_broken_by_code() {
        let ranked = rank(
            vec![
                record("ZZZ", 1.0),
                record("AAA", 1.0),
                record("MMM", 2.0),
                record("BBB", 1.0),
            ],
            10,
        );
        assert_eq!(codes(&ranked), vec!["MMM", "AAA", "BBB", "ZZZ"]);
    }

    #[test]
    fn test_nan_ranks_last() {
        let ranked = rank(
            vec![
                record("A", f64::NAN),
                record("C", 9.0),
                record("B", 5.0),
                record("D", f64::NEG_INFINITY),
                record("E", 1.0),
            ],
            10,
        );
        assert_eq!(codes(&ranked), vec!["C", "B", "E", "A", "D"]);
    }

    #[test]
    fn test_truncates_to_top_n() {
        let records: Vec<ScoreRecord> = (0..60)
            .map(|i| record(&format!("S{:02}", i), i as f64))
            .collect();

        let ranked = rank(records.clone(), 27);
        assert_eq!(ranked.len(), 27);
        assert_eq!(ranked[0].code, "S59");
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));

        assert_eq!(rank(records.clone(), 100).len(), 60);
        assert!(rank(records, 0).is_empty());
    }

    #[test]
    fn test_status() {
        let mut table = SignalTable {
            policy: ScoringPolicy::Accumulation,
            mode: AlignmentMode::CrossSectional,
            lookback: Lookback::Days(30),
            period: None,
            as_of: None,
            scored: 0,
            selected: 0,
            records: Vec::new(),
        };
        assert_eq!(table.status(), TableStatus::InsufficientHistory);

        table.scored = 3;
        assert_eq!(table.status(), TableStatus::NoneAboveThreshold);
        assert!(table.is_empty());

        table.selected = 1;
        table.records.push(record("A", 1.0));
        assert_eq!(table.status(), TableStatus::Ranked);
        assert_eq!(table.len(), 1);
    }
}
