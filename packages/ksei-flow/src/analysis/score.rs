//! Scoring policies.
//!
//! Each policy turns a set of `DeltaRecord`s into one `ScoreRecord` per security.
//! Only accumulation needs the whole cross-section (for z-scores); the switching
//! policies are computed per record on raw share counts.

use super::normalize::z_scores;
use crate::config::AccumulationWeights;
use crate::types::{DeltaRecord, NormalizedComponents, ScoreRecord, ScoringPolicy};

/// Score every delta record with the requested policy.
///
/// Output order follows the input order; use `rank` to sort.
pub fn score(
    deltas: &[DeltaRecord],
    policy: ScoringPolicy,
    weights: &AccumulationWeights,
) -> Vec<ScoreRecord> {
    match policy {
        ScoringPolicy::Accumulation => accumulation_scores(deltas, weights),
        ScoringPolicy::SwitchingNet => deltas
            .iter()
            .map(|d| to_record(d, policy, d.aggregates.net_transfer(), None))
            .collect(),
        ScoringPolicy::SwitchingGross => deltas
            .iter()
            .map(|d| to_record(d, policy, d.gross_turnover(), None))
            .collect(),
        ScoringPolicy::SwitchingPeak => deltas
            .iter()
            .map(|d| to_record(d, policy, d.peak_step_transfer, None))
            .collect(),
    }
}

/// Institution accumulation against retail distribution.
///
/// `score = w_li * z(Δlocal inst) + w_fi * z(Δforeign inst) + w_lr * -z(Δlocal retail)`,
/// plus `price_bonus` when the price change is positive. An undefined price
/// change never earns the bonus.
pub fn accumulation_scores(
    deltas: &[DeltaRecord],
    weights: &AccumulationWeights,
) -> Vec<ScoreRecord> {
    let column = |f: fn(&DeltaRecord) -> f64| {
        let raw: Vec<f64> = deltas.iter().map(f).collect();
        z_scores(&raw)
    };

    let z_local_inst = column(|d| d.aggregates.local_institution);
    let z_foreign_inst = column(|d| d.aggregates.foreign_institution);
    let z_local_retail = column(|d| d.aggregates.local_retail);

    deltas
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let components = NormalizedComponents {
                local_institution: z_local_inst[i],
                foreign_institution: z_foreign_inst[i],
                local_retail: -z_local_retail[i],
            };

            let mut score = weights.local_institution * components.local_institution
                + weights.foreign_institution * components.foreign_institution
                + weights.local_retail * components.local_retail;

            if d.price_change_pct.is_some_and(|pct| pct > 0.0) {
                score += weights.price_bonus;
            }

            to_record(d, ScoringPolicy::Accumulation, score, Some(components))
        })
        .collect()
}

/// Non-finite scores (overflowing share counts) are reported as 0.
fn to_record(
    delta: &DeltaRecord,
    policy: ScoringPolicy,
    score: f64,
    normalized: Option<NormalizedComponents>,
) -> ScoreRecord {
    let score = if score.is_finite() {
        score
    } else {
        tracing::warn!("Non-finite {} score for {}, using 0", policy, delta.code);
        0.0
    };

    ScoreRecord {
        code: delta.code.clone(),
        name: delta.name.clone().unwrap_or_else(|| delta.code.clone()),
        sector: delta.sector.clone(),
        policy,
        score,
        period: delta.period,
        end_price: delta.end_price,
        price_change_pct: delta.price_change_pct,
        deltas: delta.aggregates,
        gross_turnover: delta.gross_turnover(),
        normalized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Aggregates, Category, HolderKind, Origin, Period};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn period() -> Period {
        Period::new(
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        )
        .unwrap()
    }

    fn delta(code: &str, li: f64, fi: f64, lr: f64, price_change_pct: Option<f64>) -> DeltaRecord {
        DeltaRecord {
            code: code.to_string(),
            name: None,
            sector: None,
            period: period(),
            start_price: 100.0,
            end_price: 100.0,
            price_change_pct,
            categories: [0.0; Category::COUNT],
            aggregates: Aggregates {
                local_institution: li,
                foreign_institution: fi,
                local_retail: lr,
                foreign_retail: 0.0,
            },
            peak_step_transfer: 0.0,
        }
    }

    #[test]
    fn test_switching_net_example() {
        let deltas = vec![
            delta("A", 50.0, 10.0, -40.0, Some(10.0)),
            delta("B", -20.0, 0.0, 20.0, Some(-10.0)),
        ];
        let scores = score(&deltas, ScoringPolicy::SwitchingNet, &AccumulationWeights::default());

        assert_eq!(scores[0].score, 100.0);
        assert_eq!(scores[1].score, -40.0);
        assert!(scores.iter().all(|s| s.normalized.is_none()));
    }

    #[test]
    fn test_non_finite_scores_become_zero() {
        let overflowed = delta("A", f64::NAN, 0.0, 0.0, None);
        let mut peak = delta("B", 0.0, 0.0, 0.0, None);
        peak.peak_step_transfer = f64::INFINITY;
        let deltas = vec![overflowed, peak];

        for policy in ScoringPolicy::ALL {
            let scores = score(&deltas, policy, &AccumulationWeights::default());
            assert!(scores.iter().all(|s| s.score.is_finite()), "{}", policy);
        }

        let net = score(&deltas, ScoringPolicy::SwitchingNet, &AccumulationWeights::default());
        assert_eq!(net[0].score, 0.0);
        let peak = score(&deltas, ScoringPolicy::SwitchingPeak, &AccumulationWeights::default());
        assert_eq!(peak[1].score, 0.0);
    }

    #[test]
    fn test_name_falls_back_to_code() {
        let mut named = delta("BBCA", 1.0, 0.0, 0.0, None);
        named.name = Some("Bank Central Asia".to_string());
        let deltas = vec![named, delta("TLKM", 1.0, 0.0, 0.0, None)];

        let scores = score(&deltas, ScoringPolicy::SwitchingNet, &AccumulationWeights::default());
        assert_eq!(scores[0].name, "Bank Central Asia");
        assert_eq!(scores[1].name, "TLKM");
    }

    #[test]
    fn test_switching_gross_counts_all_categories() {
        let mut d = delta("A", 0.0, 0.0, 0.0, None);
        d.categories[Category::new(Origin::Local, HolderKind::Bank).index()] = -30.0;
        d.categories[Category::new(Origin::Foreign, HolderKind::Foundation).index()] = 30.0;
        d.categories[Category::new(Origin::Local, HolderKind::Individual).index()] = 5.0;

        let scores = score(&[d], ScoringPolicy::SwitchingGross, &AccumulationWeights::default());
        assert_eq!(scores[0].score, 65.0);
        assert_eq!(scores[0].gross_turnover, 65.0);
    }

    #[test]
    fn test_switching_peak_uses_step_transfer() {
        let mut d = delta("A", 0.0, 0.0, 0.0, None);
        d.peak_step_transfer = 75.0;
        let scores = score(&[d], ScoringPolicy::SwitchingPeak, &AccumulationWeights::default());
        assert_eq!(scores[0].score, 75.0);
    }

    #[test]
    fn test_accumulation_two_securities() {
        let deltas = vec![
            delta("A", 50.0, 10.0, -40.0, Some(10.0)),
            delta("B", -20.0, 0.0, 20.0, Some(-10.0)),
        ];
        let scores = accumulation_scores(&deltas, &AccumulationWeights::default());

        // Two points: every z-score is +/- 1/sqrt(2)
        let z = std::f64::consts::FRAC_1_SQRT_2;
        let a = scores[0].normalized.unwrap();
        assert_relative_eq!(a.local_institution, z, epsilon = 1e-12);
        assert_relative_eq!(a.foreign_institution, z, epsilon = 1e-12);
        assert_relative_eq!(a.local_retail, z, epsilon = 1e-12);

        assert_relative_eq!(scores[0].score, z + 0.5, epsilon = 1e-12);
        assert_relative_eq!(scores[1].score, -z, epsilon = 1e-12);
    }

    #[test]
    fn test_accumulation_single_security_only_bonus() {
        let deltas = vec![delta("A", 1_000.0, 500.0, -700.0, Some(3.0))];
        let scores = accumulation_scores(&deltas, &AccumulationWeights::default());
        assert_eq!(scores[0].score, 0.5);
    }

    #[test]
    fn test_accumulation_undefined_price_gets_no_bonus() {
        let deltas = vec![
            delta("A", 10.0, 10.0, 10.0, None),
            delta("B", 10.0, 10.0, 10.0, Some(0.0)),
        ];
        let scores = accumulation_scores(&deltas, &AccumulationWeights::default());
        assert_eq!(scores[0].score, 0.0);
        assert_eq!(scores[1].score, 0.0);
        assert!(scores[0].price_change_pct.is_none());
    }

    #[test]
    fn test_accumulation_custom_weights() {
        let weights = AccumulationWeights {
            local_institution: 0.0,
            foreign_institution: 1.0,
            local_retail: 0.0,
            price_bonus: 0.0,
        };
        let deltas = vec![
            delta("A", 0.0, 10.0, 0.0, Some(5.0)),
            delta("B", 0.0, 20.0, 0.0, Some(5.0)),
            delta("C", 0.0, 30.0, 0.0, Some(5.0)),
        ];
        let scores = accumulation_scores(&deltas, &weights);
        assert_relative_eq!(scores[0].score, -1.0, epsilon = 1e-12);
        assert_relative_eq!(scores[1].score, 0.0, epsilon = 1e-12);
        assert_relative_eq!(scores[2].score, 1.0, epsilon = 1e-12);
    }
}
