//! Ownership and price deltas between two aligned snapshots.

use rayon::prelude::*;

use super::period::resolve_period;
use crate::store::{SecuritySeries, SnapshotStore};
use crate::types::{Category, DeltaRecord, Lookback, Period, Snapshot};

/// Compute the delta of one security over `period`.
///
/// Returns `None` unless the series has a snapshot on both the start and the
/// end date. A missing side is never read as zero ownership.
pub fn compute_delta(series: &SecuritySeries, period: &Period) -> Option<DeltaRecord> {
    let start = series.at(period.start)?;
    let end = series.at(period.end)?;

    let mut categories = [0.0; Category::COUNT];
    for (slot, (e, s)) in categories
        .iter_mut()
        .zip(end.holdings.iter().zip(start.holdings.iter()))
    {
        *slot = e - s;
    }

    let security = series.security();
    Some(DeltaRecord {
        code: security.code.clone(),
        name: security.name.clone(),
        sector: security.sector.clone(),
        period: *period,
        start_price: start.price,
        end_price: end.price,
        price_change_pct: price_change_pct(start.price, end.price),
        categories,
        aggregates: end.aggregates - start.aggregates,
        peak_step_transfer: peak_step_transfer(series.within(period)),
    })
}

/// Percentage price change; undefined when the start price is zero.
pub fn price_change_pct(start: f64, end: f64) -> Option<f64> {
    if start == 0.0 || !start.is_finite() || !end.is_finite() {
        return None;
    }
    Some((end - start) / start * 100.0)
}

/// Largest net retail-to-institution transfer between consecutive snapshots.
fn peak_step_transfer(snapshots: &[Snapshot]) -> f64 {
    snapshots
        .windows(2)
        .map(|pair| (pair[1].aggregates - pair[0].aggregates).net_transfer())
        .reduce(f64::max)
        .unwrap_or(0.0)
}

/// Deltas for every security present on both ends of one shared period.
pub fn cross_sectional_deltas(store: &SnapshotStore, period: &Period) -> Vec<DeltaRecord> {
    let series: Vec<&SecuritySeries> = store.iter().collect();

    let deltas: Vec<DeltaRecord> = series
        .par_iter()
        .filter_map(|s| compute_delta(s, period))
        .collect();

    tracing::debug!(
        "Cross-section {}: {} of {} securities have both snapshots",
        period,
        deltas.len(),
        series.len()
    );
    deltas
}

/// Deltas where each security aligns the lookback against its own dates.
///
/// Securities without enough history for `lookback` are skipped.
pub fn per_security_deltas(store: &SnapshotStore, lookback: Lookback) -> Vec<DeltaRecord> {
    let series: Vec<&SecuritySeries> = store.iter().collect();

    let deltas: Vec<DeltaRecord> = series
        .par_iter()
        .filter_map(|s| match resolve_period(&s.dates(), lookback) {
            Ok(period) => compute_delta(s, &period),
            Err(e) => {
                tracing::debug!("Skipping {}: {}", s.code(), e);
                None
            }
        })
        .collect();

    tracing::debug!(
        "Per-security {}: {} of {} securities aligned",
        lookback,
        deltas.len(),
        series.len()
    );
    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Aggregates, HolderKind, Origin, Security};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn aggregates(local_inst: f64, foreign_inst: f64, local_retail: f64) -> Aggregates {
        Aggregates {
            local_institution: local_inst,
            foreign_institution: foreign_inst,
            local_retail,
            foreign_retail: 0.0,
        }
    }

    fn example_store() -> SnapshotStore {
        let jan = date(2024, 1, 31);
        let feb = date(2024, 2, 29);
        let mut store = SnapshotStore::new();
        store.insert(
            Security::new("A"),
            Snapshot::new(jan, 1000.0).with_aggregates(aggregates(100.0, 50.0, 500.0)),
        );
        store.insert(
            Security::new("A"),
            Snapshot::new(feb, 1100.0).with_aggregates(aggregates(150.0, 60.0, 460.0)),
        );
        store.insert(
            Security::new("B"),
            Snapshot::new(jan, 500.0).with_aggregates(aggregates(200.0, 300.0, 100.0)),
        );
        store.insert(
            Security::new("B"),
            Snapshot::new(feb, 450.0).with_aggregates(aggregates(180.0, 300.0, 120.0)),
        );
        store
    }

    #[test]
    fn test_cross_sectional_example() {
        let store = example_store();
        let period = Period::new(date(2024, 1, 31), date(2024, 2, 29)).unwrap();
        let deltas = cross_sectional_deltas(&store, &period);

        assert_eq!(deltas.len(), 2);
        let a = &deltas[0];
        assert_eq!(a.code, "A");
        assert_eq!(a.aggregates.local_institution, 50.0);
        assert_eq!(a.aggregates.foreign_institution, 10.0);
        assert_eq!(a.aggregates.local_retail, -40.0);
        assert_relative_eq!(a.price_change_pct.unwrap(), 10.0, epsilon = 1e-9);

        let b = &deltas[1];
        assert_eq!(b.aggregates.local_institution, -20.0);
        assert_eq!(b.aggregates.foreign_institution, 0.0);
        assert_eq!(b.aggregates.local_retail, 20.0);
        assert_relative_eq!(b.price_change_pct.unwrap(), -10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_category_deltas_match_rows() {
        let local_mf = Category::new(Origin::Local, HolderKind::MutualFund);
        let foreign_id = Category::new(Origin::Foreign, HolderKind::Individual);

        let mut store = SnapshotStore::new();
        let start = Snapshot::new(date(2024, 1, 31), 100.0)
            .with_holding(local_mf, 1_000.0)
            .with_holding(foreign_id, 300.0);
        let end = Snapshot::new(date(2024, 2, 29), 100.0)
            .with_holding(local_mf, 1_250.0)
            .with_holding(foreign_id, 100.0);
        store.insert(Security::new("X"), start.clone());
        store.insert(Security::new("X"), end.clone());

        let period = Period::new(start.date, end.date).unwrap();
        let delta = compute_delta(store.get("X").unwrap(), &period).unwrap();

        for category in Category::all() {
            assert_eq!(
                delta.category(category),
                end.holding(category) - start.holding(category)
            );
        }
        assert_eq!(delta.aggregates.local_institution, 250.0);
        assert_eq!(delta.aggregates.foreign_retail, -200.0);
        assert_eq!(delta.gross_turnover(), 450.0);
    }

    #[test]
    fn test_one_sided_security_excluded() {
        let mut store = example_store();
        store.insert(Security::new("NEW"), Snapshot::new(date(2024, 2, 29), 100.0));
        store.insert(Security::new("GONE"), Snapshot::new(date(2024, 1, 31), 100.0));

        let period = Period::new(date(2024, 1, 31), date(2024, 2, 29)).unwrap();
        let codes: Vec<String> = cross_sectional_deltas(&store, &period)
            .into_iter()
            .map(|d| d.code)
            .collect();
        assert_eq!(codes, vec!["A", "B"]);
    }

    #[test]
    fn test_zero_start_price_is_undefined() {
        assert_eq!(price_change_pct(0.0, 100.0), None);
        assert_eq!(price_change_pct(100.0, 150.0), Some(50.0));
    }

    #[test]
    fn test_per_security_uses_own_calendar() {
        let mut store = SnapshotStore::new();
        // A reports at month end, B a week later
        store.insert(
            Security::new("A"),
            Snapshot::new(date(2024, 1, 31), 1.0).with_aggregates(aggregates(10.0, 0.0, 0.0)),
        );
        store.insert(
            Security::new("A"),
            Snapshot::new(date(2024, 2, 29), 1.0).with_aggregates(aggregates(20.0, 0.0, 0.0)),
        );
        store.insert(
            Security::new("B"),
            Snapshot::new(date(2024, 2, 7), 1.0).with_aggregates(aggregates(5.0, 0.0, 0.0)),
        );
        store.insert(
            Security::new("B"),
            Snapshot::new(date(2024, 3, 7), 1.0).with_aggregates(aggregates(8.0, 0.0, 0.0)),
        );
        store.insert(Security::new("C"), Snapshot::new(date(2024, 3, 7), 1.0));

        let deltas = per_security_deltas(&store, Lookback::Snapshots(1));
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].period.end, date(2024, 2, 29));
        assert_eq!(deltas[0].aggregates.local_institution, 10.0);
        assert_eq!(deltas[1].period.start, date(2024, 2, 7));
        assert_eq!(deltas[1].aggregates.local_institution, 3.0);

        // Cross-sectionally only C is on the global end date, and it has no start
        let global = resolve_period(&store.dates(), Lookback::Snapshots(1)).unwrap();
        assert!(cross_sectional_deltas(&store, &global).is_empty());
    }

    #[test]
    fn test_peak_step_transfer() {
        let mut store = SnapshotStore::new();
        let steps = [(1, 31, 100.0, 500.0), (2, 29, 180.0, 420.0), (3, 28, 170.0, 430.0)];
        for (m, d, inst, retail) in steps {
            store.insert(
                Security::new("P"),
                Snapshot::new(date(2024, m, d), 1.0).with_aggregates(aggregates(inst, 0.0, retail)),
            );
        }
        let period = Period::new(date(2024, 1, 31), date(2024, 3, 28)).unwrap();
        let delta = compute_delta(store.get("P").unwrap(), &period).unwrap();

        // Steps: +80 - (-80) = 160, then -10 - 10 = -20
        assert_eq!(delta.peak_step_transfer, 160.0);
        assert_eq!(delta.aggregates.net_transfer(), 140.0);
    }
}
