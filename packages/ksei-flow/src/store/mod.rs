//! Snapshot storage.
//!
//! Holds the read-only ownership series for every security, ordered by date.

mod loader;

pub use loader::{load_csv, load_reader, LoadReport, Schema};

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::types::{Period, Security, Snapshot};

/// Date-ordered snapshots of a single security.
#[derive(Debug, Clone)]
pub struct SecuritySeries {
    security: Security,
    /// Sorted ascending by date, at most one snapshot per date
    snapshots: Vec<Snapshot>,
}

impl SecuritySeries {
    fn new(security: Security) -> Self {
        Self {
            security,
            snapshots: Vec::new(),
        }
    }

    /// Reference data for this series.
    pub fn security(&self) -> &Security {
        &self.security
    }

    pub fn code(&self) -> &str {
        &self.security.code
    }

    /// All snapshots, oldest first.
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Distinct snapshot dates, oldest first.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.snapshots.iter().map(|s| s.date).collect()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Snapshot taken exactly on `date`.
    pub fn at(&self, date: NaiveDate) -> Option<&Snapshot> {
        self.snapshots
            .binary_search_by_key(&date, |s| s.date)
            .ok()
            .map(|idx| &self.snapshots[idx])
    }

    /// Most recent snapshot.
    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// Snapshots whose date falls inside `period`, oldest first.
    pub fn within(&self, period: &Period) -> &[Snapshot] {
        let lo = self.snapshots.partition_point(|s| s.date < period.start);
        let hi = self.snapshots.partition_point(|s| s.date <= period.end);
        &self.snapshots[lo..hi.max(lo)]
    }

    /// Insert keeping date order; replaces and returns an existing snapshot on the same date.
    fn insert(&mut self, snapshot: Snapshot) -> Option<Snapshot> {
        match self.snapshots.binary_search_by_key(&snapshot.date, |s| s.date) {
            Ok(idx) => Some(std::mem::replace(&mut self.snapshots[idx], snapshot)),
            Err(idx) => {
                self.snapshots.insert(idx, snapshot);
                None
            }
        }
    }
}

/// In-memory store of every security's ownership series.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    series: BTreeMap<String, SecuritySeries>,
}

impl SnapshotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a snapshot for `security`.
    ///
    /// Name and sector follow the most recent snapshot date that provides
    /// them, regardless of insertion order. Returns the snapshot it replaced
    /// when the date was already present.
    pub fn insert(&mut self, security: Security, snapshot: Snapshot) -> Option<Snapshot> {
        let series = self
            .series
            .entry(security.code.clone())
            .or_insert_with(|| SecuritySeries::new(Security::new(&security.code)));

        let is_latest = series.latest().map_or(true, |last| snapshot.date >= last.date);
        if is_latest || series.security.name.is_none() {
            if let Some(name) = security.name {
                series.security.name = Some(name);
            }
        }
        if is_latest || series.security.sector.is_none() {
            if let Some(sector) = security.sector {
                series.security.sector = Some(sector);
            }
        }

        series.insert(snapshot)
    }

    /// Number of securities.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Total number of snapshots across all securities.
    pub fn snapshot_count(&self) -> usize {
        self.series.values().map(|s| s.len()).sum()
    }

    /// Series for one security code.
    pub fn get(&self, code: &str) -> Option<&SecuritySeries> {
        self.series.get(&code.trim().to_uppercase())
    }

    /// All series ordered by security code.
    pub fn iter(&self) -> impl Iterator<Item = &SecuritySeries> {
        self.series.values()
    }

    /// Distinct snapshot dates across every security, oldest first.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.series
            .values()
            .flat_map(|s| s.snapshots.iter().map(|snap| snap.date))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Latest date in the whole store.
    pub fn as_of(&self) -> Option<NaiveDate> {
        self.series
            .values()
            .filter_map(|s| s.latest().map(|snap| snap.date))
            .max()
    }

    /// Every security that has a snapshot on `date`.
    pub fn cross_section(
        &self,
        date: NaiveDate,
    ) -> impl Iterator<Item = (&SecuritySeries, &Snapshot)> {
        self.series
            .values()
            .filter_map(move |series| series.at(date).map(|snap| (series, snap)))
    }
}
