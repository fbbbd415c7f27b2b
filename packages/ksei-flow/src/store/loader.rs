//! CSV ingest for KSEI ownership snapshots.
//!
//! The header is resolved once into a [`Schema`]; rows are then read without
//! probing for optional columns. Aggregate columns that are absent are derived
//! from the granular category columns.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;

use super::SnapshotStore;
use crate::types::{Aggregates, Category, Security, Snapshot};
use crate::{Error, Result};

const CODE_COLUMN: &str = "Code";
const DATE_COLUMNS: [&str; 2] = ["Last Trading Date", "Date"];
const PRICE_COLUMN: &str = "Price";
const TOTAL_SHARES_COLUMN: &str = "Total_Saham_KSEI";
const DESCRIPTION_COLUMN: &str = "Description";
const SECTOR_COLUMN: &str = "Sector";

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Column positions resolved from the CSV header.
#[derive(Debug, Clone)]
pub struct Schema {
    code: usize,
    date: usize,
    price: Option<usize>,
    categories: [Option<usize>; Category::COUNT],
    local_institution: Option<usize>,
    foreign_institution: Option<usize>,
    local_retail: Option<usize>,
    foreign_retail: Option<usize>,
    total_shares: Option<usize>,
    description: Option<usize>,
    sector: Option<usize>,
}

impl Schema {
    /// Resolve column positions. `Code` and a date column are required.
    pub fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };

        let code =
            find(CODE_COLUMN).ok_or_else(|| Error::MissingColumn(CODE_COLUMN.to_string()))?;
        let date = DATE_COLUMNS
            .iter()
            .find_map(|name| find(name))
            .ok_or_else(|| Error::MissingColumn(DATE_COLUMNS.join(" or ")))?;

        let mut categories = [None; Category::COUNT];
        for category in Category::all() {
            categories[category.index()] = find(&category.column_name());
        }

        Ok(Self {
            code,
            date,
            price: find(PRICE_COLUMN),
            categories,
            local_institution: find("Local_Institusi"),
            foreign_institution: find("Foreign_Institusi"),
            local_retail: find("Local_Retail"),
            foreign_retail: find("Foreign_Retail"),
            total_shares: find(TOTAL_SHARES_COLUMN),
            description: find(DESCRIPTION_COLUMN),
            sector: find(SECTOR_COLUMN),
        })
    }

    /// Granular categories with no column; they read as zero.
    pub fn missing_categories(&self) -> Vec<Category> {
        Category::all()
            .filter(|c| self.categories[c.index()].is_none())
            .collect()
    }

    /// Whether at least one aggregate is derived from granular columns.
    pub fn derives_aggregates(&self) -> bool {
        self.local_institution.is_none()
            || self.foreign_institution.is_none()
            || self.local_retail.is_none()
            || self.foreign_retail.is_none()
    }

    fn parse_row(
        &self,
        record: &StringRecord,
        report: &mut LoadReport,
    ) -> std::result::Result<(Security, Snapshot), String> {
        let code = field(record, Some(self.code)).unwrap_or_default();
        if code.is_empty() {
            return Err("empty security code".to_string());
        }

        let raw_date = field(record, Some(self.date)).unwrap_or_default();
        let date =
            parse_date(raw_date).ok_or_else(|| format!("unparseable date '{}'", raw_date))?;

        let mut security = Security::new(code);
        if let Some(name) = field(record, self.description).filter(|s| !s.is_empty()) {
            security = security.with_name(name);
        }
        if let Some(sector) = field(record, self.sector).filter(|s| !s.is_empty()) {
            security = security.with_sector(sector);
        }

        let price = parse_number(field(record, self.price));
        let mut snapshot = Snapshot::new(date, price);

        for category in Category::all() {
            let column = self.categories[category.index()];
            let shares = self.share_count(record, column, report);
            snapshot.holdings[category.index()] = shares;
        }

        let derived = Aggregates::from_holdings(&snapshot.holdings);
        let mut resolve = |column: Option<usize>, fallback: f64| match column {
            Some(_) => self.share_count(record, column, report),
            None => fallback,
        };
        let aggregates = Aggregates {
            local_institution: resolve(self.local_institution, derived.local_institution),
            foreign_institution: resolve(self.foreign_institution, derived.foreign_institution),
            local_retail: resolve(self.local_retail, derived.local_retail),
            foreign_retail: resolve(self.foreign_retail, derived.foreign_retail),
        };
        snapshot = snapshot.with_aggregates(aggregates);

        if self.total_shares.is_some() {
            snapshot.total_shares = Some(self.share_count(record, self.total_shares, report));
        }

        Ok((security, snapshot))
    }

    fn share_count(
        &self,
        record: &StringRecord,
        column: Option<usize>,
        report: &mut LoadReport,
    ) -> f64 {
        let value = parse_number(field(record, column));
        if value < 0.0 {
            report.clamped_values += 1;
            return 0.0;
        }
        value
    }
}

/// Row that could not be turned into a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct RowIssue {
    pub line: u64,
    pub message: String,
}

/// Summary of a CSV load.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    /// Data rows read (excluding the header)
    pub rows_read: usize,
    /// Rows stored as snapshots
    pub rows_used: usize,
    /// Rows dropped for a missing code or an unparseable date
    pub skipped_rows: Vec<RowIssue>,
    /// Rows that replaced an earlier row for the same code and date
    pub duplicate_rows: usize,
    /// Negative share counts clamped to zero
    pub clamped_values: usize,
    /// Category columns absent from the header
    pub missing_categories: Vec<String>,
    /// Whether Institution/Retail were derived from granular columns
    pub derived_aggregates: bool,
}

/// Load a snapshot store from a CSV file.
pub fn load_csv(path: impl AsRef<Path>) -> Result<(SnapshotStore, LoadReport)> {
    let path = path.as_ref();
    let file = File::open(path)?;
    tracing::debug!("Loading snapshots from {}", path.display());
    load_reader(file)
}

/// Load a snapshot store from any CSV reader.
pub fn load_reader<R: Read>(reader: R) -> Result<(SnapshotStore, LoadReport)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let schema = Schema::from_headers(reader.headers()?)?;
    let mut report = LoadReport {
        missing_categories: schema
            .missing_categories()
            .iter()
            .map(|c| c.column_name())
            .collect(),
        derived_aggregates: schema.derives_aggregates(),
        ..Default::default()
    };

    let mut store = SnapshotStore::new();
    for record in reader.records() {
        let record = record?;
        report.rows_read += 1;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        match schema.parse_row(&record, &mut report) {
            Ok((security, snapshot)) => {
                let code = security.code.clone();
                let date = snapshot.date;
                if store.insert(security, snapshot).is_some() {
                    tracing::warn!(
                        "Duplicate snapshot for {} on {} at line {}, keeping the later row",
                        code,
                        date,
                        line
                    );
                    report.duplicate_rows += 1;
                } else {
                    report.rows_used += 1;
                }
            }
            Err(message) => {
                tracing::warn!("Skipping line {}: {}", line, message);
                report.skipped_rows.push(RowIssue { line, message });
            }
        }
    }

    if report.clamped_values > 0 {
        tracing::warn!("Clamped {} negative share counts to zero", report.clamped_values);
    }
    tracing::debug!(
        "Loaded {} snapshots for {} securities ({} rows skipped)",
        store.snapshot_count(),
        store.len(),
        report.skipped_rows.len()
    );

    Ok((store, report))
}

fn field(record: &StringRecord, column: Option<usize>) -> Option<&str> {
    column.and_then(|idx| record.get(idx)).map(str::trim)
}

/// Lenient numeric parse: blanks and garbage read as zero.
fn parse_number(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}
