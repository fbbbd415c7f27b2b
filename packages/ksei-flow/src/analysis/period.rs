//! Period alignment.
//!
//! Resolves the `(start, end)` snapshot pair for a lookback window. The end is
//! always the latest available date; the start is the latest available date at
//! or before the target, never an interpolated or future date.

use std::collections::BTreeSet;

use chrono::{Datelike, Days, Months, NaiveDate};

use crate::types::{Lookback, Period};
use crate::{Error, Result};

/// Resolve a period from a set of snapshot dates.
///
/// # Arguments
///
/// * `dates` - Available snapshot dates (any order, duplicates ignored)
/// * `lookback` - Window length measured back from the latest date
///
/// # Returns
///
/// The aligned `Period`, or `Error::InsufficientHistory` when there are fewer
/// than two distinct dates or nothing at or before the target start.
///
/// # Example
///
/// ```rust
/// use chrono::NaiveDate;
/// use ksei_flow::analysis::resolve_period;
/// use ksei_flow::Lookback;
///
/// let dates = [
///     NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
///     NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
///     NaiveDate::from_ymd_opt(2024, 3, 28).unwrap(),
/// ];
///
/// let period = resolve_period(&dates, Lookback::Days(45)).unwrap();
/// assert_eq!(period.start, dates[0]);
/// assert_eq!(period.end, dates[2]);
/// ```
pub fn resolve_period(dates: &[NaiveDate], lookback: Lookback) -> Result<Period> {
    lookback.validate()?;

    let dates: Vec<NaiveDate> = dates
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if dates.len() < 2 {
        return Err(Error::InsufficientHistory(format!(
            "need at least 2 distinct dates, found {}",
            dates.len()
        )));
    }

    let end_idx = dates.len() - 1;
    let end = dates[end_idx];

    let start = match lookback {
        Lookback::Snapshots(n) => {
            if n > end_idx {
                return Err(Error::InsufficientHistory(format!(
                    "{} snapshots requested before {}, only {} available",
                    n, end, end_idx
                )));
            }
            dates[end_idx - n]
        }
        Lookback::Days(_) | Lookback::Months(_) => {
            let target = target_start(end, lookback).ok_or_else(|| {
                Error::InsufficientHistory(format!("{} before {} is out of range", lookback, end))
            })?;
            nearest_past(&dates, target).ok_or_else(|| {
                Error::InsufficientHistory(format!(
                    "no snapshot at or before {} (earliest is {})",
                    target, dates[0]
                ))
            })?
        }
    };

    Period::new(start, end)
}

/// Calendar target for a day or month lookback. Snapshot lookbacks have no calendar target.
pub fn target_start(end: NaiveDate, lookback: Lookback) -> Option<NaiveDate> {
    match lookback {
        Lookback::Days(n) => end.checked_sub_days(Days::new(u64::from(n))),
        Lookback::Months(n) => {
            let target = end.checked_sub_months(Months::new(n))?;
            if is_month_end(end) {
                month_end(target)
            } else {
                Some(target)
            }
        }
        Lookback::Snapshots(_) => None,
    }
}

/// Latest date in `sorted` that is not after `target`.
fn nearest_past(sorted: &[NaiveDate], target: NaiveDate) -> Option<NaiveDate> {
    let idx = sorted.partition_point(|d| *d <= target);
    idx.checked_sub(1).map(|i| sorted[i])
}

fn is_month_end(date: NaiveDate) -> bool {
    date.succ_opt().map(|next| next.month() != date.month()).unwrap_or(true)
}

fn month_end(date: NaiveDate) -> Option<NaiveDate> {
    let first = date.with_day(1)?;
    first.checked_add_months(Months::new(1))?.pred_opt()
}
