//! Core data types for the ownership-shift screener.

use std::fmt;
use std::ops::Sub;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Reference data for a listed security.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Security {
    /// Ticker code (uppercase)
    pub code: String,
    /// Company name, from the `Description` column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Sector label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
}

impl Security {
    /// Create a security with only a code.
    pub fn new(code: &str) -> Self {
        Self {
            code: code.trim().to_uppercase(),
            name: None,
            sector: None,
        }
    }

    /// Attach a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a sector.
    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }
}

/// Where an investor is domiciled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Local,
    Foreign,
}

impl Origin {
    pub const ALL: [Origin; 2] = [Origin::Local, Origin::Foreign];

    /// Column prefix used in the KSEI dataset.
    pub fn label(&self) -> &'static str {
        match self {
            Origin::Local => "Local",
            Origin::Foreign => "Foreign",
        }
    }
}

/// KSEI investor type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum HolderKind {
    Insurance,
    Corporate,
    PensionFund,
    Bank,
    Individual,
    MutualFund,
    SecuritiesCompany,
    Foundation,
    Other,
}

impl HolderKind {
    pub const ALL: [HolderKind; 9] = [
        HolderKind::Insurance,
        HolderKind::Corporate,
        HolderKind::PensionFund,
        HolderKind::Bank,
        HolderKind::Individual,
        HolderKind::MutualFund,
        HolderKind::SecuritiesCompany,
        HolderKind::Foundation,
        HolderKind::Other,
    ];

    /// Two-letter KSEI abbreviation.
    pub fn code(&self) -> &'static str {
        match self {
            HolderKind::Insurance => "IS",
            HolderKind::Corporate => "CP",
            HolderKind::PensionFund => "PF",
            HolderKind::Bank => "IB",
            HolderKind::Individual => "ID",
            HolderKind::MutualFund => "MF",
            HolderKind::SecuritiesCompany => "SC",
            HolderKind::Foundation => "FD",
            HolderKind::Other => "OT",
        }
    }

    /// Individuals are retail; every other kind counts as institution.
    pub fn is_retail(&self) -> bool {
        matches!(self, HolderKind::Individual)
    }
}

/// One of the 18 granular ownership buckets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Category {
    pub origin: Origin,
    pub kind: HolderKind,
}

impl Category {
    /// Number of granular categories (2 origins x 9 kinds).
    pub const COUNT: usize = 18;

    pub fn new(origin: Origin, kind: HolderKind) -> Self {
        Self { origin, kind }
    }

    /// All categories in column order: local kinds first, then foreign.
    pub fn all() -> impl Iterator<Item = Category> {
        Origin::ALL.into_iter().flat_map(|origin| {
            HolderKind::ALL
                .into_iter()
                .map(move |kind| Category::new(origin, kind))
        })
    }

    /// Position of this category inside a `[f64; Category::COUNT]` array.
    pub fn index(&self) -> usize {
        let origin = match self.origin {
            Origin::Local => 0,
            Origin::Foreign => 1,
        };
        let kind = HolderKind::ALL
            .iter()
            .position(|k| *k == self.kind)
            .unwrap_or_default();
        origin * HolderKind::ALL.len() + kind
    }

    /// Dataset column name, e.g. `Local IS` or `Foreign ID`.
    pub fn column_name(&self) -> String {
        format!("{} {}", self.origin.label(), self.kind.code())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.origin.label(), self.kind.code())
    }
}

/// Institution/Retail totals per origin.
///
/// Used both for a snapshot's holdings and for deltas between two snapshots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Aggregates {
    pub local_institution: f64,
    pub foreign_institution: f64,
    pub local_retail: f64,
    pub foreign_retail: f64,
}

impl Aggregates {
    /// Derive aggregates from granular holdings: Retail is `ID`, Institution is everything else.
    pub fn from_holdings(holdings: &[f64; Category::COUNT]) -> Self {
        let mut aggregates = Self::default();
        for category in Category::all() {
            let value = holdings[category.index()];
            let slot = match (category.origin, category.kind.is_retail()) {
                (Origin::Local, false) => &mut aggregates.local_institution,
                (Origin::Local, true) => &mut aggregates.local_retail,
                (Origin::Foreign, false) => &mut aggregates.foreign_institution,
                (Origin::Foreign, true) => &mut aggregates.foreign_retail,
            };
            *slot += value;
        }
        aggregates
    }

    /// Local plus foreign institution.
    pub fn total_institution(&self) -> f64 {
        self.local_institution + self.foreign_institution
    }

    /// Local plus foreign retail.
    pub fn total_retail(&self) -> f64 {
        self.local_retail + self.foreign_retail
    }

    pub fn total_local(&self) -> f64 {
        self.local_institution + self.local_retail
    }

    pub fn total_foreign(&self) -> f64 {
        self.foreign_institution + self.foreign_retail
    }

    /// Net retail-to-institution transfer: `Δinstitution - Δretail`.
    pub fn net_transfer(&self) -> f64 {
        self.total_institution() - self.total_retail()
    }
}

impl Sub for Aggregates {
    type Output = Aggregates;

    fn sub(self, rhs: Aggregates) -> Aggregates {
        Aggregates {
            local_institution: self.local_institution - rhs.local_institution,
            foreign_institution: self.foreign_institution - rhs.foreign_institution,
            local_retail: self.local_retail - rhs.local_retail,
            foreign_retail: self.foreign_retail - rhs.foreign_retail,
        }
    }
}

/// One security's ownership state on one date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    /// Snapshot date
    pub date: NaiveDate,
    /// Closing price on the snapshot date
    pub price: f64,
    /// Share count per granular category, indexed by `Category::index`
    pub holdings: [f64; Category::COUNT],
    /// Institution/Retail totals (pre-aggregated columns or derived)
    pub aggregates: Aggregates,
    /// Shares registered at KSEI, when reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_shares: Option<f64>,
}

impl Snapshot {
    /// Create an empty snapshot; every category starts at zero.
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self {
            date,
            price,
            holdings: [0.0; Category::COUNT],
            aggregates: Aggregates::default(),
            total_shares: None,
        }
    }

    /// Set one granular holding and re-derive the aggregates from holdings.
    pub fn with_holding(mut self, category: Category, shares: f64) -> Self {
        self.holdings[category.index()] = shares;
        self.aggregates = Aggregates::from_holdings(&self.holdings);
        self
    }

    /// Override the aggregates, e.g. with pre-aggregated dataset columns.
    pub fn with_aggregates(mut self, aggregates: Aggregates) -> Self {
        self.aggregates = aggregates;
        self
    }

    /// Share count for a category.
    pub fn holding(&self, category: Category) -> f64 {
        self.holdings[category.index()]
    }
}

/// A resolved pair of snapshot dates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// Create a period, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidParameter(format!(
                "period start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Calendar days between start and end.
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Whether `date` falls inside the period, both ends inclusive.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Requested window length, measured back from the latest snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Lookback {
    /// Calendar days
    Days(u32),
    /// Calendar months, snapping to month end when the end date is a month end
    Months(u32),
    /// Number of distinct snapshots before the end date
    Snapshots(usize),
}

impl Lookback {
    /// Reject zero-length windows.
    pub fn validate(&self) -> Result<()> {
        let is_zero = match self {
            Lookback::Days(n) | Lookback::Months(n) => *n == 0,
            Lookback::Snapshots(n) => *n == 0,
        };
        if is_zero {
            return Err(Error::InvalidParameter(format!(
                "lookback must be positive, got {}",
                self
            )));
        }
        Ok(())
    }
}

impl Default for Lookback {
    fn default() -> Self {
        Lookback::Days(30)
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookback::Days(n) => write!(f, "{} days", n),
            Lookback::Months(n) => write!(f, "{} months", n),
            Lookback::Snapshots(n) => write!(f, "{} snapshots", n),
        }
    }
}

/// How the start snapshot is chosen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentMode {
    /// One global period shared by every security
    #[default]
    CrossSectional,
    /// Each security resolves its own period from its own dates
    PerSecurity,
}

impl FromStr for AlignmentMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "cross_sectional" | "cross" => Ok(AlignmentMode::CrossSectional),
            "per_security" | "per" => Ok(AlignmentMode::PerSecurity),
            other => Err(Error::InvalidParameter(format!(
                "unknown alignment mode: {}",
                other
            ))),
        }
    }
}

/// Named scoring policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// Weighted z-scores of institution buying and retail selling, price confirmed
    #[default]
    Accumulation,
    /// Raw `Δinstitution - Δretail`
    SwitchingNet,
    /// Sum of absolute deltas over all 18 categories
    SwitchingGross,
    /// Largest single-step net transfer between consecutive snapshots
    SwitchingPeak,
}

impl ScoringPolicy {
    pub const ALL: [ScoringPolicy; 4] = [
        ScoringPolicy::Accumulation,
        ScoringPolicy::SwitchingNet,
        ScoringPolicy::SwitchingGross,
        ScoringPolicy::SwitchingPeak,
    ];

    /// Stable identifier.
    pub fn id(&self) -> &'static str {
        match self {
            ScoringPolicy::Accumulation => "accumulation",
            ScoringPolicy::SwitchingNet => "switching_net",
            ScoringPolicy::SwitchingGross => "switching_gross",
            ScoringPolicy::SwitchingPeak => "switching_peak",
        }
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            ScoringPolicy::Accumulation => {
                "Institutions accumulating while retail distributes, with a bonus when price rises"
            }
            ScoringPolicy::SwitchingNet => {
                "Largest net transfer from retail to institutional hands"
            }
            ScoringPolicy::SwitchingGross => {
                "Total reshuffling across all 18 investor categories regardless of direction"
            }
            ScoringPolicy::SwitchingPeak => {
                "Largest net retail-to-institution transfer between two consecutive snapshots"
            }
        }
    }

    /// Whether the policy needs cross-sectional normalization.
    pub fn is_normalized(&self) -> bool {
        matches!(self, ScoringPolicy::Accumulation)
    }
}

impl fmt::Display for ScoringPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ScoringPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "accumulation" | "akumulasi" => Ok(ScoringPolicy::Accumulation),
            "switching_net" | "net" => Ok(ScoringPolicy::SwitchingNet),
            "switching_gross" | "gross" | "turnover" => Ok(ScoringPolicy::SwitchingGross),
            "switching_peak" | "peak" => Ok(ScoringPolicy::SwitchingPeak),
            other => Err(Error::InvalidParameter(format!(
                "unknown scoring policy: {}",
                other
            ))),
        }
    }
}

/// Ownership and price change of one security over a period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeltaRecord {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    /// Dates of the two snapshots compared
    pub period: Period,
    pub start_price: f64,
    pub end_price: f64,
    /// Price change in percent; `None` when the start price is zero
    pub price_change_pct: Option<f64>,
    /// `end - start` per granular category, indexed by `Category::index`
    pub categories: [f64; Category::COUNT],
    /// `end - start` of the Institution/Retail aggregates
    pub aggregates: Aggregates,
    /// Largest `Δinstitution - Δretail` between consecutive snapshots in the period
    pub peak_step_transfer: f64,
}

impl DeltaRecord {
    /// Delta of one granular category.
    pub fn category(&self, category: Category) -> f64 {
        self.categories[category.index()]
    }

    /// Sum of absolute category deltas.
    pub fn gross_turnover(&self) -> f64 {
        self.categories.iter().map(|d| d.abs()).sum()
    }
}

/// Accumulation z-score components, retail already sign-inverted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct NormalizedComponents {
    pub local_institution: f64,
    pub foreign_institution: f64,
    pub local_retail: f64,
}

/// A scored security, ready for ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreRecord {
    pub code: String,
    /// Company name, or the code when the dataset has none
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    pub policy: ScoringPolicy,
    /// Ranking value
    pub score: f64,
    pub period: Period,
    pub end_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_pct: Option<f64>,
    /// Raw aggregate deltas
    pub deltas: Aggregates,
    /// Sum of absolute category deltas
    pub gross_turnover: f64,
    /// z-score components (accumulation only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<NormalizedComponents>,
}

/// API response wrapper for success cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
