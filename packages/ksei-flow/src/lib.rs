//! KSEI Flow - Ownership-shift screening library.
//!
//! This crate ranks securities by how much their ownership composition moved
//! between two snapshot dates:
//!
//! - **Snapshot store**: Per-security ownership series loaded from CSV
//! - **Period alignment**: Nearest-past start date for a lookback window
//! - **Deltas**: Per-category and Institution/Retail changes between two snapshots
//! - **Scoring**: Accumulation, net switching, gross switching and peak switching
//! - **Ranking**: Deterministic top-N signal tables
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use ksei_flow::analysis::{screen, ScreenRequest};
//! use ksei_flow::store::SnapshotStore;
//! use ksei_flow::types::{Aggregates, Lookback, ScoringPolicy, Security, Snapshot};
//!
//! let jan = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
//! let feb = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
//!
//! let mut store = SnapshotStore::new();
//! store.insert(
//!     Security::new("BBCA"),
//!     Snapshot::new(jan, 9_000.0).with_aggregates(Aggregates {
//!         local_institution: 100.0,
//!         local_retail: 500.0,
//!         ..Default::default()
//!     }),
//! );
//! store.insert(
//!     Security::new("BBCA"),
//!     Snapshot::new(feb, 9_500.0).with_aggregates(Aggregates {
//!         local_institution: 150.0,
//!         local_retail: 460.0,
//!         ..Default::default()
//!     }),
//! );
//!
//! let request = ScreenRequest::new(ScoringPolicy::SwitchingNet, Lookback::Months(1));
//! let table = screen(&store, &request, &Default::default()).unwrap();
//!
//! assert_eq!(table.records[0].code, "BBCA");
//! assert_eq!(table.records[0].score, 90.0);
//! ```

pub mod analysis;
pub mod config;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use types::{
    Aggregates, AlignmentMode, ApiResponse, Category, DeltaRecord, HolderKind, Lookback, Origin,
    Period, ScoreRecord, ScoringPolicy, Security, Snapshot,
};

// Re-export main functionality
pub use analysis::{screen, ScreenRequest, SignalTable, TableStatus};
pub use config::{AccumulationWeights, ScreenerConfig};
pub use store::{load_csv, LoadReport, SnapshotStore};

/// Error types for ksei-flow operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Invalid row at line {line}: {message}")]
    InvalidRow { line: u64, message: String },

    #[error("Insufficient history: {0}")]
    InsufficientHistory(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for ksei-flow operations.
pub type Result<T> = std::result::Result<T, Error>;
