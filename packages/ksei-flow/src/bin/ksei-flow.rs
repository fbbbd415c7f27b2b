//! KSEI Flow CLI - Command line interface for ownership-shift screening.
//!
//! Output is JSON on stdout; logs go to stderr (`RUST_LOG` controls the level).

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use ksei_flow::{
    load_csv, screen, AlignmentMode, ApiResponse, Lookback, ScoringPolicy, ScreenRequest,
    ScreenerConfig,
};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "ksei-flow")]
#[command(about = "Rank securities by shifts in KSEI ownership composition")]
#[command(version)]
struct Cli {
    /// Config file (defaults to KSEI_FLOW_CONFIG or the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score and rank securities from a snapshot CSV
    Screen(ScreenArgs),
    /// List the distinct snapshot dates in a CSV
    Dates {
        /// Snapshot CSV
        #[arg(short, long)]
        input: PathBuf,
    },
    /// List available scoring policies
    Policies,
    /// Show the effective configuration
    Config,
}

#[derive(Args)]
struct ScreenArgs {
    /// Snapshot CSV
    #[arg(short, long)]
    input: PathBuf,

    /// Scoring policy (accumulation, switching_net, switching_gross, switching_peak)
    #[arg(short, long, value_parser = parse_policy)]
    policy: Option<ScoringPolicy>,

    /// Lookback in calendar days
    #[arg(long, conflicts_with_all = ["months", "snapshots"])]
    days: Option<u32>,

    /// Lookback in calendar months
    #[arg(long, conflicts_with = "snapshots")]
    months: Option<u32>,

    /// Lookback in snapshots before the latest one
    #[arg(long)]
    snapshots: Option<usize>,

    /// Period alignment (cross_sectional, per_security)
    #[arg(short, long, value_parser = parse_mode)]
    mode: Option<AlignmentMode>,

    /// Number of securities to return
    #[arg(short = 'n', long)]
    top: Option<usize>,

    /// Drop securities scoring below this value
    #[arg(long, allow_hyphen_values = true)]
    min_score: Option<f64>,

    /// Keep only this sector
    #[arg(long)]
    sector: Option<String>,
}

impl ScreenArgs {
    fn lookback(&self) -> Option<Lookback> {
        self.days
            .map(Lookback::Days)
            .or(self.months.map(Lookback::Months))
            .or(self.snapshots.map(Lookback::Snapshots))
    }

    fn to_request(&self, config: &ScreenerConfig) -> ScreenRequest {
        let mut request = ScreenRequest::from_config(config);
        if let Some(policy) = self.policy {
            request.policy = policy;
        }
        if let Some(lookback) = self.lookback() {
            request.lookback = lookback;
        }
        if let Some(mode) = self.mode {
            request.mode = mode;
        }
        if let Some(top) = self.top {
            request.top_n = Some(top);
        }
        if let Some(min) = self.min_score {
            request.min_score = Some(min);
        }
        request.sector = self.sector.clone();
        request
    }
}

fn parse_policy(s: &str) -> Result<ScoringPolicy, String> {
    s.parse().map_err(|e: ksei_flow::Error| e.to_string())
}

fn parse_mode(s: &str) -> Result<AlignmentMode, String> {
    s.parse().map_err(|e: ksei_flow::Error| e.to_string())
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(ScreenerConfig::default_path);

    let output = match ScreenerConfig::load_from_path(&config_path) {
        Ok(config) => match cli.command {
            Commands::Screen(args) => handle_screen(&args, &config),
            Commands::Dates { input } => handle_dates(&input),
            Commands::Policies => handle_policies(),
            Commands::Config => render(&ApiResponse::ok(json!({
                "path": config_path,
                "config": config,
            }))),
        },
        Err(e) => render(&ApiResponse::<()>::err(format!(
            "Failed to load config {}: {}",
            config_path.display(),
            e
        ))),
    };

    println!("{}", output);
}

fn render<T: Serialize>(response: &ApiResponse<T>) -> String {
    serde_json::to_string_pretty(response)
        .unwrap_or_else(|e| json!({ "ok": false, "error": e.to_string() }).to_string())
}

fn handle_screen(args: &ScreenArgs, config: &ScreenerConfig) -> String {
    let (store, report) = match load_csv(&args.input) {
        Ok(loaded) => loaded,
        Err(e) => return render(&ApiResponse::<()>::err(e.to_string())),
    };

    let request = args.to_request(config);
    match screen(&store, &request, config) {
        Ok(table) => render(&ApiResponse::ok(json!({
            "status": table.status(),
            "request": request,
            "load": {
                "rows_read": report.rows_read,
                "rows_used": report.rows_used,
                "rows_skipped": report.skipped_rows.len(),
                "securities": store.len(),
            },
            "table": table,
        }))),
        Err(e) => render(&ApiResponse::<()>::err(e.to_string())),
    }
}

fn handle_dates(input: &Path) -> String {
    match load_csv(input) {
        Ok((store, report)) => render(&ApiResponse::ok(json!({
            "dates": store.dates(),
            "as_of": store.as_of(),
            "securities": store.len(),
            "load": report,
        }))),
        Err(e) => render(&ApiResponse::<()>::err(e.to_string())),
    }
}

fn handle_policies() -> String {
    let policies: Vec<_> = ScoringPolicy::ALL
        .iter()
        .map(|p| {
            json!({
                "id": p.id(),
                "description": p.description(),
                "normalized": p.is_normalized(),
            })
        })
        .collect();

    render(&ApiResponse::ok(json!({ "policies": policies })))
}
