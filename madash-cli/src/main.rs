//! MADash CLI — batch jobs for the portfolio analytics backend.
//!
//! Commands:
//! - `db migrate` — create or upgrade the schema
//! - `load backfill|update|summary` — Yahoo Finance prices into the price tables
//! - `quality populate|report` — rebuild and print data-quality status
//! - `risk run` — synthetic data, portfolio returns and risk statistics
//! - `structure` — reference data and fund lookthrough report

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use madash_core::data::{BreakerState, CircuitBreaker, YahooProvider};
use madash_core::domain::PortfolioId;
use madash_runner::{
    risk_pipeline, today, DashboardConfig, LoadMode, LoadOutcome, Loader, PopulateReport,
    QualityReport, RealDataReport, RiskOptions, Store, StructureReport, DATABASE_URL_ENV,
};

#[derive(Parser)]
#[command(
    name = "madash",
    about = "MADash — portfolio analytics batch jobs"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./madash.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database schema management.
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    /// Load market data from Yahoo Finance.
    Load {
        #[command(subcommand)]
        action: LoadAction,
    },
    /// Data-quality status and provenance reports.
    Quality {
        #[command(subcommand)]
        action: QualityAction,
    },
    /// Synthetic data generation and risk calculation.
    Risk {
        #[command(subcommand)]
        action: RiskAction,
    },
    /// Print the structure validation report.
    Structure {
        /// Portfolio id. Defaults to risk.portfolio_id from the config.
        #[arg(long)]
        portfolio: Option<i32>,

        /// Fund to analyse in detail. Defaults to structure.fund from the config.
        #[arg(long)]
        fund: Option<String>,
    },
}

#[derive(Subcommand)]
enum DbAction {
    /// Apply the embedded migrations.
    Migrate,
}

#[derive(Subcommand)]
enum LoadAction {
    /// Fetch everything from the configured start date.
    Backfill,
    /// Fetch from each entity's last real date to today.
    Update,
    /// Print real-data coverage per entity.
    Summary,
}

#[derive(Subcommand)]
enum QualityAction {
    /// Recompute the data_quality_status table.
    Populate,
    /// Print per-source tables and portfolio coverage.
    Report {
        /// Also print the persisted status table with ratings.
        #[arg(long, default_value_t = false)]
        status: bool,

        /// Portfolio id. Defaults to risk.portfolio_id from the config.
        #[arg(long)]
        portfolio: Option<i32>,
    },
}

#[derive(Subcommand)]
enum RiskAction {
    /// Generate missing data, compute portfolio returns and risk statistics.
    Run {
        /// Portfolio id. Defaults to risk.portfolio_id from the config.
        #[arg(long)]
        portfolio: Option<i32>,

        /// Length of generated series in calendar days (at least 2). Defaults to synthetic.days.
        #[arg(long, value_parser = parse_days)]
        days: Option<usize>,

        /// Compute on existing data only.
        #[arg(long, default_value_t = false)]
        skip_generate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = DashboardConfig::load(cli.config.as_deref())
        .context("loading configuration")?
        .with_database_url(std::env::var(DATABASE_URL_ENV).ok());
    tracing::debug!(config = ?cli.config, "configuration loaded");

    let store = Store::connect(&config.database)
        .await
        .context("connecting to database")?;

    let result = match cli.command {
        Commands::Db {
            action: DbAction::Migrate,
        } => run_migrate(&store).await,
        Commands::Load { action } => run_load(&store, &config, action).await,
        Commands::Quality { action } => run_quality(&store, &config, action).await,
        Commands::Risk {
            action:
                RiskAction::Run {
                    portfolio,
                    days,
                    skip_generate,
                },
        } => run_risk(&store, &config, portfolio, days, skip_generate).await,
        Commands::Structure { portfolio, fund } => {
            run_structure(&store, &config, portfolio, fund).await
        }
    };

    store.close().await;
    result
}

fn parse_days(s: &str) -> Result<usize, String> {
    let days: usize = s.parse().map_err(|e| format!("{e}"))?;
    if days < 2 {
        return Err(format!("must be at least 2, got {days}"));
    }
    Ok(days)
}

fn portfolio_or_default(config: &DashboardConfig, portfolio: Option<i32>) -> PortfolioId {
    PortfolioId(portfolio.unwrap_or(config.risk.portfolio_id))
}

async fn run_migrate(store: &Store) -> Result<()> {
    store.migrate().await.context("applying migrations")?;
    println!("Schema is up to date.");
    Ok(())
}

async fn run_load(store: &Store, config: &DashboardConfig, action: LoadAction) -> Result<()> {
    let mode = match action {
        LoadAction::Backfill => LoadMode::Backfill,
        LoadAction::Update => LoadMode::Update,
        LoadAction::Summary => {
            let report = RealDataReport::collect(store).await?;
            print!("{report}");
            return Ok(());
        }
    };

    let circuit_breaker = Arc::new(CircuitBreaker::default());
    let provider = YahooProvider::new(Arc::clone(&circuit_breaker))?.with_retries(
        config.loader.max_retries,
        Duration::from_millis(config.loader.request_delay_ms),
    );

    let summary = Loader::new(store, &provider, &config.loader)
        .run(mode, today())
        .await?;
    print!("{summary}");

    if !summary.all_succeeded() {
        for s in &summary.symbols {
            if let LoadOutcome::Failed(err) = &s.outcome {
                eprintln!("Error for {}: {err}", s.symbol);
            }
        }
        if let BreakerState::Open { .. } = circuit_breaker.state() {
            eprintln!(
                "Yahoo Finance refused further requests; retry in {} minutes",
                circuit_breaker.remaining_cooldown().as_secs().div_ceil(60)
            );
        }
        bail!("{} of {} symbols failed to load", summary.failed(), summary.symbols.len());
    }
    Ok(())
}

async fn run_quality(
    store: &Store,
    config: &DashboardConfig,
    action: QualityAction,
) -> Result<()> {
    match action {
        QualityAction::Populate => {
            let report = PopulateReport::run(store)
                .await
                .context("rebuilding data quality status")?;
            print!("{report}");
        }
        QualityAction::Report { status, portfolio } => {
            let portfolio = portfolio_or_default(config, portfolio);
            let report = QualityReport::collect(store, portfolio, today(), status).await?;
            print!("{report}");
        }
    }
    Ok(())
}

async fn run_risk(
    store: &Store,
    config: &DashboardConfig,
    portfolio: Option<i32>,
    days: Option<usize>,
    skip_generate: bool,
) -> Result<()> {
    let opts = RiskOptions {
        portfolio: portfolio_or_default(config, portfolio),
        days: days.unwrap_or(config.synthetic.days),
        skip_generate,
        today: today(),
    };
    let run = risk_pipeline::run(store, config, opts).await?;
    print!("{run}");
    Ok(())
}

async fn run_structure(
    store: &Store,
    config: &DashboardConfig,
    portfolio: Option<i32>,
    fund: Option<String>,
) -> Result<()> {
    let mut structure = config.structure.clone();
    if let Some(fund) = fund {
        structure.fund = fund;
    }
    let portfolio = portfolio_or_default(config, portfolio);
    let report = StructureReport::collect(store, &structure, portfolio, today()).await?;
    print!("{report}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_risk_flags() {
        let cli = Cli::parse_from([
            "madash",
            "--config",
            "local.toml",
            "risk",
            "run",
            "--portfolio",
            "2",
            "--days",
            "90",
            "--skip-generate",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("local.toml")));
        match cli.command {
            Commands::Risk {
                action:
                    RiskAction::Run {
                        portfolio,
                        days,
                        skip_generate,
                    },
            } => {
                assert_eq!(portfolio, Some(2));
                assert_eq!(days, Some(90));
                assert!(skip_generate);
            }
            _ => panic!("expected risk run"),
        }
    }

    #[test]
    fn rejects_series_shorter_than_two_days() {
        for days in ["0", "1"] {
            assert!(Cli::try_parse_from(["madash", "risk", "run", "--days", days]).is_err());
        }
        assert!(Cli::try_parse_from(["madash", "risk", "run", "--days", "2"]).is_ok());
    }

    #[test]
    fn parses_quality_report_status() {
        let cli = Cli::parse_from(["madash", "quality", "report", "--status"]);
        assert!(matches!(
            cli.command,
            Commands::Quality {
                action: QualityAction::Report {
                    status: true,
                    portfolio: None
                }
            }
        ));
    }

    #[test]
    fn portfolio_falls_back_to_config() {
        let config = DashboardConfig::default();
        assert_eq!(portfolio_or_default(&config, None), PortfolioId(1));
        assert_eq!(portfolio_or_default(&config, Some(3)), PortfolioId(3));
    }
}
