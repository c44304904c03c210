//! Fraud analytics dashboard CLI.
//!
//! Loads a model's scored transactions from the scoring service (or the
//! synthetic dataset with `--offline`) and prints the dashboard views.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fraudlens::application::comparison::ComparisonSession;
use fraudlens::application::dashboard::{DashboardSession, DashboardSettings};
use fraudlens::config::Config;
use fraudlens::domain::ports::ScoringService;
use fraudlens::domain::transaction::ModelKind;
use fraudlens::infrastructure::export::{ExportScope, export_to_dir};
use fraudlens::infrastructure::{DashboardMetrics, HttpScoringService, synthetic};
use fraudlens::interfaces::reporting::DashboardReporter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about = "Fraud detection analytics dashboard", long_about = None)]
struct Cli {
    /// Use the seeded synthetic dataset instead of the scoring service
    #[arg(long, global = true)]
    offline: bool,

    /// Seed for the synthetic dataset
    #[arg(long, global = true, default_value_t = synthetic::DEFAULT_SEED)]
    seed: u64,

    /// Model to load (xgboost, tensorflow); overrides MODEL
    #[arg(short, long, global = true)]
    model: Option<ModelKind>,

    /// Print the Prometheus metrics after the command
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Metrics, aggregates and top risk at a threshold
    Summary {
        #[arg(short, long)]
        threshold: Option<f64>,
    },
    /// Replay a burst of threshold changes through the controller
    Sweep {
        /// Comma-separated thresholds, applied in order
        #[arg(short, long, default_value = "0.4,0.5,0.6")]
        thresholds: String,

        /// Pause between changes in milliseconds
        #[arg(short, long, default_value = "50")]
        interval_ms: u64,
    },
    /// Side-by-side metrics for both models
    Compare {
        #[arg(short, long)]
        threshold: Option<f64>,
    },
    /// Per-feature attribution for one transaction
    Explain {
        /// Transaction id, e.g. TXN-00042
        id: String,
    },
    /// Write transactions to CSV
    Export {
        /// flagged or all
        #[arg(short, long, default_value = "flagged")]
        scope: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        #[arg(short, long)]
        threshold: Option<f64>,
    },
}

fn parse_thresholds(raw: &str) -> Result<Vec<f64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .with_context(|| format!("Invalid threshold: {}", s))
        })
        .collect()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let metrics = if config.observability.metrics_enabled {
        Some(DashboardMetrics::new().context("Failed to register metrics")?)
    } else {
        None
    };

    let service: Arc<dyn ScoringService> = if cli.offline {
        info!(seed = cli.seed, "Using synthetic dataset");
        Arc::new(synthetic::generate(synthetic::DEFAULT_COUNT, cli.seed).into_mock())
    } else {
        Arc::new(HttpScoringService::new(
            &config.scoring.api_url,
            config.scoring.timeout(),
            config.scoring.max_retries,
            metrics.clone(),
        ))
    };

    let model = cli.model.unwrap_or(config.dashboard.model);
    let mut settings = DashboardSettings::from_config(&config, metrics.clone());
    let reporter = DashboardReporter;

    match cli.command {
        Commands::Summary { threshold } => {
            if let Some(t) = threshold {
                settings.initial_threshold = t;
            }
            let session = DashboardSession::load(service, model, settings).await?;
            reporter.print_summary(&session);
        }
        Commands::Sweep {
            thresholds,
            interval_ms,
        } => {
            let thresholds = parse_thresholds(&thresholds)?;
            let session = DashboardSession::load(service, model, settings).await?;
            for t in &thresholds {
                session.set_threshold(*t)?;
                tokio::time::sleep(Duration::from_millis(interval_ms)).await;
            }
            session.settled().await;
            reporter.print_sweep(&session, thresholds.len());
        }
        Commands::Compare { threshold } => {
            if let Some(t) = threshold {
                settings.initial_threshold = t;
            }
            let session =
                ComparisonSession::load_pair(service, model, model.counterpart(), settings).await?;
            reporter.print_comparison(&session);
        }
        Commands::Explain { id } => {
            let session = DashboardSession::load(service, model, settings).await?;
            session.select_transaction(Some(&id))?;
            let view = session.explanation_settled().await;
            reporter.print_explanation(session.selected_transaction(), &view);
        }
        Commands::Export {
            scope,
            dir,
            threshold,
        } => {
            let scope: ExportScope = scope.parse()?;
            if let Some(t) = threshold {
                settings.initial_threshold = t;
            }
            let session = DashboardSession::load(service, model, settings).await?;
            let date = chrono::Local::now().date_naive();
            let path = export_to_dir(
                &dir,
                scope,
                model,
                session.threshold(),
                session.transactions().as_slice(),
                date,
            )?;
            println!("Exported to {}", path.display());
        }
    }

    if cli.print_metrics
        && let Some(metrics) = &metrics
    {
        println!("\n{}", metrics.render());
    }

    Ok(())
}
