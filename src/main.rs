//! Port Risk Engine - Command line
//!
//! Reads an operational snapshot from a JSON file and prints prediction,
//! cascade, network or comparison payloads as JSON on stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use port_risk_engine::propagation::PropagationWeights;
use port_risk_engine::{Config, RiskService, Snapshot};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "portrisk")]
#[command(about = "Port network risk propagation and cascade simulation")]
struct Cli {
    /// YAML config file (defaults to ./config.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict risk for every port in the network
    Predict {
        /// Snapshot JSON file
        #[arg(short, long)]
        snapshot: PathBuf,
    },

    /// Simulate a cascading failure from one port
    Cascade {
        /// Snapshot JSON file
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Source port code (case-insensitive)
        #[arg(short, long)]
        port: String,
    },

    /// Export the network for visualization
    Network {
        /// Snapshot JSON file
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Annotate nodes with predicted risk
        #[arg(long)]
        with_risk: bool,
    },

    /// Compare propagated risk with the congestion-only baseline
    Compare {
        /// Snapshot JSON file
        #[arg(short, long)]
        snapshot: PathBuf,
    },

    /// Describe the active propagation backend
    Info,

    /// Write the seeded weight set as a safetensors checkpoint
    ExportWeights {
        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing (stderr, stdout carries the JSON payload)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,port_risk_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_yaml_and_env(cli.config.as_deref())?;

    match cli.command {
        Commands::Predict { snapshot } => {
            let service = start_service(&config)?;
            let snapshot = read_snapshot(&snapshot).await?;
            let report =
                blocking(&service, move |s| s.predict_network_risk(&snapshot)).await?;
            tracing::info!(
                "Network risk {:.1} over {} ports ({} high risk)",
                report.network_risk_score,
                report.total_nodes,
                report.high_risk_nodes
            );
            print_json(&report)
        }
        Commands::Cascade { snapshot, port } => {
            let service = start_service(&config)?;
            let snapshot = read_snapshot(&snapshot).await?;
            let port = port.to_uppercase();
            let report =
                blocking(&service, move |s| s.simulate_cascade(&snapshot, &port)).await?;
            print_json(&report)
        }
        Commands::Network {
            snapshot,
            with_risk,
        } => {
            let service = start_service(&config)?;
            let snapshot = read_snapshot(&snapshot).await?;
            let structure =
                blocking(&service, move |s| s.network_structure(&snapshot, with_risk)).await?;
            print_json(&structure)
        }
        Commands::Compare { snapshot } => {
            let service = start_service(&config)?;
            let snapshot = read_snapshot(&snapshot).await?;
            let comparison =
                blocking(&service, move |s| s.compare_with_baseline(&snapshot)).await?;
            print_json(&comparison)
        }
        Commands::Info => print_json(&start_service(&config)?.model_info()),
        Commands::ExportWeights { out } => {
            PropagationWeights::seeded(config.model.seed)?.save_safetensors(&out)?;
            tracing::info!("Wrote seeded weights to {}", out.display());
            Ok(())
        }
    }
}

/// Select the backend and build the service. Fatal when no backend initializes.
fn start_service(config: &Config) -> Result<Arc<RiskService>> {
    let service = RiskService::new(config)?;
    tracing::info!(
        "Risk service ready: {} backend ({})",
        service.variant(),
        service.variant().model_version()
    );
    Ok(Arc::new(service))
}

/// Run a synchronous service call on the blocking pool.
async fn blocking<T, F>(service: &Arc<RiskService>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&RiskService) -> port_risk_engine::Result<T> + Send + 'static,
{
    let service = Arc::clone(service);
    Ok(tokio::task::spawn_blocking(move || f(&service)).await??)
}

async fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&contents)
        .with_context(|| format!("invalid snapshot JSON in {}", path.display()))?;
    tracing::debug!(
        "Snapshot {}: {} ports, {} routes",
        path.display(),
        snapshot.ports.len(),
        snapshot.routes.len()
    );
    Ok(snapshot)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
