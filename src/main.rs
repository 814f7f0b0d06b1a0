// Main entry point - Configuration, wiring and the batch driver
mod application;
mod domain;
mod infrastructure;

use std::fs;
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use chrono::{Local, TimeZone, Utc};
use clap::Parser;
use futures::stream::{self, StreamExt};
use tracing_subscriber::EnvFilter;

use crate::application::export_service::{DashboardOutcome, ExportService};
use crate::domain::error::ExporterError;
use crate::infrastructure::config::{load_config, DashboardPlotConfig, PlotterConfig};
use crate::infrastructure::grafana_client::GrafanaClient;

#[derive(Debug, Parser)]
#[command(name = "grafana-plotter")]
#[command(about = "Plot Grafana dashboard panels to png")]
struct Cli {
    /// Path to the configuration file (extension may be omitted)
    #[arg(short, long, default_value = "config")]
    config: String,

    /// Start of the plotted time slice as a unix timestamp in seconds.
    /// Defaults to now minus the configured default time range.
    #[arg(short, long)]
    from: Option<i64>,

    /// End of the plotted time slice as a unix timestamp in seconds,
    /// defaults to now.
    #[arg(short, long)]
    to: Option<i64>,

    /// Handle dashboards one after another instead of in parallel
    #[arg(short, long)]
    sequential: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Arc::new(load_config(&cli.config).context("loading configuration")?);

    // The time window is fixed for the whole run and held in
    // milliseconds; every query and render uses the same slice.
    let now_ms = Utc::now().timestamp_millis();
    let from_ms = cli
        .from
        .map(|secs| secs * 1000)
        .unwrap_or(now_ms - config.grafana.default_time_range as i64 * 1000);
    let to_ms = cli.to.map(|secs| secs * 1000).unwrap_or(now_ms);

    tracing::info!(
        "creating plots between {} and {}",
        format_timestamp(from_ms),
        format_timestamp(to_ms)
    );

    fs::create_dir_all(&config.plots.output_dir)
        .with_context(|| format!("creating {}", config.plots.output_dir.display()))?;

    run(config, from_ms, to_ms, cli.sequential).await
}

async fn run(
    config: Arc<PlotterConfig>,
    from_ms: i64,
    to_ms: i64,
    sequential: bool,
) -> anyhow::Result<()> {
    let abort_on_error = config.grafana.abort_on_api_error;
    let mut succeeded = 0usize;
    let mut failed = 0usize;

    if sequential {
        for dashboard in config.dashboards.clone() {
            let (uid, result) = plot_dashboard(config.clone(), dashboard, from_ms, to_ms).await;
            record_outcome(&uid, result, abort_on_error, &mut succeeded, &mut failed)?;
        }
    } else {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let mut outcomes = stream::iter(config.dashboards.clone())
            .map(|dashboard| plot_dashboard(config.clone(), dashboard, from_ms, to_ms))
            .buffer_unordered(workers);

        // An early return here drops the stream and with it every
        // worker that has not finished yet.
        while let Some((uid, result)) = outcomes.next().await {
            record_outcome(&uid, result, abort_on_error, &mut succeeded, &mut failed)?;
        }
    }

    tracing::info!("plotting finished: {succeeded} dashboard(s) exported, {failed} failed");
    if failed > 0 {
        anyhow::bail!("{failed} dashboard(s) failed");
    }
    Ok(())
}

/// Plot all panels of one dashboard with a worker-owned client.
async fn plot_dashboard(
    config: Arc<PlotterConfig>,
    dashboard: DashboardPlotConfig,
    from_ms: i64,
    to_ms: i64,
) -> (String, Result<DashboardOutcome, ExporterError>) {
    let uid = dashboard.uid.clone();
    let result = async {
        let client = Arc::new(
            GrafanaClient::connect(&config.grafana, &config.prometheus, from_ms, to_ms).await?,
        );
        let service = ExportService::new(client, config.plots.output_dir.clone());
        service.export_dashboard(&dashboard).await
    }
    .await;
    (uid, result)
}

fn record_outcome(
    uid: &str,
    result: Result<DashboardOutcome, ExporterError>,
    abort_on_error: bool,
    succeeded: &mut usize,
    failed: &mut usize,
) -> anyhow::Result<()> {
    match result {
        Ok(outcome) => {
            tracing::info!(
                "dashboard {} ({}) exported with {} plot(s)",
                outcome.uid,
                outcome.slug,
                outcome.plots
            );
            *succeeded += 1;
        }
        Err(e) => {
            tracing::error!("dashboard {uid} failed: {e}");
            *failed += 1;
            if abort_on_error {
                anyhow::bail!("aborting batch after dashboard {uid}: {e}");
            }
        }
    }
    Ok(())
}

fn format_timestamp(ms: i64) -> String {
    Local
        .timestamp_millis_opt(ms)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S %Z").to_string())
        .unwrap_or_else(|| ms.to_string())
}
