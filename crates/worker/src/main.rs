use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campus_client::HttpConnector;
use campus_core::config::BenchConfig;

/// Progress from the binary and the scenario, plus every failure the ledger records.
const DEFAULT_LOG_FILTER: &str = "campus_bench=info,campus_scenario=info,campus_core=warn";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = BenchConfig::from_env().context("invalid benchmark configuration")?;
    tracing::info!(
        target_url = %config.target_url,
        students = config.initial_students,
        courses = config.initial_courses,
        window_secs = config.load_request_time.as_secs(),
        "Loaded benchmark configuration"
    );

    // --- Connector ---
    let connector = HttpConnector::new(config.target_url.clone(), config.request_timeout);

    // --- Load ---
    let tally = campus_scenario::run_load(config, Arc::new(connector)).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&tally).context("failed to encode the tally")?
    );

    if tally.has_critical() {
        tracing::error!("Run aborted by a critical failure");
        return Ok(ExitCode::FAILURE);
    }
    tracing::info!(score_events = tally.total_score_events(), "Run complete");
    Ok(ExitCode::SUCCESS)
}
