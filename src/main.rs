#![deny(
    warnings,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo
)]
#![allow(clippy::multiple_crate_versions)]

use clap::Parser;
use tokio::net::TcpListener;

use incident_report::{build_app, config::Config, logging::init_logging, models::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Keep guard alive so file logger flushes correctly
    let _log_guards = init_logging(&config);

    if config.api_key.trim().is_empty() {
        anyhow::bail!("GEMINI_API_KEY is empty; the description service needs a key");
    }

    // Log all configuration (mask sensitive values)
    tracing::info!("=== Configuration ===");
    tracing::info!("Bind address: {}", config.bind_addr());
    tracing::info!("Staging directory: {}", config.static_dir.display());
    tracing::info!("Logo: {}", config.logo_path.display());
    tracing::info!("Log file: {}", config.log_file.display());
    tracing::info!("Description API key: <set>");
    tracing::info!("Description model: {}", config.description_model);
    tracing::info!("Description API URL: {}", config.description_api_url);
    tracing::info!(
        "Description timeout: {}s",
        config.description_timeout_secs
    );
    tracing::info!("Max upload: {} MiB", config.max_upload_mb);
    tracing::info!("Report location: {}", config.report.location);
    tracing::info!("Report equipment: {}", config.report.equipment);
    tracing::info!("====================");

    tokio::fs::create_dir_all(&config.static_dir).await?;

    let addr = config.bind_addr();
    let app = build_app(AppState::new(config));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
