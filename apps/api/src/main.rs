mod company;
mod config;
mod cover_letter;
mod document;
mod errors;
mod job;
mod llm_client;
mod metrics;
mod middleware;
mod models;
mod retry;
mod routes;
mod state;
#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::company::ExaClient;
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::metrics::Metrics;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Cover Letter API v{} ({})",
        env!("CARGO_PKG_VERSION"),
        config.environment.as_str()
    );

    std::fs::create_dir_all(&config.upload_tmp_dir).with_context(|| {
        format!(
            "Failed to create upload directory {}",
            config.upload_tmp_dir.display()
        )
    })?;

    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);

    if config.openrouter.api_key.is_none() {
        warn!("OPENROUTER_API_KEY is not set; generation requests will fail");
    }
    let llm = LlmClient::new(
        &config.openrouter,
        config.retry.clone(),
        config.http_timeout,
        metrics.clone(),
    )?;
    info!("LLM client initialized (model: {})", llm.model());

    if config.exa.api_key.is_none() {
        warn!("EXA_API_KEY is not set; company lookups will be skipped with a warning");
    }
    let exa = ExaClient::new(&config.exa, config.http_timeout, metrics.clone())?;

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let state = AppState::new(config, Arc::new(llm), Arc::new(exa), metrics);
    let app = build_router(state);

    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
