mod config;
mod routes_jobs;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use clipqueue::{
    FsSink, IntervalDriver, JobStore, JsonJournal, QueueConfig, StoreDeps, SystemClock,
    TracingNotifier,
};
use ttsclient::HttpTtsService;

use crate::config::AppConfig;
use crate::routes_jobs::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env()?;

    let service =
        HttpTtsService::new(&cfg.api_url, &cfg.api_token).context("building TTS client")?;
    let driver = IntervalDriver::new(cfg.tick_interval).context("scheduler configuration")?;

    let store = JobStore::new(
        QueueConfig {
            poll_cooldown: cfg.poll_cooldown,
            poll_timeout: cfg.poll_timeout,
        },
        StoreDeps {
            service: Arc::new(service),
            notifier: Arc::new(TracingNotifier),
            journal: Arc::new(JsonJournal::new(&cfg.journal_path)),
            sink: Arc::new(FsSink),
            clock: Arc::new(SystemClock),
            driver: Arc::new(driver),
        },
    )
    .context("queue configuration")?;

    // Pick up jobs journaled by a previous run.
    match store.restore().await {
        Ok(0) => {}
        Ok(n) => info!(jobs = n, "resumed journaled jobs"),
        Err(e) => warn!("job journal could not be read: {e}"),
    }

    let app = Router::new()
        .route("/clips", post(create_clip))
        .route("/clips/one-shot", post(create_one_shot))
        .route("/jobs", get(get_jobs))
        .route("/jobs/:id", get(get_job).delete(cancel_job))
        .layer(CorsLayer::permissive())
        .with_state(store);

    info!("synthd listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
