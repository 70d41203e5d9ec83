//! Nagar daemon - civic complaint service with AI enrichment.
//!
//! Boot order: config -> store -> sidecar (optional) -> readiness gate
//! (bounded) -> enrichment queue -> HTTP API. A missing or unhealthy AI
//! subsystem degrades enrichment; it never blocks the service.

use anyhow::Result;
use nagard::ai_client::{AiClient, HttpAiClient};
use nagard::config::Config;
use nagard::queue::EnrichmentQueue;
use nagard::readiness;
use nagard::runtime::PythonResolver;
use nagard::server::{self, AppState};
use nagard::sidecar::Sidecar;
use nagard::store::ComplaintStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("nagard v{} starting", nagar_common::VERSION);

    let config = Config::load();
    let store = ComplaintStore::open(config.db_path.clone()).await?;

    let ai: Arc<dyn AiClient> = Arc::new(HttpAiClient::new(&config.ai));
    let resolver = Arc::new(PythonResolver::new(&config.ai));
    let sidecar = Arc::new(Sidecar::new(resolver, config.ai.clone()));

    if config.ai.autostart_sidecar {
        if let Err(e) = sidecar.start().await {
            // Fatal to AI features only: complaints still flow, enrichment
            // waits for an operator.
            error!("AI sidecar unavailable, running degraded: {:#}", e);
        }
    }

    if config.ai.wait_for_ready {
        readiness::wait_until_ready(
            ai.as_ref(),
            Duration::from_secs(config.ai.ready_timeout_secs),
            Duration::from_secs(config.ai.poll_interval_secs),
        )
        .await;
    }

    let queue = Arc::new(EnrichmentQueue::start(
        store.clone(),
        Arc::clone(&ai),
        config.enrichment.clone(),
    ));

    // Rows still at pending lost their enqueue to a previous crash or a
    // full queue; without this sweep nothing would ever pick them up.
    match queue.enqueue_pending_backlog().await {
        Ok(0) => {}
        Ok(n) => info!("Re-queued {} pending complaints from a previous run", n),
        Err(e) => error!("Pending-backlog sweep failed: {}", e),
    }

    let state = Arc::new(AppState::new(
        store,
        Arc::clone(&queue),
        Arc::clone(&sidecar),
        ai,
        config,
    ));

    let server_state = Arc::clone(&state);
    let server_task = tokio::spawn(async move {
        if let Err(e) = server::run(server_state).await {
            error!("HTTP server exited: {:#}", e);
        }
    });

    info!("nagard ready");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    server_task.abort();
    queue.shutdown().await;
    sidecar.stop().await?;

    Ok(())
}
