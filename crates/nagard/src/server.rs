//! HTTP server for nagard.

use crate::ai_client::AiClient;
use crate::config::Config;
use crate::queue::EnrichmentQueue;
use crate::routes;
use crate::sidecar::Sidecar;
use crate::store::ComplaintStore;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers.
pub struct AppState {
    pub store: ComplaintStore,
    pub queue: Arc<EnrichmentQueue>,
    pub sidecar: Arc<Sidecar>,
    pub ai: Arc<dyn AiClient>,
    pub config: Config,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        store: ComplaintStore,
        queue: Arc<EnrichmentQueue>,
        sidecar: Arc<Sidecar>,
        ai: Arc<dyn AiClient>,
        config: Config,
    ) -> Self {
        Self {
            store,
            queue,
            sidecar,
            ai,
            config,
            start_time: Instant::now(),
        }
    }
}

/// Run the HTTP server until the listener dies.
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let addr = state.config.bind_addr.clone();
    let app = Router::new()
        .merge(routes::complaint_routes())
        .merge(routes::operator_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
