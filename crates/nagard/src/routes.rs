//! API routes for nagard.
//!
//! The intake route persists and answers immediately; enrichment runs on
//! the queue and its failures never surface here. Operator routes expose
//! retry and stuck-lease reset, the two explicit AI-status resets.

use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use nagar_common::{
    AiSubsystemStatus, Complaint, ComplaintCreated, CreateComplaintRequest, DaemonStatus,
    EnrichError, ResetResponse, RetryResponse, VERSION,
};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

type AppStateArc = Arc<AppState>;

// ============================================================================
// Complaint Routes
// ============================================================================

pub fn complaint_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/complaints", post(create_complaint))
        .route("/api/complaints/failed", get(list_failed))
        .route("/api/complaints/:id", get(get_complaint))
}

async fn create_complaint(
    State(state): State<AppStateArc>,
    Json(req): Json<CreateComplaintRequest>,
) -> Result<(StatusCode, Json<ComplaintCreated>), (StatusCode, String)> {
    let complaint = state.store.insert(&req).await.map_err(|e| {
        error!("Failed to persist complaint: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    info!("Complaint {} created ({})", complaint.ticket, complaint.id);

    // Creation succeeded the moment the row landed; enrichment is the
    // queue's problem from here on.
    state.queue.notify_created(complaint.id);

    Ok((
        StatusCode::CREATED,
        Json(ComplaintCreated {
            id: complaint.id,
            ticket: complaint.ticket,
            ai_status: complaint.ai.status,
        }),
    ))
}

async fn get_complaint(
    State(state): State<AppStateArc>,
    Path(id): Path<Uuid>,
) -> Result<Json<Complaint>, (StatusCode, String)> {
    match state.store.get(id).await {
        Ok(Some(complaint)) => Ok(Json(complaint)),
        Ok(None) => Err((StatusCode::NOT_FOUND, format!("complaint {} not found", id))),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

async fn list_failed(
    State(state): State<AppStateArc>,
) -> Result<Json<Vec<Complaint>>, (StatusCode, String)> {
    state
        .store
        .list_by_ai_status(nagar_common::AiProcessingStatus::Failed)
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

// ============================================================================
// Operator Routes
// ============================================================================

pub fn operator_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/complaints/:id/retry", post(retry_enrichment))
        .route("/api/complaints/:id/reset", post(reset_enrichment))
        .route("/api/status", get(daemon_status))
        .route("/api/sidecar/start", post(sidecar_start))
        .route("/api/sidecar/stop", post(sidecar_stop))
}

async fn retry_enrichment(
    State(state): State<AppStateArc>,
    Path(id): Path<Uuid>,
) -> Result<Json<RetryResponse>, (StatusCode, String)> {
    state.queue.retry(id).await.map_err(enrich_error_response)?;
    Ok(Json(RetryResponse {
        id,
        ai_status: nagar_common::AiProcessingStatus::Pending,
    }))
}

async fn reset_enrichment(
    State(state): State<AppStateArc>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResetResponse>, (StatusCode, String)> {
    state
        .queue
        .reset_stuck(id)
        .await
        .map_err(enrich_error_response)?;
    Ok(Json(ResetResponse {
        id,
        ai_status: nagar_common::AiProcessingStatus::Pending,
    }))
}

async fn daemon_status(
    State(state): State<AppStateArc>,
) -> Result<Json<DaemonStatus>, (StatusCode, String)> {
    let (pending, processing, done, failed) = state
        .store
        .ai_status_counts()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(DaemonStatus {
        version: VERSION.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        sidecar: state.sidecar.status().await,
        ai: AiSubsystemStatus {
            reachable: state.ai.health().await.is_ok(),
            base_url: state.config.ai.base_url.clone(),
        },
        pending,
        processing,
        done,
        failed,
    }))
}

async fn sidecar_start(
    State(state): State<AppStateArc>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.sidecar.start().await {
        Ok(()) => Ok(StatusCode::OK),
        Err(e) => match e.downcast_ref::<EnrichError>() {
            Some(EnrichError::NoRuntime(_)) => {
                Err((StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
            }
            _ => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
        },
    }
}

async fn sidecar_stop(
    State(state): State<AppStateArc>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .sidecar
        .stop()
        .await
        .map(|_| StatusCode::OK)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/healthz", get(|| async { "ok" }))
}

fn enrich_error_response(e: EnrichError) -> (StatusCode, String) {
    match e {
        EnrichError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        EnrichError::InvalidTransition { .. } => (StatusCode::CONFLICT, e.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
