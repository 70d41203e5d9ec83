//! Request/response types for the daemon HTTP API.

use crate::complaint::{AiProcessingStatus, GeoPoint};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Intake payload. The category is optional: when absent the classifier may
/// refine it; when present it is pinned and never overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateComplaintRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub location: GeoPoint,
    pub ward: u32,
    pub reporter: String,
}

/// Returned immediately on intake, before enrichment runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintCreated {
    pub id: Uuid,
    pub ticket: String,
    pub ai_status: AiProcessingStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryResponse {
    pub id: Uuid,
    pub ai_status: AiProcessingStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub id: Uuid,
    pub ai_status: AiProcessingStatus,
}
