//! Complaint data model.
//!
//! A complaint carries two independent status axes: the lifecycle status
//! (reported → assigned → in_progress → resolved/rejected) owned by the
//! routing side, and the AI-processing status (pending → processing →
//! done/failed) owned by the enrichment pipeline.
//!
//! Field ownership is enforced structurally: the enrichment pipeline writes
//! through [`AiEnrichment`] only, and [`RoutingFields`] has no setter
//! reachable from enrichment code. Writing a routing field from the
//! orchestrator is a compile error, not a code-review finding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// WGS84 coordinate pair, longitude first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

/// Lifecycle status of a complaint. Owned by routing and staff action,
/// never written by the enrichment pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Reported,
    Assigned,
    InProgress,
    Resolved,
    Rejected,
    /// Degraded state, reachable only when routing fails to find an office.
    Unassigned,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Reported => "reported",
            LifecycleStatus::Assigned => "assigned",
            LifecycleStatus::InProgress => "in_progress",
            LifecycleStatus::Resolved => "resolved",
            LifecycleStatus::Rejected => "rejected",
            LifecycleStatus::Unassigned => "unassigned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reported" => Some(LifecycleStatus::Reported),
            "assigned" => Some(LifecycleStatus::Assigned),
            "in_progress" => Some(LifecycleStatus::InProgress),
            "resolved" => Some(LifecycleStatus::Resolved),
            "rejected" => Some(LifecycleStatus::Rejected),
            "unassigned" => Some(LifecycleStatus::Unassigned),
            _ => None,
        }
    }

    /// Resolved and rejected complaints never change status again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleStatus::Resolved | LifecycleStatus::Rejected)
    }

    /// Legal lifecycle edges. `Unassigned` is entered only from `Reported`
    /// (routing failure) and leaves only through a successful assignment.
    pub fn can_transition(&self, to: LifecycleStatus) -> bool {
        use LifecycleStatus::*;
        matches!(
            (self, to),
            (Reported, Assigned)
                | (Reported, Unassigned)
                | (Unassigned, Assigned)
                | (Assigned, InProgress)
                | (Assigned, Rejected)
                | (InProgress, Resolved)
                | (InProgress, Rejected)
        )
    }
}

/// AI-processing status of a complaint. Owned by the enrichment pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiProcessingStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl AiProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiProcessingStatus::Pending => "pending",
            AiProcessingStatus::Processing => "processing",
            AiProcessingStatus::Done => "done",
            AiProcessingStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AiProcessingStatus::Pending),
            "processing" => Some(AiProcessingStatus::Processing),
            "done" => Some(AiProcessingStatus::Done),
            "failed" => Some(AiProcessingStatus::Failed),
            _ => None,
        }
    }

    /// Edges the pipeline may take on its own.
    pub fn can_transition(&self, to: AiProcessingStatus) -> bool {
        use AiProcessingStatus::*;
        matches!(
            (self, to),
            (Pending, Processing) | (Processing, Done) | (Processing, Failed)
        )
    }

    /// Edges that require an explicit operator trigger: retry of a failed
    /// complaint, or reset of a lease stuck at `processing` after a crash.
    pub fn can_operator_reset(&self, to: AiProcessingStatus) -> bool {
        use AiProcessingStatus::*;
        matches!((self, to), (Failed, Pending) | (Processing, Pending))
    }
}

/// Severity level assigned by the priority model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityLevel::Low => "low",
            PriorityLevel::Medium => "medium",
            PriorityLevel::High => "high",
            PriorityLevel::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(PriorityLevel::Low),
            "medium" => Some(PriorityLevel::Medium),
            "high" => Some(PriorityLevel::High),
            "critical" => Some(PriorityLevel::Critical),
            _ => None,
        }
    }
}

/// The AI-owned sub-document. The enrichment orchestrator is its sole
/// mutator; everything else on the complaint is read-only to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiFields {
    pub severity_score: f64,
    pub priority_score: f64,
    pub priority_level: PriorityLevel,
    pub priority_reason: String,
    pub processed: bool,
    pub status: AiProcessingStatus,
}

impl Default for AiFields {
    fn default() -> Self {
        Self {
            severity_score: 0.0,
            priority_score: 0.0,
            priority_level: PriorityLevel::Medium,
            priority_reason: String::new(),
            processed: false,
            status: AiProcessingStatus::Pending,
        }
    }
}

/// The payload the enrichment pipeline is allowed to write. This is the
/// whole write surface: the store's `apply_enrichment` accepts this type
/// and nothing else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiEnrichment {
    pub severity_score: f64,
    pub priority_score: f64,
    pub priority_level: PriorityLevel,
    pub priority_reason: String,
}

/// Routing-owned fields. Written by the routing collaborator after it reads
/// the AI output; the enrichment pipeline never mutates these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingFields {
    pub office_id: Option<String>,
    pub office_type: Option<String>,
    pub distance_km: Option<f64>,
    pub reason: Option<String>,
    pub workload: u32,
}

/// Duplicate accounting. `duplicate_count` is held on the master record
/// only and grows by exactly one per distinct duplicate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateInfo {
    pub is_duplicate: bool,
    pub master_id: Option<Uuid>,
    pub duplicate_count: u32,
}

/// A citizen-submitted civic issue record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    pub id: Uuid,
    pub ticket: String,
    pub title: String,
    pub description: String,
    pub category: String,
    /// True when the reporter chose the category explicitly; the classifier
    /// never overrides a pinned category.
    pub category_pinned: bool,
    pub images: Vec<String>,
    pub location: GeoPoint,
    pub ward: u32,
    pub reporter: String,
    pub status: LifecycleStatus,
    pub ai: AiFields,
    pub routing: RoutingFields,
    pub duplicate: DuplicateInfo,
    /// Advisory department hint from the AI subsystem. Scratch metadata,
    /// not an assignment: routing may ignore it.
    pub department_hint: Option<String>,
    /// Why the last enrichment run was degraded or failed (e.g. the
    /// classifier was down). Cleared when a fresh run takes the lease.
    pub enrichment_note: Option<String>,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub is_overdue: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Human-readable ticket code derived from the complaint id,
/// e.g. `NGR-9F2A4C1D`.
pub fn ticket_code(id: &Uuid) -> String {
    let hex = id.simple().to_string();
    format!("NGR-{}", hex[..8].to_uppercase())
}
