//! Status snapshots reported by the daemon and rendered by `nagarctl`.

use serde::{Deserialize, Serialize};

/// Sidecar process state as seen by the supervisor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SidecarStatus {
    pub running: bool,
    pub pid: Option<u32>,
}

/// AI subsystem reachability as seen by the health probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiSubsystemStatus {
    pub reachable: bool,
    pub base_url: String,
}

/// Full daemon status snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub version: String,
    pub uptime_seconds: u64,
    pub sidecar: SidecarStatus,
    pub ai: AiSubsystemStatus,
    /// Complaint counts per AI-processing status.
    pub pending: u64,
    pub processing: u64,
    pub done: u64,
    pub failed: u64,
}
