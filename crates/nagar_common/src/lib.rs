//! Shared types for the Nagar civic-complaint platform.
//!
//! Everything the daemon (`nagard`) and the operator CLI (`nagarctl`) agree
//! on lives here: the complaint data model with its two status axes, the
//! statically-typed field-ownership split, SLA computation, the error
//! taxonomy, and the wire types exchanged over the daemon's HTTP API.

pub mod api;
pub mod complaint;
pub mod error;
pub mod sla;
pub mod status;

pub use api::{ComplaintCreated, CreateComplaintRequest, ResetResponse, RetryResponse};
pub use complaint::{
    AiEnrichment, AiFields, AiProcessingStatus, Complaint, DuplicateInfo, GeoPoint,
    LifecycleStatus, PriorityLevel, RoutingFields,
};
pub use error::{AiClientError, EnrichError};
pub use sla::{format_sla_window, sla_deadline, sla_hours};
pub use status::{AiSubsystemStatus, DaemonStatus, SidecarStatus};

/// Crate version, reported by the daemon status endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
