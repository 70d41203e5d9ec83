//! Nagar daemon library.
//!
//! Hosts the complaint AI-enrichment core: the sidecar supervisor for the
//! AI subsystem process, the readiness gate, the typed AI client, the
//! complaint store, and the enrichment queue/orchestrator, plus the HTTP
//! API the intake and operator surfaces talk to.

pub mod ai_client;
pub mod config;
pub mod enrichment;
pub mod queue;
pub mod readiness;
pub mod routes;
pub mod runtime;
pub mod server;
pub mod sidecar;
pub mod store;
