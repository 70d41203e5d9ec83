//! Readiness gate: bounded wait for the AI subsystem at boot.
//!
//! Polls the health probe until it succeeds or the deadline passes. Never
//! errors - a `false` means the caller boots degraded and enrichment fails
//! until the subsystem shows up.

use crate::ai_client::AiClient;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Poll the health probe every `poll_interval` (first probe immediately)
/// until it succeeds or `timeout` elapses.
pub async fn wait_until_ready(
    client: &dyn AiClient,
    timeout: Duration,
    poll_interval: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        match client.health().await {
            Ok(()) => {
                info!("AI subsystem ready");
                return true;
            }
            Err(e) => debug!("AI health probe failed: {}", e),
        }
        let now = Instant::now();
        if now >= deadline {
            warn!(
                "AI subsystem not ready after {:?}, continuing degraded",
                timeout
            );
            return false;
        }
        let remaining = deadline - now;
        tokio::time::sleep(poll_interval.min(remaining)).await;
    }
}
