//! Enrichment orchestrator.
//!
//! Runs once per newly created complaint (and safely re-runs): claim the
//! lease, classify, check duplicates, score priority, fetch the advisory
//! department hint, settle the AI status. The conditional claim in the
//! store is the entire concurrency story - no global lock.
//!
//! Failure policy: classification and department-hint failures degrade the
//! run but do not fail it; duplicate-check and priority failures set
//! `failed`, which is a normal, visible, retryable state. Degraded and
//! failing steps record their reason on the complaint (`enrichment_note`)
//! for the operator. Nothing here ever propagates into the intake request
//! path.

use crate::ai_client::{AiClient, DuplicateQuery, PriorityFeatures};
use crate::config::EnrichmentConfig;
use crate::store::{ClaimOutcome, ComplaintStore};
use chrono::Utc;
use nagar_common::sla;
use nagar_common::{AiEnrichment, EnrichError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How a single orchestrator run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// Full pipeline ran; AI sub-document written.
    Done,
    /// Merged against a master; priority computation skipped by policy.
    MarkedDuplicate,
    /// Pipeline hit an unrecoverable step; complaint awaits manual retry.
    Failed,
    /// Another worker holds (or held) the lease. Silent abort.
    LostLease,
    /// Enrichment already completed earlier. No-op.
    AlreadyDone,
}

/// Drive the enrichment pipeline for one complaint.
pub async fn enrich_complaint(
    store: &ComplaintStore,
    ai: &dyn AiClient,
    config: &EnrichmentConfig,
    id: Uuid,
) -> Result<EnrichOutcome, EnrichError> {
    // Step 1: the lease. Losing it is not an error.
    match store.claim(id).await.map_err(store_err)? {
        ClaimOutcome::Claimed => {}
        ClaimOutcome::AlreadyDone => {
            debug!("Enrichment already done for {}, skipping", id);
            return Ok(EnrichOutcome::AlreadyDone);
        }
        ClaimOutcome::Lost => {
            debug!("Lost enrichment lease for {}, backing off", id);
            return Ok(EnrichOutcome::LostLease);
        }
        ClaimOutcome::NotFound => return Err(EnrichError::NotFound(id)),
    }

    let complaint = store
        .get(id)
        .await
        .map_err(store_err)?
        .ok_or(EnrichError::NotFound(id))?;

    // Step 2: classification. Non-fatal - a missing refinement only means
    // the duplicate check and priority model see the original category.
    let mut category = complaint.category.clone();
    match ai
        .classify(&complaint.title, &complaint.description, &complaint.images)
        .await
    {
        Ok(classification) => {
            if !complaint.category_pinned && !classification.category.is_empty() {
                if store
                    .set_category(id, &classification.category)
                    .await
                    .map_err(store_err)?
                {
                    debug!(
                        "Refined category for {}: {} -> {}",
                        id, category, classification.category
                    );
                    category = classification.category;
                }
            }
        }
        Err(e) => {
            warn!("Classification failed for {} (continuing): {}", id, e);
            store
                .set_enrichment_note(id, &format!("classification failed: {}", e))
                .await
                .map_err(store_err)?;
        }
    }

    // Step 3: duplicate detection against the (possibly refined) category.
    let query = DuplicateQuery {
        text: complaint.description.clone(),
        category: category.clone(),
        location: complaint.location,
    };
    let duplicate = match ai.detect_duplicates(&query).await {
        Ok(m) => m,
        Err(e) => {
            warn!("Duplicate check failed for {}: {}", id, e);
            store
                .set_enrichment_note(id, &format!("duplicate check failed: {}", e))
                .await
                .map_err(store_err)?;
            store.finish_failed(id).await.map_err(store_err)?;
            return Ok(EnrichOutcome::Failed);
        }
    };

    if let Some(master_id) = duplicate.match_id {
        if duplicate.confidence >= config.duplicate_threshold && master_id != id {
            // Duplicates inherit the master's priority; step 4 is skipped.
            let newly = store
                .mark_duplicate(id, master_id)
                .await
                .map_err(store_err)?;
            info!(
                "Complaint {} marked duplicate of {} (confidence {:.2}, newly={})",
                id, master_id, duplicate.confidence, newly
            );
            fetch_department_hint(store, ai, id, &category).await?;
            store.finish_done(id).await.map_err(store_err)?;
            return Ok(EnrichOutcome::MarkedDuplicate);
        }
        debug!(
            "Duplicate match for {} below threshold ({:.2} < {:.2})",
            id, duplicate.confidence, config.duplicate_threshold
        );
    }

    // Step 4: priority scoring.
    let features = PriorityFeatures {
        category: category.clone(),
        ward: complaint.ward,
        description: complaint.description.clone(),
        image_count: complaint.images.len(),
    };
    let priority = match ai.calculate_priority(&features).await {
        Ok(p) => p,
        Err(e) => {
            warn!("Priority calculation failed for {}: {}", id, e);
            store
                .set_enrichment_note(id, &format!("priority calculation failed: {}", e))
                .await
                .map_err(store_err)?;
            store.finish_failed(id).await.map_err(store_err)?;
            return Ok(EnrichOutcome::Failed);
        }
    };

    let enrichment = AiEnrichment {
        severity_score: priority.score / 10.0,
        priority_score: priority.score,
        priority_level: priority.level,
        priority_reason: priority.reason,
    };
    let deadline = sla::sla_deadline(&category, priority.level, Utc::now());
    store
        .apply_enrichment(id, &enrichment, deadline)
        .await
        .map_err(store_err)?;

    // Step 5: advisory department hint.
    fetch_department_hint(store, ai, id, &category).await?;

    // Step 6: settle.
    store.finish_done(id).await.map_err(store_err)?;
    info!(
        "Enriched {}: priority {} ({:.0})",
        id,
        enrichment.priority_level.as_str(),
        enrichment.priority_score
    );
    Ok(EnrichOutcome::Done)
}

/// Step 5 helper. The hint is scratch metadata; failure to fetch it never
/// fails the run.
async fn fetch_department_hint(
    store: &ComplaintStore,
    ai: &dyn AiClient,
    id: Uuid,
    category: &str,
) -> Result<(), EnrichError> {
    match ai.route_department(category).await {
        Ok(hint) => store
            .set_department_hint(id, &hint.department)
            .await
            .map_err(store_err),
        Err(e) => {
            warn!("Department hint failed for {} (continuing): {}", id, e);
            Ok(())
        }
    }
}

fn store_err(e: anyhow::Error) -> EnrichError {
    EnrichError::Store(e.to_string())
}
