//! Enrichment pipeline integration tests.
//!
//! Everything runs against a real SQLite store in a temp directory and a
//! scripted FakeAiClient; no AI subsystem process is involved.

use nagar_common::api::CreateComplaintRequest;
use nagar_common::{AiClientError, AiProcessingStatus, GeoPoint, PriorityLevel};
use nagard::ai_client::FakeAiClient;
use nagard::config::EnrichmentConfig;
use nagard::enrichment::{enrich_complaint, EnrichOutcome};
use nagard::store::ComplaintStore;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

async fn test_store() -> (TempDir, ComplaintStore) {
    let dir = TempDir::new().unwrap();
    let store = ComplaintStore::open(dir.path().join("complaints.db"))
        .await
        .unwrap();
    (dir, store)
}

fn pothole_request() -> CreateComplaintRequest {
    CreateComplaintRequest {
        title: "Pothole near school gate".to_string(),
        description: "Axle-deep pothole, school vans are taking the footpath".to_string(),
        category: Some("pothole".to_string()),
        images: vec!["img/a.jpg".to_string(), "img/b.jpg".to_string()],
        location: GeoPoint {
            longitude: 77.5946,
            latitude: 12.9716,
        },
        ward: 23,
        reporter: "citizen-7".to_string(),
    }
}

// ----------------------------------------------------------------------------
// Happy path
// ----------------------------------------------------------------------------

#[tokio::test]
async fn happy_path_enriches_and_sets_sla() {
    let (_dir, store) = test_store().await;
    let ai = FakeAiClient::new()
        .with_classification("pothole", 0.94)
        .with_priority(72.0, PriorityLevel::High, "arterial road, school zone")
        .with_department("roads");

    let complaint = store.insert(&pothole_request()).await.unwrap();
    let before = complaint.created_at;

    let outcome = enrich_complaint(&store, &ai, &EnrichmentConfig::default(), complaint.id)
        .await
        .unwrap();
    assert_eq!(outcome, EnrichOutcome::Done);

    let enriched = store.get(complaint.id).await.unwrap().unwrap();
    assert_eq!(enriched.ai.status, AiProcessingStatus::Done);
    assert!(enriched.ai.processed);
    assert_eq!(enriched.ai.priority_score, 72.0);
    assert_eq!(enriched.ai.priority_level, PriorityLevel::High);
    assert_eq!(enriched.ai.priority_reason, "arterial road, school zone");
    assert!((enriched.ai.severity_score - 7.2).abs() < 1e-9);
    assert_eq!(enriched.department_hint.as_deref(), Some("roads"));
    // Category was pinned by the reporter; the classifier agreed anyway.
    assert_eq!(enriched.category, "pothole");

    // pothole base 48h x high 0.5 = 24h from enrichment time.
    let deadline = enriched.sla_deadline.unwrap();
    let window = deadline - before;
    assert!(window >= chrono::Duration::hours(23));
    assert!(window <= chrono::Duration::hours(25));
    assert_eq!(nagar_common::sla::format_sla_window(24.0), "1 days");
}

#[tokio::test]
async fn rerun_after_done_is_a_noop() {
    let (_dir, store) = test_store().await;
    let ai = FakeAiClient::new();
    let complaint = store.insert(&pothole_request()).await.unwrap();

    let first = enrich_complaint(&store, &ai, &EnrichmentConfig::default(), complaint.id)
        .await
        .unwrap();
    assert_eq!(first, EnrichOutcome::Done);

    let second = enrich_complaint(&store, &ai, &EnrichmentConfig::default(), complaint.id)
        .await
        .unwrap();
    assert_eq!(second, EnrichOutcome::AlreadyDone);

    // The pipeline never re-ran: one call per capability.
    assert_eq!(ai.classify_calls.load(Ordering::SeqCst), 1);
    assert_eq!(ai.priority_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_complaint_is_an_error() {
    let (_dir, store) = test_store().await;
    let ai = FakeAiClient::new();
    let err = enrich_complaint(&store, &ai, &EnrichmentConfig::default(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, nagar_common::EnrichError::NotFound(_)));
}

// ----------------------------------------------------------------------------
// Category refinement
// ----------------------------------------------------------------------------

#[tokio::test]
async fn classifier_refines_unpinned_category() {
    let (_dir, store) = test_store().await;
    let ai = FakeAiClient::new().with_classification("water_leakage", 0.9);

    let mut req = pothole_request();
    req.category = None;
    let complaint = store.insert(&req).await.unwrap();
    assert_eq!(complaint.category, "other");

    enrich_complaint(&store, &ai, &EnrichmentConfig::default(), complaint.id)
        .await
        .unwrap();

    let enriched = store.get(complaint.id).await.unwrap().unwrap();
    assert_eq!(enriched.category, "water_leakage");
}

#[tokio::test]
async fn classifier_never_overrides_pinned_category() {
    let (_dir, store) = test_store().await;
    let ai = FakeAiClient::new().with_classification("garbage", 0.99);

    let complaint = store.insert(&pothole_request()).await.unwrap();
    enrich_complaint(&store, &ai, &EnrichmentConfig::default(), complaint.id)
        .await
        .unwrap();

    let enriched = store.get(complaint.id).await.unwrap().unwrap();
    assert_eq!(enriched.category, "pothole");
}

#[tokio::test]
async fn classification_failure_is_not_fatal() {
    let (_dir, store) = test_store().await;
    let ai = FakeAiClient::new()
        .classify_fails(AiClientError::Server("classifier overloaded".into()))
        .with_priority(40.0, PriorityLevel::Medium, "routine");

    let complaint = store.insert(&pothole_request()).await.unwrap();
    let outcome = enrich_complaint(&store, &ai, &EnrichmentConfig::default(), complaint.id)
        .await
        .unwrap();
    assert_eq!(outcome, EnrichOutcome::Done);

    // Duplicate check and priority still ran.
    assert_eq!(ai.duplicate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(ai.priority_calls.load(Ordering::SeqCst), 1);
    let enriched = store.get(complaint.id).await.unwrap().unwrap();
    assert_eq!(enriched.ai.status, AiProcessingStatus::Done);
    // The degradation is visible on the complaint, not just in the logs.
    let note = enriched.enrichment_note.unwrap();
    assert!(note.contains("classification failed"), "note: {}", note);
}

// ----------------------------------------------------------------------------
// Duplicate branch
// ----------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_match_skips_priority_and_counts_master() {
    let (_dir, store) = test_store().await;
    let master = store.insert(&pothole_request()).await.unwrap();
    let dup = store.insert(&pothole_request()).await.unwrap();

    let ai = FakeAiClient::new()
        .with_duplicate(master.id, 0.91)
        .with_department("roads");

    let outcome = enrich_complaint(&store, &ai, &EnrichmentConfig::default(), dup.id)
        .await
        .unwrap();
    assert_eq!(outcome, EnrichOutcome::MarkedDuplicate);

    // Duplicates inherit the master's priority: step 4 never ran.
    assert_eq!(ai.priority_calls.load(Ordering::SeqCst), 0);

    let dup = store.get(dup.id).await.unwrap().unwrap();
    assert!(dup.duplicate.is_duplicate);
    assert_eq!(dup.duplicate.master_id, Some(master.id));
    assert_eq!(dup.ai.status, AiProcessingStatus::Done);
    // Priority fields stayed at their defaults.
    assert_eq!(dup.ai, nagar_common::AiFields {
        status: AiProcessingStatus::Done,
        ..Default::default()
    });

    let master = store.get(master.id).await.unwrap().unwrap();
    assert_eq!(master.duplicate.duplicate_count, 1);
    assert!(!master.duplicate.is_duplicate);
}

#[tokio::test]
async fn below_threshold_match_is_ignored() {
    let (_dir, store) = test_store().await;
    let master = store.insert(&pothole_request()).await.unwrap();
    let other = store.insert(&pothole_request()).await.unwrap();

    let ai = FakeAiClient::new().with_duplicate(master.id, 0.50);
    let outcome = enrich_complaint(&store, &ai, &EnrichmentConfig::default(), other.id)
        .await
        .unwrap();

    assert_eq!(outcome, EnrichOutcome::Done);
    assert_eq!(ai.priority_calls.load(Ordering::SeqCst), 1);
    let master = store.get(master.id).await.unwrap().unwrap();
    assert_eq!(master.duplicate.duplicate_count, 0);
}

#[tokio::test]
async fn threshold_is_tunable() {
    let (_dir, store) = test_store().await;
    let master = store.insert(&pothole_request()).await.unwrap();
    let other = store.insert(&pothole_request()).await.unwrap();

    // Same 0.50 confidence, but the operator runs a looser threshold.
    let config = EnrichmentConfig {
        duplicate_threshold: 0.4,
        ..Default::default()
    };
    let ai = FakeAiClient::new().with_duplicate(master.id, 0.50);
    let outcome = enrich_complaint(&store, &ai, &config, other.id)
        .await
        .unwrap();
    assert_eq!(outcome, EnrichOutcome::MarkedDuplicate);
}

#[tokio::test]
async fn self_match_is_never_a_duplicate() {
    let (_dir, store) = test_store().await;
    let complaint = store.insert(&pothole_request()).await.unwrap();

    let ai = FakeAiClient::new().with_duplicate(complaint.id, 0.99);
    let outcome = enrich_complaint(&store, &ai, &EnrichmentConfig::default(), complaint.id)
        .await
        .unwrap();

    assert_eq!(outcome, EnrichOutcome::Done);
    let loaded = store.get(complaint.id).await.unwrap().unwrap();
    assert!(!loaded.duplicate.is_duplicate);
}

#[tokio::test]
async fn retrying_a_duplicate_never_double_increments() {
    let (_dir, store) = test_store().await;
    let master = store.insert(&pothole_request()).await.unwrap();
    let dup = store.insert(&pothole_request()).await.unwrap();

    // Simulate a worker that crashed after the duplicate write: lease
    // taken, duplicate marked, run never settled.
    store.claim(dup.id).await.unwrap();
    assert!(store.mark_duplicate(dup.id, master.id).await.unwrap());
    assert!(store.reset_stuck(dup.id).await.unwrap());

    // The operator-triggered re-run repeats the whole pipeline; the guard
    // in the duplicate write keeps the master's count at one.
    let ai = FakeAiClient::new().with_duplicate(master.id, 0.95);
    let outcome = enrich_complaint(&store, &ai, &EnrichmentConfig::default(), dup.id)
        .await
        .unwrap();
    assert_eq!(outcome, EnrichOutcome::MarkedDuplicate);

    let master = store.get(master.id).await.unwrap().unwrap();
    assert_eq!(master.duplicate.duplicate_count, 1);
}

// ----------------------------------------------------------------------------
// Failure paths
// ----------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_check_failure_marks_failed() {
    let (_dir, store) = test_store().await;
    let ai = FakeAiClient::new()
        .duplicates_fail(AiClientError::Network("connection refused".into()));

    let complaint = store.insert(&pothole_request()).await.unwrap();
    let outcome = enrich_complaint(&store, &ai, &EnrichmentConfig::default(), complaint.id)
        .await
        .unwrap();
    assert_eq!(outcome, EnrichOutcome::Failed);

    let loaded = store.get(complaint.id).await.unwrap().unwrap();
    assert_eq!(loaded.ai.status, AiProcessingStatus::Failed);
    // Failed is retryable, not hidden: the complaint is intact and the
    // failure reason is recorded for the operator.
    assert_eq!(loaded.title, "Pothole near school gate");
    let note = loaded.enrichment_note.unwrap();
    assert!(note.contains("duplicate check failed"), "note: {}", note);
    assert_eq!(ai.priority_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn priority_failure_marks_failed_and_retry_recovers() {
    let (_dir, store) = test_store().await;
    let ai = FakeAiClient::new()
        .priority_fails(AiClientError::Server("priority model down".into()));

    let complaint = store.insert(&pothole_request()).await.unwrap();
    let outcome = enrich_complaint(&store, &ai, &EnrichmentConfig::default(), complaint.id)
        .await
        .unwrap();
    assert_eq!(outcome, EnrichOutcome::Failed);
    let failed = store.get(complaint.id).await.unwrap().unwrap();
    assert!(failed
        .enrichment_note
        .unwrap()
        .contains("priority calculation failed"));

    // Without an explicit retry, a re-run loses the claim (failed != pending).
    let rerun = enrich_complaint(&store, &ai, &EnrichmentConfig::default(), complaint.id)
        .await
        .unwrap();
    assert_eq!(rerun, EnrichOutcome::LostLease);

    // Explicit retry resets to pending; a recovered subsystem finishes.
    assert!(store.reset_for_retry(complaint.id).await.unwrap());
    ai.script_priority(Ok(nagard::ai_client::PriorityResult {
        score: 55.0,
        level: PriorityLevel::Medium,
        reason: "recovered".to_string(),
    }));
    let outcome = enrich_complaint(&store, &ai, &EnrichmentConfig::default(), complaint.id)
        .await
        .unwrap();
    assert_eq!(outcome, EnrichOutcome::Done);
    // The fresh run took the lease with a clean slate: no stale note.
    let recovered = store.get(complaint.id).await.unwrap().unwrap();
    assert_eq!(recovered.enrichment_note, None);
}

#[tokio::test]
async fn department_hint_failure_does_not_fail_the_run() {
    let (_dir, store) = test_store().await;
    let ai = FakeAiClient::new()
        .route_fails(AiClientError::Network("router timeout".into()));

    let complaint = store.insert(&pothole_request()).await.unwrap();
    let outcome = enrich_complaint(&store, &ai, &EnrichmentConfig::default(), complaint.id)
        .await
        .unwrap();
    assert_eq!(outcome, EnrichOutcome::Done);

    let loaded = store.get(complaint.id).await.unwrap().unwrap();
    assert_eq!(loaded.department_hint, None);
    assert_eq!(loaded.ai.status, AiProcessingStatus::Done);
}

// ----------------------------------------------------------------------------
// Field-ownership golden test
// ----------------------------------------------------------------------------

#[tokio::test]
async fn orchestrator_touches_only_ai_owned_fields() {
    let (_dir, store) = test_store().await;
    let ai = FakeAiClient::new()
        .with_priority(88.0, PriorityLevel::Critical, "main sewer line")
        .with_department("water_board");

    let complaint = store.insert(&pothole_request()).await.unwrap();
    let before = complaint.clone();

    enrich_complaint(&store, &ai, &EnrichmentConfig::default(), complaint.id)
        .await
        .unwrap();
    let after = store.get(complaint.id).await.unwrap().unwrap();

    // Identity and content untouched.
    assert_eq!(after.id, before.id);
    assert_eq!(after.ticket, before.ticket);
    assert_eq!(after.title, before.title);
    assert_eq!(after.description, before.description);
    assert_eq!(after.category, before.category);
    assert_eq!(after.images, before.images);
    assert_eq!(after.location, before.location);
    assert_eq!(after.ward, before.ward);
    assert_eq!(after.reporter, before.reporter);
    assert_eq!(after.created_at, before.created_at);

    // Lifecycle and routing are not ours; bytewise unchanged.
    assert_eq!(after.status, before.status);
    assert_eq!(after.routing, before.routing);
    assert_eq!(after.is_overdue, before.is_overdue);

    // No duplicate branch ran, so those fields are untouched too.
    assert_eq!(after.duplicate, before.duplicate);

    // What did change is exactly the AI-owned surface. No step degraded,
    // so no note was recorded either.
    assert_ne!(after.ai, before.ai);
    assert_eq!(after.department_hint.as_deref(), Some("water_board"));
    assert_eq!(after.enrichment_note, None);
    assert_ne!(after.sla_deadline, before.sla_deadline);
}

// ----------------------------------------------------------------------------
// Concurrency
// ----------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_runs_have_exactly_one_winner() {
    let (_dir, store) = test_store().await;
    let ai = Arc::new(
        FakeAiClient::new().with_priority(60.0, PriorityLevel::High, "contended"),
    );
    let complaint = store.insert(&pothole_request()).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let ai = Arc::clone(&ai);
        let id = complaint.id;
        handles.push(tokio::spawn(async move {
            enrich_complaint(&store, ai.as_ref(), &EnrichmentConfig::default(), id)
                .await
                .unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            EnrichOutcome::Done => winners += 1,
            EnrichOutcome::LostLease | EnrichOutcome::AlreadyDone => {}
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    assert_eq!(winners, 1);
    // No interleaved partial writes: the priority model ran once.
    assert_eq!(ai.priority_calls.load(Ordering::SeqCst), 1);

    let loaded = store.get(complaint.id).await.unwrap().unwrap();
    assert_eq!(loaded.ai.status, AiProcessingStatus::Done);
    assert_eq!(loaded.ai.priority_score, 60.0);
}
