//! Randomized-sequence property test for the AI-processing state machine.
//!
//! Throws random operation sequences at the store and checks, after every
//! step, that the persisted status matches a reference model and that any
//! observed change follows a legal edge: pending -> processing ->
//! {done, failed}, with failed -> pending and processing -> pending only
//! through the explicit operator resets.

use nagar_common::api::CreateComplaintRequest;
use nagar_common::{AiProcessingStatus, GeoPoint};
use nagard::store::{ClaimOutcome, ComplaintStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

#[derive(Debug, Clone, Copy)]
enum Op {
    Claim,
    FinishDone,
    FinishFailed,
    Retry,
    ResetStuck,
}

const OPS: [Op; 5] = [
    Op::Claim,
    Op::FinishDone,
    Op::FinishFailed,
    Op::Retry,
    Op::ResetStuck,
];

/// What the model says each operation does. Every operation is conditional
/// in the store; an op that does not apply must leave the status alone.
fn model_step(status: AiProcessingStatus, op: Op) -> AiProcessingStatus {
    use AiProcessingStatus::*;
    match (op, status) {
        (Op::Claim, Pending) => Processing,
        (Op::FinishDone, Processing) => Done,
        (Op::FinishFailed, Processing) => Failed,
        (Op::Retry, Failed) => Pending,
        (Op::ResetStuck, Processing) => Pending,
        (_, s) => s,
    }
}

fn edge_is_legal(from: AiProcessingStatus, to: AiProcessingStatus, op: Op) -> bool {
    if from == to {
        return true;
    }
    match op {
        Op::Retry | Op::ResetStuck => from.can_operator_reset(to),
        _ => from.can_transition(to),
    }
}

async fn apply(store: &ComplaintStore, id: uuid::Uuid, op: Op) {
    match op {
        Op::Claim => {
            let outcome = store.claim(id).await.unwrap();
            assert_ne!(outcome, ClaimOutcome::NotFound);
        }
        Op::FinishDone => {
            store.finish_done(id).await.unwrap();
        }
        Op::FinishFailed => {
            store.finish_failed(id).await.unwrap();
        }
        Op::Retry => {
            store.reset_for_retry(id).await.unwrap();
        }
        Op::ResetStuck => {
            store.reset_stuck(id).await.unwrap();
        }
    }
}

#[tokio::test]
async fn random_sequences_never_leave_the_legal_edges() {
    for seed in 0..6u64 {
        let dir = TempDir::new().unwrap();
        let store = ComplaintStore::open(dir.path().join("prop.db"))
            .await
            .unwrap();
        let complaint = store
            .insert(&CreateComplaintRequest {
                title: "Streetlight out".to_string(),
                description: "Pole 14 dark since Monday".to_string(),
                category: Some("streetlight".to_string()),
                images: vec![],
                location: GeoPoint {
                    longitude: 77.61,
                    latitude: 12.93,
                },
                ward: 3,
                reporter: "citizen-2".to_string(),
            })
            .await
            .unwrap();

        let mut rng = StdRng::seed_from_u64(seed);
        let mut model = AiProcessingStatus::Pending;

        for step in 0..200 {
            let op = OPS[rng.gen_range(0..OPS.len())];
            let before = store.get(complaint.id).await.unwrap().unwrap().ai.status;
            assert_eq!(before, model, "model diverged before step {}", step);

            apply(&store, complaint.id, op).await;

            let after = store.get(complaint.id).await.unwrap().unwrap().ai.status;
            assert!(
                edge_is_legal(before, after, op),
                "illegal edge {:?} -> {:?} via {:?} (seed {}, step {})",
                before,
                after,
                op,
                seed,
                step
            );
            model = model_step(model, op);
            assert_eq!(after, model, "store diverged from model at step {}", step);
        }
    }
}

#[tokio::test]
async fn done_is_terminal_for_every_operation() {
    let dir = TempDir::new().unwrap();
    let store = ComplaintStore::open(dir.path().join("done.db"))
        .await
        .unwrap();
    let complaint = store
        .insert(&CreateComplaintRequest {
            title: "Sewage overflow".to_string(),
            description: "Manhole overflowing at market junction".to_string(),
            category: Some("sewage".to_string()),
            images: vec![],
            location: GeoPoint {
                longitude: 77.58,
                latitude: 12.95,
            },
            ward: 5,
            reporter: "citizen-3".to_string(),
        })
        .await
        .unwrap();

    store.claim(complaint.id).await.unwrap();
    store.finish_done(complaint.id).await.unwrap();

    for op in OPS {
        apply(&store, complaint.id, op).await;
        let status = store.get(complaint.id).await.unwrap().unwrap().ai.status;
        assert_eq!(status, AiProcessingStatus::Done, "op {:?} moved a done complaint", op);
    }
}
