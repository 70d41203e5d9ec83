//! Enrichment queue.
//!
//! One task per complaint id, at most one in flight per id. Intake pushes
//! ids here and returns immediately; worker tasks drain the channel and run
//! the orchestrator. Retries and stuck-lease resets are first-class
//! operations, not re-calls of the intake path.

use crate::ai_client::AiClient;
use crate::config::EnrichmentConfig;
use crate::enrichment::{self, EnrichOutcome};
use crate::store::ComplaintStore;
use nagar_common::{AiProcessingStatus, EnrichError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const QUEUE_DEPTH: usize = 1024;

pub struct EnrichmentQueue {
    tx: StdMutex<Option<mpsc::Sender<Uuid>>>,
    inflight: Arc<StdMutex<HashSet<Uuid>>>,
    workers: StdMutex<Vec<JoinHandle<()>>>,
    store: ComplaintStore,
}

impl EnrichmentQueue {
    /// Spawn the worker pool and return the queue handle.
    pub fn start(
        store: ComplaintStore,
        ai: Arc<dyn AiClient>,
        config: EnrichmentConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<Uuid>(QUEUE_DEPTH);
        let rx = Arc::new(Mutex::new(rx));
        let inflight: Arc<StdMutex<HashSet<Uuid>>> = Arc::new(StdMutex::new(HashSet::new()));

        let mut workers = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers.max(1) {
            let rx = Arc::clone(&rx);
            let inflight = Arc::clone(&inflight);
            let store = store.clone();
            let ai = Arc::clone(&ai);
            let config = config.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let id = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(id) = id else {
                        debug!("Enrichment worker {} shutting down", worker_id);
                        return;
                    };
                    match enrichment::enrich_complaint(&store, ai.as_ref(), &config, id).await {
                        Ok(outcome) => log_outcome(id, outcome),
                        Err(e) => error!("Enrichment errored for {}: {}", id, e),
                    }
                    inflight.lock().unwrap().remove(&id);
                }
            }));
        }

        Self {
            tx: StdMutex::new(Some(tx)),
            inflight,
            workers: StdMutex::new(workers),
            store,
        }
    }

    /// The `onComplaintCreated` trigger: enqueue a freshly persisted
    /// complaint. Quietly skips ids already queued or in flight. A drop
    /// here (full or shut-down queue) leaves the row at `pending`; the
    /// boot sweep and the operator reset both pick those up.
    pub fn notify_created(&self, id: Uuid) {
        if !self.inflight.lock().unwrap().insert(id) {
            debug!("Enrichment already in flight for {}, skipping", id);
            return;
        }
        self.send(id);
    }

    /// Enqueue regardless of the in-flight set. Operator paths use this:
    /// the dedup guard must never swallow an explicit retry/reset (the id
    /// can still sit in the set for a moment after its worker finished).
    /// A redundant run costs one lost lease claim.
    fn enqueue(&self, id: Uuid) {
        self.inflight.lock().unwrap().insert(id);
        self.send(id);
    }

    fn send(&self, id: Uuid) {
        let tx = self.tx.lock().unwrap().clone();
        match tx {
            Some(tx) => {
                if let Err(e) = tx.try_send(id) {
                    warn!("Enrichment queue full, dropping {}: {}", id, e);
                    self.inflight.lock().unwrap().remove(&id);
                }
            }
            None => {
                warn!("Enrichment queue is shut down, dropping {}", id);
                self.inflight.lock().unwrap().remove(&id);
            }
        }
    }

    /// Boot sweep: re-enqueue every complaint still at `pending`, e.g. rows
    /// whose enqueue was lost to a crash or a full queue before shutdown.
    /// Returns how many were scheduled.
    pub async fn enqueue_pending_backlog(&self) -> Result<usize, EnrichError> {
        let pending = self
            .store
            .list_by_ai_status(AiProcessingStatus::Pending)
            .await
            .map_err(|e| EnrichError::Store(e.to_string()))?;
        let count = pending.len();
        for complaint in pending {
            self.enqueue(complaint.id);
        }
        Ok(count)
    }

    /// Operator retry of a `failed` complaint: reset failed -> pending,
    /// then enqueue.
    pub async fn retry(&self, id: Uuid) -> Result<(), EnrichError> {
        if !self
            .store
            .reset_for_retry(id)
            .await
            .map_err(|e| EnrichError::Store(e.to_string()))?
        {
            return match self
                .store
                .get(id)
                .await
                .map_err(|e| EnrichError::Store(e.to_string()))?
            {
                None => Err(EnrichError::NotFound(id)),
                Some(c) => Err(EnrichError::InvalidTransition {
                    from: c.ai.status.as_str(),
                    to: "pending",
                }),
            };
        }
        info!("Retrying enrichment for {}", id);
        self.enqueue(id);
        Ok(())
    }

    /// Operator crash recovery: reset a stuck `processing` lease back to
    /// pending and enqueue it again. Also accepts a complaint already at
    /// `pending` - that is a row whose enqueue was dropped, and re-scheduling
    /// it is the recovery.
    pub async fn reset_stuck(&self, id: Uuid) -> Result<(), EnrichError> {
        if !self
            .store
            .reset_stuck(id)
            .await
            .map_err(|e| EnrichError::Store(e.to_string()))?
        {
            match self
                .store
                .get(id)
                .await
                .map_err(|e| EnrichError::Store(e.to_string()))?
            {
                None => return Err(EnrichError::NotFound(id)),
                Some(c) if c.ai.status == AiProcessingStatus::Pending => {
                    info!("Re-scheduling pending enrichment for {}", id);
                    self.enqueue(id);
                    return Ok(());
                }
                Some(c) => {
                    return Err(EnrichError::InvalidTransition {
                        from: c.ai.status.as_str(),
                        to: "pending",
                    })
                }
            }
        }
        info!("Reset stuck enrichment for {}", id);
        self.enqueue(id);
        Ok(())
    }

    /// Stop accepting work and join the workers. Complaints left at
    /// `processing` by an interrupted run come back via `reset_stuck`.
    pub async fn shutdown(&self) {
        self.tx.lock().unwrap().take();
        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        for worker in workers {
            let _ = worker.await;
        }
        info!("Enrichment queue drained");
    }
}

fn log_outcome(id: Uuid, outcome: EnrichOutcome) {
    match outcome {
        EnrichOutcome::Done => {}
        EnrichOutcome::MarkedDuplicate => {}
        EnrichOutcome::Failed => warn!("Enrichment failed for {}, awaiting retry", id),
        EnrichOutcome::LostLease => debug!("Enrichment lease lost for {}", id),
        EnrichOutcome::AlreadyDone => debug!("Enrichment no-op for {}", id),
    }
}
