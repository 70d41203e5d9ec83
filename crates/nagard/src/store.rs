//! Complaint store.
//!
//! SQLite-backed, single connection behind a mutex with WAL enabled. Two
//! conditional UPDATEs carry the pipeline's correctness load:
//!
//! - `claim` flips `ai_status` pending -> processing only when it is still
//!   pending. That conditional write IS the per-complaint lease; a worker
//!   that affects zero rows lost the claim and backs off silently.
//! - `mark_duplicate` marks a complaint duplicate only when it is not
//!   already marked, and increments the master's count in the same
//!   transaction. A retry of the same complaint can never double-increment.
//!
//! The enrichment write path accepts [`AiEnrichment`] and nothing else;
//! routing and lifecycle columns have no mutator in this module beyond
//! intake defaults, which keeps the field-ownership contract structural.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use nagar_common::api::CreateComplaintRequest;
use nagar_common::complaint::{self, AiFields, DuplicateInfo, RoutingFields};
use nagar_common::sla;
use nagar_common::{
    AiEnrichment, AiProcessingStatus, Complaint, GeoPoint, LifecycleStatus, PriorityLevel,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Outcome of a lease claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// We own the run; status is now `processing`.
    Claimed,
    /// Enrichment already completed; re-running is a no-op.
    AlreadyDone,
    /// Another worker holds the lease, or the complaint is `failed` and
    /// awaits an explicit retry.
    Lost,
    NotFound,
}

#[derive(Clone)]
pub struct ComplaintStore {
    conn: Arc<Mutex<Connection>>,
}

impl ComplaintStore {
    /// Open or create the database, enabling WAL and initializing the
    /// schema.
    pub async fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }
        info!("Opening complaint database at {}", path.display());

        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open(&path).context("Failed to open SQLite database")?;
            conn.pragma_update(None, "journal_mode", "WAL")
                .context("Failed to enable WAL mode")?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .context("Failed to set synchronous mode")?;
            Ok(conn)
        })
        .await??;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS complaints (
                id              TEXT PRIMARY KEY,
                ticket          TEXT NOT NULL,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL,
                category        TEXT NOT NULL,
                category_pinned INTEGER NOT NULL DEFAULT 0,
                images          TEXT NOT NULL DEFAULT '[]',
                longitude       REAL NOT NULL,
                latitude        REAL NOT NULL,
                ward            INTEGER NOT NULL,
                reporter        TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'reported',
                ai_status       TEXT NOT NULL DEFAULT 'pending',
                severity_score  REAL NOT NULL DEFAULT 0,
                priority_score  REAL NOT NULL DEFAULT 0,
                priority_level  TEXT NOT NULL DEFAULT 'medium',
                priority_reason TEXT NOT NULL DEFAULT '',
                ai_processed    INTEGER NOT NULL DEFAULT 0,
                is_duplicate    INTEGER NOT NULL DEFAULT 0,
                master_id       TEXT,
                duplicate_count INTEGER NOT NULL DEFAULT 0,
                office_id       TEXT,
                office_type     TEXT,
                distance_km     REAL,
                routing_reason  TEXT,
                workload        INTEGER NOT NULL DEFAULT 0,
                department_hint TEXT,
                enrichment_note TEXT,
                sla_deadline    TEXT,
                is_overdue      INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_complaints_ai_status
                ON complaints(ai_status);
            "#,
        )
        .context("Failed to initialize complaints schema")?;
        Ok(())
    }

    /// Persist a new complaint in `reported`/`pending` state. The SLA
    /// deadline starts provisional (default priority level) and is
    /// recomputed when the priority model has spoken.
    pub async fn insert(&self, req: &CreateComplaintRequest) -> Result<Complaint> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let (category, pinned) = match &req.category {
            Some(c) if !c.is_empty() => (c.clone(), true),
            _ => ("other".to_string(), false),
        };
        let provisional_sla = sla::sla_deadline(&category, PriorityLevel::Medium, now);

        let complaint = Complaint {
            id,
            ticket: complaint::ticket_code(&id),
            title: req.title.clone(),
            description: req.description.clone(),
            category,
            category_pinned: pinned,
            images: req.images.clone(),
            location: req.location,
            ward: req.ward,
            reporter: req.reporter.clone(),
            status: LifecycleStatus::Reported,
            ai: AiFields::default(),
            routing: RoutingFields::default(),
            duplicate: DuplicateInfo::default(),
            department_hint: None,
            enrichment_note: None,
            sla_deadline: Some(provisional_sla),
            is_overdue: false,
            created_at: now,
            updated_at: now,
        };

        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO complaints (
                id, ticket, title, description, category, category_pinned,
                images, longitude, latitude, ward, reporter,
                sla_deadline, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                complaint.id.to_string(),
                complaint.ticket,
                complaint.title,
                complaint.description,
                complaint.category,
                complaint.category_pinned,
                serde_json::to_string(&complaint.images)?,
                complaint.location.longitude,
                complaint.location.latitude,
                complaint.ward as i64,
                complaint.reporter,
                complaint.sla_deadline,
                complaint.created_at,
                complaint.updated_at,
            ],
        )
        .context("Failed to insert complaint")?;
        Ok(complaint)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Complaint>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT * FROM complaints WHERE id = ?1",
            params![id.to_string()],
            row_to_complaint,
        )
        .optional()
        .context("Failed to load complaint")
    }

    /// Take the enrichment lease: pending -> processing, conditionally.
    /// A won claim clears the previous run's note; each run starts clean.
    pub async fn claim(&self, id: Uuid) -> Result<ClaimOutcome> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE complaints SET ai_status = 'processing', enrichment_note = NULL,
                    updated_at = ?2
             WHERE id = ?1 AND ai_status = 'pending'",
            params![id.to_string(), Utc::now()],
        )?;
        if changed == 1 {
            return Ok(ClaimOutcome::Claimed);
        }
        let status: Option<String> = conn
            .query_row(
                "SELECT ai_status FROM complaints WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(match status.as_deref() {
            None => ClaimOutcome::NotFound,
            Some("done") => ClaimOutcome::AlreadyDone,
            Some(_) => ClaimOutcome::Lost,
        })
    }

    /// Classifier refinement. Pinned categories are never overridden.
    pub async fn set_category(&self, id: Uuid, category: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE complaints SET category = ?2, updated_at = ?3
             WHERE id = ?1 AND category_pinned = 0",
            params![id.to_string(), category, Utc::now()],
        )?;
        Ok(changed == 1)
    }

    /// Write the AI-owned sub-document. This is the only enrichment write
    /// path and it accepts only [`AiEnrichment`]; the SLA deadline is
    /// derived from the new priority and updated in the same statement.
    pub async fn apply_enrichment(
        &self,
        id: Uuid,
        enrichment: &AiEnrichment,
        sla_deadline: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE complaints SET
                severity_score = ?2,
                priority_score = ?3,
                priority_level = ?4,
                priority_reason = ?5,
                ai_processed = 1,
                sla_deadline = ?6,
                updated_at = ?7
             WHERE id = ?1",
            params![
                id.to_string(),
                enrichment.severity_score,
                enrichment.priority_score,
                enrichment.priority_level.as_str(),
                enrichment.priority_reason,
                sla_deadline,
                Utc::now(),
            ],
        )
        .context("Failed to apply enrichment")?;
        Ok(())
    }

    /// Mark `id` as a duplicate of `master_id` and bump the master's count,
    /// exactly once. Returns false when `id` was already marked (retry) -
    /// the master is not incremented again.
    pub async fn mark_duplicate(&self, id: Uuid, master_id: Uuid) -> Result<bool> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let newly_marked = tx.execute(
            "UPDATE complaints SET is_duplicate = 1, master_id = ?2, updated_at = ?3
             WHERE id = ?1 AND is_duplicate = 0",
            params![id.to_string(), master_id.to_string(), Utc::now()],
        )? == 1;
        if newly_marked {
            tx.execute(
                "UPDATE complaints SET duplicate_count = duplicate_count + 1, updated_at = ?2
                 WHERE id = ?1",
                params![master_id.to_string(), Utc::now()],
            )?;
        }
        tx.commit()?;
        Ok(newly_marked)
    }

    /// Record why the current run is degraded or about to fail, so an
    /// operator inspecting the complaint sees more than a status.
    pub async fn set_enrichment_note(&self, id: Uuid, note: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE complaints SET enrichment_note = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), note, Utc::now()],
        )?;
        Ok(())
    }

    /// Store the advisory department hint (AI scratch metadata).
    pub async fn set_department_hint(&self, id: Uuid, hint: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE complaints SET department_hint = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), hint, Utc::now()],
        )?;
        Ok(())
    }

    /// processing -> done. Conditional so it only lands on a held lease.
    pub async fn finish_done(&self, id: Uuid) -> Result<bool> {
        self.finish(id, AiProcessingStatus::Done).await
    }

    /// processing -> failed. The complaint stays visible and retryable.
    pub async fn finish_failed(&self, id: Uuid) -> Result<bool> {
        self.finish(id, AiProcessingStatus::Failed).await
    }

    async fn finish(&self, id: Uuid, to: AiProcessingStatus) -> Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE complaints SET ai_status = ?2, updated_at = ?3
             WHERE id = ?1 AND ai_status = 'processing'",
            params![id.to_string(), to.as_str(), Utc::now()],
        )?;
        Ok(changed == 1)
    }

    /// Operator retry: failed -> pending. Returns false when the complaint
    /// is not in `failed`.
    pub async fn reset_for_retry(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE complaints SET ai_status = 'pending', updated_at = ?2
             WHERE id = ?1 AND ai_status = 'failed'",
            params![id.to_string(), Utc::now()],
        )?;
        Ok(changed == 1)
    }

    /// Operator crash recovery: processing -> pending for a lease orphaned
    /// by a dead worker.
    pub async fn reset_stuck(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE complaints SET ai_status = 'pending', updated_at = ?2
             WHERE id = ?1 AND ai_status = 'processing'",
            params![id.to_string(), Utc::now()],
        )?;
        Ok(changed == 1)
    }

    /// Complaints currently in the given AI-processing state, oldest first.
    pub async fn list_by_ai_status(&self, status: AiProcessingStatus) -> Result<Vec<Complaint>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT * FROM complaints WHERE ai_status = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![status.as_str()], row_to_complaint)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Complaint counts per AI status: (pending, processing, done, failed).
    pub async fn ai_status_counts(&self) -> Result<(u64, u64, u64, u64)> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT ai_status, COUNT(*) FROM complaints GROUP BY ai_status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;
        let (mut pending, mut processing, mut done, mut failed) = (0, 0, 0, 0);
        for row in rows {
            let (status, count) = row?;
            match status.as_str() {
                "pending" => pending = count,
                "processing" => processing = count,
                "done" => done = count,
                "failed" => failed = count,
                _ => {}
            }
        }
        Ok((pending, processing, done, failed))
    }
}

fn parse_enum<T>(value: String, parse: fn(&str) -> Option<T>, what: &str) -> rusqlite::Result<T> {
    parse(&value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("bad {}: {}", what, value).into(),
        )
    })
}

fn parse_uuid(value: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_complaint(row: &Row<'_>) -> rusqlite::Result<Complaint> {
    let images: String = row.get("images")?;
    let images: Vec<String> = serde_json::from_str(&images).unwrap_or_default();
    let master_id: Option<String> = row.get("master_id")?;
    let master_id = match master_id {
        Some(s) => Some(parse_uuid(s)?),
        None => None,
    };
    Ok(Complaint {
        id: parse_uuid(row.get("id")?)?,
        ticket: row.get("ticket")?,
        title: row.get("title")?,
        description: row.get("description")?,
        category: row.get("category")?,
        category_pinned: row.get("category_pinned")?,
        images,
        location: GeoPoint {
            longitude: row.get("longitude")?,
            latitude: row.get("latitude")?,
        },
        ward: row.get::<_, i64>("ward")? as u32,
        reporter: row.get("reporter")?,
        status: parse_enum(row.get("status")?, LifecycleStatus::parse, "status")?,
        ai: AiFields {
            severity_score: row.get("severity_score")?,
            priority_score: row.get("priority_score")?,
            priority_level: parse_enum(
                row.get("priority_level")?,
                PriorityLevel::parse,
                "priority_level",
            )?,
            priority_reason: row.get("priority_reason")?,
            processed: row.get("ai_processed")?,
            status: parse_enum(row.get("ai_status")?, AiProcessingStatus::parse, "ai_status")?,
        },
        routing: RoutingFields {
            office_id: row.get("office_id")?,
            office_type: row.get("office_type")?,
            distance_km: row.get("distance_km")?,
            reason: row.get("routing_reason")?,
            workload: row.get::<_, i64>("workload")? as u32,
        },
        duplicate: DuplicateInfo {
            is_duplicate: row.get("is_duplicate")?,
            master_id,
            duplicate_count: row.get::<_, i64>("duplicate_count")? as u32,
        },
        department_hint: row.get("department_hint")?,
        enrichment_note: row.get("enrichment_note")?,
        sla_deadline: row.get("sla_deadline")?,
        is_overdue: row.get("is_overdue")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
