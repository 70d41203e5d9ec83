//! Typed client for the AI subsystem.
//!
//! Four capabilities plus a health probe, each with its own bounded timeout
//! and no built-in retry - retry policy belongs to the orchestrator. Every
//! call returns either a result or one of the three `AiClientError` kinds;
//! nothing is swallowed.
//!
//! Production code uses `HttpAiClient`. Test code uses `FakeAiClient` with
//! scripted responses and call counters.

use crate::config::AiConfig;
use async_trait::async_trait;
use nagar_common::{AiClientError, GeoPoint, PriorityLevel};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// Classifier output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub confidence: f64,
}

/// Duplicate-detection input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateQuery {
    pub text: String,
    pub category: String,
    pub location: GeoPoint,
}

/// Duplicate-detection output. `match_id` is absent when nothing similar
/// was found; the caller applies its own confidence threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub match_id: Option<Uuid>,
    pub confidence: f64,
}

/// Priority-model input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityFeatures {
    pub category: String,
    pub ward: u32,
    pub description: String,
    pub image_count: usize,
}

/// Priority-model output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityResult {
    pub score: f64,
    pub level: PriorityLevel,
    pub reason: String,
}

/// Advisory department hint. Not an assignment - routing owns that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentHint {
    pub department: String,
}

/// The AI subsystem boundary.
#[async_trait]
pub trait AiClient: Send + Sync {
    async fn health(&self) -> Result<(), AiClientError>;

    async fn classify(
        &self,
        title: &str,
        description: &str,
        images: &[String],
    ) -> Result<Classification, AiClientError>;

    async fn detect_duplicates(
        &self,
        query: &DuplicateQuery,
    ) -> Result<DuplicateMatch, AiClientError>;

    async fn calculate_priority(
        &self,
        features: &PriorityFeatures,
    ) -> Result<PriorityResult, AiClientError>;

    async fn route_department(&self, category: &str) -> Result<DepartmentHint, AiClientError>;
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    title: &'a str,
    description: &'a str,
    images: &'a [String],
}

#[derive(Serialize)]
struct RouteRequest<'a> {
    category: &'a str,
}

/// HTTP implementation against the subsystem's REST API.
pub struct HttpAiClient {
    http: reqwest::Client,
    base_url: String,
    config: AiConfig,
}

impl HttpAiClient {
    pub fn new(config: &AiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config: config.clone(),
        }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<T, AiClientError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| AiClientError::Server(format!("undecodable response: {}", e)))
    }
}

/// A transport failure means no usable response arrived.
fn map_send_error(e: reqwest::Error) -> AiClientError {
    AiClientError::Network(e.to_string())
}

/// 4xx is our fault and not retryable; everything else non-2xx is theirs.
fn status_error(status: StatusCode, body: &str) -> AiClientError {
    let msg = format!("{}: {}", status, body.trim());
    if status.is_client_error() {
        AiClientError::Client(msg)
    } else {
        AiClientError::Server(msg)
    }
}

#[async_trait]
impl AiClient for HttpAiClient {
    async fn health(&self) -> Result<(), AiClientError> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .timeout(Duration::from_secs(self.config.health_timeout_secs))
            .send()
            .await
            .map_err(map_send_error)?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(status_error(status, ""))
        }
    }

    async fn classify(
        &self,
        title: &str,
        description: &str,
        images: &[String],
    ) -> Result<Classification, AiClientError> {
        self.post(
            "/classify",
            &ClassifyRequest {
                title,
                description,
                images,
            },
            Duration::from_secs(self.config.classify_timeout_secs),
        )
        .await
    }

    async fn detect_duplicates(
        &self,
        query: &DuplicateQuery,
    ) -> Result<DuplicateMatch, AiClientError> {
        self.post(
            "/duplicates",
            query,
            Duration::from_secs(self.config.duplicate_timeout_secs),
        )
        .await
    }

    async fn calculate_priority(
        &self,
        features: &PriorityFeatures,
    ) -> Result<PriorityResult, AiClientError> {
        self.post(
            "/priority",
            features,
            Duration::from_secs(self.config.priority_timeout_secs),
        )
        .await
    }

    async fn route_department(&self, category: &str) -> Result<DepartmentHint, AiClientError> {
        self.post(
            "/route",
            &RouteRequest { category },
            Duration::from_secs(self.config.route_timeout_secs),
        )
        .await
    }
}

// ============================================================================
// Fake AI Client (tests and degraded-mode experiments)
// ============================================================================

type Scripted<T> = Mutex<Result<T, AiClientError>>;

/// Scripted AI client: every operation returns a pre-configured answer and
/// bumps a counter. Build with the `with_*` methods.
pub struct FakeAiClient {
    classification: Scripted<Classification>,
    duplicate: Scripted<DuplicateMatch>,
    priority: Scripted<PriorityResult>,
    department: Scripted<DepartmentHint>,
    /// Health calls fail while this is above zero, then succeed.
    health_failures: AtomicUsize,
    pub classify_calls: AtomicUsize,
    pub duplicate_calls: AtomicUsize,
    pub priority_calls: AtomicUsize,
    pub route_calls: AtomicUsize,
    pub health_calls: AtomicUsize,
}

impl Default for FakeAiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAiClient {
    pub fn new() -> Self {
        Self {
            classification: Mutex::new(Ok(Classification {
                category: "other".to_string(),
                confidence: 0.5,
            })),
            duplicate: Mutex::new(Ok(DuplicateMatch {
                match_id: None,
                confidence: 0.0,
            })),
            priority: Mutex::new(Ok(PriorityResult {
                score: 50.0,
                level: PriorityLevel::Medium,
                reason: "default".to_string(),
            })),
            department: Mutex::new(Ok(DepartmentHint {
                department: "general".to_string(),
            })),
            health_failures: AtomicUsize::new(0),
            classify_calls: AtomicUsize::new(0),
            duplicate_calls: AtomicUsize::new(0),
            priority_calls: AtomicUsize::new(0),
            route_calls: AtomicUsize::new(0),
            health_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_classification(self, category: &str, confidence: f64) -> Self {
        *self.classification.lock().unwrap() = Ok(Classification {
            category: category.to_string(),
            confidence,
        });
        self
    }

    pub fn classify_fails(self, err: AiClientError) -> Self {
        *self.classification.lock().unwrap() = Err(err);
        self
    }

    pub fn with_duplicate(self, match_id: Uuid, confidence: f64) -> Self {
        *self.duplicate.lock().unwrap() = Ok(DuplicateMatch {
            match_id: Some(match_id),
            confidence,
        });
        self
    }

    pub fn duplicates_fail(self, err: AiClientError) -> Self {
        *self.duplicate.lock().unwrap() = Err(err);
        self
    }

    pub fn with_priority(self, score: f64, level: PriorityLevel, reason: &str) -> Self {
        *self.priority.lock().unwrap() = Ok(PriorityResult {
            score,
            level,
            reason: reason.to_string(),
        });
        self
    }

    pub fn priority_fails(self, err: AiClientError) -> Self {
        *self.priority.lock().unwrap() = Err(err);
        self
    }

    pub fn with_department(self, department: &str) -> Self {
        *self.department.lock().unwrap() = Ok(DepartmentHint {
            department: department.to_string(),
        });
        self
    }

    pub fn route_fails(self, err: AiClientError) -> Self {
        *self.department.lock().unwrap() = Err(err);
        self
    }

    /// First `n` health probes fail, the rest succeed.
    pub fn health_ready_after(self, n: usize) -> Self {
        self.health_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Re-script the priority answer mid-test (e.g. a recovered subsystem).
    pub fn script_priority(&self, result: Result<PriorityResult, AiClientError>) {
        *self.priority.lock().unwrap() = result;
    }

    /// Re-script the duplicate answer mid-test.
    pub fn script_duplicate(&self, result: Result<DuplicateMatch, AiClientError>) {
        *self.duplicate.lock().unwrap() = result;
    }
}

#[async_trait]
impl AiClient for FakeAiClient {
    async fn health(&self) -> Result<(), AiClientError> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.health_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.health_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AiClientError::Network("not up yet".to_string()));
        }
        Ok(())
    }

    async fn classify(
        &self,
        _title: &str,
        _description: &str,
        _images: &[String],
    ) -> Result<Classification, AiClientError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        self.classification.lock().unwrap().clone()
    }

    async fn detect_duplicates(
        &self,
        _query: &DuplicateQuery,
    ) -> Result<DuplicateMatch, AiClientError> {
        self.duplicate_calls.fetch_add(1, Ordering::SeqCst);
        self.duplicate.lock().unwrap().clone()
    }

    async fn calculate_priority(
        &self,
        _features: &PriorityFeatures,
    ) -> Result<PriorityResult, AiClientError> {
        self.priority_calls.fetch_add(1, Ordering::SeqCst);
        self.priority.lock().unwrap().clone()
    }

    async fn route_department(&self, _category: &str) -> Result<DepartmentHint, AiClientError> {
        self.route_calls.fetch_add(1, Ordering::SeqCst);
        self.department.lock().unwrap().clone()
    }
}
