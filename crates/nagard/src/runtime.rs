//! Runtime resolution for the AI subsystem.
//!
//! The subsystem is a Python service; we need an interpreter that can
//! actually host it. Presence on disk is not enough: a candidate only
//! counts if it passes a capability probe (importing the web stack the
//! subsystem needs). Candidates are tried in order - explicit override
//! first, then well-known paths, then bare names resolved via PATH.

use crate::config::AiConfig;
use nagar_common::EnrichError;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info, warn};

/// Modules the subsystem imports at startup; the probe checks for them.
const PROBE_IMPORTS: &str = "import fastapi, uvicorn";

/// Module invoked to host the subsystem.
const SIDECAR_MODULE: &str = "nagar_ai.server";

/// A runnable command capable of hosting the AI subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Produces a runnable command for the AI subsystem, or a configuration
/// error when no candidate passes its probe. Injected into the supervisor
/// so tests can substitute a fake.
pub trait RuntimeResolver: Send + Sync {
    fn resolve(&self) -> Result<RuntimeCommand, EnrichError>;
}

/// Resolves a Python interpreter by capability-probing an ordered candidate
/// list. The probe strategy is swappable for tests.
pub struct PythonResolver {
    override_path: Option<String>,
    probe: Box<dyn Fn(&str) -> bool + Send + Sync>,
}

impl PythonResolver {
    pub fn new(config: &AiConfig) -> Self {
        Self {
            override_path: config.python_override.clone(),
            probe: Box::new(capability_probe),
        }
    }

    /// Swap in a custom probe (tests only use this to avoid spawning real
    /// interpreters).
    pub fn with_probe(
        override_path: Option<String>,
        probe: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            override_path,
            probe: Box::new(probe),
        }
    }

    fn candidates(&self) -> Vec<String> {
        let mut list = Vec::new();
        if let Some(ref p) = self.override_path {
            list.push(p.clone());
        }
        list.push("/usr/bin/python3".to_string());
        list.push("/usr/local/bin/python3".to_string());
        list.push("python3".to_string());
        list.push("python".to_string());
        list
    }
}

/// Run `<exe> -c "import fastapi, uvicorn"` and check the exit status.
fn capability_probe(exe: &str) -> bool {
    Command::new(exe)
        .args(["-c", PROBE_IMPORTS])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

impl RuntimeResolver for PythonResolver {
    fn resolve(&self) -> Result<RuntimeCommand, EnrichError> {
        let candidates = self.candidates();
        for candidate in &candidates {
            if (self.probe)(candidate) {
                info!("AI runtime: {}", candidate);
                return Ok(RuntimeCommand {
                    program: PathBuf::from(candidate),
                    args: vec!["-m".to_string(), SIDECAR_MODULE.to_string()],
                });
            }
            debug!("Runtime candidate failed probe: {}", candidate);
        }
        warn!("No AI runtime passed the capability probe");
        Err(EnrichError::NoRuntime(format!(
            "tried {}",
            candidates.join(", ")
        )))
    }
}

/// Fixed-answer resolver for tests: returns a canned command (or error)
/// and counts how often it was asked.
pub struct FakeResolver {
    command: Option<RuntimeCommand>,
    calls: std::sync::atomic::AtomicUsize,
}

impl FakeResolver {
    pub fn with_command(program: &str, args: &[&str]) -> Self {
        Self {
            command: Some(RuntimeCommand {
                program: PathBuf::from(program),
                args: args.iter().map(|a| a.to_string()).collect(),
            }),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            command: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn resolve_calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl RuntimeResolver for FakeResolver {
    fn resolve(&self) -> Result<RuntimeCommand, EnrichError> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match &self.command {
            Some(cmd) => Ok(cmd.clone()),
            None => Err(EnrichError::NoRuntime("fake resolver".to_string())),
        }
    }
}
