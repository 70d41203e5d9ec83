//! Sidecar supervisor: owns the AI subsystem's OS-level lifecycle.
//!
//! The supervisor launches the subsystem as a child process, forwards its
//! output streams into our log sink, and records its exit. It deliberately
//! never auto-restarts: a crashed subsystem degrades enrichment and an
//! operator decides what happens next. The process handle is the only
//! mutable shared state and start/stop are idempotent.

use crate::config::AiConfig;
use crate::runtime::RuntimeResolver;
use anyhow::{Context, Result};
use nagar_common::SidecarStatus;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Grace period between the termination request and a hard kill.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Exit-watcher poll interval.
const WATCH_INTERVAL: Duration = Duration::from_millis(200);

struct Inner {
    child: Option<Child>,
    pid: Option<u32>,
    /// Bumped on every start/stop so a stale exit watcher steps aside.
    generation: u64,
}

/// Supervisor for the AI subsystem child process. Cheap to clone via `Arc`;
/// injected wherever needed, never a module-level singleton.
pub struct Sidecar {
    inner: Arc<Mutex<Inner>>,
    resolver: Arc<dyn RuntimeResolver>,
    config: AiConfig,
}

impl Sidecar {
    pub fn new(resolver: Arc<dyn RuntimeResolver>, config: AiConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                child: None,
                pid: None,
                generation: 0,
            })),
            resolver,
            config,
        }
    }

    /// Start the subsystem. No-op when already running. Resolves a runtime,
    /// spawns it with the inherited environment plus the configured
    /// host/port, and attaches output forwarders and an exit watcher.
    /// Returns once the spawn itself has happened; readiness is the
    /// readiness gate's business.
    pub async fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.child.is_some() {
            info!("AI sidecar already running (pid {:?})", inner.pid);
            return Ok(());
        }

        let cmd = self.resolver.resolve()?;
        info!(
            "Starting AI sidecar: {} {}",
            cmd.program.display(),
            cmd.args.join(" ")
        );

        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .env("AI_HOST", &self.config.sidecar_host)
            .env("AI_PORT", self.config.sidecar_port.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.config.sidecar_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().context("Failed to spawn AI sidecar")?;
        let pid = child.id();
        info!("AI sidecar started (pid {:?})", pid);

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    info!("[sidecar] {}", line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("[sidecar] {}", line);
                }
            });
        }

        inner.child = Some(child);
        inner.pid = pid;
        inner.generation += 1;
        let generation = inner.generation;
        drop(inner);

        let inner_ref = Arc::clone(&self.inner);
        tokio::spawn(async move {
            watch_exit(inner_ref, generation).await;
        });

        Ok(())
    }

    /// Request graceful termination. No-op when not running. Sends SIGTERM,
    /// waits out the grace period, then hard-kills.
    pub async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(mut child) = inner.child.take() else {
            info!("AI sidecar not running, nothing to stop");
            return Ok(());
        };
        let pid = inner.pid.take();
        inner.generation += 1;
        drop(inner);

        info!("Stopping AI sidecar (pid {:?})", pid);
        if let Some(pid) = pid {
            // Graceful first; tokio's kill is SIGKILL.
            let _ = std::process::Command::new("kill")
                .args(["-TERM", &pid.to_string()])
                .status();
        }

        match tokio::time::timeout(STOP_GRACE, child.wait()).await {
            Ok(Ok(status)) => info!("AI sidecar exited: {}", status),
            Ok(Err(e)) => warn!("Failed waiting for AI sidecar exit: {}", e),
            Err(_) => {
                warn!("AI sidecar ignored SIGTERM, killing");
                let _ = child.kill().await;
            }
        }
        Ok(())
    }

    /// Whether a supervised child is currently alive. Reaps an already-
    /// exited child on the spot rather than waiting for the exit watcher.
    pub async fn is_running(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.child.as_mut() {
            None => false,
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    warn!("AI sidecar exited: {}", status);
                    inner.child = None;
                    inner.pid = None;
                    false
                }
                Err(e) => {
                    error!("AI sidecar status check failed: {}", e);
                    false
                }
            },
        }
    }

    pub async fn status(&self) -> SidecarStatus {
        let running = self.is_running().await;
        let inner = self.inner.lock().await;
        SidecarStatus {
            running,
            pid: inner.pid,
        }
    }
}

/// Poll for unexpected exit. Logs the exit status and clears the handle;
/// never restarts. Steps aside when the generation moves (stop or a newer
/// start owns the handle now).
async fn watch_exit(inner: Arc<Mutex<Inner>>, generation: u64) {
    loop {
        tokio::time::sleep(WATCH_INTERVAL).await;
        let mut guard = inner.lock().await;
        if guard.generation != generation {
            return;
        }
        let Some(child) = guard.child.as_mut() else {
            return;
        };
        match child.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) => {
                error!("AI sidecar exited unexpectedly: {}", status);
                guard.child = None;
                guard.pid = None;
                return;
            }
            Err(e) => {
                error!("AI sidecar exit watch failed: {}", e);
                guard.child = None;
                guard.pid = None;
                return;
            }
        }
    }
}
