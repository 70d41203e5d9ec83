//! Configuration management for nagard.
//!
//! Loads settings from /etc/nagar/config.toml or uses defaults. Every field
//! has a serde default so a partial config file is fine. Two environment
//! variables override the file: `NAGAR_AI_PYTHON` (runtime executable) and
//! `NAGAR_AI_URL` (subsystem base URL).

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/nagar/config.toml";

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

/// AI subsystem configuration: where it listens, whether we start it, and
/// how long each call may take.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Base URL of the AI subsystem HTTP API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Start the AI subsystem as a supervised child process on boot.
    #[serde(default = "default_true")]
    pub autostart_sidecar: bool,

    /// Block boot (up to `ready_timeout_secs`) until the health probe
    /// succeeds. Off means fast boots that accept early enrichment failures.
    #[serde(default = "default_true")]
    pub wait_for_ready: bool,

    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,

    /// Health-probe poll interval during the readiness wait.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Explicit runtime executable override (also `NAGAR_AI_PYTHON`).
    #[serde(default)]
    pub python_override: Option<String>,

    /// Host/port handed to the spawned subsystem via its environment.
    #[serde(default = "default_sidecar_host")]
    pub sidecar_host: String,

    #[serde(default = "default_sidecar_port")]
    pub sidecar_port: u16,

    /// Working directory for the spawned subsystem.
    #[serde(default)]
    pub sidecar_dir: Option<PathBuf>,

    /// Per-operation timeouts. Independent on purpose: classification is
    /// the slow call, health must stay snappy.
    #[serde(default = "default_classify_timeout")]
    pub classify_timeout_secs: u64,

    #[serde(default = "default_duplicate_timeout")]
    pub duplicate_timeout_secs: u64,

    #[serde(default = "default_priority_timeout")]
    pub priority_timeout_secs: u64,

    #[serde(default = "default_route_timeout")]
    pub route_timeout_secs: u64,

    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,
}

/// Enrichment pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Worker tasks draining the enrichment queue.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Minimum duplicate-detection confidence before a complaint is merged
    /// against a master. Tunable, deliberately not a constant.
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f64,
}

fn default_bind_addr() -> String {
    "127.0.0.1:7870".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/nagar/complaints.db")
}

fn default_base_url() -> String {
    "http://127.0.0.1:8601".to_string()
}

fn default_true() -> bool {
    true
}

fn default_ready_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    2
}

fn default_sidecar_host() -> String {
    "127.0.0.1".to_string()
}

fn default_sidecar_port() -> u16 {
    8601
}

fn default_classify_timeout() -> u64 {
    8
}

fn default_duplicate_timeout() -> u64 {
    8
}

fn default_priority_timeout() -> u64 {
    8
}

fn default_route_timeout() -> u64 {
    4
}

fn default_health_timeout() -> u64 {
    2
}

fn default_workers() -> usize {
    4
}

fn default_duplicate_threshold() -> f64 {
    0.82
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            ai: AiConfig::default(),
            enrichment: EnrichmentConfig::default(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            autostart_sidecar: default_true(),
            wait_for_ready: default_true(),
            ready_timeout_secs: default_ready_timeout(),
            poll_interval_secs: default_poll_interval(),
            python_override: None,
            sidecar_host: default_sidecar_host(),
            sidecar_port: default_sidecar_port(),
            sidecar_dir: None,
            classify_timeout_secs: default_classify_timeout(),
            duplicate_timeout_secs: default_duplicate_timeout(),
            priority_timeout_secs: default_priority_timeout(),
            route_timeout_secs: default_route_timeout(),
            health_timeout_secs: default_health_timeout(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            duplicate_threshold: default_duplicate_threshold(),
        }
    }
}

impl Config {
    /// Load from the default path, falling back to defaults when the file
    /// is missing or unreadable.
    pub fn load() -> Self {
        Self::load_from(Path::new(CONFIG_PATH))
    }

    pub fn load_from(path: &Path) -> Self {
        let mut config = match fs::read_to_string(path) {
            Ok(text) => match toml::from_str::<Config>(&text) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Config parse error in {}: {}, using defaults", path.display(), e);
                    Config::default()
                }
            },
            Err(_) => {
                info!("No config at {}, using defaults", path.display());
                Config::default()
            }
        };
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(python) = std::env::var("NAGAR_AI_PYTHON") {
            if !python.is_empty() {
                self.ai.python_override = Some(python);
            }
        }
        if let Ok(url) = std::env::var("NAGAR_AI_URL") {
            if !url.is_empty() {
                self.ai.base_url = url;
            }
        }
    }

    /// Write the current config back out (used by the installer).
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.ai.sidecar_port, 8601);
        assert!(config.ai.autostart_sidecar);
        assert!(config.ai.wait_for_ready);
        assert_eq!(config.enrichment.workers, 4);
        assert!(config.enrichment.duplicate_threshold > 0.5);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            bind_addr = "0.0.0.0:9000"

            [ai]
            wait_for_ready = false
            "#,
        )
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert!(!config.ai.wait_for_ready);
        // Untouched fields keep their defaults.
        assert!(config.ai.autostart_sidecar);
        assert_eq!(config.ai.health_timeout_secs, 2);
        assert_eq!(config.enrichment.duplicate_threshold, 0.82);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.ai.base_url, config.ai.base_url);
        assert_eq!(back.db_path, config.db_path);
    }
}
