//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub gate: GateConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Control surface bind address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Scheduler and run policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Consecutive failures after which a job is auto-paused.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Upper bound for a single generation call.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// How long an emergency stop waits for in-flight runs to drain.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            run_timeout_secs: default_run_timeout(),
            drain_timeout_secs: default_drain_timeout(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_run_timeout() -> u64 {
    120
}

fn default_drain_timeout() -> u64 {
    10
}

/// Job store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

/// Job store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// Database file for the sqlite backend.
    #[serde(default = "default_store_path")]
    pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_store_path(),
        }
    }
}

fn default_backend() -> StoreBackend {
    StoreBackend::Sqlite
}

fn default_store_path() -> Option<PathBuf> {
    Some(PathBuf::from("~/.postforge/jobs.db"))
}

/// Generation service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:9000/generate".to_string()
}

/// Trigger gate policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Trigger sources admitted by the gate. Parsed against the closed
    /// source set by the scheduler; unknown names are rejected at startup.
    #[serde(default = "default_allowed_sources")]
    pub allowed_sources: Vec<String>,

    /// Bearer token identifying interactive operator sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_token: Option<String>,

    /// HMAC-SHA256 secret for webhook signatures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            allowed_sources: default_allowed_sources(),
            control_token: None,
            webhook_secret: None,
        }
    }
}

fn default_allowed_sources() -> Vec<String> {
    vec![
        "interactive".to_string(),
        "webhook".to_string(),
        "scheduler".to_string(),
    ]
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for daily-rotated log files. Console only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: None,
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
