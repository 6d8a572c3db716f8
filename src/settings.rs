use std::path::Path;

use axum::http::Method;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

use crate::monitor::diagnostics::{DEFAULT_RECENT_BREACHES, RECENT_BREACHES_LIMIT};
use crate::monitor::{LiveThreshold, MatchPolicy, NamespacePattern, RecentBreaches};

/// Env prefix; nested keys use `__`, e.g. `CALL_MONITOR__MONITOR__WARN_THRESHOLD`.
pub const ENV_PREFIX: &str = "CALL_MONITOR";

/// Optional TOML file read from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "call-monitor.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("unknown HTTP method {0:?} in monitor.http_methods")]
    HttpMethod(String),

    #[error("invalid monitor.warn_threshold: {0}")]
    Threshold(#[from] crate::error::MonitorError),

    #[error("monitor.recent_breaches must be at most {RECENT_BREACHES_LIMIT}, got {0}")]
    RecentBreaches(usize),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Seed demo users/products at startup.
    #[serde(default = "default_true")]
    pub seed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSettings {
    /// Calls per second (one-minute rate) at which a method starts logging.
    #[serde(default = "default_warn_threshold")]
    pub warn_threshold: f64,
    #[serde(default = "default_service_patterns")]
    pub service_patterns: Vec<String>,
    #[serde(default = "default_http_methods")]
    pub http_methods: Vec<String>,
    #[serde(default = "default_recent_breaches")]
    pub recent_breaches: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    #[serde(default)]
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".into()
}
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/".into()
}
fn default_true() -> bool {
    true
}
fn default_warn_threshold() -> f64 {
    LiveThreshold::DEFAULT
}
fn default_service_patterns() -> Vec<String> {
    vec![concat!(env!("CARGO_CRATE_NAME"), "..services").into()]
}
fn default_http_methods() -> Vec<String> {
    MatchPolicy::default_http_methods()
        .iter()
        .map(|m| m.as_str().to_owned())
        .collect()
}
fn default_recent_breaches() -> usize {
    DEFAULT_RECENT_BREACHES
}
fn default_log_filter() -> String {
    "info".into()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            redis_url: default_redis_url(),
            seed: true,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            warn_threshold: default_warn_threshold(),
            service_patterns: default_service_patterns(),
            http_methods: default_http_methods(),
            recent_breaches: default_recent_breaches(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}

impl Settings {
    /// Layers: serde defaults < TOML file (if present) < environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings = Config::builder()
            .add_source(file.format(FileFormat::Toml))
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, SettingsError> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("monitor.service_patterns")
        .with_list_parse_key("monitor.http_methods")
}

impl MonitorSettings {
    pub fn threshold(&self) -> Result<LiveThreshold, SettingsError> {
        Ok(LiveThreshold::new(self.warn_threshold)?)
    }

    pub fn breach_buffer(&self) -> Result<RecentBreaches, SettingsError> {
        if self.recent_breaches > RECENT_BREACHES_LIMIT {
            return Err(SettingsError::RecentBreaches(self.recent_breaches));
        }
        Ok(RecentBreaches::new(self.recent_breaches))
    }

    pub fn match_policy(&self) -> Result<MatchPolicy, SettingsError> {
        let patterns = self
            .service_patterns
            .iter()
            .map(|p| NamespacePattern::parse(p))
            .collect();
        let methods = self
            .http_methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
                    .map_err(|_| SettingsError::HttpMethod(m.clone()))
            })
            .collect::<Result<_, _>>()?;
        Ok(MatchPolicy::new(patterns, methods))
    }
}
