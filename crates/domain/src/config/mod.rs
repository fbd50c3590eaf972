mod request;
mod router;
mod scenario;
mod sse;

pub use request::*;
pub use router::*;
pub use scenario::*;
pub use sse::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub sse: SseConfig,
    #[serde(default)]
    pub request: RequestConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read and parse a TOML file. A missing file is an `Io` error; callers
    /// that want defaults check for existence first.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.router.base_url.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "router.base_url".into(),
                message: "base_url must not be empty".into(),
            });
        }

        if self.router.service_name.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "router.service_name".into(),
                message: "service_name must not be empty".into(),
            });
        }

        if self.sse.line_budget == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "sse.line_budget".into(),
                message: "line_budget must be greater than 0".into(),
            });
        }

        // A client timeout at or below the router's ceiling makes a router-side
        // timeout reply indistinguishable from the client giving up first.
        if self.request.timeout_ms <= self.router.server_timeout_ms {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "request.timeout_ms".into(),
                message: format!(
                    "{}ms does not exceed router.server_timeout_ms ({}ms)",
                    self.request.timeout_ms, self.router.server_timeout_ms
                ),
            });
        }

        if self.request.transient_markers.is_empty() && self.request.transient_codes.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "request.transient_markers".into(),
                message: "no transient markers or codes; JSON-RPC errors will never be retried"
                    .into(),
            });
        }

        errors
    }
}
