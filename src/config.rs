//! Harness configuration.
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! command-line flags.

use crate::errors::DiagnosticError;
use crate::link::DEFAULT_INTERFACE;
use crate::sampler::{
    SamplerConfig, DEFAULT_INTERVAL_MS, DEFAULT_ITERATIONS, DEFAULT_PROBE_TIMEOUT_MS,
    DEFAULT_THRESHOLD_PERCENT,
};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default host for the network suite.
pub const DEFAULT_HOST: &str = "www.baidu.com";

/// Default port for the TCP and HTTP checks.
pub const DEFAULT_PORT: u16 = 80;

/// Default timeout for standalone network checks (in milliseconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Latency above which the network latency check fails (in milliseconds).
pub const DEFAULT_MAX_LATENCY_MS: f64 = 5000.0;

/// Default target of the stability sampler.
pub const DEFAULT_STABILITY_TARGET: &str = "8.8.8.8";

/// Default bound on external commands (in milliseconds).
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 10_000;

/// Weakest acceptable signal (dBm).
pub const DEFAULT_SIGNAL_FLOOR_DBM: i32 = -80;

/// Strongest plausible signal (dBm).
pub const DEFAULT_SIGNAL_CEILING_DBM: i32 = -30;

/// Configuration for a diagnostic run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Host for DNS, TCP and HTTP checks.
    pub host: String,
    pub port: u16,
    /// URL for the HTTP check. Derived from host and port when unset.
    pub url: Option<String>,
    pub timeout_ms: u64,
    pub max_latency_ms: f64,

    /// Host pinged by the stability sampler.
    pub stability_target: String,
    pub iterations: usize,
    pub interval_ms: u64,
    pub probe_timeout_ms: u64,
    pub threshold_percent: f64,
    pub time_budget_ms: Option<u64>,

    pub command_timeout_ms: u64,
    /// Wireless interface queried on Linux.
    pub wifi_interface: String,
    pub signal_floor_dbm: i32,
    pub signal_ceiling_dbm: i32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            url: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_latency_ms: DEFAULT_MAX_LATENCY_MS,
            stability_target: DEFAULT_STABILITY_TARGET.to_string(),
            iterations: DEFAULT_ITERATIONS,
            interval_ms: DEFAULT_INTERVAL_MS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            time_budget_ms: None,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            wifi_interface: DEFAULT_INTERFACE.to_string(),
            signal_floor_dbm: DEFAULT_SIGNAL_FLOOR_DBM,
            signal_ceiling_dbm: DEFAULT_SIGNAL_CEILING_DBM,
        }
    }
}

impl HarnessConfig {
    /// Load a JSON file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, DiagnosticError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DiagnosticError::config(format!(
                "cannot read config file '{}': {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;

        Self::from_json(&contents).map_err(|e| {
            DiagnosticError::config(format!(
                "invalid config file '{}': {}",
                path.display(),
                e.message
            ))
        })
    }

    pub fn from_json(contents: &str) -> Result<Self, DiagnosticError> {
        serde_json::from_str(contents).map_err(|e| {
            DiagnosticError::config(e.to_string()).with_source(e)
        })
    }

    pub fn validate(&self) -> Result<(), DiagnosticError> {
        if self.host.trim().is_empty() {
            return Err(DiagnosticError::config("host must not be empty"));
        }

        if self.stability_target.trim().is_empty() {
            return Err(DiagnosticError::config("stability target must not be empty"));
        }

        if self.timeout_ms == 0 || self.command_timeout_ms == 0 {
            return Err(DiagnosticError::config("timeouts must be positive"));
        }

        if self.signal_floor_dbm > self.signal_ceiling_dbm {
            return Err(DiagnosticError::config(format!(
                "signal floor {} dBm is above ceiling {} dBm",
                self.signal_floor_dbm, self.signal_ceiling_dbm
            )));
        }

        if self.max_latency_ms.is_nan() || self.max_latency_ms <= 0.0 {
            return Err(DiagnosticError::config("max latency must be positive"));
        }

        self.sampler_config().validate()
    }

    /// URL requested by the HTTP check.
    pub fn http_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None if self.port == DEFAULT_PORT => format!("http://{}", self.host),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            iterations: self.iterations,
            interval: Duration::from_millis(self.interval_ms),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            threshold_percent: self.threshold_percent,
            time_budget: self.time_budget_ms.map(Duration::from_millis),
        }
    }
}
