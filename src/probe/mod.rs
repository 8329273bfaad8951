//! Atomic network checks.
//!
//! A probe performs exactly one check against a [`Target`] and reports a
//! [`ProbeOutcome`]. Degraded network conditions are data, not control
//! flow: DNS failures, refused connections and timeouts all come back as
//! `Ok` outcomes with `success == false`. `Err` is reserved for caller bugs
//! and faults the probe cannot classify.
//!
//! Probes never retry; repetition is the sampler's job.

pub mod dns;
pub mod http;
pub mod ping;
pub mod scripted;
pub mod tcp;

use crate::errors::{DiagnosticError, ErrorKind};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use url::Url;

pub use dns::DnsProbe;
pub use http::HttpProbe;
pub use ping::PingProbe;
pub use scripted::{ScriptedProbe, ScriptedStep};
pub use tcp::TcpProbe;

/// Why a probe did not succeed.
///
/// Informational only: every kind counts the same against a success rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The name could not be resolved.
    Resolution,
    /// Transport failure (refused, reset, unreachable).
    Connection,
    /// The bounded wait elapsed.
    Timeout,
    /// The peer answered, but not with the expected status.
    Status,
    /// The external command could not be run.
    Command,
    /// The probe itself faulted (returned an error or panicked).
    Fault,
}

impl From<ErrorKind> for FailureKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Resolution => FailureKind::Resolution,
            ErrorKind::Timeout => FailureKind::Timeout,
            ErrorKind::Connection | ErrorKind::Unknown => FailureKind::Connection,
            ErrorKind::Command | ErrorKind::PlatformUnsupported => {
                FailureKind::Command
            }
            ErrorKind::InvalidConfiguration => FailureKind::Fault,
        }
    }
}

/// Result of a single probe invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Free-form context such as the resolved address or HTTP status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProbeOutcome {
    pub fn succeeded(latency_ms: f64) -> Self {
        Self {
            success: true,
            latency_ms: Some(latency_ms),
            error: None,
            failure: None,
            detail: None,
        }
    }

    pub fn failed(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            latency_ms: None,
            error: Some(error.into()),
            failure: Some(kind),
            detail: None,
        }
    }

    pub fn timed_out(timeout: Duration) -> Self {
        Self::failed(
            FailureKind::Timeout,
            format!("timed out after {} ms", timeout.as_millis()),
        )
    }

    pub fn with_latency(mut self, latency_ms: f64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_timeout(&self) -> bool {
        self.failure == Some(FailureKind::Timeout)
    }
}

/// What a probe is pointed at.
///
/// DNS and ping probes only need the host, TCP needs a port and HTTP uses
/// the URL when one is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    host: String,
    port: Option<u16>,
    url: Option<Url>,
}

impl Target {
    pub fn host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            url: None,
        }
    }

    pub fn endpoint(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port: Some(port),
            url: None,
        }
    }

    /// Build a target from a URL. The URL must have a host.
    pub fn url(url: Url) -> Result<Self, DiagnosticError> {
        let host = url
            .host_str()
            .ok_or_else(|| {
                DiagnosticError::config(format!("URL '{}' has no host", url))
            })?
            .to_string();
        let port = url.port_or_known_default();

        Ok(Self {
            host,
            port,
            url: Some(url),
        })
    }

    pub fn parse_url(url: &str) -> Result<Self, DiagnosticError> {
        let parsed = Url::parse(url).map_err(|e| {
            DiagnosticError::config(format!("invalid URL '{}': {}", url, e))
                .with_source(e)
        })?;

        Self::url(parsed)
    }

    pub fn host_str(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn url_ref(&self) -> Option<&Url> {
        self.url.as_ref()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.url, self.port) {
            (Some(url), _) => write!(f, "{}", url),
            (None, Some(port)) => write!(f, "{}:{}", self.host, port),
            (None, None) => f.write_str(&self.host),
        }
    }
}

/// One atomic network check.
#[allow(async_fn_in_trait)]
pub trait Probe {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    async fn check(
        &self,
        target: &Target,
        timeout: Duration,
    ) -> Result<ProbeOutcome, DiagnosticError>;
}

impl<T: Probe> Probe for &T {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn check(
        &self,
        target: &Target,
        timeout: Duration,
    ) -> Result<ProbeOutcome, DiagnosticError> {
        (**self).check(target, timeout).await
    }
}

pub(crate) fn elapsed_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
