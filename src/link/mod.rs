//! Wireless link information.
//!
//! The resolver runs the platform's link query through a
//! [`CommandAdapter`] and parses its `key: value` output. Anything that goes
//! wrong degrades to the [`UNKNOWN`] sentinel; link resolution never fails
//! a run.

pub mod command;

use crate::errors::DiagnosticError;
use crate::platform::Platform;
use command::{CommandAdapter, CommandError};
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;

/// Placeholder for any link field that could not be determined.
pub const UNKNOWN: &str = "Unknown";

/// Interface queried on Linux when none is configured.
pub const DEFAULT_INTERFACE: &str = "wlan0";

const AIRPORT: &str = concat!(
    "/System/Library/PrivateFrameworks/Apple80211.framework",
    "/Versions/Current/Resources/airport"
);

/// Identifier and signal level of the current wireless association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkInfo {
    pub identifier: String,
    pub signal_level: String,
}

impl LinkInfo {
    pub fn unknown() -> Self {
        Self {
            identifier: UNKNOWN.to_string(),
            signal_level: UNKNOWN.to_string(),
        }
    }

    pub fn is_associated(&self) -> bool {
        !self.identifier.is_empty() && self.identifier != UNKNOWN
    }

    /// Signal level normalized to dBm.
    ///
    /// Accepts `-52 dBm`, `-52` and percentages such as `84%`, which map to
    /// `pct / 2 - 100`.
    pub fn signal_dbm(&self) -> Option<i32> {
        let raw = self.signal_level.trim();
        if raw == UNKNOWN {
            return None;
        }

        if let Some(pct) = raw.strip_suffix('%') {
            let pct: i32 = pct.trim().parse().ok()?;
            if !(0..=100).contains(&pct) {
                return None;
            }
            return Some(pct / 2 - 100);
        }

        let number = raw
            .strip_suffix("dBm")
            .or_else(|| raw.strip_suffix("dbm"))
            .unwrap_or(raw)
            .trim();

        number
            .parse::<i32>()
            .ok()
            .or_else(|| number.parse::<f64>().ok().map(|v| v.round() as i32))
    }
}

impl Default for LinkInfo {
    fn default() -> Self {
        Self::unknown()
    }
}

/// The command and output keys used to query link state on a platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkQuery {
    pub args: Vec<String>,
    pub identifier_key: &'static str,
    pub signal_key: &'static str,
}

impl LinkQuery {
    /// `interface` is only used where the query needs one (Linux).
    pub fn for_platform(
        platform: &Platform,
        interface: &str,
    ) -> Result<Self, DiagnosticError> {
        let (args, identifier_key, signal_key) = match platform {
            Platform::MacOs => (vec![AIRPORT, "-I"], "SSID", "agrCtlRSSI"),
            Platform::Linux => (vec!["iw", "dev", interface, "link"], "SSID", "signal"),
            Platform::Windows => {
                (vec!["netsh", "wlan", "show", "interfaces"], "SSID", "Signal")
            }
            Platform::Other(os) => return Err(DiagnosticError::platform(os.as_str())),
        };

        Ok(Self {
            args: args.into_iter().map(String::from).collect(),
            identifier_key,
            signal_key,
        })
    }
}

/// Parse `key: value` lines.
///
/// Lines are split on the first `:` with both halves trimmed. Lines without
/// a colon are skipped and the first occurrence of a key wins.
pub fn parse_key_value_lines(output: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        fields
            .entry(key.to_string())
            .or_insert_with(|| value.trim().to_string());
    }

    fields
}

/// Resolves [`LinkInfo`] for one platform.
#[derive(Debug, Clone)]
pub struct LinkInfoResolver<A> {
    adapter: A,
    platform: Platform,
    interface: String,
}

impl<A: CommandAdapter> LinkInfoResolver<A> {
    pub fn new(adapter: A) -> Self {
        Self::for_platform(adapter, Platform::current())
    }

    pub fn for_platform(adapter: A, platform: Platform) -> Self {
        Self {
            adapter,
            platform,
            interface: DEFAULT_INTERFACE.to_string(),
        }
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    /// Resolve link info, falling back to the sentinel on any failure.
    pub async fn resolve(&self) -> LinkInfo {
        match self.try_resolve().await {
            Ok(info) => info,
            Err(e) => {
                warn!("Link info unavailable: {}", e);
                LinkInfo::unknown()
            }
        }
    }

    /// Resolve link info, reporting why the query could not run.
    ///
    /// A query that runs but lacks a key still succeeds, with that field set
    /// to the sentinel.
    pub async fn try_resolve(&self) -> Result<LinkInfo, DiagnosticError> {
        let query = LinkQuery::for_platform(&self.platform, &self.interface)?;

        let output =
            self.adapter.run_command(&query.args).await.map_err(|e| match e {
                CommandError::Timeout { .. } => {
                    DiagnosticError::timeout(format!("link query failed: {}", e))
                        .with_source(e)
                }
                e => DiagnosticError::command(format!("link query failed: {}", e))
                    .with_source(e),
            })?;

        debug!("Link query stdout:\n{}", output.stdout);

        if !output.success() {
            return Err(DiagnosticError::command(format!(
                "link query exited with {:?}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }

        let fields = parse_key_value_lines(&output.stdout);
        let field = |key: &str| {
            fields
                .get(key)
                .filter(|value| !value.is_empty())
                .cloned()
                .unwrap_or_else(|| UNKNOWN.to_string())
        };

        Ok(LinkInfo {
            identifier: field(query.identifier_key),
            signal_level: field(query.signal_key),
        })
    }
}
