//! Report data structures for diagnostic output.
//!
//! Check verdicts are collected by a [`ReportAggregator`] and reduced to a
//! [`ReportSummary`]. The full [`DiagnosticReport`] adds the individual
//! checks, link info and stability result. All structures implement
//! Serialize for JSON output.

use crate::errors::exit_codes;
use crate::link::LinkInfo;
use crate::sampler::StabilityResult;
use crate::stats::success_rate;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Verdict of a single named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum CheckOutcome {
    Passed,
    /// The check ran and its assertion did not hold.
    Failed(String),
    /// The check could not be carried out.
    Errored(String),
}

impl CheckOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, CheckOutcome::Passed)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            CheckOutcome::Passed => None,
            CheckOutcome::Failed(reason) | CheckOutcome::Errored(reason) => Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckRecord {
    pub name: String,
    pub outcome: CheckOutcome,
    pub duration_ms: f64,
}

impl CheckRecord {
    pub fn new(name: impl Into<String>, outcome: CheckOutcome, duration_ms: f64) -> Self {
        Self {
            name: name.into(),
            outcome,
            duration_ms,
        }
    }
}

/// Suite-level counts. The field names are part of the output format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub test_suite: String,
    pub total_tests: usize,
    pub failures: usize,
    pub errors: usize,
    /// Percentage of checks that passed, `0` for an empty suite.
    pub success_rate: f64,
    /// Unix time in fractional seconds.
    pub timestamp: f64,
}

impl ReportSummary {
    pub fn was_successful(&self) -> bool {
        self.failures == 0 && self.errors == 0
    }

    pub fn exit_code(&self) -> i32 {
        if self.was_successful() {
            exit_codes::SUCCESS
        } else {
            exit_codes::CHECKS_FAILED
        }
    }
}

fn unix_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

/// Reduce check records to a summary stamped with the current time.
pub fn summarize(suite: &str, records: &[CheckRecord]) -> ReportSummary {
    summarize_at(suite, records, Utc::now())
}

fn summarize_at(suite: &str, records: &[CheckRecord], at: DateTime<Utc>) -> ReportSummary {
    let total = records.len();
    let failures = records
        .iter()
        .filter(|r| matches!(r.outcome, CheckOutcome::Failed(_)))
        .count();
    let errors = records
        .iter()
        .filter(|r| matches!(r.outcome, CheckOutcome::Errored(_)))
        .count();

    ReportSummary {
        test_suite: suite.to_string(),
        total_tests: total,
        failures,
        errors,
        success_rate: success_rate(total - failures - errors, total),
        timestamp: unix_seconds(at),
    }
}

/// Collects check records for one suite run.
#[derive(Debug, Clone)]
pub struct ReportAggregator {
    suite: String,
    records: Vec<CheckRecord>,
}

impl ReportAggregator {
    pub fn new(suite: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            records: Vec::new(),
        }
    }

    pub fn record(&mut self, record: CheckRecord) {
        self.records.push(record);
    }

    pub fn summarize(&self) -> ReportSummary {
        summarize(&self.suite, &self.records)
    }

    /// Freeze the aggregator into a full report.
    pub fn into_report(
        self,
        link: Option<LinkInfo>,
        stability: Option<StabilityResult>,
    ) -> DiagnosticReport {
        let summary = self.summarize();

        DiagnosticReport {
            summary,
            checks: self.records,
            link,
            stability,
        }
    }
}

/// Complete results from a diagnostic run.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    #[serde(flatten)]
    pub summary: ReportSummary,
    pub checks: Vec<CheckRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability: Option<StabilityResult>,
}

impl DiagnosticReport {
    pub fn exit_code(&self) -> i32 {
        self.summary.exit_code()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
