//! Console output.
//!
//! Chooses between live narration, a plain summary and JSON, and renders
//! progress events and the final report.

use crate::probe::ProbeOutcome;
use crate::progress::{ProgressCallback, ProgressEvent};
use crate::report::{CheckOutcome, DiagnosticReport};
use colored::Colorize;

/// The display mode for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Colored step-by-step narration and a summary
    Text,
    /// No narration, uncolored summary only
    Plain,
    /// JSON mode - structured output only
    Json,
}

impl DisplayMode {
    /// Determine display mode from CLI flags and environment.
    ///
    /// # Returns
    /// * `Json` when json_flag is true (regardless of is_tty)
    /// * `Text` when json_flag is false AND is_tty is true
    /// * `Plain` when json_flag is false AND is_tty is false
    pub fn detect(json_flag: bool, is_tty: bool) -> Self {
        if json_flag {
            DisplayMode::Json
        } else if is_tty {
            DisplayMode::Text
        } else {
            DisplayMode::Plain
        }
    }

    pub fn narrates(&self) -> bool {
        matches!(self, DisplayMode::Text)
    }
}

fn sample_line(current: usize, total: usize, outcome: &ProbeOutcome) -> String {
    let position = format!("[{}/{}]", current, total);

    if outcome.success {
        let latency = outcome
            .latency_ms
            .map(|ms| format!(" {:.1} ms", ms))
            .unwrap_or_default();
        format!("    {} {}{}", position.dimmed(), "ok".green(), latency)
    } else {
        let label = if outcome.is_timeout() {
            "timeout"
        } else {
            "failed"
        };
        let reason = outcome.error.as_deref().unwrap_or("no reason given");
        format!("    {} {} {}", position.dimmed(), label.red(), reason.dimmed())
    }
}

fn verdict_label(outcome: &CheckOutcome) -> String {
    match outcome {
        CheckOutcome::Passed => "PASS".green().bold().to_string(),
        CheckOutcome::Failed(_) => "FAIL".red().bold().to_string(),
        CheckOutcome::Errored(_) => "ERROR".yellow().bold().to_string(),
    }
}

/// Narrates progress events to stdout as they happen.
#[derive(Debug, Default)]
pub struct ConsoleNarrator;

impl ConsoleNarrator {
    pub fn new() -> Self {
        Self
    }

    fn render(&self, event: &ProgressEvent) -> String {
        match event {
            ProgressEvent::CheckStarted { name } => {
                format!("{} {}", "==>".bright_blue().bold(), name.bold())
            }
            ProgressEvent::SampleRecorded { current, total, outcome } => {
                sample_line(*current, *total, outcome)
            }
            ProgressEvent::LinkResolved(link) => format!(
                "    {} {} {} {}",
                "SSID:".bold().white(),
                link.identifier.bright_blue(),
                "Signal:".bold().white(),
                link.signal_level.bright_blue()
            ),
            ProgressEvent::CheckFinished { passed, reason, .. } => {
                if *passed {
                    format!("    {}", "passed".green())
                } else {
                    format!(
                        "    {} {}",
                        "failed:".red(),
                        reason.as_deref().unwrap_or("no reason given")
                    )
                }
            }
        }
    }
}

impl ProgressCallback for ConsoleNarrator {
    fn on_progress(&self, event: ProgressEvent) {
        println!("{}", self.render(&event));
    }
}

/// Human-readable summary lines for a finished report.
pub fn summary_lines(report: &DiagnosticReport) -> Vec<String> {
    let summary = &report.summary;
    let mut lines = vec![
        String::new(),
        format!("{} {}", "Suite:".bold().white(), summary.test_suite),
    ];

    for check in &report.checks {
        let mut line = format!(
            "  {:<6} {:<22} {:>9.1} ms",
            verdict_label(&check.outcome),
            check.name,
            check.duration_ms
        );
        if let Some(reason) = check.outcome.reason() {
            line.push_str(&format!("  {}", reason.dimmed()));
        }
        lines.push(line);
    }

    if let Some(stability) = &report.stability {
        let mut line = format!(
            "{} {:.1}% ({}/{} samples, {} timeouts)",
            "Stability:".bold().white(),
            stability.success_rate,
            stability.successes,
            stability.samples.len(),
            stability.timeouts
        );
        if let Some(median) = stability.median_latency_ms {
            line.push_str(&format!(", median {:.1} ms", median));
        }
        if let Some(jitter) = stability.jitter_ms {
            line.push_str(&format!(", jitter {:.1} ms", jitter));
        }
        if stability.aborted {
            line.push_str(&format!(" {}", "(time budget exhausted)".yellow()));
        }
        lines.push(line);
    }

    let rate = format!("{:.1}%", summary.success_rate);
    let rate = if summary.was_successful() {
        rate.bright_green()
    } else {
        rate.bright_red()
    };
    lines.push(format!(
        "{} {} passed, {} failed, {} errors ({})",
        "Result:".bold().white(),
        summary.total_tests - summary.failures - summary.errors,
        summary.failures,
        summary.errors,
        rate
    ));

    lines
}

/// Print the final report in the selected mode.
pub fn print_report(
    report: &DiagnosticReport,
    mode: DisplayMode,
) -> Result<(), serde_json::Error> {
    match mode {
        DisplayMode::Json => println!("{}", report.to_json()?),
        DisplayMode::Text | DisplayMode::Plain => {
            for line in summary_lines(report) {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::FailureKind;
    use crate::report::{CheckRecord, ReportAggregator};
    use proptest::prelude::*;

    #[test]
    fn test_json_flag_returns_json_mode() {
        // JSON flag takes precedence regardless of TTY status
        assert_eq!(DisplayMode::detect(true, true), DisplayMode::Json);
        assert_eq!(DisplayMode::detect(true, false), DisplayMode::Json);
    }

    #[test]
    fn test_tty_without_json_returns_text_mode() {
        assert_eq!(DisplayMode::detect(false, true), DisplayMode::Text);
        assert!(DisplayMode::Text.narrates());
    }

    #[test]
    fn test_non_tty_without_json_returns_plain_mode() {
        assert_eq!(DisplayMode::detect(false, false), DisplayMode::Plain);
        assert!(!DisplayMode::Plain.narrates());
    }

    #[test]
    fn test_sample_line_mentions_timeout() {
        colored::control::set_override(false);
        let line = sample_line(2, 10, &ProbeOutcome::timed_out(std::time::Duration::from_secs(5)));
        assert!(line.contains("[2/10]"));
        assert!(line.contains("timeout"));

        let line = sample_line(
            3,
            10,
            &ProbeOutcome::failed(FailureKind::Connection, "unreachable"),
        );
        assert!(line.contains("failed unreachable"));
    }

    #[test]
    fn test_summary_lines_list_every_check() {
        colored::control::set_override(false);
        let mut aggregator = ReportAggregator::new("network_connection");
        aggregator.record(CheckRecord::new("dns_resolution", CheckOutcome::Passed, 3.0));
        aggregator.record(CheckRecord::new(
            "http_request",
            CheckOutcome::Failed("expected status 200, got 503".into()),
            40.0,
        ));
        let report = aggregator.into_report(None, None);

        let lines = summary_lines(&report);

        assert!(lines.iter().any(|l| l.contains("PASS") && l.contains("dns_resolution")));
        assert!(lines.iter().any(|l| l.contains("FAIL") && l.contains("got 503")));
        assert!(lines.last().unwrap().contains("1 passed, 1 failed, 0 errors (50.0%)"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: JSON wins, then TTY selects narration, else plain.
        #[test]
        fn display_mode_selection_property(
            json_flag in any::<bool>(),
            is_tty in any::<bool>()
        ) {
            let result = DisplayMode::detect(json_flag, is_tty);

            if json_flag {
                prop_assert_eq!(result, DisplayMode::Json);
            } else if is_tty {
                prop_assert_eq!(result, DisplayMode::Text);
            } else {
                prop_assert_eq!(result, DisplayMode::Plain);
            }
        }
    }
}
