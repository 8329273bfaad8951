//! The diagnostic engine.
//!
//! Runs the network suite (DNS, TCP, HTTP, latency) and the WiFi suite
//! (association, signal strength, connection stability) in sequence and
//! feeds every verdict into a [`ReportAggregator`].

use crate::config::HarnessConfig;
use crate::errors::DiagnosticError;
use crate::link::command::CommandAdapter;
use crate::link::{LinkInfo, LinkInfoResolver};
use crate::platform::Platform;
use crate::probe::{
    elapsed_ms, DnsProbe, HttpProbe, PingProbe, Probe, ProbeOutcome, TcpProbe, Target,
};
use crate::progress::{ProgressCallback, ProgressEvent};
use crate::report::{CheckOutcome, CheckRecord, DiagnosticReport, ReportAggregator};
use crate::sampler::{StabilityResult, StabilitySampler};
use log::{debug, info};
use std::fmt;
use std::str::FromStr;
use tokio::time::Instant;

/// Which checks to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suite {
    Network,
    Wifi,
    All,
}

impl Suite {
    /// Name reported as `test_suite`.
    pub fn report_name(&self) -> &'static str {
        match self {
            Suite::Network => "network_connection",
            Suite::Wifi => "wifi_stability",
            Suite::All => "all",
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.report_name())
    }
}

impl FromStr for Suite {
    type Err = DiagnosticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "network" | "network_connection" => Ok(Suite::Network),
            "wifi" | "wifi_stability" => Ok(Suite::Wifi),
            "all" => Ok(Suite::All),
            other => Err(DiagnosticError::config(format!("unknown suite '{}'", other))),
        }
    }
}

/// Map a probe result to a check verdict.
fn verdict(result: &Result<ProbeOutcome, DiagnosticError>) -> CheckOutcome {
    match result {
        Ok(outcome) if outcome.success => CheckOutcome::Passed,
        Ok(outcome) => CheckOutcome::Failed(
            outcome.error.clone().unwrap_or_else(|| "check failed".to_string()),
        ),
        Err(e) => CheckOutcome::Errored(e.to_string()),
    }
}

/// Verdict for the measured signal level against an inclusive range.
fn signal_verdict(link: &LinkInfo, floor: i32, ceiling: i32) -> CheckOutcome {
    match link.signal_dbm() {
        Some(dbm) if dbm < floor => {
            CheckOutcome::Failed(format!("signal too weak: {} dBm (floor {} dBm)", dbm, floor))
        }
        Some(dbm) if dbm > ceiling => CheckOutcome::Failed(format!(
            "signal implausibly strong: {} dBm (ceiling {} dBm)",
            dbm, ceiling
        )),
        Some(_) => CheckOutcome::Passed,
        None => CheckOutcome::Failed(format!(
            "signal level unknown ('{}')",
            link.signal_level
        )),
    }
}

/// Runs diagnostic suites against one configuration.
pub struct DiagnosticEngine<A> {
    config: HarnessConfig,
    adapter: A,
    platform: Platform,
    http: HttpProbe,
    http_target: Target,
}

impl<A: CommandAdapter> DiagnosticEngine<A> {
    /// Validate `config` and prepare the probes.
    pub fn new(config: HarnessConfig, adapter: A) -> Result<Self, DiagnosticError> {
        config.validate()?;
        let http_target = Target::parse_url(&config.http_url())?;
        let http = HttpProbe::new()?;

        Ok(Self {
            config,
            adapter,
            platform: Platform::current(),
            http,
            http_target,
        })
    }

    /// Override the detected platform.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub async fn run(
        &self,
        suite: Suite,
        progress: &dyn ProgressCallback,
    ) -> Result<DiagnosticReport, DiagnosticError> {
        let mut aggregator = ReportAggregator::new(suite.report_name());
        let mut link = None;
        let mut stability = None;

        if matches!(suite, Suite::Network | Suite::All) {
            self.run_network_checks(&mut aggregator, progress).await;
        }

        if matches!(suite, Suite::Wifi | Suite::All) {
            let (info, result) = self.run_wifi_checks(&mut aggregator, progress).await;
            link = Some(info);
            stability = result;
        }

        let report = aggregator.into_report(link, stability);
        info!(
            "Suite {} finished: {} checks, {} failures, {} errors",
            report.summary.test_suite,
            report.summary.total_tests,
            report.summary.failures,
            report.summary.errors
        );

        Ok(report)
    }

    pub async fn run_network_suite(
        &self,
        progress: &dyn ProgressCallback,
    ) -> Result<DiagnosticReport, DiagnosticError> {
        self.run(Suite::Network, progress).await
    }

    pub async fn run_wifi_suite(
        &self,
        progress: &dyn ProgressCallback,
    ) -> Result<DiagnosticReport, DiagnosticError> {
        self.run(Suite::Wifi, progress).await
    }

    fn start(&self, name: &str, progress: &dyn ProgressCallback) -> Instant {
        info!("Running check {}", name);
        progress.on_progress(ProgressEvent::CheckStarted { name: name.to_string() });
        Instant::now()
    }

    fn finish(
        &self,
        aggregator: &mut ReportAggregator,
        progress: &dyn ProgressCallback,
        name: &str,
        started: Instant,
        outcome: CheckOutcome,
    ) {
        debug!("Check {} -> {:?}", name, outcome);
        progress.on_progress(ProgressEvent::CheckFinished {
            name: name.to_string(),
            passed: outcome.is_passed(),
            reason: outcome.reason().map(str::to_string),
        });
        aggregator.record(CheckRecord::new(name, outcome, elapsed_ms(started.elapsed())));
    }

    async fn run_network_checks(
        &self,
        aggregator: &mut ReportAggregator,
        progress: &dyn ProgressCallback,
    ) {
        let timeout = self.config.timeout();
        let host = Target::host(self.config.host.clone());
        let endpoint = Target::endpoint(self.config.host.clone(), self.config.port);

        let started = self.start("dns_resolution", progress);
        let result = DnsProbe::new().check(&host, timeout).await;
        if let Ok(ProbeOutcome { detail: Some(address), .. }) = &result {
            info!("{} resolved to {}", self.config.host, address);
        }
        self.finish(aggregator, progress, "dns_resolution", started, verdict(&result));

        let started = self.start("tcp_connect", progress);
        let result = TcpProbe::new().check(&endpoint, timeout).await;
        self.finish(aggregator, progress, "tcp_connect", started, verdict(&result));

        let started = self.start("http_request", progress);
        let result = self.http.check(&self.http_target, timeout).await;
        self.finish(aggregator, progress, "http_request", started, verdict(&result));

        // Latency covers resolution plus connect, measured around the probe.
        let started = self.start("network_latency", progress);
        let result = TcpProbe::new().check(&endpoint, timeout).await;
        let outcome = match verdict(&result) {
            CheckOutcome::Passed => {
                let latency = elapsed_ms(started.elapsed());
                info!("Network latency to {}: {:.2} ms", endpoint, latency);
                if latency < self.config.max_latency_ms {
                    CheckOutcome::Passed
                } else {
                    CheckOutcome::Failed(format!(
                        "latency {:.2} ms exceeds {:.0} ms",
                        latency, self.config.max_latency_ms
                    ))
                }
            }
            other => other,
        };
        self.finish(aggregator, progress, "network_latency", started, outcome);
    }

    async fn run_wifi_checks(
        &self,
        aggregator: &mut ReportAggregator,
        progress: &dyn ProgressCallback,
    ) -> (LinkInfo, Option<StabilityResult>) {
        let resolver = LinkInfoResolver::for_platform(&self.adapter, self.platform.clone())
            .with_interface(self.config.wifi_interface.clone());

        let started = self.start("wifi_association", progress);
        let link = resolver.resolve().await;
        progress.on_progress(ProgressEvent::LinkResolved(link.clone()));
        let outcome = if link.is_associated() {
            info!("Associated with {} ({})", link.identifier, link.signal_level);
            CheckOutcome::Passed
        } else {
            CheckOutcome::Failed("not associated with a wireless network".to_string())
        };
        self.finish(aggregator, progress, "wifi_association", started, outcome);

        let started = self.start("signal_strength", progress);
        let outcome = signal_verdict(
            &link,
            self.config.signal_floor_dbm,
            self.config.signal_ceiling_dbm,
        );
        self.finish(aggregator, progress, "signal_strength", started, outcome);

        let started = self.start("connection_stability", progress);
        let probe = PingProbe::for_platform(&self.adapter, self.platform.clone());
        let target = Target::host(self.config.stability_target.clone());
        let sampler = StabilitySampler::new(self.config.sampler_config());

        let stability = match sampler.run_with_progress(&probe, &target, progress).await {
            Ok(result) => result,
            Err(e) => {
                let outcome = CheckOutcome::Errored(e.to_string());
                self.finish(aggregator, progress, "connection_stability", started, outcome);
                return (link, None);
            }
        };

        let outcome = if stability.passed {
            CheckOutcome::Passed
        } else {
            CheckOutcome::Failed(format!(
                "stability {:.1}% below {:.1}%",
                stability.success_rate, stability.threshold
            ))
        };
        self.finish(aggregator, progress, "connection_stability", started, outcome);

        (link, Some(stability))
    }
}
