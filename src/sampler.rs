//! Repeated sampling of a probe.
//!
//! The sampler calls one probe a fixed number of times at a fixed interval
//! and reduces the outcomes to a success rate. A single bad sample (error,
//! panic, hang) is recorded as a failure; it never aborts the run.

use crate::errors::DiagnosticError;
use crate::probe::{FailureKind, Probe, ProbeOutcome, Target};
use crate::progress::{NoProgress, ProgressCallback, ProgressEvent};
use crate::stats::{jitter_f64, median_f64, success_rate};
use futures::FutureExt;
use log::{debug, info, warn};
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::Instant;

/// Default number of samples per run.
pub const DEFAULT_ITERATIONS: usize = 10;

/// Default pause between samples (in milliseconds).
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Default per-sample probe timeout (in milliseconds).
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5000;

/// Default minimum success rate for a run to pass.
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 80.0;

/// Extra time a probe gets beyond its own timeout before the sampler gives
/// up on it.
const PROBE_GRACE: Duration = Duration::from_millis(500);

/// Configuration for a sampling run.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    pub iterations: usize,
    pub interval: Duration,
    pub probe_timeout: Duration,
    pub threshold_percent: f64,
    /// Stop scheduling new samples once this much time has elapsed.
    pub time_budget: Option<Duration>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            time_budget: None,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), DiagnosticError> {
        if self.iterations == 0 {
            return Err(DiagnosticError::config("iterations must be at least 1"));
        }

        if !(0.0..=100.0).contains(&self.threshold_percent) {
            return Err(DiagnosticError::config(format!(
                "threshold must be within 0-100, got {}",
                self.threshold_percent
            )));
        }

        if self.probe_timeout.is_zero() {
            return Err(DiagnosticError::config("probe timeout must be positive"));
        }

        Ok(())
    }
}

/// The ordered outcomes of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StabilitySample {
    outcomes: Vec<ProbeOutcome>,
}

impl StabilitySample {
    pub fn push(&mut self, outcome: ProbeOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[ProbeOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn timeouts(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_timeout()).count()
    }

    /// Latencies of successful samples, in order.
    pub fn latencies(&self) -> Vec<f64> {
        self.outcomes
            .iter()
            .filter(|o| o.success)
            .filter_map(|o| o.latency_ms)
            .collect()
    }
}

/// Summary of a sampling run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StabilityResult {
    pub target: String,
    /// Scheduled iterations; `samples.len()` is lower only when aborted.
    pub iterations: usize,
    pub successes: usize,
    pub timeouts: usize,
    pub success_rate: f64,
    pub threshold: f64,
    pub passed: bool,
    pub aborted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_ms: Option<f64>,
    pub samples: StabilitySample,
}

impl StabilityResult {
    /// Reduce a set of samples. The rate covers the samples actually taken.
    pub fn from_samples(
        target: impl Into<String>,
        iterations: usize,
        samples: StabilitySample,
        threshold: f64,
        aborted: bool,
    ) -> Self {
        let successes = samples.successes();
        let rate = success_rate(successes, samples.len());
        let latencies = samples.latencies();

        Self {
            target: target.into(),
            iterations,
            successes,
            timeouts: samples.timeouts(),
            success_rate: rate,
            threshold,
            passed: rate >= threshold,
            aborted,
            median_latency_ms: median_f64(&mut latencies.clone()),
            jitter_ms: jitter_f64(&latencies),
            samples,
        }
    }

    pub fn failures(&self) -> usize {
        self.samples.len() - self.successes
    }
}

/// Drives a probe through a configured number of samples.
#[derive(Debug, Clone, Default)]
pub struct StabilitySampler {
    config: SamplerConfig,
}

impl StabilitySampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub async fn run<P: Probe>(
        &self,
        probe: &P,
        target: &Target,
    ) -> Result<StabilityResult, DiagnosticError> {
        self.run_with_progress(probe, target, &NoProgress).await
    }

    pub async fn run_with_progress<P: Probe>(
        &self,
        probe: &P,
        target: &Target,
        progress: &dyn ProgressCallback,
    ) -> Result<StabilityResult, DiagnosticError> {
        self.config.validate()?;

        let total = self.config.iterations;
        info!(
            "Sampling {} probe against {}: {} iterations every {:?}",
            probe.name(),
            target,
            total,
            self.config.interval
        );

        let started = Instant::now();
        let mut samples = StabilitySample::default();
        let mut aborted = false;

        for iteration in 0..total {
            if iteration > 0 {
                tokio::time::sleep(self.config.interval).await;

                if let Some(budget) = self.config.time_budget {
                    if started.elapsed() >= budget {
                        warn!(
                            "Time budget of {:?} exhausted after {} of {} samples",
                            budget, iteration, total
                        );
                        aborted = true;
                        break;
                    }
                }
            }

            let outcome = self.sample(probe, target).await;
            debug!("Sample {}/{}: {:?}", iteration + 1, total, outcome);

            progress.on_progress(ProgressEvent::SampleRecorded {
                current: iteration + 1,
                total,
                outcome: outcome.clone(),
            });
            samples.push(outcome);
        }

        let result = StabilityResult::from_samples(
            target.to_string(),
            total,
            samples,
            self.config.threshold_percent,
            aborted,
        );

        info!(
            "Stability of {}: {:.1}% ({} of {}), threshold {:.1}%",
            result.target,
            result.success_rate,
            result.successes,
            result.samples.len(),
            result.threshold
        );

        Ok(result)
    }

    /// Take one sample, converting faults, panics and hangs into failures.
    async fn sample<P: Probe>(&self, probe: &P, target: &Target) -> ProbeOutcome {
        let probe_timeout = self.config.probe_timeout;
        let call = AssertUnwindSafe(probe.check(target, probe_timeout)).catch_unwind();

        match tokio::time::timeout(probe_timeout + PROBE_GRACE, call).await {
            Ok(Ok(Ok(outcome))) => outcome,
            Ok(Ok(Err(e))) => {
                warn!("{} probe faulted: {}", probe.name(), e.message);
                ProbeOutcome::failed(FailureKind::Fault, e.message)
            }
            Ok(Err(payload)) => {
                let message = panic_message(payload.as_ref());
                warn!("{} probe panicked: {}", probe.name(), message);
                ProbeOutcome::failed(FailureKind::Fault, format!("probe panicked: {}", message))
            }
            Err(_) => {
                warn!(
                    "{} probe ignored its {:?} timeout; recorded as timeout",
                    probe.name(),
                    probe_timeout
                );
                ProbeOutcome::timed_out(probe_timeout)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::probe::{ScriptedProbe, ScriptedStep};
    use crate::progress::recording::RecordingProgress;
    use proptest::prelude::*;

    fn fast_config(iterations: usize) -> SamplerConfig {
        SamplerConfig {
            iterations,
            interval: Duration::ZERO,
            probe_timeout: Duration::from_millis(200),
            ..SamplerConfig::default()
        }
    }

    fn target() -> Target {
        Target::host("8.8.8.8")
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn test_default_config() {
        let config = SamplerConfig::default();
        assert_eq!(config.iterations, 10);
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert_eq!(config.threshold_percent, 80.0);
        assert!(config.time_budget.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let config = SamplerConfig {
            threshold_percent: 120.0,
            ..fast_config(1)
        };
        assert_eq!(config.validate().unwrap_err().kind, ErrorKind::InvalidConfiguration);

        let config = SamplerConfig {
            threshold_percent: -1.0,
            ..fast_config(1)
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_zero_iterations_runs_no_probes() {
        let probe = ScriptedProbe::from_pattern(&[true]);
        let sampler = StabilitySampler::new(fast_config(0));

        let error = sampler.run(&probe, &target()).await.unwrap_err();

        assert_eq!(error.kind, ErrorKind::InvalidConfiguration);
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn test_eight_of_ten_passes_at_eighty() {
        let mut pattern = vec![true; 8];
        pattern.extend([false, false]);
        let probe = ScriptedProbe::from_pattern(&pattern);
        let sampler = StabilitySampler::new(fast_config(10));

        let result = sampler.run(&probe, &target()).await.unwrap();

        assert_eq!(result.success_rate, 80.0);
        assert!(result.passed);
        assert_eq!(result.samples.len(), 10);
        assert_eq!(result.failures(), 2);
        assert_eq!(result.target, "8.8.8.8");
    }

    #[tokio::test]
    async fn test_timeouts_count_as_failures() {
        let probe = ScriptedProbe::new(vec![
            ScriptedStep::Succeed(5.0),
            ScriptedStep::Timeout,
            ScriptedStep::Succeed(7.0),
            ScriptedStep::Timeout,
        ]);
        let sampler = StabilitySampler::new(fast_config(4));

        let result = sampler.run(&probe, &target()).await.unwrap();

        assert_eq!(result.successes, 2);
        assert_eq!(result.timeouts, 2);
        assert_eq!(result.success_rate, 50.0);
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn test_faults_and_panics_do_not_abort() {
        let probe = ScriptedProbe::new(vec![
            ScriptedStep::Succeed(5.0),
            ScriptedStep::Fault,
            ScriptedStep::Panic,
            ScriptedStep::Succeed(5.0),
        ]);
        let sampler = StabilitySampler::new(fast_config(8));

        let result = sampler.run(&probe, &target()).await.unwrap();

        assert_eq!(probe.calls(), 8);
        assert_eq!(result.samples.len(), 8);
        assert_eq!(result.successes, 4);
        assert!(result
            .samples
            .outcomes()
            .iter()
            .filter(|o| !o.success)
            .all(|o| o.failure == Some(FailureKind::Fault)));
    }

    #[tokio::test]
    async fn test_stalled_probe_is_bounded() {
        let probe = ScriptedProbe::always(ScriptedStep::Stall(Duration::from_secs(30)));
        let sampler = StabilitySampler::new(SamplerConfig {
            probe_timeout: Duration::from_millis(50),
            ..fast_config(2)
        });

        let result = sampler.run(&probe, &target()).await.unwrap();

        assert_eq!(result.samples.len(), 2);
        assert_eq!(result.timeouts, 2);
        assert_eq!(result.success_rate, 0.0);
    }

    #[tokio::test]
    async fn test_time_budget_aborts_run() {
        let probe = ScriptedProbe::from_pattern(&[true]);
        let sampler = StabilitySampler::new(SamplerConfig {
            interval: Duration::from_millis(20),
            time_budget: Some(Duration::from_millis(30)),
            ..fast_config(100)
        });

        let result = sampler.run(&probe, &target()).await.unwrap();

        assert!(result.aborted);
        assert!(result.samples.len() >= 1);
        assert!(result.samples.len() < 100);
        assert_eq!(result.iterations, 100);
        assert_eq!(result.success_rate, 100.0);
    }

    /// Records when each check starts, relative to construction.
    struct ClockProbe {
        origin: Instant,
        starts: std::sync::Mutex<Vec<Duration>>,
    }

    impl Probe for ClockProbe {
        fn name(&self) -> &'static str {
            "clock"
        }

        async fn check(
            &self,
            _target: &Target,
            _timeout: Duration,
        ) -> Result<ProbeOutcome, DiagnosticError> {
            self.starts.lock().unwrap().push(self.origin.elapsed());
            Ok(ProbeOutcome::succeeded(1.0))
        }
    }

    #[tokio::test]
    async fn test_no_sample_starts_after_budget() {
        let budget = Duration::from_millis(150);
        let probe = ClockProbe {
            origin: Instant::now(),
            starts: std::sync::Mutex::new(Vec::new()),
        };
        let sampler = StabilitySampler::new(SamplerConfig {
            interval: Duration::from_millis(100),
            time_budget: Some(budget),
            ..fast_config(10)
        });

        let result = sampler.run(&probe, &target()).await.unwrap();
        let starts = probe.starts.lock().unwrap().clone();

        assert!(result.aborted);
        assert_eq!(result.samples.len(), starts.len());
        assert!(!starts.is_empty());
        assert!(
            starts.iter().all(|start| *start < budget),
            "sample started after the budget: {:?}",
            starts
        );
    }

    #[tokio::test]
    async fn test_latency_statistics() {
        let probe = ScriptedProbe::new(vec![
            ScriptedStep::Succeed(10.0),
            ScriptedStep::Succeed(14.0),
            ScriptedStep::Fail,
            ScriptedStep::Succeed(12.0),
        ]);
        let sampler = StabilitySampler::new(fast_config(4));

        let result = sampler.run(&probe, &target()).await.unwrap();

        assert_eq!(result.median_latency_ms, Some(12.0));
        assert_eq!(result.jitter_ms, Some(3.0));
    }

    #[tokio::test]
    async fn test_progress_reports_every_sample() {
        let probe = ScriptedProbe::from_pattern(&[true, false, true]);
        let sampler = StabilitySampler::new(fast_config(3));
        let progress = RecordingProgress::default();

        sampler.run_with_progress(&probe, &target(), &progress).await.unwrap();

        let currents: Vec<usize> = progress
            .events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::SampleRecorded { current, total, .. } => {
                    assert_eq!(total, 3);
                    Some(current)
                }
                _ => None,
            })
            .collect();
        assert_eq!(currents, vec![1, 2, 3]);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: the sampled rate equals count_true / N * 100.
        #[test]
        fn sampled_rate_matches_pattern(
            pattern in proptest::collection::vec(any::<bool>(), 1..30),
        ) {
            let probe = ScriptedProbe::from_pattern(&pattern);
            let sampler = StabilitySampler::new(fast_config(pattern.len()));

            let result = block_on(sampler.run(&probe, &target())).unwrap();
            let expected = pattern.iter().filter(|&&ok| ok).count() as f64
                / pattern.len() as f64
                * 100.0;

            prop_assert_eq!(result.success_rate, expected);
            prop_assert_eq!(result.samples.len(), pattern.len());
        }

        /// Property: an always-failing probe never passes a positive threshold.
        #[test]
        fn always_failing_never_passes(
            iterations in 1usize..20,
            threshold in 0.001f64..=100.0,
        ) {
            let probe = ScriptedProbe::always(ScriptedStep::Fail);
            let sampler = StabilitySampler::new(SamplerConfig {
                threshold_percent: threshold,
                ..fast_config(iterations)
            });

            let result = block_on(sampler.run(&probe, &target())).unwrap();

            prop_assert!(!result.passed);
        }

        /// Property: an always-succeeding probe passes every valid threshold.
        #[test]
        fn always_succeeding_always_passes(
            iterations in 1usize..20,
            threshold in 0.0f64..=100.0,
        ) {
            let probe = ScriptedProbe::always(ScriptedStep::Succeed(1.0));
            let sampler = StabilitySampler::new(SamplerConfig {
                threshold_percent: threshold,
                ..fast_config(iterations)
            });

            let result = block_on(sampler.run(&probe, &target())).unwrap();

            prop_assert!(result.passed);
            prop_assert_eq!(result.success_rate, 100.0);
        }
    }
}
