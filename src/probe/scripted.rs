//! A probe that replays a fixed script of outcomes.
//!
//! Used to inject failures, faults and panics into the sampler without a
//! network. The script cycles once exhausted.

use super::{FailureKind, Probe, ProbeOutcome, Target};
use crate::errors::DiagnosticError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedStep {
    /// Succeed with the given latency in milliseconds.
    Succeed(f64),
    /// Fail with a connection error.
    Fail,
    /// Report a timed out check.
    Timeout,
    /// Return `Err` from the probe.
    Fault,
    /// Panic inside the probe.
    Panic,
    /// Ignore the timeout and sleep before succeeding.
    Stall(Duration),
}

#[derive(Debug)]
pub struct ScriptedProbe {
    steps: Vec<ScriptedStep>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            steps,
            calls: AtomicUsize::new(0),
        }
    }

    /// Build a script from booleans: `true` succeeds at 10 ms.
    pub fn from_pattern(pattern: &[bool]) -> Self {
        Self::new(
            pattern
                .iter()
                .map(|&ok| {
                    if ok {
                        ScriptedStep::Succeed(10.0)
                    } else {
                        ScriptedStep::Fail
                    }
                })
                .collect(),
        )
    }

    pub fn always(step: ScriptedStep) -> Self {
        Self::new(vec![step])
    }

    /// Number of times `check` has been invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Probe for ScriptedProbe {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn check(
        &self,
        _target: &Target,
        timeout: Duration,
    ) -> Result<ProbeOutcome, DiagnosticError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);

        if self.steps.is_empty() {
            return Err(DiagnosticError::config("scripted probe has no steps"));
        }

        match &self.steps[index % self.steps.len()] {
            ScriptedStep::Succeed(latency) => Ok(ProbeOutcome::succeeded(*latency)),
            ScriptedStep::Fail => Ok(ProbeOutcome::failed(
                FailureKind::Connection,
                "connection refused",
            )),
            ScriptedStep::Timeout => Ok(ProbeOutcome::timed_out(timeout)),
            ScriptedStep::Fault => Err(DiagnosticError::unknown(format!(
                "scripted fault on call {}",
                index + 1
            ))),
            ScriptedStep::Panic => panic!("scripted panic on call {}", index + 1),
            ScriptedStep::Stall(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(ProbeOutcome::succeeded(delay.as_secs_f64() * 1000.0))
            }
        }
    }
}
