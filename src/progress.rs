//! Progress event types and callback interface.
//!
//! Defines the events emitted by the diagnostic engine and the sampler so
//! the console can narrate each step.

use crate::link::LinkInfo;
use crate::probe::ProbeOutcome;

/// Progress events emitted during a run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A named check is about to run
    CheckStarted {
        /// Check name, e.g. `dns_resolution`
        name: String,
    },
    /// One stability sample was taken
    SampleRecorded {
        /// Current sample number (1-indexed)
        current: usize,
        /// Total number of scheduled samples
        total: usize,
        /// The recorded outcome
        outcome: ProbeOutcome,
    },
    /// Link info was resolved (possibly to the sentinel)
    LinkResolved(LinkInfo),
    /// A named check has a verdict
    CheckFinished {
        name: String,
        passed: bool,
        /// Failure or error reason when `passed` is false
        reason: Option<String>,
    },
}

/// Callback interface for progress updates.
///
/// Implementations must be non-blocking so they do not skew latency
/// measurements.
pub trait ProgressCallback: Send + Sync {
    /// Called when a progress event occurs.
    fn on_progress(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_progress(&self, _event: ProgressEvent) {}
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use std::sync::Mutex;

    /// Collects events for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingProgress {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl RecordingProgress {
        pub fn events(&self) -> Vec<ProgressEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProgressCallback for RecordingProgress {
        fn on_progress(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
