//! Scripted network and WiFi link diagnostics.
//!
//! Probes perform single checks, the sampler repeats a probe to measure
//! stability, and the engine runs whole suites into a report.

pub mod config;
pub mod display;
pub mod engine;
pub mod errors;
pub mod link;
pub mod platform;
pub mod probe;
pub mod progress;
pub mod report;
pub mod sampler;
pub mod stats;
