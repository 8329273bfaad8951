//! TCP connect probe.

use super::{elapsed_ms, FailureKind, Probe, ProbeOutcome, Target};
use crate::errors::DiagnosticError;
use log::debug;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

/// Opens (and immediately closes) a TCP connection to `host:port`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbe;

impl TcpProbe {
    pub fn new() -> Self {
        Self
    }
}

enum ConnectFailure {
    Resolve(io::Error),
    Connect(io::Error),
}

/// Resolve and connect on the calling thread.
///
/// Every resolved address is tried in order until one accepts.
fn connect_blocking(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<(SocketAddr, Duration), ConnectFailure> {
    let addresses: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(ConnectFailure::Resolve)?
        .collect();

    let mut last_error = io::Error::new(
        io::ErrorKind::AddrNotAvailable,
        format!("no addresses found for {}", host),
    );

    for address in addresses {
        let start = Instant::now();
        match TcpStream::connect_timeout(&address, timeout) {
            Ok(stream) => {
                let latency = start.elapsed();
                drop(stream);
                return Ok((address, latency));
            }
            Err(e) => last_error = e,
        }
    }

    Err(ConnectFailure::Connect(last_error))
}

/// Error text with the OS error code, mentioned once.
fn describe_io_error(e: &io::Error) -> String {
    let text = e.to_string();
    match e.raw_os_error() {
        Some(code) if !text.contains(&format!("os error {}", code)) => {
            format!("{} (os error {})", text, code)
        }
        _ => text,
    }
}

impl Probe for TcpProbe {
    fn name(&self) -> &'static str {
        "tcp"
    }

    async fn check(
        &self,
        target: &Target,
        timeout: Duration,
    ) -> Result<ProbeOutcome, DiagnosticError> {
        let port = target.port().ok_or_else(|| {
            DiagnosticError::config(format!(
                "TCP probe needs a port for target '{}'",
                target
            ))
        })?;
        let host = target.host_str().to_string();

        if timeout.is_zero() {
            return Err(DiagnosticError::config("probe timeout must be positive"));
        }

        // connect_timeout bounds each attempt; the outer timeout bounds
        // resolution plus all attempts.
        let task = tokio::task::spawn_blocking(move || {
            connect_blocking(&host, port, timeout)
        });

        let joined = match tokio::time::timeout(timeout, task).await {
            Ok(joined) => joined,
            Err(_) => return Ok(ProbeOutcome::timed_out(timeout)),
        };

        let result = joined.map_err(|e| {
            DiagnosticError::unknown(format!("TCP probe task failed: {}", e))
                .with_source(e)
        })?;

        match result {
            Ok((address, latency)) => {
                debug!("TCP connect to {} took {:?}", address, latency);
                Ok(ProbeOutcome::succeeded(elapsed_ms(latency))
                    .with_detail(address.to_string()))
            }
            Err(ConnectFailure::Resolve(e)) => Ok(ProbeOutcome::failed(
                FailureKind::Resolution,
                format!("failed to resolve {}: {}", target, e),
            )),
            Err(ConnectFailure::Connect(e)) => {
                let kind = if e.kind() == io::ErrorKind::TimedOut {
                    FailureKind::Timeout
                } else {
                    FailureKind::Connection
                };
                Ok(ProbeOutcome::failed(
                    kind,
                    format!("connect to {} failed: {}", target, describe_io_error(&e)),
                ))
            }
        }
    }
}
