//! ICMP echo probe, delegated to the platform `ping` binary.
//!
//! Raw sockets need privileges, so the probe shells out through a
//! [`CommandAdapter`] and judges reachability by the exit status.

use super::{elapsed_ms, FailureKind, Probe, ProbeOutcome, Target};
use crate::errors::DiagnosticError;
use crate::link::command::{CommandAdapter, CommandError};
use crate::platform::Platform;
use log::debug;
use std::time::Duration;
use tokio::time::Instant;

/// Sends one echo request per check.
#[derive(Debug, Clone)]
pub struct PingProbe<A> {
    adapter: A,
    platform: Platform,
}

impl<A: CommandAdapter> PingProbe<A> {
    pub fn new(adapter: A) -> Self {
        Self::for_platform(adapter, Platform::current())
    }

    pub fn for_platform(adapter: A, platform: Platform) -> Self {
        Self { adapter, platform }
    }
}

/// Command line for a single echo request with a reply deadline.
pub fn ping_command(platform: &Platform, host: &str, timeout: Duration) -> Vec<String> {
    let millis = timeout.as_millis().max(1);
    // Linux takes whole seconds for -W.
    let secs = timeout.as_secs().max(1);

    let args: Vec<String> = match platform {
        Platform::Windows => vec![
            "ping".into(),
            "-n".into(),
            "1".into(),
            "-w".into(),
            millis.to_string(),
        ],
        Platform::MacOs => vec![
            "ping".into(),
            "-c".into(),
            "1".into(),
            "-W".into(),
            millis.to_string(),
        ],
        Platform::Linux | Platform::Other(_) => vec![
            "ping".into(),
            "-c".into(),
            "1".into(),
            "-W".into(),
            secs.to_string(),
        ],
    };

    args.into_iter().chain(std::iter::once(host.to_string())).collect()
}

/// Extract the round-trip time from ping output.
///
/// Handles `time=12.3 ms`, `time=12ms` and the Windows `time<1ms`.
pub fn parse_rtt_ms(output: &str) -> Option<f64> {
    let lower = output.to_ascii_lowercase();
    let start = lower.find("time=").or_else(|| lower.find("time<"))?;
    let rest = &lower[start + 5..];
    let number: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    number.parse().ok()
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty()).next_back()
}

impl<A: CommandAdapter> Probe for PingProbe<A> {
    fn name(&self) -> &'static str {
        "ping"
    }

    async fn check(
        &self,
        target: &Target,
        timeout: Duration,
    ) -> Result<ProbeOutcome, DiagnosticError> {
        let host = target.host_str();
        if host.is_empty() {
            return Err(DiagnosticError::config("ping probe needs a host"));
        }

        let args = ping_command(&self.platform, host, timeout);

        let begin = Instant::now();
        let result =
            match tokio::time::timeout(timeout, self.adapter.run_command(&args)).await {
                Ok(result) => result,
                Err(_) => return Ok(ProbeOutcome::timed_out(timeout)),
            };
        let duration = begin.elapsed();

        let output = match result {
            Ok(output) => output,
            Err(CommandError::Timeout { .. }) => {
                return Ok(ProbeOutcome::timed_out(timeout))
            }
            Err(e) => {
                return Ok(ProbeOutcome::failed(
                    FailureKind::Command,
                    format!("could not run ping: {}", e),
                ))
            }
        };

        if output.success() {
            let rtt = parse_rtt_ms(&output.stdout).unwrap_or_else(|| elapsed_ms(duration));
            debug!("ping {} rtt {:.2} ms", host, rtt);
            return Ok(ProbeOutcome::succeeded(rtt));
        }

        let reason = last_line(&output.stderr)
            .or_else(|| last_line(&output.stdout))
            .unwrap_or("no reply");

        Ok(ProbeOutcome::failed(
            FailureKind::Connection,
            format!(
                "ping {} exited with {}: {}",
                host,
                output
                    .exit_code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                reason
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::command::mocks::CannedCommandAdapter;
    use crate::link::command::CommandOutput;

    const LINUX_REPLY: &str = "PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.\n\
        64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=14.2 ms\n\n\
        --- 8.8.8.8 ping statistics ---\n\
        1 packets transmitted, 1 received, 0% packet loss, time 0ms\n";

    #[test]
    fn test_ping_command_per_platform() {
        let timeout = Duration::from_millis(5000);

        assert_eq!(
            ping_command(&Platform::Linux, "8.8.8.8", timeout),
            vec!["ping", "-c", "1", "-W", "5", "8.8.8.8"]
        );
        assert_eq!(
            ping_command(&Platform::Windows, "8.8.8.8", timeout),
            vec!["ping", "-n", "1", "-w", "5000", "8.8.8.8"]
        );
        assert_eq!(
            ping_command(&Platform::MacOs, "8.8.8.8", timeout),
            vec!["ping", "-c", "1", "-W", "5000", "8.8.8.8"]
        );
    }

    #[test]
    fn test_parse_rtt_variants() {
        assert_eq!(parse_rtt_ms(LINUX_REPLY), Some(14.2));
        assert_eq!(
            parse_rtt_ms("Reply from 8.8.8.8: bytes=32 time=23ms TTL=117"),
            Some(23.0)
        );
        assert_eq!(
            parse_rtt_ms("Reply from 10.0.0.1: bytes=32 time<1ms TTL=64"),
            Some(1.0)
        );
        assert_eq!(parse_rtt_ms("Request timed out."), None);
    }

    #[tokio::test]
    async fn test_successful_ping_reports_rtt() {
        let adapter = CannedCommandAdapter::new().with_stdout("ping", LINUX_REPLY);
        let probe = PingProbe::for_platform(adapter, Platform::Linux);

        let outcome = probe
            .check(&Target::host("8.8.8.8"), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.latency_ms, Some(14.2));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let adapter = CannedCommandAdapter::new().with_output(
            "ping",
            CommandOutput {
                exit_code: Some(1),
                stdout: "1 packets transmitted, 0 received, 100% packet loss\n".into(),
                stderr: String::new(),
            },
        );
        let probe = PingProbe::for_platform(adapter, Platform::Linux);

        let outcome = probe
            .check(&Target::host("10.255.255.1"), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.failure, Some(FailureKind::Connection));
        assert!(outcome.error.unwrap().contains("100% packet loss"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_command_failure() {
        let probe = PingProbe::for_platform(CannedCommandAdapter::new(), Platform::Linux);

        let outcome = probe
            .check(&Target::host("8.8.8.8"), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.failure, Some(FailureKind::Command));
    }

    #[tokio::test]
    async fn test_command_timeout_is_timeout_failure() {
        let adapter = CannedCommandAdapter::new().with_timeout("ping");
        let probe = PingProbe::for_platform(adapter, Platform::Linux);

        let outcome = probe
            .check(&Target::host("8.8.8.8"), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(outcome.is_timeout());
    }
}
