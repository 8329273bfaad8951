//! Name resolution probe.

use super::{elapsed_ms, FailureKind, Probe, ProbeOutcome, Target};
use crate::errors::{classify_error, DiagnosticError, ErrorKind};
use hickory_resolver::{ResolveError, TokioResolver};
use log::debug;
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::Instant;

type BuildResolver = fn() -> Result<TokioResolver, ResolveError>;

fn system_resolver() -> Result<TokioResolver, ResolveError> {
    Ok(TokioResolver::builder_tokio()?.build())
}

/// Resolves the target host using the system resolver configuration.
///
/// IP literals succeed immediately without touching the network.
#[derive(Debug, Clone, Copy)]
pub struct DnsProbe {
    build_resolver: BuildResolver,
}

impl DnsProbe {
    pub fn new() -> Self {
        Self {
            build_resolver: system_resolver,
        }
    }

    /// Use `build` instead of the system configuration.
    pub fn with_resolver(build: BuildResolver) -> Self {
        Self {
            build_resolver: build,
        }
    }
}

impl Default for DnsProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Prefer an IPv4 address when the lookup returned both families.
fn pick_address(addresses: &[IpAddr]) -> Option<IpAddr> {
    addresses
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addresses.first())
        .copied()
}

impl Probe for DnsProbe {
    fn name(&self) -> &'static str {
        "dns"
    }

    async fn check(
        &self,
        target: &Target,
        timeout: Duration,
    ) -> Result<ProbeOutcome, DiagnosticError> {
        let host = target.host_str();

        if host.is_empty() {
            return Err(DiagnosticError::config("DNS probe needs a host name"));
        }

        if let Ok(ip) = host.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>()
        {
            return Ok(ProbeOutcome::succeeded(0.0).with_detail(ip.to_string()));
        }

        let resolver = match (self.build_resolver)() {
            Ok(resolver) => resolver,
            Err(e) => {
                debug!("Resolver for {} unavailable: {}", host, e);
                return Ok(ProbeOutcome::failed(
                    FailureKind::Resolution,
                    format!("no usable resolver configuration: {}", e),
                ));
            }
        };

        let begin = Instant::now();
        let lookup =
            match tokio::time::timeout(timeout, resolver.lookup_ip(host)).await {
                Ok(lookup) => lookup,
                Err(_) => return Ok(ProbeOutcome::timed_out(timeout)),
            };
        let duration = begin.elapsed();

        let response = match lookup {
            Ok(response) => response,
            Err(e) => {
                debug!("DNS lookup for {} failed: {}", host, e);
                let kind = match classify_error(&e) {
                    ErrorKind::Timeout => FailureKind::Timeout,
                    _ => FailureKind::Resolution,
                };
                return Ok(ProbeOutcome::failed(
                    kind,
                    format!("failed to resolve {}: {}", host, e),
                )
                .with_latency(elapsed_ms(duration)));
            }
        };

        let addresses: Vec<IpAddr> = response.iter().collect();

        match pick_address(&addresses) {
            Some(address) => {
                debug!("Resolved {} to {} in {:?}", host, address, duration);
                Ok(ProbeOutcome::succeeded(elapsed_ms(duration))
                    .with_detail(address.to_string()))
            }
            None => Ok(ProbeOutcome::failed(
                FailureKind::Resolution,
                format!("no addresses found for {}", host),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_pick_address_prefers_ipv4() {
        let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
        let v4 = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

        assert_eq!(pick_address(&[v6, v4]), Some(v4));
        assert_eq!(pick_address(&[v6]), Some(v6));
        assert_eq!(pick_address(&[]), None);
    }

    #[tokio::test]
    async fn test_ip_literal_resolves_without_lookup() {
        let outcome = DnsProbe::new()
            .check(&Target::host("127.0.0.1"), Duration::from_secs(1))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.detail.as_deref(), Some("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_bracketed_ipv6_literal() {
        let outcome = DnsProbe::new()
            .check(&Target::host("[::1]"), Duration::from_secs(1))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.detail.as_deref(), Some("::1"));
    }

    #[tokio::test]
    async fn test_empty_host_is_caller_error() {
        let error = DnsProbe::new()
            .check(&Target::host(""), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::InvalidConfiguration);
    }

    #[tokio::test]
    async fn test_missing_resolver_config_is_failed_outcome() {
        let probe = DnsProbe::with_resolver(|| {
            Err(ResolveError::from("/etc/resolv.conf: no such file"))
        });

        let outcome = probe
            .check(&Target::host("example.com"), Duration::from_secs(1))
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.failure, Some(FailureKind::Resolution));
        assert!(outcome.error.unwrap().contains("resolv.conf"));
    }
}
