//! HTTP GET probe.

use super::{elapsed_ms, FailureKind, Probe, ProbeOutcome, Target};
use crate::errors::{classify_error, DiagnosticError};
use log::debug;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

const USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Issues a single GET and succeeds only on `200 OK`.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self, DiagnosticError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .no_proxy()
            .build()
            .map_err(|e| {
                DiagnosticError::unknown(format!("failed to build HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self { client })
    }
}

/// The URL to request: the target's own URL, or `http://host:port/`.
fn request_url(target: &Target) -> Result<Url, DiagnosticError> {
    if let Some(url) = target.url_ref() {
        return Ok(url.clone());
    }

    let raw = match target.port() {
        Some(port) => format!("http://{}:{}/", target.host_str(), port),
        None => format!("http://{}/", target.host_str()),
    };

    Url::parse(&raw).map_err(|e| {
        DiagnosticError::config(format!("cannot build URL for '{}': {}", target, e))
            .with_source(e)
    })
}

impl Probe for HttpProbe {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn check(
        &self,
        target: &Target,
        timeout: Duration,
    ) -> Result<ProbeOutcome, DiagnosticError> {
        let url = request_url(target)?;

        let begin = Instant::now();
        let response = self.client.get(url.clone()).timeout(timeout).send().await;
        let duration = begin.elapsed();

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Ok(ProbeOutcome::timed_out(timeout)),
            Err(e) => {
                debug!("GET {} failed: {:?}", url, e);
                let kind = FailureKind::from(classify_error(&e));
                return Ok(ProbeOutcome::failed(
                    kind,
                    format!("GET {} failed: {}", url, e),
                ));
            }
        };

        let status = response.status();
        let latency = elapsed_ms(duration);

        if status == StatusCode::OK {
            Ok(ProbeOutcome::succeeded(latency).with_detail(status.to_string()))
        } else {
            Ok(ProbeOutcome::failed(
                FailureKind::Status,
                format!("expected status 200, got {}", status.as_u16()),
            )
            .with_latency(latency)
            .with_detail(status.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve exactly one request with a canned status line.
    fn serve_once(status_line: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
                    status_line
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        port
    }

    #[test]
    fn test_request_url_from_endpoint() {
        let url = request_url(&Target::endpoint("example.com", 8080)).unwrap();
        assert_eq!(url.as_str(), "http://example.com:8080/");
    }

    #[test]
    fn test_request_url_prefers_explicit_url() {
        let target = Target::parse_url("http://example.com/health").unwrap();
        assert_eq!(request_url(&target).unwrap().as_str(), "http://example.com/health");
    }

    #[tokio::test]
    async fn test_status_200_is_success() {
        let port = serve_once("200 OK");
        let probe = HttpProbe::new().unwrap();

        let outcome = probe
            .check(&Target::endpoint("127.0.0.1", port), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(outcome.success, "unexpected failure: {:?}", outcome.error);
    }

    #[tokio::test]
    async fn test_non_200_is_status_failure() {
        let port = serve_once("503 Service Unavailable");
        let probe = HttpProbe::new().unwrap();

        let outcome = probe
            .check(&Target::endpoint("127.0.0.1", port), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.failure, Some(FailureKind::Status));
        assert!(outcome.error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_refused_is_connection_failure() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let probe = HttpProbe::new().unwrap();

        let outcome = probe
            .check(&Target::endpoint("127.0.0.1", port), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.failure, Some(FailureKind::Connection));
    }
}
