//! Outbound relay of a query to the resolved downstream.

use axum::body::Bytes;
use axum::http::{header, StatusCode};
use serde::de::IgnoredAny;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::error::ForwardError;
use crate::metrics;

/// A downstream answer, kept as the exact bytes received.
#[derive(Debug, Clone, PartialEq)]
pub struct DownstreamResponse {
    /// Success status returned by the downstream.
    pub status: StatusCode,
    /// JSON body, unmodified.
    pub body: Bytes,
}

/// Relays query bodies to downstream services.
#[derive(Debug, Clone)]
pub struct Forwarder {
    /// HTTP client for downstream requests.
    http: reqwest::Client,
    /// Path appended to each redirect URL.
    path: String,
}

impl Forwarder {
    /// Create a forwarder with the timeouts and path from config.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.forward_timeout())
            .connect_timeout(config.connect_timeout())
            .tcp_nodelay(true)
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            // Downstreams are internal services, reached directly.
            .no_proxy()
            .build()?;

        Ok(Self::with_client(http, config.forward_path.clone()))
    }

    /// Create a forwarder around an existing client.
    pub fn with_client(http: reqwest::Client, path: impl Into<String>) -> Self {
        Self {
            http,
            path: path.into(),
        }
    }

    /// Build the outbound URL for a redirect base URL.
    pub fn target_url(&self, redirect_url: &str) -> Result<url::Url, ForwardError> {
        let raw = format!("{}{}", redirect_url.trim().trim_end_matches('/'), self.path);
        let invalid = |reason: String| ForwardError::InvalidUrl {
            url: raw.clone(),
            reason,
        };

        let url = url::Url::parse(&raw).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(invalid(format!("unsupported scheme {other}"))),
        }
    }

    /// POST `body` to `<redirect_url><path>` and capture the JSON answer.
    ///
    /// One attempt, no retry. The body is sent exactly as given.
    #[instrument(skip(self, body), fields(bytes = body.len()))]
    pub async fn forward(
        &self,
        redirect_url: &str,
        body: Bytes,
    ) -> Result<DownstreamResponse, ForwardError> {
        let result = self.send(redirect_url, body).await;
        if let Err(e) = &result {
            metrics::inc_forward_failures(e.kind());
            warn!(error = %e, "Forward failed");
        }
        result
    }

    async fn send(&self, redirect_url: &str, body: Bytes) -> Result<DownstreamResponse, ForwardError> {
        let url = self.target_url(redirect_url)?;
        let url_text = url.to_string();
        let timer = metrics::timer_forward();

        let response = self
            .http
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| classify_transport_error(&url_text, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ForwardError::Status {
                url: url_text,
                status,
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_transport_error(&url_text, e))?;

        serde_json::from_slice::<IgnoredAny>(&body).map_err(|e| ForwardError::InvalidJson {
            url: url_text.clone(),
            reason: e.to_string(),
        })?;

        debug!(
            status = %status,
            bytes = body.len(),
            elapsed_ms = timer.elapsed_ms(),
            "Downstream answered"
        );
        Ok(DownstreamResponse { status, body })
    }
}

fn classify_transport_error(url: &str, error: reqwest::Error) -> ForwardError {
    if error.is_timeout() {
        ForwardError::Timeout {
            url: url.to_string(),
        }
    } else {
        ForwardError::Unreachable {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn forwarder() -> Forwarder {
        Forwarder::new(&Config::default()).unwrap()
    }

    #[test]
    fn appends_query_path() {
        let url = forwarder().target_url("http://svc-a").unwrap();
        assert_eq!(url.as_str(), "http://svc-a/query");
    }

    #[test]
    fn trailing_slash_is_not_doubled() {
        let url = forwarder().target_url("http://svc-a:9000/api/").unwrap();
        assert_eq!(url.as_str(), "http://svc-a:9000/api/query");
    }

    #[test]
    fn rejects_relative_and_foreign_urls() {
        let err = forwarder().target_url("svc-a").unwrap_err();
        assert_eq!(err.kind(), "invalid_url");

        let err = forwarder().target_url("ftp://svc-a").unwrap_err();
        assert_eq!(err.kind(), "invalid_url");
    }

    #[tokio::test]
    async fn unreachable_downstream_is_classified() {
        let addr = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();

        let err = forwarder()
            .forward(&format!("http://{}", addr), Bytes::from_static(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, ForwardError::Unreachable { .. } | ForwardError::Timeout { .. }));
    }
}
