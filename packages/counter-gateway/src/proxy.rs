//! JSON-RPC proxy route.
//!
//! Forwards raw JSON-RPC bodies to a single upstream. A `503` or a transport
//! failure is retried with linear backoff; any other upstream response is
//! passed through unchanged. When every attempt fails the client gets a
//! `502` carrying a JSON-RPC error envelope.

use axum::body::Bytes;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use log::{debug, warn};
use serde_json::json;
use std::time::Duration;

/// JSON-RPC error code of the exhaustion envelope.
pub const UPSTREAM_FAILED_CODE: i64 = -32000;

/// Retry and timeout settings of the proxy.
#[derive(Debug, Clone)]
pub struct ProxyPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Backoff before retry `n` is `n * backoff_step`.
    pub backoff_step: Duration,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl Default for ProxyPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_step: Duration::from_millis(500),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Response to hand back to the proxy's caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Bytes,
}

impl ProxyResponse {
    /// The `502` envelope returned once every attempt failed.
    pub fn exhausted(attempts: u32, cause: &str) -> Self {
        let envelope = json!({
            "jsonrpc": "2.0",
            "error": {
                "code": UPSTREAM_FAILED_CODE,
                "message": format!("RPC failed after {} attempts: {}", attempts, cause),
            }
        });
        Self {
            status: StatusCode::BAD_GATEWAY.as_u16(),
            content_type: "application/json".to_string(),
            body: Bytes::from(envelope.to_string()),
        }
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);
        let content_type = HeaderValue::from_str(&self.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/json"));
        (status, [(header::CONTENT_TYPE, content_type)], self.body).into_response()
    }
}

/// Forwards JSON-RPC requests to the upstream.
#[derive(Debug, Clone)]
pub struct RpcProxy {
    client: reqwest::Client,
    target: String,
    policy: ProxyPolicy,
}

impl RpcProxy {
    /// Creates a proxy posting to `target`.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(target: impl Into<String>, policy: ProxyPolicy) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(policy.timeout).build()?;
        Ok(Self {
            client,
            target: target.into(),
            policy,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Forwards `body` and returns what the caller should see. Never fails.
    pub async fn forward(&self, body: Bytes) -> ProxyResponse {
        let attempts = self.policy.max_retries + 1;
        let mut last_error = String::from("no attempt made");

        for attempt in 0..attempts {
            match self.attempt(body.clone()).await {
                Ok(response) => return response,
                Err(cause) => last_error = cause,
            }

            if attempt + 1 < attempts {
                let backoff = self.policy.backoff_step * (attempt + 1);
                warn!(
                    "RPC request failed ({}), retrying in {:?} (attempt {}/{})",
                    last_error,
                    backoff,
                    attempt + 1,
                    attempts
                );
                tokio::time::sleep(backoff).await;
            }
        }

        warn!("RPC failed after {} attempts: {}", attempts, last_error);
        ProxyResponse::exhausted(attempts, &last_error)
    }

    /// One upstream round trip; `Err` means the attempt should be retried.
    async fn attempt(&self, body: Bytes) -> Result<ProxyResponse, String> {
        let response = self
            .client
            .post(&self.target)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(format!("upstream returned {}", status));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/json")
            .to_string();
        let body = response.bytes().await.map_err(|e| e.to_string())?;

        debug!("Upstream answered {} ({} bytes)", status, body.len());
        Ok(ProxyResponse {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}
