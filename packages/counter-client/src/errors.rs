//! RPC error types and classification.
//!
//! Failures are classified once, at the network boundary, into an
//! [`RpcError`] variant. Retry and failover policy only ever look at
//! the variant, never at the wording of upstream messages.

use std::fmt;
use std::time::Duration;

/// Error codes for programmatic handling of RPC failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcErrorCode {
    /// Rate limited by the endpoint (HTTP 429 or equivalent).
    RateLimited,
    /// Endpoint temporarily unavailable (HTTP 502/503/504).
    Unavailable,
    /// Project-level quota exhausted (HTTP 403, "Rate limit exceeded").
    QuotaExceeded,
    /// Connection could not be established or was dropped.
    Transport,
    /// Request did not complete in time.
    Timeout,
    /// JSON-RPC error response from the node.
    Rpc,
    /// Transaction was rejected or failed on-chain.
    Transaction,
    /// Anything that does not fit the categories above.
    Other,
}

impl RpcErrorCode {
    /// Returns the string representation used in logs and status lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcErrorCode::RateLimited => "RATE_LIMITED",
            RpcErrorCode::Unavailable => "UNAVAILABLE",
            RpcErrorCode::QuotaExceeded => "QUOTA_EXCEEDED",
            RpcErrorCode::Transport => "TRANSPORT",
            RpcErrorCode::Timeout => "TIMEOUT",
            RpcErrorCode::Rpc => "RPC",
            RpcErrorCode::Transaction => "TRANSACTION",
            RpcErrorCode::Other => "OTHER",
        }
    }

    /// Returns whether the failure is expected to go away on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RpcErrorCode::RateLimited
                | RpcErrorCode::Unavailable
                | RpcErrorCode::Transport
                | RpcErrorCode::Timeout
        )
    }

    /// Returns whether the endpoint that produced this failure should be
    /// taken out of rotation.
    pub fn marks_endpoint_failed(&self) -> bool {
        matches!(
            self,
            RpcErrorCode::RateLimited
                | RpcErrorCode::Unavailable
                | RpcErrorCode::QuotaExceeded
                | RpcErrorCode::Transport
                | RpcErrorCode::Timeout
        )
    }
}

impl fmt::Display for RpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified RPC failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    #[error("too many requests: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("transaction error: {0}")]
    Transaction(String),
    #[error("{0}")]
    Other(String),
}

impl RpcError {
    /// Returns the error code for this failure.
    pub fn code(&self) -> RpcErrorCode {
        match self {
            RpcError::RateLimited { .. } => RpcErrorCode::RateLimited,
            RpcError::Unavailable(_) => RpcErrorCode::Unavailable,
            RpcError::QuotaExceeded(_) => RpcErrorCode::QuotaExceeded,
            RpcError::Transport(_) => RpcErrorCode::Transport,
            RpcError::Timeout(_) => RpcErrorCode::Timeout,
            RpcError::Rpc { .. } => RpcErrorCode::Rpc,
            RpcError::Transaction(_) => RpcErrorCode::Transaction,
            RpcError::Other(_) => RpcErrorCode::Other,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RpcError::RateLimited { .. })
    }

    pub fn is_transient(&self) -> bool {
        self.code().is_transient()
    }

    /// Retry-after hint carried by a rate-limit failure, if the upstream sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RpcError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        RpcError::RateLimited {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Classifies a failed HTTP exchange by its status code.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => RpcError::rate_limited(message),
            403 => RpcError::QuotaExceeded(message),
            408 => RpcError::Timeout(message),
            502..=504 => RpcError::Unavailable(message),
            _ => RpcError::from_message(message),
        }
    }

    /// Classifies a JSON-RPC error response by its code.
    ///
    /// Some providers report throttling as a JSON-RPC error with code 429
    /// instead of an HTTP status.
    pub fn from_rpc_code(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        if code == 429 {
            return RpcError::rate_limited(message);
        }
        match classify_message(&message) {
            RpcErrorCode::RateLimited => RpcError::rate_limited(message),
            RpcErrorCode::QuotaExceeded => RpcError::QuotaExceeded(message),
            _ => RpcError::Rpc { code, message },
        }
    }

    /// Classifies an error that only carries a message.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        match classify_message(&message) {
            RpcErrorCode::RateLimited => RpcError::rate_limited(message),
            RpcErrorCode::Unavailable => RpcError::Unavailable(message),
            RpcErrorCode::QuotaExceeded => RpcError::QuotaExceeded(message),
            RpcErrorCode::Transport => RpcError::Transport(message),
            RpcErrorCode::Timeout => RpcError::Timeout(message),
            _ => RpcError::Other(message),
        }
    }
}

/// Classify an error message into an [`RpcErrorCode`].
///
/// Only used for errors that reach the boundary without a status code.
pub fn classify_message(message: &str) -> RpcErrorCode {
    let msg = message.to_lowercase();

    if msg.contains("429") || msg.contains("too many requests") {
        RpcErrorCode::RateLimited
    } else if msg.contains("rate limit exceeded") || msg.contains("403 forbidden") {
        RpcErrorCode::QuotaExceeded
    } else if msg.contains("503") || msg.contains("service unavailable") {
        RpcErrorCode::Unavailable
    } else if msg.contains("timeout") || msg.contains("timed out") {
        RpcErrorCode::Timeout
    } else if msg.contains("connection refused")
        || msg.contains("connection reset")
        || msg.contains("error sending request")
    {
        RpcErrorCode::Transport
    } else {
        RpcErrorCode::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_strings() {
        assert_eq!(RpcErrorCode::RateLimited.as_str(), "RATE_LIMITED");
        assert_eq!(RpcErrorCode::QuotaExceeded.as_str(), "QUOTA_EXCEEDED");
        assert_eq!(RpcErrorCode::Timeout.to_string(), "TIMEOUT");
    }

    #[test]
    fn test_transient_codes() {
        assert!(RpcErrorCode::RateLimited.is_transient());
        assert!(RpcErrorCode::Unavailable.is_transient());
        assert!(RpcErrorCode::Transport.is_transient());
        assert!(RpcErrorCode::Timeout.is_transient());
        assert!(!RpcErrorCode::QuotaExceeded.is_transient());
        assert!(!RpcErrorCode::Rpc.is_transient());
        assert!(!RpcErrorCode::Transaction.is_transient());
    }

    #[test]
    fn test_http_status_classification() {
        assert!(RpcError::from_http_status(429, "slow down").is_rate_limited());
        assert_eq!(
            RpcError::from_http_status(503, "down").code(),
            RpcErrorCode::Unavailable
        );
        assert_eq!(
            RpcError::from_http_status(403, "forbidden").code(),
            RpcErrorCode::QuotaExceeded
        );
    }

    #[test]
    fn test_message_classification() {
        assert!(RpcError::from_message("HTTP status client error (429 Too Many Requests)")
            .is_rate_limited());
        assert!(RpcError::from_message("Too many requests for a specific RPC call").is_rate_limited());
        assert_eq!(
            RpcError::from_message("Rate limit exceeded for project").code(),
            RpcErrorCode::QuotaExceeded
        );
        assert_eq!(
            RpcError::from_message("HTTP status client error (403 Forbidden)").code(),
            RpcErrorCode::QuotaExceeded
        );
        assert_eq!(
            RpcError::from_message("blockhash not found").code(),
            RpcErrorCode::Other
        );
    }

    #[test]
    fn test_status_429_wins_over_quota_wording() {
        assert!(RpcError::from_message("HTTP 429: Rate limit exceeded").is_rate_limited());
        assert!(RpcError::from_message(
            "429 Too Many Requests for url https://rpc.example/?api-key=k403x"
        )
        .is_rate_limited());
        assert_eq!(
            RpcError::from_message("error sending request for url https://rpc.example/?api-key=k403x")
                .code(),
            RpcErrorCode::Transport
        );
    }

    #[test]
    fn test_rpc_code_classification() {
        assert!(RpcError::from_rpc_code(429, "busy").is_rate_limited());
        assert_eq!(
            RpcError::from_rpc_code(-32002, "Transaction simulation failed"),
            RpcError::Rpc {
                code: -32002,
                message: "Transaction simulation failed".to_string()
            }
        );
    }
}
