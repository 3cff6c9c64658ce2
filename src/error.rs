//! Error taxonomy for the gateway core.
//!
//! Every failure that can cross a component boundary is classified here so
//! the retry policy, circuit breaker, and transport-facing reply mapping can
//! each make their decision from the same vocabulary. Errors that fan out
//! through the deduplicator are `Clone` so every waiter observes the same
//! terminal outcome.

use std::fmt;
use thiserror::Error;

/// Classification of an upstream service failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The upstream call exceeded its deadline.
    Timeout,
    /// 5xx-style upstream failure.
    ServerError,
    /// The upstream rejected the call with a rate-limit response.
    RateLimited,
    /// Connection, DNS, or other transport-level failure.
    Network,
    /// Credentials rejected. Retrying cannot help.
    Auth,
    /// The service is misconfigured. Retrying cannot help.
    Config,
    /// Anything that did not match a more specific classification.
    Other,
}

impl ErrorKind {
    /// Auth and config problems are permanent until an operator intervenes;
    /// everything else is worth another attempt.
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::Auth | ErrorKind::Config)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::ServerError => "server_error",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Network => "network",
            ErrorKind::Auth => "auth",
            ErrorKind::Config => "config",
            ErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a [`ChatService`](crate::services::ChatService)
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("upstream {kind}: {message}")]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServerError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Classify an untyped error by its message.
    ///
    /// Wire-level clients that surface raw HTTP/transport errors can run them
    /// through this to land in the right taxonomy bucket. Check order matters:
    /// a 429 body often also mentions "limit" and "retry", so rate limits are
    /// matched before the generic buckets.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();

        let kind = if lower.contains("rate limit") || message.contains("429") {
            ErrorKind::RateLimited
        } else if lower.contains("timeout") || lower.contains("timed out") {
            ErrorKind::Timeout
        } else if message.contains("401") || lower.contains("unauthorized") {
            ErrorKind::Auth
        } else if ["500", "502", "503", "504"]
            .iter()
            .any(|code| message.contains(code))
        {
            ErrorKind::ServerError
        } else if ["connection", "network", "dns"]
            .iter()
            .any(|term| lower.contains(term))
        {
            ErrorKind::Network
        } else if ["config", "missing", "invalid"]
            .iter()
            .any(|term| lower.contains(term))
        {
            ErrorKind::Config
        } else {
            ErrorKind::Other
        };

        Self::new(kind, message)
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        Self::classify(&format!("{err:#}"))
    }
}

/// Crate-wide error type.
///
/// Nothing here ever reaches the transport layer as-is: the gateway resolves
/// every variant into a structured, user-safe reply and keeps the
/// classification detail in the logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Bad input, surfaced to the caller, never retried.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Admission denied by the rate limiter.
    #[error("rate limit exceeded for user {user}")]
    RateLimitExceeded { user: u64 },

    /// The circuit breaker refused the call without consulting upstream.
    #[error("circuit open for service '{service}'")]
    CircuitOpen { service: String },

    /// A classified upstream failure.
    #[error(transparent)]
    Upstream(#[from] ServiceError),

    /// Misconfiguration detected inside the core.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the retry policy may attempt this call again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Upstream(err) => err.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_rate_limit_before_generic_buckets() {
        let err = ServiceError::classify("429 Too Many Requests, retry later");
        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert!(err.is_retryable());
    }

    #[test]
    fn classify_timeout() {
        assert_eq!(
            ServiceError::classify("request timed out after 30s").kind,
            ErrorKind::Timeout
        );
    }

    #[test]
    fn classify_auth_is_not_retryable() {
        let err = ServiceError::classify("401 Unauthorized");
        assert_eq!(err.kind, ErrorKind::Auth);
        assert!(!err.is_retryable());
    }

    #[test]
    fn classify_server_errors() {
        for msg in ["500 Internal Server Error", "502 Bad Gateway", "503", "504"] {
            assert_eq!(ServiceError::classify(msg).kind, ErrorKind::ServerError);
        }
    }

    #[test]
    fn classify_network_and_config() {
        assert_eq!(
            ServiceError::classify("connection reset by peer").kind,
            ErrorKind::Network
        );
        let cfg = ServiceError::classify("missing api key in config");
        assert_eq!(cfg.kind, ErrorKind::Config);
        assert!(!cfg.is_retryable());
    }

    #[test]
    fn classify_unknown_defaults_to_other() {
        let err = ServiceError::classify("something odd happened");
        assert_eq!(err.kind, ErrorKind::Other);
        assert!(err.is_retryable());
    }

    #[test]
    fn anyhow_conversion_classifies_by_message() {
        let err: ServiceError = anyhow::anyhow!("504 Gateway Timeout").into();
        // "timeout" substring wins over the 504 code, matching the check order
        assert_eq!(err.kind, ErrorKind::Timeout);
    }

    #[test]
    fn gateway_error_retryability() {
        assert!(GatewayError::from(ServiceError::timeout("t")).is_retryable());
        assert!(!GatewayError::from(ServiceError::auth("a")).is_retryable());
        assert!(!GatewayError::validation("bad role").is_retryable());
        assert!(
            !GatewayError::CircuitOpen {
                service: "web-search".into()
            }
            .is_retryable()
        );
    }
}
