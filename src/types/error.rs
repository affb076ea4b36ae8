//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//!
//! ## Taxonomy
//!
//! - **Configuration**: unknown task family, missing profile, missing schema or
//!   template. Never retried; fatal to the current request.
//! - **Transport**: a backend call failed after the gateway's retries. Not
//!   retried by the escalation loop; aborts the request.
//! - Validation failures are *not* errors. They travel as
//!   [`ValidationResult`](crate::ai::validation::ValidationResult) values and
//!   drive repair, ranking and escalation.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Transport Error Categories
// =============================================================================

/// Closed set of transport failure kinds.
///
/// The gateway retries only the categories its policy names; everything else
/// propagates on the first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Connection refused, DNS failure, reset mid-request
    Network,
    /// No response within the per-call deadline
    Timeout,
    /// Backend asked us to slow down (HTTP 429)
    RateLimit,
    /// Server-side 5xx that may clear on its own
    Transient,
    /// Model or endpoint missing (HTTP 404)
    Unavailable,
    /// Request rejected as malformed (HTTP 400)
    BadRequest,
    /// Credentials rejected (HTTP 401/403)
    Auth,
    /// Backend answered but the body could not be decoded
    ParseError,
    /// Anything else
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "NETWORK"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::Auth => write!(f, "AUTH"),
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// A single failed backend call with its category
#[derive(Debug, Clone)]
pub struct LlmError {
    /// Error category for retry decisions
    pub category: ErrorCategory,
    /// Detailed error message
    pub message: String,
    /// Backend that produced the error
    pub backend: Option<String>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(backend) = &self.backend {
            write!(f, "[{}:{}] {}", backend, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            backend: None,
        }
    }

    pub fn with_backend(
        category: ErrorCategory,
        message: impl Into<String>,
        backend: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            backend: Some(backend.into()),
        }
    }

    /// Attach backend context to an existing error
    pub fn backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    pub fn timeout(operation: &str, after: Duration) -> Self {
        Self::new(
            ErrorCategory::Timeout,
            format!("{} timed out after {:?}", operation, after),
        )
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps transport-level failures onto [`ErrorCategory`]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an HTTP status returned by a backend
    pub fn classify_http_status(status: u16, message: &str, backend: &str) -> LlmError {
        let category = match status {
            429 => ErrorCategory::RateLimit,
            401 | 403 => ErrorCategory::Auth,
            400 => ErrorCategory::BadRequest,
            404 => ErrorCategory::Unavailable,
            500..=599 => ErrorCategory::Transient,
            _ => ErrorCategory::Unknown,
        };
        LlmError::with_backend(category, message, backend)
    }

    /// Classify a `reqwest` failure by what went wrong, not by its message text
    pub fn classify_reqwest(err: &reqwest::Error, backend: &str) -> LlmError {
        let category = if err.is_timeout() {
            ErrorCategory::Timeout
        } else if err.is_connect() || err.is_request() {
            ErrorCategory::Network
        } else if err.is_decode() || err.is_body() {
            ErrorCategory::ParseError
        } else if let Some(status) = err.status() {
            return Self::classify_http_status(status.as_u16(), &err.to_string(), backend);
        } else {
            ErrorCategory::Unknown
        };
        LlmError::with_backend(category, err.to_string(), backend)
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum EscalatorError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    /// A lookup key is absent from its table
    #[error("Config error: unknown {kind} '{key}'. Known: {}", list_known(.known))]
    UnknownKey {
        kind: String,
        key: String,
        known: Vec<String>,
    },

    #[error("Config error: {0}")]
    Config(String),

    /// Schema missing or unusable for a task family
    #[error("Schema error for task family '{family}' ({}): {reason}", .path.display())]
    Schema {
        family: String,
        path: PathBuf,
        reason: String,
    },

    // -------------------------------------------------------------------------
    // Runtime Errors
    // -------------------------------------------------------------------------
    /// Backend call failed after the gateway gave up
    #[error("Transport error: {0}")]
    Transport(LlmError),

    #[error("Request cancelled")]
    Cancelled,
}

fn list_known(known: &[String]) -> String {
    if known.is_empty() {
        "<none>".to_string()
    } else {
        known.join(", ")
    }
}

impl From<LlmError> for EscalatorError {
    fn from(err: LlmError) -> Self {
        EscalatorError::Transport(err)
    }
}

pub type Result<T> = std::result::Result<T, EscalatorError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl EscalatorError {
    /// Build an unknown-key error; `known` is sorted for stable messages
    pub fn unknown_key<I, S>(kind: impl Into<String>, key: impl Into<String>, known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut known: Vec<String> = known.into_iter().map(Into::into).collect();
        known.sort();
        Self::UnknownKey {
            kind: kind.into(),
            key: key.into(),
            known,
        }
    }

    /// Configuration faults: never retried, fatal to the request
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownKey { .. } | Self::Config(_) | Self::Schema { .. }
        )
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::RateLimit.to_string(), "RATE_LIMIT");
        assert_eq!(ErrorCategory::Timeout.to_string(), "TIMEOUT");
        assert_eq!(ErrorCategory::Auth.to_string(), "AUTH");
    }

    #[test]
    fn test_error_category_serde_names() {
        let parsed: Vec<ErrorCategory> =
            serde_json::from_str(r#"["network", "timeout", "rate_limit"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                ErrorCategory::Network,
                ErrorCategory::Timeout,
                ErrorCategory::RateLimit
            ]
        );
        assert!(serde_json::from_str::<ErrorCategory>(r#""flaky""#).is_err());
    }

    #[test]
    fn test_classify_http_status() {
        let rate_limit = ErrorClassifier::classify_http_status(429, "Rate limited", "ollama");
        assert_eq!(rate_limit.category, ErrorCategory::RateLimit);

        let auth = ErrorClassifier::classify_http_status(401, "Unauthorized", "ollama");
        assert_eq!(auth.category, ErrorCategory::Auth);

        let server_error = ErrorClassifier::classify_http_status(503, "Busy", "ollama");
        assert_eq!(server_error.category, ErrorCategory::Transient);

        let missing = ErrorClassifier::classify_http_status(404, "model not found", "ollama");
        assert_eq!(missing.category, ErrorCategory::Unavailable);
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::with_backend(ErrorCategory::Network, "connection refused", "ollama");
        assert_eq!(err.to_string(), "[ollama:NETWORK] connection refused");

        let bare = LlmError::new(ErrorCategory::Unknown, "boom");
        assert_eq!(bare.to_string(), "[UNKNOWN] boom");
    }

    #[test]
    fn test_unknown_key_lists_alternatives() {
        let err = EscalatorError::unknown_key("task family", "summarize", ["extraction", "creative"]);
        let msg = err.to_string();
        assert!(msg.contains("'summarize'"));
        assert!(msg.contains("creative, extraction"));
        assert!(err.is_configuration());
        assert!(!err.is_transport());
    }

    #[test]
    fn test_unknown_key_with_empty_table() {
        let err = EscalatorError::unknown_key("profile", "fast", Vec::<String>::new());
        assert!(err.to_string().ends_with("Known: <none>"));
    }

    #[test]
    fn test_transport_from_llm_error() {
        let err: EscalatorError = LlmError::new(ErrorCategory::Timeout, "slow").into();
        assert!(err.is_transport());
        assert!(!err.is_configuration());
    }
}
