//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Inference gateway retry constants
pub mod retry {
    /// Additional attempts after the first call
    pub const DEFAULT_RETRIES: u32 = 2;

    /// Base delay for exponential backoff (seconds)
    pub const BASE_DELAY_SECS: f64 = 0.25;

    /// Maximum delay between retries before jitter (seconds)
    pub const MAX_DELAY_SECS: f64 = 2.0;

    /// Upper bound of the random jitter, as a fraction of the delay
    pub const JITTER_FRACTION: f64 = 0.2;

    /// Largest configurable backoff delay (seconds)
    pub const MAX_CONFIGURED_DELAY_SECS: f64 = 3600.0;
}

/// HTTP/Network constants
pub mod network {
    /// Default Ollama endpoint
    pub const DEFAULT_OLLAMA_BASE: &str = "http://localhost:11434";

    /// Environment variable that overrides the Ollama endpoint
    pub const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";

    /// Per-call timeout applied by the gateway (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Response header carrying the backend's request id
    pub const REQUEST_ID_HEADER: &str = "X-Request-ID";
}

/// Candidate ranking constants
pub mod ranking {
    /// Default number of prompt variants per escalation step
    pub const DEFAULT_CANDIDATES: usize = 2;

    /// Hard cap on prompt variants per step
    pub const MAX_CANDIDATES: usize = 4;
}

/// Escalation loop constants
pub mod escalation {
    /// Warning attached to an exhausted outcome
    pub const REVIEW_WARNING: &str = "low confidence; review";
}

/// Run scoring constants
pub mod scoring {
    /// Score of an invalid candidate with no signals
    pub const INVALID_BASE_SCORE: f64 = 0.6;

    /// Penalty per signal on an invalid candidate
    pub const SIGNAL_PENALTY: f64 = 0.1;
}

/// Project layout constants
pub mod layout {
    /// Project data directory
    pub const PROJECT_DIR: &str = ".escalator";

    /// Environment variable prefix for config overrides
    pub const ENV_PREFIX: &str = "ESCALATOR_";

    /// Prompt template file extension
    pub const TEMPLATE_EXT: &str = "yml";

    /// Schema file suffix
    pub const SCHEMA_SUFFIX: &str = ".schema.json";

    /// Template version suffix appended to the family name
    pub const TEMPLATE_VERSION: &str = "v1";
}
