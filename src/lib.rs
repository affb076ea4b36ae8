//! Escalator - schema-validated model routing with escalation
//!
//! Routes a natural-language request to a task family, generates candidate
//! answers on the weakest suitable local model, validates them against the
//! family's JSON schema, repairs what it can, and climbs a ladder of stronger
//! models until an answer validates or the ladder runs out.
//!
//! ## Quick Start
//!
//! ```ignore
//! use escalator::{ConfigLoader, CurateRequest, Escalator, create_backend};
//!
//! let config = ConfigLoader::load(None)?;
//! let backend = create_backend(&config.gateway)?;
//! let escalator = Escalator::new(&config, backend)?;
//! let outcome = escalator
//!     .curate(CurateRequest::new("NullPointerException in the login handler"))
//!     .await?;
//! println!("{} via {}", outcome.output_text, outcome.backend_used);
//! ```
//!
//! ## Modules
//!
//! - [`router`]: task classification, decoding resolution, model ladder
//! - [`ai`]: inference gateway, backends, prompts, validation
//! - [`curator`]: candidate ranking, repair and the escalation loop
//! - [`storage`]: run records
//! - [`eval`]: offline golden-set evaluation

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod curator;
pub mod eval;
pub mod router;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use config::{Config, ConfigLoader};
pub use types::{ErrorCategory, EscalatorError, LlmError, Result, TaskFamily};

pub use ai::{
    InferenceBackend, InferenceGateway, OllamaBackend, RetryPolicy, SharedBackend, Signal,
    ValidationResult, Validator, create_backend, with_timeout,
};
pub use curator::{CurateRequest, EscalationOutcome, EscalationState, Escalator};
pub use router::{Classifier, DecodingOptions, Router};
pub use storage::{FsRunLog, RunRecord, RunSink};
