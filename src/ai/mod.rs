//! Model Integration Layer
//!
//! Backend abstraction, the retrying inference gateway, prompt construction
//! and output validation.

pub mod gateway;
pub mod prompt;
pub mod provider;
pub mod timeout;
pub mod validation;

pub use gateway::{Generation, InferenceGateway, RetryPolicy};
pub use prompt::{TemplateLibrary, prompt_variants, repair_prompt};
pub use provider::{BackendReply, InferenceBackend, OllamaBackend, SharedBackend, create_backend};
pub use timeout::with_timeout;
pub use validation::{SchemaStore, Signal, ValidationResult, Validator};
