//! Per-call deadline for backend requests
//!
//! ## Usage
//!
//! ```ignore
//! let reply = with_timeout(
//!     Duration::from_secs(120),
//!     backend.generate(model, prompt, &options),
//!     "generate",
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::types::LlmError;

/// Execute a backend call with a deadline.
///
/// An expired deadline drops the inner future and yields a
/// [`Timeout`](crate::types::ErrorCategory::Timeout) error.
pub async fn with_timeout<T, F>(
    timeout: Duration,
    future: F,
    operation_name: &str,
) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::timeout(operation_name, timeout)),
    }
}
