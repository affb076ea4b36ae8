//! Output Validation
//!
//! Checks model output for one task family:
//! 1. strip code fences, parse as JSON (`invalid_json` on failure, stop)
//! 2. hedging language in the serialized form (`uncertainty_markers`)
//! 3. refusal language (`refusal_detected`)
//! 4. schema check (`schema_fail` with the violation message)
//!
//! Steps 2 and 3 never fail validation on their own. A validation failure is
//! a value, not an error; only configuration faults (missing schema) are
//! returned as `Err`.

mod schema;
mod signals;

pub use schema::SchemaStore;
pub use signals::{Signal, detect_language_signals};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use crate::types::{Result, TaskFamily};

/// Outcome of validating one output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ok: bool,
    /// Quality flags in detection order, without duplicates
    pub signals: Vec<Signal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl ValidationResult {
    pub fn valid(signals: Vec<Signal>) -> Self {
        Self {
            ok: true,
            signals,
            error_detail: None,
        }
    }

    pub fn invalid(signals: Vec<Signal>, detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            signals,
            error_detail: Some(detail.into()),
        }
    }

    pub fn has_signal(&self, signal: Signal) -> bool {
        self.signals.contains(&signal)
    }
}

/// Validator bound to a schema directory
pub struct Validator {
    schemas: SchemaStore,
}

impl Validator {
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            schemas: SchemaStore::new(schema_dir),
        }
    }

    /// Fail early when `family` has no usable schema
    pub fn preflight(&self, family: &TaskFamily) -> Result<()> {
        self.schemas.get(family).map(|_| ())
    }

    pub fn validate(&self, family: &TaskFamily, raw: &str) -> Result<ValidationResult> {
        let data: Value = match serde_json::from_str(&strip_code_fences(raw)) {
            Ok(data) => data,
            Err(e) => {
                return Ok(ValidationResult::invalid(
                    vec![Signal::InvalidJson],
                    format!("json parse error: {}", e),
                ));
            }
        };

        let serialized = serde_json::to_string(&data)?;
        let mut signals = detect_language_signals(&serialized);

        let schema = self.schemas.get(family)?;
        if let Some(violation) = schema.iter_errors(&data).next() {
            signals.push(Signal::SchemaFail);
            return Ok(ValidationResult::invalid(
                signals,
                format!("schema: {}", violation),
            ));
        }

        Ok(ValidationResult::valid(signals))
    }
}

/// Remove a leading ```` ```lang ```` line and a trailing fence
pub fn strip_code_fences(raw: &str) -> String {
    let mut result = raw.trim();

    if result.starts_with("```") {
        result = match result.find('\n') {
            Some(first_newline) => &result[first_newline + 1..],
            None => result.trim_start_matches('`'),
        };
    }

    if result.ends_with("```") {
        result = result[..result.len() - 3].trim_end();
    }

    result.trim().to_string()
}
