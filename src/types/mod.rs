pub mod error;

pub use error::{ErrorCategory, ErrorClassifier, EscalatorError, LlmError, Result};

// =============================================================================
// Domain Newtypes
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of request that selects schema, decoding profile and backend chain.
///
/// The set of families is open: configuration defines which ones exist.
/// Determined once per request and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskFamily(String);

impl TaskFamily {
    pub const BUG_TRIAGE: &'static str = "bug_triage";
    pub const CODE_ASSIST: &'static str = "code_assist";
    pub const DESIGN_RFC: &'static str = "design_rfc";
    pub const EXTRACTION: &'static str = "extraction";
    pub const CREATIVE: &'static str = "creative";
    pub const ANALYTICAL: &'static str = "analytical";

    /// Families shipped with the default configuration, in classifier priority order
    pub const BUILTIN: [&'static str; 6] = [
        Self::BUG_TRIAGE,
        Self::CODE_ASSIST,
        Self::DESIGN_RFC,
        Self::EXTRACTION,
        Self::CREATIVE,
        Self::ANALYTICAL,
    ];

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TaskFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskFamily {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskFamily {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for TaskFamily {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for TaskFamily {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TaskFamily {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
