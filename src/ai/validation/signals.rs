//! Quality signals attached to validation results

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static UNCERTAINTY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"\b(not sure|uncertain|unsure|might be|maybe)\b")
        .case_insensitive(true)
        .build()
        .expect("uncertainty pattern is a valid regex")
});

static REFUSAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"\b(i can't|i cannot|cannot comply|refuse)\b")
        .case_insensitive(true)
        .build()
        .expect("refusal pattern is a valid regex")
});

/// A named quality flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Output could not be parsed as JSON
    InvalidJson,
    /// Hedging language; informational
    UncertaintyMarkers,
    /// Refusal language; informational unless configured to escalate
    RefusalDetected,
    /// Parsed output violates the family's schema
    SchemaFail,
}

impl Signal {
    pub const ALL: [Signal; 4] = [
        Signal::InvalidJson,
        Signal::UncertaintyMarkers,
        Signal::RefusalDetected,
        Signal::SchemaFail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::InvalidJson => "invalid_json",
            Signal::UncertaintyMarkers => "uncertainty_markers",
            Signal::RefusalDetected => "refusal_detected",
            Signal::SchemaFail => "schema_fail",
        }
    }

    /// Structural signals always accompany `ok == false`
    pub fn is_structural(&self) -> bool {
        matches!(self, Signal::InvalidJson | Signal::SchemaFail)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Informational signals found in serialized output, in detection order
pub fn detect_language_signals(text: &str) -> Vec<Signal> {
    let mut signals = Vec::new();
    if UNCERTAINTY_PATTERN.is_match(text) {
        signals.push(Signal::UncertaintyMarkers);
    }
    if REFUSAL_PATTERN.is_match(text) {
        signals.push(Signal::RefusalDetected);
    }
    signals
}
