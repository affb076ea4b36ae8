//! Console rendering for command results. Everything goes to stdout so that
//! `--format text` output can be piped like the JSON form.

use console::{StyledObject, style};
use std::fmt::Display;

use crate::ai::validation::{Signal, ValidationResult};
use crate::curator::EscalationState;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    /// Aligned `key: value` line
    pub fn field(&self, key: &str, value: impl Display) {
        println!("  {:<10} {}", style(format!("{}:", key)).dim(), value);
    }

    /// Terminal state, green when accepted and yellow when it needs review
    pub fn state(&self, state: EscalationState, position: usize) {
        let label = match state {
            EscalationState::Accepted => style(state.to_string()).green(),
            EscalationState::Exhausted => style(state.to_string()).yellow().bold(),
            EscalationState::Pending(_) => style(state.to_string()).dim(),
        };
        self.field("state", format!("{} at rung {}", label, position));
    }

    /// Validity plus any quality signals and the first schema violation
    pub fn validation(&self, validation: &ValidationResult) {
        let verdict = if validation.ok {
            style("valid").green()
        } else {
            style("invalid").red()
        };
        if validation.signals.is_empty() {
            self.field("valid", verdict);
        } else {
            self.field("valid", format!("{} [{}]", verdict, signal_list(&validation.signals)));
        }
        if let Some(detail) = &validation.error_detail {
            self.field("detail", style(detail).dim());
        }
    }
}

fn signal_list(signals: &[Signal]) -> String {
    signals
        .iter()
        .map(|s| signal_style(*s).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Structural signals fail validation; the others only lower confidence
fn signal_style(signal: Signal) -> StyledObject<&'static str> {
    if signal.is_structural() {
        style(signal.as_str()).red()
    } else {
        style(signal.as_str()).yellow()
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
