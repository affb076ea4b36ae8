//! Task Classifier
//!
//! Maps free text to a [`TaskFamily`] with an ordered list of pattern rules.
//! Rules are tried in priority order (bug/error signals first, then code
//! authoring, design, extraction, creative) and the first match wins. Text
//! matching no rule gets the configured default family.

use regex::{Regex, RegexBuilder};

use crate::config::RoutingConfig;
use crate::types::{EscalatorError, Result, TaskFamily};

/// One compiled rule
#[derive(Debug, Clone)]
struct ClassifierRule {
    family: TaskFamily,
    pattern: Regex,
}

/// Deterministic, stateless text classifier
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<ClassifierRule>,
    default_family: TaskFamily,
}

impl Classifier {
    /// Compile the routing rules. Invalid patterns are configuration errors.
    pub fn from_config(routing: &RoutingConfig) -> Result<Self> {
        let mut rules = Vec::with_capacity(routing.rules.len());

        for rule in &routing.rules {
            if rule.patterns.is_empty() {
                continue;
            }
            let alternation = rule
                .patterns
                .iter()
                .map(|p| format!("(?:{})", p))
                .collect::<Vec<_>>()
                .join("|");

            let pattern = RegexBuilder::new(&alternation)
                .case_insensitive(true)
                .multi_line(true)
                .build()
                .map_err(|e| {
                    EscalatorError::Config(format!(
                        "Invalid classifier pattern for family '{}': {}",
                        rule.family, e
                    ))
                })?;

            rules.push(ClassifierRule {
                family: rule.family.clone(),
                pattern,
            });
        }

        Ok(Self {
            rules,
            default_family: routing.default_family.clone(),
        })
    }

    /// Classify `text`; always returns a family
    pub fn classify(&self, text: &str) -> TaskFamily {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(text))
            .map(|rule| rule.family.clone())
            .unwrap_or_else(|| self.default_family.clone())
    }

    /// An explicit hint bypasses classification
    pub fn classify_with_hint(&self, text: &str, hint: Option<&str>) -> TaskFamily {
        match hint {
            Some(family) if !family.trim().is_empty() => TaskFamily::new(family.trim()),
            _ => self.classify(text),
        }
    }
}
