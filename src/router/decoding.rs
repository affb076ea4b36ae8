//! Decoding Resolver
//!
//! Resolution order for one task family:
//! 1. `decoding.defaults`
//! 2. the profile named by `decoding.per_task.<family>.profile`
//! 3. scalar overrides on `decoding.per_task.<family>`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::{DecodingConfig, TaskDecoding};
use crate::types::{EscalatorError, Result, TaskFamily};

/// Generation parameters handed unchanged to every candidate of a step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodingOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,

    /// Backend-specific keys passed through as-is (e.g. `num_ctx`)
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DecodingOptions {
    /// Layer `other` on top of `self`; set values in `other` win
    pub fn overlay(&mut self, other: &DecodingOptions) {
        if other.temperature.is_some() {
            self.temperature = other.temperature;
        }
        if other.top_p.is_some() {
            self.top_p = other.top_p;
        }
        if other.max_new_tokens.is_some() {
            self.max_new_tokens = other.max_new_tokens;
        }
        for (key, value) in &other.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    fn overlay_task(&mut self, task: &TaskDecoding) {
        self.overlay(&DecodingOptions {
            temperature: task.temperature,
            top_p: task.top_p,
            max_new_tokens: task.max_new_tokens,
            extra: BTreeMap::new(),
        });
    }
}

/// Resolve the decoding options for `family`.
///
/// Unknown families and missing profiles are configuration errors that list
/// the available keys.
pub fn resolve(family: &TaskFamily, config: &DecodingConfig) -> Result<DecodingOptions> {
    let task = config.per_task.get(family.as_str()).ok_or_else(|| {
        EscalatorError::unknown_key("task family", family.as_str(), config.per_task.keys())
    })?;

    let profile_name = task.profile.as_deref().ok_or_else(|| {
        let mut known: Vec<&str> = config
            .per_task
            .iter()
            .filter(|(_, t)| t.profile.is_some())
            .map(|(name, _)| name.as_str())
            .collect();
        known.sort_unstable();
        EscalatorError::Config(format!(
            "decoding.per_task.{} names no profile. Known families: {}",
            family,
            if known.is_empty() {
                "<none>".to_string()
            } else {
                known.join(", ")
            }
        ))
    })?;

    let profile = config.profiles.get(profile_name).ok_or_else(|| {
        EscalatorError::unknown_key("decoding profile", profile_name, config.profiles.keys())
    })?;

    let mut options = config.defaults.clone();
    options.overlay(profile);
    options.overlay_task(task);
    Ok(options)
}
