use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::{ModelConfig, ModelsConfig};
use crate::types::{EscalatorError, Result};

/// A registered model, resolved from a key or alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    /// Registry key (never an alias)
    pub key: String,
    /// Name sent to the inference backend
    pub backend_name: String,
    pub context_max: u32,
    pub family: String,
}

/// Model table with one level of aliasing
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: BTreeMap<String, ModelConfig>,
    aliases: BTreeMap<String, String>,
}

impl ModelRegistry {
    pub fn new(config: &ModelsConfig) -> Self {
        Self {
            models: config.models.clone(),
            aliases: config.aliases.clone(),
        }
    }

    /// Resolve a key or alias. Aliases are followed a single hop.
    pub fn resolve(&self, name: &str) -> Result<ModelInfo> {
        let key = self
            .aliases
            .get(name)
            .map(String::as_str)
            .unwrap_or(name);

        let model = self
            .models
            .get(key)
            .ok_or_else(|| EscalatorError::unknown_key("model", name, self.models.keys()))?;

        Ok(ModelInfo {
            key: key.to_string(),
            backend_name: model.backend_name.clone(),
            context_max: model.context_max,
            family: model.family.clone(),
        })
    }
}
