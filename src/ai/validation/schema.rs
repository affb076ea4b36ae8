//! Schema Store
//!
//! Loads `<schema_dir>/<family>.schema.json` on first use and caches the
//! compiled validator. A missing directory, missing file or uncompilable
//! schema is a configuration fault, reported as [`EscalatorError::Schema`]
//! so callers can tell it apart from an output that failed validation.

use dashmap::DashMap;
use jsonschema::Validator as CompiledSchema;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::constants::layout;
use crate::types::{EscalatorError, Result, TaskFamily};

pub struct SchemaStore {
    dir: PathBuf,
    cache: DashMap<String, Arc<CompiledSchema>>,
}

impl SchemaStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: DashMap::new(),
        }
    }

    /// Compiled schema for `family`
    pub fn get(&self, family: &TaskFamily) -> Result<Arc<CompiledSchema>> {
        if let Some(cached) = self.cache.get(family.as_str()) {
            return Ok(Arc::clone(cached.value()));
        }

        let path = self.path_for(family);
        let schema_error = |reason: String| EscalatorError::Schema {
            family: family.to_string(),
            path: path.clone(),
            reason,
        };

        if !self.dir.is_dir() {
            return Err(schema_error("schema directory does not exist".to_string()));
        }
        if !path.is_file() {
            let available = self.available();
            let reason = if available.is_empty() {
                "schema directory is empty".to_string()
            } else {
                format!("schema file not found. Available: {}", available.join(", "))
            };
            return Err(schema_error(reason));
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| schema_error(format!("cannot read schema: {}", e)))?;
        let document: Value = serde_json::from_str(&content)
            .map_err(|e| schema_error(format!("schema is not valid JSON: {}", e)))?;
        let compiled = jsonschema::validator_for(&document)
            .map_err(|e| schema_error(format!("schema does not compile: {}", e)))?;

        debug!(family = %family, path = %path.display(), "Loaded output schema");

        let compiled = Arc::new(compiled);
        self.cache
            .insert(family.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Families with a schema file on disk, sorted
    pub fn available(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut families: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_suffix(layout::SCHEMA_SUFFIX))
                    .map(str::to_string)
            })
            .collect();
        families.sort();
        families
    }

    fn path_for(&self, family: &TaskFamily) -> PathBuf {
        self.dir
            .join(format!("{}{}", family, layout::SCHEMA_SUFFIX))
    }
}
