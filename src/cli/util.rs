//! CLI Common Utilities
//!
//! Shared initialization for command handlers.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ai::provider::create_backend;
use crate::config::{Config, ConfigLoader};
use crate::curator::Escalator;
use crate::storage::FsRunLog;
use crate::types::{EscalatorError, Result};

/// Command execution context
///
/// Holds the effective configuration for one invocation. Commands build the
/// heavier collaborators (backend, escalator) from it on demand.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: Config,
    pub project_root: PathBuf,
}

impl CommandContext {
    /// Load configuration through the full resolution chain
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = ConfigLoader::load(explicit)?;
        let project_root = std::env::current_dir()?;
        Ok(Self {
            config,
            project_root,
        })
    }

    /// Build the escalator against the configured backend. The run log is
    /// attached unless `record` is false.
    pub fn escalator(&self, record: bool) -> Result<Escalator> {
        let backend = create_backend(&self.config.gateway)?;
        let escalator = Escalator::new(&self.config, backend)?;
        if !record {
            return Ok(escalator);
        }
        let sink = FsRunLog::new(self.config.paths.run_dir.clone());
        Ok(escalator.with_sink(Arc::new(sink)))
    }
}

/// Resolve `@path` arguments to file contents; anything else is taken literally
pub fn read_input(arg: &str) -> Result<String> {
    match arg.strip_prefix('@') {
        Some(path) if !path.is_empty() => fs::read_to_string(path).map_err(|e| {
            EscalatorError::Config(format!("Cannot read input file '{}': {}", path, e))
        }),
        _ => Ok(arg.to_string()),
    }
}
