//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/escalator/config.toml)
//! 3. Project config (.escalator/config.toml)
//! 4. `OLLAMA_HOST`, when set, for the gateway endpoint
//! 5. Environment variables (ESCALATOR_* prefix, `__` between nesting levels)
//! 6. Explicit config file passed on the command line

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::scaffold;
use super::types::Config;
use crate::constants::{layout, network};
use crate::types::{EscalatorError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with the full resolution chain:
    /// defaults → global → project → env vars → explicit file
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        if let Ok(host) = env::var(network::OLLAMA_HOST_ENV)
            && !host.trim().is_empty()
        {
            figment = figment.merge(Serialized::default(
                "gateway.base_url",
                normalize_host(host.trim()),
            ));
        }

        // e.g. ESCALATOR_GATEWAY__RETRIES -> gateway.retries
        figment = figment.merge(
            Env::prefixed(layout::ENV_PREFIX)
                .split("__")
                .lowercase(true),
        );

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(EscalatorError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            debug!("Loading explicit config from: {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        Self::extract(figment)
    }

    /// Load configuration from defaults plus a single file
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Config> {
        let config: Config = figment
            .extract()
            .map_err(|e| EscalatorError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/escalator/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("escalator"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(layout::PROJECT_DIR)
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Render the effective configuration as text (TOML), JSON or YAML
    pub fn render(config: &Config, format: &str) -> Result<String> {
        match format {
            "json" => Ok(serde_json::to_string_pretty(config)?),
            "yaml" => Ok(serde_yaml::to_string(config)?),
            _ => toml::to_string_pretty(config).map_err(|e| EscalatorError::Config(e.to_string())),
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            EscalatorError::Config("Cannot determine global config directory".to_string())
        })?;

        fs::create_dir_all(&global_dir)?;

        let config_path = global_dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_global_config())?;
            info!("Created global config: {}", config_path.display());
        } else {
            info!("Global config exists: {}", config_path.display());
        }

        Ok(global_dir)
    }

    /// Initialize project layout: config, prompt templates, schemas, run log
    pub fn init_project(root: &Path, force: bool) -> Result<PathBuf> {
        let project_dir = root.join(layout::PROJECT_DIR);

        if project_dir.exists() && !force {
            return Err(EscalatorError::Config(format!(
                "Already initialized at {}. Use --force to overwrite.",
                project_dir.display()
            )));
        }

        fs::create_dir_all(project_dir.join("runs"))?;
        fs::create_dir_all(project_dir.join("golden"))?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_project_config())?;
            info!("Created project config: {}", config_path.display());
        }

        let written = scaffold::write_defaults(&project_dir, force)?;
        debug!(files = written.len(), "Wrote prompt templates and schemas");

        Ok(project_dir)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn default_global_config() -> String {
        r#"# Escalator Global Configuration
# User-wide defaults. Project settings in .escalator/config.toml override these.

version = "1.0"

[gateway]
base_url = "http://localhost:11434"
timeout_secs = 120
retries = 2
backoff_secs = 0.25
backoff_cap_secs = 2.0
retry_on = ["network", "timeout"]
"#
        .to_string()
    }

    fn default_project_config() -> String {
        r#"# Escalator Project Configuration
# Project-specific settings that override global defaults.

version = "1.0"

[routing]
default_family = "analytical"
escalate_on = ["refusal_detected"]

[routing.task_map.code_assist]
initial = "small"
chain = ["small", "medium", "large"]

[ranking]
candidates = 2
parallel = false

[paths]
schema_dir = ".escalator/schemas"
prompt_dir = ".escalator/prompts"
run_dir = ".escalator/runs"
golden_file = ".escalator/golden/tasks.jsonl"
"#
        .to_string()
    }
}

/// `OLLAMA_HOST` is often given without a scheme (`0.0.0.0:11434`)
fn normalize_host(host: &str) -> String {
    let with_scheme = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    };
    with_scheme.trim_end_matches('/').to_string()
}
