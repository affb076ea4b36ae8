//! Config Command
//!
//! Inspect and initialize escalator configuration.
//!
//! Usage:
//!   escalator config show [-g] [-f json|yaml]
//!   escalator config path
//!   escalator config init [-g] [--force]

use std::fs;
use std::path::Path;

use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the effective configuration, or the raw global file with `global`
pub fn show(explicit: Option<&Path>, global: bool, format: &str) -> Result<()> {
    if !global {
        let config = ConfigLoader::load(explicit)?;
        println!("{}", ConfigLoader::render(&config, format)?);
        return Ok(());
    }

    match ConfigLoader::global_config_path() {
        Some(path) if path.exists() => {
            println!("# Global Config: {}\n", path.display());
            println!("{}", fs::read_to_string(&path)?);
        }
        Some(_) => {
            println!("No global config found.");
            println!("Run 'escalator config init --global' to create one.");
        }
        None => println!("Cannot determine global config directory."),
    }
    Ok(())
}

pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

pub fn init_global(force: bool) -> Result<()> {
    let dir = ConfigLoader::init_global(force)?;
    let output = Output::new();
    output.success("Initialized global configuration");
    println!("  Directory: {}", dir.display());
    if let Some(config_path) = ConfigLoader::global_config_path() {
        println!("  Config:    {}", config_path.display());
    }
    Ok(())
}

pub fn init_project(force: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let dir = ConfigLoader::init_project(&root, force)?;
    let output = Output::new();
    output.success("Initialized project configuration");
    println!("  Directory: {}", dir.display());
    println!("  Config:    {}", dir.join("config.toml").display());
    Ok(())
}
