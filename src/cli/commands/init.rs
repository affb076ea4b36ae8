//! Init Command
//!
//! Create `.escalator/` in the current directory with a starter config,
//! prompt templates and schemas for the built-in task families.

use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::constants::layout;
use crate::types::{Result, TaskFamily};

pub fn run(force: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let project_dir = ConfigLoader::init_project(&root, force)?;

    // Global config is optional; never overwrite it from here
    if let Err(e) = ConfigLoader::init_global(false) {
        tracing::debug!("Global config init skipped: {}", e);
    }

    let output = Output::new();
    output.success(&format!("Initialized escalator in {}/", layout::PROJECT_DIR));
    println!("  Families:  {}", TaskFamily::BUILTIN.join(", "));
    println!("  Templates: {}", project_dir.join("prompts").display());
    println!("  Schemas:   {}", project_dir.join("schemas").display());
    println!();
    println!("Next steps:");
    println!("  1. Point gateway.base_url at your Ollama host (or set OLLAMA_HOST)");
    println!("  2. Run 'escalator curate --input \"...\"'");

    Ok(())
}
