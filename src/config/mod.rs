//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/escalator/config.toml)
//! 3. Project config (.escalator/config.toml)
//! 4. Environment variables (ESCALATOR_*)
//! 5. Explicit `--config` file (highest priority)
//!
//! The loaded [`Config`] is immutable and passed to component constructors;
//! nothing reads configuration through global state.

mod loader;
pub mod scaffold;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
