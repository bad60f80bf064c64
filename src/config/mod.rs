//! Configuration module for Stepbot.
//!
//! This module wires together the data models (actions, steps, run settings) and
//! the loading/schema helpers used by the CLI.
//!
//! Example:
//! ```no_run
//! use stepbot::config::load_from_path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let cfg = load_from_path("config/default.json")?;
//! println!("{} action(s), {} run(s)", cfg.actions.len(), cfg.runs);
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod models;

// Re-export core data models
pub use models::{Action, Config, Step, StepKind};

// Re-export loader utilities
pub use loader::{
    generate_schema, load_from_path, load_from_path_async, load_from_reader, load_from_str,
    validate_config, write_schema_to_writer,
};
