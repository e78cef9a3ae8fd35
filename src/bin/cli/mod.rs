//! CLI Module Organization
//!
//! - args: CLI argument structures
//! - commands: command execution
//! - config_layer: merging defaults, configuration files and CLI overrides
//! - output: tables, progress bars and summaries

pub mod args;
pub mod commands;
pub mod config_layer;
pub mod output;

pub use args::*;
pub use commands::*;
