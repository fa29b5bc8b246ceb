//! CLI module for the Cirrus provider tool.
//!
//! This module provides the command-line interface for managing Cirrus
//! resources declaratively.

mod commands;
mod output;

pub use commands::{Cli, Commands, ImportKind, OutputFormat};
pub use output::OutputFormatter;
