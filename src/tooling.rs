//! Tooling & Integration Layer
//!
//! Command-line front end over the fan-out engine.

pub mod cli;

pub use cli::{Cli, CliContext, Commands, ConfigCommands, OutputFormat, TargetArgs};
