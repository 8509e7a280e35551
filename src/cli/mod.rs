//! Command-line interface for agentforge.
//!
//! Provides commands to run the refinement pipeline, resume a stored
//! session and inspect session artifacts.

mod commands;
pub mod parse;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands, LogFormat};
pub use parse::{parse_command, CommandParseError, ParsedCommand};
