//! CLI command implementations
//!
//! This module contains implementations of various commands
//! supported by the CLI application using the Command pattern.

pub mod command_traits;
pub mod cli;
pub mod options;
pub mod run_command;
pub mod chip_command;
pub mod info_command;

pub use command_traits::{Command, CommandFactory};
pub use cli::build_cli;
pub use run_command::RunCommand;
pub use chip_command::ChipCommand;
pub use info_command::InfoCommand;

use clap::ArgMatches;
use crate::error::{ChipError, ChipResult};
use crate::utils::logger::Logger;
use options::flag_arg;

/// Factory for creating command instances based on CLI arguments
///
/// This factory examines the subcommand given on the command line and
/// creates the matching command instance for execution.
#[derive(Default)]
pub struct ChipkitCommandFactory;

impl ChipkitCommandFactory {
    /// Create a new factory instance
    pub fn new() -> Self {
        ChipkitCommandFactory
    }
}

impl<'a> CommandFactory<'a> for ChipkitCommandFactory {
    fn create_command(&self, args: &ArgMatches, logger: &'a Logger) -> ChipResult<Box<dyn Command + 'a>> {
        match args.subcommand() {
            Some(("run", sub)) => Ok(Box::new(RunCommand::new(sub, logger)?)),
            Some(("chip", sub)) => Ok(Box::new(ChipCommand::new(sub, logger)?)),
            Some(("info", sub)) => Ok(Box::new(InfoCommand::new(sub, logger)?)),
            Some((other, _)) => Err(ChipError::Config(format!("Unknown command: {}", other))),
            None => Err(ChipError::Config("No command given".to_string())),
        }
    }
}

/// Process exit code for a failed command
///
/// `RunIncomplete` exits 2, any other error 1. `run --exit-zero-on-error`
/// exits 0 for every other error, including a failure to build the command.
pub fn exit_code(args: &ArgMatches, error: &ChipError) -> i32 {
    if matches!(error, ChipError::RunIncomplete { .. }) {
        return 2;
    }
    match args.subcommand() {
        Some(("run", sub)) if flag_arg(sub, "exit-zero-on-error") => 0,
        _ => 1,
    }
}
