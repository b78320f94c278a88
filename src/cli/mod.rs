//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{BricksCommand, RunCommand, StateCommand, ValidateCommand};
use std::ffi::OsString;

/// Interpreter for declarative brick pipelines
#[derive(Debug, Parser, Clone)]
#[command(name = "brick")]
#[command(version = "0.1.0")]
#[command(about = "Run declarative brick pipelines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline document
    Run(RunCommand),

    /// Validate a pipeline document without running it
    Validate(ValidateCommand),

    /// List the built-in bricks
    Bricks(BricksCommand),

    /// Show persisted mod state
    State(StateCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
