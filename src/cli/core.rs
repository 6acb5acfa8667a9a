//! Loop control and error types shared by the shell and its commands.

use std::io;

use nightswap_config::ConfigError;
use nightswap_core::CoreError;
use rustyline::error::ReadlineError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopControl {
    Continue,
    Exit,
}

pub type CommandResult = Result<(), CommandError>;

/// Failure of a single command. Reported to the user; the shell keeps running.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("No lease selected. Use `lease` or `use` first.")]
    LeaseNotSelected,
    #[error("No occupant selected. Use `as <name>` first.")]
    ActorNotSelected,
    #[error("{0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("exit requested")]
    ExitRequested,
}

/// Failure that stops the shell.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Line editor error: {0}")]
    Readline(#[from] ReadlineError),
    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}
