//! Child process supervision
//!
//! This module launches toolchains and submitted programs as child processes,
//! with stdin piped and stdout/stderr merged onto a single pipe so output
//! arrives in the order the child wrote it.
//!
//! Processes run with the privileges of the server. Nothing here confines
//! them; isolation has to be provided around the whole service.

use thiserror::Error;

pub use crate::process::command::ProcessCommand;
pub use crate::process::supervisor::{CapturedOutput, ManagedProcess, OutputReader, run_to_completion};

mod command;
mod supervisor;

/// Errors that occur while launching or supervising a child process
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("empty command")]
    EmptyCommand,

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to set up process pipes: {0}")]
    Pipe(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
