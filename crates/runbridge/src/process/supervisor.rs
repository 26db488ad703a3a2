//! Process spawning and lifecycle
//!
//! Handles launching a child with piped stdin and merged stdout/stderr,
//! and tearing it down again.

use std::io;
use std::os::fd::OwnedFd;
use std::process::{ExitStatus, Stdio};

use tokio::io::AsyncReadExt;
use tokio::net::unix::pipe;
use tokio::process::{Child, ChildStdin};
use tracing::{debug, instrument};

use crate::process::{ProcessCommand, ProcessError};

/// Read end of a process's merged stdout/stderr
pub type OutputReader = pipe::Receiver;

/// A running (or finished) child process
///
/// The exit status is `None` until the process has been observed to exit.
#[derive(Debug)]
pub struct ManagedProcess {
    child: Child,
    pid: Option<u32>,
    stdin: Option<ChildStdin>,
    output: Option<OutputReader>,
    exit_status: Option<ExitStatus>,
}

impl ManagedProcess {
    /// Spawn a new process
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(skip(command), fields(command = %command))]
    pub fn spawn(command: &ProcessCommand) -> Result<Self, ProcessError> {
        let (reader, writer) = io::pipe().map_err(ProcessError::Pipe)?;
        let stderr_writer = writer.try_clone().map_err(ProcessError::Pipe)?;

        let mut cmd = command.to_command();
        cmd.stdin(Stdio::piped())
            .stdout(writer)
            .stderr(stderr_writer)
            .kill_on_drop(true);
        let spawned = cmd.spawn();
        // The builder owns our copies of the write end. They must be closed
        // before reading, or end-of-stream never arrives.
        drop(cmd);

        let mut child = spawned.map_err(|source| ProcessError::Spawn {
            program: command.program().to_owned(),
            source,
        })?;
        let output =
            pipe::Receiver::from_owned_fd(OwnedFd::from(reader)).map_err(ProcessError::Pipe)?;

        let pid = child.id();
        let stdin = child.stdin.take();
        debug!(?pid, "process spawned");

        Ok(Self {
            child,
            pid,
            stdin,
            output: Some(output),
            exit_status: None,
        })
    }

    /// OS process id, if the process had not been reaped when spawned
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Take ownership of stdin
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    /// Take ownership of the merged output stream
    pub fn take_output(&mut self) -> Option<OutputReader> {
        self.output.take()
    }

    /// Exit status without blocking; `None` while the process is still running
    pub fn exit_status(&mut self) -> Result<Option<ExitStatus>, ProcessError> {
        if self.exit_status.is_none() {
            self.exit_status = self.child.try_wait()?;
        }
        Ok(self.exit_status)
    }

    /// Wait for the process to exit
    ///
    /// Closes stdin first so a process blocked on input sees end-of-file.
    pub async fn wait(&mut self) -> Result<ExitStatus, ProcessError> {
        self.stdin = None;
        if let Some(status) = self.exit_status {
            return Ok(status);
        }
        let status = self.child.wait().await?;
        self.exit_status = Some(status);
        Ok(status)
    }

    /// Kill the process if it is still running
    ///
    /// Returns `true` if a kill was delivered, `false` if the process had
    /// already exited. Safe to call any number of times.
    pub async fn kill(&mut self) -> Result<bool, ProcessError> {
        if self.exit_status()?.is_some() {
            return Ok(false);
        }
        self.child.start_kill()?;
        let status = self.child.wait().await?;
        self.exit_status = Some(status);
        debug!(pid = ?self.pid, ?status, "process killed");
        Ok(true)
    }
}

/// Output of a process run to completion
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    /// Merged stdout and stderr, lossily decoded
    pub output: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Run a command with no input and capture all of its output
///
/// Used for compilers: diagnostics are collected as one batch rather than streamed.
#[instrument(skip(command), fields(command = %command))]
pub async fn run_to_completion(command: &ProcessCommand) -> Result<CapturedOutput, ProcessError> {
    let mut process = ManagedProcess::spawn(command)?;
    drop(process.take_stdin());

    let mut output = Vec::new();
    if let Some(mut reader) = process.take_output() {
        reader.read_to_end(&mut output).await?;
    }
    let status = process.wait().await?;

    debug!(?status, len = output.len(), "process completed");

    Ok(CapturedOutput {
        status,
        output: String::from_utf8_lossy(&output).into_owned(),
    })
}
