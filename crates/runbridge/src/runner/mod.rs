//! Code runner for runbridge
//!
//! Provides the pipeline stages a session drives: workspace allocation, the
//! build step, process launch and the duplex pump.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

pub use crate::runner::channel::{ClientChannel, ClientEnd};
pub use crate::runner::compile::{
    CompileResult, DEFAULT_ENTRY, StagedSource, compile, stage_source,
};
pub use crate::runner::pump::{PumpEnd, PumpReport, pump};

mod channel;
mod compile;
mod pump;

use crate::{
    config::{Config, Language, LanguageId, Resolution},
    process::{ManagedProcess, ProcessCommand, ProcessError},
    workspace::{Workspace, WorkspaceError},
};

/// The client side of a channel has gone away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("client channel closed")]
pub struct ChannelClosed;

/// Errors that occur during the build step
///
/// A compiler that runs and reports errors is not a `CompileError`; that is
/// an unsuccessful [`CompileResult`].
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    #[error("workspace has no source path")]
    MissingSourcePath,

    #[error("path is not valid UTF-8: {0:?}")]
    NonUtf8Path(PathBuf),
}

/// High-level runner shared by all sessions
///
/// Cloning is cheap; clones share one configuration.
#[derive(Debug, Clone)]
pub struct Runner {
    config: Arc<Config>,
}

impl Runner {
    /// Create a new runner with the given configuration
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Create a new runner with default configuration
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve a client-supplied language name
    pub fn resolve(&self, name: &str) -> Resolution<'_> {
        self.config.resolve(name)
    }

    /// Allocate a workspace for one execution under the configured scratch directory
    pub async fn allocate(
        &self,
        id: LanguageId,
        language: &Language,
    ) -> Result<Workspace, WorkspaceError> {
        Workspace::allocate(&self.config.scratch_dir(), id, &language.extension).await
    }

    /// Write source into the workspace and build it
    pub async fn build(
        &self,
        workspace: &mut Workspace,
        language: &Language,
        code: &str,
    ) -> Result<CompileResult, CompileError> {
        let staged = stage_source(workspace.language(), code);
        compile::compile(workspace, language, &staged).await
    }

    /// Start a built program
    pub fn launch(&self, command: &ProcessCommand) -> Result<ManagedProcess, ProcessError> {
        ManagedProcess::spawn(command)
    }

    /// Stream between a running program and its client
    pub async fn pump(&self, process: &mut ManagedProcess, channel: &mut ClientChannel) -> PumpReport {
        pump::pump(process, channel, self.config.stream.chunk_size).await
    }

    /// Create a client channel sized by the configured capacity
    pub fn channel(&self) -> (ClientChannel, ClientEnd) {
        ClientChannel::pair(self.config.stream.channel_capacity)
    }
}
