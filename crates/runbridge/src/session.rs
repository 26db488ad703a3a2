//! Session controller
//!
//! A session owns one client connection from its first message to the end of
//! the program it asked for. It is the only writer to the client channel.
//!
//! ```text
//! AwaitingRequest -> Building (compiled languages) -> Running -> Draining -> Closed
//! ```
//!
//! Any state may jump to `Closed`: an invalid or unknown request, a failed
//! build, or a program that cannot be started. Once a workspace has been
//! allocated it is released on every path to `Closed`.

use thiserror::Error;
use tracing::{Span, debug, field, info, instrument, warn};
use uuid::Uuid;

use crate::config::{Language, Resolution};
use crate::process::ProcessError;
use crate::runner::{ClientChannel, CompileError, PumpReport, Runner};
use crate::types::SessionRequest;
use crate::workspace::{Workspace, WorkspaceError};

/// Notice sent for languages that the client renders itself
pub const RENDERED_LOCALLY: &str = "HTML is rendered locally.";

/// Errors that end a session abnormally
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("build error: {0}")]
    Compile(#[from] CompileError),

    #[error("failed to start program: {0}")]
    Launch(#[source] ProcessError),

    #[error("process error: {0}")]
    Process(#[from] ProcessError),
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The client left before sending a request
    Disconnected,
    /// The open message was malformed
    InvalidRequest,
    /// The requested language is not supported
    UnknownLanguage(String),
    /// The language is rendered by the client; nothing ran
    RenderedLocally,
    /// The build step failed; nothing ran
    BuildFailed { exit_code: Option<i32> },
    /// The program ran until it exited or the client left
    Completed {
        exit_code: Option<i32>,
        report: PumpReport,
    },
}

/// Lifecycle stage of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingRequest,
    Building,
    Running,
    Draining,
    Closed,
}

/// One client connection's full lifecycle
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    runner: Runner,
    channel: ClientChannel,
    state: SessionState,
}

impl Session {
    pub fn new(runner: Runner, channel: ClientChannel) -> Self {
        Self {
            id: Uuid::new_v4(),
            runner,
            channel,
            state: SessionState::AwaitingRequest,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Serve the session to completion
    ///
    /// Notices meant for the client (unknown language, build diagnostics,
    /// invalid request) are sent over the channel and reported as an
    /// outcome, not an error.
    #[instrument(skip_all, fields(session = %self.id, language = field::Empty))]
    pub async fn run(mut self) -> Result<SessionOutcome, SessionError> {
        let outcome = self.drive().await;
        self.enter(SessionState::Closed);

        match &outcome {
            Ok(outcome) => info!(?outcome, "session closed"),
            Err(e) => warn!(error = %e, "session failed"),
        }
        outcome
    }

    async fn drive(&mut self) -> Result<SessionOutcome, SessionError> {
        let Some(message) = self.channel.recv().await else {
            return Ok(SessionOutcome::Disconnected);
        };

        let request = match SessionRequest::parse(&message) {
            Ok(request) => request,
            Err(reason) => {
                self.notify(format!("Invalid session request: {reason}"))
                    .await;
                return Ok(SessionOutcome::InvalidRequest);
            }
        };
        Span::current().record("language", request.language.as_str());

        let runner = self.runner.clone();
        let (id, language) = match runner.resolve(&request.language) {
            Resolution::Pipeline(id, language) => (id, language),
            Resolution::ClientSide(_) => {
                self.notify(RENDERED_LOCALLY).await;
                return Ok(SessionOutcome::RenderedLocally);
            }
            Resolution::Unknown => {
                self.notify(format!("Unknown language: {}", request.language))
                    .await;
                return Ok(SessionOutcome::UnknownLanguage(request.language));
            }
        };

        let mut workspace = runner.allocate(id, language).await?;
        let result = self
            .execute(&runner, &mut workspace, language, &request.code)
            .await;
        if let Err(e) = workspace.release().await {
            warn!(error = %e, "failed to release workspace");
        }
        result
    }

    async fn execute(
        &mut self,
        runner: &Runner,
        workspace: &mut Workspace,
        language: &Language,
        code: &str,
    ) -> Result<SessionOutcome, SessionError> {
        if language.is_compiled() {
            self.enter(SessionState::Building);
        }
        let build = match runner.build(workspace, language, code).await {
            Ok(build) => build,
            Err(e) => {
                self.notify(format!("Build error: {e}")).await;
                return Err(e.into());
            }
        };
        if let Some(diagnostics) = build.diagnostics() {
            self.notify(diagnostics).await;
        }
        let Some(command) = build.runnable else {
            return Ok(SessionOutcome::BuildFailed {
                exit_code: build.exit_code,
            });
        };

        self.enter(SessionState::Running);
        let mut process = match runner.launch(&command) {
            Ok(process) => process,
            Err(e) => {
                self.notify(format!("Failed to start {}: {e}", command.program()))
                    .await;
                return Err(SessionError::Launch(e));
            }
        };

        self.enter(SessionState::Draining);
        let report = runner.pump(&mut process, &mut self.channel).await;
        let status = process.wait().await?;

        Ok(SessionOutcome::Completed {
            exit_code: status.code(),
            report,
        })
    }

    /// Send a notice; a client that already left is not an error
    async fn notify(&mut self, text: impl Into<String>) {
        if self.channel.send_text(text).await.is_err() {
            debug!("client left before notice was delivered");
        }
    }

    fn enter(&mut self, state: SessionState) {
        debug!(from = ?self.state, to = ?state, "session state");
        self.state = state;
    }
}
