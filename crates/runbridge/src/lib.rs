//! A library for streaming interactive code execution.
//!
//! runbridge takes a program and a language from a client, builds it if the
//! language needs a build step, runs it as a child process and bridges the
//! process's merged output and its input to the client in real time.
//!
//! # Features
//!
//! - **Multi-language**: Python, C, C++, Java and JavaScript pipelines, with
//!   commands defined in TOML configuration.
//! - **Live streaming**: output is forwarded in small chunks as it is
//!   produced, and client input lines are written to the program as they
//!   arrive.
//! - **Deterministic cleanup**: per-request workspaces are removed and
//!   processes are killed on every exit path, including client disconnects.
//! - **Transport-neutral sessions**: a session talks to its client through a
//!   [`ClientChannel`], so any transport can host it.
//!
//! # Security
//!
//! Submitted programs run with the privileges of the host process. There is
//! no sandbox; deploy behind a container, jail or VM.

pub use analyze::{AnalyzeError, Analyzer};
pub use config::{Config, ConfigError, EXAMPLE_CONFIG, Language, LanguageId};
pub use process::{ManagedProcess, ProcessCommand, ProcessError};
pub use runner::{
    ChannelClosed, ClientChannel, ClientEnd, CompileError, CompileResult, PumpEnd, PumpReport,
    Runner,
};
pub use session::{Session, SessionError, SessionOutcome, SessionState};
pub use types::{AnalyzeRequest, AnalyzeResponse, InputMessage, SessionRequest};
pub use workspace::{Workspace, WorkspaceError};

pub mod analyze;
pub mod config;
pub mod process;
pub mod runner;
pub mod session;
pub mod types;
pub mod workspace;
