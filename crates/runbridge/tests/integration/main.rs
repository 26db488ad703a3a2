//! Integration tests for runbridge
//!
//! Sessions are driven end to end through a `ClientChannel`. Most tests use
//! stand-in toolchains made of `/bin/sh` scripts (tests/fixtures/stand_in.toml)
//! so they run anywhere. Tests against the real interpreters and compilers
//! need python3, gcc, g++, javac/java and node on PATH:
//!   cargo test -p runbridge --features toolchain-tests

use std::fs;
use std::path::Path;
use std::time::Duration;

use runbridge::config::Config;
use runbridge::{ClientEnd, Runner, Session, SessionError, SessionOutcome};
use serde_json::json;
use tempfile::TempDir;

mod cleanup;
mod config_loading;
mod sessions;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Upper bound for any single session in these tests
pub(crate) const SESSION_TIMEOUT: Duration = Duration::from_secs(20);

/// A runner using shell stand-in toolchains and a private scratch directory
pub(crate) fn stand_in_runner() -> (Runner, TempDir) {
    let path = format!("{FIXTURES_PATH}/stand_in.toml");
    let content =
        fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"));
    let config = Config::parse_toml(&content).expect("stand-in config should be valid");
    with_scratch(config)
}

/// Give a config its own scratch directory
pub(crate) fn with_scratch(mut config: Config) -> (Runner, TempDir) {
    let scratch = tempfile::tempdir().expect("Failed to create scratch dir");
    config.scratch_dir = Some(scratch.path().to_path_buf());
    (Runner::new(config), scratch)
}

/// The open message for a session
pub(crate) fn open(language: &str, code: &str) -> String {
    json!({ "language": language, "code": code }).to_string()
}

/// An input message
pub(crate) fn stdin(line: &str) -> String {
    json!({ "stdin": line }).to_string()
}

/// Start a session on its own task
pub(crate) fn start(
    runner: &Runner,
) -> (
    tokio::task::JoinHandle<Result<SessionOutcome, SessionError>>,
    ClientEnd,
) {
    let (channel, end) = runner.channel();
    let session = Session::new(runner.clone(), channel);
    (tokio::spawn(session.run()), end)
}

/// Run a whole session: send `messages`, then collect frames until the session closes
///
/// The client stays connected for the whole run.
pub(crate) async fn run_session(
    runner: &Runner,
    messages: &[String],
) -> (Result<SessionOutcome, SessionError>, Vec<String>) {
    let (task, mut end) = start(runner);
    for message in messages {
        end.send(message.clone())
            .await
            .expect("session closed early");
    }

    let frames = tokio::time::timeout(SESSION_TIMEOUT, async {
        let mut frames = Vec::new();
        while let Some(frame) = end.recv().await {
            frames.push(frame);
        }
        frames
    })
    .await
    .expect("session timed out");

    let outcome = task.await.expect("session task panicked");
    (outcome, frames)
}

/// Names of everything left in a scratch directory
pub(crate) fn leftovers(scratch: &Path) -> Vec<String> {
    match fs::read_dir(scratch) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}
