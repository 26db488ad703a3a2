use std::path::Path;

use runbridge::config::{Config, LanguageId};
use runbridge::{PumpEnd, SessionError, SessionOutcome, Workspace};

use super::{SESSION_TIMEOUT, leftovers, open, run_session, stand_in_runner, start, with_scratch};

#[tokio::test]
async fn test_disconnect_kills_process_and_removes_workspace() {
    let (runner, scratch) = stand_in_runner();
    let (task, mut end) = start(&runner);

    end.send(open("python", "echo $$; exec sleep 30"))
        .await
        .unwrap();
    let first = tokio::time::timeout(SESSION_TIMEOUT, end.recv())
        .await
        .expect("no output from program")
        .expect("session closed early");
    let pid: u32 = first.trim().parse().expect("pid frame");
    assert!(!leftovers(scratch.path()).is_empty());

    drop(end);
    let outcome = tokio::time::timeout(SESSION_TIMEOUT, task)
        .await
        .expect("session did not stop after disconnect")
        .unwrap()
        .unwrap();

    match outcome {
        SessionOutcome::Completed { exit_code, report } => {
            assert_eq!(report.ended_by, PumpEnd::ClientGone);
            assert!(report.killed);
            assert_eq!(exit_code, None);
        }
        other => panic!("expected Completed, got {other:?}"),
    }
    assert!(!Path::new(&format!("/proc/{pid}")).exists());
    assert!(leftovers(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_disconnect_while_waiting_for_input() {
    let (runner, scratch) = stand_in_runner();
    let (task, mut end) = start(&runner);

    end.send(open("java", "printf 'name? '; read name; echo \"hi $name\""))
        .await
        .unwrap();
    let prompt = tokio::time::timeout(SESSION_TIMEOUT, end.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(prompt, "name? ");

    drop(end);
    let outcome = tokio::time::timeout(SESSION_TIMEOUT, task)
        .await
        .expect("session did not stop after disconnect")
        .unwrap()
        .unwrap();

    assert!(matches!(outcome, SessionOutcome::Completed { .. }));
    assert!(leftovers(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_disconnect_before_request() {
    let (runner, scratch) = stand_in_runner();
    let (task, end) = start(&runner);
    drop(end);

    assert_eq!(
        task.await.unwrap().unwrap(),
        SessionOutcome::Disconnected
    );
    assert!(leftovers(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_process_closing_output_early_is_killed() {
    let (runner, scratch) = stand_in_runner();

    let (outcome, frames) =
        run_session(&runner, &[open("python", "echo bye; exec >&- 2>&-; sleep 30")]).await;

    assert_eq!(frames.concat(), "bye\n");
    match outcome.unwrap() {
        SessionOutcome::Completed { report, .. } => {
            assert_eq!(report.ended_by, PumpEnd::ProcessExited);
            assert!(report.killed);
        }
        other => panic!("expected Completed, got {other:?}"),
    }
    assert!(leftovers(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_spawn_failure_still_releases_workspace() {
    let toml = r#"
[languages.python]
name = "Missing interpreter"
extension = "py"

[languages.python.run]
command = ["definitely-not-an-interpreter", "{source}"]
"#;
    let (runner, scratch) = with_scratch(Config::parse_toml(toml).unwrap());

    let (outcome, frames) = run_session(&runner, &[open("python", "print(1)")]).await;

    assert!(matches!(outcome, Err(SessionError::Launch(_))));
    assert_eq!(frames.len(), 1);
    assert!(frames[0].starts_with("Failed to start definitely-not-an-interpreter"));
    assert!(leftovers(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_missing_compiler_still_releases_workspace() {
    let toml = r#"
[languages.c]
name = "Missing compiler"
extension = "c"

[languages.c.compile]
command = ["definitely-not-a-compiler", "{source}", "-o", "{binary}"]

[languages.c.run]
command = ["{binary}"]
"#;
    let (runner, scratch) = with_scratch(Config::parse_toml(toml).unwrap());

    let (outcome, frames) = run_session(&runner, &[open("c", "int main() {}")]).await;

    assert!(matches!(outcome, Err(SessionError::Compile(_))));
    assert_eq!(frames.len(), 1);
    assert!(frames[0].starts_with("Build error:"));
    assert!(frames[0].contains("definitely-not-a-compiler"));
    assert!(leftovers(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_language_removed_from_config_is_unknown() {
    let mut config = Config::default();
    config.languages.remove("java");
    let (runner, scratch) = with_scratch(config);

    let (outcome, frames) = run_session(&runner, &[open("java", "class A {}")]).await;

    assert_eq!(
        outcome.unwrap(),
        SessionOutcome::UnknownLanguage("java".to_owned())
    );
    assert_eq!(frames, ["Unknown language: java"]);
    assert!(leftovers(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_release_twice_is_a_noop() {
    let scratch = tempfile::tempdir().unwrap();
    let config = Config::default();
    let language = config.get_language(LanguageId::Java).unwrap();

    let mut workspace = Workspace::allocate(scratch.path(), LanguageId::Java, &language.extension)
        .await
        .unwrap();
    let source = workspace.file_path("Main.java").unwrap();
    workspace
        .write_file(&source, b"public class Main {}")
        .await
        .unwrap();

    workspace.release().await.unwrap();
    workspace.release().await.unwrap();
    assert!(workspace.is_released());
    assert!(leftovers(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_aborted_session_cleans_up() {
    let (runner, scratch) = stand_in_runner();
    let (task, mut end) = start(&runner);

    end.send(open("c", "echo up; exec sleep 30")).await.unwrap();
    let first = tokio::time::timeout(SESSION_TIMEOUT, end.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, "up\n");

    // Cancelling the session future drops the process and the workspace
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert!(leftovers(scratch.path()).is_empty());
}
