use runbridge::{PumpEnd, SessionOutcome};

use super::{leftovers, open, run_session, stand_in_runner, stdin};

fn completed_exit_code(outcome: &SessionOutcome) -> Option<i32> {
    match outcome {
        SessionOutcome::Completed { exit_code, .. } => *exit_code,
        other => panic!("expected Completed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_every_language_prints_literal() {
    let (runner, scratch) = stand_in_runner();

    for language in ["python", "javascript", "c", "c++", "java"] {
        let (outcome, frames) =
            run_session(&runner, &[open(language, "echo 'hello, world'")]).await;
        let outcome = outcome.unwrap();

        assert_eq!(completed_exit_code(&outcome), Some(0), "{language}");
        let output = frames.concat();
        assert!(
            output.ends_with("hello, world\n"),
            "{language}: unexpected output {output:?}"
        );
    }

    assert!(leftovers(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_language_names_are_case_insensitive() {
    let (runner, _scratch) = stand_in_runner();

    for language in ["Python", "JS", "CPP", " java "] {
        let (outcome, frames) = run_session(&runner, &[open(language, "echo ok")]).await;
        assert!(
            matches!(outcome.unwrap(), SessionOutcome::Completed { .. }),
            "{language}"
        );
        assert!(frames.concat().ends_with("ok\n"), "{language}");
    }
}

#[tokio::test]
async fn test_lang_field_alias() {
    let (runner, _scratch) = stand_in_runner();
    let message = serde_json::json!({ "lang": "python", "code": "echo aliased" }).to_string();

    let (outcome, frames) = run_session(&runner, &[message]).await;

    assert_eq!(completed_exit_code(&outcome.unwrap()), Some(0));
    assert_eq!(frames.concat(), "aliased\n");
}

#[tokio::test]
async fn test_workspace_exists_during_run() {
    let (runner, scratch) = stand_in_runner();
    let code = r#"test -f "$0" && echo present; ls "$(dirname "$0")" | wc -l | tr -d ' '"#;

    let (outcome, frames) = run_session(&runner, &[open("python", code)]).await;

    assert_eq!(completed_exit_code(&outcome.unwrap()), Some(0));
    assert_eq!(frames.concat(), "present\n1\n");
    assert!(leftovers(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_stdin_is_forwarded() {
    let (runner, _scratch) = stand_in_runner();
    let code = r#"printf 'Enter a number: '; read n; echo "you entered $n""#;

    let (outcome, frames) = run_session(&runner, &[open("python", code), stdin("5")]).await;

    assert_eq!(completed_exit_code(&outcome.unwrap()), Some(0));
    assert_eq!(frames.concat(), "Enter a number: you entered 5\n");
}

#[tokio::test]
async fn test_multiple_input_lines() {
    let (runner, _scratch) = stand_in_runner();
    let code = r#"read a; read b; echo $((a + b))"#;

    let (outcome, frames) = run_session(
        &runner,
        &[
            open("c", code),
            stdin("2"),
            r#"{"note":"ignored"}"#.to_owned(),
            stdin("40"),
        ],
    )
    .await;

    assert_eq!(completed_exit_code(&outcome.unwrap()), Some(0));
    assert_eq!(frames.concat(), "42\n");
}

#[tokio::test]
async fn test_stderr_is_merged() {
    let (runner, _scratch) = stand_in_runner();
    let code = "echo out; echo err >&2; echo out again";

    let (_, frames) = run_session(&runner, &[open("python", code)]).await;

    assert_eq!(frames.concat(), "out\nerr\nout again\n");
}

#[tokio::test]
async fn test_exit_code_is_reported() {
    let (runner, _scratch) = stand_in_runner();

    let (outcome, _) = run_session(&runner, &[open("javascript", "exit 7")]).await;

    let outcome = outcome.unwrap();
    assert_eq!(completed_exit_code(&outcome), Some(7));
    match outcome {
        SessionOutcome::Completed { report, .. } => {
            assert_eq!(report.ended_by, PumpEnd::ProcessExited);
            assert!(!report.killed);
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn test_large_output_is_chunked() {
    let (runner, _scratch) = stand_in_runner();
    let code = r"head -c 3000 /dev/zero | tr '\000' x";

    let (outcome, frames) = run_session(&runner, &[open("python", code)]).await;

    assert_eq!(completed_exit_code(&outcome.unwrap()), Some(0));
    assert!(frames.iter().all(|f| f.len() <= 1024));
    assert_eq!(frames.concat(), "x".repeat(3000));
}

#[tokio::test]
async fn test_multibyte_output_survives_chunking() {
    let (runner, _scratch) = stand_in_runner();
    // 1023 ASCII bytes can split the first é across two reads
    let code = r"head -c 1023 /dev/zero | tr '\000' a; printf 'éé\n'";

    let (_, frames) = run_session(&runner, &[open("python", code)]).await;

    let output = frames.concat();
    assert!(!output.contains('\u{FFFD}'));
    assert!(output.ends_with("éé\n"));
}

#[tokio::test]
async fn test_build_failure_sends_diagnostics() {
    let (runner, scratch) = stand_in_runner();

    for language in ["c", "cpp", "java"] {
        let (outcome, frames) =
            run_session(&runner, &[open(language, "SYNTAX_ERROR\necho never")]).await;

        assert_eq!(
            outcome.unwrap(),
            SessionOutcome::BuildFailed { exit_code: Some(1) },
            "{language}"
        );
        assert_eq!(frames.len(), 1, "{language}: {frames:?}");
        assert!(frames[0].contains("error"), "{language}");
        assert!(!frames.concat().contains("never"));
    }

    assert!(leftovers(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_compiler_warnings_precede_output() {
    let (runner, _scratch) = stand_in_runner();

    let (outcome, frames) = run_session(&runner, &[open("cpp", "echo ran")]).await;

    assert_eq!(completed_exit_code(&outcome.unwrap()), Some(0));
    assert!(frames[0].contains("warning: stand-in compiler"));
    assert_eq!(frames[1..].concat(), "ran\n");
}

#[tokio::test]
async fn test_java_entry_from_public_class() {
    let (runner, scratch) = stand_in_runner();
    let code = "package com.example.demo;\n\
                # class Helper\n\
                # public class Greeter\n\
                echo \"running $0 in $(basename \"$PWD\" | cut -c1-5)\"\n";

    let (outcome, frames) = run_session(&runner, &[open("java", code)]).await;

    assert_eq!(completed_exit_code(&outcome.unwrap()), Some(0));
    assert_eq!(frames.concat(), "running Greeter.class in java_\n");
    assert!(leftovers(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_java_without_class_uses_default_entry() {
    let (runner, _scratch) = stand_in_runner();

    let (outcome, frames) = run_session(&runner, &[open("java", "echo \"$0\"")]).await;

    assert_eq!(completed_exit_code(&outcome.unwrap()), Some(0));
    assert_eq!(frames.concat(), "Main.class\n");
}

#[tokio::test]
async fn test_unknown_language_single_frame() {
    let (runner, scratch) = stand_in_runner();

    let (outcome, frames) = run_session(&runner, &[open("X", "echo hi")]).await;

    assert_eq!(
        outcome.unwrap(),
        SessionOutcome::UnknownLanguage("X".to_owned())
    );
    assert_eq!(frames, ["Unknown language: X"]);
    assert!(leftovers(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_html_is_not_executed() {
    let (runner, scratch) = stand_in_runner();

    let (outcome, frames) = run_session(&runner, &[open("html", "<h1>hi</h1>")]).await;

    assert_eq!(outcome.unwrap(), SessionOutcome::RenderedLocally);
    assert_eq!(frames, ["HTML is rendered locally."]);
    assert!(leftovers(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_invalid_open_message() {
    let (runner, scratch) = stand_in_runner();

    let (outcome, frames) = run_session(&runner, &[r#"{"code":"echo hi"}"#.to_owned()]).await;

    assert_eq!(outcome.unwrap(), SessionOutcome::InvalidRequest);
    assert_eq!(frames.len(), 1);
    assert!(frames[0].starts_with("Invalid session request:"));
    assert!(leftovers(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_concurrent_sessions_are_independent() {
    let (runner, scratch) = stand_in_runner();

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let runner = runner.clone();
            tokio::spawn(async move {
                let code = format!("read x; echo \"session {i} got $x\"");
                run_session(&runner, &[open("python", &code), stdin(&format!("v{i}"))]).await
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    for (i, (outcome, frames)) in results.into_iter().enumerate() {
        assert!(matches!(outcome.unwrap(), SessionOutcome::Completed { .. }));
        assert_eq!(frames.concat(), format!("session {i} got v{i}\n"));
    }
    assert!(leftovers(scratch.path()).is_empty());
}
