#![cfg(unix)]

use std::time::{Duration, Instant};
use studentbox::process::Program;
use studentbox::FailureKind;

fn sh(script: &str) -> Program {
    Program::new("sh").args(["-c", script])
}

#[test]
fn stdout_is_returned_trimmed() {
    let stdout = sh("echo hello; echo world; echo").run().unwrap();
    assert_eq!(stdout, "hello\nworld");
}

#[test]
fn non_zero_exit_is_reported_with_outputs() {
    let failure = sh("echo partial; echo broken >&2; exit 3").run().unwrap_err();
    assert_eq!(failure.kind(), FailureKind::Exception);
    let message = failure.message();
    assert!(message.starts_with("Your program exited with the error code: 3."));
    assert!(message.contains("I started it as:"));
    assert!(message.contains("sh -c 'echo partial; echo broken >&2; exit 3'"));
    assert!(message.contains("Your code printed:\n\n```text\npartial\n```"));
    assert!(message.contains("Found this on stderr:\n\n```text\nbroken\n```"));
}

#[test]
fn slow_program_is_halted() {
    let start = Instant::now();
    let failure = sh("sleep 5")
        .timeout(Duration::from_millis(200))
        .run()
        .unwrap_err();
    assert_eq!(failure.kind(), FailureKind::Timeout);
    assert!(failure.message().starts_with("I had to halt your program, sorry..."));
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[test]
fn stderr_on_success_is_a_failure() {
    let failure = sh("echo oops >&2").run().unwrap_err();
    assert_eq!(failure.kind(), FailureKind::Output);
    assert_eq!(
        failure.message(),
        "Found this on stderr:\n\n```text\noops\n```"
    );
}

#[test]
fn stdin_is_closed() {
    let stdout = sh("cat; echo done").run().unwrap();
    assert_eq!(stdout, "done");
}

#[test]
fn output_reports_status() {
    let output = sh("exit 0").output().unwrap();
    assert!(output.success());
    assert_eq!(output.code(), Some(0));
    assert!(!output.killed());
}

#[test]
fn blank_stderr_on_success_is_ignored() {
    let stdout = sh("echo ok; echo >&2; printf '  ' >&2").run().unwrap();
    assert_eq!(stdout, "ok");
}
