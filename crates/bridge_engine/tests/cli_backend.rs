#![cfg(unix)]

mod common;

use std::time::{Duration, Instant};

use bridge_core::ProgressStage;
use bridge_engine::{CliBackend, FailureKind, ModelBackend, STREAM_REPORT_BYTES};
use pretty_assertions::assert_eq;

use common::{init_logging, RecordingSink};

fn sh(script: &str, extra: &[&str], timeout: Duration) -> CliBackend {
    let mut args = vec!["-c".to_string(), script.to_string()];
    args.extend(extra.iter().map(|arg| arg.to_string()));
    CliBackend::new("sh", args, timeout)
}

#[tokio::test]
async fn prompt_is_fed_on_stdin_and_stdout_returned() {
    init_logging();
    let backend = CliBackend::new("cat", Vec::new(), Duration::from_secs(10));
    let sink = RecordingSink::new();

    let text = backend
        .complete("SUMMARY:\nechoed back", &sink)
        .await
        .expect("cat answers");

    assert_eq!(text, "SUMMARY:\nechoed back");
    assert_eq!(
        &sink.stages()[..3],
        &[
            ProgressStage::Starting,
            ProgressStage::Sending,
            ProgressStage::Waiting
        ]
    );
}

#[tokio::test]
async fn large_output_reports_streaming_progress() {
    let prompt = "x".repeat(STREAM_REPORT_BYTES * 8);
    let backend = CliBackend::new("cat", Vec::new(), Duration::from_secs(10));
    let sink = RecordingSink::new();

    let text = backend.complete(&prompt, &sink).await.unwrap();
    assert_eq!(text.len(), prompt.len());

    let streamed: Vec<u64> = sink
        .updates()
        .into_iter()
        .filter(|update| update.stage == ProgressStage::Streaming)
        .filter_map(|update| update.chars)
        .collect();
    assert!(!streamed.is_empty());
    assert!(streamed.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn nonzero_exit_carries_stderr() {
    let backend = sh("echo 'model not logged in' >&2; exit 3", &[], Duration::from_secs(10));

    let err = backend
        .complete("prompt", &RecordingSink::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::NonZeroExit { code: Some(3) });
    assert_eq!(err.message, "model not logged in");
}

#[tokio::test]
async fn nonzero_exit_falls_back_to_stdout_when_stderr_is_empty() {
    let backend = sh("echo 'usage: model [opts]'; exit 2", &[], Duration::from_secs(10));

    let err = backend
        .complete("prompt", &RecordingSink::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::NonZeroExit { code: Some(2) });
    assert_eq!(err.message, "usage: model [opts]");
}

#[tokio::test]
async fn missing_program_is_model_unavailable() {
    let backend = CliBackend::new(
        "definitely-not-a-model-cli-7f3a",
        Vec::new(),
        Duration::from_secs(1),
    );

    let err = backend
        .complete("prompt", &RecordingSink::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::ModelUnavailable);
}

#[tokio::test]
async fn stalled_process_is_killed_on_timeout() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("model.pid");
    let pid_arg = pid_file.to_string_lossy().into_owned();
    let backend = sh(
        "echo $$ > \"$0\"; exec sleep 30",
        &[&pid_arg],
        Duration::from_millis(500),
    );

    let started = Instant::now();
    let err = backend
        .complete("prompt", &RecordingSink::new())
        .await
        .unwrap_err();

    assert_eq!(
        err.kind,
        FailureKind::Timeout {
            after: Duration::from_millis(500)
        }
    );
    assert!(err.to_string().starts_with("timed out after 500ms"));
    assert!(started.elapsed() < Duration::from_secs(10));

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    let probe = std::process::Command::new("sh")
        .args(["-c", &format!("kill -0 {} 2>/dev/null", pid.trim())])
        .status()
        .unwrap();
    assert!(!probe.success(), "process {} survived the timeout", pid.trim());
}

#[tokio::test]
async fn lingering_helper_holding_stderr_cannot_outlast_the_budget() {
    init_logging();
    let backend = sh("sleep 20 >/dev/null & echo answer", &[], Duration::from_secs(1));

    let started = Instant::now();
    let outcome = tokio::time::timeout(
        Duration::from_secs(8),
        backend.complete("prompt", &RecordingSink::new()),
    )
    .await
    .expect("complete() must return within its own budget");

    assert!(matches!(
        outcome.unwrap_err().kind,
        FailureKind::Timeout { .. }
    ));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn process_ignoring_stdin_still_answers() {
    let prompt = "p".repeat(256 * 1024);
    let backend = sh("echo answer", &[], Duration::from_secs(10));

    let text = backend
        .complete(&prompt, &RecordingSink::new())
        .await
        .unwrap();

    assert_eq!(text.trim(), "answer");
}
