use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use bridge_core::{ProgressStage, ProgressUpdate};
use bridge_logging::{bridge_debug, bridge_warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use crate::invoke::{InvokeSettings, ModelBackend, ProgressSink};
use crate::types::budget;
use crate::{FailureKind, InvokeError};

/// New stdout bytes between two streaming progress events.
pub const STREAM_REPORT_BYTES: usize = 512;

/// Local model CLI fed the prompt on stdin.
#[derive(Debug, Clone)]
pub struct CliBackend {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CliBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_settings(settings: &InvokeSettings) -> Self {
        Self::new(
            settings.cli_program.clone(),
            settings.cli_args.clone(),
            settings.timeout,
        )
    }
}

#[async_trait::async_trait]
impl ModelBackend for CliBackend {
    fn name(&self) -> &str {
        "cli"
    }

    async fn complete(
        &self,
        prompt: &str,
        sink: &dyn ProgressSink,
    ) -> Result<String, InvokeError> {
        sink.emit(ProgressUpdate::new(
            ProgressStage::Starting,
            format!("Starting {}", self.program),
        ));
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                InvokeError::unavailable(format!("failed to start {}: {err}", self.program))
            })?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(InvokeError::new(FailureKind::Io, "child pipes unavailable"));
        };

        sink.emit(ProgressUpdate::new(
            ProgressStage::Sending,
            "Sending prompt to the model process",
        ));
        sink.emit(ProgressUpdate::new(
            ProgressStage::Waiting,
            "Waiting for the model",
        ));
        let exchange = run_exchange(&mut child, prompt, stdin, stdout, stderr, sink);
        let outcome = tokio::time::timeout(self.timeout, exchange).await;

        let Exchange {
            status,
            stdout,
            stderr,
        } = match outcome {
            Ok(result) => result.map_err(|err| InvokeError::new(FailureKind::Io, err.to_string()))?,
            Err(_elapsed) => {
                bridge_warn!(
                    "{} did not finish within {}, killing it",
                    self.program,
                    budget(self.timeout)
                );
                if let Err(err) = child.kill().await {
                    bridge_warn!("Failed to kill {}: {err}", self.program);
                }
                return Err(InvokeError::new(
                    FailureKind::Timeout {
                        after: self.timeout,
                    },
                    format!("{} produced no answer in time", self.program),
                ));
            }
        };

        if !status.success() {
            let detail = if stderr.trim().is_empty() {
                stdout.trim()
            } else {
                stderr.trim()
            };
            return Err(InvokeError::new(
                FailureKind::NonZeroExit {
                    code: status.code(),
                },
                detail.to_string(),
            ));
        }
        Ok(stdout)
    }
}

struct Exchange {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

/// Feed the prompt, drain both output pipes and reap the child. Every pipe
/// belongs to this future, so dropping it on timeout releases them all.
async fn run_exchange(
    child: &mut Child,
    prompt: &str,
    mut stdin: ChildStdin,
    stdout: ChildStdout,
    mut stderr: ChildStderr,
    sink: &dyn ProgressSink,
) -> io::Result<Exchange> {
    let write_prompt = async move {
        stdin.write_all(prompt.as_bytes()).await?;
        stdin.shutdown().await
    };
    let read_stderr = async move {
        let mut buf = Vec::new();
        stderr.read_to_end(&mut buf).await.map(|_| buf)
    };
    let (written, stderr, stdout) =
        tokio::join!(write_prompt, read_stderr, collect_stdout(stdout, sink));

    if let Err(err) = written {
        bridge_debug!("Prompt write ended early: {err}");
    }
    let stdout = stdout?;
    let stderr = stderr.map(|buf| String::from_utf8_lossy(&buf).into_owned()).unwrap_or_default();
    let status = child.wait().await?;
    Ok(Exchange {
        status,
        stdout,
        stderr,
    })
}

async fn collect_stdout<R>(mut stdout: R, sink: &dyn ProgressSink) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut raw = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut reported = 0;
    loop {
        let read = stdout.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..read]);
        if raw.len() - reported >= STREAM_REPORT_BYTES {
            reported = raw.len();
            sink.emit(
                ProgressUpdate::new(ProgressStage::Streaming, "Receiving response")
                    .with_chars(raw.len() as u64),
            );
        }
    }
    Ok(String::from_utf8_lossy(&raw).into_owned())
}
