//! External tool invocation with concurrent output capture.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Result;

/// One external tool invocation: program, arguments, working directory.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

/// Which stream of the child a transcript line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone)]
pub struct TranscriptLine {
    pub stream: StreamKind,
    pub text: String,
}

/// Exit code and captured output of a finished tool process.
#[derive(Debug)]
pub struct ProcessOutcome {
    pub code: i32,
    pub transcript: Vec<TranscriptLine>,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Render the transcript with stream tags, for logs and error payloads.
    pub fn render_transcript(&self) -> String {
        self.transcript
            .iter()
            .map(|line| match line.stream {
                StreamKind::Stdout => format!("[stdout] {}", line.text),
                StreamKind::Stderr => format!("[stderr] {}", line.text),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Runs one tool to completion and reports its outcome.
///
/// A nonzero exit code is part of the outcome, not an error; callers decide
/// whether it is fatal.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ProcessOutcome>;
}

/// `ToolRunner` backed by a real subprocess.
///
/// No timeout is imposed on the child: a hung tool hangs the caller until
/// the child is terminated externally.
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ProcessOutcome> {
        debug!(
            program = %invocation.program.display(),
            args = ?invocation.args,
            cwd = %invocation.cwd.display(),
            "Spawning tool"
        );

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Both streams are drained concurrently with each other and with the
        // wait below; draining one to completion first can deadlock once the
        // child fills the other pipe.
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stdout_task = child
            .stdout
            .take()
            .map(|out| tokio::spawn(drain(out, StreamKind::Stdout, tx.clone())));
        let stderr_task = child
            .stderr
            .take()
            .map(|err| tokio::spawn(drain(err, StreamKind::Stderr, tx.clone())));
        drop(tx);

        let status = child.wait().await?;

        if let Some(task) = stdout_task {
            let _ = task.await;
        }
        if let Some(task) = stderr_task {
            let _ = task.await;
        }

        let mut transcript = Vec::new();
        while let Some(line) = rx.recv().await {
            transcript.push(line);
        }

        let code = status.code().unwrap_or(-1);
        debug!(code, "Tool exited");

        Ok(ProcessOutcome { code, transcript })
    }
}

async fn drain<R>(stream: R, kind: StreamKind, tx: mpsc::UnboundedSender<TranscriptLine>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(text)) = lines.next_line().await {
        match kind {
            StreamKind::Stdout => info!("{}", text),
            StreamKind::Stderr => warn!("{}", text),
        }
        let _ = tx.send(TranscriptLine { stream: kind, text });
    }
}
