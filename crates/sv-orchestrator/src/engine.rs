//! Compose engine abstraction and the CLI-over-SSH production engine
//!
//! An engine takes a validated compose definition and a pooled client and
//! performs one lifecycle operation, streaming output as it happens. The
//! production engine execs `docker compose` on a fresh SSH session and
//! feeds the YAML on stdin, so nothing is written to the remote filesystem.

use async_trait::async_trait;
use russh::ChannelMsg;
use sv_core::error::OrchestrationError;
use sv_pool::PooledClient;
use tokio::sync::{mpsc, oneshot};

/// Buffered lines for one output channel, not visible outside the engine
const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// The lifecycle operation as the compose CLI sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeOp {
    Up,
    Down,
    Restart,
}

impl ComposeOp {
    /// The full remote command line for this operation.
    ///
    /// `--file -` makes compose read the definition from stdin; project
    /// names are slugs, so no shell quoting is needed.
    pub fn command(self, project: &str) -> String {
        match self {
            ComposeOp::Up => format!(
                "docker compose --project-name {project} --file - up --detach --remove-orphans"
            ),
            ComposeOp::Down => {
                format!("docker compose --project-name {project} --file - down --remove-orphans")
            }
            ComposeOp::Restart => {
                format!("docker compose --project-name {project} --file - restart")
            }
        }
    }
}

/// Live output of one engine run
///
/// Stdout and stderr arrive on separate channels, each in order; `done`
/// resolves exactly once with the remote outcome after both channels have
/// been closed by the engine.
pub struct EngineStream {
    pub logs: mpsc::Receiver<String>,
    pub errors: mpsc::Receiver<String>,
    pub done: oneshot::Receiver<Result<(), OrchestrationError>>,
}

/// One compose lifecycle operation against a remote target
#[async_trait]
pub trait ComposeEngine<C>: Send + Sync {
    /// Start the operation and return its live output stream.
    ///
    /// Errors here mean the operation never started; once an
    /// [`EngineStream`] is returned the outcome arrives through `done`.
    async fn run(
        &self,
        client: &C,
        project: &str,
        yaml: &str,
        op: ComposeOp,
    ) -> Result<EngineStream, OrchestrationError>;
}

/// Production engine: `docker compose` over an SSH session
#[derive(Debug, Default, Clone)]
pub struct ComposeCliEngine;

impl ComposeCliEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ComposeEngine<PooledClient> for ComposeCliEngine {
    async fn run(
        &self,
        client: &PooledClient,
        project: &str,
        yaml: &str,
        op: ComposeOp,
    ) -> Result<EngineStream, OrchestrationError> {
        let command = op.command(project);
        let tunnel = client.tunnel();
        tracing::info!(target = %tunnel.target(), project = %project, command = %command, "running compose operation");

        let mut channel = tunnel
            .open_session()
            .await
            .map_err(|e| OrchestrationError::Engine(e.to_string()))?;
        channel
            .exec(true, command.as_str())
            .await
            .map_err(|e| OrchestrationError::Engine(e.to_string()))?;
        channel
            .data(yaml.as_bytes())
            .await
            .map_err(|e| OrchestrationError::Engine(e.to_string()))?;
        channel
            .eof()
            .await
            .map_err(|e| OrchestrationError::Engine(e.to_string()))?;

        let (logs_tx, logs_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        let (errors_tx, errors_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        let (done_tx, done_rx) = oneshot::channel();
        let project = project.to_string();

        tokio::spawn(async move {
            let mut stdout = LineBuffer::new();
            let mut stderr = LineBuffer::new();
            let mut exit_status: Option<u32> = None;

            while let Some(msg) = channel.wait().await {
                match msg {
                    ChannelMsg::Data { ref data } => {
                        for line in stdout.push(data) {
                            let _ = logs_tx.send(line).await;
                        }
                    }
                    ChannelMsg::ExtendedData { ref data, ext: 1 } => {
                        for line in stderr.push(data) {
                            let _ = errors_tx.send(line).await;
                        }
                    }
                    ChannelMsg::ExitStatus { exit_status: code } => {
                        exit_status = Some(code);
                    }
                    _ => {}
                }
            }

            if let Some(line) = stdout.flush() {
                let _ = logs_tx.send(line).await;
            }
            if let Some(line) = stderr.flush() {
                let _ = errors_tx.send(line).await;
            }
            drop(logs_tx);
            drop(errors_tx);

            let outcome = match exit_status {
                Some(0) => Ok(()),
                Some(code) => Err(OrchestrationError::Engine(format!(
                    "compose exited with status {code}"
                ))),
                None => Err(OrchestrationError::Interrupted(
                    "session closed before compose reported an exit status".to_string(),
                )),
            };
            tracing::debug!(project = %project, outcome = ?outcome, "compose operation finished");
            let _ = done_tx.send(outcome);
        });

        Ok(EngineStream {
            logs: logs_rx,
            errors: errors_rx,
            done: done_rx,
        })
    }
}

/// Splits a byte stream into complete lines
///
/// Output arrives in arbitrary chunks; consumers want whole lines. CR is
/// stripped so progress output from the compose CLI reads cleanly.
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_up_command_reads_stdin() {
        let cmd = ComposeOp::Up.command("acme-web-1a2b3c4d");
        assert_eq!(
            cmd,
            "docker compose --project-name acme-web-1a2b3c4d --file - up --detach --remove-orphans"
        );
    }

    #[test]
    fn test_down_command_removes_orphans() {
        let cmd = ComposeOp::Down.command("p");
        assert!(cmd.contains("down --remove-orphans"));
    }

    #[test]
    fn test_restart_command() {
        let cmd = ComposeOp::Restart.command("p");
        assert!(cmd.ends_with("--file - restart"));
    }

    #[test]
    fn test_line_buffer_reassembles_split_lines() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"Pulling ng").is_empty());
        assert_eq!(buf.push(b"inx ... done\nCreating"), vec!["Pulling nginx ... done"]);
        assert_eq!(buf.push(b" web\n"), vec!["Creating web"]);
        assert!(buf.flush().is_none());
    }

    #[test]
    fn test_line_buffer_strips_carriage_returns() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.push(b"layer 1/3\r\n"), vec!["layer 1/3"]);
    }

    #[test]
    fn test_line_buffer_flushes_trailing_partial() {
        let mut buf = LineBuffer::new();
        buf.push(b"no newline at end");
        assert_eq!(buf.flush().as_deref(), Some("no newline at end"));
        assert!(buf.flush().is_none());
    }

    #[test]
    fn test_line_buffer_handles_multiple_lines_per_chunk() {
        let mut buf = LineBuffer::new();
        assert_eq!(
            buf.push(b"one\ntwo\nthree\n"),
            vec!["one", "two", "three"]
        );
    }
}
