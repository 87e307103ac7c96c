//! Caller-side handle for one in-flight service operation

use std::sync::{Arc, Mutex};

use sv_core::error::OrchestrationError;
use sv_core::events::StreamEvent;
use sv_core::types::ServiceState;
use tokio::sync::{mpsc, oneshot};

/// Live view of one start/stop/restart run
///
/// The driver behind this handle runs as its own task; dropping the handle
/// abandons the stream but never the operation, so persisted state always
/// reaches a terminal value.
pub struct ServiceOperation {
    logs: mpsc::Receiver<String>,
    errors: mpsc::Receiver<String>,
    done: oneshot::Receiver<ServiceState>,
    final_error: Arc<Mutex<Option<OrchestrationError>>>,
}

impl ServiceOperation {
    pub(crate) fn new(
        logs: mpsc::Receiver<String>,
        errors: mpsc::Receiver<String>,
        done: oneshot::Receiver<ServiceState>,
        final_error: Arc<Mutex<Option<OrchestrationError>>>,
    ) -> Self {
        Self {
            logs,
            errors,
            done,
            final_error,
        }
    }

    /// Next progress line, `None` once the operation has finished
    pub async fn next_log(&mut self) -> Option<String> {
        self.logs.recv().await
    }

    /// Next error line, `None` once the operation has finished
    pub async fn next_error(&mut self) -> Option<String> {
        self.errors.recv().await
    }

    /// The terminal state, once the operation reaches it.
    ///
    /// `None` only if the driver task panicked.
    pub async fn wait_done(&mut self) -> Option<ServiceState> {
        (&mut self.done).await.ok()
    }

    /// The error behind a failed run, readable after the terminal event
    pub fn final_error(&self) -> Option<OrchestrationError> {
        match self.final_error.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Collapse the three sources into one ordered [`StreamEvent`] feed.
    ///
    /// This is the transport-boundary shape: log and error frames as they
    /// arrive, then exactly one terminal status frame. Serialize each frame
    /// with serde_json to put it on a wire.
    pub fn into_event_stream(mut self) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut logs_open = true;
            let mut errors_open = true;
            while logs_open || errors_open {
                tokio::select! {
                    line = self.logs.recv(), if logs_open => match line {
                        Some(line) => {
                            let _ = tx.send(StreamEvent::log(line)).await;
                        }
                        None => logs_open = false,
                    },
                    line = self.errors.recv(), if errors_open => match line {
                        Some(line) => {
                            let _ = tx.send(StreamEvent::error(line)).await;
                        }
                        None => errors_open = false,
                    },
                }
            }
            if let Some(state) = self.wait_done().await {
                let message = match self.final_error() {
                    Some(err) => err.to_string(),
                    None => format!("service {state}"),
                };
                let _ = tx.send(StreamEvent::status(message, state)).await;
            }
        });
        rx
    }
}

impl std::fmt::Debug for ServiceOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceOperation")
            .field("final_error", &self.final_error())
            .finish()
    }
}
