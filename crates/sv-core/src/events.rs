//! Typed stream events
//!
//! Operations emit log and error lines while they run and exactly one
//! terminal status. Events are plain data here; a transport boundary (for
//! example an SSE layer) encodes them once with serde_json — there is no
//! hand-built JSON anywhere in the core.

use serde::{Deserialize, Serialize};

use crate::types::ServiceState;

/// One frame of a live operation stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// A line of engine output
    Log { message: String },
    /// A line of engine error output, or a terminal error description
    Error { message: String },
    /// The terminal status; nothing follows it
    Status { message: String, state: ServiceState },
}

impl StreamEvent {
    /// A log line
    pub fn log(message: impl Into<String>) -> Self {
        StreamEvent::Log {
            message: message.into(),
        }
    }

    /// An error line
    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }

    /// The terminal status event
    pub fn status(message: impl Into<String>, state: ServiceState) -> Self {
        StreamEvent::Status {
            message: message.into(),
            state,
        }
    }

    /// Whether this event terminates the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Status { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_encoding() {
        let event = StreamEvent::log("Pulling image nginx:latest");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"type":"log","message":"Pulling image nginx:latest"}"#
        );
    }

    #[test]
    fn test_error_event_encoding() {
        let event = StreamEvent::error("no space left on device");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"type":"error","message":"no space left on device"}"#
        );
    }

    #[test]
    fn test_status_event_encoding() {
        let event = StreamEvent::status("service started", ServiceState::Running);
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"type":"status","message":"service started","state":"running"}"#
        );
        assert!(event.is_terminal());
    }

    #[test]
    fn test_messages_with_quotes_survive_encoding() {
        let event = StreamEvent::log(r#"volume "data" created"#);
        let json = serde_json::to_string(&event).unwrap();
        let back: StreamEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
