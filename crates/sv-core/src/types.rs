//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::OrchestrationError;

/// Unique identifier for one logical tunnel/client binding
///
/// Deterministic per (team, server, service) triple; see [`crate::naming`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a new connection ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What kind of client a pooled connection carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    /// SSH tunnel carrying a Docker Engine API client
    DockerTunnel,
    /// Plain SSH connection without a Docker client
    SshOnly,
}

/// Lifecycle state of a managed service
///
/// Persisted by the external repository; mutated only by the orchestrator,
/// and only along the edges encoded in [`ServiceState::plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    /// Service is not running
    Stopped,
    /// Start operation in flight
    Starting,
    /// Service is running
    Running,
    /// Stop operation in flight
    Stopping,
    /// Restart operation in flight
    Restarting,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Stopped => write!(f, "stopped"),
            ServiceState::Starting => write!(f, "starting"),
            ServiceState::Running => write!(f, "running"),
            ServiceState::Stopping => write!(f, "stopping"),
            ServiceState::Restarting => write!(f, "restarting"),
        }
    }
}

/// A requested service operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceOp {
    /// Bring the compose project up
    Start,
    /// Take the compose project down
    Stop,
    /// Restart the compose project's containers
    Restart,
}

impl fmt::Display for ServiceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceOp::Start => write!(f, "start"),
            ServiceOp::Stop => write!(f, "stop"),
            ServiceOp::Restart => write!(f, "restart"),
        }
    }
}

/// The states an accepted operation moves through
///
/// `transitional` is persisted before any remote call; the terminal state is
/// `on_success` or `on_failure` depending on the remote outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    /// State persisted while the operation is in flight
    pub transitional: ServiceState,
    /// State persisted when the remote operation succeeds
    pub on_success: ServiceState,
    /// State persisted when the remote operation fails
    pub on_failure: ServiceState,
    /// Whether success stamps a new deployment timestamp
    pub stamps_deployment: bool,
}

impl ServiceState {
    /// Plan the state transitions for `op` from the current state.
    ///
    /// Returns `IllegalTransition` for any (state, op) pair outside the
    /// allowed edges; callers must reject such requests before any remote
    /// activity.
    pub fn plan(self, op: ServiceOp) -> Result<TransitionPlan, OrchestrationError> {
        match (self, op) {
            (ServiceState::Stopped, ServiceOp::Start) => Ok(TransitionPlan {
                transitional: ServiceState::Starting,
                on_success: ServiceState::Running,
                on_failure: ServiceState::Stopped,
                stamps_deployment: true,
            }),
            (ServiceState::Running, ServiceOp::Stop) => Ok(TransitionPlan {
                transitional: ServiceState::Stopping,
                on_success: ServiceState::Stopped,
                on_failure: ServiceState::Running,
                stamps_deployment: false,
            }),
            (ServiceState::Running, ServiceOp::Restart) => Ok(TransitionPlan {
                transitional: ServiceState::Restarting,
                on_success: ServiceState::Running,
                on_failure: ServiceState::Stopped,
                stamps_deployment: true,
            }),
            (from, op) => Err(OrchestrationError::IllegalTransition { from, op }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new("abc123");
        assert_eq!(format!("{}", id), "abc123");
        assert_eq!(id.as_str(), "abc123");
    }

    #[test]
    fn test_service_state_display() {
        assert_eq!(format!("{}", ServiceState::Stopped), "stopped");
        assert_eq!(format!("{}", ServiceState::Restarting), "restarting");
    }

    #[test]
    fn test_service_state_serde() {
        let json = serde_json::to_string(&ServiceState::Starting).unwrap();
        assert_eq!(json, r#""starting""#);
        let state: ServiceState = serde_json::from_str(r#""running""#).unwrap();
        assert_eq!(state, ServiceState::Running);
    }

    #[test]
    fn test_plan_start_from_stopped() {
        let plan = ServiceState::Stopped.plan(ServiceOp::Start).unwrap();
        assert_eq!(plan.transitional, ServiceState::Starting);
        assert_eq!(plan.on_success, ServiceState::Running);
        assert_eq!(plan.on_failure, ServiceState::Stopped);
        assert!(plan.stamps_deployment);
    }

    #[test]
    fn test_plan_stop_from_running() {
        let plan = ServiceState::Running.plan(ServiceOp::Stop).unwrap();
        assert_eq!(plan.transitional, ServiceState::Stopping);
        assert_eq!(plan.on_success, ServiceState::Stopped);
        assert_eq!(plan.on_failure, ServiceState::Running);
        assert!(!plan.stamps_deployment);
    }

    #[test]
    fn test_plan_restart_from_running() {
        let plan = ServiceState::Running.plan(ServiceOp::Restart).unwrap();
        assert_eq!(plan.transitional, ServiceState::Restarting);
        assert_eq!(plan.on_success, ServiceState::Running);
        assert_eq!(plan.on_failure, ServiceState::Stopped);
        assert!(plan.stamps_deployment);
    }

    #[test]
    fn test_plan_rejects_every_illegal_pair() {
        let states = [
            ServiceState::Stopped,
            ServiceState::Starting,
            ServiceState::Running,
            ServiceState::Stopping,
            ServiceState::Restarting,
        ];
        let ops = [ServiceOp::Start, ServiceOp::Stop, ServiceOp::Restart];

        for state in states {
            for op in ops {
                let legal = matches!(
                    (state, op),
                    (ServiceState::Stopped, ServiceOp::Start)
                        | (ServiceState::Running, ServiceOp::Stop)
                        | (ServiceState::Running, ServiceOp::Restart)
                );
                assert_eq!(state.plan(op).is_ok(), legal, "{state} {op}");
            }
        }
    }

    #[test]
    fn test_illegal_transition_reports_state_and_op() {
        let err = ServiceState::Starting.plan(ServiceOp::Start).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("starting"), "{msg}");
        assert!(msg.contains("start"), "{msg}");
    }
}
