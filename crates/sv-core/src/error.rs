//! Error taxonomy for Stevedore
//!
//! Errors are grouped by concern rather than collapsed into one enum:
//! credential errors are permanent and never retried, transport errors are
//! transient (the next pool lookup redials), pool-state errors are fatal for
//! the call, and orchestration errors surface through the event stream and
//! the persisted service state.

use std::time::Duration;
use thiserror::Error;

use crate::types::{ServiceOp, ServiceState};

/// Credential errors: bad key material, never retried
#[derive(Debug, Error)]
pub enum KeyError {
    /// The bytes are not parseable PEM
    #[error("invalid PEM data: {0}")]
    BadPem(String),

    /// The PEM header names a key type we do not support
    #[error("unsupported key type '{kind}'")]
    UnsupportedKeyType { kind: String },

    /// The key decoded but no SSH signer could be built from it
    #[error("failed to build signer from key: {0}")]
    Signer(String),
}

/// Transport errors: SSH dial, session, and bridge failures
///
/// Transient by classification. The pool performs no internal retry; a
/// failed entry is torn down and the next lookup dials fresh.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// Host specifier could not be parsed
    #[error("invalid host specifier '{spec}': {reason}")]
    InvalidHostSpec { spec: String, reason: String },

    /// Host specifier embeds a password or requests a non-ssh scheme
    #[error("host specifier '{spec}' implies password or non-ssh auth; key auth over ssh is required")]
    AuthSchemeRejected { spec: String },

    /// TCP/SSH dial did not complete within the bound
    #[error("connection to {addr} timed out after {timeout:?}")]
    DialTimeout { addr: String, timeout: Duration },

    /// TCP/SSH dial failed
    #[error("failed to dial {addr}: {reason}")]
    Dial { addr: String, reason: String },

    /// Server rejected our public key
    #[error("public key authentication rejected for user '{user}'")]
    AuthRejected { user: String },

    /// Opening an SSH session channel failed
    #[error("failed to open SSH session: {0}")]
    Session(String),

    /// The remote bridge command or the stream over it failed
    #[error("docker bridge failed: {0}")]
    Bridge(String),
}

/// Pool-state and lookup errors
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has been closed; no further dialing happens
    #[error("connection pool is closed")]
    Closed,

    /// Credential failure while building a connection
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Transport failure while building or using a connection
    #[error(transparent)]
    Tunnel(#[from] TunnelError),
}

/// Errors from the external repository collaborator
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Record does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Underlying storage failed
    #[error("storage error: {0}")]
    Storage(String),
}

/// Orchestration errors
///
/// `Clone` so a terminal error can both close the event stream and remain
/// readable through the operation handle's final-error accessor.
#[derive(Debug, Clone, Error)]
pub enum OrchestrationError {
    /// The requested operation is not legal from the current state
    #[error("cannot {op} a service that is {from}")]
    IllegalTransition { from: ServiceState, op: ServiceOp },

    /// Repository read failed
    #[error("repository error: {0}")]
    Repository(String),

    /// Compose definition failed to parse or validate
    #[error("invalid compose definition: {0}")]
    ComposeInvalid(String),

    /// Resolving a pooled connection failed
    #[error("connection pool error: {0}")]
    Pool(String),

    /// The compose engine reported a failure
    #[error("compose engine error: {0}")]
    Engine(String),

    /// The engine stream ended without a terminal signal
    #[error("operation interrupted: {0}")]
    Interrupted(String),

    /// Persisting the service state failed
    #[error("failed to persist service state: {0}")]
    StatePersist(String),
}

impl From<RepositoryError> for OrchestrationError {
    fn from(err: RepositoryError) -> Self {
        OrchestrationError::Repository(err.to_string())
    }
}

impl From<PoolError> for OrchestrationError {
    fn from(err: PoolError) -> Self {
        OrchestrationError::Pool(err.to_string())
    }
}
