//! sv-core: Core domain types, errors, and configuration for Stevedore
//!
//! This crate provides the shared vocabulary of the Stevedore ecosystem:
//! connection identity, service lifecycle states and transitions, stream
//! events, the repository collaborator traits, and the error taxonomy used
//! by the tunnel, pool, and orchestrator crates.

pub mod config;
pub mod error;
pub mod events;
pub mod naming;
pub mod repository;
pub mod time;
pub mod types;

pub use config::PoolConfig;
pub use error::{KeyError, OrchestrationError, PoolError, RepositoryError, TunnelError};
pub use events::StreamEvent;
pub use repository::{
    ComposeConfigRecord, PrivateKeyRecord, Repository, ServerRecord, ServiceRecord,
};
pub use types::{ClientKind, ConnectionId, ServiceOp, ServiceState, TransitionPlan};
