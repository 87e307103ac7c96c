//! Service orchestration for Stevedore
//!
//! Drives start/stop/restart of compose services on remote hosts: validates
//! the compose definition, resolves a pooled SSH client, runs the compose
//! engine, streams progress live, and keeps the persisted service state in
//! step with the real remote outcome.

pub mod compose;
pub mod engine;
pub mod operation;
pub mod service;

pub use compose::ComposeFile;
pub use engine::{ComposeCliEngine, ComposeEngine, ComposeOp, EngineStream};
pub use operation::ServiceOperation;
pub use service::ServiceOrchestrator;
