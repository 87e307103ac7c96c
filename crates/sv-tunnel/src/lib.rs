//! sv-tunnel: SSH tunnel transport for the Docker Engine API
//!
//! A remote Docker daemon with no exposed TCP endpoint is reachable only
//! through SSH. This crate establishes one authenticated SSH connection per
//! target and turns it into an HTTP transport: each logical Docker API call
//! opens its own SSH session, execs a remote bridge command that pipes bytes
//! to the daemon's UNIX socket, and speaks HTTP/1.1 over the resulting
//! duplex stream. One SSH connection therefore serves many concurrent API
//! calls.

pub mod auth;
pub mod docker;
pub mod hostspec;
pub mod tunnel;

pub use auth::{detect_key_format, load_keypair, KeyFormat};
pub use docker::{DockerClient, DockerVersion};
pub use hostspec::HostSpec;
pub use tunnel::SshTunnel;
