//! Pooled clients and cache entries

use std::sync::Arc;

use sv_core::types::ClientKind;
use tokio::time::Instant;
use sv_tunnel::{DockerClient, SshTunnel};

/// The client a pool entry hands out
///
/// A tagged variant rather than a pair of optional fields: an entry is
/// either a Docker client riding a tunnel or a bare SSH connection, and no
/// other combination is representable. Cloning is cheap (`Arc` inside);
/// the pool stays the owner of the underlying connection.
#[derive(Debug, Clone)]
pub enum PooledClient {
    /// SSH tunnel carrying a Docker Engine API client
    Docker(DockerClient),
    /// Plain SSH connection, no Docker client
    Ssh(Arc<SshTunnel>),
}

impl PooledClient {
    /// Which kind of client this is
    pub fn kind(&self) -> ClientKind {
        match self {
            PooledClient::Docker(_) => ClientKind::DockerTunnel,
            PooledClient::Ssh(_) => ClientKind::SshOnly,
        }
    }

    /// The underlying SSH tunnel
    pub fn tunnel(&self) -> &Arc<SshTunnel> {
        match self {
            PooledClient::Docker(client) => client.tunnel(),
            PooledClient::Ssh(tunnel) => tunnel,
        }
    }

    /// The Docker client, if this entry carries one
    pub fn docker(&self) -> Option<&DockerClient> {
        match self {
            PooledClient::Docker(client) => Some(client),
            PooledClient::Ssh(_) => None,
        }
    }
}

/// One cache slot: a client plus its usage timestamps
///
/// Entries are replaced, not mutated, on lifetime expiry; `generation`
/// identifies one incarnation so racing lookups can tell whether the slot
/// they examined under the lock is still the one in the map.
#[derive(Debug)]
pub(crate) struct PoolEntry<C> {
    /// The live client
    pub client: C,
    /// Incarnation marker, unique per constructed entry
    pub generation: u64,
    /// When this incarnation was dialed (reset on transparent replace)
    pub created_at: Instant,
    /// Last successful hand-out
    pub last_used: Instant,
}

impl<C> PoolEntry<C> {
    pub fn new(client: C, generation: u64) -> Self {
        let now = Instant::now();
        Self {
            client,
            generation,
            created_at: now,
            last_used: now,
        }
    }
}
