//! Dialing new connections on behalf of the pool

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sv_core::error::PoolError;
use sv_core::types::{ClientKind, ConnectionId};
use sv_tunnel::{load_keypair, DockerClient, HostSpec, SshTunnel};

use crate::entry::PooledClient;

/// Everything needed to establish one connection
#[derive(Clone)]
pub struct DialSpec {
    /// Stable identity of the connection in the pool
    pub id: ConnectionId,
    /// Target host, `[ssh://][user@]host[:port]`
    pub host: String,
    /// PEM-encoded private key used for authentication
    pub key_pem: Vec<u8>,
    /// Whether to layer a Docker client on the tunnel
    pub kind: ClientKind,
}

impl fmt::Debug for DialSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialSpec")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("key_pem", &"<redacted>")
            .field("kind", &self.kind)
            .finish()
    }
}

/// How the pool turns a [`DialSpec`] into a live client
///
/// Split out as a trait so the pool's caching and expiry logic can be
/// exercised against stub clients without a reachable SSH host.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    type Client: Clone + Send + Sync + 'static;

    /// Establish a fresh connection
    async fn dial(&self, spec: &DialSpec) -> Result<Self::Client, PoolError>;

    /// Check that an existing client is still usable
    async fn probe(&self, client: &Self::Client) -> bool;

    /// Close a client that is being dropped from the pool
    async fn teardown(&self, client: Self::Client);
}

/// Production factory: SSH tunnels, optionally carrying a Docker client
#[derive(Debug, Clone)]
pub struct TunnelFactory {
    dial_timeout: Duration,
    probe_timeout: Duration,
}

impl TunnelFactory {
    pub fn new(dial_timeout: Duration, probe_timeout: Duration) -> Self {
        Self {
            dial_timeout,
            probe_timeout,
        }
    }
}

#[async_trait]
impl ConnectionFactory for TunnelFactory {
    type Client = PooledClient;

    async fn dial(&self, spec: &DialSpec) -> Result<Self::Client, PoolError> {
        let hostspec = HostSpec::parse(&spec.host)?;
        let keypair = load_keypair(&spec.key_pem)?;
        let tunnel = SshTunnel::connect(&hostspec, keypair, self.dial_timeout).await?;
        let tunnel = Arc::new(tunnel);
        Ok(match spec.kind {
            ClientKind::DockerTunnel => PooledClient::Docker(DockerClient::new(tunnel)),
            ClientKind::SshOnly => PooledClient::Ssh(tunnel),
        })
    }

    async fn probe(&self, client: &Self::Client) -> bool {
        match client {
            // A Docker entry is live when the engine answers a ping.
            PooledClient::Docker(docker) => docker.ping_with_timeout(self.probe_timeout).await,
            // A bare SSH entry has no cheap liveness check beyond the
            // session being open; presume alive and let the next use fail.
            PooledClient::Ssh(_) => true,
        }
    }

    async fn teardown(&self, client: Self::Client) {
        if let Err(err) = client.tunnel().close().await {
            tracing::debug!(error = %err, "error closing tunnel during teardown");
        }
    }
}
