//! SSH tunnel to a remote Docker host
//!
//! One `SshTunnel` is one authenticated TCP+SSH connection. Logical calls
//! (Docker API requests, compose invocations) each open their own SSH
//! session channel on it, so a single connection serves many concurrent
//! calls. SSH sessions have no deadline primitive; callers bound their I/O
//! with `tokio::time::timeout`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Config, Handle, Msg};
use russh::{Channel, ChannelStream, Disconnect};
use russh_keys::key::{KeyPair, PublicKey};
use tokio::sync::Mutex;

use sv_core::error::TunnelError;

use crate::hostspec::HostSpec;

/// Remote command bridging an SSH session to the Docker daemon's UNIX socket
const BRIDGE_COMMAND: &str = "docker system dial-stdio";

/// An authenticated SSH connection to one remote host
pub struct SshTunnel {
    /// SSH client handle; locked only while opening a channel
    handle: Mutex<Handle<TunnelHandler>>,
    /// `user@host:port`, for logs and errors
    target: String,
}

impl SshTunnel {
    /// Establish a TCP+SSH connection and authenticate with the given key.
    ///
    /// The whole dial (TCP connect, key exchange, auth) is bounded by
    /// `dial_timeout`. Key auth only; the host specifier has already
    /// rejected password forms.
    pub async fn connect(
        spec: &HostSpec,
        key: KeyPair,
        dial_timeout: Duration,
    ) -> Result<Self, TunnelError> {
        let config = Arc::new(Config::default());
        let target = spec.to_string();

        tracing::debug!(target = %target, "dialing SSH");
        let mut handle = tokio::time::timeout(
            dial_timeout,
            client::connect(config, spec.addr(), TunnelHandler),
        )
        .await
        .map_err(|_| TunnelError::DialTimeout {
            addr: target.clone(),
            timeout: dial_timeout,
        })?
        .map_err(|e| TunnelError::Dial {
            addr: target.clone(),
            reason: e.to_string(),
        })?;

        let authenticated = handle
            .authenticate_publickey(&spec.user, Arc::new(key))
            .await
            .map_err(|e| TunnelError::Dial {
                addr: target.clone(),
                reason: format!("authentication error: {e}"),
            })?;

        if !authenticated {
            return Err(TunnelError::AuthRejected {
                user: spec.user.clone(),
            });
        }

        tracing::debug!(target = %target, "SSH tunnel established");
        Ok(Self {
            handle: Mutex::new(handle),
            target,
        })
    }

    /// `user@host:port` of the remote end
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Open a fresh SSH session channel.
    ///
    /// The handle lock is held only for the channel-open exchange; sessions
    /// on one tunnel interleave freely after that.
    pub async fn open_session(&self) -> Result<Channel<Msg>, TunnelError> {
        let mut handle = self.handle.lock().await;
        handle
            .channel_open_session()
            .await
            .map_err(|e| TunnelError::Session(format!("{}: {e}", self.target)))
    }

    /// Open a duplex byte stream to the remote Docker daemon.
    ///
    /// Execs the bridge command on a fresh session; the returned stream is
    /// the transport for one HTTP exchange with the Engine API.
    pub async fn bridge_stream(&self) -> Result<ChannelStream<Msg>, TunnelError> {
        let channel = self.open_session().await?;
        channel
            .exec(true, BRIDGE_COMMAND)
            .await
            .map_err(|e| TunnelError::Bridge(format!("{}: {e}", self.target)))?;
        Ok(channel.into_stream())
    }

    /// Disconnect the SSH connection.
    ///
    /// In-flight sessions fail with transport errors; the pool treats that
    /// as a signal to redial on next use.
    pub async fn close(&self) -> Result<(), TunnelError> {
        tracing::debug!(target = %self.target, "closing SSH tunnel");
        let mut handle = self.handle.lock().await;
        handle
            .disconnect(Disconnect::ByApplication, "closing", "en")
            .await
            .map_err(|e| TunnelError::Session(format!("{}: {e}", self.target)))
    }
}

impl std::fmt::Debug for SshTunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTunnel")
            .field("target", &self.target)
            .finish()
    }
}

/// Minimal russh client handler.
///
/// The host is addressed by an operator-supplied specifier and authenticated
/// by possession of the account's private key; host-key pinning is owned by
/// the external server inventory, so the key is accepted here.
struct TunnelHandler;

#[async_trait]
impl client::Handler for TunnelHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!(
            fingerprint = %server_public_key.fingerprint(),
            "accepting server host key"
        );
        Ok(true)
    }
}
