//! Docker Engine API client over an SSH tunnel
//!
//! Each API call opens its own SSH session, execs the bridge command, and
//! runs one HTTP/1.1 exchange over the resulting stream. The client is a
//! cheap handle (an `Arc` of the tunnel) and may be cloned freely; the pool
//! remains the owner of the underlying connection.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper::{header, Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;

use sv_core::error::TunnelError;

use crate::tunnel::SshTunnel;

/// Host header value for requests to the bridged UNIX socket
const DOCKER_HOST_HEADER: &str = "docker";

/// Docker Engine API client bound to one tunnel
#[derive(Debug, Clone)]
pub struct DockerClient {
    tunnel: Arc<SshTunnel>,
}

/// Subset of the daemon's `/version` response
#[derive(Debug, Clone, Deserialize)]
pub struct DockerVersion {
    /// Engine version string
    #[serde(rename = "Version")]
    pub version: String,
    /// Engine API version
    #[serde(rename = "ApiVersion")]
    pub api_version: String,
}

impl DockerClient {
    /// Create a client over an established tunnel
    pub fn new(tunnel: Arc<SshTunnel>) -> Self {
        Self { tunnel }
    }

    /// The tunnel this client rides on
    pub fn tunnel(&self) -> &Arc<SshTunnel> {
        &self.tunnel
    }

    /// Probe daemon liveness via `/_ping`
    pub async fn ping(&self) -> Result<(), TunnelError> {
        let (status, _body) = self.request(Method::GET, "/_ping").await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(TunnelError::Bridge(format!(
                "daemon ping returned {status}"
            )))
        }
    }

    /// Bounded-timeout liveness probe; `false` on error or timeout.
    ///
    /// Used by the pool to validate cached entries; failures invalidate the
    /// entry rather than surfacing to callers.
    pub async fn ping_with_timeout(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::debug!(target = %self.tunnel.target(), error = %e, "daemon ping failed");
                false
            }
            Err(_) => {
                tracing::debug!(
                    target = %self.tunnel.target(),
                    "daemon ping timed out after {timeout:?}"
                );
                false
            }
        }
    }

    /// Fetch daemon version information
    pub async fn version(&self) -> Result<DockerVersion, TunnelError> {
        let (status, body) = self.request(Method::GET, "/version").await?;
        if !status.is_success() {
            return Err(TunnelError::Bridge(format!(
                "daemon /version returned {status}"
            )));
        }
        serde_json::from_slice(&body)
            .map_err(|e| TunnelError::Bridge(format!("invalid /version response: {e}")))
    }

    /// One HTTP exchange over a fresh bridged session
    async fn request(
        &self,
        method: Method,
        path: &str,
    ) -> Result<(StatusCode, Bytes), TunnelError> {
        let stream = self.tunnel.bridge_stream().await?;
        let io = TokioIo::new(stream);

        let (mut sender, conn) = http1::handshake(io)
            .await
            .map_err(|e| TunnelError::Bridge(format!("http handshake: {e}")))?;

        // The connection future drives I/O for the in-flight request and
        // ends with the session.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "docker api connection closed");
            }
        });

        let req = Request::builder()
            .method(method)
            .uri(path)
            .header(header::HOST, DOCKER_HOST_HEADER)
            .body(Empty::<Bytes>::new())
            .map_err(|e| TunnelError::Bridge(format!("building request: {e}")))?;

        let res = sender
            .send_request(req)
            .await
            .map_err(|e| TunnelError::Bridge(format!("request failed: {e}")))?;

        let status = res.status();
        let body = res
            .into_body()
            .collect()
            .await
            .map_err(|e| TunnelError::Bridge(format!("reading response body: {e}")))?
            .to_bytes();

        Ok((status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_response_parsing() {
        let body = r#"{"Version":"26.1.4","ApiVersion":"1.45","Os":"linux"}"#;
        let version: DockerVersion = serde_json::from_str(body).unwrap();
        assert_eq!(version.version, "26.1.4");
        assert_eq!(version.api_version, "1.45");
    }
}
