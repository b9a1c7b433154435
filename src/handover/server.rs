//! Handover server run by the incumbent.
//!
//! Accepts control channel connections one at a time. A connection that
//! sends anything other than the exact token is dropped and the loop keeps
//! going. The first valid request gets the listener descriptor, after which
//! the endpoint is removed and the server stops for good: one handover per
//! process.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation

use std::os::fd::{AsFd, OwnedFd};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::time::timeout;

use crate::error::{HandoverError, Result};
use crate::fdpass;
use crate::handover::endpoint::ControlEndpoint;
use crate::handover::protocol::{self, MAX_REQUEST_LEN};

/// Control channel server holding the bound endpoint.
pub struct HandoverServer {
    listener: UnixListener,
    endpoint: Arc<ControlEndpoint>,
    io_timeout: Duration,
}

impl HandoverServer {
    /// Bind the control endpoint.
    pub fn bind(endpoint: Arc<ControlEndpoint>, io_timeout: Duration) -> Result<Self> {
        let listener = endpoint.bind()?;
        Ok(Self {
            listener,
            endpoint,
            io_timeout,
        })
    }

    /// Serve handover requests until one succeeds.
    ///
    /// `listener_fd` is the service's listening socket. Returns `Ok` once it
    /// has been transferred; the endpoint is gone by then. A failed transfer
    /// is returned as an error and leaves the endpoint in place for the
    /// caller to release.
    pub async fn run(self, listener_fd: OwnedFd) -> Result<()> {
        tracing::info!(
            socket = %self.endpoint.path().display(),
            "listening for handover requests"
        );

        loop {
            let (mut stream, _) = self.listener.accept().await?;

            if let Err(e) = self.authenticate(&mut stream).await {
                tracing::warn!(error = %e, "rejected handover request");
                continue;
            }

            tracing::info!("handover requested, transferring listener");
            match timeout(self.io_timeout, fdpass::send_fd(&stream, listener_fd.as_fd())).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "listener transfer failed");
                    return Err(e);
                }
                Err(_) => {
                    tracing::error!("listener transfer timed out");
                    return Err(HandoverError::Timeout("listener transfer"));
                }
            }

            drop(stream);
            drop(self.listener);
            self.endpoint.release();
            tracing::info!("listener handed over, retiring");
            return Ok(());
        }
    }

    /// Read one bounded request and check it is the token.
    async fn authenticate(&self, stream: &mut UnixStream) -> Result<()> {
        let mut buf = [0u8; MAX_REQUEST_LEN];
        let read = timeout(self.io_timeout, stream.read(&mut buf))
            .await
            .map_err(|_| HandoverError::Timeout("handover token read"))??;
        protocol::validate_token(&buf[..read])
    }
}
