//! Handover client run by a successor at startup.
//!
//! Any failure here is fatal to startup. The successor never falls back to
//! binding a fresh listener, which would duplicate a live one.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation

use std::io::ErrorKind;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::error::{HandoverError, Result};
use crate::fdpass;
use crate::handover::protocol::HANDOVER_TOKEN;

/// Ask the incumbent at `socket_path` for its listener.
///
/// Each step (connect, token write, descriptor receive) is bounded by
/// `io_timeout`.
pub async fn request_handover(socket_path: &Path, io_timeout: Duration) -> Result<TcpListener> {
    let mut stream = timeout(io_timeout, UnixStream::connect(socket_path))
        .await
        .map_err(|_| HandoverError::Timeout("control endpoint connect"))?
        .map_err(|source| match source.kind() {
            ErrorKind::ConnectionRefused => HandoverError::StaleEndpoint(socket_path.to_path_buf()),
            _ => HandoverError::Connect {
                path: socket_path.to_path_buf(),
                source,
            },
        })?;
    tracing::info!(socket = %socket_path.display(), "connected to incumbent, requesting listener");

    timeout(io_timeout, stream.write_all(HANDOVER_TOKEN))
        .await
        .map_err(|_| HandoverError::Timeout("handover token write"))??;

    let fd = timeout(io_timeout, fdpass::recv_fd(&stream))
        .await
        .map_err(|_| HandoverError::Timeout("listener receive"))??;

    let listener = fdpass::listener_from_fd(fd)?;
    tracing::info!(addr = ?listener.local_addr().ok(), "received listener from incumbent");
    Ok(listener)
}
