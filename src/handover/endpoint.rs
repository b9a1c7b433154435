//! Control channel endpoint: the filesystem-visible rendezvous socket.
//!
//! At most one live process may be bound to the endpoint. A process only
//! removes the path if it bound it itself, so a successor never deletes its
//! predecessor's endpoint.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::net::UnixListener;

use crate::error::{HandoverError, Result};

/// Mode applied to the endpoint so an unrelated successor can connect.
const ENDPOINT_MODE: u32 = 0o777;

/// Control channel endpoint and whether this process owns it.
#[derive(Debug)]
pub struct ControlEndpoint {
    path: PathBuf,
    owned: AtomicBool,
}

impl ControlEndpoint {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            owned: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether anything exists at the endpoint path.
    pub fn exists(&self) -> bool {
        fs::symlink_metadata(&self.path).is_ok()
    }

    /// Whether this process bound the endpoint and has not released it.
    pub fn is_owned(&self) -> bool {
        self.owned.load(Ordering::SeqCst)
    }

    /// Bind the endpoint and open it to every user.
    ///
    /// An existing path is never removed first: if something is already
    /// there, the bind fails.
    pub fn bind(&self) -> Result<UnixListener> {
        let listener = UnixListener::bind(&self.path).map_err(|source| {
            HandoverError::EndpointBind {
                path: self.path.clone(),
                source,
            }
        })?;
        self.owned.store(true, Ordering::SeqCst);

        if let Err(source) = fs::set_permissions(&self.path, fs::Permissions::from_mode(ENDPOINT_MODE)) {
            self.release();
            return Err(HandoverError::EndpointBind {
                path: self.path.clone(),
                source,
            });
        }

        tracing::info!(socket = %self.path.display(), "control endpoint bound");
        Ok(listener)
    }

    /// Remove the endpoint if this process owns it. Returns whether a removal
    /// was attempted.
    pub fn release(&self) -> bool {
        if !self.owned.swap(false, Ordering::SeqCst) {
            return false;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::info!(socket = %self.path.display(), "control endpoint removed"),
            Err(e) => tracing::warn!(
                socket = %self.path.display(),
                error = %e,
                "failed to remove control endpoint"
            ),
        }
        true
    }

    /// Wait until the endpoint path no longer exists.
    ///
    /// Polls every `interval` plus a random delay of at most `jitter`.
    pub async fn wait_until_released(&self, interval: Duration, jitter: Duration) {
        while self.exists() {
            tracing::info!(
                socket = %self.path.display(),
                "waiting for predecessor to release control endpoint"
            );
            tokio::time::sleep(interval + random_jitter(jitter)).await;
        }
    }
}

fn random_jitter(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}
