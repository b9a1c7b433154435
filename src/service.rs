//! Service runner seam.
//!
//! The coordinator hands a ready listener to a [`Service`] and runs it until
//! it fails or is told to stop. [`FileService`] serves a directory over HTTP.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Something that serves connections from a listener.
pub trait Service {
    /// Serve `listener` until an error occurs or `shutdown` flips to `true`.
    ///
    /// After a stop request the service must stop accepting but may finish
    /// connections it already accepted.
    fn serve(
        &self,
        listener: TcpListener,
        shutdown: watch::Receiver<bool>,
    ) -> impl Future<Output = io::Result<()>> + Send;
}

/// Resolves once a stop has been requested or the sender is gone.
pub async fn stop_requested(mut shutdown: watch::Receiver<bool>) {
    loop {
        let stop = *shutdown.borrow_and_update();
        if stop {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Static file server rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileService {
    root: PathBuf,
}

impl FileService {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn router(&self) -> Router {
        Router::new()
            .fallback_service(ServeDir::new(&self.root))
            .layer(TraceLayer::new_for_http())
    }
}

impl Service for FileService {
    fn serve(
        &self,
        listener: TcpListener,
        shutdown: watch::Receiver<bool>,
    ) -> impl Future<Output = io::Result<()>> + Send {
        let app = self.router();
        let root = self.root.clone();
        async move {
            tracing::info!(
                addr = ?listener.local_addr().ok(),
                root = %root.display(),
                "serving files"
            );
            axum::serve(listener, app)
                .with_graceful_shutdown(stop_requested(shutdown))
                .await
        }
    }
}
