//! Process coordinator: acquires the listener for the resolved role, runs the
//! service, and races it against the handover chain.
//!
//! The handover chain waits for a predecessor's endpoint to disappear (only
//! when this process started as successor), binds the endpoint, and serves
//! one handover request. If the chain wins, the service stops accepting and
//! drains for the grace period before `run` returns. If the service wins,
//! its result is returned right away.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation

use std::net::TcpListener as StdTcpListener;
use std::os::fd::{AsFd, OwnedFd};
use std::sync::Arc;

use tokio::sync::watch;

use crate::config::HandoverConfig;
use crate::error::{HandoverError, Result};
use crate::handover::{request_handover, ControlEndpoint, HandoverServer};
use crate::role::Role;
use crate::service::Service;

/// How a successful [`Coordinator::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The listener went to a successor and the grace period has elapsed.
    HandedOver,
    /// The service returned on its own without an error.
    ServiceStopped,
}

/// Releases the control endpoint from outside the coordinator (signals).
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    endpoint: Arc<ControlEndpoint>,
}

impl ShutdownHandle {
    /// Remove the control endpoint if this process owns it.
    pub fn shutdown(&self) -> bool {
        self.endpoint.release()
    }
}

/// Runs one process generation of the service.
pub struct Coordinator<S> {
    config: HandoverConfig,
    endpoint: Arc<ControlEndpoint>,
    service: S,
}

impl<S: Service> Coordinator<S> {
    pub fn new(config: HandoverConfig, service: S) -> Self {
        let endpoint = Arc::new(ControlEndpoint::new(&config.socket_path));
        Self {
            config,
            endpoint,
            service,
        }
    }

    pub fn config(&self) -> &HandoverConfig {
        &self.config
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            endpoint: self.endpoint.clone(),
        }
    }

    /// Resolve the role, acquire the listener and serve until handover or
    /// service exit. The endpoint is released before returning, whatever the
    /// result.
    pub async fn run(&self) -> Result<Outcome> {
        let role = Role::resolve(&self.endpoint);
        tracing::info!(
            %role,
            socket = %self.endpoint.path().display(),
            "resolved process role"
        );

        let result = match self.acquire_listener(role).await {
            Ok(listener) => self.serve(role, listener).await,
            Err(e) => Err(e),
        };
        self.endpoint.release();
        result
    }

    async fn acquire_listener(&self, role: Role) -> Result<StdTcpListener> {
        match role {
            Role::Primary => {
                let addr = &self.config.listen_addr;
                let listener = StdTcpListener::bind(addr).map_err(|source| HandoverError::Bind {
                    addr: addr.clone(),
                    source,
                })?;
                tracing::info!(addr = ?listener.local_addr().ok(), "bound new listener");
                Ok(listener)
            }
            Role::Successor => {
                request_handover(&self.config.socket_path, self.config.io_timeout).await
            }
        }
    }

    async fn serve(&self, role: Role, listener: StdTcpListener) -> Result<Outcome> {
        // The handover server sends its own copy so the service can own the
        // listener outright.
        let handover_fd = listener.as_fd().try_clone_to_owned()?;
        listener.set_nonblocking(true)?;
        let listener = tokio::net::TcpListener::from_std(listener)?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let service = self.service.serve(listener, stop_rx);
        tokio::pin!(service);
        let handover = self.handover_chain(role, handover_fd);
        tokio::pin!(handover);

        tokio::select! {
            result = &mut service => {
                match result {
                    Ok(()) => {
                        tracing::info!("service stopped");
                        Ok(Outcome::ServiceStopped)
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "service failed");
                        Err(HandoverError::Service(e))
                    }
                }
            }
            result = &mut handover => {
                result?;
                let grace = self.config.grace_period;
                tracing::info!(?grace, "handover complete, draining connections");
                let _ = stop_tx.send(true);

                let drain = async {
                    if let Err(e) = (&mut service).await {
                        tracing::warn!(error = %e, "service error while draining");
                    }
                };
                let (_, drained) = tokio::join!(
                    tokio::time::sleep(grace),
                    tokio::time::timeout(grace, drain),
                );
                if drained.is_err() {
                    tracing::warn!("grace period elapsed with connections still open");
                }
                Ok(Outcome::HandedOver)
            }
        }
    }

    async fn handover_chain(&self, role: Role, listener_fd: OwnedFd) -> Result<()> {
        if role == Role::Successor {
            self.endpoint
                .wait_until_released(self.config.poll_interval, self.config.poll_jitter)
                .await;
        }
        let server = HandoverServer::bind(self.endpoint.clone(), self.config.io_timeout)?;
        server.run(listener_fd).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::stop_requested;
    use std::future::Future;
    use std::io;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    /// Writes its name to every connection and reports its address once.
    struct NameService {
        name: &'static str,
        addrs: mpsc::UnboundedSender<SocketAddr>,
    }

    impl Service for NameService {
        fn serve(
            &self,
            listener: TcpListener,
            shutdown: watch::Receiver<bool>,
        ) -> impl Future<Output = io::Result<()>> + Send {
            let name = self.name;
            let addrs = self.addrs.clone();
            async move {
                let _ = addrs.send(listener.local_addr()?);
                let stop = stop_requested(shutdown);
                tokio::pin!(stop);
                loop {
                    tokio::select! {
                        accepted = listener.accept() => {
                            let (mut stream, _) = accepted?;
                            let _ = stream.write_all(name.as_bytes()).await;
                        }
                        () = &mut stop => return Ok(()),
                    }
                }
            }
        }
    }

    /// Fails as soon as it is started.
    struct FailingService;

    impl Service for FailingService {
        fn serve(
            &self,
            _listener: TcpListener,
            _shutdown: watch::Receiver<bool>,
        ) -> impl Future<Output = io::Result<()>> + Send {
            async { Err(io::Error::new(io::ErrorKind::Other, "boom")) }
        }
    }

    fn test_config(dir: &tempfile::TempDir) -> HandoverConfig {
        HandoverConfig {
            socket_path: dir.path().join("handover.sock"),
            listen_addr: "127.0.0.1:0".to_string(),
            poll_interval: Duration::from_millis(20),
            poll_jitter: Duration::ZERO,
            grace_period: Duration::from_millis(400),
            io_timeout: Duration::from_secs(2),
        }
    }

    async fn wait_for_path(path: &std::path::Path) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !path.exists() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("endpoint appeared");
    }

    async fn wait_until_owned(handle: &ShutdownHandle) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !handle.endpoint.is_owned() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("endpoint owned");
    }

    async fn read_name(addr: SocketAddr) -> io::Result<String> {
        let mut stream = tokio::net::TcpStream::connect(addr).await?;
        let mut name = String::new();
        stream.read_to_string(&mut name).await?;
        Ok(name)
    }

    #[tokio::test]
    async fn test_primary_binds_listener_and_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let coordinator = Coordinator::new(config.clone(), NameService { name: "first", addrs: tx });
        let handle = coordinator.shutdown_handle();
        let task = tokio::spawn(async move { coordinator.run().await });

        let addr = rx.recv().await.unwrap();
        wait_until_owned(&handle).await;
        assert!(config.socket_path.exists());
        assert_eq!(read_name(addr).await.unwrap(), "first");

        assert!(handle.shutdown());
        assert!(!config.socket_path.exists());
        task.abort();
    }

    #[tokio::test]
    async fn test_handover_between_generations() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let first = Coordinator::new(config.clone(), NameService { name: "first", addrs: tx1 });
        let first_task = tokio::spawn(async move { first.run().await });
        let addr = rx1.recv().await.unwrap();
        wait_for_path(&config.socket_path).await;

        // Clients keep connecting throughout; none may be refused.
        let refused = Arc::new(AtomicUsize::new(0));
        let served = Arc::new(AtomicUsize::new(0));
        let clients = {
            let refused = refused.clone();
            let served = served.clone();
            tokio::spawn(async move {
                loop {
                    match read_name(addr).await {
                        Ok(_) => served.fetch_add(1, Ordering::SeqCst),
                        Err(_) => refused.fetch_add(1, Ordering::SeqCst),
                    };
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
        };

        let started = Instant::now();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let second = Coordinator::new(config.clone(), NameService { name: "second", addrs: tx2 });
        let second_handle = second.shutdown_handle();
        let second_task = tokio::spawn(async move { second.run().await });

        assert_eq!(rx2.recv().await.unwrap(), addr);

        let outcome = tokio::time::timeout(Duration::from_secs(5), first_task)
            .await
            .expect("first generation exited")
            .unwrap()
            .unwrap();
        assert_eq!(outcome, Outcome::HandedOver);
        assert!(started.elapsed() >= config.grace_period);

        // The new incumbent claims the endpoint once the old one is gone.
        wait_until_owned(&second_handle).await;
        assert!(config.socket_path.exists());
        assert_eq!(read_name(addr).await.unwrap(), "second");

        clients.abort();
        assert_eq!(refused.load(Ordering::SeqCst), 0);
        assert!(served.load(Ordering::SeqCst) > 0);

        second_handle.shutdown();
        second_task.abort();
    }

    #[tokio::test]
    async fn test_retiring_incumbent_stops_accepting_during_grace() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir);
        config.grace_period = Duration::from_secs(1);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let first = Coordinator::new(config.clone(), NameService { name: "first", addrs: tx });
        let handle = first.shutdown_handle();
        let first_task = tokio::spawn(async move { first.run().await });
        let addr = rx.recv().await.unwrap();
        wait_until_owned(&handle).await;

        let before = Instant::now();
        // Take the listener but never accept on it.
        let _taken = request_handover(&config.socket_path, config.io_timeout)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 16];
        let read = tokio::time::timeout(Duration::from_millis(300), stream.read(&mut buf)).await;
        assert!(read.is_err(), "old incumbent answered after handover");
        assert!(!first_task.is_finished());

        let outcome = tokio::time::timeout(Duration::from_secs(5), first_task)
            .await
            .expect("first generation exited")
            .unwrap()
            .unwrap();
        assert_eq!(outcome, Outcome::HandedOver);
        assert!(before.elapsed() >= config.grace_period);
        assert!(!config.socket_path.exists());
    }

    #[tokio::test]
    async fn test_failed_transfer_skips_grace_and_releases_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir);
        config.grace_period = Duration::from_secs(5);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let coordinator = Coordinator::new(config.clone(), NameService { name: "first", addrs: tx });
        let handle = coordinator.shutdown_handle();
        let task = tokio::spawn(async move { coordinator.run().await });
        rx.recv().await.unwrap();
        wait_until_owned(&handle).await;

        // No await between connect and hang-up, so the incumbent only sees
        // the token after the requester is gone.
        let started = Instant::now();
        {
            let mut requester = std::os::unix::net::UnixStream::connect(&config.socket_path).unwrap();
            std::io::Write::write_all(&mut requester, crate::handover::protocol::HANDOVER_TOKEN)
                .unwrap();
        }

        let result = tokio::time::timeout(Duration::from_secs(3), task)
            .await
            .expect("coordinator exited")
            .unwrap();
        assert!(matches!(result, Err(HandoverError::SendFd(_))));
        assert!(started.elapsed() < config.grace_period);
        assert!(!config.socket_path.exists());
        assert!(!handle.endpoint.is_owned());
    }

    #[tokio::test]
    async fn test_service_failure_is_returned_and_endpoint_released() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let coordinator = Coordinator::new(config.clone(), FailingService);

        let err = coordinator.run().await.unwrap_err();
        assert!(matches!(err, HandoverError::Service(_)));
        assert!(!config.socket_path.exists());
    }

    #[tokio::test]
    async fn test_second_primary_fails_to_bind() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir);
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        config.listen_addr = taken.local_addr().unwrap().to_string();

        let (tx, _rx) = mpsc::unbounded_channel();
        let coordinator = Coordinator::new(config, NameService { name: "late", addrs: tx });
        assert!(matches!(
            coordinator.run().await,
            Err(HandoverError::Bind { .. })
        ));
    }
}
