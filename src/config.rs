//! Handover configuration.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation

use std::path::PathBuf;
use std::time::Duration;

/// Default control channel endpoint.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/zero-downtime.sock";

/// Default service bind address.
pub const DEFAULT_LISTEN_ADDR: &str = "localhost:9090";

/// Default readiness-wait poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default upper bound of the random delay added to each poll.
pub const DEFAULT_POLL_JITTER: Duration = Duration::from_millis(250);

/// Default drain window after a successful handoff.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Default timeout for each handshake step (connect, read, write, receive).
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings shared by both roles of the handover protocol.
#[derive(Debug, Clone)]
pub struct HandoverConfig {
    /// Path of the control channel endpoint (UNIX socket)
    pub socket_path: PathBuf,
    /// host:port the service listens on when this process is primary
    pub listen_addr: String,
    /// Base interval between checks for the predecessor's endpoint
    pub poll_interval: Duration,
    /// Max random delay added on top of `poll_interval` (zero disables)
    pub poll_jitter: Duration,
    /// How long a retiring incumbent drains before exiting
    pub grace_period: Duration,
    /// Timeout applied to each handshake step
    pub io_timeout: Duration,
}

impl Default for HandoverConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_jitter: DEFAULT_POLL_JITTER,
            grace_period: DEFAULT_GRACE_PERIOD,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

impl HandoverConfig {
    /// Config with the given endpoint and bind address, defaults elsewhere.
    pub fn new(socket_path: impl Into<PathBuf>, listen_addr: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
            listen_addr: listen_addr.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_timing() {
        let config = HandoverConfig::default();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/zero-downtime.sock"));
        assert_eq!(config.listen_addr, "localhost:9090");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.grace_period, Duration::from_secs(5));
    }

    #[test]
    fn test_new_keeps_timing_defaults() {
        let config = HandoverConfig::new("/run/app.sock", "0.0.0.0:8080");
        assert_eq!(config.socket_path, PathBuf::from("/run/app.sock"));
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.io_timeout, DEFAULT_IO_TIMEOUT);
    }
}
