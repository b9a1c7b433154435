//! Incumbent status check for the `status` subcommand.
//!
//! The check connects and hangs up without sending the token, so the
//! incumbent logs it as a rejected handover request and keeps serving.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation

use std::io::ErrorKind;
use std::os::unix::net::UnixStream;
use std::path::Path;

use serde::Serialize;

/// What the check found at the control endpoint.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    /// Endpoint path that was checked
    pub socket: String,
    /// Something exists at the path
    pub endpoint_exists: bool,
    /// An incumbent accepted the status connection
    pub accepting: bool,
    /// Connect error when the endpoint exists but refused
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusReport {
    pub fn is_running(&self) -> bool {
        self.accepting
    }
}

/// Check the control endpoint at `socket_path`.
pub fn inspect(socket_path: &Path) -> StatusReport {
    let socket = socket_path.display().to_string();
    if std::fs::symlink_metadata(socket_path).is_err() {
        return StatusReport {
            socket,
            endpoint_exists: false,
            accepting: false,
            error: None,
        };
    }

    match UnixStream::connect(socket_path) {
        Ok(_) => StatusReport {
            socket,
            endpoint_exists: true,
            accepting: true,
            error: None,
        },
        Err(e) => {
            let error = if e.kind() == ErrorKind::ConnectionRefused {
                "stale endpoint: nothing is listening".to_string()
            } else {
                e.to_string()
            };
            StatusReport {
                socket,
                endpoint_exists: true,
                accepting: false,
                error: Some(error),
            }
        }
    }
}
