//! Role resolution at startup.
//!
//! A process is primary when no control endpoint exists, successor otherwise.
//! The check is existence-based and therefore racy: two processes starting
//! together with no endpoint both resolve to primary and one of them fails
//! to bind. That failure is fatal; nothing here retries.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation

use std::fmt;

use crate::handover::ControlEndpoint;

/// Which side of the handover this process starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// No predecessor: bind the listener fresh.
    Primary,
    /// A predecessor is serving: ask it for its listener.
    Successor,
}

impl Role {
    /// Check the control endpoint once and decide the role.
    pub fn resolve(endpoint: &ControlEndpoint) -> Self {
        if endpoint.exists() {
            Role::Successor
        } else {
            Role::Primary
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Primary => "primary",
            Role::Successor => "successor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
