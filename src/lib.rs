//! zero-downtime library
//!
//! Hands a bound listening socket from a running server process to a newly
//! started one over a UNIX socket rendezvous, so the listener is never closed
//! while the two generations swap.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial library structure

// Core modules
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fdpass;
pub mod handover;
pub mod role;
pub mod service;
pub mod status;

pub use config::HandoverConfig;
pub use coordinator::{Coordinator, Outcome, ShutdownHandle};
pub use error::{HandoverError, Result};
pub use role::Role;
pub use service::{FileService, Service};
