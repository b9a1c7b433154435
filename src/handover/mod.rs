//! Control channel: the UNIX socket rendezvous between an incumbent and its
//! successor.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial module structure

pub mod client;
pub mod endpoint;
pub mod protocol;
pub mod server;

pub use client::request_handover;
pub use endpoint::ControlEndpoint;
pub use server::HandoverServer;
