//! Errors raised by the handover protocol.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while acquiring, serving or handing over the listener.
#[derive(Error, Debug)]
pub enum HandoverError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to bind control endpoint {}: {source}", .path.display())]
    EndpointBind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to connect to control endpoint {}: {source}", .path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Control endpoint {} exists but nobody is listening (remove it if no incumbent is running)", .0.display())]
    StaleEndpoint(PathBuf),

    #[error("Timed out during {0}")]
    Timeout(&'static str),

    #[error("Failed to send listener descriptor: {0}")]
    SendFd(#[source] io::Error),

    #[error("Failed to receive listener descriptor: {0}")]
    RecvFd(#[source] io::Error),

    #[error("Handover message carried no descriptor")]
    NoDescriptor,

    #[error("Handover control message was truncated")]
    TruncatedControl,

    #[error("Received descriptor is not a listening socket")]
    NotListening,

    #[error("Invalid handover token ({0} bytes)")]
    InvalidToken(usize),

    #[error("Control channel closed before a descriptor arrived")]
    ChannelClosed,

    #[error("Service error: {0}")]
    Service(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, HandoverError>;
