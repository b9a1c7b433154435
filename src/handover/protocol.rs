//! Handshake wire format.
//!
//! Client to server: the 4-byte ASCII token, nothing else.
//! Server to client: one message whose ancillary data carries the listener
//! descriptor (see [`crate::fdpass`]).
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation

use crate::error::{HandoverError, Result};

/// Token a successor writes to request the listener.
pub const HANDOVER_TOKEN: &[u8; 4] = b"ZERO";

/// Upper bound of a single handshake read on the server side.
pub const MAX_REQUEST_LEN: usize = 1024;

/// Accept only the exact token; trailing bytes are rejected too.
pub fn validate_token(request: &[u8]) -> Result<()> {
    if request == HANDOVER_TOKEN {
        Ok(())
    } else {
        Err(HandoverError::InvalidToken(request.len()))
    }
}
