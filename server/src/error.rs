//! Error types for room operations and inbound message decoding.
//!
//! Room errors that reach a client are rendered through their `Display`
//! text as the `message` of an outbound `error`. Protocol errors never
//! reach clients; they are logged and the offending frame is dropped.

use thiserror::Error;

/// Rejections from the room registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// The connection already hosts or has joined a room.
    #[error("You are already in a room.")]
    AlreadyInRoom,

    /// No live room has the requested code, or no code was given.
    #[error("Room not found.")]
    RoomNotFound,

    /// A host-only command came from someone other than the host.
    #[error("Only the host can load videos.")]
    NotHost,

    /// Every code in the code space is held by a live room.
    #[error("No room codes are available, try again later.")]
    NoCodesAvailable,
}

/// Failures while decoding an inbound text frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("malformed message: {0}")]
    Malformed(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_errors_render_client_facing_text() {
        assert_eq!(
            RoomError::AlreadyInRoom.to_string(),
            "You are already in a room."
        );
        assert_eq!(
            RoomError::RoomNotFound.to_string(),
            "Room not found."
        );
        assert_eq!(
            RoomError::NotHost.to_string(),
            "Only the host can load videos."
        );
        assert_eq!(
            RoomError::NoCodesAvailable.to_string(),
            "No room codes are available, try again later."
        );
    }
}
