//! Unified error handling for roulette-signal.
//!
//! Centralizes the error hierarchy used across event handlers, with
//! ack-reply generation and metric labeling, mirroring the command-error
//! conventions used throughout the handler layer.

use thiserror::Error;

/// Errors visible to the client via an ack reply. Never terminates the
/// connection by itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("bad peer")]
    BadPeer,

    #[error("bad ids")]
    BadIds,

    #[error("busy")]
    Busy,

    #[error("peer offline")]
    PeerOffline,

    #[error("peer busy")]
    PeerBusy,

    #[error("initiator busy")]
    InitiatorBusy,

    #[error("room full")]
    RoomFull,

    #[error("invalid userId")]
    InvalidUserId,

    #[error("invalid to")]
    InvalidTo,

    #[error("not friends")]
    NotFriends,

    #[error("duplicate request")]
    DuplicateRequest,

    #[error("bad payload")]
    BadPayload,
}

impl ClientError {
    /// Static error code string, used both for the ack `error` field and
    /// for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::BadPeer => "bad_peer",
            Self::BadIds => "bad_ids",
            Self::Busy => "busy",
            Self::PeerOffline => "peer_offline",
            Self::PeerBusy => "peer_busy",
            Self::InitiatorBusy => "initiator_busy",
            Self::RoomFull => "room_full",
            Self::InvalidUserId => "invalid_userId",
            Self::InvalidTo => "invalid_to",
            Self::NotFriends => "not_friends",
            Self::DuplicateRequest => "duplicate_request",
            Self::BadPayload => "bad_payload",
        }
    }
}

/// Result type for event handlers.
pub type HandlerResult<T = ()> = Result<T, ClientError>;

/// Errors that can occur while a collaborator (user directory, offline
/// mailbox, media-server token minting, queue store) is reached over the
/// network. Always non-fatal: callers degrade gracefully and log.
#[derive(Debug, Error)]
pub enum CollabError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    BadResponse(String),

    #[error("collaborator not configured")]
    NotConfigured,
}

/// Errors that abort startup before the listener is bound.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ClientError::PeerBusy.error_code(), "peer_busy");
        assert_eq!(ClientError::BadPayload.error_code(), "bad_payload");
        assert_eq!(ClientError::RoomFull.error_code(), "room_full");
    }
}
