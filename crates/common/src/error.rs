//! Common error types for Rendezvous
//!
//! This module defines the error type shared by the dispatcher, workers and clients.
//! Protocol violations are kept distinct from I/O so callers can drop a peer silently
//! on the former and log the latter.

use rendezvous_proto::ProtocolError;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Main error type for Rendezvous
#[derive(Error, Debug)]
pub enum RendezvousError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unexpected protocol lines
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Line exceeded the configured maximum length
    #[error("Line too long")]
    LineTooLong,

    /// Listening socket could not be bound
    #[error("Failed to bind {addr} after {attempts} attempts: {source}")]
    Bind {
        addr: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    /// Connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// No idle worker in the requested pool
    #[error("No server available")]
    NoServer,

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LinesCodecError> for RendezvousError {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::MaxLineLengthExceeded => RendezvousError::LineTooLong,
            LinesCodecError::Io(err) => RendezvousError::Io(err),
        }
    }
}

impl RendezvousError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        RendezvousError::Config(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        RendezvousError::Connection(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        RendezvousError::Internal(msg.into())
    }

    /// Whether the peer broke the protocol rather than the transport failing
    pub fn is_protocol(&self) -> bool {
        matches!(self, RendezvousError::Protocol(_) | RendezvousError::LineTooLong)
    }
}

/// Result type alias for Rendezvous operations
pub type Result<T> = std::result::Result<T, RendezvousError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_conversion() {
        let err: RendezvousError = LinesCodecError::MaxLineLengthExceeded.into();
        assert!(err.is_protocol());

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: RendezvousError = LinesCodecError::Io(io).into();
        assert!(matches!(err, RendezvousError::Io(_)));
        assert!(!err.is_protocol());
    }

    #[test]
    fn test_bind_error_message() {
        let err = RendezvousError::Bind {
            addr: "0.0.0.0:6789".to_string(),
            attempts: 5,
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to bind 0.0.0.0:6789 after 5 attempts: in use"
        );
    }
}
