//! Protocol-level errors

use thiserror::Error;

/// A line that does not form a valid protocol message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Nothing but whitespace on the line
    #[error("empty line")]
    Empty,

    /// First token is not a known command
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Command has the wrong number of tokens
    #[error("{command} expects {expected} tokens, got {actual}")]
    Arity {
        command: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Port is not a positive 16-bit integer
    #[error("invalid port: {0}")]
    InvalidPort(String),

    /// Tag is not a known strategy identifier
    #[error("unknown strategy tag: {0}")]
    UnknownTag(String),

    /// Reply line from the dispatcher is not understood
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// Job kind is not a number
    #[error("invalid job kind: {0}")]
    InvalidJobKind(String),
}
