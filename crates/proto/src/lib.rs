//! Rendezvous wire protocol
//!
//! Newline-terminated ASCII messages exchanged between workers, clients and the
//! dispatcher, plus the two-line job format clients send to a worker once dispatched.

pub mod control;
pub mod error;
pub mod job;

pub use control::{ControlMessage, DispatchReply, StrategyTag};
pub use error::ProtocolError;
pub use job::{JobKind, JobRequest};

/// Longest line accepted on any connection, terminator excluded
pub const MAX_LINE_LENGTH: usize = 1024;
