//! Payload protocol between a client and the worker it was handed.
//!
//! The client sends two lines, the job kind number and its argument, then
//! reads the result until the worker closes the connection.

use crate::error::ProtocolError;
use std::fmt;

/// Work a worker knows how to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// List the entries of a directory
    ListDirectory,

    /// Return the contents of a text file
    ReadFile,

    /// Busy the worker for a number of time units
    Compute,

    /// Emit a number of frames, one per frame interval
    Stream,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::ListDirectory,
        JobKind::ReadFile,
        JobKind::Compute,
        JobKind::Stream,
    ];

    /// Number used on the wire and in the client menu
    pub fn number(&self) -> u8 {
        match self {
            JobKind::ListDirectory => 1,
            JobKind::ReadFile => 2,
            JobKind::Compute => 3,
            JobKind::Stream => 4,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        JobKind::ALL.into_iter().find(|kind| kind.number() == number)
    }

    /// Parse the first job line. `Ok(None)` is a well-formed but unknown kind.
    pub fn parse_line(line: &str) -> Result<Option<Self>, ProtocolError> {
        let trimmed = line.trim();
        let number: i64 = trimmed
            .parse()
            .map_err(|_| ProtocolError::InvalidJobKind(trimmed.to_string()))?;
        Ok(u8::try_from(number).ok().and_then(JobKind::from_number))
    }

    pub fn description(&self) -> &'static str {
        match self {
            JobKind::ListDirectory => "Directory listing",
            JobKind::ReadFile => "File transfer",
            JobKind::Compute => "Computation",
            JobKind::Stream => "Video streaming",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// One job as sent by a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub kind: JobKind,
    pub argument: String,
}

impl JobRequest {
    pub fn new(kind: JobKind, argument: impl Into<String>) -> Self {
        Self {
            kind,
            argument: argument.into(),
        }
    }

    /// The two wire lines, without terminators
    pub fn lines(&self) -> [String; 2] {
        [self.kind.number().to_string(), self.argument.clone()]
    }
}
