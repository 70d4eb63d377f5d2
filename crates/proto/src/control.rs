//! Dispatcher control messages
//!
//! | Direction | Line |
//! |---|---|
//! | worker → dispatcher | `JOIN <port> <tag>` |
//! | worker → dispatcher | `FREE`, `GOODBYE` |
//! | client → dispatcher | `REQUEST <tag>` |
//! | dispatcher → worker | `OK` |
//! | dispatcher → client | `<port>` or `NO_SERVER` |

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const JOIN: &str = "JOIN";
const REQUEST: &str = "REQUEST";
const FREE: &str = "FREE";
const GOODBYE: &str = "GOODBYE";
const OK: &str = "OK";
const NO_SERVER: &str = "NO_SERVER";

/// Strategy class a worker advertises and a client asks for.
///
/// Each tag is its own selection pool: a `REQUEST static` is only ever matched
/// against workers that joined with `static`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyTag {
    /// Round-robin over idle workers
    Static,

    /// Least-loaded idle worker, longest idle wins ties
    Dynamic,
}

impl StrategyTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyTag::Static => "static",
            StrategyTag::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for StrategyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyTag {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(StrategyTag::Static),
            "dynamic" => Ok(StrategyTag::Dynamic),
            other => Err(ProtocolError::UnknownTag(other.to_string())),
        }
    }
}

/// A line sent to the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Worker registration, first line of a control connection
    Join { port: u16, tag: StrategyTag },

    /// Client asking for a worker, first and only line of its connection
    Request { tag: StrategyTag },

    /// Worker finished its outstanding request
    Free,

    /// Worker leaves the pool
    Goodbye,
}

impl FromStr for ControlMessage {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let command = *tokens.first().ok_or(ProtocolError::Empty)?;

        let expect = |command: &'static str, expected: usize| {
            if tokens.len() == expected {
                Ok(())
            } else {
                Err(ProtocolError::Arity {
                    command,
                    expected,
                    actual: tokens.len(),
                })
            }
        };

        match command {
            JOIN => {
                expect(JOIN, 3)?;
                let port = parse_port(tokens[1])?;
                let tag = tokens[2].parse()?;
                Ok(ControlMessage::Join { port, tag })
            }
            REQUEST => {
                expect(REQUEST, 2)?;
                Ok(ControlMessage::Request {
                    tag: tokens[1].parse()?,
                })
            }
            FREE => {
                expect(FREE, 1)?;
                Ok(ControlMessage::Free)
            }
            GOODBYE => {
                expect(GOODBYE, 1)?;
                Ok(ControlMessage::Goodbye)
            }
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMessage::Join { port, tag } => write!(f, "{} {} {}", JOIN, port, tag),
            ControlMessage::Request { tag } => write!(f, "{} {}", REQUEST, tag),
            ControlMessage::Free => f.write_str(FREE),
            ControlMessage::Goodbye => f.write_str(GOODBYE),
        }
    }
}

/// A line sent back by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchReply {
    /// Registration accepted
    Ok,

    /// Port of the worker the client should connect to
    Port(u16),

    /// No idle worker in the requested pool; the client may retry
    NoServer,
}

impl fmt::Display for DispatchReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchReply::Ok => f.write_str(OK),
            DispatchReply::Port(port) => write!(f, "{}", port),
            DispatchReply::NoServer => f.write_str(NO_SERVER),
        }
    }
}

impl FromStr for DispatchReply {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        match line.trim() {
            OK => Ok(DispatchReply::Ok),
            NO_SERVER => Ok(DispatchReply::NoServer),
            other => parse_port(other)
                .map(DispatchReply::Port)
                .map_err(|_| ProtocolError::UnexpectedReply(other.to_string())),
        }
    }
}

fn parse_port(token: &str) -> Result<u16, ProtocolError> {
    match token.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ProtocolError::InvalidPort(token.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_join() {
        let msg: ControlMessage = "JOIN 7000 dynamic".parse().unwrap();
        assert_eq!(
            msg,
            ControlMessage::Join {
                port: 7000,
                tag: StrategyTag::Dynamic
            }
        );
    }

    #[test]
    fn test_join_missing_tag_is_rejected() {
        let err = "JOIN 99".parse::<ControlMessage>().unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Arity {
                command: "JOIN",
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_join_extra_token_is_rejected() {
        let err = "JOIN 7000 static extra".parse::<ControlMessage>().unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Arity {
                command: "JOIN",
                expected: 3,
                actual: 4
            }
        );
    }

    #[test]
    fn test_join_rejects_bad_port_and_tag() {
        assert!(matches!(
            "JOIN 0 static".parse::<ControlMessage>(),
            Err(ProtocolError::InvalidPort(_))
        ));
        assert!(matches!(
            "JOIN -4 static".parse::<ControlMessage>(),
            Err(ProtocolError::InvalidPort(_))
        ));
        assert!(matches!(
            "JOIN 70000 static".parse::<ControlMessage>(),
            Err(ProtocolError::InvalidPort(_))
        ));
        assert!(matches!(
            "JOIN 7000 fastest".parse::<ControlMessage>(),
            Err(ProtocolError::UnknownTag(_))
        ));
    }

    #[test]
    fn test_parse_request_and_status() {
        assert_eq!(
            "REQUEST static".parse::<ControlMessage>().unwrap(),
            ControlMessage::Request {
                tag: StrategyTag::Static
            }
        );
        assert_eq!("FREE".parse::<ControlMessage>().unwrap(), ControlMessage::Free);
        assert_eq!(
            " GOODBYE ".parse::<ControlMessage>().unwrap(),
            ControlMessage::Goodbye
        );
        assert!("REQUEST".parse::<ControlMessage>().is_err());
        assert!("FREE now".parse::<ControlMessage>().is_err());
    }

    #[test]
    fn test_unrecognized_lines() {
        assert_eq!("".parse::<ControlMessage>(), Err(ProtocolError::Empty));
        assert_eq!(
            "HELLO there".parse::<ControlMessage>(),
            Err(ProtocolError::UnknownCommand("HELLO".to_string()))
        );
    }

    #[test]
    fn test_reply_parsing() {
        assert_eq!("OK".parse::<DispatchReply>().unwrap(), DispatchReply::Ok);
        assert_eq!("7001".parse::<DispatchReply>().unwrap(), DispatchReply::Port(7001));
        assert_eq!(
            "NO_SERVER".parse::<DispatchReply>().unwrap(),
            DispatchReply::NoServer
        );
        assert!("maybe".parse::<DispatchReply>().is_err());
        assert_eq!(DispatchReply::Port(7001).to_string(), "7001");
    }
}
