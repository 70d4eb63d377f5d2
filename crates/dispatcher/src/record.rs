//! In-memory descriptor of one registered worker

use rendezvous_proto::StrategyTag;
use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;
use uuid::Uuid;

/// Identity of a registry entry.
///
/// Endpoints are not unique (a worker may re-register the same port before its
/// old control connection is noticed as dead), so records are addressed by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered worker as seen by the dispatcher
#[derive(Debug, Clone)]
pub struct ServerRecord {
    id: RecordId,

    /// Where clients reach the worker
    endpoint: SocketAddr,

    /// Pool the worker participates in
    tag: StrategyTag,

    /// Peer address of the control connection
    control_peer: SocketAddr,

    /// A dispatched request is outstanding
    pub busy: bool,

    /// Most recent transition to free
    pub last_free: Instant,

    /// Outstanding dispatches, tracked for the dynamic pool only
    pub active_connections: u32,
}

impl ServerRecord {
    /// Create a free record, as produced by a successful JOIN
    pub fn new(endpoint: SocketAddr, tag: StrategyTag, control_peer: SocketAddr) -> Self {
        Self {
            id: RecordId::new(),
            endpoint,
            tag,
            control_peer,
            busy: false,
            last_free: Instant::now(),
            active_connections: 0,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn tag(&self) -> StrategyTag {
        self.tag
    }

    pub fn control_peer(&self) -> SocketAddr {
        self.control_peer
    }

    /// Eligible for a request of `tag`
    pub fn is_candidate(&self, tag: StrategyTag) -> bool {
        self.tag == tag && !self.busy
    }

    /// Apply a FREE status token
    pub fn release(&mut self, now: Instant) {
        self.busy = false;
        self.last_free = now;
        if self.tag == StrategyTag::Dynamic {
            self.active_connections = self.active_connections.saturating_sub(1);
        }
    }
}
