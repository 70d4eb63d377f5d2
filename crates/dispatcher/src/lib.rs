//! Rendezvous Dispatcher
//!
//! Matches clients to idle workers. Workers register and report FREE/GOODBYE over a
//! long-lived control connection; clients receive a worker port and talk to the worker
//! directly.

pub mod dispatcher;
pub mod listener;
pub mod record;
pub mod registry;
pub mod strategy;

pub use dispatcher::Dispatcher;
pub use listener::{ListenerExit, StatusListener};
pub use record::{RecordId, ServerRecord};
pub use registry::Registry;
pub use strategy::{LeastLoaded, RoundRobin, SelectionStrategy, Strategies};
