//! Rendezvous Worker
//!
//! Registers with a dispatcher, serves the clients it is handed and reports FREE
//! after each one.

pub mod jobs;
pub mod net;

pub use jobs::JobRunner;
pub use net::{ControlChannel, StatusSender, WorkerServer};
