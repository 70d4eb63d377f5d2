//! Dispatcher control channel and client-facing payload server

pub mod control;
pub mod server;

pub use control::{ControlChannel, StatusSender};
pub use server::WorkerServer;
