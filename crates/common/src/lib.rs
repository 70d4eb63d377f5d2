//! Rendezvous common library
//!
//! This crate contains shared code used across Rendezvous components.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

// Re-export commonly used types
pub use config::RendezvousConfig;
pub use error::{RendezvousError, Result};
pub use metrics::{MetricsRegistry, METRICS};
