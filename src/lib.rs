//! Status tracker
//!
//! Reconciles third-party status pages into a local incident store. Provider
//! webhooks are the primary feed; a polling loop takes over when webhooks
//! cannot be registered. Both feeds go through the same change detector, so
//! an incident is stored once and every status transition is audited.

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod processing;
pub mod providers;
pub mod scheduler;
pub mod state;

pub use error::{AppError, Result};
