pub mod mapping;
pub mod polling;
pub mod webhook;

pub use polling::{CycleOutcome, PollingOrchestrator, PollingStatus};
pub use webhook::{WebhookEvent, WebhookIngestor, WebhookOutcome};
