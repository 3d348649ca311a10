pub mod components;
pub mod deduplication;
pub mod lifecycle;
pub mod processor;

pub use components::ComponentRegistry;
pub use deduplication::{ChangeDetector, Classification};
pub use lifecycle::{IncidentLifecycle, LifecycleOutcome};
pub use processor::{EventSink, IncidentProcessor};
