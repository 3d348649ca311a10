//! Status providers: pluggable sources of incidents and components.

pub mod client;
pub mod openai;
pub mod registry;
pub mod statuspage;

pub use client::StatuspageClient;
pub use openai::OpenAiStatusProvider;
pub use registry::ProviderRegistry;
pub use statuspage::GenericStatuspageProvider;

use crate::error::Result;
use crate::models::{CanonicalEvent, ComponentSnapshot};
use crate::processing::EventSink;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Header carrying the webhook signature
pub const SIGNATURE_HEADER: &str = "X-Statuspage-Signature";

/// Capability set every status source implements
#[async_trait]
pub trait StatusProvider: Send + Sync {
    /// Registry key, lowercase
    fn name(&self) -> &str;

    fn page_id(&self) -> &str;

    fn base_url(&self) -> &str;

    /// Path at which this provider's webhooks are received
    fn webhook_url(&self) -> Option<&str>;

    /// Current incidents as canonical polling events
    async fn list_incidents(&self) -> Result<Vec<CanonicalEvent>>;

    async fn list_components(&self) -> Result<Vec<ComponentSnapshot>>;

    /// Fetch incidents and feed each one through `sink`
    async fn sync(&self, sink: &dyn EventSink) -> Result<SyncReport>;

    async fn is_healthy(&self) -> bool;

    fn validate_webhook_signature(&self, payload: &[u8], signature: Option<&str>) -> bool;

    /// Time of the last successful sync
    fn last_sync(&self) -> Option<DateTime<Utc>>;
}

/// Outcome counts of one provider sync
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SyncReport {
    pub provider: String,
    pub fetched: usize,
    pub new: usize,
    pub changed: usize,
    pub duplicate: usize,
    pub failed: usize,
}

impl SyncReport {
    pub fn empty(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Self::default()
        }
    }
}

/// Submit a batch of events, counting verdicts. Individual failures are
/// logged and counted, never propagated.
pub async fn submit_all(
    provider: &str,
    events: Vec<CanonicalEvent>,
    sink: &dyn EventSink,
) -> SyncReport {
    use crate::processing::Classification;

    let mut report = SyncReport::empty(provider);
    report.fetched = events.len();

    for event in events {
        let service_id = event.service_id.clone();
        match sink.submit(event).await {
            Ok(Classification::New) => report.new += 1,
            Ok(Classification::Changed) => report.changed += 1,
            Ok(Classification::Duplicate) => report.duplicate += 1,
            Err(e) => {
                report.failed += 1;
                tracing::error!(
                    provider = %provider,
                    service_id = %service_id,
                    error = %e,
                    "Failed to reconcile polled incident"
                );
            }
        }
    }

    report
}

/// Check a webhook signature.
///
/// Without a secret every payload is accepted. With one, the signature must
/// be the hex SHA-256 of `secret || payload`.
pub fn verify_signature(secret: Option<&str>, payload: &[u8], signature: Option<&str>) -> bool {
    let Some(secret) = secret else {
        return true;
    };
    let Some(signature) = signature else {
        return false;
    };

    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(payload);
    let expected = format!("{:x}", hasher.finalize());

    let provided = signature.trim().to_ascii_lowercase();

    // ct_eq on slices of unequal length is already false
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
