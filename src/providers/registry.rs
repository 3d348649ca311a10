//! Runtime registry of status providers.

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{AppError, Result};
use crate::processing::EventSink;
use crate::providers::{GenericStatuspageProvider, OpenAiStatusProvider, StatusProvider, SyncReport};
use dashmap::DashMap;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Map of provider name to provider, shared by the scheduler, the polling
/// fallback and request handlers. Names are case-insensitive.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: DashMap<String, Arc<dyn StatusProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: DashMap::new(),
        }
    }

    /// Build and register every configured provider
    pub fn from_config(configs: &[ProviderConfig], timeout: Duration) -> Result<Self> {
        let registry = Self::new();

        for config in configs {
            let provider: Arc<dyn StatusProvider> = match config.kind {
                ProviderKind::Openai => Arc::new(OpenAiStatusProvider::from_config(config, timeout)?),
                ProviderKind::Statuspage => {
                    Arc::new(GenericStatuspageProvider::from_config(config, timeout)?)
                }
            };
            registry.register_provider(provider)?;
        }

        info!(count = registry.len(), "Provider registry initialized");
        Ok(registry)
    }

    /// Register under an explicit name, replacing any previous entry
    pub fn register(&self, name: &str, provider: Arc<dyn StatusProvider>) -> Result<()> {
        let key = normalize(name);
        if key.is_empty() {
            return Err(AppError::InvalidArgument(
                "Provider name cannot be empty".to_string(),
            ));
        }

        if self.providers.insert(key.clone(), provider).is_some() {
            warn!(provider = %key, "Provider replaced");
        } else {
            info!(provider = %key, "Provider registered");
        }
        Ok(())
    }

    /// Register under the provider's own name
    pub fn register_provider(&self, provider: Arc<dyn StatusProvider>) -> Result<()> {
        let name = provider.name().to_string();
        self.register(&name, provider)
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<dyn StatusProvider>> {
        let removed = self.providers.remove(&normalize(name)).map(|(_, p)| p);
        if removed.is_some() {
            info!(provider = %name, "Provider unregistered");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn StatusProvider>> {
        let key = normalize(name);
        if key.is_empty() {
            return Err(AppError::InvalidArgument(
                "Provider name cannot be empty".to_string(),
            ));
        }
        self.providers
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                warn!(provider = %name, "Provider not found");
                AppError::NotFound(format!("Unknown provider: {}", name))
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(&normalize(name))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Point-in-time snapshot of every provider
    pub fn providers(&self) -> Vec<Arc<dyn StatusProvider>> {
        self.providers.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub async fn is_provider_healthy(&self, name: &str) -> bool {
        match self.get(name) {
            Ok(provider) => provider.is_healthy().await,
            Err(_) => false,
        }
    }

    /// Probe every provider concurrently
    pub async fn health_all(&self) -> BTreeMap<String, bool> {
        let snapshot = self.providers();
        let checks = snapshot.iter().map(|provider| async move {
            (provider.name().to_string(), provider.is_healthy().await)
        });
        join_all(checks).await.into_iter().collect()
    }

    /// Sync every provider through `sink`; a failing provider is logged and
    /// does not stop the others
    pub async fn sync_all(&self, sink: &dyn EventSink) -> Vec<SyncReport> {
        let snapshot = self.providers();
        info!(count = snapshot.len(), "Syncing all providers");

        let mut reports = Vec::with_capacity(snapshot.len());
        for provider in snapshot {
            match provider.sync(sink).await {
                Ok(report) => {
                    debug!(provider = %provider.name(), "Provider synced");
                    reports.push(report);
                }
                Err(e) => {
                    error!(provider = %provider.name(), error = %e, "Provider sync failed");
                    reports.push(SyncReport::empty(provider.name()));
                }
            }
        }
        reports
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(name: &str) -> Arc<dyn StatusProvider> {
        Arc::new(
            GenericStatuspageProvider::new(name, "http://127.0.0.1:9", "p", None, Duration::from_millis(200))
                .unwrap(),
        )
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = ProviderRegistry::new();
        registry.register("Acme", provider("acme")).unwrap();

        assert!(registry.contains("ACME"));
        assert_eq!(registry.get("acme").unwrap().name(), "acme");
        assert_eq!(registry.names(), vec!["acme".to_string()]);
    }

    #[test]
    fn test_unknown_is_not_found_and_empty_is_invalid() {
        let registry = ProviderRegistry::new();
        assert!(matches!(registry.get("missing"), Err(AppError::NotFound(_))));
        assert!(matches!(registry.get(""), Err(AppError::InvalidArgument(_))));
        assert!(matches!(
            registry.register(" ", provider("acme")),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unregister() {
        let registry = ProviderRegistry::new();
        registry.register_provider(provider("acme")).unwrap();
        assert!(registry.unregister("ACME").is_some());
        assert!(registry.is_empty());
        assert!(registry.unregister("acme").is_none());
    }

    #[test]
    fn test_from_config_registers_openai_under_fixed_name() {
        let registry =
            ProviderRegistry::from_config(&[ProviderConfig::openai()], Duration::from_secs(1)).unwrap();
        assert_eq!(registry.names(), vec!["openai".to_string()]);
    }

    #[tokio::test]
    async fn test_unreachable_provider_reports_unhealthy() {
        let registry = ProviderRegistry::new();
        registry.register_provider(provider("down")).unwrap();

        let health = registry.health_all().await;
        assert_eq!(health.get("down"), Some(&false));
        assert!(!registry.is_provider_healthy("missing").await);
    }
}
