use crate::config::CacheConfig;
use crate::models::{ComponentRecord, IncidentKey, IncidentRecord};
use moka::future::Cache;
use redis::aio::ConnectionManager;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::hash::Hash;
use std::time::Duration;

/// Generic cache wrapper using Moka
#[derive(Clone)]
pub struct AppCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    cache: Cache<K, V>,
}

impl<K, V> AppCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: K, value: V) {
        self.cache.insert(key, value).await;
    }

    pub async fn invalidate(&self, key: &K) {
        self.cache.invalidate(key).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

/// Best-effort side cache for incident, component and provider lookups.
///
/// Redis is used when configured and reachable; every failure degrades to the
/// in-process cache. Nothing here is a source of truth, and no operation
/// returns an error to the caller.
#[derive(Clone)]
pub struct StatusCache {
    local: AppCache<String, String>,
    redis: Option<ConnectionManager>,
    prefix: String,
    ttl: Duration,
    enabled: bool,
}

impl StatusCache {
    /// Local-only cache, used in tests and when redis is not configured
    pub fn local(capacity: u64, ttl: Duration, prefix: impl Into<String>) -> Self {
        Self {
            local: AppCache::new(capacity, ttl),
            redis: None,
            prefix: prefix.into(),
            ttl,
            enabled: true,
        }
    }

    /// A cache that stores nothing
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::local(1, Duration::from_secs(1), "disabled")
        }
    }

    /// Build from configuration, connecting to redis when a URL is given
    pub async fn connect(config: &CacheConfig) -> Self {
        if !config.enabled {
            tracing::info!("Status cache disabled");
            return Self::disabled();
        }

        let ttl = Duration::from_secs(config.ttl_secs);
        let mut cache = Self::local(config.local_capacity, ttl, config.key_prefix.clone());

        if let Some(url) = &config.redis_url {
            match Self::open_redis(url).await {
                Ok(connection) => {
                    tracing::info!(prefix = %config.key_prefix, "Status cache using redis");
                    cache.redis = Some(connection);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Redis unavailable, status cache falling back to local memory");
                }
            }
        }

        cache
    }

    async fn open_redis(url: &str) -> redis::RedisResult<ConnectionManager> {
        let client = redis::Client::open(url)?;
        let mut connection = ConnectionManager::new(client).await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut connection)
            .await?;
        Ok(connection)
    }

    pub fn backend(&self) -> &'static str {
        match (self.enabled, self.redis.is_some()) {
            (false, _) => "disabled",
            (true, true) => "redis",
            (true, false) => "local",
        }
    }

    fn incident_key(&self, key: &IncidentKey) -> String {
        format!("{}:incident:{}:{}", self.prefix, key.provider, key.service_id)
    }

    fn component_key(&self, provider: &str, component_id: &str) -> String {
        format!("{}:component:{}:{}", self.prefix, provider, component_id)
    }

    fn provider_key(&self, provider: &str) -> String {
        format!("{}:provider:{}", self.prefix, provider)
    }

    /// Write an incident unless a newer revision is already cached.
    ///
    /// Commits can finish out of order; an older write never replaces a
    /// newer one.
    pub async fn put_incident(&self, record: &IncidentRecord) {
        if !self.enabled {
            return;
        }
        let key = self.incident_key(&record.key());
        if let Some(cached) = self.get::<IncidentRecord>(key.clone()).await {
            if cached.revision > record.revision {
                tracing::debug!(
                    key = %key,
                    cached = cached.revision,
                    incoming = record.revision,
                    "Skipping stale cache write"
                );
                return;
            }
        }
        self.put(key, record).await;
    }

    pub async fn get_incident(&self, key: &IncidentKey) -> Option<IncidentRecord> {
        self.get(self.incident_key(key)).await
    }

    pub async fn invalidate_incident(&self, key: &IncidentKey) {
        self.invalidate(self.incident_key(key)).await;
    }

    pub async fn put_component(&self, record: &ComponentRecord) {
        self.put(self.component_key(&record.provider, &record.component_id), record)
            .await;
    }

    pub async fn get_component(&self, provider: &str, component_id: &str) -> Option<ComponentRecord> {
        self.get(self.component_key(provider, component_id)).await
    }

    pub async fn put_provider_health(&self, provider: &str, healthy: bool) {
        self.put(self.provider_key(provider), &healthy).await;
    }

    pub async fn get_provider_health(&self, provider: &str) -> Option<bool> {
        self.get(self.provider_key(provider)).await
    }

    async fn put<T: Serialize>(&self, key: String, value: &T) {
        if !self.enabled {
            return;
        }
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to encode cache entry");
                return;
            }
        };

        if let Some(mut connection) = self.redis.clone() {
            let written = redis::cmd("SET")
                .arg(&key)
                .arg(&raw)
                .arg("EX")
                .arg(self.ttl.as_secs().max(1))
                .query_async::<_, ()>(&mut connection)
                .await;
            if let Err(e) = written {
                tracing::warn!(key = %key, error = %e, "Redis cache write failed");
            }
        }

        self.local.insert(key, raw).await;
    }

    async fn get<T: DeserializeOwned>(&self, key: String) -> Option<T> {
        if !self.enabled {
            return None;
        }

        let mut raw = None;
        if let Some(mut connection) = self.redis.clone() {
            match redis::cmd("GET")
                .arg(&key)
                .query_async::<_, Option<String>>(&mut connection)
                .await
            {
                Ok(value) => raw = value,
                Err(e) => tracing::warn!(key = %key, error = %e, "Redis cache read failed"),
            }
        }
        if raw.is_none() {
            raw = self.local.get(&key).await;
        }

        raw.and_then(|raw| match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                None
            }
        })
    }

    async fn invalidate(&self, key: String) {
        if !self.enabled {
            return;
        }
        if let Some(mut connection) = self.redis.clone() {
            let removed = redis::cmd("DEL")
                .arg(&key)
                .query_async::<_, i64>(&mut connection)
                .await;
            if let Err(e) = removed {
                tracing::warn!(key = %key, error = %e, "Redis cache invalidation failed");
            }
        }
        self.local.invalidate(&key).await;
    }

    pub fn local_entries(&self) -> u64 {
        self.local.entry_count()
    }
}
