//! Statuspage-compatible REST client and wire types.
//!
//! The same incident and component shapes arrive in webhook bodies, so the
//! webhook parser reuses these types.

use crate::error::{AppError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Incident as returned by `incidents.json` and carried in incident webhooks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatuspageIncident {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub impact: Option<String>,
    #[serde(default)]
    pub shortlink: Option<String>,
    /// Newest first
    #[serde(default, deserialize_with = "null_as_default")]
    pub incident_updates: Vec<StatuspageIncidentUpdate>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub components: Vec<StatuspageComponentRef>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatuspageIncidentUpdate {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Component reference inside an incident
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatuspageComponentRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Component as returned by `components.json` and carried in component webhooks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatuspageComponent {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct IncidentsEnvelope {
    #[serde(default, deserialize_with = "null_as_default")]
    incidents: Vec<StatuspageIncident>,
}

#[derive(Debug, Deserialize)]
struct ComponentsEnvelope {
    #[serde(default, deserialize_with = "null_as_default")]
    components: Vec<StatuspageComponent>,
}

/// Page-level rollup from `status.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PageStatus {
    #[serde(default)]
    pub indicator: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct StatusEnvelope {
    #[serde(default)]
    status: PageStatus,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// HTTP client for one Statuspage page
#[derive(Clone)]
pub struct StatuspageClient {
    client: Client,
    provider: String,
    base_url: String,
    page_id: String,
}

impl StatuspageClient {
    pub fn new(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        page_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("status-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            provider: provider.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_id: page_id.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    pub fn page_url(&self, resource: &str) -> String {
        format!("{}/pages/{}/{}", self.base_url, self.page_id, resource)
    }

    pub async fn incidents(&self) -> Result<Vec<StatuspageIncident>> {
        let envelope: IncidentsEnvelope = self.get_json("incidents.json").await?;
        Ok(envelope.incidents)
    }

    pub async fn components(&self) -> Result<Vec<StatuspageComponent>> {
        let envelope: ComponentsEnvelope = self.get_json("components.json").await?;
        Ok(envelope.components)
    }

    pub async fn status(&self) -> Result<PageStatus> {
        let envelope: StatusEnvelope = self.get_json("status.json").await?;
        Ok(envelope.status)
    }

    async fn get_json<T: DeserializeOwned>(&self, resource: &str) -> Result<T> {
        let url = self.page_url(resource);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.unavailable(format!("GET {} failed: {}", resource, e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.unavailable(format!("GET {} returned {}", resource, status)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| self.unavailable(format!("Invalid {} body: {}", resource, e)))
    }

    fn unavailable(&self, message: String) -> AppError {
        AppError::ProviderUnavailable {
            provider: self.provider.clone(),
            message,
        }
    }
}
