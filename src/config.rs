use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Persistent store configuration
    #[serde(default)]
    pub state: StateConfig,

    /// Best-effort cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Polling fallback configuration
    #[serde(default)]
    pub polling: PollingConfig,

    /// Status providers to register at startup
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Reconciliation tuning
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Notification configuration
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Maintenance job configuration
    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: STATUS_TRACKER__)
            .add_source(
                config::Environment::with_prefix("STATUS_TRACKER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse a standalone TOML document, without env overrides
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Built-in defaults, used when no configuration can be loaded
    pub fn builtin() -> Self {
        Self {
            server: ServerConfig::default(),
            state: StateConfig::default(),
            cache: CacheConfig::default(),
            polling: PollingConfig::default(),
            providers: vec![ProviderConfig::openai()],
            processing: ProcessingConfig::default(),
            notifications: NotificationConfig::default(),
            maintenance: MaintenanceConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StateConfig {
    /// Store backend type
    #[serde(default)]
    pub backend: StateBackend,

    /// Path for on-disk backends (sqlite file / sled directory)
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    #[default]
    Memory,
    Sqlite,
    Sled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Redis connection string; the local cache is used when absent
    pub redis_url: Option<String>,

    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_cache_capacity")]
    pub local_capacity: u64,

    #[serde(default = "default_cache_prefix")]
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redis_url: None,
            ttl_secs: default_cache_ttl(),
            local_capacity: default_cache_capacity(),
            key_prefix: default_cache_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Whether polling starts active; the control surface can flip it at runtime
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_poll_initial_delay")]
    pub initial_delay_secs: u64,

    /// Outbound provider call timeout (seconds)
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Providers to poll; empty polls every registered provider
    #[serde(default)]
    pub providers: Vec<String>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_poll_interval(),
            initial_delay_secs: default_poll_initial_delay(),
            request_timeout_secs: default_timeout(),
            providers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Statuspage,
    Openai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,

    #[serde(default)]
    pub kind: ProviderKind,

    /// Statuspage-compatible API root, e.g. `https://status.openai.com/api/v2`
    pub base_url: String,

    pub page_id: String,

    pub webhook_path: Option<String>,

    /// Env var holding the shared webhook signing secret
    pub webhook_secret_env: Option<String>,
}

impl ProviderConfig {
    pub fn openai() -> Self {
        Self {
            name: "openai".to_string(),
            kind: ProviderKind::Openai,
            base_url: "https://status.openai.com/api/v2".to_string(),
            page_id: "openai".to_string(),
            webhook_path: Some("/webhook/openai".to_string()),
            webhook_secret_env: None,
        }
    }

    /// Resolve the signing secret from the environment, if configured
    pub fn webhook_secret(&self) -> Option<String> {
        self.webhook_secret_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Same-status message changes inside this window are suppressed
    #[serde(default = "default_refresh_window")]
    pub message_refresh_window_secs: u64,

    /// Attempts for an incident commit that keeps hitting store conflicts
    #[serde(default = "default_commit_attempts")]
    pub max_commit_attempts: u32,

    /// Attempts for the component version compare-and-swap loop
    #[serde(default = "default_component_attempts")]
    pub component_update_attempts: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            message_refresh_window_secs: default_refresh_window(),
            max_commit_attempts: default_commit_attempts(),
            component_update_attempts: default_component_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Log every notification to stdout
    #[serde(default = "default_true")]
    pub console_enabled: bool,

    /// Enable Slack notifications
    #[serde(default)]
    pub slack_enabled: bool,

    /// Slack webhook URL (from env var)
    pub slack_webhook_env: Option<String>,

    /// Enable Telegram notifications
    #[serde(default)]
    pub telegram_enabled: bool,

    /// Telegram bot token (from env var)
    pub telegram_token_env: Option<String>,

    /// Telegram chat to post into
    pub telegram_chat_id: Option<String>,

    /// Override for the Telegram API root
    #[serde(default = "default_telegram_api_url")]
    pub telegram_api_url: String,

    /// Enable email notifications
    #[serde(default)]
    pub email_enabled: bool,

    /// SMTP server
    pub smtp_server: Option<String>,

    /// SMTP port
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Use STARTTLS for SMTP
    #[serde(default = "default_true")]
    pub smtp_use_tls: bool,

    /// SMTP username (from env var)
    pub smtp_username_env: Option<String>,

    /// SMTP password (from env var)
    pub smtp_password_env: Option<String>,

    /// From email address
    pub email_from: Option<String>,

    /// Recipient addresses
    #[serde(default)]
    pub email_to: Vec<String>,

    /// Enable webhook notifications
    #[serde(default)]
    pub webhook_enabled: bool,

    /// Webhook URL for custom integrations
    pub webhook_url: Option<String>,

    /// Notification queue size
    #[serde(default = "default_notification_queue_size")]
    pub queue_size: usize,

    /// Per-channel send timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            slack_enabled: false,
            slack_webhook_env: None,
            telegram_enabled: false,
            telegram_token_env: None,
            telegram_chat_id: None,
            telegram_api_url: default_telegram_api_url(),
            email_enabled: false,
            smtp_server: None,
            smtp_port: default_smtp_port(),
            smtp_use_tls: true,
            smtp_username_env: None,
            smtp_password_env: None,
            email_from: None,
            email_to: Vec::new(),
            webhook_enabled: false,
            webhook_url: None,
            queue_size: default_notification_queue_size(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_connectivity_schedule")]
    pub connectivity_check_schedule: String,

    #[serde(default = "default_provider_sync_schedule")]
    pub provider_sync_schedule: String,

    #[serde(default = "default_component_refresh_schedule")]
    pub component_refresh_schedule: String,

    #[serde(default = "default_health_report_schedule")]
    pub health_report_schedule: String,

    /// Operational components untouched for this long are pruned
    #[serde(default = "default_stale_component_days")]
    pub stale_component_days: i64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            connectivity_check_schedule: default_connectivity_schedule(),
            provider_sync_schedule: default_provider_sync_schedule(),
            component_refresh_schedule: default_component_refresh_schedule(),
            health_report_schedule: default_health_report_schedule(),
            stale_component_days: default_stale_component_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_cache_capacity() -> u64 {
    10_000
}

fn default_cache_prefix() -> String {
    "status-tracker".to_string()
}

fn default_poll_interval() -> u64 {
    300
}

fn default_poll_initial_delay() -> u64 {
    30
}

fn default_refresh_window() -> u64 {
    60
}

fn default_commit_attempts() -> u32 {
    3
}

fn default_component_attempts() -> u32 {
    5
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_notification_queue_size() -> usize {
    1000
}

fn default_connectivity_schedule() -> String {
    "0 */5 * * * *".to_string()
}

fn default_provider_sync_schedule() -> String {
    "0 */15 * * * *".to_string()
}

fn default_component_refresh_schedule() -> String {
    "30 */15 * * * *".to_string()
}

fn default_health_report_schedule() -> String {
    "0 0 * * * *".to_string()
}

fn default_stale_component_days() -> i64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}
