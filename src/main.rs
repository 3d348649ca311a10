use status_tracker::{
    api::{build_router, AppState},
    config::Config,
    ingest::PollingOrchestrator,
    notifications::NotificationDispatcher,
    processing::{ChangeDetector, ComponentRegistry, IncidentLifecycle, IncidentProcessor},
    providers::ProviderRegistry,
    scheduler::{register_maintenance_jobs, MaintenanceContext, SchedulerService},
    state::{create_store, StatusCache},
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let (config, load_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::builtin(), Some(e)),
    };

    init_tracing(&config);

    if let Some(e) = load_error {
        tracing::warn!(error = %e, "Failed to load configuration, using built-in defaults");
    }

    tracing::info!("Starting status tracker v{}", env!("CARGO_PKG_VERSION"));

    if config.observability.prometheus_enabled {
        if let Err(e) = status_tracker::metrics::init_metrics() {
            tracing::warn!(error = %e, "Failed to initialize metrics, continuing without");
        }
    }

    // Storage and cache
    tracing::info!(backend = ?config.state.backend, "Initializing storage backend");
    let store = create_store(&config.state).await?;
    let cache = StatusCache::connect(&config.cache).await;

    // Reconciliation pipeline
    let lifecycle = Arc::new(IncidentLifecycle::new(
        store.clone(),
        cache.clone(),
        ChangeDetector::new(config.processing.message_refresh_window_secs),
        config.processing.max_commit_attempts,
    ));
    let components = Arc::new(ComponentRegistry::new(
        store,
        cache.clone(),
        config.processing.component_update_attempts,
    ));

    let notifier = match NotificationDispatcher::from_config(&config.notifications) {
        Ok(dispatcher) => {
            tracing::info!(channels = ?dispatcher.channel_names(), "Notification dispatcher initialized");
            Some(Arc::new(dispatcher))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Notification dispatcher unavailable, continuing without");
            None
        }
    };

    let mut processor = IncidentProcessor::new(lifecycle.clone(), components.clone());
    if let Some(notifier) = notifier.clone() {
        processor = processor.with_notifications(notifier);
    }
    let processor = Arc::new(processor);

    // Providers and the polling fallback
    let providers = Arc::new(ProviderRegistry::from_config(
        &config.providers,
        Duration::from_secs(config.polling.request_timeout_secs),
    )?);
    tracing::info!(providers = ?providers.names(), "Provider registry initialized");

    let polling = Arc::new(PollingOrchestrator::new(
        providers.clone(),
        processor.clone(),
        &config.polling,
    ));
    let polling_handle = polling.clone().start();

    // Maintenance jobs
    let mut scheduler = SchedulerService::new(config.maintenance.enabled).await?;
    if config.maintenance.enabled {
        let ctx = MaintenanceContext {
            providers: providers.clone(),
            sink: processor.clone(),
            lifecycle,
            components,
            cache,
            stale_component_days: config.maintenance.stale_component_days,
        };
        register_maintenance_jobs(&scheduler, &config.maintenance, ctx).await?;
    }
    scheduler.start().await?;

    // HTTP API
    let mut app_state = AppState::new(processor, providers, polling);
    if let Some(notifier) = notifier {
        app_state = app_state.with_notifier(notifier);
    }
    let app = build_router(app_state);

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("HTTP API listening on http://{}", http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down gracefully...");
    polling_handle.abort();
    scheduler.shutdown().await?;
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "status_tracker={},tower_http=info",
            config.observability.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
