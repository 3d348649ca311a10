//! Prometheus metrics for the reconciliation pipeline.
//!
//! Counters are always live; they are exported on `/metrics` once
//! [`init_metrics`] has registered them.
//!
//! ```no_run
//! use status_tracker::metrics::EVENTS_INGESTED_TOTAL;
//!
//! EVENTS_INGESTED_TOTAL
//!     .with_label_values(&["openai", "webhook", "NEW"])
//!     .inc();
//! ```

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};

const NAMESPACE: &str = "status_tracker";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Events reconciled, by verdict
    ///
    /// Labels: provider, source, classification
    pub static ref EVENTS_INGESTED_TOTAL: CounterVec = CounterVec::new(
        Opts::new("events_ingested_total", "Canonical events reconciled").namespace(NAMESPACE),
        &["provider", "source", "classification"]
    ).expect("Failed to create EVENTS_INGESTED_TOTAL metric");

    /// Webhook payloads that were acknowledged but not reconciled
    ///
    /// Labels: provider, reason
    pub static ref WEBHOOKS_DROPPED_TOTAL: CounterVec = CounterVec::new(
        Opts::new("webhooks_dropped_total", "Webhook payloads dropped without reconciliation")
            .namespace(NAMESPACE),
        &["provider", "reason"]
    ).expect("Failed to create WEBHOOKS_DROPPED_TOTAL metric");

    /// Store conflicts observed by the lifecycle manager
    pub static ref PERSISTENCE_CONFLICTS_TOTAL: Counter = Counter::with_opts(
        Opts::new("persistence_conflicts_total", "Uniqueness or revision conflicts").namespace(NAMESPACE)
    ).expect("Failed to create PERSISTENCE_CONFLICTS_TOTAL metric");

    /// Polling cycles
    ///
    /// Labels: outcome (completed, skipped_disabled, skipped_busy)
    pub static ref POLLING_CYCLES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("polling_cycles_total", "Polling fallback cycles").namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create POLLING_CYCLES_TOTAL metric");

    /// Provider REST failures
    ///
    /// Labels: provider, operation
    pub static ref PROVIDER_ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("provider_errors_total", "Failed provider REST calls").namespace(NAMESPACE),
        &["provider", "operation"]
    ).expect("Failed to create PROVIDER_ERRORS_TOTAL metric");

    /// Notification deliveries
    ///
    /// Labels: channel, status
    pub static ref NOTIFICATIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("notifications_total", "Notification delivery attempts").namespace(NAMESPACE),
        &["channel", "status"]
    ).expect("Failed to create NOTIFICATIONS_TOTAL metric");

    /// Maintenance job executions
    ///
    /// Labels: job, status
    pub static ref SCHEDULER_JOB_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("scheduler_job_runs_total", "Maintenance job executions").namespace(NAMESPACE),
        &["job", "status"]
    ).expect("Failed to create SCHEDULER_JOB_RUNS_TOTAL metric");

    /// Last observed provider health (1 healthy, 0 unhealthy)
    ///
    /// Labels: provider
    pub static ref PROVIDER_HEALTHY: GaugeVec = GaugeVec::new(
        Opts::new("provider_healthy", "Provider health probe result").namespace(NAMESPACE),
        &["provider"]
    ).expect("Failed to create PROVIDER_HEALTHY metric");
}

/// Register every metric with [`PROMETHEUS_REGISTRY`]
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(EVENTS_INGESTED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(WEBHOOKS_DROPPED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PERSISTENCE_CONFLICTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(POLLING_CYCLES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PROVIDER_ERRORS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(NOTIFICATIONS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SCHEDULER_JOB_RUNS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PROVIDER_HEALTHY.clone()))?;
    Ok(())
}

/// Text exposition of the registry
pub fn gather() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&PROMETHEUS_REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

pub fn record_event(provider: &str, source: &str, classification: &str) {
    EVENTS_INGESTED_TOTAL
        .with_label_values(&[provider, source, classification])
        .inc();
}

pub fn record_webhook_dropped(provider: &str, reason: &str) {
    WEBHOOKS_DROPPED_TOTAL
        .with_label_values(&[provider, reason])
        .inc();
}

pub fn record_polling_cycle(outcome: &str) {
    POLLING_CYCLES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_provider_error(provider: &str, operation: &str) {
    PROVIDER_ERRORS_TOTAL
        .with_label_values(&[provider, operation])
        .inc();
}

pub fn record_notification(channel: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    NOTIFICATIONS_TOTAL.with_label_values(&[channel, status]).inc();
}

pub fn record_job_run(job: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    SCHEDULER_JOB_RUNS_TOTAL.with_label_values(&[job, status]).inc();
}

pub fn set_provider_health(provider: &str, healthy: bool) {
    PROVIDER_HEALTHY
        .with_label_values(&[provider])
        .set(if healthy { 1.0 } else { 0.0 });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = EVENTS_INGESTED_TOTAL
            .with_label_values(&["metrics-test", "webhook", "NEW"])
            .get();
        record_event("metrics-test", "webhook", "NEW");
        let after = EVENTS_INGESTED_TOTAL
            .with_label_values(&["metrics-test", "webhook", "NEW"])
            .get();
        assert_eq!(after - before, 1.0);
    }

    #[test]
    fn test_gather_after_init() {
        // A second registration in the same process is an error; both are fine here.
        let _ = init_metrics();
        set_provider_health("metrics-test", true);
        let text = gather().unwrap();
        assert!(text.contains("status_tracker_provider_healthy"));
    }
}
