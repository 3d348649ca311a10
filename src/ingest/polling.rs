//! Polling fallback: periodic pull through the same sink webhooks use.

use crate::config::PollingConfig;
use crate::metrics;
use crate::processing::EventSink;
use crate::providers::{ProviderRegistry, StatusProvider, SyncReport};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Result of one trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(Vec<SyncReport>),
    SkippedDisabled,
    SkippedBusy,
}

impl CycleOutcome {
    fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Completed(_) => "completed",
            CycleOutcome::SkippedDisabled => "skipped_disabled",
            CycleOutcome::SkippedBusy => "skipped_busy",
        }
    }
}

/// Control-plane view of the fallback
#[derive(Debug, Clone, Serialize)]
pub struct PollingStatus {
    pub enabled: bool,
    pub running: bool,
    pub reason: Option<String>,
    pub interval_secs: u64,
    pub providers: Vec<String>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_reports: Vec<SyncReport>,
}

/// Clears the run flag when a cycle ends, however it ends
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodic incident pull, gated by a runtime flag.
///
/// Only obeys the flag; whoever knows about webhook registration flips it.
/// Runs never overlap, and a cycle never fails: provider errors become an
/// empty batch for that provider.
pub struct PollingOrchestrator {
    registry: Arc<ProviderRegistry>,
    sink: Arc<dyn EventSink>,
    enabled: AtomicBool,
    running: AtomicBool,
    reason: RwLock<Option<String>>,
    providers: Vec<String>,
    interval: Duration,
    initial_delay: Duration,
    last_cycle: RwLock<Option<(DateTime<Utc>, Vec<SyncReport>)>>,
}

impl PollingOrchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        sink: Arc<dyn EventSink>,
        config: &PollingConfig,
    ) -> Self {
        Self {
            registry,
            sink,
            enabled: AtomicBool::new(config.enabled),
            running: AtomicBool::new(false),
            reason: RwLock::new(None),
            providers: config
                .providers
                .iter()
                .map(|p| p.trim().to_ascii_lowercase())
                .collect(),
            interval: Duration::from_secs(config.interval_secs.max(1)),
            initial_delay: Duration::from_secs(config.initial_delay_secs),
            last_cycle: RwLock::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Flip the fallback on or off
    pub fn set_enabled(&self, enabled: bool, reason: Option<String>) {
        let previous = self.enabled.swap(enabled, Ordering::AcqRel);
        *self.reason.write() = reason.clone();

        if previous != enabled {
            tracing::info!(
                enabled = enabled,
                reason = reason.as_deref().unwrap_or("unspecified"),
                "Polling fallback toggled"
            );
        }
    }

    /// Webhooks could not be registered: start pulling
    pub fn on_webhook_registration_failed(&self, reason: impl Into<String>) {
        self.set_enabled(true, Some(reason.into()));
    }

    /// Webhooks are live again: stop pulling
    pub fn on_webhook_registration_succeeded(&self) {
        self.set_enabled(false, Some("webhook registration succeeded".to_string()));
    }

    pub fn status(&self) -> PollingStatus {
        let last = self.last_cycle.read().clone();
        PollingStatus {
            enabled: self.is_enabled(),
            running: self.is_running(),
            reason: self.reason.read().clone(),
            interval_secs: self.interval.as_secs(),
            providers: self.targets().iter().map(|p| p.name().to_string()).collect(),
            last_cycle_at: last.as_ref().map(|(at, _)| *at),
            last_reports: last.map(|(_, reports)| reports).unwrap_or_default(),
        }
    }

    fn targets(&self) -> Vec<Arc<dyn StatusProvider>> {
        if self.providers.is_empty() {
            return self.registry.providers();
        }
        self.providers
            .iter()
            .filter_map(|name| match self.registry.get(name) {
                Ok(provider) => Some(provider),
                Err(e) => {
                    tracing::warn!(provider = %name, error = %e, "Configured polling provider not registered");
                    None
                }
            })
            .collect()
    }

    /// One trigger. Skips when disabled or when a cycle is still running.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let outcome = self.run_cycle_inner().await;
        metrics::record_polling_cycle(outcome.label());
        outcome
    }

    async fn run_cycle_inner(&self) -> CycleOutcome {
        if !self.is_enabled() {
            return CycleOutcome::SkippedDisabled;
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Previous polling cycle still running, skipping trigger");
            return CycleOutcome::SkippedBusy;
        }
        let _guard = RunGuard(&self.running);

        tracing::debug!("Executing polling cycle");
        let mut reports = Vec::new();
        for provider in self.targets() {
            let report = match provider.sync(self.sink.as_ref()).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(provider = %provider.name(), error = %e, "Polling provider failed");
                    SyncReport::empty(provider.name())
                }
            };
            reports.push(report);
        }

        *self.last_cycle.write() = Some((Utc::now(), reports.clone()));
        CycleOutcome::Completed(reports)
    }

    /// Spawn the fixed-interval loop
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                interval_secs = self.interval.as_secs(),
                initial_delay_secs = self.initial_delay.as_secs(),
                enabled = self.is_enabled(),
                "Polling fallback started"
            );

            tokio::time::sleep(self.initial_delay).await;

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                self.run_cycle().await;
            }
        })
    }
}
