use mockito::Matcher;
use status_tracker::{
    config::NotificationConfig,
    models::{CanonicalEvent, IncidentStatus, Severity},
    notifications::NotificationDispatcher,
    processing::{ChangeDetector, ComponentRegistry, IncidentLifecycle, IncidentProcessor},
    state::{InMemoryStore, StatusCache, StatusStore},
};
use std::sync::Arc;
use std::time::Duration;

fn processor(dispatcher: Arc<NotificationDispatcher>) -> (Arc<dyn StatusStore>, IncidentProcessor) {
    let store: Arc<dyn StatusStore> = Arc::new(InMemoryStore::new());
    let lifecycle = Arc::new(IncidentLifecycle::new(
        store.clone(),
        StatusCache::disabled(),
        ChangeDetector::default(),
        3,
    ));
    let components = Arc::new(ComponentRegistry::new(store.clone(), StatusCache::disabled(), 3));
    (
        store,
        IncidentProcessor::new(lifecycle, components).with_notifications(dispatcher),
    )
}

async fn wait_for_delivery(dispatcher: &NotificationDispatcher, expected: u64) {
    for _ in 0..200 {
        let stats = dispatcher.stats();
        if stats.sent + stats.failed >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Channels missing their settings are skipped, not fatal
#[tokio::test]
async fn test_dispatcher_skips_unconfigured_channels() {
    let config = NotificationConfig {
        console_enabled: true,
        slack_enabled: true,
        slack_webhook_env: Some("STATUS_TRACKER_TEST_UNSET_SLACK".to_string()),
        telegram_enabled: true,
        webhook_enabled: true,
        webhook_url: None,
        ..NotificationConfig::default()
    };

    let dispatcher = NotificationDispatcher::from_config(&config).unwrap();
    assert_eq!(dispatcher.channel_names(), vec!["console"]);
}

#[tokio::test]
async fn test_new_incident_reaches_webhook_channel() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "event_type": "incident.new",
            "notification": { "service_id": "inc_1", "status": "investigating" }
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let config = NotificationConfig {
        console_enabled: false,
        webhook_enabled: true,
        webhook_url: Some(format!("{}/hook", server.url())),
        ..NotificationConfig::default()
    };
    let dispatcher = Arc::new(NotificationDispatcher::from_config(&config).unwrap());
    let (_, processor) = processor(dispatcher.clone());

    let event = CanonicalEvent::new(
        "openai",
        "inc_1",
        "ChatGPT",
        IncidentStatus::Investigating,
        Severity::Major,
        "Elevated errors",
    );
    processor.process_event(event.clone()).await.unwrap();
    // duplicates never reach the boundary
    processor.process_event(event).await.unwrap();

    wait_for_delivery(&dispatcher, 1).await;
    mock.assert_async().await;
    assert_eq!(dispatcher.stats().queued, 1);
}

#[tokio::test]
async fn test_failed_delivery_keeps_committed_state() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/hook")
        .with_status(500)
        .create_async()
        .await;

    let config = NotificationConfig {
        console_enabled: true,
        webhook_enabled: true,
        webhook_url: Some(format!("{}/hook", server.url())),
        ..NotificationConfig::default()
    };
    let dispatcher = Arc::new(NotificationDispatcher::from_config(&config).unwrap());
    let (store, processor) = processor(dispatcher.clone());

    let outcome = processor
        .process_event(CanonicalEvent::new(
            "openai",
            "inc_f",
            "API",
            IncidentStatus::Identified,
            Severity::Critical,
            "Database failover",
        ))
        .await
        .unwrap();
    assert_eq!(outcome.classification.to_string(), "NEW");

    wait_for_delivery(&dispatcher, 2).await;
    let stats = dispatcher.stats();
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(store.count_incidents().await.unwrap(), 1);
}
