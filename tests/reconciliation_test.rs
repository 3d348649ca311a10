//! End-to-end reconciliation through the shared processor

mod common;

use chrono::{Duration, Utc};
use common::{event, incident_json, Pipeline, RacingStore};
use status_tracker::config::PollingConfig;
use status_tracker::ingest::{CycleOutcome, PollingOrchestrator, WebhookIngestor, WebhookOutcome};
use status_tracker::models::{EventSource, IncidentRecord, IncidentStatus, NotificationKind};
use status_tracker::processing::Classification;
use status_tracker::providers::{OpenAiStatusProvider, ProviderRegistry};
use std::sync::Arc;

#[tokio::test]
async fn test_incident_walkthrough_open_update_repeat_resolve() {
    let pipeline = Pipeline::new();
    let lifecycle = &pipeline.lifecycle;
    let t0 = Utc::now();

    // first sighting
    let a = event("inc_1", IncidentStatus::Investigating, "M1");
    let outcome = lifecycle.apply_at(&a, t0).await.unwrap();
    assert_eq!(outcome.classification, Classification::New);
    assert!(pipeline.audit("openai").await.is_empty());

    // status transition
    let b = event("inc_1", IncidentStatus::Identified, "M2");
    let outcome = lifecycle.apply_at(&b, t0 + Duration::seconds(10)).await.unwrap();
    assert_eq!(outcome.classification, Classification::Changed);
    assert_eq!(outcome.previous_status, Some(IncidentStatus::Investigating));

    // exact repeat
    let before = pipeline.record("openai", "inc_1").await.unwrap();
    let outcome = lifecycle.apply_at(&b, t0 + Duration::seconds(15)).await.unwrap();
    assert_eq!(outcome.classification, Classification::Duplicate);
    assert_eq!(pipeline.record("openai", "inc_1").await.unwrap(), before);

    // resolution
    let d = event("inc_1", IncidentStatus::Resolved, "Fixed");
    let outcome = lifecycle.apply_at(&d, t0 + Duration::seconds(20)).await.unwrap();
    assert_eq!(outcome.classification, Classification::Changed);
    assert_eq!(outcome.record.resolved_at, Some(t0 + Duration::seconds(20)));

    let audit = pipeline.audit("openai").await;
    let pairs: Vec<_> = audit
        .iter()
        .map(|row| (row.previous_status, row.current_status))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (IncidentStatus::Investigating, IncidentStatus::Identified),
            (IncidentStatus::Identified, IncidentStatus::Resolved),
        ]
    );
    assert!(pipeline.lifecycle.active_incidents().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_walkthrough_notifications() {
    let pipeline = Pipeline::new();
    let processor = &pipeline.processor;

    processor
        .process_event(event("inc_1", IncidentStatus::Investigating, "M1"))
        .await
        .unwrap();
    processor
        .process_event(event("inc_1", IncidentStatus::Identified, "M2"))
        .await
        .unwrap();
    processor
        .process_event(event("inc_1", IncidentStatus::Identified, "M2"))
        .await
        .unwrap();
    processor
        .process_event(event("inc_1", IncidentStatus::Resolved, "Fixed"))
        .await
        .unwrap();

    pipeline.sender.settle(3).await;
    assert_eq!(
        pipeline.sender.kinds(),
        vec![
            NotificationKind::New,
            NotificationKind::Updated,
            NotificationKind::Resolved
        ]
    );
}

#[tokio::test]
async fn test_replay_is_idempotent() {
    let pipeline = Pipeline::new();
    let e = event("inc_7", IncidentStatus::Monitoring, "Watching");

    for i in 0..10 {
        let outcome = pipeline.processor.process_event(e.clone()).await.unwrap();
        let expected = if i == 0 {
            Classification::New
        } else {
            Classification::Duplicate
        };
        assert_eq!(outcome.classification, expected);
    }

    assert_eq!(pipeline.store.count_incidents().await.unwrap(), 1);
    assert!(pipeline.audit("openai").await.is_empty());
    pipeline.sender.settle(1).await;
    assert_eq!(pipeline.sender.kinds(), vec![NotificationKind::New]);
}

#[tokio::test]
async fn test_webhook_then_poll_share_one_record() {
    for poll_first in [false, true] {
        let pipeline = Pipeline::new();
        let webhook = event("inc_9", IncidentStatus::Investigating, "Looking");
        let poll = webhook.clone().with_source(EventSource::Polling);

        let (first, second) = if poll_first { (poll, webhook) } else { (webhook, poll) };
        let a = pipeline.processor.process_event(first).await.unwrap();
        let b = pipeline.processor.process_event(second).await.unwrap();

        assert_eq!(a.classification, Classification::New);
        assert_eq!(b.classification, Classification::Duplicate);
        assert_eq!(pipeline.store.count_incidents().await.unwrap(), 1);
    }
}

#[tokio::test]
async fn test_audit_has_one_row_per_real_transition() {
    use IncidentStatus::*;

    let pipeline = Pipeline::new();
    let sequence = [
        Investigating,
        Investigating,
        Identified,
        Monitoring,
        Monitoring,
        Resolved,
        Investigating,
        Resolved,
    ];

    let mut applied = Vec::new();
    for status in sequence {
        let outcome = pipeline
            .processor
            .process_event(event("inc_seq", status, "same message"))
            .await
            .unwrap();
        if outcome.classification != Classification::Duplicate {
            applied.push(status);
        }
    }

    let expected: Vec<_> = applied.windows(2).map(|w| (w[0], w[1])).collect();
    let actual: Vec<_> = pipeline
        .audit("openai")
        .await
        .iter()
        .map(|row| (row.previous_status, row.current_status))
        .collect();

    assert_eq!(applied.len(), 6);
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn test_message_refresh_window_boundary() {
    let pipeline = Pipeline::new();
    let t0 = Utc::now();

    pipeline
        .lifecycle
        .apply_at(&event("inc_w", IncidentStatus::Investigating, "first"), t0)
        .await
        .unwrap();

    let edited = event("inc_w", IncidentStatus::Investigating, "second");
    let at_59 = pipeline
        .lifecycle
        .apply_at(&edited, t0 + Duration::seconds(59))
        .await
        .unwrap();
    assert_eq!(at_59.classification, Classification::Duplicate);

    let at_60 = pipeline
        .lifecycle
        .apply_at(&edited, t0 + Duration::seconds(60))
        .await
        .unwrap();
    assert_eq!(at_60.classification, Classification::Duplicate);

    let at_61 = pipeline
        .lifecycle
        .apply_at(&edited, t0 + Duration::seconds(61))
        .await
        .unwrap();
    assert_eq!(at_61.classification, Classification::Changed);
    assert_eq!(at_61.record.message, "second");

    // message-only refresh still writes an audit row with unchanged status
    let audit = pipeline.audit("openai").await;
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].previous_status, audit[0].current_status);
}

#[tokio::test]
async fn test_lost_create_race_becomes_update() {
    let poll_view = event("inc_r", IncidentStatus::Investigating, "from poll")
        .with_source(EventSource::Polling);
    let racer = IncidentRecord::from_event(&poll_view, Utc::now());
    let pipeline = Pipeline::with_store(Arc::new(RacingStore::new(racer)));

    let outcome = pipeline
        .processor
        .process_event(event("inc_r", IncidentStatus::Identified, "from webhook"))
        .await
        .unwrap();

    assert_eq!(outcome.classification, Classification::Changed);
    assert_eq!(outcome.previous_status, Some(IncidentStatus::Investigating));
    assert_eq!(pipeline.store.count_incidents().await.unwrap(), 1);
    assert_eq!(pipeline.audit("openai").await.len(), 1);
}

#[tokio::test]
async fn test_lost_create_race_with_same_content_is_duplicate() {
    let e = event("inc_s", IncidentStatus::Investigating, "same");
    let racer = IncidentRecord::from_event(&e, Utc::now());
    let pipeline = Pipeline::with_store(Arc::new(RacingStore::new(racer)));

    let outcome = pipeline.processor.process_event(e).await.unwrap();
    assert_eq!(outcome.classification, Classification::Duplicate);
    assert!(pipeline.audit("openai").await.is_empty());
}

#[tokio::test]
async fn test_first_poll_of_resolved_incident_matches_webhook_path() {
    let mut server = mockito::Server::new_async().await;
    let incident = incident_json("inc_1", "resolved", "Fixed");
    let _mock = server
        .mock("GET", "/pages/p1/incidents.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(serde_json::json!({ "incidents": [incident.clone()] }).to_string())
        .create_async()
        .await;

    // poll-only path
    let polled = Pipeline::new();
    let registry = ProviderRegistry::new();
    registry
        .register_provider(Arc::new(
            OpenAiStatusProvider::new(&server.url(), "p1", std::time::Duration::from_secs(5)).unwrap(),
        ))
        .unwrap();
    let polling = PollingOrchestrator::new(
        Arc::new(registry),
        polled.processor.clone(),
        &PollingConfig {
            enabled: true,
            ..PollingConfig::default()
        },
    );
    match polling.run_cycle().await {
        CycleOutcome::Completed(reports) => {
            assert_eq!(reports.len(), 1);
            assert_eq!(reports[0].new, 1);
        }
        other => panic!("unexpected cycle outcome: {:?}", other),
    }

    // webhook-only path
    let pushed = Pipeline::new();
    let ingestor = WebhookIngestor::new(pushed.processor.clone());
    let body = serde_json::json!({ "incident": incident }).to_string();
    let outcome = ingestor.ingest("openai", body.as_bytes()).await.unwrap();
    assert!(matches!(
        outcome,
        WebhookOutcome::Processed {
            classification: Classification::New,
            ..
        }
    ));

    let from_poll = polled.record("openai", "inc_1").await.unwrap();
    let from_push = pushed.record("openai", "inc_1").await.unwrap();
    assert_eq!(from_poll.status, IncidentStatus::Resolved);
    assert!(from_poll.resolved_at.is_some());
    assert_eq!(from_poll.status, from_push.status);
    assert_eq!(from_poll.message, from_push.message);
    assert_eq!(from_poll.severity, from_push.severity);
    assert_eq!(from_poll.content_fingerprint, from_push.content_fingerprint);
    assert!(polled.audit("openai").await.is_empty());

    polled.sender.settle(1).await;
    assert_eq!(polled.sender.kinds(), vec![NotificationKind::New]);
}
