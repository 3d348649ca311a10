//! Criterion benchmarks for change detection and the in-memory pipeline

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use status_tracker::models::{content_fingerprint, CanonicalEvent, IncidentRecord, IncidentStatus, Severity};
use status_tracker::processing::{ChangeDetector, IncidentLifecycle};
use status_tracker::state::{InMemoryStore, StatusCache, StatusStore};
use std::sync::Arc;

fn event(service_id: &str, status: IncidentStatus, message: &str) -> CanonicalEvent {
    CanonicalEvent::new("openai", service_id, "ChatGPT", status, Severity::Major, message)
}

fn bench_classify(c: &mut Criterion) {
    let detector = ChangeDetector::default();
    let now = Utc::now();
    let stored = IncidentRecord::from_event(
        &event("inc_1", IncidentStatus::Investigating, "Elevated error rates"),
        now - Duration::minutes(5),
    );

    let mut group = c.benchmark_group("classify");
    group.bench_function("new", |b| {
        let e = event("inc_1", IncidentStatus::Investigating, "Elevated error rates");
        b.iter(|| detector.classify(black_box(&e), None, now));
    });
    group.bench_function("duplicate", |b| {
        let e = event("inc_1", IncidentStatus::Investigating, "ELEVATED ERROR RATES");
        b.iter(|| detector.classify(black_box(&e), Some(&stored), now));
    });
    group.bench_function("changed", |b| {
        let e = event("inc_1", IncidentStatus::Resolved, "Fixed");
        b.iter(|| detector.classify(black_box(&e), Some(&stored), now));
    });
    group.finish();
}

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");
    for size in [32usize, 512, 4096] {
        let message = "x".repeat(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &message, |b, message| {
            b.iter(|| content_fingerprint("inc_1", IncidentStatus::Monitoring, black_box(message)));
        });
    }
    group.finish();
}

fn bench_lifecycle_replay(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let store: Arc<dyn StatusStore> = Arc::new(InMemoryStore::new());
    let lifecycle = IncidentLifecycle::new(
        store,
        StatusCache::disabled(),
        ChangeDetector::default(),
        3,
    );

    let e = event("inc_bench", IncidentStatus::Identified, "Root cause found");
    runtime.block_on(lifecycle.apply(&e)).unwrap();

    c.bench_function("lifecycle_duplicate_replay", |b| {
        b.to_async(&runtime)
            .iter(|| async { lifecycle.apply(black_box(&e)).await.unwrap() });
    });
}

criterion_group!(benches, bench_classify, bench_fingerprint, bench_lifecycle_replay);
criterion_main!(benches);
