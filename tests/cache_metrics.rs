mod support;

use std::collections::HashMap;
use std::sync::Arc;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshot};
use ordervault::application::ingest::{DEFAULT_MAX_MESSAGE_BYTES, IngestPipeline};
use ordervault::application::repos::OrdersRepo;
use ordervault::cache::CachedOrders;
use ordervault::domain::sample::{corrupt, sample_order};

use support::MemoryOrders;

/// Counter values keyed by `name` or `name{label=value}`.
fn counters(snapshot: Snapshot) -> (HashMap<String, u64>, Vec<String>) {
    let mut values = HashMap::new();
    let mut names = Vec::new();
    for (composite_key, _, _, value) in snapshot.into_vec() {
        let key = composite_key.key();
        names.push(key.name().to_string());
        if let DebugValue::Counter(count) = value {
            let labels: Vec<String> = key
                .labels()
                .map(|label| format!("{}={}", label.key(), label.value()))
                .collect();
            let id = if labels.is_empty() {
                key.name().to_string()
            } else {
                format!("{}{{{}}}", key.name(), labels.join(","))
            };
            *values.entry(id).or_insert(0) += count;
        }
    }
    (values, names)
}

#[tokio::test]
async fn cache_and_ingest_paths_emit_expected_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let store = Arc::new(MemoryOrders::with_orders([sample_order("warm")]));
    let cache = Arc::new(CachedOrders::load(store.clone()).await.expect("warm"));

    // One hit, one filled miss, one not-found miss.
    cache.get_order("warm").await.expect("hit");
    store
        .create_order(&sample_order("behind"))
        .await
        .expect("direct write");
    cache.get_order("behind").await.expect("miss");
    assert!(cache.get_order("absent").await.is_err());

    let pipeline = IngestPipeline::new(cache.clone(), DEFAULT_MAX_MESSAGE_BYTES);
    let valid = serde_json::to_vec(&sample_order("ingested")).expect("encode");
    let mut invalid = sample_order("broken");
    corrupt(&mut invalid);
    let invalid = serde_json::to_vec(&invalid).expect("encode");

    pipeline.handle(&valid).await;
    pipeline.handle(&valid).await;
    pipeline.handle(&invalid).await;
    pipeline.handle(b"not json").await;

    let (values, names) = counters(snapshotter.snapshot());

    for metric in [
        "ordervault_cache_hit_total",
        "ordervault_cache_miss_total",
        "ordervault_cache_entries",
        "ordervault_cache_warm_ms",
        "ordervault_ingest_messages_total",
    ] {
        assert!(
            names.iter().any(|name| name == metric),
            "missing metric: {metric}"
        );
    }

    assert_eq!(values["ordervault_cache_hit_total"], 1);
    assert_eq!(values["ordervault_cache_miss_total"], 2);
    for (outcome, expected) in [
        ("persisted", 1),
        ("duplicate", 1),
        ("rejected_validation", 1),
        ("rejected_decode", 1),
    ] {
        let key = format!("ordervault_ingest_messages_total{{outcome={outcome}}}");
        assert_eq!(values.get(&key), Some(&expected), "{key}");
    }
}
