//! Tests for the metrics module.

use anyhow::Result;
use rowstream::metrics::{
    CHUNK_SIZE, CHUNKS_RECEIVED, CounterMetric, EMPTY_CHUNKS_SKIPPED, HistogramMetric, Metric,
    MetricsCollector, PRODUCER_FAULTS, ROWS_YIELDED,
};
use rowstream::testing::ScriptedProducer;
use rowstream::{ChunkedSource, StreamConfig};
use serde_json::json;
use std::time::Duration;

#[macro_use]
mod macros;

fn fast() -> StreamConfig {
    StreamConfig::default().with_poll_interval(Duration::from_millis(5))
}

#[test]
fn counters_are_created_on_first_increment() {
    let collector = MetricsCollector::new();
    assert_eq!(collector.counter(ROWS_YIELDED), None);
    collector.increment_counter(ROWS_YIELDED, 5);

    let snapshot = collector.snapshot();
    assert_eq!(snapshot.get(ROWS_YIELDED).unwrap(), &json!(5));
    assert_eq!(collector.counter(ROWS_YIELDED), Some(5));

    let counter = CounterMetric::new(ROWS_YIELDED);
    assert_eq!(counter.value(), json!(0));
    assert_eq!(counter.description(), Some("Rows handed to the consumer"));
    assert_eq!(CounterMetric::new("custom").description(), None);
}

#[test]
fn histogram_created_on_first_observation() {
    let collector = MetricsCollector::new();
    for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
        collector.observe("test_hist", v);
    }

    let snapshot = collector.snapshot();
    let hist_value = snapshot.get("test_hist").unwrap();
    assert_eq!(hist_value["count"], json!(5));
    assert_eq!(hist_value["mean"], json!(3.0));
    assert_eq!(hist_value["p50"], json!(3.0));
}

#[test]
fn histogram_stats() {
    let mut hist = HistogramMetric::new("sizes");
    for v in [10.0, 2.0, 6.0, 4.0] {
        hist.record(v);
    }
    let stats = hist.stats();
    assert_eq!(stats.count, 4);
    assert_approx_eq!(stats.sum, 22.0);
    assert_approx_eq!(stats.mean, 5.5);
    assert_approx_eq!(stats.min, 2.0);
    assert_approx_eq!(stats.max, 10.0);
    assert_eq!(hist.name(), "sizes");
}

#[test]
fn increment_counter_accumulates() {
    let collector = MetricsCollector::new();
    collector.increment_counter("requests", 1);
    collector.increment_counter("requests", 5);

    let snapshot = collector.snapshot();
    assert_eq!(snapshot.get("requests").unwrap(), &json!(6));
}

#[test]
fn increment_leaves_other_metric_kinds_alone() {
    let collector = MetricsCollector::new();
    collector.observe("mixed", 1.0);
    collector.increment_counter("mixed", 3);
    assert_eq!(collector.counter("mixed"), None);
    assert_eq!(collector.snapshot()["mixed"]["count"], json!(1));
}

#[test]
fn default_collector_is_empty() {
    let collector = MetricsCollector::default();
    assert!(collector.snapshot().is_empty());
    assert!(collector.elapsed().is_none());
}

#[test]
fn clones_share_state() {
    let collector = MetricsCollector::new();
    let clone = collector.clone();
    clone.increment_counter("shared", 2);
    assert_eq!(collector.counter("shared"), Some(2));
}

#[test]
fn stream_run_records_counters() -> Result<()> {
    let metrics = MetricsCollector::new();
    let script = ScriptedProducer::new()
        .push(vec![1, 2, 3])
        .push(vec![])
        .push(vec![4, 5]);
    let source = ChunkedSource::new("counted", script)
        .with_config(fast())
        .with_metrics(metrics.clone());

    let rows = source.collect_rows()?;
    assert_eq!(rows.len(), 5);

    assert_eq!(metrics.counter(ROWS_YIELDED), Some(5));
    assert_eq!(metrics.counter(CHUNKS_RECEIVED), Some(2));
    // the empty chunk plus the completion sentinel
    assert_eq!(metrics.counter(EMPTY_CHUNKS_SKIPPED), Some(2));
    assert_eq!(metrics.counter(PRODUCER_FAULTS), None);

    let sizes = &metrics.snapshot()[CHUNK_SIZE];
    assert_eq!(sizes["count"], json!(2));
    assert_eq!(sizes["max"], json!(3.0));
    assert!(metrics.elapsed().is_some());
    Ok(())
}

#[test]
fn stream_fault_is_counted() {
    let metrics = MetricsCollector::new();
    let source = ChunkedSource::new("faulty", ScriptedProducer::new().push(vec![1]).fail("nope"))
        .with_config(fast())
        .with_metrics(metrics.clone());

    assert!(source.collect_rows().is_err());
    assert_eq!(metrics.counter(PRODUCER_FAULTS), Some(1));
    assert_eq!(metrics.counter(ROWS_YIELDED), Some(1));
}

#[test]
fn to_json_and_save_to_file() -> Result<()> {
    let metrics = MetricsCollector::new();
    let source = ChunkedSource::new("saved", ScriptedProducer::new().push(vec!['a', 'b']))
        .with_config(fast())
        .with_metrics(metrics.clone());
    source.collect_rows()?;

    let value = metrics.to_json();
    assert_eq!(value[ROWS_YIELDED]["value"], json!(2));
    assert_eq!(
        value[ROWS_YIELDED]["description"],
        json!("Rows handed to the consumer")
    );
    assert!(value["stream_time_ms"]["value"].is_u64());
    assert_eq!(
        value[CHUNK_SIZE]["description"],
        json!("Rows per non-empty chunk")
    );

    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("metrics.json");
    metrics.save_to_file(&path)?;
    let back: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(back, value);
    Ok(())
}

#[test]
fn save_to_missing_directory_fails() {
    let metrics = MetricsCollector::new();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("no-such-dir").join("metrics.json");
    let err = metrics.save_to_file(&path).unwrap_err();
    assert!(err.to_string().starts_with("create "));
}
