//! Metrics collection for streaming runs.
//!
//! Attach a [`MetricsCollector`] to a [`ChunkedSource`](crate::ChunkedSource)
//! and every enumeration records into it:
//!
//! - [`CHUNKS_RECEIVED`] - non-empty chunks taken from the queue
//! - [`EMPTY_CHUNKS_SKIPPED`] - empty chunks (including completion sentinels)
//! - [`ROWS_YIELDED`] - rows handed to the consumer
//! - [`POLL_TIMEOUTS`] - bounded waits that returned nothing
//! - [`PRODUCER_FAULTS`] - faults surfaced to the consumer
//! - [`CHUNK_SIZE`] - histogram of non-empty chunk sizes
//!
//! plus the wall time between the first pull and the end of the sequence.
//!
//! # Example
//!
//! ```no_run
//! use rowstream::metrics::{MetricsCollector, ROWS_YIELDED};
//! use rowstream::ChunkedSource;
//!
//! # fn main() -> anyhow::Result<()> {
//! let metrics = MetricsCollector::new();
//! let source = ChunkedSource::from_fn("numbers", |sink, _| {
//!     sink.put_rows(vec![1, 2, 3])?;
//!     Ok(())
//! })
//! .with_metrics(metrics.clone());
//!
//! let rows = source.collect_rows()?;
//! metrics.print();
//! assert_eq!(metrics.counter(ROWS_YIELDED), Some(rows.len() as u64));
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::any::Any;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const CHUNKS_RECEIVED: &str = "chunks_received";
pub const EMPTY_CHUNKS_SKIPPED: &str = "empty_chunks_skipped";
pub const ROWS_YIELDED: &str = "rows_yielded";
pub const POLL_TIMEOUTS: &str = "poll_timeouts";
pub const PRODUCER_FAULTS: &str = "producer_faults";
pub const CHUNK_SIZE: &str = "chunk_size";

/// A named value held by a [`MetricsCollector`].
pub trait Metric: Send + Sync + Any {
    /// The name of this metric (e.g., `rows_yielded`).
    fn name(&self) -> &str;

    /// The current value of this metric as a JSON value.
    fn value(&self) -> Value;

    /// Optional description of what this metric measures.
    fn description(&self) -> Option<&str> {
        None
    }

    /// Cast to Any for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Mutable cast, used to update built-in metrics in place.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Thread-safe, cloneable container for stream metrics.
///
/// Clones share the same underlying registry, so a collector handed to a
/// source can be read back by the caller after the run.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsCollectorInner>>,
}

struct MetricsCollectorInner {
    metrics: HashMap<String, Box<dyn Metric>>,
    start_time: Option<Instant>,
    end_time: Option<Instant>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsCollectorInner {
                metrics: HashMap::new(),
                start_time: None,
                end_time: None,
            })),
        }
    }

    /// Record the start of a run. Only the first call takes effect, so
    /// repeated enumerations report the span of all of them.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn record_start(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.start_time.get_or_insert_with(Instant::now);
    }

    /// Record the end of a run.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn record_end(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.end_time = Some(Instant::now());
    }

    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        let inner = self.inner.lock().unwrap();
        match (inner.start_time, inner.end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    /// Add `value` to the counter `name`, creating it at zero if needed.
    ///
    /// A non-counter metric registered under `name` is left untouched.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn increment_counter(&self, name: &str, value: u64) {
        let mut inner = self.inner.lock().unwrap();
        let metric = inner
            .metrics
            .entry(name.to_string())
            .or_insert_with(|| Box::new(CounterMetric::new(name)) as Box<dyn Metric>);
        if let Some(counter) = metric.as_any_mut().downcast_mut::<CounterMetric>() {
            counter.count += value;
        }
    }

    /// Current value of the counter `name`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn counter(&self, name: &str) -> Option<u64> {
        let inner = self.inner.lock().unwrap();
        inner
            .metrics
            .get(name)
            .and_then(|m| m.as_any().downcast_ref::<CounterMetric>())
            .map(|c| c.count)
    }

    /// Record one observation in the histogram `name`, creating it if needed.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn observe(&self, name: &str, value: f64) {
        let mut inner = self.inner.lock().unwrap();
        let metric = inner
            .metrics
            .entry(name.to_string())
            .or_insert_with(|| Box::new(HistogramMetric::new(name)) as Box<dyn Metric>);
        if let Some(hist) = metric.as_any_mut().downcast_mut::<HistogramMetric>() {
            hist.record(value);
        }
    }

    /// All metrics as a JSON object.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let inner = self.inner.lock().unwrap();
        let mut metrics_json = serde_json::Map::new();

        for (name, metric) in &inner.metrics {
            let mut metric_obj = serde_json::Map::new();
            metric_obj.insert("value".to_string(), metric.value());
            if let Some(desc) = metric.description() {
                metric_obj.insert("description".to_string(), json!(desc));
            }
            metrics_json.insert(name.clone(), Value::Object(metric_obj));
        }

        if let (Some(start), Some(end)) = (inner.start_time, inner.end_time) {
            let elapsed_ms = end.duration_since(start).as_millis();
            metrics_json.insert(
                "stream_time_ms".to_string(),
                json!({
                    "value": elapsed_ms,
                    "description": "Wall time from first pull to end of sequence in milliseconds",
                }),
            );
        }
        drop(inner);
        Value::Object(metrics_json)
    }

    /// Print all metrics to stdout in a human-readable format.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn print(&self) {
        println!("\n========== Stream Metrics ==========");

        let inner = self.inner.lock().unwrap();

        if let (Some(start), Some(end)) = (inner.start_time, inner.end_time) {
            let elapsed = end.duration_since(start);
            println!(
                "Stream Time: {:.3}s ({} ms)",
                elapsed.as_secs_f64(),
                elapsed.as_millis()
            );
            println!("------------------------------------");
        }

        let mut sorted_metrics: Vec<_> = inner.metrics.iter().collect();
        sorted_metrics.sort_by_key(|(name, _)| *name);
        for (name, metric) in sorted_metrics {
            if let Some(desc) = metric.description() {
                println!("{}: {} ({})", name, metric.value(), desc);
            } else {
                println!("{}: {}", name, metric.value());
            }
        }
        drop(inner);
        println!("====================================\n");
    }

    /// Save all metrics to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted = serde_json::to_string_pretty(&self.to_json())?;
        let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        file.write_all(formatted.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Snapshot of all metric names and values.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Value> {
        let inner = self.inner.lock().unwrap();
        inner
            .metrics
            .iter()
            .map(|(name, metric)| (name.clone(), metric.value()))
            .collect()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

// ========== Built-in Metrics ==========

/// A monotonically increasing counter.
pub struct CounterMetric {
    name: String,
    count: u64,
}

impl CounterMetric {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: 0,
        }
    }
}

impl Metric for CounterMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Value {
        json!(self.count)
    }

    fn description(&self) -> Option<&str> {
        match self.name.as_str() {
            CHUNKS_RECEIVED => Some("Non-empty chunks taken from the queue"),
            EMPTY_CHUNKS_SKIPPED => Some("Empty chunks and completion sentinels skipped"),
            ROWS_YIELDED => Some("Rows handed to the consumer"),
            POLL_TIMEOUTS => Some("Bounded waits that returned no chunk"),
            PRODUCER_FAULTS => Some("Producer faults surfaced to the consumer"),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Distribution of observed values.
pub struct HistogramMetric {
    name: String,
    values: Vec<f64>,
}

impl HistogramMetric {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn record(&mut self, value: f64) {
        self.values.push(value);
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> HistogramStats {
        if self.values.is_empty() {
            return HistogramStats::default();
        }

        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();
        HistogramStats {
            count,
            sum,
            mean: sum / count as f64,
            min: sorted[0],
            max: sorted[count - 1],
            p50: sorted[count / 2],
            p95: sorted[(count * 95) / 100],
        }
    }
}

impl Metric for HistogramMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Value {
        let stats = self.stats();
        json!({
            "count": stats.count,
            "sum": stats.sum,
            "mean": stats.mean,
            "min": stats.min,
            "max": stats.max,
            "p50": stats.p50,
            "p95": stats.p95,
        })
    }

    fn description(&self) -> Option<&str> {
        (self.name == CHUNK_SIZE).then_some("Rows per non-empty chunk")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Statistics computed from a histogram.
#[derive(Debug, Clone, Default)]
pub struct HistogramStats {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
}
