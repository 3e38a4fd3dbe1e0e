//! Table statistics and their export.
//!
//! Every [`ReducePreTable`](crate::ReducePreTable) keeps a [`TableStats`] block of
//! plain counters, updated on the insert and drain paths and readable at any time
//! through [`stats()`](crate::ReducePreTable::stats).
//!
//! With the `metrics` feature (on by default) those counters can be published into
//! a [`MetricsCollector`], a small name → JSON value registry that can also hold
//! the caller's own metrics, be printed, or be saved as a JSON file.
//!
//! # Example
//!
//! ```
//! use prereduce::metrics::MetricsCollector;
//! use prereduce::{ReducePreTable, TableConfig, combiners::sum_by_key};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut table = ReducePreTable::new(
//!     TableConfig::default(),
//!     sum_by_key::<u64>(),
//!     vec![Vec::<Vec<u8>>::new()],
//! )?;
//! table.insert(("a".to_string(), 1))?;
//! table.insert(("a".to_string(), 2))?;
//!
//! let metrics = MetricsCollector::new();
//! table.stats().publish(&metrics);
//! assert_eq!(metrics.snapshot()["table_combines"], serde_json::json!(1));
//! # Ok(())
//! # }
//! ```

use serde::Serialize;

/// Counters maintained by a table over its lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    /// Values passed to `insert`.
    pub inserts: u64,
    /// Inserts that hit an existing key and were combined.
    pub combines: u64,
    /// Inserts that created a new entry.
    pub new_entries: u64,
    /// Table-wide bucket resizes.
    pub resizes: u64,
    /// Partitions drained because the table went over `max_table_items`.
    pub auto_spills: u64,
    /// Partitions drained by an explicit flush (empty partitions not counted).
    pub explicit_drains: u64,
    /// Records handed to sinks.
    pub records_emitted: u64,
}

impl TableStats {
    /// Share of inserts absorbed by combining, in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn reduction_ratio(&self) -> f64 {
        if self.inserts == 0 {
            0.0
        } else {
            self.combines as f64 / self.inserts as f64
        }
    }
}

#[cfg(feature = "metrics")]
pub use collector::*;

#[cfg(feature = "metrics")]
mod collector {
    use anyhow::Result;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

    use super::TableStats;

    /// A named value that can be reported.
    pub trait Metric: Send + Sync {
        /// The name of this metric (e.g., `table_resizes`).
        fn name(&self) -> &str;

        /// The current value of this metric as a JSON value.
        fn value(&self) -> Value;

        /// Optional description of what this metric measures.
        fn description(&self) -> Option<&str> {
            None
        }
    }

    /// Thread-safe registry of metrics.
    ///
    /// Cloning shares the registry, so one collector can be handed to several
    /// tables (one per worker) and read once at the end.
    #[derive(Clone, Default)]
    pub struct MetricsCollector {
        inner: Arc<Mutex<HashMap<String, Box<dyn Metric>>>>,
    }

    impl MetricsCollector {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        fn lock(&self) -> MutexGuard<'_, HashMap<String, Box<dyn Metric>>> {
            self.inner.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Register a metric, replacing any metric with the same name.
        pub fn register(&self, metric: Box<dyn Metric>) {
            self.lock().insert(metric.name().to_string(), metric);
        }

        /// Set a counter to `value`, creating it if needed.
        pub fn set_counter(&self, name: &str, value: u64) {
            self.register(Box::new(CounterMetric::with_value(name, value)));
        }

        /// Add `value` to a counter, creating it at zero if needed.
        ///
        /// A non-counter metric registered under `name` is replaced.
        pub fn add_to_counter(&self, name: &str, value: u64) {
            let mut inner = self.lock();
            let current = inner
                .get(name)
                .and_then(|m| m.value().as_u64())
                .unwrap_or(0);
            inner.insert(
                name.to_string(),
                Box::new(CounterMetric::with_value(name, current.saturating_add(value))),
            );
        }

        /// Set a gauge to `value`, creating it if needed.
        pub fn set_gauge(&self, name: &str, value: f64) {
            self.register(Box::new(GaugeMetric::new(name, value)));
        }

        /// Names and current values of every metric.
        #[must_use]
        pub fn snapshot(&self) -> HashMap<String, Value> {
            self.lock()
                .iter()
                .map(|(name, metric)| (name.clone(), metric.value()))
                .collect()
        }

        /// Every metric as `{ name: { value, description? } }`.
        #[must_use]
        pub fn to_json(&self) -> Value {
            let inner = self.lock();
            let mut metrics_json = serde_json::Map::new();
            for (name, metric) in inner.iter() {
                let mut metric_obj = serde_json::Map::new();
                metric_obj.insert("value".to_string(), metric.value());
                if let Some(desc) = metric.description() {
                    metric_obj.insert("description".to_string(), json!(desc));
                }
                metrics_json.insert(name.clone(), Value::Object(metric_obj));
            }
            drop(inner);
            Value::Object(metrics_json)
        }

        /// Print all metrics to stdout, sorted by name.
        pub fn print(&self) {
            println!("\n========== Pre-aggregation Metrics ==========");
            let inner = self.lock();
            let mut sorted: Vec<_> = inner.iter().collect();
            sorted.sort_by_key(|(name, _)| *name);
            for (name, metric) in sorted {
                match metric.description() {
                    Some(desc) => println!("{}: {} ({})", name, metric.value(), desc),
                    None => println!("{}: {}", name, metric.value()),
                }
            }
            drop(inner);
            println!("=============================================\n");
        }

        /// Save all metrics to a JSON file.
        ///
        /// # Errors
        ///
        /// Returns an error if the file cannot be created or written to.
        pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
            let formatted = serde_json::to_string_pretty(&self.to_json())?;
            let mut file = File::create(path)?;
            file.write_all(formatted.as_bytes())?;
            Ok(())
        }
    }

    /// A monotonically reported count.
    pub struct CounterMetric {
        name: String,
        count: u64,
    }

    impl CounterMetric {
        pub fn new(name: impl Into<String>) -> Self {
            Self::with_value(name, 0)
        }

        pub fn with_value(name: impl Into<String>, count: u64) -> Self {
            Self {
                name: name.into(),
                count,
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
    }

    /// A gauge metric that holds a single numeric value.
    pub struct GaugeMetric {
        name: String,
        value: f64,
        description: Option<String>,
    }

    impl GaugeMetric {
        pub fn new(name: impl Into<String>, value: f64) -> Self {
            Self {
                name: name.into(),
                value,
                description: None,
            }
        }

        #[must_use]
        pub fn with_description(mut self, description: impl Into<String>) -> Self {
            self.description = Some(description.into());
            self
        }
    }

    impl Metric for GaugeMetric {
        fn name(&self) -> &str {
            &self.name
        }

        fn value(&self) -> Value {
            json!(self.value)
        }

        fn description(&self) -> Option<&str> {
            self.description.as_deref()
        }
    }

    impl TableStats {
        /// Add these counters to `collector` under `table_*` names.
        ///
        /// Counters accumulate, so several tables can publish into one collector.
        pub fn publish(&self, collector: &MetricsCollector) {
            self.publish_with_prefix(collector, "table");
        }

        /// Like [`publish`](Self::publish) with a custom name prefix.
        pub fn publish_with_prefix(&self, collector: &MetricsCollector, prefix: &str) {
            let counters = [
                ("inserts", self.inserts),
                ("combines", self.combines),
                ("new_entries", self.new_entries),
                ("resizes", self.resizes),
                ("auto_spills", self.auto_spills),
                ("explicit_drains", self.explicit_drains),
                ("records_emitted", self.records_emitted),
            ];
            for (name, value) in counters {
                collector.add_to_counter(&format!("{prefix}_{name}"), value);
            }
        }
    }
}
