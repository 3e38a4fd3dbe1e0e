//! # prereduce
//!
//! A **local pre-aggregation table** for the map side of a keyed reduce.
//!
//! Before a worker ships `(key, value)` records to the peers that own each key, it
//! can combine records sharing a key locally and ship one record per key instead.
//! [`ReducePreTable`] does that combining under a fixed memory budget:
//!
//! - every key lands in the partition the downstream shuffle would route it to
//! - values for the same key are combined in place as they arrive
//! - bucket chains that get too long trigger a table-wide resize
//! - once the table holds too many entries, partitions are spilled to their sinks
//!
//! ## Quick Start
//!
//! ```
//! use prereduce::*;
//! use prereduce::channel::MemoryChannel;
//! use prereduce::combiners::sum_by_key;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! // one output channel per partition
//! let channels = vec![MemoryChannel::new(), MemoryChannel::new()];
//! let emitters: Vec<_> = channels.iter().map(MemoryChannel::emitter).collect();
//!
//! let config = TableConfig::with_partitions(2);
//! let mut table = ReducePreTable::new(config, sum_by_key::<u64>(), emitters)?;
//! for word in "the quick fox jumps over the lazy dog the end".split_whitespace() {
//!     table.insert((word.to_string(), 1))?;
//! }
//! assert_eq!(table.size(), 8);
//! table.finish()?;
//!
//! // each distinct word was emitted once, by the partition that owns it
//! let mut counts: Vec<(String, u64)> = Vec::new();
//! for channel in &channels {
//!     counts.extend(channel.reader().decode_all::<(String, u64), _>(&PostcardCodec)?);
//! }
//! assert_eq!(counts.len(), 8);
//! assert!(counts.contains(&("the".to_string(), 3)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Reducer
//!
//! A [`Reducer<T>`] extracts the key of a value and folds a new value into the
//! accumulated one for that key. Use [`FnReducer`] for closures or the
//! [`combiners`] module for `(K, V)` pairs ([`sum_by_key`](combiners::sum_by_key),
//! [`ByKey`](combiners::ByKey) over [`Sum`](combiners::Sum), [`Min`](combiners::Min),
//! [`Max`](combiners::Max), ...).
//!
//! ### Partitions and routing
//!
//! A [`PartitionRouter`] maps a key hash to `hash % num_partitions`. The table never
//! moves a key to another partition, so whatever it emits for partition `i` can go
//! straight to the consumer of partition `i`. Pick the [`BuildHasher`](std::hash::BuildHasher)
//! the shuffle uses; [`DefaultBuildHasher`] is deterministic across processes and
//! [`IdentityBuildHasher`] routes integer keys by plain modulo.
//!
//! ### Sinks and codecs
//!
//! Each partition is bound to one [`Emitter`]. When a partition is drained, every
//! accumulated value is encoded with the table's [`Codec`] ([`PostcardCodec`] by
//! default) and emitted as one record. The [`channel`] module has an in-process
//! block queue to use as a sink and read records back.
//!
//! ### Budgets
//!
//! [`TableConfig`] carries the thresholds:
//! - `max_items_per_bucket`: longest chain allowed before the buckets grow
//! - `max_table_items`: live entries allowed before partitions spill
//! - [`SpillPolicy`]: spill the largest partitions first, or everything at once
//!
//! ## Feature Flags
//!
//! - `metrics` (default) - [`MetricsCollector`](metrics::MetricsCollector) and
//!   [`TableStats::publish`](metrics::TableStats)
//!
//! ## Module Overview
//!
//! - [`table`] - the [`ReducePreTable`] itself
//! - [`config`] - [`TableConfig`] and [`SpillPolicy`]
//! - [`partition`] - key routing and hashers
//! - [`reducer`] / [`combiners`] - key extraction and combine functions
//! - [`codec`] / [`emitter`] - record encoding and sinks
//! - [`channel`] - in-memory sink with read-back
//! - [`metrics`] - table counters and export
//! - [`testing`] - assertions and fixtures for tests

mod bucket;
pub mod channel;
pub mod codec;
pub mod combiners;
pub mod config;
pub mod emitter;
pub mod error;
pub mod metrics;
pub mod partition;
pub mod reducer;
pub mod table;
pub mod testing;

// General re-exports
pub use codec::{Codec, JsonCodec, PostcardCodec};
pub use config::{SpillPolicy, TableConfig};
pub use emitter::Emitter;
pub use error::{CodecError, TableError};
pub use metrics::TableStats;
pub use partition::{DefaultBuildHasher, IdentityBuildHasher, IdentityHasher, PartitionRouter};
pub use reducer::{FnReducer, Reducer};
pub use table::ReducePreTable;
