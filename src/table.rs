//! The pre-aggregation hash table.
//!
//! [`ReducePreTable`] sits in front of a keyed shuffle. Every value inserted is
//! routed to the partition the shuffle would send it to, and combined in place with
//! the value already held for its key there. The table keeps two budgets:
//!
//! - **chain length**: when a new entry makes any bucket chain longer than
//!   `max_items_per_bucket`, every partition's bucket array is multiplied by
//!   `bucket_resize_scale` and the entries are re-threaded
//! - **live entries**: when the table holds more than `max_table_items` entries,
//!   partitions are drained into their emitters according to the
//!   [`SpillPolicy`]
//!
//! Draining encodes each accumulated value with the table's [`Codec`] and hands the
//! bytes to the partition's [`Emitter`]. Nothing is kept afterwards; the partition
//! starts over with its initial bucket count.
//!
//! # Example
//!
//! ```
//! use prereduce::{PostcardCodec, ReducePreTable, TableConfig};
//! use prereduce::channel::MemoryChannel;
//! use prereduce::combiners::sum_by_key;
//!
//! # fn main() -> anyhow::Result<()> {
//! let channel = MemoryChannel::new();
//! let config = TableConfig::default().max_table_items(2);
//! let mut table = ReducePreTable::new(config, sum_by_key::<u64>(), vec![channel.emitter()])?;
//!
//! table.insert(("a".to_string(), 1))?;
//! table.insert(("a".to_string(), 1))?;
//! table.insert(("b".to_string(), 1))?;
//! assert_eq!(table.size(), 2);
//!
//! // a third key goes over the budget and spills the only partition
//! table.insert(("c".to_string(), 1))?;
//! assert_eq!(table.size(), 0);
//!
//! let mut spilled: Vec<(String, u64)> = channel.reader().decode_all(&PostcardCodec)?;
//! spilled.sort();
//! assert_eq!(spilled, vec![("a".into(), 2), ("b".into(), 1), ("c".into(), 1)]);
//! # Ok(())
//! # }
//! ```

use std::cmp::Reverse;
use std::hash::BuildHasher;

use anyhow::Context;

use crate::bucket::{PartitionStore, Upsert};
use crate::codec::{Codec, PostcardCodec};
use crate::config::{SpillPolicy, TableConfig, validate_max_table_items};
use crate::emitter::Emitter;
use crate::error::{Result, TableError};
use crate::metrics::TableStats;
use crate::partition::{DefaultBuildHasher, PartitionRouter};
use crate::reducer::Reducer;

/// Partition-aware pre-aggregation table.
///
/// - `T`: value type; the key is derived from it by `R`
/// - `R`: key extraction and combine, see [`Reducer`]
/// - `E`: one sink per partition
/// - `C`: record codec used when draining, [`PostcardCodec`] by default
/// - `S`: key hasher; must match the downstream shuffle's
///
/// The table is single-threaded. Run one instance per worker.
pub struct ReducePreTable<T, R, E, C = PostcardCodec, S = DefaultBuildHasher>
where
    R: Reducer<T>,
    E: Emitter,
    C: Codec<T>,
    S: BuildHasher,
{
    config: TableConfig,
    reducer: R,
    codec: C,
    router: PartitionRouter<S>,
    partitions: Vec<PartitionStore<R::Key, T>>,
    emitters: Vec<E>,
    size: usize,
    stats: TableStats,
}

impl<T, R, E> ReducePreTable<T, R, E>
where
    R: Reducer<T>,
    E: Emitter,
    PostcardCodec: Codec<T>,
{
    /// Build a table with the postcard codec and the default hasher.
    ///
    /// `emitters[i]` receives the records of partition `i`.
    ///
    /// # Errors
    ///
    /// [`TableError::InvalidConfig`] if `config` fails validation or the number of
    /// emitters differs from `config.num_partitions`;
    /// [`TableError::ResourceExhausted`] if the initial buckets cannot be allocated.
    pub fn new(config: TableConfig, reducer: R, emitters: Vec<E>) -> Result<Self> {
        Self::with_parts(
            config,
            reducer,
            emitters,
            PostcardCodec,
            DefaultBuildHasher::default(),
        )
    }
}

impl<T, R, E, C, S> ReducePreTable<T, R, E, C, S>
where
    R: Reducer<T>,
    E: Emitter,
    C: Codec<T>,
    S: BuildHasher,
{
    /// Build a table with an explicit codec and key hasher.
    ///
    /// # Errors
    ///
    /// Same as [`new`](ReducePreTable::new).
    pub fn with_parts(
        config: TableConfig,
        reducer: R,
        emitters: Vec<E>,
        codec: C,
        hasher: S,
    ) -> Result<Self> {
        config.validate()?;
        if emitters.len() != config.num_partitions {
            return Err(TableError::invalid_config(format!(
                "expected one emitter per partition ({}), got {}",
                config.num_partitions,
                emitters.len()
            )));
        }

        let partitions = (0..config.num_partitions)
            .map(|_| PartitionStore::with_buckets(config.initial_buckets_per_partition))
            .collect::<Result<Vec<_>>>()?;
        let router = PartitionRouter::new(config.num_partitions, hasher);

        log::debug!(
            "pre-aggregation table: {} partitions x {} buckets, max {} items per bucket, max {} items",
            config.num_partitions,
            config.initial_buckets_per_partition,
            config.max_items_per_bucket,
            config.max_table_items
        );

        Ok(Self {
            config,
            reducer,
            codec,
            router,
            partitions,
            emitters,
            size: 0,
            stats: TableStats::default(),
        })
    }

    /// Combine `value` into the table.
    ///
    /// The first value seen for a key becomes its accumulator; later values are
    /// folded in with [`Reducer::reduce`]. Before returning, the table grows its
    /// buckets if the value opened an over-long chain and spills partitions if it
    /// went over `max_table_items`, so `size() <= max_size()` always holds after a
    /// successful insert.
    ///
    /// # Errors
    ///
    /// [`TableError::ResourceExhausted`] if storage cannot grow, or any codec or
    /// sink error raised by a spill. After a spill error the partition being drained
    /// has lost its remaining entries.
    pub fn insert(&mut self, value: T) -> Result<()> {
        self.stats.inserts += 1;

        let key = self.reducer.key(&value);
        let hash = self.router.hash_key(&key);
        let partition = self.router.partition_of_hash(hash);
        let store = &mut self.partitions[partition];
        let bucket = self.router.bucket_of_hash(hash, store.num_buckets());

        let reducer = &self.reducer;
        let outcome = store.upsert(bucket, hash, key, value, |acc, incoming| {
            reducer.reduce(acc, incoming);
        })?;

        match outcome {
            Upsert::Combined => self.stats.combines += 1,
            Upsert::Inserted { chain_len } => {
                self.size += 1;
                self.stats.new_entries += 1;
                log::trace!("new key in partition {partition}, bucket {bucket} (chain {chain_len})");
                if chain_len > self.config.max_items_per_bucket {
                    self.resize()?;
                }
            }
        }

        if self.size > self.config.max_table_items {
            self.spill()?;
        }
        Ok(())
    }

    /// Drain every partition into its emitter.
    ///
    /// # Errors
    ///
    /// The first codec or sink error. Partitions after the failing one are left
    /// untouched.
    pub fn flush(&mut self) -> Result<()> {
        for id in 0..self.partitions.len() {
            self.explicit_drain(id)?;
        }
        Ok(())
    }

    /// Drain one partition into its emitter and return how many records it emitted.
    /// Draining an empty partition does nothing and returns 0.
    ///
    /// # Errors
    ///
    /// [`TableError::PartitionOutOfRange`] for an unknown id (the table is
    /// unchanged), otherwise the first codec or sink error.
    pub fn flush_partition(&mut self, partition: usize) -> Result<usize> {
        self.check_partition(partition)?;
        self.explicit_drain(partition)
    }

    /// Live entries across all partitions.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Live entries in one partition.
    ///
    /// # Errors
    ///
    /// [`TableError::PartitionOutOfRange`] for an unknown id.
    pub fn partition_size(&self, partition: usize) -> Result<usize> {
        self.check_partition(partition)?;
        Ok(self.partitions[partition].len())
    }

    /// Buckets across all partitions.
    #[must_use]
    pub fn num_buckets(&self) -> usize {
        self.partitions.iter().map(PartitionStore::num_buckets).sum()
    }

    #[inline]
    #[must_use]
    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// The current spill threshold.
    #[inline]
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.config.max_table_items
    }

    /// Change the spill threshold.
    ///
    /// Lowering it below the current size does not spill right away; the next
    /// insert brings the table back under the new threshold.
    ///
    /// # Errors
    ///
    /// [`TableError::InvalidConfig`] if `max_table_items` is 0.
    pub fn set_max_size(&mut self, max_table_items: usize) -> Result<()> {
        validate_max_table_items(max_table_items)?;
        log::debug!(
            "max table items {} -> {max_table_items}",
            self.config.max_table_items
        );
        self.config.max_table_items = max_table_items;
        Ok(())
    }

    /// Configuration in effect (including any [`set_max_size`](Self::set_max_size)).
    #[must_use]
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// The router used to place keys; the shuffle side can use an equal one.
    #[must_use]
    pub fn router(&self) -> &PartitionRouter<S> {
        &self.router
    }

    /// Partition `value` would be combined in.
    #[must_use]
    pub fn partition_of(&self, value: &T) -> usize {
        self.router.route(&self.reducer.key(value))
    }

    /// The sinks, indexed by partition.
    #[must_use]
    pub fn emitters(&self) -> &[E] {
        &self.emitters
    }

    /// Counters since construction.
    #[must_use]
    pub fn stats(&self) -> TableStats {
        self.stats
    }

    /// Longest bucket chain in the table.
    #[must_use]
    pub fn max_chain_len(&self) -> usize {
        self.partitions
            .iter()
            .map(PartitionStore::max_chain_len)
            .max()
            .unwrap_or(0)
    }

    /// Key and accumulated value of every live entry in one partition, in
    /// unspecified order.
    ///
    /// # Errors
    ///
    /// [`TableError::PartitionOutOfRange`] for an unknown id.
    pub fn entries(&self, partition: usize) -> Result<impl Iterator<Item = (&R::Key, &T)> + '_> {
        self.check_partition(partition)?;
        Ok(self.partitions[partition].iter())
    }

    /// Drain everything and hand the emitters back, flushed.
    ///
    /// # Errors
    ///
    /// Same as [`flush`](Self::flush); the emitters are dropped with the table.
    pub fn finish(mut self) -> Result<Vec<E>> {
        self.flush()?;
        Ok(std::mem::take(&mut self.emitters))
    }

    fn check_partition(&self, partition: usize) -> Result<()> {
        if partition >= self.partitions.len() {
            return Err(TableError::PartitionOutOfRange {
                partition,
                num_partitions: self.partitions.len(),
            });
        }
        Ok(())
    }

    /// Multiply every partition's bucket count by the resize scale and re-thread
    /// its entries. Targets are computed up front so an overflow leaves the table
    /// as it was.
    fn resize(&mut self) -> Result<()> {
        let scale = self.config.bucket_resize_scale;
        let targets = self
            .partitions
            .iter()
            .map(|store| {
                store
                    .num_buckets()
                    .checked_mul(scale)
                    .ok_or_else(|| TableError::exhausted(usize::MAX, None))
            })
            .collect::<Result<Vec<_>>>()?;

        let before = self.num_buckets();
        let router = &self.router;
        for (store, buckets) in self.partitions.iter_mut().zip(targets) {
            store.rehash(buckets, |hash| router.bucket_of_hash(hash, buckets))?;
        }
        self.stats.resizes += 1;

        log::debug!(
            "resized buckets {before} -> {} ({} live entries)",
            self.num_buckets(),
            self.size
        );
        Ok(())
    }

    fn spill(&mut self) -> Result<()> {
        match self.config.spill_policy {
            SpillPolicy::LargestFirst => {
                while self.size > self.config.max_table_items {
                    let Some(id) = self.largest_partition() else {
                        break;
                    };
                    self.auto_spill(id)?;
                }
            }
            SpillPolicy::All => {
                for id in 0..self.partitions.len() {
                    if !self.partitions[id].is_empty() {
                        self.auto_spill(id)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Fullest non-empty partition, lowest id on ties.
    fn largest_partition(&self) -> Option<usize> {
        self.partitions
            .iter()
            .enumerate()
            .filter(|(_, store)| !store.is_empty())
            .max_by_key(|(id, store)| (store.len(), Reverse(*id)))
            .map(|(id, _)| id)
    }

    fn auto_spill(&mut self, partition: usize) -> Result<()> {
        log::debug!(
            "spilling partition {partition} ({} entries, table {} > max {})",
            self.partitions[partition].len(),
            self.size,
            self.config.max_table_items
        );
        self.stats.auto_spills += 1;
        self.drain_partition(partition)?;
        Ok(())
    }

    fn explicit_drain(&mut self, partition: usize) -> Result<usize> {
        if self.partitions[partition].is_empty() {
            return Ok(0);
        }
        self.stats.explicit_drains += 1;
        let emitted = self.drain_partition(partition)?;
        log::debug!("flushed partition {partition} ({emitted} records)");
        Ok(emitted)
    }

    /// Move every entry of `partition` into its emitter and reset its buckets.
    ///
    /// Entries leave the table before the first record is emitted; if the codec or
    /// the sink fails part way, the rest of the partition is discarded.
    fn drain_partition(&mut self, partition: usize) -> Result<usize> {
        let store = &mut self.partitions[partition];
        if store.is_empty() {
            return Ok(0);
        }
        let drained = store.drain(self.config.initial_buckets_per_partition)?;
        let count = drained.len();
        self.size -= count;

        let emitter = &mut self.emitters[partition];
        for (_, value) in drained {
            let record = self.codec.encode(&value)?;
            emitter
                .emit(&record)
                .with_context(|| format!("emitter for partition {partition} rejected a record"))?;
            self.stats.records_emitted += 1;
        }
        emitter
            .flush()
            .with_context(|| format!("emitter for partition {partition} failed to flush"))?;
        Ok(count)
    }
}

impl<T, R, E, C, S> Drop for ReducePreTable<T, R, E, C, S>
where
    R: Reducer<T>,
    E: Emitter,
    C: Codec<T>,
    S: BuildHasher,
{
    fn drop(&mut self) {
        if self.size > 0 {
            log::warn!(
                "pre-aggregation table dropped with {} unflushed entries",
                self.size
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combiners::{ByKey, Sum, sum_by_key};
    use crate::partition::IdentityBuildHasher;
    use crate::testing::counting_emitters;

    type Counts =
        ReducePreTable<(u64, u64), ByKey<Sum<u64>>, Vec<Vec<u8>>, PostcardCodec, IdentityBuildHasher>;

    fn counts(config: TableConfig) -> Result<Counts> {
        let emitters = counting_emitters(config.num_partitions);
        ReducePreTable::with_parts(
            config,
            sum_by_key::<u64>(),
            emitters,
            PostcardCodec,
            IdentityBuildHasher::default(),
        )
    }

    #[test]
    fn largest_partition_prefers_lowest_id_on_ties() -> Result<()> {
        let mut table = counts(TableConfig::with_partitions(3))?;
        assert_eq!(table.largest_partition(), None);
        for key in [1, 2, 4, 5] {
            table.insert((key, 1))?;
        }
        // partitions 1 and 2 both hold two entries
        assert_eq!(table.largest_partition(), Some(1));
        table.insert((7, 1))?;
        assert_eq!(table.largest_partition(), Some(1));
        table.insert((8, 1))?;
        table.insert((11, 1))?;
        assert_eq!(table.largest_partition(), Some(2));
        Ok(())
    }

    #[test]
    fn oversized_bucket_array_is_exhausted() -> Result<()> {
        let config = TableConfig::default().initial_buckets(usize::MAX / 2 + 1);
        assert!(matches!(
            counts(config),
            Err(TableError::ResourceExhausted { .. })
        ));
        Ok(())
    }

    #[test]
    fn drain_resets_bucket_count() -> Result<()> {
        crate::testing::init_logging();
        let config = TableConfig::default()
            .initial_buckets(1)
            .resize_scale(4)
            .max_items_per_bucket(1);
        let mut table = counts(config)?;
        table.insert((0, 1))?;
        table.insert((1, 1))?;
        assert_eq!(table.num_buckets(), 4);
        assert_eq!(table.flush_partition(0)?, 2);
        assert_eq!(table.num_buckets(), 1);
        Ok(())
    }
}
