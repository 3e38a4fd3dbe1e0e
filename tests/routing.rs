//! Keys stay in the partition the downstream shuffle expects.

use prereduce::combiners::sum_by_key;
use prereduce::testing::*;
use prereduce::{
    DefaultBuildHasher, IdentityBuildHasher, PartitionRouter, PostcardCodec, ReducePreTable,
    TableConfig,
};

mod common;
use common::{int_table, shaped};

#[test]
fn test_identity_routing_matches_modulo() -> anyhow::Result<()> {
    let table = int_table(TableConfig::with_partitions(5))?;
    for key in 0..100 {
        assert_eq!(table.partition_of(&key), usize::try_from(key)? % 5);
    }
    Ok(())
}

#[test]
fn test_partition_stable_across_resizes() -> anyhow::Result<()> {
    let mut table = ReducePreTable::new(
        shaped(4, 1, 2, 1, 100_000),
        sum_by_key::<u32>(),
        counting_emitters(4),
    )?;
    let keys: Vec<String> = (0..500).map(|i| format!("key-{i}")).collect();
    let before: Vec<usize> = keys.iter().map(|k| table.router().route(k)).collect();

    for key in &keys {
        table.insert((key.clone(), 1))?;
    }
    assert!(table.stats().resizes >= 5);

    for (key, partition) in keys.iter().zip(&before) {
        assert_eq!(table.router().route(key), *partition);
        assert_eq!(table.partition_of(&(key.clone(), 0)), *partition);
    }
    for partition in 0..4 {
        for (key, _) in table.entries(partition)? {
            assert_eq!(table.router().route(key), partition);
        }
    }
    table.flush()?;
    Ok(())
}

#[test]
fn test_shuffle_side_router_agrees() -> anyhow::Result<()> {
    let mut table = ReducePreTable::new(
        TableConfig::with_partitions(7),
        sum_by_key::<u64>(),
        counting_emitters(7),
    )?;
    for (key, value) in skewed_pairs() {
        table.insert((key, value))?;
    }
    let sinks = table.finish()?;

    // an independently built router sends every emitted record where it landed
    let shuffle = PartitionRouter::new(7, DefaultBuildHasher::default());
    for (partition, sink) in sinks.iter().enumerate() {
        let records: Vec<(String, u64)> = decode_records(sink, &PostcardCodec)?;
        assert_all(&records, |(key, _)| shuffle.route(key) == partition);
    }
    Ok(())
}

#[test]
fn test_partition_sizes_sum_to_size() -> anyhow::Result<()> {
    let mut table = ReducePreTable::with_parts(
        TableConfig::with_partitions(3),
        SumCounts,
        counting_emitters(3),
        KeyCountCodec,
        IdentityBuildHasher::default(),
    )?;
    for i in 0..300 {
        table.insert(KeyCount::new(i % 40, 1))?;
    }
    let per_partition: usize = (0..3)
        .map(|p| table.partition_size(p))
        .sum::<Result<usize, _>>()?;
    assert_eq!(per_partition, table.size());
    assert_eq!(table.size(), 40);
    assert_eq!(table.partition_size(0)?, 14);
    table.flush()?;
    Ok(())
}
