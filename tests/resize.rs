//! Bucket growth when chains get too long.

use prereduce::testing::*;
use prereduce::{PostcardCodec, TableConfig};

mod common;
use common::{init_logging, int_table, shaped};

#[test]
fn test_resize_one_partition() -> anyhow::Result<()> {
    init_logging();
    let mut table = int_table(shaped(1, 1, 10, 1, 10))?;

    table.insert(1)?;
    assert_eq!(table.num_buckets(), 1);
    assert_eq!(table.partition_size(0)?, 1);
    assert_eq!(table.size(), 1);

    // second key shares the only bucket, chain of 2 > 1
    table.insert(2)?;
    assert_eq!(table.num_buckets(), 10);
    assert_eq!(table.partition_size(0)?, 2);
    assert_eq!(table.size(), 2);
    assert_eq!(table.stats().resizes, 1);

    table.flush()?;
    let emitted: Vec<i32> = decode_records(&table.emitters()[0], &PostcardCodec)?;
    assert_collections_unordered_equal(&emitted, &[1, 2]);
    Ok(())
}

#[test]
fn test_resize_two_partitions() -> anyhow::Result<()> {
    let mut table = int_table(shaped(2, 1, 10, 1, 10))?;
    assert_eq!(table.size(), 0);
    assert_eq!(table.num_buckets(), 2);
    assert_eq!(table.partition_size(0)?, 0);
    assert_eq!(table.partition_size(1)?, 0);

    table.insert(1)?;
    table.insert(2)?;
    assert_eq!(table.size(), 2);
    assert_eq!(table.num_buckets(), 2);
    assert_eq!(table.partition_size(0)?, 1);
    assert_eq!(table.partition_size(1)?, 1);

    // 3 joins 1 in partition 1: every partition grows
    table.insert(3)?;
    assert_eq!(table.size(), 3);
    assert_eq!(table.num_buckets(), 20);
    assert_eq!(table.partition_size(0)? + table.partition_size(1)?, 3);
    Ok(())
}

#[test]
fn test_resize_preserves_entries_and_partitions() -> anyhow::Result<()> {
    let mut table = int_table(shaped(3, 1, 2, 2, 1_000))?;
    let before: Vec<usize> = (0..200).map(|k| table.router().route(&k)).collect();

    for k in 0..200 {
        table.insert(k)?;
        table.insert(k)?;
    }
    assert!(table.stats().resizes > 0);
    assert!(table.max_chain_len() <= 2 * 2);
    assert_eq!(table.size(), 200);

    let after: Vec<usize> = (0..200).map(|k| table.router().route(&k)).collect();
    assert_eq!(before, after);
    for partition in 0..3 {
        for (key, value) in table.entries(partition)? {
            assert_eq!(usize::try_from(*key)? % 3, partition);
            assert_eq!(*value, 2 * key);
        }
    }

    table.flush()?;
    let mut all = Vec::new();
    for sink in table.emitters() {
        all.extend(decode_records::<i32, _>(sink, &PostcardCodec)?);
    }
    let expected: Vec<i32> = (0..200).map(|k| 2 * k).collect();
    assert_collections_unordered_equal(&all, &expected);
    Ok(())
}

#[test]
fn test_drain_shrinks_partition_back() -> anyhow::Result<()> {
    let mut table = int_table(shaped(2, 1, 4, 1, 100))?;
    table.insert(0)?;
    table.insert(2)?;
    assert_eq!(table.num_buckets(), 8);

    table.flush_partition(0)?;
    // partition 0 is back to 1 bucket, partition 1 keeps its 4
    assert_eq!(table.num_buckets(), 5);
    Ok(())
}

#[test]
fn test_colliding_keys_do_not_resize_forever() -> anyhow::Result<()> {
    // every key hashes to the same value under a constant hasher
    #[derive(Clone, Copy, Default)]
    struct Constant;
    impl std::hash::Hasher for Constant {
        fn finish(&self) -> u64 {
            42
        }
        fn write(&mut self, _bytes: &[u8]) {}
    }

    let config = TableConfig::default().initial_buckets(1).max_items_per_bucket(2);
    let mut table = prereduce::ReducePreTable::with_parts(
        config,
        common::SumInts,
        counting_emitters(1),
        PostcardCodec,
        std::hash::BuildHasherDefault::<Constant>::default(),
    )?;
    for k in 0..5 {
        table.insert(k)?;
    }
    // one resize per insert that overflowed, never more
    assert_eq!(table.size(), 5);
    assert_eq!(table.stats().resizes, 3);
    assert_eq!(table.max_chain_len(), 5);
    Ok(())
}
