//! Shared table builders for the integration tests.
#![allow(dead_code)]

use prereduce::testing::counting_emitters;
use prereduce::{IdentityBuildHasher, PostcardCodec, ReducePreTable, Reducer, TableConfig};

/// Integers are their own key; duplicates are added.
#[derive(Clone, Copy, Debug, Default)]
pub struct SumInts;

impl Reducer<i32> for SumInts {
    type Key = i32;

    fn key(&self, value: &i32) -> i32 {
        *value
    }

    fn reduce(&self, acc: &mut i32, incoming: i32) {
        *acc += incoming;
    }
}

pub type IntTable = ReducePreTable<i32, SumInts, Vec<Vec<u8>>, PostcardCodec, IdentityBuildHasher>;

/// Integer table routing by `key % num_partitions`, with one `Vec` sink per
/// partition.
pub fn int_table(config: TableConfig) -> anyhow::Result<IntTable> {
    let emitters = counting_emitters(config.num_partitions);
    Ok(ReducePreTable::with_parts(
        config,
        SumInts,
        emitters,
        PostcardCodec,
        IdentityBuildHasher::default(),
    )?)
}

/// The five-argument shape used throughout the tests:
/// `(partitions, initial buckets, resize scale, max items per bucket, max table items)`.
pub fn shaped(
    num_partitions: usize,
    initial_buckets: usize,
    resize_scale: usize,
    max_items_per_bucket: usize,
    max_table_items: usize,
) -> TableConfig {
    TableConfig::with_partitions(num_partitions)
        .initial_buckets(initial_buckets)
        .resize_scale(resize_scale)
        .max_items_per_bucket(max_items_per_bucket)
        .max_table_items(max_table_items)
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
