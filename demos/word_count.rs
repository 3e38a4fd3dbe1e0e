//! Word count with local pre-aggregation.
//!
//! Demonstrates:
//! - One `MemoryChannel` per output partition as the table's sinks
//! - A small entry budget forcing several spills along the way
//! - The consumer side: reading each partition back and merging partial counts
//! - Publishing table statistics into a `MetricsCollector`
//!
//! Run with: cargo run --example word_count

use std::collections::BTreeMap;

use anyhow::Result;
use prereduce::channel::MemoryChannel;
use prereduce::combiners::sum_by_key;
use prereduce::metrics::MetricsCollector;
use prereduce::*;

const TEXT: &str = "
    the quick brown fox jumps over the lazy dog
    the dog sleeps and the fox runs
    a quick brown dog and a lazy fox
    over and over the fox jumps
";

fn main() -> Result<()> {
    env_logger::init();
    println!("Word count with local pre-aggregation\n");

    let config = TableConfig::with_partitions(2).max_table_items(6);
    let channels: Vec<MemoryChannel> = (0..config.num_partitions)
        .map(|_| MemoryChannel::new())
        .collect();
    let emitters: Vec<_> = channels.iter().map(MemoryChannel::emitter).collect();

    let mut table = ReducePreTable::new(config, sum_by_key::<u64>(), emitters)?;
    let mut words = 0;
    for word in TEXT.split_whitespace() {
        table.insert((word.to_string(), 1))?;
        words += 1;
    }
    println!("Inserted {words} words, {} still resident", table.size());

    table.flush()?;
    let stats = table.stats();
    drop(table);

    // downstream: each partition's consumer merges the partial counts it received
    let mut counts = BTreeMap::new();
    for (partition, channel) in channels.iter().enumerate() {
        let records: Vec<(String, u64)> = channel.reader().decode_all(&PostcardCodec)?;
        println!(
            "Partition {partition}: {} records in {} blocks",
            records.len(),
            channel.num_blocks()
        );
        for (word, count) in records {
            *counts.entry(word).or_insert(0u64) += count;
        }
    }

    println!("\nCounts:");
    for (word, count) in &counts {
        println!("  {word:>8}: {count}");
    }
    println!(
        "\nShipped {} records for {words} words ({:.0}% combined locally)",
        stats.records_emitted,
        stats.reduction_ratio() * 100.0
    );

    let metrics = MetricsCollector::new();
    stats.publish(&metrics);
    metrics.print();

    Ok(())
}
