//! Tables spilling into in-memory channels, read back by a consumer.

use prereduce::channel::MemoryChannel;
use prereduce::testing::*;
use prereduce::{DefaultBuildHasher, ReducePreTable, TableConfig};

#[test]
fn test_spills_reach_channel_in_blocks() -> anyhow::Result<()> {
    let channel = MemoryChannel::new();
    // 8-byte records plus a 4-byte length: three records per 32-byte block
    let emitter = channel.emitter_with_block_size(32);
    let mut table = ReducePreTable::with_parts(
        TableConfig::default().max_table_items(10),
        SumCounts,
        vec![emitter],
        KeyCountCodec,
        DefaultBuildHasher::default(),
    )?;

    for i in 0..11 {
        table.insert(KeyCount::new(i, 1))?;
    }
    // spill of 11 records: three full blocks plus the flushed remainder
    assert_eq!(channel.num_blocks(), 4);
    assert_eq!(channel.num_records(), 11);

    let mut read: Vec<KeyCount> = channel.reader().decode_all(&KeyCountCodec)?;
    read.sort();
    let expected: Vec<KeyCount> = (0..11).map(|i| KeyCount::new(i, 1)).collect();
    assert_eq!(read, expected);
    Ok(())
}

#[test]
fn test_reader_is_a_snapshot() -> anyhow::Result<()> {
    let channel = MemoryChannel::new();
    let mut table = ReducePreTable::with_parts(
        TableConfig::default(),
        SumCounts,
        vec![channel.emitter()],
        KeyCountCodec,
        DefaultBuildHasher::default(),
    )?;
    table.insert(KeyCount::new(1, 5))?;
    table.flush()?;

    let early = channel.reader();
    table.insert(KeyCount::new(2, 5))?;
    table.finish()?;

    assert_eq!(early.count(), 1);
    assert_eq!(channel.reader().count(), 2);
    Ok(())
}

#[test]
fn test_lazy_decode_reports_bad_records() -> anyhow::Result<()> {
    use prereduce::Emitter;

    let channel = MemoryChannel::new();
    let mut out = channel.emitter();
    out.emit(&[1, 0, 0, 0, 2, 0, 0, 0])?;
    out.emit(&[9])?;
    out.flush()?;

    let decoded: Vec<Result<KeyCount, _>> = channel.reader().decode(&KeyCountCodec).collect();
    assert_eq!(decoded.len(), 2);
    assert!(matches!(&decoded[0], Ok(kc) if *kc == KeyCount::new(1, 2)));
    assert!(decoded[1].is_err());
    Ok(())
}

#[test]
fn test_one_channel_per_partition() -> anyhow::Result<()> {
    let channels: Vec<MemoryChannel> = (0..4).map(|_| MemoryChannel::new()).collect();
    let emitters: Vec<_> = channels.iter().map(MemoryChannel::emitter).collect();
    let mut table = ReducePreTable::with_parts(
        TableConfig::with_partitions(4).max_table_items(8),
        SumCounts,
        emitters,
        KeyCountCodec,
        prereduce::IdentityBuildHasher::default(),
    )?;
    for i in 0..1_000 {
        table.insert(KeyCount::new(i % 64, 1))?;
    }
    table.finish()?;

    let mut total = 0;
    for (partition, channel) in channels.iter().enumerate() {
        let records: Vec<KeyCount> = channel.reader().decode_all(&KeyCountCodec)?;
        assert_all(&records, |kc| usize::try_from(kc.key).is_ok_and(|k| k % 4 == partition));
        total += records.iter().map(|kc| kc.count).sum::<i32>();
    }
    assert_eq!(total, 1_000);
    Ok(())
}
