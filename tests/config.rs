//! Construction parameters and their validation.

use prereduce::combiners::sum_by_key;
use prereduce::config::{
    DEFAULT_INITIAL_BUCKETS, DEFAULT_MAX_ITEMS_PER_BUCKET, DEFAULT_MAX_TABLE_ITEMS,
    DEFAULT_RESIZE_SCALE,
};
use prereduce::testing::counting_emitters;
use prereduce::{ReducePreTable, SpillPolicy, TableConfig, TableError};

fn reason(err: TableError) -> String {
    match err {
        TableError::InvalidConfig { reason } => reason,
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
}

#[test]
fn test_defaults() {
    let config = TableConfig::default();
    assert_eq!(config.num_partitions, 1);
    assert_eq!(config.initial_buckets_per_partition, DEFAULT_INITIAL_BUCKETS);
    assert_eq!(config.bucket_resize_scale, DEFAULT_RESIZE_SCALE);
    assert_eq!(config.max_items_per_bucket, DEFAULT_MAX_ITEMS_PER_BUCKET);
    assert_eq!(config.max_table_items, DEFAULT_MAX_TABLE_ITEMS);
    assert_eq!(config.spill_policy, SpillPolicy::LargestFirst);
    assert!(config.validate().is_ok());
}

#[test]
fn test_validation_names_the_field() {
    let cases = [
        (TableConfig::with_partitions(0), "num_partitions"),
        (TableConfig::default().initial_buckets(0), "initial_buckets_per_partition"),
        (TableConfig::default().resize_scale(1), "bucket_resize_scale"),
        (TableConfig::default().max_items_per_bucket(0), "max_items_per_bucket"),
        (TableConfig::default().max_table_items(0), "max_table_items"),
        (
            TableConfig::with_partitions(usize::MAX).initial_buckets(2),
            "overflows",
        ),
    ];
    for (config, field) in cases {
        let err = config.validate().expect_err(field);
        let reason = reason(err);
        assert!(reason.contains(field), "{reason:?} does not mention {field}");
    }
}

#[test]
fn test_emitter_count_must_match() {
    let err = ReducePreTable::<(String, u64), _, _>::new(
        TableConfig::with_partitions(3),
        sum_by_key::<u64>(),
        counting_emitters(2),
    )
    .err()
    .map(reason);
    assert_eq!(
        err.as_deref(),
        Some("expected one emitter per partition (3), got 2")
    );
}

#[test]
fn test_invalid_config_builds_nothing() {
    let result = ReducePreTable::<(String, u64), _, _>::new(
        TableConfig::with_partitions(0),
        sum_by_key::<u64>(),
        Vec::<Vec<Vec<u8>>>::new(),
    );
    assert!(matches!(result, Err(TableError::InvalidConfig { .. })));
}

#[test]
fn test_from_json_fills_defaults() -> anyhow::Result<()> {
    let config = TableConfig::from_json_str(
        r#"{ "num_partitions": 8, "max_table_items": 4096, "spill_policy": "all" }"#,
    )?;
    assert_eq!(config.num_partitions, 8);
    assert_eq!(config.max_table_items, 4096);
    assert_eq!(config.spill_policy, SpillPolicy::All);
    assert_eq!(config.initial_buckets_per_partition, DEFAULT_INITIAL_BUCKETS);
    Ok(())
}

#[test]
fn test_from_json_rejects_bad_documents() {
    assert!(TableConfig::from_json_str("{ not json").is_err());
    assert!(TableConfig::from_json_str(r#"{ "spill_policy": "random" }"#).is_err());

    let err = TableConfig::from_json_str(r#"{ "bucket_resize_scale": 1 }"#).unwrap_err();
    assert!(reason(err).contains("bucket_resize_scale"));
}

#[test]
fn test_config_round_trips_through_json() -> anyhow::Result<()> {
    let config = TableConfig::with_partitions(2)
        .initial_buckets(3)
        .resize_scale(4)
        .max_items_per_bucket(5)
        .max_table_items(6)
        .spill_policy(SpillPolicy::All);
    let json = serde_json::to_string(&config)?;
    assert_eq!(TableConfig::from_json_str(&json)?, config);
    Ok(())
}

#[test]
fn test_table_reports_effective_config() -> anyhow::Result<()> {
    let mut table = ReducePreTable::new(
        TableConfig::with_partitions(2),
        sum_by_key::<u64>(),
        counting_emitters(2),
    )?;
    table.set_max_size(99)?;
    table.insert(("k".to_string(), 1))?;
    assert_eq!(table.config().max_table_items, 99);
    assert_eq!(table.config().num_partitions, 2);
    assert_eq!(table.num_buckets(), 2 * DEFAULT_INITIAL_BUCKETS);
    table.flush()?;
    Ok(())
}
