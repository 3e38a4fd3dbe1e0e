//! Construction parameters for [`ReducePreTable`](crate::ReducePreTable).
//!
//! A [`TableConfig`] is a plain struct with public fields, so the usual way to
//! build one is struct-update syntax over the defaults:
//!
//! ```
//! use prereduce::{SpillPolicy, TableConfig};
//!
//! let config = TableConfig {
//!     num_partitions: 4,
//!     max_table_items: 64 * 1024,
//!     ..Default::default()
//! };
//! assert_eq!(config.spill_policy, SpillPolicy::LargestFirst);
//! assert!(config.validate().is_ok());
//! ```
//!
//! It also (de)serializes with `serde`, so worker processes can load it from the
//! same JSON document that describes the rest of the stage.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TableError};

/// Initial buckets per partition when nothing else is configured.
pub const DEFAULT_INITIAL_BUCKETS: usize = 10;
/// Bucket growth factor applied on every resize.
pub const DEFAULT_RESIZE_SCALE: usize = 2;
/// Chain length a bucket may reach before the table grows.
pub const DEFAULT_MAX_ITEMS_PER_BUCKET: usize = 256;
/// Live entries the table holds before it starts spilling.
pub const DEFAULT_MAX_TABLE_ITEMS: usize = 1024 * 1024;

/// Which partitions to drain once the table holds more than `max_table_items`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpillPolicy {
    /// Drain the fullest partition, then the next fullest, until back under the
    /// threshold. Ties go to the lowest partition id.
    #[default]
    LargestFirst,
    /// Drain every non-empty partition at once.
    All,
}

/// Thresholds and shape of a pre-aggregation table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Number of output partitions; must match the downstream shuffle.
    pub num_partitions: usize,
    /// Buckets each partition starts with (and returns to after a drain).
    pub initial_buckets_per_partition: usize,
    /// Factor every partition's bucket count is multiplied by on resize.
    pub bucket_resize_scale: usize,
    /// Chain length that, once exceeded, triggers a table-wide resize.
    pub max_items_per_bucket: usize,
    /// Live entries that, once exceeded, trigger a spill.
    pub max_table_items: usize,
    /// Spill selection.
    pub spill_policy: SpillPolicy,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            num_partitions: 1,
            initial_buckets_per_partition: DEFAULT_INITIAL_BUCKETS,
            bucket_resize_scale: DEFAULT_RESIZE_SCALE,
            max_items_per_bucket: DEFAULT_MAX_ITEMS_PER_BUCKET,
            max_table_items: DEFAULT_MAX_TABLE_ITEMS,
            spill_policy: SpillPolicy::default(),
        }
    }
}

impl TableConfig {
    /// Defaults with the given partition count.
    #[must_use]
    pub fn with_partitions(num_partitions: usize) -> Self {
        Self {
            num_partitions,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn initial_buckets(mut self, buckets_per_partition: usize) -> Self {
        self.initial_buckets_per_partition = buckets_per_partition;
        self
    }

    #[must_use]
    pub fn resize_scale(mut self, scale: usize) -> Self {
        self.bucket_resize_scale = scale;
        self
    }

    #[must_use]
    pub fn max_items_per_bucket(mut self, items: usize) -> Self {
        self.max_items_per_bucket = items;
        self
    }

    #[must_use]
    pub fn max_table_items(mut self, items: usize) -> Self {
        self.max_table_items = items;
        self
    }

    #[must_use]
    pub fn spill_policy(mut self, policy: SpillPolicy) -> Self {
        self.spill_policy = policy;
        self
    }

    /// Check every parameter.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.num_partitions == 0 {
            return Err(TableError::invalid_config("num_partitions must be at least 1"));
        }
        if self.initial_buckets_per_partition == 0 {
            return Err(TableError::invalid_config(
                "initial_buckets_per_partition must be at least 1",
            ));
        }
        if self.bucket_resize_scale < 2 {
            return Err(TableError::invalid_config(format!(
                "bucket_resize_scale must be greater than 1, got {}",
                self.bucket_resize_scale
            )));
        }
        if self.max_items_per_bucket == 0 {
            return Err(TableError::invalid_config("max_items_per_bucket must be at least 1"));
        }
        validate_max_table_items(self.max_table_items)?;
        if self
            .num_partitions
            .checked_mul(self.initial_buckets_per_partition)
            .is_none()
        {
            return Err(TableError::invalid_config(format!(
                "{} partitions x {} buckets overflows usize",
                self.num_partitions, self.initial_buckets_per_partition
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::InvalidConfig`] if the JSON is malformed or a value
    /// fails [`validate`](Self::validate).
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TableError::invalid_config(format!("unreadable config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

pub(crate) fn validate_max_table_items(items: usize) -> Result<()> {
    if items == 0 {
        return Err(TableError::invalid_config("max_table_items must be at least 1"));
    }
    Ok(())
}
