//! Error types for the pre-aggregation table.
//!
//! [`TableError`] covers everything a table operation can fail with:
//! - configuration problems caught at construction (or by [`set_max_size`](crate::ReducePreTable::set_max_size))
//! - out-of-range partition ids on the per-partition operations
//! - allocation failure while growing bucket or slot storage
//! - codec and sink failures raised while draining a partition
//!
//! Sink failures arrive as [`anyhow::Error`] so that emitters backed by arbitrary
//! transports can report whatever they need; the table only adds the partition id
//! as context and passes them through untouched.

use std::collections::TryReserveError;

use thiserror::Error;

/// Failure while encoding or decoding a record.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The compact binary encoding rejected the value or the bytes.
    #[error("postcard codec failed: {0}")]
    Postcard(#[from] postcard::Error),

    /// The JSON encoding rejected the value or the bytes.
    #[error("json codec failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A hand-written codec found bytes it cannot interpret.
    #[error("malformed record: {0}")]
    Malformed(String),
}

impl CodecError {
    /// Convenience constructor for custom codecs.
    pub fn malformed<S: Into<String>>(reason: S) -> Self {
        Self::Malformed(reason.into())
    }
}

/// Errors surfaced by [`ReducePreTable`](crate::ReducePreTable).
#[derive(Debug, Error)]
pub enum TableError {
    /// Invalid construction parameters. Nothing was built.
    #[error("invalid table configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A partition id outside `[0, num_partitions)`. The table is unchanged.
    #[error("partition {partition} out of range (table has {num_partitions} partitions)")]
    PartitionOutOfRange {
        partition: usize,
        num_partitions: usize,
    },

    /// Storage could not be grown. Not recovered internally.
    #[error("could not allocate storage for {buckets} buckets")]
    ResourceExhausted {
        buckets: usize,
        #[source]
        source: Option<TryReserveError>,
    },

    /// A value could not be serialized on its way to a sink.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The sink bound to a partition rejected a record.
    #[error(transparent)]
    Sink(#[from] anyhow::Error),
}

impl TableError {
    pub(crate) fn invalid_config<S: Into<String>>(reason: S) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub(crate) fn exhausted(buckets: usize, source: Option<TryReserveError>) -> Self {
        Self::ResourceExhausted { buckets, source }
    }
}

/// Shorthand used across the crate.
pub type Result<T, E = TableError> = std::result::Result<T, E>;
