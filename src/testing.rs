//! Testing utilities for code built on [`ReducePreTable`](crate::ReducePreTable).
//!
//! - **Assertions**: order-independent comparisons of emitted records
//! - **Fixtures**: a keyed counter type with a hand-written codec, sample inputs
//! - **Harness**: [`counting_emitters`] and [`decode_records`] for tables whose
//!   sinks are plain `Vec<Vec<u8>>`s
//!
//! # Quick Start
//!
//! ```
//! use prereduce::*;
//! use prereduce::combiners::sum_by_key;
//! use prereduce::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut table = ReducePreTable::new(TableConfig::default(), sum_by_key::<u64>(), counting_emitters(1))?;
//! for word in sample_words() {
//!     table.insert((word, 1))?;
//! }
//! let sinks = table.finish()?;
//!
//! let counts: Vec<(String, u64)> = decode_records(&sinks[0], &PostcardCodec)?;
//! assert_kv_collections_equal(
//!     counts,
//!     vec![
//!         ("baguette".into(), 1),
//!         ("bonjour".into(), 4),
//!         ("hallo".into(), 3),
//!         ("hello".into(), 2),
//!         ("hola".into(), 2),
//!     ],
//! );
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;

// Re-export commonly used items
pub use assertions::*;
pub use fixtures::*;

use crate::codec::Codec;
use crate::error::CodecError;

/// One empty in-memory sink per partition.
#[must_use]
pub fn counting_emitters(num_partitions: usize) -> Vec<Vec<Vec<u8>>> {
    vec![Vec::new(); num_partitions]
}

/// Decode every record collected by a `Vec<Vec<u8>>` sink.
///
/// # Errors
///
/// Returns the first [`CodecError`] hit.
pub fn decode_records<T, C: Codec<T>>(records: &[Vec<u8>], codec: &C) -> Result<Vec<T>, CodecError> {
    records.iter().map(|r| codec.decode(r)).collect()
}

/// Install `env_logger` for the current test binary, once.
///
/// Log output is captured per test, like `println!`. Set `RUST_LOG=prereduce=debug`
/// to see resizes and spills.
#[cfg(test)]
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
