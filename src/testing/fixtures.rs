//! Pre-built values, reducers and codecs for table tests.

use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::CodecError;
use crate::reducer::Reducer;

/// A keyed counter: the value type most reduce stages boil down to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyCount {
    pub key: i32,
    pub count: i32,
}

impl KeyCount {
    #[must_use]
    pub fn new(key: i32, count: i32) -> Self {
        Self { key, count }
    }
}

/// Reducer for [`KeyCount`]: key is `key`, counts are added.
#[derive(Clone, Copy, Debug, Default)]
pub struct SumCounts;

impl Reducer<KeyCount> for SumCounts {
    type Key = i32;

    fn key(&self, value: &KeyCount) -> i32 {
        value.key
    }

    fn reduce(&self, acc: &mut KeyCount, incoming: KeyCount) {
        acc.count += incoming.count;
    }
}

/// Hand-written fixed-width codec for [`KeyCount`]: two little-endian `i32`s.
///
/// Shows what a custom [`Codec`] looks like when serde is not wanted.
///
/// ```
/// use prereduce::Codec;
/// use prereduce::testing::{KeyCount, KeyCountCodec};
///
/// let bytes = KeyCountCodec.encode(&KeyCount::new(7, -1)).unwrap();
/// assert_eq!(bytes.len(), 8);
/// assert_eq!(KeyCountCodec.decode(&bytes).unwrap(), KeyCount::new(7, -1));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyCountCodec;

const KEY_COUNT_LEN: usize = 2 * size_of::<i32>();

impl Codec<KeyCount> for KeyCountCodec {
    fn encode(&self, value: &KeyCount) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(KEY_COUNT_LEN);
        out.extend_from_slice(&value.key.to_le_bytes());
        out.extend_from_slice(&value.count.to_le_bytes());
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<KeyCount, CodecError> {
        if bytes.len() != KEY_COUNT_LEN {
            return Err(CodecError::malformed(format!(
                "expected {KEY_COUNT_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let (key, count) = bytes.split_at(size_of::<i32>());
        let mut k = [0u8; 4];
        let mut c = [0u8; 4];
        k.copy_from_slice(key);
        c.copy_from_slice(count);
        Ok(KeyCount {
            key: i32::from_le_bytes(k),
            count: i32::from_le_bytes(c),
        })
    }
}

/// Words with a known frequency distribution.
///
/// Counts: `hallo` 3, `hello` 2, `bonjour` 4, `baguette` 1, `hola` 2.
///
/// # Example
///
/// ```
/// use prereduce::testing::sample_words;
///
/// let words = sample_words();
/// assert_eq!(words.iter().filter(|w| **w == "bonjour").count(), 4);
/// ```
#[must_use]
pub fn sample_words() -> Vec<String> {
    [
        "hallo", "bonjour", "hello", "hola", "bonjour", "hallo", "baguette", "bonjour", "hello",
        "hallo", "hola", "bonjour",
    ]
    .iter()
    .map(|w| (*w).to_string())
    .collect()
}

/// `(key, 1)` pairs with a few hot keys and a long tail.
///
/// `hot` appears 50 times, `warm_0`..`warm_2` 10 times each, `cold_0`..`cold_19`
/// once each.
#[must_use]
pub fn skewed_pairs() -> Vec<(String, u64)> {
    let mut data = Vec::new();
    for _ in 0..50 {
        data.push(("hot".to_string(), 1));
    }
    for i in 0..30 {
        data.push((format!("warm_{}", i % 3), 1));
    }
    for i in 0..20 {
        data.push((format!("cold_{i}"), 1));
    }
    data
}
