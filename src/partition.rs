//! Key → partition routing.
//!
//! The pre-aggregation table must place every key in the partition the later full
//! shuffle will send it to, otherwise locally combined records would end up on the
//! wrong worker. [`PartitionRouter`] therefore owns nothing but the partition count
//! and a [`BuildHasher`], and the shuffle side can construct the very same router
//! to route its own records.
//!
//! The same 64-bit key hash drives two decisions:
//! - partition: `hash % num_partitions`, fixed for the table's lifetime
//! - bucket within the partition: `(hash / num_partitions) % buckets`, which
//!   changes whenever the partition's bucket array is resized
//!
//! Dividing out the partition count before picking a bucket keeps all buckets of a
//! partition reachable even when the bucket count shares factors with
//! `num_partitions`.

use std::hash::{BuildHasher, BuildHasherDefault, Hash, Hasher};

use rustc_hash::FxHasher;

/// Deterministic default: the same key hashes identically in every process.
pub type DefaultBuildHasher = BuildHasherDefault<FxHasher>;

/// Routes keys to partitions and buckets.
#[derive(Clone, Debug)]
pub struct PartitionRouter<S = DefaultBuildHasher> {
    num_partitions: usize,
    hasher: S,
}

impl<S: BuildHasher> PartitionRouter<S> {
    /// `num_partitions` must be non-zero; the table validates this before building
    /// its router.
    pub fn new(num_partitions: usize, hasher: S) -> Self {
        debug_assert!(num_partitions > 0);
        Self {
            num_partitions,
            hasher,
        }
    }

    #[inline]
    #[must_use]
    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    /// Full 64-bit hash of a key.
    #[inline]
    pub fn hash_key<K: Hash + ?Sized>(&self, key: &K) -> u64 {
        self.hasher.hash_one(key)
    }

    /// Partition a key belongs to.
    #[inline]
    pub fn route<K: Hash + ?Sized>(&self, key: &K) -> usize {
        self.partition_of_hash(self.hash_key(key))
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn partition_of_hash(&self, hash: u64) -> usize {
        (hash % self.num_partitions as u64) as usize
    }

    /// Bucket within a partition of `buckets` buckets.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn bucket_of_hash(&self, hash: u64, buckets: usize) -> usize {
        debug_assert!(buckets > 0);
        ((hash / self.num_partitions as u64) % buckets as u64) as usize
    }
}

/// A [`Hasher`] that passes integer keys through unchanged.
///
/// Useful when the downstream exchange routes integer keys by plain
/// `key mod num_partitions`. Only the first integer written is passed through;
/// anything after it, and any byte-slice input (strings, composite keys), is
/// folded in with FNV-1a so the hasher still works for every `Hash` type.
#[derive(Clone, Copy, Debug)]
pub struct IdentityHasher {
    state: u64,
    dirty: bool,
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

impl Default for IdentityHasher {
    fn default() -> Self {
        Self {
            state: FNV_OFFSET,
            dirty: false,
        }
    }
}

impl IdentityHasher {
    #[inline]
    fn write_int(&mut self, v: u64) {
        if self.dirty {
            self.write(&v.to_le_bytes());
        } else {
            self.state = v;
            self.dirty = true;
        }
    }
}

/// `BuildHasher` for [`IdentityHasher`].
pub type IdentityBuildHasher = BuildHasherDefault<IdentityHasher>;

impl Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        self.dirty = true;
        for b in bytes {
            self.state ^= u64::from(*b);
            self.state = self.state.wrapping_mul(FNV_PRIME);
        }
    }

    fn write_u8(&mut self, i: u8) {
        self.write_int(u64::from(i));
    }

    fn write_u16(&mut self, i: u16) {
        self.write_int(u64::from(i));
    }

    fn write_u32(&mut self, i: u32) {
        self.write_int(u64::from(i));
    }

    fn write_u64(&mut self, i: u64) {
        self.write_int(i);
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_u128(&mut self, i: u128) {
        self.write_int(i as u64);
    }

    fn write_usize(&mut self, i: usize) {
        self.write_int(i as u64);
    }

    #[allow(clippy::cast_sign_loss)]
    fn write_i8(&mut self, i: i8) {
        self.write_int(i64::from(i) as u64);
    }

    #[allow(clippy::cast_sign_loss)]
    fn write_i16(&mut self, i: i16) {
        self.write_int(i64::from(i) as u64);
    }

    #[allow(clippy::cast_sign_loss)]
    fn write_i32(&mut self, i: i32) {
        self.write_int(i64::from(i) as u64);
    }

    #[allow(clippy::cast_sign_loss)]
    fn write_i64(&mut self, i: i64) {
        self.write_int(i as u64);
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn write_i128(&mut self, i: i128) {
        self.write_int(i as u64);
    }

    #[allow(clippy::cast_sign_loss)]
    fn write_isize(&mut self, i: isize) {
        self.write_int(i as u64);
    }
}
