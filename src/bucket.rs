//! Per-partition bucket storage.
//!
//! Entries live in an append-only arena (`Vec<Slot>`) and are addressed by
//! [`SlotId`] handles. Each bucket stores the handle of the first slot of its
//! chain and every slot stores the handle of the next one, so a chain is a linked
//! list threaded through the arena rather than a set of heap nodes.
//!
//! Because entries are only ever removed by draining the whole partition, the arena
//! never has holes: resizing just allocates a fresh head array and re-threads the
//! `next` handles in one pass over the arena, without moving any key or value.

use crate::error::{Result, TableError};

/// Handle of a slot in a partition's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SlotId(u32);

impl SlotId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

struct Slot<K, T> {
    hash: u64,
    key: K,
    value: T,
    next: Option<SlotId>,
}

/// What [`PartitionStore::upsert`] did with a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Upsert {
    /// The key was present; the value was combined into its entry.
    Combined,
    /// A new entry was appended; `chain_len` is the bucket's chain length now.
    Inserted { chain_len: usize },
}

/// Bucket heads plus the slot arena of one partition.
pub(crate) struct PartitionStore<K, T> {
    heads: Vec<Option<SlotId>>,
    slots: Vec<Slot<K, T>>,
}

fn alloc_heads(buckets: usize) -> Result<Vec<Option<SlotId>>> {
    let mut heads = Vec::new();
    heads
        .try_reserve_exact(buckets)
        .map_err(|e| TableError::exhausted(buckets, Some(e)))?;
    heads.resize(buckets, None);
    Ok(heads)
}

impl<K: Eq, T> PartitionStore<K, T> {
    pub(crate) fn with_buckets(buckets: usize) -> Result<Self> {
        Ok(Self {
            heads: alloc_heads(buckets)?,
            slots: Vec::new(),
        })
    }

    /// Live entries.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub(crate) fn num_buckets(&self) -> usize {
        self.heads.len()
    }

    /// Combine `value` into the entry for `key` in `bucket`, or append a new entry
    /// seeded with it.
    pub(crate) fn upsert<F>(
        &mut self,
        bucket: usize,
        hash: u64,
        key: K,
        value: T,
        combine: F,
    ) -> Result<Upsert>
    where
        F: FnOnce(&mut T, T),
    {
        let mut cursor = self.heads[bucket];
        let mut tail = None;
        let mut chain_len = 0;
        while let Some(id) = cursor {
            let slot = &mut self.slots[id.index()];
            if slot.hash == hash && slot.key == key {
                combine(&mut slot.value, value);
                return Ok(Upsert::Combined);
            }
            chain_len += 1;
            tail = Some(id);
            cursor = slot.next;
        }

        let id = u32::try_from(self.slots.len())
            .map(SlotId)
            .map_err(|_| TableError::exhausted(self.heads.len(), None))?;
        self.slots
            .try_reserve(1)
            .map_err(|e| TableError::exhausted(self.heads.len(), Some(e)))?;
        self.slots.push(Slot {
            hash,
            key,
            value,
            next: None,
        });
        match tail {
            Some(last) => self.slots[last.index()].next = Some(id),
            None => self.heads[bucket] = Some(id),
        }
        Ok(Upsert::Inserted {
            chain_len: chain_len + 1,
        })
    }

    /// Re-thread every chain over `buckets` fresh buckets. `bucket_of` maps a cached
    /// hash to its new bucket. On allocation failure the store is left untouched.
    pub(crate) fn rehash<B>(&mut self, buckets: usize, bucket_of: B) -> Result<()>
    where
        B: Fn(u64) -> usize,
    {
        let mut heads = alloc_heads(buckets)?;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let bucket = bucket_of(slot.hash);
            #[allow(clippy::cast_possible_truncation)]
            let id = SlotId(index as u32);
            slot.next = heads[bucket];
            heads[bucket] = Some(id);
        }
        self.heads = heads;
        Ok(())
    }

    /// Remove every entry and shrink back to `buckets` buckets.
    ///
    /// The returned iterator owns the entries; storage is released as it is
    /// consumed or dropped.
    pub(crate) fn drain(&mut self, buckets: usize) -> Result<Drained<K, T>> {
        let heads = alloc_heads(buckets)?;
        self.heads = heads;
        Ok(Drained {
            inner: std::mem::take(&mut self.slots).into_iter(),
        })
    }

    /// Length of the longest chain.
    pub(crate) fn max_chain_len(&self) -> usize {
        (0..self.heads.len())
            .map(|bucket| self.chain_len(bucket))
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn chain_len(&self, bucket: usize) -> usize {
        let mut cursor = self.heads[bucket];
        let mut len = 0;
        while let Some(id) = cursor {
            len += 1;
            cursor = self.slots[id.index()].next;
        }
        len
    }

    /// Entries in arena order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&K, &T)> + '_ {
        self.slots.iter().map(|slot| (&slot.key, &slot.value))
    }
}

/// Entries removed from a partition by [`PartitionStore::drain`].
pub(crate) struct Drained<K, T> {
    inner: std::vec::IntoIter<Slot<K, T>>,
}

impl<K, T> Iterator for Drained<K, T> {
    type Item = (K, T);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|slot| (slot.key, slot.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, T> ExactSizeIterator for Drained<K, T> {}
