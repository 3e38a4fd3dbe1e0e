//! In-process channel for spilled records.
//!
//! The table itself only knows [`Emitter`]s. In a real deployment the emitter
//! feeds a transport to a peer worker; inside a single process (local consumers,
//! tests, demos) a [`MemoryChannel`] plays that role:
//!
//! - [`MemoryChannel::emitter`] hands out a [`BlockEmitter`], which frames records
//!   into fixed-size blocks and publishes a block whenever it fills up or the
//!   emitter is flushed or dropped
//! - [`MemoryChannel::reader`] snapshots the published blocks and iterates over the
//!   records in them, raw or decoded with a [`Codec`]
//!
//! Records are framed as a little-endian `u32` length followed by the bytes.
//!
//! ```
//! use prereduce::channel::MemoryChannel;
//! use prereduce::{Emitter, PostcardCodec};
//!
//! # fn main() -> anyhow::Result<()> {
//! let channel = MemoryChannel::new();
//! let mut out = channel.emitter();
//! out.emit(&postcard::to_allocvec(&7u32)?)?;
//! out.flush()?;
//!
//! let back: Vec<u32> = channel.reader().decode_all(&PostcardCodec)?;
//! assert_eq!(back, vec![7]);
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, bail};

use crate::codec::Codec;
use crate::emitter::Emitter;
use crate::error::CodecError;

/// Block size used by [`MemoryChannel::emitter`].
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

const LEN_PREFIX: usize = std::mem::size_of::<u32>();

/// A shared, append-only queue of record blocks.
///
/// Cloning the channel clones the handle; all clones see the same blocks.
#[derive(Clone, Default)]
pub struct MemoryChannel {
    inner: Arc<Mutex<ChannelInner>>,
}

#[derive(Default)]
struct ChannelInner {
    blocks: Vec<Arc<Block>>,
    closed: bool,
}

struct Block {
    data: Vec<u8>,
    records: usize,
}

impl MemoryChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ChannelInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A writer with the default block size.
    #[must_use]
    pub fn emitter(&self) -> BlockEmitter {
        self.emitter_with_block_size(DEFAULT_BLOCK_SIZE)
    }

    /// A writer that publishes a block once `block_size` bytes are buffered.
    #[must_use]
    pub fn emitter_with_block_size(&self, block_size: usize) -> BlockEmitter {
        BlockEmitter {
            channel: self.clone(),
            buf: Vec::new(),
            records: 0,
            block_size: block_size.max(1),
        }
    }

    /// Reader over the blocks published so far.
    #[must_use]
    pub fn reader(&self) -> ChannelReader {
        ChannelReader {
            blocks: self.lock().blocks.clone(),
            block: 0,
            offset: 0,
        }
    }

    /// Reject any further blocks. Emitters still holding data fail on their next
    /// publish.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    #[must_use]
    pub fn num_blocks(&self) -> usize {
        self.lock().blocks.len()
    }

    /// Records across all published blocks.
    #[must_use]
    pub fn num_records(&self) -> usize {
        self.lock().blocks.iter().map(|b| b.records).sum()
    }

    fn publish(&self, data: Vec<u8>, records: usize) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            bail!("channel closed, dropping block of {records} records");
        }
        inner.blocks.push(Arc::new(Block { data, records }));
        Ok(())
    }
}

/// Block-buffering [`Emitter`] writing into a [`MemoryChannel`].
pub struct BlockEmitter {
    channel: MemoryChannel,
    buf: Vec<u8>,
    records: usize,
    block_size: usize,
}

impl BlockEmitter {
    /// Bytes buffered but not yet published.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn publish_block(&mut self) -> Result<()> {
        if self.records == 0 {
            return Ok(());
        }
        let data = std::mem::take(&mut self.buf);
        let records = std::mem::take(&mut self.records);
        self.channel.publish(data, records)
    }
}

impl Emitter for BlockEmitter {
    fn emit(&mut self, record: &[u8]) -> Result<()> {
        let Ok(len) = u32::try_from(record.len()) else {
            bail!("record of {} bytes exceeds the frame limit", record.len());
        };
        self.buf.extend_from_slice(&len.to_le_bytes());
        self.buf.extend_from_slice(record);
        self.records += 1;
        if self.buf.len() >= self.block_size {
            self.publish_block()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.publish_block()
    }
}

impl Drop for BlockEmitter {
    fn drop(&mut self) {
        if let Err(e) = self.publish_block() {
            log::warn!("block emitter dropped with unpublished records: {e}");
        }
    }
}

/// Iterator over the raw records of a channel snapshot.
pub struct ChannelReader {
    blocks: Vec<Arc<Block>>,
    block: usize,
    offset: usize,
}

impl ChannelReader {
    /// Decode every remaining record with `codec`.
    ///
    /// # Errors
    ///
    /// Returns the first [`CodecError`] hit.
    pub fn decode_all<T, C: Codec<T>>(self, codec: &C) -> Result<Vec<T>, CodecError> {
        self.map(|record| codec.decode(&record)).collect()
    }

    /// Lazily decode the remaining records.
    pub fn decode<'c, T, C: Codec<T>>(
        self,
        codec: &'c C,
    ) -> impl Iterator<Item = Result<T, CodecError>> + 'c
    where
        T: 'c,
    {
        self.map(move |record| codec.decode(&record))
    }
}

impl Iterator for ChannelReader {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        loop {
            let block = self.blocks.get(self.block)?;
            let data = &block.data;
            if self.offset + LEN_PREFIX > data.len() {
                self.block += 1;
                self.offset = 0;
                continue;
            }
            let mut len = [0u8; LEN_PREFIX];
            len.copy_from_slice(&data[self.offset..self.offset + LEN_PREFIX]);
            let start = self.offset + LEN_PREFIX;
            let end = start + u32::from_le_bytes(len) as usize;
            self.offset = end;
            return Some(data[start..end].to_vec());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_split_across_blocks() -> Result<()> {
        let channel = MemoryChannel::new();
        let mut out = channel.emitter_with_block_size(16);
        for i in 0u8..10 {
            out.emit(&[i; 5])?;
        }
        // 9 bytes per framed record, so every second record fills a block
        assert_eq!(channel.num_blocks(), 5);
        out.flush()?;
        assert_eq!(channel.num_records(), 10);

        let read: Vec<Vec<u8>> = channel.reader().collect();
        assert_eq!(read.len(), 10);
        assert_eq!(read[3], vec![3u8; 5]);
        Ok(())
    }

    #[test]
    fn unflushed_records_are_invisible_until_drop() -> Result<()> {
        let channel = MemoryChannel::new();
        {
            let mut out = channel.emitter();
            out.emit(b"abc")?;
            assert_eq!(channel.reader().count(), 0);
        }
        assert_eq!(channel.reader().collect::<Vec<_>>(), vec![b"abc".to_vec()]);
        Ok(())
    }

    #[test]
    fn empty_records_round_trip() -> Result<()> {
        let channel = MemoryChannel::new();
        let mut out = channel.emitter();
        out.emit(&[])?;
        out.emit(b"x")?;
        out.flush()?;
        assert_eq!(
            channel.reader().collect::<Vec<_>>(),
            vec![Vec::new(), b"x".to_vec()]
        );
        Ok(())
    }

    #[test]
    fn closed_channel_rejects_blocks() -> Result<()> {
        let channel = MemoryChannel::new();
        let mut out = channel.emitter();
        out.emit(b"late")?;
        channel.close();
        assert!(out.flush().is_err());
        assert!(channel.is_closed());
        Ok(())
    }
}
