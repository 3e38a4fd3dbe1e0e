//! Output sinks bound to table partitions.
//!
//! Each partition of a [`ReducePreTable`](crate::ReducePreTable) owns exactly one
//! [`Emitter`]. Draining a partition calls [`Emitter::emit`] once per accumulated
//! value and [`Emitter::flush`] once at the end; what happens to the bytes after
//! that (buffering, shipping to a peer, handing to a local consumer) is up to the
//! emitter.
//!
//! Sinks are usually owned by the caller. Passing `&mut emitter` to the table works
//! because `&mut E` is itself an `Emitter`; the borrow then has to outlive the
//! table, which the compiler enforces.

use anyhow::Result;

/// Append-only record sink.
pub trait Emitter {
    /// Append one serialized record.
    ///
    /// # Errors
    ///
    /// Whatever the underlying transport reports. The table propagates it as
    /// [`TableError::Sink`](crate::TableError::Sink) without retrying.
    fn emit(&mut self, record: &[u8]) -> Result<()>;

    /// Push out anything buffered. Called after every drain.
    ///
    /// # Errors
    ///
    /// Same as [`emit`](Self::emit).
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<E: Emitter + ?Sized> Emitter for &mut E {
    #[inline]
    fn emit(&mut self, record: &[u8]) -> Result<()> {
        (**self).emit(record)
    }

    #[inline]
    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<E: Emitter + ?Sized> Emitter for Box<E> {
    #[inline]
    fn emit(&mut self, record: &[u8]) -> Result<()> {
        (**self).emit(record)
    }

    #[inline]
    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Collects records in memory, one `Vec<u8>` each.
impl Emitter for Vec<Vec<u8>> {
    fn emit(&mut self, record: &[u8]) -> Result<()> {
        self.push(record.to_vec());
        Ok(())
    }
}
