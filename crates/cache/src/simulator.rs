//! Buffered cache of simulation times with batched write-through.

use serde::{Deserialize, Serialize};
use tracing::error;

use clio_store::{ArrayStore, TIME};

use crate::error::CacheError;
use crate::slot::SlotCache;

/// Buffers per-time simulation times and commits them to the store in
/// one batched call at flush time, amortizing I/O across many steps.
///
/// The cache owns the store handle; composed caches for the same
/// output file reach the store through [`SimulatorCache::store_mut`].
/// Only the not-yet-flushed suffix is buffered: once an index is
/// committed, reads of it fall through to the store and the in-memory
/// copy is released. Dropping the cache flushes implicitly.
#[derive(Debug)]
pub struct SimulatorCache<S: ArrayStore> {
    store: S,
    /// Buffered suffix; slot `k - flushed` holds the time for index `k`.
    times: SlotCache<f64>,
    /// Leading entries already committed to the store.
    flushed: usize,
    /// Logical number of times (committed + buffered).
    len: usize,
}

impl<S: ArrayStore> SimulatorCache<S> {
    /// Creates a cache writing through to `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            times: SlotCache::new(),
            flushed: 0,
            len: 0,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the underlying store.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Writes the time for index `k`.
    ///
    /// Writes must be contiguous from the current end (`k == size()`
    /// extends the length by one) or exactly overwrite a still-buffered
    /// index.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::AlreadyFlushed`] for an index committed by
    /// an earlier flush, [`CacheError::NonContiguousWrite`] for a gap.
    pub fn write_time(&mut self, k: usize, t: f64) -> Result<(), CacheError> {
        if k < self.flushed {
            return Err(CacheError::AlreadyFlushed {
                index: k,
                flushed: self.flushed,
            });
        }
        if k > self.len {
            return Err(CacheError::NonContiguousWrite {
                index: k,
                lo: self.flushed,
                hi: self.len,
            });
        }
        if k == self.len {
            self.len += 1;
        }
        self.times.set(k - self.flushed, t);
        Ok(())
    }

    /// Writes a contiguous run of times starting at index `k`.
    pub fn write_times(&mut self, k: usize, ts: &[f64]) -> Result<(), CacheError> {
        if k < self.flushed {
            return Err(CacheError::AlreadyFlushed {
                index: k,
                flushed: self.flushed,
            });
        }
        if k > self.len {
            return Err(CacheError::NonContiguousWrite {
                index: k,
                lo: self.flushed,
                hi: self.len,
            });
        }
        self.times.set_range(k - self.flushed, ts);
        self.len = self.len.max(k + ts.len());
        Ok(())
    }

    /// Reads the time for index `k`, falling through to the store for
    /// indices committed by an earlier flush.
    pub fn read_time(&self, k: usize) -> Result<f64, CacheError> {
        if k >= self.len {
            return Err(CacheError::IndexOutOfRange {
                index: k,
                len: self.len,
            });
        }
        if k >= self.flushed {
            Ok(*self.times.get(k - self.flushed).expect("buffered suffix is contiguous"))
        } else {
            Ok(self.store.read_range(TIME, k, 1)?[0])
        }
    }

    /// Reads a contiguous run of `len` times starting at index `k`,
    /// stitching committed and buffered entries as needed.
    pub fn read_times(&self, k: usize, len: usize) -> Result<Vec<f64>, CacheError> {
        if k + len > self.len {
            return Err(CacheError::IndexOutOfRange {
                index: k + len.saturating_sub(1),
                len: self.len,
            });
        }
        let split = self.flushed.clamp(k, k + len);
        let mut out = if split > k {
            self.store.read_range(TIME, k, split - k)?
        } else {
            Vec::with_capacity(len)
        };
        if split < k + len {
            let buffered = self
                .times
                .get_range(split - self.flushed, k + len - split)
                .expect("buffered suffix is contiguous");
            out.extend_from_slice(buffered);
        }
        Ok(out)
    }

    /// Logical number of times written so far.
    pub fn size(&self) -> usize {
        self.len
    }

    /// Commits the buffered suffix to the store in one batched write
    /// and releases it. A second flush with no intervening writes is a
    /// no-op.
    pub fn flush(&mut self) -> Result<(), CacheError> {
        let pending = self.len - self.flushed;
        if pending > 0 {
            let values = self
                .times
                .get_range(0, pending)
                .expect("buffered suffix is contiguous");
            self.store.write_range(TIME, self.flushed, values)?;
            self.flushed = self.len;
            self.times.clear();
        }
        Ok(())
    }

    /// Discards buffered and committed bookkeeping for a fresh run,
    /// keeping allocated capacity.
    pub fn clear(&mut self) {
        self.times.clear();
        self.flushed = 0;
        self.len = 0;
    }

    /// As [`SimulatorCache::clear`], additionally releasing storage.
    pub fn empty(&mut self) {
        self.times.empty();
        self.flushed = 0;
        self.len = 0;
    }

    /// Captures buffered state for checkpointing. The store handle is
    /// not part of the snapshot.
    pub fn snapshot(&self) -> SimulatorSnapshot {
        SimulatorSnapshot {
            times: self.times.clone(),
            flushed: self.flushed,
            len: self.len,
        }
    }

    /// Restores buffered state from a snapshot.
    pub fn restore(&mut self, snapshot: SimulatorSnapshot) {
        self.times = snapshot.times;
        self.flushed = snapshot.flushed;
        self.len = snapshot.len;
    }
}

impl<S: ArrayStore> Drop for SimulatorCache<S> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!(error = %e, "simulator cache flush failed during drop");
        }
    }
}

/// Serializable copy of a [`SimulatorCache`]'s buffered state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorSnapshot {
    times: SlotCache<f64>,
    flushed: usize,
    len: usize,
}
