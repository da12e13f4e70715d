//! Write path for a bootstrap-style particle filter.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::error;

use clio_ancestry::{AncestrySnapshot, AncestryStore};
use clio_store::{ANCESTOR, ArrayStore, LOG_LIKELIHOOD, LOG_WEIGHT, RESAMPLE, state_var};

use crate::error::CacheError;
use crate::simulator::{SimulatorCache, SimulatorSnapshot};
use crate::slot::SlotCache;

/// Cache composing the particle-filter write path: buffered times,
/// the genealogy forest, buffered resample flags, and the most recent
/// log-weight vector.
///
/// Raw state, ancestor, and log-weight arrays are written through to
/// the store immediately (they are too large to buffer usefully)
/// while the genealogy keeps only the metadata needed to reconstruct
/// trajectories for live particles. Times and resample flags are
/// buffered and committed at flush. Dropping the cache flushes
/// implicitly.
#[derive(Debug)]
pub struct ParticleFilterCache<S: ArrayStore> {
    sim: SimulatorCache<S>,
    ancestry: AncestryStore,
    /// Most recent log-weight vector, retained for the caller's next
    /// proposal step independent of the store.
    last_log_weights: Vec<f64>,
    resample: SlotCache<bool>,
    resample_flushed: usize,
    resample_len: usize,
}

impl<S: ArrayStore> ParticleFilterCache<S> {
    /// Creates a cache writing through to `store`.
    pub fn new(store: S) -> Self {
        Self {
            sim: SimulatorCache::new(store),
            ancestry: AncestryStore::new(),
            last_log_weights: Vec::new(),
            resample: SlotCache::new(),
            resample_flushed: 0,
            resample_len: 0,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        self.sim.store()
    }

    /// Mutable access to the underlying store.
    pub fn store_mut(&mut self) -> &mut S {
        self.sim.store_mut()
    }

    /// The genealogy forest (instrumentation and trajectory access).
    pub fn ancestry(&self) -> &AncestryStore {
        &self.ancestry
    }

    /// Writes the simulation time for index `k`.
    pub fn write_time(&mut self, k: usize, t: f64) -> Result<(), CacheError> {
        self.sim.write_time(k, t)
    }

    /// Reads the simulation time for index `k`.
    pub fn read_time(&self, k: usize) -> Result<f64, CacheError> {
        self.sim.read_time(k)
    }

    /// Number of time indices written so far.
    pub fn size(&self) -> usize {
        self.sim.size()
    }

    /// Writes one generation of particle states with their ancestor
    /// slots: states and ancestors go straight to the store, and a
    /// generation is appended to the genealogy forest.
    ///
    /// `t` must equal the number of generations written so far
    /// (strictly increasing time order per run).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::DimensionMismatch`] if `states.nrows()`
    /// differs from `ancestors.len()`,
    /// [`CacheError::NonContiguousWrite`] for an out-of-order `t`, and
    /// store or ancestry failures otherwise.
    pub fn write_state(
        &mut self,
        t: usize,
        states: ArrayView2<'_, f64>,
        ancestors: &[usize],
    ) -> Result<(), CacheError> {
        if states.nrows() != ancestors.len() {
            return Err(CacheError::DimensionMismatch {
                expected: ancestors.len(),
                got: states.nrows(),
            });
        }
        let expected = self.ancestry.generations();
        if t != expected {
            return Err(CacheError::NonContiguousWrite {
                index: t,
                lo: expected,
                hi: expected,
            });
        }

        for v in 0..states.ncols() {
            let row = states.column(v).insert_axis(Axis(0));
            self.sim.store_mut().write_rows(&state_var(v), t, row)?;
        }
        let ancestor_row: Vec<f64> = ancestors.iter().map(|&a| a as f64).collect();
        let ancestor_row = Array2::from_shape_vec((1, ancestor_row.len()), ancestor_row)
            .expect("1 x n shape always valid");
        self.sim.store_mut().write_rows(ANCESTOR, t, ancestor_row.view())?;

        self.ancestry.append_generation(states, ancestors)?;
        Ok(())
    }

    /// Writes the log-weight vector for time index `t` through to the
    /// store and retains it as the most recent vector.
    pub fn write_log_weights(&mut self, t: usize, weights: &[f64]) -> Result<(), CacheError> {
        let row = Array2::from_shape_vec((1, weights.len()), weights.to_vec())
            .expect("1 x n shape always valid");
        self.sim.store_mut().write_rows(LOG_WEIGHT, t, row.view())?;
        self.last_log_weights.clear();
        self.last_log_weights.extend_from_slice(weights);
        Ok(())
    }

    /// The most recent log-weight vector written to the cache.
    pub fn log_weights(&self) -> &[f64] {
        &self.last_log_weights
    }

    /// Writes the resample flag for time index `t` (true iff
    /// resampling was performed before advancing past `t`).
    pub fn write_resample(&mut self, t: usize, resampled: bool) -> Result<(), CacheError> {
        if t < self.resample_flushed {
            return Err(CacheError::AlreadyFlushed {
                index: t,
                flushed: self.resample_flushed,
            });
        }
        if t > self.resample_len {
            return Err(CacheError::NonContiguousWrite {
                index: t,
                lo: self.resample_flushed,
                hi: self.resample_len,
            });
        }
        if t == self.resample_len {
            self.resample_len += 1;
        }
        self.resample.set(t - self.resample_flushed, resampled);
        Ok(())
    }

    /// Reads the resample flag for time index `t`, falling through to
    /// the store for flushed indices.
    pub fn read_resample(&self, t: usize) -> Result<bool, CacheError> {
        if t >= self.resample_len {
            return Err(CacheError::IndexOutOfRange {
                index: t,
                len: self.resample_len,
            });
        }
        if t >= self.resample_flushed {
            Ok(*self
                .resample
                .get(t - self.resample_flushed)
                .expect("buffered suffix is contiguous"))
        } else {
            Ok(self.sim.store().read_range(RESAMPLE, t, 1)?[0] != 0.0)
        }
    }

    /// Appends the filter's marginal log-likelihood estimate to the
    /// store.
    pub fn write_log_likelihood(&mut self, ll: f64) -> Result<(), CacheError> {
        let at = self.sim.store().len(LOG_LIKELIHOOD);
        self.sim.store_mut().write_range(LOG_LIKELIHOOD, at, &[ll])?;
        Ok(())
    }

    /// Reconstructs the trajectory of the particle at frontier `slot`.
    pub fn read_trajectory(&self, slot: usize) -> Result<Array2<f64>, CacheError> {
        Ok(self.ancestry.trajectory(slot)?)
    }

    /// Reconstructs a trajectory into a pre-allocated matrix.
    pub fn read_trajectory_into(
        &self,
        slot: usize,
        out: &mut Array2<f64>,
    ) -> Result<(), CacheError> {
        Ok(self.ancestry.trajectory_into(slot, out)?)
    }

    /// Commits buffered resample flags and times to the store. The
    /// genealogy is never persisted; trajectories are reconstructed,
    /// not replayed, across runs.
    pub fn flush(&mut self) -> Result<(), CacheError> {
        let pending = self.resample_len - self.resample_flushed;
        if pending > 0 {
            let values: Vec<f64> = self
                .resample
                .get_range(0, pending)
                .expect("buffered suffix is contiguous")
                .iter()
                .map(|&r| if r { 1.0 } else { 0.0 })
                .collect();
            self.sim
                .store_mut()
                .write_range(RESAMPLE, self.resample_flushed, &values)?;
            self.resample_flushed = self.resample_len;
            self.resample.clear();
        }
        self.sim.flush()
    }

    /// Discards all buffered state for a fresh run, keeping capacity.
    pub fn clear(&mut self) {
        self.ancestry.clear();
        self.resample.clear();
        self.resample_flushed = 0;
        self.resample_len = 0;
        self.last_log_weights.clear();
        self.sim.clear();
    }

    /// As [`ParticleFilterCache::clear`], additionally releasing
    /// storage.
    pub fn empty(&mut self) {
        self.ancestry.empty();
        self.resample.empty();
        self.resample_flushed = 0;
        self.resample_len = 0;
        self.last_log_weights = Vec::new();
        self.sim.empty();
    }

    /// Captures all buffered state for checkpointing.
    pub fn snapshot(&self) -> ParticleFilterSnapshot {
        ParticleFilterSnapshot {
            sim: self.sim.snapshot(),
            ancestry: self.ancestry.snapshot(),
            last_log_weights: self.last_log_weights.clone(),
            resample: self.resample.clone(),
            resample_flushed: self.resample_flushed,
            resample_len: self.resample_len,
        }
    }

    /// Restores buffered state from a snapshot.
    pub fn restore(&mut self, snapshot: ParticleFilterSnapshot) {
        self.sim.restore(snapshot.sim);
        self.ancestry.restore(snapshot.ancestry);
        self.last_log_weights = snapshot.last_log_weights;
        self.resample = snapshot.resample;
        self.resample_flushed = snapshot.resample_flushed;
        self.resample_len = snapshot.resample_len;
    }
}

impl<S: ArrayStore> Drop for ParticleFilterCache<S> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!(error = %e, "particle filter cache flush failed during drop");
        }
    }
}

/// Serializable copy of a [`ParticleFilterCache`]'s buffered state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleFilterSnapshot {
    sim: SimulatorSnapshot,
    ancestry: AncestrySnapshot,
    last_log_weights: Vec<f64>,
    resample: SlotCache<bool>,
    resample_flushed: usize,
    resample_len: usize,
}
