//! Staging layer for adaptive-population particle filters.

use ndarray::{Array2, ArrayView2, Axis, concatenate, s};
use serde::{Deserialize, Serialize};
use tracing::error;

use clio_store::ArrayStore;

use crate::error::CacheError;
use crate::particle::{ParticleFilterCache, ParticleFilterSnapshot};
use crate::slot::SlotCache;

/// Wrapper around [`ParticleFilterCache`] for filters whose particle
/// count per time step is not known until a stopping rule fires.
///
/// Writes accumulate in buffers keyed by the local offset `j = t -
/// base`, growing the particle dimension as more particles are
/// contributed for the same step. Nothing reaches the wrapped cache,
/// and no genealogy nodes are created, until [`AdaptivePFCache::push`]
/// commits the window truncated to the final particle count. Partial
/// populations therefore do not support trajectory queries.
#[derive(Debug)]
pub struct AdaptivePFCache<S: ArrayStore> {
    inner: ParticleFilterCache<S>,
    /// Buffered times while adapting, by local step.
    times: SlotCache<f64>,
    /// Buffered particle states while adapting, by local step.
    states: SlotCache<Array2<f64>>,
    /// Buffered log-weights while adapting, by local step.
    weights: SlotCache<Vec<f64>>,
    /// Buffered ancestor slots while adapting, by local step.
    ancestors: SlotCache<Vec<usize>>,
    /// First time index of the adaptive window; unset until the first
    /// write after construction, `clear`, or `push`.
    base: Option<usize>,
    /// Buffered local steps.
    steps: usize,
    /// State dimension established by the first buffered generation.
    state_dim: Option<usize>,
}

impl<S: ArrayStore> AdaptivePFCache<S> {
    /// Creates a staging cache in front of a fresh
    /// [`ParticleFilterCache`] on `store`.
    pub fn new(store: S) -> Self {
        Self {
            inner: ParticleFilterCache::new(store),
            times: SlotCache::new(),
            states: SlotCache::new(),
            weights: SlotCache::new(),
            ancestors: SlotCache::new(),
            base: None,
            steps: 0,
            state_dim: None,
        }
    }

    /// The wrapped cache. Reflects pushed generations only.
    pub fn inner(&self) -> &ParticleFilterCache<S> {
        &self.inner
    }

    /// Number of buffered local steps in the adaptive window.
    pub fn buffered_steps(&self) -> usize {
        self.steps
    }

    /// Smallest particle count across buffered steps: the largest
    /// population a push can commit. Zero while the window is empty.
    pub fn particles(&self) -> usize {
        (0..self.steps)
            .map(|j| self.states.get(j).map_or(0, |s| s.nrows()))
            .min()
            .unwrap_or(0)
    }

    /// Maps `t` to its local offset, extending the window by at most
    /// one step. The first write after a push fixes `base = t`.
    fn local(&mut self, t: usize) -> Result<usize, CacheError> {
        let base = *self.base.get_or_insert(t);
        if t < base || t > base + self.steps {
            return Err(CacheError::NonContiguousWrite {
                index: t,
                lo: base,
                hi: base + self.steps,
            });
        }
        let j = t - base;
        if j == self.steps {
            self.steps += 1;
        }
        Ok(j)
    }

    /// Buffers the simulation time for index `t`.
    pub fn write_time(&mut self, t: usize, time: f64) -> Result<(), CacheError> {
        let j = self.local(t)?;
        self.times.set(j, time);
        Ok(())
    }

    /// Appends particles to the running population for time index `t`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::DimensionMismatch`] if `states.nrows()`
    /// differs from `ancestors.len()` or the state dimension differs
    /// from earlier writes, [`CacheError::NonContiguousWrite`] if `t`
    /// does not extend or revisit the buffered window.
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
        let dim = *self.state_dim.get_or_insert(states.ncols());
        if states.ncols() != dim {
            return Err(CacheError::DimensionMismatch {
                expected: dim,
                got: states.ncols(),
            });
        }
        let j = self.local(t)?;

        if self.states.is_valid(j) {
            let existing = self.states.get_mut(j).expect("validity checked above");
            *existing = concatenate![Axis(0), existing.view(), states];
        } else {
            self.states.set(j, states.to_owned());
        }
        if self.ancestors.is_valid(j) {
            self.ancestors
                .get_mut(j)
                .expect("validity checked above")
                .extend_from_slice(ancestors);
        } else {
            self.ancestors.set(j, ancestors.to_vec());
        }
        Ok(())
    }

    /// Appends log-weights to the running population for time index `t`.
    pub fn write_log_weights(&mut self, t: usize, weights: &[f64]) -> Result<(), CacheError> {
        let j = self.local(t)?;
        if self.weights.is_valid(j) {
            self.weights
                .get_mut(j)
                .expect("validity checked above")
                .extend_from_slice(weights);
        } else {
            self.weights.set(j, weights.to_vec());
        }
        Ok(())
    }

    /// Buffers the resample flag directly on the wrapped cache (flags
    /// are per step, not per particle, so they need no staging).
    pub fn write_resample(&mut self, t: usize, resampled: bool) -> Result<(), CacheError> {
        self.inner.write_resample(t, resampled)
    }

    /// Commits the buffered window, truncated to the first
    /// `final_count` particles per step, into the wrapped cache via
    /// its ordinary write path, then resets the window.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::IncompleteStep`] if any buffered step is
    /// missing time, state, or weight data, and
    /// [`CacheError::InsufficientParticles`] if any step holds fewer
    /// than `final_count` particles. The window is left intact on
    /// error.
    pub fn push(&mut self, final_count: usize) -> Result<(), CacheError> {
        let Some(base) = self.base else {
            return Ok(());
        };

        for j in 0..self.steps {
            let have = self.states.get(j).map_or(0, |s| s.nrows());
            if !self.times.is_valid(j)
                || !self.states.is_valid(j)
                || !self.weights.is_valid(j)
            {
                return Err(CacheError::IncompleteStep { step: j });
            }
            let weights = self.weights.get(j).expect("validity checked above");
            if have < final_count || weights.len() < final_count {
                return Err(CacheError::InsufficientParticles {
                    step: j,
                    have: have.min(weights.len()),
                    requested: final_count,
                });
            }
        }

        for j in 0..self.steps {
            let time = *self.times.get(j).expect("validity checked above");
            self.inner.write_time(base + j, time)?;

            let states = self.states.get(j).expect("validity checked above");
            let ancestors = self.ancestors.get(j).expect("written alongside states");
            self.inner.write_state(
                base + j,
                states.slice(s![..final_count, ..]),
                &ancestors[..final_count],
            )?;

            let weights = self.weights.get(j).expect("validity checked above");
            self.inner.write_log_weights(base + j, &weights[..final_count])?;
        }

        self.times.clear();
        self.states.clear();
        self.weights.clear();
        self.ancestors.clear();
        self.base = None;
        self.steps = 0;
        Ok(())
    }

    /// The most recent log-weight vector pushed to the wrapped cache.
    pub fn log_weights(&self) -> &[f64] {
        self.inner.log_weights()
    }

    /// Reconstructs the trajectory of a pushed particle at frontier
    /// `slot`.
    pub fn read_trajectory(&self, slot: usize) -> Result<Array2<f64>, CacheError> {
        self.inner.read_trajectory(slot)
    }

    /// Pushes the buffered window at its common particle count, then
    /// flushes the wrapped cache.
    pub fn flush(&mut self) -> Result<(), CacheError> {
        if self.steps > 0 {
            let count = self.particles();
            self.push(count)?;
        }
        self.inner.flush()
    }

    /// Discards buffered and wrapped state for a fresh run.
    pub fn clear(&mut self) {
        self.inner.clear();
        self.times.clear();
        self.states.clear();
        self.weights.clear();
        self.ancestors.clear();
        self.base = None;
        self.steps = 0;
        self.state_dim = None;
    }

    /// As [`AdaptivePFCache::clear`], additionally releasing storage.
    pub fn empty(&mut self) {
        self.inner.empty();
        self.times.empty();
        self.states.empty();
        self.weights.empty();
        self.ancestors.empty();
        self.base = None;
        self.steps = 0;
        self.state_dim = None;
    }

    /// Captures all buffered state, including the wrapped cache's, for
    /// checkpointing.
    pub fn snapshot(&self) -> AdaptivePFSnapshot {
        AdaptivePFSnapshot {
            inner: self.inner.snapshot(),
            times: self.times.clone(),
            states: self.states.clone(),
            weights: self.weights.clone(),
            ancestors: self.ancestors.clone(),
            base: self.base,
            steps: self.steps,
            state_dim: self.state_dim,
        }
    }

    /// Restores buffered state from a snapshot.
    pub fn restore(&mut self, snapshot: AdaptivePFSnapshot) {
        self.inner.restore(snapshot.inner);
        self.times = snapshot.times;
        self.states = snapshot.states;
        self.weights = snapshot.weights;
        self.ancestors = snapshot.ancestors;
        self.base = snapshot.base;
        self.steps = snapshot.steps;
        self.state_dim = snapshot.state_dim;
    }
}

impl<S: ArrayStore> Drop for AdaptivePFCache<S> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!(error = %e, "adaptive particle filter cache flush failed during drop");
        }
    }
}

/// Serializable copy of an [`AdaptivePFCache`]'s buffered state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptivePFSnapshot {
    inner: ParticleFilterSnapshot,
    times: SlotCache<f64>,
    states: SlotCache<Array2<f64>>,
    weights: SlotCache<Vec<f64>>,
    ancestors: SlotCache<Vec<usize>>,
    base: Option<usize>,
    steps: usize,
    state_dim: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clio_store::MemStore;
    use ndarray::array;

    fn block(t: usize, offset: usize, p: usize) -> Array2<f64> {
        Array2::from_shape_fn((p, 1), |(i, _)| (t * 100 + offset + i) as f64)
    }

    #[test]
    fn buffers_grow_per_step() {
        let mut cache = AdaptivePFCache::new(MemStore::new());
        cache.write_time(0, 0.0).unwrap();
        cache.write_state(0, block(0, 0, 2).view(), &[0, 1]).unwrap();
        cache.write_log_weights(0, &[-1.0, -1.0]).unwrap();

        cache.write_state(0, block(0, 2, 3).view(), &[0, 0, 1]).unwrap();
        cache.write_log_weights(0, &[-2.0, -2.0, -2.0]).unwrap();

        assert_eq!(cache.buffered_steps(), 1);
        assert_eq!(cache.particles(), 5);
        // Nothing reached the wrapped cache yet.
        assert_eq!(cache.inner().ancestry().generations(), 0);
        assert_eq!(cache.inner().store().len("x_0"), 0);
    }

    #[test]
    fn window_contiguity_enforced() {
        let mut cache = AdaptivePFCache::new(MemStore::new());
        cache.write_time(3, 0.3).unwrap();
        // base is now 3; earlier and gapped steps are rejected.
        assert!(matches!(
            cache.write_time(2, 0.2),
            Err(CacheError::NonContiguousWrite { index: 2, lo: 3, hi: 4 })
        ));
        assert!(matches!(
            cache.write_time(5, 0.5),
            Err(CacheError::NonContiguousWrite { index: 5, lo: 3, hi: 4 })
        ));
        cache.write_time(4, 0.4).unwrap();
        assert_eq!(cache.buffered_steps(), 2);
    }

    #[test]
    fn push_truncates_and_resets() {
        let mut cache = AdaptivePFCache::new(MemStore::new());
        for t in 0..2 {
            cache.write_time(t, t as f64).unwrap();
            cache.write_state(t, block(t, 0, 4).view(), &[0, 1, 2, 3]).unwrap();
            cache
                .write_log_weights(t, &[-1.0, -2.0, -3.0, -4.0])
                .unwrap();
        }

        cache.push(2).unwrap();

        assert_eq!(cache.buffered_steps(), 0);
        assert_eq!(cache.particles(), 0);
        let inner = cache.inner();
        assert_eq!(inner.ancestry().generations(), 2);
        assert_eq!(inner.ancestry().frontier_len(), 2);
        assert_eq!(inner.size(), 2);
        assert_eq!(inner.log_weights(), &[-1.0, -2.0]);
        // Only the first two particles reached the store.
        let x = inner.store().read_rows("x_0", 0, 2).unwrap();
        assert_eq!(x, array![[0.0, 1.0], [100.0, 101.0]]);
    }

    #[test]
    fn push_rejects_oversized_count() {
        let mut cache = AdaptivePFCache::new(MemStore::new());
        cache.write_time(0, 0.0).unwrap();
        cache.write_state(0, block(0, 0, 3).view(), &[0, 1, 2]).unwrap();
        cache.write_log_weights(0, &[-1.0, -1.0, -1.0]).unwrap();

        let result = cache.push(4);
        assert!(matches!(
            result,
            Err(CacheError::InsufficientParticles {
                step: 0,
                have: 3,
                requested: 4
            })
        ));
        // Window is untouched; a valid push still works.
        assert_eq!(cache.buffered_steps(), 1);
        cache.push(3).unwrap();
        assert_eq!(cache.inner().ancestry().frontier_len(), 3);
    }

    #[test]
    fn push_rejects_incomplete_step() {
        let mut cache = AdaptivePFCache::new(MemStore::new());
        cache.write_time(0, 0.0).unwrap();
        cache.write_state(0, block(0, 0, 2).view(), &[0, 1]).unwrap();
        // No log-weights for step 0.
        assert!(matches!(
            cache.push(2),
            Err(CacheError::IncompleteStep { step: 0 })
        ));
    }

    #[test]
    fn push_on_empty_window_is_noop() {
        let mut cache: AdaptivePFCache<MemStore> = AdaptivePFCache::new(MemStore::new());
        cache.push(10).unwrap();
        assert_eq!(cache.inner().ancestry().generations(), 0);
    }

    #[test]
    fn window_restarts_after_push() {
        let mut cache = AdaptivePFCache::new(MemStore::new());
        cache.write_time(0, 0.0).unwrap();
        cache.write_state(0, block(0, 0, 2).view(), &[0, 1]).unwrap();
        cache.write_log_weights(0, &[-1.0, -1.0]).unwrap();
        cache.push(2).unwrap();

        // The next window starts where the last one ended.
        cache.write_time(1, 1.0).unwrap();
        cache.write_state(1, block(1, 0, 2).view(), &[1, 0]).unwrap();
        cache.write_log_weights(1, &[-2.0, -2.0]).unwrap();
        cache.push(2).unwrap();

        assert_eq!(cache.inner().ancestry().generations(), 2);
        let path = cache.read_trajectory(0).unwrap();
        assert_eq!(path, array![[1.0], [100.0]]);
    }

    #[test]
    fn state_dim_mismatch_rejected() {
        let mut cache = AdaptivePFCache::new(MemStore::new());
        cache.write_state(0, block(0, 0, 2).view(), &[0, 1]).unwrap();
        let wide = Array2::zeros((2, 3));
        assert!(matches!(
            cache.write_state(0, wide.view(), &[0, 1]),
            Err(CacheError::DimensionMismatch { expected: 1, got: 3 })
        ));
    }

    #[test]
    fn snapshot_restore_round_trip() {
        let mut cache = AdaptivePFCache::new(MemStore::new());
        cache.write_time(0, 0.0).unwrap();
        cache.write_state(0, block(0, 0, 3).view(), &[0, 1, 2]).unwrap();
        cache.write_log_weights(0, &[-1.0, -1.0, -1.0]).unwrap();

        let snapshot = cache.snapshot();
        cache.clear();
        assert_eq!(cache.buffered_steps(), 0);

        cache.restore(snapshot);
        assert_eq!(cache.buffered_steps(), 1);
        assert_eq!(cache.particles(), 3);
        cache.push(3).unwrap();
        assert_eq!(cache.inner().ancestry().frontier_len(), 3);
    }
}
