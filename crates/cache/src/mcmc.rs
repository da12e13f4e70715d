//! Bounded sliding-window cache of posterior samples.

use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::error;

use clio_store::{ArrayStore, LOG_LIKELIHOOD, LOG_PRIOR, PARAMETER, state_var};

use crate::cross::CrossCache;
use crate::error::CacheError;
use crate::simulator::{SimulatorCache, SimulatorSnapshot};
use crate::slot::SlotCache;

/// Configuration for [`McmcCache`].
///
/// The window byte budget bounds how many posterior samples are held
/// in memory between flushes.
///
/// # Example
///
/// ```
/// use clio_cache::McmcConfig;
///
/// let config = McmcConfig::new().with_window_bytes(65_536);
/// assert_eq!(config.window_samples(), 8192);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct McmcConfig {
    /// Byte budget controlling the sample count per flush.
    window_bytes: usize,
}

impl McmcConfig {
    /// Default window budget of 16 KiB (2048 samples).
    pub const DEFAULT_WINDOW_BYTES: usize = 16_384;

    /// Creates a configuration with the default window budget.
    pub fn new() -> Self {
        Self {
            window_bytes: Self::DEFAULT_WINDOW_BYTES,
        }
    }

    /// Sets the window byte budget.
    pub fn with_window_bytes(mut self, window_bytes: usize) -> Self {
        self.window_bytes = window_bytes;
        self
    }

    /// Returns the window byte budget.
    pub fn window_bytes(&self) -> usize {
        self.window_bytes
    }

    /// Window capacity in samples.
    pub fn window_samples(&self) -> usize {
        self.window_bytes / std::mem::size_of::<f64>()
    }

    /// Validates this configuration.
    ///
    /// Returns an error if the budget is smaller than one sample.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.window_samples() == 0 {
            return Err(CacheError::InvalidConfig {
                reason: format!(
                    "window_bytes = {} holds no samples (minimum {})",
                    self.window_bytes,
                    std::mem::size_of::<f64>()
                ),
            });
        }
        Ok(())
    }
}

impl Default for McmcConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Sliding-window buffer of posterior samples (log-likelihood,
/// log-prior, parameter vector, state trajectory), flushed to the
/// store in index-contiguous batches.
///
/// Trajectories are stored per time step (rows = sample slot, columns
/// = variable) rather than per sample, so a flush can write one store
/// block per model variable spanning all buffered times and samples:
/// variables outermost, times innermost. Dropping the cache flushes
/// implicitly.
#[derive(Debug)]
pub struct McmcCache<S: ArrayStore> {
    sim: SimulatorCache<S>,
    ll: SlotCache<f64>,
    lp: SlotCache<f64>,
    params: CrossCache,
    /// One column store per trajectory time index.
    paths: Vec<CrossCache>,
    /// Sample id of the first window slot.
    first: usize,
    /// Samples currently in the window.
    len: usize,
    capacity: usize,
    n_params: usize,
    n_vars: usize,
}

impl<S: ArrayStore> McmcCache<S> {
    /// Creates a cache writing through to `store` for samples with
    /// `n_params` parameters and `n_vars` state variables.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] if the window budget
    /// holds no samples.
    pub fn new(
        store: S,
        n_params: usize,
        n_vars: usize,
        config: McmcConfig,
    ) -> Result<Self, CacheError> {
        config.validate()?;
        let capacity = config.window_samples();
        Ok(Self {
            sim: SimulatorCache::new(store),
            ll: SlotCache::with_len(capacity),
            lp: SlotCache::with_len(capacity),
            params: CrossCache::new(capacity, n_params),
            paths: Vec::new(),
            first: 0,
            len: 0,
            capacity,
            n_params,
            n_vars,
        })
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        self.sim.store()
    }

    /// Window capacity in samples.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sample id of the first buffered slot.
    pub fn first(&self) -> usize {
        self.first
    }

    /// Number of buffered samples.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no samples are buffered.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True once the window has reached capacity; the driving loop
    /// should flush before writing further samples.
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Writes the simulation time for trajectory index `k`.
    pub fn write_time(&mut self, k: usize, t: f64) -> Result<(), CacheError> {
        self.sim.write_time(k, t)
    }

    /// Reads the simulation time for trajectory index `k`.
    pub fn read_time(&self, k: usize) -> Result<f64, CacheError> {
        self.sim.read_time(k)
    }

    /// Maps sample id `p` to its window offset, extending the window
    /// when `p` is the first gap position.
    fn ensure_window(&mut self, p: usize) -> Result<usize, CacheError> {
        if self.len == 0 {
            self.first = p;
            self.len = 1;
            return Ok(0);
        }
        if p < self.first || p > self.first + self.len {
            return Err(CacheError::NonContiguousWrite {
                index: p,
                lo: self.first,
                hi: self.first + self.len,
            });
        }
        if p == self.first + self.len {
            if self.len == self.capacity {
                return Err(CacheError::WindowFull {
                    capacity: self.capacity,
                });
            }
            self.len += 1;
        }
        Ok(p - self.first)
    }

    fn window_offset(&self, p: usize) -> Result<usize, CacheError> {
        if p < self.first || p >= self.first + self.len {
            return Err(CacheError::IndexOutOfRange {
                index: p,
                len: self.first + self.len,
            });
        }
        Ok(p - self.first)
    }

    /// Writes the log-likelihood for sample `p`.
    pub fn write_log_likelihood(&mut self, p: usize, ll: f64) -> Result<(), CacheError> {
        let offset = self.ensure_window(p)?;
        self.ll.set(offset, ll);
        Ok(())
    }

    /// Reads the log-likelihood for sample `p` (must be in-window).
    pub fn read_log_likelihood(&self, p: usize) -> Result<f64, CacheError> {
        let offset = self.window_offset(p)?;
        self.ll
            .get(offset)
            .copied()
            .ok_or(CacheError::IndexOutOfRange {
                index: p,
                len: self.first + self.len,
            })
    }

    /// Writes the log-prior density for sample `p`.
    pub fn write_log_prior(&mut self, p: usize, lp: f64) -> Result<(), CacheError> {
        let offset = self.ensure_window(p)?;
        self.lp.set(offset, lp);
        Ok(())
    }

    /// Reads the log-prior density for sample `p` (must be in-window).
    pub fn read_log_prior(&self, p: usize) -> Result<f64, CacheError> {
        let offset = self.window_offset(p)?;
        self.lp
            .get(offset)
            .copied()
            .ok_or(CacheError::IndexOutOfRange {
                index: p,
                len: self.first + self.len,
            })
    }

    /// Writes the parameter vector for sample `p`.
    pub fn write_parameter(&mut self, p: usize, theta: &[f64]) -> Result<(), CacheError> {
        if theta.len() != self.n_params {
            return Err(CacheError::DimensionMismatch {
                expected: self.n_params,
                got: theta.len(),
            });
        }
        let offset = self.ensure_window(p)?;
        self.params.set_row(offset, ArrayView1::from(theta))
    }

    /// Reads the parameter vector for sample `p` (must be in-window).
    pub fn read_parameter(&self, p: usize) -> Result<Vec<f64>, CacheError> {
        let offset = self.window_offset(p)?;
        self.params
            .row(offset)
            .map(|r| r.to_vec())
            .ok_or(CacheError::IndexOutOfRange {
                index: p,
                len: self.first + self.len,
            })
    }

    /// Writes the trajectory for sample `p`; rows index times, columns
    /// index variables. All samples in a window share one trajectory
    /// length.
    pub fn write_path(&mut self, p: usize, path: ArrayView2<'_, f64>) -> Result<(), CacheError> {
        if path.ncols() != self.n_vars {
            return Err(CacheError::DimensionMismatch {
                expected: self.n_vars,
                got: path.ncols(),
            });
        }
        let offset = self.ensure_window(p)?;
        while self.paths.len() < path.nrows() {
            self.paths.push(CrossCache::new(self.capacity, self.n_vars));
        }
        for (t, row) in path.rows().into_iter().enumerate() {
            self.paths[t].set_row(offset, row)?;
        }
        Ok(())
    }

    /// Reads the trajectory for sample `p` (must be in-window); rows
    /// index times, columns index variables.
    pub fn read_path(&self, p: usize) -> Result<Array2<f64>, CacheError> {
        let offset = self.window_offset(p)?;
        let mut out = Array2::zeros((self.paths.len(), self.n_vars));
        for (t, store) in self.paths.iter().enumerate() {
            let row = store.row(offset).ok_or(CacheError::IndexOutOfRange {
                index: p,
                len: self.first + self.len,
            })?;
            out.row_mut(t).assign(&row);
        }
        Ok(out)
    }

    /// Commits the buffered window: one ranged write each for
    /// log-likelihoods, log-priors, and parameters, then one block per
    /// state variable spanning all buffered times and samples, then
    /// window reset. A second flush with nothing buffered is a no-op.
    pub fn flush(&mut self) -> Result<(), CacheError> {
        if self.len > 0 {
            self.ll.resize(self.len);
            self.lp.resize(self.len);
            let values = self.ll.raw_range(0, self.len);
            self.sim.store_mut().write_range(LOG_LIKELIHOOD, self.first, values)?;
            let values = self.lp.raw_range(0, self.len);
            self.sim.store_mut().write_range(LOG_PRIOR, self.first, values)?;
            self.sim
                .store_mut()
                .write_rows(PARAMETER, self.first, self.params.block(self.len))?;

            // Variables outermost, times innermost: one contiguous
            // store write per variable instead of one per (time,
            // sample) pair.
            if !self.paths.is_empty() {
                for v in 0..self.n_vars {
                    let mut block = Array2::zeros((self.len, self.paths.len()));
                    for (t, path) in self.paths.iter().enumerate() {
                        let column = path.column(v, self.len);
                        for (i, value) in column.into_iter().enumerate() {
                            block[[i, t]] = value;
                        }
                    }
                    self.sim
                        .store_mut()
                        .write_rows(&state_var(v), self.first, block.view())?;
                }
            }

            self.first += self.len;
            self.len = 0;
            self.ll.clear();
            self.lp.clear();
            self.params.clear();
            for path in &mut self.paths {
                path.clear();
            }
        }
        self.sim.flush()
    }

    /// Discards all buffered state for a fresh chain, keeping capacity.
    pub fn clear(&mut self) {
        self.ll.clear();
        self.lp.clear();
        self.params.clear();
        for path in &mut self.paths {
            path.clear();
        }
        self.first = 0;
        self.len = 0;
        self.sim.clear();
    }

    /// As [`McmcCache::clear`], additionally releasing storage.
    pub fn empty(&mut self) {
        self.ll.empty();
        self.lp.empty();
        self.params.empty();
        self.paths = Vec::new();
        self.first = 0;
        self.len = 0;
        self.sim.empty();
    }

    /// Captures all buffered state for checkpointing.
    pub fn snapshot(&self) -> McmcSnapshot {
        McmcSnapshot {
            sim: self.sim.snapshot(),
            ll: self.ll.clone(),
            lp: self.lp.clone(),
            params: self.params.clone(),
            paths: self.paths.clone(),
            first: self.first,
            len: self.len,
        }
    }

    /// Restores buffered state from a snapshot.
    pub fn restore(&mut self, snapshot: McmcSnapshot) {
        self.sim.restore(snapshot.sim);
        self.ll = snapshot.ll;
        self.lp = snapshot.lp;
        self.params = snapshot.params;
        self.paths = snapshot.paths;
        self.first = snapshot.first;
        self.len = snapshot.len;
    }
}

impl<S: ArrayStore> Drop for McmcCache<S> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!(error = %e, "mcmc cache flush failed during drop");
        }
    }
}

/// Serializable copy of an [`McmcCache`]'s buffered state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McmcSnapshot {
    sim: SimulatorSnapshot,
    ll: SlotCache<f64>,
    lp: SlotCache<f64>,
    params: CrossCache,
    paths: Vec<CrossCache>,
    first: usize,
    len: usize,
}
