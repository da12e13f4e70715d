//! Fixed-capacity row-window matrix cache.

use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// A `rows x width` matrix with per-row validity, used for windows of
/// parameter vectors and for per-time trajectory column stores.
///
/// Rows index the sample slot within the window; columns index the
/// model variable. Capacity is fixed at construction; the owning
/// window cache enforces its own bounds before writing here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossCache {
    data: Array2<f64>,
    valid: Vec<bool>,
}

impl CrossCache {
    /// Creates a cache of `rows` invalid rows of the given width.
    pub fn new(rows: usize, width: usize) -> Self {
        Self {
            data: Array2::zeros((rows, width)),
            valid: vec![false; rows],
        }
    }

    /// Row capacity.
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Values per row.
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    /// Writes row `r`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::IndexOutOfRange`] if `r` is beyond the
    /// row capacity, [`CacheError::DimensionMismatch`] if the row
    /// length differs from the width.
    pub fn set_row(&mut self, r: usize, row: ArrayView1<'_, f64>) -> Result<(), CacheError> {
        if r >= self.rows() {
            return Err(CacheError::IndexOutOfRange {
                index: r,
                len: self.rows(),
            });
        }
        if row.len() != self.width() {
            return Err(CacheError::DimensionMismatch {
                expected: self.width(),
                got: row.len(),
            });
        }
        self.data.row_mut(r).assign(&row);
        self.valid[r] = true;
        Ok(())
    }

    /// Row `r`, if valid.
    pub fn row(&self, r: usize) -> Option<ArrayView1<'_, f64>> {
        (r < self.rows() && self.valid[r]).then(|| self.data.row(r))
    }

    /// View of the first `len` rows.
    pub fn block(&self, len: usize) -> ArrayView2<'_, f64> {
        self.data.slice(ndarray::s![..len, ..])
    }

    /// Column `c` restricted to the first `len` rows.
    pub fn column(&self, c: usize, len: usize) -> Vec<f64> {
        self.data
            .slice(ndarray::s![..len, c])
            .iter()
            .copied()
            .collect()
    }

    /// Marks all rows invalid, keeping the allocation.
    pub fn clear(&mut self) {
        self.valid.fill(false);
    }

    /// Releases the allocation.
    pub fn empty(&mut self) {
        self.data = Array2::zeros((0, 0));
        self.valid = Vec::new();
    }
}
