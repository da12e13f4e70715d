//! The array-store contract shared by all backends.

use ndarray::{Array2, ArrayView2};

use crate::error::StoreError;

/// Indexed array storage keyed by field name and starting index.
///
/// Fields are growable 2-D arrays `[index, width]`. Writes address a
/// contiguous run of rows; zero-length writes are permitted no-ops.
/// Reads of rows that were never written, or of unknown fields, fail.
///
/// Implementations are synchronous and single-threaded; callers
/// serialize access per instance.
pub trait ArrayStore {
    /// Writes `values.len()` rows of a width-1 field starting at `start`.
    fn write_range(&mut self, field: &str, start: usize, values: &[f64])
    -> Result<(), StoreError>;

    /// Reads `len` rows of a width-1 field starting at `start`.
    fn read_range(&self, field: &str, start: usize, len: usize) -> Result<Vec<f64>, StoreError>;

    /// Writes `block.nrows()` rows starting at `start`; `block.ncols()`
    /// must equal the field width.
    fn write_rows(
        &mut self,
        field: &str,
        start: usize,
        block: ArrayView2<'_, f64>,
    ) -> Result<(), StoreError>;

    /// Reads `count` rows starting at `start` as a `count x width` matrix.
    fn read_rows(&self, field: &str, start: usize, count: usize) -> Result<Array2<f64>, StoreError>;

    /// Number of rows written to `field` so far; 0 for unknown fields.
    fn len(&self, field: &str) -> usize;

    /// True if `field` holds no rows (or does not exist).
    fn is_empty(&self, field: &str) -> bool {
        self.len(field) == 0
    }
}
