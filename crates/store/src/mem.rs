//! In-process array store backed by flat `Vec<f64>` buffers.

use std::collections::HashMap;

use ndarray::{Array2, ArrayView2};

use crate::error::StoreError;
use crate::store::ArrayStore;

/// One field: row-major data with a fixed per-row width.
#[derive(Debug, Clone)]
struct MemField {
    width: usize,
    data: Vec<f64>,
}

impl MemField {
    fn rows(&self) -> usize {
        self.data.len() / self.width
    }

    /// Grows the field (zero-filled) so that `rows` rows exist.
    fn ensure_rows(&mut self, rows: usize) {
        if rows * self.width > self.data.len() {
            self.data.resize(rows * self.width, 0.0);
        }
    }
}

/// In-process [`ArrayStore`] backend.
///
/// Fields are auto-created on first write, taking their width from the
/// written data. Used by tests and by runs whose output is consumed in
/// process rather than persisted.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    fields: HashMap<String, MemField>,
}

impl MemStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all fields written so far, in arbitrary order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// Width of `field`, if it exists.
    pub fn width(&self, field: &str) -> Option<usize> {
        self.fields.get(field).map(|f| f.width)
    }

    fn field_mut(&mut self, name: &str, width: usize) -> Result<&mut MemField, StoreError> {
        let field = self
            .fields
            .entry(name.to_string())
            .or_insert_with(|| MemField {
                width,
                data: Vec::new(),
            });
        if field.width != width {
            return Err(StoreError::WidthMismatch {
                name: name.to_string(),
                expected: field.width,
                got: width,
            });
        }
        Ok(field)
    }

    fn field_for_read(&self, name: &str, width: usize) -> Result<&MemField, StoreError> {
        let field = self
            .fields
            .get(name)
            .ok_or_else(|| StoreError::UnknownField {
                name: name.to_string(),
            })?;
        if field.width != width {
            return Err(StoreError::WidthMismatch {
                name: name.to_string(),
                expected: field.width,
                got: width,
            });
        }
        Ok(field)
    }

    fn check_range(
        field: &MemField,
        name: &str,
        start: usize,
        len: usize,
    ) -> Result<(), StoreError> {
        if start + len > field.rows() {
            return Err(StoreError::RangeOutOfBounds {
                name: name.to_string(),
                start,
                len,
                rows: field.rows(),
            });
        }
        Ok(())
    }
}

impl ArrayStore for MemStore {
    fn write_range(
        &mut self,
        field: &str,
        start: usize,
        values: &[f64],
    ) -> Result<(), StoreError> {
        if values.is_empty() {
            return Ok(());
        }
        let f = self.field_mut(field, 1)?;
        f.ensure_rows(start + values.len());
        f.data[start..start + values.len()].copy_from_slice(values);
        Ok(())
    }

    fn read_range(&self, field: &str, start: usize, len: usize) -> Result<Vec<f64>, StoreError> {
        let f = self.field_for_read(field, 1)?;
        Self::check_range(f, field, start, len)?;
        Ok(f.data[start..start + len].to_vec())
    }

    fn write_rows(
        &mut self,
        field: &str,
        start: usize,
        block: ArrayView2<'_, f64>,
    ) -> Result<(), StoreError> {
        if block.nrows() == 0 || block.ncols() == 0 {
            return Ok(());
        }
        let width = block.ncols();
        let f = self.field_mut(field, width)?;
        f.ensure_rows(start + block.nrows());
        for (i, row) in block.rows().into_iter().enumerate() {
            let offset = (start + i) * width;
            for (j, &v) in row.iter().enumerate() {
                f.data[offset + j] = v;
            }
        }
        Ok(())
    }

    fn read_rows(&self, field: &str, start: usize, count: usize) -> Result<Array2<f64>, StoreError> {
        let f = self
            .fields
            .get(field)
            .ok_or_else(|| StoreError::UnknownField {
                name: field.to_string(),
            })?;
        Self::check_range(f, field, start, count)?;
        let slice = &f.data[start * f.width..(start + count) * f.width];
        Array2::from_shape_vec((count, f.width), slice.to_vec()).map_err(|e| StoreError::Netcdf {
            reason: format!("shape error: {e}"),
        })
    }

    fn len(&self, field: &str) -> usize {
        self.fields.get(field).map_or(0, MemField::rows)
    }
}
