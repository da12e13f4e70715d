//! NetCDF-backed array store.

use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayView2};

use crate::error::StoreError;
use crate::field::FieldSpec;
use crate::store::ArrayStore;

/// How to open a NetCDF output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create a new file; fails if the path already exists.
    Create,
    /// Create a new file, truncating any existing one.
    Replace,
    /// Reopen an existing file for reading and further writes.
    Append,
}

/// File-backed [`ArrayStore`] persisting fields as NetCDF variables.
///
/// Each field becomes one `f64` variable with an unlimited row
/// dimension (`<name>_index`) and, for width > 1, a fixed width
/// dimension (`<name>_width`). Fields must be declared up front in
/// `Create`/`Replace` mode; `Append` reuses the declarations already
/// in the file.
pub struct NetCdfStore {
    file: netcdf::FileMut,
    path: PathBuf,
}

impl NetCdfStore {
    /// Opens a store at `path` with the given field layout and mode.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::FileExists`] for `Create` on an existing
    /// path, [`StoreError::FileNotFound`] for `Append` on a missing
    /// path, and [`StoreError::Netcdf`] for any library failure.
    pub fn open(path: &Path, layout: &[FieldSpec], mode: OpenMode) -> Result<Self, StoreError> {
        let file = match mode {
            OpenMode::Create => {
                if path.exists() {
                    return Err(StoreError::FileExists {
                        path: path.to_path_buf(),
                    });
                }
                let mut file = netcdf::create(path)?;
                Self::define_fields(&mut file, layout)?;
                file
            }
            OpenMode::Replace => {
                let mut file = netcdf::create(path)?;
                Self::define_fields(&mut file, layout)?;
                file
            }
            OpenMode::Append => {
                if !path.exists() {
                    return Err(StoreError::FileNotFound {
                        path: path.to_path_buf(),
                    });
                }
                netcdf::append(path)?
            }
        };
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Reopens an existing file without declaring any fields.
    pub fn append(path: &Path) -> Result<Self, StoreError> {
        Self::open(path, &[], OpenMode::Append)
    }

    /// Path this store is backed by.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Declared fields, in file order.
    pub fn fields(&self) -> Vec<FieldSpec> {
        self.file
            .variables()
            .map(|var| {
                let dims = var.dimensions();
                let width = dims.get(1).map_or(1, |d| d.len());
                FieldSpec::new(var.name(), width)
            })
            .collect()
    }

    fn define_fields(file: &mut netcdf::FileMut, layout: &[FieldSpec]) -> Result<(), StoreError> {
        for spec in layout {
            let index_dim = format!("{}_index", spec.name);
            file.add_unlimited_dimension(&index_dim)?;
            if spec.width > 1 {
                let width_dim = format!("{}_width", spec.name);
                file.add_dimension(&width_dim, spec.width)?;
                file.add_variable::<f64>(&spec.name, &[&index_dim, &width_dim])?;
            } else {
                file.add_variable::<f64>(&spec.name, &[&index_dim])?;
            }
        }
        Ok(())
    }

    fn width_of(var: &netcdf::Variable<'_>) -> usize {
        var.dimensions().get(1).map_or(1, |d| d.len())
    }

    fn variable(&self, field: &str) -> Result<netcdf::Variable<'_>, StoreError> {
        self.file
            .variable(field)
            .ok_or_else(|| StoreError::UnknownField {
                name: field.to_string(),
            })
    }

    fn check_width(
        var: &netcdf::Variable<'_>,
        field: &str,
        width: usize,
    ) -> Result<(), StoreError> {
        let declared = Self::width_of(var);
        if declared != width {
            return Err(StoreError::WidthMismatch {
                name: field.to_string(),
                expected: declared,
                got: width,
            });
        }
        Ok(())
    }

    fn check_range(
        var: &netcdf::Variable<'_>,
        field: &str,
        start: usize,
        len: usize,
    ) -> Result<(), StoreError> {
        let rows = var.dimensions().first().map_or(0, |d| d.len());
        if start + len > rows {
            return Err(StoreError::RangeOutOfBounds {
                name: field.to_string(),
                start,
                len,
                rows,
            });
        }
        Ok(())
    }
}

impl ArrayStore for NetCdfStore {
    fn write_range(
        &mut self,
        field: &str,
        start: usize,
        values: &[f64],
    ) -> Result<(), StoreError> {
        if values.is_empty() {
            return Ok(());
        }
        {
            let var = self.variable(field)?;
            Self::check_width(&var, field, 1)?;
        }
        let mut var = self
            .file
            .variable_mut(field)
            .ok_or_else(|| StoreError::UnknownField {
                name: field.to_string(),
            })?;
        var.put_values(values, start..start + values.len())?;
        Ok(())
    }

    fn read_range(&self, field: &str, start: usize, len: usize) -> Result<Vec<f64>, StoreError> {
        let var = self.variable(field)?;
        Self::check_width(&var, field, 1)?;
        Self::check_range(&var, field, start, len)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        Ok(var.get_values::<f64, _>(start..start + len)?)
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
        {
            let var = self.variable(field)?;
            Self::check_width(&var, field, block.ncols())?;
        }
        let mut var = self
            .file
            .variable_mut(field)
            .ok_or_else(|| StoreError::UnknownField {
                name: field.to_string(),
            })?;
        // Logical (row-major) order matches the variable's dimension order.
        let flat: Vec<f64> = block.iter().copied().collect();
        var.put_values(&flat, [start..start + block.nrows(), 0..block.ncols()])?;
        Ok(())
    }

    fn read_rows(&self, field: &str, start: usize, count: usize) -> Result<Array2<f64>, StoreError> {
        let var = self.variable(field)?;
        let width = Self::width_of(&var);
        Self::check_range(&var, field, start, count)?;
        if count == 0 {
            return Ok(Array2::zeros((0, width)));
        }
        let flat = if width > 1 {
            var.get_values::<f64, _>([start..start + count, 0..width])?
        } else {
            var.get_values::<f64, _>(start..start + count)?
        };
        Array2::from_shape_vec((count, width), flat).map_err(|e| StoreError::Netcdf {
            reason: format!("shape error: {e}"),
        })
    }

    fn len(&self, field: &str) -> usize {
        self.file
            .variable(field)
            .and_then(|v| v.dimensions().first().map(|d| d.len()))
            .unwrap_or(0)
    }
}
