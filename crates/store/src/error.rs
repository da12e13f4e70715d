//! Error types for clio-store.

use std::path::PathBuf;

/// Error type for all fallible operations in the clio-store crate.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Returned when a required file does not exist on disk.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// Path that could not be found.
        path: PathBuf,
    },

    /// Returned when creating a file that already exists.
    #[error("file already exists: {}", path.display())]
    FileExists {
        /// Path that is already occupied.
        path: PathBuf,
    },

    /// Wraps an error originating from the NetCDF library.
    #[error("netcdf error: {reason}")]
    Netcdf {
        /// Description of the underlying NetCDF failure.
        reason: String,
    },

    /// Returned when a field name is not present in the store.
    #[error("unknown field '{name}'")]
    UnknownField {
        /// Name of the missing field.
        name: String,
    },

    /// Returned when data does not match the declared field width.
    #[error("field '{name}' width mismatch: expected {expected}, got {got}")]
    WidthMismatch {
        /// Name of the field.
        name: String,
        /// Declared width.
        expected: usize,
        /// Width of the offered or requested data.
        got: usize,
    },

    /// Returned when a read addresses rows that were never written.
    #[error("field '{name}' range [{start}, {}) out of bounds ({rows} rows)", .start + .len)]
    RangeOutOfBounds {
        /// Name of the field.
        name: String,
        /// First requested row.
        start: usize,
        /// Number of requested rows.
        len: usize,
        /// Number of rows actually present.
        rows: usize,
    },
}

impl From<netcdf::Error> for StoreError {
    fn from(e: netcdf::Error) -> Self {
        StoreError::Netcdf {
            reason: e.to_string(),
        }
    }
}
