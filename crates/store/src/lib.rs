//! # clio-store
//!
//! Persistent array storage for inference output. A store holds named
//! numeric fields, each a growable 2-D array keyed by a primary index
//! (time step or sample id) with a fixed per-index width. The caching
//! layer buffers writes in memory and commits them here in batched
//! ranges at flush time.
//!
//! Two backends implement the [`ArrayStore`] contract: [`MemStore`]
//! keeps everything in process (tests, short runs) and [`NetCdfStore`]
//! persists to a NetCDF file.

mod error;
mod field;
mod mem;
mod netcdf_store;
mod store;

pub use error::StoreError;
pub use field::{
    ANCESTOR, FieldSpec, LOG_LIKELIHOOD, LOG_PRIOR, LOG_WEIGHT, PARAMETER, RESAMPLE, TIME,
    filter_layout, mcmc_layout, state_var,
};
pub use mem::MemStore;
pub use netcdf_store::{NetCdfStore, OpenMode};
pub use store::ArrayStore;
