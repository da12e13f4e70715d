//! # clio-ancestry
//!
//! Particle-genealogy forest for particle filters. Each resampling
//! step appends one generation of particles, each pointing at the
//! ancestor it was resampled from; lineages that die out are reclaimed
//! immediately, so steady-state memory is proportional to the number
//! of surviving lineages rather than population x time. The full
//! trajectory of any live particle can be reconstructed by walking its
//! ancestor links.
//!
//! # Quick start
//!
//! ```rust
//! use clio_ancestry::AncestryStore;
//! use ndarray::array;
//!
//! let mut store = AncestryStore::new();
//! store.append_generation(array![[0.0], [1.0]].view(), &[0, 1]).unwrap();
//! store.append_generation(array![[2.0], [3.0]].view(), &[1, 1]).unwrap();
//!
//! let path = store.trajectory(0).unwrap();
//! assert_eq!(path, array![[1.0], [2.0]]);
//! ```

mod error;
mod forest;

pub use error::AncestryError;
pub use forest::{AncestrySnapshot, AncestryStore};
