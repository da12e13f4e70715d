//! # clio-cache
//!
//! Flush-oriented in-memory caches sitting between an inference loop
//! and a persistent array store. Particle-filter output (times,
//! states, log-weights, ancestors, resample flags) and MCMC output
//! (likelihoods, priors, parameters, trajectories) are buffered here
//! and committed to the store in batched ranges at well-defined
//! checkpoints.
//!
//! # Pipeline
//!
//! ```text
//!  inference loop ──▶ AdaptivePFCache ──push──▶ ParticleFilterCache
//!                                                 │  ├─ SimulatorCache (times)
//!                                                 │  ├─ AncestryStore (genealogy)
//!                                                 │  └─ resample flags
//!                     McmcCache (sample window) ──┴──▶ ArrayStore
//! ```
//!
//! All caches are single-threaded synchronous structures; `flush` is
//! the only operation that blocks on I/O, and dropping a cache flushes
//! implicitly so buffered output is never silently lost.

mod adaptive;
mod cross;
mod error;
mod mcmc;
mod particle;
mod simulator;
mod slot;
mod snapshot;

pub use adaptive::{AdaptivePFCache, AdaptivePFSnapshot};
pub use cross::CrossCache;
pub use error::CacheError;
pub use mcmc::{McmcCache, McmcConfig, McmcSnapshot};
pub use particle::{ParticleFilterCache, ParticleFilterSnapshot};
pub use simulator::{SimulatorCache, SimulatorSnapshot};
pub use slot::SlotCache;
pub use snapshot::{from_bytes, to_bytes};
