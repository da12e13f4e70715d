//! Error types for clio-cache.

use clio_ancestry::AncestryError;
use clio_store::StoreError;

/// Error type for all fallible operations in the clio-cache crate.
///
/// Contiguity, range, and dimension variants report caller bugs: they
/// are surfaced immediately and never silently corrected. Store and
/// ancestry failures are wrapped and propagated.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Returned when a write does not extend or revisit the contiguous
    /// buffered window.
    #[error("write at index {index} outside contiguous window [{lo}, {hi}]")]
    NonContiguousWrite {
        /// Offending index.
        index: usize,
        /// Lowest writable index.
        lo: usize,
        /// Highest writable index (inclusive).
        hi: usize,
    },

    /// Returned when a write targets an index already committed to the
    /// store.
    #[error("index {index} already flushed ({flushed} entries committed)")]
    AlreadyFlushed {
        /// Offending index.
        index: usize,
        /// Number of leading entries already committed.
        flushed: usize,
    },

    /// Returned when a read addresses an index that was never written.
    #[error("index {index} out of range ({len} entries)")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of entries present.
        len: usize,
    },

    /// Returned when vector or matrix dimensions disagree.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Required dimension.
        expected: usize,
        /// Offered dimension.
        got: usize,
    },

    /// Returned when the sample window is full and the write would
    /// extend it; the caller should flush first.
    #[error("sample window full ({capacity} samples); flush before extending")]
    WindowFull {
        /// Window capacity in samples.
        capacity: usize,
    },

    /// Returned when an adaptive buffer step is missing time, state,
    /// or weight data at push time.
    #[error("adaptive buffer step {step} is incomplete")]
    IncompleteStep {
        /// Local step index within the adaptive window.
        step: usize,
    },

    /// Returned when a push requests more particles than a buffered
    /// step holds.
    #[error("adaptive buffer step {step} holds {have} particles, push requested {requested}")]
    InsufficientParticles {
        /// Local step index within the adaptive window.
        step: usize,
        /// Particles buffered for that step.
        have: usize,
        /// Particles requested by the push.
        requested: usize,
    },

    /// Returned when cache configuration fails validation.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the failed check.
        reason: String,
    },

    /// Returned when a snapshot blob cannot be encoded or decoded.
    #[error("snapshot error: {reason}")]
    Snapshot {
        /// Description of the serialization failure.
        reason: String,
    },

    /// Wraps an error from the persistent store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Wraps an error from the genealogy forest.
    #[error(transparent)]
    Ancestry(#[from] AncestryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_non_contiguous() {
        let err = CacheError::NonContiguousWrite {
            index: 7,
            lo: 2,
            hi: 5,
        };
        assert_eq!(err.to_string(), "write at index 7 outside contiguous window [2, 5]");
    }

    #[test]
    fn display_already_flushed() {
        let err = CacheError::AlreadyFlushed {
            index: 1,
            flushed: 3,
        };
        assert_eq!(err.to_string(), "index 1 already flushed (3 entries committed)");
    }

    #[test]
    fn display_window_full() {
        let err = CacheError::WindowFull { capacity: 2048 };
        assert_eq!(
            err.to_string(),
            "sample window full (2048 samples); flush before extending"
        );
    }

    #[test]
    fn store_error_wraps_transparently() {
        let err: CacheError = StoreError::UnknownField {
            name: "time".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "unknown field 'time'");
    }

    #[test]
    fn ancestry_error_wraps_transparently() {
        let err: CacheError = AncestryError::SlotOutOfRange { slot: 4, len: 4 }.into();
        assert_eq!(err.to_string(), "slot 4 outside frontier of 4 slots");
    }

    #[test]
    fn error_is_send_sync_and_std_error() {
        fn assert_bounds<T: Send + Sync + std::error::Error>() {}
        assert_bounds::<CacheError>();
    }
}
