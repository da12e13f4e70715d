//! Error types for clio-ancestry.

/// Error type for all fallible operations in the clio-ancestry crate.
#[derive(Debug, thiserror::Error)]
pub enum AncestryError {
    /// Returned when the state matrix and ancestor vector disagree on
    /// the population size.
    #[error("population mismatch: {states} state rows vs {ancestors} ancestors")]
    PopulationMismatch {
        /// Rows in the offered state matrix.
        states: usize,
        /// Length of the offered ancestor vector.
        ancestors: usize,
    },

    /// Returned when a generation's state dimension differs from the
    /// dimension established by earlier generations.
    #[error("state dimension mismatch: expected {expected}, got {got}")]
    StateDimMismatch {
        /// Established state dimension.
        expected: usize,
        /// Dimension of the offered states.
        got: usize,
    },

    /// Returned when an ancestor index does not name a frontier slot.
    #[error("ancestor index {index} outside frontier of {frontier} slots")]
    InvalidAncestor {
        /// Offending ancestor index.
        index: usize,
        /// Current frontier size.
        frontier: usize,
    },

    /// Returned when a trajectory query names a slot outside the frontier.
    #[error("slot {slot} outside frontier of {len} slots")]
    SlotOutOfRange {
        /// Requested slot.
        slot: usize,
        /// Current frontier size.
        len: usize,
    },

    /// Returned when a trajectory output buffer has the wrong shape.
    #[error("trajectory shape mismatch: expected {expected_rows}x{expected_cols}, got {got_rows}x{got_cols}")]
    ShapeMismatch {
        /// Required rows (generations).
        expected_rows: usize,
        /// Required columns (state dimension).
        expected_cols: usize,
        /// Offered rows.
        got_rows: usize,
        /// Offered columns.
        got_cols: usize,
    },
}
