//! Validity-tracked storage keyed by a small integer index.

use serde::{Deserialize, Serialize};

/// Growable indexed storage with a per-slot validity flag.
///
/// The slot index is a time step or sample id. `clear` invalidates all
/// slots but keeps allocated capacity for fast reuse across runs;
/// `empty` releases the capacity as well. No thread safety is
/// provided; callers serialize access per instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotCache<T> {
    data: Vec<T>,
    valid: Vec<bool>,
}

impl<T: Clone + Default> SlotCache<T> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            valid: Vec::new(),
        }
    }

    /// Creates a cache with `n` invalid slots already allocated.
    pub fn with_len(n: usize) -> Self {
        Self {
            data: vec![T::default(); n],
            valid: vec![false; n],
        }
    }

    /// Number of allocated slots (valid or not).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if no slots are allocated.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Grows capacity to at least `n` slots; existing valid slots are
    /// untouched. Never shrinks.
    pub fn resize(&mut self, n: usize) {
        if n > self.data.len() {
            self.data.resize(n, T::default());
            self.valid.resize(n, false);
        }
    }

    /// True if slot `i` holds meaningful data.
    pub fn is_valid(&self, i: usize) -> bool {
        self.valid.get(i).copied().unwrap_or(false)
    }

    /// Marks slot `i` valid, growing as needed.
    pub fn set_valid(&mut self, i: usize) {
        self.resize(i + 1);
        self.valid[i] = true;
    }

    /// Value at slot `i`, if valid.
    pub fn get(&self, i: usize) -> Option<&T> {
        self.is_valid(i).then(|| &self.data[i])
    }

    /// Mutable value at slot `i`, if valid.
    pub fn get_mut(&mut self, i: usize) -> Option<&mut T> {
        if self.is_valid(i) { Some(&mut self.data[i]) } else { None }
    }

    /// Contiguous run of `len` slots starting at `i`, if all valid.
    pub fn get_range(&self, i: usize, len: usize) -> Option<&[T]> {
        if i + len > self.data.len() {
            return None;
        }
        self.valid[i..i + len]
            .iter()
            .all(|&v| v)
            .then(|| &self.data[i..i + len])
    }

    /// Writes slot `i`, growing and marking valid as needed.
    pub fn set(&mut self, i: usize, value: T) {
        self.resize(i + 1);
        self.data[i] = value;
        self.valid[i] = true;
    }

    /// Writes a contiguous run starting at `i`.
    pub fn set_range(&mut self, i: usize, values: &[T]) {
        self.resize(i + values.len());
        self.data[i..i + values.len()].clone_from_slice(values);
        self.valid[i..i + values.len()].fill(true);
    }

    /// Number of leading valid slots.
    pub fn first_invalid(&self) -> usize {
        self.valid.iter().take_while(|&&v| v).count()
    }

    /// Raw contents of `len` slots starting at `i`, valid or not.
    /// Never-written slots hold `T::default()`.
    ///
    /// # Panics
    ///
    /// Panics if the range exceeds the allocated length.
    pub fn raw_range(&self, i: usize, len: usize) -> &[T] {
        &self.data[i..i + len]
    }

    /// Marks all slots invalid, keeping allocated capacity.
    pub fn clear(&mut self) {
        self.valid.fill(false);
    }

    /// Releases all storage.
    pub fn empty(&mut self) {
        self.data = Vec::new();
        self.valid = Vec::new();
    }
}
