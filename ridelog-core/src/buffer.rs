//! Fixed-Capacity Ring Buffer for Filter Windows
//!
//! ## Overview
//!
//! Filter stages (median-of-N, moving averages) need a sliding window of
//! the most recent samples. This buffer allocates its storage once at
//! construction and never resizes: pushing a value when full overwrites
//! the oldest, keeping every per-sample call allocation-free.
//!
//! ## Design Rationale
//!
//! Window sizes come from [`ProcessingConfig`](crate::config::ProcessingConfig)
//! at runtime, so the capacity is a constructor argument rather than a
//! const generic. Invariants otherwise match a classic ring:
//! - `write_pos < capacity` (next write position is always valid)
//! - `len <= capacity`
//! - iteration yields values oldest to newest
//!
//! ```text
//! RingBuffer(5) after 7 pushes of 0..7:
//! Physical: [5, 6, 2, 3, 4]   write_pos = 2
//! Logical:  [2, 3, 4, 5, 6]   (chronological)
//! ```

/// Fixed-capacity ring buffer over `f64` samples
///
/// Not thread-safe; each filter stage owns its own buffer.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    /// Storage, allocated once; length is the fixed capacity
    data: Box<[f64]>,
    /// Index where the next write will occur, wraps at capacity
    write_pos: usize,
    /// Current number of valid samples, saturates at capacity
    len: usize,
}

impl RingBuffer {
    /// Create an empty buffer holding at most `capacity` samples
    ///
    /// `capacity` is clamped to at least 1; a zero-width window is
    /// meaningless for any filter.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity.max(1)].into_boxed_slice(),
            write_pos: 0,
            len: 0,
        }
    }

    /// Push a sample, overwriting the oldest when full
    pub fn push(&mut self, value: f64) {
        self.data[self.write_pos] = value;
        self.write_pos = (self.write_pos + 1) % self.data.len();
        if self.len < self.data.len() {
            self.len += 1;
        }
    }

    /// Number of stored samples
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if buffer has reached capacity
    pub fn is_full(&self) -> bool {
        self.len == self.data.len()
    }

    /// Fixed capacity chosen at construction
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Most recent sample
    pub fn last(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        let idx = if self.write_pos == 0 {
            self.data.len() - 1
        } else {
            self.write_pos - 1
        };
        Some(self.data[idx])
    }

    /// Get by logical index (0 = oldest, len-1 = newest)
    pub fn get(&self, index: usize) -> Option<f64> {
        if index >= self.len {
            return None;
        }
        let actual = if self.len < self.data.len() {
            // Not full yet, data starts at 0
            index
        } else {
            // Full: oldest sample sits at write_pos
            (self.write_pos + index) % self.data.len()
        };
        Some(self.data[actual])
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }

    /// Mean of the stored samples, 0.0 when empty
    pub fn mean(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.iter().sum::<f64>() / self.len as f64
    }

    /// Discard all samples, keeping the allocation
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }
}
