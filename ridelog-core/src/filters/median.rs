//! Median-of-N spike suppression
//!
//! The workhorse against single-sample outliers: vibration spikes on an
//! accelerometer axis pass a low-pass filter attenuated but present; a
//! median window drops them entirely as long as fewer than half the window
//! is affected.

use crate::buffer::RingBuffer;
use crate::time::Timestamp;

use super::Filter;

/// Median filter over a fixed-size window
///
/// Until the window fills, the median of however many samples have been
/// seen is returned, so the output is defined from the very first call.
#[derive(Debug)]
pub struct MedianFilter {
    window: RingBuffer,
    /// Scratch space for sorting, reused across calls
    scratch: Vec<f64>,
}

impl MedianFilter {
    /// Create with the given window size
    ///
    /// Odd sizes give a true middle element; even sizes average the two
    /// middle elements. Typical: 3-7 samples.
    pub fn new(window_size: usize) -> Self {
        Self {
            window: RingBuffer::new(window_size),
            scratch: Vec::with_capacity(window_size.max(1)),
        }
    }
}

impl Filter for MedianFilter {
    fn filter(&mut self, value: f64, _timestamp: Timestamp) -> f64 {
        self.window.push(value);

        self.scratch.clear();
        self.scratch.extend(self.window.iter());
        self.scratch
            .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let n = self.scratch.len();
        if n % 2 == 1 {
            self.scratch[n / 2]
        } else {
            (self.scratch[n / 2 - 1] + self.scratch[n / 2]) / 2.0
        }
    }

    fn reset(&mut self) {
        self.window.clear();
    }

    fn is_ready(&self) -> bool {
        self.window.is_full()
    }

    fn warmup_len(&self) -> usize {
        self.window.capacity()
    }

    fn name(&self) -> &'static str {
        "median"
    }
}
