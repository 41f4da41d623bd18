//! Adaptive Filter Chain
//!
//! ## Overview
//!
//! Noise reduction happens in ordered cascades of stateful stages. Each
//! stage implements [`Filter`]: it maps one input sample to one output
//! sample, keeps whatever window or IIR state it needs internally, and
//! never errors; until warmed up it returns the best value it has
//! (typically the raw input or a partially-smoothed one).
//!
//! ## Stages
//!
//! - [`MedianFilter`]: median-of-N over a ring-buffer window, kills spikes
//! - [`LowPassFilter`]: fixed-cutoff first-order IIR, dt-aware
//! - [`EmaFilter`]: exponential moving average with a fixed smoothing factor
//!
//! ## Chains
//!
//! [`FilterChain`] composes stages in order and instruments per-call
//! latency. Presets match intended use: heavy smoothing for logged IMU
//! data (median → low-pass → EMA), a single fast EMA where responsiveness
//! matters more than smoothness. Chains share no state with each other;
//! a [`Vector3Filter`] is simply three independent chains, one per axis.

mod chain;
mod ema;
mod lowpass;
mod median;

pub use chain::{FilterChain, FilterChainStats};
pub use ema::EmaFilter;
pub use lowpass::LowPassFilter;
pub use median::MedianFilter;

use crate::time::Timestamp;

/// A single noise-reduction stage
///
/// Implementations degrade gracefully: before enough samples have been
/// seen ([`Filter::is_ready`] is false) the output is still defined, just
/// less smoothed.
pub trait Filter {
    /// Process one sample, returning the filtered value
    fn filter(&mut self, value: f64, timestamp: Timestamp) -> f64;

    /// Drop all internal state, as if freshly constructed
    fn reset(&mut self);

    /// Whether the stage has seen enough samples for a meaningful output
    fn is_ready(&self) -> bool;

    /// Samples needed before a constant input has propagated through
    /// (within a 1% band for asymptotic stages)
    fn warmup_len(&self) -> usize;

    /// Stage name for instrumentation
    fn name(&self) -> &'static str;
}

/// Three independent filter chains, one per axis
///
/// Axes never share state; a spike on x must not disturb y or z.
pub struct Vector3Filter {
    axes: [FilterChain; 3],
}

impl Vector3Filter {
    /// Build from a chain factory, invoked once per axis
    pub fn new(mut make_chain: impl FnMut() -> FilterChain) -> Self {
        Self {
            axes: [make_chain(), make_chain(), make_chain()],
        }
    }

    /// Filter one 3-axis sample
    pub fn filter(&mut self, value: [f64; 3], timestamp: Timestamp) -> [f64; 3] {
        [
            self.axes[0].filter(value[0], timestamp),
            self.axes[1].filter(value[1], timestamp),
            self.axes[2].filter(value[2], timestamp),
        ]
    }

    /// Reset all three axes
    pub fn reset(&mut self) {
        for axis in &mut self.axes {
            axis.reset();
        }
    }

    /// Ready once every axis is ready
    pub fn is_ready(&self) -> bool {
        self.axes.iter().all(FilterChain::is_ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_axes_are_independent() {
        let mut filter = Vector3Filter::new(|| FilterChain::imu_logging());
        // Spike only on x
        let mut out = [0.0; 3];
        for i in 0..20 {
            let x = if i == 10 { 100.0 } else { 1.0 };
            out = filter.filter([x, 2.0, 3.0], i * 20);
        }
        assert!((out[1] - 2.0).abs() < 0.1);
        assert!((out[2] - 3.0).abs() < 0.1);
    }
}
