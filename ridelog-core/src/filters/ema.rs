//! Exponential moving average
//!
//! The cheapest smoother there is: one multiply-add per sample, no window
//! storage. Used as the final polish after median/low-pass stages, or on
//! its own where responsiveness matters more than smoothness.

use crate::time::Timestamp;

use super::Filter;

/// EMA with a fixed smoothing factor
///
/// ```text
/// y[n] = alpha · x[n] + (1 - alpha) · y[n-1]
/// ```
///
/// Higher alpha tracks faster, lower alpha smooths harder.
#[derive(Debug)]
pub struct EmaFilter {
    alpha: f64,
    state: Option<f64>,
    /// Samples until a constant input is within 1% of the output
    settle_samples: usize,
}

impl EmaFilter {
    /// Create with smoothing factor `alpha` in (0, 1]
    pub fn new(alpha: f64) -> Self {
        let alpha = alpha.clamp(1e-6, 1.0);
        // (1 - alpha)^k <= 0.01 solved for k
        let settle_samples = if alpha >= 1.0 {
            1
        } else {
            (0.01_f64.ln() / (1.0 - alpha).ln()).ceil() as usize
        };
        Self {
            alpha,
            state: None,
            settle_samples,
        }
    }
}

impl Filter for EmaFilter {
    fn filter(&mut self, value: f64, _timestamp: Timestamp) -> f64 {
        let output = match self.state {
            Some(prev) => prev + self.alpha * (value - prev),
            None => value,
        };
        self.state = Some(output);
        output
    }

    fn reset(&mut self) {
        self.state = None;
    }

    fn is_ready(&self) -> bool {
        self.state.is_some()
    }

    fn warmup_len(&self) -> usize {
        self.settle_samples
    }

    fn name(&self) -> &'static str {
        "ema"
    }
}
