//! Fixed-cutoff first-order low-pass filter
//!
//! A classic RC low-pass discretized per sample:
//!
//! ```text
//! alpha = dt / (RC + dt),  RC = 1 / (2π · f_cutoff)
//! y[n]  = y[n-1] + alpha · (x[n] - y[n-1])
//! ```
//!
//! Computing alpha from the actual dt makes the cutoff hold under the
//! uneven sample spacing real logs have. Non-positive or absurd dt values
//! are treated as a restart: the filter re-seeds on the raw input.

use crate::time::{dt_seconds, Timestamp};

use super::Filter;

/// Largest dt (seconds) across which the IIR state is still trusted
const MAX_DT_S: f64 = 1.0;

/// Nominal settling length reported for chain warmup accounting
///
/// First-order IIRs settle asymptotically; at common ride sampling rates
/// (20-100 Hz) and cutoffs (5-15 Hz) this bound holds with margin.
const SETTLE_SAMPLES: usize = 32;

/// First-order IIR low-pass with a fixed cutoff frequency
#[derive(Debug)]
pub struct LowPassFilter {
    /// RC time constant in seconds
    rc: f64,
    state: Option<(f64, Timestamp)>,
}

impl LowPassFilter {
    /// Create with the given cutoff frequency in Hz
    pub fn new(cutoff_hz: f64) -> Self {
        Self {
            rc: 1.0 / (2.0 * std::f64::consts::PI * cutoff_hz.max(1e-6)),
            state: None,
        }
    }
}

impl Filter for LowPassFilter {
    fn filter(&mut self, value: f64, timestamp: Timestamp) -> f64 {
        let output = match self.state {
            Some((prev, prev_ts)) => {
                let dt = dt_seconds(prev_ts, timestamp);
                if dt <= 0.0 || dt > MAX_DT_S {
                    // Data gap or clock glitch: restart on the raw input
                    value
                } else {
                    let alpha = dt / (self.rc + dt);
                    prev + alpha * (value - prev)
                }
            }
            None => value,
        };
        self.state = Some((output, timestamp));
        output
    }

    fn reset(&mut self) {
        self.state = None;
    }

    fn is_ready(&self) -> bool {
        self.state.is_some()
    }

    fn warmup_len(&self) -> usize {
        SETTLE_SAMPLES
    }

    fn name(&self) -> &'static str {
        "lowpass"
    }
}
