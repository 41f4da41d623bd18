//! Filter chain assembly and instrumentation
//!
//! A chain is an ordered list of stages; each input sample flows through
//! every stage in order. Chains are assembled per sensor type and intended
//! use via the preset constructors, or stage by stage with
//! [`FilterChain::builder`].
//!
//! Per-call latency is tracked so the pipeline can verify the filter work
//! stays inside the session latency budget.

use std::time::Instant;

use crate::time::Timestamp;

use super::{EmaFilter, Filter, LowPassFilter, MedianFilter};

/// Latency counters for one chain
#[derive(Debug, Default, Clone, Copy)]
pub struct FilterChainStats {
    /// Calls into [`FilterChain::filter`]
    pub calls: u64,
    /// Cumulative time spent filtering, microseconds
    pub total_us: u64,
    /// Slowest single call, microseconds
    pub max_us: u64,
}

impl FilterChainStats {
    /// Mean per-call latency in microseconds
    pub fn mean_us(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.total_us as f64 / self.calls as f64
    }
}

/// Ordered cascade of filter stages
pub struct FilterChain {
    stages: Vec<Box<dyn Filter + Send>>,
    stats: FilterChainStats,
}

impl FilterChain {
    /// Start an empty chain
    pub fn builder() -> FilterChainBuilder {
        FilterChainBuilder { stages: Vec::new() }
    }

    /// Heavy smoothing for logged IMU axes: median → low-pass → EMA
    ///
    /// The median kills vibration spikes, the low-pass rolls off engine
    /// buzz, the EMA polishes what remains.
    pub fn imu_logging() -> Self {
        Self::builder()
            .median(5)
            .lowpass(10.0)
            .ema(0.3)
            .build()
    }

    /// Single fast EMA for live display use
    pub fn live_display() -> Self {
        Self::builder().ema(0.5).build()
    }

    /// Barometric altitude: short median plus gentle EMA
    pub fn baro_altitude() -> Self {
        Self::builder().median(3).ema(0.2).build()
    }

    /// Run one sample through every stage in order
    pub fn filter(&mut self, value: f64, timestamp: Timestamp) -> f64 {
        let started = Instant::now();
        let mut current = value;
        for stage in &mut self.stages {
            current = stage.filter(current, timestamp);
        }
        let elapsed_us = started.elapsed().as_micros() as u64;
        self.stats.calls += 1;
        self.stats.total_us += elapsed_us;
        self.stats.max_us = self.stats.max_us.max(elapsed_us);
        current
    }

    /// Reset every stage
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    /// Ready once every stage is ready
    pub fn is_ready(&self) -> bool {
        self.stages.iter().all(|stage| stage.is_ready())
    }

    /// Total warmup across all stages
    ///
    /// Feeding a constant for this many samples settles the chain output
    /// onto that constant (within the asymptotic stages' 1% band).
    pub fn warmup_len(&self) -> usize {
        self.stages.iter().map(|stage| stage.warmup_len()).sum()
    }

    /// Number of stages
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Latency counters
    pub fn stats(&self) -> FilterChainStats {
        self.stats
    }
}

/// Builder for stage-by-stage chain assembly
pub struct FilterChainBuilder {
    stages: Vec<Box<dyn Filter + Send>>,
}

impl FilterChainBuilder {
    /// Append a median-of-N stage
    pub fn median(mut self, window_size: usize) -> Self {
        self.stages.push(Box::new(MedianFilter::new(window_size)));
        self
    }

    /// Append a low-pass stage with the given cutoff in Hz
    pub fn lowpass(mut self, cutoff_hz: f64) -> Self {
        self.stages.push(Box::new(LowPassFilter::new(cutoff_hz)));
        self
    }

    /// Append an EMA stage with the given smoothing factor
    pub fn ema(mut self, alpha: f64) -> Self {
        self.stages.push(Box::new(EmaFilter::new(alpha)));
        self
    }

    /// Append any custom stage
    pub fn stage(mut self, stage: Box<dyn Filter + Send>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn build(self) -> FilterChain {
        FilterChain {
            stages: self.stages,
            stats: FilterChainStats::default(),
        }
    }
}
