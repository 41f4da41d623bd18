//! Ride Summary Export
//!
//! Flattens a processing run into a single serde-serializable document
//! for storage or UI consumption. Full-rate time series are decimated by
//! stride to a fixed point budget per series; the final sample is always
//! kept so a plotted series ends where the ride did.

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationQuality;
use crate::detect::DetectedEvent;
use crate::errors::ProcessingResult;
use crate::pipeline::ProcessingOutput;
use crate::segments::RideSegment;
use crate::stats::RideStatistics;
use crate::time::Timestamp;

/// One decimated series point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Timestamp, ms
    pub t: Timestamp,
    /// Value, in the unit of its series
    pub v: f64,
}

/// Decimated derived series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummarySeries {
    /// Ground speed, m/s
    pub speed: Vec<SeriesPoint>,
    /// Fused roll, degrees
    pub lean: Vec<SeriesPoint>,
    /// Total g-force, g
    pub gforce: Vec<SeriesPoint>,
}

/// The exported document for one processed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideSummary {
    /// Format marker for consumers
    pub version: u32,
    /// Session start, device clock, ms
    pub start: Timestamp,
    /// Session end, device clock, ms
    pub end: Timestamp,
    /// Calibration quality the run used, absent when uncalibrated
    pub calibration_quality: Option<CalibrationQuality>,
    pub statistics: RideStatistics,
    pub segments: Vec<RideSegment>,
    pub events: Vec<DetectedEvent>,
    pub series: SummarySeries,
    /// Rows the parser had to drop
    pub skipped_rows: usize,
}

/// Current export format version
pub const SUMMARY_VERSION: u32 = 1;

impl RideSummary {
    /// Build the summary from a finished processing run
    pub fn from_output(output: &ProcessingOutput, series_points: usize) -> Self {
        Self {
            version: SUMMARY_VERSION,
            start: output.start,
            end: output.end,
            calibration_quality: output.calibration.as_ref().map(|c| c.quality),
            statistics: output.statistics.clone(),
            segments: output.segments.clone(),
            events: output.events.clone(),
            series: SummarySeries {
                speed: decimate(
                    output.metrics.velocity.iter().map(|s| (s.timestamp, s.speed)),
                    output.metrics.velocity.len(),
                    series_points,
                ),
                lean: decimate(
                    output.metrics.lean.iter().map(|s| (s.timestamp, s.roll)),
                    output.metrics.lean.len(),
                    series_points,
                ),
                gforce: decimate(
                    output.metrics.gforce.iter().map(|s| (s.timestamp, s.total)),
                    output.metrics.gforce.len(),
                    series_points,
                ),
            },
            skipped_rows: output.parser_stats.rows_skipped,
        }
    }

    /// Ride length in milliseconds
    pub fn duration_ms(&self) -> i64 {
        self.end - self.start
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> ProcessingResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize pretty-printed, for debugging and fixtures
    pub fn to_json_pretty(&self) -> ProcessingResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Keep every `stride`-th point plus the last one
fn decimate(
    series: impl Iterator<Item = (Timestamp, f64)>,
    len: usize,
    budget: usize,
) -> Vec<SeriesPoint> {
    if len == 0 || budget == 0 {
        return Vec::new();
    }
    let stride = len.div_ceil(budget).max(1);
    let last_index = len - 1;
    series
        .enumerate()
        .filter(|(i, _)| i % stride == 0 || *i == last_index)
        .map(|(_, (t, v))| SeriesPoint { t, v })
        .collect()
}
