//! Ride Segment Detection
//!
//! ## Algorithm
//!
//! The session is cut into fixed-width activity windows. A window counts
//! as moving when either sensor says so: any accuracy-gated GPS fix above
//! the moving-speed threshold, or a mean accelerometer-magnitude deviation
//! from 1 g above the moving-deviation threshold. Classification then
//! looks at the moving ratio over a neighborhood of windows on each side,
//! which keeps a single noisy window from splitting a segment:
//!
//! ```text
//! ratio >= riding_ratio  -> ActiveRiding
//! ratio <= stop_ratio    -> Stop
//! otherwise              -> Pause
//! ```
//!
//! Runs of equally-classified windows become segments; segments shorter
//! than the minimum are merged into a neighbor, and the result always
//! covers [session start, session end] with no gaps or overlap.

use serde::{Deserialize, Serialize};

use crate::config::{ProcessingConfig, GRAVITY_MS2};
use crate::events::{SensorEvent, SensorType};
use crate::fusion::DerivedMetrics;
use crate::parser::ParsedSession;
use crate::time::Timestamp;

/// Mean Earth radius in meters, for haversine distance
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Gyro magnitude std dev (rad/s) that counts as one unit of activity
const GYRO_ACTIVITY_STD: f64 = 0.2;

/// Neighborhood mean activity below which a high moving ratio still does
/// not classify as riding
const MIN_RIDING_ACTIVITY: f64 = 1.0;

/// Activity classification of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentType {
    /// Sustained movement
    ActiveRiding,
    /// Brief halt inside a ride, e.g. a traffic light
    Pause,
    /// Extended halt
    Stop,
}

impl SegmentType {
    pub const fn name(&self) -> &'static str {
        match self {
            SegmentType::ActiveRiding => "active_riding",
            SegmentType::Pause => "pause",
            SegmentType::Stop => "stop",
        }
    }
}

/// Aggregates over one segment's samples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentStatistics {
    /// Haversine path length over accuracy-gated fixes, meters
    pub distance_m: f64,
    /// Fastest accuracy-gated fix, m/s
    pub max_speed_ms: f64,
    /// Mean speed over accuracy-gated fixes, m/s
    pub avg_speed_ms: f64,
    /// Largest absolute fused roll, degrees
    pub max_lean_deg: f64,
    /// Largest total g-force, g
    pub max_gforce: f64,
    /// Altitude at segment end minus altitude at segment start, meters
    pub elevation_delta_m: f64,
    /// Accuracy-gated GPS fixes in the segment
    pub gps_samples: usize,
    /// IMU samples in the segment
    pub imu_samples: usize,
}

/// One contiguous span of uniform activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideSegment {
    pub start: Timestamp,
    pub end: Timestamp,
    pub segment_type: SegmentType,
    pub statistics: SegmentStatistics,
}

impl RideSegment {
    pub fn duration_ms(&self) -> i64 {
        self.end - self.start
    }
}

/// Great-circle distance between two fixes in meters
pub(crate) fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1) = (lat1.to_radians(), lon1.to_radians());
    let (lat2, lon2) = (lat2.to_radians(), lon2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Per-window activity evidence
#[derive(Debug, Clone, Copy, Default)]
struct ActivityWindow {
    max_speed: f64,
    has_gps: bool,
    accel_deviation_sum: f64,
    gyro_sum: f64,
    gyro_sum_sq: f64,
    imu_count: usize,
}

impl ActivityWindow {
    fn is_moving(&self, config: &ProcessingConfig) -> bool {
        if self.has_gps && self.max_speed > config.moving_speed_ms {
            return true;
        }
        if self.imu_count > 0 {
            let mean_deviation = self.accel_deviation_sum / self.imu_count as f64;
            if mean_deviation > config.moving_accel_deviation_ms2 {
                return true;
            }
        }
        false
    }

    fn gyro_std(&self) -> f64 {
        if self.imu_count < 2 {
            return 0.0;
        }
        let n = self.imu_count as f64;
        let mean = self.gyro_sum / n;
        ((self.gyro_sum_sq / n) - mean * mean).max(0.0).sqrt()
    }

    /// Blended activity score: each term is one threshold-equivalent of
    /// evidence from its sensor
    fn activity_score(&self, config: &ProcessingConfig) -> f64 {
        let mut score = 0.0;
        if self.has_gps {
            score += self.max_speed / config.moving_speed_ms.max(1e-9);
        }
        if self.imu_count > 0 {
            let mean_deviation = self.accel_deviation_sum / self.imu_count as f64;
            score += mean_deviation / config.moving_accel_deviation_ms2.max(1e-9);
            score += self.gyro_std() / GYRO_ACTIVITY_STD;
        }
        score
    }
}

/// Detect ride segments over the whole session
///
/// The returned segments are sorted, non-overlapping, and cover
/// `[session.start, session.end]` exactly.
pub fn detect_segments(
    session: &ParsedSession,
    metrics: &DerivedMetrics,
    config: &ProcessingConfig,
) -> Vec<RideSegment> {
    let window_ms = config.segment_window_ms.max(1);
    let duration = session.duration_ms().max(0);
    let window_count = ((duration + window_ms - 1) / window_ms).max(1) as usize;

    let mut windows = vec![ActivityWindow::default(); window_count];
    let window_of = |ts: Timestamp| -> usize {
        (((ts - session.start) / window_ms).max(0) as usize).min(window_count - 1)
    };

    for event in session.events_of(SensorType::Gps) {
        if let SensorEvent::Gps {
            timestamp,
            speed,
            accuracy,
            ..
        } = event
        {
            if *accuracy > config.gps_accuracy_ceiling_m {
                continue;
            }
            let window = &mut windows[window_of(*timestamp)];
            window.has_gps = true;
            window.max_speed = window.max_speed.max(*speed);
        }
    }

    for event in session.events_of(SensorType::Imu) {
        if let SensorEvent::Imu {
            timestamp,
            accel,
            gyro,
        } = event
        {
            let magnitude =
                (accel[0] * accel[0] + accel[1] * accel[1] + accel[2] * accel[2]).sqrt();
            let rate = (gyro[0] * gyro[0] + gyro[1] * gyro[1] + gyro[2] * gyro[2]).sqrt();
            let window = &mut windows[window_of(*timestamp)];
            window.accel_deviation_sum += (magnitude - GRAVITY_MS2).abs();
            window.gyro_sum += rate;
            window.gyro_sum_sq += rate * rate;
            window.imu_count += 1;
        }
    }

    let moving: Vec<bool> = windows.iter().map(|w| w.is_moving(config)).collect();
    let scores: Vec<f64> = windows.iter().map(|w| w.activity_score(config)).collect();
    let classes: Vec<SegmentType> = (0..window_count)
        .map(|i| classify_window(&moving, &scores, i, config))
        .collect();

    let mut segments = segments_from_classes(&classes, session, window_ms);
    merge_short_segments(&mut segments, config.min_segment_ms);

    for segment in &mut segments {
        segment.statistics = segment_statistics(segment, session, metrics, config);
    }
    segments
}

/// Classify one window from its neighborhood's moving ratio and activity
fn classify_window(
    moving: &[bool],
    scores: &[f64],
    index: usize,
    config: &ProcessingConfig,
) -> SegmentType {
    let from = index.saturating_sub(config.segment_neighborhood);
    let to = (index + config.segment_neighborhood).min(moving.len() - 1);
    let total = to - from + 1;
    let moving_count = moving[from..=to].iter().filter(|m| **m).count();
    let ratio = moving_count as f64 / total as f64;
    let mean_score = scores[from..=to].iter().sum::<f64>() / total as f64;

    if ratio >= config.riding_ratio && mean_score >= MIN_RIDING_ACTIVITY {
        SegmentType::ActiveRiding
    } else if ratio <= config.stop_ratio {
        SegmentType::Stop
    } else {
        SegmentType::Pause
    }
}

/// Turn runs of equal classes into boundary-aligned segments
fn segments_from_classes(
    classes: &[SegmentType],
    session: &ParsedSession,
    window_ms: i64,
) -> Vec<RideSegment> {
    let mut segments: Vec<RideSegment> = Vec::new();
    for (i, class) in classes.iter().enumerate() {
        let start = session.start + i as i64 * window_ms;
        let end = (start + window_ms).min(session.end).max(start);
        match segments.last_mut() {
            Some(last) if last.segment_type == *class => last.end = end,
            _ => segments.push(RideSegment {
                start,
                end,
                segment_type: *class,
                statistics: SegmentStatistics::default(),
            }),
        }
    }
    // The final window may end short of the session; extend to cover it
    if let Some(last) = segments.last_mut() {
        last.end = last.end.max(session.end);
    }
    segments
}

/// Merge segments shorter than the minimum into a neighbor
///
/// A short segment joins the previous segment (the following one when it
/// is first), adopting that neighbor's type; adjacent equal types are
/// then coalesced. The last remaining segment is never dropped.
fn merge_short_segments(segments: &mut Vec<RideSegment>, min_ms: i64) {
    loop {
        if segments.len() <= 1 {
            return;
        }
        let Some(short) = segments.iter().position(|s| s.duration_ms() < min_ms) else {
            return;
        };
        if short == 0 {
            let removed = segments.remove(0);
            segments[0].start = removed.start;
        } else {
            let removed = segments.remove(short);
            segments[short - 1].end = removed.end;
        }
        coalesce(segments);
    }
}

fn coalesce(segments: &mut Vec<RideSegment>) {
    let mut i = 0;
    while i + 1 < segments.len() {
        if segments[i].segment_type == segments[i + 1].segment_type {
            segments[i].end = segments[i + 1].end;
            segments.remove(i + 1);
        } else {
            i += 1;
        }
    }
}

/// Aggregate session and metric samples falling inside one segment
fn segment_statistics(
    segment: &RideSegment,
    session: &ParsedSession,
    metrics: &DerivedMetrics,
    config: &ProcessingConfig,
) -> SegmentStatistics {
    let mut stats = SegmentStatistics::default();
    let inside = |ts: Timestamp| ts >= segment.start && ts <= segment.end;

    let mut speed_sum = 0.0;
    let mut first_altitude = None;
    let mut last_altitude = None;
    let mut previous_fix: Option<(f64, f64)> = None;

    for event in session.events_of(SensorType::Gps) {
        if let SensorEvent::Gps {
            timestamp,
            latitude,
            longitude,
            altitude,
            speed,
            accuracy,
            ..
        } = event
        {
            if !inside(*timestamp) || *accuracy > config.gps_accuracy_ceiling_m {
                continue;
            }
            stats.gps_samples += 1;
            stats.max_speed_ms = stats.max_speed_ms.max(*speed);
            speed_sum += *speed;
            first_altitude.get_or_insert(*altitude);
            last_altitude = Some(*altitude);
            if let Some((prev_lat, prev_lon)) = previous_fix {
                stats.distance_m += haversine_m(prev_lat, prev_lon, *latitude, *longitude);
            }
            previous_fix = Some((*latitude, *longitude));
        }
    }
    if stats.gps_samples > 0 {
        stats.avg_speed_ms = speed_sum / stats.gps_samples as f64;
    }
    if let (Some(first), Some(last)) = (first_altitude, last_altitude) {
        stats.elevation_delta_m = last - first;
    }

    stats.imu_samples = session
        .events_of(SensorType::Imu)
        .iter()
        .filter(|e| inside(e.timestamp()))
        .count();

    for lean in metrics.lean.iter().filter(|s| inside(s.timestamp)) {
        stats.max_lean_deg = stats.max_lean_deg.max(lean.roll.abs());
    }
    for gforce in metrics.gforce.iter().filter(|s| inside(s.timestamp)) {
        stats.max_gforce = stats.max_gforce.max(gforce.total);
    }

    stats
}
