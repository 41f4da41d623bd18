//! Whole-Ride Statistics
//!
//! Aggregates the session into a single summary record. Distance, speed
//! and duration figures come from the riding segments only, so a long
//! lunch stop does not drag the average speed down. Elevation gain and
//! loss prefer the barometric altitude series (run through the baro
//! smoothing chain); without BARO rows they walk a 3-point moving average
//! of the accuracy-gated GPS altitudes. Either way only deltas past the
//! minimum threshold are banked, which keeps altitude jitter from
//! inflating both totals.

use serde::{Deserialize, Serialize};

use crate::config::ProcessingConfig;
use crate::events::{SensorEvent, SensorType};
use crate::filters::FilterChain;
use crate::fusion::DerivedMetrics;
use crate::parser::ParsedSession;
use crate::segments::{RideSegment, SegmentType};

/// Summary figures for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RideStatistics {
    /// Wall-clock session length, ms
    pub total_duration_ms: i64,
    /// Time classified as riding, ms
    pub riding_duration_ms: i64,
    /// Time classified as paused, ms
    pub paused_duration_ms: i64,
    /// Time classified as stopped, ms
    pub stopped_duration_ms: i64,
    /// Path length over riding segments, meters
    pub total_distance_m: f64,
    /// Fastest accuracy-gated fix anywhere in the session, m/s
    pub max_speed_ms: f64,
    /// Mean speed over accuracy-gated fixes inside riding segments, m/s
    pub avg_riding_speed_ms: f64,
    /// Largest absolute fused roll, degrees
    pub max_lean_deg: f64,
    /// Largest total g-force, g
    pub max_gforce: f64,
    /// Banked elevation gain on the smoothed altitude series, meters
    pub elevation_gain_m: f64,
    /// Banked elevation loss on the smoothed altitude series, meters
    pub elevation_loss_m: f64,
}

/// Compute the ride summary from the session and its derived data
pub fn compute_statistics(
    session: &ParsedSession,
    metrics: &DerivedMetrics,
    segments: &[RideSegment],
    config: &ProcessingConfig,
) -> RideStatistics {
    let mut stats = RideStatistics {
        total_duration_ms: session.duration_ms(),
        ..RideStatistics::default()
    };

    let mut riding_speed_sum = 0.0;
    let mut riding_speed_count = 0usize;

    for segment in segments {
        match segment.segment_type {
            SegmentType::ActiveRiding => {
                stats.riding_duration_ms += segment.duration_ms();
                stats.total_distance_m += segment.statistics.distance_m;
                riding_speed_sum +=
                    segment.statistics.avg_speed_ms * segment.statistics.gps_samples as f64;
                riding_speed_count += segment.statistics.gps_samples;
            }
            SegmentType::Pause => stats.paused_duration_ms += segment.duration_ms(),
            SegmentType::Stop => stats.stopped_duration_ms += segment.duration_ms(),
        }
    }
    if riding_speed_count > 0 {
        stats.avg_riding_speed_ms = riding_speed_sum / riding_speed_count as f64;
    }

    let altitudes = accurate_altitudes(session, config);
    for (_, speed) in &altitudes {
        stats.max_speed_ms = stats.max_speed_ms.max(*speed);
    }
    let elevation_series =
        baro_altitudes(session).unwrap_or_else(|| smooth_altitudes(&altitudes));
    let (gain, loss) =
        elevation_gain_loss(&elevation_series, config.min_elevation_delta_m);
    stats.elevation_gain_m = gain;
    stats.elevation_loss_m = loss;

    for lean in &metrics.lean {
        stats.max_lean_deg = stats.max_lean_deg.max(lean.roll.abs());
    }
    for gforce in &metrics.gforce {
        stats.max_gforce = stats.max_gforce.max(gforce.total);
    }

    stats
}

/// (altitude, speed) of every accuracy-gated fix, in time order
fn accurate_altitudes(session: &ParsedSession, config: &ProcessingConfig) -> Vec<(f64, f64)> {
    session
        .events_of(SensorType::Gps)
        .iter()
        .filter_map(|event| match event {
            SensorEvent::Gps {
                altitude,
                speed,
                accuracy,
                ..
            } if *accuracy <= config.gps_accuracy_ceiling_m => Some((*altitude, *speed)),
            _ => None,
        })
        .collect()
}

/// Barometric altitude series through the baro smoothing chain
///
/// Barometric altitude carries far less jitter than GPS altitude, so it
/// wins for elevation deltas whenever the log recorded it. `None` when
/// the session has no BARO rows.
fn baro_altitudes(session: &ParsedSession) -> Option<Vec<f64>> {
    let baro = session.events_of(SensorType::Baro);
    if baro.is_empty() {
        return None;
    }
    let mut chain = FilterChain::baro_altitude();
    Some(
        baro.iter()
            .filter_map(|event| match event {
                SensorEvent::Baro {
                    timestamp,
                    altitude,
                    ..
                } => Some(chain.filter(*altitude, *timestamp)),
                _ => None,
            })
            .collect(),
    )
}

/// 3-point moving average over the altitude series
fn smooth_altitudes(points: &[(f64, f64)]) -> Vec<f64> {
    points
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let from = i.saturating_sub(1);
            let to = (i + 1).min(points.len() - 1);
            let sum: f64 = points[from..=to].iter().map(|(alt, _)| alt).sum();
            sum / (to - from + 1) as f64
        })
        .collect()
}

/// Bank gains and losses past the minimum delta, with hysteresis
///
/// The reference altitude only advances when a delta is banked, so a slow
/// oscillation below the threshold contributes nothing to either total.
fn elevation_gain_loss(smoothed: &[f64], min_delta_m: f64) -> (f64, f64) {
    let mut gain = 0.0;
    let mut loss = 0.0;
    let Some(&first) = smoothed.first() else {
        return (gain, loss);
    };
    let mut reference = first;
    for &altitude in &smoothed[1..] {
        let delta = altitude - reference;
        if delta >= min_delta_m {
            gain += delta;
            reference = altitude;
        } else if delta <= -min_delta_m {
            loss += -delta;
            reference = altitude;
        }
    }
    (gain, loss)
}
