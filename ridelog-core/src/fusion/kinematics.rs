//! G-Force, Acceleration and Velocity Derivation
//!
//! ## Frames
//!
//! Device-frame acceleration is rotated into the vehicle-aligned world
//! frame using the calibration rotation (identity when uncalibrated):
//! x = longitudinal (positive forward), y = lateral (positive right),
//! z = vertical. G-force removes the 1 g vertical gravity component and
//! reports in g units; acceleration samples keep gravity in, reported in
//! m/s².
//!
//! ## Velocity
//!
//! GPS is the primary source, gated by the accuracy ceiling. Acceleration
//! comes from finite-differencing consecutive valid speeds; the difference
//! is skipped (reported as zero) when the interval is non-positive or
//! implausibly large. When IMU data covers the interval, the
//! finite-difference is blended with the mean IMU longitudinal
//! acceleration and the sample is tagged `Fused`. Across GPS dropouts
//! longer than the velocity gap bound, the last valid speed is
//! forward-integrated with IMU longitudinal acceleration and emitted as
//! `ImuOnly` samples, so segments and events keep a velocity signal
//! through tunnels and urban canyons.

use crate::calibration::CalibrationRecord;
use crate::config::{ProcessingConfig, GRAVITY_MS2};
use crate::errors::ProcessingError;
use crate::events::{
    AccelerationSample, GForceSample, SensorEvent, VelocitySample, VelocitySource,
};
use crate::time::{dt_seconds, Timestamp};

/// Weight of the GPS finite-difference in a fused acceleration estimate
const FUSED_GPS_WEIGHT: f64 = 0.7;

/// Rotate device-frame acceleration and express it as g-force
pub fn gforce_sample(
    timestamp: Timestamp,
    accel: [f64; 3],
    calibration: Option<&CalibrationRecord>,
) -> GForceSample {
    let world = rotate_to_world(accel, calibration);
    let longitudinal = world[0] / GRAVITY_MS2;
    let lateral = world[1] / GRAVITY_MS2;
    // Subtract the 1 g the accelerometer always reports at rest
    let vertical = world[2] / GRAVITY_MS2 - 1.0;
    GForceSample {
        timestamp,
        longitudinal,
        lateral,
        vertical,
        total: (longitudinal * longitudinal + lateral * lateral + vertical * vertical).sqrt(),
    }
}

/// World-frame raw acceleration, gravity included
pub fn acceleration_sample(
    timestamp: Timestamp,
    accel: [f64; 3],
    calibration: Option<&CalibrationRecord>,
) -> AccelerationSample {
    let [x, y, z] = rotate_to_world(accel, calibration);
    AccelerationSample {
        timestamp,
        x,
        y,
        z,
        magnitude: (x * x + y * y + z * z).sqrt(),
    }
}

fn rotate_to_world(v: [f64; 3], calibration: Option<&CalibrationRecord>) -> [f64; 3] {
    match calibration {
        Some(record) => record.rotate(v),
        None => v,
    }
}

/// Derive the fused velocity stream from GPS fixes and the g-force stream
///
/// `gforce` must be sorted by timestamp (it is produced from the sorted
/// IMU stream). Returns the samples plus any non-fatal errors observed
/// (sensor dropouts).
pub fn estimate_velocity(
    gps: &[SensorEvent],
    gforce: &[GForceSample],
    config: &ProcessingConfig,
) -> (Vec<VelocitySample>, Vec<ProcessingError>) {
    let mut samples = Vec::new();
    let mut errors = Vec::new();
    let mut previous: Option<(Timestamp, f64, f64)> = None; // (ts, speed, bearing)
    let mut gforce_pos = 0usize;

    for event in gps {
        let SensorEvent::Gps {
            timestamp,
            speed,
            bearing,
            accuracy,
            ..
        } = event
        else {
            continue;
        };
        if *accuracy > config.gps_accuracy_ceiling_m {
            continue;
        }

        match previous {
            None => {
                samples.push(VelocitySample {
                    timestamp: *timestamp,
                    speed: *speed,
                    bearing: *bearing,
                    acceleration: 0.0,
                    source: VelocitySource::GpsOnly,
                });
            }
            Some((prev_ts, prev_speed, prev_bearing)) => {
                let gap_ms = *timestamp - prev_ts;
                let imu_window = gforce_between(gforce, &mut gforce_pos, prev_ts, *timestamp);

                if gap_ms > config.max_velocity_gap_ms {
                    errors.push(ProcessingError::SensorDropout {
                        timestamp: prev_ts,
                        gap_ms,
                    });
                    // Bridge the dropout from the IMU when it kept reporting
                    propagate_through_dropout(
                        &mut samples,
                        imu_window,
                        prev_ts,
                        prev_speed,
                        prev_bearing,
                    );
                }

                let dt = dt_seconds(prev_ts, *timestamp);
                let fd_accel = if dt > 0.0 && gap_ms <= config.max_velocity_gap_ms {
                    (*speed - prev_speed) / dt
                } else {
                    // Non-positive or implausible interval: difference skipped
                    0.0
                };

                let (acceleration, source) = match mean_longitudinal(imu_window) {
                    Some(imu_accel) if gap_ms <= config.max_velocity_gap_ms && dt > 0.0 => (
                        FUSED_GPS_WEIGHT * fd_accel + (1.0 - FUSED_GPS_WEIGHT) * imu_accel,
                        VelocitySource::Fused,
                    ),
                    _ => (fd_accel, VelocitySource::GpsOnly),
                };

                samples.push(VelocitySample {
                    timestamp: *timestamp,
                    speed: *speed,
                    bearing: *bearing,
                    acceleration,
                    source,
                });
            }
        }
        previous = Some((*timestamp, *speed, *bearing));
    }

    (samples, errors)
}

/// G-force samples with timestamps in `(start, end]`
///
/// `pos` is a moving cursor over the sorted stream so the whole
/// estimation stays linear in the input sizes.
fn gforce_between<'a>(
    gforce: &'a [GForceSample],
    pos: &mut usize,
    start: Timestamp,
    end: Timestamp,
) -> &'a [GForceSample] {
    while *pos < gforce.len() && gforce[*pos].timestamp <= start {
        *pos += 1;
    }
    let from = *pos;
    let mut to = from;
    while to < gforce.len() && gforce[to].timestamp <= end {
        to += 1;
    }
    &gforce[from..to]
}

fn mean_longitudinal(window: &[GForceSample]) -> Option<f64> {
    if window.is_empty() {
        return None;
    }
    let sum: f64 = window.iter().map(|s| s.longitudinal * GRAVITY_MS2).sum();
    Some(sum / window.len() as f64)
}

/// Forward-integrate the last valid speed across a GPS dropout
fn propagate_through_dropout(
    samples: &mut Vec<VelocitySample>,
    imu_window: &[GForceSample],
    start_ts: Timestamp,
    start_speed: f64,
    bearing: f64,
) {
    let mut speed = start_speed;
    let mut last_ts = start_ts;
    for gf in imu_window {
        let dt = dt_seconds(last_ts, gf.timestamp);
        if dt <= 0.0 {
            continue;
        }
        let accel = gf.longitudinal * GRAVITY_MS2;
        speed = (speed + accel * dt).max(0.0);
        last_ts = gf.timestamp;
        samples.push(VelocitySample {
            timestamp: gf.timestamp,
            speed,
            bearing,
            acceleration: accel,
            source: VelocitySource::ImuOnly,
        });
    }
}
