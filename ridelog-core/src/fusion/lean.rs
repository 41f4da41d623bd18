//! Lean Angle Fusion
//!
//! ## Algorithm
//!
//! Per IMU sample, in timestamp order:
//!
//! 1. Accelerometer-only roll/pitch from the gravity-plane components
//!    (`atan2`): noisy but drift-free.
//! 2. Gyro integration over the elapsed dt: smooth but drifting.
//!    Integration is rejected when dt is non-positive or spans a data gap;
//!    the sample then falls back to accelerometer-only angles.
//! 3. Complementary blend:
//!    `angle = α·(previous + gyro·dt) + (1-α)·accel_angle`, with α fixed
//!    high (0.98) to trust the gyro short-term.
//! 4. Subtract the calibration reference so a level mounting reads zero.
//!
//! ## Confidence
//!
//! During hard maneuvers the accelerometer measures gravity plus motion,
//! so its angle estimate degrades exactly when it matters. Confidence
//! reflects that: 1.0 when the accel magnitude sits at 1 g, falling
//! linearly to 0.0 at a configured deviation bound.

use crate::calibration::{accel_angles, CalibrationRecord};
use crate::config::{ProcessingConfig, GRAVITY_MS2};
use crate::events::LeanAngleSample;
use crate::time::{dt_seconds, is_gap, Timestamp};

/// Complementary-filter lean angle tracker
pub struct LeanFusion {
    alpha: f64,
    max_gap_ms: i64,
    confidence_limit_g: f64,
    reference_roll_deg: f64,
    reference_pitch_deg: f64,
    gyro_bias: [f64; 3],
    /// Fused (roll_rad, pitch_rad, timestamp) of the previous sample
    state: Option<(f64, f64, Timestamp)>,
}

impl LeanFusion {
    pub fn new(config: &ProcessingConfig, calibration: Option<&CalibrationRecord>) -> Self {
        Self {
            alpha: config.fusion_alpha,
            max_gap_ms: config.max_integration_gap_ms,
            confidence_limit_g: config.confidence_deviation_limit_g,
            reference_roll_deg: calibration.map_or(0.0, |c| c.reference_roll_deg),
            reference_pitch_deg: calibration.map_or(0.0, |c| c.reference_pitch_deg),
            gyro_bias: calibration.map_or([0.0; 3], |c| c.gyro_bias),
            state: None,
        }
    }

    /// Fuse one IMU sample into a lean angle
    ///
    /// `accel` and `gyro` are device-frame, already noise-filtered.
    pub fn update(&mut self, timestamp: Timestamp, accel: [f64; 3], gyro: [f64; 3]) -> LeanAngleSample {
        let (accel_pitch, accel_roll) = accel_angles(accel);

        let (roll, pitch) = match self.state {
            Some((prev_roll, prev_pitch, prev_ts)) => {
                let dt = dt_seconds(prev_ts, timestamp);
                if dt <= 0.0 || is_gap(prev_ts, timestamp, self.max_gap_ms) {
                    // Data gap: gyro integral across it is meaningless
                    (accel_roll, accel_pitch)
                } else {
                    let gyro_roll = prev_roll + (gyro[0] - self.gyro_bias[0]) * dt;
                    let gyro_pitch = prev_pitch + (gyro[1] - self.gyro_bias[1]) * dt;
                    (
                        self.alpha * gyro_roll + (1.0 - self.alpha) * accel_roll,
                        self.alpha * gyro_pitch + (1.0 - self.alpha) * accel_pitch,
                    )
                }
            }
            None => (accel_roll, accel_pitch),
        };
        self.state = Some((roll, pitch, timestamp));

        LeanAngleSample {
            timestamp,
            roll: roll.to_degrees() - self.reference_roll_deg,
            pitch: pitch.to_degrees() - self.reference_pitch_deg,
            confidence: accel_confidence(accel, self.confidence_limit_g),
        }
    }

    /// Forget fusion state, e.g. across a session boundary
    pub fn reset(&mut self) {
        self.state = None;
    }
}

/// Confidence from accelerometer-magnitude proximity to 1 g
///
/// Linear from 1.0 at exactly 1 g down to 0.0 at `limit_g` deviation.
pub fn accel_confidence(accel: [f64; 3], limit_g: f64) -> f64 {
    let magnitude_g =
        (accel[0] * accel[0] + accel[1] * accel[1] + accel[2] * accel[2]).sqrt() / GRAVITY_MS2;
    let deviation = (magnitude_g - 1.0).abs();
    (1.0 - deviation / limit_g.max(1e-9)).clamp(0.0, 1.0)
}
