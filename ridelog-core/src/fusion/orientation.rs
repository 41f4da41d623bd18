//! Gyro-Driven Orientation Tracking
//!
//! Integrates the gyroscope into a unit quaternion with a first-order
//! update and per-step renormalization:
//!
//! ```text
//! q[n+1] = normalize(q[n] + 0.5 · q[n] ⊗ (0, ω·dt))
//! ```
//!
//! The first-order (non-exponential-map) update accumulates numerical
//! drift over long windows. That behavior is deliberate: downstream
//! thresholds were tuned against it, so it must not be "fixed" silently.

use crate::calibration::CalibrationRecord;
use crate::config::ProcessingConfig;
use crate::events::OrientationSample;
use crate::time::{dt_seconds, is_gap, Timestamp};

/// Quaternion orientation integrator
pub struct OrientationTracker {
    /// Current orientation, [w, x, y, z], unit norm
    quat: [f64; 4],
    gyro_bias: [f64; 3],
    max_gap_ms: i64,
    last_timestamp: Option<Timestamp>,
}

impl OrientationTracker {
    pub fn new(config: &ProcessingConfig, calibration: Option<&CalibrationRecord>) -> Self {
        Self {
            quat: [1.0, 0.0, 0.0, 0.0],
            gyro_bias: calibration.map_or([0.0; 3], |c| c.gyro_bias),
            max_gap_ms: config.max_integration_gap_ms,
            last_timestamp: None,
        }
    }

    /// Integrate one gyro sample and report the resulting orientation
    pub fn update(&mut self, timestamp: Timestamp, gyro: [f64; 3]) -> OrientationSample {
        if let Some(prev_ts) = self.last_timestamp {
            let dt = dt_seconds(prev_ts, timestamp);
            if dt > 0.0 && !is_gap(prev_ts, timestamp, self.max_gap_ms) {
                let wx = (gyro[0] - self.gyro_bias[0]) * dt;
                let wy = (gyro[1] - self.gyro_bias[1]) * dt;
                let wz = (gyro[2] - self.gyro_bias[2]) * dt;

                let [qw, qx, qy, qz] = self.quat;
                // q + 0.5 * q ⊗ (0, w)
                self.quat = [
                    qw + 0.5 * (-qx * wx - qy * wy - qz * wz),
                    qx + 0.5 * (qw * wx + qy * wz - qz * wy),
                    qy + 0.5 * (qw * wy - qx * wz + qz * wx),
                    qz + 0.5 * (qw * wz + qx * wy - qy * wx),
                ];
                normalize(&mut self.quat);
            }
            // Across a gap the previous orientation holds unchanged
        }
        self.last_timestamp = Some(timestamp);

        let (roll, pitch, yaw) = euler_degrees(self.quat);
        OrientationSample {
            timestamp,
            roll,
            pitch,
            yaw,
            quaternion: self.quat,
        }
    }

    pub fn reset(&mut self) {
        self.quat = [1.0, 0.0, 0.0, 0.0];
        self.last_timestamp = None;
    }
}

fn normalize(q: &mut [f64; 4]) {
    let norm = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if norm > 1e-12 {
        for component in q.iter_mut() {
            *component /= norm;
        }
    } else {
        *q = [1.0, 0.0, 0.0, 0.0];
    }
}

/// ZYX Euler angles in degrees from a unit quaternion
fn euler_degrees(q: [f64; 4]) -> (f64, f64, f64) {
    let [w, x, y, z] = q;

    let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));

    let sin_pitch = 2.0 * (w * y - z * x);
    let pitch = if sin_pitch.abs() >= 1.0 {
        std::f64::consts::FRAC_PI_2.copysign(sin_pitch)
    } else {
        sin_pitch.asin()
    };

    let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));

    (roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> OrientationTracker {
        OrientationTracker::new(&ProcessingConfig::default(), None)
    }

    #[test]
    fn starts_at_identity() {
        let mut t = tracker();
        let sample = t.update(0, [0.0; 3]);
        assert_eq!(sample.quaternion, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(sample.yaw, 0.0);
    }

    #[test]
    fn integrates_constant_yaw_rate() {
        let mut t = tracker();
        // 90°/s about z for one second at 50 Hz
        let rate = std::f64::consts::FRAC_PI_2;
        let mut sample = t.update(0, [0.0, 0.0, rate]);
        for i in 1..=50 {
            sample = t.update(i * 20, [0.0, 0.0, rate]);
        }
        // First-order integration lands near 90° (small discretization error)
        assert!((sample.yaw - 90.0).abs() < 2.0, "yaw = {}", sample.yaw);
        assert!(sample.roll.abs() < 1e-6);
    }

    #[test]
    fn quaternion_stays_unit_norm() {
        let mut t = tracker();
        let mut sample = t.update(0, [0.0; 3]);
        for i in 1..500 {
            sample = t.update(i * 20, [0.7, -0.4, 1.3]);
        }
        let q = sample.quaternion;
        let norm = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn gap_holds_previous_orientation() {
        let mut t = tracker();
        t.update(0, [0.0, 0.0, 1.0]);
        let before = t.update(20, [0.0, 0.0, 1.0]);
        // 3 s dropout with a huge rate: orientation must not jump
        let after = t.update(3_020, [0.0, 0.0, 100.0]);
        assert_eq!(before.quaternion, after.quaternion);
    }

    #[test]
    fn bias_is_subtracted() {
        let cfg = ProcessingConfig::default();
        let calibration = CalibrationRecord {
            quality: crate::calibration::CalibrationQuality::Excellent,
            reference_pitch_deg: 0.0,
            reference_roll_deg: 0.0,
            rotation: crate::calibration::IDENTITY_ROTATION,
            gyro_bias: [0.0, 0.0, 0.05],
            timestamp: 0,
            duration_ms: 3_000,
            sample_count: 150,
        };
        let mut t = OrientationTracker::new(&cfg, Some(&calibration));
        // Raw gyro reads exactly the bias: no rotation should accumulate
        let mut sample = t.update(0, [0.0, 0.0, 0.05]);
        for i in 1..100 {
            sample = t.update(i * 20, [0.0, 0.0, 0.05]);
        }
        assert!(sample.yaw.abs() < 1e-9);
    }
}
