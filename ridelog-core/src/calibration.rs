//! Calibration Contract and Stationary-Capture Scoring
//!
//! ## Overview
//!
//! Calibration acquisition (countdowns, retry dialogs) happens outside this
//! core. What downstream fusion consumes is the *result contract*: a window
//! of samples captured while the vehicle stood still, scored for stability,
//! and reduced to a reference orientation plus gyroscope bias.
//!
//! ## All-or-Nothing Invariant
//!
//! A session is either wholly calibrated or wholly uncalibrated. Scoring a
//! capture yields either a fully-populated [`CalibrationRecord`] or `None`;
//! there is no partially-filled record, and the parser discards any
//! incomplete calibration block the same way.
//!
//! ## Scoring
//!
//! Stability is variance-based: the standard deviation of the accelerometer
//! magnitude and of each gyro axis over the window map to one of five
//! quality levels, gated by a minimum sample count. The mean accelerometer
//! vector gives reference pitch/roll via `atan2` of the gravity-plane
//! components, and the reference rotation matrix is the roll-then-pitch
//! rotation that maps the mean gravity direction onto the world vertical.

use serde::{Deserialize, Serialize};

use crate::config::GRAVITY_MS2;
use crate::time::Timestamp;

/// Stability rating of a calibration capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CalibrationQuality {
    /// Capture never completed or could not be scored
    Unknown,
    /// Too unstable to use
    Bad,
    /// Usable, noticeably noisy
    Poor,
    /// Usable, minor noise
    Good,
    /// Rock steady
    Excellent,
}

impl CalibrationQuality {
    /// Log-format token for this quality level
    pub const fn name(&self) -> &'static str {
        match self {
            CalibrationQuality::Unknown => "UNKNOWN",
            CalibrationQuality::Bad => "BAD",
            CalibrationQuality::Poor => "POOR",
            CalibrationQuality::Good => "GOOD",
            CalibrationQuality::Excellent => "EXCELLENT",
        }
    }

    /// Parse a log-format token
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "UNKNOWN" => Some(CalibrationQuality::Unknown),
            "BAD" => Some(CalibrationQuality::Bad),
            "POOR" => Some(CalibrationQuality::Poor),
            "GOOD" => Some(CalibrationQuality::Good),
            "EXCELLENT" => Some(CalibrationQuality::Excellent),
            _ => None,
        }
    }
}

/// Fully-populated calibration result for one session
///
/// Invariant: every field is meaningful. Sessions without a usable capture
/// carry no record at all rather than a half-filled one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// Stability rating of the capture window
    pub quality: CalibrationQuality,
    /// Reference pitch in degrees (device nose-up tilt at rest)
    pub reference_pitch_deg: f64,
    /// Reference roll in degrees (device sideways tilt at rest)
    pub reference_roll_deg: f64,
    /// Row-major rotation mapping device frame to vehicle-aligned world frame
    pub rotation: [[f64; 3]; 3],
    /// Gyroscope bias in rad/s, subtracted before integration
    pub gyro_bias: [f64; 3],
    /// Device-clock time of the capture
    pub timestamp: Timestamp,
    /// Capture window length in milliseconds
    pub duration_ms: i64,
    /// Samples contributing to the score
    pub sample_count: usize,
}

impl CalibrationRecord {
    /// Rotate a device-frame vector into the vehicle-aligned world frame
    pub fn rotate(&self, v: [f64; 3]) -> [f64; 3] {
        let r = &self.rotation;
        [
            r[0][0] * v[0] + r[0][1] * v[1] + r[0][2] * v[2],
            r[1][0] * v[0] + r[1][1] * v[1] + r[1][2] * v[2],
            r[2][0] * v[0] + r[2][1] * v[1] + r[2][2] * v[2],
        ]
    }
}

/// Per-axis running mean/variance accumulator
///
/// Sum and sum-of-squares form: one pass, no stored samples.
#[derive(Debug, Clone, Copy, Default)]
struct AxisStats {
    sum: f64,
    sum_sq: f64,
    count: usize,
}

impl AxisStats {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.sum_sq += value * value;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    fn variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        ((self.sum_sq / n) - mean * mean).max(0.0)
    }

    fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Accumulates a stationary capture window and scores it
///
/// Feed it accelerometer and gyroscope samples collected while the vehicle
/// stands still, then call [`StationaryCapture::score`].
#[derive(Debug)]
pub struct StationaryCapture {
    accel: [AxisStats; 3],
    accel_magnitude: AxisStats,
    gyro: [AxisStats; 3],
    first_timestamp: Option<Timestamp>,
    last_timestamp: Option<Timestamp>,
    min_samples: usize,
}

/// Accel-magnitude std dev bounds (m/s²) per quality tier
const ACCEL_STD_EXCELLENT: f64 = 0.05;
const ACCEL_STD_GOOD: f64 = 0.15;
const ACCEL_STD_POOR: f64 = 0.50;

/// Gyro std dev bounds (rad/s) per quality tier
const GYRO_STD_EXCELLENT: f64 = 0.01;
const GYRO_STD_GOOD: f64 = 0.03;
const GYRO_STD_POOR: f64 = 0.10;

impl StationaryCapture {
    /// Create a capture gated on `min_samples`
    pub fn new(min_samples: usize) -> Self {
        Self {
            accel: [AxisStats::default(); 3],
            accel_magnitude: AxisStats::default(),
            gyro: [AxisStats::default(); 3],
            first_timestamp: None,
            last_timestamp: None,
            min_samples: min_samples.max(2),
        }
    }

    /// Add one IMU sample from the capture window
    pub fn add_sample(&mut self, timestamp: Timestamp, accel: [f64; 3], gyro: [f64; 3]) {
        for axis in 0..3 {
            self.accel[axis].add(accel[axis]);
            self.gyro[axis].add(gyro[axis]);
        }
        let magnitude = (accel[0] * accel[0] + accel[1] * accel[1] + accel[2] * accel[2]).sqrt();
        self.accel_magnitude.add(magnitude);
        if self.first_timestamp.is_none() {
            self.first_timestamp = Some(timestamp);
        }
        self.last_timestamp = Some(timestamp);
    }

    /// Samples accumulated so far
    pub fn sample_count(&self) -> usize {
        self.accel_magnitude.count
    }

    /// Whether enough samples have been collected to score
    pub fn is_ready(&self) -> bool {
        self.sample_count() >= self.min_samples
    }

    /// Stability rating of the accumulated window
    ///
    /// `Unknown` below the sample gate; otherwise the worse of the
    /// accelerometer-magnitude and gyro tiers.
    pub fn quality(&self) -> CalibrationQuality {
        if !self.is_ready() {
            return CalibrationQuality::Unknown;
        }

        let accel_std = self.accel_magnitude.std_dev();
        let gyro_std = self
            .gyro
            .iter()
            .map(AxisStats::std_dev)
            .fold(0.0_f64, f64::max);

        let accel_tier = tier(accel_std, ACCEL_STD_EXCELLENT, ACCEL_STD_GOOD, ACCEL_STD_POOR);
        let gyro_tier = tier(gyro_std, GYRO_STD_EXCELLENT, GYRO_STD_GOOD, GYRO_STD_POOR);
        accel_tier.min(gyro_tier)
    }

    /// Reduce the capture to a calibration record
    ///
    /// Returns `None` when the window is too short or too unstable
    /// (`Unknown`/`Bad`), honoring the all-or-nothing invariant.
    pub fn score(&self) -> Option<CalibrationRecord> {
        let quality = self.quality();
        if matches!(quality, CalibrationQuality::Unknown | CalibrationQuality::Bad) {
            return None;
        }

        let mean = [
            self.accel[0].mean(),
            self.accel[1].mean(),
            self.accel[2].mean(),
        ];
        let (pitch_rad, roll_rad) = accel_angles(mean);

        let first = self.first_timestamp?;
        let last = self.last_timestamp?;

        Some(CalibrationRecord {
            quality,
            reference_pitch_deg: pitch_rad.to_degrees(),
            reference_roll_deg: roll_rad.to_degrees(),
            rotation: reference_rotation(pitch_rad, roll_rad),
            gyro_bias: [
                self.gyro[0].mean(),
                self.gyro[1].mean(),
                self.gyro[2].mean(),
            ],
            timestamp: first,
            duration_ms: last - first,
            sample_count: self.sample_count(),
        })
    }
}

fn tier(std_dev: f64, excellent: f64, good: f64, poor: f64) -> CalibrationQuality {
    if std_dev <= excellent {
        CalibrationQuality::Excellent
    } else if std_dev <= good {
        CalibrationQuality::Good
    } else if std_dev <= poor {
        CalibrationQuality::Poor
    } else {
        CalibrationQuality::Bad
    }
}

/// Accelerometer-only pitch/roll in radians from a gravity-dominated vector
pub(crate) fn accel_angles(accel: [f64; 3]) -> (f64, f64) {
    let [ax, ay, az] = accel;
    let pitch = (-ax).atan2((ay * ay + az * az).sqrt());
    let roll = ay.atan2(az);
    (pitch, roll)
}

/// Build the device-to-world rotation `Ry(pitch) * Rx(roll)`
///
/// Applying it to the mean gravity direction of the capture yields the
/// world vertical, so world-frame z is "up" for this mounting.
fn reference_rotation(pitch_rad: f64, roll_rad: f64) -> [[f64; 3]; 3] {
    let (sp, cp) = pitch_rad.sin_cos();
    let (sr, cr) = roll_rad.sin_cos();
    [
        [cp, sp * sr, sp * cr],
        [0.0, cr, -sr],
        [-sp, cp * sr, cp * cr],
    ]
}

/// Identity rotation used when a session has no calibration
pub const IDENTITY_ROTATION: [[f64; 3]; 3] = [
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
];

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_stationary(capture: &mut StationaryCapture, samples: usize) {
        // 50 Hz flat-and-level capture
        for i in 0..samples {
            capture.add_sample(i as Timestamp * 20, [0.0, 0.0, GRAVITY_MS2], [0.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn stationary_capture_is_excellent() {
        // Scenario: 3 s at 50 Hz, perfectly still
        let mut capture = StationaryCapture::new(50);
        feed_stationary(&mut capture, 150);

        let record = capture.score().expect("stationary capture must calibrate");
        assert_eq!(record.quality, CalibrationQuality::Excellent);
        assert!(record.reference_pitch_deg.abs() < 1e-9);
        assert!(record.reference_roll_deg.abs() < 1e-9);
        assert_eq!(record.sample_count, 150);
        assert_eq!(record.duration_ms, 149 * 20);
    }

    #[test]
    fn too_few_samples_yields_nothing() {
        let mut capture = StationaryCapture::new(50);
        feed_stationary(&mut capture, 10);
        assert_eq!(capture.quality(), CalibrationQuality::Unknown);
        assert!(capture.score().is_none());
    }

    #[test]
    fn shaky_capture_yields_nothing() {
        let mut capture = StationaryCapture::new(50);
        for i in 0..100 {
            // Alternate hard between two accel values: magnitude swings ~2 m/s²
            let z = if i % 2 == 0 { 8.5 } else { 11.0 };
            capture.add_sample(i * 20, [0.0, 0.0, z], [0.0, 0.0, 0.0]);
        }
        assert_eq!(capture.quality(), CalibrationQuality::Bad);
        assert!(capture.score().is_none());
    }

    #[test]
    fn tilted_capture_reports_reference_angles() {
        let mut capture = StationaryCapture::new(50);
        // Device rolled 30° right: gravity shows up on y and z
        let roll = 30.0_f64.to_radians();
        let accel = [0.0, GRAVITY_MS2 * roll.sin(), GRAVITY_MS2 * roll.cos()];
        for i in 0..100 {
            capture.add_sample(i * 20, accel, [0.0, 0.0, 0.0]);
        }

        let record = capture.score().unwrap();
        assert!((record.reference_roll_deg - 30.0).abs() < 1e-6);
        assert!(record.reference_pitch_deg.abs() < 1e-6);

        // Rotation maps measured gravity onto world vertical
        let world = record.rotate(accel);
        assert!(world[0].abs() < 1e-9);
        assert!(world[1].abs() < 1e-9);
        assert!((world[2] - GRAVITY_MS2).abs() < 1e-9);
    }

    #[test]
    fn gyro_bias_is_window_mean() {
        let mut capture = StationaryCapture::new(50);
        for i in 0..100 {
            capture.add_sample(i * 20, [0.0, 0.0, GRAVITY_MS2], [0.002, -0.001, 0.0005]);
        }
        let record = capture.score().unwrap();
        assert!((record.gyro_bias[0] - 0.002).abs() < 1e-12);
        assert!((record.gyro_bias[1] + 0.001).abs() < 1e-12);
    }

    #[test]
    fn quality_tokens_round_trip() {
        for q in [
            CalibrationQuality::Unknown,
            CalibrationQuality::Bad,
            CalibrationQuality::Poor,
            CalibrationQuality::Good,
            CalibrationQuality::Excellent,
        ] {
            assert_eq!(CalibrationQuality::from_token(q.name()), Some(q));
        }
        assert_eq!(CalibrationQuality::from_token("GREAT"), None);
    }
}
