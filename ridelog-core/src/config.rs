//! Processing Configuration
//!
//! All tunable thresholds live in one immutable struct passed into the
//! pipeline at invocation time. There is deliberately no process-wide
//! settings object: two sessions processed concurrently may use different
//! configurations without interfering.
//!
//! Defaults follow the conventions of the rest of this module: every
//! constant is named with its unit and documented with its rationale.
//! Thresholds were tuned against the first-order quaternion integration
//! and complementary-filter behavior in `fusion`; change them together.

/// Standard gravity in m/s²
pub const GRAVITY_MS2: f64 = 9.81;

/// Complementary filter gyro weight
///
/// High alpha favors the low-drift gyroscope over the noisy accelerometer
/// in the short term; the accelerometer still anchors the long-term mean.
pub const DEFAULT_FUSION_ALPHA: f64 = 0.98;

/// Largest dt accepted for gyro integration, in milliseconds
///
/// Above this the sample pair spans a data gap and integration is
/// rejected in favor of accelerometer-only angles.
pub const DEFAULT_MAX_INTEGRATION_GAP_MS: i64 = 500;

/// GPS fixes with worse accuracy than this (meters) are ignored
pub const DEFAULT_GPS_ACCURACY_CEILING_M: f64 = 20.0;

/// Largest dt accepted when finite-differencing GPS speed, in milliseconds
pub const DEFAULT_MAX_VELOCITY_GAP_MS: i64 = 5_000;

/// Accel-magnitude deviation from 1 g (in g) at which lean confidence hits zero
pub const DEFAULT_CONFIDENCE_DEVIATION_LIMIT_G: f64 = 0.5;

/// Activity window width for segment detection, in milliseconds
pub const DEFAULT_SEGMENT_WINDOW_MS: i64 = 5_000;

/// Windows on each side contributing to the moving ratio
pub const DEFAULT_SEGMENT_NEIGHBORHOOD: usize = 2;

/// Segments shorter than this are merged into their neighbor, in milliseconds
pub const DEFAULT_MIN_SEGMENT_MS: i64 = 10_000;

/// GPS speed above which a window counts as moving, in m/s
pub const DEFAULT_MOVING_SPEED_MS: f64 = 1.0;

/// IMU deviation from 1 g above which a window counts as moving, in m/s²
pub const DEFAULT_MOVING_ACCEL_DEVIATION_MS2: f64 = 1.5;

/// Moving ratio at or above which a window classifies as riding
pub const DEFAULT_RIDING_RATIO: f64 = 0.6;

/// Moving ratio at or below which a window classifies as stopped
pub const DEFAULT_STOP_RATIO: f64 = 0.2;

/// Hard acceleration threshold, m/s²
pub const DEFAULT_HARD_ACCEL_MS2: f64 = 3.5;

/// Hard braking threshold, m/s² (negative acceleration)
pub const DEFAULT_HARD_BRAKE_MS2: f64 = -4.0;

/// Sharp turn lean angle threshold, degrees
pub const DEFAULT_SHARP_TURN_DEG: f64 = 35.0;

/// Minimum fusion confidence for a lean sample to feed turn detection
pub const DEFAULT_TURN_CONFIDENCE_FLOOR: f64 = 0.5;

/// High-g threshold on total g-force, in g
pub const DEFAULT_HIGH_G: f64 = 1.3;

/// Sustained pitch threshold for a wheelie candidate, degrees
pub const DEFAULT_WHEELIE_PITCH_DEG: f64 = 20.0;

/// Minimum duration for accel/brake/turn/high-g events, milliseconds
pub const DEFAULT_MIN_EVENT_MS: i64 = 300;

/// Minimum duration for a wheelie event, milliseconds
///
/// Longer than the other events: brief pitch spikes from bumps are common.
pub const DEFAULT_MIN_WHEELIE_MS: i64 = 1_000;

/// Minimum elevation delta (meters) on the smoothed altitude series that
/// counts as real gain/loss rather than GPS noise
pub const DEFAULT_MIN_ELEVATION_DELTA_M: f64 = 1.0;

/// Samples between cooperative yield points in the pipeline
pub const DEFAULT_YIELD_INTERVAL: usize = 2_048;

/// Minimum samples for a calibration capture to be scored at all
pub const DEFAULT_MIN_CALIBRATION_SAMPLES: usize = 50;

/// Target point budget per exported time series
pub const DEFAULT_EXPORT_SERIES_POINTS: usize = 500;

/// Immutable configuration for one processing run
///
/// Construct with [`ProcessingConfig::default`] and adjust fields before
/// handing it to the pipeline; the pipeline never mutates it.
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Complementary filter gyro weight, [0, 1]
    pub fusion_alpha: f64,
    /// Largest dt accepted for gyro integration (ms)
    pub max_integration_gap_ms: i64,
    /// GPS accuracy ceiling (m)
    pub gps_accuracy_ceiling_m: f64,
    /// Largest dt for speed finite-differencing (ms)
    pub max_velocity_gap_ms: i64,
    /// Accel deviation from 1 g (g) where lean confidence reaches zero
    pub confidence_deviation_limit_g: f64,

    /// Activity window width (ms)
    pub segment_window_ms: i64,
    /// Windows per side in the moving-ratio neighborhood
    pub segment_neighborhood: usize,
    /// Minimum segment duration (ms)
    pub min_segment_ms: i64,
    /// GPS moving-speed threshold (m/s)
    pub moving_speed_ms: f64,
    /// IMU moving-deviation threshold (m/s²)
    pub moving_accel_deviation_ms2: f64,
    /// Moving ratio for riding classification
    pub riding_ratio: f64,
    /// Moving ratio for stop classification
    pub stop_ratio: f64,

    /// Hard acceleration threshold (m/s²)
    pub hard_accel_ms2: f64,
    /// Hard braking threshold (m/s², negative)
    pub hard_brake_ms2: f64,
    /// Sharp turn lean threshold (degrees)
    pub sharp_turn_deg: f64,
    /// Confidence floor for turn detection
    pub turn_confidence_floor: f64,
    /// High-g threshold (g)
    pub high_g: f64,
    /// Wheelie pitch threshold (degrees)
    pub wheelie_pitch_deg: f64,
    /// Minimum event duration (ms)
    pub min_event_ms: i64,
    /// Minimum wheelie duration (ms)
    pub min_wheelie_ms: i64,

    /// Minimum real elevation change on the smoothed series (m)
    pub min_elevation_delta_m: f64,
    /// Samples between cancellation/progress checks
    pub yield_interval: usize,
    /// Minimum samples for calibration scoring
    pub min_calibration_samples: usize,
    /// Point budget per exported series
    pub export_series_points: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            fusion_alpha: DEFAULT_FUSION_ALPHA,
            max_integration_gap_ms: DEFAULT_MAX_INTEGRATION_GAP_MS,
            gps_accuracy_ceiling_m: DEFAULT_GPS_ACCURACY_CEILING_M,
            max_velocity_gap_ms: DEFAULT_MAX_VELOCITY_GAP_MS,
            confidence_deviation_limit_g: DEFAULT_CONFIDENCE_DEVIATION_LIMIT_G,
            segment_window_ms: DEFAULT_SEGMENT_WINDOW_MS,
            segment_neighborhood: DEFAULT_SEGMENT_NEIGHBORHOOD,
            min_segment_ms: DEFAULT_MIN_SEGMENT_MS,
            moving_speed_ms: DEFAULT_MOVING_SPEED_MS,
            moving_accel_deviation_ms2: DEFAULT_MOVING_ACCEL_DEVIATION_MS2,
            riding_ratio: DEFAULT_RIDING_RATIO,
            stop_ratio: DEFAULT_STOP_RATIO,
            hard_accel_ms2: DEFAULT_HARD_ACCEL_MS2,
            hard_brake_ms2: DEFAULT_HARD_BRAKE_MS2,
            sharp_turn_deg: DEFAULT_SHARP_TURN_DEG,
            turn_confidence_floor: DEFAULT_TURN_CONFIDENCE_FLOOR,
            high_g: DEFAULT_HIGH_G,
            wheelie_pitch_deg: DEFAULT_WHEELIE_PITCH_DEG,
            min_event_ms: DEFAULT_MIN_EVENT_MS,
            min_wheelie_ms: DEFAULT_MIN_WHEELIE_MS,
            min_elevation_delta_m: DEFAULT_MIN_ELEVATION_DELTA_M,
            yield_interval: DEFAULT_YIELD_INTERVAL,
            min_calibration_samples: DEFAULT_MIN_CALIBRATION_SAMPLES,
            export_series_points: DEFAULT_EXPORT_SERIES_POINTS,
        }
    }
}
