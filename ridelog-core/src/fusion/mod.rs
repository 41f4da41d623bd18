//! Sensor Fusion and Derived Metrics
//!
//! ## Overview
//!
//! One pass over the parsed session turns raw sensor events into the
//! derived time series everything downstream consumes:
//!
//! - Lean angles via complementary filtering ([`lean`])
//! - Full orientation via quaternion integration ([`orientation`])
//! - G-force, world-frame acceleration and fused velocity ([`kinematics`])
//!
//! IMU samples are noise-filtered (per-axis chains, heavy logging preset)
//! before any fusion sees them. GPS is consumed unfiltered; its accuracy
//! gating happens in the velocity estimator.
//!
//! ## Cooperation
//!
//! [`derive_metrics`] calls the supplied tick callback once per input
//! sample. The pipeline uses it to check cancellation and report progress
//! at its configured interval; a tick returning an error aborts the pass
//! with no partial output.

pub mod kinematics;
pub mod lean;
pub mod orientation;

pub use kinematics::{acceleration_sample, estimate_velocity, gforce_sample};
pub use lean::{accel_confidence, LeanFusion};
pub use orientation::OrientationTracker;

use crate::calibration::CalibrationRecord;
use crate::config::ProcessingConfig;
use crate::errors::{ProcessingError, ProcessingResult};
use crate::events::{
    AccelerationSample, GForceSample, LeanAngleSample, OrientationSample, SensorEvent, SensorType,
    VelocitySample,
};
use crate::filters::{FilterChain, Vector3Filter};
use crate::parser::ParsedSession;
use crate::time::Timestamp;

/// Every time series derived from one session
#[derive(Debug, Default)]
pub struct DerivedMetrics {
    pub lean: Vec<LeanAngleSample>,
    pub gforce: Vec<GForceSample>,
    pub acceleration: Vec<AccelerationSample>,
    pub velocity: Vec<VelocitySample>,
    pub orientation: Vec<OrientationSample>,
    /// Non-fatal conditions observed during derivation
    pub errors: Vec<ProcessingError>,
}

/// Per-sample IMU processing state
///
/// Owns the noise filters and both fusion trackers; feed it IMU samples in
/// timestamp order.
pub struct DerivedMetricsCalculator {
    accel_filter: Vector3Filter,
    gyro_filter: Vector3Filter,
    lean: LeanFusion,
    orientation: OrientationTracker,
    calibration: Option<CalibrationRecord>,
}

impl DerivedMetricsCalculator {
    pub fn new(config: &ProcessingConfig, calibration: Option<&CalibrationRecord>) -> Self {
        Self {
            accel_filter: Vector3Filter::new(FilterChain::imu_logging),
            gyro_filter: Vector3Filter::new(FilterChain::imu_logging),
            lean: LeanFusion::new(config, calibration),
            orientation: OrientationTracker::new(config, calibration),
            calibration: calibration.cloned(),
        }
    }

    /// Process one IMU sample into all four IMU-derived series
    pub fn process_imu(
        &mut self,
        timestamp: Timestamp,
        accel: [f64; 3],
        gyro: [f64; 3],
    ) -> (
        LeanAngleSample,
        GForceSample,
        AccelerationSample,
        OrientationSample,
    ) {
        let accel = self.accel_filter.filter(accel, timestamp);
        let gyro = self.gyro_filter.filter(gyro, timestamp);
        (
            self.lean.update(timestamp, accel, gyro),
            gforce_sample(timestamp, accel, self.calibration.as_ref()),
            acceleration_sample(timestamp, accel, self.calibration.as_ref()),
            self.orientation.update(timestamp, gyro),
        )
    }

    pub fn reset(&mut self) {
        self.accel_filter.reset();
        self.gyro_filter.reset();
        self.lean.reset();
        self.orientation.reset();
    }
}

/// Derive all metric series from a parsed session
///
/// `tick` is invoked once per consumed sample; returning an error aborts
/// immediately and nothing derived so far is returned.
pub fn derive_metrics<F>(
    session: &ParsedSession,
    config: &ProcessingConfig,
    mut tick: F,
) -> ProcessingResult<DerivedMetrics>
where
    F: FnMut() -> ProcessingResult<()>,
{
    let mut calc = DerivedMetricsCalculator::new(config, session.calibration.as_ref());
    let imu = session.events_of(SensorType::Imu);
    let mut metrics = DerivedMetrics {
        lean: Vec::with_capacity(imu.len()),
        gforce: Vec::with_capacity(imu.len()),
        acceleration: Vec::with_capacity(imu.len()),
        ..DerivedMetrics::default()
    };
    // Surface the data-quality warning; the math falls back regardless
    if session.calibration.is_none() {
        metrics.errors.push(ProcessingError::MissingCalibration);
    }

    for event in imu {
        tick()?;
        if let SensorEvent::Imu {
            timestamp,
            accel,
            gyro,
        } = event
        {
            let (lean, gforce, acceleration, orientation) =
                calc.process_imu(*timestamp, *accel, *gyro);
            metrics.lean.push(lean);
            metrics.gforce.push(gforce);
            metrics.acceleration.push(acceleration);
            metrics.orientation.push(orientation);
        }
    }

    let gps = session.events_of(SensorType::Gps);
    for _ in gps {
        tick()?;
    }
    let (velocity, errors) = estimate_velocity(gps, &metrics.gforce, config);
    metrics.velocity = velocity;
    metrics.errors.extend(errors);

    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GRAVITY_MS2;
    use crate::errors::ProcessingError;
    use crate::parser::ParsedSession;

    fn session_with_imu(count: usize) -> ParsedSession {
        let mut session = ParsedSession::default();
        let events: Vec<SensorEvent> = (0..count)
            .map(|i| SensorEvent::Imu {
                timestamp: i as Timestamp * 20,
                accel: [0.0, 0.0, GRAVITY_MS2],
                gyro: [0.0; 3],
            })
            .collect();
        session.events.insert(SensorType::Imu, events);
        session
    }

    #[test]
    fn one_output_sample_per_imu_input() {
        let session = session_with_imu(100);
        let metrics =
            derive_metrics(&session, &ProcessingConfig::default(), || Ok(())).unwrap();
        assert_eq!(metrics.lean.len(), 100);
        assert_eq!(metrics.gforce.len(), 100);
        assert_eq!(metrics.acceleration.len(), 100);
        assert_eq!(metrics.orientation.len(), 100);
    }

    #[test]
    fn uncalibrated_session_records_a_warning() {
        let session = session_with_imu(10);
        let metrics =
            derive_metrics(&session, &ProcessingConfig::default(), || Ok(())).unwrap();
        assert!(matches!(
            metrics.errors.as_slice(),
            [ProcessingError::MissingCalibration]
        ));
    }

    #[test]
    fn calibrated_session_records_no_warning() {
        use crate::calibration::{CalibrationQuality, CalibrationRecord, IDENTITY_ROTATION};
        let mut session = session_with_imu(10);
        session.calibration = Some(CalibrationRecord {
            quality: CalibrationQuality::Good,
            reference_pitch_deg: 0.0,
            reference_roll_deg: 0.0,
            rotation: IDENTITY_ROTATION,
            gyro_bias: [0.0; 3],
            timestamp: 0,
            duration_ms: 3_000,
            sample_count: 150,
        });
        let metrics =
            derive_metrics(&session, &ProcessingConfig::default(), || Ok(())).unwrap();
        assert!(metrics.errors.is_empty());
    }

    #[test]
    fn tick_error_aborts_with_no_output() {
        let session = session_with_imu(100);
        let mut ticks = 0;
        let result = derive_metrics(&session, &ProcessingConfig::default(), || {
            ticks += 1;
            if ticks > 10 {
                Err(ProcessingError::Cancelled)
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(ProcessingError::Cancelled)));
    }

    #[test]
    fn stationary_session_derives_level_metrics() {
        let session = session_with_imu(200);
        let metrics =
            derive_metrics(&session, &ProcessingConfig::default(), || Ok(())).unwrap();
        let last_lean = metrics.lean.last().unwrap();
        assert!(last_lean.roll.abs() < 0.5);
        let last_gforce = metrics.gforce.last().unwrap();
        assert!(last_gforce.total < 0.05);
    }
}
