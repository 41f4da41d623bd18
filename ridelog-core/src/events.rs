//! Sensor Event Types for the Processing Pipeline
//!
//! ## Overview
//!
//! The session log is a sparse, self-describing format: every row carries a
//! timestamp, a sensor-type token, and only the columns that sensor uses.
//! This module models those rows as a tagged sum type so downstream stages
//! pattern-match exhaustively instead of downcasting.
//!
//! ## Design Notes
//!
//! - Events are immutable once parsed; each stage owns the events it is
//!   currently processing and nothing is shared mutably across sensor types.
//! - The enum carries full per-sensor payloads rather than a generic
//!   `value: f64`, because fusion needs all axes of a sample at once
//!   (roll/pitch need accel X/Y/Z together, not three separate readings).
//! - Derived sample types produced by fusion live here too: they are
//!   append-only time series, produced once per input sample and never
//!   mutated afterwards.

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Sensor type enumeration
///
/// Maps one-to-one onto the `sensor_type` token in the log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SensorType {
    Gps = 0,
    Imu = 1,
    Baro = 2,
    Mag = 3,
}

impl SensorType {
    /// All sensor types, in log-token order
    pub const ALL: [SensorType; 4] = [
        SensorType::Gps,
        SensorType::Imu,
        SensorType::Baro,
        SensorType::Mag,
    ];

    /// Get human-readable name (matches the log token)
    pub const fn name(&self) -> &'static str {
        match self {
            SensorType::Gps => "GPS",
            SensorType::Imu => "IMU",
            SensorType::Baro => "BARO",
            SensorType::Mag => "MAG",
        }
    }

    /// Number of data columns this sensor fills in a log row
    pub const fn column_count(&self) -> usize {
        match self {
            SensorType::Gps => 6,
            SensorType::Imu => 6,
            SensorType::Baro => 2,
            SensorType::Mag => 3,
        }
    }

    /// Parse a log token into a sensor type
    ///
    /// Unknown tokens return `None`; the parser skips such rows rather
    /// than failing the session.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "GPS" => Some(SensorType::Gps),
            "IMU" => Some(SensorType::Imu),
            "BARO" => Some(SensorType::Baro),
            "MAG" => Some(SensorType::Mag),
            _ => None,
        }
    }
}

/// One parsed row of the session log
///
/// Every variant carries the device-clock timestamp; payload fields follow
/// the fixed column semantics of the log format.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    /// GPS fix: position, speed over ground, bearing, reported accuracy
    Gps {
        timestamp: Timestamp,
        /// Latitude in degrees, [-90, 90]
        latitude: f64,
        /// Longitude in degrees, [-180, 180]
        longitude: f64,
        /// Altitude above sea level in meters
        altitude: f64,
        /// Speed over ground in m/s
        speed: f64,
        /// Bearing in degrees, [0, 360)
        bearing: f64,
        /// Horizontal accuracy estimate in meters (lower is better)
        accuracy: f64,
    },

    /// Inertial sample: 3-axis accelerometer + 3-axis gyroscope
    Imu {
        timestamp: Timestamp,
        /// Acceleration in m/s², device frame
        accel: [f64; 3],
        /// Angular rate in rad/s, device frame
        gyro: [f64; 3],
    },

    /// Barometric sample
    Baro {
        timestamp: Timestamp,
        /// Pressure-derived altitude in meters
        altitude: f64,
        /// Pressure in hPa
        pressure: f64,
    },

    /// Magnetometer sample: 3-axis field in µT, device frame
    Mag {
        timestamp: Timestamp,
        field: [f64; 3],
    },
}

impl SensorEvent {
    /// Get event timestamp
    pub fn timestamp(&self) -> Timestamp {
        match self {
            SensorEvent::Gps { timestamp, .. } => *timestamp,
            SensorEvent::Imu { timestamp, .. } => *timestamp,
            SensorEvent::Baro { timestamp, .. } => *timestamp,
            SensorEvent::Mag { timestamp, .. } => *timestamp,
        }
    }

    /// Get the sensor type tag for this event
    pub fn sensor_type(&self) -> SensorType {
        match self {
            SensorEvent::Gps { .. } => SensorType::Gps,
            SensorEvent::Imu { .. } => SensorType::Imu,
            SensorEvent::Baro { .. } => SensorType::Baro,
            SensorEvent::Mag { .. } => SensorType::Mag,
        }
    }
}

/// Fused roll/pitch estimate relative to the calibration reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeanAngleSample {
    pub timestamp: Timestamp,
    /// Roll in degrees, positive leaning right
    pub roll: f64,
    /// Pitch in degrees, positive nose up
    pub pitch: f64,
    /// Fusion confidence in [0, 1], from accelerometer magnitude proximity to 1 g
    pub confidence: f64,
}

/// World-frame acceleration in g units with gravity removed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GForceSample {
    pub timestamp: Timestamp,
    /// Along direction of travel, positive forward
    pub longitudinal: f64,
    /// Across direction of travel, positive right
    pub lateral: f64,
    /// Vertical, gravity removed
    pub vertical: f64,
    /// Magnitude of the three components
    pub total: f64,
}

/// World-frame raw acceleration, gravity included
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelerationSample {
    pub timestamp: Timestamp,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub magnitude: f64,
}

/// Which sensors produced a velocity sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VelocitySource {
    /// Straight from an accuracy-gated GPS fix
    GpsOnly,
    /// Propagated from IMU acceleration across a GPS dropout
    ImuOnly,
    /// GPS-anchored speed with an IMU-derived correction
    Fused,
}

/// Fused ground speed with finite-difference acceleration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocitySample {
    pub timestamp: Timestamp,
    /// Speed over ground in m/s
    pub speed: f64,
    /// Bearing in degrees
    pub bearing: f64,
    /// Rate of speed change in m/s², finite-differenced
    pub acceleration: f64,
    pub source: VelocitySource,
}

/// Gyro-integrated orientation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationSample {
    pub timestamp: Timestamp,
    /// Euler roll in degrees
    pub roll: f64,
    /// Euler pitch in degrees
    pub pitch: f64,
    /// Euler yaw in degrees
    pub yaw: f64,
    /// Unit quaternion [w, x, y, z]
    pub quaternion: [f64; 4],
}
