//! Common test utilities for integration tests
//!
//! Provides a session log builder plus generators for the recurring ride
//! shapes: stationary captures, steady cruising, launches and halts. The
//! generated logs go through the real text format so every test exercises
//! the parser as well as the stage under test.

#![allow(dead_code)]

pub mod generators;

use std::fmt::Write as _;

use ridelog_core::time::Timestamp;

/// The column header every generated log carries
pub const HEADER: &str = "timestamp,sensor_type,data1,data2,data3,data4,data5,data6";

/// A well-formed calibration block for an ideally-mounted device
pub const IDENTITY_CALIBRATION: &str = "quality=EXCELLENT ref_pitch=0.0 ref_roll=0.0 \
    rotation=1;0;0;0;1;0;0;0;1 gyro_bias=0;0;0 timestamp=0 duration_ms=3000 samples=150";

/// Line-by-line session log builder
pub struct RideLogBuilder {
    calibration: Option<String>,
    rows: Vec<String>,
}

impl RideLogBuilder {
    pub fn new() -> Self {
        Self {
            calibration: Some(IDENTITY_CALIBRATION.to_string()),
            rows: Vec::new(),
        }
    }

    /// Replace the calibration block body
    pub fn calibration(mut self, block: &str) -> Self {
        self.calibration = Some(block.to_string());
        self
    }

    /// Mark the log explicitly uncalibrated
    pub fn uncalibrated(mut self) -> Self {
        self.calibration = Some("none".to_string());
        self
    }

    /// Omit the calibration comment entirely
    pub fn no_calibration_comment(mut self) -> Self {
        self.calibration = None;
        self
    }

    pub fn gps(
        mut self,
        ts: Timestamp,
        lat: f64,
        lon: f64,
        alt: f64,
        speed: f64,
        bearing: f64,
        accuracy: f64,
    ) -> Self {
        self.rows
            .push(format!("{ts},GPS,{lat},{lon},{alt},{speed},{bearing},{accuracy}"));
        self
    }

    pub fn imu(mut self, ts: Timestamp, accel: [f64; 3], gyro: [f64; 3]) -> Self {
        self.rows.push(format!(
            "{ts},IMU,{},{},{},{},{},{}",
            accel[0], accel[1], accel[2], gyro[0], gyro[1], gyro[2]
        ));
        self
    }

    pub fn baro(mut self, ts: Timestamp, altitude: f64, pressure: f64) -> Self {
        self.rows.push(format!("{ts},BARO,{altitude},{pressure}"));
        self
    }

    pub fn mag(mut self, ts: Timestamp, field: [f64; 3]) -> Self {
        self.rows
            .push(format!("{ts},MAG,{},{},{}", field[0], field[1], field[2]));
        self
    }

    /// Append a raw line verbatim, for malformed-row cases
    pub fn raw(mut self, line: &str) -> Self {
        self.rows.push(line.to_string());
        self
    }

    pub fn build(self) -> String {
        let mut log = String::from("# ridelog session v1\n");
        if let Some(block) = self.calibration {
            writeln!(log, "# calibration: {block}").unwrap();
        }
        log.push_str(HEADER);
        log.push('\n');
        for row in self.rows {
            log.push_str(&row);
            log.push('\n');
        }
        log
    }
}

/// Standard gravity, matching the processing constants
pub const GRAVITY: f64 = 9.81;
