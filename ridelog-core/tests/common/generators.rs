//! Ride shape generators
//!
//! Each generator returns a complete session log as text, so consuming
//! tests exercise the parser along with whatever stage they target.

use super::{RideLogBuilder, GRAVITY};

/// A ride that cruises at `speed` m/s for `moving_s` seconds, brakes
/// gently over four seconds, then stands still for the rest of `total_s`.
/// GPS at 1 Hz, level stationary-grade IMU at 50 Hz.
pub fn moving_then_still(total_s: i64, moving_s: i64, speed: f64) -> String {
    let mut builder = RideLogBuilder::new().uncalibrated();
    let mut northing_m = 0.0;
    for s in 0..total_s {
        let ts = s * 1_000;
        let v = if s < moving_s {
            speed
        } else {
            // Ramp down over 4 s so the halt reads as gentle braking
            (speed - speed / 4.0 * (s - moving_s + 1) as f64).max(0.0)
        };
        northing_m += v;
        let lat = 37.0 + northing_m / 111_000.0;
        builder = builder.gps(ts, lat, -122.0, 100.0, v, 0.0, 3.0);
    }
    for i in 0..(total_s * 50) {
        builder = builder.imu(i * 20, [0.0, 0.0, GRAVITY], [0.0, 0.0, 0.0]);
    }
    builder.build()
}

/// A launch: stationary, then one 0.5 s GPS interval jumping to `to_speed`
pub fn launch_log(to_speed: f64) -> String {
    let mut builder = RideLogBuilder::new().uncalibrated();
    // 30 s idle so segmentation has context
    for s in 0..=30 {
        builder = builder.gps(s * 1_000, 37.0, -122.0, 100.0, 0.0, 0.0, 3.0);
    }
    builder = builder.gps(30_500, 37.0001, -122.0, 100.0, to_speed, 0.0, 3.0);
    // Cruise on afterwards
    for s in 31..60 {
        let lat = 37.0001 + (s as f64 - 30.0) * to_speed / 111_000.0;
        builder = builder.gps(s * 1_000, lat, -122.0, 100.0, to_speed, 0.0, 3.0);
    }
    builder.build()
}
