//! Time handling for session logs
//!
//! All timestamps in a session log come from the recording device's clock,
//! expressed in integer milliseconds. Within one session they are treated as
//! monotonic after sorting; raw rows may arrive out of order, so delta
//! helpers work on signed values and callers must handle non-positive
//! deltas as data gaps.

/// Timestamp in milliseconds on the device clock
pub type Timestamp = i64;

/// Milliseconds per second, for dt conversions
pub const MS_PER_SECOND: f64 = 1000.0;

/// Convert a timestamp delta to seconds
///
/// Returns a signed value; callers reject non-positive deltas where the
/// math requires a forward step (integration, finite differencing).
pub fn dt_seconds(earlier: Timestamp, later: Timestamp) -> f64 {
    (later - earlier) as f64 / MS_PER_SECOND
}

/// Check whether a delta between consecutive samples counts as a dropout
///
/// A gap larger than `max_gap_ms` means the sensor stopped reporting and
/// integration across it would be meaningless.
pub fn is_gap(earlier: Timestamp, later: Timestamp, max_gap_ms: i64) -> bool {
    later - earlier > max_gap_ms
}
