//! Error Types for Session Processing
//!
//! ## Design Philosophy
//!
//! The processing core distinguishes two severities:
//!
//! 1. **Fatal**: the whole session is unusable (unreadable file, unknown
//!    schema, zero valid rows, no usable timestamps, cancellation). These
//!    abort processing through `Result` and `?`.
//!
//! 2. **Recoverable**: a single row or sample is bad (malformed fields,
//!    implausible GPS fix, sensor dropout). These are *recorded* on the
//!    result object and processing continues, so callers can surface
//!    data-quality warnings without losing the rest of the ride.
//!
//! Numeric edge cases (non-positive dt, accuracy above the ceiling,
//! insufficient calibration samples) are not errors at all: the affected
//! stage falls back to a degraded-but-defined behavior instead.

use thiserror::Error;

use crate::time::Timestamp;

/// Result type for session processing operations
pub type ProcessingResult<T> = Result<T, ProcessingError>;

/// Errors raised while turning a session log into telemetry
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// Malformed row or unreadable content
    #[error("corrupted data: {reason}")]
    CorruptedData {
        reason: &'static str,
    },

    /// Every sensor list came out empty after parsing
    #[error("no valid sensor data in session log ({lines_processed} lines processed)")]
    NoValidData {
        lines_processed: usize,
    },

    /// No valid timestamps were observed, so the session has no time range
    #[error("no valid time range in session log")]
    InvalidTimeRange,

    /// Session carries no calibration block (downstream falls back to
    /// uncalibrated math; never fatal on its own)
    #[error("session is uncalibrated")]
    MissingCalibration,

    /// GPS fix with out-of-range coordinates or accuracy
    #[error("invalid GPS fix at {timestamp}: {reason}")]
    InvalidGps {
        timestamp: Timestamp,
        reason: &'static str,
    },

    /// Large time gap between consecutive samples of one sensor
    #[error("sensor dropout at {timestamp}: {gap_ms} ms gap")]
    SensorDropout {
        timestamp: Timestamp,
        gap_ms: i64,
    },

    /// Schema line did not match the expected column header
    #[error("unknown log format: {reason}")]
    UnknownFormat {
        reason: &'static str,
    },

    /// Caller requested cancellation at a yield point
    #[error("processing cancelled")]
    Cancelled,

    /// Underlying I/O failure while reading the log
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Ride summary failed to serialize
    #[error("export error: {0}")]
    Export(#[from] serde_json::Error),
}

/// A recoverable per-row problem, recorded while parsing continues
///
/// Carries the line number so callers can point users at the offending
/// part of the log.
#[derive(Debug)]
pub struct RowError {
    /// 1-based line number in the session log
    pub line: usize,
    /// What went wrong with this row
    pub error: ProcessingError,
}

impl RowError {
    pub fn new(line: usize, error: ProcessingError) -> Self {
        Self { line, error }
    }
}
