//! Session Log Parser
//!
//! ## Overview
//!
//! Parses the sparse, self-describing session log into typed, per-sensor,
//! timestamp-sorted event sequences plus an optional calibration record.
//!
//! ## Format
//!
//! ```text
//! # ridelog session v1
//! # calibration: quality=EXCELLENT ref_pitch=1.20 ref_roll=-0.45 \
//! #              rotation=1;0;0;0;1;0;0;0;1 gyro_bias=0.001;0.0;0.0 \
//! #              timestamp=1000 duration_ms=3000 samples=150
//! timestamp,sensor_type,data1,data2,data3,data4,data5,data6
//! 1000,GPS,37.0,-122.0,10.0,5.0,90.0,3.0
//! 1020,IMU,0.1,0.0,9.81,0.0,0.0,0.01
//! 1040,BARO,12.5,1012.3,,,,
//! 1060,MAG,22.1,-4.0,43.2,,,
//! ```
//!
//! Comment lines (`#`) precede the data; at most one carries a calibration
//! block (written on a single comment line in real logs; the layout above
//! is wrapped for readability). The fixed column-header line marks the
//! header/data boundary; everything after it is data rows.
//!
//! ## Error Policy
//!
//! Bad rows are recorded and dropped, never fatal: unknown sensor tokens,
//! short rows, unparseable numbers and implausible GPS fixes all skip the
//! row and keep going. The whole session fails only when it ends with zero
//! valid rows, no usable time range, or a schema line that is not the
//! expected header.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, warn};

use crate::calibration::{CalibrationQuality, CalibrationRecord};
use crate::errors::{ProcessingError, ProcessingResult, RowError};
use crate::events::{SensorEvent, SensorType};
use crate::time::Timestamp;

/// The one schema line this parser accepts
pub const HEADER_LINE: &str = "timestamp,sensor_type,data1,data2,data3,data4,data5,data6";

/// Comment prefix carrying the calibration block
const CALIBRATION_PREFIX: &str = "calibration:";

/// Lines between progress callbacks
const PROGRESS_INTERVAL: usize = 4_096;

/// Counters accumulated while parsing one log
#[derive(Debug, Default, Clone)]
pub struct ParserStats {
    /// Total lines processed, including comments and the header
    pub lines_processed: usize,
    /// Comment lines seen before the header
    pub comment_lines: usize,
    /// Valid rows decoded per sensor type
    pub rows_decoded: [usize; 4],
    /// Rows dropped for any reason
    pub rows_skipped: usize,
}

impl ParserStats {
    /// Total valid rows across all sensor types
    pub fn total_rows(&self) -> usize {
        self.rows_decoded.iter().sum()
    }
}

/// Everything the parser extracts from one session log
#[derive(Debug, Default)]
pub struct ParsedSession {
    /// Per-sensor event lists, each sorted by timestamp ascending
    pub events: HashMap<SensorType, Vec<SensorEvent>>,
    /// Calibration record, absent for uncalibrated sessions
    pub calibration: Option<CalibrationRecord>,
    /// Earliest timestamp observed across all sensors
    pub start: Timestamp,
    /// Latest timestamp observed across all sensors
    pub end: Timestamp,
    /// Recoverable per-row problems, in line order
    pub row_errors: Vec<RowError>,
    /// Parse counters
    pub stats: ParserStats,
}

impl ParsedSession {
    /// Events of one sensor type, empty slice if the log had none
    pub fn events_of(&self, sensor: SensorType) -> &[SensorEvent] {
        self.events.get(&sensor).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Session length in milliseconds
    pub fn duration_ms(&self) -> i64 {
        self.end - self.start
    }
}

/// Session log parser
///
/// Reads line-by-line from any `BufRead`; file-system locking against a
/// live writer is the caller's responsibility.
pub struct SessionLogParser<'a> {
    progress: Option<Box<dyn FnMut(usize) -> ProcessingResult<()> + 'a>>,
}

impl<'a> SessionLogParser<'a> {
    pub fn new() -> Self {
        Self { progress: None }
    }

    /// Report line counts periodically while parsing large files
    ///
    /// The callback is a yield point: returning an error aborts the parse
    /// immediately, so a caller can cancel mid-file.
    pub fn with_progress(
        mut self,
        callback: impl FnMut(usize) -> ProcessingResult<()> + 'a,
    ) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Parse a session log from a file path
    pub fn parse_file(self, path: impl AsRef<Path>) -> ProcessingResult<ParsedSession> {
        let file = File::open(path)?;
        self.parse(BufReader::new(file))
    }

    /// Parse a session log from any buffered reader
    pub fn parse(mut self, reader: impl BufRead) -> ProcessingResult<ParsedSession> {
        let mut events: HashMap<SensorType, Vec<SensorEvent>> = HashMap::new();
        let mut calibration: Option<CalibrationRecord> = None;
        let mut calibration_seen = false;
        let mut row_errors = Vec::new();
        let mut stats = ParserStats::default();
        let mut header_seen = false;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            stats.lines_processed += 1;

            if stats.lines_processed % PROGRESS_INTERVAL == 0 {
                if let Some(progress) = self.progress.as_mut() {
                    progress(stats.lines_processed)?;
                }
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if !header_seen {
                if let Some(comment) = trimmed.strip_prefix('#') {
                    stats.comment_lines += 1;
                    // Only the first calibration block is honored
                    if !calibration_seen {
                        let body = comment.trim_start();
                        if let Some(block) = body.strip_prefix(CALIBRATION_PREFIX) {
                            calibration_seen = true;
                            match parse_calibration_block(block.trim()) {
                                Ok(record) => calibration = record,
                                Err(error) => {
                                    warn!("line {line_no}: discarding calibration block: {error}");
                                    row_errors.push(RowError::new(line_no, error));
                                }
                            }
                        }
                    }
                    continue;
                }

                if trimmed == HEADER_LINE {
                    header_seen = true;
                    continue;
                }

                return Err(ProcessingError::UnknownFormat {
                    reason: "expected column header line before data rows",
                });
            }

            // Comments after the header are tolerated and ignored
            if trimmed.starts_with('#') {
                continue;
            }

            match parse_row(trimmed) {
                Ok(event) => {
                    stats.rows_decoded[event.sensor_type() as usize] += 1;
                    events.entry(event.sensor_type()).or_default().push(event);
                }
                Err(RowOutcome::Skip) => {
                    stats.rows_skipped += 1;
                }
                Err(RowOutcome::Record(error)) => {
                    stats.rows_skipped += 1;
                    row_errors.push(RowError::new(line_no, error));
                }
            }
        }

        if !header_seen {
            return Err(ProcessingError::UnknownFormat {
                reason: "session log contains no column header line",
            });
        }
        if events.values().all(Vec::is_empty) {
            return Err(ProcessingError::NoValidData {
                lines_processed: stats.lines_processed,
            });
        }

        for list in events.values_mut() {
            list.sort_by_key(SensorEvent::timestamp);
        }

        let start = events
            .values()
            .filter_map(|list| list.first())
            .map(SensorEvent::timestamp)
            .min()
            .ok_or(ProcessingError::InvalidTimeRange)?;
        let end = events
            .values()
            .filter_map(|list| list.last())
            .map(SensorEvent::timestamp)
            .max()
            .ok_or(ProcessingError::InvalidTimeRange)?;

        debug!(
            "parsed session: {} rows, {} skipped, {} ms span, calibration: {}",
            stats.total_rows(),
            stats.rows_skipped,
            end - start,
            calibration.is_some(),
        );

        Ok(ParsedSession {
            events,
            calibration,
            start,
            end,
            row_errors,
            stats,
        })
    }
}

impl Default for SessionLogParser<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a data row produced no event
enum RowOutcome {
    /// Unknown sensor token: silently skipped by contract
    Skip,
    /// Malformed row: skipped and recorded
    Record(ProcessingError),
}

/// Decode one data row into a sensor event
fn parse_row(line: &str) -> Result<SensorEvent, RowOutcome> {
    let mut fields = line.split(',').map(str::trim);

    let timestamp = fields
        .next()
        .and_then(|f| f.parse::<Timestamp>().ok())
        .filter(|ts| *ts >= 0)
        .ok_or(RowOutcome::Record(ProcessingError::CorruptedData {
            reason: "invalid timestamp field",
        }))?;

    let sensor = match fields.next() {
        Some(token) => match SensorType::from_token(token) {
            Some(sensor) => sensor,
            None => return Err(RowOutcome::Skip),
        },
        None => {
            return Err(RowOutcome::Record(ProcessingError::CorruptedData {
                reason: "row has no sensor type field",
            }))
        }
    };

    // Collect exactly the columns this sensor uses; trailing columns may be
    // omitted entirely or left empty in the sparse format.
    let mut data = [0.0_f64; 6];
    for slot in data.iter_mut().take(sensor.column_count()) {
        let field = fields.next().ok_or(RowOutcome::Record(
            ProcessingError::CorruptedData {
                reason: "row has too few data fields for its sensor type",
            },
        ))?;
        *slot = field
            .parse::<f64>()
            .map_err(|_| RowOutcome::Record(ProcessingError::CorruptedData {
                reason: "non-numeric data field",
            }))?;
        if !slot.is_finite() {
            return Err(RowOutcome::Record(ProcessingError::CorruptedData {
                reason: "non-finite data field",
            }));
        }
    }

    let event = match sensor {
        SensorType::Gps => {
            let event = SensorEvent::Gps {
                timestamp,
                latitude: data[0],
                longitude: data[1],
                altitude: data[2],
                speed: data[3],
                bearing: data[4],
                accuracy: data[5],
            };
            validate_gps(&event)?;
            event
        }
        SensorType::Imu => SensorEvent::Imu {
            timestamp,
            accel: [data[0], data[1], data[2]],
            gyro: [data[3], data[4], data[5]],
        },
        SensorType::Baro => SensorEvent::Baro {
            timestamp,
            altitude: data[0],
            pressure: data[1],
        },
        SensorType::Mag => SensorEvent::Mag {
            timestamp,
            field: [data[0], data[1], data[2]],
        },
    };
    Ok(event)
}

/// Reject physically impossible GPS fixes
fn validate_gps(event: &SensorEvent) -> Result<(), RowOutcome> {
    if let SensorEvent::Gps {
        timestamp,
        latitude,
        longitude,
        accuracy,
        ..
    } = event
    {
        let reason = if !(-90.0..=90.0).contains(latitude) {
            Some("latitude out of range")
        } else if !(-180.0..=180.0).contains(longitude) {
            Some("longitude out of range")
        } else if *accuracy < 0.0 {
            Some("negative accuracy")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(RowOutcome::Record(ProcessingError::InvalidGps {
                timestamp: *timestamp,
                reason,
            }));
        }
    }
    Ok(())
}

/// Parse the `# calibration: ...` block body
///
/// `none` is the explicit uncalibrated marker. Otherwise every key must be
/// present and well-formed or the whole block is discarded (all-or-nothing).
fn parse_calibration_block(body: &str) -> Result<Option<CalibrationRecord>, ProcessingError> {
    if body == "none" {
        return Ok(None);
    }

    let mut quality = None;
    let mut ref_pitch = None;
    let mut ref_roll = None;
    let mut rotation = None;
    let mut gyro_bias = None;
    let mut timestamp = None;
    let mut duration_ms = None;
    let mut samples = None;

    for pair in body.split_whitespace() {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(ProcessingError::CorruptedData {
                reason: "calibration block entry is not key=value",
            });
        };
        match key {
            "quality" => quality = CalibrationQuality::from_token(value),
            "ref_pitch" => ref_pitch = value.parse::<f64>().ok(),
            "ref_roll" => ref_roll = value.parse::<f64>().ok(),
            "rotation" => rotation = parse_matrix(value),
            "gyro_bias" => gyro_bias = parse_vector3(value),
            "timestamp" => timestamp = value.parse::<Timestamp>().ok(),
            "duration_ms" => duration_ms = value.parse::<i64>().ok(),
            "samples" => samples = value.parse::<usize>().ok(),
            _ => {
                // Unknown keys are tolerated for forward compatibility
            }
        }
    }

    match (
        quality, ref_pitch, ref_roll, rotation, gyro_bias, timestamp, duration_ms, samples,
    ) {
        (
            Some(quality),
            Some(reference_pitch_deg),
            Some(reference_roll_deg),
            Some(rotation),
            Some(gyro_bias),
            Some(timestamp),
            Some(duration_ms),
            Some(sample_count),
        ) => Ok(Some(CalibrationRecord {
            quality,
            reference_pitch_deg,
            reference_roll_deg,
            rotation,
            gyro_bias,
            timestamp,
            duration_ms,
            sample_count,
        })),
        _ => Err(ProcessingError::CorruptedData {
            reason: "calibration block is missing required fields",
        }),
    }
}

/// Parse nine `;`-separated values into a row-major 3×3 matrix
fn parse_matrix(value: &str) -> Option<[[f64; 3]; 3]> {
    let mut values = [0.0_f64; 9];
    let mut count = 0;
    for (slot, field) in values.iter_mut().zip(value.split(';')) {
        *slot = field.parse().ok()?;
        count += 1;
    }
    if count != 9 || value.split(';').count() != 9 {
        return None;
    }
    Some([
        [values[0], values[1], values[2]],
        [values[3], values[4], values[5]],
        [values[6], values[7], values[8]],
    ])
}

/// Parse three `;`-separated values
fn parse_vector3(value: &str) -> Option<[f64; 3]> {
    let mut values = [0.0_f64; 3];
    let mut count = 0;
    for (slot, field) in values.iter_mut().zip(value.split(';')) {
        *slot = field.parse().ok()?;
        count += 1;
    }
    if count != 3 || value.split(';').count() != 3 {
        return None;
    }
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const CALIBRATED_HEADER: &str = "# ridelog session v1\n\
        # calibration: quality=GOOD ref_pitch=1.5 ref_roll=-0.5 rotation=1;0;0;0;1;0;0;0;1 gyro_bias=0;0;0 timestamp=900 duration_ms=3000 samples=150\n\
        timestamp,sensor_type,data1,data2,data3,data4,data5,data6\n";

    fn parse_str(log: &str) -> ProcessingResult<ParsedSession> {
        SessionLogParser::new().parse(Cursor::new(log.as_bytes()))
    }

    #[test]
    fn gps_row_parses_field_for_field() {
        let log = format!("{CALIBRATED_HEADER}1000,GPS,37.0,-122.0,10.0,5.0,90.0,3.0\n");
        let session = parse_str(&log).unwrap();

        let gps = session.events_of(SensorType::Gps);
        assert_eq!(gps.len(), 1);
        match gps[0] {
            SensorEvent::Gps {
                timestamp,
                latitude,
                longitude,
                altitude,
                speed,
                bearing,
                accuracy,
            } => {
                assert_eq!(timestamp, 1000);
                assert_eq!(latitude, 37.0);
                assert_eq!(longitude, -122.0);
                assert_eq!(altitude, 10.0);
                assert_eq!(speed, 5.0);
                assert_eq!(bearing, 90.0);
                assert_eq!(accuracy, 3.0);
            }
            _ => panic!("expected GPS event"),
        }
    }

    #[test]
    fn sparse_trailing_fields_accepted() {
        let log = format!(
            "{CALIBRATED_HEADER}1000,BARO,12.5,1012.3,,,,\n1020,BARO,12.6,1012.2\n1040,MAG,22.0,-4.0,43.0\n"
        );
        let session = parse_str(&log).unwrap();
        assert_eq!(session.events_of(SensorType::Baro).len(), 2);
        assert_eq!(session.events_of(SensorType::Mag).len(), 1);
    }

    #[test]
    fn unknown_sensor_token_skipped_silently() {
        let log = format!("{CALIBRATED_HEADER}1000,IMU,0,0,9.81,0,0,0\n1020,LIDAR,1,2,3,4,5,6\n");
        let session = parse_str(&log).unwrap();
        assert_eq!(session.stats.rows_skipped, 1);
        assert!(session.row_errors.is_empty());
        assert_eq!(session.events_of(SensorType::Imu).len(), 1);
    }

    #[test]
    fn short_row_recorded_not_fatal() {
        // Scenario: a row with only 2 comma-separated fields is skipped
        let log = format!("{CALIBRATED_HEADER}1000,IMU\n1020,IMU,0,0,9.81,0,0,0\n");
        let session = parse_str(&log).unwrap();
        assert_eq!(session.events_of(SensorType::Imu).len(), 1);
        assert_eq!(session.row_errors.len(), 1);
        assert!(matches!(
            session.row_errors[0].error,
            ProcessingError::CorruptedData { .. }
        ));
    }

    #[test]
    fn zero_valid_rows_is_fatal() {
        let log = format!("{CALIBRATED_HEADER}1000,LIDAR,1,2,3,4,5,6\n");
        assert!(matches!(
            parse_str(&log),
            Err(ProcessingError::NoValidData { .. })
        ));
    }

    #[test]
    fn missing_header_is_unknown_format() {
        let result = parse_str("1000,IMU,0,0,9.81,0,0,0\n");
        assert!(matches!(
            result,
            Err(ProcessingError::UnknownFormat { .. })
        ));
    }

    #[test]
    fn events_sorted_by_timestamp() {
        let log = format!(
            "{CALIBRATED_HEADER}3000,IMU,0,0,9.81,0,0,0\n1000,IMU,0,0,9.81,0,0,0\n2000,IMU,0,0,9.81,0,0,0\n"
        );
        let session = parse_str(&log).unwrap();
        let timestamps: Vec<_> = session
            .events_of(SensorType::Imu)
            .iter()
            .map(SensorEvent::timestamp)
            .collect();
        assert_eq!(timestamps, vec![1000, 2000, 3000]);
        assert_eq!(session.start, 1000);
        assert_eq!(session.end, 3000);
    }

    #[test]
    fn calibration_block_parsed_once_and_fully() {
        let log = format!("{CALIBRATED_HEADER}1000,IMU,0,0,9.81,0,0,0\n");
        let session = parse_str(&log).unwrap();
        let cal = session.calibration.expect("calibrated session");
        assert_eq!(cal.quality, CalibrationQuality::Good);
        assert_eq!(cal.reference_pitch_deg, 1.5);
        assert_eq!(cal.rotation[0][0], 1.0);
        assert_eq!(cal.sample_count, 150);
    }

    #[test]
    fn incomplete_calibration_block_discarded_whole() {
        // rotation missing: no partial record may surface
        let log = "# calibration: quality=GOOD ref_pitch=1.5 ref_roll=-0.5 timestamp=900 duration_ms=3000 samples=150\n\
            timestamp,sensor_type,data1,data2,data3,data4,data5,data6\n\
            1000,IMU,0,0,9.81,0,0,0\n";
        let session = parse_str(log).unwrap();
        assert!(session.calibration.is_none());
        assert_eq!(session.row_errors.len(), 1);
    }

    #[test]
    fn explicit_uncalibrated_marker() {
        let log = "# calibration: none\n\
            timestamp,sensor_type,data1,data2,data3,data4,data5,data6\n\
            1000,IMU,0,0,9.81,0,0,0\n";
        let session = parse_str(log).unwrap();
        assert!(session.calibration.is_none());
        assert!(session.row_errors.is_empty());
    }

    #[test]
    fn progress_error_aborts_mid_file() {
        let mut log = String::from(CALIBRATED_HEADER);
        for i in 0..20_000_i64 {
            log.push_str(&format!("{},IMU,0,0,9.81,0,0,0\n", i * 20));
        }
        let mut calls = 0;
        let result = SessionLogParser::new()
            .with_progress(|_lines| {
                calls += 1;
                Err(ProcessingError::Cancelled)
            })
            .parse(Cursor::new(log));
        assert!(matches!(result, Err(ProcessingError::Cancelled)));
        // The first yield point aborted the parse; no further callbacks
        assert_eq!(calls, 1);
    }

    #[test]
    fn out_of_range_gps_recorded() {
        let log = format!(
            "{CALIBRATED_HEADER}1000,GPS,95.0,-122.0,10.0,5.0,90.0,3.0\n1020,IMU,0,0,9.81,0,0,0\n"
        );
        let session = parse_str(&log).unwrap();
        assert!(session.events_of(SensorType::Gps).is_empty());
        assert!(matches!(
            session.row_errors[0].error,
            ProcessingError::InvalidGps { .. }
        ));
    }
}
