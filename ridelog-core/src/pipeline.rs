//! Session Processing Pipeline
//!
//! ## Overview
//!
//! [`SessionProcessor`] runs the whole batch flow over one session log:
//!
//! ```text
//! parse -> filter + fuse -> segment -> statistics + events
//! ```
//!
//! ## Cooperation
//!
//! Processing is CPU-bound but must not monopolize its thread: every
//! `yield_interval` samples the processor checks the cancel flag, reports
//! progress, and yields the thread. Cancellation is all-or-nothing; a
//! cancelled run returns [`ProcessingError::Cancelled`] and no partial
//! output ever escapes.
//!
//! The processor is cheap to construct and single-use per session; build
//! one per log with the configuration for that run.

use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;

use crate::calibration::CalibrationRecord;
use crate::config::ProcessingConfig;
use crate::detect::{detect_events, DetectedEvent};
use crate::errors::{ProcessingError, ProcessingResult, RowError};
use crate::fusion::{derive_metrics, DerivedMetrics};
use crate::parser::{ParsedSession, ParserStats, SessionLogParser};
use crate::segments::{detect_segments, RideSegment};
use crate::stats::{compute_statistics, RideStatistics};
use crate::time::Timestamp;

/// Shared flag observed at every yield point
pub type CancelFlag = Arc<AtomicBool>;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parsing,
    Deriving,
    Segmenting,
    Summarizing,
}

impl Stage {
    pub const fn name(&self) -> &'static str {
        match self {
            Stage::Parsing => "parsing",
            Stage::Deriving => "deriving",
            Stage::Segmenting => "segmenting",
            Stage::Summarizing => "summarizing",
        }
    }
}

/// One progress report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub stage: Stage,
    /// Completion within the stage, [0, 1]; parsing reports line counts
    /// with unknown totals and stays at 0
    pub fraction: f64,
}

/// Everything one processing run produces
#[derive(Debug)]
pub struct ProcessingOutput {
    /// Earliest timestamp in the session, device clock, ms
    pub start: Timestamp,
    /// Latest timestamp in the session, device clock, ms
    pub end: Timestamp,
    pub statistics: RideStatistics,
    pub metrics: DerivedMetrics,
    pub segments: Vec<RideSegment>,
    pub events: Vec<DetectedEvent>,
    /// Calibration the session was processed with, if any
    pub calibration: Option<CalibrationRecord>,
    /// Recoverable per-row parse problems
    pub row_errors: Vec<RowError>,
    pub parser_stats: ParserStats,
}

/// Batch processor for one session log
pub struct SessionProcessor<'a> {
    config: ProcessingConfig,
    cancel: Option<CancelFlag>,
    progress: Option<Box<dyn FnMut(Progress) + 'a>>,
}

impl<'a> SessionProcessor<'a> {
    pub fn new(config: ProcessingConfig) -> Self {
        Self {
            config,
            cancel: None,
            progress: None,
        }
    }

    /// Observe this flag at every yield point; setting it aborts the run
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Receive progress reports at every yield point
    pub fn with_progress(mut self, callback: impl FnMut(Progress) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Process a session log file end to end
    pub fn process_file(self, path: impl AsRef<Path>) -> ProcessingResult<ProcessingOutput> {
        let file = std::fs::File::open(path)?;
        self.process(std::io::BufReader::new(file))
    }

    /// Process a session log from any buffered reader
    pub fn process(mut self, reader: impl BufRead) -> ProcessingResult<ProcessingOutput> {
        let cancel = self.cancel.clone();
        let mut progress = self.progress.take();

        let parser = SessionLogParser::new().with_progress(|_lines| {
            if is_cancelled(&cancel) {
                return Err(ProcessingError::Cancelled);
            }
            if let Some(progress) = progress.as_mut() {
                progress(Progress {
                    stage: Stage::Parsing,
                    fraction: 0.0,
                });
            }
            Ok(())
        });
        let session = parser.parse(reader)?;
        if is_cancelled(&cancel) {
            return Err(ProcessingError::Cancelled);
        }

        self.progress = progress;
        self.process_session(session)
    }

    /// Run the post-parse stages over an already-parsed session
    pub fn process_session(mut self, session: ParsedSession) -> ProcessingResult<ProcessingOutput> {
        let total_samples: usize = session.events.values().map(Vec::len).sum();
        info!(
            "processing session: {} samples over {} ms, calibration: {}",
            total_samples,
            session.duration_ms(),
            session.calibration.is_some(),
        );

        let cancel = self.cancel.clone();
        let mut progress = self.progress.take();
        let yield_interval = self.config.yield_interval.max(1);
        let mut processed = 0usize;

        let metrics = derive_metrics(&session, &self.config, || {
            processed += 1;
            if processed % yield_interval == 0 {
                if is_cancelled(&cancel) {
                    return Err(ProcessingError::Cancelled);
                }
                if let Some(progress) = progress.as_mut() {
                    progress(Progress {
                        stage: Stage::Deriving,
                        fraction: processed as f64 / total_samples.max(1) as f64,
                    });
                }
                std::thread::yield_now();
            }
            Ok(())
        })?;

        if is_cancelled(&cancel) {
            return Err(ProcessingError::Cancelled);
        }
        report(&mut progress, Stage::Segmenting);
        let segments = detect_segments(&session, &metrics, &self.config);

        if is_cancelled(&cancel) {
            return Err(ProcessingError::Cancelled);
        }
        report(&mut progress, Stage::Summarizing);
        let statistics = compute_statistics(&session, &metrics, &segments, &self.config);
        let events = detect_events(&metrics, &self.config);

        info!(
            "session processed: {} segments, {} events, {:.0} m ridden",
            segments.len(),
            events.len(),
            statistics.total_distance_m,
        );

        let ParsedSession {
            calibration,
            row_errors,
            stats: parser_stats,
            start,
            end,
            ..
        } = session;
        Ok(ProcessingOutput {
            start,
            end,
            statistics,
            metrics,
            segments,
            events,
            calibration,
            row_errors,
            parser_stats,
        })
    }
}

fn is_cancelled(flag: &Option<CancelFlag>) -> bool {
    flag.as_ref()
        .is_some_and(|f| f.load(Ordering::Relaxed))
}

fn report(progress: &mut Option<Box<dyn FnMut(Progress) + '_>>, stage: Stage) {
    if let Some(progress) = progress.as_mut() {
        progress(Progress {
            stage,
            fraction: 0.0,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;
    use std::io::Cursor;

    /// 100 s ride: 60 s at speed then 40 s stationary, IMU at 50 Hz
    fn ride_log() -> String {
        let mut log = String::from(
            "# ridelog session v1\n# calibration: none\n\
             timestamp,sensor_type,data1,data2,data3,data4,data5,data6\n",
        );
        for s in 0..100 {
            let ts = s * 1_000;
            let speed = if s < 60 { 12.0 } else { 0.0 };
            let lat = 37.0 + s as f64 * 1e-4;
            writeln!(log, "{ts},GPS,{lat:.6},-122.000000,100.0,{speed},0.0,3.0").unwrap();
        }
        for i in 0..5_000 {
            let ts = i * 20;
            writeln!(log, "{ts},IMU,0.0,0.0,9.81,0.0,0.0,0.0").unwrap();
        }
        log
    }

    #[test]
    fn full_run_produces_consistent_output() {
        let output = SessionProcessor::new(ProcessingConfig::default())
            .process(Cursor::new(ride_log()))
            .unwrap();

        assert_eq!(output.statistics.total_duration_ms, 99_980);
        assert_eq!(output.start, 0);
        assert_eq!(output.end, 99_980);
        assert_eq!(output.segments.len(), 2);
        assert!(output.statistics.riding_duration_ms > 0);
        assert!(output.statistics.total_distance_m > 0.0);
        assert_eq!(output.metrics.lean.len(), 5_000);
        assert!(output.calibration.is_none());
        assert_eq!(output.parser_stats.total_rows(), 5_100);
    }

    #[test]
    fn cancellation_returns_no_partial_output() {
        let flag: CancelFlag = Arc::new(AtomicBool::new(true));
        let result = SessionProcessor::new(ProcessingConfig::default())
            .with_cancel_flag(flag)
            .process(Cursor::new(ride_log()));
        assert!(matches!(result, Err(ProcessingError::Cancelled)));
    }

    #[test]
    fn cancellation_mid_parse_stops_reading() {
        use std::sync::atomic::AtomicUsize;

        // Enough lines for several parse-stage yield points
        let mut log = String::from(
            "timestamp,sensor_type,data1,data2,data3,data4,data5,data6\n",
        );
        for i in 0..40_000_i64 {
            writeln!(log, "{},IMU,0.0,0.0,9.81,0.0,0.0,0.0", i * 20).unwrap();
        }

        let flag: CancelFlag = Arc::new(AtomicBool::new(false));
        let trip = Arc::clone(&flag);
        let reports = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&reports);
        let result = SessionProcessor::new(ProcessingConfig::default())
            .with_cancel_flag(flag)
            .with_progress(move |p| {
                if p.stage == Stage::Parsing {
                    seen.fetch_add(1, Ordering::Relaxed);
                    trip.store(true, Ordering::Relaxed);
                }
            })
            .process(Cursor::new(log));

        assert!(matches!(result, Err(ProcessingError::Cancelled)));
        // The flag was set during the first report; the very next yield
        // point must abort instead of reading the rest of the file
        assert_eq!(reports.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn cancellation_mid_derivation() {
        let flag: CancelFlag = Arc::new(AtomicBool::new(false));
        let trip = Arc::clone(&flag);
        let mut reports = 0;
        let result = SessionProcessor::new(ProcessingConfig::default())
            .with_cancel_flag(flag)
            .with_progress(move |p| {
                if p.stage == Stage::Deriving {
                    reports += 1;
                    trip.store(true, Ordering::Relaxed);
                }
            })
            .process(Cursor::new(ride_log()));
        assert!(matches!(result, Err(ProcessingError::Cancelled)));
    }

    #[test]
    fn progress_reaches_later_stages() {
        let mut stages = Vec::new();
        {
            let output = SessionProcessor::new(ProcessingConfig::default())
                .with_progress(|p| stages.push(p.stage))
                .process(Cursor::new(ride_log()))
                .unwrap();
            assert!(!output.segments.is_empty());
        }
        assert!(stages.contains(&Stage::Deriving));
        assert!(stages.contains(&Stage::Segmenting));
        assert!(stages.contains(&Stage::Summarizing));
    }

    #[test]
    fn empty_log_is_fatal() {
        let log = "timestamp,sensor_type,data1,data2,data3,data4,data5,data6\n";
        let result =
            SessionProcessor::new(ProcessingConfig::default()).process(Cursor::new(log));
        assert!(matches!(result, Err(ProcessingError::NoValidData { .. })));
    }
}
