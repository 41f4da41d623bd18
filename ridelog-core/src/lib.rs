//! RideLog Core - Ride Telemetry Processing
//!
//! ## Overview
//!
//! Batch-processing core that turns raw multi-sensor ride logs into
//! telemetry a rider can use: lean angles, g-forces, fused velocity,
//! ride segments, maneuver events and a whole-ride summary.
//!
//! ```text
//! session log ──> parser ──> filters ──> fusion ──> segments ──┐
//!                    │                      │                  ├──> statistics
//!                    └── calibration ───────┘       events <───┘       │
//!                                                                   export
//! ```
//!
//! ## Key Features
//!
//! - **Sparse log parser**: self-describing per-row sensor format with a
//!   skip-not-fatal error policy ([`parser`])
//! - **Calibration contract**: all-or-nothing stationary calibration with
//!   variance-scored quality tiers ([`calibration`])
//! - **Adaptive filters**: composable median / low-pass / EMA chains,
//!   independent per axis ([`filters`])
//! - **Sensor fusion**: complementary-filter lean angles, quaternion
//!   orientation, GPS+IMU velocity ([`fusion`])
//! - **Segmentation**: windowed activity classification into riding,
//!   pause and stop spans ([`segments`])
//! - **Detection**: sustained-threshold maneuver events ([`detect`])
//! - **Cooperative pipeline**: yield points, progress reporting and
//!   all-or-nothing cancellation ([`pipeline`])
//!
//! ## Quick Start
//!
//! ```no_run
//! use ridelog_core::{ProcessingConfig, RideSummary, SessionProcessor};
//!
//! # fn main() -> ridelog_core::ProcessingResult<()> {
//! let config = ProcessingConfig::default();
//! let output = SessionProcessor::new(config.clone()).process_file("ride.log")?;
//! let summary = RideSummary::from_output(&output, config.export_series_points);
//! println!("{}", summary.to_json()?);
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod calibration;
pub mod config;
pub mod detect;
pub mod errors;
pub mod events;
pub mod export;
pub mod filters;
pub mod fusion;
pub mod parser;
pub mod pipeline;
pub mod segments;
pub mod stats;
pub mod time;

pub use calibration::{CalibrationQuality, CalibrationRecord, StationaryCapture};
pub use config::ProcessingConfig;
pub use detect::{DetectedEvent, EventType};
pub use errors::{ProcessingError, ProcessingResult, RowError};
pub use events::{SensorEvent, SensorType};
pub use export::RideSummary;
pub use fusion::{DerivedMetrics, DerivedMetricsCalculator};
pub use parser::{ParsedSession, SessionLogParser};
pub use pipeline::{CancelFlag, ProcessingOutput, Progress, SessionProcessor, Stage};
pub use segments::{RideSegment, SegmentType};
pub use stats::RideStatistics;
pub use time::Timestamp;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
