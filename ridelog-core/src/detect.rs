//! Maneuver Event Detection
//!
//! ## Algorithm
//!
//! Each event type runs the same two-state machine over one derived
//! series: IDLE until the sample crosses its threshold, IN_EVENT while it
//! stays crossed, emit on the way back down if the crossing was sustained
//! for the minimum duration. The condition is considered to hold from the
//! sample *before* the first crossing, because each derived sample
//! describes the interval since its predecessor (finite-difference
//! acceleration in particular is the mean over that interval).
//!
//! Peak magnitude is tracked while in the event and reported with it;
//! brief spikes shorter than the minimum duration are dropped.
//!
//! ## Sources
//!
//! | Event            | Series              | Condition                                |
//! |------------------|---------------------|------------------------------------------|
//! | HardAcceleration | velocity            | acceleration >= threshold                |
//! | HardBraking      | velocity            | acceleration <= threshold (negative)     |
//! | SharpTurn        | lean                | abs(roll) >= threshold, confident sample |
//! | HighG            | g-force             | total >= threshold                       |
//! | Wheelie          | lean                | pitch >= threshold, longer minimum       |

use serde::{Deserialize, Serialize};

use crate::config::ProcessingConfig;
use crate::fusion::DerivedMetrics;
use crate::time::Timestamp;

/// Kinds of notable maneuvers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    HardAcceleration,
    HardBraking,
    SharpTurn,
    HighG,
    Wheelie,
}

impl EventType {
    pub const fn name(&self) -> &'static str {
        match self {
            EventType::HardAcceleration => "hard_acceleration",
            EventType::HardBraking => "hard_braking",
            EventType::SharpTurn => "sharp_turn",
            EventType::HighG => "high_g",
            EventType::Wheelie => "wheelie",
        }
    }

    /// Unit of the reported magnitude
    pub const fn unit(&self) -> &'static str {
        match self {
            EventType::HardAcceleration | EventType::HardBraking => "m/s²",
            EventType::SharpTurn | EventType::Wheelie => "°",
            EventType::HighG => "g",
        }
    }
}

/// One detected maneuver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedEvent {
    /// When the condition started holding
    pub timestamp: Timestamp,
    pub event_type: EventType,
    /// Peak value while the condition held, in [`EventType::unit`] units
    pub magnitude: f64,
    /// How long the condition held, milliseconds
    pub duration_ms: i64,
    pub description: String,
}

/// Two-state threshold machine over one scalar series
struct ThresholdDetector {
    event_type: EventType,
    min_duration_ms: i64,
    /// (start, last crossed sample, peak) while IN_EVENT
    active: Option<(Timestamp, Timestamp, f64)>,
    previous_ts: Option<Timestamp>,
    events: Vec<DetectedEvent>,
}

impl ThresholdDetector {
    fn new(event_type: EventType, min_duration_ms: i64) -> Self {
        Self {
            event_type,
            min_duration_ms,
            active: None,
            previous_ts: None,
            events: Vec::new(),
        }
    }

    /// Feed one sample; `magnitude` is only inspected while crossed
    fn offer(&mut self, timestamp: Timestamp, magnitude: f64, crossed: bool) {
        if crossed {
            match self.active.as_mut() {
                Some((_, last, peak)) => {
                    *last = timestamp;
                    *peak = peak.max(magnitude);
                }
                None => {
                    let start = self.previous_ts.unwrap_or(timestamp);
                    self.active = Some((start, timestamp, magnitude));
                }
            }
        } else {
            self.close();
        }
        self.previous_ts = Some(timestamp);
    }

    fn close(&mut self) {
        if let Some((start, last, peak)) = self.active.take() {
            let duration_ms = last - start;
            if duration_ms >= self.min_duration_ms {
                self.events.push(DetectedEvent {
                    timestamp: start,
                    event_type: self.event_type,
                    magnitude: peak,
                    duration_ms,
                    description: format!(
                        "{} peaking at {:.1} {} over {} ms",
                        self.event_type.name().replace('_', " "),
                        peak,
                        self.event_type.unit(),
                        duration_ms,
                    ),
                });
            }
        }
    }

    fn finish(mut self) -> Vec<DetectedEvent> {
        self.close();
        self.events
    }
}

/// Detect all maneuver events over the derived series
///
/// Returns events sorted by start timestamp.
pub fn detect_events(metrics: &DerivedMetrics, config: &ProcessingConfig) -> Vec<DetectedEvent> {
    let mut accel = ThresholdDetector::new(EventType::HardAcceleration, config.min_event_ms);
    let mut brake = ThresholdDetector::new(EventType::HardBraking, config.min_event_ms);
    for sample in &metrics.velocity {
        accel.offer(
            sample.timestamp,
            sample.acceleration,
            sample.acceleration >= config.hard_accel_ms2,
        );
        brake.offer(
            sample.timestamp,
            sample.acceleration.abs(),
            sample.acceleration <= config.hard_brake_ms2,
        );
    }

    let mut turn = ThresholdDetector::new(EventType::SharpTurn, config.min_event_ms);
    let mut wheelie = ThresholdDetector::new(EventType::Wheelie, config.min_wheelie_ms);
    for sample in &metrics.lean {
        // Low-confidence lean samples cannot open or sustain a turn
        turn.offer(
            sample.timestamp,
            sample.roll.abs(),
            sample.roll.abs() >= config.sharp_turn_deg
                && sample.confidence >= config.turn_confidence_floor,
        );
        wheelie.offer(
            sample.timestamp,
            sample.pitch,
            sample.pitch >= config.wheelie_pitch_deg,
        );
    }

    let mut high_g = ThresholdDetector::new(EventType::HighG, config.min_event_ms);
    for sample in &metrics.gforce {
        high_g.offer(sample.timestamp, sample.total, sample.total >= config.high_g);
    }

    let mut events: Vec<DetectedEvent> = [accel, brake, turn, wheelie, high_g]
        .into_iter()
        .flat_map(ThresholdDetector::finish)
        .collect();
    events.sort_by_key(|e| e.timestamp);
    events
}
