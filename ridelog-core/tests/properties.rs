//! Property-based tests over the processing invariants

use std::io::Cursor;

use proptest::prelude::*;

use ridelog_core::{
    filters::FilterChain,
    fusion::{accel_confidence, DerivedMetrics},
    segments::{detect_segments, SegmentType},
    ProcessingConfig, SensorEvent, SensorType, SessionLogParser,
};

proptest! {
    /// Per-sensor streams come out of the parser sorted regardless of the
    /// order rows appear in the log.
    #[test]
    fn parser_sorts_each_sensor_stream(timestamps in proptest::collection::vec(0i64..1_000_000, 1..200)) {
        let mut log = String::from(
            "timestamp,sensor_type,data1,data2,data3,data4,data5,data6\n",
        );
        for ts in &timestamps {
            log.push_str(&format!("{ts},IMU,0.0,0.0,9.81,0.0,0.0,0.0\n"));
        }
        let session = SessionLogParser::new().parse(Cursor::new(log)).unwrap();
        let events = session.events_of(SensorType::Imu);
        prop_assert_eq!(events.len(), timestamps.len());
        for pair in events.windows(2) {
            prop_assert!(pair[0].timestamp() <= pair[1].timestamp());
        }
        prop_assert!(session.start <= session.end);
    }

    /// Dropping any single required key from a calibration block discards
    /// the whole block; no partial record ever surfaces.
    #[test]
    fn calibration_is_all_or_nothing(missing in 0usize..8) {
        let keys = [
            "quality=GOOD",
            "ref_pitch=1.0",
            "ref_roll=-0.5",
            "rotation=1;0;0;0;1;0;0;0;1",
            "gyro_bias=0;0;0",
            "timestamp=100",
            "duration_ms=3000",
            "samples=150",
        ];
        let block: Vec<&str> = keys
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != missing)
            .map(|(_, k)| *k)
            .collect();
        let log = format!(
            "# calibration: {}\ntimestamp,sensor_type,data1,data2,data3,data4,data5,data6\n1000,IMU,0,0,9.81,0,0,0\n",
            block.join(" "),
        );
        let session = SessionLogParser::new().parse(Cursor::new(log)).unwrap();
        prop_assert!(session.calibration.is_none());
        prop_assert_eq!(session.row_errors.len(), 1);
    }

    /// Lean confidence is always within [0, 1] whatever the accelerometer
    /// reports.
    #[test]
    fn confidence_always_bounded(
        ax in -100.0f64..100.0,
        ay in -100.0f64..100.0,
        az in -100.0f64..100.0,
        limit in 0.01f64..5.0,
    ) {
        let c = accel_confidence([ax, ay, az], limit);
        prop_assert!((0.0..=1.0).contains(&c));
    }

    /// A constant input settles through any preset chain within its
    /// reported warmup length.
    #[test]
    fn chains_converge_on_constant_input(value in -1_000.0f64..1_000.0) {
        for mut chain in [
            FilterChain::imu_logging(),
            FilterChain::live_display(),
            FilterChain::baro_altitude(),
        ] {
            let mut out = 0.0;
            for i in 0..=chain.warmup_len() {
                out = chain.filter(value, i as i64 * 20);
            }
            let tolerance = 0.01 * value.abs().max(1.0);
            prop_assert!((out - value).abs() <= tolerance, "out = {out}, value = {value}");
        }
    }

    /// Segments always tile the session: sorted, gapless, first at start,
    /// last at end, and every segment classified.
    #[test]
    fn segments_tile_the_session(
        speeds in proptest::collection::vec(0.0f64..30.0, 10..120),
    ) {
        let events: Vec<SensorEvent> = speeds
            .iter()
            .enumerate()
            .map(|(s, speed)| SensorEvent::Gps {
                timestamp: s as i64 * 1_000,
                latitude: 37.0,
                longitude: -122.0,
                altitude: 100.0,
                speed: *speed,
                bearing: 0.0,
                accuracy: 3.0,
            })
            .collect();
        let mut session = ridelog_core::ParsedSession::default();
        session.start = 0;
        session.end = (speeds.len() as i64 - 1) * 1_000;
        session.events.insert(SensorType::Gps, events);

        let config = ProcessingConfig::default();
        let segments = detect_segments(&session, &DerivedMetrics::default(), &config);

        prop_assert!(!segments.is_empty());
        prop_assert_eq!(segments.first().unwrap().start, session.start);
        prop_assert_eq!(segments.last().unwrap().end, session.end);
        for pair in segments.windows(2) {
            prop_assert_eq!(pair[0].end, pair[1].start);
            prop_assert!(pair[0].segment_type != pair[1].segment_type);
        }
        for segment in &segments {
            prop_assert!(matches!(
                segment.segment_type,
                SegmentType::ActiveRiding | SegmentType::Pause | SegmentType::Stop
            ));
        }
    }
}
