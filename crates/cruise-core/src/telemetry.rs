//! Dashboard telemetry.
//!
//! [`TelemetrySnapshot`] is what a dashboard displays after each tick: rounded
//! gauges plus a compass heading. [`TelemetryRecorder`] streams the same data
//! as CSV for offline analysis of drive tuning.

use std::io::{self, Write};

use serde::Serialize;

use crate::vehicle::{CompassPoint, GAUGE_MAX, VehicleState, heading_degrees};

/// Display values published after each tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    pub speed: u32,
    pub throttle: u32,
    pub brake: u32,
    pub boost_reserve: u32,
    /// One of `N, NW, W, SW, S, SE, E, NE`.
    pub heading_label: &'static str,
    /// Rounded degrees in `[0, 360)`.
    pub heading_degrees: u32,
}

impl TelemetrySnapshot {
    #[must_use]
    pub fn from_state(state: &VehicleState) -> Self {
        let degrees = heading_degrees(state.heading);
        // 359.6 rounds up to 360, which wraps back to north.
        let rounded_degrees = degrees.round() as u32 % 360;
        Self {
            speed: gauge(state.speed),
            throttle: gauge(state.throttle),
            brake: gauge(state.brake),
            boost_reserve: gauge(state.boost_reserve),
            heading_label: CompassPoint::from_degrees(degrees).label(),
            heading_degrees: rounded_degrees,
        }
    }
}

fn gauge(value: f32) -> u32 {
    value.clamp(0.0, GAUGE_MAX).round() as u32
}

// ============================================================================
// CSV recording
// ============================================================================

/// One recorded row.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryFrame<'a> {
    pub tick: u64,
    pub elapsed: f32,
    pub dt: f32,
    pub state: &'a VehicleState,
}

/// Defines the CSV schema once and derives both the header and the row
/// formatter from it, keeping column names and formats in sync.
macro_rules! define_telemetry {
    (
        columns: { $( $name:ident : $fmt:literal ),* $(,)? },
        prelude: |$frame:ident| { $( $prelude:stmt );* $(;)? },
        row_values: { $( $val:expr ),* $(,)? }
    ) => {
        const CSV_COLUMNS: &str = concat!( $( stringify!($name), "," ),* );

        /// CSV header line.
        pub fn csv_header() -> &'static str {
            CSV_COLUMNS.trim_end_matches(',')
        }

        /// Format one CSV row.
        pub fn format_row($frame: &TelemetryFrame<'_>) -> String {
            $( $prelude )*

            let line = format!( concat!( $( $fmt, "," ),* ), $( $val ),* );
            line.trim_end_matches(',').to_string()
        }
    };
}

define_telemetry! {
    columns: {
        tick: "{}",
        t: "{:.4}",
        dt: "{:.5}",
        x: "{:.3}",
        z: "{:.3}",
        heading_deg: "{:.2}",
        speed: "{:.3}",
        throttle: "{:.3}",
        brake: "{:.3}",
        boost: "{:.3}",
        compass: "{}",
    },
    prelude: |frame| {
        let state = frame.state;
        let degrees = heading_degrees(state.heading);
    },
    row_values: {
        frame.tick,
        frame.elapsed,
        frame.dt,
        state.position.x,
        state.position.z,
        degrees,
        state.speed,
        state.throttle,
        state.brake,
        state.boost_reserve,
        CompassPoint::from_degrees(degrees).label(),
    }
}

/// Streams telemetry rows to any writer.
#[derive(Debug)]
pub struct TelemetryRecorder<W: Write> {
    out: W,
    rows: u64,
}

impl<W: Write> TelemetryRecorder<W> {
    /// Write the header and return a recorder positioned after it.
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "{}", csv_header())?;
        Ok(Self { out, rows: 0 })
    }

    pub fn record(&mut self, frame: &TelemetryFrame<'_>) -> io::Result<()> {
        writeln!(self.out, "{}", format_row(frame))?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use glam::Vec3;

    use super::*;

    #[test]
    fn test_snapshot_rounds_gauges() {
        let state = VehicleState {
            speed: 42.6,
            throttle: 99.5,
            brake: 0.4,
            boost_reserve: 75.0,
            ..Default::default()
        };
        let snapshot = TelemetrySnapshot::from_state(&state);
        assert_eq!(snapshot.speed, 43);
        assert_eq!(snapshot.throttle, 100);
        assert_eq!(snapshot.brake, 0);
        assert_eq!(snapshot.boost_reserve, 75);
        assert_eq!(snapshot.heading_label, "N");
        assert_eq!(snapshot.heading_degrees, 0);
    }

    #[test]
    fn test_snapshot_heading() {
        let mut state = VehicleState {
            heading: FRAC_PI_2,
            ..Default::default()
        };
        let snapshot = TelemetrySnapshot::from_state(&state);
        assert_eq!(snapshot.heading_label, "W");
        assert_eq!(snapshot.heading_degrees, 90);

        // Just short of a full turn rounds to 360 and must wrap.
        state.heading = 359.7f32.to_radians();
        let snapshot = TelemetrySnapshot::from_state(&state);
        assert_eq!(snapshot.heading_degrees, 0);
        assert_eq!(snapshot.heading_label, "N");

        state.heading = -FRAC_PI_2;
        assert_eq!(TelemetrySnapshot::from_state(&state).heading_label, "E");
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = TelemetrySnapshot::from_state(&VehicleState::default());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "speed": 0,
                "throttle": 0,
                "brake": 0,
                "boost_reserve": 75,
                "heading_label": "N",
                "heading_degrees": 0,
            })
        );
    }

    #[test]
    fn test_header_matches_row_width() {
        let header = csv_header();
        assert!(!header.ends_with(','));
        let state = VehicleState::default();
        let row = format_row(&TelemetryFrame {
            tick: 0,
            elapsed: 0.0,
            dt: 0.0,
            state: &state,
        });
        assert_eq!(
            header.split(',').count(),
            row.split(',').count(),
            "{header}\n{row}"
        );
    }

    #[test]
    fn test_recorder_writes_rows() {
        let mut recorder = TelemetryRecorder::new(Vec::new()).unwrap();
        let state = VehicleState {
            position: Vec3::new(1.5, 0.0, -3.25),
            speed: 12.0,
            ..Default::default()
        };
        for tick in 1..=3 {
            recorder
                .record(&TelemetryFrame {
                    tick,
                    elapsed: tick as f32 / 60.0,
                    dt: 1.0 / 60.0,
                    state: &state,
                })
                .unwrap();
        }
        assert_eq!(recorder.rows(), 3);

        let text = String::from_utf8(recorder.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], csv_header());
        assert!(lines[1].starts_with("1,0.0167,0.01667,1.500,-3.250,0.00,12.000,"));
        assert!(lines[3].ends_with(",N"));
    }
}
