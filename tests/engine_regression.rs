//! Engine Regression Tests
//!
//! Runs the full query path (registry lookup, CSV table read, segmentation)
//! against a small logger export written to a temporary directory. One shift
//! of 15 minutes starting 2024-05-17 08:00:
//!
//! - A-frame powered 08:02..08:08 with one load peak at 08:04
//! - DP engaged 08:06..08:12, logger rows for 08:09 and 08:10 missing
//! - Folding crane with two lifts inside one on-episode
//! - Gantry and winch drawing constant power, one unreadable gantry cell

use chrono::{Duration, NaiveDateTime};
use deckwatch::types::parse_timestamp;
use deckwatch::{
    CsvTableProvider, EngineError, EventKind, Phase, Side, SwingPolicy, TelemetryEngine,
    TimeWindow, VesselConfig, WorkEpisode, WorkTime,
};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn at(minute: i64) -> NaiveDateTime {
    parse_timestamp("2024-05-17 08:00:00").unwrap() + Duration::minutes(minute)
}

fn shift() -> TimeWindow {
    TimeWindow::new(at(0), at(14))
}

fn write_table(dir: &Path, name: &str, header: &str, rows: &[(i64, Vec<&str>)]) {
    let mut text = format!("csvTime,{header}\n");
    for (minute, cells) in rows {
        writeln!(text, "{},{}", at(*minute).format("%Y-%m-%d %H:%M:%S"), cells.join(",")).unwrap();
    }
    fs::write(dir.join(format!("{name}.csv")), text).unwrap();
}

fn fixture() -> (TempDir, TelemetryEngine<CsvTableProvider>) {
    let dir = tempfile::tempdir().unwrap();

    let currents = ["0", "0", "20", "90", "120", "30", "30", "30", "0", "0"];
    let angles = ["0", "6", "12", "0", "-12", "0", "6", "12", "0", "-12"];
    let ajia: Vec<(i64, Vec<&str>)> = (0..10)
        .map(|i| {
            let port = if i == 6 { "error" } else { angles[i] };
            (i as i64, vec![angles[i], port, currents[i], currents[i]])
        })
        .collect();
    write_table(dir.path(), "Ajia_plc_1", "Ajia-0_v,Ajia-1_v,Ajia-3_v,Ajia-5_v", &ajia);

    let dp: Vec<(i64, Vec<&str>)> = (0..15)
        .filter(|m| !(9..=10).contains(m))
        .map(|m| (m, vec![if (6..12).contains(&m) { "1" } else { "0" }]))
        .collect();
    write_table(dir.path(), "Port3_ksbg_9", "P3_33", &dp);

    let crane = ["0", "4", "18", "18", "4", "4", "4", "20", "4", "0"];
    let crane: Vec<(i64, Vec<&str>)> = crane.iter().enumerate().map(|(i, &v)| (i as i64, vec![v])).collect();
    write_table(dir.path(), "device_13_11_meter_1311", "13-11-6_v", &crane);

    let gantry: Vec<(i64, Vec<&str>)> = (0..6)
        .map(|m| (m, vec![if m == 3 { "error" } else { "60" }]))
        .collect();
    write_table(dir.path(), "device_1_5_meter_105", "1-5-6_v", &gantry);

    let winch: Vec<(i64, Vec<&str>)> = (0..6).map(|m| (m, vec!["30"])).collect();
    write_table(dir.path(), "device_1_15_meter_115", "1-15-6_v", &winch);

    let mut config = VesselConfig::default();
    config.data.dir = dir.path().to_path_buf();
    let provider = CsvTableProvider::new(&config.data);
    (dir, TelemetryEngine::new(config, provider))
}

// ============================================================================
// Power and Phases
// ============================================================================

#[test]
fn a_frame_edges_and_phases() {
    let (_dir, engine) = fixture();
    let report = engine.classify_current("a_frame", &shift()).unwrap();

    let edges: Vec<(NaiveDateTime, EventKind)> = report.events.iter().map(|e| (e.timestamp, e.kind)).collect();
    assert_eq!(edges, vec![(at(2), EventKind::PowerOn), (at(8), EventKind::PowerOff)]);
    assert!(!report.initially_powered);

    let phases: Vec<(NaiveDateTime, Phase)> = report.phases.iter().map(|m| (m.timestamp, m.phase)).collect();
    assert_eq!(
        phases,
        vec![(at(3), Phase::Rise), (at(4), Phase::Peak), (at(5), Phase::Steady)]
    );

    let timeline = report.timeline();
    assert_eq!(timeline.first().map(|e| e.kind), Some(EventKind::PowerOn));
    assert_eq!(timeline.last().map(|e| e.kind), Some(EventKind::PowerOff));
}

#[test]
fn crane_marks_each_lift() {
    let (_dir, engine) = fixture();
    let report = engine.switch_events("crane", &shift()).unwrap();
    assert_eq!(report.on_intervals(), vec![WorkEpisode::new(at(1), at(9))]);
    let marks: Vec<NaiveDateTime> = report.last_high_current.iter().map(|m| m.timestamp).collect();
    assert_eq!(marks, vec![at(3), at(7)]);
}

#[test]
fn dp_uptime_spans_logger_gap() {
    let (_dir, engine) = fixture();
    let uptime = engine.uptime("dp", &shift()).unwrap();
    assert_eq!(uptime.cycles, 1);
    assert_eq!(uptime.total.minutes, 6);
    assert_eq!(uptime.total.hhmm, "00:06");
}

#[test]
fn work_time_fuses_arm_and_positioning() {
    let (_dir, engine) = fixture();
    let work = engine.work_time("A架", "定位设备", &shift()).unwrap();
    assert_eq!(work, WorkTime::Episodes(vec![WorkEpisode::new(at(2), at(12))]));

    let quiet = TimeWindow::new(at(13), at(14));
    assert_eq!(engine.work_time("a_frame", "dp", &quiet).unwrap(), WorkTime::NoActivity);
}

// ============================================================================
// Swings and Audits
// ============================================================================

#[test]
fn swings_skip_unreadable_angles() {
    let (_dir, engine) = fixture();
    let band = SwingPolicy::Band { lo: 10.0, hi: 40.0 };

    let stbd = engine.count_swings("a_frame", Side::Starboard, band, &shift()).unwrap();
    assert_eq!((stbd.samples, stbd.count), (10, 2));

    let port = engine.count_swings("a_frame", Side::Port, band, &shift()).unwrap();
    assert_eq!(port.channel, "Ajia-1_v");
    assert_eq!((port.samples, port.count), (9, 2));
}

#[test]
fn missing_records_finds_logger_gap() {
    let (_dir, engine) = fixture();
    let report = engine.missing_records("dp", &shift()).unwrap();
    assert_eq!(report.expected, 15);
    assert_eq!(report.missing, vec![at(9), at(10)]);
    assert_eq!(report.missing_percent, 13.33);
}

#[test]
fn energy_is_half_open_and_summed() {
    let (_dir, engine) = fixture();
    let window = TimeWindow::new(at(0), at(5));
    let report = engine.total_energy(&["gantry_1", "winch"], &window).unwrap();
    let per_device: Vec<Option<f64>> = report.devices.iter().map(|d| d.kwh).collect();
    assert_eq!(per_device, vec![Some(3.0), Some(2.0)]);
    assert_eq!(report.total_kwh, Some(5.0));
}

#[test]
fn missing_table_surfaces_as_acquisition_error() {
    let (_dir, engine) = fixture();
    let err = engine.energy("gantry_2", &shift()).unwrap_err();
    assert!(matches!(err, EngineError::Acquisition(_)), "{err}");
}
