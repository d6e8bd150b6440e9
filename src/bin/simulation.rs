//! Deck Machinery Telemetry Simulation
//!
//! Generates logger-format CSV tables for testing deckwatch. Simulates a
//! working day of a survey vessel:
//! - Dynamic positioning (DP) held during each station
//! - A-frame deployments with load peaks and arm swings
//! - Folding crane lifts
//! - Gantry and winch power draw
//! - Sensor dropouts (`error` cells) and missing logger rows
//!
//! # Usage
//! ```bash
//! ./simulation --out database_in_use --hours 24 --seed 7
//! deckwatch events a_frame --start "2024-05-17 00:00:00" --end "2024-05-17 23:59:59"
//! ```

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime};
use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use deckwatch::types::parse_timestamp;

// ============================================================================
// Equipment Constants
// ============================================================================

/// A-frame motor current when powered but unloaded (A)
const AFRAME_IDLE_CURRENT: f64 = 45.0;
/// A-frame motor current while hauling (A)
const AFRAME_LOAD_CURRENT: f64 = 120.0;
/// A-frame arm swing amplitude (deg)
const ARM_AMPLITUDE_DEG: f64 = 40.0;
/// A-frame arm swing period (minutes)
const ARM_PERIOD_MIN: f64 = 18.0;
/// Folding crane current idle / lifting (A)
const CRANE_IDLE_CURRENT: f64 = 4.0;
const CRANE_LIFT_CURRENT: f64 = 18.0;
/// DP system reading when engaged
const DP_ENGAGED: f64 = 1.0;
/// Gantry and winch draw while the A-frame works (kW)
const GANTRY_POWER_KW: f64 = 35.0;
const WINCH_POWER_KW: f64 = 55.0;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "deckwatch-simulation")]
#[command(about = "Deck machinery telemetry simulation for deckwatch testing")]
#[command(version = "1.0")]
struct Args {
    /// Output directory for the CSV tables
    #[arg(short, long, default_value = "database_in_use")]
    out: PathBuf,

    /// First logger timestamp
    #[arg(long, default_value = "2024-05-17 00:00:00")]
    start: String,

    /// Simulated duration in hours (1-168)
    #[arg(short = 'H', long, default_value = "24", value_parser = clap::value_parser!(u32).range(1..=168))]
    hours: u32,

    /// Probability that a sensor cell is written as `error`
    #[arg(long, default_value = "0.01")]
    dropout_rate: f64,

    /// Probability that a logger row is missing entirely
    #[arg(long, default_value = "0.002")]
    gap_rate: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Suppress the mission log
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================================
// Deck Operations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Operation {
    /// Transit, everything off
    Transit,
    /// DP engaged, waiting on deck
    OnStation,
    /// A-frame deploying or recovering equipment
    Deployment,
}

impl Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::Transit => "Transit",
            Operation::OnStation => "On Station (DP engaged)",
            Operation::Deployment => "Deployment (A-frame working)",
        }
    }

    /// Station cycle: 240 min, DP 30..200, A-frame 60..150.
    fn at_minute(minute: i64) -> Self {
        match minute.rem_euclid(240) {
            m if (60..150).contains(&m) => Operation::Deployment,
            m if (30..200).contains(&m) => Operation::OnStation,
            _ => Operation::Transit,
        }
    }
}

struct SimulationState {
    rng: StdRng,
    dropout_rate: f64,
    current_noise: Normal<f64>,
    angle_noise: Normal<f64>,
    power_noise: Normal<f64>,
    crane_lift_remaining: u32,
}

impl SimulationState {
    fn new(seed: Option<u64>, dropout_rate: f64) -> Result<Self> {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            rng,
            dropout_rate,
            current_noise: Normal::new(0.0, 3.0)?,
            angle_noise: Normal::new(0.0, 0.8)?,
            power_noise: Normal::new(0.0, 1.5)?,
            crane_lift_remaining: 0,
        })
    }

    /// Reading or `None` for a dropout.
    fn sensor(&mut self, value: f64) -> Option<f64> {
        if self.rng.gen_bool(self.dropout_rate) {
            None
        } else {
            Some((value * 100.0).round() / 100.0)
        }
    }

    fn aframe_row(&mut self, minute: i64, op: Operation) -> [Option<f64>; 4] {
        let (current, angle) = if op == Operation::Deployment {
            let phase = (minute.rem_euclid(240) - 60) as f64;
            let angle = ARM_AMPLITUDE_DEG * (phase * std::f64::consts::TAU / ARM_PERIOD_MIN).sin();
            // hauling load at the ends of each swing
            let load = if angle.abs() > ARM_AMPLITUDE_DEG * 0.8 {
                AFRAME_LOAD_CURRENT
            } else {
                AFRAME_IDLE_CURRENT
            };
            (load + self.current_noise.sample(&mut self.rng), angle)
        } else {
            (0.0, 0.0)
        };

        let stbd = angle + self.angle_noise.sample(&mut self.rng);
        let port = angle + self.angle_noise.sample(&mut self.rng);
        let current_a = current.max(0.0);
        let current_b = (current + self.current_noise.sample(&mut self.rng) * 0.3).max(0.0);
        [
            self.sensor(stbd),
            self.sensor(port),
            self.sensor(current_a),
            self.sensor(current_b),
        ]
    }

    fn crane_row(&mut self, op: Operation) -> Option<f64> {
        if op == Operation::Transit {
            self.crane_lift_remaining = 0;
            return self.sensor(0.0);
        }
        if self.crane_lift_remaining == 0 && self.rng.gen_bool(0.03) {
            self.crane_lift_remaining = self.rng.gen_range(3..12);
        }
        let current = if self.crane_lift_remaining > 0 {
            self.crane_lift_remaining -= 1;
            CRANE_LIFT_CURRENT
        } else {
            CRANE_IDLE_CURRENT
        };
        let value = (current + self.current_noise.sample(&mut self.rng) * 0.5).max(0.1);
        self.sensor(value)
    }

    fn power_row(&mut self, op: Operation, kw: f64) -> Option<f64> {
        let value = if op == Operation::Deployment {
            (kw + self.power_noise.sample(&mut self.rng)).max(0.0)
        } else {
            0.0
        };
        self.sensor(value)
    }
}

// ============================================================================
// CSV Output
// ============================================================================

struct TableWriter {
    name: &'static str,
    out: BufWriter<File>,
    rows: u64,
}

impl TableWriter {
    fn create(dir: &Path, name: &'static str, channels: &[&str]) -> Result<Self> {
        let path = dir.join(format!("{name}.csv"));
        let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        writeln!(out, "csvTime,{}", channels.join(","))?;
        Ok(Self { name, out, rows: 0 })
    }

    fn write_row(&mut self, ts: NaiveDateTime, values: &[Option<f64>]) -> Result<()> {
        let cells: Vec<String> = values
            .iter()
            .map(|v| v.map_or_else(|| "error".to_string(), |x| x.to_string()))
            .collect();
        writeln!(self.out, "{},{}", ts.format("%Y-%m-%d %H:%M:%S"), cells.join(","))?;
        self.rows += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<(&'static str, u64)> {
        self.out.flush()?;
        Ok((self.name, self.rows))
    }
}

fn log_mission(minute: i64, message: &str, quiet: bool) {
    if !quiet {
        eprintln!("[{:02}:{:02}] {}", minute / 60, minute % 60, message);
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();
    let start = parse_timestamp(&args.start)
        .with_context(|| format!("Unparsable start timestamp '{}'", args.start))?;
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create {}", args.out.display()))?;

    let mut state = SimulationState::new(args.seed, args.dropout_rate.clamp(0.0, 1.0))?;
    let gap_rate = args.gap_rate.clamp(0.0, 1.0);
    let total_minutes = i64::from(args.hours) * 60;

    log_mission(0, &"=".repeat(60), args.quiet);
    log_mission(0, "DECK MACHINERY SIMULATION", args.quiet);
    log_mission(0, &format!("  Output: {}", args.out.display()), args.quiet);
    log_mission(0, &format!("  Duration: {} hours from {}", args.hours, start), args.quiet);
    log_mission(0, &format!("  Dropout rate: {:.3}, gap rate: {:.3}", args.dropout_rate, gap_rate), args.quiet);
    if let Some(seed) = args.seed {
        log_mission(0, &format!("  Random seed: {}", seed), args.quiet);
    }
    log_mission(0, &"=".repeat(60), args.quiet);

    let mut aframe = TableWriter::create(&args.out, "Ajia_plc_1", &["Ajia-0_v", "Ajia-1_v", "Ajia-3_v", "Ajia-5_v"])?;
    let mut crane = TableWriter::create(&args.out, "device_13_11_meter_1311", &["13-11-6_v"])?;
    let mut dp = TableWriter::create(&args.out, "Port3_ksbg_9", &["P3_33"])?;
    let mut gantry_1 = TableWriter::create(&args.out, "device_1_5_meter_105", &["1-5-6_v"])?;
    let mut gantry_2 = TableWriter::create(&args.out, "device_13_14_meter_1314", &["13-14-6_v"])?;
    let mut winch = TableWriter::create(&args.out, "device_1_15_meter_115", &["1-15-6_v"])?;

    let mut last_op = None;
    for minute in 0..total_minutes {
        let ts = start + Duration::minutes(minute);
        let op = Operation::at_minute(minute);
        if last_op != Some(op) {
            log_mission(minute, op.name(), args.quiet);
            last_op = Some(op);
        }

        // the logger drops whole rows, one table at a time
        if !state.rng.gen_bool(gap_rate) {
            let row = state.aframe_row(minute, op);
            aframe.write_row(ts, &row)?;
        }
        if !state.rng.gen_bool(gap_rate) {
            let row = state.crane_row(op);
            crane.write_row(ts, &[row])?;
        }
        if !state.rng.gen_bool(gap_rate) {
            let engaged = if op == Operation::Transit { 0.0 } else { DP_ENGAGED };
            let row = state.sensor(engaged);
            dp.write_row(ts, &[row])?;
        }
        let row = state.power_row(op, GANTRY_POWER_KW);
        gantry_1.write_row(ts, &[row])?;
        let row = state.power_row(op, GANTRY_POWER_KW * 0.8);
        gantry_2.write_row(ts, &[row])?;
        let row = state.power_row(op, WINCH_POWER_KW);
        winch.write_row(ts, &[row])?;
    }

    log_mission(total_minutes, &"=".repeat(60), args.quiet);
    for table in [aframe, crane, dp, gantry_1, gantry_2, winch] {
        let (name, rows) = table.finish()?;
        log_mission(total_minutes, &format!("  {name}: {rows} rows"), args.quiet);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crane_row_stays_positive_on_station() {
        let mut state = SimulationState::new(Some(7), 0.0).unwrap();
        for _ in 0..500 {
            let value = state.crane_row(Operation::OnStation).unwrap();
            assert!(value >= 0.1, "crane current {value} below floor");
        }
        assert_eq!(state.crane_row(Operation::Transit), Some(0.0));
        assert_eq!(state.crane_lift_remaining, 0);
    }

    #[test]
    fn test_full_dropout_writes_error_cells() {
        let mut state = SimulationState::new(Some(1), 1.0).unwrap();
        assert_eq!(state.crane_row(Operation::OnStation), None);
        assert!(state.aframe_row(70, Operation::Deployment).iter().all(Option::is_none));
    }

    #[test]
    fn test_station_cycle() {
        assert_eq!(Operation::at_minute(0), Operation::Transit);
        assert_eq!(Operation::at_minute(45), Operation::OnStation);
        assert_eq!(Operation::at_minute(100), Operation::Deployment);
        assert_eq!(Operation::at_minute(240 + 100), Operation::Deployment);
    }
}
