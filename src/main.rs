//! deckwatch - deck machinery telemetry queries
//!
//! Answers operator questions about A-frame, crane, winch and positioning
//! activity from the logger's CSV tables. Every subcommand prints one JSON
//! document on stdout; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Power edges and current phases of the A-frame on one day
//! deckwatch events a_frame --start "2024-05-17 00:00:00" --end "2024-05-17 23:59:59"
//!
//! # Swings on the port side, directional rule
//! deckwatch swings a_frame --side port --start ... --end ... rule --front 35 --back -43
//!
//! # Work periods (A-frame power fused with DP on/off)
//! deckwatch work-time --start ... --end ...
//! ```
//!
//! # Environment Variables
//!
//! - `DECKWATCH_CONFIG`: Path to the vessel config TOML
//! - `DECKWATCH_DATA_DIR`: Override the CSV table directory
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use deckwatch::segmentation::ReduceOp;
use deckwatch::{CsvTableProvider, Side, SwingPolicy, TelemetryEngine, TimeWindow, VesselConfig};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "deckwatch")]
#[command(about = "Deck machinery telemetry segmentation and audits")]
#[command(version)]
struct CliArgs {
    /// Vessel config TOML (default: $DECKWATCH_CONFIG, then ./deckwatch.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the CSV tables
    #[arg(long, global = true, env = "DECKWATCH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct WindowArgs {
    /// Window start, e.g. "2024-05-17 08:00:00"
    #[arg(long)]
    start: String,
    /// Window end (inclusive)
    #[arg(long)]
    end: String,
}

impl WindowArgs {
    fn window(&self) -> Result<TimeWindow> {
        TimeWindow::parse(&self.start, &self.end)
            .ok_or_else(|| anyhow!("Unparsable window '{}' .. '{}'", self.start, self.end))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Power edges and current phases of a device
    Events {
        device: String,
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Power cycles and total on-time of a device
    Uptime {
        device: String,
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Count arm swings on one angle sensor
    Swings {
        device: String,
        /// Angle sensor side (port / starboard / 左舷 / 右舷)
        #[arg(long, value_parser = parse_side)]
        side: Side,
        #[command(flatten)]
        window: WindowArgs,
        #[command(subcommand)]
        policy: SwingCommand,
    },

    /// Work periods: arm power cycles fused with positioning cycles
    WorkTime {
        #[arg(long, default_value = "a_frame")]
        arm: String,
        #[arg(long, default_value = "dp")]
        positioning: String,
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Missing one-minute records in a table (device name or table name)
    Missing {
        table: String,
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Min / max / mean / sum of a channel, or all of them
    Stat {
        table: String,
        channel: String,
        /// min, max, mean or sum; omit for the full summary
        #[arg(long, value_parser = parse_op)]
        op: Option<ReduceOp>,
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Energy (kWh) drawn by one or more devices over [start, end)
    Energy {
        #[arg(required = true)]
        devices: Vec<String>,
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Intervals where the two angle sensors disagree
    Mismatch {
        #[arg(default_value = "a_frame")]
        device: String,
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum SwingCommand {
    /// Entries into the band [lo, hi]
    Band {
        #[arg(long, allow_hyphen_values = true)]
        lo: f64,
        #[arg(long, allow_hyphen_values = true)]
        hi: f64,
    },
    /// Front-to-back full swings
    Rule {
        #[arg(long, allow_hyphen_values = true)]
        front: f64,
        #[arg(long, allow_hyphen_values = true)]
        back: f64,
    },
    /// Reversals after a run of at least `threshold` degrees
    Amplitude {
        #[arg(long)]
        threshold: f64,
    },
}

impl From<SwingCommand> for SwingPolicy {
    fn from(cmd: SwingCommand) -> Self {
        match cmd {
            SwingCommand::Band { lo, hi } => SwingPolicy::Band { lo, hi },
            SwingCommand::Rule { front, back } => SwingPolicy::Directional {
                front_angle: front,
                back_angle: back,
            },
            SwingCommand::Amplitude { threshold } => SwingPolicy::Amplitude { threshold },
        }
    }
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum ConfigCommand {
    /// Print the effective config as TOML
    Dump,
    /// List the registered devices and what each supports
    Devices,
}

fn parse_side(s: &str) -> std::result::Result<Side, String> {
    Side::from_label(s).ok_or_else(|| format!("unknown side '{s}' (expected port or starboard)"))
}

fn parse_op(s: &str) -> std::result::Result<ReduceOp, String> {
    ReduceOp::parse(s).ok_or_else(|| format!("unknown op '{s}' (expected min, max, mean or sum)"))
}

// ============================================================================
// Setup
// ============================================================================

fn init_logging(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &CliArgs) -> Result<VesselConfig> {
    let mut config = match &args.config {
        Some(path) => VesselConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => VesselConfig::load(),
    };
    if let Some(dir) = &args.data_dir {
        config.data.dir = dir.clone();
    }
    info!(vessel = %config.vessel.name, data_dir = %config.data.dir.display(), "Configuration ready");
    Ok(config)
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    let config = load_config(&args)?;

    if let Command::Config { action } = &args.command {
        return match action {
            ConfigCommand::Dump => {
                print!("{}", config.to_toml()?);
                Ok(())
            }
            ConfigCommand::Devices => emit(&device_summary(&config)),
        };
    }

    let provider = CsvTableProvider::new(&config.data);
    let engine = TelemetryEngine::new(config, provider);

    match &args.command {
        Command::Events { device, window } => {
            let window = window.window()?;
            let spec = engine.device(device)?;
            if spec.dual_current().is_some() {
                let report = engine.classify_current(device, &window)?;
                emit(&json!({
                    "device": spec.name,
                    "window": window,
                    "initially_powered": report.initially_powered,
                    "timeline": report.timeline(),
                    "phases": report.phases,
                    "episodes_labelled": report.episodes_labelled,
                    "episodes_discarded": report.episodes_discarded,
                }))
            } else {
                let report = engine.switch_events(device, &window)?;
                emit(&json!({ "device": spec.name, "window": window, "report": report }))
            }
        }
        Command::Uptime { device, window } => {
            let window = window.window()?;
            let summary = engine.uptime(device, &window)?;
            emit(&json!({ "device": engine.device(device)?.name, "window": window, "uptime": summary }))
        }
        Command::Swings {
            device,
            side,
            window,
            policy,
        } => {
            let report = engine.count_swings(device, *side, (*policy).into(), &window.window()?)?;
            emit(&report)
        }
        Command::WorkTime {
            arm,
            positioning,
            window,
        } => {
            let window = window.window()?;
            let work = engine.work_time(arm, positioning, &window)?;
            emit(&json!({ "window": window, "work_time": work }))
        }
        Command::Missing { table, window } => {
            let window = window.window()?;
            emit(&json!({ "table": table, "window": window, "completeness": engine.missing_records(table, &window)? }))
        }
        Command::Stat {
            table,
            channel,
            op,
            window,
        } => {
            let window = window.window()?;
            match op {
                Some(op) => emit(&json!({
                    "table": table,
                    "channel": channel,
                    "op": op,
                    "result": engine.reduce(table, channel, *op, &window)?,
                })),
                None => emit(&json!({
                    "table": table,
                    "channel": channel,
                    "stats": engine.window_stats(table, channel, &window)?,
                })),
            }
        }
        Command::Energy { devices, window } => {
            let ids: Vec<&str> = devices.iter().map(String::as_str).collect();
            emit(&engine.total_energy(&ids, &window.window()?)?)
        }
        Command::Mismatch { device, window } => {
            let window = window.window()?;
            emit(&json!({
                "device": device,
                "tolerance_deg": engine.config().audit.angle_mismatch_tolerance_deg,
                "intervals": engine.angle_mismatches(device, &window)?,
            }))
        }
        Command::Config { .. } => Ok(()),
    }
}

fn device_summary(config: &VesselConfig) -> serde_json::Value {
    let devices: Vec<serde_json::Value> = config
        .devices
        .iter()
        .map(|d| {
            json!({
                "name": d.name,
                "aliases": d.aliases,
                "table": d.table,
                "phase_classification": d.dual_current().is_some(),
                "switch_detection": d.switch_channel().is_some(),
                "swing_counting": d.angle_port.is_some() || d.angle_starboard.is_some(),
                "energy": d.power_channel.is_some(),
            })
        })
        .collect();
    json!({ "vessel": config.vessel.name, "devices": devices })
}
