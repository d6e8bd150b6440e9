//! Telemetry Engine - device-level queries over a sample provider
//!
//! Every query follows the same sequence:
//!
//! ```text
//! 1. Resolve the device (name or alias) through the vessel registry
//! 2. Check the window and pick the channels the operation needs
//! 3. Materialize the window through the SampleProvider
//! 4. Run one segmentation pass
//! 5. Return a freshly allocated report
//! ```
//!
//! The engine holds no mutable state. A shared `&TelemetryEngine` can serve
//! any number of concurrent queries.

use crate::acquisition::{AcquisitionError, SampleProvider};
use crate::config::{DeviceSpec, VesselConfig};
use crate::segmentation::{
    self, CompletenessReport, CurrentPhaseClassifier, CurrentReport, EmptyIntervalList,
    MismatchInterval, PhaseConfig, ReduceOp, Reduction, SwingPolicy, SwitchReport, UptimeSummary,
    WindowStats,
};
use crate::types::{DeviceEvent, SampleSeries, Side, TimeWindow, WorkEpisode};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

// ============================================================================
// Errors and Results
// ============================================================================

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unsupported device: '{0}'")]
    UnsupportedDevice(String),

    #[error("Device '{device}' does not support {operation}")]
    UnsupportedOperation { device: String, operation: String },

    #[error("Invalid window: start {start} is after end {end}")]
    InvalidWindow {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("No intervals to merge")]
    EmptyIntervalList,

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
}

impl From<EmptyIntervalList> for EngineError {
    fn from(_: EmptyIntervalList) -> Self {
        EngineError::EmptyIntervalList
    }
}

/// Merged work periods, or the explicit absence of any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "episodes", rename_all = "snake_case")]
pub enum WorkTime {
    Episodes(Vec<WorkEpisode>),
    NoActivity,
}

impl WorkTime {
    pub fn episodes(&self) -> &[WorkEpisode] {
        match self {
            WorkTime::Episodes(e) => e,
            WorkTime::NoActivity => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingReport {
    pub device: String,
    pub side: Side,
    pub channel: String,
    pub policy: SwingPolicy,
    /// Readable angle samples the count was taken over
    pub samples: usize,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEnergy {
    pub device: String,
    /// `None` when the window held no samples
    pub kwh: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyReport {
    pub devices: Vec<DeviceEnergy>,
    /// Sum of the rounded per-device figures; `None` if every device was empty
    pub total_kwh: Option<f64>,
}

// ============================================================================
// Engine
// ============================================================================

pub struct TelemetryEngine<P: SampleProvider> {
    config: VesselConfig,
    provider: P,
}

impl<P: SampleProvider> TelemetryEngine<P> {
    pub fn new(config: VesselConfig, provider: P) -> Self {
        info!(
            vessel = %config.vessel.name,
            devices = config.devices.len(),
            "Telemetry engine ready"
        );
        Self { config, provider }
    }

    pub fn config(&self) -> &VesselConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Resolve a device by name or alias.
    pub fn device(&self, id: &str) -> Result<&DeviceSpec, EngineError> {
        self.config
            .device(id)
            .ok_or_else(|| EngineError::UnsupportedDevice(id.to_string()))
    }

    // ------------------------------------------------------------------------
    // Power state
    // ------------------------------------------------------------------------

    /// Power edges and Rise / Peak / Steady labels from the device's two
    /// current channels.
    pub fn classify_current(&self, device: &str, window: &TimeWindow) -> Result<CurrentReport, EngineError> {
        let spec = self.device(device)?;
        let (a, b) = spec
            .dual_current()
            .ok_or_else(|| unsupported(spec, "dual-channel current classification"))?;
        let series = self.load(spec, &[a, b], window)?;
        Ok(CurrentPhaseClassifier::new(phase_config(spec)).classify(&series, a, b))
    }

    /// On/off edges from the device's single switch channel. Single-current
    /// devices also get their last-high-current marks.
    pub fn switch_events(&self, device: &str, window: &TimeWindow) -> Result<SwitchReport, EngineError> {
        let spec = self.device(device)?;
        let channel = spec
            .switch_channel()
            .ok_or_else(|| unsupported(spec, "single-channel switch detection"))?;
        let series = self.load(spec, &[channel], window)?;
        if spec.current_channels.len() == 1 {
            Ok(segmentation::detect_with_load(&series, channel, &phase_config(spec)))
        } else {
            Ok(segmentation::detect_switches(&series, channel))
        }
    }

    /// Power edges from whichever detector the device supports, dual-channel
    /// presence first.
    pub fn power_events(&self, device: &str, window: &TimeWindow) -> Result<Vec<DeviceEvent>, EngineError> {
        let spec = self.device(device)?;
        if spec.dual_current().is_some() {
            Ok(self.classify_current(device, window)?.events)
        } else {
            Ok(self.switch_events(device, window)?.events)
        }
    }

    /// Closed on-intervals inside the window.
    pub fn power_intervals(&self, device: &str, window: &TimeWindow) -> Result<Vec<WorkEpisode>, EngineError> {
        Ok(segmentation::pair_edges(&self.power_events(device, window)?))
    }

    /// Cycle count and on-time of a device.
    pub fn uptime(&self, device: &str, window: &TimeWindow) -> Result<UptimeSummary, EngineError> {
        let summary = segmentation::summarize_uptime(&self.power_events(device, window)?);
        debug!(device, cycles = summary.cycles, total = %summary.total, "Uptime computed");
        Ok(summary)
    }

    // ------------------------------------------------------------------------
    // Motion
    // ------------------------------------------------------------------------

    /// Count swings on the side's angle channel.
    pub fn count_swings(
        &self,
        device: &str,
        side: Side,
        policy: SwingPolicy,
        window: &TimeWindow,
    ) -> Result<SwingReport, EngineError> {
        let spec = self.device(device)?;
        let channel = spec
            .angle_channel(side)
            .ok_or_else(|| unsupported(spec, &format!("{side} angle readings")))?;
        let series = self.load(spec, &[channel], window)?;
        let angles: Vec<f64> = series.readable(channel).into_iter().map(|(_, v)| v).collect();
        let count = policy.count(&angles);

        debug!(device = %spec.name, %side, %policy, samples = angles.len(), count, "Swings counted");
        Ok(SwingReport {
            device: spec.name.clone(),
            side,
            channel: channel.to_string(),
            policy,
            samples: angles.len(),
            count,
        })
    }

    /// Intervals where the port and starboard angle sensors disagree by
    /// more than the configured tolerance, over `[start, end)`.
    pub fn angle_mismatches(&self, device: &str, window: &TimeWindow) -> Result<Vec<MismatchInterval>, EngineError> {
        let spec = self.device(device)?;
        let (Some(port), Some(stbd)) = (spec.angle_channel(Side::Port), spec.angle_channel(Side::Starboard))
        else {
            return Err(unsupported(spec, "angle sensor audit"));
        };
        let series = self.load(spec, &[stbd, port], window)?.window_half_open(window);
        Ok(segmentation::angle_mismatches(
            &series,
            stbd,
            port,
            self.config.audit.angle_mismatch_tolerance_deg,
        ))
    }

    // ------------------------------------------------------------------------
    // Work time
    // ------------------------------------------------------------------------

    /// Fuse interval lists into work episodes.
    pub fn merge_intervals(&self, lists: Vec<Vec<WorkEpisode>>) -> Result<Vec<WorkEpisode>, EngineError> {
        Ok(segmentation::merge_episodes(lists.into_iter().flatten())?)
    }

    /// Work periods: the arm's power cycles fused with the positioning
    /// system's on/off cycles.
    pub fn work_time(&self, arm: &str, positioning: &str, window: &TimeWindow) -> Result<WorkTime, EngineError> {
        let arm_intervals = self.power_intervals(arm, window)?;
        let positioning_intervals = self.power_intervals(positioning, window)?;
        let sources = arm_intervals.len() + positioning_intervals.len();

        match self.merge_intervals(vec![arm_intervals, positioning_intervals]) {
            Ok(episodes) => {
                debug!(sources, merged = episodes.len(), "Work episodes merged");
                Ok(WorkTime::Episodes(episodes))
            }
            Err(EngineError::EmptyIntervalList) => Ok(WorkTime::NoActivity),
            Err(e) => Err(e),
        }
    }

    // ------------------------------------------------------------------------
    // Table-level audits and reductions
    // ------------------------------------------------------------------------

    /// Missing one-minute samples in a table. `id` is a registered device or
    /// a raw table name.
    pub fn missing_records(&self, id: &str, window: &TimeWindow) -> Result<CompletenessReport, EngineError> {
        check_window(window)?;
        let table = self.table_for(id);
        // observations anywhere inside the last grid minute still count
        let observe = TimeWindow::new(
            crate::types::truncate_to_minute(window.start),
            crate::types::truncate_to_minute(window.end) + Duration::seconds(59),
        );
        let series = self.provider.read(table, &[], &observe)?;
        let report = segmentation::audit(window, series.timestamps());
        info!(
            table,
            expected = report.expected,
            missing = report.missing_count,
            "Completeness audited"
        );
        Ok(report)
    }

    /// One reduction over a channel of a device or raw table.
    pub fn reduce(
        &self,
        id: &str,
        channel: &str,
        op: ReduceOp,
        window: &TimeWindow,
    ) -> Result<Option<Reduction>, EngineError> {
        let series = self.load_table(id, channel, window)?;
        Ok(segmentation::reducer::reduce(&series, channel, op))
    }

    pub fn window_stats(&self, id: &str, channel: &str, window: &TimeWindow) -> Result<Option<WindowStats>, EngineError> {
        let series = self.load_table(id, channel, window)?;
        Ok(segmentation::reducer::window_stats(&series, channel))
    }

    // ------------------------------------------------------------------------
    // Energy
    // ------------------------------------------------------------------------

    /// kWh drawn by a device over `[start, end)`.
    pub fn energy(&self, device: &str, window: &TimeWindow) -> Result<Option<f64>, EngineError> {
        let spec = self.device(device)?;
        let channel = spec
            .power_channel
            .as_deref()
            .ok_or_else(|| unsupported(spec, "energy integration"))?;
        let series = self.load(spec, &[channel], window)?;
        Ok(segmentation::integrate_energy_kwh(&series, channel, window))
    }

    /// Per-device energy and their sum.
    pub fn total_energy(&self, devices: &[&str], window: &TimeWindow) -> Result<EnergyReport, EngineError> {
        let devices = devices
            .iter()
            .map(|&id| {
                Ok(DeviceEnergy {
                    device: self.device(id)?.name.clone(),
                    kwh: self.energy(id, window)?,
                })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        let total_kwh = devices
            .iter()
            .filter_map(|d| d.kwh)
            .fold(None, |acc: Option<f64>, kwh| Some(acc.unwrap_or(0.0) + kwh))
            .map(|total| segmentation::round_to(total, crate::config::defaults::REPORT_DECIMALS));

        Ok(EnergyReport { devices, total_kwh })
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    fn load(&self, spec: &DeviceSpec, channels: &[&str], window: &TimeWindow) -> Result<SampleSeries, EngineError> {
        check_window(window)?;
        let series = self.provider.read(&spec.table, channels, window)?;
        debug!(device = %spec.name, table = %spec.table, rows = series.len(), %window, "Window loaded");
        Ok(series)
    }

    fn load_table(&self, id: &str, channel: &str, window: &TimeWindow) -> Result<SampleSeries, EngineError> {
        check_window(window)?;
        let table = self.table_for(id);
        let series = self.provider.read(table, &[channel], window)?;
        debug!(table, channel, rows = series.len(), %window, "Window loaded");
        Ok(series)
    }

    /// Registered device's table, else `id` itself as a table name.
    fn table_for<'a>(&'a self, id: &'a str) -> &'a str {
        self.config.device(id).map_or(id, |spec| spec.table.as_str())
    }
}

fn check_window(window: &TimeWindow) -> Result<(), EngineError> {
    if window.is_ordered() {
        Ok(())
    } else {
        Err(EngineError::InvalidWindow {
            start: window.start,
            end: window.end,
        })
    }
}

fn unsupported(spec: &DeviceSpec, operation: &str) -> EngineError {
    EngineError::UnsupportedOperation {
        device: spec.name.clone(),
        operation: operation.to_string(),
    }
}

fn phase_config(spec: &DeviceSpec) -> PhaseConfig {
    PhaseConfig {
        steady_threshold: spec.steady_threshold,
        steady_window: spec.steady_window,
    }
}
