//! Device events and current-phase labels

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Discrete event derived from a device's current readings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventKind {
    PowerOn,
    PowerOff,
    CurrentRise,
    CurrentPeak,
    CurrentSteady,
}

impl EventKind {
    /// Get short code for logging
    pub fn short_code(&self) -> &'static str {
        match self {
            EventKind::PowerOn => "ON",
            EventKind::PowerOff => "OFF",
            EventKind::CurrentRise => "RISE",
            EventKind::CurrentPeak => "PEAK",
            EventKind::CurrentSteady => "STEADY",
        }
    }

    pub fn is_power_edge(&self) -> bool {
        matches!(self, EventKind::PowerOn | EventKind::PowerOff)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::PowerOn => write!(f, "Power On"),
            EventKind::PowerOff => write!(f, "Power Off"),
            EventKind::CurrentRise => write!(f, "Current Rise"),
            EventKind::CurrentPeak => write!(f, "Current Peak"),
            EventKind::CurrentSteady => write!(f, "Current Steady"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceEvent {
    pub timestamp: NaiveDateTime,
    pub kind: EventKind,
}

impl DeviceEvent {
    pub fn new(timestamp: NaiveDateTime, kind: EventKind) -> Self {
        Self { timestamp, kind }
    }
}

// ============================================================================
// Phase Labels
// ============================================================================

/// Sub-state of a sample inside a powered episode
///
/// - **Rise**: first sample of a run above the steady threshold
/// - **Peak**: maximum of that run (first occurrence on ties)
/// - **RisePeak**: the run's first sample is also its maximum
/// - **Steady**: first at-rest sample after the run closes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Phase {
    Rise,
    Peak,
    RisePeak,
    Steady,
}

impl Phase {
    pub fn is_rise(&self) -> bool {
        matches!(self, Phase::Rise | Phase::RisePeak)
    }

    pub fn is_peak(&self) -> bool {
        matches!(self, Phase::Peak | Phase::RisePeak)
    }

    /// Merge a peak into whatever label the sample already carries.
    pub fn with_peak(current: Option<Phase>) -> Phase {
        match current {
            Some(Phase::Rise | Phase::RisePeak) => Phase::RisePeak,
            _ => Phase::Peak,
        }
    }

    /// Event kinds carried by this label, in emission order.
    pub fn event_kinds(&self) -> &'static [EventKind] {
        match self {
            Phase::Rise => &[EventKind::CurrentRise],
            Phase::Peak => &[EventKind::CurrentPeak],
            Phase::RisePeak => &[EventKind::CurrentRise, EventKind::CurrentPeak],
            Phase::Steady => &[EventKind::CurrentSteady],
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Rise => write!(f, "Rise"),
            Phase::Peak => write!(f, "Peak"),
            Phase::RisePeak => write!(f, "Rise Peak"),
            Phase::Steady => write!(f, "Steady"),
        }
    }
}

/// A phase label attached to one sample of the series
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PhaseMark {
    /// Position in the classified series
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub phase: Phase,
    /// Mean of the current channels at this sample
    pub current: f64,
}
