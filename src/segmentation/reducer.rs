//! Window reducers over one numeric channel
//!
//! Unreadable samples are skipped. Every reducer returns `None` for a window
//! with no readable samples; an empty window is a valid answer, not an error.

use crate::config::defaults::REPORT_DECIMALS;
use crate::types::{SampleSeries, TimeWindow};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::round_to;

/// Extremal reading and when it occurred
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extremum {
    pub value: f64,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReduceOp {
    Min,
    Max,
    Mean,
    Sum,
}

impl ReduceOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "min" | "minimum" => Some(Self::Min),
            "max" | "maximum" => Some(Self::Max),
            "mean" | "avg" | "average" => Some(Self::Mean),
            "sum" | "total" => Some(Self::Sum),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReduceOp::Min => write!(f, "min"),
            ReduceOp::Max => write!(f, "max"),
            ReduceOp::Mean => write!(f, "mean"),
            ReduceOp::Sum => write!(f, "sum"),
        }
    }
}

/// Result of a single reduction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reduction {
    /// Min / max carry the timestamp of the extremal sample
    At(Extremum),
    Value(f64),
}

impl Reduction {
    pub fn value(&self) -> f64 {
        match self {
            Reduction::At(e) => e.value,
            Reduction::Value(v) => *v,
        }
    }
}

/// Summary of one channel over a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub count: usize,
    pub unreadable: usize,
    pub min: Extremum,
    pub max: Extremum,
    pub mean: f64,
    /// Sample standard deviation; `None` with fewer than two readings
    pub std_dev: Option<f64>,
    pub sum: f64,
}

/// Smallest reading; the first occurrence wins on ties.
pub fn min(series: &SampleSeries, channel: &str) -> Option<Extremum> {
    extremum(series, channel, |candidate, best| candidate < best)
}

/// Largest reading; the first occurrence wins on ties.
pub fn max(series: &SampleSeries, channel: &str) -> Option<Extremum> {
    extremum(series, channel, |candidate, best| candidate > best)
}

fn extremum(
    series: &SampleSeries,
    channel: &str,
    replaces: impl Fn(f64, f64) -> bool,
) -> Option<Extremum> {
    series
        .readable(channel)
        .into_iter()
        .fold(None, |best: Option<Extremum>, (timestamp, value)| match best {
            Some(b) if !replaces(value, b.value) => Some(b),
            _ => Some(Extremum { value, timestamp }),
        })
}

pub fn mean(series: &SampleSeries, channel: &str) -> Option<f64> {
    let values = readable_values(series, channel);
    (!values.is_empty()).then(|| values.iter().mean())
}

pub fn sum(series: &SampleSeries, channel: &str) -> Option<f64> {
    let values = readable_values(series, channel);
    (!values.is_empty()).then(|| values.iter().sum())
}

pub fn reduce(series: &SampleSeries, channel: &str, op: ReduceOp) -> Option<Reduction> {
    match op {
        ReduceOp::Min => min(series, channel).map(Reduction::At),
        ReduceOp::Max => max(series, channel).map(Reduction::At),
        ReduceOp::Mean => mean(series, channel).map(Reduction::Value),
        ReduceOp::Sum => sum(series, channel).map(Reduction::Value),
    }
}

/// All reductions in one pass over the channel.
pub fn window_stats(series: &SampleSeries, channel: &str) -> Option<WindowStats> {
    let values = readable_values(series, channel);
    let count = values.len();
    Some(WindowStats {
        count,
        unreadable: series.len() - count,
        min: min(series, channel)?,
        max: max(series, channel)?,
        mean: values.iter().mean(),
        std_dev: (count >= 2).then(|| values.iter().std_dev()),
        sum: values.iter().sum(),
    })
}

fn readable_values(series: &SampleSeries, channel: &str) -> Vec<f64> {
    series.readable(channel).into_iter().map(|(_, v)| v).collect()
}

// ============================================================================
// Energy
// ============================================================================

/// Energy in kWh drawn on a power channel (kW) over `[start, end)`.
///
/// Each sample's power holds until the next sample inside the window. The
/// last sample contributes nothing, nor does an unreadable one (its interval
/// still advances time). Rounded to two decimals; `None` when the window
/// holds no samples.
pub fn integrate_energy_kwh(series: &SampleSeries, channel: &str, window: &TimeWindow) -> Option<f64> {
    let samples: Vec<_> = series
        .iter()
        .filter(|s| window.contains_half_open(s.timestamp))
        .collect();
    if samples.is_empty() {
        return None;
    }

    let kwh: f64 = samples
        .windows(2)
        .filter_map(|pair| {
            let power = pair[0].value(channel)?;
            let seconds = (pair[1].timestamp - pair[0].timestamp).num_milliseconds() as f64 / 1000.0;
            Some(power * seconds / 3600.0)
        })
        .sum();

    Some(round_to(kwh, REPORT_DECIMALS))
}
