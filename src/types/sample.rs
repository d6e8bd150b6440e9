//! Sample series: timestamped raw readings for the channels of one device

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value the legacy comparisons substitute for an unreadable reading.
///
/// Current magnitude is never negative, so `-1` can never collide with a
/// physical reading.
pub const UNREADABLE_SENTINEL: f64 = -1.0;

/// Timestamp layouts accepted by [`parse_timestamp`], tried in order.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

// ============================================================================
// Raw Values
// ============================================================================

/// A single channel reading as it came off the logger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    /// Finite numeric reading
    Reading(f64),
    /// Logger wrote a sentinel token (or garbage) instead of a number
    Unreadable,
}

impl RawValue {
    /// Parse a raw cell. The unreadable token, empty cells, non-numeric text
    /// and non-finite numbers all become `Unreadable`.
    pub fn parse(cell: &str, unreadable_token: &str) -> Self {
        let cell = cell.trim();
        if cell.is_empty() || cell.eq_ignore_ascii_case(unreadable_token) {
            return Self::Unreadable;
        }
        match cell.parse::<f64>() {
            Ok(v) if v.is_finite() => Self::Reading(v),
            _ => Self::Unreadable,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Self::Reading(v) => Some(v),
            Self::Unreadable => None,
        }
    }

    pub fn is_readable(self) -> bool {
        matches!(self, Self::Reading(_))
    }

    /// Numeric view used where legacy threshold comparisons are reproduced:
    /// unreadable maps to [`UNREADABLE_SENTINEL`].
    pub fn legacy_value(self) -> f64 {
        self.value().unwrap_or(UNREADABLE_SENTINEL)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        if v.is_finite() {
            Self::Reading(v)
        } else {
            Self::Unreadable
        }
    }
}

impl From<Option<f64>> for RawValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Self::Unreadable, Self::from)
    }
}

// ============================================================================
// Samples
// ============================================================================

/// Readings for every requested channel of one device at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub values: BTreeMap<String, RawValue>,
}

impl Sample {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style channel insert.
    pub fn with(mut self, channel: &str, value: impl Into<RawValue>) -> Self {
        self.values.insert(channel.to_string(), value.into());
        self
    }

    /// Reading for `channel`; a channel absent from this row is unreadable.
    pub fn get(&self, channel: &str) -> RawValue {
        self.values
            .get(channel)
            .copied()
            .unwrap_or(RawValue::Unreadable)
    }

    pub fn value(&self, channel: &str) -> Option<f64> {
        self.get(channel).value()
    }
}

/// Time-ordered samples for one device.
///
/// Ordering is enforced on construction. Gaps and duplicate timestamps are
/// kept as-is; nothing downstream assumes a complete one-minute cadence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSeries {
    samples: Vec<Sample>,
}

impl SampleSeries {
    pub fn new(mut samples: Vec<Sample>) -> Self {
        // stable: duplicates keep their source order
        samples.sort_by_key(|s| s.timestamp);
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.samples.iter().map(|s| s.timestamp)
    }

    /// Samples falling inside `window` (inclusive on both ends).
    pub fn window(&self, window: &TimeWindow) -> Self {
        Self {
            samples: self
                .samples
                .iter()
                .filter(|s| window.contains(s.timestamp))
                .cloned()
                .collect(),
        }
    }

    /// Samples falling inside `[start, end)`.
    pub fn window_half_open(&self, window: &TimeWindow) -> Self {
        Self {
            samples: self
                .samples
                .iter()
                .filter(|s| window.contains_half_open(s.timestamp))
                .cloned()
                .collect(),
        }
    }

    /// Every reading of `channel`, unreadable ones included.
    pub fn channel(&self, channel: &str) -> Vec<(NaiveDateTime, RawValue)> {
        self.samples
            .iter()
            .map(|s| (s.timestamp, s.get(channel)))
            .collect()
    }

    /// Numeric readings of `channel`; unreadable samples are dropped.
    pub fn readable(&self, channel: &str) -> Vec<(NaiveDateTime, f64)> {
        self.samples
            .iter()
            .filter_map(|s| s.value(channel).map(|v| (s.timestamp, v)))
            .collect()
    }
}

impl FromIterator<Sample> for SampleSeries {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// ============================================================================
// Time Windows
// ============================================================================

/// Query window, inclusive on both ends, second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Parse both ends with [`parse_timestamp`].
    pub fn parse(start: &str, end: &str) -> Option<Self> {
        Some(Self::new(parse_timestamp(start)?, parse_timestamp(end)?))
    }

    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && ts <= self.end
    }

    /// `[start, end)` membership, used by the energy integrator.
    pub fn contains_half_open(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && ts < self.end
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} .. {}", self.start, self.end)
    }
}

/// Parse a logger/operator timestamp in any of the accepted layouts.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Drop seconds and sub-seconds.
pub fn truncate_to_minute(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

// ============================================================================
// Side Selector
// ============================================================================

/// Which of the two redundant angle sensors to read.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Port,
    Starboard,
}

impl Side {
    /// Parse an operator-facing side label (English or the crew's labels).
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "port" | "p" | "left" | "左舷" => Some(Self::Port),
            "starboard" | "stbd" | "s" | "right" | "右舷" => Some(Self::Starboard),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Port => write!(f, "port"),
            Side::Starboard => write!(f, "starboard"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_raw_value_parse() {
        assert_eq!(RawValue::parse("12.5", "error"), RawValue::Reading(12.5));
        assert_eq!(RawValue::parse(" 0 ", "error"), RawValue::Reading(0.0));
        assert_eq!(RawValue::parse("error", "error"), RawValue::Unreadable);
        assert_eq!(RawValue::parse("ERROR", "error"), RawValue::Unreadable);
        assert_eq!(RawValue::parse("", "error"), RawValue::Unreadable);
        assert_eq!(RawValue::parse("nan", "error"), RawValue::Unreadable);
        assert_eq!(RawValue::parse("abc", "error"), RawValue::Unreadable);
    }

    #[test]
    fn test_legacy_value_uses_sentinel() {
        assert_eq!(RawValue::Unreadable.legacy_value(), -1.0);
        assert_eq!(RawValue::Reading(3.0).legacy_value(), 3.0);
    }

    #[test]
    fn test_series_sorted_on_construction() {
        let series = SampleSeries::new(vec![
            Sample::new(ts("2024-05-17 10:02:00")).with("a", 2.0),
            Sample::new(ts("2024-05-17 10:00:00")).with("a", 0.0),
            Sample::new(ts("2024-05-17 10:01:00")).with("a", 1.0),
        ]);
        let values: Vec<f64> = series.readable("a").into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_missing_channel_is_unreadable() {
        let sample = Sample::new(ts("2024-05-17 10:00:00")).with("a", 1.0);
        assert_eq!(sample.get("b"), RawValue::Unreadable);
        assert_eq!(sample.value("a"), Some(1.0));
    }

    #[test]
    fn test_window_inclusive() {
        let series: SampleSeries = (0..5)
            .map(|m| {
                Sample::new(ts("2024-05-17 10:00:00") + chrono::Duration::minutes(m))
                    .with("a", m as f64)
            })
            .collect();
        let window = TimeWindow::new(ts("2024-05-17 10:01:00"), ts("2024-05-17 10:03:00"));
        assert_eq!(series.window(&window).len(), 3);
        assert_eq!(series.window_half_open(&window).len(), 2);
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        assert!(parse_timestamp("2024-05-17 10:00:00").is_some());
        assert!(parse_timestamp("2024-05-17T10:00:00").is_some());
        assert!(parse_timestamp("2024-05-17 10:00").is_some());
        assert!(parse_timestamp("17/05/2024").is_none());
    }

    #[test]
    fn test_truncate_to_minute() {
        assert_eq!(
            truncate_to_minute(ts("2024-05-17 10:00:42")),
            ts("2024-05-17 10:00:00")
        );
    }

    #[test]
    fn test_side_labels() {
        assert_eq!(Side::from_label("左舷"), Some(Side::Port));
        assert_eq!(Side::from_label("Starboard"), Some(Side::Starboard));
        assert_eq!(Side::from_label("aft"), None);
    }
}
