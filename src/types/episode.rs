//! Episodes and duration figures

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A `[start, end]` span during which a binary condition held
/// (device powered, work in progress).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkEpisode {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl WorkEpisode {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// One duration reported three equivalent ways.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationBreakdown {
    pub seconds: i64,
    /// Whole minutes, truncated
    pub minutes: i64,
    /// Zero-padded `HH:MM`
    pub hhmm: String,
}

impl DurationBreakdown {
    pub fn from_duration(duration: Duration) -> Self {
        let seconds = duration.num_seconds();
        let hours = seconds / 3600;
        let remaining_minutes = (seconds % 3600) / 60;
        Self {
            seconds,
            minutes: seconds / 60,
            hhmm: format!("{hours:02}:{remaining_minutes:02}"),
        }
    }
}

impl Default for DurationBreakdown {
    fn default() -> Self {
        Self::from_duration(Duration::zero())
    }
}

impl std::fmt::Display for DurationBreakdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s / {}min / {}", self.seconds, self.minutes, self.hhmm)
    }
}
