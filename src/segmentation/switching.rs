//! Single-channel switch detector
//!
//! Devices without redundant current sensors (the dynamic-positioning
//! system, the folding crane, the gantries) are switched on whenever their
//! one channel reads above zero. Unreadable samples read as off.
//!
//! For single-current devices the detector also marks the "last high
//! current" sample of each load cycle: the final above-threshold reading
//! before the current settles for `steady_window` consecutive samples.

use crate::types::{DeviceEvent, EventKind, SampleSeries, WorkEpisode};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::presence::PhaseConfig;

/// Last above-threshold reading of a load cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighCurrentMark {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Output of one switch-detection pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchReport {
    pub initially_on: bool,
    /// Alternating PowerOn / PowerOff edges
    pub events: Vec<DeviceEvent>,
    /// Empty unless load marking was requested
    pub last_high_current: Vec<HighCurrentMark>,
}

impl SwitchReport {
    /// Closed on-intervals (PowerOn paired with the following PowerOff).
    pub fn on_intervals(&self) -> Vec<WorkEpisode> {
        super::episodes::pair_edges(&self.events)
    }
}

/// Detect on/off edges on `channel`.
pub fn detect_switches(series: &SampleSeries, channel: &str) -> SwitchReport {
    let (report, _) = scan(series, channel);
    report
}

/// Detect on/off edges and mark the last high-current sample of each
/// on-episode against `config`.
pub fn detect_with_load(series: &SampleSeries, channel: &str, config: &PhaseConfig) -> SwitchReport {
    let (mut report, episodes) = scan(series, channel);
    let values: Vec<f64> = series
        .samples()
        .iter()
        .map(|s| s.get(channel).legacy_value())
        .collect();

    for (start, end) in episodes {
        for offset in last_high_offsets(&values[start..end], config) {
            let index = start + offset;
            report.last_high_current.push(HighCurrentMark {
                index,
                timestamp: series.samples()[index].timestamp,
                value: values[index],
            });
        }
    }

    tracing::debug!(
        channel,
        edges = report.events.len(),
        marks = report.last_high_current.len(),
        "Switch states detected"
    );
    report
}

/// Edge list plus `[start, end)` index ranges of every on-episode.
///
/// An episode still open at the end of the series stops before the final
/// sample, so a reading on the last row is never marked. Its first sample is
/// always examined.
fn scan(series: &SampleSeries, channel: &str) -> (SwitchReport, Vec<(usize, usize)>) {
    let samples = series.samples();
    let mut report = SwitchReport::default();
    let mut episodes = Vec::new();

    let Some(first) = samples.first() else {
        return (report, episodes);
    };

    let mut on = first.get(channel).legacy_value() > 0.0;
    report.initially_on = on;
    let mut episode_start = on.then_some(0);

    for (i, sample) in samples.iter().enumerate().skip(1) {
        let now_on = sample.get(channel).legacy_value() > 0.0;
        if now_on == on {
            continue;
        }
        if now_on {
            report.events.push(DeviceEvent::new(sample.timestamp, EventKind::PowerOn));
            episode_start = Some(i);
        } else {
            report.events.push(DeviceEvent::new(sample.timestamp, EventKind::PowerOff));
            if let Some(start) = episode_start.take() {
                episodes.push((start, i));
            }
        }
        on = now_on;
    }
    if let Some(start) = episode_start {
        episodes.push((start, (samples.len() - 1).max(start + 1)));
    }

    (report, episodes)
}

/// Offsets of every last high-current sample inside one episode. A cycle
/// closes after `steady_window` consecutive steady samples; a cycle still
/// open when the episode ends is closed there.
fn last_high_offsets(values: &[f64], config: &PhaseConfig) -> Vec<usize> {
    let window = config.steady_window.max(1);
    let mut marks = Vec::new();
    let mut last_high: Option<usize> = None;
    let mut steady_count = 0usize;

    for (i, &value) in values.iter().enumerate() {
        if value > config.steady_threshold {
            last_high = Some(i);
            steady_count = 0;
        } else if let Some(high) = last_high {
            steady_count += 1;
            if steady_count >= window {
                marks.push(high);
                last_high = None;
                steady_count = 0;
            }
        }
    }
    marks.extend(last_high);
    marks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{parse_timestamp, RawValue, Sample};
    use chrono::Duration;

    const CH: &str = "13-11-6_v";

    fn series(values: &[Option<f64>]) -> SampleSeries {
        let t0 = parse_timestamp("2024-08-23 09:00:00").unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Sample::new(t0 + Duration::minutes(i as i64)).with(CH, RawValue::from(v)))
            .collect()
    }

    fn crane() -> PhaseConfig {
        PhaseConfig {
            steady_threshold: 7.0,
            steady_window: 3,
        }
    }

    #[test]
    fn test_edges_alternate_and_seed() {
        let report = detect_switches(&series(&[Some(0.0), Some(3.0), None, Some(0.0), Some(2.0)]), CH);
        let kinds: Vec<EventKind> = report.events.iter().map(|e| e.kind).collect();
        assert!(!report.initially_on);
        assert_eq!(kinds, vec![EventKind::PowerOn, EventKind::PowerOff, EventKind::PowerOn]);
    }

    #[test]
    fn test_on_intervals_skip_open_episode() {
        let s = series(&[Some(1.0), Some(0.0), Some(1.0), Some(1.0), Some(0.0), Some(1.0)]);
        let report = detect_switches(&s, CH);
        // the initially-on run has no PowerOn edge, the trailing run no PowerOff
        let intervals = report.on_intervals();
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].start, s.samples()[2].timestamp);
        assert_eq!(intervals[0].end, s.samples()[4].timestamp);
    }

    #[test]
    fn test_last_high_current_after_settling() {
        let values = [0.0, 5.0, 12.0, 15.0, 3.0, 3.0, 3.0, 3.0, 0.0].map(Some);
        let report = detect_with_load(&series(&values), CH, &crane());
        assert_eq!(report.last_high_current.len(), 1);
        assert_eq!(report.last_high_current[0].index, 3);
        assert_eq!(report.last_high_current[0].value, 15.0);
    }

    #[test]
    fn test_short_dip_does_not_settle() {
        let values = [0.0, 12.0, 3.0, 3.0, 14.0, 3.0, 3.0, 3.0, 0.0].map(Some);
        let report = detect_with_load(&series(&values), CH, &crane());
        let marks: Vec<usize> = report.last_high_current.iter().map(|m| m.index).collect();
        assert_eq!(marks, vec![4]);
    }

    #[test]
    fn test_two_load_cycles_in_one_episode() {
        let values = [0.0, 12.0, 3.0, 3.0, 3.0, 14.0, 3.0, 3.0, 3.0, 0.0].map(Some);
        let report = detect_with_load(&series(&values), CH, &crane());
        let marks: Vec<usize> = report.last_high_current.iter().map(|m| m.index).collect();
        assert_eq!(marks, vec![1, 5]);
    }

    #[test]
    fn test_never_settles_marks_last_high() {
        let values = [0.0, 4.0, 9.0, 11.0, 2.0, 0.0].map(Some);
        let report = detect_with_load(&series(&values), CH, &crane());
        let marks: Vec<usize> = report.last_high_current.iter().map(|m| m.index).collect();
        assert_eq!(marks, vec![3]);
    }

    #[test]
    fn test_low_load_cycle_has_no_mark() {
        let values = [0.0, 2.0, 3.0, 2.0, 0.0].map(Some);
        assert!(detect_with_load(&series(&values), CH, &crane())
            .last_high_current
            .is_empty());
    }

    #[test]
    fn test_episode_open_at_end_is_marked() {
        let values = [0.0, 2.0, 20.0, 3.0].map(Some);
        let report = detect_with_load(&series(&values), CH, &crane());
        let marks: Vec<usize> = report.last_high_current.iter().map(|m| m.index).collect();
        assert_eq!(marks, vec![2]);
    }

    #[test]
    fn test_final_row_of_open_episode_not_examined() {
        let values = [0.0, 2.0, 3.0, 20.0].map(Some);
        let report = detect_with_load(&series(&values), CH, &crane());
        assert_eq!(report.events.len(), 1);
        assert!(report.last_high_current.is_empty());
    }

    #[test]
    fn test_episode_opening_on_final_row_marks_it() {
        let values = [0.0, 0.0, 20.0].map(Some);
        let report = detect_with_load(&series(&values), CH, &crane());
        let marks: Vec<usize> = report.last_high_current.iter().map(|m| m.index).collect();
        assert_eq!(marks, vec![2]);
    }

    #[test]
    fn test_empty_series() {
        assert_eq!(detect_switches(&SampleSeries::default(), CH), SwitchReport::default());
    }
}
