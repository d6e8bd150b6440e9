//! Current-Presence & Phase Classifier
//!
//! Turns two redundant current channels into power edges and, inside each
//! powered episode, Rise / Peak / Steady labels.
//!
//! ## Presence
//!
//! A sample is powered when BOTH channels read above zero. Unreadable cells
//! compare as `-1`, so a dropout on either channel reads as unpowered. The
//! first sample seeds the state without emitting an edge.
//!
//! ## Phases
//!
//! Episodes spanning `MIN_EPISODE_ROWS` rows or fewer are noise and stay
//! unlabelled, as does an episode with no closing PowerOff. Inside a
//! surviving episode the mean of the two channels is compared with the
//! steady threshold:
//!
//! ```text
//!   mean  ▲        peak
//!         │        ┌──┐
//!   thr ──┼────────┤  └─┐──────────
//!         │  ──────┘rise └ steady
//!         └──────────────────────▶ t
//! ```
//!
//! A run above the threshold starts with `Rise`, its first maximum becomes
//! `Peak`, and the first at-rest sample after the run becomes `Steady` once
//! `steady_window` consecutive at-rest samples have been seen (or the episode
//! ends).

use crate::config::defaults::{DEFAULT_STEADY_THRESHOLD, DEFAULT_STEADY_WINDOW, MIN_EPISODE_ROWS};
use crate::types::{DeviceEvent, EventKind, Phase, PhaseMark, SampleSeries, WorkEpisode};
use serde::{Deserialize, Serialize};

/// Tuning for phase labelling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Mean current at or below this is steady
    pub steady_threshold: f64,
    /// Consecutive steady samples that close a rise run
    pub steady_window: usize,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            steady_threshold: DEFAULT_STEADY_THRESHOLD,
            steady_window: DEFAULT_STEADY_WINDOW,
        }
    }
}

/// Output of one classification pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentReport {
    /// Whether the first sample was already powered (no edge is emitted for it)
    pub initially_powered: bool,
    /// Alternating PowerOn / PowerOff edges
    pub events: Vec<DeviceEvent>,
    /// Phase labels, in sample order
    pub phases: Vec<PhaseMark>,
    /// Powered episodes that were labelled
    pub episodes_labelled: usize,
    /// Powered episodes left unlabelled: too short, or still open at the end
    pub episodes_discarded: usize,
}

impl CurrentReport {
    /// Power edges and phase events merged chronologically. At equal
    /// timestamps the power edge comes first.
    pub fn timeline(&self) -> Vec<DeviceEvent> {
        let mut timeline: Vec<DeviceEvent> = self.events.clone();
        for mark in &self.phases {
            timeline.extend(
                mark.phase
                    .event_kinds()
                    .iter()
                    .map(|&kind| DeviceEvent::new(mark.timestamp, kind)),
            );
        }
        timeline.sort_by_key(|e| e.timestamp);
        timeline
    }

    /// Per-sample label column for a series of `len` samples.
    pub fn label_column(&self, len: usize) -> Vec<Option<Phase>> {
        let mut column = vec![None; len];
        for mark in &self.phases {
            if let Some(slot) = column.get_mut(mark.index) {
                *slot = Some(mark.phase);
            }
        }
        column
    }

    /// Closed powered intervals (PowerOn paired with the following PowerOff).
    pub fn powered_intervals(&self) -> Vec<WorkEpisode> {
        super::episodes::pair_edges(&self.events)
    }
}

// ============================================================================
// Classifier
// ============================================================================

/// Dual-channel current classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentPhaseClassifier {
    config: PhaseConfig,
}

impl CurrentPhaseClassifier {
    pub fn new(config: PhaseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PhaseConfig {
        &self.config
    }

    /// Classify `series` using current channels `channel_a` and `channel_b`.
    pub fn classify(&self, series: &SampleSeries, channel_a: &str, channel_b: &str) -> CurrentReport {
        let samples = series.samples();
        if samples.is_empty() {
            return CurrentReport::default();
        }

        let readings: Vec<(f64, f64)> = samples
            .iter()
            .map(|s| (s.get(channel_a).legacy_value(), s.get(channel_b).legacy_value()))
            .collect();

        let mut tracker = PresenceTracker::default();
        let mut report = CurrentReport::default();
        let mut episodes = Vec::new();

        for (i, &(a, b)) in readings.iter().enumerate() {
            let powered = a > 0.0 && b > 0.0;
            match tracker.step(i, powered) {
                PresenceStep::Seeded => report.initially_powered = powered,
                PresenceStep::Unchanged => {}
                PresenceStep::On => {
                    report.events.push(DeviceEvent::new(samples[i].timestamp, EventKind::PowerOn));
                }
                PresenceStep::Off { started } => {
                    report.events.push(DeviceEvent::new(samples[i].timestamp, EventKind::PowerOff));
                    episodes.push((started, i));
                }
            }
        }
        // an episode still powered at the end of the series has no PowerOff
        // and is never labelled
        if tracker.open_episode().is_some() {
            report.episodes_discarded += 1;
        }

        let means: Vec<f64> = readings.iter().map(|&(a, b)| (a + b) / 2.0).collect();
        let mut labels: Vec<Option<Phase>> = vec![None; samples.len()];

        for (start, end) in episodes {
            if end - start > MIN_EPISODE_ROWS {
                self.label_episode(&means, start, end, &mut labels);
                report.episodes_labelled += 1;
            } else {
                report.episodes_discarded += 1;
            }
        }

        report.phases = labels
            .iter()
            .enumerate()
            .filter_map(|(index, label)| {
                label.map(|phase| PhaseMark {
                    index,
                    timestamp: samples[index].timestamp,
                    phase,
                    current: means[index],
                })
            })
            .collect();

        tracing::debug!(
            samples = samples.len(),
            edges = report.events.len(),
            labelled = report.episodes_labelled,
            discarded = report.episodes_discarded,
            "Current phases classified"
        );

        report
    }

    /// Label samples `start..end` of one powered episode.
    fn label_episode(&self, means: &[f64], start: usize, end: usize, labels: &mut [Option<Phase>]) {
        let threshold = self.config.steady_threshold;
        let window = self.config.steady_window.max(1);
        let last = end - 1;

        let mut state = if means[start] > threshold {
            labels[start] = Some(Phase::Rise);
            RunState::Rising(RiseRun::begin(start, means[start]))
        } else {
            RunState::Steady
        };

        for (i, &value) in means.iter().enumerate().take(end).skip(start + 1) {
            let above = value > threshold;
            state = match state {
                RunState::Steady if above => {
                    if i == last {
                        // one sample left: it is both the rise and its peak
                        labels[i] = Some(Phase::RisePeak);
                        RunState::Steady
                    } else {
                        labels[i] = Some(Phase::Rise);
                        RunState::Rising(RiseRun::begin(i, value))
                    }
                }
                RunState::Steady => RunState::Steady,
                RunState::Rising(mut run) if above => {
                    run.observe(i, value);
                    if i == last {
                        mark_peak(labels, run.max_index);
                    }
                    RunState::Rising(run)
                }
                RunState::Rising(mut run) => {
                    run.steady_count += 1;
                    if run.steady_count >= window || i == last {
                        mark_peak(labels, run.max_index);
                        labels[run.last_above + 1] = Some(Phase::Steady);
                        RunState::Steady
                    } else {
                        RunState::Rising(run)
                    }
                }
            };
        }
    }
}

fn mark_peak(labels: &mut [Option<Phase>], index: usize) {
    labels[index] = Some(Phase::with_peak(labels[index]));
}

// ============================================================================
// State Machines
// ============================================================================

enum PresenceStep {
    Seeded,
    Unchanged,
    On,
    Off { started: usize },
}

/// Combined-presence state carried across the series
#[derive(Debug, Default)]
struct PresenceTracker {
    powered: Option<bool>,
    episode_start: Option<usize>,
}

impl PresenceTracker {
    fn step(&mut self, index: usize, powered: bool) -> PresenceStep {
        let step = match self.powered {
            None => {
                if powered {
                    self.episode_start = Some(index);
                }
                PresenceStep::Seeded
            }
            Some(false) if powered => {
                self.episode_start = Some(index);
                PresenceStep::On
            }
            Some(true) if !powered => match self.episode_start.take() {
                Some(started) => PresenceStep::Off { started },
                None => PresenceStep::Unchanged,
            },
            Some(_) => PresenceStep::Unchanged,
        };
        self.powered = Some(powered);
        step
    }

    fn open_episode(&self) -> Option<usize> {
        match self.powered {
            Some(true) => self.episode_start,
            _ => None,
        }
    }
}

/// A run of samples above the steady threshold
#[derive(Debug, Clone, Copy)]
struct RiseRun {
    max_value: f64,
    max_index: usize,
    last_above: usize,
    steady_count: usize,
}

impl RiseRun {
    fn begin(index: usize, value: f64) -> Self {
        Self {
            max_value: value,
            max_index: index,
            last_above: index,
            steady_count: 0,
        }
    }

    fn observe(&mut self, index: usize, value: f64) {
        // strictly greater: the first occurrence of the maximum keeps the peak
        if value > self.max_value {
            self.max_value = value;
            self.max_index = index;
        }
        self.last_above = index;
        self.steady_count = 0;
    }
}

#[derive(Debug, Clone, Copy)]
enum RunState {
    Steady,
    Rising(RiseRun),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{parse_timestamp, RawValue, Sample};
    use chrono::Duration;

    const A: &str = "Ajia-3_v";
    const B: &str = "Ajia-5_v";

    fn series(values: &[Option<f64>]) -> SampleSeries {
        dual_series(values, values)
    }

    fn dual_series(a: &[Option<f64>], b: &[Option<f64>]) -> SampleSeries {
        let t0 = parse_timestamp("2024-05-17 08:00:00").unwrap();
        a.iter()
            .zip(b)
            .enumerate()
            .map(|(i, (&va, &vb))| {
                Sample::new(t0 + Duration::minutes(i as i64))
                    .with(A, RawValue::from(va))
                    .with(B, RawValue::from(vb))
            })
            .collect()
    }

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    fn classify(values: &[Option<f64>]) -> CurrentReport {
        CurrentPhaseClassifier::default().classify(&series(values), A, B)
    }

    fn kinds(report: &CurrentReport) -> Vec<EventKind> {
        report.events.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_reference_scenario() {
        // error, 0, 5, 80, 80, 5, 0
        let values = vec![None, Some(0.0), Some(5.0), Some(80.0), Some(80.0), Some(5.0), Some(0.0)];
        let s = series(&values);
        let report = CurrentPhaseClassifier::default().classify(&s, A, B);

        assert_eq!(kinds(&report), vec![EventKind::PowerOn, EventKind::PowerOff]);
        assert_eq!(report.events[0].timestamp, s.samples()[2].timestamp);
        assert_eq!(report.events[1].timestamp, s.samples()[6].timestamp);

        // episode rows 2..6 spans 4 rows, so it survives the noise filter
        assert_eq!(report.episodes_labelled, 1);
        let column = report.label_column(s.len());
        assert_eq!(column[2], None);
        // first 80 rises and is the run maximum; the tie at index 4 does not move it
        assert_eq!(column[3], Some(Phase::RisePeak));
        assert_eq!(column[4], None);
        assert_eq!(column[5], Some(Phase::Steady));
    }

    #[test]
    fn test_single_channel_glitch_does_not_power_on() {
        let a = some(&[0.0, 50.0, 50.0, 50.0, 50.0, 0.0]);
        let b = some(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let report = CurrentPhaseClassifier::default().classify(&dual_series(&a, &b), A, B);
        assert!(report.events.is_empty());
        assert!(report.phases.is_empty());
    }

    #[test]
    fn test_first_sample_seeds_without_edge() {
        let report = classify(&some(&[10.0, 10.0, 0.0]));
        assert!(report.initially_powered);
        assert_eq!(kinds(&report), vec![EventKind::PowerOff]);
    }

    #[test]
    fn test_short_episodes_unlabelled() {
        // episode of 3 rows (end - start == 3) is discarded
        let report = classify(&some(&[0.0, 90.0, 90.0, 90.0, 0.0]));
        assert_eq!(report.episodes_discarded, 1);
        assert_eq!(report.episodes_labelled, 0);
        assert!(report.phases.is_empty());
        assert_eq!(kinds(&report), vec![EventKind::PowerOn, EventKind::PowerOff]);
    }

    #[test]
    fn test_rise_peak_steady_sequence() {
        let values = some(&[0.0, 10.0, 75.0, 90.0, 120.0, 100.0, 30.0, 20.0, 0.0]);
        let report = classify(&values);
        let column = report.label_column(values.len());
        assert_eq!(column[2], Some(Phase::Rise));
        assert_eq!(column[4], Some(Phase::Peak));
        assert_eq!(column[6], Some(Phase::Steady));
        assert_eq!(report.phases.len(), 3);
    }

    #[test]
    fn test_equal_values_keep_first_peak() {
        let values = some(&[0.0, 10.0, 80.0, 95.0, 95.0, 10.0, 10.0, 0.0]);
        let column = classify(&values).label_column(values.len());
        assert_eq!(column[3], Some(Phase::Peak));
        assert_eq!(column[4], None);
    }

    #[test]
    fn test_episode_starting_above_threshold() {
        let values = some(&[0.0, 100.0, 120.0, 40.0, 40.0, 0.0]);
        let column = classify(&values).label_column(values.len());
        assert_eq!(column[1], Some(Phase::Rise));
        assert_eq!(column[2], Some(Phase::Peak));
        assert_eq!(column[3], Some(Phase::Steady));
    }

    #[test]
    fn test_episode_ends_while_rising() {
        let values = some(&[0.0, 10.0, 80.0, 120.0, 90.0, 0.0]);
        let column = classify(&values).label_column(values.len());
        assert_eq!(column[2], Some(Phase::Rise));
        assert_eq!(column[3], Some(Phase::Peak));
        assert!(column.iter().all(|l| *l != Some(Phase::Steady)));
    }

    #[test]
    fn test_last_sample_spike_is_rise_peak() {
        let values = some(&[0.0, 10.0, 10.0, 10.0, 90.0, 0.0]);
        let column = classify(&values).label_column(values.len());
        assert_eq!(column[4], Some(Phase::RisePeak));
    }

    #[test]
    fn test_steady_window_hysteresis() {
        let values = some(&[0.0, 10.0, 90.0, 10.0, 95.0, 10.0, 10.0, 10.0, 10.0, 0.0]);
        let classifier = CurrentPhaseClassifier::new(PhaseConfig {
            steady_threshold: 69.0,
            steady_window: 3,
        });
        let column = classifier.classify(&series(&values), A, B).label_column(values.len());
        // the single dip at index 3 does not close the run
        assert_eq!(column[2], Some(Phase::Rise));
        assert_eq!(column[3], None);
        assert_eq!(column[4], Some(Phase::Peak));
        assert_eq!(column[5], Some(Phase::Steady));

        let default_column = classify(&values).label_column(values.len());
        assert_eq!(default_column[2], Some(Phase::RisePeak));
        assert_eq!(default_column[3], Some(Phase::Steady));
        // with a window of one the dip closes the first run and 95 starts a new one
        assert_eq!(default_column[4], Some(Phase::RisePeak));
        assert_eq!(default_column[5], Some(Phase::Steady));
    }

    #[test]
    fn test_open_episode_at_series_end_is_unlabelled() {
        let values = some(&[0.0, 10.0, 90.0, 95.0, 90.0, 90.0]);
        let report = classify(&values);
        assert_eq!(kinds(&report), vec![EventKind::PowerOn]);
        assert_eq!(report.episodes_labelled, 0);
        assert_eq!(report.episodes_discarded, 1);
        assert!(report.phases.is_empty());
        assert!(report.powered_intervals().is_empty());
    }

    #[test]
    fn test_initially_powered_run_to_end_is_unlabelled() {
        let report = classify(&some(&[90.0, 95.0, 100.0, 90.0, 90.0]));
        assert!(report.initially_powered);
        assert!(report.events.is_empty());
        assert!(report.phases.is_empty());
        assert_eq!(report.episodes_discarded, 1);
    }

    #[test]
    fn test_events_alternate() {
        let values: Vec<Option<f64>> = (0..200)
            .map(|i| match (i * 7919) % 13 {
                0 => None,
                1 | 2 => Some(0.0),
                k => Some(f64::from(k) * 10.0),
            })
            .collect();
        let report = classify(&values);
        for pair in report.events.windows(2) {
            assert_ne!(pair[0].kind, pair[1].kind);
        }
    }

    #[test]
    fn test_timeline_orders_edge_before_phase() {
        let values = some(&[0.0, 90.0, 100.0, 10.0, 10.0, 0.0]);
        let timeline = classify(&values).timeline();
        let kinds: Vec<EventKind> = timeline.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::PowerOn,
                EventKind::CurrentRise,
                EventKind::CurrentPeak,
                EventKind::CurrentSteady,
                EventKind::PowerOff,
            ]
        );
    }

    #[test]
    fn test_empty_series() {
        let report = classify(&[]);
        assert_eq!(report, CurrentReport::default());
    }
}
