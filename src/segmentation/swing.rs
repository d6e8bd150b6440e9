//! Swing counting on an arm angle channel
//!
//! Three counting policies share one entry point, [`SwingPolicy::count`].
//! Unreadable samples are dropped before counting, so a dropout never acts
//! as a crossing or a reversal.
//!
//! - **Band**: entries into an inclusive `[lo, hi]` band from outside it.
//! - **Directional**: full swings from past the front threshold to past the
//!   back threshold (or back again). The front threshold is damped by
//!   [`FRONT_ANGLE_DAMPING_DEG`] before comparison; the back one is not.
//! - **Amplitude**: direction reversals whose just-completed monotonic run
//!   covered at least `threshold` degrees.

use crate::config::defaults::FRONT_ANGLE_DAMPING_DEG;
use serde::{Deserialize, Serialize};

/// How a swing is recognized
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SwingPolicy {
    Band { lo: f64, hi: f64 },
    Directional { front_angle: f64, back_angle: f64 },
    Amplitude { threshold: f64 },
}

impl SwingPolicy {
    /// Count swings in an ordered sequence of readable angles.
    pub fn count(&self, angles: &[f64]) -> usize {
        match *self {
            SwingPolicy::Band { lo, hi } => {
                let mut counter = BandCounter::new(lo, hi);
                angles.iter().for_each(|&a| counter.push(a));
                counter.count
            }
            SwingPolicy::Directional {
                front_angle,
                back_angle,
            } => {
                let mut counter = DirectionalCounter::new(front_angle, back_angle);
                angles.windows(2).for_each(|w| counter.step(w[0], w[1]));
                counter.count
            }
            SwingPolicy::Amplitude { threshold } => {
                let mut counter = AmplitudeCounter::new(threshold);
                angles.windows(2).for_each(|w| counter.step(w[0], w[1]));
                counter.count
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SwingPolicy::Band { .. } => "band",
            SwingPolicy::Directional { .. } => "directional",
            SwingPolicy::Amplitude { .. } => "amplitude",
        }
    }
}

impl std::fmt::Display for SwingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwingPolicy::Band { lo, hi } => write!(f, "band [{lo}, {hi}]"),
            SwingPolicy::Directional {
                front_angle,
                back_angle,
            } => write!(f, "directional front={front_angle} back={back_angle}"),
            SwingPolicy::Amplitude { threshold } => write!(f, "amplitude >= {threshold}"),
        }
    }
}

// ============================================================================
// Band Crossing
// ============================================================================

#[derive(Debug)]
struct BandCounter {
    lo: f64,
    hi: f64,
    inside: bool,
    count: usize,
}

impl BandCounter {
    fn new(lo: f64, hi: f64) -> Self {
        Self {
            lo,
            hi,
            inside: false,
            count: 0,
        }
    }

    fn push(&mut self, angle: f64) {
        let inside = angle >= self.lo && angle <= self.hi;
        if inside && !self.inside {
            self.count += 1;
        }
        self.inside = inside;
    }
}

// ============================================================================
// Directional Rule
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

impl Direction {
    fn of(delta: f64) -> Option<Self> {
        if delta > 0.0 {
            Some(Direction::Up)
        } else if delta < 0.0 {
            Some(Direction::Down)
        } else {
            None
        }
    }
}

#[derive(Debug)]
struct DirectionalCounter {
    front: f64,
    back: f64,
    direction: Option<Direction>,
    at_front: bool,
    at_back: bool,
    count: usize,
}

impl DirectionalCounter {
    fn new(front_angle: f64, back_angle: f64) -> Self {
        Self {
            front: front_angle - FRONT_ANGLE_DAMPING_DEG,
            back: back_angle,
            direction: None,
            at_front: false,
            at_back: false,
            count: 0,
        }
    }

    fn step(&mut self, current: f64, next: f64) {
        let Some(moving) = Direction::of(next - current) else {
            return;
        };

        let Some(direction) = self.direction else {
            // first movement seeds the state from where the arm starts
            self.direction = Some(moving);
            self.at_front = current > self.front;
            self.at_back = current < self.back;
            return;
        };

        if moving != direction {
            self.direction = Some(moving);
            return;
        }

        match moving {
            Direction::Up if next > self.front => {
                if self.at_back {
                    self.count += 1;
                    self.at_back = false;
                }
                self.at_front = true;
            }
            Direction::Down if next < self.back => {
                if self.at_front {
                    self.count += 1;
                    self.at_front = false;
                }
                self.at_back = true;
            }
            _ => {}
        }
    }
}

// ============================================================================
// Threshold Amplitude
// ============================================================================

#[derive(Debug)]
struct AmplitudeCounter {
    threshold: f64,
    run: Option<(Direction, f64, f64)>,
    count: usize,
}

impl AmplitudeCounter {
    fn new(threshold: f64) -> Self {
        Self {
            threshold,
            run: None,
            count: 0,
        }
    }

    fn step(&mut self, current: f64, next: f64) {
        let Some(moving) = Direction::of(next - current) else {
            return;
        };
        self.run = match self.run {
            Some((direction, start, _)) if direction == moving => Some((direction, start, next)),
            Some((_, start, end)) => {
                if (end - start).abs() >= self.threshold {
                    self.count += 1;
                }
                Some((moving, current, next))
            }
            None => Some((moving, current, next)),
        };
    }
}
