//! Admissible value sets used to guard setter writes.

use serde::{Deserialize, Serialize};

/// Closed interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn point(value: f64) -> Self {
        Self::new(value, value)
    }

    pub fn unbounded() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    pub fn contains(&self, value: f64) -> bool {
        self.start <= value && value <= self.end
    }
}

/// Union of closed intervals, kept sorted by start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    pub fn new(intervals: impl IntoIterator<Item = Interval>) -> Self {
        let mut set = Self::default();
        for interval in intervals {
            set.add(interval);
        }
        set
    }

    pub fn single(start: f64, end: f64) -> Self {
        Self::new([Interval::new(start, end)])
    }

    pub fn unbounded() -> Self {
        Self::new([Interval::unbounded()])
    }

    pub fn add(&mut self, interval: Interval) {
        let at = self
            .intervals
            .partition_point(|existing| existing.start <= interval.start);
        self.intervals.insert(at, interval);
    }

    pub fn contains(&self, value: f64) -> bool {
        for interval in &self.intervals {
            if interval.start > value {
                break;
            }
            if value <= interval.end {
                return true;
            }
        }
        false
    }

    /// Lowest admissible value, if any.
    pub fn min(&self) -> Option<f64> {
        self.intervals.first().map(|i| i.start)
    }

    /// Highest admissible value, if any.
    pub fn max(&self) -> Option<f64> {
        self.intervals.iter().map(|i| i.end).reduce(f64::max)
    }
}
