use crate::{Result, TimingPoint, ToolkitError};

/// Lookup of the musical grid active at a timestamp.
///
/// Only uninherited points (non-negative beat length) take part. They are
/// sorted once on construction so repeated lookups are a binary search.
#[derive(Debug, Clone)]
pub struct TimingIndex {
    points: Vec<TimingPoint>,
}

impl TimingIndex {
    /// Builds the index, failing when no uninherited point exists.
    pub fn new(points: &[TimingPoint]) -> Result<Self> {
        let mut points: Vec<TimingPoint> = points
            .iter()
            .filter(|p| p.beat_length >= 0.0)
            .copied()
            .collect();
        if points.is_empty() {
            return Err(ToolkitError::NoTimingData);
        }
        points.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(Self { points })
    }

    /// The point with the greatest `time <= t`, or the first point when `t`
    /// precedes all of them.
    pub fn active_point(&self, t: f64) -> &TimingPoint {
        let index = self.points.partition_point(|p| p.time <= t);
        &self.points[index.saturating_sub(1)]
    }

    /// Beat length divided by `divisor`.
    pub fn grid_unit(&self, t: f64, divisor: f64) -> f64 {
        self.active_point(t).beat_length / divisor
    }
}

/// One-shot lookup without building an index.
pub fn active_point(points: &[TimingPoint], t: f64) -> Result<TimingPoint> {
    TimingIndex::new(points).map(|index| *index.active_point(t))
}

/// Rounds `value` to the nearest multiple of `unit`, halves rounding up.
pub fn snap_to_unit(value: f64, unit: f64) -> f64 {
    if unit <= 0.0 {
        return value;
    }
    let remainder = value % unit;
    if remainder < unit / 2.0 {
        value - remainder
    } else {
        value + unit - remainder
    }
}

/// Snaps an absolute time onto the grid anchored at `point` and divided by
/// `divisor`.
pub fn snap_to_grid(t: f64, point: &TimingPoint, divisor: f64) -> f64 {
    let unit = point.beat_length / divisor;
    point.time + snap_to_unit(t - point.time, unit)
}
