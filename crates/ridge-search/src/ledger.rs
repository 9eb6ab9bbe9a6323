//! Concurrency-safe record of points that finished scoring.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ridge_types::Point;

/// Set of scored points (with the score each achieved).
///
/// Grows monotonically during a run. `try_record` is an atomic
/// test-and-insert, so each distinct point is counted at most once no matter
/// how many workers race to record it.
#[derive(Debug, Default)]
pub struct VisitedLedger {
    points: DashMap<Point, f64>,
}

impl VisitedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `point` if absent. Returns `true` only for the caller that
    /// actually inserted it.
    pub fn try_record(&self, point: &Point, score: f64) -> bool {
        match self.points.entry(point.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(score);
                true
            }
        }
    }

    pub fn contains(&self, point: &Point) -> bool {
        self.points.contains_key(point)
    }

    pub fn score_of(&self, point: &Point) -> Option<f64> {
        self.points.get(point).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Snapshot of the recorded points, sorted.
    pub fn points(&self) -> Vec<Point> {
        let mut points: Vec<Point> = self.points.iter().map(|entry| entry.key().clone()).collect();
        points.sort();
        points
    }
}
