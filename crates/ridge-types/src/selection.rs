use serde::{Deserialize, Serialize};
use std::fmt;

use crate::point::Point;

/// Outcome of evaluating one point: the achieved score and how many
/// features the weighted ranking selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub point: Point,
    pub score: f64,
    pub selected_features: usize,
}

impl SelectionResult {
    pub fn new(point: Point, score: f64, selected_features: usize) -> Self {
        Self {
            point,
            score,
            selected_features,
        }
    }

    /// Strictly better than `other`. Ties are not improvements.
    pub fn improves_on(&self, other: &SelectionResult) -> bool {
        self.score > other.score
    }
}

impl fmt::Display for SelectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {:.4} ({} features)",
            self.point, self.score, self.selected_features
        )
    }
}
