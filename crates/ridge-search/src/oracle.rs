//! The external scoring collaborator.

use ridge_types::{DatasetHandle, Point, SelectionResult};

/// Scores a point against a dataset.
///
/// Calls are blocking and potentially expensive. A returned error is fatal
/// to the task that made the call; the search never retries it.
pub trait Oracle: Send + Sync {
    fn evaluate(&self, point: &Point, dataset: &DatasetHandle) -> anyhow::Result<SelectionResult>;
}

impl<F> Oracle for F
where
    F: Fn(&Point, &DatasetHandle) -> anyhow::Result<SelectionResult> + Send + Sync,
{
    fn evaluate(&self, point: &Point, dataset: &DatasetHandle) -> anyhow::Result<SelectionResult> {
        self(point, dataset)
    }
}
