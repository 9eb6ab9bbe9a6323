use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::{RidgeError, RidgeResult};

/// Ordered, named relevance measures. Only the count matters to the search:
/// it fixes the dimensionality of every point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasureSet {
    names: Vec<String>,
}

impl MeasureSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Anonymous measures `m0..m{count-1}`.
    pub fn anonymous(count: usize) -> Self {
        Self::new((0..count).map(|i| format!("m{i}")))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn dimension(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl fmt::Display for MeasureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names.join("+"))
    }
}

/// Opaque reference to the dataset an oracle scores against.
///
/// The search never reads the data; it only hands this handle through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHandle {
    pub id: Uuid,
    pub name: String,
    pub feature_count: usize,
    pub instance_count: usize,
}

impl DatasetHandle {
    pub fn new(name: impl Into<String>, feature_count: usize, instance_count: usize) -> RidgeResult<Self> {
        if instance_count == 0 {
            return Err(RidgeError::Validation(
                "Number of instances must not be equal to zero".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            feature_count,
            instance_count,
        })
    }
}

impl fmt::Display for DatasetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} features x {} instances)",
            self.name, self.feature_count, self.instance_count
        )
    }
}
