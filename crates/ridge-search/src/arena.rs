//! Arena of every frontier entry a run has spawned.

use parking_lot::RwLock;
use ridge_types::{Point, PriorityPoint};
use serde::{Deserialize, Serialize};

/// Index of a frontier entry in its [`FrontierArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointId(pub usize);

/// One spawned frontier entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierNode {
    pub entry: PriorityPoint,
    pub parent: Option<PointId>,
    pub depth: usize,
}

/// Append-only store of frontier entries.
///
/// Queued tasks carry a [`PointId`] instead of the point itself, so the
/// whole fan-out of a run (who spawned whom, with which inherited
/// priority) stays inspectable after the run.
#[derive(Debug, Default)]
pub struct FrontierArena {
    nodes: RwLock<Vec<FrontierNode>>,
}

impl FrontierArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_seed(&self, point: Point) -> PointId {
        self.push(FrontierNode {
            entry: PriorityPoint::seed(point),
            parent: None,
            depth: 0,
        })
    }

    /// Record a child of `parent`, queued with the parent's achieved score.
    pub fn push_child(&self, parent: PointId, point: Point, parent_score: f64) -> PointId {
        let depth = self.get(parent).map(|n| n.depth + 1).unwrap_or(1);
        self.push(FrontierNode {
            entry: PriorityPoint::new(parent_score, point),
            parent: Some(parent),
            depth,
        })
    }

    fn push(&self, node: FrontierNode) -> PointId {
        let mut nodes = self.nodes.write();
        nodes.push(node);
        PointId(nodes.len() - 1)
    }

    pub fn get(&self, id: PointId) -> Option<FrontierNode> {
        self.nodes.read().get(id.0).cloned()
    }

    pub fn point(&self, id: PointId) -> Option<Point> {
        self.nodes.read().get(id.0).map(|n| n.entry.point.clone())
    }

    /// Number of entries ever spawned (seeds included).
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    pub fn nodes(&self) -> Vec<FrontierNode> {
        self.nodes.read().clone()
    }
}
