use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Coordinates closer than this are treated as the same point.
pub const COORDINATE_RESOLUTION: f64 = 1e-9;

/// A weight vector over the configured relevance measures.
///
/// Equality, hashing and ordering are defined on the canonical key (each
/// coordinate quantized to [`COORDINATE_RESOLUTION`]), so two points reached
/// through different sequences of `±delta` steps compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Point {
    coordinates: Vec<f64>,
}

impl Point {
    pub fn new(coordinates: Vec<f64>) -> Self {
        Self { coordinates }
    }

    /// Point with every coordinate equal to `value`.
    pub fn filled(dimension: usize, value: f64) -> Self {
        Self::new(vec![value; dimension])
    }

    /// Axis-aligned unit point: 1.0 on `axis`, 0.0 elsewhere.
    pub fn unit(dimension: usize, axis: usize) -> Self {
        let mut coordinates = vec![0.0; dimension];
        if let Some(c) = coordinates.get_mut(axis) {
            *c = 1.0;
        }
        Self::new(coordinates)
    }

    /// The all-ones point followed by one unit point per axis.
    pub fn default_seeds(dimension: usize) -> Vec<Point> {
        std::iter::once(Self::filled(dimension, 1.0))
            .chain((0..dimension).map(|axis| Self::unit(dimension, axis)))
            .collect()
    }

    pub fn coordinates(&self) -> &[f64] {
        &self.coordinates
    }

    pub fn dimension(&self) -> usize {
        self.coordinates.len()
    }

    /// Copy of this point with `f` applied to the coordinate vector.
    pub fn map_coordinates(&self, f: impl FnOnce(&mut [f64])) -> Self {
        let mut coordinates = self.coordinates.clone();
        f(&mut coordinates);
        Self::new(coordinates)
    }

    /// The `2 * dimension` points one `delta` step away along each axis,
    /// ordered `+delta, -delta` per axis. No clipping is applied.
    pub fn neighbors(&self, delta: f64) -> Vec<Point> {
        let mut points = Vec::with_capacity(self.dimension() * 2);
        for i in 0..self.dimension() {
            points.push(self.map_coordinates(|c| c[i] += delta));
            points.push(self.map_coordinates(|c| c[i] -= delta));
        }
        points
    }

    /// Canonical integer key used for identity.
    pub fn canonical_key(&self) -> Vec<i64> {
        self.coordinates.iter().map(|&c| quantize(c)).collect()
    }

    fn key_iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.coordinates.iter().map(|&c| quantize(c))
    }
}

fn quantize(value: f64) -> i64 {
    let q = (value / COORDINATE_RESOLUTION).round();
    // -0.0 and 0.0 must collapse to the same key
    if q == 0.0 {
        0
    } else {
        q as i64
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.dimension() == other.dimension() && self.key_iter().eq(other.key_iter())
    }
}

impl Eq for Point {}

impl Hash for Point {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dimension().hash(state);
        for k in self.key_iter() {
            k.hash(state);
        }
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key_iter().cmp(other.key_iter())
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, c) in self.coordinates.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:.3}", c)?;
        }
        write!(f, "]")
    }
}

impl From<Vec<f64>> for Point {
    fn from(coordinates: Vec<f64>) -> Self {
        Self::new(coordinates)
    }
}

/// A frontier entry: a point plus the priority it was queued with.
///
/// The priority is the achieved score of the point that generated it
/// (1.0 for seeds). It only orders the queue and is not part of identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityPoint {
    pub priority: f64,
    pub point: Point,
}

impl PriorityPoint {
    pub const SEED_PRIORITY: f64 = 1.0;

    pub fn new(priority: f64, point: Point) -> Self {
        Self { priority, point }
    }

    pub fn seed(point: Point) -> Self {
        Self::new(Self::SEED_PRIORITY, point)
    }
}

impl PartialEq for PriorityPoint {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PriorityPoint {}

impl PartialOrd for PriorityPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| self.point.cmp(&other.point))
    }
}
