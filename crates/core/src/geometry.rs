//! Geometry primitives shared by every backend.

use serde::{Deserialize, Serialize};

/// A 2D point in screen space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// An ordered sequence of points produced by one operation.
pub type Path = Vec<Point>;

/// Two parallel jitter series produced by the stochastic jitter operation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JitterSeries {
    pub jitter_x: Vec<f64>,
    pub jitter_y: Vec<f64>,
}

impl JitterSeries {
    pub fn len(&self) -> usize {
        self.jitter_x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jitter_x.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance_to(&b), 5.0);
        assert_eq!(b.distance_to(&a), 5.0);
    }

    #[test]
    fn test_jitter_series_serializes_camel_case() {
        let series = JitterSeries {
            jitter_x: vec![0.0, 1.0],
            jitter_y: vec![0.0, -1.0],
        };
        let json = serde_json::to_value(&series).unwrap();
        assert!(json.get("jitterX").is_some());
        assert!(json.get("jitterY").is_some());
        assert_eq!(series.len(), 2);
    }
}
