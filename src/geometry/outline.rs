//! Time-interpolated outline of one moving obstacle
//!
//! Keyframes are `(timestamp, polygon)` pairs kept in timestamp order
//! regardless of insertion order. Queries clamp outside the keyframe range
//! and interpolate per vertex inside it.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use ordered_float::OrderedFloat;

use crate::common::{Point2D, RoboticsError, RoboticsResult};
use crate::geometry::Polygon;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectOutline {
    keyframes: BTreeMap<OrderedFloat<f64>, Polygon>,
}

impl ObjectOutline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outline that never moves
    pub fn stationary(polygon: Polygon) -> Self {
        let mut keyframes = BTreeMap::new();
        keyframes.insert(OrderedFloat(0.0), polygon);
        Self { keyframes }
    }

    /// Insert a keyframe.
    ///
    /// All keyframes must share one vertex count and timestamps must be unique.
    pub fn add(&mut self, polygon: Polygon, timestamp: f64) -> RoboticsResult<()> {
        if !timestamp.is_finite() {
            return Err(RoboticsError::InvalidParameter(format!(
                "keyframe timestamp must be finite, got {}",
                timestamp
            )));
        }
        let key = OrderedFloat(timestamp);
        if self.keyframes.contains_key(&key) {
            return Err(RoboticsError::InvalidParameter(format!(
                "duplicate keyframe timestamp {}",
                timestamp
            )));
        }
        if let Some(existing) = self.keyframes.values().next() {
            if existing.len() != polygon.len() {
                return Err(RoboticsError::ShapeMismatch {
                    expected: existing.len(),
                    actual: polygon.len(),
                });
            }
        }
        self.keyframes.insert(key, polygon);
        Ok(())
    }

    /// Convenience for [`ObjectOutline::add`] from raw ring points
    pub fn add_points(&mut self, points: Vec<Point2D>, timestamp: f64) -> RoboticsResult<()> {
        self.add(Polygon::new(points)?, timestamp)
    }

    /// Outline at time `t`
    pub fn query(&self, t: f64) -> RoboticsResult<Polygon> {
        if t.is_nan() {
            return Err(RoboticsError::InvalidParameter("query time is NaN".to_string()));
        }
        let key = OrderedFloat(t);

        let before = self.keyframes.range(..=key).next_back();
        let after = self.keyframes.range((Excluded(key), Unbounded)).next();

        match (before, after) {
            (Some((t0, p0)), Some((t1, p1))) => {
                let s = (t - t0.0) / (t1.0 - t0.0);
                p0.interpolate(p1, s)
            }
            (Some((_, p)), None) | (None, Some((_, p))) => Ok(p.clone()),
            (None, None) => Err(RoboticsError::geometry("object outline has no keyframes")),
        }
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Earliest and latest keyframe timestamps
    pub fn time_range(&self) -> Option<(f64, f64)> {
        let first = self.keyframes.keys().next()?;
        let last = self.keyframes.keys().next_back()?;
        Some((first.0, last.0))
    }

    pub fn keyframes(&self) -> impl Iterator<Item = (f64, &Polygon)> {
        self.keyframes.iter().map(|(t, p)| (t.0, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(offset: f64) -> Polygon {
        Polygon::from_xy(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)])
            .unwrap()
            .translated(offset, 0.0)
    }

    fn two_keyframes() -> ObjectOutline {
        let mut outline = ObjectOutline::new();
        // inserted out of order on purpose
        outline.add(square(8.0), 8.0).unwrap();
        outline.add(square(0.0), 0.0).unwrap();
        outline
    }

    #[test]
    fn test_clamping() {
        let outline = two_keyframes();
        assert_eq!(outline.query(-1.0).unwrap(), outline.query(0.0).unwrap());
        assert_eq!(outline.query(9.0).unwrap(), outline.query(8.0).unwrap());
        assert_eq!(outline.query(0.0).unwrap(), square(0.0));
        assert_eq!(outline.query(8.0).unwrap(), square(8.0));
        assert_eq!(outline.time_range(), Some((0.0, 8.0)));
    }

    #[test]
    fn test_midpoint_interpolation() {
        let outline = two_keyframes();
        let mid = outline.query(4.0).unwrap();
        let (p0, p1) = (square(0.0), square(8.0));
        for ((m, a), b) in mid.points().iter().zip(p0.points()).zip(p1.points()) {
            assert_relative_eq!(m.x, 0.5 * (a.x + b.x), epsilon = 1e-12);
            assert_relative_eq!(m.y, 0.5 * (a.y + b.y), epsilon = 1e-12);
        }
        assert_relative_eq!(mid.centroid().x, 4.5, epsilon = 1e-12);
    }

    #[test]
    fn test_query_is_repeatable() {
        let outline = two_keyframes();
        let first = outline.query(2.5).unwrap();
        for _ in 0..10 {
            assert_eq!(outline.query(2.5).unwrap(), first);
        }
    }

    #[test]
    fn test_empty_outline() {
        let outline = ObjectOutline::new();
        assert!(matches!(
            outline.query(0.0),
            Err(RoboticsError::InvalidGeometry(_))
        ));
        assert!(outline.time_range().is_none());
    }

    #[test]
    fn test_rejects_bad_keyframes() {
        let mut outline = two_keyframes();
        assert!(outline.add(square(3.0), 8.0).is_err());

        let tri = Polygon::from_xy(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]).unwrap();
        assert!(matches!(
            outline.add(tri, 4.0),
            Err(RoboticsError::ShapeMismatch { .. })
        ));
        assert_eq!(outline.len(), 2);
    }
}
