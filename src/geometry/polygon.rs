//! Closed polygon rings and point-to-polygon distances

use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::common::{Point2D, RoboticsError, RoboticsResult};

/// Closed ring of 2D points, first point repeated as last.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<Point2D>,
}

impl Polygon {
    /// Build a polygon from an open or closed ring.
    ///
    /// An open ring is closed by appending its first point. Fails if any
    /// coordinate is non-finite or fewer than 3 distinct points remain.
    pub fn new(mut points: Vec<Point2D>) -> RoboticsResult<Self> {
        if points.iter().any(|p| !p.is_finite()) {
            return Err(RoboticsError::geometry("polygon has non-finite coordinates"));
        }

        let distinct = points
            .iter()
            .map(|p| (OrderedFloat(p.x), OrderedFloat(p.y)))
            .unique()
            .count();
        if distinct < 3 {
            return Err(RoboticsError::geometry(format!(
                "polygon needs at least 3 distinct points, got {}",
                distinct
            )));
        }

        if points.first() != points.last() {
            points.push(points[0]);
        }
        Ok(Self { points })
    }

    pub fn from_xy(coords: &[(f64, f64)]) -> RoboticsResult<Self> {
        Self::new(coords.iter().map(|&c| Point2D::from(c)).collect())
    }

    /// Axis-aligned rectangle, counter-clockwise
    pub fn rectangle(min: Point2D, max: Point2D) -> RoboticsResult<Self> {
        Self::from_xy(&[
            (min.x, min.y),
            (max.x, min.y),
            (max.x, max.y),
            (min.x, max.y),
        ])
    }

    /// Ring points including the closing point
    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    /// Number of ring points including the closing point
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn edges(&self) -> impl Iterator<Item = (Point2D, Point2D)> + '_ {
        self.points.iter().copied().tuple_windows()
    }

    /// Even-odd ray casting test
    pub fn contains(&self, p: &Point2D) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Unsigned distance to the boundary
    pub fn boundary_distance(&self, p: &Point2D) -> f64 {
        self.edges()
            .map(|(a, b)| segment_distance(p, &a, &b))
            .fold(f64::INFINITY, f64::min)
    }

    /// Distance to the boundary, negative inside
    pub fn signed_distance(&self, p: &Point2D) -> f64 {
        let d = self.boundary_distance(p);
        if self.contains(p) {
            -d
        } else {
            d
        }
    }

    /// Vertex average, closing point excluded
    pub fn centroid(&self) -> Point2D {
        let ring = &self.points[..self.points.len() - 1];
        let n = ring.len() as f64;
        let sum = ring.iter().fold(Point2D::origin(), |acc, p| acc + *p);
        sum * (1.0 / n)
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Polygon {
        let offset = Point2D::new(dx, dy);
        Polygon {
            points: self.points.iter().map(|p| *p + offset).collect(),
        }
    }

    /// Per-vertex linear interpolation `self + s * (other - self)`
    pub fn interpolate(&self, other: &Polygon, s: f64) -> RoboticsResult<Polygon> {
        if self.points.len() != other.points.len() {
            return Err(RoboticsError::ShapeMismatch {
                expected: self.points.len(),
                actual: other.points.len(),
            });
        }
        Ok(Polygon {
            points: self
                .points
                .iter()
                .zip(&other.points)
                .map(|(a, b)| a.lerp(b, s))
                .collect(),
        })
    }
}

/// Distance from `p` to the segment `a`-`b`
pub fn segment_distance(p: &Point2D, a: &Point2D, b: &Point2D) -> f64 {
    let ab = *b - *a;
    let len2 = ab.norm_squared();
    if len2 == 0.0 {
        return p.distance(a);
    }
    let t = ((*p - *a).dot(&ab) / len2).clamp(0.0, 1.0);
    p.distance(&a.lerp(b, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_square() -> Polygon {
        Polygon::from_xy(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]).unwrap()
    }

    #[test]
    fn test_auto_close() {
        let poly = unit_square();
        assert_eq!(poly.len(), 5);
        assert_eq!(poly.points()[0], poly.points()[4]);

        let closed =
            Polygon::from_xy(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)])
                .unwrap();
        assert_eq!(closed, poly);
    }

    #[test]
    fn test_too_few_points() {
        let err = Polygon::from_xy(&[(0.0, 0.0), (1.0, 0.0), (0.0, 0.0)]).unwrap_err();
        assert!(matches!(err, RoboticsError::InvalidGeometry(_)));

        let err = Polygon::from_xy(&[(0.0, 0.0), (1.0, f64::NAN), (0.0, 1.0)]).unwrap_err();
        assert!(matches!(err, RoboticsError::InvalidGeometry(_)));
    }

    #[test]
    fn test_signed_distance() {
        let poly = unit_square();
        assert_relative_eq!(poly.signed_distance(&Point2D::new(0.5, 0.5)), -0.5);
        assert_relative_eq!(poly.signed_distance(&Point2D::new(0.5, 0.9)), -0.1, epsilon = 1e-12);
        assert_relative_eq!(poly.signed_distance(&Point2D::new(3.0, 0.5)), 2.0);
        assert_relative_eq!(poly.signed_distance(&Point2D::new(4.0, 5.0)), 5.0);
    }

    #[test]
    fn test_centroid_and_translate() {
        let poly = unit_square().translated(2.0, -1.0);
        assert_relative_eq!(poly.centroid().x, 2.5);
        assert_relative_eq!(poly.centroid().y, -0.5);
        assert!(poly.contains(&Point2D::new(2.5, -0.5)));
    }

    #[test]
    fn test_interpolate_mismatch() {
        let tri = Polygon::from_xy(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]).unwrap();
        let err = unit_square().interpolate(&tri, 0.5).unwrap_err();
        assert!(matches!(
            err,
            RoboticsError::ShapeMismatch {
                expected: 5,
                actual: 4
            }
        ));
    }
}
