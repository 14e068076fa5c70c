//! Reference polyline with signed lateral distance

use itertools::Itertools;

use crate::common::{Point2D, RoboticsError, RoboticsResult};

/// Polyline of at least two points.
///
/// The first and last segments extend infinitely, so a two-point line
/// behaves as an infinite line.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceLine {
    points: Vec<Point2D>,
}

impl ReferenceLine {
    pub fn new(points: Vec<Point2D>) -> RoboticsResult<Self> {
        if points.len() < 2 {
            return Err(RoboticsError::geometry(format!(
                "reference line needs at least 2 points, got {}",
                points.len()
            )));
        }
        if points.iter().any(|p| !p.is_finite()) {
            return Err(RoboticsError::geometry("reference line has non-finite coordinates"));
        }
        if points.iter().tuple_windows().any(|(a, b)| a == b) {
            return Err(RoboticsError::geometry("reference line has a zero-length segment"));
        }
        Ok(Self { points })
    }

    pub fn from_xy(coords: &[(f64, f64)]) -> RoboticsResult<Self> {
        Self::new(coords.iter().map(|&c| Point2D::from(c)).collect())
    }

    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    /// Signed lateral distance, positive to the left of the direction of travel
    pub fn signed_distance(&self, p: &Point2D) -> f64 {
        let last = self.points.len() - 2;
        let mut best = f64::INFINITY;

        for (i, (a, b)) in self.points.iter().tuple_windows().enumerate() {
            let ab = *b - *a;
            let ap = *p - *a;
            let t = ap.dot(&ab) / ab.norm_squared();

            let d = if t < 0.0 && i > 0 {
                signed_corner(&ap, &ab)
            } else if t > 1.0 && i < last {
                signed_corner(&(*p - *b), &ab)
            } else {
                ab.cross(&ap) / ab.norm_squared().sqrt()
            };

            if d.abs() < best.abs() {
                best = d;
            }
        }
        best
    }
}

fn signed_corner(offset: &Point2D, direction: &Point2D) -> f64 {
    let d = offset.norm_squared().sqrt();
    if direction.cross(offset) < 0.0 {
        -d
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_two_point_line() {
        let line = ReferenceLine::from_xy(&[(0.0, 4.0), (1000.0, 4.0)]).unwrap();
        assert_eq!(line.signed_distance(&Point2D::new(12.3, 4.0)), 0.0);
        assert_relative_eq!(line.signed_distance(&Point2D::new(5.0, 6.0)), 2.0);
        assert_relative_eq!(line.signed_distance(&Point2D::new(5.0, 1.0)), -3.0);
        // extends past both ends
        assert_relative_eq!(line.signed_distance(&Point2D::new(-50.0, 5.0)), 1.0);
        assert_relative_eq!(line.signed_distance(&Point2D::new(2000.0, 3.0)), -1.0);
    }

    #[test]
    fn test_polyline_corner() {
        let line = ReferenceLine::from_xy(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]).unwrap();
        assert_relative_eq!(line.signed_distance(&Point2D::new(5.0, 1.0)), 1.0);
        assert_relative_eq!(line.signed_distance(&Point2D::new(11.0, 5.0)), -1.0);
        // outside the corner, closest to the shared vertex
        assert_relative_eq!(line.signed_distance(&Point2D::new(13.0, -4.0)), -5.0);
    }

    #[test]
    fn test_invalid_line() {
        assert!(ReferenceLine::from_xy(&[(0.0, 0.0)]).is_err());
        assert!(ReferenceLine::from_xy(&[(0.0, 0.0), (0.0, 0.0)]).is_err());
    }
}
