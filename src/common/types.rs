//! Common types used throughout trajectory_optimizer

use nalgebra::{DMatrix, Vector2};
use std::f64::consts::PI;
use std::ops::{Add, Mul, Sub};

use crate::common::params::{keys, Parameters};

/// 2D point representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn dot(&self, other: &Point2D) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// z component of the 3D cross product
    pub fn cross(&self, other: &Point2D) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn norm_squared(&self) -> f64 {
        self.dot(self)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// `self + s * (other - self)`
    pub fn lerp(&self, other: &Point2D, s: f64) -> Point2D {
        Point2D::new(self.x + s * (other.x - self.x), self.y + s * (other.y - self.y))
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl Add for Point2D {
    type Output = Point2D;

    fn add(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2D {
    type Output = Point2D;

    fn sub(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point2D {
    type Output = Point2D;

    fn mul(self, rhs: f64) -> Point2D {
        Point2D::new(self.x * rhs, self.y * rhs)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from(tuple: (f64, f64)) -> Self {
        Self { x: tuple.0, y: tuple.1 }
    }
}

impl From<Vector2<f64>> for Point2D {
    fn from(v: Vector2<f64>) -> Self {
        Self { x: v[0], y: v[1] }
    }
}

/// Column indices of the quantities cost functors read from a trajectory row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateLayout {
    pub x: usize,
    pub y: usize,
    /// Angular column, wrapped when differenced
    pub heading: Option<usize>,
    pub speed: Option<usize>,
}

impl StateLayout {
    /// Planar position of trajectory row `row`
    pub fn position(&self, trajectory: &DMatrix<f64>, row: usize) -> Point2D {
        Point2D::new(trajectory[(row, self.x)], trajectory[(row, self.y)])
    }
}

/// Discrete integration scheme of a dynamics model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Integrator {
    /// Closed-form one-step update at `dt`
    #[default]
    Explicit,
    /// Classic fourth-order Runge-Kutta over the continuous derivative
    RungeKutta4,
}

impl Integrator {
    /// Scheme stored under [`keys::INTEGRATOR`], or `default` when unset or unknown
    pub fn from_params(params: &Parameters, default: Integrator) -> Self {
        if !params.contains(keys::INTEGRATOR) {
            return default;
        }
        match params.get_usize(keys::INTEGRATOR, usize::MAX) {
            0 => Integrator::Explicit,
            1 => Integrator::RungeKutta4,
            _ => default,
        }
    }
}

/// Sizes of one residual block, fixed for the lifetime of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProblemShape {
    pub seed_rows: usize,
    pub trajectory_rows: usize,
    pub control_rows: usize,
    /// Control rows estimated from the seed window
    pub prior_rows: usize,
    pub state_dim: usize,
    pub control_dim: usize,
}

/// Read-only inputs handed to every cost functor evaluation.
#[derive(Debug, Clone, Copy)]
pub struct CostContext<'a> {
    pub trajectory: &'a DMatrix<f64>,
    pub controls: &'a DMatrix<f64>,
    /// Controls implied by consecutive seed rows, oldest first
    pub prior_controls: &'a DMatrix<f64>,
    pub seed_rows: usize,
    pub dt: f64,
    pub layout: StateLayout,
}

impl<'a> CostContext<'a> {
    pub fn shape(&self) -> ProblemShape {
        ProblemShape {
            seed_rows: self.seed_rows,
            trajectory_rows: self.trajectory.nrows(),
            control_rows: self.controls.nrows(),
            prior_rows: self.prior_controls.nrows(),
            state_dim: self.trajectory.ncols(),
            control_dim: self.controls.ncols(),
        }
    }
}

/// Normalize angle to [-PI, PI]. Non-finite input yields NaN.
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return f64::NAN;
    }
    if (-PI..=PI).contains(&angle) {
        return angle;
    }
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_ops() {
        let a = Point2D::new(1.0, 2.0);
        let b = Point2D::new(4.0, 6.0);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!((b - a).cross(&Point2D::new(0.0, 1.0)), 3.0);
        assert_eq!(a.lerp(&b, 0.5), Point2D::new(2.5, 4.0));
        assert_eq!(a + b * 2.0, Point2D::new(9.0, 14.0));
    }

    #[test]
    fn test_layout_position() {
        let traj = DMatrix::from_row_slice(2, 4, &[0.0, 1.0, 0.0, 5.0, 2.0, 3.0, 0.1, 5.0]);
        let layout = StateLayout {
            x: 0,
            y: 1,
            heading: Some(2),
            speed: Some(3),
        };
        assert_eq!(layout.position(&traj, 1), Point2D::new(2.0, 3.0));
    }

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(0.0) - 0.0).abs() < 1e-10);
        assert!((normalize_angle(PI) - PI).abs() < 1e-10);
        assert!((normalize_angle(-PI) - (-PI)).abs() < 1e-10);
        assert!((normalize_angle(3.0 * PI).abs() - PI).abs() < 1e-10);
        assert!((normalize_angle(-3.0 * PI).abs() - PI).abs() < 1e-10);
        assert!((normalize_angle(2.5 * PI) - 0.5 * PI).abs() < 1e-10);
        assert!((normalize_angle(-2.5 * PI) + 0.5 * PI).abs() < 1e-10);
    }

    #[test]
    fn test_normalize_huge_and_non_finite_angles() {
        for angle in [1e17, -1e17, 1e300, f64::MAX] {
            let a = normalize_angle(angle);
            assert!(a.is_finite());
            assert!((-PI..=PI).contains(&a));
        }
        assert!(normalize_angle(f64::INFINITY).is_nan());
        assert!(normalize_angle(f64::NEG_INFINITY).is_nan());
        assert!(normalize_angle(f64::NAN).is_nan());
    }
}
