//! trajectory_optimizer - nonlinear least-squares trajectory optimization
//!
//! A horizon of control inputs is rolled out through a vehicle model and
//! scored by weighted cost functors (jerk, reference tracking, input bounds,
//! object clearance). The controls are solved with Levenberg-Marquardt over
//! numerically differentiated residuals.

// Core modules
pub mod common;
pub mod utils;

// Optimization modules
pub mod costs;
pub mod dynamics;
pub mod geometry;
pub mod optimizer;

// Re-export common types for convenience
pub use common::{keys, Parameters, Point2D, StateLayout};
pub use common::{CostFunctor, DynamicModel};
pub use common::{RoboticsError, RoboticsResult};
pub use optimizer::{Optimizer, OptimizerState, SolverReport};
