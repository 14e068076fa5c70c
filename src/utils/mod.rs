//! Utility modules for trajectory_optimizer

pub mod visualization;

pub use visualization::{colors, time_color, PathStyle, PointStyle, Visualizer};
