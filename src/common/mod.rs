//! Common types, traits, parameters and error definitions for trajectory_optimizer
//!
//! This module provides the foundational building blocks shared by the
//! dynamics models, cost functors and the optimizer.

pub mod types;
pub mod traits;
pub mod error;
pub mod params;

pub use types::*;
pub use traits::*;
pub use error::*;
pub use params::{keys, Parameters};
