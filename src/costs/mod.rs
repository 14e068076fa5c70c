//! Cost functors producing weighted least-squares residual blocks
//!
//! Every functor implements [`CostFunctor`](crate::common::CostFunctor) and
//! reads its default weight from [`Parameters`](crate::common::Parameters).

pub mod input;
pub mod jerk;
pub mod reference;
pub mod reference_line;
pub mod speed;
pub mod static_object;

pub use input::InputCost;
pub use jerk::{JerkCost, JerkSource};
pub use reference::{ReferenceCost, ReferenceMatching};
pub use reference_line::ReferenceLineCost;
pub use speed::SpeedCost;
pub use static_object::StaticObjectCost;
