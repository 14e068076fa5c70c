//! Planar geometry: polygons, reference lines and moving obstacle outlines

pub mod line;
pub mod outline;
pub mod polygon;

pub use line::ReferenceLine;
pub use outline::ObjectOutline;
pub use polygon::{segment_distance, Polygon};
