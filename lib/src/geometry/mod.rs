//! Geometry primitives in scaled integer coordinates.
//!
//! Coordinates are `i64` nanometres (see [`crate::SCALING_FACTOR`]).
//! Outer contours are counter-clockwise and holes clockwise.

mod bounding_box;
mod expolygon;
mod grid;
mod line;
mod point;
mod polygon;

pub use bounding_box::BoundingBox;
pub use expolygon::{to_polygons, ExPolygon, ExPolygons};
pub use grid::{SparseLineGrid, SparsePointGrid};
pub use line::{Line, Lines};
pub use point::{Point, PointF, Points};
pub use polygon::{Polygon, Polygons};
