//! A centerline vertex with its local extrusion width.

use crate::geometry::Point;
use crate::{unscale, Coord, CoordF};

/// One vertex of a variable-width toolpath.
///
/// The width is linearly interpolated towards the next junction of the line.
/// Junctions with zero width are markers of the inner contour and are never
/// printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtrusionJunction {
    /// Centerline position.
    pub position: Point,
    /// Extrusion width at this position.
    pub width: Coord,
    /// Wall index counted from the outline inwards.
    pub perimeter_index: usize,
}

impl ExtrusionJunction {
    pub fn new(position: Point, width: Coord, perimeter_index: usize) -> Self {
        Self {
            position,
            width,
            perimeter_index,
        }
    }

    #[inline]
    pub fn width_mm(&self) -> CoordF {
        unscale(self.width)
    }

    /// Whether this junction only traces the edge of the walled area.
    #[inline]
    pub fn is_marker(&self) -> bool {
        self.width == 0
    }

    /// Squared distance between the two positions.
    #[inline]
    pub fn distance_squared_to(&self, other: &ExtrusionJunction) -> i128 {
        self.position.distance_squared(&other.position)
    }

    /// Same position within `tolerance`.
    pub fn coincides_with(&self, other: &ExtrusionJunction, tolerance: Coord) -> bool {
        (self.position - other.position).shorter_than(tolerance)
    }
}

/// Junctions of one edge, ordered from the thick end towards the thin end.
pub type ExtrusionJunctions = Vec<ExtrusionJunction>;
