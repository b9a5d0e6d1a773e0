//! ExPolygon type for polygons with holes.

use super::{BoundingBox, Point, Polygon};
use crate::{Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A polygon with holes (exterior polygon + interior hole polygons).
///
/// The contour is the outer boundary (counter-clockwise, positive area).
/// The holes are interior boundaries (clockwise).
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExPolygon {
    /// The outer contour of the polygon.
    pub contour: Polygon,
    /// The holes (interior contours) of the polygon.
    pub holes: Vec<Polygon>,
}

impl ExPolygon {
    /// Create a new ExPolygon with only a contour and no holes.
    #[inline]
    pub fn new(contour: Polygon) -> Self {
        Self {
            contour,
            holes: Vec::new(),
        }
    }

    /// Create a new ExPolygon with a contour and holes.
    #[inline]
    pub fn with_holes(contour: Polygon, holes: Vec<Polygon>) -> Self {
        Self { contour, holes }
    }

    /// Check if the ExPolygon is empty (no contour points).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.contour.is_empty()
    }

    /// Contour area minus hole areas.
    pub fn area(&self) -> CoordF {
        let contour_area = self.contour.area();
        let holes_area: CoordF = self.holes.iter().map(|h| h.area()).sum();
        contour_area - holes_area
    }

    /// Get the bounding box of the ExPolygon (same as contour's bounding box).
    #[inline]
    pub fn bounding_box(&self) -> BoundingBox {
        self.contour.bounding_box()
    }

    /// Inside the contour and outside every hole.
    pub fn contains_point(&self, p: &Point) -> bool {
        self.contour.contains_point(p) && !self.holes.iter().any(|h| h.contains_point(p))
    }

    /// Orient the contour counter-clockwise and every hole clockwise.
    pub fn make_canonical(&mut self) {
        self.contour.make_counter_clockwise();
        for hole in &mut self.holes {
            hole.make_clockwise();
        }
    }

    /// Convert to a vector of polygons (contour and holes).
    pub fn to_polygons(&self) -> Vec<Polygon> {
        let mut result = Vec::with_capacity(1 + self.holes.len());
        result.push(self.contour.clone());
        result.extend(self.holes.iter().cloned());
        result
    }

    /// Create a rectangular ExPolygon.
    pub fn rectangle(min: Point, max: Point) -> Self {
        Self::new(Polygon::rectangle(min, max))
    }

    /// Create a circular ExPolygon approximation.
    pub fn circle(center: Point, radius: Coord, segments: usize) -> Self {
        Self::new(Polygon::circle(center, radius, segments))
    }

    /// Get the total number of points in the ExPolygon.
    pub fn point_count(&self) -> usize {
        self.contour.len() + self.holes.iter().map(|h| h.len()).sum::<usize>()
    }
}

impl fmt::Debug for ExPolygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExPolygon(contour: {} points, {} holes)",
            self.contour.len(),
            self.holes.len()
        )
    }
}

impl From<Polygon> for ExPolygon {
    fn from(polygon: Polygon) -> Self {
        Self::new(polygon)
    }
}

/// Type alias for a collection of ExPolygons.
pub type ExPolygons = Vec<ExPolygon>;

/// Flatten ExPolygons into their contours and holes.
pub fn to_polygons(expolygons: &[ExPolygon]) -> Vec<Polygon> {
    expolygons.iter().flat_map(|e| e.to_polygons()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale;

    fn make_square_with_hole() -> ExPolygon {
        let outer = Polygon::rectangle(Point::new(0, 0), Point::new_scale(10.0, 10.0));
        let mut hole = Polygon::rectangle(Point::new_scale(3.0, 3.0), Point::new_scale(7.0, 7.0));
        hole.make_clockwise();
        ExPolygon::with_holes(outer, vec![hole])
    }

    #[test]
    fn test_expolygon_area() {
        let ex = make_square_with_hole();
        let area_mm2 = ex.area() / (crate::SCALING_FACTOR * crate::SCALING_FACTOR);
        assert!((area_mm2 - 84.0).abs() < 1e-6);
    }

    #[test]
    fn test_expolygon_contains_point() {
        let ex = make_square_with_hole();
        assert!(ex.contains_point(&Point::new_scale(1.0, 1.0)));
        assert!(!ex.contains_point(&Point::new_scale(5.0, 5.0)));
        assert!(!ex.contains_point(&Point::new_scale(11.0, 5.0)));
    }

    #[test]
    fn test_make_canonical() {
        let mut ex = make_square_with_hole();
        ex.contour.reverse();
        ex.holes[0].reverse();
        ex.make_canonical();
        assert!(ex.contour.is_counter_clockwise());
        assert!(ex.holes[0].is_clockwise());
    }

    #[test]
    fn test_to_polygons() {
        let ex = make_square_with_hole();
        let polys = to_polygons(&[ex.clone(), ExPolygon::circle(Point::zero(), scale(1.0), 16)]);
        assert_eq!(polys.len(), 3);
        assert_eq!(ex.point_count(), 8);
    }
}
