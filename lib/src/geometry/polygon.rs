//! Polygon type for closed contours.

use super::{BoundingBox, Line, Point};
use crate::{Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut, Index, IndexMut};

/// A closed polygon defined by a sequence of points.
///
/// The polygon is implicitly closed - the last point connects back to the first.
/// Points should be ordered counter-clockwise for outer contours (positive area)
/// and clockwise for holes (negative area).
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    /// Create a new empty polygon.
    #[inline]
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Create a polygon from a vector of points.
    #[inline]
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Get the points of this polygon.
    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Get a mutable reference to the points.
    #[inline]
    pub fn points_mut(&mut self) -> &mut Vec<Point> {
        &mut self.points
    }

    /// Get a point by index, wrapping around.
    #[inline]
    pub fn point_at(&self, index: usize) -> Point {
        self.points[index % self.points.len()]
    }

    /// Get the edge starting at the given point index.
    #[inline]
    pub fn edge(&self, index: usize) -> Line {
        Line::new(self.point_at(index), self.point_at(index + 1))
    }

    /// Get all edges of the polygon.
    pub fn edges(&self) -> Vec<Line> {
        if self.points.len() < 2 {
            return Vec::new();
        }
        (0..self.points.len()).map(|i| self.edge(i)).collect()
    }

    /// Calculate the signed area of the polygon.
    /// Positive for counter-clockwise (exterior), negative for clockwise (hole).
    /// Uses the shoelace formula.
    pub fn signed_area(&self) -> CoordF {
        if self.points.len() < 3 {
            return 0.0;
        }

        let mut sum: i128 = 0;
        for i in 0..self.points.len() {
            let j = (i + 1) % self.points.len();
            sum += self.points[i].x as i128 * self.points[j].y as i128;
            sum -= self.points[j].x as i128 * self.points[i].y as i128;
        }

        sum as CoordF / 2.0
    }

    /// Calculate the unsigned area of the polygon.
    #[inline]
    pub fn area(&self) -> CoordF {
        self.signed_area().abs()
    }

    /// Check if the polygon is counter-clockwise (positive area).
    #[inline]
    pub fn is_counter_clockwise(&self) -> bool {
        self.signed_area() > 0.0
    }

    /// Check if the polygon is clockwise (negative area).
    #[inline]
    pub fn is_clockwise(&self) -> bool {
        self.signed_area() < 0.0
    }

    /// Ensure the polygon is counter-clockwise by reversing if necessary.
    pub fn make_counter_clockwise(&mut self) {
        if self.is_clockwise() {
            self.reverse();
        }
    }

    /// Ensure the polygon is clockwise by reversing if necessary.
    pub fn make_clockwise(&mut self) {
        if self.is_counter_clockwise() {
            self.reverse();
        }
    }

    /// Reverse the order of points in the polygon.
    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// Get the bounding box of the polygon.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.points)
    }

    /// Check if a point is inside the polygon using the ray casting algorithm.
    pub fn contains_point(&self, p: &Point) -> bool {
        if self.points.len() < 3 {
            return false;
        }

        let mut inside = false;
        let mut j = self.points.len() - 1;

        for i in 0..self.points.len() {
            let pi = &self.points[i];
            let pj = &self.points[j];

            if ((pi.y > p.y) != (pj.y > p.y))
                && (p.x as i128)
                    < (pj.x as i128 - pi.x as i128) * (p.y as i128 - pi.y as i128)
                        / (pj.y as i128 - pi.y as i128)
                        + pi.x as i128
            {
                inside = !inside;
            }
            j = i;
        }

        inside
    }

    /// Find the closest point on the polygon boundary to the given point.
    pub fn closest_point(&self, p: &Point) -> Point {
        let mut closest = self.points.first().copied().unwrap_or_default();
        let mut min_dist = i128::MAX;

        for edge in self.edges() {
            let (proj, dist) = edge.closest_point(p);
            if dist < min_dist {
                min_dist = dist;
                closest = proj;
            }
        }

        closest
    }

    /// Translate the polygon by a vector.
    pub fn translate(&mut self, v: Point) {
        for p in &mut self.points {
            *p += v;
        }
    }

    /// Rotate the polygon around the origin (radians).
    pub fn rotate(&mut self, angle: CoordF) {
        let (sin_a, cos_a) = angle.sin_cos();
        for p in &mut self.points {
            *p = p.rotate_by_cos_sin(cos_a, sin_a);
        }
    }

    /// Create a rectangular polygon.
    pub fn rectangle(min: Point, max: Point) -> Self {
        Self::from_points(vec![
            min,
            Point::new(max.x, min.y),
            max,
            Point::new(min.x, max.y),
        ])
    }

    /// Create a regular polygon with n sides, centered at origin.
    pub fn regular(n: usize, radius: Coord) -> Self {
        if n < 3 {
            return Self::new();
        }

        let mut points = Vec::with_capacity(n);
        for i in 0..n {
            let angle = 2.0 * std::f64::consts::PI * i as CoordF / n as CoordF;
            points.push(Point::new(
                (radius as CoordF * angle.cos()).round() as Coord,
                (radius as CoordF * angle.sin()).round() as Coord,
            ));
        }

        Self::from_points(points)
    }

    /// Create a circle approximation with n segments.
    pub fn circle(center: Point, radius: Coord, segments: usize) -> Self {
        let mut poly = Self::regular(segments, radius);
        poly.translate(center);
        poly
    }
}

impl fmt::Debug for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Polygon({} points)", self.points.len())
    }
}

impl Deref for Polygon {
    type Target = Vec<Point>;

    fn deref(&self) -> &Self::Target {
        &self.points
    }
}

impl DerefMut for Polygon {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.points
    }
}

impl Index<usize> for Polygon {
    type Output = Point;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl IndexMut<usize> for Polygon {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.points[index]
    }
}

impl FromIterator<Point> for Polygon {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Polygon {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl From<Vec<Point>> for Polygon {
    fn from(points: Vec<Point>) -> Self {
        Self::from_points(points)
    }
}

/// A collection of polygons.
pub type Polygons = Vec<Polygon>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale;

    fn make_square() -> Polygon {
        Polygon::rectangle(Point::new(0, 0), Point::new(scale(10.0), scale(10.0)))
    }

    #[test]
    fn test_polygon_area() {
        let square = make_square();
        let area_mm2 = square.area() / (crate::SCALING_FACTOR * crate::SCALING_FACTOR);
        assert!((area_mm2 - 100.0).abs() < 1e-6);
        assert!(square.is_counter_clockwise());
    }

    #[test]
    fn test_polygon_orientation() {
        let mut square = make_square();
        square.make_clockwise();
        assert!(square.is_clockwise());
        square.make_counter_clockwise();
        assert!(square.is_counter_clockwise());
    }

    #[test]
    fn test_polygon_contains_point() {
        let square = make_square();
        assert!(square.contains_point(&Point::new_scale(5.0, 5.0)));
        assert!(!square.contains_point(&Point::new_scale(15.0, 5.0)));
    }

    #[test]
    fn test_polygon_closest_point() {
        let square = make_square();
        let closest = square.closest_point(&Point::new_scale(5.0, -2.0));
        assert_eq!(closest, Point::new_scale(5.0, 0.0));
    }

    #[test]
    fn test_polygon_circle() {
        let circle = Polygon::circle(Point::new_scale(5.0, 5.0), scale(2.0), 32);
        assert_eq!(circle.len(), 32);
        assert!(circle.contains_point(&Point::new_scale(5.0, 5.0)));
        assert!(circle.is_counter_clockwise());
    }
}
