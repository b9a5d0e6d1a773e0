//! Line segment type.

use super::{Point, PointF};
use crate::{Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A line segment defined by two endpoints.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Line {
    pub a: Point,
    pub b: Point,
}

impl Line {
    /// Create a new line segment from two points.
    #[inline]
    pub const fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    /// Get the direction vector (b - a).
    #[inline]
    pub fn direction(&self) -> Point {
        self.b - self.a
    }

    /// Get the direction vector as floating-point (scaled units).
    #[inline]
    pub fn direction_f(&self) -> PointF {
        self.direction().to_pointf()
    }

    /// Calculate the length of the line segment.
    #[inline]
    pub fn length(&self) -> CoordF {
        self.a.distance(&self.b)
    }

    /// Calculate the squared length.
    #[inline]
    pub fn length_squared(&self) -> i128 {
        self.a.distance_squared(&self.b)
    }

    /// Closest point on this segment and its squared distance to `p`.
    pub fn closest_point(&self, p: &Point) -> (Point, i128) {
        let proj = p.project_onto_segment(self.a, self.b);
        (proj, p.distance_squared(&proj))
    }

    /// Static method: squared distance from a point to an infinite line.
    pub fn distance_to_infinite_squared(p: Point, a: Point, b: Point) -> f64 {
        let dir = b - a;
        let len_sq = dir.length_squared();
        if len_sq == 0 {
            return p.distance_squared(&a) as f64;
        }

        // Distance² = cross(b-a, p-a)² / |b-a|²
        let cross = dir.cross(&(p - a)) as f64;
        cross * cross / len_sq as f64
    }

    /// Static method: distance from a point to an infinite line.
    pub fn distance_to_infinite(p: Point, a: Point, b: Point) -> f64 {
        Self::distance_to_infinite_squared(p, a, b).sqrt()
    }

    /// Calculate the intersection point of two infinite lines.
    pub fn intersection_infinite(&self, other: &Line) -> Option<Point> {
        let d1 = self.direction();
        let d2 = other.direction();

        let cross = d1.cross(&d2);
        if cross == 0 {
            // Lines are parallel
            return None;
        }

        let diff = other.a - self.a;
        let t = diff.cross(&d2) as CoordF / cross as CoordF;

        Some(Point::new(
            (self.a.x as CoordF + t * d1.x as CoordF).round() as Coord,
            (self.a.y as CoordF + t * d1.y as CoordF).round() as Coord,
        ))
    }

    /// Get the CCW value of a point relative to this line.
    /// Positive if the point is to the left of the line (a -> b direction).
    #[inline]
    pub fn ccw(&self, p: &Point) -> i128 {
        self.a.ccw(&self.b, p)
    }
}

impl fmt::Debug for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line({:?} -> {:?})", self.a, self.b)
    }
}

impl From<(Point, Point)> for Line {
    #[inline]
    fn from((a, b): (Point, Point)) -> Self {
        Self::new(a, b)
    }
}

/// A collection of lines.
pub type Lines = Vec<Line>;
