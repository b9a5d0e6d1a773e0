//! Clipper polygon boolean operations module.
//!
//! Unions and offsets on top of the geo-clipper library. Coordinates cross
//! the boundary in millimetres and are quantized by clipper at nanometre
//! resolution, so offsets as small as a few microns survive the round trip.
//!
//! These operations are used for:
//! - Outline preparation before Voronoi construction
//! - Self-intersection repair
//! - Computing the inner contour left for infill

use crate::geometry::{ExPolygon, ExPolygons, Point, Polygon};
use crate::{scale, unscale, CoordF, SCALING_FACTOR};
use geo::{Coord as GeoCoord, LineString, MultiPolygon, Polygon as GeoPolygon};
use geo_clipper::{Clipper, EndType, JoinType};

/// Factor clipper multiplies millimetre coordinates by before rounding to integers.
const CLIPPER_FACTOR: f64 = SCALING_FACTOR;

/// Join type for offset corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetJoinType {
    /// Square corners
    Square,
    /// Round corners
    Round,
    /// Mitered corners
    #[default]
    Miter,
}

impl From<OffsetJoinType> for JoinType {
    fn from(jt: OffsetJoinType) -> Self {
        match jt {
            OffsetJoinType::Square => JoinType::Square,
            // Arc tolerance in mm
            OffsetJoinType::Round => JoinType::Round(0.005),
            OffsetJoinType::Miter => JoinType::Miter(3.0),
        }
    }
}

fn ring_to_geo(points: &[Point]) -> LineString<f64> {
    let mut ring: Vec<GeoCoord<f64>> = points
        .iter()
        .map(|p| GeoCoord {
            x: unscale(p.x),
            y: unscale(p.y),
        })
        .collect();
    if let (Some(first), Some(last)) = (ring.first(), ring.last()) {
        if first != last {
            ring.push(*first);
        }
    }
    LineString::new(ring)
}

fn geo_to_ring(line: &LineString<f64>) -> Polygon {
    let mut points: Vec<Point> = line
        .coords()
        .map(|c| Point::new(scale(c.x), scale(c.y)))
        .collect();
    // Our polygons don't store the closing point
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    Polygon::from_points(points)
}

fn polygon_to_geo(poly: &Polygon) -> GeoPolygon<f64> {
    GeoPolygon::new(ring_to_geo(poly.points()), vec![])
}

fn geo_to_expolygon(geo_poly: &GeoPolygon<f64>) -> ExPolygon {
    let contour = geo_to_ring(geo_poly.exterior());
    let holes = geo_poly.interiors().iter().map(geo_to_ring).collect();
    let mut expoly = ExPolygon::with_holes(contour, holes);
    expoly.make_canonical();
    expoly
}

fn geo_multi_to_expolygons(multi: &MultiPolygon<f64>) -> ExPolygons {
    multi
        .0
        .iter()
        .map(geo_to_expolygon)
        .filter(|e| e.contour.len() >= 3)
        .collect()
}

fn polygons_to_geo_multi(polys: &[Polygon]) -> MultiPolygon<f64> {
    MultiPolygon::new(
        polys
            .iter()
            .filter(|p| p.len() >= 3)
            .map(polygon_to_geo)
            .collect(),
    )
}

// ============================================================================
// Boolean Operations
// ============================================================================

/// Union of loose polygons under the non-zero fill rule.
///
/// Clockwise rings cancel the counter-clockwise rings they lie in, so a flat
/// list of contours and holes comes back as proper ExPolygons. Self-intersecting
/// rings are resolved along the way.
pub fn union_polygons(polygons: &[Polygon]) -> ExPolygons {
    if polygons.is_empty() {
        return vec![];
    }
    let subject_geo = polygons_to_geo_multi(polygons);
    let result = subject_geo.union(&MultiPolygon::new(vec![]), CLIPPER_FACTOR);
    geo_multi_to_expolygons(&result)
}

/// Union of loose polygons under the even-odd fill rule.
///
/// A point is inside the result when an odd number of input rings contain it,
/// regardless of ring orientation.
pub fn union_even_odd(polygons: &[Polygon]) -> ExPolygons {
    let mut result: MultiPolygon<f64> = MultiPolygon::new(vec![]);
    for poly in polygons.iter().filter(|p| p.len() >= 3) {
        // Each ring on its own is filled under non-zero, xor accumulates parity
        let single = MultiPolygon::new(vec![polygon_to_geo(poly)]);
        let filled = single.union(&MultiPolygon::new(vec![]), CLIPPER_FACTOR);
        result = if result.0.is_empty() {
            filled
        } else {
            result.xor(&filled, CLIPPER_FACTOR)
        };
    }
    geo_multi_to_expolygons(&result)
}

// ============================================================================
// Offset Operations
// ============================================================================

/// Offset loose polygons by a given distance (in mm).
///
/// Ring orientation decides the direction: counter-clockwise rings grow with a
/// positive delta, clockwise rings (holes) shrink.
pub fn offset_polygons(
    polygons: &[Polygon],
    delta: CoordF,
    join_type: OffsetJoinType,
) -> ExPolygons {
    if polygons.is_empty() {
        return vec![];
    }

    let geo_multi = polygons_to_geo_multi(polygons);
    let result = geo_multi.offset(delta, join_type.into(), EndType::ClosedPolygon, CLIPPER_FACTOR);
    geo_multi_to_expolygons(&result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::to_polygons;
    use crate::Coord;

    fn make_square(x: Coord, y: Coord, size: Coord) -> ExPolygon {
        let poly = Polygon::rectangle(Point::new(x, y), Point::new(x + size, y + size));
        poly.into()
    }

    fn make_square_mm(x: f64, y: f64, size: f64) -> ExPolygon {
        make_square(crate::scale(x), crate::scale(y), crate::scale(size))
    }

    fn area_mm2(polys: &[ExPolygon]) -> f64 {
        polys.iter().map(|p| p.area()).sum::<f64>() / (SCALING_FACTOR * SCALING_FACTOR)
    }

    #[test]
    fn test_offset_polygons_grow_and_shrink() {
        let square = make_square_mm(10.0, 10.0, 20.0).contour;

        let grown = offset_polygons(&[square.clone()], 1.0, OffsetJoinType::Miter);
        assert!((area_mm2(&grown) - 484.0).abs() < 0.01);

        let shrunk = offset_polygons(&[square], -2.0, OffsetJoinType::Miter);
        assert!((area_mm2(&shrunk) - 256.0).abs() < 0.01);
    }

    #[test]
    fn test_offset_shrink_to_nothing() {
        let square = make_square_mm(10.0, 10.0, 2.0).contour;
        let shrunk = offset_polygons(&[square], -2.0, OffsetJoinType::Square);
        assert!(shrunk.is_empty());
    }

    #[test]
    fn test_offset_keeps_micron_precision() {
        let square = make_square_mm(0.0, 0.0, 10.0).contour;
        let grown = offset_polygons(&[square], 0.0125, OffsetJoinType::Miter);
        let bb = grown[0].bounding_box();
        assert_eq!(bb.min, Point::new(-12_500, -12_500));
    }

    #[test]
    fn test_union_merges_overlapping_rings() {
        let square1 = make_square_mm(0.0, 0.0, 10.0).contour;
        let square2 = make_square_mm(5.0, 0.0, 10.0).contour;

        let result = union_polygons(&[square1, square2]);
        assert_eq!(result.len(), 1);
        assert!((area_mm2(&result) - 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_union_with_hole_orientation() {
        let outer = make_square_mm(0.0, 0.0, 20.0);
        let mut hole = make_square_mm(5.0, 5.0, 10.0).contour;
        hole.make_clockwise();

        let result = union_polygons(&[outer.contour, hole]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].holes.len(), 1);
        assert!(result[0].contour.is_counter_clockwise());
        assert!(result[0].holes[0].is_clockwise());
        assert!((area_mm2(&result) - 300.0).abs() < 1e-6);
    }

    #[test]
    fn test_union_even_odd_ignores_orientation() {
        // Both rings counter-clockwise: non-zero would fill the inner one
        let outer = make_square_mm(0.0, 0.0, 20.0).contour;
        let inner = make_square_mm(5.0, 5.0, 10.0).contour;

        let result = union_even_odd(&[outer, inner]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].holes.len(), 1);
        assert!((area_mm2(&result) - 300.0).abs() < 1e-6);
    }

    #[test]
    fn test_offset_polygons_respects_holes() {
        let outer = make_square_mm(0.0, 0.0, 20.0);
        let mut hole = make_square_mm(5.0, 5.0, 10.0).contour;
        hole.make_clockwise();
        let ex = ExPolygon::with_holes(outer.contour, vec![hole]);

        let shrunk = offset_polygons(&to_polygons(&[ex]), -1.0, OffsetJoinType::Miter);
        // 18x18 outer minus 12x12 hole
        assert!((area_mm2(&shrunk) - (324.0 - 144.0)).abs() < 0.01);
    }
}
