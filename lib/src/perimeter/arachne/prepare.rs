//! Outline cleanup before Voronoi construction.
//!
//! The diagram builder needs simple polygons without self intersections or
//! near-self intersections, and without vertices closer than a few microns.
//! These passes get arbitrary slice outlines into that shape.

use crate::clipper::{offset_polygons, union_even_odd, union_polygons, OffsetJoinType};
use crate::geometry::{to_polygons, Line, Point, Polygon, Polygons, SparseLineGrid};
use crate::{scale, unscale, Coord};
use log::debug;
use std::f64::consts::PI;

/// Segments shorter than this are always removed by [`simplify_polygon`].
const ALWAYS_REMOVE_LENGTH: Coord = 5_000;

/// Height below which a vertex counts as colinear.
const COLINEAR_DISTANCE: Coord = 5_000;

/// Cell size of the segment grid used to find near-self intersections.
const SELF_INTERSECTION_GRID: f64 = 2.0;

/// Angular tolerance (radians) for [`remove_colinear_edges`].
pub const COLINEAR_ANGLE: f64 = 0.005;

/// Clean `outline` for the skeletal trapezoidation.
///
/// `small_area_length` is the side of the smallest square area that is kept.
pub fn prepare_outline(
    outline: &[Polygon],
    max_resolution: Coord,
    max_deviation: Coord,
    small_area_length: Coord,
) -> Polygons {
    let epsilon = max_deviation / 2 - 1;
    let mut prepared: Polygons = outline.iter().filter(|p| p.len() >= 3).cloned().collect();
    if epsilon > 0 {
        let epsilon_mm = unscale(epsilon);
        for delta in [-epsilon_mm, 2.0 * epsilon_mm, -epsilon_mm] {
            prepared = to_polygons(&offset_polygons(&prepared, delta, OffsetJoinType::Miter));
        }
    }

    simplify_polygons(&mut prepared, max_resolution, max_deviation);
    fix_self_intersections(epsilon, &mut prepared);
    remove_degenerate_verts(&mut prepared);
    remove_colinear_edges(&mut prepared, COLINEAR_ANGLE);
    // Removing colinear vertices can make new near-self intersections
    fix_self_intersections(epsilon, &mut prepared);
    remove_degenerate_verts(&mut prepared);
    let small_area = small_area_length as f64 * small_area_length as f64;
    remove_small_areas(&mut prepared, small_area, false);

    let prepared = to_polygons(&union_polygons(&prepared));
    debug!(
        "Prepared outline: {} polygons with {} points",
        prepared.len(),
        prepared.iter().map(|p| p.len()).sum::<usize>()
    );
    prepared
}

/// Remove vertices connected to segments shorter than `smallest_line_segment`
/// as long as the outline moves less than `allowed_error_distance`. Vertices
/// that deviate less than 5 µm go regardless of their segment lengths.
///
/// Returns false when fewer than three vertices remain.
pub fn simplify_polygon(
    polygon: &mut Polygon,
    smallest_line_segment_squared: i128,
    allowed_error_distance_squared: i128,
) -> bool {
    let points = polygon.points();
    if points.len() < 3 {
        polygon.points_mut().clear();
        return false;
    }
    if points.len() == 3 {
        return true;
    }

    let len = points.len();
    let mut new_path: Vec<Point> = Vec::with_capacity(len);
    let mut previous = points[len - 1];
    let mut previous_previous = points[len - 2];

    // Twice the area of the fan between the origin and the removed
    // segments, so the cut-off area is known without revisiting them.
    let mut accumulated_area_removed = previous.cross(&points[0]);

    for point_idx in 0..len {
        let mut current = points[point_idx];
        let next = if point_idx + 1 < len {
            points[point_idx + 1]
        } else if new_path.len() > 1 {
            new_path[0]
        } else {
            points[(point_idx + 1) % len]
        };

        let removed_area_next = current.cross(&next);
        let negative_area_closing = next.cross(&previous);
        accumulated_area_removed += removed_area_next;

        let length2 = current.distance_squared(&previous);
        if length2 < (ALWAYS_REMOVE_LENGTH as i128).pow(2) {
            continue;
        }

        let area_removed_so_far = accumulated_area_removed + negative_area_closing;
        let base_length_2 = next.distance_squared(&previous);
        if base_length_2 == 0 {
            continue;
        }

        let height_2 =
            ((area_removed_so_far as f64) * (area_removed_so_far as f64) / base_length_2 as f64) as i128;
        if height_2 <= (COLINEAR_DISTANCE as i128).pow(2)
            && Line::distance_to_infinite(current, previous, next) <= COLINEAR_DISTANCE as f64
        {
            continue;
        }

        if length2 < smallest_line_segment_squared && height_2 <= allowed_error_distance_squared {
            let next_length2 = current.distance_squared(&next);
            if next_length2 <= 4 * smallest_line_segment_squared {
                continue;
            }
            // The next segment is long: move the corner onto the
            // intersection of the neighbouring segments instead.
            let intersection = Line::new(previous_previous, previous)
                .intersection_infinite(&Line::new(current, next))
                .filter(|&p| {
                    Line::distance_to_infinite_squared(p, previous, current)
                        <= allowed_error_distance_squared as f64
                        && p.distance_squared(&previous) <= smallest_line_segment_squared
                        && p.distance_squared(&next) <= smallest_line_segment_squared
                });
            if let Some(intersection) = intersection {
                current = intersection;
                if new_path.pop().is_some() {
                    previous = previous_previous;
                }
            }
        }

        accumulated_area_removed = removed_area_next;
        previous_previous = previous;
        previous = current;
        new_path.push(current);
    }

    *polygon.points_mut() = new_path;
    polygon.len() >= 3
}

/// [`simplify_polygon`] on every polygon, dropping the ones that collapse.
pub fn simplify_polygons(polygons: &mut Polygons, smallest_line_segment: Coord, allowed_error_distance: Coord) {
    let smallest_squared = smallest_line_segment as i128 * smallest_line_segment as i128;
    let allowed_squared = allowed_error_distance as i128 * allowed_error_distance as i128;
    polygons.retain_mut(|polygon| simplify_polygon(polygon, smallest_squared, allowed_squared));
}

/// Move vertices that lie within `epsilon / 2` of a segment they don't belong
/// to a little away from it, then resolve real self intersections with an
/// even-odd union.
pub fn fix_self_intersections(epsilon: Coord, polygons: &mut Polygons) {
    if epsilon >= 1 {
        let half_epsilon = (epsilon + 1) / 2;
        let half_epsilon_squared = half_epsilon as i128 * half_epsilon as i128;
        let move_dist = (half_epsilon - 2).max(2);

        let mut grid = SparseLineGrid::new(scale(SELF_INTERSECTION_GRID));
        for (poly_idx, polygon) in polygons.iter().enumerate() {
            for (point_idx, edge) in polygon.edges().into_iter().enumerate() {
                grid.insert(edge.a, edge.b, (poly_idx, point_idx));
            }
        }

        for poly_idx in 0..polygons.len() {
            let path_len = polygons[poly_idx].len();
            for point_idx in 0..path_len {
                for (line_poly_idx, line_point_idx) in grid.nearby(polygons[poly_idx].points()[point_idx], epsilon) {
                    let line_len = polygons[line_poly_idx].len();
                    let line_next_idx = (line_point_idx + 1) % line_len;
                    if poly_idx == line_poly_idx && (point_idx == line_point_idx || point_idx == line_next_idx) {
                        continue;
                    }
                    let line_points = polygons[line_poly_idx].points();
                    let segment = Line::new(line_points[line_point_idx], line_points[line_next_idx]);
                    let pt = polygons[poly_idx].points()[point_idx];
                    let (_, distance_squared) = segment.closest_point(&pt);
                    if distance_squared > half_epsilon_squared {
                        continue;
                    }
                    let other = polygons[poly_idx].points()[(point_idx + 1) % path_len];
                    let direction = if segment.ccw(&other) > 0 {
                        segment.b - segment.a
                    } else {
                        segment.a - segment.b
                    };
                    let length = direction.length();
                    if length <= 0.0 {
                        continue;
                    }
                    let shift = Point::new(
                        (-(direction.y as f64) * move_dist as f64 / length) as Coord,
                        (direction.x as f64 * move_dist as f64 / length) as Coord,
                    );
                    polygons[poly_idx].points_mut()[point_idx] = pt + shift;
                }
            }
        }
    }

    *polygons = to_polygons(&union_even_odd(polygons));
}

/// Whether `now` is a spike or duplicate between `last` and `next`.
fn is_degenerate(last: Point, now: Point, next: Point) -> bool {
    let last_line = now - last;
    let next_line = next - now;
    last_line.cross(&next_line) == 0 && last_line.dot(&next_line) <= 0
}

/// Remove zero-area spikes and duplicate vertices. Polygons left with fewer
/// than three vertices are dropped.
pub fn remove_degenerate_verts(polygons: &mut Polygons) {
    polygons.retain_mut(|polygon| {
        let points = polygon.points();
        let len = points.len();
        let mut result: Vec<Point> = Vec::with_capacity(len);
        let mut changed = false;
        for idx in 0..len {
            let last = match result.last() {
                Some(&p) => p,
                None => points[len - 1],
            };
            if idx + 1 == len && result.is_empty() {
                break;
            }
            let next = if idx + 1 == len { result[0] } else { points[idx + 1] };
            if is_degenerate(last, points[idx], next) {
                changed = true;
                while result.len() > 1 && is_degenerate(result[result.len() - 2], result[result.len() - 1], next) {
                    result.pop();
                }
            } else {
                result.push(points[idx]);
            }
        }

        if !changed {
            return true;
        }
        if result.len() > 2 {
            *polygon.points_mut() = result;
            true
        } else {
            false
        }
    });
}

/// Remove outlines with an area below `min_area_size` (scaled units
/// squared). Small holes are removed too when `remove_holes` is set;
/// otherwise only the small holes lying in a removed outline go.
pub fn remove_small_areas(polygons: &mut Polygons, min_area_size: f64, remove_holes: bool) {
    if remove_holes {
        polygons.retain(|p| p.area() >= min_area_size);
        return;
    }

    let mut removed_outlines = Vec::new();
    let mut small_holes = Vec::new();
    for (idx, polygon) in polygons.iter().enumerate() {
        let area = polygon.signed_area();
        if area.abs() >= min_area_size {
            continue;
        }
        if area >= 0.0 {
            removed_outlines.push(idx);
        } else {
            small_holes.push(idx);
        }
    }

    let mut remove = vec![false; polygons.len()];
    for &idx in &removed_outlines {
        remove[idx] = true;
    }
    for &hole_idx in &small_holes {
        let Some(first) = polygons[hole_idx].points().first() else {
            continue;
        };
        if removed_outlines.iter().any(|&o| polygons[o].contains_point(first)) {
            remove[hole_idx] = true;
        }
    }

    let mut idx = 0;
    polygons.retain(|_| {
        let keep = !remove[idx];
        idx += 1;
        keep
    });
}

/// Angle at `b` between `a` and `c`, measured on the left side, in [0, 2π).
fn angle_left(a: Point, b: Point, c: Point) -> f64 {
    let ba = a - b;
    let bc = c - b;
    let dot = ba.dot(&bc) as f64;
    let det = ba.cross(&bc);
    if det == 0 {
        let same_direction = if ba.x != 0 {
            (ba.x > 0) == (bc.x > 0)
        } else {
            (ba.y > 0) == (bc.y > 0)
        };
        return if same_direction { 0.0 } else { PI };
    }
    let angle = -(det as f64).atan2(dot);
    if angle >= 0.0 {
        angle
    } else {
        2.0 * PI + angle
    }
}

/// Remove vertices whose segments deviate less than `max_deviation_angle`
/// from a straight line, until no such vertex is left.
pub fn remove_colinear_edges_polygon(polygon: &mut Polygon, max_deviation_angle: f64) {
    loop {
        let mut removed_in_iteration = 0;
        let mut process = vec![true; polygon.len()];

        loop {
            let path = polygon.points();
            let path_len = path.len();
            if path_len <= 3 {
                return;
            }

            let mut skip = vec![false; path_len];
            let mut new_path: Vec<Point> = Vec::with_capacity(path_len);
            let mut again = false;
            let mut point_idx = 0;
            while point_idx < path_len {
                if !process[point_idx] {
                    new_path.push(path[point_idx]);
                    point_idx += 1;
                    continue;
                }
                // The old first vertex went, so the last one is checked in
                // the next round against the new first.
                if point_idx == path_len - 1 && skip[0] {
                    skip[new_path.len()] = true;
                    again = true;
                    new_path.push(path[point_idx]);
                    break;
                }

                let prev = path[(point_idx + path_len - 1) % path_len];
                let pt = path[point_idx];
                let next = path[(point_idx + 1) % path_len];
                let mut angle = angle_left(prev, pt, next);
                if angle >= PI {
                    angle -= PI;
                }

                if angle > max_deviation_angle && angle < PI - max_deviation_angle {
                    new_path.push(pt);
                } else if point_idx != path_len - 1 {
                    skip[new_path.len()] = true;
                    again = true;
                    new_path.push(next);
                    point_idx += 1;
                }
                point_idx += 1;
            }

            removed_in_iteration += path_len - new_path.len();
            *polygon.points_mut() = new_path;
            process = skip;
            if !again {
                break;
            }
        }

        if removed_in_iteration == 0 {
            break;
        }
    }
}

/// [`remove_colinear_edges_polygon`] on every polygon, dropping the ones
/// that collapse.
pub fn remove_colinear_edges(polygons: &mut Polygons, max_deviation_angle: f64) {
    polygons.retain_mut(|polygon| {
        remove_colinear_edges_polygon(polygon, max_deviation_angle);
        polygon.len() >= 3
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_polygon_mm(points: &[(f64, f64)]) -> Polygon {
        Polygon::from_points(points.iter().map(|&(x, y)| Point::new_scale(x, y)).collect())
    }

    fn make_square_mm(x: f64, y: f64, size: f64) -> Polygon {
        make_polygon_mm(&[(x, y), (x + size, y), (x + size, y + size), (x, y + size)])
    }

    #[test]
    fn test_prepare_square() {
        let prepared = prepare_outline(&[make_square_mm(0.0, 0.0, 10.0)], scale(0.5), scale(0.025), scale(0.225));
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].len(), 4);
        assert!(prepared[0].is_counter_clockwise());
        let area_mm2 = prepared[0].area() / 1e12;
        assert!((area_mm2 - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_prepare_drops_tiny_island() {
        let outline = vec![make_square_mm(0.0, 0.0, 10.0), make_square_mm(20.0, 20.0, 0.1)];
        let prepared = prepare_outline(&outline, scale(0.5), scale(0.025), scale(0.225));
        assert_eq!(prepared.len(), 1);
    }

    #[test]
    fn test_simplify_removes_dense_vertices() {
        let mut points = Vec::new();
        for i in 0..100 {
            points.push((i as f64 * 0.1, 0.0));
        }
        points.push((10.0, 10.0));
        points.push((0.0, 10.0));
        let mut polygons = vec![make_polygon_mm(&points)];
        simplify_polygons(&mut polygons, scale(0.5), scale(0.025));
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].len(), 4);
    }

    #[test]
    fn test_simplify_keeps_triangles_and_drops_slivers() {
        let mut triangle = make_polygon_mm(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
        assert!(simplify_polygon(&mut triangle, 1, 1));
        assert_eq!(triangle.len(), 3);

        let mut segment = make_polygon_mm(&[(0.0, 0.0), (1.0, 0.0)]);
        assert!(!simplify_polygon(&mut segment, 1, 1));
        assert!(segment.is_empty());
    }

    #[test]
    fn test_remove_degenerate_spike() {
        let mut polygons = vec![make_polygon_mm(&[
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (5.0, 10.0),
            (5.0, 15.0),
            (5.0, 10.0),
            (0.0, 10.0),
        ])];
        remove_degenerate_verts(&mut polygons);
        assert_eq!(polygons.len(), 1);
        assert!(!polygons[0].points().contains(&Point::new_scale(5.0, 15.0)));
        assert!((polygons[0].area() / 1e12 - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_remove_small_areas_keeps_holes_of_kept_outlines() {
        let mut tiny_hole_in_big = make_square_mm(4.0, 4.0, 0.05);
        tiny_hole_in_big.make_clockwise();
        let mut tiny_hole_in_tiny = make_square_mm(20.02, 20.02, 0.05);
        tiny_hole_in_tiny.make_clockwise();
        let mut polygons = vec![
            make_square_mm(0.0, 0.0, 10.0),
            make_square_mm(20.0, 20.0, 0.1),
            tiny_hole_in_big,
            tiny_hole_in_tiny,
        ];
        let min_area = (scale(0.225) as f64).powi(2);
        remove_small_areas(&mut polygons, min_area, false);
        assert_eq!(polygons.len(), 2);
        assert!(polygons[1].is_clockwise());

        remove_small_areas(&mut polygons, min_area, true);
        assert_eq!(polygons.len(), 1);
    }

    #[test]
    fn test_remove_colinear_edges() {
        let mut polygons = vec![make_polygon_mm(&[
            (0.0, 0.0),
            (5.0, 0.001),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
        ])];
        remove_colinear_edges(&mut polygons, COLINEAR_ANGLE);
        assert_eq!(polygons[0].len(), 4);
        assert!(!polygons[0].points().contains(&Point::new_scale(5.0, 0.001)));
    }

    #[test]
    fn test_angle_left() {
        let b = Point::zero();
        let a = Point::new(-10, 0);
        assert!((angle_left(a, b, Point::new(10, 0)) - PI).abs() < 1e-9);
        assert!((angle_left(a, b, Point::new(-5, 0))).abs() < 1e-9);
        let right_turn = angle_left(a, b, Point::new(0, -10));
        assert!((right_turn - 1.5 * PI).abs() < 1e-9);
        let left_turn = angle_left(a, b, Point::new(0, 10));
        assert!((left_turn - 0.5 * PI).abs() < 1e-9);
    }

    #[test]
    fn test_fix_self_intersections_moves_close_vertex() {
        // A hole that nearly touches the outer contour
        let mut hole = make_square_mm(0.003, 2.0, 3.0);
        hole.make_clockwise();
        let mut polygons = vec![make_square_mm(0.0, 0.0, 10.0), hole];
        fix_self_intersections(scale(0.025) / 2 - 1, &mut polygons);
        assert_eq!(polygons.len(), 2);
        let total: f64 = polygons.iter().map(|p| p.signed_area()).sum::<f64>() / 1e12;
        assert!((total - 91.0).abs() < 0.05);
    }
}
