//! Variable-width toolpath polylines.

use super::junction::ExtrusionJunction;
use crate::geometry::{Line, Point, Polygon};
use crate::Coord;

/// Segments shorter than this are always merged, whatever their width.
const ALWAYS_MERGE_LENGTH: Coord = 5_000;

/// Squared height below which three junctions count as colinear.
const COLINEAR_HEIGHT_SQUARED: i128 = 1_000_000;

/// Distance below which three junctions count as colinear.
const COLINEAR_DISTANCE: f64 = 1_000.0;

/// A polyline of [`ExtrusionJunction`]s belonging to one wall.
///
/// A closed line repeats its first junction at the end.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtrusionLine {
    pub junctions: Vec<ExtrusionJunction>,
    /// Wall index counted from the outline inwards.
    pub inset_idx: usize,
    /// Single middle bead of a region with an odd bead count. Such lines
    /// have no partner on the other side of the medial axis.
    pub is_odd: bool,
    pub is_closed: bool,
}

impl ExtrusionLine {
    pub fn new(inset_idx: usize, is_odd: bool, is_closed: bool) -> Self {
        Self {
            junctions: Vec::new(),
            inset_idx,
            is_odd,
            is_closed,
        }
    }

    pub fn from_junctions(
        junctions: Vec<ExtrusionJunction>,
        inset_idx: usize,
        is_odd: bool,
        is_closed: bool,
    ) -> Self {
        Self {
            junctions,
            inset_idx,
            is_odd,
            is_closed,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.junctions.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.junctions.len()
    }

    pub fn push(&mut self, junction: ExtrusionJunction) {
        self.junctions.push(junction);
    }

    pub fn reverse(&mut self) {
        self.junctions.reverse();
    }

    pub fn first(&self) -> Option<&ExtrusionJunction> {
        self.junctions.first()
    }

    pub fn last(&self) -> Option<&ExtrusionJunction> {
        self.junctions.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExtrusionJunction> {
        self.junctions.iter()
    }

    /// Length along the junctions, in scaled units.
    pub fn length(&self) -> Coord {
        self.junctions
            .windows(2)
            .map(|pair| (pair[1].position - pair[0].position).length_coord())
            .sum()
    }

    /// Whether the polyline is shorter than `len`.
    pub fn shorter_than(&self, len: Coord) -> bool {
        let mut total: Coord = 0;
        for pair in self.junctions.windows(2) {
            total += (pair[1].position - pair[0].position).length_coord();
            if total >= len {
                return false;
            }
        }
        true
    }

    pub fn min_width(&self) -> Coord {
        self.junctions.iter().map(|j| j.width).min().unwrap_or(0)
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        self.inset_idx == 0
    }

    /// The positions as a polygon, without the repeated closing junction.
    pub fn to_polygon(&self) -> Polygon {
        let mut points: Vec<Point> = self.junctions.iter().map(|j| j.position).collect();
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        Polygon::from_points(points)
    }

    /// Counter-clockwise closed lines are contours, clockwise ones holes.
    pub fn is_contour(&self) -> bool {
        self.is_closed && self.to_polygon().is_counter_clockwise()
    }

    /// Remove junctions that add little to the shape of the line.
    ///
    /// A junction goes when its segment is shorter than the smallest allowed
    /// segment and the area cut off stays below the allowed deviation, or when
    /// it is colinear with its neighbours and merging the two segments keeps
    /// the extruded area within `maximum_extrusion_area_deviation`. The first
    /// and last junctions are always kept.
    pub fn simplify(
        &mut self,
        smallest_line_segment_squared: i128,
        allowed_error_distance_squared: i128,
        maximum_extrusion_area_deviation: i128,
    ) {
        let min_path_size = if self.is_closed { 3 } else { 2 };
        if self.junctions.len() <= min_path_size {
            return;
        }

        let mut junctions = self.junctions.clone();
        let mut new_junctions: Vec<ExtrusionJunction> = Vec::with_capacity(junctions.len());
        new_junctions.push(junctions[0]);

        let mut previous_previous = junctions[0];
        let mut previous = junctions[0];

        // Twice the area of the fan between the origin and the removed
        // segments, so the cut-off area is known without revisiting them.
        let mut accumulated_area_removed = previous.position.cross(&junctions[1].position);

        for point_idx in 1..junctions.len() - 1 {
            let current = junctions[point_idx];
            let next = junctions[point_idx + 1];

            let removed_area_next = current.position.cross(&next.position);
            let negative_area_closing = next.position.cross(&previous.position);
            accumulated_area_removed += removed_area_next;

            let length2 = current.distance_squared_to(&previous);
            if length2 < (ALWAYS_MERGE_LENGTH as i128) * (ALWAYS_MERGE_LENGTH as i128) {
                continue;
            }

            let area_removed_so_far = accumulated_area_removed + negative_area_closing;
            let base_length_2 = next.distance_squared_to(&previous);
            if base_length_2 == 0 {
                // Back and forth over the same line
                continue;
            }

            let height_2 = ((area_removed_so_far as f64) * (area_removed_so_far as f64)
                / base_length_2 as f64) as i128;
            let (extrusion_area_error, weighted_average_width) =
                extrusion_area_deviation(&previous, &current, &next);
            if height_2 <= COLINEAR_HEIGHT_SQUARED
                && Line::distance_to_infinite(current.position, previous.position, next.position)
                    <= COLINEAR_DISTANCE
                && extrusion_area_error <= maximum_extrusion_area_deviation
            {
                junctions[point_idx + 1].width = weighted_average_width;
                continue;
            }

            if length2 < smallest_line_segment_squared && height_2 <= allowed_error_distance_squared {
                let next_length2 = current.distance_squared_to(&next);
                if next_length2 <= 4 * smallest_line_segment_squared {
                    continue;
                }
                // The next segment is long: move the corner instead of
                // cutting it, if the moved corner stays close.
                let intersection = Line::new(previous_previous.position, previous.position)
                    .intersection_infinite(&Line::new(current.position, next.position));
                if let Some(intersection) = intersection {
                    let acceptable = Line::distance_to_infinite_squared(
                        intersection,
                        previous.position,
                        current.position,
                    ) <= allowed_error_distance_squared as f64
                        && intersection.distance_squared(&previous.position)
                            <= smallest_line_segment_squared
                        && intersection.distance_squared(&next.position)
                            <= smallest_line_segment_squared;
                    if acceptable {
                        let new_to_add =
                            ExtrusionJunction::new(intersection, current.width, current.perimeter_index);
                        if new_junctions.len() > 1 {
                            new_junctions.pop();
                            previous = previous_previous;
                        }
                        accumulated_area_removed = removed_area_next;
                        previous_previous = previous;
                        previous = new_to_add;
                        new_junctions.push(new_to_add);
                        continue;
                    }
                }
            }

            accumulated_area_removed = removed_area_next;
            previous_previous = previous;
            previous = current;
            new_junctions.push(current);
        }

        new_junctions.push(junctions[junctions.len() - 1]);
        self.junctions = new_junctions;
    }
}

/// Area error of replacing the widths of `a`-`b` and `b`-`c` by one
/// length-weighted average width, and that average.
fn extrusion_area_deviation(
    a: &ExtrusionJunction,
    b: &ExtrusionJunction,
    c: &ExtrusionJunction,
) -> (i128, Coord) {
    let ab_length = (b.position - a.position).length_coord() as i128;
    let bc_length = (c.position - b.position).length_coord() as i128;
    let width_diff = (b.width - a.width).abs().max((c.width - b.width).abs());
    if width_diff <= 1 {
        return (0, b.width);
    }
    let ac_length = (c.position - a.position).length_coord() as i128;
    if ac_length == 0 {
        return (0, b.width);
    }
    let weighted_average_width =
        ((ab_length * b.width as i128 + bc_length * c.width as i128) / ac_length) as Coord;
    let error = (b.width - weighted_average_width).abs() as i128 * ab_length
        + (c.width - weighted_average_width).abs() as i128 * bc_length;
    (error, weighted_average_width)
}

impl<'a> IntoIterator for &'a ExtrusionLine {
    type Item = &'a ExtrusionJunction;
    type IntoIter = std::slice::Iter<'a, ExtrusionJunction>;

    fn into_iter(self) -> Self::IntoIter {
        self.junctions.iter()
    }
}

impl std::ops::Index<usize> for ExtrusionLine {
    type Output = ExtrusionJunction;

    fn index(&self, index: usize) -> &Self::Output {
        &self.junctions[index]
    }
}

/// The toolpaths of one wall index.
pub type VariableWidthLines = Vec<ExtrusionLine>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale;

    fn line_through(points: &[(f64, f64)], width: f64) -> ExtrusionLine {
        let junctions = points
            .iter()
            .map(|&(x, y)| ExtrusionJunction::new(Point::new_scale(x, y), scale(width), 0))
            .collect();
        ExtrusionLine::from_junctions(junctions, 0, false, false)
    }

    #[test]
    fn test_length_and_shorter_than() {
        let line = line_through(&[(0.0, 0.0), (3.0, 0.0), (3.0, 4.0)], 0.4);
        assert_eq!(line.length(), scale(7.0));
        assert!(line.shorter_than(scale(7.5)));
        assert!(!line.shorter_than(scale(7.0)));
    }

    #[test]
    fn test_closed_line_polygon_drops_repeated_junction() {
        let mut line = line_through(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)], 0.4);
        line.is_closed = true;
        assert_eq!(line.to_polygon().len(), 4);
        assert!(line.is_contour());
        line.reverse();
        assert!(!line.is_contour());
    }

    #[test]
    fn test_simplify_removes_colinear_junctions() {
        let mut line = line_through(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)], 0.4);
        line.simplify(scale(0.5).pow(2) as i128, scale(0.025).pow(2) as i128, scale(0.05) as i128 * scale(1.0) as i128);
        assert_eq!(line.len(), 2);
        assert_eq!(line[0].position, Point::zero());
        assert_eq!(line[1].position, Point::new_scale(3.0, 0.0));
    }

    #[test]
    fn test_simplify_keeps_corners() {
        let mut line = line_through(&[(0.0, 0.0), (5.0, 0.0), (5.0, 5.0), (0.0, 5.0)], 0.4);
        line.simplify(scale(0.5).pow(2) as i128, scale(0.025).pow(2) as i128, 0);
        assert_eq!(line.len(), 4);
    }

    #[test]
    fn test_simplify_keeps_width_changes_beyond_area_limit() {
        let junctions = vec![
            ExtrusionJunction::new(Point::zero(), scale(0.4), 0),
            ExtrusionJunction::new(Point::new_scale(2.0, 0.0), scale(0.4), 0),
            ExtrusionJunction::new(Point::new_scale(4.0, 0.0), scale(0.8), 0),
        ];
        let mut line = ExtrusionLine::from_junctions(junctions.clone(), 0, false, false);
        line.simplify(scale(0.5).pow(2) as i128, scale(0.025).pow(2) as i128, 1);
        assert_eq!(line.len(), 3);

        let mut line = ExtrusionLine::from_junctions(junctions, 0, false, false);
        line.simplify(scale(0.5).pow(2) as i128, scale(0.025).pow(2) as i128, i128::MAX);
        assert_eq!(line.len(), 2);
        // Weighted average of the two segment widths
        assert_eq!(line[1].width, scale(0.6));
    }

    #[test]
    fn test_simplify_short_segments() {
        let mut line = line_through(
            &[(0.0, 0.0), (5.0, 0.0), (5.1, 0.01), (5.6, 0.0)],
            0.4,
        );
        line.simplify(scale(0.5).pow(2) as i128, scale(0.025).pow(2) as i128, 0);
        assert_eq!(line.len(), 3);
        assert_eq!(line.last().map(|j| j.position), Some(Point::new_scale(5.6, 0.0)));
    }
}
