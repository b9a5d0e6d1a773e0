//! Print order of wall toolpaths.
//!
//! Two orderings are available. [`order_perimeters`] walks the containment
//! hierarchy of the walls from each external wall inwards, and
//! [`order_with_constraints`] does a nearest-neighbour tour that respects the
//! adjacency constraints of [`region_order`].

use super::arachne::{ExtrusionLine, VariableWidthLines};
use crate::geometry::{BoundingBox, Point, Polygon, SparsePointGrid};
use crate::Coord;
use log::debug;
use std::collections::{BTreeSet, VecDeque};

/// How much further apart than their half widths two junctions of adjacent
/// walls may be, to account for corners.
const DIAGONAL_EXTENSION: f64 = 1.9;

/// A wall toolpath with its place in the containment hierarchy.
#[derive(Debug, Clone)]
pub struct PerimeterExtrusion {
    pub extrusion: ExtrusionLine,
    /// Closed counter-clockwise loop. Holes and open lines are not contours.
    pub is_contour: bool,
    /// Number of walls between this one and its external wall.
    pub depth: usize,
    /// Index (in the ordered output) of the external wall this one belongs to.
    pub nearest_external_perimeter: usize,
    polygon: Polygon,
    bbox: BoundingBox,
    adjacent: Vec<usize>,
}

impl PerimeterExtrusion {
    fn new(extrusion: ExtrusionLine) -> Self {
        let polygon = extrusion.to_polygon();
        let bbox = polygon.bounding_box();
        Self {
            is_contour: extrusion.is_contour(),
            extrusion,
            depth: 0,
            nearest_external_perimeter: 0,
            polygon,
            bbox,
            adjacent: Vec::new(),
        }
    }

    /// Output indices of the walls directly inside or around this one.
    pub fn adjacent_perimeters(&self) -> &[usize] {
        &self.adjacent
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        self.extrusion.inset_idx == 0
    }

    fn is_hole(&self) -> bool {
        self.extrusion.is_closed && !self.is_contour
    }

    fn start(&self) -> Option<Point> {
        self.extrusion.first().map(|j| j.position)
    }

    /// Where the nozzle ends up after printing this extrusion.
    fn end(&self) -> Option<Point> {
        if self.extrusion.is_closed {
            self.start()
        } else {
            self.extrusion.last().map(|j| j.position)
        }
    }

    /// Whether `other` lies inside this closed extrusion.
    fn encloses(&self, other: &PerimeterExtrusion) -> bool {
        if !self.extrusion.is_closed || !self.bbox.contains(&other.bbox) {
            return false;
        }
        other.start().is_some_and(|p| self.polygon.contains_point(&p))
    }
}

fn distance_squared(a: Point, b: Option<Point>) -> i128 {
    b.map_or(i128::MAX, |b| a.distance_squared(&b))
}

/// Order the toolpaths of one region for printing.
///
/// Walls are grouped under the external wall they are nested in. Each group
/// is printed depth first from its external wall inwards, or reversed when
/// `external_first` is false. With `external_first` the contour groups go
/// before the hole groups, otherwise the holes go first. Within each pass
/// the next group is the one starting nearest to the previous position.
pub fn order_perimeters(toolpaths: &[VariableWidthLines], external_first: bool) -> Vec<PerimeterExtrusion> {
    let mut extrusions: Vec<PerimeterExtrusion> = toolpaths
        .iter()
        .flatten()
        .filter(|line| !line.is_empty())
        .cloned()
        .map(PerimeterExtrusion::new)
        .collect();
    if extrusions.is_empty() {
        return Vec::new();
    }

    link_adjacent(&mut extrusions);
    let roots = assign_depths(&mut extrusions);

    let mut groups: Vec<Vec<usize>> = roots
        .iter()
        .map(|&root| {
            let mut group = group_order(&extrusions, root);
            if !external_first {
                group.reverse();
            }
            group
        })
        .collect();

    let mut ordered_groups: Vec<Vec<usize>> = Vec::with_capacity(groups.len());
    let mut position = Point::zero();
    let passes = if external_first { [false, true] } else { [true, false] };
    for holes_pass in passes {
        loop {
            let best = groups
                .iter()
                .enumerate()
                .filter(|(_, group)| {
                    group
                        .first()
                        .is_some_and(|&first| extrusions[extrusions[first].nearest_external_perimeter].is_hole() == holes_pass)
                })
                .min_by_key(|(_, group)| distance_squared(position, group.first().and_then(|&i| extrusions[i].start())))
                .map(|(idx, _)| idx);
            let Some(best) = best else { break };
            let group = groups.swap_remove(best);
            if let Some(end) = group.last().and_then(|&i| extrusions[i].end()) {
                position = end;
            }
            ordered_groups.push(group);
        }
    }

    // Renumber the external wall references into output positions
    let order: Vec<usize> = ordered_groups.into_iter().flatten().collect();
    let mut new_index = vec![0; extrusions.len()];
    for (output_idx, &idx) in order.iter().enumerate() {
        new_index[idx] = output_idx;
    }
    let mut slots: Vec<Option<PerimeterExtrusion>> = extrusions.into_iter().map(Some).collect();
    let mut result = Vec::with_capacity(order.len());
    for idx in order {
        if let Some(mut extrusion) = slots[idx].take() {
            extrusion.nearest_external_perimeter = new_index[extrusion.nearest_external_perimeter];
            extrusion.adjacent = extrusion.adjacent.iter().map(|&a| new_index[a]).collect();
            result.push(extrusion);
        }
    }
    debug!("Ordered {} wall extrusions", result.len());
    result
}

/// Connect walls of consecutive inset indices that are directly nested on
/// the same side of the material. Contours and open lines hang inside the
/// contour around them unless a hole lies in between, and holes wrap the
/// holes they enclose unless an island lies in between.
fn link_adjacent(extrusions: &mut [PerimeterExtrusion]) {
    let len = extrusions.len();
    let mut links = Vec::new();
    for outer in 0..len {
        for inner in 0..len {
            if extrusions[outer].extrusion.inset_idx + 1 != extrusions[inner].extrusion.inset_idx {
                continue;
            }
            if directly_nested(extrusions, outer, inner) {
                links.push((outer, inner));
            }
        }
    }
    for (outer, inner) in links {
        extrusions[outer].adjacent.push(inner);
        extrusions[inner].adjacent.push(outer);
    }
}

/// Whether wall `inner` (one inset further in) continues wall `outer`.
fn directly_nested(extrusions: &[PerimeterExtrusion], outer: usize, inner: usize) -> bool {
    let (a, b) = (&extrusions[outer], &extrusions[inner]);
    if !a.is_hole() && !b.is_hole() && a.encloses(b) {
        return !extrusions
            .iter()
            .any(|c| c.is_hole() && a.encloses(c) && c.encloses(b));
    }
    if a.is_hole() && b.is_hole() && b.encloses(a) {
        return !extrusions
            .iter()
            .any(|c| c.is_contour && b.encloses(c) && c.encloses(a));
    }
    false
}

/// Breadth-first depth from the external walls. At equal depth a wall
/// reached from a contour belongs to the contour. Walls not connected to
/// any external wall start groups of their own. Returns the group roots.
fn assign_depths(extrusions: &mut [PerimeterExtrusion]) -> Vec<usize> {
    let mut visited = vec![false; extrusions.len()];
    let mut roots = Vec::new();

    let mut seeds: Vec<usize> = (0..extrusions.len()).filter(|&i| extrusions[i].is_external()).collect();
    seeds.sort_by_key(|&i| !extrusions[i].is_contour);

    loop {
        let mut queue = VecDeque::new();
        for &seed in &seeds {
            if visited[seed] {
                continue;
            }
            visited[seed] = true;
            extrusions[seed].depth = 0;
            extrusions[seed].nearest_external_perimeter = seed;
            roots.push(seed);
            queue.push_back(seed);
        }
        while let Some(current) = queue.pop_front() {
            let depth = extrusions[current].depth;
            let external = extrusions[current].nearest_external_perimeter;
            for neighbour in extrusions[current].adjacent.clone() {
                if visited[neighbour] {
                    continue;
                }
                visited[neighbour] = true;
                extrusions[neighbour].depth = depth + 1;
                extrusions[neighbour].nearest_external_perimeter = external;
                queue.push_back(neighbour);
            }
        }

        // The outermost wall left over seeds the next round
        let next = (0..extrusions.len())
            .filter(|&i| !visited[i])
            .min_by_key(|&i| (extrusions[i].extrusion.inset_idx, !extrusions[i].is_contour, i));
        match next {
            Some(next) => seeds = vec![next],
            None => break,
        }
    }
    roots
}

/// Depth-first order of the walls belonging to `root`. Among the children of
/// a wall, open lines go first, then the closest one.
fn group_order(extrusions: &[PerimeterExtrusion], root: usize) -> Vec<usize> {
    let mut order = Vec::new();
    let mut visited = vec![false; extrusions.len()];
    let mut stack = vec![root];
    visited[root] = true;

    while let Some(current) = stack.pop() {
        order.push(current);
        let position = extrusions[current].end().unwrap_or_default();
        let mut children: Vec<usize> = extrusions[current]
            .adjacent
            .iter()
            .copied()
            .filter(|&c| {
                !visited[c]
                    && extrusions[c].nearest_external_perimeter == root
                    && extrusions[c].depth == extrusions[current].depth + 1
            })
            .collect();
        children.sort_by_key(|&c| {
            (
                extrusions[c].extrusion.is_closed,
                distance_squared(position, extrusions[c].start()),
                c,
            )
        });
        // Pushed in reverse so the preferred child is visited next
        for &child in children.iter().rev() {
            visited[child] = true;
            stack.push(child);
        }
    }
    order
}

/// Order constraints between adjacent walls: each pair `(before, after)`
/// indexes into `lines` and holds walls whose inset indices differ by one
/// and that have junctions next to each other.
///
/// With `outer_to_inner` the lower inset index goes first. Odd walls always
/// go after the even wall enclosing them.
pub fn region_order(lines: &[ExtrusionLine], outer_to_inner: bool) -> Vec<(usize, usize)> {
    let max_line_width = lines
        .iter()
        .flat_map(|line| line.iter().map(|j| j.width))
        .max()
        .unwrap_or(0);
    if max_line_width == 0 {
        return Vec::new();
    }

    let searching_radius = (max_line_width as f64 * DIAGONAL_EXTENSION) as Coord;
    let mut grid = SparsePointGrid::new(searching_radius);
    for (line_idx, line) in lines.iter().enumerate() {
        for junction in line {
            grid.insert(junction.position, (line_idx, junction.width));
        }
    }

    let mut requirements = BTreeSet::new();
    for (here_idx, here) in lines.iter().enumerate() {
        for junction in here {
            for (location, (nearby_idx, nearby_width)) in grid.nearby(junction.position, searching_radius) {
                let nearby = &lines[nearby_idx];
                if nearby_idx == here_idx || nearby.inset_idx == here.inset_idx {
                    continue;
                }
                if nearby.inset_idx > here.inset_idx + 1 || here.inset_idx > nearby.inset_idx + 1 {
                    continue;
                }
                let max_distance = ((junction.width + nearby_width) / 2) as f64 * DIAGONAL_EXTENSION;
                if !(junction.position - location).shorter_than(max_distance as Coord) {
                    continue;
                }

                if here.is_odd || nearby.is_odd {
                    if here.is_odd && !nearby.is_odd && nearby.inset_idx < here.inset_idx {
                        requirements.insert((nearby_idx, here_idx));
                    }
                    if nearby.is_odd && !here.is_odd && here.inset_idx < nearby.inset_idx {
                        requirements.insert((here_idx, nearby_idx));
                    }
                } else if (nearby.inset_idx < here.inset_idx) == outer_to_inner {
                    requirements.insert((nearby_idx, here_idx));
                } else {
                    requirements.insert((here_idx, nearby_idx));
                }
            }
        }
    }
    requirements.into_iter().collect()
}

/// Nearest-neighbour print order that never prints a wall before the walls
/// [`region_order`] requires before it. On equal distance closed walls go
/// first.
pub fn order_with_constraints(toolpaths: &[VariableWidthLines], outer_to_inner: bool) -> Vec<ExtrusionLine> {
    let mut insets: Vec<&VariableWidthLines> = toolpaths.iter().collect();
    if !outer_to_inner {
        insets.reverse();
    }
    let all_extrusions: Vec<ExtrusionLine> = insets.into_iter().flatten().cloned().collect();
    if all_extrusions.is_empty() {
        return Vec::new();
    }

    let mut blocked = vec![0usize; all_extrusions.len()];
    let mut blocking: Vec<Vec<usize>> = vec![Vec::new(); all_extrusions.len()];
    for (before, after) in region_order(&all_extrusions, outer_to_inner) {
        blocked[after] += 1;
        blocking[before].push(after);
    }

    let mut processed = vec![false; all_extrusions.len()];
    let mut position = all_extrusions[0].first().map(|j| j.position).unwrap_or_default();
    let mut ordered = Vec::with_capacity(all_extrusions.len());

    while ordered.len() < all_extrusions.len() {
        let mut candidates: Vec<usize> = (0..all_extrusions.len())
            .filter(|&i| !processed[i] && blocked[i] == 0)
            .collect();
        if candidates.is_empty() {
            // A cycle in the constraints; release the rest in input order
            candidates = (0..all_extrusions.len()).filter(|&i| !processed[i]).collect();
        }
        candidates.sort_by_key(|&i| !all_extrusions[i].is_closed);

        let mut best: Option<(usize, i128)> = None;
        for &candidate in &candidates {
            let distance = distance_squared(position, all_extrusions[candidate].first().map(|j| j.position));
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((candidate, distance));
            }
        }
        let Some((best, _)) = best else { break };

        processed[best] = true;
        for &unlocked in &blocking[best] {
            blocked[unlocked] = blocked[unlocked].saturating_sub(1);
        }
        let path = &all_extrusions[best];
        let end = if path.is_closed { path.first() } else { path.last() };
        if let Some(end) = end {
            position = end.position;
        }
        ordered.push(path.clone());
    }
    ordered
}
