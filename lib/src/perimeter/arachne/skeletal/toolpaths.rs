//! Junctions and toolpath segments.
//!
//! Every upward edge is cut where a bead of its upper node's beading lies.
//! The skeleton splits the area into trapezoids, each standing on a piece of
//! the outline; walking each trapezoid up one side and down the other pairs
//! up the junctions of equal inset into toolpath segments.

use super::graph::{EdgeId, NodeId};
use super::SkeletalTrapezoidation;
use crate::geometry::Point;
use crate::perimeter::arachne::junction::{ExtrusionJunction, ExtrusionJunctions};
use crate::perimeter::arachne::line::ExtrusionLine;
use crate::{scale, Coord};
use log::warn;
use std::collections::{BTreeSet, HashSet};
use std::f64::consts::PI;

/// Junctions closer than this to a node are snapped onto it.
const JUNCTION_SNAP_DIST: f64 = 0.005;

/// Segment ends closer than this are joined into one line.
const SEGMENT_MERGE_DIST: f64 = 0.010;

impl SkeletalTrapezoidation<'_> {
    pub(super) fn generate_segments(&mut self) {
        let upward_quad_mids = self.upward_quad_mids();

        self.store_node_beadings();
        self.propagate_beadings_upward(&upward_quad_mids);
        self.propagate_beadings_downward(&upward_quad_mids);

        self.generate_junctions();
        self.connect_junctions();
        self.generate_local_maxima_single_beads();
    }

    /// The edge of the trapezoid starting at `quad_start` that leads to its
    /// highest node.
    fn quad_max_r_edge_to(&self, quad_start: EdgeId) -> Option<EdgeId> {
        let mut max_r = -1;
        let mut ret = None;
        let mut edge = Some(quad_start);
        let mut guard = 0;
        while let Some(e) = edge {
            let r = self.graph.r(self.graph.to(e));
            if r > max_r {
                max_r = r;
                ret = Some(e);
            }
            edge = self.graph.next(e);
            guard += 1;
            if edge == Some(quad_start) || guard > self.graph.edge_count() {
                break;
            }
        }

        let ret = ret?;
        if self.graph.next(ret).is_none()
            && self.graph.r(self.graph.to(ret)) - scale(JUNCTION_SNAP_DIST) < self.graph.r(self.graph.from(ret))
        {
            return self.graph.prev(ret);
        }
        Some(ret)
    }

    /// Cut every upward edge at the beads of its upper node's beading,
    /// ordered from the upper node down.
    fn generate_junctions(&mut self) {
        for edge in self.graph.edge_ids() {
            let from = self.graph.from(edge);
            let to = self.graph.to(edge);
            // Higher radius at the start of the junction walk
            let start_r = self.graph.r(to);
            let end_r = self.graph.r(from);
            if end_r >= start_r {
                continue;
            }
            let from_bead_count = self.graph.bead_count(from);
            if from_bead_count == self.graph.bead_count(to) && from_bead_count >= 0 {
                continue;
            }

            let Some(propagation) = self.get_or_create_beading(to) else {
                continue;
            };
            let beading = &propagation.beading;
            if beading.total_thickness < start_r * 2 {
                warn!("Generated junction is beyond the center of the total width");
            }

            let a = self.graph.node(to).p;
            let ab = self.graph.node(from).p - a;
            let num_junctions = beading.toolpath_locations.len();
            let mut junctions = ExtrusionJunctions::new();
            if num_junctions > 0 {
                // Locations may be off by one from rounding
                let mut junction_idx = (num_junctions.max(1) - 1) / 2;
                let mut found = false;
                loop {
                    if beading.toolpath_locations[junction_idx] <= start_r + 1 {
                        found = true;
                        break;
                    }
                    if junction_idx == 0 {
                        break;
                    }
                    junction_idx -= 1;
                }

                let snap = scale(JUNCTION_SNAP_DIST);
                let mut next_idx = found.then_some(junction_idx);
                // Odd beads just past the start node from rounding
                let candidate = next_idx.map_or(0, |idx| idx + 1);
                if candidate < num_junctions
                    && beading.toolpath_locations[candidate] <= start_r + snap
                    && beading.total_thickness < start_r + snap
                {
                    next_idx = Some(candidate);
                }

                while let Some(idx) = next_idx {
                    let bead_r = beading.toolpath_locations[idx];
                    if bead_r < end_r {
                        // Handled by the next edge
                        break;
                    }
                    let position = if bead_r > start_r - snap {
                        // Snapped so that 3-way junctions are found later on
                        a
                    } else {
                        a + Point::new(
                            (ab.x as i128 * (bead_r - start_r) as i128 / (end_r - start_r) as i128) as Coord,
                            (ab.y as i128 * (bead_r - start_r) as i128 / (end_r - start_r) as i128) as Coord,
                        )
                    };
                    junctions.push(ExtrusionJunction::new(position, beading.bead_widths[idx], idx));
                    next_idx = idx.checked_sub(1);
                }
            }
            self.graph.edge_mut(edge).data.extrusion_junctions = Some(junctions);
        }
    }

    fn junctions_of(&self, edge: EdgeId) -> ExtrusionJunctions {
        self.graph
            .edge(edge)
            .data
            .extrusion_junctions
            .clone()
            .unwrap_or_default()
    }

    fn twin_junctions_of(&self, edge: EdgeId) -> ExtrusionJunctions {
        self.graph
            .twin(edge)
            .map(|twin| self.junctions_of(twin))
            .unwrap_or_default()
    }

    /// Add the segment `from`-`to` to the lines of its inset, extending the
    /// last line when it ends at one of the two points.
    fn add_toolpath_segment(
        &mut self,
        from: ExtrusionJunction,
        to: ExtrusionJunction,
        is_odd: bool,
        force_new_path: bool,
        from_is_3way: bool,
        to_is_3way: bool,
    ) {
        if from == to {
            return;
        }
        let inset_idx = from.perimeter_index;
        if inset_idx >= self.toolpaths.len() {
            self.toolpaths.resize_with(inset_idx + 1, Vec::new);
        }
        let lines = &mut self.toolpaths[inset_idx];
        let merge_dist = scale(SEGMENT_MERGE_DIST);
        let last = match lines.last() {
            Some(line) if line.is_odd == is_odd => line.last().copied(),
            _ => None,
        };
        let Some(last) = last.filter(|j| j.perimeter_index == inset_idx) else {
            lines.push(ExtrusionLine::from_junctions(vec![from, to], inset_idx, is_odd, false));
            return;
        };

        let continues_at = |junction: &ExtrusionJunction| {
            (last.position - junction.position).shorter_than(merge_dist)
                && (last.width - junction.width).abs() < merge_dist
        };
        if !force_new_path && continues_at(&from) && !from_is_3way {
            if let Some(line) = lines.last_mut() {
                line.push(to);
            }
        } else if !force_new_path && continues_at(&to) && !to_is_3way {
            if !is_odd {
                warn!("Reversing an even wall line changes its direction");
            }
            if let Some(line) = lines.last_mut() {
                line.push(from);
            }
        } else {
            lines.push(ExtrusionLine::from_junctions(vec![from, to], inset_idx, is_odd, false));
        }
    }

    /// Walk all trapezoids domain by domain and connect their junctions.
    fn connect_junctions(&mut self) {
        let mut unprocessed_quad_starts: BTreeSet<EdgeId> = self
            .graph
            .edge_ids()
            .into_iter()
            .filter(|&e| self.graph.prev(e).is_none())
            .collect();
        let mut passed_odd_edges: HashSet<EdgeId> = HashSet::new();
        let snap = scale(JUNCTION_SNAP_DIST);

        while let Some(&poly_domain_start) = unprocessed_quad_starts.iter().next() {
            let mut quad_start = poly_domain_start;
            let mut new_domain_start = true;
            let mut guard = 0;
            loop {
                unprocessed_quad_starts.remove(&quad_start);
                if let Some((quad_end, edge_to_peak, edge_from_peak)) = self.quad_corners(quad_start) {
                    let (from_junctions, to_junctions) = self.quad_junctions(edge_to_peak, edge_from_peak);
                    if from_junctions.len().abs_diff(to_junctions.len()) > 1 {
                        warn!(
                            "Bead counts on both sides of a trapezoid differ too much: {} vs. {}",
                            from_junctions.len(),
                            to_junctions.len()
                        );
                    }

                    let quad_start_to = self.graph.to(quad_start);
                    let quad_end_from = self.graph.from(quad_end);
                    let segment_count = from_junctions.len().min(to_junctions.len());
                    for junction_rev_idx in 0..segment_count {
                        let from = from_junctions[from_junctions.len() - 1 - junction_rev_idx];
                        let to = to_junctions[to_junctions.len() - 1 - junction_rev_idx];
                        if from.perimeter_index != to.perimeter_index {
                            warn!(
                                "Connecting junctions of different perimeters {} and {}",
                                from.perimeter_index, to.perimeter_index
                            );
                        }
                        let is_single_bead_end = |node: NodeId, p: Point| {
                            let data = &self.graph.node(node).data;
                            data.bead_count > 0
                                && data.bead_count % 2 == 1
                                && data.transition_ratio == 0.0
                                && junction_rev_idx == segment_count - 1
                                && (p - self.graph.node(node).p).shorter_than(snap)
                        };
                        let from_is_odd = is_single_bead_end(quad_start_to, from.position);
                        let to_is_odd = is_single_bead_end(quad_end_from, to.position);
                        let is_odd_segment = from_is_odd && to_is_odd;

                        let quad_start_next = self.graph.next(quad_start);
                        if is_odd_segment
                            && quad_start_next
                                .and_then(|e| self.graph.twin(e))
                                .map_or(false, |twin| passed_odd_edges.contains(&twin))
                        {
                            // Single bead segments are generated once
                            continue;
                        }
                        let from_is_3way = from_is_odd && self.graph.is_multi_intersection(quad_start_to);
                        let to_is_3way = to_is_odd && self.graph.is_multi_intersection(quad_end_from);
                        if let Some(next) = quad_start_next {
                            passed_odd_edges.insert(next);
                        }

                        self.add_toolpath_segment(from, to, is_odd_segment, new_domain_start, from_is_3way, to_is_3way);
                    }
                    new_domain_start = false;
                }

                guard += 1;
                match self.graph.next_unconnected(quad_start) {
                    Some(next) if next != poly_domain_start && guard <= self.graph.edge_count() => {
                        quad_start = next;
                    }
                    _ => break,
                }
            }
        }
    }

    /// Last edge, edge to the peak and edge from the peak of the trapezoid
    /// starting at `quad_start`.
    fn quad_corners(&self, quad_start: EdgeId) -> Option<(EdgeId, EdgeId, EdgeId)> {
        let mut quad_end = quad_start;
        let mut guard = 0;
        while let Some(next) = self.graph.next(quad_end) {
            quad_end = next;
            guard += 1;
            if guard > self.graph.edge_count() {
                return None;
            }
        }
        let edge_to_peak = self.quad_max_r_edge_to(quad_start)?;
        let edge_from_peak = self.graph.next(edge_to_peak)?;
        Some((quad_end, edge_to_peak, edge_from_peak))
    }

    /// The junctions from the outline up to the peak of a trapezoid on both
    /// of its sides, outermost last.
    fn quad_junctions(&self, edge_to_peak: EdgeId, edge_from_peak: EdgeId) -> (ExtrusionJunctions, ExtrusionJunctions) {
        let mut from_junctions = self.junctions_of(edge_to_peak);
        let mut to_junctions = self.twin_junctions_of(edge_from_peak);

        if let Some(prev) = self.graph.prev(edge_to_peak) {
            let from_prev_junctions = self.junctions_of(prev);
            if let Some(front) = from_prev_junctions.first() {
                while from_junctions
                    .last()
                    .map_or(false, |j| j.perimeter_index <= front.perimeter_index)
                {
                    from_junctions.pop();
                }
            }
            from_junctions.extend(from_prev_junctions);
            if self.graph.prev(prev).is_some() {
                warn!("The edge to connect is already connected");
            }
        }
        if let Some(next) = self.graph.next(edge_from_peak) {
            let to_next_junctions = self.twin_junctions_of(next);
            if let Some(front) = to_next_junctions.first() {
                while to_junctions
                    .last()
                    .map_or(false, |j| j.perimeter_index <= front.perimeter_index)
                {
                    to_junctions.pop();
                }
            }
            to_junctions.extend(to_next_junctions);
            if self.graph.next(next).is_some() {
                warn!("The edge to connect is already connected");
            }
        }
        (from_junctions, to_junctions)
    }

    /// A single bead circle at strict local maxima outside the central
    /// skeleton, where an odd beading would otherwise print nothing.
    fn generate_local_maxima_single_beads(&mut self) {
        for node in self.graph.node_ids() {
            let Some(propagation) = self.graph.node(node).data.beading.clone() else {
                continue;
            };
            let beading = &propagation.beading;
            if beading.bead_widths.len() % 2 != 1
                || !self.graph.is_local_maximum(node, true)
                || self.graph.is_node_central(node)
            {
                continue;
            }
            let inset_idx = beading.bead_widths.len() / 2;
            if inset_idx >= self.toolpaths.len() {
                self.toolpaths.resize_with(inset_idx + 1, Vec::new);
            }
            let width = beading.bead_widths[inset_idx];
            // A circle of radius w/8 extrudes about the area of one bead
            // width disc
            let r = width / 8;
            let center = self.graph.node(node).p;
            let mut line = ExtrusionLine::new(inset_idx, true, false);
            const N_SEGMENTS: usize = 6;
            for segment in 0..N_SEGMENTS {
                let angle = 2.0 * PI / N_SEGMENTS as f64 * segment as f64;
                let offset = Point::new(
                    (r as f64 * angle.cos()) as Coord,
                    (r as f64 * angle.sin()) as Coord,
                );
                line.push(ExtrusionJunction::new(center + offset, width, inset_idx));
            }
            self.toolpaths[inset_idx].push(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::SkeletalParams;
    use super::super::SkeletalTrapezoidation;
    use crate::geometry::{Point, Polygon};
    use crate::perimeter::arachne::beading::BeadingStrategyFactory;
    use crate::perimeter::arachne::config::WallToolPathsConfig;
    use crate::scale;

    #[test]
    fn test_junctions_on_upward_edges_only() {
        let config = WallToolPathsConfig::new(2, 0.4);
        let strategy = BeadingStrategyFactory::from_config(&config);
        let square = Polygon::rectangle(Point::zero(), Point::new(scale(4.0), scale(4.0)));
        let mut st = SkeletalTrapezoidation::new(&[square], strategy.as_ref(), SkeletalParams::from_config(&config), &config.voronoi)
            .unwrap();
        st.update_is_central();
        st.update_bead_count();
        st.store_node_beadings();
        let mids = st.upward_quad_mids();
        st.propagate_beadings_upward(&mids);
        st.propagate_beadings_downward(&mids);
        st.generate_junctions();

        let graph = st.graph();
        let mut count = 0;
        for edge in graph.edge_ids() {
            let Some(junctions) = graph.edge(edge).data.extrusion_junctions.as_ref() else {
                continue;
            };
            assert!(graph.r(graph.from(edge)) < graph.r(graph.to(edge)));
            // Ordered from the upper node down to the outline
            for pair in junctions.windows(2) {
                assert!(pair[0].perimeter_index > pair[1].perimeter_index);
            }
            count += junctions.len();
        }
        assert!(count > 0);
    }

    #[test]
    fn test_segments_join_into_lines() {
        let config = WallToolPathsConfig::new(2, 0.4);
        let strategy = BeadingStrategyFactory::from_config(&config);
        let square = Polygon::rectangle(Point::zero(), Point::new(scale(4.0), scale(4.0)));
        let toolpaths = SkeletalTrapezoidation::new(&[square], strategy.as_ref(), SkeletalParams::from_config(&config), &config.voronoi)
            .unwrap()
            .generate_toolpaths();

        assert!(!toolpaths.is_empty());
        let outer = &toolpaths[0];
        // Far fewer lines than trapezoids
        let junctions: usize = outer.iter().map(|line| line.len()).sum();
        assert!(outer.len() < junctions);
        for line in outer {
            assert!(line.len() >= 2);
            assert!(!line.is_odd);
        }
    }

    #[test]
    fn test_small_square_gets_single_bead_dot() {
        // Too small for any central edge; the one bead goes around the middle
        let config = WallToolPathsConfig::new(3, 0.4);
        let strategy = BeadingStrategyFactory::from_config(&config);
        let square = Polygon::rectangle(Point::zero(), Point::new_scale(0.5, 0.5));
        let toolpaths = SkeletalTrapezoidation::new(&[square], strategy.as_ref(), SkeletalParams::from_config(&config), &config.voronoi)
            .unwrap()
            .generate_toolpaths();

        let center = Point::new_scale(0.25, 0.25);
        let dots: Vec<_> = toolpaths
            .iter()
            .flatten()
            .filter(|line| line.len() == 6 && line.iter().all(|j| (j.position - center).shorter_than(scale(0.1))))
            .collect();
        assert!(!dots.is_empty());
        for dot in dots {
            assert!(dot.is_odd);
            assert_eq!(dot.inset_idx, 0);
            for junction in dot {
                assert_eq!(junction.perimeter_index, 0);
                assert!(junction.width > scale(0.3));
            }
        }
    }
}
