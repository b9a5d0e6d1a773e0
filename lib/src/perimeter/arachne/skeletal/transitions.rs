//! Bead count transitions.
//!
//! Where the bead count changes along a central edge, a transition middle is
//! placed at the radius the beading strategy switches at. Middles that are
//! closer together than the filter distance cancel out. Each remaining middle
//! gets two ends, one on either side at the transition length apart, and
//! those ends become nodes of the graph with ribs to the outline.

use super::graph::{EdgeId, EdgeKind, TransitionEnd, TransitionMiddle};
use super::{SkeletalTrapezoidation, SNAP_DIST};
use crate::Coord;
use log::warn;
use std::collections::HashSet;

/// A transition middle to remove: the edge holding it and its index.
type TransitionMidRef = (EdgeId, usize);

/// An edge on the stack of the transition end walk, with the children still
/// to visit.
struct EndFrame {
    edge: EdgeId,
    ab_size: Coord,
    end_pos: Coord,
    going_up: bool,
    rest: f64,
    children: Vec<EdgeId>,
    next_child: usize,
    is_only_going_down: bool,
    has_descended: bool,
}

/// Outcome of stepping onto an edge in the transition end walk.
enum EndStep {
    Done(bool),
    Descend(EndFrame),
}

impl SkeletalTrapezoidation<'_> {
    pub(super) fn generate_transitioning_ribs(&mut self) {
        self.generate_transition_mids();

        for edge in self.graph.edge_ids() {
            let from = self.graph.from(edge);
            let to = self.graph.to(edge);
            if self.graph.is_central(edge)
                && self.graph.bead_count(from) != self.graph.bead_count(to)
                && !self.graph.edge(edge).data.has_transitions(false)
                && !self
                    .graph
                    .twin(edge)
                    .map_or(false, |t| self.graph.edge(t).data.has_transitions(false))
            {
                warn!("Bead count changes along a central edge without a transition");
            }
        }

        self.filter_transition_mids();
        self.generate_all_transition_ends();
        self.apply_transitions();
    }

    /// Place transition middles on upward central edges whose ends differ in
    /// bead count.
    fn generate_transition_mids(&mut self) {
        for edge in self.graph.edge_ids() {
            if !self.graph.is_central(edge) {
                continue;
            }
            let from = self.graph.from(edge);
            let to = self.graph.to(edge);
            let start_r = self.graph.r(from);
            let end_r = self.graph.r(to);
            let start_bead_count = self.graph.bead_count(from);
            let end_bead_count = self.graph.bead_count(to);

            // Only edges going from lower to higher radius carry middles
            if start_r >= end_r || start_bead_count == end_bead_count {
                continue;
            }
            if start_bead_count > self.strategy.optimal_bead_count(start_r * 2)
                || end_bead_count > self.strategy.optimal_bead_count(end_r * 2)
            {
                warn!("Transitioning segment overlap");
            }

            let edge_size = self.graph.length(edge);
            let mut mids = Vec::new();
            for lower_bead_count in start_bead_count..end_bead_count {
                let mut mid_r = self.strategy.transition_thickness(lower_bead_count) / 2;
                if mid_r > end_r || mid_r < start_r {
                    warn!("Transition on segment lies outside of segment");
                    mid_r = mid_r.clamp(start_r, end_r);
                }
                let pos = (edge_size as i128 * (mid_r - start_r) as i128 / (end_r - start_r) as i128) as Coord;
                mids.push(TransitionMiddle {
                    pos,
                    lower_bead_count,
                    feature_radius: mid_r,
                });
            }
            self.graph.edge_mut(edge).data.transitions = Some(mids);
        }
    }

    /// Cancel transitions that are undone again within the filter distance,
    /// and transitions running into the end of a central region.
    fn filter_transition_mids(&mut self) {
        for edge in self.graph.edge_ids() {
            if !self.graph.edge(edge).data.has_transitions(false) {
                continue;
            }
            let Some(twin) = self.graph.twin(edge) else {
                continue;
            };
            let ab_size = self.graph.length(edge);

            let Some(back) = self.last_transition(edge) else { continue };
            let to_dissolve_back = self.dissolve_nearby_transitions(
                edge,
                back,
                ab_size - back.pos,
                self.params.transition_filter_dist,
                true,
            );
            let mut should_dissolve_back = !to_dissolve_back.is_empty();
            if should_dissolve_back {
                self.dissolve_bead_count_region(edge, back.lower_bead_count + 1, back.lower_bead_count);
                self.remove_transition_mids(to_dissolve_back);
            }
            let Some(back) = self.last_transition(edge) else { continue };
            let upper_half_length = ((1.0 - self.strategy.transition_anchor_pos(back.lower_bead_count))
                * self.strategy.transitioning_length(back.lower_bead_count) as f64)
                as Coord;
            should_dissolve_back |= self.filter_end_of_central_transition(
                edge,
                ab_size - back.pos,
                upper_half_length,
                back.lower_bead_count,
            );
            if should_dissolve_back {
                if let Some(transitions) = self.graph.edge_mut(edge).data.transitions.as_mut() {
                    transitions.pop();
                }
            }

            let Some(front) = self.first_transition(edge) else { continue };
            let to_dissolve_front = self.dissolve_nearby_transitions(
                twin,
                front,
                front.pos,
                self.params.transition_filter_dist,
                false,
            );
            let mut should_dissolve_front = !to_dissolve_front.is_empty();
            if should_dissolve_front {
                self.dissolve_bead_count_region(twin, front.lower_bead_count, front.lower_bead_count + 1);
                self.remove_transition_mids(to_dissolve_front);
            }
            let Some(front) = self.first_transition(edge) else { continue };
            let lower_half_length = (self.strategy.transition_anchor_pos(front.lower_bead_count)
                * self.strategy.transitioning_length(front.lower_bead_count) as f64)
                as Coord;
            should_dissolve_front |= self.filter_end_of_central_transition(
                twin,
                front.pos,
                lower_half_length,
                front.lower_bead_count + 1,
            );
            if should_dissolve_front {
                if let Some(transitions) = self.graph.edge_mut(edge).data.transitions.as_mut() {
                    if !transitions.is_empty() {
                        transitions.remove(0);
                    }
                }
            }
        }
    }

    fn first_transition(&self, edge: EdgeId) -> Option<TransitionMiddle> {
        self.graph.edge(edge).data.transitions.as_ref()?.first().copied()
    }

    fn last_transition(&self, edge: EdgeId) -> Option<TransitionMiddle> {
        self.graph.edge(edge).data.transitions.as_ref()?.last().copied()
    }

    fn remove_transition_mids(&mut self, mut refs: Vec<TransitionMidRef>) {
        refs.sort_unstable();
        refs.dedup();
        for (edge, idx) in refs.into_iter().rev() {
            if let Some(transitions) = self.graph.edge_mut(edge).data.transitions.as_mut() {
                if idx < transitions.len() {
                    transitions.remove(idx);
                }
            }
        }
    }

    /// Find transitions of the same bead count as `origin` within `max_dist`
    /// from the end of `edge_to_start`, walking away from it over central
    /// edges. Empty unless every direction meets such a transition in time
    /// without the width deviating too much on the way.
    fn dissolve_nearby_transitions(
        &self,
        edge_to_start: EdgeId,
        origin: TransitionMiddle,
        traveled_dist: Coord,
        max_dist: Coord,
        going_up: bool,
    ) -> Vec<TransitionMidRef> {
        let dissolve_result_is_odd = (origin.lower_bead_count % 2 != 0) == going_up;
        let mut to_be_dissolved = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![(edge_to_start, traveled_dist)];

        while let Some((edge_to, traveled)) = stack.pop() {
            if traveled > max_dist {
                // Too long to dissolve in this direction, so not at all
                return Vec::new();
            }
            let central: Vec<EdgeId> = self
                .graph
                .outgoing_after(edge_to)
                .into_iter()
                .filter(|&e| self.graph.is_central(e))
                .collect();
            if central.is_empty() {
                return Vec::new();
            }

            for edge in central {
                if !visited.insert(edge) {
                    continue;
                }
                let radius_here = self.graph.r(self.graph.from(edge));
                // The deviation happens on both sides of the skeleton
                let width_deviation = (origin.feature_radius - radius_here).abs() * 2;
                let line_width_deviation = if dissolve_result_is_odd {
                    width_deviation
                } else {
                    width_deviation / 2
                };
                if line_width_deviation > self.params.allowed_filter_deviation {
                    return Vec::new();
                }

                let ab_size = self.graph.length(edge);
                let is_aligned = self.graph.is_upward(edge);
                let aligned_edge = if is_aligned {
                    edge
                } else {
                    match self.graph.twin(edge) {
                        Some(twin) => twin,
                        None => continue,
                    }
                };
                let mut seen_transition_on_this_edge = false;
                if let Some(transitions) = self.graph.edge(aligned_edge).data.transitions.as_ref() {
                    for (idx, transition) in transitions.iter().enumerate() {
                        let pos = if is_aligned { transition.pos } else { ab_size - transition.pos };
                        if traveled + pos < max_dist && transition.lower_bead_count == origin.lower_bead_count {
                            to_be_dissolved.push((aligned_edge, idx));
                            seen_transition_on_this_edge = true;
                        }
                    }
                }
                if !seen_transition_on_this_edge {
                    stack.push((edge, traveled + ab_size));
                }
            }
        }
        to_be_dissolved
    }

    /// Relabel the central region beyond `edge_to_start` that has
    /// `from_bead_count` beads.
    fn dissolve_bead_count_region(&mut self, edge_to_start: EdgeId, from_bead_count: i64, to_bead_count: i64) {
        if from_bead_count == to_bead_count {
            return;
        }
        let mut stack = vec![edge_to_start];
        while let Some(edge) = stack.pop() {
            let to = self.graph.to(edge);
            if self.graph.bead_count(to) != from_bead_count {
                continue;
            }
            self.graph.node_mut(to).data.bead_count = to_bead_count;
            stack.extend(
                self.graph
                    .outgoing_after(edge)
                    .into_iter()
                    .filter(|&e| self.graph.is_central(e)),
            );
        }
    }

    /// Whether the central region ends within `max_dist` beyond
    /// `edge_to_start`. If so, the nodes up to that end get
    /// `replacing_bead_count` beads.
    fn filter_end_of_central_transition(
        &mut self,
        edge_to_start: EdgeId,
        traveled_dist: Coord,
        max_dist: Coord,
        replacing_bead_count: i64,
    ) -> bool {
        struct Frame {
            edge: EdgeId,
            traveled: Coord,
            children: Vec<EdgeId>,
            next_child: usize,
            dissolve: bool,
        }

        let enter = |this: &Self, visited: &mut HashSet<EdgeId>, edge: EdgeId, traveled: Coord| -> Option<Frame> {
            if traveled > max_dist || !visited.insert(edge) {
                return None;
            }
            let children = this
                .graph
                .outgoing_after(edge)
                .into_iter()
                .filter(|&e| this.graph.is_central(e))
                .collect();
            Some(Frame {
                edge,
                traveled,
                children,
                next_child: 0,
                dissolve: false,
            })
        };

        let mut visited = HashSet::new();
        let Some(first) = enter(self, &mut visited, edge_to_start, traveled_dist) else {
            return false;
        };
        let mut stack = vec![first];
        let mut result = false;

        while let Some(frame) = stack.last_mut() {
            if frame.next_child < frame.children.len() {
                let child = frame.children[frame.next_child];
                frame.next_child += 1;
                let traveled = frame.traveled + self.graph.length(child);
                if let Some(child_frame) = enter(self, &mut visited, child, traveled) {
                    stack.push(child_frame);
                }
                continue;
            }

            let Some(frame) = stack.pop() else { break };
            let is_end_of_central = frame.children.is_empty();
            let dissolve = frame.dissolve || (is_end_of_central && frame.traveled < max_dist);
            if dissolve {
                let to = self.graph.to(frame.edge);
                self.graph.node_mut(to).data.bead_count = replacing_bead_count;
            }
            match stack.last_mut() {
                Some(parent) => parent.dissolve |= dissolve,
                None => result = dissolve,
            }
        }
        result
    }

    fn generate_all_transition_ends(&mut self) {
        for edge in self.graph.edge_ids() {
            let Some(mids) = self.graph.edge(edge).data.transitions.clone() else {
                continue;
            };
            for mid in mids {
                self.generate_transition_ends(edge, mid.pos, mid.lower_bead_count);
            }
        }
    }

    fn generate_transition_ends(&mut self, edge: EdgeId, mid_pos: Coord, lower_bead_count: i64) {
        let Some(twin) = self.graph.twin(edge) else {
            return;
        };
        let ab_size = self.graph.length(edge);
        let transition_length = self.strategy.transitioning_length(lower_bead_count);
        let anchor = self.strategy.transition_anchor_pos(lower_bead_count);

        let start_rest = 0.0;
        let mid_rest = anchor;
        let end_rest = 1.0;

        // Lower bead count end, on the twin
        let start_pos = ab_size - mid_pos;
        let half_length = (anchor * transition_length as f64) as Coord;
        self.generate_transition_end(
            twin,
            start_pos,
            start_pos + half_length,
            half_length,
            mid_rest,
            start_rest,
            lower_bead_count,
        );

        // Upper bead count end
        let half_length = ((1.0 - anchor) * transition_length as f64) as Coord;
        self.generate_transition_end(
            edge,
            mid_pos,
            mid_pos + half_length,
            half_length,
            mid_rest,
            end_rest,
            lower_bead_count,
        );
    }

    /// Put a transition end `end_pos` along `edge`, continuing over the
    /// central edges beyond it when the edge is too short. Returns whether
    /// all those directions lead down to a lower bead count.
    #[allow(clippy::too_many_arguments)]
    fn generate_transition_end(
        &mut self,
        edge: EdgeId,
        start_pos: Coord,
        end_pos: Coord,
        transition_half_length: Coord,
        start_rest: f64,
        end_rest: f64,
        lower_bead_count: i64,
    ) -> bool {
        let mut visited = HashSet::new();
        let first = match self.step_transition_end(&mut visited, edge, start_pos, end_pos, start_rest, end_rest, lower_bead_count) {
            EndStep::Done(is_going_down) => return is_going_down,
            EndStep::Descend(frame) => frame,
        };
        let mut stack = vec![first];
        let mut result = false;

        while let Some(frame) = stack.last_mut() {
            if frame.next_child < frame.children.len() {
                let next = frame.children[frame.next_child];
                frame.next_child += 1;
                let (going_up, rest) = (frame.going_up, frame.rest);
                let beyond = frame.end_pos - frame.ab_size;
                // Past a junction of central edges, the direction towards a
                // lower bead count gets no end when going up
                if frame.children.len() > 1
                    && going_up
                    && self.is_going_down(next, 0, beyond + transition_half_length, lower_bead_count)
                {
                    continue;
                }
                frame.has_descended = true;
                match self.step_transition_end(&mut visited, next, 0, beyond, rest, end_rest, lower_bead_count) {
                    EndStep::Done(is_going_down) => frame.is_only_going_down &= is_going_down,
                    EndStep::Descend(child) => stack.push(child),
                }
                continue;
            }

            let Some(frame) = stack.pop() else { break };
            if !frame.going_up || (frame.has_descended && !frame.is_only_going_down) {
                let to = self.graph.to(frame.edge);
                let data = &mut self.graph.node_mut(to).data;
                data.transition_ratio = frame.rest;
                data.bead_count = lower_bead_count;
            }
            match stack.last_mut() {
                Some(parent) => parent.is_only_going_down &= frame.is_only_going_down,
                None => result = frame.is_only_going_down,
            }
        }
        result
    }

    /// One edge of the transition end walk: either the end lands on it, or
    /// the walk has to continue over the central edges beyond it.
    #[allow(clippy::too_many_arguments)]
    fn step_transition_end(
        &mut self,
        visited: &mut HashSet<EdgeId>,
        edge: EdgeId,
        start_pos: Coord,
        end_pos: Coord,
        start_rest: f64,
        end_rest: f64,
        lower_bead_count: i64,
    ) -> EndStep {
        let ab_size = self.graph.length(edge);
        if start_pos > ab_size {
            warn!("Start position of edge is beyond edge range");
        }
        let going_up = end_rest > start_rest;

        if !self.graph.is_central(edge) {
            warn!("Transition ends cannot be placed in non-central regions");
            return EndStep::Done(false);
        }
        if !visited.insert(edge) {
            return EndStep::Done(false);
        }

        if end_pos > ab_size {
            let rest = if start_pos == end_pos {
                end_rest
            } else {
                end_rest - (start_rest - end_rest) * (end_pos - ab_size) as f64 / (start_pos - end_pos) as f64
            };
            let children = self
                .graph
                .outgoing_after(edge)
                .into_iter()
                .filter(|&e| self.graph.is_central(e))
                .collect();
            return EndStep::Descend(EndFrame {
                edge,
                ab_size,
                end_pos,
                going_up,
                rest,
                children,
                next_child: 0,
                is_only_going_down: true,
                has_descended: false,
            });
        }

        let is_lower_end = end_rest == 0.0;
        let (upward_edge, pos) = if self.graph.is_upward(edge) {
            (edge, end_pos)
        } else {
            match self.graph.twin(edge) {
                Some(twin) => (twin, ab_size - end_pos),
                None => return EndStep::Done(false),
            }
        };
        self.graph
            .edge_mut(upward_edge)
            .data
            .transition_ends
            .get_or_insert_with(Vec::new)
            .push(TransitionEnd {
                pos,
                lower_bead_count,
                is_lower_end,
            });
        EndStep::Done(false)
    }

    /// Whether `outgoing` leads to a lower bead count within `max_dist` in
    /// every direction.
    fn is_going_down(&self, outgoing: EdgeId, traveled_dist: Coord, max_dist: Coord, lower_bead_count: i64) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![(outgoing, traveled_dist)];

        while let Some((edge, traveled)) = stack.pop() {
            if !visited.insert(edge) {
                return false;
            }
            let from = self.graph.from(edge);
            let to = self.graph.to(edge);
            if self.graph.r(to) == 0 {
                continue;
            }
            let is_upward = self.graph.r(to) >= self.graph.r(from);
            let upward_edge = if is_upward { Some(edge) } else { self.graph.twin(edge) };
            if self.graph.bead_count(to) > lower_bead_count + 1 {
                if !upward_edge.map_or(false, |e| self.graph.edge(e).data.has_transitions(false)) {
                    warn!("Bead count going down without a transition middle");
                }
                return false;
            }

            let length = self.graph.length(edge);
            if let Some(mids) = upward_edge.and_then(|e| self.graph.edge(e).data.transitions.as_ref()) {
                let mid = if is_upward { mids.first() } else { mids.last() };
                if let Some(mid) = mid {
                    let dist = if is_upward { mid.pos } else { length - mid.pos };
                    if mid.lower_bead_count == lower_bead_count && dist + traveled < max_dist {
                        continue;
                    }
                }
            }
            if traveled + length > max_dist {
                return false;
            }
            let to_data = &self.graph.node(to).data;
            if to_data.bead_count <= lower_bead_count
                && !(to_data.bead_count == lower_bead_count && to_data.transition_ratio > 0.0)
            {
                continue;
            }

            let before = stack.len();
            stack.extend(
                self.graph
                    .outgoing_after(edge)
                    .into_iter()
                    .filter(|&e| self.graph.is_central(e))
                    .map(|e| (e, traveled + length)),
            );
            if stack.len() == before {
                return false;
            }
        }
        true
    }

    /// Turn the transition ends into nodes with ribs to the outline.
    fn apply_transitions(&mut self) {
        let edges = self.graph.edge_ids();

        // Move ends stored on the twin onto the edge itself
        for &edge in &edges {
            let Some(twin) = self.graph.twin(edge) else {
                continue;
            };
            let Some(twin_ends) = self.graph.edge_mut(twin).data.transition_ends.take() else {
                continue;
            };
            if twin_ends.is_empty() {
                continue;
            }
            let length = self.graph.length(edge);
            self.graph
                .edge_mut(edge)
                .data
                .transition_ends
                .get_or_insert_with(Vec::new)
                .extend(twin_ends.into_iter().map(|end| TransitionEnd {
                    pos: length - end.pos,
                    ..end
                }));
        }

        for &edge in &edges {
            let Some(mut ends) = self.graph.edge_mut(edge).data.transition_ends.take() else {
                continue;
            };
            if ends.is_empty() {
                continue;
            }
            if !self.graph.is_central(edge) {
                warn!("Transition ends on a non-central edge");
            }
            ends.sort_by_key(|end| end.pos);

            let from = self.graph.from(edge);
            let to = self.graph.to(edge);
            let a = self.graph.node(from).p;
            let ab = self.graph.node(to).p - a;
            let ab_size = ab.length_coord();

            let mut last_edge_replacing_input = edge;
            for end in ends {
                let new_bead_count = if end.is_lower_end {
                    end.lower_bead_count
                } else {
                    end.lower_bead_count + 1
                };
                if self.snap_to_close_node(from, to, end.pos, ab_size, new_bead_count) {
                    continue;
                }
                let mid = a + ab.with_length(end.pos);
                match self.graph.insert_node(last_edge_replacing_input, mid, new_bead_count) {
                    Some(last) => last_edge_replacing_input = last,
                    None => break,
                }
            }
        }

        for edge in self.graph.edge_ids() {
            let data = &mut self.graph.edge_mut(edge).data;
            data.transitions = None;
            data.transition_ends = None;
        }
    }

    /// A point `end_pos` along `from`-`to` close to one of its nodes with the
    /// same bead count snaps onto that node.
    fn snap_to_close_node(
        &mut self,
        from: super::graph::NodeId,
        to: super::graph::NodeId,
        end_pos: Coord,
        ab_size: Coord,
        bead_count: i64,
    ) -> bool {
        let close_node = if end_pos < ab_size / 2 { from } else { to };
        if (end_pos < SNAP_DIST || end_pos > ab_size - SNAP_DIST) && self.graph.bead_count(close_node) == bead_count {
            self.graph.node_mut(close_node).data.transition_ratio = 0.0;
            return true;
        }
        false
    }

    /// Add nodes on rising central edges where the beading changes
    /// non-linearly.
    pub(super) fn generate_extra_ribs(&mut self) {
        for edge in self.graph.edge_ids() {
            let from = self.graph.from(edge);
            let to = self.graph.to(edge);
            let a_r = self.graph.r(from);
            let b_r = self.graph.r(to);
            if !self.graph.is_central(edge)
                || (self.graph.to_p(edge) - self.graph.from_p(edge)).shorter_than(self.params.discretization_step_size)
                || a_r >= b_r
            {
                continue;
            }

            let rib_thicknesses = self.strategy.nonlinear_thicknesses(self.graph.bead_count(from));
            if rib_thicknesses.is_empty() {
                continue;
            }

            let a = self.graph.node(from).p;
            let ab = self.graph.node(to).p - a;
            let ab_size = ab.length_coord();
            let mut last_edge_replacing_input = edge;
            for rib_thickness in rib_thicknesses {
                if rib_thickness / 2 <= a_r {
                    continue;
                }
                if rib_thickness / 2 >= b_r {
                    break;
                }
                let new_bead_count = self.graph.bead_count(from).min(self.graph.bead_count(to));
                let end_pos = (ab_size as i128 * (rib_thickness / 2 - a_r) as i128 / (b_r - a_r) as i128) as Coord;
                if self.snap_to_close_node(from, to, end_pos, ab_size, new_bead_count) {
                    continue;
                }
                if self.graph.edge(last_edge_replacing_input).data.kind == EdgeKind::ExtraVd {
                    break;
                }
                let mid = a + ab.with_length(end_pos);
                match self.graph.insert_node(last_edge_replacing_input, mid, new_bead_count) {
                    Some(last) => last_edge_replacing_input = last,
                    None => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::SkeletalParams;
    use super::super::SkeletalTrapezoidation;
    use super::*;
    use crate::geometry::{Point, Polygon};
    use crate::perimeter::arachne::beading::BeadingStrategyFactory;
    use crate::perimeter::arachne::config::WallToolPathsConfig;
    use crate::scale;

    /// A strip that widens from 0.6 mm to 1.4 mm over 20 mm.
    fn wedge() -> Polygon {
        Polygon::from_points(vec![
            Point::new(0, 0),
            Point::new(scale(20.0), -scale(0.4)),
            Point::new(scale(20.0), scale(1.0)),
            Point::new(0, scale(0.6)),
        ])
    }

    #[test]
    fn test_transition_mids_on_widening_strip() {
        let config = WallToolPathsConfig::new(3, 0.4);
        let strategy = BeadingStrategyFactory::from_config(&config);
        let mut st = SkeletalTrapezoidation::new(&[wedge()], strategy.as_ref(), SkeletalParams::from_config(&config), &config.voronoi)
            .unwrap();
        st.update_is_central();
        st.filter_central(super::super::CENTRAL_FILTER_DIST);
        st.update_bead_count();
        st.filter_noncentral_regions();
        st.generate_transition_mids();

        let graph = st.graph();
        let mut mids = Vec::new();
        for edge in graph.edge_ids() {
            if let Some(transitions) = graph.edge(edge).data.transitions.as_ref() {
                // Middles only sit on rising edges
                assert!(graph.r(graph.from(edge)) < graph.r(graph.to(edge)));
                for mid in transitions {
                    assert!(mid.pos >= 0 && mid.pos <= graph.length(edge));
                    mids.push(mid.lower_bead_count);
                }
            }
        }
        // From 1 to 2 and from 2 to 3 beads
        mids.sort_unstable();
        mids.dedup();
        assert!(mids.contains(&1));
        assert!(mids.contains(&2));
    }

    #[test]
    fn test_transitions_become_nodes() {
        let config = WallToolPathsConfig::new(3, 0.4);
        let strategy = BeadingStrategyFactory::from_config(&config);
        let mut st = SkeletalTrapezoidation::new(&[wedge()], strategy.as_ref(), SkeletalParams::from_config(&config), &config.voronoi)
            .unwrap();
        st.update_is_central();
        st.filter_central(super::super::CENTRAL_FILTER_DIST);
        st.update_bead_count();
        st.filter_noncentral_regions();
        let nodes_before = st.graph().node_count();
        st.generate_transitioning_ribs();

        let graph = st.graph();
        assert!(graph.node_count() > nodes_before);
        for edge in graph.edge_ids() {
            assert!(graph.twin(edge).is_some());
            assert!(graph.edge(edge).data.transitions.is_none());
            assert!(graph.edge(edge).data.transition_ends.is_none());
        }
        // Transition ends carry ribs to the outline
        let ribs = graph
            .edge_ids()
            .into_iter()
            .filter(|&e| graph.edge(e).data.kind == EdgeKind::TransitionEnd)
            .count();
        assert!(ribs >= 4);
    }

    #[test]
    fn test_dissolve_bead_count_region() {
        let config = WallToolPathsConfig::new(3, 0.4);
        let strategy = BeadingStrategyFactory::from_config(&config);
        let strip = Polygon::rectangle(Point::zero(), Point::new(scale(10.0), scale(1.0)));
        let mut st = SkeletalTrapezoidation::new(&[strip], strategy.as_ref(), SkeletalParams::from_config(&config), &config.voronoi)
            .unwrap();
        st.update_is_central();
        st.update_bead_count();

        let start = st
            .graph()
            .edge_ids()
            .into_iter()
            .find(|&e| st.graph().is_central(e))
            .unwrap();
        let count = st.graph().bead_count(st.graph().to(start));
        st.dissolve_bead_count_region(start, count, count + 1);
        let graph = st.graph();
        assert_eq!(graph.bead_count(graph.to(start)), count + 1);
        // The walk only goes forward
        assert_eq!(graph.bead_count(graph.from(start)), count);
    }

    /// Two 2 mm wide bulbs joined by a 0.4 mm bridge through tapered
    /// shoulders.
    fn tapered_dumbbell() -> Polygon {
        let points = [
            (0.0, -1.0),
            (4.0, -1.0),
            (8.0, -0.2),
            (12.0, -0.2),
            (16.0, -1.0),
            (20.0, -1.0),
            (20.0, 1.0),
            (16.0, 1.0),
            (12.0, 0.2),
            (8.0, 0.2),
            (4.0, 1.0),
            (0.0, 1.0),
        ];
        Polygon::from_points(points.iter().map(|&(x, y)| Point::new_scale(x, y)).collect())
    }

    #[test]
    fn test_dumbbell_transitions_lie_between_bridge_and_bulbs() {
        let config = WallToolPathsConfig::new(3, 0.4);
        let strategy = BeadingStrategyFactory::from_config(&config);
        let outline = tapered_dumbbell();
        let mut st = SkeletalTrapezoidation::new(
            std::slice::from_ref(&outline),
            strategy.as_ref(),
            SkeletalParams::from_config(&config),
            &config.voronoi,
        )
        .unwrap();
        st.update_is_central();
        st.filter_central(super::super::CENTRAL_FILTER_DIST);
        st.update_bead_count();
        st.filter_noncentral_regions();
        st.generate_transition_mids();

        let graph = st.graph();
        let mut lower_counts = Vec::new();
        for edge in graph.edge_ids() {
            let Some(transitions) = graph.edge(edge).data.transitions.as_ref() else {
                continue;
            };
            let a = graph.from_p(edge);
            let ab = graph.to_p(edge) - a;
            for mid in transitions {
                let p = a + ab.with_length(mid.pos);
                let radius = p.distance(&outline.closest_point(&p)) as Coord;
                assert!(radius > scale(0.2) + scale(0.02), "{p:?} at radius {radius} in the bridge");
                assert!(radius < scale(1.0) - scale(0.02), "{p:?} at radius {radius} in a bulb");
                let on_shoulder = (p.x >= scale(3.9) && p.x <= scale(8.1)) || (p.x >= scale(11.9) && p.x <= scale(16.1));
                assert!(on_shoulder, "{p:?} not on a shoulder");
                lower_counts.push(mid.lower_bead_count);
            }
        }
        // One bead on the bridge, five in the bulbs
        assert!(lower_counts.contains(&1));
        assert!(lower_counts.contains(&4));
        assert!(lower_counts.iter().all(|&count| (1..5).contains(&count)));
    }

    #[test]
    fn test_transitions_on_ring_terminate() {
        // The hole sits off center, so the ring is 0.4 mm wide on the left
        // and 2 mm wide elsewhere
        let config = WallToolPathsConfig::new(3, 0.4);
        let strategy = BeadingStrategyFactory::from_config(&config);
        let outer = Polygon::rectangle(Point::zero(), Point::new_scale(10.0, 10.0));
        let mut hole = Polygon::rectangle(Point::new_scale(0.4, 2.0), Point::new_scale(8.0, 8.0));
        hole.make_clockwise();
        let outline = [outer, hole];
        let build = || {
            SkeletalTrapezoidation::new(
                &outline,
                strategy.as_ref(),
                SkeletalParams::from_config(&config),
                &config.voronoi,
            )
            .unwrap()
        };
        let mut st = build();
        st.update_is_central();
        st.filter_central(super::super::CENTRAL_FILTER_DIST);
        st.update_bead_count();
        st.filter_noncentral_regions();
        st.generate_transitioning_ribs();

        let graph = st.graph();
        for edge in graph.edge_ids() {
            let twin = graph.twin(edge).unwrap();
            assert_eq!(graph.twin(twin), Some(edge));
            assert!(graph.edge(edge).data.transitions.is_none());
            assert!(graph.edge(edge).data.transition_ends.is_none());
        }
        let toolpaths = build().generate_toolpaths();
        assert!(toolpaths.iter().any(|lines| !lines.is_empty()));
    }
}
