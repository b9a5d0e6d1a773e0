//! Half-edge graph of the skeleton.
//!
//! Nodes and edges live in two arenas and refer to each other by index.
//! Removal only marks an element dead; ids stay valid for the lifetime of
//! the graph. Every edge keeps its `twin`, the chain of a trapezoid is linked
//! through `prev`/`next`, and the edges around a node are reached through
//! `twin.next`.

use crate::geometry::{Line, Point};
use crate::perimeter::arachne::beading::Beading;
use crate::perimeter::arachne::junction::ExtrusionJunctions;
use crate::Coord;
use log::warn;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub usize);

/// Origin of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Part of a Voronoi edge.
    Normal,
    /// Rib added between the skeleton and the outline.
    ExtraVd,
    /// Rib added at the end of a bead count transition.
    TransitionEnd,
}

/// Whether an edge belongs to the central (medial) part of the skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Centrality {
    Unknown,
    Central,
    NonCentral,
}

/// Middle of a transition between `lower_bead_count` and one more bead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionMiddle {
    /// Distance from the lower end of the edge.
    pub pos: Coord,
    pub lower_bead_count: i64,
    /// Distance to the outline at the middle of the transition.
    pub feature_radius: Coord,
}

/// Start or end of a transition, where a rib will be inserted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionEnd {
    /// Distance from the lower end of the edge.
    pub pos: Coord,
    pub lower_bead_count: i64,
    /// Whether this end has the lower bead count.
    pub is_lower_end: bool,
}

/// A beading together with the distances to where it was computed.
#[derive(Debug, Clone, PartialEq)]
pub struct BeadingPropagation {
    pub beading: Beading,
    pub dist_to_bottom_source: Coord,
    pub dist_from_top_source: Coord,
    pub is_upward_propagated_only: bool,
}

impl BeadingPropagation {
    pub fn new(beading: Beading) -> Self {
        Self {
            beading,
            dist_to_bottom_source: 0,
            dist_from_top_source: 0,
            is_upward_propagated_only: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeData {
    /// Distance to the outline. Negative when unknown.
    pub distance_to_boundary: Coord,
    /// Number of beads here, `-1` when not yet known.
    pub bead_count: i64,
    /// How far towards one more bead a transition has come, in `[0, 1)`.
    pub transition_ratio: f64,
    pub beading: Option<Rc<BeadingPropagation>>,
}

impl Default for NodeData {
    fn default() -> Self {
        Self {
            distance_to_boundary: -1,
            bead_count: -1,
            transition_ratio: 0.0,
            beading: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EdgeData {
    pub kind: EdgeKind,
    pub central: Centrality,
    pub transitions: Option<Vec<TransitionMiddle>>,
    pub transition_ends: Option<Vec<TransitionEnd>>,
    pub extrusion_junctions: Option<ExtrusionJunctions>,
}

impl EdgeData {
    pub fn new(kind: EdgeKind) -> Self {
        Self {
            kind,
            central: Centrality::Unknown,
            transitions: None,
            transition_ends: None,
            extrusion_junctions: None,
        }
    }

    #[inline]
    pub fn is_central(&self) -> bool {
        self.central == Centrality::Central
    }

    pub fn set_central(&mut self, central: bool) {
        self.central = if central {
            Centrality::Central
        } else {
            Centrality::NonCentral
        };
    }

    /// With `ignore_empty` an empty list counts as having transitions.
    pub fn has_transitions(&self, ignore_empty: bool) -> bool {
        self.transitions
            .as_ref()
            .map_or(false, |t| ignore_empty || !t.is_empty())
    }

    pub fn has_transition_ends(&self, ignore_empty: bool) -> bool {
        self.transition_ends
            .as_ref()
            .map_or(false, |t| ignore_empty || !t.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub p: Point,
    pub data: NodeData,
    pub incident_edge: Option<EdgeId>,
    alive: bool,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub twin: Option<EdgeId>,
    pub next: Option<EdgeId>,
    pub prev: Option<EdgeId>,
    pub data: EdgeData,
    alive: bool,
}

/// The skeleton as a half-edge graph.
#[derive(Debug, Clone, Default)]
pub struct SkeletalGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl SkeletalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, p: Point, distance_to_boundary: Coord) -> NodeId {
        self.nodes.push(Node {
            p,
            data: NodeData {
                distance_to_boundary,
                ..Default::default()
            },
            incident_edge: None,
            alive: true,
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId, data: EdgeData) -> EdgeId {
        self.edges.push(Edge {
            from,
            to,
            twin: None,
            next: None,
            prev: None,
            data,
            alive: true,
        });
        EdgeId(self.edges.len() - 1)
    }

    pub fn remove_node(&mut self, node: NodeId) {
        self.nodes[node.0].alive = false;
    }

    pub fn remove_edge(&mut self, edge: EdgeId) {
        self.edges[edge.0].alive = false;
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    #[inline]
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0]
    }

    #[inline]
    pub fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        &mut self.edges[id.0]
    }

    /// Ids of all live nodes, in creation order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        (0..self.nodes.len())
            .filter(|&i| self.nodes[i].alive)
            .map(NodeId)
            .collect()
    }

    /// Ids of all live edges, in creation order.
    pub fn edge_ids(&self) -> Vec<EdgeId> {
        (0..self.edges.len())
            .filter(|&i| self.edges[i].alive)
            .map(EdgeId)
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.alive).count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().filter(|e| e.alive).count()
    }

    pub fn is_edge_alive(&self, id: EdgeId) -> bool {
        self.edges[id.0].alive
    }

    // Shorthands used throughout the passes.

    #[inline]
    pub fn from(&self, e: EdgeId) -> NodeId {
        self.edges[e.0].from
    }

    #[inline]
    pub fn to(&self, e: EdgeId) -> NodeId {
        self.edges[e.0].to
    }

    #[inline]
    pub fn twin(&self, e: EdgeId) -> Option<EdgeId> {
        self.edges[e.0].twin
    }

    #[inline]
    pub fn next(&self, e: EdgeId) -> Option<EdgeId> {
        self.edges[e.0].next
    }

    #[inline]
    pub fn prev(&self, e: EdgeId) -> Option<EdgeId> {
        self.edges[e.0].prev
    }

    /// Distance to the outline of a node.
    #[inline]
    pub fn r(&self, n: NodeId) -> Coord {
        self.nodes[n.0].data.distance_to_boundary
    }

    #[inline]
    pub fn bead_count(&self, n: NodeId) -> i64 {
        self.nodes[n.0].data.bead_count
    }

    #[inline]
    pub fn from_p(&self, e: EdgeId) -> Point {
        self.nodes[self.from(e).0].p
    }

    #[inline]
    pub fn to_p(&self, e: EdgeId) -> Point {
        self.nodes[self.to(e).0].p
    }

    /// Length of an edge rounded to the grid.
    pub fn length(&self, e: EdgeId) -> Coord {
        (self.to_p(e) - self.from_p(e)).length_coord()
    }

    pub fn is_central(&self, e: EdgeId) -> bool {
        self.edges[e.0].data.is_central()
    }

    /// Next edge leaving the same node, turning around it.
    #[inline]
    pub fn next_around(&self, e: EdgeId) -> Option<EdgeId> {
        self.twin(e).and_then(|t| self.next(t))
    }

    /// Edges leaving the end of `edge_to`, from `edge_to.next` around the
    /// node up to but excluding its twin. Stops early at an open fan.
    pub fn outgoing_after(&self, edge_to: EdgeId) -> Vec<EdgeId> {
        let stop = self.twin(edge_to);
        let mut ret = Vec::new();
        let mut edge = self.next(edge_to);
        while let Some(e) = edge {
            if Some(e) == stop || ret.len() > self.edges.len() {
                break;
            }
            ret.push(e);
            edge = self.next_around(e);
        }
        ret
    }

    /// Edges leaving `node`, starting at its incident edge. Stops at an open
    /// fan; `None` when the fan is open.
    pub fn outgoing(&self, node: NodeId) -> Option<Vec<EdgeId>> {
        let first = self.node(node).incident_edge?;
        let mut ret = vec![first];
        let mut edge = first;
        loop {
            edge = self.next_around(edge)?;
            if edge == first || ret.len() > self.edges.len() {
                return Some(ret);
            }
            ret.push(edge);
        }
    }

    /// Like [`Self::outgoing`], but returns what was seen before an open
    /// end of the fan.
    pub fn outgoing_partial(&self, node: NodeId) -> Vec<EdgeId> {
        let Some(first) = self.node(node).incident_edge else {
            return Vec::new();
        };
        let mut ret = vec![first];
        let mut edge = first;
        while let Some(e) = self.next_around(edge) {
            if e == first || ret.len() > self.edges.len() {
                break;
            }
            ret.push(e);
            edge = e;
        }
        ret
    }

    /// Shortest distance over edges of equal radius after which the skeleton
    /// starts going up, `Some(0)` when `edge` itself goes up and `None` when
    /// it cannot go up at all.
    pub fn dist_to_go_up(&self, edge: EdgeId) -> Option<Coord> {
        let mut queue = BinaryHeap::new();
        let mut visited = HashSet::new();
        queue.push(Reverse((0 as Coord, edge)));
        while let Some(Reverse((traveled, e))) = queue.pop() {
            if !visited.insert(e) {
                continue;
            }
            let from_r = self.r(self.from(e));
            let to_r = self.r(self.to(e));
            if to_r > from_r {
                return Some(traveled);
            }
            if to_r < from_r {
                continue;
            }
            let length = self.length(e);
            for outgoing in self.outgoing_after(e) {
                if self.next_around(outgoing).is_none() {
                    // Open fan: the outline is right here
                    return Some(0);
                }
                if !visited.contains(&outgoing) {
                    queue.push(Reverse((traveled + length, outgoing)));
                }
            }
        }
        None
    }

    /// Whether following `edge` leads away from the outline. With `strict`
    /// only a directly rising edge counts.
    pub fn can_go_up(&self, edge: EdgeId, strict: bool) -> bool {
        let from_r = self.r(self.from(edge));
        let to_r = self.r(self.to(edge));
        if to_r > from_r {
            return true;
        }
        if to_r < from_r || strict {
            return false;
        }
        self.dist_to_go_up(edge).is_some()
    }

    /// Whether `edge` points away from the outline. Flat edges point towards
    /// the closer rise, ties broken by position.
    pub fn is_upward(&self, edge: EdgeId) -> bool {
        let from_r = self.r(self.from(edge));
        let to_r = self.r(self.to(edge));
        if to_r > from_r {
            return true;
        }
        if to_r < from_r {
            return false;
        }
        let dist_up = self.dist_to_go_up(edge);
        let dist_down = self.twin(edge).and_then(|twin| self.dist_to_go_up(twin));
        match (dist_up, dist_down) {
            (Some(up), Some(down)) if up != down => up < down,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            _ => self.to_p(edge) < self.from_p(edge),
        }
    }

    /// Whether no edge around `node` rises.
    pub fn is_local_maximum(&self, node: NodeId, strict: bool) -> bool {
        if self.r(node) == 0 {
            return false;
        }
        let Some(outgoing) = self.outgoing(node) else {
            return false;
        };
        !outgoing.iter().any(|&e| self.can_go_up(e, strict))
    }

    /// Whether any edge around `node` is central.
    pub fn is_node_central(&self, node: NodeId) -> bool {
        self.outgoing_partial(node).iter().any(|&e| self.is_central(e))
    }

    /// Whether more than two central edges meet at `node`.
    pub fn is_multi_intersection(&self, node: NodeId) -> bool {
        let Some(outgoing) = self.outgoing(node) else {
            return false;
        };
        outgoing.iter().filter(|&&e| self.is_central(e)).count() > 2
    }

    /// First edge of the next trapezoid along the outline.
    pub fn next_unconnected(&self, edge: EdgeId) -> Option<EdgeId> {
        let mut result = edge;
        while let Some(next) = self.next(result) {
            result = next;
            if result == edge {
                return None;
            }
        }
        self.twin(result)
    }

    /// The outline segment a trapezoid chain stands on.
    pub fn source_line(&self, edge: EdgeId) -> Line {
        let mut first = edge;
        let mut guard = 0;
        while let Some(prev) = self.prev(first) {
            first = prev;
            guard += 1;
            if first == edge || guard > self.edges.len() {
                break;
            }
        }
        let mut last = edge;
        guard = 0;
        while let Some(next) = self.next(last) {
            last = next;
            guard += 1;
            if last == edge || guard > self.edges.len() {
                break;
            }
        }
        Line::new(self.from_p(first), self.to_p(last))
    }

    /// Link `a.next = b` and `b.prev = a`.
    pub fn link(&mut self, a: EdgeId, b: EdgeId) {
        self.edges[a.0].next = Some(b);
        self.edges[b.0].prev = Some(a);
    }

    pub fn make_twins(&mut self, a: EdgeId, b: EdgeId) {
        self.edges[a.0].twin = Some(b);
        self.edges[b.0].twin = Some(a);
    }

    /// Add a rib from the end of `prev_edge` to the closest point of the
    /// outline segment `start`-`end`. Returns the rib edge pointing back to
    /// the skeleton, which the chain continues from.
    pub fn make_rib(&mut self, prev_edge: EdgeId, start_source: Point, end_source: Point) -> EdgeId {
        let skeleton = self.to(prev_edge);
        let p = self.node(skeleton).p;
        let projected = if start_source == end_source {
            start_source
        } else {
            project_on_infinite_line(p, start_source, end_source)
        };
        self.node_mut(skeleton).data.distance_to_boundary = (p - projected).length_coord();

        let boundary = self.add_node(projected, 0);
        let forth = self.add_edge(skeleton, boundary, EdgeData::new(EdgeKind::ExtraVd));
        let back = self.add_edge(boundary, skeleton, EdgeData::new(EdgeKind::ExtraVd));
        self.make_twins(forth, back);
        self.link(prev_edge, forth);
        self.node_mut(boundary).incident_edge = Some(back);
        back
    }

    /// Split `edge` at `mid` with a rib down to the outline on one side.
    ///
    /// Returns the two halves: the original edge now ending at `mid`, and a
    /// new edge from `mid` to the original end.
    pub fn insert_rib(&mut self, edge: EdgeId, mid: NodeId) -> (EdgeId, EdgeId) {
        let source = self.source_line(edge);
        let mid_p = self.node(mid).p;
        let (px, dist2) = source.closest_point(&mid_p);
        {
            let data = &mut self.node_mut(mid).data;
            data.distance_to_boundary = (dist2 as f64).sqrt().round() as Coord;
            data.transition_ratio = 0.0;
        }

        let boundary = self.add_node(px, 0);
        let to = self.to(edge);
        let mut second_data = self.edge(edge).data.clone();
        second_data.set_central(true);
        let second = self.add_edge(mid, to, second_data);
        let outward = self.add_edge(mid, boundary, EdgeData::new(EdgeKind::TransitionEnd));
        let inward = self.add_edge(boundary, mid, EdgeData::new(EdgeKind::TransitionEnd));
        for rib in [outward, inward] {
            self.edge_mut(rib).data.set_central(false);
        }

        let edge_after = self.next(edge);
        self.edge_mut(edge).to = mid;
        self.link(edge, outward);
        self.edge_mut(inward).prev = None;
        self.link(inward, second);
        self.edge_mut(second).next = edge_after;
        if let Some(after) = edge_after {
            self.edge_mut(after).prev = Some(second);
        }

        self.make_twins(outward, inward);
        self.node_mut(boundary).incident_edge = Some(inward);
        self.node_mut(mid).incident_edge = Some(outward);
        if self.node(to).incident_edge == Some(edge) {
            self.node_mut(to).incident_edge = self.twin(edge);
        }
        (edge, second)
    }

    /// Insert a node at `mid` on `edge` and its twin, with ribs to both
    /// sides. Returns the new edge replacing the part of `edge` after `mid`.
    pub fn insert_node(&mut self, edge: EdgeId, mid: Point, bead_count: i64) -> Option<EdgeId> {
        let Some(twin) = self.twin(edge) else {
            warn!("Inserting a node on an edge without twin");
            return None;
        };
        let mid_node = self.add_node(mid, -1);
        let (first, last) = self.insert_rib(edge, mid_node);
        let (first_twin, last_twin) = self.insert_rib(twin, mid_node);
        self.make_twins(first, last_twin);
        self.make_twins(last, first_twin);
        self.node_mut(mid_node).data.bead_count = bead_count;
        Some(last)
    }

    /// Remove edges shorter than `snap_dist` from the middle of trapezoids and
    /// collapse trapezoids whose two sides meet.
    pub fn collapse_small_edges(&mut self, snap_dist: Coord) {
        for quad_start in self.edge_ids() {
            if !self.is_edge_alive(quad_start) || self.prev(quad_start).is_some() {
                continue;
            }
            let Some(mut quad_end) = self.next(quad_start) else {
                continue;
            };
            let mut guard = 0;
            while let Some(next) = self.next(quad_end) {
                quad_end = next;
                guard += 1;
                if guard > self.edges.len() {
                    break;
                }
            }
            let quad_mid = self.next(quad_start).filter(|&mid| mid != quad_end);

            if let Some(mid) = quad_mid {
                if (self.to_p(mid) - self.from_p(mid)).shorter_than(snap_dist) {
                    self.collapse_edge(mid);
                }
            }

            self.collapse_quad_sides(quad_start, quad_end, snap_dist);
        }

        for edge in self.edge_ids() {
            if self.prev(edge).is_none() {
                let from = self.from(edge);
                self.node_mut(from).incident_edge = Some(edge);
            }
        }
    }

    /// Merge the end node of `mid` into its start node and unlink `mid`.
    fn collapse_edge(&mut self, mid: EdgeId) {
        let Some(mid_twin) = self.twin(mid) else {
            return;
        };
        let keep = self.from(mid);
        let gone = self.to(mid);

        // Re-attach everything around the removed node
        for e in self.outgoing_after(mid) {
            self.edge_mut(e).from = keep;
            if let Some(t) = self.twin(e) {
                self.edge_mut(t).to = keep;
            }
        }

        if self.node(keep).incident_edge == Some(mid) {
            let replacement = self.next(mid_twin).or_else(|| self.prev(mid).and_then(|p| self.twin(p)));
            self.node_mut(keep).incident_edge = replacement;
        }
        self.remove_node(gone);

        for e in [mid, mid_twin] {
            let prev = self.prev(e);
            let next = self.next(e);
            if let Some(p) = prev {
                self.edge_mut(p).next = next;
            }
            if let Some(n) = next {
                self.edge_mut(n).prev = prev;
            }
            self.remove_edge(e);
        }
    }

    /// Collapse a trapezoid of two edges whose far ends coincide.
    fn collapse_quad_sides(&mut self, quad_start: EdgeId, quad_end: EdgeId, snap_dist: Coord) {
        if self.next(quad_start) != Some(quad_end) {
            return;
        }
        let close = |a: Point, b: Point| (a - b).shorter_than(snap_dist);
        if !(close(self.from_p(quad_start), self.to_p(quad_end))
            && close(self.to_p(quad_start), self.from_p(quad_end)))
        {
            return;
        }
        let (Some(start_twin), Some(end_twin)) = (self.twin(quad_start), self.twin(quad_end)) else {
            return;
        };
        if start_twin == quad_end {
            return;
        }

        let end_to = self.to(quad_end);
        self.edge_mut(start_twin).to = end_to;
        self.node_mut(end_to).incident_edge = Some(end_twin);

        let end_from = self.from(quad_end);
        if self.node(end_from).incident_edge == Some(quad_end) {
            let replacement = self.next(end_twin).or(Some(start_twin));
            self.node_mut(end_from).incident_edge = replacement;
        }
        let start_from = self.from(quad_start);
        if start_from != end_to {
            self.remove_node(start_from);
        }
        if let Some(n) = self.next(start_twin) {
            // An edge of the start side's neighbour leaves the removed node
            if self.from(n) == start_from {
                self.edge_mut(n).from = end_to;
            }
        }

        self.make_twins(start_twin, end_twin);
        self.remove_edge(quad_start);
        self.remove_edge(quad_end);
    }

    /// Drop edges that never found their twin, unlinking them from their
    /// chains.
    pub fn remove_untwinned_edges(&mut self) -> usize {
        let mut removed = 0;
        for edge in self.edge_ids() {
            if self.twin(edge).is_some() {
                continue;
            }
            if let Some(prev) = self.prev(edge) {
                self.edge_mut(prev).next = None;
            }
            if let Some(next) = self.next(edge) {
                self.edge_mut(next).prev = None;
            }
            let from = self.from(edge);
            if self.node(from).incident_edge == Some(edge) {
                self.node_mut(from).incident_edge = None;
            }
            self.remove_edge(edge);
            removed += 1;
        }
        if removed > 0 {
            warn!("Removed {removed} skeleton edges without twin");
        }
        removed
    }
}

/// Orthogonal projection of `p` onto the infinite line through `a` and `b`.
pub fn project_on_infinite_line(p: Point, a: Point, b: Point) -> Point {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 == 0 {
        return a;
    }
    let t = (p - a).dot(&ab) as f64 / len2 as f64;
    Point::new(
        (a.x as f64 + t * ab.x as f64).round() as Coord,
        (a.y as f64 + t * ab.y as f64).round() as Coord,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two trapezoids sharing one central edge `a`-`b`, with ribs down to a
    /// horizontal outline below and above.
    ///
    /// ```text
    ///  d -------- c      (y = 2, R = 0)
    ///  |          |
    ///  a -------- b      (y = 1)
    ///  |          |
    ///  e -------- f      (y = 0, R = 0)
    /// ```
    fn two_quads() -> (SkeletalGraph, EdgeId, EdgeId) {
        let mut g = SkeletalGraph::new();
        let a = g.add_node(Point::new(0, 1000), 1000);
        let b = g.add_node(Point::new(4000, 1000), 1000);
        let c = g.add_node(Point::new(4000, 2000), 0);
        let d = g.add_node(Point::new(0, 2000), 0);
        let e = g.add_node(Point::new(0, 0), 0);
        let f = g.add_node(Point::new(4000, 0), 0);

        // Lower trapezoid: f -> b -> a -> e, standing on e-f
        let fb = g.add_edge(f, b, EdgeData::new(EdgeKind::ExtraVd));
        let ba = g.add_edge(b, a, EdgeData::new(EdgeKind::Normal));
        let ae = g.add_edge(a, e, EdgeData::new(EdgeKind::ExtraVd));
        g.link(fb, ba);
        g.link(ba, ae);
        // Upper trapezoid: d -> a -> b -> c, standing on c-d
        let da = g.add_edge(d, a, EdgeData::new(EdgeKind::ExtraVd));
        let ab = g.add_edge(a, b, EdgeData::new(EdgeKind::Normal));
        let bc = g.add_edge(b, c, EdgeData::new(EdgeKind::ExtraVd));
        g.link(da, ab);
        g.link(ab, bc);
        g.make_twins(ab, ba);
        // Outer ribs
        let ad = g.add_edge(a, d, EdgeData::new(EdgeKind::ExtraVd));
        let cb = g.add_edge(c, b, EdgeData::new(EdgeKind::ExtraVd));
        let ea = g.add_edge(e, a, EdgeData::new(EdgeKind::ExtraVd));
        let bf = g.add_edge(b, f, EdgeData::new(EdgeKind::ExtraVd));
        g.make_twins(da, ad);
        g.make_twins(bc, cb);
        g.make_twins(ae, ea);
        g.make_twins(fb, bf);
        // Side trapezoids closing the fans around a and b
        g.link(ea, ad);
        g.link(cb, bf);

        g.node_mut(a).incident_edge = Some(ab);
        g.node_mut(b).incident_edge = Some(ba);
        g.node_mut(c).incident_edge = Some(cb);
        g.node_mut(d).incident_edge = Some(da);
        g.node_mut(e).incident_edge = Some(ea);
        g.node_mut(f).incident_edge = Some(fb);
        (g, ab, ba)
    }

    #[test]
    fn test_projection() {
        let p = project_on_infinite_line(Point::new(5, 7), Point::new(0, 0), Point::new(10, 0));
        assert_eq!(p, Point::new(5, 0));
        let p = project_on_infinite_line(Point::new(20, 3), Point::new(0, 0), Point::new(10, 0));
        assert_eq!(p, Point::new(20, 0));
    }

    #[test]
    fn test_make_rib() {
        let mut g = SkeletalGraph::new();
        let a = g.add_node(Point::new(0, 0), 0);
        let b = g.add_node(Point::new(100, 300), -1);
        let edge = g.add_edge(a, b, EdgeData::new(EdgeKind::Normal));
        let back = g.make_rib(edge, Point::new(-1000, 0), Point::new(1000, 0));

        assert_eq!(g.r(b), 300);
        let forth = g.next(edge).unwrap();
        assert_eq!(g.twin(forth), Some(back));
        assert_eq!(g.to_p(forth), Point::new(100, 0));
        assert_eq!(g.edge(back).data.kind, EdgeKind::ExtraVd);
        assert_eq!(g.r(g.from(back)), 0);
    }

    #[test]
    fn test_traversal_helpers() {
        let (g, ab, ba) = two_quads();
        let a = g.from(ab);
        // Around `a`: a->b, a->e (lower chain), a->d (rib of the upper chain)
        let around = g.outgoing(a).unwrap();
        assert_eq!(around.len(), 3);
        assert!(around.contains(&ab));
        assert_eq!(g.next_unconnected(ab).map(|e| g.from_p(e)), Some(Point::new(4000, 2000)));
        assert_eq!(g.source_line(ba), Line::new(Point::new(4000, 0), Point::new(0, 0)));
        assert_eq!(g.outgoing_after(ab).len(), 2);
    }

    #[test]
    fn test_upward_and_local_maximum() {
        let (mut g, ab, ba) = two_quads();
        // Flat edge: the tie is broken by position
        assert!(!g.is_upward(ab));
        assert!(g.is_upward(ba));
        assert!(!g.can_go_up(ab, true));

        let b = g.to(ab);
        g.node_mut(b).data.distance_to_boundary = 1500;
        assert!(g.is_upward(ab));
        assert!(g.can_go_up(ab, true));
        assert!(g.is_local_maximum(b, false));
        assert!(!g.is_local_maximum(g.from(ab), false));
        assert_eq!(g.dist_to_go_up(ab), Some(0));
        assert_eq!(g.dist_to_go_up(ba), None);
    }

    #[test]
    fn test_insert_node() {
        let (mut g, ab, ba) = two_quads();
        let edges_before = g.edge_count();
        let last = g.insert_node(ab, Point::new(1000, 1000), 2).unwrap();

        assert_eq!(g.edge_count(), edges_before + 6);
        let mid = g.to(ab);
        assert_eq!(g.node(mid).p, Point::new(1000, 1000));
        assert_eq!(g.bead_count(mid), 2);
        assert_eq!(g.r(mid), 1000);
        assert_eq!(g.from(last), mid);
        assert_eq!(g.to_p(last), Point::new(4000, 1000));
        // Cross twins
        assert_eq!(g.to(ba), mid);
        assert_eq!(g.twin(last).map(|t| g.from(t)), Some(g.to(last)));
        assert_eq!(g.twin(ab).map(|t| g.to(t)), Some(g.from(ab)));
        // Ribs on both sides of the new node
        let ribs: Vec<_> = g
            .outgoing(mid)
            .unwrap()
            .into_iter()
            .filter(|&e| g.edge(e).data.kind == EdgeKind::TransitionEnd)
            .collect();
        assert_eq!(ribs.len(), 2);
        assert!(ribs.iter().all(|&e| g.r(g.to(e)) == 0));
    }

    #[test]
    fn test_collapse_small_middle_edge() {
        let mut g = SkeletalGraph::new();
        // Chain s -> m0 -> m1 -> t with a 3 unit middle edge and its twin chain
        let s = g.add_node(Point::new(0, 0), 0);
        let m0 = g.add_node(Point::new(1000, 1000), 1000);
        let m1 = g.add_node(Point::new(1003, 1000), 1000);
        let t = g.add_node(Point::new(2000, 0), 0);
        let e0 = g.add_edge(s, m0, EdgeData::new(EdgeKind::ExtraVd));
        let e1 = g.add_edge(m0, m1, EdgeData::new(EdgeKind::Normal));
        let e2 = g.add_edge(m1, t, EdgeData::new(EdgeKind::ExtraVd));
        g.link(e0, e1);
        g.link(e1, e2);
        let r0 = g.add_edge(m0, s, EdgeData::new(EdgeKind::ExtraVd));
        let r1 = g.add_edge(m1, m0, EdgeData::new(EdgeKind::Normal));
        let r2 = g.add_edge(t, m1, EdgeData::new(EdgeKind::ExtraVd));
        g.link(r1, r0);
        g.link(r2, r1);
        g.make_twins(e0, r0);
        g.make_twins(e1, r1);
        g.make_twins(e2, r2);
        for (n, e) in [(s, e0), (m0, e1), (m1, e2), (t, r2)] {
            g.node_mut(n).incident_edge = Some(e);
        }

        g.collapse_small_edges(5);
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.next(e0), Some(e2));
        assert_eq!(g.from(e2), m0);
        assert_eq!(g.to(r2), m0);
        assert_eq!(g.next(r2), Some(r0));
    }
}
