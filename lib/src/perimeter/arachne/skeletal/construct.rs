//! Skeleton construction from the Voronoi diagram.
//!
//! Every cell of the diagram becomes a chain of half-edges from one end of
//! its source to the other. Ribs connect each interior vertex of the chain to
//! the closest point of the source, splitting the cell into trapezoids.
//! Curved edges are discretized, and straight edges between two point sites
//! get extra vertices where the transitioning angle is reached.

use super::graph::{EdgeData, EdgeId, EdgeKind, NodeId, SkeletalGraph};
use crate::geometry::{Line, Point};
use crate::perimeter::arachne::voronoi::{Site, VoronoiDiagram};
use crate::{Coord, CoordF};
use log::{debug, warn};
use std::collections::HashMap;
use std::f64::consts::PI;

/// Edges shorter than this are collapsed after construction.
const SNAP_DIST: Coord = 5;

/// Builds the skeleton of one diagram.
struct Constructor<'a> {
    diagram: &'a VoronoiDiagram,
    graph: SkeletalGraph,
    discretization_step_size: Coord,
    transitioning_angle: CoordF,
    vd_node_to_he_node: HashMap<usize, NodeId>,
    vd_edge_to_he_edge: HashMap<usize, EdgeId>,
}

/// Build the skeletal graph of `diagram`.
pub fn construct_graph(
    diagram: &VoronoiDiagram,
    discretization_step_size: Coord,
    transitioning_angle: CoordF,
) -> SkeletalGraph {
    let mut constructor = Constructor {
        diagram,
        graph: SkeletalGraph::new(),
        discretization_step_size: discretization_step_size.max(1),
        transitioning_angle,
        vd_node_to_he_node: HashMap::new(),
        vd_edge_to_he_edge: HashMap::new(),
    };

    for cell in 0..diagram.cells().len() {
        constructor.transfer_cell(cell);
    }

    let mut graph = constructor.graph;
    graph.remove_untwinned_edges();
    separate_pointy_quad_end_nodes(&mut graph);
    graph.collapse_small_edges(SNAP_DIST);
    debug!(
        "Skeletal graph: {} nodes, {} half-edges",
        graph.node_count(),
        graph.edge_count()
    );
    graph
}

impl Constructor<'_> {
    fn transfer_cell(&mut self, cell: usize) {
        let Some((begin, end)) = self.diagram.cell_range(cell) else {
            return;
        };
        if begin == end {
            warn!("Voronoi cell {cell} has a single edge, skipping");
            return;
        }
        let (start_source, end_source) = match self.diagram.cells()[cell].source {
            Site::Point(_) => match self.diagram.source_point(cell) {
                Some(p) => (p, p),
                None => return,
            },
            Site::Segment(_) => match self.diagram.source_segment(cell) {
                Some(segment) => (segment.b, segment.a),
                None => return,
            },
        };

        let mut prev_edge: Option<EdgeId> = None;
        self.transfer_edge(begin, &mut prev_edge, start_source, end_source);
        let Some(first) = prev_edge else {
            warn!("First edge of cell {cell} could not be transferred");
            return;
        };
        // The chain starts on the outline
        let first_node = self.chain_start(first);
        self.graph.node_mut(first_node).data.distance_to_boundary = 0;

        let mut vd_edge = self.diagram.edge(begin).next;
        while let Some(e) = vd_edge {
            if let Some(prev) = prev_edge {
                prev_edge = Some(self.graph.make_rib(prev, start_source, end_source));
            }
            self.transfer_edge(e, &mut prev_edge, start_source, end_source);
            if e == end {
                break;
            }
            vd_edge = self.diagram.edge(e).next;
        }

        if let Some(last) = prev_edge {
            let last_node = self.graph.to(last);
            self.graph.node_mut(last_node).data.distance_to_boundary = 0;
        }
    }

    fn chain_start(&self, edge: EdgeId) -> NodeId {
        let mut first = edge;
        while let Some(prev) = self.graph.prev(first) {
            if prev == edge {
                break;
            }
            first = prev;
        }
        self.graph.from(first)
    }

    fn make_node(&mut self, vd_vertex: usize) -> NodeId {
        if let Some(&node) = self.vd_node_to_he_node.get(&vd_vertex) {
            return node;
        }
        let p = self.diagram.vertex(vd_vertex).to_point();
        let node = self.graph.add_node(p, -1);
        self.vd_node_to_he_node.insert(vd_vertex, node);
        node
    }

    /// Append the skeleton edges of one diagram edge to the chain.
    fn transfer_edge(
        &mut self,
        vd_edge: usize,
        prev_edge: &mut Option<EdgeId>,
        start_source: Point,
        end_source: Point,
    ) {
        let edge = *self.diagram.edge(vd_edge);
        if let Some(&source_twin) = self.vd_edge_to_he_edge.get(&edge.twin) {
            // The twin is already discretized: walk its edges backwards
            let Some(&end_node) = self.vd_node_to_he_node.get(&edge.vertex1) else {
                warn!("Voronoi edge {vd_edge} ends at an unknown vertex");
                return;
            };
            let mut twin = source_twin;
            loop {
                let from = self.graph.to(twin);
                let to = self.graph.from(twin);
                let new_edge = self.graph.add_edge(from, to, EdgeData::new(EdgeKind::Normal));
                self.graph.make_twins(new_edge, twin);
                self.graph.node_mut(from).incident_edge = Some(new_edge);
                if let Some(prev) = *prev_edge {
                    self.graph.link(prev, new_edge);
                }
                *prev_edge = Some(new_edge);

                if to == end_node {
                    return;
                }

                let Some(step) = self
                    .graph
                    .prev(twin)
                    .and_then(|p| self.graph.twin(p))
                    .and_then(|t| self.graph.prev(t))
                else {
                    warn!("Discretized segment of Voronoi edge {vd_edge} behaves oddly");
                    return;
                };
                *prev_edge = Some(self.graph.make_rib(new_edge, start_source, end_source));
                twin = step;
            }
        }

        let discretized = self.discretize(vd_edge);
        if discretized.len() < 2 {
            warn!("Discretized Voronoi edge {vd_edge} is degenerate");
            return;
        }

        let mut v0 = match *prev_edge {
            Some(prev) => self.graph.to(prev),
            None => self.make_node(edge.vertex0),
        };
        let last_idx = discretized.len() - 1;
        for (idx, &p1) in discretized.iter().enumerate().skip(1) {
            let v1 = if idx == last_idx {
                self.make_node(edge.vertex1)
            } else {
                self.graph.add_node(p1, -1)
            };
            let new_edge = self.graph.add_edge(v0, v1, EdgeData::new(EdgeKind::Normal));
            self.graph.node_mut(v0).incident_edge = Some(new_edge);
            if let Some(prev) = *prev_edge {
                self.graph.link(prev, new_edge);
            }
            *prev_edge = Some(new_edge);
            if idx < last_idx {
                *prev_edge = Some(self.graph.make_rib(new_edge, start_source, end_source));
            }
            v0 = v1;
        }
        if let Some(last) = *prev_edge {
            self.vd_edge_to_he_edge.insert(vd_edge, last);
        }
    }

    /// Points along a diagram edge, including both ends.
    fn discretize(&self, vd_edge: usize) -> Vec<Point> {
        let edge = self.diagram.edge(vd_edge);
        let left_cell = edge.cell;
        let right_cell = self.diagram.edge(edge.twin).cell;
        let start = self.diagram.vertex(edge.vertex0).to_point();
        let end = self.diagram.vertex(edge.vertex1).to_point();

        let left_point = self.diagram.source_point(left_cell);
        let right_point = self.diagram.source_point(right_cell);

        if edge.is_secondary {
            return vec![start, end];
        }
        match (left_point, right_point) {
            (None, None) => vec![start, end],
            (Some(p), None) => match self.diagram.source_segment(right_cell) {
                Some(segment) => discretize_parabola(
                    p,
                    &segment,
                    start,
                    end,
                    self.discretization_step_size,
                    self.transitioning_angle,
                ),
                None => vec![start, end],
            },
            (None, Some(p)) => match self.diagram.source_segment(left_cell) {
                Some(segment) => discretize_parabola(
                    p,
                    &segment,
                    start,
                    end,
                    self.discretization_step_size,
                    self.transitioning_angle,
                ),
                None => vec![start, end],
            },
            (Some(left), Some(right)) => discretize_straight(
                left,
                right,
                start,
                end,
                self.discretization_step_size,
                self.transitioning_angle,
            ),
        }
    }
}

/// Points along the bisector of two point sites, with extra vertices where
/// the distance to the sites grows steeper than the transitioning angle.
pub fn discretize_straight(
    left_point: Point,
    right_point: Point,
    start: Point,
    end: Point,
    step: Coord,
    transitioning_angle: CoordF,
) -> Vec<Point> {
    let x_axis = right_point - left_point;
    let x_axis_dir = Point::new(-x_axis.y, x_axis.x);
    let x_axis_length = x_axis_dir.length();
    if x_axis_length == 0.0 {
        return vec![start, end];
    }
    let middle = (right_point + left_point) / 2;

    let projected_x = |from: Point| -> f64 { (from - middle).dot(&x_axis_dir) as f64 / x_axis_length };

    let d = x_axis_length;
    let bound = 0.5 / ((PI - transitioning_angle) * 0.5).tan();
    let mut marking_start_x = -d * bound;
    let mut marking_end_x = d * bound;
    let mut marking_start = middle + x_axis_dir * (marking_start_x / x_axis_length);
    let mut marking_end = middle + x_axis_dir * (marking_end_x / x_axis_length);

    let mut direction = 1.0;
    let start_x = projected_x(start);
    let end_x = projected_x(end);
    if start_x > end_x {
        direction = -1.0;
        std::mem::swap(&mut marking_start, &mut marking_end);
        std::mem::swap(&mut marking_start_x, &mut marking_end_x);
    }

    let mut ret = vec![start];
    let mut add_marking_start = marking_start_x * direction > start_x * direction;
    let mut add_marking_end = marking_end_x * direction > start_x * direction;

    let ab = end - start;
    let ab_size = ab.length_coord();
    let mut step_count = (ab_size + step / 2) / step;
    if step_count % 2 == 1 {
        // Even count, so the middle is a vertex
        step_count += 1;
    }
    for step_idx in 1..step_count {
        let here = start + ab * (step_idx as f64 / step_count as f64);
        let x_here = projected_x(here);
        if add_marking_start && marking_start_x * direction < x_here * direction {
            ret.push(marking_start);
            add_marking_start = false;
        }
        if add_marking_end && marking_end_x * direction < x_here * direction {
            ret.push(marking_end);
            add_marking_end = false;
        }
        ret.push(here);
    }
    if add_marking_end && marking_end_x * direction < end_x * direction {
        ret.push(marking_end);
    }
    ret.push(end);
    ret
}

/// Points along the parabola of point `p` and `segment`, between `start`
/// and `end`. The apex and the points where the parabola reaches the
/// transitioning angle are always included.
pub fn discretize_parabola(
    p: Point,
    segment: &Line,
    start: Point,
    end: Point,
    approximate_step_size: Coord,
    transitioning_angle: CoordF,
) -> Vec<Point> {
    let a = segment.a;
    let b = segment.b;
    let ab = b - a;
    let ab_len = ab.length();
    if ab_len == 0.0 {
        return vec![start, end];
    }
    let ab_dir = ab.to_pointf() * (1.0 / ab_len);
    let along = |q: Point| -> f64 { (q - a).to_pointf().dot(&ab_dir) };

    let px = along(p);
    let pxx = a.to_pointf() + ab_dir * px;
    let ppxx = pxx - p.to_pointf();
    let d = ppxx.length();
    if d == 0.0 {
        return vec![start, end];
    }
    // Unit vector from the segment towards the point
    let y_dir = ppxx * (-1.0 / d);
    let to_point = |x: f64, y: f64| -> Point { (pxx + ab_dir * x + y_dir * y).round() };

    let marking_bound = (transitioning_angle * 0.5).atan();
    let mut msx = -marking_bound * d;
    let mut mex = marking_bound * d;
    let marking_y = msx * msx / (2.0 * d) + d / 2.0;
    let mut marking_start = to_point(msx, marking_y);
    let mut marking_end = to_point(mex, marking_y);
    let apex = to_point(0.0, d / 2.0);

    let sx = along(start);
    let ex = along(end);
    let mut dir = 1.0;
    if sx > ex {
        dir = -1.0;
        std::mem::swap(&mut marking_start, &mut marking_end);
        std::mem::swap(&mut msx, &mut mex);
    }

    let mut add_marking_start = msx * dir > (sx - px) * dir && msx * dir < (ex - px) * dir;
    let mut add_marking_end = mex * dir > (sx - px) * dir && mex * dir < (ex - px) * dir;
    let mut add_apex = (sx - px) * dir < 0.0 && (ex - px) * dir > 0.0;

    let mut ret = vec![start];
    let step_count = ((ex - sx).abs() / approximate_step_size as f64).round() as i64;
    for step in 1..step_count {
        let x = sx + (ex - sx) * step as f64 / step_count as f64 - px;
        let y = x * x / (2.0 * d) + d / 2.0;

        if add_marking_start && msx * dir < x * dir {
            ret.push(marking_start);
            add_marking_start = false;
        }
        if add_apex && x * dir > 0.0 {
            ret.push(apex);
            add_apex = false;
        }
        if add_marking_end && mex * dir < x * dir {
            ret.push(marking_end);
            add_marking_end = false;
        }
        ret.push(to_point(x, y));
    }
    if add_apex {
        ret.push(apex);
    }
    if add_marking_end {
        ret.push(marking_end);
    }
    ret.push(end);
    ret
}

/// Give every trapezoid that starts at an already used outline node a node
/// of its own, so sharp outline corners do not join unrelated chains.
pub fn separate_pointy_quad_end_nodes(graph: &mut SkeletalGraph) {
    let mut visited: std::collections::HashSet<NodeId> = std::collections::HashSet::new();
    for edge in graph.edge_ids() {
        if graph.prev(edge).is_some() {
            continue;
        }
        let quad_start = edge;
        let from = graph.from(quad_start);
        if visited.insert(from) {
            continue;
        }
        let p = graph.node(from).p;
        let data = graph.node(from).data.clone();
        let new_node = graph.add_node(p, data.distance_to_boundary);
        graph.node_mut(new_node).data = data;
        graph.node_mut(new_node).incident_edge = Some(quad_start);
        graph.edge_mut(quad_start).from = new_node;
        if let Some(twin) = graph.twin(quad_start) {
            graph.edge_mut(twin).to = new_node;
        }
        visited.insert(new_node);
    }
}
