//! Voronoi diagram of polygon boundaries.
//!
//! Sites are the outline's segments plus its vertices. Only the part of the
//! diagram inside the outline is built, which is all the skeletal graph needs.
//!
//! Construction runs in three steps:
//! 1. the boundary is sampled and triangulated ([`builder`]), giving the
//!    diagram's topology,
//! 2. every diagram vertex is placed exactly from its three sites ([`solver`]),
//! 3. the result is checked for known degeneracies. When one is found the
//!    input is rotated, rebuilt and the vertices are rotated back.

mod builder;
mod solver;

use super::config::VoronoiConfig;
use crate::geometry::{Line, Point, PointF, Polygon};
use crate::{scale, CoordF};
use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

/// A generating site of the diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Site {
    /// Outline vertex, by global point index.
    Point(usize),
    /// Outline segment from point `k` to the point following it.
    Segment(usize),
}

/// The outline flattened into one indexed point list.
///
/// Each polygon occupies a contiguous index range; `segment k` runs from point
/// `k` to `next(k)`. The interior is on the left of every segment, so outer
/// contours must be counter-clockwise and holes clockwise.
#[derive(Debug, Clone)]
pub struct VoronoiSources {
    points: Vec<Point>,
    next: Vec<usize>,
    prev: Vec<usize>,
    contours: Vec<Range<usize>>,
}

impl VoronoiSources {
    pub fn from_polygons(polygons: &[Polygon]) -> Self {
        let mut points = Vec::new();
        let mut next = Vec::new();
        let mut prev = Vec::new();
        let mut contours = Vec::new();

        for polygon in polygons.iter().filter(|p| p.len() >= 3) {
            let start = points.len();
            let len = polygon.len();
            for (i, p) in polygon.iter().enumerate() {
                points.push(*p);
                next.push(start + (i + 1) % len);
                prev.push(start + (i + len - 1) % len);
            }
            contours.push(start..start + len);
        }

        Self {
            points,
            next,
            prev,
            contours,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn point(&self, i: usize) -> Point {
        self.points[i]
    }

    #[inline]
    pub fn next_index(&self, i: usize) -> usize {
        self.next[i]
    }

    #[inline]
    pub fn prev_index(&self, i: usize) -> usize {
        self.prev[i]
    }

    pub fn contours(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.contours.iter().cloned()
    }

    /// Point indices of segment `k` as `(from, to)`.
    #[inline]
    pub fn segment_indices(&self, k: usize) -> (usize, usize) {
        (k, self.next[k])
    }

    #[inline]
    pub fn segment(&self, k: usize) -> Line {
        Line::new(self.points[k], self.points[self.next[k]])
    }

    #[inline]
    pub fn segment_touches_point(&self, k: usize, i: usize) -> bool {
        k == i || self.next[k] == i
    }

    /// Interior angle above 180 degrees.
    pub fn is_reflex(&self, i: usize) -> bool {
        let a = self.points[self.prev[i]];
        let b = self.points[i];
        let c = self.points[self.next[i]];
        (b - a).cross(&(c - b)) < 0
    }

    /// Outline vertex shared by two sites, if any.
    pub fn common_point(&self, a: Site, b: Site) -> Option<usize> {
        let ends = |site: Site| -> [Option<usize>; 2] {
            match site {
                Site::Point(i) => [Some(i), None],
                Site::Segment(k) => [Some(k), Some(self.next[k])],
            }
        };
        let (ea, eb) = (ends(a), ends(b));
        ea.into_iter()
            .flatten()
            .find(|i| eb.contains(&Some(*i)))
    }

    /// Cell index of a site: point cells first, then segment cells.
    #[inline]
    pub fn cell_index(&self, site: Site) -> usize {
        match site {
            Site::Point(i) => i,
            Site::Segment(k) => self.points.len() + k,
        }
    }

    fn rotated(&self, angle: CoordF) -> Self {
        let (sin_a, cos_a) = angle.sin_cos();
        Self {
            points: self
                .points
                .iter()
                .map(|p| p.rotate_by_cos_sin(cos_a, sin_a))
                .collect(),
            next: self.next.clone(),
            prev: self.prev.clone(),
            contours: self.contours.clone(),
        }
    }
}

/// A diagram vertex in scaled floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoronoiVertex {
    pub x: f64,
    pub y: f64,
    /// Set when the vertex is an outline vertex.
    pub boundary_point: Option<usize>,
}

impl VoronoiVertex {
    #[inline]
    pub fn to_pointf(&self) -> PointF {
        PointF::new(self.x, self.y)
    }

    #[inline]
    pub fn to_point(&self) -> Point {
        self.to_pointf().round()
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A half-edge of the diagram. The cell lies on its left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoronoiEdge {
    pub vertex0: usize,
    pub vertex1: usize,
    pub twin: usize,
    pub next: Option<usize>,
    pub prev: Option<usize>,
    pub cell: usize,
    /// Parabolic arc between a point site and a segment site.
    pub is_curved: bool,
    /// Perpendicular through a segment endpoint, between the segment and
    /// that endpoint.
    pub is_secondary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoronoiCell {
    pub source: Site,
    /// First edge of the cell's chain, the one without a `prev`.
    pub incident_edge: Option<usize>,
}

/// Known degeneracies of a constructed diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoronoiIssue {
    MissingVoronoiVertex,
    NonPlanar,
    VoronoiEdgeIntersectingInputSegment,
    FiniteEdgeWithNonFiniteVertex,
}

impl fmt::Display for VoronoiIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            VoronoiIssue::MissingVoronoiVertex => "missing Voronoi vertex",
            VoronoiIssue::NonPlanar => "non-planar Voronoi diagram",
            VoronoiIssue::VoronoiEdgeIntersectingInputSegment => {
                "Voronoi edge intersecting input segment"
            }
            VoronoiIssue::FiniteEdgeWithNonFiniteVertex => "finite edge with non-finite vertex",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStatus {
    RepairNotNeeded,
    RepairSuccessful,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VoronoiError {
    #[error("no polygon with at least three points")]
    EmptyInput,

    #[error("diagram still has a {issue} after {attempts} rotations")]
    Unrepairable { attempts: usize, issue: VoronoiIssue },
}

/// Voronoi diagram restricted to the inside of an outline.
#[derive(Debug, Clone)]
pub struct VoronoiDiagram {
    vertices: Vec<VoronoiVertex>,
    edges: Vec<VoronoiEdge>,
    cells: Vec<VoronoiCell>,
    sources: VoronoiSources,
    status: RepairStatus,
    topology_issue: Option<VoronoiIssue>,
}

impl VoronoiDiagram {
    /// Build the diagram of `polygons`, repairing it by rotation if needed.
    pub fn build(polygons: &[Polygon], config: &VoronoiConfig) -> Result<Self, VoronoiError> {
        let sources = VoronoiSources::from_polygons(polygons);
        if sources.is_empty() {
            return Err(VoronoiError::EmptyInput);
        }
        Self::build_with(sources, config, Self::construct)
    }

    /// Construct with `construct`, then retry on rotated input with finer
    /// sampling until the diagram has no issue left.
    fn build_with<F>(sources: VoronoiSources, config: &VoronoiConfig, construct: F) -> Result<Self, VoronoiError>
    where
        F: Fn(VoronoiSources, f64) -> Result<Self, VoronoiIssue>,
    {
        let step = scale(config.sample_step).max(1) as f64;
        let tolerance = scale(config.snap_distance).max(1) as f64;
        let checked = |diagram: Self| match diagram.detect_issue(config.check_planarity, tolerance) {
            None => Ok(diagram),
            Some(issue) => Err(issue),
        };

        let issue = match construct(sources.clone(), step).and_then(checked) {
            Ok(mut diagram) => {
                diagram.status = RepairStatus::RepairNotNeeded;
                debug!(
                    "Voronoi diagram: {} vertices, {} half-edges, {} cells",
                    diagram.vertices.len(),
                    diagram.edges.len(),
                    diagram.cells.len()
                );
                return Ok(diagram);
            }
            Err(issue) => issue,
        };
        warn!("Detected {issue}, input polygons will be rotated back and forth.");

        let mut last_issue = issue;
        for (attempt, &angle) in config.repair_rotations.iter().enumerate() {
            // Finer sampling on every attempt as well
            let attempt_step = (step / f64::powi(2.0, attempt as i32 + 1)).max(1.0);
            let rotated = sources.rotated(angle);
            match construct(rotated, attempt_step).and_then(checked) {
                Ok(mut diagram) => {
                    diagram.rotate_back(angle, sources, tolerance);
                    diagram.status = RepairStatus::RepairSuccessful;
                    debug!(
                        "Voronoi diagram repaired by rotating {:.3} rad (attempt {})",
                        angle,
                        attempt + 1
                    );
                    return Ok(diagram);
                }
                Err(issue) => {
                    debug!("Rotation by {angle:.3} rad still has a {issue}");
                    last_issue = issue;
                }
            }
        }

        warn!("Voronoi diagram is not repairable: {last_issue}");
        Err(VoronoiError::Unrepairable {
            attempts: config.repair_rotations.len(),
            issue: last_issue,
        })
    }

    fn construct(sources: VoronoiSources, step: f64) -> Result<Self, VoronoiIssue> {
        let raw = builder::triangulate(&sources, step)?;
        Ok(Self::assemble(raw, sources, step))
    }

    fn assemble(raw: builder::RawDiagram, sources: VoronoiSources, step: f64) -> Self {
        let vertices: Vec<VoronoiVertex> = raw
            .vertices
            .iter()
            .map(|v| match *v {
                builder::RawVertex::Boundary(i) => {
                    let p = sources.point(i).to_pointf();
                    VoronoiVertex {
                        x: p.x,
                        y: p.y,
                        boundary_point: Some(i),
                    }
                }
                builder::RawVertex::Interior {
                    sites,
                    approx,
                    radius,
                } => {
                    let max_shift = 4.0 * step + radius;
                    let (p, _) = solver::solve_vertex(&sites, &sources, approx, radius, max_shift)
                        .unwrap_or((approx, radius));
                    VoronoiVertex {
                        x: p.x,
                        y: p.y,
                        boundary_point: None,
                    }
                }
            })
            .collect();

        let mut edges = Vec::with_capacity(raw.edges.len() * 2);
        for e in &raw.edges {
            let (is_curved, is_secondary) = classify(&sources, e.left, e.right);
            let id = edges.len();
            edges.push(VoronoiEdge {
                vertex0: e.v0,
                vertex1: e.v1,
                twin: id + 1,
                next: None,
                prev: None,
                cell: sources.cell_index(e.left),
                is_curved,
                is_secondary,
            });
            edges.push(VoronoiEdge {
                vertex0: e.v1,
                vertex1: e.v0,
                twin: id,
                next: None,
                prev: None,
                cell: sources.cell_index(e.right),
                is_curved,
                is_secondary,
            });
        }

        let mut topology_issue = None;

        // Link consecutive edges of a cell at interior vertices. Chains start
        // and end on the outline, so boundary vertices stay unlinked.
        let mut around: HashMap<(usize, usize), (Vec<usize>, Vec<usize>)> = HashMap::new();
        for (id, e) in edges.iter().enumerate() {
            if vertices[e.vertex1].boundary_point.is_none() {
                around.entry((e.vertex1, e.cell)).or_default().0.push(id);
            }
            if vertices[e.vertex0].boundary_point.is_none() {
                around.entry((e.vertex0, e.cell)).or_default().1.push(id);
            }
        }
        for (incoming, outgoing) in around.values() {
            match (incoming.as_slice(), outgoing.as_slice()) {
                ([a], [b]) => {
                    edges[*a].next = Some(*b);
                    edges[*b].prev = Some(*a);
                }
                _ => topology_issue = Some(VoronoiIssue::NonPlanar),
            }
        }

        let mut cells: Vec<VoronoiCell> = (0..sources.len())
            .map(|i| VoronoiCell {
                source: Site::Point(i),
                incident_edge: None,
            })
            .chain((0..sources.len()).map(|k| VoronoiCell {
                source: Site::Segment(k),
                incident_edge: None,
            }))
            .collect();
        for (id, e) in edges.iter().enumerate() {
            if e.prev.is_none() {
                if cells[e.cell].incident_edge.is_some() {
                    topology_issue = Some(VoronoiIssue::NonPlanar);
                }
                cells[e.cell].incident_edge = Some(id);
            }
        }

        Self {
            vertices,
            edges,
            cells,
            sources,
            status: RepairStatus::RepairNotNeeded,
            topology_issue,
        }
    }

    /// First issue found in the diagram, if any.
    fn detect_issue(&self, check_planarity: bool, tolerance: f64) -> Option<VoronoiIssue> {
        if self.vertices.iter().any(|v| !v.is_finite()) {
            return Some(VoronoiIssue::FiniteEdgeWithNonFiniteVertex);
        }
        if let Some(issue) = self.topology_issue {
            if check_planarity || issue != VoronoiIssue::NonPlanar {
                return Some(issue);
            }
        }

        let mut cell_edge_count = vec![0usize; self.cells.len()];
        for e in &self.edges {
            cell_edge_count[e.cell] += 1;
        }

        for (cell_idx, cell) in self.cells.iter().enumerate() {
            let (expected_start, expected_end) = match cell.source {
                Site::Segment(k) => {
                    let (from, to) = self.sources.segment_indices(k);
                    (to, from)
                }
                Site::Point(i) => {
                    if cell.incident_edge.is_none() {
                        continue;
                    }
                    (i, i)
                }
            };

            let Some((begin, end, walked)) = self.walk_cell(cell_idx) else {
                return Some(VoronoiIssue::MissingVoronoiVertex);
            };
            if self.vertices[self.edges[begin].vertex0].boundary_point != Some(expected_start)
                || self.vertices[self.edges[end].vertex1].boundary_point != Some(expected_end)
            {
                return Some(VoronoiIssue::MissingVoronoiVertex);
            }
            if check_planarity && walked != cell_edge_count[cell_idx] {
                return Some(VoronoiIssue::NonPlanar);
            }

            if let Site::Segment(k) = cell.source {
                let segment = self.sources.segment(k);
                let from = segment.a.to_pointf();
                let dir = segment.direction_f().normalize();
                let mut edge = Some(begin);
                while let Some(id) = edge {
                    let v = self.vertices[self.edges[id].vertex1].to_pointf();
                    if dir.cross(&(v - from)) < -tolerance {
                        return Some(VoronoiIssue::VoronoiEdgeIntersectingInputSegment);
                    }
                    edge = self.edges[id].next.filter(|_| id != end);
                }
            }
        }
        None
    }

    /// First edge, last edge and chain length of a cell.
    fn walk_cell(&self, cell: usize) -> Option<(usize, usize, usize)> {
        let begin = self.cells[cell].incident_edge?;
        let mut end = begin;
        let mut walked = 1;
        while let Some(next) = self.edges[end].next {
            if walked > self.edges.len() {
                return None;
            }
            end = next;
            walked += 1;
        }
        Some((begin, end, walked))
    }

    /// Undo an input rotation and snap vertices onto their sites' endpoints.
    fn rotate_back(&mut self, angle: CoordF, original: VoronoiSources, snap_distance: f64) {
        for v in &mut self.vertices {
            let p = match v.boundary_point {
                Some(i) => original.point(i).to_pointf(),
                None => PointF::new(v.x, v.y).rotate(-angle),
            };
            v.x = p.x;
            v.y = p.y;
        }
        self.sources = original;

        let snap_sq = snap_distance * snap_distance;
        for e in &self.edges {
            let endpoints = match self.cells[e.cell].source {
                Site::Point(i) => [i, i],
                Site::Segment(k) => {
                    let (from, to) = self.sources.segment_indices(k);
                    [from, to]
                }
            };
            let vertex = &mut self.vertices[e.vertex0];
            if vertex.boundary_point.is_some() {
                continue;
            }
            for i in endpoints {
                let p = self.sources.point(i).to_pointf();
                if vertex.to_pointf().distance_squared(&p) <= snap_sq {
                    vertex.x = p.x;
                    vertex.y = p.y;
                    break;
                }
            }
        }
    }

    #[inline]
    pub fn vertices(&self) -> &[VoronoiVertex] {
        &self.vertices
    }

    #[inline]
    pub fn edges(&self) -> &[VoronoiEdge] {
        &self.edges
    }

    #[inline]
    pub fn cells(&self) -> &[VoronoiCell] {
        &self.cells
    }

    #[inline]
    pub fn vertex(&self, id: usize) -> &VoronoiVertex {
        &self.vertices[id]
    }

    #[inline]
    pub fn edge(&self, id: usize) -> &VoronoiEdge {
        &self.edges[id]
    }

    #[inline]
    pub fn sources(&self) -> &VoronoiSources {
        &self.sources
    }

    #[inline]
    pub fn status(&self) -> RepairStatus {
        self.status
    }

    /// First and last edge of a cell's chain, `None` for cells without edges.
    pub fn cell_range(&self, cell: usize) -> Option<(usize, usize)> {
        self.walk_cell(cell).map(|(begin, end, _)| (begin, end))
    }

    /// Source point of a point cell.
    pub fn source_point(&self, cell: usize) -> Option<Point> {
        match self.cells[cell].source {
            Site::Point(i) => Some(self.sources.point(i)),
            Site::Segment(_) => None,
        }
    }

    /// Source segment of a segment cell.
    pub fn source_segment(&self, cell: usize) -> Option<Line> {
        match self.cells[cell].source {
            Site::Segment(k) => Some(self.sources.segment(k)),
            Site::Point(_) => None,
        }
    }
}

/// `(is_curved, is_secondary)` for the edge between two sites.
fn classify(sources: &VoronoiSources, a: Site, b: Site) -> (bool, bool) {
    match (a, b) {
        (Site::Point(i), Site::Segment(k)) | (Site::Segment(k), Site::Point(i)) => {
            let secondary = sources.segment_touches_point(k, i);
            (!secondary, secondary)
        }
        _ => (false, false),
    }
}
