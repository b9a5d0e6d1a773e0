//! Diagram topology from a constrained Delaunay triangulation of boundary
//! samples.
//!
//! Every sample carries the site it was taken from. Inside the outline, a
//! triangle whose corners belong to three different sites contains a diagram
//! vertex, and a run of triangles spanning the same two sites traces the edge
//! between them. Runs that reach the outline end at the polygon vertex shared
//! by both sites.

use super::{Site, VoronoiIssue, VoronoiSources};
use crate::geometry::PointF;
use log::trace;
use spade::handles::{FixedDirectedEdgeHandle, FixedVertexHandle};
use spade::{ConstrainedDelaunayTriangulation, HasPosition, Point2, Triangulation};

/// Upper bound on boundary samples; the step grows for very long outlines.
const MAX_SAMPLES: f64 = 2.0e6;

#[derive(Debug, Clone, Copy)]
struct BoundarySample {
    position: Point2<f64>,
    site: Site,
}

impl HasPosition for BoundarySample {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        self.position
    }
}

type Cdt = ConstrainedDelaunayTriangulation<BoundarySample>;

#[derive(Debug, Clone, Copy)]
pub(super) enum RawVertex {
    /// Outline vertex by point index.
    Boundary(usize),
    /// Vertex inside the outline, placed at the circumcenter of its triangle.
    Interior {
        sites: [Site; 3],
        approx: PointF,
        radius: f64,
    },
}

/// An undirected diagram edge; `left` is on the left walking `v0 -> v1`.
#[derive(Debug, Clone, Copy)]
pub(super) struct RawEdge {
    pub v0: usize,
    pub v1: usize,
    pub left: Site,
    pub right: Site,
}

#[derive(Debug, Default)]
pub(super) struct RawDiagram {
    pub vertices: Vec<RawVertex>,
    pub edges: Vec<RawEdge>,
}

pub(super) fn triangulate(
    sources: &VoronoiSources,
    sample_step: f64,
) -> Result<RawDiagram, VoronoiIssue> {
    let total_length: f64 = (0..sources.len()).map(|k| sources.segment(k).length()).sum();
    let step = sample_step.max(total_length / MAX_SAMPLES);

    let mut cdt = Cdt::new();
    let mut loops: Vec<Vec<FixedVertexHandle>> = Vec::new();
    for contour in sources.contours() {
        let mut handles = Vec::new();
        for i in contour {
            if sources.is_reflex(i) {
                let p = sources.point(i).to_pointf();
                handles.push(insert_sample(&mut cdt, p, Site::Point(i))?);
            }
            let segment = sources.segment(i);
            let a = segment.a.to_pointf();
            let d = segment.direction_f();
            let n = ((segment.length() / step).ceil() as usize).max(2);
            for j in 1..n {
                let p = a + d * (j as f64 / n as f64);
                handles.push(insert_sample(&mut cdt, p, Site::Segment(i))?);
            }
        }
        loops.push(handles);
    }

    for handles in &loops {
        for (a, b) in cyclic_pairs(handles) {
            if !cdt.can_add_constraint(a, b) {
                return Err(VoronoiIssue::NonPlanar);
            }
            cdt.add_constraint(a, b);
        }
    }
    trace!(
        "Boundary triangulation: {} samples, {} faces",
        cdt.num_vertices(),
        cdt.num_inner_faces()
    );

    let mut walker = ChainWalker::new(&cdt, sources, &loops)?;
    walker.walk_all(&loops)?;
    Ok(walker.diagram)
}

fn insert_sample(cdt: &mut Cdt, p: PointF, site: Site) -> Result<FixedVertexHandle, VoronoiIssue> {
    let before = cdt.num_vertices();
    let handle = cdt
        .insert(BoundarySample {
            position: Point2::new(p.x, p.y),
            site,
        })
        .map_err(|_| VoronoiIssue::FiniteEdgeWithNonFiniteVertex)?;
    if cdt.num_vertices() == before {
        // Two sites sampled onto the same location
        return Err(VoronoiIssue::NonPlanar);
    }
    Ok(handle)
}

fn cyclic_pairs(
    handles: &[FixedVertexHandle],
) -> impl Iterator<Item = (FixedVertexHandle, FixedVertexHandle)> + '_ {
    let len = handles.len();
    (0..len).map(move |i| (handles[i], handles[(i + 1) % len]))
}

#[inline]
fn edge_index(edge: FixedDirectedEdgeHandle) -> usize {
    edge.as_undirected().index()
}

struct ChainWalker<'a> {
    cdt: &'a Cdt,
    sources: &'a VoronoiSources,
    inside: Vec<bool>,
    face_vertex: Vec<Option<usize>>,
    crossed: Vec<bool>,
    boundary_vertex: Vec<Option<usize>>,
    diagram: RawDiagram,
}

impl<'a> ChainWalker<'a> {
    fn new(
        cdt: &'a Cdt,
        sources: &'a VoronoiSources,
        loops: &[Vec<FixedVertexHandle>],
    ) -> Result<Self, VoronoiIssue> {
        let mut walker = Self {
            cdt,
            sources,
            inside: vec![false; cdt.num_all_faces()],
            face_vertex: vec![None; cdt.num_all_faces()],
            crossed: vec![false; cdt.num_undirected_edges()],
            boundary_vertex: vec![None; sources.len()],
            diagram: RawDiagram::default(),
        };
        walker.mark_inside(loops)?;
        walker.collect_vertices();
        Ok(walker)
    }

    /// Flood fill from the interior side of every boundary constraint.
    fn mark_inside(&mut self, loops: &[Vec<FixedVertexHandle>]) -> Result<(), VoronoiIssue> {
        let cdt = self.cdt;
        let mut stack = Vec::new();
        for handles in loops {
            for (a, b) in cyclic_pairs(handles) {
                let edge = cdt
                    .get_edge_from_neighbors(a, b)
                    .ok_or(VoronoiIssue::NonPlanar)?;
                if let Some(face) = edge.face().as_inner() {
                    let idx = face.fix().index();
                    if !self.inside[idx] {
                        self.inside[idx] = true;
                        stack.push(face.fix());
                    }
                }
            }
        }

        while let Some(face) = stack.pop() {
            for edge in cdt.face(face).adjacent_edges() {
                if cdt.is_constraint_edge(edge.fix().as_undirected()) {
                    continue;
                }
                if let Some(neighbor) = edge.rev().face().as_inner() {
                    let idx = neighbor.fix().index();
                    if !self.inside[idx] {
                        self.inside[idx] = true;
                        stack.push(neighbor.fix());
                    }
                }
            }
        }

        // The outer side of the boundary must stay outside
        for handles in loops {
            for (a, b) in cyclic_pairs(handles) {
                if let Some(edge) = cdt.get_edge_from_neighbors(b, a) {
                    if let Some(face) = edge.face().as_inner() {
                        if self.inside[face.fix().index()] {
                            return Err(VoronoiIssue::NonPlanar);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn collect_vertices(&mut self) {
        for face in self.cdt.inner_faces() {
            let idx = face.fix().index();
            if !self.inside[idx] {
                continue;
            }
            let [a, b, c] = face.vertices();
            let sites = [a.data().site, b.data().site, c.data().site];
            if sites[0] == sites[1] || sites[1] == sites[2] || sites[0] == sites[2] {
                continue;
            }
            let center = face.circumcenter();
            let approx = PointF::new(center.x, center.y);
            let corner = a.position();
            let radius = approx.distance(&PointF::new(corner.x, corner.y));
            self.face_vertex[idx] = Some(self.diagram.vertices.len());
            self.diagram.vertices.push(RawVertex::Interior {
                sites,
                approx,
                radius,
            });
        }
    }

    fn walk_all(&mut self, loops: &[Vec<FixedVertexHandle>]) -> Result<(), VoronoiIssue> {
        let cdt = self.cdt;

        for face in cdt.inner_faces() {
            let Some(vertex) = self.face_vertex[face.fix().index()] else {
                continue;
            };
            for edge in face.adjacent_edges() {
                let fixed = edge.fix();
                if !is_mixed(cdt, fixed) || self.crossed[edge_index(fixed)] {
                    continue;
                }
                if cdt.is_constraint_edge(fixed.as_undirected()) {
                    // The vertex connects straight to the outline
                    self.crossed[edge_index(fixed)] = true;
                    let end = self.boundary_vertex_between(fixed)?;
                    self.push_edge(vertex, end, edge.to().data().site, edge.from().data().site);
                } else {
                    self.walk(fixed, vertex)?;
                }
            }
        }

        for handles in loops {
            for (a, b) in cyclic_pairs(handles) {
                let edge = cdt
                    .get_edge_from_neighbors(a, b)
                    .ok_or(VoronoiIssue::NonPlanar)?
                    .fix();
                if is_mixed(cdt, edge) && !self.crossed[edge_index(edge)] {
                    let start = self.boundary_vertex_between(edge)?;
                    self.walk(edge.rev(), start)?;
                }
            }
        }
        Ok(())
    }

    /// Follow the run of two-site triangles entered by crossing `first` from
    /// its left face to its right face.
    fn walk(&mut self, first: FixedDirectedEdgeHandle, start: usize) -> Result<(), VoronoiIssue> {
        let cdt = self.cdt;
        let first_handle = cdt.directed_edge(first);
        let left = first_handle.to().data().site;
        let right = first_handle.from().data().site;
        self.crossed[edge_index(first)] = true;

        let mut current = first;
        for _ in 0..cdt.num_all_faces() {
            let entered = cdt
                .directed_edge(current)
                .rev()
                .face()
                .as_inner()
                .ok_or(VoronoiIssue::MissingVoronoiVertex)?;
            let idx = entered.fix().index();
            if !self.inside[idx] {
                return Err(VoronoiIssue::MissingVoronoiVertex);
            }
            if let Some(end) = self.face_vertex[idx] {
                self.push_edge(start, end, left, right);
                return Ok(());
            }

            let exit = entered
                .adjacent_edges()
                .into_iter()
                .map(|e| e.fix())
                .find(|e| edge_index(*e) != edge_index(current) && is_mixed(cdt, *e))
                .ok_or(VoronoiIssue::MissingVoronoiVertex)?;
            self.crossed[edge_index(exit)] = true;

            if cdt.is_constraint_edge(exit.as_undirected()) {
                let end = self.boundary_vertex_between(exit)?;
                self.push_edge(start, end, left, right);
                return Ok(());
            }
            current = exit;
        }
        Err(VoronoiIssue::NonPlanar)
    }

    fn push_edge(&mut self, v0: usize, v1: usize, left: Site, right: Site) {
        self.diagram.edges.push(RawEdge { v0, v1, left, right });
    }

    /// Diagram vertex at the outline vertex shared by the sites of a boundary
    /// edge's two samples.
    fn boundary_vertex_between(&mut self, edge: FixedDirectedEdgeHandle) -> Result<usize, VoronoiIssue> {
        let handle = self.cdt.directed_edge(edge);
        let point = self
            .sources
            .common_point(handle.from().data().site, handle.to().data().site)
            .ok_or(VoronoiIssue::MissingVoronoiVertex)?;
        if let Some(v) = self.boundary_vertex[point] {
            return Ok(v);
        }
        let v = self.diagram.vertices.len();
        self.diagram.vertices.push(RawVertex::Boundary(point));
        self.boundary_vertex[point] = Some(v);
        Ok(v)
    }
}

fn is_mixed(cdt: &Cdt, edge: FixedDirectedEdgeHandle) -> bool {
    let handle = cdt.directed_edge(edge);
    handle.from().data().site != handle.to().data().site
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Polygon};
    use crate::scale;

    #[test]
    fn test_rectangle_topology() {
        let rect = Polygon::rectangle(Point::zero(), Point::new_scale(4.0, 1.0));
        let sources = VoronoiSources::from_polygons(&[rect]);
        let raw = triangulate(&sources, scale(0.05) as f64).unwrap();

        let boundary = raw
            .vertices
            .iter()
            .filter(|v| matches!(v, RawVertex::Boundary(_)))
            .count();
        assert_eq!(boundary, 4);

        // One bisector per corner plus the medial axis between the long sides
        assert!(raw.edges.len() >= 5);
        assert!(raw
            .edges
            .iter()
            .any(|e| matches!((e.left, e.right), (Site::Segment(0), Site::Segment(2)) | (Site::Segment(2), Site::Segment(0)))));
    }

    #[test]
    fn test_left_site_is_interior_side() {
        let rect = Polygon::rectangle(Point::zero(), Point::new_scale(4.0, 1.0));
        let sources = VoronoiSources::from_polygons(&[rect]);
        let raw = triangulate(&sources, scale(0.05) as f64).unwrap();

        // The corner bisector leaving (4, 0) has the bottom edge on its left
        let corner = raw
            .vertices
            .iter()
            .position(|v| matches!(v, RawVertex::Boundary(1)))
            .unwrap();
        let edge = raw
            .edges
            .iter()
            .find(|e| e.v0 == corner || e.v1 == corner)
            .unwrap();
        if edge.v0 == corner {
            assert_eq!(edge.left, Site::Segment(0));
            assert_eq!(edge.right, Site::Segment(1));
        } else {
            assert_eq!(edge.left, Site::Segment(1));
            assert_eq!(edge.right, Site::Segment(0));
        }
    }

    #[test]
    fn test_overlapping_contours_rejected() {
        let a = Polygon::rectangle(Point::zero(), Point::new_scale(2.0, 2.0));
        let b = Polygon::rectangle(Point::new_scale(1.0, 1.0), Point::new_scale(3.0, 3.0));
        let sources = VoronoiSources::from_polygons(&[a, b]);
        assert!(triangulate(&sources, scale(0.05) as f64).is_err());
    }
}
