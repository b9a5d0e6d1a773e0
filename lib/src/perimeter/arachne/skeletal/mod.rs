//! Skeletal trapezoidation of an outline.
//!
//! The Voronoi diagram of the outline is turned into a half-edge graph in
//! which every node knows its distance to the outline. The central part of
//! that skeleton decides how many beads fit at each point; bead count
//! transitions are smoothed out along the skeleton, beadings are propagated
//! over the whole graph, and finally every edge is cut where a bead lies on
//! it. Connecting those junctions trapezoid by trapezoid gives the toolpaths.
//!
//! The passes live in their own modules:
//! - [`construct`]: graph construction from the diagram
//! - [`central`]: central edges and bead counts
//! - [`transitions`]: bead count transitions and extra ribs
//! - [`propagation`]: beadings on every node
//! - [`toolpaths`]: junctions and their connection into lines

mod central;
mod construct;
pub mod graph;
mod propagation;
mod toolpaths;
mod transitions;

pub use construct::{discretize_parabola, discretize_straight};
pub use graph::SkeletalGraph;

use super::beading::BeadingStrategy;
use super::config::{VoronoiConfig, WallToolPathsConfig};
use super::line::VariableWidthLines;
use super::voronoi::VoronoiDiagram;
use crate::geometry::Polygon;
use crate::{scale, Coord, CoordF, Result};
use log::debug;

/// Central regions shorter than this are dissolved.
const CENTRAL_FILTER_DIST: Coord = 20_000;

/// Transition ends closer than this to a node are snapped onto it.
const SNAP_DIST: Coord = 20_000;

/// Non-central regions up to this long are merged into the central part.
const NONCENTRAL_FILTER_DIST: Coord = 400_000;

/// Parameters of the trapezoidation, in scaled units and radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkeletalParams {
    /// Corners sharper than this are not part of the central skeleton.
    pub transitioning_angle: CoordF,
    pub discretization_step_size: Coord,
    /// Transitions back and forth within this distance cancel out.
    pub transition_filter_dist: Coord,
    /// Width deviation allowed when cancelling transitions.
    pub allowed_filter_deviation: Coord,
    /// Distance over which a beading blends into its neighbours.
    pub beading_propagation_transition_dist: Coord,
    /// Unmark central edges touching the outline.
    pub filter_outermost_central_edges: bool,
}

impl SkeletalParams {
    pub fn from_config(config: &WallToolPathsConfig) -> Self {
        Self {
            transitioning_angle: config.transitioning_angle(),
            discretization_step_size: scale(config.discretization_step_size),
            transition_filter_dist: scale(config.transition_filter_distance),
            allowed_filter_deviation: scale(config.wall_transition_filter_deviation),
            beading_propagation_transition_dist: scale(config.wall_transition_length),
            filter_outermost_central_edges: config.filter_outermost_central_edges,
        }
    }
}

/// Computes variable-width toolpaths for one outline.
pub struct SkeletalTrapezoidation<'a> {
    graph: SkeletalGraph,
    strategy: &'a dyn BeadingStrategy,
    params: SkeletalParams,
    /// Generated lines, by inset index.
    toolpaths: Vec<VariableWidthLines>,
}

impl<'a> SkeletalTrapezoidation<'a> {
    /// Build the skeleton of `polygons`. Outer contours must be
    /// counter-clockwise and holes clockwise.
    pub fn new(
        polygons: &[Polygon],
        strategy: &'a dyn BeadingStrategy,
        params: SkeletalParams,
        voronoi_config: &VoronoiConfig,
    ) -> Result<Self> {
        let diagram = VoronoiDiagram::build(polygons, voronoi_config)?;
        Ok(Self::from_diagram(&diagram, strategy, params))
    }

    /// Build the skeleton of an existing diagram.
    pub fn from_diagram(
        diagram: &VoronoiDiagram,
        strategy: &'a dyn BeadingStrategy,
        params: SkeletalParams,
    ) -> Self {
        let graph = construct::construct_graph(
            diagram,
            params.discretization_step_size,
            params.transitioning_angle,
        );
        Self {
            graph,
            strategy,
            params,
            toolpaths: Vec::new(),
        }
    }

    pub fn graph(&self) -> &SkeletalGraph {
        &self.graph
    }

    /// Run all passes and return the lines by inset index.
    ///
    /// Lines come out as short pieces, one per trapezoid; they still need to
    /// be stitched together.
    pub fn generate_toolpaths(mut self) -> Vec<VariableWidthLines> {
        self.update_is_central();
        self.filter_central(CENTRAL_FILTER_DIST);
        if self.params.filter_outermost_central_edges {
            self.filter_outer_central();
        }
        self.update_bead_count();
        self.filter_noncentral_regions();
        debug!("Central skeleton determined");

        self.generate_transitioning_ribs();
        self.generate_extra_ribs();
        debug!(
            "Skeleton with transitions: {} nodes, {} half-edges",
            self.graph.node_count(),
            self.graph.edge_count()
        );

        self.generate_segments();
        debug!(
            "Generated toolpaths for {} insets",
            self.toolpaths.len()
        );
        self.toolpaths
    }
}
