//! Arachne variable-width wall generation.
//!
//! Walls follow the medial axis of the outline instead of fixed offsets of
//! it, and every junction along a wall carries its own extrusion width. The
//! number of walls changes smoothly where the part gets thinner or thicker,
//! and features too thin for a regular wall still get a single widened bead.
//!
//! # Pipeline
//!
//! 1. [`prepare`]: the outline is cleaned (offset round trip, vertex
//!    simplification, self-intersection and spike removal).
//! 2. [`voronoi`]: the Voronoi diagram of the outline segments.
//! 3. [`skeletal`]: the skeletal trapezoidation decides bead counts,
//!    transitions and beadings, then extracts junctions and lines.
//! 4. [`stitcher`] and [`WallToolPaths`]: the line pieces are stitched,
//!    filtered and simplified. Zero-width marker lines become the inner
//!    contour left for infill.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = WallToolPathsConfig::new(3, 0.4);
//! let mut walls = WallToolPaths::new(outline, config);
//! for inset in walls.generate()? {
//!     for line in inset {
//!         // print line
//!     }
//! }
//! ```

pub mod beading;
pub mod config;
pub mod junction;
pub mod line;
pub mod prepare;
pub mod skeletal;
pub mod stitcher;
pub mod voronoi;

pub use beading::{Beading, BeadingStrategy, BeadingStrategyFactory};
pub use config::{VoronoiConfig, WallToolPathsConfig};
pub use junction::{ExtrusionJunction, ExtrusionJunctions};
pub use line::{ExtrusionLine, VariableWidthLines};
pub use stitcher::PolylineStitcher;

use crate::clipper::union_even_odd;
use crate::geometry::{to_polygons, ExPolygon, ExPolygons, Polygon};
use crate::{scale, Coord, Result, SCALING_FACTOR};
use log::{debug, warn};
use skeletal::{SkeletalParams, SkeletalTrapezoidation};

/// Endpoints closer than this are the same point when stitching.
const STITCH_SNAP_DISTANCE: Coord = 10;

/// Output of the wall generation.
#[derive(Debug, Clone, Default)]
pub struct WallToolPathsResult {
    /// Lines by inset index, outermost first.
    pub toolpaths: Vec<VariableWidthLines>,
    /// Area left inside the innermost wall.
    pub inner_contour: ExPolygons,
}

impl WallToolPathsResult {
    pub fn has_toolpaths(&self) -> bool {
        self.toolpaths.iter().any(|lines| !lines.is_empty())
    }

    /// Number of lines over all insets.
    pub fn line_count(&self) -> usize {
        self.toolpaths.iter().map(|lines| lines.len()).sum()
    }

    /// All lines flattened, outermost inset first.
    pub fn all_lines(&self) -> VariableWidthLines {
        self.toolpaths.iter().flatten().cloned().collect()
    }

    pub fn outer_walls(&self) -> Option<&VariableWidthLines> {
        self.toolpaths.first()
    }
}

/// Variable-width wall generator for one outline.
///
/// Generation is lazy: [`WallToolPaths::tool_paths`] runs it on first use,
/// later calls return the stored result.
pub struct WallToolPaths {
    outline: ExPolygons,
    config: WallToolPathsConfig,
    toolpaths: Vec<VariableWidthLines>,
    inner_contour: ExPolygons,
    generated: bool,
}

impl WallToolPaths {
    /// Outer contours are expected counter-clockwise and holes clockwise.
    pub fn new(outline: ExPolygons, config: WallToolPathsConfig) -> Self {
        Self {
            outline,
            config,
            toolpaths: Vec::new(),
            inner_contour: Vec::new(),
            generated: false,
        }
    }

    pub fn config(&self) -> &WallToolPathsConfig {
        &self.config
    }

    pub fn outline(&self) -> &[ExPolygon] {
        &self.outline
    }

    /// Generate the walls, replacing any earlier result.
    ///
    /// Fails on an invalid config or when the Voronoi diagram of the prepared
    /// outline cannot be repaired.
    pub fn generate(&mut self) -> Result<&[VariableWidthLines]> {
        self.config.validate()?;
        self.toolpaths.clear();
        self.inner_contour.clear();
        self.generated = true;

        if self.config.wall_count == 0 {
            return Ok(&self.toolpaths);
        }

        let prepared = prepare::prepare_outline(
            &to_polygons(&self.outline),
            scale(self.config.max_resolution),
            scale(self.config.max_deviation),
            scale(self.config.bead_width_outer / 2.0),
        );
        let area: f64 = prepared.iter().map(|p| p.signed_area()).sum();
        if prepared.is_empty() || area <= 0.0 {
            debug!("Outline is empty after preparation");
            return Ok(&self.toolpaths);
        }

        let strategy = BeadingStrategyFactory::from_config(&self.config);
        let params = SkeletalParams::from_config(&self.config);
        let trapezoidation =
            SkeletalTrapezoidation::new(&prepared, strategy.as_ref(), params, &self.config.voronoi)?;
        let mut toolpaths = trapezoidation.generate_toolpaths();

        stitch_tool_paths(&mut toolpaths, scale(self.config.bead_width_inner));
        remove_small_lines(&mut toolpaths);
        self.inner_contour = separate_out_inner_contour(&mut toolpaths);
        simplify_tool_paths(&mut toolpaths, &self.config);
        toolpaths.retain(|lines| !lines.is_empty());
        normalize_winding(&mut toolpaths);

        debug!(
            "Generated {} insets with {} lines, inner contour of {} polygons",
            toolpaths.len(),
            toolpaths.iter().map(|lines| lines.len()).sum::<usize>(),
            self.inner_contour.len()
        );
        self.toolpaths = toolpaths;
        Ok(&self.toolpaths)
    }

    /// The walls, generated on first call.
    pub fn tool_paths(&mut self) -> Result<&[VariableWidthLines]> {
        if !self.generated {
            return self.generate();
        }
        Ok(&self.toolpaths)
    }

    /// Area inside the innermost wall. Without walls this is the outline.
    pub fn inner_contour(&self) -> &[ExPolygon] {
        if self.config.wall_count == 0 {
            return &self.outline;
        }
        &self.inner_contour
    }

    pub fn into_result(self) -> WallToolPathsResult {
        let inner_contour = if self.config.wall_count == 0 {
            self.outline
        } else {
            self.inner_contour
        };
        WallToolPathsResult {
            toolpaths: self.toolpaths,
            inner_contour,
        }
    }
}

/// Generate the walls of `outline` in one call.
pub fn generate_wall_toolpaths(
    outline: &[ExPolygon],
    config: &WallToolPathsConfig,
) -> Result<WallToolPathsResult> {
    let mut walls = WallToolPaths::new(outline.to_vec(), config.clone());
    walls.generate()?;
    Ok(walls.into_result())
}

/// Stitch the line pieces of every inset. Closed results repeat their first
/// junction at the end.
fn stitch_tool_paths(toolpaths: &mut [VariableWidthLines], bead_width: Coord) {
    let stitch_distance = bead_width - 1;
    for wall_lines in toolpaths.iter_mut() {
        let (mut lines, polygons) = PolylineStitcher::stitch(wall_lines, stitch_distance, STITCH_SNAP_DISTANCE);
        for mut polygon in polygons {
            let (Some(&front), Some(back)) = (polygon.first(), polygon.last()) else {
                continue;
            };
            if front.position != back.position
                && (back.position - front.position).shorter_than(stitch_distance)
            {
                polygon.push(front);
            }
            polygon.is_closed = true;
            lines.push(polygon);
        }
        let open_even = lines.iter().filter(|l| !l.is_closed && !l.is_odd).count();
        if open_even > 0 {
            warn!(
                "{} even lines of inset {} stayed open after stitching",
                open_even,
                lines.first().map_or(0, |l| l.inset_idx)
            );
        }
        *wall_lines = lines;
    }
}

/// Drop odd open lines shorter than half their own minimum width.
fn remove_small_lines(toolpaths: &mut [VariableWidthLines]) {
    for lines in toolpaths.iter_mut() {
        lines.retain(|line| {
            if !line.is_odd || line.is_closed {
                return true;
            }
            let closing = match (line.first(), line.last()) {
                (Some(front), Some(back)) => (front.position - back.position).length_coord(),
                _ => 0,
            };
            line.length() + closing >= line.min_width() / 2
        });
    }
}

/// Move insets made of zero-width lines out of the toolpaths and return the
/// area they enclose.
fn separate_out_inner_contour(toolpaths: &mut Vec<VariableWidthLines>) -> ExPolygons {
    let mut contour: Vec<Polygon> = Vec::new();
    toolpaths.retain(|inset| {
        let is_contour = !inset.is_empty() && inset.iter().all(|line| line.first().map_or(true, |j| j.width == 0));
        if !is_contour {
            return true;
        }
        contour.extend(
            inset
                .iter()
                .filter(|line| line.is_closed && !line.is_odd)
                .map(|line| line.to_polygon())
                .filter(|polygon| polygon.len() >= 3),
        );
        false
    });
    union_even_odd(&contour)
}

fn simplify_tool_paths(toolpaths: &mut [VariableWidthLines], config: &WallToolPathsConfig) {
    let resolution = scale(config.max_resolution) as i128;
    let deviation = scale(config.max_deviation) as i128;
    let area_deviation = (config.max_extrusion_area_deviation * SCALING_FACTOR * SCALING_FACTOR) as i128;
    for lines in toolpaths.iter_mut() {
        for line in lines.iter_mut() {
            line.simplify(resolution * resolution, deviation * deviation, area_deviation);
        }
        lines.retain(|line| !line.is_empty());
    }
}

/// Closed lines of one inset nested at an even depth run counter-clockwise,
/// the others clockwise.
fn normalize_winding(toolpaths: &mut [VariableWidthLines]) {
    for lines in toolpaths.iter_mut() {
        let loops: Vec<(usize, Polygon)> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.is_closed && line.len() >= 3)
            .map(|(idx, line)| (idx, line.to_polygon()))
            .collect();
        for (idx, polygon) in &loops {
            let Some(sample) = polygon.first() else {
                continue;
            };
            let depth = loops
                .iter()
                .filter(|(other, outer)| other != idx && outer.contains_point(sample))
                .count();
            let should_be_ccw = depth % 2 == 0;
            if polygon.is_counter_clockwise() != should_be_ccw {
                lines[*idx].reverse();
            }
        }
    }
}
