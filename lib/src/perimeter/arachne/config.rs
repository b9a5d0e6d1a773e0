//! Configuration for variable-width wall generation.
//!
//! All lengths are in millimetres and angles in degrees unless stated
//! otherwise. Both structs load from JSON with missing fields taking their
//! defaults.

use crate::{scale, Coord, CoordF, Error, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs;
use std::path::Path;

/// Voronoi construction and repair parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoronoiConfig {
    /// Boundary sampling distance of the triangulation (mm).
    pub sample_step: CoordF,

    /// Rotations (radians) tried in turn when the diagram needs repair.
    pub repair_rotations: Vec<CoordF>,

    /// Vertices closer than this to an input endpoint are snapped onto it
    /// after a repair rotation (mm).
    pub snap_distance: CoordF,

    /// Treat cells with disconnected or branching edge chains as an issue.
    pub check_planarity: bool,
}

impl Default for VoronoiConfig {
    fn default() -> Self {
        Self {
            sample_step: 0.05,
            repair_rotations: vec![PI / 6.0, PI / 5.0, PI / 7.0, PI / 11.0],
            snap_distance: 0.001,
            check_planarity: true,
        }
    }
}

impl VoronoiConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_step <= 0.0 {
            return Err(Error::Config("voronoi sample_step must be positive".to_string()));
        }
        if self.repair_rotations.is_empty() {
            return Err(Error::Config(
                "voronoi repair_rotations must not be empty".to_string(),
            ));
        }
        if self.snap_distance < 0.0 {
            return Err(Error::Config(
                "voronoi snap_distance must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for variable-width wall toolpath generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallToolPathsConfig {
    /// Nominal (preferred) bead width of the outer wall (mm).
    pub bead_width_outer: CoordF,

    /// Nominal (preferred) bead width of the inner walls (mm).
    pub bead_width_inner: CoordF,

    /// Number of walls requested.
    pub wall_count: usize,

    /// How far to inset the outer wall from the outline (mm).
    pub wall_0_inset: CoordF,

    /// Minimum width a thin feature is widened to (mm).
    pub min_bead_width: CoordF,

    /// Features narrower than this are dropped (mm).
    pub min_feature_size: CoordF,

    /// Length of the transition between two bead counts (mm).
    pub wall_transition_length: CoordF,

    /// Corners sharper than this angle get a transition (degrees).
    pub wall_transition_angle: CoordF,

    /// Allowed width deviation before a transition is kept (mm).
    pub wall_transition_filter_deviation: CoordF,

    /// Number of walls, counted from the middle, over which extra width is
    /// spread.
    pub wall_distribution_count: usize,

    /// Print features too thin for a regular wall with one widened bead.
    pub print_thin_walls: bool,

    /// Discretization step of curved skeleton edges (mm).
    pub discretization_step_size: CoordF,

    /// Transitions closer together than this are filtered out (mm).
    pub transition_filter_distance: CoordF,

    /// Minimum segment length after simplification (mm).
    pub max_resolution: CoordF,

    /// Maximum deviation of simplified toolpaths from the original (mm).
    pub max_deviation: CoordF,

    /// Maximum extrusion area deviation when merging junctions (mm²).
    pub max_extrusion_area_deviation: CoordF,

    /// Unmark central edges that touch the outline. Known to destabilize
    /// the result; disabled by default.
    pub filter_outermost_central_edges: bool,

    /// Voronoi construction parameters.
    pub voronoi: VoronoiConfig,
}

impl Default for WallToolPathsConfig {
    fn default() -> Self {
        Self {
            bead_width_outer: 0.45,
            bead_width_inner: 0.45,
            wall_count: 3,
            wall_0_inset: 0.0,
            min_bead_width: 0.34,
            min_feature_size: 0.1,
            wall_transition_length: 0.4,
            wall_transition_angle: 10.0,
            wall_transition_filter_deviation: 0.025,
            wall_distribution_count: 1,
            print_thin_walls: true,
            discretization_step_size: 0.8,
            transition_filter_distance: 100.0,
            max_resolution: 0.5,
            max_deviation: 0.025,
            max_extrusion_area_deviation: 0.05,
            filter_outermost_central_edges: false,
            voronoi: VoronoiConfig::default(),
        }
    }
}

impl WallToolPathsConfig {
    /// Create a config with the given wall count and bead width.
    pub fn new(wall_count: usize, bead_width: CoordF) -> Self {
        Self {
            bead_width_outer: bead_width,
            bead_width_inner: bead_width,
            wall_count,
            ..Default::default()
        }
    }

    /// Load a config from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse and validate a config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a pretty JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save to a JSON file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Set different widths for outer and inner walls.
    pub fn with_wall_widths(mut self, outer: CoordF, inner: CoordF) -> Self {
        self.bead_width_outer = outer;
        self.bead_width_inner = inner;
        self
    }

    /// Enable or disable thin wall printing.
    pub fn with_thin_walls(mut self, enabled: bool) -> Self {
        self.print_thin_walls = enabled;
        self
    }

    /// Set minimum bead width.
    pub fn with_min_bead_width(mut self, width: CoordF) -> Self {
        self.min_bead_width = width;
        self
    }

    /// Set minimum feature size.
    pub fn with_min_feature_size(mut self, size: CoordF) -> Self {
        self.min_feature_size = size;
        self
    }

    /// Set the outer wall inset.
    pub fn with_wall_0_inset(mut self, inset: CoordF) -> Self {
        self.wall_0_inset = inset;
        self
    }

    /// Set the transition angle in degrees.
    pub fn with_transition_angle(mut self, degrees: CoordF) -> Self {
        self.wall_transition_angle = degrees;
        self
    }

    /// Set the Voronoi parameters.
    pub fn with_voronoi(mut self, voronoi: VoronoiConfig) -> Self {
        self.voronoi = voronoi;
        self
    }

    /// Check the parameters for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.bead_width_outer <= 0.0 || self.bead_width_inner <= 0.0 {
            return Err(Error::Config("bead width must be positive".to_string()));
        }
        if self.min_bead_width <= 0.0 {
            return Err(Error::Config("min_bead_width must be positive".to_string()));
        }
        if self.min_bead_width > self.bead_width_outer.max(self.bead_width_inner) {
            return Err(Error::Config(format!(
                "min_bead_width ({}) exceeds the bead width",
                self.min_bead_width
            )));
        }
        if self.min_feature_size < 0.0 {
            return Err(Error::Config(
                "min_feature_size must not be negative".to_string(),
            ));
        }
        if !(self.wall_transition_angle > 0.0 && self.wall_transition_angle < 90.0) {
            return Err(Error::Config(format!(
                "wall_transition_angle ({}) must be between 0 and 90 degrees",
                self.wall_transition_angle
            )));
        }
        if self.wall_transition_length <= 0.0 || self.discretization_step_size <= 0.0 {
            return Err(Error::Config(
                "transition length and discretization step must be positive".to_string(),
            ));
        }
        if self.max_resolution < 0.0 || self.max_deviation < 0.0 {
            return Err(Error::Config(
                "simplification limits must not be negative".to_string(),
            ));
        }
        self.voronoi.validate()
    }

    /// Transition angle in radians.
    #[inline]
    pub fn transitioning_angle(&self) -> CoordF {
        self.wall_transition_angle.to_radians()
    }

    /// Split middle threshold as a fraction of the bead width.
    pub fn wall_split_middle_threshold(&self) -> CoordF {
        (2.0 * self.min_bead_width / self.bead_width_outer - 1.0).clamp(0.01, 0.99)
    }

    /// Add middle threshold as a fraction of the bead width.
    pub fn wall_add_middle_threshold(&self) -> CoordF {
        (self.min_bead_width / self.bead_width_inner).clamp(0.01, 0.99)
    }

    /// Bead count cap: both sides of every wall.
    #[inline]
    pub fn max_bead_count(&self) -> usize {
        2 * self.wall_count
    }

    /// Outline preparation epsilon: half the allowed deviation, minus one unit.
    #[inline]
    pub fn epsilon_offset(&self) -> Coord {
        scale(self.max_deviation) / 2 - 1
    }
}
