//! # Slicer Walls
//!
//! Variable-width wall toolpath generation for the slicer (the "Arachne"
//! perimeter generator).
//!
//! Given one slice outline and a wall policy, this library produces
//! centerline polylines whose junctions each carry a local extrusion width:
//! - Voronoi diagram construction over the outline (with rotation repair)
//! - Skeletal trapezoidation graph with bead counts and transitions
//! - Beading propagation and junction extraction
//! - Polyline stitching and simplification
//! - Perimeter print ordering
//!
//! ## Example
//!
//! ```rust,ignore
//! use slicer_walls::{ExPolygon, Point, WallToolPaths, WallToolPathsConfig};
//! use slicer_walls::scale;
//!
//! let square = ExPolygon::rectangle(Point::zero(), Point::new(scale(20.0), scale(20.0)));
//! let config = WallToolPathsConfig::new(3, 0.45);
//! let mut walls = WallToolPaths::new(vec![square], config);
//! let toolpaths = walls.generate()?;
//! let infill_area = walls.inner_contour();
//! ```

pub mod clipper;
pub mod geometry;
pub mod perimeter;

pub use geometry::{BoundingBox, ExPolygon, ExPolygons, Line, Point, PointF, Polygon, Polygons};

// Re-export clipper operations
pub use clipper::{offset_polygons, union_even_odd, union_polygons, OffsetJoinType};

// Re-export perimeter ordering
pub use perimeter::order::{
    order_perimeters, order_with_constraints, region_order, PerimeterExtrusion,
};

// Re-export Arachne variable-width wall generation
pub use perimeter::arachne::{
    generate_wall_toolpaths, Beading, BeadingStrategy, BeadingStrategyFactory, ExtrusionJunction,
    ExtrusionLine, PolylineStitcher, VariableWidthLines, VoronoiConfig, WallToolPaths,
    WallToolPathsConfig, WallToolPathsResult,
};

/// Coordinate type used throughout the slicer.
/// Using i64 for integer coordinates (scaled by SCALING_FACTOR) to avoid floating-point issues.
pub type Coord = i64;

/// Floating-point coordinate type for unscaled values.
pub type CoordF = f64;

/// Scaling factor: coordinates are stored as integers scaled by this factor.
/// 1 unit = 1 nanometer, so 1mm = 1_000_000 units.
pub const SCALING_FACTOR: f64 = 1_000_000.0;

/// Scale a floating-point coordinate to integer.
#[inline]
pub fn scale(v: CoordF) -> Coord {
    (v * SCALING_FACTOR).round() as Coord
}

/// Unscale an integer coordinate to floating-point.
#[inline]
pub fn unscale(v: Coord) -> CoordF {
    v as CoordF / SCALING_FACTOR
}

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for wall generation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Voronoi error: {0}")]
    Voronoi(#[from] perimeter::arachne::voronoi::VoronoiError),
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaling() {
        // 1mm should scale to 1_000_000
        assert_eq!(scale(1.0), 1_000_000);

        // And back
        assert!((unscale(1_000_000) - 1.0).abs() < 1e-10);

        // Test sub-millimeter precision
        assert_eq!(scale(0.001), 1_000); // 1 micron
        assert_eq!(scale(0.0001), 100); // 100 nanometers
    }

    #[test]
    fn test_error_display() {
        let err = Error::Config("bead width must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: bead width must be positive"
        );
    }
}
