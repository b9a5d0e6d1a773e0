//! End-to-end wall toolpath tests.
//!
//! These tests run the complete wall generation on simple slices and check:
//! - Wall counts and inner contours of regular parts
//! - Single odd walls in features too thin for two beads
//! - Holes and winding of closed walls
//! - Determinism and print ordering
//! - Config persistence

use slicer_walls::{
    generate_wall_toolpaths, order_perimeters, order_with_constraints, scale, ExPolygon,
    ExtrusionLine, Point, Polygon, WallToolPaths, WallToolPathsConfig, SCALING_FACTOR,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn make_square_mm(x: f64, y: f64, size: f64) -> ExPolygon {
    ExPolygon::rectangle(Point::new_scale(x, y), Point::new_scale(x + size, y + size))
}

fn make_square_with_hole_mm(size: f64, hole: f64) -> ExPolygon {
    let offset = (size - hole) / 2.0;
    let mut hole = Polygon::rectangle(
        Point::new_scale(offset, offset),
        Point::new_scale(offset + hole, offset + hole),
    );
    hole.make_clockwise();
    ExPolygon::with_holes(
        Polygon::rectangle(Point::zero(), Point::new_scale(size, size)),
        vec![hole],
    )
}

/// Two 10 mm squares joined by a 0.6 mm wide, 5 mm long neck.
fn make_dumbbell() -> ExPolygon {
    let points = [
        (0.0, 0.0),
        (10.0, 0.0),
        (10.0, 4.7),
        (15.0, 4.7),
        (15.0, 0.0),
        (25.0, 0.0),
        (25.0, 10.0),
        (15.0, 10.0),
        (15.0, 5.3),
        (10.0, 5.3),
        (10.0, 10.0),
        (0.0, 10.0),
    ];
    ExPolygon::new(Polygon::from_points(
        points.iter().map(|&(x, y)| Point::new_scale(x, y)).collect(),
    ))
}

/// Five 1 mm teeth standing 6 mm tall on a 2 mm base.
fn make_comb() -> ExPolygon {
    let mut points = vec![(0.0, 0.0), (17.0, 0.0)];
    for tooth in (0..5).rev() {
        let x = 4.0 * tooth as f64;
        points.extend([(x + 1.0, 8.0), (x, 8.0)]);
        if tooth > 0 {
            points.extend([(x, 2.0), (x - 3.0, 2.0)]);
        }
    }
    ExPolygon::new(Polygon::from_points(
        points.iter().map(|&(x, y)| Point::new_scale(x, y)).collect(),
    ))
}

fn area_mm2(expolygons: &[ExPolygon]) -> f64 {
    expolygons.iter().map(|e| e.area()).sum::<f64>() / (SCALING_FACTOR * SCALING_FACTOR)
}

/// Segments of the toolpaths crossing the vertical line at `x`, as the line,
/// the crossing height and the width interpolated there.
fn crossings_at_x(toolpaths: &[Vec<ExtrusionLine>], x: i64) -> Vec<(&ExtrusionLine, i64, i64)> {
    let mut crossings = Vec::new();
    for line in toolpaths.iter().flatten() {
        for pair in line.junctions.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if (a.position.x < x) == (b.position.x < x) {
                continue;
            }
            let t = (x - a.position.x) as f64 / (b.position.x - a.position.x) as f64;
            let y = a.position.y + ((b.position.y - a.position.y) as f64 * t) as i64;
            let width = a.width + ((b.width - a.width) as f64 * t) as i64;
            crossings.push((line, y, width));
        }
    }
    crossings
}

#[test]
fn test_square_gets_three_closed_walls() {
    init_logger();
    let config = WallToolPathsConfig::new(3, 0.45);
    let result = generate_wall_toolpaths(&[make_square_mm(0.0, 0.0, 20.0)], &config).unwrap();

    assert_eq!(result.toolpaths.len(), 3);
    for (inset_idx, lines) in result.toolpaths.iter().enumerate() {
        assert_eq!(lines.len(), 1, "inset {inset_idx}");
        let line = &lines[0];
        assert!(line.is_closed);
        assert!(!line.is_odd);
        assert_eq!(line.inset_idx, inset_idx);
        for junction in line {
            assert_eq!(junction.perimeter_index, inset_idx);
            assert!((junction.width - scale(0.45)).abs() <= scale(0.02));
        }
    }

    // 20 mm minus three 0.45 mm walls on each side
    assert_eq!(result.inner_contour.len(), 1);
    let side = 20.0 - 6.0 * 0.45;
    assert!((area_mm2(&result.inner_contour) - side * side).abs() < 2.0);
}

#[test]
fn test_outer_wall_follows_outline_at_half_width() {
    let config = WallToolPathsConfig::new(2, 0.4);
    let result = generate_wall_toolpaths(&[make_square_mm(0.0, 0.0, 10.0)], &config).unwrap();
    let outer = result.outer_walls().unwrap();
    for junction in outer.iter().flat_map(|line| line.iter()) {
        let p = junction.position;
        let dist = p.x.min(p.y).min(scale(10.0) - p.x).min(scale(10.0) - p.y);
        assert!((dist - scale(0.2)).abs() <= scale(0.02), "{p:?} at {dist}");
    }
}

#[test]
fn test_sliver_gets_single_odd_wall() {
    init_logger();
    let config = WallToolPathsConfig::new(3, 0.4);
    let sliver = ExPolygon::rectangle(Point::zero(), Point::new_scale(10.0, 0.3));
    let result = generate_wall_toolpaths(&[sliver], &config).unwrap();

    assert_eq!(result.toolpaths.len(), 1);
    let lines = &result.toolpaths[0];
    assert_eq!(lines.len(), 1);
    let line = &lines[0];
    assert!(line.is_odd);
    assert!(!line.is_closed);
    assert!(line.length() > scale(9.0));
    for junction in line {
        assert!((junction.position.y - scale(0.15)).abs() <= scale(0.02));
        assert!(junction.width >= scale(0.28));
    }
    assert!(result.inner_contour.is_empty());
}

#[test]
fn test_dumbbell_neck_narrows_walls() {
    init_logger();
    let config = WallToolPathsConfig::new(3, 0.4);
    let result = generate_wall_toolpaths(&[make_dumbbell()], &config).unwrap();

    assert!(result.has_toolpaths());
    // Each bulb keeps its own infill area
    assert_eq!(result.inner_contour.len(), 2);
    for lines in &result.toolpaths {
        for line in lines {
            for junction in line {
                assert!(junction.width > 0);
                assert!(junction.width <= scale(0.8), "width {}", junction.width);
            }
        }
    }

    // Only the external inset passes through the neck, no wider than the neck
    let crossings = crossings_at_x(&result.toolpaths, scale(12.5));
    assert!(!crossings.is_empty());
    for (line, y, width) in crossings {
        assert_eq!(line.inset_idx, 0);
        assert!(y >= scale(4.7) && y <= scale(5.3), "crossing at y {y}");
        assert!(width > 0 && width <= scale(0.65), "width {width} in the neck");
    }
}

#[test]
fn test_comb_with_coarse_voronoi_sampling() {
    init_logger();
    let mut config = WallToolPathsConfig::new(3, 0.4);
    config.voronoi.sample_step = 4.0;
    let result = generate_wall_toolpaths(&[make_comb()], &config).unwrap();

    assert!(result.has_toolpaths());
    // Every tooth gets walls above the base
    for tooth in 0..5 {
        let x = scale(4.0 * tooth as f64 + 0.5);
        let crossings = crossings_at_x(&result.toolpaths, x);
        assert!(crossings.iter().any(|&(_, y, _)| y > scale(2.5)), "tooth {tooth}");
    }
}

#[test]
fn test_square_with_hole_has_contour_and_hole_walls() {
    let config = WallToolPathsConfig::new(2, 0.4);
    let result = generate_wall_toolpaths(&[make_square_with_hole_mm(20.0, 6.0)], &config).unwrap();

    assert_eq!(result.toolpaths.len(), 2);
    for lines in &result.toolpaths {
        let contours = lines.iter().filter(|line| line.is_contour()).count();
        let holes = lines.iter().filter(|line| line.is_closed && !line.is_contour()).count();
        assert_eq!(contours, 1);
        assert_eq!(holes, 1);
    }
    assert_eq!(result.inner_contour.len(), 1);
    assert_eq!(result.inner_contour[0].holes.len(), 1);
}

#[test]
fn test_generation_is_deterministic() {
    let config = WallToolPathsConfig::new(3, 0.4);
    let outline = vec![make_dumbbell()];
    let first = generate_wall_toolpaths(&outline, &config).unwrap();
    let second = generate_wall_toolpaths(&outline, &config).unwrap();
    assert_eq!(first.toolpaths, second.toolpaths);
    assert_eq!(first.inner_contour, second.inner_contour);
}

#[test]
fn test_lazy_tool_paths_match_direct_generation() {
    let config = WallToolPathsConfig::new(2, 0.4);
    let outline = vec![make_square_mm(5.0, 5.0, 8.0)];
    let mut walls = WallToolPaths::new(outline.clone(), config.clone());
    let lazy = walls.tool_paths().unwrap().to_vec();
    let direct = generate_wall_toolpaths(&outline, &config).unwrap();
    assert_eq!(lazy, direct.toolpaths);
    assert_eq!(walls.inner_contour(), &direct.inner_contour[..]);
}

#[test]
fn test_order_perimeters_outer_first() {
    let config = WallToolPathsConfig::new(3, 0.4);
    let result = generate_wall_toolpaths(&[make_square_with_hole_mm(20.0, 6.0)], &config).unwrap();

    let ordered = order_perimeters(&result.toolpaths, true);
    assert_eq!(ordered.len(), result.line_count());
    let first = &ordered[0];
    assert!(first.is_external());

    let inner_first = order_perimeters(&result.toolpaths, false);
    assert_eq!(inner_first.len(), ordered.len());
    assert!(!inner_first[0].is_external());
}

#[test]
fn test_order_with_constraints_keeps_every_wall() {
    let config = WallToolPathsConfig::new(3, 0.4);
    let result = generate_wall_toolpaths(&[make_dumbbell()], &config).unwrap();

    let ordered = order_with_constraints(&result.toolpaths, true);
    assert_eq!(ordered.len(), result.line_count());
    assert_eq!(ordered[0].inset_idx, 0);
}

#[test]
fn test_config_json_file_round_trip() {
    let config = WallToolPathsConfig::new(4, 0.42)
        .with_wall_widths(0.42, 0.45)
        .with_wall_0_inset(0.05)
        .with_thin_walls(false);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("walls.json");
    config.save_to_file(&path).unwrap();
    let loaded = WallToolPathsConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);

    let mut walls = WallToolPaths::new(vec![make_square_mm(0.0, 0.0, 10.0)], loaded);
    assert_eq!(walls.generate().unwrap().len(), 4);
}

#[test]
fn test_partial_config_json_uses_defaults() {
    let config = WallToolPathsConfig::from_json(r#"{ "wall_count": 1 }"#).unwrap();
    assert_eq!(config.wall_count, 1);
    assert_eq!(config.bead_width_outer, WallToolPathsConfig::default().bead_width_outer);

    let result = generate_wall_toolpaths(&[make_square_mm(0.0, 0.0, 10.0)], &config).unwrap();
    assert_eq!(result.toolpaths.len(), 1);
}
