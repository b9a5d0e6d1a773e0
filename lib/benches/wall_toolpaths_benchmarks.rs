//! Wall toolpath benchmarks
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use slicer_walls::{generate_wall_toolpaths, ExPolygon, Point, Polygon, WallToolPathsConfig};

fn square(size: f64) -> ExPolygon {
    ExPolygon::rectangle(Point::zero(), Point::new_scale(size, size))
}

fn dumbbell() -> ExPolygon {
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

fn wall_toolpaths_benchmark(c: &mut Criterion) {
    let config = WallToolPathsConfig::new(3, 0.45);

    let outline = vec![square(20.0)];
    c.bench_function("wall_toolpaths_square_20mm", |b| {
        b.iter(|| generate_wall_toolpaths(black_box(&outline), black_box(&config)))
    });

    let outline = vec![dumbbell()];
    c.bench_function("wall_toolpaths_dumbbell", |b| {
        b.iter(|| generate_wall_toolpaths(black_box(&outline), black_box(&config)))
    });
}

criterion_group!(benches, wall_toolpaths_benchmark);
criterion_main!(benches);
