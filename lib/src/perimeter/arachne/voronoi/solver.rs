//! Exact placement of Voronoi vertices.
//!
//! The triangulation only tells which three sites meet at a vertex and roughly
//! where. The position is recovered from the sites themselves: every segment
//! contributes `n·x - r = n·a`, every segment endpoint that is also a point site
//! pins the vertex to the perpendicular through it, and pairs of point sites
//! contribute their bisector. Equations are assembled in a frame centred on
//! the approximate position to keep the squared terms small.

use super::{Site, VoronoiSources};
use crate::geometry::PointF;

/// One linear equation `a·x + b·y + c·r = d`.
type Row = [f64; 4];

const RANK_EPSILON: f64 = 1e-9;

fn normalized(row: Row) -> Row {
    let norm = (row[0] * row[0] + row[1] * row[1] + row[2] * row[2]).sqrt();
    if norm == 0.0 {
        return row;
    }
    [row[0] / norm, row[1] / norm, row[2] / norm, row[3] / norm]
}

fn det3(a: &Row, b: &Row, c: &Row) -> f64 {
    a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
        + a[2] * (b[0] * c[1] - b[1] * c[0])
}

fn cross3(a: &Row, b: &Row) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn solve3(a: &Row, b: &Row, c: &Row) -> [f64; 3] {
    let det = det3(a, b, c);
    let replace = |col: usize| -> f64 {
        let mut m = [*a, *b, *c];
        for row in m.iter_mut() {
            row[col] = row[3];
        }
        det3(&m[0], &m[1], &m[2])
    };
    [replace(0) / det, replace(1) / det, replace(2) / det]
}

/// Minimum-norm solution of two equations in three unknowns.
fn particular2(a: &Row, b: &Row) -> Option<[f64; 3]> {
    let g00 = a[0] * a[0] + a[1] * a[1] + a[2] * a[2];
    let g01 = a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
    let g11 = b[0] * b[0] + b[1] * b[1] + b[2] * b[2];
    let det = g00 * g11 - g01 * g01;
    if det.abs() < RANK_EPSILON {
        return None;
    }
    let l0 = (a[3] * g11 - b[3] * g01) / det;
    let l1 = (b[3] * g00 - a[3] * g01) / det;
    Some([
        a[0] * l0 + b[0] * l1,
        a[1] * l0 + b[1] * l1,
        a[2] * l0 + b[2] * l1,
    ])
}

/// Solve the position and radius of the vertex where `sites` meet.
///
/// `approx` and `approx_radius` come from the sampled triangulation. Returns
/// `None` when the system is degenerate or the solution lands further than
/// `max_shift` from the approximation, in which case the caller keeps the
/// approximation.
pub(super) fn solve_vertex(
    sites: &[Site; 3],
    sources: &VoronoiSources,
    approx: PointF,
    approx_radius: f64,
    max_shift: f64,
) -> Option<(PointF, f64)> {
    let local = |i: usize| sources.point(i).to_pointf() - approx;

    let mut rows: Vec<Row> = Vec::with_capacity(6);
    let mut point_sites: Vec<PointF> = Vec::with_capacity(3);

    for site in sites {
        match *site {
            Site::Segment(k) => {
                let (from, to) = sources.segment_indices(k);
                let a = local(from);
                let t = (local(to) - a).normalize();
                let n = t.perp();
                rows.push(normalized([n.x, n.y, -1.0, n.dot(&a)]));
            }
            Site::Point(i) => point_sites.push(local(i)),
        }
    }

    for (idx, site) in sites.iter().enumerate() {
        let Site::Point(i) = *site else {
            continue;
        };
        let p = local(i);
        for other in sites.iter() {
            if let Site::Segment(k) = *other {
                if sources.segment_touches_point(k, i) {
                    let (from, to) = sources.segment_indices(k);
                    let t = (local(to) - local(from)).normalize();
                    rows.push(normalized([t.x, t.y, 0.0, t.dot(&p)]));
                }
            }
        }
        for other in sites.iter().skip(idx + 1) {
            if let Site::Point(j) = *other {
                let q = local(j);
                let d = q - p;
                rows.push(normalized([
                    2.0 * d.x,
                    2.0 * d.y,
                    0.0,
                    q.length_squared() - p.length_squared(),
                ]));
            }
        }
    }

    let solution = solve_rows(&rows, &point_sites, approx_radius)?;
    let (x, y, r) = (solution[0], solution[1], solution[2]);
    if !(x.is_finite() && y.is_finite() && r.is_finite()) || r < -1.0 {
        return None;
    }
    if (x * x + y * y).sqrt() > max_shift {
        return None;
    }
    Some((PointF::new(x, y) + approx, r.max(0.0)))
}

fn solve_rows(rows: &[Row], point_sites: &[PointF], approx_radius: f64) -> Option<[f64; 3]> {
    // Best conditioned triple
    let mut best: Option<(f64, [usize; 3])> = None;
    for i in 0..rows.len() {
        for j in i + 1..rows.len() {
            for k in j + 1..rows.len() {
                let det = det3(&rows[i], &rows[j], &rows[k]).abs();
                if best.map_or(true, |(d, _)| det > d) {
                    best = Some((det, [i, j, k]));
                }
            }
        }
    }
    if let Some((det, [i, j, k])) = best {
        if det > RANK_EPSILON {
            return Some(solve3(&rows[i], &rows[j], &rows[k]));
        }
    }

    // Rank two: intersect the solution line with a point site's distance cone
    let mut best_pair: Option<(f64, [usize; 2], [f64; 3])> = None;
    for i in 0..rows.len() {
        for j in i + 1..rows.len() {
            let dir = cross3(&rows[i], &rows[j]);
            let len = (dir[0] * dir[0] + dir[1] * dir[1] + dir[2] * dir[2]).sqrt();
            if best_pair.as_ref().map_or(true, |(l, _, _)| len > *l) {
                best_pair = Some((len, [i, j], dir));
            }
        }
    }
    let (len, [i, j], dir) = best_pair?;
    if len < RANK_EPSILON {
        return None;
    }
    let dir = [dir[0] / len, dir[1] / len, dir[2] / len];
    let x0 = particular2(&rows[i], &rows[j])?;
    let p = point_sites.first()?;

    let q = [x0[0] - p.x, x0[1] - p.y, x0[2]];
    let a = dir[0] * dir[0] + dir[1] * dir[1] - dir[2] * dir[2];
    let b = 2.0 * (q[0] * dir[0] + q[1] * dir[1] - q[2] * dir[2]);
    let c = q[0] * q[0] + q[1] * q[1] - q[2] * q[2];

    let roots: Vec<f64> = if a.abs() < RANK_EPSILON {
        if b.abs() < RANK_EPSILON {
            return None;
        }
        vec![-c / b]
    } else {
        let mut disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            // Tangent within rounding
            if disc < -1e-9 * b * b.max(1.0) {
                return None;
            }
            disc = 0.0;
        }
        let sqrt_disc = disc.sqrt();
        vec![(-b + sqrt_disc) / (2.0 * a), (-b - sqrt_disc) / (2.0 * a)]
    };

    roots
        .into_iter()
        .map(|s| [x0[0] + s * dir[0], x0[1] + s * dir[1], x0[2] + s * dir[2]])
        .filter(|x| x[2] >= -1.0)
        .min_by(|u, v| {
            let du = u[0] * u[0] + u[1] * u[1] + (u[2] - approx_radius).powi(2);
            let dv = v[0] * v[0] + v[1] * v[1] + (v[2] - approx_radius).powi(2);
            du.total_cmp(&dv)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Polygon};
    use crate::scale;

    fn rectangle_sources(w: f64, h: f64) -> VoronoiSources {
        let rect = Polygon::rectangle(Point::zero(), Point::new_scale(w, h));
        VoronoiSources::from_polygons(&[rect])
    }

    #[test]
    fn test_three_segments() {
        // Bottom, right and top edge of a 10 x 0.5 rectangle
        let sources = rectangle_sources(10.0, 0.5);
        let sites = [
            Site::Segment(0),
            Site::Segment(1),
            Site::Segment(2),
        ];
        let approx = PointF::new(scale(9.7) as f64, scale(0.24) as f64);
        let (p, r) = solve_vertex(&sites, &sources, approx, scale(0.24) as f64, 1e9).unwrap();
        assert!((p.x - scale(9.75) as f64).abs() < 1.0);
        assert!((p.y - scale(0.25) as f64).abs() < 1.0);
        assert!((r - scale(0.25) as f64).abs() < 1.0);
    }

    #[test]
    fn test_point_and_two_segments() {
        // L-shape with a reflex vertex at (5, 5)
        let poly = Polygon::from_points(vec![
            Point::new_scale(0.0, 0.0),
            Point::new_scale(10.0, 0.0),
            Point::new_scale(10.0, 5.0),
            Point::new_scale(5.0, 5.0),
            Point::new_scale(5.0, 10.0),
            Point::new_scale(0.0, 10.0),
        ]);
        let sources = VoronoiSources::from_polygons(&[poly]);
        assert!(sources.is_reflex(3));
        // Reflex point, the bottom edge and the left edge
        let sites = [
            Site::Point(3),
            Site::Segment(0),
            Site::Segment(5),
        ];
        let approx = PointF::new(scale(2.0) as f64, scale(2.0) as f64);
        let (p, r) = solve_vertex(&sites, &sources, approx, scale(2.0) as f64, 1e9).unwrap();
        // Equidistant from x = 0, y = 0 and (5, 5)
        let d_point = ((p.x - scale(5.0) as f64).powi(2) + (p.y - scale(5.0) as f64).powi(2)).sqrt();
        assert!((p.x - r).abs() < 1.0);
        assert!((p.y - r).abs() < 1.0);
        assert!((d_point - r).abs() < 1.0);
    }

    #[test]
    fn test_secondary_endpoint() {
        let poly = Polygon::from_points(vec![
            Point::new_scale(0.0, 0.0),
            Point::new_scale(10.0, 0.0),
            Point::new_scale(10.0, 5.0),
            Point::new_scale(5.0, 5.0),
            Point::new_scale(5.0, 10.0),
            Point::new_scale(0.0, 10.0),
        ]);
        let sources = VoronoiSources::from_polygons(&[poly]);
        // Reflex point (5, 5), the edge ending in it and the bottom edge
        let sites = [
            Site::Point(3),
            Site::Segment(2),
            Site::Segment(0),
        ];
        let approx = PointF::new(scale(5.1) as f64, scale(2.4) as f64);
        let (p, r) = solve_vertex(&sites, &sources, approx, scale(2.5) as f64, 1e9).unwrap();
        assert!((p.x - scale(5.0) as f64).abs() < 1.0);
        assert!((p.y - scale(2.5) as f64).abs() < 1.0);
        assert!((r - scale(2.5) as f64).abs() < 1.0);
    }

    #[test]
    fn test_rejects_far_solution() {
        let sources = rectangle_sources(10.0, 0.5);
        let sites = [
            Site::Segment(0),
            Site::Segment(1),
            Site::Segment(2),
        ];
        let approx = PointF::new(scale(2.0) as f64, scale(0.25) as f64);
        assert!(solve_vertex(&sites, &sources, approx, scale(0.25) as f64, scale(0.1) as f64).is_none());
    }
}
