//! Joining toolpath fragments into longer polylines and closed polygons.

use super::line::{ExtrusionLine, VariableWidthLines};
use crate::geometry::SparsePointGrid;
use crate::Coord;
use log::trace;

/// Bias applied to the distance of a candidate that would close the chain.
/// Even chains prefer closing, odd chains prefer continuing.
const CLOSING_BIAS: Coord = 10;

/// An endpoint of one of the input lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Endpoint {
    line_idx: usize,
    junction_idx: usize,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    endpoint: Endpoint,
    distance: Coord,
    is_closing: bool,
}

/// Greedy nearest-endpoint stitcher for [`ExtrusionLine`]s.
pub struct PolylineStitcher;

impl PolylineStitcher {
    /// Stitch `lines` whose endpoints lie within `max_stitch_distance` of
    /// each other. Returns the open polylines and the closed polygons.
    ///
    /// Chains only close once they are longer than three times the stitch
    /// distance. Lines are only joined to lines of the same oddness, and
    /// only odd lines may be reversed to fit. Closed polygons do not repeat
    /// their first junction.
    pub fn stitch(
        lines: &[ExtrusionLine],
        max_stitch_distance: Coord,
        snap_distance: Coord,
    ) -> (VariableWidthLines, VariableWidthLines) {
        let mut result_lines = VariableWidthLines::new();
        let mut result_polygons = VariableWidthLines::new();
        if lines.is_empty() {
            return (result_lines, result_polygons);
        }

        let mut grid = SparsePointGrid::new(max_stitch_distance);
        for (line_idx, line) in lines.iter().enumerate() {
            let (Some(first), Some(last)) = (line.first(), line.last()) else {
                continue;
            };
            grid.insert(first.position, Endpoint { line_idx, junction_idx: 0 });
            if line.len() > 1 {
                grid.insert(
                    last.position,
                    Endpoint {
                        line_idx,
                        junction_idx: line.len() - 1,
                    },
                );
            }
        }

        let mut processed = vec![false; lines.len()];
        for line_idx in 0..lines.len() {
            if processed[line_idx] {
                continue;
            }
            processed[line_idx] = true;
            let mut chain = lines[line_idx].clone();
            if chain.is_empty() {
                continue;
            }
            let should_close = !chain.is_odd;
            let mut closed = false;
            let mut reverse_pass = false;

            for pass in [false, true] {
                reverse_pass = pass;
                if reverse_pass {
                    chain.reverse();
                }
                let mut chain_length = chain.length();

                loop {
                    let Some(candidate) = Self::closest_candidate(
                        &grid,
                        lines,
                        &processed,
                        &chain,
                        chain_length,
                        reverse_pass,
                        should_close,
                        max_stitch_distance,
                        snap_distance,
                    ) else {
                        break;
                    };
                    if candidate.is_closing {
                        closed = true;
                        break;
                    }

                    let endpoint = candidate.endpoint;
                    processed[endpoint.line_idx] = true;
                    let mut next = lines[endpoint.line_idx].clone();
                    if endpoint.junction_idx != 0 {
                        next.reverse();
                    }
                    let skip_first = match (chain.last(), next.first()) {
                        (Some(back), Some(front)) => back.coincides_with(front, snap_distance),
                        _ => false,
                    };
                    chain_length += candidate.distance.max(0) + next.length();
                    chain.junctions.extend(next.junctions.into_iter().skip(usize::from(skip_first)));
                }
                if closed {
                    break;
                }
            }

            if closed {
                if reverse_pass {
                    chain.reverse();
                }
                trace!("Stitched a polygon of {} junctions on inset {}", chain.len(), chain.inset_idx);
                result_polygons.push(chain);
            } else {
                if reverse_pass && !chain.is_odd {
                    chain.reverse();
                }
                result_lines.push(chain);
            }
        }

        (result_lines, result_polygons)
    }

    #[allow(clippy::too_many_arguments)]
    fn closest_candidate(
        grid: &SparsePointGrid<Endpoint>,
        lines: &[ExtrusionLine],
        processed: &[bool],
        chain: &ExtrusionLine,
        chain_length: Coord,
        reverse_pass: bool,
        should_close: bool,
        max_stitch_distance: Coord,
        snap_distance: Coord,
    ) -> Option<Candidate> {
        let (Some(front), Some(back)) = (chain.first(), chain.last()) else {
            return None;
        };
        let from = back.position;
        let chain_front = front.position;
        let mut closest: Option<Candidate> = None;

        grid.process_nearby(from, max_stitch_distance, |location, endpoint| {
            let mut distance = (location - from).length_coord();
            if distance > max_stitch_distance {
                return true;
            }
            let mut is_closing = false;
            if (location - chain_front).shorter_than(snap_distance) {
                if chain_length + distance < 3 * max_stitch_distance || chain.len() <= 2 {
                    return true;
                }
                is_closing = true;
                distance += if should_close { -CLOSING_BIAS } else { CLOSING_BIAS };
            } else if processed[endpoint.line_idx] {
                return true;
            }

            let nearby = &lines[endpoint.line_idx];
            if !is_closing {
                let would_be_reversed = (endpoint.junction_idx != 0) != reverse_pass;
                if would_be_reversed && !nearby.is_odd {
                    return true;
                }
                if nearby.is_odd != chain.is_odd {
                    return true;
                }
            }

            if closest.map_or(true, |c| distance < c.distance) {
                closest = Some(Candidate {
                    endpoint: *endpoint,
                    distance,
                    is_closing,
                });
            }
            distance >= snap_distance
        });

        closest
    }
}
