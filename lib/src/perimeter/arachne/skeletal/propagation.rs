//! Beadings on every node.
//!
//! Nodes with a known bead count get a beading computed for their own
//! thickness. From there beadings are pushed up into the nodes above
//! unlabelled regions, and then down towards the outline, blending into the
//! beading already present over the propagation distance.

use super::graph::{BeadingPropagation, EdgeId, NodeId};
use super::SkeletalTrapezoidation;
use crate::perimeter::arachne::beading::Beading;
use crate::{scale, Coord};
use log::warn;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::rc::Rc;

/// Edges visited at most when searching a nearby beading.
const BEAD_SEARCH_MAX: usize = 1000;

impl SkeletalTrapezoidation<'_> {
    /// Upward edges between two ribs, highest first.
    pub(super) fn upward_quad_mids(&self) -> Vec<EdgeId> {
        let mut mids: Vec<EdgeId> = self
            .graph
            .edge_ids()
            .into_iter()
            .filter(|&e| self.graph.prev(e).is_some() && self.graph.next(e).is_some() && self.graph.is_upward(e))
            .collect();

        // Of two edges ending at the same radius, a flat one may lie above the
        // other and goes first
        mids.sort_by_cached_key(|&e| {
            let to_r = self.graph.r(self.graph.to(e));
            let is_flat = self.graph.r(self.graph.from(e)) == to_r;
            let dist_from_up = if is_flat {
                let up = self.graph.dist_to_go_up(e).unwrap_or(Coord::MAX);
                let down = self
                    .graph
                    .twin(e)
                    .and_then(|t| self.graph.dist_to_go_up(t))
                    .unwrap_or(Coord::MAX);
                up.min(down).saturating_sub(self.graph.length(e))
            } else {
                0
            };
            (Reverse(to_r), !is_flat, dist_from_up)
        });
        mids
    }

    /// Compute the beading of every node with a bead count.
    pub(super) fn store_node_beadings(&mut self) {
        for node in self.graph.node_ids() {
            let data = &self.graph.node(node).data;
            if data.bead_count <= 0 {
                continue;
            }
            let thickness = data.distance_to_boundary * 2;
            let beading = if data.transition_ratio == 0.0 {
                self.strategy.compute(thickness, data.bead_count)
            } else {
                let low = self.strategy.compute(thickness, data.bead_count);
                let high = self.strategy.compute(thickness, data.bead_count + 1);
                interpolate(&low, 1.0 - data.transition_ratio, &high)
            };
            if beading.total_thickness != thickness {
                warn!("Node beading does not match the node thickness");
            }
            self.graph.node_mut(node).data.beading = Some(Rc::new(BeadingPropagation::new(beading)));
        }
    }

    /// Copy beadings upward into nodes without a bead count, lowest first.
    pub(super) fn propagate_beadings_upward(&mut self, upward_quad_mids: &[EdgeId]) {
        for &upward_edge in upward_quad_mids.iter().rev() {
            let from = self.graph.from(upward_edge);
            let to = self.graph.to(upward_edge);
            if self.graph.bead_count(to) >= 0 {
                continue;
            }
            let Some(lower) = self.graph.node(from).data.beading.clone() else {
                continue;
            };
            if self.graph.node(to).data.beading.is_some() {
                continue;
            }
            let mut upper = (*lower).clone();
            upper.dist_to_bottom_source += self.graph.length(upward_edge);
            upper.is_upward_propagated_only = true;
            self.graph.node_mut(to).data.beading = Some(Rc::new(upper));
        }
    }

    /// Push beadings down the non-central edges, highest first.
    pub(super) fn propagate_beadings_downward(&mut self, upward_quad_mids: &[EdgeId]) {
        for &upward_quad_mid in upward_quad_mids {
            if self.graph.is_central(upward_quad_mid) {
                continue;
            }
            let from = self.graph.from(upward_quad_mid);
            let to = self.graph.to(upward_quad_mid);
            // Along a flat edge, go from the known beading to the unknown one
            let edge_to_peak = if self.graph.r(from) == self.graph.r(to)
                && self.graph.node(from).data.beading.is_some()
                && self.graph.node(to).data.beading.is_none()
            {
                self.graph.twin(upward_quad_mid).unwrap_or(upward_quad_mid)
            } else {
                upward_quad_mid
            };
            self.propagate_beading_down(edge_to_peak);
        }
    }

    fn propagate_beading_down(&mut self, edge_to_peak: EdgeId) {
        let length = self.graph.length(edge_to_peak);
        let from = self.graph.from(edge_to_peak);
        let to = self.graph.to(edge_to_peak);
        let Some(top) = self.get_or_create_beading(to) else {
            return;
        };
        if top.beading.total_thickness < self.graph.r(to) * 2 {
            warn!("Top bead is beyond the center of the total width");
        }

        let from_r = self.graph.r(from);
        let propagated = match self.graph.node(from).data.beading.as_deref() {
            None => {
                let mut propagated = (*top).clone();
                propagated.dist_from_top_source += length;
                propagated
            }
            Some(bottom) => {
                let total_dist = top.dist_from_top_source + length + bottom.dist_to_bottom_source;
                let blend_dist = total_dist.min(self.params.beading_propagation_transition_dist);
                let ratio_of_top = if blend_dist > 0 {
                    (bottom.dist_to_bottom_source as f64 / blend_dist as f64).max(0.0)
                } else {
                    1.0
                };
                if ratio_of_top >= 1.0 {
                    let mut propagated = (*top).clone();
                    propagated.dist_from_top_source += length;
                    propagated
                } else {
                    let merged = interpolate_switching(&top.beading, ratio_of_top, &bottom.beading, from_r);
                    BeadingPropagation::new(merged)
                }
            }
        };
        if propagated.beading.total_thickness < from_r * 2 {
            warn!("Propagated bead is beyond the center of the total width");
        }
        self.graph.node_mut(from).data.beading = Some(Rc::new(propagated));
    }

    /// The beading of `node`, computing one if it has none yet. Nodes without
    /// a bead count borrow the beading of a node close by, or get the bead
    /// count of the thickest point their edges reach.
    pub(super) fn get_or_create_beading(&mut self, node: NodeId) -> Option<Rc<BeadingPropagation>> {
        if let Some(beading) = &self.graph.node(node).data.beading {
            return Some(Rc::clone(beading));
        }
        if self.graph.bead_count(node) == -1 {
            if let Some(nearest) = self.get_nearest_beading(node, scale(0.1)) {
                return Some(nearest);
            }

            let outgoing = self.graph.outgoing_partial(node);
            if !outgoing.iter().any(|&e| self.graph.is_central(e)) {
                warn!("Unknown beading for non-central node");
            }
            let dist = outgoing
                .iter()
                .map(|&e| self.graph.r(self.graph.to(e)) + self.graph.length(e))
                .min()?;
            let bead_count = self.strategy.optimal_bead_count(dist * 2);
            self.graph.node_mut(node).data.bead_count = bead_count;
        }

        let thickness = self.graph.r(node) * 2;
        let beading = Rc::new(BeadingPropagation::new(
            self.strategy.compute(thickness, self.graph.bead_count(node)),
        ));
        self.graph.node_mut(node).data.beading = Some(Rc::clone(&beading));
        Some(beading)
    }

    /// Closest beading within `max_dist` along the skeleton.
    fn get_nearest_beading(&self, node: NodeId, max_dist: Coord) -> Option<Rc<BeadingPropagation>> {
        let mut further_edges = BinaryHeap::new();
        for outgoing in self.graph.outgoing_partial(node) {
            further_edges.push(Reverse((self.graph.length(outgoing), outgoing)));
        }

        for _ in 0..BEAD_SEARCH_MAX {
            let Reverse((dist, edge_to)) = further_edges.pop()?;
            if dist > max_dist {
                return None;
            }
            if let Some(beading) = &self.graph.node(self.graph.to(edge_to)).data.beading {
                return Some(Rc::clone(beading));
            }
            for further in self.graph.outgoing_after(edge_to) {
                further_edges.push(Reverse((dist + self.graph.length(further), further)));
            }
        }
        None
    }
}

/// Blend two beadings, `ratio_left_to_whole` of `left` and the rest of
/// `right`. Zero-width markers stay zero-width.
pub(super) fn interpolate(left: &Beading, ratio_left_to_whole: f64, right: &Beading) -> Beading {
    let ratio_right_to_whole = 1.0 - ratio_left_to_whole;
    let mut ret = if left.total_thickness > right.total_thickness {
        left.clone()
    } else {
        right.clone()
    };
    let common = left.bead_widths.len().min(right.bead_widths.len());
    for inset_idx in 0..common {
        ret.bead_widths[inset_idx] = if left.bead_widths[inset_idx] == 0 || right.bead_widths[inset_idx] == 0 {
            0
        } else {
            (ratio_left_to_whole * left.bead_widths[inset_idx] as f64
                + ratio_right_to_whole * right.bead_widths[inset_idx] as f64) as Coord
        };
        ret.toolpath_locations[inset_idx] = (ratio_left_to_whole * left.toolpath_locations[inset_idx] as f64
            + ratio_right_to_whole * right.toolpath_locations[inset_idx] as f64)
            as Coord;
    }
    ret
}

/// Like [`interpolate`], but when the blend would move the bead just inside
/// `switching_radius` past it, shift the ratio so that the bead stays on
/// its side.
pub(super) fn interpolate_switching(
    left: &Beading,
    ratio_left_to_whole: f64,
    right: &Beading,
    switching_radius: Coord,
) -> Beading {
    let ret = interpolate(left, ratio_left_to_whole, right);

    let Some(next_inset_idx) = left
        .toolpath_locations
        .iter()
        .rposition(|&location| switching_radius > location)
    else {
        // Only one inset, nothing to adjust
        return ret;
    };
    if next_inset_idx + 1 == left.toolpath_locations.len() {
        return ret;
    }
    if next_inset_idx >= ret.toolpath_locations.len() || next_inset_idx >= right.toolpath_locations.len() {
        return ret;
    }
    if ret.toolpath_locations[next_inset_idx] > switching_radius {
        // One inset disappeared between left and the blend
        let l = left.toolpath_locations[next_inset_idx];
        let r = right.toolpath_locations[next_inset_idx];
        if l == r {
            return ret;
        }
        let new_ratio = ((switching_radius - r) as f64 / (l - r) as f64 + 0.1).min(1.0);
        return interpolate(left, new_ratio, right);
    }
    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beading(thickness: Coord, widths: &[Coord], locations: &[Coord]) -> Beading {
        Beading {
            total_thickness: thickness,
            bead_widths: widths.to_vec(),
            toolpath_locations: locations.to_vec(),
            left_over: 0,
        }
    }

    #[test]
    fn test_interpolate_halfway() {
        let left = beading(1000, &[400, 400], &[200, 800]);
        let right = beading(800, &[300, 300], &[150, 650]);
        let ret = interpolate(&left, 0.5, &right);
        assert_eq!(ret.total_thickness, 1000);
        assert_eq!(ret.bead_widths, vec![350, 350]);
        assert_eq!(ret.toolpath_locations, vec![175, 725]);
    }

    #[test]
    fn test_interpolate_keeps_markers() {
        let left = beading(1000, &[400, 0, 400], &[200, 500, 800]);
        let right = beading(1000, &[300, 400, 300], &[150, 500, 850]);
        let ret = interpolate(&left, 0.5, &right);
        assert_eq!(ret.bead_widths[1], 0);
        assert_eq!(ret.bead_widths[0], 350);
    }

    #[test]
    fn test_interpolate_takes_extra_beads_of_thicker() {
        let left = beading(1200, &[400, 400, 400], &[200, 600, 1000]);
        let right = beading(800, &[400, 400], &[200, 600]);
        let ret = interpolate(&left, 0.0, &right);
        assert_eq!(ret.bead_widths.len(), 3);
        assert_eq!(ret.toolpath_locations[2], 1000);
        assert_eq!(ret.toolpath_locations[1], 600);
    }

    #[test]
    fn test_interpolate_switching_keeps_bead_below_radius() {
        let left = beading(2000, &[400, 400, 400, 400], &[200, 600, 1400, 1800]);
        let right = beading(2000, &[400, 400, 400, 400], &[200, 1000, 1000, 1800]);
        // A plain blend would put the second bead at 900, past the switching
        // radius of 700
        let plain = interpolate(&left, 0.25, &right);
        assert!(plain.toolpath_locations[1] > 700);
        let ret = interpolate_switching(&left, 0.25, &right, 700);
        assert!(ret.toolpath_locations[1] < plain.toolpath_locations[1]);
    }
}
