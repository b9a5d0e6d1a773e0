//! Cap the number of beads.

use super::{Beading, BeadingParams, BeadingStrategy};
use crate::{scale, Coord};
use log::warn;

/// Limits the bead count to `max_bead_count`.
///
/// Regions wider than the cap keep `max_bead_count` optimal beads pushed
/// against both sides of the outline. A zero-width marker bead is inserted
/// after the innermost wall of each side; it traces the edge of the walled
/// area and becomes the inner contour.
#[derive(Debug)]
pub struct LimitedBeadingStrategy {
    parent: Box<dyn BeadingStrategy>,
    params: BeadingParams,
    max_bead_count: i64,
}

impl LimitedBeadingStrategy {
    pub fn new(max_bead_count: i64, parent: Box<dyn BeadingStrategy>) -> Self {
        if max_bead_count % 2 == 1 {
            warn!("LimitedBeadingStrategy with odd bead count {max_bead_count}");
        }
        Self {
            params: *parent.params(),
            parent,
            max_bead_count,
        }
    }

    /// Thickness just below one bead more than the cap.
    fn overflow_thickness(&self) -> Coord {
        self.parent.optimal_thickness(self.max_bead_count + 1) - scale(0.01)
    }
}

impl BeadingStrategy for LimitedBeadingStrategy {
    fn compute(&self, thickness: Coord, bead_count: i64) -> Beading {
        let half = (self.max_bead_count / 2) as usize;

        if bead_count <= self.max_bead_count {
            let mut ret = self.parent.compute(thickness, bead_count);
            let actual = ret.toolpath_locations.len() as i64;
            if actual % 2 == 0 && actual == self.max_bead_count && half > 0 {
                let location = ret.toolpath_locations[half - 1];
                let width = ret.bead_widths[half - 1];
                ret.toolpath_locations.insert(half, location + width / 2);
                ret.bead_widths.insert(half, 0);
            }
            return ret;
        }

        if bead_count != self.max_bead_count + 1 {
            warn!(
                "Too many beads: {bead_count} requested, limit is {}",
                self.max_bead_count
            );
        }

        let optimal_thickness = self.parent.optimal_thickness(self.max_bead_count);
        let mut ret = self.parent.compute(optimal_thickness, self.max_bead_count);
        let count = ret.toolpath_locations.len();
        ret.left_over += thickness - ret.total_thickness;
        ret.total_thickness = thickness;

        // Enforce symmetry
        if count % 2 == 1 {
            ret.toolpath_locations[count / 2] = thickness / 2;
            ret.bead_widths[count / 2] = thickness - optimal_thickness;
        }
        for bead_idx in 0..(count + 1) / 2 {
            ret.toolpath_locations[count - 1 - bead_idx] = thickness - ret.toolpath_locations[bead_idx];
        }

        if half == 0 || count < half {
            return ret;
        }

        // Zero-width markers at the edge of the walled area on both sides
        let location = ret.toolpath_locations[half - 1];
        let width = ret.bead_widths[half - 1];
        ret.toolpath_locations.insert(half, location + width / 2);
        ret.bead_widths.insert(half, 0);

        let opposite_bead = count - (half - 1);
        if opposite_bead < ret.toolpath_locations.len() {
            let location = ret.toolpath_locations[opposite_bead];
            let width = ret.bead_widths[opposite_bead];
            ret.toolpath_locations.insert(opposite_bead, location - width / 2);
            ret.bead_widths.insert(opposite_bead, 0);
        }
        ret
    }

    fn optimal_thickness(&self, bead_count: i64) -> Coord {
        if bead_count <= self.max_bead_count {
            self.parent.optimal_thickness(bead_count)
        } else {
            // One metre: effectively unreachable
            scale(1000.0)
        }
    }

    fn transition_thickness(&self, lower_bead_count: i64) -> Coord {
        if lower_bead_count < self.max_bead_count {
            self.parent.transition_thickness(lower_bead_count)
        } else if lower_bead_count == self.max_bead_count {
            self.overflow_thickness()
        } else {
            scale(900.0)
        }
    }

    fn optimal_bead_count(&self, thickness: Coord) -> i64 {
        let parent_bead_count = self.parent.optimal_bead_count(thickness);
        if parent_bead_count <= self.max_bead_count {
            parent_bead_count
        } else if parent_bead_count == self.max_bead_count + 1 && thickness < self.overflow_thickness() {
            self.max_bead_count
        } else {
            self.max_bead_count + 1
        }
    }

    fn transitioning_length(&self, lower_bead_count: i64) -> Coord {
        self.parent.transitioning_length(lower_bead_count)
    }

    fn transition_anchor_pos(&self, lower_bead_count: i64) -> f64 {
        self.parent.transition_anchor_pos(lower_bead_count)
    }

    fn nonlinear_thicknesses(&self, lower_bead_count: i64) -> Vec<Coord> {
        self.parent.nonlinear_thicknesses(lower_bead_count)
    }

    fn params(&self) -> &BeadingParams {
        &self.params
    }

    fn name(&self) -> String {
        format!("LimitedBeadingStrategy+{}", self.parent.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perimeter::arachne::beading::DistributedBeadingStrategy;

    fn make_strategy(max_bead_count: i64) -> LimitedBeadingStrategy {
        let parent = DistributedBeadingStrategy::new(
            BeadingParams {
                optimal_width: scale(0.4),
                wall_split_middle_threshold: 0.5,
                wall_add_middle_threshold: 0.5,
                ..Default::default()
            },
            1,
        );
        LimitedBeadingStrategy::new(max_bead_count, Box::new(parent))
    }

    #[test]
    fn test_bead_count_capped() {
        let strategy = make_strategy(4);
        assert_eq!(strategy.optimal_bead_count(scale(1.2)), 3);
        assert_eq!(strategy.optimal_bead_count(scale(1.7)), 4);
        assert_eq!(strategy.optimal_bead_count(scale(5.0)), 5);
    }

    #[test]
    fn test_marker_bead_at_full_count() {
        let strategy = make_strategy(4);
        let beading = strategy.compute(scale(1.6), 4);
        assert_eq!(beading.bead_count(), 5);
        assert_eq!(beading.bead_widths[2], 0);
        assert_eq!(beading.toolpath_locations[2], scale(0.8));
    }

    #[test]
    fn test_wide_region_keeps_walls_on_both_sides() {
        let strategy = make_strategy(4);
        let beading = strategy.compute(scale(3.0), 5);
        // Two walls per side plus two zero-width markers
        assert_eq!(beading.bead_count(), 6);
        assert_eq!(beading.bead_widths.iter().filter(|&&w| w == 0).count(), 2);
        assert_eq!(beading.toolpath_locations[0], scale(0.2));
        assert_eq!(beading.toolpath_locations[1], scale(0.6));
        assert_eq!(beading.toolpath_locations[2], scale(0.8));
        assert_eq!(beading.toolpath_locations[3], scale(2.2));
        assert_eq!(beading.toolpath_locations[4], scale(2.4));
        assert_eq!(beading.toolpath_locations[5], scale(2.8));
        assert_eq!(beading.left_over, scale(1.4));
    }

    #[test]
    fn test_transition_thickness_at_cap() {
        let strategy = make_strategy(4);
        assert_eq!(strategy.transition_thickness(4), scale(2.0) - scale(0.01));
        assert_eq!(strategy.optimal_thickness(6), scale(1000.0));
    }
}
