//! Move the outer wall inward.

use super::{Beading, BeadingParams, BeadingStrategy};
use crate::Coord;

/// Shifts the outermost bead inward by `outer_wall_offset`, never past the
/// middle of the region. Single beads are left in place.
#[derive(Debug)]
pub struct OuterWallInsetBeadingStrategy {
    parent: Box<dyn BeadingStrategy>,
    params: BeadingParams,
    outer_wall_offset: Coord,
}

impl OuterWallInsetBeadingStrategy {
    pub fn new(outer_wall_offset: Coord, parent: Box<dyn BeadingStrategy>) -> Self {
        Self {
            params: *parent.params(),
            parent,
            outer_wall_offset,
        }
    }
}

impl BeadingStrategy for OuterWallInsetBeadingStrategy {
    fn compute(&self, thickness: Coord, bead_count: i64) -> Beading {
        let mut ret = self.parent.compute(thickness, bead_count);

        // Zero-width marker beads do not count
        let actual_count = ret.bead_widths.iter().filter(|&&w| w > 0).count();
        if actual_count < 2 {
            return ret;
        }
        ret.toolpath_locations[0] = (ret.toolpath_locations[0] + self.outer_wall_offset).min(thickness / 2);
        ret
    }

    fn optimal_thickness(&self, bead_count: i64) -> Coord {
        self.parent.optimal_thickness(bead_count)
    }

    fn transition_thickness(&self, lower_bead_count: i64) -> Coord {
        self.parent.transition_thickness(lower_bead_count)
    }

    fn optimal_bead_count(&self, thickness: Coord) -> i64 {
        self.parent.optimal_bead_count(thickness)
    }

    fn transitioning_length(&self, lower_bead_count: i64) -> Coord {
        self.parent.transitioning_length(lower_bead_count)
    }

    fn nonlinear_thicknesses(&self, lower_bead_count: i64) -> Vec<Coord> {
        self.parent.nonlinear_thicknesses(lower_bead_count)
    }

    fn params(&self) -> &BeadingParams {
        &self.params
    }

    fn name(&self) -> String {
        format!("OuterWallInsetBeadingStrategy+{}", self.parent.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perimeter::arachne::beading::DistributedBeadingStrategy;
    use crate::scale;

    fn make_strategy(offset: f64) -> OuterWallInsetBeadingStrategy {
        let parent = DistributedBeadingStrategy::new(
            BeadingParams {
                optimal_width: scale(0.4),
                ..Default::default()
            },
            1,
        );
        OuterWallInsetBeadingStrategy::new(scale(offset), Box::new(parent))
    }

    #[test]
    fn test_outer_wall_moves_inward() {
        let strategy = make_strategy(0.05);
        let beading = strategy.compute(scale(0.8), 2);
        assert_eq!(beading.toolpath_locations[0], scale(0.25));
        assert_eq!(beading.toolpath_locations[1], scale(0.6));
    }

    #[test]
    fn test_inset_capped_at_middle() {
        let strategy = make_strategy(1.0);
        let beading = strategy.compute(scale(0.8), 2);
        assert_eq!(beading.toolpath_locations[0], scale(0.4));
    }

    #[test]
    fn test_single_bead_untouched() {
        let strategy = make_strategy(0.05);
        let beading = strategy.compute(scale(0.4), 1);
        assert_eq!(beading.toolpath_locations, vec![scale(0.2)]);
    }
}
