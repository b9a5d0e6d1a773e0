//! Keep the outer walls at their own nominal width.

use super::{Beading, BeadingParams, BeadingStrategy};
use crate::{Coord, CoordF};

/// Gives the two outermost beads the outer wall width and lets the parent
/// strategy fill the space between them.
///
/// Thicknesses below `minimum_variable_line_ratio` times the outer width
/// produce no beads at all.
#[derive(Debug)]
pub struct RedistributeBeadingStrategy {
    parent: Box<dyn BeadingStrategy>,
    params: BeadingParams,
    optimal_width_outer: Coord,
    minimum_variable_line_ratio: CoordF,
}

impl RedistributeBeadingStrategy {
    pub fn new(
        optimal_width_outer: Coord,
        minimum_variable_line_ratio: CoordF,
        parent: Box<dyn BeadingStrategy>,
    ) -> Self {
        Self {
            params: *parent.params(),
            parent,
            optimal_width_outer,
            minimum_variable_line_ratio,
        }
    }

    fn minimum_thickness(&self) -> Coord {
        (self.minimum_variable_line_ratio * self.optimal_width_outer as CoordF) as Coord
    }
}

impl BeadingStrategy for RedistributeBeadingStrategy {
    fn compute(&self, thickness: Coord, bead_count: i64) -> Beading {
        if bead_count == 0 || thickness < self.minimum_thickness() {
            return Beading::empty(thickness);
        }

        let mut ret = Beading::default();
        let inner_bead_count = bead_count - 2;
        let inner_thickness = thickness - 2 * self.optimal_width_outer;
        if inner_bead_count > 0 && inner_thickness > 0 {
            ret = self.parent.compute(inner_thickness, inner_bead_count);
            for location in &mut ret.toolpath_locations {
                *location += self.optimal_width_outer;
            }
        }

        // Outer walls around the inner ones, which may be empty
        let actual_outer_thickness = if bead_count > 2 {
            (thickness / 2).min(self.optimal_width_outer)
        } else {
            thickness / bead_count
        };
        ret.bead_widths.insert(0, actual_outer_thickness);
        ret.toolpath_locations.insert(0, actual_outer_thickness / 2);
        if bead_count > 1 {
            ret.bead_widths.push(actual_outer_thickness);
            ret.toolpath_locations.push(thickness - actual_outer_thickness / 2);
        }

        ret.total_thickness = thickness;
        ret.left_over = thickness - ret.covered_width();
        ret
    }

    fn optimal_thickness(&self, bead_count: i64) -> Coord {
        let inner_bead_count = (bead_count - 2).max(0);
        let outer_bead_count = bead_count - inner_bead_count;
        self.parent.optimal_thickness(inner_bead_count) + self.optimal_width_outer * outer_bead_count
    }

    fn transition_thickness(&self, lower_bead_count: i64) -> Coord {
        match lower_bead_count {
            0 => self.minimum_thickness(),
            1 => ((1.0 + self.parent.split_middle_threshold()) * self.optimal_width_outer as CoordF)
                as Coord,
            n => self.parent.transition_thickness(n - 2) + 2 * self.optimal_width_outer,
        }
    }

    fn optimal_bead_count(&self, thickness: Coord) -> i64 {
        if thickness < self.minimum_thickness() {
            return 0;
        }
        if thickness <= 2 * self.optimal_width_outer {
            let split = (1.0 + self.parent.split_middle_threshold()) * self.optimal_width_outer as CoordF;
            return if thickness as CoordF > split { 2 } else { 1 };
        }
        self.parent.optimal_bead_count(thickness - 2 * self.optimal_width_outer) + 2
    }

    fn params(&self) -> &BeadingParams {
        &self.params
    }

    fn name(&self) -> String {
        format!("RedistributeBeadingStrategy+{}", self.parent.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perimeter::arachne::beading::DistributedBeadingStrategy;
    use crate::scale;

    fn make_strategy(outer: f64, inner: f64) -> RedistributeBeadingStrategy {
        let parent = DistributedBeadingStrategy::new(
            BeadingParams {
                optimal_width: scale(inner),
                wall_split_middle_threshold: 0.5,
                wall_add_middle_threshold: 0.5,
                ..Default::default()
            },
            1,
        );
        RedistributeBeadingStrategy::new(scale(outer), 0.5, Box::new(parent))
    }

    #[test]
    fn test_outer_walls_keep_width() {
        let strategy = make_strategy(0.4, 0.5);
        let beading = strategy.compute(scale(1.8), 3);
        assert_eq!(beading.bead_widths, vec![scale(0.4), scale(1.0), scale(0.4)]);
        assert_eq!(beading.toolpath_locations[0], scale(0.2));
        assert_eq!(beading.toolpath_locations[1], scale(0.9));
        assert_eq!(beading.toolpath_locations[2], scale(1.6));
        assert_eq!(beading.left_over, 0);
    }

    #[test]
    fn test_thin_region_has_no_beads() {
        let strategy = make_strategy(0.4, 0.5);
        assert_eq!(strategy.optimal_bead_count(scale(0.1)), 0);
        assert!(!strategy.compute(scale(0.1), 1).has_beads());
    }

    #[test]
    fn test_bead_count_thresholds() {
        let strategy = make_strategy(0.4, 0.5);
        assert_eq!(strategy.optimal_bead_count(scale(0.3)), 1);
        assert_eq!(strategy.optimal_bead_count(scale(0.7)), 2);
        assert_eq!(strategy.optimal_bead_count(scale(1.3)), 3);
        assert_eq!(strategy.optimal_thickness(3), scale(1.3));
        assert_eq!(strategy.transition_thickness(0), scale(0.2));
        assert_eq!(strategy.transition_thickness(1), scale(0.6));
    }

    #[test]
    fn test_name_lists_chain() {
        let strategy = make_strategy(0.4, 0.5);
        assert_eq!(
            strategy.name(),
            "RedistributeBeadingStrategy+DistributedBeadingStrategy"
        );
    }
}
