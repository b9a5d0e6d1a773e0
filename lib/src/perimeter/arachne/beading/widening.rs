//! Print thin features with a single widened bead.

use super::{Beading, BeadingParams, BeadingStrategy};
use crate::Coord;

/// Regions thinner than the optimal width but at least `min_input_width`
/// thick get one bead of at least `min_output_width`.
#[derive(Debug)]
pub struct WideningBeadingStrategy {
    parent: Box<dyn BeadingStrategy>,
    params: BeadingParams,
    min_input_width: Coord,
    min_output_width: Coord,
}

impl WideningBeadingStrategy {
    pub fn new(parent: Box<dyn BeadingStrategy>, min_input_width: Coord, min_output_width: Coord) -> Self {
        Self {
            params: *parent.params(),
            parent,
            min_input_width,
            min_output_width,
        }
    }
}

impl BeadingStrategy for WideningBeadingStrategy {
    fn compute(&self, thickness: Coord, bead_count: i64) -> Beading {
        if thickness >= self.params.optimal_width {
            return self.parent.compute(thickness, bead_count);
        }
        if thickness < self.min_input_width {
            return Beading::empty(thickness);
        }
        Beading {
            total_thickness: thickness,
            bead_widths: vec![thickness.max(self.min_output_width)],
            toolpath_locations: vec![thickness / 2],
            left_over: 0,
        }
    }

    fn optimal_thickness(&self, bead_count: i64) -> Coord {
        self.parent.optimal_thickness(bead_count)
    }

    fn transition_thickness(&self, lower_bead_count: i64) -> Coord {
        if lower_bead_count == 0 {
            self.min_input_width
        } else {
            self.parent.transition_thickness(lower_bead_count)
        }
    }

    fn optimal_bead_count(&self, thickness: Coord) -> i64 {
        if thickness < self.min_input_width {
            return 0;
        }
        self.parent.optimal_bead_count(thickness).max(1)
    }

    fn transitioning_length(&self, lower_bead_count: i64) -> Coord {
        self.parent.transitioning_length(lower_bead_count)
    }

    fn nonlinear_thicknesses(&self, lower_bead_count: i64) -> Vec<Coord> {
        let mut ret = vec![self.min_output_width];
        ret.extend(self.parent.nonlinear_thicknesses(lower_bead_count));
        ret
    }

    fn params(&self) -> &BeadingParams {
        &self.params
    }

    fn name(&self) -> String {
        format!("WideningBeadingStrategy+{}", self.parent.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perimeter::arachne::beading::DistributedBeadingStrategy;
    use crate::scale;

    fn make_strategy() -> WideningBeadingStrategy {
        let parent = DistributedBeadingStrategy::new(
            BeadingParams {
                optimal_width: scale(0.4),
                ..Default::default()
            },
            1,
        );
        WideningBeadingStrategy::new(Box::new(parent), scale(0.1), scale(0.3))
    }

    #[test]
    fn test_thin_feature_widened() {
        let strategy = make_strategy();
        assert_eq!(strategy.optimal_bead_count(scale(0.15)), 1);
        let beading = strategy.compute(scale(0.15), 1);
        assert_eq!(beading.bead_widths, vec![scale(0.3)]);
        assert_eq!(beading.toolpath_locations, vec![scale(0.075)]);
    }

    #[test]
    fn test_below_min_input_dropped() {
        let strategy = make_strategy();
        assert_eq!(strategy.optimal_bead_count(scale(0.05)), 0);
        assert!(!strategy.compute(scale(0.05), 1).has_beads());
        assert_eq!(strategy.transition_thickness(0), scale(0.1));
    }

    #[test]
    fn test_wide_region_uses_parent() {
        let strategy = make_strategy();
        let beading = strategy.compute(scale(0.8), 2);
        assert_eq!(beading.bead_widths, vec![scale(0.4), scale(0.4)]);
        assert_eq!(strategy.nonlinear_thicknesses(0), vec![scale(0.3)]);
    }
}
