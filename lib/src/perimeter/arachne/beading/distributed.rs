//! Base strategy: spread any width deviation over the middle beads.

use super::{Beading, BeadingParams, BeadingStrategy};
use crate::{Coord, CoordF};

/// Distributes the difference between the thickness and the optimal
/// thickness over the beads, weighted towards the middle.
///
/// The weight of a bead falls off quadratically with its distance from the
/// middle bead and reaches zero `distribution_radius` beads away.
#[derive(Debug, Clone)]
pub struct DistributedBeadingStrategy {
    params: BeadingParams,
    one_over_distribution_radius_squared: CoordF,
}

impl DistributedBeadingStrategy {
    pub fn new(params: BeadingParams, distribution_radius: usize) -> Self {
        let one_over_distribution_radius_squared = if distribution_radius >= 2 {
            let r = (distribution_radius - 1) as CoordF;
            1.0 / (r * r)
        } else {
            1.0
        };
        Self {
            params,
            one_over_distribution_radius_squared,
        }
    }
}

impl BeadingStrategy for DistributedBeadingStrategy {
    fn compute(&self, thickness: Coord, bead_count: i64) -> Beading {
        let optimal_width = self.params.optimal_width;
        let mut ret = Beading {
            total_thickness: thickness,
            ..Default::default()
        };

        match bead_count {
            n if n > 2 => {
                let to_be_divided = thickness - n * optimal_width;
                let middle = (n - 1) as CoordF / 2.0;
                let weights: Vec<CoordF> = (0..n)
                    .map(|bead_idx| {
                        let dev_from_middle = bead_idx as CoordF - middle;
                        (1.0 - self.one_over_distribution_radius_squared
                            * dev_from_middle
                            * dev_from_middle)
                            .max(0.0)
                    })
                    .collect();
                let total_weight: CoordF = weights.iter().sum();

                for weight in weights {
                    let share = (to_be_divided as CoordF * weight / total_weight) as Coord;
                    let width = optimal_width + share;
                    let location = match (ret.toolpath_locations.last(), ret.bead_widths.last()) {
                        (Some(&loc), Some(&prev_width)) => loc + (prev_width + width) / 2,
                        _ => width / 2,
                    };
                    ret.toolpath_locations.push(location);
                    ret.bead_widths.push(width);
                }
                ret.left_over = 0;
            }
            2 => {
                let outer_width = thickness / 2;
                ret.bead_widths = vec![outer_width, outer_width];
                ret.toolpath_locations = vec![outer_width / 2, thickness - outer_width / 2];
                ret.left_over = 0;
            }
            1 => {
                ret.bead_widths = vec![thickness];
                ret.toolpath_locations = vec![thickness / 2];
                ret.left_over = 0;
            }
            _ => ret.left_over = thickness,
        }
        ret
    }

    fn optimal_bead_count(&self, thickness: Coord) -> i64 {
        let optimal_width = self.params.optimal_width;
        // Lines that fit for sure
        let naive_count = thickness / optimal_width;
        let remainder = thickness - naive_count * optimal_width;
        let threshold = if naive_count % 2 == 1 {
            self.params.wall_split_middle_threshold
        } else {
            self.params.wall_add_middle_threshold
        };
        let minimum_line_width = (optimal_width as CoordF * threshold) as Coord;
        naive_count + i64::from(remainder >= minimum_line_width)
    }

    fn params(&self) -> &BeadingParams {
        &self.params
    }

    fn name(&self) -> String {
        "DistributedBeadingStrategy".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale;

    fn make_strategy(radius: usize) -> DistributedBeadingStrategy {
        DistributedBeadingStrategy::new(
            BeadingParams {
                optimal_width: scale(0.4),
                wall_split_middle_threshold: 0.5,
                wall_add_middle_threshold: 0.5,
                ..Default::default()
            },
            radius,
        )
    }

    #[test]
    fn test_optimal_bead_count() {
        let strategy = make_strategy(1);
        assert_eq!(strategy.optimal_bead_count(scale(0.1)), 0);
        assert_eq!(strategy.optimal_bead_count(scale(0.25)), 1);
        assert_eq!(strategy.optimal_bead_count(scale(0.8)), 2);
        assert_eq!(strategy.optimal_bead_count(scale(1.0)), 3);
        assert_eq!(strategy.optimal_bead_count(scale(1.21)), 3);
    }

    #[test]
    fn test_two_beads_split_evenly() {
        let strategy = make_strategy(1);
        let beading = strategy.compute(scale(1.0), 2);
        assert_eq!(beading.bead_widths, vec![scale(0.5), scale(0.5)]);
        assert_eq!(beading.toolpath_locations, vec![scale(0.25), scale(0.75)]);
        assert_eq!(beading.left_over, 0);
    }

    #[test]
    fn test_deviation_goes_to_middle_bead() {
        let strategy = make_strategy(1);
        let beading = strategy.compute(scale(1.5), 3);
        assert_eq!(beading.bead_widths[0], scale(0.4));
        assert_eq!(beading.bead_widths[1], scale(0.7));
        assert_eq!(beading.bead_widths[2], scale(0.4));
        assert_eq!(beading.toolpath_locations[1], scale(0.75));
    }

    #[test]
    fn test_wide_distribution_radius() {
        let strategy = make_strategy(3);
        let beading = strategy.compute(scale(2.1), 5);
        assert_eq!(beading.bead_count(), 5);
        // Symmetric and summing to the thickness within rounding
        assert_eq!(beading.bead_widths[0], beading.bead_widths[4]);
        assert!(beading.bead_widths[2] > beading.bead_widths[1]);
        assert!((beading.covered_width() - scale(2.1)).abs() <= 5);
    }

    #[test]
    fn test_same_input_same_beading() {
        let strategy = make_strategy(2);
        assert_eq!(strategy.compute(scale(1.3), 3), strategy.compute(scale(1.3), 3));
    }

    #[test]
    fn test_zero_beads() {
        let strategy = make_strategy(1);
        let beading = strategy.compute(scale(0.05), 0);
        assert!(!beading.has_beads());
        assert_eq!(beading.left_over, scale(0.05));
    }
}
