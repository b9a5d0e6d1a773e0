//! Beading strategies for variable-width walls.
//!
//! A beading strategy maps the local thickness of a region to the number of
//! walls ("beads") printed across it and to each bead's width and centerline
//! location. Strategies are composed: [`DistributedBeadingStrategy`] does the
//! base distribution and the other strategies wrap a parent and adjust its
//! answers. [`BeadingStrategyFactory`] builds the usual chain.
//!
//! All thicknesses, widths and locations are in scaled units.

mod distributed;
mod factory;
mod limited;
mod outer_wall_inset;
mod redistribute;
mod widening;

pub use distributed::DistributedBeadingStrategy;
pub use factory::BeadingStrategyFactory;
pub use limited::LimitedBeadingStrategy;
pub use outer_wall_inset::OuterWallInsetBeadingStrategy;
pub use redistribute::RedistributeBeadingStrategy;
pub use widening::WideningBeadingStrategy;

use crate::{scale, Coord, CoordF};
use std::fmt;

/// Bead widths and locations across one local thickness.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Beading {
    /// The thickness this beading was computed for.
    pub total_thickness: Coord,
    /// Width of each bead, outer to inner.
    pub bead_widths: Vec<Coord>,
    /// Distance of each bead's centerline from the outline.
    pub toolpath_locations: Vec<Coord>,
    /// Thickness not covered by any bead.
    pub left_over: Coord,
}

impl Beading {
    /// A beading with no beads covering `thickness`.
    pub fn empty(thickness: Coord) -> Self {
        Self {
            total_thickness: thickness,
            bead_widths: Vec::new(),
            toolpath_locations: Vec::new(),
            left_over: thickness,
        }
    }

    /// Number of beads, including zero-width markers.
    #[inline]
    pub fn bead_count(&self) -> usize {
        self.bead_widths.len()
    }

    #[inline]
    pub fn has_beads(&self) -> bool {
        !self.bead_widths.is_empty()
    }

    /// Sum of all bead widths.
    pub fn covered_width(&self) -> Coord {
        self.bead_widths.iter().sum()
    }
}

/// Parameters shared by a strategy chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeadingParams {
    pub optimal_width: Coord,
    /// For an odd bead count: when to split the middle bead in two.
    pub wall_split_middle_threshold: CoordF,
    /// For an even bead count: when to add a middle bead.
    pub wall_add_middle_threshold: CoordF,
    pub default_transition_length: Coord,
    /// Radians.
    pub transitioning_angle: CoordF,
}

impl Default for BeadingParams {
    fn default() -> Self {
        Self {
            optimal_width: scale(0.45),
            wall_split_middle_threshold: 0.5,
            wall_add_middle_threshold: 0.5,
            default_transition_length: scale(0.4),
            transitioning_angle: std::f64::consts::FRAC_PI_3,
        }
    }
}

/// Mapping from local thickness to a set of beads.
///
/// Implementors provide [`compute`](Self::compute),
/// [`optimal_bead_count`](Self::optimal_bead_count) and access to their
/// [`BeadingParams`]; the remaining methods have defaults derived from those.
pub trait BeadingStrategy: fmt::Debug {
    /// Beads for `thickness` when `bead_count` beads are to be printed.
    fn compute(&self, thickness: Coord, bead_count: i64) -> Beading;

    /// Number of beads that best fills `thickness`.
    fn optimal_bead_count(&self, thickness: Coord) -> i64;

    fn params(&self) -> &BeadingParams;

    /// Chain name, outermost decorator first.
    fn name(&self) -> String;

    /// Thickness at which `bead_count` beads all have their optimal width.
    fn optimal_thickness(&self, bead_count: i64) -> Coord {
        self.params().optimal_width * bead_count
    }

    /// Thickness at which the bead count switches from `lower_bead_count` to
    /// one more.
    fn transition_thickness(&self, lower_bead_count: i64) -> Coord {
        let lower_ideal_width = self.optimal_thickness(lower_bead_count);
        let higher_ideal_width = self.optimal_thickness(lower_bead_count + 1);
        let threshold = if lower_bead_count % 2 == 1 {
            self.params().wall_split_middle_threshold
        } else {
            self.params().wall_add_middle_threshold
        };
        lower_ideal_width + (threshold * (higher_ideal_width - lower_ideal_width) as CoordF) as Coord
    }

    /// Length along the skeleton over which a transition is smoothed.
    fn transitioning_length(&self, _lower_bead_count: i64) -> Coord {
        self.params().default_transition_length
    }

    /// Where the transition sits within its length: 0 at the low end, 1 at
    /// the high end.
    fn transition_anchor_pos(&self, lower_bead_count: i64) -> CoordF {
        let lower_optimum = self.optimal_thickness(lower_bead_count);
        let transition_point = self.transition_thickness(lower_bead_count);
        let upper_optimum = self.optimal_thickness(lower_bead_count + 1);
        1.0 - (transition_point - lower_optimum) as CoordF / (upper_optimum - lower_optimum) as CoordF
    }

    /// Thicknesses between `lower_bead_count` and one more at which the
    /// beading changes non-linearly and the skeleton needs extra ribs.
    fn nonlinear_thicknesses(&self, _lower_bead_count: i64) -> Vec<Coord> {
        Vec::new()
    }

    fn transitioning_angle(&self) -> CoordF {
        self.params().transitioning_angle
    }

    fn split_middle_threshold(&self) -> CoordF {
        self.params().wall_split_middle_threshold
    }

    fn add_middle_threshold(&self) -> CoordF {
        self.params().wall_add_middle_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beading_empty() {
        let beading = Beading::empty(scale(0.05));
        assert!(!beading.has_beads());
        assert_eq!(beading.left_over, scale(0.05));
        assert_eq!(beading.covered_width(), 0);
    }

    #[test]
    fn test_default_transition_thickness() {
        let strategy = DistributedBeadingStrategy::new(BeadingParams::default(), 1);
        let w = scale(0.45);
        // Even lower count uses the add threshold, odd the split threshold
        assert_eq!(strategy.transition_thickness(0), w / 2);
        assert_eq!(strategy.transition_thickness(1), w + w / 2);
        assert!((strategy.transition_anchor_pos(2) - 0.5).abs() < 1e-6);
    }
}
