//! Composition of the standard strategy chain.

use super::{
    BeadingParams, BeadingStrategy, DistributedBeadingStrategy, LimitedBeadingStrategy,
    OuterWallInsetBeadingStrategy, RedistributeBeadingStrategy, WideningBeadingStrategy,
};
use crate::perimeter::arachne::config::WallToolPathsConfig;
use crate::{scale, Coord, CoordF};
use log::debug;

/// Below this fraction of the outer width no outer bead is printed.
const MINIMUM_VARIABLE_LINE_RATIO: CoordF = 0.5;

/// Builds beading strategy chains.
pub struct BeadingStrategyFactory;

impl BeadingStrategyFactory {
    /// Compose the chain from explicit parameters (scaled units, radians).
    ///
    /// Distributed, then Redistribute, Widening when thin walls are printed,
    /// OuterWallInset for a positive inset and Limited last, since the
    /// zero-width marker beads it adds must not be touched by the others.
    #[allow(clippy::too_many_arguments)]
    pub fn make_strategy(
        preferred_bead_width_outer: Coord,
        preferred_bead_width_inner: Coord,
        preferred_transition_length: Coord,
        transitioning_angle: CoordF,
        print_thin_walls: bool,
        min_bead_width: Coord,
        min_feature_size: Coord,
        wall_split_middle_threshold: CoordF,
        wall_add_middle_threshold: CoordF,
        max_bead_count: i64,
        outer_wall_offset: Coord,
        inward_distributed_center_wall_count: usize,
        minimum_variable_line_ratio: CoordF,
    ) -> Box<dyn BeadingStrategy> {
        let params = BeadingParams {
            optimal_width: preferred_bead_width_inner,
            wall_split_middle_threshold,
            wall_add_middle_threshold,
            default_transition_length: preferred_transition_length,
            transitioning_angle,
        };
        let mut ret: Box<dyn BeadingStrategy> = Box::new(DistributedBeadingStrategy::new(
            params,
            inward_distributed_center_wall_count,
        ));
        debug!(
            "Applying the Redistribute meta-strategy with outer-wall width = {preferred_bead_width_outer}, inner-wall width = {preferred_bead_width_inner}"
        );
        ret = Box::new(RedistributeBeadingStrategy::new(
            preferred_bead_width_outer,
            minimum_variable_line_ratio,
            ret,
        ));
        if print_thin_walls {
            debug!("Applying the Widening meta-strategy with minimum input width {min_feature_size} and minimum output width {min_bead_width}");
            ret = Box::new(WideningBeadingStrategy::new(ret, min_feature_size, min_bead_width));
        }
        if outer_wall_offset > 0 {
            debug!("Applying the OuterWallOffset meta-strategy with offset = {outer_wall_offset}");
            ret = Box::new(OuterWallInsetBeadingStrategy::new(outer_wall_offset, ret));
        }
        debug!("Applying the Limited meta-strategy with maximum bead count = {max_bead_count}");
        ret = Box::new(LimitedBeadingStrategy::new(max_bead_count, ret));
        ret
    }

    /// Compose the chain for a wall configuration.
    pub fn from_config(config: &WallToolPathsConfig) -> Box<dyn BeadingStrategy> {
        let strategy = Self::make_strategy(
            scale(config.bead_width_outer),
            scale(config.bead_width_inner),
            scale(config.wall_transition_length),
            config.transitioning_angle(),
            config.print_thin_walls,
            scale(config.min_bead_width),
            scale(config.min_feature_size),
            config.wall_split_middle_threshold(),
            config.wall_add_middle_threshold(),
            config.max_bead_count() as i64,
            scale(config.wall_0_inset),
            config.wall_distribution_count,
            MINIMUM_VARIABLE_LINE_RATIO,
        );
        debug!("Beading strategy: {}", strategy.name());
        strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chain() {
        let strategy = BeadingStrategyFactory::from_config(&WallToolPathsConfig::default());
        assert_eq!(
            strategy.name(),
            "LimitedBeadingStrategy+WideningBeadingStrategy+RedistributeBeadingStrategy+DistributedBeadingStrategy"
        );
    }

    #[test]
    fn test_chain_with_inset_and_no_thin_walls() {
        let config = WallToolPathsConfig::new(2, 0.4)
            .with_thin_walls(false)
            .with_wall_0_inset(0.05);
        let strategy = BeadingStrategyFactory::from_config(&config);
        assert_eq!(
            strategy.name(),
            "LimitedBeadingStrategy+OuterWallInsetBeadingStrategy+RedistributeBeadingStrategy+DistributedBeadingStrategy"
        );
    }

    #[test]
    fn test_uniform_walls_at_optimal_thickness() {
        let config = WallToolPathsConfig::new(3, 0.45);
        let strategy = BeadingStrategyFactory::from_config(&config);
        let w = scale(0.45);
        for bead_count in 1..=6 {
            let thickness = strategy.optimal_thickness(bead_count);
            assert_eq!(strategy.optimal_bead_count(thickness), bead_count);
            let beading = strategy.compute(thickness, bead_count);
            for &width in beading.bead_widths.iter().filter(|&&width| width > 0) {
                assert!((width - w).abs() <= 1, "bead count {bead_count}: width {width}");
            }
        }
    }

    #[test]
    fn test_thin_feature_widened_to_min_bead_width() {
        let config = WallToolPathsConfig::new(3, 0.45)
            .with_min_bead_width(0.34)
            .with_min_feature_size(0.1);
        let strategy = BeadingStrategyFactory::from_config(&config);
        assert_eq!(strategy.optimal_bead_count(scale(0.2)), 1);
        let beading = strategy.compute(scale(0.2), 1);
        assert_eq!(beading.bead_widths, vec![scale(0.34)]);
        assert_eq!(strategy.optimal_bead_count(scale(0.05)), 0);
    }
}
