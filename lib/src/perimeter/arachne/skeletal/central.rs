//! Central edges and bead counts.
//!
//! An edge is central where the outline on both sides runs roughly parallel,
//! i.e. where its distance to the outline grows slower than the transitioning
//! angle allows. Only central regions get a bead count of their own; the rest
//! of the skeleton inherits one.

use super::graph::{EdgeId, EdgeKind};
use super::SkeletalTrapezoidation;
use crate::Coord;
use log::warn;
use std::collections::HashSet;

/// Rising edges shorter than this do not count when walking upward.
const MIN_UPWARD_EDGE: Coord = 10_000;

impl SkeletalTrapezoidation<'_> {
    pub(super) fn update_is_central(&mut self) {
        let outer_edge_filter_length = self.strategy.transition_thickness(0) / 2;
        let cap = (self.strategy.transitioning_angle() * 0.5).sin();

        for edge in self.graph.edge_ids() {
            let Some(twin) = self.graph.twin(edge) else {
                warn!("Encountered a skeleton edge without twin");
                continue;
            };
            let twin_central = self.graph.edge(twin).data.central;
            let central = if twin_central != super::graph::Centrality::Unknown {
                twin_central == super::graph::Centrality::Central
            } else if self.graph.edge(edge).data.kind == EdgeKind::ExtraVd {
                false
            } else {
                let from_r = self.graph.r(self.graph.from(edge));
                let to_r = self.graph.r(self.graph.to(edge));
                if from_r.max(to_r) < outer_edge_filter_length {
                    false
                } else {
                    let d_r = (to_r - from_r).abs();
                    let d_d = self.graph.length(edge);
                    (d_r as f64) < d_d as f64 * cap
                }
            };
            self.graph.edge_mut(edge).data.set_central(central);
        }
    }

    /// Whether `edge_to` is central and no central edge continues from its
    /// end.
    pub(super) fn is_end_of_central(&self, edge_to: EdgeId) -> bool {
        if !self.graph.is_central(edge_to) {
            return false;
        }
        if self.graph.next(edge_to).is_none() {
            return true;
        }
        !self
            .graph
            .outgoing_after(edge_to)
            .iter()
            .any(|&e| self.graph.is_central(e))
    }

    /// Dissolve central regions shorter than `max_length` that end without
    /// reaching a local maximum.
    pub(super) fn filter_central(&mut self, max_length: Coord) {
        for edge in self.graph.edge_ids() {
            if !self.is_end_of_central(edge) {
                continue;
            }
            let to = self.graph.to(edge);
            if self.graph.is_local_maximum(to, false) && !self.graph.is_local_maximum(to, true) {
                if let Some(twin) = self.graph.twin(edge) {
                    self.filter_central_from(twin, max_length);
                }
            }
        }
    }

    /// Walk the central region backwards from `start`. Every edge from which
    /// all central continuations end within `max_length` without a local
    /// maximum is made non-central.
    fn filter_central_from(&mut self, start: EdgeId, max_length: Coord) -> bool {
        struct Frame {
            edge: EdgeId,
            traveled: Coord,
            children: Vec<EdgeId>,
            next_child: usize,
            dissolve: bool,
        }

        let mut visited = HashSet::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut result = false;

        let mut enter = |this: &Self, edge: EdgeId, traveled: Coord, stack: &mut Vec<Frame>| -> Option<bool> {
            let length = this.graph.length(edge);
            if traveled + length > max_length || !visited.insert(edge) {
                return Some(false);
            }
            let children = this
                .graph
                .outgoing_after(edge)
                .into_iter()
                .filter(|&e| this.graph.is_central(e))
                .collect();
            stack.push(Frame {
                edge,
                traveled: traveled + length,
                children,
                next_child: 0,
                dissolve: true,
            });
            None
        };

        if let Some(early) = enter(self, start, 0, &mut stack) {
            return early;
        }
        while let Some(frame) = stack.last_mut() {
            if frame.next_child < frame.children.len() {
                let child = frame.children[frame.next_child];
                frame.next_child += 1;
                let traveled = frame.traveled;
                if let Some(child_result) = enter(self, child, traveled, &mut stack) {
                    if let Some(parent) = stack.last_mut() {
                        parent.dissolve &= child_result;
                    }
                }
                continue;
            }

            let Some(frame) = stack.pop() else { break };
            let dissolve = frame.dissolve && !self.graph.is_local_maximum(self.graph.to(frame.edge), false);
            if dissolve {
                self.graph.edge_mut(frame.edge).data.set_central(false);
                if let Some(twin) = self.graph.twin(frame.edge) {
                    self.graph.edge_mut(twin).data.set_central(false);
                }
            }
            match stack.last_mut() {
                Some(parent) => parent.dissolve &= dissolve,
                None => result = dissolve,
            }
        }
        result
    }

    /// Unmark the central edges along the outline.
    pub(super) fn filter_outer_central(&mut self) {
        for edge in self.graph.edge_ids() {
            if self.graph.prev(edge).is_none() {
                self.graph.edge_mut(edge).data.set_central(false);
                if let Some(twin) = self.graph.twin(edge) {
                    self.graph.edge_mut(twin).data.set_central(false);
                }
            }
        }
    }

    /// Bead counts at the ends of central edges and at local maxima.
    pub(super) fn update_bead_count(&mut self) {
        for edge in self.graph.edge_ids() {
            if self.graph.is_central(edge) {
                let to = self.graph.to(edge);
                let bead_count = self.strategy.optimal_bead_count(self.graph.r(to) * 2);
                self.graph.node_mut(to).data.bead_count = bead_count;
            }
        }

        for node in self.graph.node_ids() {
            if !self.graph.is_local_maximum(node, false) {
                continue;
            }
            if self.graph.r(node) < 0 {
                warn!("Distance to boundary not yet computed for a local maximum");
                let distance = self
                    .graph
                    .outgoing_partial(node)
                    .iter()
                    .map(|&e| self.graph.r(self.graph.to(e)) + self.graph.length(e))
                    .min()
                    .unwrap_or(0);
                self.graph.node_mut(node).data.distance_to_boundary = distance;
            }
            let bead_count = self.strategy.optimal_bead_count(self.graph.r(node) * 2);
            self.graph.node_mut(node).data.bead_count = bead_count;
        }
    }

    /// Merge short non-central stretches between central regions into the
    /// central part.
    pub(super) fn filter_noncentral_regions(&mut self) {
        for edge in self.graph.edge_ids() {
            if !self.is_end_of_central(edge) {
                continue;
            }
            let to = self.graph.to(edge);
            if self.graph.bead_count(to) < 0 && self.graph.r(to) != 0 {
                warn!("Encountered an uninitialized bead at the boundary");
            }
            self.filter_noncentral_region_from(edge, self.graph.bead_count(to));
        }
    }

    /// Follow the single upward path from the end of `to_edge`. When it
    /// reaches a region of the same bead count, or one bead off within
    /// [`super::NONCENTRAL_FILTER_DIST`], the whole path becomes central.
    fn filter_noncentral_region_from(&mut self, to_edge: EdgeId, bead_count: i64) {
        let mut path = Vec::new();
        let mut traveled: Coord = 0;
        let mut current = to_edge;
        let dissolve = loop {
            let r = self.graph.r(self.graph.to(current));
            let upward = self.graph.outgoing_after(current).into_iter().find(|&e| {
                self.graph.r(self.graph.to(e)) >= r
                    && !(self.graph.to_p(e) - self.graph.from_p(e)).shorter_than(MIN_UPWARD_EDGE)
            });
            let Some(next_edge) = upward else {
                break false;
            };
            if path.contains(&next_edge) || path.len() > self.graph.edge_count() {
                break false;
            }
            let length = self.graph.length(next_edge);
            path.push(next_edge);

            let next_bead_count = self.graph.bead_count(self.graph.to(next_edge));
            if next_bead_count == bead_count {
                break true;
            }
            if next_bead_count >= 0 {
                break traveled + length < super::NONCENTRAL_FILTER_DIST
                    && (next_bead_count - bead_count).abs() == 1;
            }
            traveled += length;
            current = next_edge;
        };

        if !dissolve {
            return;
        }
        for edge in path {
            self.graph.edge_mut(edge).data.set_central(true);
            if let Some(twin) = self.graph.twin(edge) {
                self.graph.edge_mut(twin).data.set_central(true);
            }
            let to = self.graph.to(edge);
            let bead_count = self.strategy.optimal_bead_count(self.graph.r(to) * 2);
            let data = &mut self.graph.node_mut(to).data;
            data.bead_count = bead_count;
            data.transition_ratio = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::SkeletalParams;
    use super::super::SkeletalTrapezoidation;
    use crate::geometry::{Point, Polygon};
    use crate::perimeter::arachne::beading::BeadingStrategyFactory;
    use crate::perimeter::arachne::config::WallToolPathsConfig;
    use crate::scale;

    #[test]
    fn test_strip_middle_is_central() {
        let config = WallToolPathsConfig::new(3, 0.4);
        let strategy = BeadingStrategyFactory::from_config(&config);
        let strip = Polygon::rectangle(Point::zero(), Point::new(scale(10.0), scale(1.0)));
        let mut st =
            SkeletalTrapezoidation::new(&[strip], strategy.as_ref(), SkeletalParams::from_config(&config), &config.voronoi)
                .unwrap();
        st.update_is_central();

        let graph = st.graph();
        let mut central_length = 0;
        for edge in graph.edge_ids() {
            let twin = graph.twin(edge).unwrap();
            assert_eq!(graph.is_central(edge), graph.is_central(twin));
            if graph.is_central(edge) {
                // Central edges run along the middle of the strip
                assert_eq!(graph.from_p(edge).y, scale(0.5));
                assert_eq!(graph.to_p(edge).y, scale(0.5));
                central_length += graph.length(edge);
            }
        }
        // Both halves of the 9 mm long middle line
        assert!((central_length - 2 * scale(9.0)).abs() <= 100);
    }

    #[test]
    fn test_bead_count_of_central_nodes() {
        let config = WallToolPathsConfig::new(3, 0.4);
        let strategy = BeadingStrategyFactory::from_config(&config);
        let strip = Polygon::rectangle(Point::zero(), Point::new(scale(10.0), scale(1.0)));
        let mut st =
            SkeletalTrapezoidation::new(&[strip], strategy.as_ref(), SkeletalParams::from_config(&config), &config.voronoi)
                .unwrap();
        st.update_is_central();
        st.filter_central(super::super::CENTRAL_FILTER_DIST);
        st.update_bead_count();
        st.filter_noncentral_regions();

        let graph = st.graph();
        let expected = strategy.optimal_bead_count(scale(1.0));
        for edge in graph.edge_ids().into_iter().filter(|&e| graph.is_central(e)) {
            assert_eq!(graph.bead_count(graph.to(edge)), expected);
        }
    }

    /// A 10 mm long triangle with a tip narrower than the transitioning
    /// angle, so its central skeleton runs out to the tip.
    fn needle() -> Polygon {
        Polygon::from_points(vec![
            Point::zero(),
            Point::new_scale(10.0, -0.4),
            Point::new_scale(10.0, 0.4),
        ])
    }

    #[test]
    fn test_filter_outer_central_unmarks_edges_at_the_outline() {
        let config = WallToolPathsConfig::new(3, 0.4);
        let strategy = BeadingStrategyFactory::from_config(&config);
        let mut st =
            SkeletalTrapezoidation::new(&[needle()], strategy.as_ref(), SkeletalParams::from_config(&config), &config.voronoi)
                .unwrap();
        st.update_is_central();
        let touching_outline = |st: &SkeletalTrapezoidation<'_>| {
            let graph = st.graph();
            graph
                .edge_ids()
                .into_iter()
                .filter(|&e| graph.prev(e).is_none() && graph.is_central(e))
                .count()
        };
        assert!(touching_outline(&st) > 0);

        st.filter_outer_central();
        assert_eq!(touching_outline(&st), 0);
        let graph = st.graph();
        for edge in graph.edge_ids() {
            let twin = graph.twin(edge).unwrap();
            assert_eq!(graph.is_central(edge), graph.is_central(twin));
        }
    }

    #[test]
    fn test_outermost_central_filter_in_full_run() {
        let mut config = WallToolPathsConfig::new(3, 0.4);
        config.filter_outermost_central_edges = true;
        let params = SkeletalParams::from_config(&config);
        assert!(params.filter_outermost_central_edges);
        let strategy = BeadingStrategyFactory::from_config(&config);
        let toolpaths = SkeletalTrapezoidation::new(&[needle()], strategy.as_ref(), params, &config.voronoi)
            .unwrap()
            .generate_toolpaths();
        assert!(toolpaths.iter().any(|lines| !lines.is_empty()));
        let bbox = needle().bounding_box();
        for junction in toolpaths.iter().flatten().flat_map(|line| line.iter()) {
            assert!(bbox.contains_point(&junction.position), "{:?}", junction.position);
        }
    }
}
