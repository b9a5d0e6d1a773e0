//! Perimeter generation module.
//!
//! Walls are generated with variable extrusion widths by the `arachne`
//! submodule, which adapts the number and width of walls to the local
//! thickness of the slice. The `order` submodule decides in which order the
//! resulting wall toolpaths are printed.
//!
//! # Algorithm
//!
//! 1. Prepare the slice outline
//! 2. Build the skeletal trapezoidation of the outline and distribute beads
//!    over it
//! 3. Stitch the bead centerlines into wall polylines and polygons
//! 4. Order the walls for printing, outer or inner walls first

pub mod arachne;
pub mod order;
