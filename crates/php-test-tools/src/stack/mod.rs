//! Stack trace parsing and normalisation.

pub mod frame;
mod normalise;

pub use frame::{Coordinate, Frame, Location, StackLine};
pub use normalise::{header_lines_from_probe, StackNormaliser};
