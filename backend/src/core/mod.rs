//! Lattice coordinates and simulation time

pub mod coord;
pub mod time;

pub use coord::Coord3D;
pub use time::{TimeManager, SEC_PER_DAY};
