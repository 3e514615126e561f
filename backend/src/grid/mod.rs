//! Voxel/agent grid engine
//!
//! Spatial indexing, occupancy enforcement, neighbourhood search and the
//! window re-centering rule.

pub mod agent_grid;
pub mod recenter;
pub mod shape;
pub mod voxel;

pub use agent_grid::{lattice_size, AgentGrid, GridError, MAX_VOXELS};
pub use recenter::{center_of_mass, decide_shift, RecenterState};
pub use shape::Shape;
pub use voxel::{OccupancyLimits, Voxel};
