//! Orchestrator - main simulation loop
//!
//! Couples the spatial regions to the continuous model one slice at a time.
//!
//! See `engine.rs` for the slice loop and `checkpoint.rs` for save/load.

pub mod checkpoint;
pub mod engine;

pub use engine::{
    Orchestrator, OrchestratorConfig, Region, RegionConfig, SimulationError, SliceResult,
};

pub use checkpoint::{compute_config_hash, validate_snapshot, StateSnapshot, SNAPSHOT_VERSION};
