//! SPQSP ABM Core - hybrid spatial agent / continuous tumour-immune engine
//!
//! Couples voxel-lattice agent-based regions of a tumour to a whole-tumour
//! continuous (QSP) model with deterministic execution.
//!
//! # Architecture
//!
//! - **core**: Coordinates and slice clock
//! - **grid**: Voxel lattice, occupancy rules, neighbourhood shapes, window
//!   re-centering decision
//! - **models**: Agent record, parameters, per-slice statistics, event log
//! - **behavior**: Per-type movement, scan and state rules
//! - **compartment**: One region: initialization, the seven-phase slice,
//!   window shifts, snapshots
//! - **field**: Diffusible signal interface and lattice solver
//! - **qsp**: Continuous model interface
//! - **exchange**: Scaling and unit conversion between the two scales
//! - **orchestrator**: Main slice loop and checkpointing
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. Every live agent is registered at exactly its own voxel
//! 2. No voxel exceeds its occupancy limits
//! 3. All randomness is drawn from one seeded stream in a fixed order

// Module declarations
pub mod behavior;
pub mod compartment;
pub mod core;
pub mod exchange;
pub mod field;
pub mod grid;
pub mod models;
pub mod orchestrator;
pub mod qsp;
pub mod rng;

// Re-exports for convenience
pub use crate::core::{Coord3D, TimeManager};
pub use compartment::{Compartment, CompartmentError, SliceContext};
pub use exchange::{AbmExchange, CouplingParams, ExchangeReport, QspExchange, RegionKind};
pub use grid::{AgentGrid, GridError, OccupancyLimits};
pub use models::{
    agent::{AgentId, AgentState, AgentType, CellAgent},
    event::{Event, EventLog},
    params::AbmParams,
    stats::Stats,
};
pub use orchestrator::{Orchestrator, OrchestratorConfig, RegionConfig, SimulationError, SliceResult};
pub use qsp::{ContinuousModel, IntegratorError, QspVariable};
pub use rng::RngManager;
