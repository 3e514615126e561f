//! Domain models

pub mod agent;
pub mod event;
pub mod params;
pub mod stats;

pub use agent::{AgentId, AgentState, AgentType, CellAgent, NeighborScan};
pub use event::{Event, EventLog};
pub use params::{AbmParams, RecruitmentConstants, RecruitmentDerivation};
pub use stats::{CategoryCounts, StatEvent, Stats};
