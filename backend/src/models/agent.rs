//! Cell agent model
//!
//! Every agent shares one record; type-specific behaviour is dispatched by
//! [`AgentType`] in the `behavior` module rather than through subtypes.
//!
//! # Lifecycle
//!
//! Agents are created by initial population, recruitment, division, or
//! re-population of voxels exposed by a grid shift. They are destroyed in the
//! final scan of the slice in which they were marked dead or dropped out.

use crate::core::Coord3D;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Stable generational handle of an agent inside its compartment's arena
    pub struct AgentId;
}

/// Cell type of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Cancer,
    /// Cytotoxic T lymphocyte (CD8)
    TCell,
    /// Regulatory T cell
    Treg,
    Macrophage,
    Fibroblast,
}

impl AgentType {
    pub const ALL: [AgentType; 5] = [
        AgentType::Cancer,
        AgentType::TCell,
        AgentType::Treg,
        AgentType::Macrophage,
        AgentType::Fibroblast,
    ];

    /// Decode the integer type codes used by initial-condition files
    ///
    /// 0 is the placeholder "dummy" type and is rejected like any other
    /// unknown code.
    pub fn from_code(code: u32) -> Option<AgentType> {
        match code {
            1 => Some(AgentType::TCell),
            2 => Some(AgentType::Cancer),
            3 => Some(AgentType::Macrophage),
            4 => Some(AgentType::Fibroblast),
            5 => Some(AgentType::Treg),
            _ => None,
        }
    }

    /// Lymphocytes share a per-voxel count and may stack in one voxel
    pub fn is_lymphocyte(&self) -> bool {
        matches!(self, AgentType::TCell | AgentType::Treg)
    }

    /// The state an agent of this type starts in when none is given
    pub fn default_state(&self) -> AgentState {
        match self {
            AgentType::Cancer => AgentState::CancerStem,
            AgentType::TCell => AgentState::TEffector,
            _ => AgentState::Default,
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentType::Cancer => "cancer",
            AgentType::TCell => "CD8",
            AgentType::Treg => "Treg",
            AgentType::Macrophage => "mac",
            AgentType::Fibroblast => "fib",
        };
        f.write_str(name)
    }
}

/// Type-specific sub-state of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Default,
    CancerStem,
    CancerProgenitor,
    CancerSenescent,
    TEffector,
    TCytotoxic,
    TSuppressed,
}

impl AgentState {
    /// Whether this state is meaningful for the given type
    pub fn is_valid_for(&self, agent_type: AgentType) -> bool {
        match agent_type {
            AgentType::Cancer => matches!(
                self,
                AgentState::CancerStem | AgentState::CancerProgenitor | AgentState::CancerSenescent
            ),
            AgentType::TCell => matches!(
                self,
                AgentState::TEffector | AgentState::TCytotoxic | AgentState::TSuppressed
            ),
            AgentType::Treg | AgentType::Macrophage | AgentType::Fibroblast => {
                *self == AgentState::Default
            }
        }
    }
}

/// Observations collected during the scan pass of the state-change phase
///
/// Purely transient; recomputed every slice before any state rule runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighborScan {
    /// Live cancer neighbours, in neighbourhood scan order
    pub cancer: Vec<AgentId>,
    /// Live cytotoxic CD8 neighbours
    pub cytotoxic_t: u32,
    /// Live Treg neighbours
    pub treg: u32,
    /// Live PD-L1 positive cancer neighbours
    pub pdl1_positive: u32,
}

/// A single cell in a spatial compartment
#[derive(Debug, Clone, PartialEq)]
pub struct CellAgent {
    pub(crate) agent_type: AgentType,
    pub(crate) state: AgentState,
    pub(crate) coord: Coord3D,
    /// Remaining life in slices (lymphocytes only)
    pub(crate) life: i32,
    /// Remaining divisions (progenitor cancer cells, cytotoxic T cells)
    pub(crate) divisions_left: u32,
    /// Slices until the next division is allowed
    pub(crate) div_countdown: u32,
    /// Clone the cell descends from
    pub(crate) lineage_id: u64,
    /// Born from an asymmetric stem division
    pub(crate) asymmetric: bool,
    /// PD-L1 expression level in [0, 1] (cancer cells)
    pub(crate) pdl1: f64,
    pub(crate) dead: bool,
    pub(crate) drop_out: bool,
    pub(crate) killed_by_t: bool,
    pub(crate) scan: NeighborScan,
}

impl CellAgent {
    /// Create a live agent in the type's default state
    pub fn new(agent_type: AgentType, coord: Coord3D) -> Self {
        Self {
            agent_type,
            state: agent_type.default_state(),
            coord,
            life: 0,
            divisions_left: 0,
            div_countdown: 0,
            lineage_id: 0,
            asymmetric: false,
            pdl1: 0.0,
            dead: false,
            drop_out: false,
            killed_by_t: false,
            scan: NeighborScan::default(),
        }
    }

    /// Daughter cell produced by division
    ///
    /// The copy inherits type, state, lineage and counters; flags and
    /// transient observations are reset. Behaviour-specific adjustments
    /// (fresh life, asymmetric fate) are applied by the caller.
    pub fn create_copy(&self) -> CellAgent {
        CellAgent {
            dead: false,
            drop_out: false,
            killed_by_t: false,
            asymmetric: false,
            scan: NeighborScan::default(),
            ..self.clone()
        }
    }

    pub fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn coord(&self) -> Coord3D {
        self.coord
    }

    pub fn life(&self) -> i32 {
        self.life
    }

    pub fn divisions_left(&self) -> u32 {
        self.divisions_left
    }

    pub fn div_countdown(&self) -> u32 {
        self.div_countdown
    }

    pub fn lineage_id(&self) -> u64 {
        self.lineage_id
    }

    pub fn is_asymmetric(&self) -> bool {
        self.asymmetric
    }

    pub fn pdl1(&self) -> f64 {
        self.pdl1
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn is_drop_out(&self) -> bool {
        self.drop_out
    }

    pub fn is_killed_by_t(&self) -> bool {
        self.killed_by_t
    }

    /// Neither dead nor swept out of the window
    pub fn is_live(&self) -> bool {
        !(self.dead || self.drop_out)
    }

    pub fn is_cancer(&self) -> bool {
        self.agent_type == AgentType::Cancer
    }

    pub(crate) fn set_dead(&mut self) {
        self.dead = true;
    }

    pub(crate) fn set_drop_out(&mut self) {
        self.drop_out = true;
    }

    pub(crate) fn set_progenitor(&mut self, divisions: u32) {
        self.state = AgentState::CancerProgenitor;
        self.divisions_left = divisions;
    }

    pub(crate) fn set_senescent(&mut self) {
        self.state = AgentState::CancerSenescent;
        self.divisions_left = 0;
    }
}

impl fmt::Display for CellAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} at {} (life {}, div_left {}, lineage {}, dead {}, drop_out {})",
            self.agent_type,
            self.state,
            self.coord,
            self.life,
            self.divisions_left,
            self.lineage_id,
            self.dead,
            self.drop_out
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_validity() {
        assert!(AgentState::CancerStem.is_valid_for(AgentType::Cancer));
        assert!(!AgentState::CancerStem.is_valid_for(AgentType::TCell));
        assert!(AgentState::Default.is_valid_for(AgentType::Treg));
        assert!(!AgentState::Default.is_valid_for(AgentType::Cancer));
    }

    #[test]
    fn test_create_copy_resets_flags() {
        let mut parent = CellAgent::new(AgentType::Cancer, Coord3D::new(1, 1, 1));
        parent.lineage_id = 42;
        parent.killed_by_t = true;
        parent.asymmetric = true;
        let daughter = parent.create_copy();
        assert_eq!(daughter.lineage_id(), 42);
        assert!(!daughter.is_killed_by_t());
        assert!(!daughter.is_asymmetric());
        assert!(daughter.is_live());
    }

    #[test]
    fn test_unknown_type_code() {
        assert_eq!(AgentType::from_code(0), None);
        assert_eq!(AgentType::from_code(2), Some(AgentType::Cancer));
        assert_eq!(AgentType::from_code(99), None);
    }
}
