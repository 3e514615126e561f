//! Serializable compartment state
//!
//! Agents are recorded in collection order without handles; restoring
//! re-registers every agent, which rebuilds the grid and re-checks the
//! occupancy limits.

use super::{Compartment, CompartmentError};
use crate::core::Coord3D;
use crate::grid::RecenterState;
use crate::models::agent::{AgentState, AgentType, CellAgent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_type: AgentType,
    pub state: AgentState,
    pub coord: Coord3D,
    pub life: i32,
    pub divisions_left: u32,
    pub div_countdown: u32,
    pub lineage_id: u64,
    pub asymmetric: bool,
    pub pdl1: f64,
}

impl From<&CellAgent> for AgentSnapshot {
    fn from(agent: &CellAgent) -> Self {
        AgentSnapshot {
            agent_type: agent.agent_type(),
            state: agent.state(),
            coord: agent.coord(),
            life: agent.life(),
            divisions_left: agent.divisions_left(),
            div_countdown: agent.div_countdown(),
            lineage_id: agent.lineage_id(),
            asymmetric: agent.is_asymmetric(),
            pdl1: agent.pdl1(),
        }
    }
}

impl AgentSnapshot {
    fn to_agent(&self) -> CellAgent {
        let mut agent = CellAgent::new(self.agent_type, self.coord);
        agent.state = self.state;
        agent.life = self.life;
        agent.divisions_left = self.divisions_left;
        agent.div_countdown = self.div_countdown;
        agent.lineage_id = self.lineage_id;
        agent.asymmetric = self.asymmetric;
        agent.pdl1 = self.pdl1;
        agent
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompartmentSnapshot {
    pub dims: Coord3D,
    pub agents: Vec<AgentSnapshot>,
    pub entry_points: Vec<Coord3D>,
    pub recenter: RecenterState,
    /// Flat field concentrations
    pub field: Vec<f64>,
    pub next_lineage: u64,
}

impl Compartment {
    /// Capture the state between slices
    pub fn snapshot(&self) -> CompartmentSnapshot {
        CompartmentSnapshot {
            dims: self.dims(),
            agents: self.agents().map(|(_, a)| AgentSnapshot::from(a)).collect(),
            entry_points: self.entry_points.clone(),
            recenter: self.recenter.clone(),
            field: self.field.concentrations(),
            next_lineage: self.next_lineage(),
        }
    }

    /// Load a snapshot into an empty compartment of the same size
    pub fn restore(&mut self, snapshot: &CompartmentSnapshot) -> Result<(), CompartmentError> {
        if snapshot.dims != self.dims() {
            return Err(CompartmentError::Invariant(format!(
                "snapshot dimensions {} differ from {}",
                snapshot.dims,
                self.dims()
            )));
        }
        if self.agent_count() > 0 {
            return Err(CompartmentError::Invariant(
                "restore requires an empty compartment".to_string(),
            ));
        }
        for record in &snapshot.agents {
            if !record.state.is_valid_for(record.agent_type) {
                return Err(CompartmentError::Invariant(format!(
                    "snapshot agent {} has invalid state {:?}",
                    record.agent_type, record.state
                )));
            }
            let agent = record.to_agent();
            let label = agent.to_string();
            self.place_agent(agent)
                .map_err(|source| CompartmentError::Grid { agent: label, source })?;
        }
        self.entry_points = snapshot.entry_points.clone();
        self.recenter = snapshot.recenter.clone();
        self.field
            .restore_concentrations(snapshot.field.clone())
            .map_err(|e| CompartmentError::Invariant(e.to_string()))?;
        self.set_next_lineage(snapshot.next_lineage);
        Ok(())
    }
}
