//! Voxel records and occupancy rules
//!
//! A voxel holds handles, never agents. Occupancy is tracked as two
//! counters: lymphocytes (CD8 and Treg share one count) and "bulky" cells
//! (cancer, macrophage, fibroblast), which exclude each other.

use crate::models::agent::{AgentId, AgentType};
use serde::{Deserialize, Serialize};

/// Per-voxel occupancy limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OccupancyLimits {
    /// Maximum lymphocytes in a voxel without a bulky cell
    pub n_t_voxel: u32,
    /// Maximum lymphocytes in a voxel that holds a bulky cell
    pub n_t_voxel_c: u32,
}

impl Default for OccupancyLimits {
    fn default() -> Self {
        Self {
            n_t_voxel: 8,
            n_t_voxel_c: 1,
        }
    }
}

/// One lattice cell of the agent grid
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Voxel {
    occupants: Vec<AgentId>,
    lymphocytes: u32,
    bulky: u32,
}

impl Voxel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles registered here, in registration order
    pub fn occupants(&self) -> &[AgentId] {
        &self.occupants
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.occupants.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.occupants.len()
    }

    pub fn lymphocyte_count(&self) -> u32 {
        self.lymphocytes
    }

    pub fn bulky_count(&self) -> u32 {
        self.bulky
    }

    /// Whether one more agent of `agent_type` may enter
    pub fn is_open_to(&self, agent_type: AgentType, limits: &OccupancyLimits) -> bool {
        if agent_type.is_lymphocyte() {
            let cap = if self.bulky > 0 {
                limits.n_t_voxel_c
            } else {
                limits.n_t_voxel
            };
            self.lymphocytes < cap
        } else {
            self.bulky == 0 && self.lymphocytes <= limits.n_t_voxel_c
        }
    }

    /// Whether the current contents respect the limits
    pub fn within_limits(&self, limits: &OccupancyLimits) -> bool {
        if self.bulky > 1 {
            return false;
        }
        let cap = if self.bulky > 0 {
            limits.n_t_voxel_c
        } else {
            limits.n_t_voxel
        };
        self.lymphocytes <= cap
    }

    pub(crate) fn insert(&mut self, id: AgentId, agent_type: AgentType) {
        self.occupants.push(id);
        if agent_type.is_lymphocyte() {
            self.lymphocytes += 1;
        } else {
            self.bulky += 1;
        }
    }

    /// Returns false when `id` was not registered here
    pub(crate) fn remove(&mut self, id: AgentId, agent_type: AgentType) -> bool {
        let Some(pos) = self.occupants.iter().position(|&o| o == id) else {
            return false;
        };
        self.occupants.remove(pos);
        if agent_type.is_lymphocyte() {
            self.lymphocytes = self.lymphocytes.saturating_sub(1);
        } else {
            self.bulky = self.bulky.saturating_sub(1);
        }
        true
    }

    pub(crate) fn clear(&mut self) {
        self.occupants.clear();
        self.lymphocytes = 0;
        self.bulky = 0;
    }
}
