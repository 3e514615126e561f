//! Spatial compartment (one simulation region)
//!
//! A compartment owns its lattice, its agents and its diffusible field.
//! Agents live in a generational arena; the voxel grid stores handles and
//! the `order` vector fixes the scheduling order of every phase.
//!
//! # Critical Invariants
//!
//! 1. Every agent in `order` is registered at exactly its coordinate's
//!    voxel, and every registration refers to an agent in `order`
//! 2. Drop-out agents are the only exception, between the re-centering
//!    phase and the final scan of the same slice
//! 3. All randomness is drawn from the stream lent through [`SliceContext`]

mod content_gen;
mod dump;
mod init;
mod lifecycle;
mod recenter;
mod snapshot;

pub use content_gen::{CancerBox, ContentGenConfig, GeneratedCell, VoxelContentGen};
pub use dump::OccupancyRecord;
pub use init::{EntryPointConfig, InitialCell, InitialCluster, InitialLayout};
pub use recenter::ShiftReport;
pub use snapshot::{AgentSnapshot, CompartmentSnapshot};

use crate::behavior::{Environment, Shapes};
use crate::core::Coord3D;
use crate::exchange::{AbmExchange, QspExchange};
use crate::field::DiffusibleField;
use crate::grid::{AgentGrid, GridError, RecenterState};
use crate::models::agent::{AgentId, CellAgent};
use crate::models::params::AbmParams;
use crate::models::stats::Stats;
use crate::rng::RngManager;
use slotmap::SlotMap;
use thiserror::Error;

/// Everything a compartment borrows from its owner for one slice
pub struct SliceContext<'a> {
    pub params: &'a AbmParams,
    pub rng: &'a mut RngManager,
    pub slice: u64,
    /// Slice start time (s)
    pub t: f64,
    /// Slice length (s)
    pub dt: f64,
}

impl<'a> SliceContext<'a> {
    pub fn new(params: &'a AbmParams, rng: &'a mut RngManager, slice: u64, dt: f64) -> Self {
        Self {
            params,
            rng,
            slice,
            t: slice as f64 * dt,
            dt,
        }
    }
}

/// Fatal compartment conditions
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompartmentError {
    #[error("grid registration failed for {agent}: {source}")]
    Grid {
        agent: String,
        #[source]
        source: GridError,
    },

    #[error("{0}")]
    Invariant(String),

    #[error("invalid initial cell: {0}")]
    InvalidInitialCell(String),
}

pub struct Compartment {
    grid: AgentGrid,
    agents: SlotMap<AgentId, CellAgent>,
    /// Scheduling order of the live-agent collection
    order: Vec<AgentId>,
    field: Box<dyn DiffusibleField>,
    entry_points: Vec<Coord3D>,
    stats: Stats,
    exchange: AbmExchange,
    inputs: QspExchange,
    /// Tumour capacity fraction from the last broadcast
    f_tum_cap: f64,
    recenter: RecenterState,
    content_gen: VoxelContentGen,
    shapes: Shapes,
    next_lineage: u64,
    last_shift: Option<ShiftReport>,
}

impl std::fmt::Debug for Compartment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compartment")
            .field("dims", &self.grid.dims())
            .field("agents", &self.order.len())
            .field("entry_points", &self.entry_points.len())
            .field("recenter", &self.recenter)
            .finish()
    }
}

impl Compartment {
    /// Create an empty compartment
    pub fn new(
        dims: Coord3D,
        params: &AbmParams,
        content_gen: VoxelContentGen,
        field: Box<dyn DiffusibleField>,
    ) -> Self {
        Self {
            grid: AgentGrid::new(dims, params.occupancy),
            agents: SlotMap::with_key(),
            order: Vec::new(),
            field,
            entry_points: Vec::new(),
            stats: Stats::new(),
            exchange: AbmExchange::default(),
            inputs: QspExchange::default(),
            f_tum_cap: 0.0,
            recenter: RecenterState {
                threshold: params.shift_threshold,
                ..RecenterState::default()
            },
            content_gen,
            shapes: Shapes::default(),
            next_lineage: 0,
            last_shift: None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn grid(&self) -> &AgentGrid {
        &self.grid
    }

    pub fn dims(&self) -> Coord3D {
        self.grid.dims()
    }

    pub fn field(&self) -> &dyn DiffusibleField {
        self.field.as_ref()
    }

    pub fn agent(&self, id: AgentId) -> Option<&CellAgent> {
        self.agents.get(id)
    }

    /// Agent handles in scheduling order
    pub fn order(&self) -> &[AgentId] {
        &self.order
    }

    /// Agents in scheduling order
    pub fn agents(&self) -> impl Iterator<Item = (AgentId, &CellAgent)> + '_ {
        self.order
            .iter()
            .filter_map(move |&id| self.agents.get(id).map(|a| (id, a)))
    }

    pub fn agent_count(&self) -> usize {
        self.order.len()
    }

    pub fn entry_points(&self) -> &[Coord3D] {
        &self.entry_points
    }

    pub fn add_entry_point(&mut self, c: Coord3D) {
        self.entry_points.push(c);
    }

    pub fn set_entry_points(&mut self, points: Vec<Coord3D>) {
        self.entry_points = points;
    }

    /// Statistics of the last completed slice
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Exchange counters of the last completed slice
    pub fn exchange(&self) -> &AbmExchange {
        &self.exchange
    }

    pub fn inputs(&self) -> &QspExchange {
        &self.inputs
    }

    /// Tumour cancer cells over the carrying capacity, as last broadcast
    pub fn f_tum_cap(&self) -> f64 {
        self.f_tum_cap
    }

    pub fn recenter_state(&self) -> &RecenterState {
        &self.recenter
    }

    pub fn set_shift_enabled(&mut self, enabled: bool) {
        self.recenter.enabled = enabled;
    }

    pub fn set_recenter_state(&mut self, state: RecenterState) {
        self.recenter = state;
    }

    /// Shift performed during the last slice, if any
    pub fn last_shift(&self) -> Option<&ShiftReport> {
        self.last_shift.as_ref()
    }

    pub(crate) fn next_lineage(&self) -> u64 {
        self.next_lineage
    }

    pub(crate) fn set_next_lineage(&mut self, next: u64) {
        self.next_lineage = next;
    }

    pub(crate) fn field_mut(&mut self) -> &mut dyn DiffusibleField {
        self.field.as_mut()
    }

    // ========================================================================
    // Coupling
    // ========================================================================

    /// Receive the continuous-model broadcast for the coming slice
    pub fn update_from_qsp(&mut self, inputs: &QspExchange, max_capacity: f64) {
        self.inputs = *inputs;
        self.f_tum_cap = if max_capacity > 0.0 {
            inputs.tumor_cancer_cells / max_capacity
        } else {
            0.0
        };
    }

    // ========================================================================
    // Agent registration
    // ========================================================================

    fn env(&self) -> Environment<'_> {
        Environment {
            grid: &self.grid,
            agents: &self.agents,
            field: self.field.as_ref(),
            inputs: &self.inputs,
            shapes: &self.shapes,
        }
    }

    fn take_lineage(&mut self) -> u64 {
        let id = self.next_lineage;
        self.next_lineage += 1;
        id
    }

    /// Add an agent to the arena, the grid and the end of the order
    ///
    /// Fails without side effects when the agent's voxel cannot take it.
    pub fn place_agent(&mut self, agent: CellAgent) -> Result<AgentId, GridError> {
        let (coord, agent_type) = (agent.coord(), agent.agent_type());
        let id = self.agents.insert(agent);
        if let Err(e) = self.grid.add_agent(coord, id, agent_type) {
            self.agents.remove(id);
            return Err(e);
        }
        self.order.push(id);
        Ok(id)
    }

    /// Move a registered agent; the old registration is dropped first
    fn relocate(&mut self, id: AgentId, dest: Coord3D) -> Result<(), CompartmentError> {
        let Some(agent) = self.agents.get_mut(id) else {
            return Err(CompartmentError::Invariant(format!(
                "agent handle {:?} missing from arena",
                id
            )));
        };
        let (from, agent_type) = (agent.coord, agent.agent_type);
        let label = agent.to_string();
        self.grid
            .remove_agent(from, id, agent_type)
            .map_err(|source| CompartmentError::Grid {
                agent: label.clone(),
                source,
            })?;
        agent.coord = dest;
        self.grid
            .add_agent(dest, id, agent_type)
            .map_err(|source| CompartmentError::Grid {
                agent: label,
                source,
            })
    }

    // ========================================================================
    // Invariants
    // ========================================================================

    /// Verify registration symmetry and occupancy limits
    pub fn check_invariants(&self) -> Result<(), CompartmentError> {
        let mut registered = 0usize;
        for (id, agent) in self.agents() {
            if agent.is_drop_out() {
                continue;
            }
            let in_voxel = self.grid.voxel(agent.coord()).is_some_and(|v| v.contains(id));
            if !in_voxel {
                return Err(CompartmentError::Invariant(format!(
                    "{} is not registered at its voxel",
                    agent
                )));
            }
            registered += 1;
        }
        if registered != self.grid.registered_count() {
            return Err(CompartmentError::Invariant(format!(
                "{} registrations for {} agents",
                self.grid.registered_count(),
                registered
            )));
        }
        for c in self.grid.coords() {
            let Some(voxel) = self.grid.voxel(c) else {
                continue;
            };
            for &id in voxel.occupants() {
                let matches = self.agents.get(id).is_some_and(|a| a.coord() == c);
                if !matches {
                    return Err(CompartmentError::Invariant(format!(
                        "voxel {} holds an agent located elsewhere",
                        c
                    )));
                }
            }
        }
        self.grid.check_limits().map_err(|c| {
            CompartmentError::Invariant(format!("occupancy limit exceeded at {}", c))
        })
    }
}
