//! Agent behaviour table
//!
//! Every agent shares the [`CellAgent`] record; the three per-slice rules
//! are dispatched here on [`AgentType`]:
//!
//! - **movement_step**: where, if anywhere, the agent moves this slice
//! - **scan_step**: observational neighbour scan (never mutates anything)
//! - **state_step**: state transition, death, killing and division requests
//!
//! Rules never mutate the compartment directly. They read the
//! [`Environment`] and return requests that the lifecycle applies, so the
//! grid and the arena stay consistent between agents.

mod cancer;
mod tcell;
mod treg;

use crate::compartment::SliceContext;
use crate::core::Coord3D;
use crate::exchange::QspExchange;
use crate::field::DiffusibleField;
use crate::grid::{AgentGrid, Shape};
use crate::models::agent::{AgentId, AgentState, AgentType, CellAgent, NeighborScan};
use crate::models::params::AbmParams;
use crate::rng::RngManager;
use slotmap::SlotMap;

/// Candidate shapes used by the behaviour rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shapes {
    pub movement: Shape,
    /// Recruitment, division and cluster seeding
    pub proliferation: Shape,
}

impl Default for Shapes {
    fn default() -> Self {
        Self {
            movement: Shape::von_neumann(),
            proliferation: Shape::moore(),
        }
    }
}

/// Read-only view of a compartment while a rule runs
pub struct Environment<'a> {
    pub grid: &'a AgentGrid,
    pub agents: &'a SlotMap<AgentId, CellAgent>,
    pub field: &'a dyn DiffusibleField,
    pub inputs: &'a QspExchange,
    pub shapes: &'a Shapes,
}

/// Requests produced by a state step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    /// Place a daughter cell at this voxel
    pub divide: Option<Coord3D>,
    /// Mark this cancer cell dead, killed by a T cell
    pub kill: Option<AgentId>,
}

pub fn movement_step(
    agent: &CellAgent,
    env: &Environment<'_>,
    ctx: &mut SliceContext<'_>,
) -> Option<Coord3D> {
    match agent.agent_type() {
        AgentType::Cancer => cancer::movement(agent, env, ctx),
        AgentType::TCell => tcell::movement(agent, env, ctx),
        AgentType::Treg => treg::movement(agent, env, ctx),
        AgentType::Macrophage | AgentType::Fibroblast => None,
    }
}

pub fn scan_step(
    id: AgentId,
    agent: &CellAgent,
    env: &Environment<'_>,
    params: &AbmParams,
) -> NeighborScan {
    match agent.agent_type() {
        AgentType::TCell => scan_neighbors(id, agent, env, params.pdl1_positive_threshold),
        _ => NeighborScan::default(),
    }
}

pub fn state_step(
    agent: &mut CellAgent,
    env: &Environment<'_>,
    ctx: &mut SliceContext<'_>,
) -> StepOutcome {
    match agent.agent_type() {
        AgentType::Cancer => cancer::state(agent, env, ctx),
        AgentType::TCell => tcell::state(agent, env, ctx),
        AgentType::Treg => treg::state(agent),
        AgentType::Macrophage | AgentType::Fibroblast => StepOutcome::default(),
    }
}

/// Move to a random open face neighbour with probability `p`
fn try_move(
    agent: &CellAgent,
    p: f64,
    env: &Environment<'_>,
    ctx: &mut SliceContext<'_>,
) -> Option<Coord3D> {
    if !ctx.rng.bernoulli(p) {
        return None;
    }
    env.grid
        .get_one_open_voxel(&env.shapes.movement, agent.coord(), agent.agent_type(), ctx.rng)
}

/// Open voxel for a daughter of `agent`, if any
fn division_site(
    agent: &CellAgent,
    env: &Environment<'_>,
    ctx: &mut SliceContext<'_>,
) -> Option<Coord3D> {
    env.grid.get_one_open_voxel(
        &env.shapes.proliferation,
        agent.coord(),
        agent.agent_type(),
        ctx.rng,
    )
}

/// Count live neighbours in the agent's own voxel and its Moore shell
fn scan_neighbors(
    id: AgentId,
    agent: &CellAgent,
    env: &Environment<'_>,
    pdl1_threshold: f64,
) -> NeighborScan {
    let mut scan = NeighborScan::default();
    let voxels = std::iter::once(agent.coord()).chain(env.shapes.proliferation.around(agent.coord()));
    for c in voxels {
        let Some(voxel) = env.grid.voxel(c) else {
            continue;
        };
        for &other_id in voxel.occupants() {
            if other_id == id {
                continue;
            }
            let Some(other) = env.agents.get(other_id) else {
                continue;
            };
            if !other.is_live() {
                continue;
            }
            match other.agent_type() {
                AgentType::Cancer => {
                    scan.cancer.push(other_id);
                    if other.pdl1() >= pdl1_threshold {
                        scan.pdl1_positive += 1;
                    }
                }
                AgentType::TCell if other.state() == AgentState::TCytotoxic => {
                    scan.cytotoxic_t += 1;
                }
                AgentType::Treg => scan.treg += 1,
                _ => {}
            }
        }
    }
    scan
}

/// Lifetime of a recruited or newborn CD8 cell (slices, at least one)
pub fn sample_t_life(params: &AbmParams, rng: &mut RngManager) -> i32 {
    rng.normal(params.t_life_mean, params.t_life_sd).round().max(1.0) as i32
}

/// Lifetime of a recruited Treg (slices, at least one)
pub fn sample_treg_life(params: &AbmParams, rng: &mut RngManager) -> i32 {
    rng.exponential(params.treg_life_mean).round().max(1.0) as i32
}
