//! Cytotoxic T lymphocyte (CD8) rules
//!
//! Effector cells turn cytotoxic on contact with a cancer cell. Cytotoxic
//! cells kill, proliferate a bounded number of times and can be exhausted by
//! Treg contact or PD-L1 engagement; checkpoint blockade lowers the latter.

use super::{division_site, try_move, Environment, StepOutcome};
use crate::compartment::SliceContext;
use crate::core::Coord3D;
use crate::models::agent::{AgentState, CellAgent};

pub(super) fn movement(
    agent: &CellAgent,
    env: &Environment<'_>,
    ctx: &mut SliceContext<'_>,
) -> Option<Coord3D> {
    try_move(agent, ctx.params.t_move_prob, env, ctx)
}

pub(super) fn state(
    agent: &mut CellAgent,
    env: &Environment<'_>,
    ctx: &mut SliceContext<'_>,
) -> StepOutcome {
    agent.life -= 1;
    if agent.life <= 0 {
        agent.set_dead();
        return StepOutcome::default();
    }

    match agent.state() {
        AgentState::TEffector => {
            if !agent.scan.cancer.is_empty() {
                agent.state = AgentState::TCytotoxic;
                agent.divisions_left = ctx.params.t_div_limit;
                agent.div_countdown = ctx.params.t_div_interval;
            }
            StepOutcome::default()
        }
        AgentState::TCytotoxic => cytotoxic_step(agent, env, ctx),
        _ => StepOutcome::default(),
    }
}

fn cytotoxic_step(
    agent: &mut CellAgent,
    env: &Environment<'_>,
    ctx: &mut SliceContext<'_>,
) -> StepOutcome {
    if is_exhausted(agent, env, ctx) {
        agent.state = AgentState::TSuppressed;
        agent.divisions_left = 0;
        return StepOutcome::default();
    }

    let mut outcome = StepOutcome::default();

    // Targets may have died earlier in this pass
    let targets: Vec<_> = agent
        .scan
        .cancer
        .iter()
        .copied()
        .filter(|id| env.agents.get(*id).is_some_and(|c| c.is_live()))
        .collect();
    if !targets.is_empty() {
        let target = targets[ctx.rng.index(targets.len())];
        let is_stem = env
            .agents
            .get(target)
            .is_some_and(|c| c.state() == AgentState::CancerStem);
        let mut p = ctx.params.t_kill_prob;
        if is_stem {
            p /= ctx.params.stem_kill_factor;
        }
        if ctx.rng.bernoulli(p) {
            outcome.kill = Some(target);
        }
    }

    if agent.divisions_left > 0 {
        if agent.div_countdown > 0 {
            agent.div_countdown -= 1;
        }
        if agent.div_countdown == 0 {
            if let Some(site) = division_site(agent, env, ctx) {
                agent.divisions_left -= 1;
                agent.div_countdown = ctx.params.t_div_interval;
                outcome.divide = Some(site);
            }
        }
    }
    outcome
}

/// One exhaustion trial per neighbouring Treg, then one per PD-L1 positive
/// cancer neighbour; stops at the first success
fn is_exhausted(agent: &CellAgent, env: &Environment<'_>, ctx: &mut SliceContext<'_>) -> bool {
    let params = ctx.params;
    for _ in 0..agent.scan.treg {
        if ctx.rng.bernoulli(params.exhaust_prob_treg) {
            return true;
        }
    }
    let drug = env.inputs.tumor_drug.max(0.0);
    let occupancy = drug / (drug + params.drug_ec50);
    let p_pdl1 = params.exhaust_prob_pdl1 * (1.0 - occupancy);
    for _ in 0..agent.scan.pdl1_positive {
        if ctx.rng.bernoulli(p_pdl1) {
            return true;
        }
    }
    false
}
