use super::{try_move, Environment, StepOutcome};
use crate::compartment::SliceContext;
use crate::core::Coord3D;
use crate::models::agent::CellAgent;

pub(super) fn movement(
    agent: &CellAgent,
    env: &Environment<'_>,
    ctx: &mut SliceContext<'_>,
) -> Option<Coord3D> {
    try_move(agent, ctx.params.treg_move_prob, env, ctx)
}

pub(super) fn state(agent: &mut CellAgent) -> StepOutcome {
    agent.life -= 1;
    if agent.life <= 0 {
        agent.set_dead();
    }
    StepOutcome::default()
}
