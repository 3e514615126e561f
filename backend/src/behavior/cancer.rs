//! Cancer cell rules
//!
//! Stem cells divide without limit, progenitors for a bounded number of
//! generations before turning senescent, and senescent cells die at a
//! constant hazard. PD-L1 tracks local IFN-γ.

use super::{division_site, try_move, Environment, StepOutcome};
use crate::compartment::SliceContext;
use crate::core::Coord3D;
use crate::field::IFNG;
use crate::models::agent::{AgentState, CellAgent};
use crate::models::params::AbmParams;

pub(super) fn movement(
    agent: &CellAgent,
    env: &Environment<'_>,
    ctx: &mut SliceContext<'_>,
) -> Option<Coord3D> {
    let p = if agent.state() == AgentState::CancerStem {
        ctx.params.stem_move_prob
    } else {
        ctx.params.cancer_move_prob
    };
    try_move(agent, p, env, ctx)
}

pub(super) fn state(
    agent: &mut CellAgent,
    env: &Environment<'_>,
    ctx: &mut SliceContext<'_>,
) -> StepOutcome {
    let ifng = env.field.concentration(agent.coord(), IFNG);
    update_pdl1(agent, ifng, ctx.params);

    match agent.state() {
        AgentState::CancerSenescent => {
            if ctx.rng.bernoulli(ctx.params.senescent_death_prob()) {
                agent.set_dead();
            }
            StepOutcome::default()
        }
        AgentState::CancerProgenitor if agent.divisions_left == 0 => {
            agent.set_senescent();
            StepOutcome::default()
        }
        AgentState::CancerStem => {
            let interval = ctx.params.stem_div_interval;
            StepOutcome {
                divide: divide_when_due(agent, interval, env, ctx),
                kill: None,
            }
        }
        AgentState::CancerProgenitor => {
            let interval = ctx.params.progenitor_div_interval;
            let divide = divide_when_due(agent, interval, env, ctx);
            if divide.is_some() {
                agent.divisions_left -= 1;
            }
            StepOutcome { divide, kill: None }
        }
        _ => StepOutcome::default(),
    }
}

/// Count down and request a division site once the countdown expires
///
/// A blocked division keeps the countdown at zero so it retries next slice.
fn divide_when_due(
    agent: &mut CellAgent,
    interval: u32,
    env: &Environment<'_>,
    ctx: &mut SliceContext<'_>,
) -> Option<Coord3D> {
    if agent.div_countdown > 0 {
        agent.div_countdown -= 1;
    }
    if agent.div_countdown > 0 {
        return None;
    }
    let site = division_site(agent, env, ctx)?;
    agent.div_countdown = interval;
    Some(site)
}

fn update_pdl1(agent: &mut CellAgent, ifng: f64, params: &AbmParams) {
    let n = params.pdl1_hill_n;
    let induced = if ifng > 0.0 {
        let x = ifng.powf(n);
        x / (x + params.pdl1_ifng_ec50.powf(n))
    } else {
        0.0
    };
    let decayed = agent.pdl1 * (1.0 - params.pdl1_decay);
    agent.pdl1 = induced.max(decayed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::agent::AgentType;

    #[test]
    fn test_pdl1_decays_without_ifng() {
        let params = AbmParams::default();
        let mut cell = CellAgent::new(AgentType::Cancer, Coord3D::ORIGIN);
        cell.pdl1 = 1.0;
        update_pdl1(&mut cell, 0.0, &params);
        assert!((cell.pdl1() - (1.0 - params.pdl1_decay)).abs() < 1e-12);
    }

    #[test]
    fn test_pdl1_half_at_ec50() {
        let params = AbmParams::default();
        let mut cell = CellAgent::new(AgentType::Cancer, Coord3D::ORIGIN);
        update_pdl1(&mut cell, params.pdl1_ifng_ec50, &params);
        assert!((cell.pdl1() - 0.5).abs() < 1e-9);
    }
}
