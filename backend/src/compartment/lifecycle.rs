//! One time slice of a compartment
//!
//! Phases run strictly in order:
//!
//! 1. Recruitment at the entry points
//! 2. Movement
//! 3. State change (scan pass, then state pass bounded to the pre-phase count)
//! 4. Conditional re-centering
//! 5. Final scan: remove dead and dropped-out agents, tally survivors
//! 6. Diffusion substeps
//! 7. Periodic reshuffle of the scheduling order

use super::{Compartment, CompartmentError, SliceContext};
use crate::behavior::{self, sample_t_life, sample_treg_life};
use crate::core::Coord3D;
use crate::exchange::AbmExchange;
use crate::field::{PointSource, IFNG, IL2};
use crate::models::agent::{AgentId, AgentState, AgentType, CellAgent};
use crate::models::stats::StatEvent;
use tracing::{debug, warn};

impl Compartment {
    /// Advance the compartment by one slice
    pub fn time_slice(&mut self, ctx: &mut SliceContext<'_>) -> Result<(), CompartmentError> {
        self.stats.reset();
        self.exchange = AbmExchange::default();
        self.last_shift = None;

        self.recruit(ctx)?;
        self.move_agents(ctx)?;
        self.change_states(ctx)?;

        let interval = ctx.params.shift_interval;
        if self.recenter.enabled && interval > 0 && ctx.slice % interval == 0 {
            self.adjust_center(ctx)?;
        }

        self.final_scan(ctx.params.pdl1_positive_threshold)?;

        if ctx.params.diffusion_enabled {
            self.run_diffusion(ctx);
        }

        let interval = ctx.params.shuffle_interval;
        if interval > 0 && ctx.slice % interval == 0 {
            ctx.rng.shuffle(&mut self.order);
        }

        debug!(
            slice = ctx.slice,
            agents = self.order.len(),
            cancer = self.exchange.cancer_count,
            deaths = self.exchange.cancer_deaths,
            f_tum_cap = self.f_tum_cap,
            "compartment slice done"
        );
        Ok(())
    }

    // ========================================================================
    // Phase 1: recruitment
    // ========================================================================

    fn recruit(&mut self, ctx: &mut SliceContext<'_>) -> Result<(), CompartmentError> {
        let params = ctx.params;
        let p_teff = (self.inputs.central_teff * params.teff_recruit_k).clamp(0.0, 1.0);
        let p_treg = (self.inputs.central_treg * params.treg_recruit_k).clamp(0.0, 1.0);

        for i in 0..self.entry_points.len() {
            if !ctx.rng.bernoulli(p_teff) {
                continue;
            }
            let life = sample_t_life(params, ctx.rng);
            if self.recruit_at(self.entry_points[i], AgentType::TCell, life, ctx)? {
                self.exchange.teff_recruited += 1.0;
            }
        }
        for i in 0..self.entry_points.len() {
            if !ctx.rng.bernoulli(p_treg) {
                continue;
            }
            let life = sample_treg_life(params, ctx.rng);
            if self.recruit_at(self.entry_points[i], AgentType::Treg, life, ctx)? {
                self.exchange.treg_recruited += 1.0;
            }
        }
        Ok(())
    }

    /// Place a recruit around an entry point; `false` when nothing is open
    fn recruit_at(
        &mut self,
        port: Coord3D,
        agent_type: AgentType,
        life: i32,
        ctx: &mut SliceContext<'_>,
    ) -> Result<bool, CompartmentError> {
        let Some(site) =
            self.grid
                .get_one_open_voxel(&self.shapes.proliferation, port, agent_type, ctx.rng)
        else {
            return Ok(false);
        };
        let mut agent = CellAgent::new(agent_type, site);
        agent.life = life;
        let state = agent.state();
        self.place_agent(agent)
            .map_err(|source| CompartmentError::Grid {
                agent: format!("recruited {} at {}", agent_type, site),
                source,
            })?;
        self.stats.inc(StatEvent::Recruit, agent_type, state);
        Ok(true)
    }

    // ========================================================================
    // Phase 2: movement
    // ========================================================================

    fn move_agents(&mut self, ctx: &mut SliceContext<'_>) -> Result<(), CompartmentError> {
        for i in 0..self.order.len() {
            let id = self.order[i];
            let dest = {
                let Some(agent) = self.agents.get(id) else {
                    continue;
                };
                if !agent.is_live() {
                    continue;
                }
                let env = self.env();
                behavior::movement_step(agent, &env, ctx)
            };
            if let Some(dest) = dest {
                self.relocate(id, dest)?;
                if let Some(agent) = self.agents.get(id) {
                    self.stats
                        .inc(StatEvent::Move, agent.agent_type(), agent.state());
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Phase 3: state change
    // ========================================================================

    fn change_states(&mut self, ctx: &mut SliceContext<'_>) -> Result<(), CompartmentError> {
        // Scan pass: observations only
        let scans: Vec<_> = {
            let env = self.env();
            self.order
                .iter()
                .filter_map(|&id| {
                    let agent = self.agents.get(id)?;
                    Some((id, behavior::scan_step(id, agent, &env, ctx.params)))
                })
                .collect()
        };
        for (id, scan) in scans {
            if let Some(agent) = self.agents.get_mut(id) {
                agent.scan = scan;
            }
        }

        // Daughters appended below are not stepped this slice
        let n = self.order.len();
        for i in 0..n {
            let id = self.order[i];
            let Some(mut agent) = self.agents.get(id).cloned() else {
                continue;
            };
            if !agent.is_live() {
                continue;
            }
            let outcome = {
                let env = self.env();
                behavior::state_step(&mut agent, &env, ctx)
            };
            if let Some(slot) = self.agents.get_mut(id) {
                *slot = agent;
            }

            if let Some(target) = outcome.kill {
                if let Some(victim) = self.agents.get_mut(target) {
                    if victim.is_live() {
                        victim.set_dead();
                        victim.killed_by_t = true;
                        self.stats.killed_by_t += 1;
                    }
                }
            }
            if let Some(site) = outcome.divide {
                self.divide(id, site, ctx)?;
            }
        }
        Ok(())
    }

    /// Place a daughter of `parent` at `site`
    fn divide(
        &mut self,
        parent: AgentId,
        site: Coord3D,
        ctx: &mut SliceContext<'_>,
    ) -> Result<(), CompartmentError> {
        let Some(parent) = self.agents.get(parent) else {
            return Ok(());
        };
        let params = ctx.params;
        let mut daughter = parent.create_copy();
        daughter.coord = site;
        match (parent.agent_type(), parent.state()) {
            (AgentType::Cancer, AgentState::CancerStem) => {
                if ctx.rng.bernoulli(params.asymmetric_div_prob) {
                    daughter.set_progenitor(params.progenitor_div_max);
                    daughter.div_countdown = params.progenitor_div_interval;
                    daughter.asymmetric = true;
                }
            }
            (AgentType::TCell, _) => {
                daughter.life = sample_t_life(params, ctx.rng);
            }
            _ => {}
        }
        let (agent_type, state) = (daughter.agent_type(), daughter.state());
        self.place_agent(daughter)
            .map_err(|source| CompartmentError::Grid {
                agent: format!("daughter {} at {}", agent_type, site),
                source,
            })?;
        self.stats.inc(StatEvent::Prolif, agent_type, state);
        Ok(())
    }

    // ========================================================================
    // Phase 5: final scan
    // ========================================================================

    fn final_scan(&mut self, pdl1_threshold: f64) -> Result<(), CompartmentError> {
        let mut kept = Vec::with_capacity(self.order.len());
        let order = std::mem::take(&mut self.order);

        for id in order {
            let Some(agent) = self.agents.get(id) else {
                continue;
            };
            let (agent_type, state) = (agent.agent_type(), agent.state());

            if agent.is_live() {
                self.stats.inc_live(agent_type, state);
                if agent.is_cancer() {
                    self.exchange.cancer_count += 1.0;
                    if agent.pdl1() >= pdl1_threshold {
                        self.stats.pdl1_positive += 1;
                    }
                }
                kept.push(id);
                continue;
            }

            if agent.is_dead() {
                if agent.is_cancer() {
                    self.exchange.cancer_deaths += 1.0;
                    if agent.is_killed_by_t() {
                        self.exchange.cancer_deaths_by_t += 1.0;
                    }
                }
                self.stats.inc(StatEvent::Death, agent_type, state);
                if !agent.is_drop_out() {
                    let coord = agent.coord();
                    if let Err(source) = self.grid.remove_agent(coord, id, agent_type) {
                        warn!(agent = %agent, "dead agent was not registered at its voxel");
                        return Err(CompartmentError::Grid {
                            agent: agent.to_string(),
                            source,
                        });
                    }
                }
            } else if agent.is_drop_out() {
                self.stats.inc(StatEvent::DropOut, agent_type, state);
            } else {
                warn!(agent = %agent, "removal of an agent that is neither dead nor dropped out");
                return Err(CompartmentError::Invariant(format!(
                    "removed agent is neither dead nor dropped out: {}",
                    agent
                )));
            }
            self.agents.remove(id);
        }

        self.order = kept;
        Ok(())
    }

    // ========================================================================
    // Phase 6: diffusion
    // ========================================================================

    fn run_diffusion(&mut self, ctx: &mut SliceContext<'_>) {
        let params = ctx.params;
        let mut sources = Vec::new();
        for (_, agent) in self.agents() {
            match (agent.agent_type(), agent.state()) {
                (AgentType::TCell, AgentState::TCytotoxic) => {
                    sources.push(PointSource {
                        coord: agent.coord(),
                        substrate: IFNG,
                        release: params.ifng_release,
                        uptake: 0.0,
                    });
                    sources.push(PointSource {
                        coord: agent.coord(),
                        substrate: IL2,
                        release: params.il2_release,
                        uptake: 0.0,
                    });
                }
                (AgentType::Cancer, _) => sources.push(PointSource {
                    coord: agent.coord(),
                    substrate: IFNG,
                    release: 0.0,
                    uptake: params.ifng_uptake,
                }),
                _ => {}
            }
        }

        let field = self.field_mut();
        field.clear_point_sources();
        for source in sources {
            field.add_point_source(source);
        }
        let steps = params.molecular_steps.max(1);
        let dt = ctx.dt / steps as f64;
        for _ in 0..steps {
            field.timestep(dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compartment::VoxelContentGen;
    use crate::field::NullField;
    use crate::models::params::AbmParams;
    use crate::rng::RngManager;

    fn contact_params() -> AbmParams {
        AbmParams {
            stem_move_prob: 0.0,
            cancer_move_prob: 0.0,
            t_move_prob: 0.0,
            treg_move_prob: 0.0,
            teff_recruit_k: 0.0,
            treg_recruit_k: 0.0,
            t_kill_prob: 1.0,
            t_div_limit: 0,
            exhaust_prob_treg: 0.0,
            exhaust_prob_pdl1: 0.0,
            senescent_mean_life: 1e12,
            diffusion_enabled: false,
            ..AbmParams::default()
        }
    }

    /// A senescent cancer cell with a cytotoxic T cell next to it
    fn contact(params: &AbmParams) -> Compartment {
        let mut comp = Compartment::new(
            Coord3D::new(3, 3, 3),
            params,
            VoxelContentGen::empty(params.progenitor_div_max),
            Box::new(NullField::new()),
        );
        let mut target = CellAgent::new(AgentType::Cancer, Coord3D::new(1, 1, 1));
        target.set_senescent();
        comp.place_agent(target).unwrap();

        let mut t = CellAgent::new(AgentType::TCell, Coord3D::new(1, 1, 2));
        t.state = AgentState::TCytotoxic;
        t.life = 10;
        t.divisions_left = 0;
        comp.place_agent(t).unwrap();
        comp
    }

    #[test]
    fn test_cytotoxic_contact_kills() {
        let params = contact_params();
        let mut rng = RngManager::new(17);
        let mut comp = contact(&params);

        let mut ctx = SliceContext::new(&params, &mut rng, 0, 3600.0);
        comp.time_slice(&mut ctx).unwrap();

        assert_eq!(comp.stats.killed_by_t, 1);
        assert_eq!(comp.exchange.cancer_deaths, 1.0);
        assert_eq!(comp.exchange.cancer_deaths_by_t, 1.0);
        assert_eq!(comp.agent_count(), 1);
        let (_, t) = comp.agents().next().unwrap();
        assert_eq!(t.state(), AgentState::TCytotoxic);
        assert_eq!(t.life(), 9);
        comp.check_invariants().unwrap();
    }

    #[test]
    fn test_treg_exhaustion_precedes_killing() {
        let params = AbmParams {
            exhaust_prob_treg: 1.0,
            ..contact_params()
        };
        let mut rng = RngManager::new(17);
        let mut comp = contact(&params);
        let mut treg = CellAgent::new(AgentType::Treg, Coord3D::new(1, 2, 2));
        treg.life = 10;
        comp.place_agent(treg).unwrap();

        let mut ctx = SliceContext::new(&params, &mut rng, 0, 3600.0);
        comp.time_slice(&mut ctx).unwrap();

        assert_eq!(comp.stats.killed_by_t, 0);
        assert_eq!(comp.exchange.cancer_deaths, 0.0);
        assert_eq!(comp.exchange.cancer_count, 1.0);
        let suppressed = comp
            .agents()
            .filter(|(_, a)| a.state() == AgentState::TSuppressed)
            .count();
        assert_eq!(suppressed, 1);
    }

    #[test]
    fn test_dead_lymphocyte_is_unregistered() {
        let params = contact_params();
        let mut rng = RngManager::new(3);
        let mut comp = contact(&params);
        for id in comp.order.clone() {
            if let Some(a) = comp.agents.get_mut(id) {
                if a.agent_type() == AgentType::TCell {
                    a.life = 1;
                }
            }
        }

        let mut ctx = SliceContext::new(&params, &mut rng, 0, 3600.0);
        comp.time_slice(&mut ctx).unwrap();

        assert_eq!(comp.agent_count(), 1);
        assert_eq!(comp.grid.registered_count(), 1);
        assert_eq!(comp.exchange.cancer_deaths, 0.0);
        assert_eq!(comp.stats.event_of_type(StatEvent::Death, AgentType::TCell), 1);
    }
}
