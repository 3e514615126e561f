//! Window re-centering
//!
//! Agents whose shifted coordinate leaves the window are marked drop-out
//! and stay in the collection until the final scan of the same slice.

use super::{Compartment, CompartmentError, SliceContext};
use crate::core::Coord3D;
use crate::grid::decide_shift;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Outcome of one window shift
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftReport {
    pub offset: Coord3D,
    /// Agents swept out of the window
    pub dropped_out: usize,
    /// Agents relocated inside the window
    pub remained: usize,
    /// Cancer cells created in exposed voxels
    pub repopulated: usize,
}

impl Compartment {
    /// Shift the window if the live cancer population asks for it
    pub(crate) fn adjust_center(
        &mut self,
        ctx: &mut SliceContext<'_>,
    ) -> Result<Option<ShiftReport>, CompartmentError> {
        let cancer: Vec<Coord3D> = self
            .agents()
            .filter(|(_, a)| a.is_cancer() && a.is_live())
            .map(|(_, a)| a.coord())
            .collect();
        let Some(offset) = decide_shift(&self.recenter, &cancer) else {
            return Ok(None);
        };
        let report = self.shift_grid(offset, ctx)?;
        info!(
            slice = ctx.slice,
            offset = %offset,
            live_cancer = cancer.len(),
            target = self.recenter.target_count,
            dropped_out = report.dropped_out,
            repopulated = report.repopulated,
            "window re-centered"
        );
        Ok(Some(report))
    }

    /// Move the window by `offset`: an agent at `c` ends up at `c - offset`
    ///
    /// Exposed voxels are filled by the content generator and the field
    /// moves with the agents.
    pub fn shift_grid(
        &mut self,
        offset: Coord3D,
        ctx: &mut SliceContext<'_>,
    ) -> Result<ShiftReport, CompartmentError> {
        self.grid.reset();

        let mut dropped_out = 0;
        let mut remained = 0;
        for i in 0..self.order.len() {
            let id = self.order[i];
            let Some(agent) = self.agents.get_mut(id) else {
                continue;
            };
            if agent.is_drop_out() {
                continue;
            }
            let moved = agent.coord - offset;
            if self.grid.in_grid(moved) {
                agent.coord = moved;
                let agent_type = agent.agent_type;
                let label = agent.to_string();
                self.grid
                    .add_agent(moved, id, agent_type)
                    .map_err(|source| CompartmentError::Grid {
                        agent: label,
                        source,
                    })?;
                remained += 1;
            } else {
                agent.set_drop_out();
                dropped_out += 1;
            }
        }

        let exposed: Vec<Coord3D> = self
            .grid
            .coords()
            .filter(|&c| !self.grid.in_grid(c + offset))
            .collect();
        let mut repopulated = 0;
        for c in exposed {
            if self.populate_voxel(c, ctx)? {
                repopulated += 1;
            }
        }

        self.field.shift(offset);
        debug!(
            offset = %offset,
            dropped_out,
            remained,
            repopulated,
            "grid shifted"
        );
        let report = ShiftReport {
            offset,
            dropped_out,
            remained,
            repopulated,
        };
        self.last_shift = Some(report.clone());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compartment::{InitialCell, InitialLayout, VoxelContentGen};
    use crate::field::NullField;
    use crate::models::agent::AgentType;
    use crate::models::params::AbmParams;
    use crate::rng::RngManager;

    #[test]
    fn test_shift_conserves_agents() {
        let params = AbmParams::default();
        let mut rng = RngManager::new(5);
        let mut comp = Compartment::new(
            Coord3D::new(3, 3, 3),
            &params,
            VoxelContentGen::empty(params.progenitor_div_max),
            Box::new(NullField::new()),
        );
        let cells = (0..3)
            .map(|z| InitialCell {
                agent_type: AgentType::Cancer,
                state: None,
                coord: Coord3D::new(1, 1, z),
            })
            .collect();
        let layout = InitialLayout::Explicit {
            cells,
            clusters: vec![],
        };
        let mut ctx = SliceContext::new(&params, &mut rng, 0, 600.0);
        comp.initialize(&layout, &mut ctx).unwrap();

        let report = comp.shift_grid(Coord3D::z_only(1), &mut ctx).unwrap();
        assert_eq!(report.dropped_out, 1);
        assert_eq!(report.remained, 2);
        assert_eq!(report.repopulated, 0);
        let zs: Vec<i32> = comp
            .agents()
            .filter(|(_, a)| !a.is_drop_out())
            .map(|(_, a)| a.coord().z)
            .collect();
        assert_eq!(zs, vec![0, 1]);
        comp.check_invariants().unwrap();
    }
}
