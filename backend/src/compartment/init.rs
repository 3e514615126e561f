//! Initial population and recruitment entry points

use super::content_gen::GeneratedCell;
use super::{Compartment, CompartmentError, SliceContext};
use crate::core::Coord3D;
use crate::grid::center_of_mass;
use crate::models::agent::{AgentState, AgentType, CellAgent};
use crate::models::stats::StatEvent;
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// One explicitly placed cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialCell {
    pub agent_type: AgentType,
    /// Type default when absent
    #[serde(default)]
    pub state: Option<AgentState>,
    pub coord: Coord3D,
}

impl InitialCell {
    /// Cell from an integer type code
    pub fn from_code(code: u32, coord: Coord3D) -> Result<Self, CompartmentError> {
        let agent_type = AgentType::from_code(code).ok_or_else(|| {
            CompartmentError::InvalidInitialCell(format!("unknown type code {} at {}", code, coord))
        })?;
        Ok(Self {
            agent_type,
            state: None,
            coord,
        })
    }
}

/// `count` cells grown outward from `coord`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialCluster {
    pub agent_type: AgentType,
    #[serde(default)]
    pub state: Option<AgentState>,
    pub coord: Coord3D,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum InitialLayout {
    #[default]
    Empty,
    /// One stem cell at the window centre
    SingleCenter,
    /// Every voxel drawn from the content generator
    RandomFill,
    Explicit {
        #[serde(default)]
        cells: Vec<InitialCell>,
        #[serde(default)]
        clusters: Vec<InitialCluster>,
    },
}

/// Recruitment port placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryPointConfig {
    /// Voxels with z above this are normal tissue; all tumour when absent
    pub boundary_z: Option<i32>,
    pub tumor_vas_fold: f64,
    pub normal_vas_fold: f64,
    /// Use exactly these entry points instead of generating them
    pub explicit: Option<Vec<Coord3D>>,
}

impl Default for EntryPointConfig {
    fn default() -> Self {
        Self {
            boundary_z: None,
            tumor_vas_fold: 1.0,
            normal_vas_fold: 1.0,
            explicit: None,
        }
    }
}

impl Compartment {
    /// Create the initial population
    ///
    /// The resulting cancer population fixes the re-centering targets.
    pub fn initialize(
        &mut self,
        layout: &InitialLayout,
        ctx: &mut SliceContext<'_>,
    ) -> Result<(), CompartmentError> {
        match layout {
            InitialLayout::Empty => {}
            InitialLayout::SingleCenter => {
                let dims = self.dims();
                let center = Coord3D::new(dims.x / 2, dims.y / 2, dims.z / 2);
                self.create_initial_cell(AgentType::Cancer, None, center, ctx)?;
            }
            InitialLayout::RandomFill => {
                let coords: Vec<Coord3D> = self.grid.coords().collect();
                for c in coords {
                    self.populate_voxel(c, ctx)?;
                }
            }
            InitialLayout::Explicit { cells, clusters } => {
                for cell in cells {
                    if !self.grid.is_open_to_type(cell.coord, cell.agent_type)
                        && self.grid.in_grid(cell.coord)
                    {
                        debug!(coord = %cell.coord, agent_type = %cell.agent_type, "initial voxel occupied, skipping");
                        continue;
                    }
                    self.create_initial_cell(cell.agent_type, cell.state, cell.coord, ctx)?;
                }
                for cluster in clusters {
                    self.grow_cluster(cluster, ctx)?;
                }
            }
        }

        let cancer: Vec<Coord3D> = self
            .agents()
            .filter(|(_, a)| a.is_cancer())
            .map(|(_, a)| a.coord())
            .collect();
        self.recenter.target_center = center_of_mass(&cancer);
        self.recenter.target_count = cancer.len();
        debug!(
            agents = self.agent_count(),
            cancer = cancer.len(),
            "compartment initialized"
        );
        Ok(())
    }

    /// Place one initial cell with type-appropriate counters
    fn create_initial_cell(
        &mut self,
        agent_type: AgentType,
        state: Option<AgentState>,
        coord: Coord3D,
        ctx: &mut SliceContext<'_>,
    ) -> Result<(), CompartmentError> {
        let state = state.unwrap_or_else(|| agent_type.default_state());
        if !state.is_valid_for(agent_type) {
            return Err(CompartmentError::InvalidInitialCell(format!(
                "state {:?} is not valid for {}",
                state, agent_type
            )));
        }
        if !self.grid.in_grid(coord) {
            return Err(CompartmentError::InvalidInitialCell(format!(
                "{} at {} lies outside {}",
                agent_type,
                coord,
                self.dims()
            )));
        }

        let params = ctx.params;
        let mut agent = CellAgent::new(agent_type, coord);
        agent.state = state;
        match agent_type {
            AgentType::Cancer => {
                agent.lineage_id = self.take_lineage();
                match state {
                    AgentState::CancerProgenitor => {
                        agent.set_progenitor(params.progenitor_div_max);
                        agent.div_countdown = random_countdown(params.progenitor_div_interval, ctx.rng);
                    }
                    AgentState::CancerSenescent => agent.set_senescent(),
                    _ => {
                        agent.div_countdown = random_countdown(params.stem_div_interval, ctx.rng);
                    }
                }
            }
            AgentType::TCell => {
                agent.life = ((ctx.rng.next_f64() * params.t_life_mean).round() as i32).max(1);
                if state == AgentState::TCytotoxic {
                    agent.divisions_left = params.t_div_limit;
                    agent.div_countdown = params.t_div_interval;
                }
            }
            AgentType::Treg => {
                agent.life = ((ctx.rng.next_f64() * params.treg_life_mean).round() as i32).max(1);
            }
            AgentType::Macrophage | AgentType::Fibroblast => {}
        }

        self.place_agent(agent)
            .map_err(|source| CompartmentError::Grid {
                agent: format!("initial {} at {}", agent_type, coord),
                source,
            })?;
        self.stats.inc(StatEvent::DropIn, agent_type, state);
        Ok(())
    }

    /// Fill one voxel from the content generator
    ///
    /// Returns whether a cell was created. Occupied voxels are left alone.
    pub(crate) fn populate_voxel(
        &mut self,
        c: Coord3D,
        ctx: &mut SliceContext<'_>,
    ) -> Result<bool, CompartmentError> {
        if !self.grid.is_open_to_type(c, AgentType::Cancer) {
            return Ok(false);
        }
        let Some(generated) = self.content_gen.sample(c, ctx.rng) else {
            return Ok(false);
        };
        let params = ctx.params;
        let mut agent = CellAgent::new(AgentType::Cancer, c);
        agent.lineage_id = self.take_lineage();
        let interval = match generated {
            GeneratedCell::Stem => params.stem_div_interval,
            GeneratedCell::Progenitor { divisions } => {
                agent.set_progenitor(divisions);
                params.progenitor_div_interval
            }
            GeneratedCell::Senescent => {
                agent.set_senescent();
                0
            }
        };
        agent.div_countdown = random_countdown(interval, ctx.rng);
        let state = agent.state();
        self.place_agent(agent)
            .map_err(|source| CompartmentError::Grid {
                agent: format!("generated cancer cell at {}", c),
                source,
            })?;
        self.stats.inc(StatEvent::DropIn, AgentType::Cancer, state);
        Ok(true)
    }

    /// Breadth-first growth through the proliferation shape
    fn grow_cluster(
        &mut self,
        cluster: &InitialCluster,
        ctx: &mut SliceContext<'_>,
    ) -> Result<(), CompartmentError> {
        if !matches!(cluster.agent_type, AgentType::Cancer | AgentType::TCell) {
            return Err(CompartmentError::InvalidInitialCell(format!(
                "clusters of {} are not supported",
                cluster.agent_type
            )));
        }
        if cluster.count == 0 {
            return Ok(());
        }

        let mut frontier = VecDeque::new();
        let mut placed = 0usize;
        if self.grid.is_open_to_type(cluster.coord, cluster.agent_type) {
            self.create_initial_cell(cluster.agent_type, cluster.state, cluster.coord, ctx)?;
            frontier.push_back(cluster.coord);
            placed += 1;
        } else if self.grid.in_grid(cluster.coord) {
            frontier.push_back(cluster.coord);
        } else {
            return Err(CompartmentError::InvalidInitialCell(format!(
                "cluster seed {} lies outside {}",
                cluster.coord,
                self.dims()
            )));
        }

        while placed < cluster.count {
            let Some(&seed) = frontier.front() else {
                break;
            };
            let next = self.grid.get_one_open_voxel(
                &self.shapes.proliferation,
                seed,
                cluster.agent_type,
                ctx.rng,
            );
            match next {
                Some(c) => {
                    self.create_initial_cell(cluster.agent_type, cluster.state, c, ctx)?;
                    frontier.push_back(c);
                    placed += 1;
                }
                None => {
                    frontier.pop_front();
                }
            }
        }
        if placed < cluster.count {
            debug!(
                requested = cluster.count,
                placed,
                "cluster ran out of room"
            );
        }
        Ok(())
    }

    /// Choose recruitment ports for this compartment
    pub fn generate_entry_points(
        &mut self,
        config: &EntryPointConfig,
        rec_port_prob: f64,
        rng: &mut RngManager,
    ) {
        if let Some(explicit) = &config.explicit {
            self.entry_points = explicit
                .iter()
                .copied()
                .filter(|&c| self.grid.in_grid(c))
                .collect();
            return;
        }

        let (mut normal, mut tumor): (Vec<Coord3D>, Vec<Coord3D>) = self
            .grid
            .coords()
            .partition(|c| config.boundary_z.is_some_and(|b| c.z > b));

        let k_normal = port_count(normal.len(), config.normal_vas_fold, rec_port_prob);
        let k_tumor = port_count(tumor.len(), config.tumor_vas_fold, rec_port_prob);
        rng.shuffle_first_k(&mut normal, k_normal);
        rng.shuffle_first_k(&mut tumor, k_tumor);

        self.entry_points.clear();
        self.entry_points.extend_from_slice(&normal[..k_normal.min(normal.len())]);
        self.entry_points.extend_from_slice(&tumor[..k_tumor.min(tumor.len())]);
        debug!(
            normal = k_normal,
            tumor = k_tumor,
            "entry points generated"
        );
    }
}

fn port_count(voxels: usize, fold: f64, rec_port_prob: f64) -> usize {
    (voxels as f64 * fold * rec_port_prob).floor().max(0.0) as usize
}

/// Desynchronize initial division clocks: uniform in 1..=interval
fn random_countdown(interval: u32, rng: &mut RngManager) -> u32 {
    if interval == 0 {
        0
    } else {
        rng.index(interval as usize) as u32 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compartment::VoxelContentGen;
    use crate::field::NullField;
    use crate::models::params::AbmParams;

    fn compartment(params: &AbmParams, dims: Coord3D) -> Compartment {
        Compartment::new(
            dims,
            params,
            VoxelContentGen::empty(params.progenitor_div_max),
            Box::new(NullField::new()),
        )
    }

    #[test]
    fn test_single_center_sets_targets() {
        let params = AbmParams::default();
        let mut rng = RngManager::new(1);
        let mut comp = compartment(&params, Coord3D::new(5, 5, 5));
        let mut ctx = SliceContext::new(&params, &mut rng, 0, 600.0);
        comp.initialize(&InitialLayout::SingleCenter, &mut ctx).unwrap();
        assert_eq!(comp.agent_count(), 1);
        assert_eq!(comp.recenter_state().target_center, Coord3D::new(2, 2, 2));
        assert_eq!(comp.recenter_state().target_count, 1);
        comp.check_invariants().unwrap();
    }

    #[test]
    fn test_cluster_respects_occupancy() {
        let params = AbmParams::default();
        let mut rng = RngManager::new(2);
        let mut comp = compartment(&params, Coord3D::new(3, 3, 3));
        let layout = InitialLayout::Explicit {
            cells: vec![],
            clusters: vec![InitialCluster {
                agent_type: AgentType::Cancer,
                state: None,
                coord: Coord3D::new(1, 1, 1),
                count: 40,
            }],
        };
        let mut ctx = SliceContext::new(&params, &mut rng, 0, 600.0);
        comp.initialize(&layout, &mut ctx).unwrap();
        // 27 voxels, one bulky cell each
        assert_eq!(comp.agent_count(), 27);
        comp.check_invariants().unwrap();
    }

    #[test]
    fn test_invalid_state_rejected() {
        let params = AbmParams::default();
        let mut rng = RngManager::new(3);
        let mut comp = compartment(&params, Coord3D::new(3, 3, 3));
        let layout = InitialLayout::Explicit {
            cells: vec![InitialCell {
                agent_type: AgentType::Treg,
                state: Some(AgentState::CancerStem),
                coord: Coord3D::ORIGIN,
            }],
            clusters: vec![],
        };
        let mut ctx = SliceContext::new(&params, &mut rng, 0, 600.0);
        let err = comp.initialize(&layout, &mut ctx).unwrap_err();
        assert!(matches!(err, CompartmentError::InvalidInitialCell(_)));
    }

    #[test]
    fn test_unsupported_cluster_type_rejected() {
        let params = AbmParams::default();
        let mut rng = RngManager::new(3);
        let mut comp = compartment(&params, Coord3D::new(3, 3, 3));
        let layout = InitialLayout::Explicit {
            cells: vec![],
            clusters: vec![InitialCluster {
                agent_type: AgentType::Macrophage,
                state: None,
                coord: Coord3D::ORIGIN,
                count: 2,
            }],
        };
        let mut ctx = SliceContext::new(&params, &mut rng, 0, 600.0);
        assert!(comp.initialize(&layout, &mut ctx).is_err());
    }

    #[test]
    fn test_entry_point_counts() {
        let params = AbmParams::default();
        let mut rng = RngManager::new(4);
        let mut comp = compartment(&params, Coord3D::new(10, 10, 10));
        let config = EntryPointConfig {
            boundary_z: Some(4),
            tumor_vas_fold: 1.0,
            normal_vas_fold: 0.5,
            explicit: None,
        };
        comp.generate_entry_points(&config, 0.1, &mut rng);
        // 500 tumour voxels (z <= 4) and 500 normal voxels
        assert_eq!(comp.entry_points().len(), 25 + 50);
        assert!(comp.entry_points()[..25].iter().all(|c| c.z > 4));
        assert!(comp.entry_points()[25..].iter().all(|c| c.z <= 4));
    }

    #[test]
    fn test_unknown_type_code_is_error() {
        assert!(InitialCell::from_code(0, Coord3D::ORIGIN).is_err());
        assert!(InitialCell::from_code(5, Coord3D::ORIGIN).is_ok());
    }
}
