use super::Compartment;
use crate::core::Coord3D;
use crate::models::agent::AgentType;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Per-voxel agent counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyRecord {
    pub coord: Coord3D,
    pub cancer: u32,
    pub tcell: u32,
    pub treg: u32,
    pub macrophage: u32,
    pub fibroblast: u32,
}

impl Compartment {
    /// Counts for every voxel, x fastest
    pub fn occupancy_dump(&self) -> Vec<OccupancyRecord> {
        self.grid
            .coords()
            .map(|coord| {
                let mut record = OccupancyRecord {
                    coord,
                    ..OccupancyRecord::default()
                };
                let occupants = self.grid.voxel(coord).map(|v| v.occupants()).unwrap_or(&[]);
                for &id in occupants {
                    let Some(agent) = self.agents.get(id) else {
                        continue;
                    };
                    let slot = match agent.agent_type() {
                        AgentType::Cancer => &mut record.cancer,
                        AgentType::TCell => &mut record.tcell,
                        AgentType::Treg => &mut record.treg,
                        AgentType::Macrophage => &mut record.macrophage,
                        AgentType::Fibroblast => &mut record.fibroblast,
                    };
                    *slot += 1;
                }
                record
            })
            .collect()
    }

    /// Occupied voxels as CSV
    pub fn occupancy_csv(&self) -> String {
        let mut out = String::from("x,y,z,cancer,cd8,treg,mac,fib\n");
        for r in self.occupancy_dump() {
            if r.cancer + r.tcell + r.treg + r.macrophage + r.fibroblast == 0 {
                continue;
            }
            let _ = writeln!(
                out,
                "{},{},{},{},{},{},{},{}",
                r.coord.x, r.coord.y, r.coord.z, r.cancer, r.tcell, r.treg, r.macrophage, r.fibroblast
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compartment::{InitialLayout, SliceContext, VoxelContentGen};
    use crate::field::NullField;
    use crate::models::params::AbmParams;
    use crate::rng::RngManager;

    #[test]
    fn test_dump_counts_single_cell() {
        let params = AbmParams::default();
        let mut rng = RngManager::new(1);
        let mut comp = Compartment::new(
            Coord3D::new(3, 3, 3),
            &params,
            VoxelContentGen::empty(params.progenitor_div_max),
            Box::new(NullField::new()),
        );
        let mut ctx = SliceContext::new(&params, &mut rng, 0, 600.0);
        comp.initialize(&InitialLayout::SingleCenter, &mut ctx).unwrap();

        let dump = comp.occupancy_dump();
        assert_eq!(dump.len(), 27);
        assert_eq!(dump.iter().map(|r| r.cancer).sum::<u32>(), 1);
        assert_eq!(comp.occupancy_csv().lines().count(), 2);
        assert!(comp.occupancy_csv().contains("1,1,1,1,0,0,0,0"));
    }
}
