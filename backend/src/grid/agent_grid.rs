//! Agent grid: spatial index of agents on the voxel lattice
//!
//! # Critical Invariants
//!
//! - An agent handle is registered in at most one voxel
//! - Registration never exceeds the voxel's occupancy limits
//! - Removing a handle that is not registered is an error, never a no-op

use crate::core::Coord3D;
use crate::grid::shape::Shape;
use crate::grid::voxel::{OccupancyLimits, Voxel};
use crate::models::agent::{AgentId, AgentType};
use crate::rng::RngManager;
use thiserror::Error;

/// Errors raised by grid registration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GridError {
    #[error("{agent_type} agent is not registered at voxel {coord}")]
    AgentNotInVoxel { coord: Coord3D, agent_type: AgentType },

    #[error("coordinate {coord} lies outside the {dims} lattice")]
    OutOfBounds { coord: Coord3D, dims: Coord3D },

    #[error("voxel {coord} is not open to {agent_type}")]
    VoxelFull { coord: Coord3D, agent_type: AgentType },

    #[error("shape has {candidates} candidate offsets but {anchors} anchors")]
    ShapeMismatch { candidates: usize, anchors: usize },
}

/// Largest lattice the flat `i32` index arithmetic supports
pub const MAX_VOXELS: usize = 1 << 28;

/// Voxel count of a `dims` lattice; `None` unless every dimension is
/// positive and the product stays within [`MAX_VOXELS`]
pub fn lattice_size(dims: Coord3D) -> Option<usize> {
    if dims.x <= 0 || dims.y <= 0 || dims.z <= 0 {
        return None;
    }
    (dims.x as usize)
        .checked_mul(dims.y as usize)?
        .checked_mul(dims.z as usize)
        .filter(|&n| n <= MAX_VOXELS)
}

/// Fixed-size 3-D lattice of voxel records
#[derive(Debug, Clone)]
pub struct AgentGrid {
    dims: Coord3D,
    limits: OccupancyLimits,
    voxels: Vec<Voxel>,
}

impl AgentGrid {
    /// Create an empty grid
    ///
    /// # Panics
    /// Panics unless [`lattice_size`] accepts `dims`; configurations are
    /// validated against it before any grid is built
    pub fn new(dims: Coord3D, limits: OccupancyLimits) -> Self {
        let Some(n) = lattice_size(dims) else {
            panic!("unsupported grid dimensions {}", dims);
        };
        Self {
            dims,
            limits,
            voxels: vec![Voxel::new(); n],
        }
    }

    pub fn dims(&self) -> Coord3D {
        self.dims
    }

    pub fn limits(&self) -> &OccupancyLimits {
        &self.limits
    }

    pub fn voxel_count(&self) -> usize {
        self.voxels.len()
    }

    pub fn in_grid(&self, c: Coord3D) -> bool {
        (0..self.dims.x).contains(&c.x)
            && (0..self.dims.y).contains(&c.y)
            && (0..self.dims.z).contains(&c.z)
    }

    /// Flat index, x varying fastest
    pub fn index(&self, c: Coord3D) -> Option<usize> {
        if !self.in_grid(c) {
            return None;
        }
        Some((c.x + self.dims.x * (c.y + self.dims.y * c.z)) as usize)
    }

    pub fn coord_of(&self, index: usize) -> Coord3D {
        let i = index as i32;
        let x = i % self.dims.x;
        let y = (i / self.dims.x) % self.dims.y;
        let z = i / (self.dims.x * self.dims.y);
        Coord3D::new(x, y, z)
    }

    /// Every lattice coordinate in flat-index order
    pub fn coords(&self) -> impl Iterator<Item = Coord3D> + '_ {
        (0..self.voxels.len()).map(move |i| self.coord_of(i))
    }

    pub fn voxel(&self, c: Coord3D) -> Option<&Voxel> {
        self.index(c).map(|i| &self.voxels[i])
    }

    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    /// Occupancy predicate; out-of-window coordinates are never open
    pub fn is_open_to_type(&self, c: Coord3D, agent_type: AgentType) -> bool {
        self.voxel(c)
            .is_some_and(|v| v.is_open_to(agent_type, &self.limits))
    }

    /// Register an agent at a voxel
    pub fn add_agent(
        &mut self,
        c: Coord3D,
        id: AgentId,
        agent_type: AgentType,
    ) -> Result<(), GridError> {
        let idx = self.index(c).ok_or(GridError::OutOfBounds {
            coord: c,
            dims: self.dims,
        })?;
        let voxel = &mut self.voxels[idx];
        if !voxel.is_open_to(agent_type, &self.limits) {
            return Err(GridError::VoxelFull {
                coord: c,
                agent_type,
            });
        }
        voxel.insert(id, agent_type);
        Ok(())
    }

    /// Deregister an agent from a voxel
    pub fn remove_agent(
        &mut self,
        c: Coord3D,
        id: AgentId,
        agent_type: AgentType,
    ) -> Result<(), GridError> {
        let missing = GridError::AgentNotInVoxel {
            coord: c,
            agent_type,
        };
        let idx = self.index(c).ok_or_else(|| missing.clone())?;
        if self.voxels[idx].remove(id, agent_type) {
            Ok(())
        } else {
            Err(missing)
        }
    }

    /// Find one open destination around `origin`
    ///
    /// Candidates are taken from `shape` in a priority order drawn from the
    /// shared stream (one permutation per call); out-of-window candidates
    /// are skipped. The first open candidate `i` yields `origin +
    /// anchors[i]`. Returns `None` when nothing is open.
    pub fn get_one_open_voxel(
        &self,
        shape: &Shape,
        origin: Coord3D,
        agent_type: AgentType,
        rng: &mut RngManager,
    ) -> Option<Coord3D> {
        let mut order: Vec<usize> = (0..shape.len()).collect();
        rng.shuffle(&mut order);
        order
            .into_iter()
            .find(|&i| self.is_open_to_type(origin + shape.offsets()[i], agent_type))
            .map(|i| origin + shape.anchors()[i])
    }

    /// Drop every registration
    pub(crate) fn reset(&mut self) {
        for v in &mut self.voxels {
            v.clear();
        }
    }

    /// Whether every voxel respects the occupancy limits
    pub fn check_limits(&self) -> Result<(), Coord3D> {
        match self
            .voxels
            .iter()
            .position(|v| !v.within_limits(&self.limits))
        {
            Some(i) => Err(self.coord_of(i)),
            None => Ok(()),
        }
    }

    pub fn registered_count(&self) -> usize {
        self.voxels.iter().map(Voxel::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn grid() -> AgentGrid {
        AgentGrid::new(Coord3D::new(4, 3, 2), OccupancyLimits::default())
    }

    #[test]
    fn test_index_round_trip() {
        let g = grid();
        for (i, c) in g.coords().enumerate() {
            assert_eq!(g.index(c), Some(i));
        }
        assert_eq!(g.index(Coord3D::new(4, 0, 0)), None);
        assert_eq!(g.index(Coord3D::new(0, -1, 0)), None);
    }

    #[test]
    fn test_remove_absent_agent_is_error() {
        let mut ids: SlotMap<AgentId, ()> = SlotMap::with_key();
        let mut g = grid();
        let id = ids.insert(());
        let err = g
            .remove_agent(Coord3D::new(1, 1, 1), id, AgentType::Cancer)
            .unwrap_err();
        assert!(matches!(err, GridError::AgentNotInVoxel { .. }));
    }

    #[test]
    fn test_add_to_full_voxel_is_error() {
        let mut ids: SlotMap<AgentId, ()> = SlotMap::with_key();
        let mut g = grid();
        let c = Coord3D::new(0, 0, 0);
        g.add_agent(c, ids.insert(()), AgentType::Cancer).unwrap();
        let err = g.add_agent(c, ids.insert(()), AgentType::Macrophage);
        assert!(matches!(err, Err(GridError::VoxelFull { .. })));
        assert_eq!(g.registered_count(), 1);
    }

    #[test]
    fn test_get_one_open_voxel_none_when_surrounded() {
        let mut ids: SlotMap<AgentId, ()> = SlotMap::with_key();
        let mut g = AgentGrid::new(Coord3D::new(3, 3, 3), OccupancyLimits::default());
        let centre = Coord3D::new(1, 1, 1);
        let coords: Vec<Coord3D> = g.coords().collect();
        for c in coords {
            if c != centre {
                g.add_agent(c, ids.insert(()), AgentType::Fibroblast).unwrap();
            }
        }
        let mut rng = RngManager::new(1);
        assert_eq!(
            g.get_one_open_voxel(&Shape::moore(), centre, AgentType::Cancer, &mut rng),
            None
        );
    }

    #[test]
    fn test_get_one_open_voxel_skips_out_of_window() {
        let g = AgentGrid::new(Coord3D::new(2, 1, 1), OccupancyLimits::default());
        let mut rng = RngManager::new(9);
        for _ in 0..20 {
            let found = g.get_one_open_voxel(
                &Shape::moore(),
                Coord3D::new(0, 0, 0),
                AgentType::TCell,
                &mut rng,
            );
            assert_eq!(found, Some(Coord3D::new(1, 0, 0)));
        }
    }

    #[test]
    fn test_get_one_open_voxel_returns_anchor() {
        let mut ids: SlotMap<AgentId, ()> = SlotMap::with_key();
        let mut g = AgentGrid::new(Coord3D::new(5, 1, 1), OccupancyLimits::default());
        // Two-voxel reach: the far voxel is checked, the near one is returned
        let shape = Shape::with_anchors(
            vec![Coord3D::new(2, 0, 0), Coord3D::new(-2, 0, 0)],
            vec![Coord3D::new(1, 0, 0), Coord3D::new(-1, 0, 0)],
        )
        .unwrap();
        let origin = Coord3D::new(2, 0, 0);
        g.add_agent(Coord3D::new(0, 0, 0), ids.insert(()), AgentType::Cancer)
            .unwrap();
        let mut rng = RngManager::new(4);
        for _ in 0..20 {
            let found = g.get_one_open_voxel(&shape, origin, AgentType::Cancer, &mut rng);
            assert_eq!(found, Some(Coord3D::new(3, 0, 0)));
        }
    }

    #[test]
    fn test_lattice_size_limits() {
        assert_eq!(lattice_size(Coord3D::new(10, 10, 10)), Some(1000));
        assert_eq!(lattice_size(Coord3D::new(0, 10, 10)), None);
        assert_eq!(lattice_size(Coord3D::new(100_000, 100_000, 100_000)), None);
        assert_eq!(lattice_size(Coord3D::new(i32::MAX, i32::MAX, 2)), None);
    }
}
