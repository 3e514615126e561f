//! Explicit finite-volume diffusion on the compartment lattice
//!
//! Forward Euler in time, 7-point Laplacian in space, zero-flux borders.
//! Each call to `timestep` is internally sub-stepped so that every
//! sub-step satisfies the explicit stability bound.

use super::{DiffusibleField, FieldError, PointSource, SUBSTRATE_COUNT};
use crate::core::Coord3D;
use crate::grid::lattice_size;
use serde::{Deserialize, Serialize};

/// Physical constants of the lattice field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeFieldConfig {
    /// Diffusivity per substrate (m² / s)
    pub diffusivity: [f64; SUBSTRATE_COUNT],
    /// First-order decay per substrate (1 / s)
    pub decay: [f64; SUBSTRATE_COUNT],
}

impl Default for LatticeFieldConfig {
    fn default() -> Self {
        Self {
            diffusivity: [1.0e-11, 4.0e-11],
            decay: [6.5e-5, 2.8e-4],
        }
    }
}

#[derive(Debug, Clone)]
pub struct LatticeField {
    dims: Coord3D,
    voxel_size_m: f64,
    config: LatticeFieldConfig,
    /// `values[voxel * SUBSTRATE_COUNT + substrate]`
    values: Vec<f64>,
    sources: Vec<PointSource>,
}

impl LatticeField {
    pub fn new(dims: Coord3D, voxel_size_um: f64, config: LatticeFieldConfig) -> Self {
        let n = lattice_size(dims).unwrap_or(0);
        Self {
            dims,
            voxel_size_m: voxel_size_um * 1e-6,
            config,
            values: vec![0.0; n * SUBSTRATE_COUNT],
            sources: Vec::new(),
        }
    }

    fn index(&self, c: Coord3D) -> Option<usize> {
        let in_grid = (0..self.dims.x).contains(&c.x)
            && (0..self.dims.y).contains(&c.y)
            && (0..self.dims.z).contains(&c.z);
        in_grid.then(|| (c.x + self.dims.x * (c.y + self.dims.y * c.z)) as usize)
    }

    fn coord_of(&self, index: usize) -> Coord3D {
        let i = index as i32;
        Coord3D::new(
            i % self.dims.x,
            (i / self.dims.x) % self.dims.y,
            i / (self.dims.x * self.dims.y),
        )
    }

    fn voxel_count(&self) -> usize {
        self.values.len() / SUBSTRATE_COUNT
    }

    /// Largest stable explicit sub-step
    fn stable_dt(&self) -> f64 {
        let d_max = self
            .config
            .diffusivity
            .iter()
            .copied()
            .fold(0.0_f64, f64::max);
        if d_max <= 0.0 {
            return f64::INFINITY;
        }
        0.9 * self.voxel_size_m * self.voxel_size_m / (6.0 * d_max)
    }

    fn substep(&mut self, dt: f64) {
        let h2 = self.voxel_size_m * self.voxel_size_m;
        let voxel_volume = h2 * self.voxel_size_m;
        let old = self.values.clone();
        let neighbours = [
            Coord3D::new(-1, 0, 0),
            Coord3D::new(1, 0, 0),
            Coord3D::new(0, -1, 0),
            Coord3D::new(0, 1, 0),
            Coord3D::new(0, 0, -1),
            Coord3D::new(0, 0, 1),
        ];

        for v in 0..self.voxel_count() {
            let c = self.coord_of(v);
            for s in 0..SUBSTRATE_COUNT {
                let here = old[v * SUBSTRATE_COUNT + s];
                let mut lap = 0.0;
                for n in neighbours {
                    // zero flux across the border
                    let there = self
                        .index(c + n)
                        .map_or(here, |j| old[j * SUBSTRATE_COUNT + s]);
                    lap += there - here;
                }
                let d = self.config.diffusivity[s];
                let k = self.config.decay[s];
                self.values[v * SUBSTRATE_COUNT + s] = here + dt * (d * lap / h2 - k * here);
            }
        }

        for src in &self.sources {
            if let Some(v) = self.index(src.coord) {
                let i = v * SUBSTRATE_COUNT + src.substrate;
                let released = src.release * dt / voxel_volume;
                let taken = src.uptake * dt * old[i];
                self.values[i] += released - taken;
            }
        }

        for x in &mut self.values {
            if *x < 0.0 {
                *x = 0.0;
            }
        }
    }
}

impl DiffusibleField for LatticeField {
    fn timestep(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let n = (dt / self.stable_dt()).ceil().max(1.0) as usize;
        let sub = dt / n as f64;
        for _ in 0..n {
            self.substep(sub);
        }
    }

    fn concentration(&self, coord: Coord3D, substrate: usize) -> f64 {
        if substrate >= SUBSTRATE_COUNT {
            return 0.0;
        }
        self.index(coord)
            .map_or(0.0, |v| self.values[v * SUBSTRATE_COUNT + substrate])
    }

    fn average_concentration(&self, substrate: usize) -> f64 {
        let n = self.voxel_count();
        if n == 0 || substrate >= SUBSTRATE_COUNT {
            return 0.0;
        }
        let total: f64 = (0..n)
            .map(|v| self.values[v * SUBSTRATE_COUNT + substrate])
            .sum();
        total / n as f64
    }

    fn add_point_source(&mut self, source: PointSource) {
        if source.substrate < SUBSTRATE_COUNT {
            self.sources.push(source);
        }
    }

    fn remove_point_source(&mut self, coord: Coord3D, substrate: usize) {
        self.sources
            .retain(|s| !(s.coord == coord && s.substrate == substrate));
    }

    fn clear_point_sources(&mut self) {
        self.sources.clear();
    }

    fn point_source_count(&self) -> usize {
        self.sources.len()
    }

    fn shift(&mut self, offset: Coord3D) {
        let mut shifted = vec![0.0; self.values.len()];
        for v in 0..self.voxel_count() {
            let target = self.coord_of(v) - offset;
            if let Some(t) = self.index(target) {
                let (from, to) = (v * SUBSTRATE_COUNT, t * SUBSTRATE_COUNT);
                shifted[to..to + SUBSTRATE_COUNT]
                    .copy_from_slice(&self.values[from..from + SUBSTRATE_COUNT]);
            }
        }
        self.values = shifted;
    }

    fn concentrations(&self) -> Vec<f64> {
        self.values.clone()
    }

    fn restore_concentrations(&mut self, values: Vec<f64>) -> Result<(), FieldError> {
        if values.len() != self.values.len() {
            return Err(FieldError::BufferSize {
                expected: self.values.len(),
                actual: values.len(),
            });
        }
        self.values = values;
        Ok(())
    }
}
