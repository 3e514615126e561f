//! Diffusible signalling field
//!
//! Compartments talk to the reaction-diffusion solver only through
//! [`DiffusibleField`]. Point sources and sinks belong to agents and are
//! rebuilt from the live population before every diffusion phase, so the
//! field never holds references to agents.

mod lattice;

pub use lattice::{LatticeField, LatticeFieldConfig};

use crate::core::Coord3D;
use thiserror::Error;

/// Interferon gamma, secreted by cytotoxic T cells
pub const IFNG: usize = 0;
/// Interleukin 2, secreted by cytotoxic T cells
pub const IL2: usize = 1;
/// Substrates every field carries
pub const SUBSTRATE_COUNT: usize = 2;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FieldError {
    #[error("concentration buffer has {actual} values, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

/// Secretion into, or uptake from, one voxel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointSource {
    pub coord: Coord3D,
    pub substrate: usize,
    /// Release rate (amount / s)
    pub release: f64,
    /// First-order uptake rate (1 / s)
    pub uptake: f64,
}

/// Interface to a soluble-signal solver
pub trait DiffusibleField: std::fmt::Debug {
    /// Advance the field by `dt` seconds, applying registered sources
    fn timestep(&mut self, dt: f64);

    fn concentration(&self, coord: Coord3D, substrate: usize) -> f64;

    fn average_concentration(&self, substrate: usize) -> f64;

    fn add_point_source(&mut self, source: PointSource);

    /// Remove every source of `substrate` at `coord`
    fn remove_point_source(&mut self, coord: Coord3D, substrate: usize);

    fn clear_point_sources(&mut self);

    fn point_source_count(&self) -> usize;

    /// Move values with a window shift: the value at `c` moves to
    /// `c - offset`, values leaving the window are discarded and exposed
    /// voxels start at zero
    fn shift(&mut self, offset: Coord3D);

    /// Flat copy of every concentration (checkpointing)
    fn concentrations(&self) -> Vec<f64>;

    fn restore_concentrations(&mut self, values: Vec<f64>) -> Result<(), FieldError>;
}

/// Field used when diffusion is disabled: every concentration is zero
#[derive(Debug, Clone, Default)]
pub struct NullField {
    sources: usize,
}

impl NullField {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiffusibleField for NullField {
    fn timestep(&mut self, _dt: f64) {}

    fn concentration(&self, _coord: Coord3D, _substrate: usize) -> f64 {
        0.0
    }

    fn average_concentration(&self, _substrate: usize) -> f64 {
        0.0
    }

    fn add_point_source(&mut self, _source: PointSource) {
        self.sources += 1;
    }

    fn remove_point_source(&mut self, _coord: Coord3D, _substrate: usize) {}

    fn clear_point_sources(&mut self) {
        self.sources = 0;
    }

    fn point_source_count(&self) -> usize {
        self.sources
    }

    fn shift(&mut self, _offset: Coord3D) {}

    fn concentrations(&self) -> Vec<f64> {
        Vec::new()
    }

    fn restore_concentrations(&mut self, values: Vec<f64>) -> Result<(), FieldError> {
        if values.is_empty() {
            Ok(())
        } else {
            Err(FieldError::BufferSize {
                expected: 0,
                actual: values.len(),
            })
        }
    }
}
