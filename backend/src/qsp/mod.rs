//! Continuous (QSP) model interface
//!
//! The ODE system itself lives outside this crate. The coupling layer only
//! reads and writes the named variables below and uses the biophysical
//! constants for unit conversion.

mod static_model;

pub use static_model::StaticModel;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const AVOGADRO: f64 = 6.022_140_76e23;

/// State variables the coupling layer reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QspVariable {
    TumorCancerCells,
    TumorTeff,
    TumorTeffExhausted,
    TumorTreg,
    TumorApc,
    TumorMatureApc,
    CentralTeff,
    CentralTreg,
    TumorDrug,
    CheckpointLigand,
    DamageSignal,
    CytokineMaturation,
}

impl QspVariable {
    pub const ALL: [QspVariable; 12] = [
        QspVariable::TumorCancerCells,
        QspVariable::TumorTeff,
        QspVariable::TumorTeffExhausted,
        QspVariable::TumorTreg,
        QspVariable::TumorApc,
        QspVariable::TumorMatureApc,
        QspVariable::CentralTeff,
        QspVariable::CentralTreg,
        QspVariable::TumorDrug,
        QspVariable::CheckpointLigand,
        QspVariable::DamageSignal,
        QspVariable::CytokineMaturation,
    ];

    /// Position in [`QspVariable::ALL`]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Biophysical constants used for unit conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QspConstants {
    /// One cell expressed in the model's cell-count unit
    pub cell_unit: f64,
    /// Tumour carrying capacity (cells), for the capacity fraction
    pub max_capacity: f64,
    /// Carrying capacity used with `vol_tum_max` for concentration volume
    pub k_c_max: f64,
    /// Maximal tumour volume (m³)
    pub vol_tum_max: f64,
    /// Volume of one T cell (m³)
    pub vol_t_cell: f64,
    /// Volume of one cancer cell (m³)
    pub vol_cancer_cell: f64,
    /// Volume of one antigen presenting cell (m³)
    pub vol_apc: f64,
    /// Interstitial volume fraction of the tumour
    pub f_vol_interstitial: f64,
    /// Damage signal released per dying cell
    pub d_per_c: f64,
    /// Checkpoint ligand released per T-cell kill
    pub cp_per_c: f64,
    /// Cytokine maturation signal released per T-cell kill
    pub damp_per_c: f64,
    pub n_clone_p10: f64,
    pub n_clone_treg: f64,
    pub avogadro: f64,
}

impl Default for QspConstants {
    fn default() -> Self {
        Self {
            cell_unit: 1.0,
            max_capacity: 2.7e10,
            k_c_max: 2.7e10,
            vol_tum_max: 2.7e-5,
            vol_t_cell: 1.76e-16,
            vol_cancer_cell: 2.57e-15,
            vol_apc: 1.63e-15,
            f_vol_interstitial: 0.37,
            d_per_c: 1.0e-6,
            cp_per_c: 1.0e-6,
            damp_per_c: 1.0e-6,
            n_clone_p10: 1.0,
            n_clone_treg: 1.0,
            avogadro: AVOGADRO,
        }
    }
}

impl QspConstants {
    /// Reject constants that would turn the exchange into `inf` or `NaN`
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("max_capacity", self.max_capacity),
            ("k_c_max", self.k_c_max),
            ("vol_tum_max", self.vol_tum_max),
            ("vol_t_cell", self.vol_t_cell),
            ("vol_cancer_cell", self.vol_cancer_cell),
            ("vol_apc", self.vol_apc),
            ("avogadro", self.avogadro),
        ];
        for (name, v) in positive {
            if !(v > 0.0) || !v.is_finite() {
                return Err(format!("{} must be a positive finite number, got {}", name, v));
            }
        }
        if !(0.0..1.0).contains(&self.f_vol_interstitial) {
            return Err(format!(
                "f_vol_interstitial must lie in [0, 1), got {}",
                self.f_vol_interstitial
            ));
        }
        if self.cell_unit < 0.0 {
            return Err("cell_unit must be >= 0".to_string());
        }
        Ok(())
    }
}

/// Failures reported by a continuous model
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IntegratorError {
    #[error("integration from t = {t0} over {duration} s failed: {message}")]
    StepFailure {
        t0: f64,
        duration: f64,
        message: String,
    },

    #[error("state vector has {actual} entries, expected {expected}")]
    StateSize { expected: usize, actual: usize },
}

/// A continuous-time model the orchestrator integrates once per slice
///
/// Setup (parameter loading, initial conditions) is the implementor's
/// constructor. Scheduled events such as dosing are handled inside
/// `solve`.
pub trait ContinuousModel: std::fmt::Debug {
    fn variable(&self, var: QspVariable) -> f64;

    fn set_variable(&mut self, var: QspVariable, value: f64);

    fn constants(&self) -> &QspConstants;

    /// Advance the state over `[t0, t0 + duration)`
    fn solve(&mut self, t0: f64, duration: f64) -> Result<(), IntegratorError>;

    /// Full internal state, for checkpointing
    fn state_vector(&self) -> Vec<f64>;

    fn restore_state_vector(&mut self, state: &[f64]) -> Result<(), IntegratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants_are_valid() {
        assert!(QspConstants::default().validate().is_ok());
    }

    #[test]
    fn test_zero_carrying_capacity_rejected() {
        let k = QspConstants {
            k_c_max: 0.0,
            ..QspConstants::default()
        };
        let err = k.validate().unwrap_err();
        assert!(err.contains("k_c_max"));
    }

    #[test]
    fn test_interstitial_fraction_of_one_rejected() {
        let k = QspConstants {
            f_vol_interstitial: 1.0,
            ..QspConstants::default()
        };
        assert!(k.validate().is_err());
    }
}
