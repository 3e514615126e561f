//! Multiscale exchange layer
//!
//! Converts between the spatial compartments (cell counts in a small
//! window) and the continuous model (whole-tumour quantities).
//!
//! # Direction
//!
//! - **Continuous → ABM**: [`QspExchange`] is read from the model and
//!   broadcast unmodified to every compartment
//! - **ABM → continuous**: each compartment's [`AbmExchange`] is scaled by
//!   its region scaler, summed, converted to moles and applied to the
//!   model's state before integration
//!
//! The scaler of a region uses the model's global tumour volume, even when
//! several regions share the tumour.

mod vectors;

pub use vectors::{AbmExchange, QspExchange};

use crate::qsp::{ContinuousModel, QspVariable};
use serde::{Deserialize, Serialize};

/// Which part of the tumour a region samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Core,
    Margin,
}

/// Coupling constants shared by every region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CouplingParams {
    /// Weight `w` of the spatial model in the hybrid volume
    pub hybrid_weight: f64,
    /// Extra factor on released signals
    pub qsp_extra: f64,
    pub resection_enabled: bool,
    /// Last slice that still uses the pre-resection fractions
    pub resection_slice: u64,
    pub fraction_margin_pre: f64,
    pub fraction_margin_post: f64,
}

impl Default for CouplingParams {
    fn default() -> Self {
        Self {
            hybrid_weight: 0.5,
            qsp_extra: 1.0,
            resection_enabled: false,
            resection_slice: 0,
            fraction_margin_pre: 0.5,
            fraction_margin_post: 0.5,
        }
    }
}

impl CouplingParams {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.hybrid_weight > 0.0 && self.hybrid_weight <= 1.0) {
            return Err(format!(
                "hybrid_weight must be in (0, 1], got {}",
                self.hybrid_weight
            ));
        }
        for (name, f) in [
            ("fraction_margin_pre", self.fraction_margin_pre),
            ("fraction_margin_post", self.fraction_margin_post),
        ] {
            if !(0.0..=1.0).contains(&f) {
                return Err(format!("{} must be in [0, 1], got {}", name, f));
            }
        }
        if self.qsp_extra < 0.0 {
            return Err(format!("qsp_extra must be >= 0, got {}", self.qsp_extra));
        }
        Ok(())
    }

    /// Whether slice `slice` runs with the post-resection fractions
    pub fn is_post_resection(&self, slice: u64) -> bool {
        self.resection_enabled && slice > self.resection_slice
    }

    /// Share of the tumour represented by a region of this kind
    pub fn fraction(&self, kind: RegionKind, slice: u64) -> f64 {
        let margin = if self.is_post_resection(slice) {
            self.fraction_margin_post
        } else {
            self.fraction_margin_pre
        };
        match kind {
            RegionKind::Margin => margin,
            RegionKind::Core => 1.0 - margin,
        }
    }
}

/// Tumour volume (m³) from the model's own cell counts
///
/// Cell counts resolved by the spatial model are divided by the hybrid
/// weight; the result is divided by the non-interstitial fraction.
pub fn tumor_volume(model: &dyn ContinuousModel, hybrid_weight: f64) -> f64 {
    let k = model.constants();
    let v = |var| model.variable(var);
    let t_cells = v(QspVariable::TumorTeff) + v(QspVariable::TumorTeffExhausted) + v(QspVariable::TumorTreg);
    let apcs = v(QspVariable::TumorApc) + v(QspVariable::TumorMatureApc);
    let cellular = k.vol_t_cell * t_cells / hybrid_weight
        + k.vol_cancer_cell * v(QspVariable::TumorCancerCells) / hybrid_weight
        + k.vol_apc * apcs;
    cellular / (1.0 - k.f_vol_interstitial)
}

/// Volume (m³) of a window of `voxels` cubic voxels
pub fn window_volume(voxels: usize, voxel_size_um: f64) -> f64 {
    let side = voxel_size_um * 1e-6;
    voxels as f64 * side * side * side
}

/// `(1 - w) * fraction * V_tumor / V_window`
pub fn region_scaler(hybrid_weight: f64, fraction: f64, v_tumor: f64, v_window: f64) -> f64 {
    if v_window <= 0.0 {
        return 0.0;
    }
    (1.0 - hybrid_weight) * fraction * v_tumor / v_window
}

/// `Σ_r scaler_r · exchange_r`
pub fn aggregate(parts: &[(f64, AbmExchange)]) -> AbmExchange {
    let mut combined = AbmExchange::default();
    for (scaler, exchange) in parts {
        combined += exchange.scaled(*scaler);
    }
    combined
}

/// Deltas applied to the continuous model in one slice
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeReport {
    /// Scaled cell counts before mole conversion
    pub combined: AbmExchange,
    pub damage: f64,
    pub checkpoint_ligand: f64,
    pub cytokine_maturation: f64,
    /// Change of central Teff (negative)
    pub central_teff: f64,
    /// Change of central Treg (negative)
    pub central_treg: f64,
}

/// Convert the combined counts to moles and add them to the model state
///
/// No population-level decay scaled by total deaths is applied to the
/// central pools; only recruits leave them.
pub fn apply_to_model(
    model: &mut dyn ContinuousModel,
    combined: &AbmExchange,
    qsp_extra: f64,
) -> ExchangeReport {
    let k = model.constants().clone();
    let moles = combined.scaled(1.0 / k.avogadro);
    let v_conc =
        (model.variable(QspVariable::TumorCancerCells) + k.cell_unit) / k.k_c_max * k.vol_tum_max;

    let report = ExchangeReport {
        combined: *combined,
        damage: moles.cancer_deaths * k.n_clone_p10 * k.d_per_c / v_conc * qsp_extra,
        checkpoint_ligand: moles.cancer_deaths_by_t * k.n_clone_treg * k.cp_per_c / v_conc
            * qsp_extra,
        cytokine_maturation: moles.cancer_deaths_by_t * k.damp_per_c / v_conc * qsp_extra,
        central_teff: -moles.teff_recruited,
        central_treg: -moles.treg_recruited,
    };

    let mut add = |var, delta: f64| {
        let value = model.variable(var) + delta;
        model.set_variable(var, value);
    };
    add(QspVariable::DamageSignal, report.damage);
    add(QspVariable::CheckpointLigand, report.checkpoint_ligand);
    add(QspVariable::CytokineMaturation, report.cytokine_maturation);
    add(QspVariable::CentralTeff, report.central_teff);
    add(QspVariable::CentralTreg, report.central_treg);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qsp::{QspConstants, StaticModel};

    #[test]
    fn test_fraction_switches_after_resection_slice() {
        let coupling = CouplingParams {
            resection_enabled: true,
            resection_slice: 10,
            fraction_margin_pre: 0.3,
            fraction_margin_post: 0.8,
            ..CouplingParams::default()
        };
        assert_eq!(coupling.fraction(RegionKind::Margin, 10), 0.3);
        assert!((coupling.fraction(RegionKind::Core, 10) - 0.7).abs() < 1e-12);
        assert_eq!(coupling.fraction(RegionKind::Margin, 11), 0.8);
        assert!((coupling.fraction(RegionKind::Core, 11) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_disabled_resection_keeps_pre_fraction() {
        let coupling = CouplingParams {
            resection_enabled: false,
            resection_slice: 0,
            fraction_margin_pre: 0.4,
            fraction_margin_post: 0.9,
            ..CouplingParams::default()
        };
        assert_eq!(coupling.fraction(RegionKind::Margin, 1000), 0.4);
    }

    #[test]
    fn test_window_volume() {
        // 1000 voxels of 20 µm
        let v = window_volume(1000, 20.0);
        assert!((v - 8e-12).abs() < 1e-24);
    }

    #[test]
    fn test_recruits_leave_central_compartment() {
        let mut model = StaticModel::new(QspConstants::default())
            .with_variable(QspVariable::CentralTeff, 1.0);
        let combined = AbmExchange {
            teff_recruited: 6.022_140_76e23,
            ..AbmExchange::default()
        };
        let report = apply_to_model(&mut model, &combined, 1.0);
        assert!((report.central_teff + 1.0).abs() < 1e-12);
        assert!(model.variable(QspVariable::CentralTeff).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_zero_weight() {
        let coupling = CouplingParams {
            hybrid_weight: 0.0,
            ..CouplingParams::default()
        };
        assert!(coupling.validate().is_err());
    }
}
