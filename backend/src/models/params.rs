//! ABM parameter set
//!
//! All probabilities are per slice and all intervals are in slices unless
//! the field name says otherwise. Derived constants can be recomputed from
//! continuous-model quantities with [`RecruitmentDerivation`].

use crate::grid::OccupancyLimits;
use crate::qsp::AVOGADRO;
use serde::{Deserialize, Serialize};

/// Parameters shared by every agent in a compartment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbmParams {
    pub occupancy: OccupancyLimits,
    /// Voxel edge length (µm)
    pub voxel_size_um: f64,

    // Recruitment
    /// Recruitment probability per unit central Teff concentration
    pub teff_recruit_k: f64,
    /// Recruitment probability per unit central Treg concentration
    pub treg_recruit_k: f64,
    /// Fraction of voxels acting as recruitment ports
    pub rec_port_prob: f64,

    // Cancer cells
    pub stem_move_prob: f64,
    pub cancer_move_prob: f64,
    pub stem_div_interval: u32,
    pub progenitor_div_interval: u32,
    /// Divisions a fresh progenitor may still perform
    pub progenitor_div_max: u32,
    pub asymmetric_div_prob: f64,
    /// Mean senescent life (slices)
    pub senescent_mean_life: f64,
    pub pdl1_ifng_ec50: f64,
    pub pdl1_hill_n: f64,
    /// Fractional PD-L1 loss per slice without IFN-γ induction
    pub pdl1_decay: f64,
    pub pdl1_positive_threshold: f64,

    // CD8
    pub t_move_prob: f64,
    pub t_life_mean: f64,
    pub t_life_sd: f64,
    pub t_kill_prob: f64,
    /// Stem cells are this many times harder to kill
    pub stem_kill_factor: f64,
    pub exhaust_prob_treg: f64,
    pub exhaust_prob_pdl1: f64,
    /// Drug concentration at half PD-1 occupancy
    pub drug_ec50: f64,
    pub t_div_interval: u32,
    pub t_div_limit: u32,
    /// IFN-γ release per cytotoxic T cell (amount / s)
    pub ifng_release: f64,
    /// IL-2 release per cytotoxic T cell (amount / s)
    pub il2_release: f64,
    /// IFN-γ uptake rate by cancer cells (1 / s)
    pub ifng_uptake: f64,

    // Treg
    pub treg_move_prob: f64,
    pub treg_life_mean: f64,

    // Window maintenance
    pub shift_interval: u64,
    pub shift_threshold: f64,
    pub shuffle_interval: u64,
    pub diffusion_enabled: bool,
    pub molecular_steps: u32,

    // Voxel content generator
    pub stem_growth_rate: f64,
    pub progenitor_growth_rate: f64,
    pub senescent_death_rate: f64,
}

impl Default for AbmParams {
    fn default() -> Self {
        Self {
            occupancy: OccupancyLimits::default(),
            voxel_size_um: 20.0,
            teff_recruit_k: 0.0,
            treg_recruit_k: 0.0,
            rec_port_prob: 0.01,
            stem_move_prob: 0.0,
            cancer_move_prob: 0.0,
            stem_div_interval: 24,
            progenitor_div_interval: 12,
            progenitor_div_max: 8,
            asymmetric_div_prob: 0.9,
            senescent_mean_life: 48.0,
            pdl1_ifng_ec50: 1.0e-9,
            pdl1_hill_n: 1.0,
            pdl1_decay: 0.05,
            pdl1_positive_threshold: 0.5,
            t_move_prob: 0.5,
            t_life_mean: 96.0,
            t_life_sd: 24.0,
            t_kill_prob: 0.1,
            stem_kill_factor: 2.0,
            exhaust_prob_treg: 0.01,
            exhaust_prob_pdl1: 0.02,
            drug_ec50: 1.0e-9,
            t_div_interval: 12,
            t_div_limit: 4,
            ifng_release: 1.0e-19,
            il2_release: 1.0e-19,
            ifng_uptake: 1.0e-3,
            treg_move_prob: 0.5,
            treg_life_mean: 96.0,
            shift_interval: 12,
            shift_threshold: 0.1,
            shuffle_interval: 1,
            diffusion_enabled: false,
            molecular_steps: 10,
            stem_growth_rate: 0.01,
            progenitor_growth_rate: 0.05,
            senescent_death_rate: 0.02,
        }
    }
}

impl AbmParams {
    /// Reject settings the slice loop cannot honour
    pub fn validate(&self) -> Result<(), String> {
        let probabilities = [
            ("rec_port_prob", self.rec_port_prob),
            ("stem_move_prob", self.stem_move_prob),
            ("cancer_move_prob", self.cancer_move_prob),
            ("asymmetric_div_prob", self.asymmetric_div_prob),
            ("pdl1_decay", self.pdl1_decay),
            ("t_move_prob", self.t_move_prob),
            ("t_kill_prob", self.t_kill_prob),
            ("exhaust_prob_treg", self.exhaust_prob_treg),
            ("exhaust_prob_pdl1", self.exhaust_prob_pdl1),
            ("treg_move_prob", self.treg_move_prob),
            ("shift_threshold", self.shift_threshold),
        ];
        for (name, p) in probabilities {
            if !(0.0..=1.0).contains(&p) {
                return Err(format!("{} must lie in [0, 1], got {}", name, p));
            }
        }
        if self.voxel_size_um <= 0.0 {
            return Err("voxel_size_um must be > 0".to_string());
        }
        if self.teff_recruit_k < 0.0 || self.treg_recruit_k < 0.0 {
            return Err("recruitment constants must be >= 0".to_string());
        }
        if self.stem_div_interval == 0 || self.progenitor_div_interval == 0 || self.t_div_interval == 0
        {
            return Err("division intervals must be > 0".to_string());
        }
        if self.progenitor_div_max == 0 {
            return Err("progenitor_div_max must be > 0".to_string());
        }
        if self.pdl1_ifng_ec50 <= 0.0 || self.drug_ec50 <= 0.0 {
            return Err("pdl1_ifng_ec50 and drug_ec50 must be > 0".to_string());
        }
        if self.stem_kill_factor < 1.0 {
            return Err("stem_kill_factor must be >= 1".to_string());
        }
        if self.senescent_mean_life <= 0.0 || self.t_life_mean <= 0.0 || self.treg_life_mean <= 0.0
        {
            return Err("mean lifetimes must be > 0".to_string());
        }
        if self.shift_interval == 0 || self.shuffle_interval == 0 {
            return Err("shift_interval and shuffle_interval must be > 0".to_string());
        }
        if self.diffusion_enabled && self.molecular_steps == 0 {
            return Err("molecular_steps must be > 0 when diffusion is enabled".to_string());
        }
        Ok(())
    }

    /// Per-slice death probability of a senescent cell
    pub fn senescent_death_prob(&self) -> f64 {
        1.0 - (-1.0 / self.senescent_mean_life).exp()
    }

    /// Physical volume of one voxel (m³)
    pub fn voxel_volume_m3(&self) -> f64 {
        (self.voxel_size_um * 1e-6).powi(3)
    }

    /// Overwrite the recruitment constants with derived values
    pub fn apply_recruitment(&mut self, derived: &RecruitmentConstants) {
        self.teff_recruit_k = derived.teff_recruit_k;
        self.treg_recruit_k = derived.treg_recruit_k;
        self.rec_port_prob = derived.rec_port_prob;
    }
}

/// Continuous-model quantities the recruitment constants are derived from
///
/// For each mole of adhesion site the model recruits
/// `dt × k_transmig × Cent.T × vol_tum_max × f_vol_bv / vol_central`
/// cells per slice; one recruitment port stands for `sites_per_port` sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecruitmentDerivation {
    /// Adhesion sites per tumour volume (mol / m³)
    pub adhesion_site_density: f64,
    pub sites_per_port: f64,
    /// Teff transmigration rate constant (1 / s)
    pub teff_transmigration: f64,
    /// Treg transmigration rate constant (1 / s)
    pub treg_transmigration: f64,
    /// Maximal tumour volume (m³)
    pub vol_tum_max: f64,
    /// Blood vessel volume fraction of the tumour
    pub f_vol_blood: f64,
    /// Central compartment volume (m³)
    pub vol_central: f64,
}

/// Output of [`RecruitmentDerivation::derive`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecruitmentConstants {
    pub teff_recruit_k: f64,
    pub treg_recruit_k: f64,
    pub rec_port_prob: f64,
}

impl RecruitmentDerivation {
    /// Compute recruitment constants for a given voxel size, slice length
    /// and continuous-model weight
    pub fn derive(
        &self,
        voxel_size_um: f64,
        sec_per_slice: f64,
        hybrid_weight: f64,
    ) -> Result<RecruitmentConstants, String> {
        if self.sites_per_port <= 0.0 {
            return Err("sites_per_port must be > 0".to_string());
        }
        if self.vol_central <= 0.0 {
            return Err("vol_central must be > 0".to_string());
        }
        if hybrid_weight <= 0.0 {
            return Err("hybrid weight must be > 0 to derive recruitment".to_string());
        }
        let site_per_voxel = (voxel_size_um / 1e6).powi(3) * self.adhesion_site_density * AVOGADRO;
        let common = sec_per_slice * self.sites_per_port * self.vol_tum_max * self.f_vol_blood
            / hybrid_weight
            / self.vol_central;
        Ok(RecruitmentConstants {
            teff_recruit_k: self.teff_transmigration * common,
            treg_recruit_k: self.treg_transmigration * common,
            rec_port_prob: site_per_voxel / self.sites_per_port,
        })
    }
}
