//! Exchange vectors passed between compartments and the continuous model

use crate::qsp::{ContinuousModel, QspVariable};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Counts a compartment accumulates over one slice (ABM → continuous)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AbmExchange {
    /// Live cancer cells at the final scan
    pub cancer_count: f64,
    pub cancer_deaths: f64,
    /// Cancer deaths caused by cytotoxic T cells
    pub cancer_deaths_by_t: f64,
    pub teff_recruited: f64,
    pub treg_recruited: f64,
}

impl AbmExchange {
    pub const LEN: usize = 5;

    /// `[CC, CC_DEATH, CC_T_KILL, TEFF_REC, TREG_REC]`
    pub fn to_array(&self) -> [f64; Self::LEN] {
        [
            self.cancer_count,
            self.cancer_deaths,
            self.cancer_deaths_by_t,
            self.teff_recruited,
            self.treg_recruited,
        ]
    }

    pub fn from_array(v: [f64; Self::LEN]) -> Self {
        Self {
            cancer_count: v[0],
            cancer_deaths: v[1],
            cancer_deaths_by_t: v[2],
            teff_recruited: v[3],
            treg_recruited: v[4],
        }
    }

    /// Every component multiplied by `k`
    pub fn scaled(&self, k: f64) -> Self {
        Self::from_array(self.to_array().map(|x| x * k))
    }
}

impl AddAssign for AbmExchange {
    fn add_assign(&mut self, rhs: Self) {
        let (a, b) = (self.to_array(), rhs.to_array());
        *self = Self::from_array(std::array::from_fn(|i| a[i] + b[i]));
    }
}

/// Values broadcast to every compartment (continuous → ABM)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QspExchange {
    /// Tumour cancer cells in the model's native unit
    pub tumor_cancer_cells: f64,
    pub central_teff: f64,
    pub central_treg: f64,
    pub tumor_drug: f64,
}

impl QspExchange {
    pub const LEN: usize = 4;

    /// Read the broadcast values from the model's current state
    pub fn read(model: &dyn ContinuousModel) -> Self {
        Self {
            tumor_cancer_cells: model.variable(QspVariable::TumorCancerCells),
            central_teff: model.variable(QspVariable::CentralTeff),
            central_treg: model.variable(QspVariable::CentralTreg),
            tumor_drug: model.variable(QspVariable::TumorDrug),
        }
    }

    /// `[TUM_C, CENT_TEFF, CENT_TREG, DRUG]`
    pub fn to_array(&self) -> [f64; Self::LEN] {
        [
            self.tumor_cancer_cells,
            self.central_teff,
            self.central_treg,
            self.tumor_drug,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_assign_and_scale() {
        let mut total = AbmExchange::default();
        let part = AbmExchange {
            cancer_count: 10.0,
            cancer_deaths: 2.0,
            cancer_deaths_by_t: 1.0,
            teff_recruited: 3.0,
            treg_recruited: 0.0,
        };
        total += part.scaled(0.5);
        total += part;
        assert_eq!(total.to_array(), [15.0, 3.0, 1.5, 4.5, 0.0]);
    }
}
