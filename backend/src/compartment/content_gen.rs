//! Probabilistic voxel content generator
//!
//! Used to fill the lattice at initialization and to re-populate voxels
//! exposed by a window shift. Each call draws one category from a CDF over
//! {stem, progenitor with d = dmax..1 divisions left, senescent, empty}.
//!
//! In density mode the CDF follows the steady-state composition of a
//! stem/progenitor/senescent hierarchy scaled by the cancer density.

use crate::core::Coord3D;
use crate::models::params::AbmParams;
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};

/// Axis-aligned box, `min` inclusive and `max` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancerBox {
    pub min: Coord3D,
    pub max: Coord3D,
}

impl CancerBox {
    pub fn contains(&self, c: Coord3D) -> bool {
        (self.min.x..self.max.x).contains(&c.x)
            && (self.min.y..self.max.y).contains(&c.y)
            && (self.min.z..self.max.z).contains(&c.z)
    }
}

/// How a region generates voxel content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ContentGenConfig {
    /// Never create cells
    #[default]
    Empty,
    /// Steady-state hierarchy at `density`; cells only inside `bounds` when
    /// given
    Density {
        density: f64,
        #[serde(default)]
        bounds: Option<CancerBox>,
    },
    /// Fill `bounds` with stem cells (probability `p_stem`) or fresh
    /// progenitors
    StemBox { p_stem: f64, bounds: CancerBox },
}

/// One generated cancer cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedCell {
    Stem,
    Progenitor { divisions: u32 },
    Senescent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoxelContentGen {
    /// `cdf[0]` stem, `cdf[1..=dmax]` progenitors, `cdf[dmax + 1]`
    /// senescent, `cdf[dmax + 2]` empty
    cdf: Vec<f64>,
    dmax: u32,
    bounds: Option<CancerBox>,
}

impl VoxelContentGen {
    /// Generator that never creates cells
    pub fn empty(dmax: u32) -> Self {
        let mut cdf = vec![0.0; dmax as usize + 3];
        cdf[dmax as usize + 2] = 1.0;
        Self {
            cdf,
            dmax,
            bounds: None,
        }
    }

    pub fn from_config(config: &ContentGenConfig, params: &AbmParams) -> Self {
        match config {
            ContentGenConfig::Empty => Self::empty(params.progenitor_div_max),
            ContentGenConfig::Density { density, bounds } => {
                Self::from_density(params, *density, *bounds)
            }
            ContentGenConfig::StemBox { p_stem, bounds } => {
                Self::stem_box(params.progenitor_div_max, *p_stem, *bounds)
            }
        }
    }

    /// Hierarchy composition at a given total cancer density
    pub fn from_density(params: &AbmParams, density: f64, bounds: Option<CancerBox>) -> Self {
        let dmax = params.progenitor_div_max;
        let d = dmax as usize;
        let k = params.asymmetric_div_prob;
        let rs = params.stem_growth_rate;
        let rp = params.progenitor_growth_rate;
        let mu = params.senescent_death_rate;

        let r = rs * (1.0 - k);
        let l0 = k * rs / (r + rp);
        let l1 = 2.0 * rp / (r + rp);
        let l2 = 2.0 * rp / (r + mu);
        // sum of l1^i for i in 0..dmax
        let geometric = if (l1 - 1.0).abs() < 1e-12 {
            dmax as f64
        } else {
            (l1.powi(dmax as i32) - 1.0) / (l1 - 1.0)
        };
        let norm = 1.0 + l0 * geometric + l0 * l2 * l1.powi(dmax as i32 - 1);

        let mut cdf = vec![0.0; d + 3];
        let mut p = density / norm;
        cdf[0] = p;
        p *= l0;
        cdf[1] = cdf[0] + p;
        for i in 2..=d {
            p *= l1;
            cdf[i] = cdf[i - 1] + p;
        }
        p *= l2;
        cdf[d + 1] = cdf[d] + p;
        cdf[d + 2] = 1.0;
        Self { cdf, dmax, bounds }
    }

    /// Stem cells with probability `p_stem`, fresh progenitors otherwise
    pub fn stem_box(dmax: u32, p_stem: f64, bounds: CancerBox) -> Self {
        let mut cdf = vec![1.0; dmax as usize + 3];
        cdf[0] = p_stem;
        Self {
            cdf,
            dmax,
            bounds: Some(bounds),
        }
    }

    pub fn cdf(&self) -> &[f64] {
        &self.cdf
    }

    /// Draw the content of voxel `c`
    ///
    /// Voxels outside the bounds are empty and consume no draw.
    pub fn sample(&self, c: Coord3D, rng: &mut RngManager) -> Option<GeneratedCell> {
        if let Some(bounds) = &self.bounds {
            if !bounds.contains(c) {
                return None;
            }
        }
        let i = rng.sample_cdf(&self.cdf) as u32;
        match i {
            0 => Some(GeneratedCell::Stem),
            i if i <= self.dmax => Some(GeneratedCell::Progenitor {
                divisions: self.dmax + 1 - i,
            }),
            i if i == self.dmax + 1 => Some(GeneratedCell::Senescent),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_density_cdf_monotone_and_scaled() {
        let params = AbmParams::default();
        let gen = VoxelContentGen::from_density(&params, 0.6, None);
        let cdf = gen.cdf();
        assert_eq!(cdf.len(), params.progenitor_div_max as usize + 3);
        assert!(cdf.windows(2).all(|w| w[0] <= w[1]));
        let d = params.progenitor_div_max as usize;
        assert!((cdf[d + 1] - 0.6).abs() < 1e-9, "cell mass equals density");
        assert_eq!(cdf[d + 2], 1.0);
    }

    #[test]
    fn test_empty_generator_never_creates() {
        let gen = VoxelContentGen::empty(4);
        let mut rng = RngManager::new(3);
        for _ in 0..100 {
            assert_eq!(gen.sample(Coord3D::ORIGIN, &mut rng), None);
        }
    }

    #[test]
    fn test_stem_box_outside_bounds_consumes_no_draw() {
        let bounds = CancerBox {
            min: Coord3D::ORIGIN,
            max: Coord3D::new(2, 2, 2),
        };
        let gen = VoxelContentGen::stem_box(3, 1.0, bounds);
        let mut rng = RngManager::new(8);
        let before = rng.get_state();
        assert_eq!(gen.sample(Coord3D::new(5, 0, 0), &mut rng), None);
        assert_eq!(rng.get_state(), before);
        assert_eq!(gen.sample(Coord3D::new(1, 1, 1), &mut rng), Some(GeneratedCell::Stem));
    }

    #[test]
    fn test_stem_box_progenitors_are_fresh() {
        let bounds = CancerBox {
            min: Coord3D::ORIGIN,
            max: Coord3D::new(1, 1, 1),
        };
        let gen = VoxelContentGen::stem_box(3, 0.0, bounds);
        let mut rng = RngManager::new(8);
        assert_eq!(
            gen.sample(Coord3D::ORIGIN, &mut rng),
            Some(GeneratedCell::Progenitor { divisions: 3 })
        );
    }
}
