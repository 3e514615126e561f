//! Window re-centering decision
//!
//! The window follows the tumour along z only. Shrinking populations pull
//! the window down toward denser tissue; growth, or a centre of mass that
//! drifted up, pushes it up by one voxel.

use crate::core::Coord3D;
use serde::{Deserialize, Serialize};

/// Targets the window tries to hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecenterState {
    pub enabled: bool,
    /// Centre of mass of the cancer population at initialization
    pub target_center: Coord3D,
    /// Cancer count at initialization
    pub target_count: usize,
    /// Hysteresis below the target count before shifting down
    pub threshold: f64,
}

impl Default for RecenterState {
    fn default() -> Self {
        Self {
            enabled: false,
            target_center: Coord3D::ORIGIN,
            target_count: 0,
            threshold: 0.1,
        }
    }
}

/// Integer centre of mass; the origin for an empty population
pub fn center_of_mass(coords: &[Coord3D]) -> Coord3D {
    if coords.is_empty() {
        return Coord3D::ORIGIN;
    }
    let sum = coords.iter().fold(Coord3D::ORIGIN, |acc, &c| acc + c);
    sum / coords.len() as i32
}

/// Window shift requested by the live cancer population, if any
///
/// # Example
/// ```
/// use spqsp_abm_core::grid::{decide_shift, RecenterState};
/// use spqsp_abm_core::Coord3D;
///
/// let state = RecenterState {
///     enabled: true,
///     target_center: Coord3D::ORIGIN,
///     target_count: 100,
///     threshold: 0.1,
/// };
/// let sparse = vec![Coord3D::ORIGIN; 85];
/// assert_eq!(decide_shift(&state, &sparse), Some(Coord3D::z_only(-1)));
/// let steady = vec![Coord3D::ORIGIN; 95];
/// assert_eq!(decide_shift(&state, &steady), None);
/// ```
pub fn decide_shift(state: &RecenterState, live_cancer: &[Coord3D]) -> Option<Coord3D> {
    let n = live_cancer.len();
    if (n as f64) < state.target_count as f64 * (1.0 - state.threshold) {
        return Some(Coord3D::z_only(-1));
    }
    let drift = center_of_mass(live_cancer) - state.target_center;
    if n > state.target_count || drift.z > 0 {
        Some(Coord3D::z_only(1))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(target: usize) -> RecenterState {
        RecenterState {
            enabled: true,
            target_center: Coord3D::new(5, 5, 5),
            target_count: target,
            threshold: 0.1,
        }
    }

    #[test]
    fn test_growth_shifts_up() {
        let cells = vec![Coord3D::new(5, 5, 5); 101];
        assert_eq!(decide_shift(&state(100), &cells), Some(Coord3D::z_only(1)));
    }

    #[test]
    fn test_positive_drift_shifts_up() {
        let cells = vec![Coord3D::new(5, 5, 6); 100];
        assert_eq!(decide_shift(&state(100), &cells), Some(Coord3D::z_only(1)));
    }

    #[test]
    fn test_negative_drift_holds() {
        let cells = vec![Coord3D::new(5, 5, 4); 100];
        assert_eq!(decide_shift(&state(100), &cells), None);
    }

    #[test]
    fn test_center_of_mass_truncates() {
        let cells = [Coord3D::new(0, 0, 0), Coord3D::new(0, 0, 1)];
        assert_eq!(center_of_mass(&cells), Coord3D::ORIGIN);
        assert_eq!(center_of_mass(&[]), Coord3D::ORIGIN);
    }

    #[test]
    fn test_empty_population_with_zero_target() {
        // Nothing to track: count equals target, origin centre of mass
        let s = RecenterState {
            target_center: Coord3D::ORIGIN,
            ..state(0)
        };
        assert_eq!(decide_shift(&s, &[]), None);
    }
}
