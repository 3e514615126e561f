//! Time management for the simulation
//!
//! The simulation operates in discrete slices of fixed physical duration.
//! One slice covers one ABM step and one continuous-model integration over
//! `[slice × dt, (slice + 1) × dt)`.

use serde::{Deserialize, Serialize};

/// Seconds in one day, used when parameters are given per day
pub const SEC_PER_DAY: f64 = 86_400.0;

/// Manages simulation time in discrete slices
///
/// # Example
/// ```
/// use spqsp_abm_core::TimeManager;
///
/// let mut time = TimeManager::new(3600.0); // one hour per slice
/// assert_eq!(time.current_slice(), 0);
/// assert_eq!(time.slice_start_time(), 0.0);
///
/// time.advance_slice();
/// assert_eq!(time.current_slice(), 1);
/// assert_eq!(time.slice_start_time(), 3600.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeManager {
    /// Total slices elapsed since simulation start
    current_slice: u64,
    /// Physical duration of one slice (seconds)
    sec_per_slice: f64,
}

impl TimeManager {
    /// Create a new TimeManager
    ///
    /// # Arguments
    /// * `sec_per_slice` - Physical duration of one slice in seconds
    pub fn new(sec_per_slice: f64) -> Self {
        assert!(sec_per_slice > 0.0, "sec_per_slice must be positive");
        Self {
            current_slice: 0,
            sec_per_slice,
        }
    }

    /// Restore a clock at a given slice (checkpoint resume)
    pub fn at_slice(sec_per_slice: f64, current_slice: u64) -> Self {
        let mut time = Self::new(sec_per_slice);
        time.current_slice = current_slice;
        time
    }

    /// Advance time by one slice
    pub fn advance_slice(&mut self) {
        self.current_slice += 1;
    }

    /// Get the current slice (total slices since start)
    pub fn current_slice(&self) -> u64 {
        self.current_slice
    }

    /// Duration of one slice in seconds
    pub fn sec_per_slice(&self) -> f64 {
        self.sec_per_slice
    }

    /// Simulated start time of the current slice (seconds)
    pub fn slice_start_time(&self) -> f64 {
        self.current_slice as f64 * self.sec_per_slice
    }

    /// Simulated time in days at the start of the current slice
    pub fn current_day(&self) -> f64 {
        self.slice_start_time() / SEC_PER_DAY
    }

    /// Convert a duration in days into a (fractional) number of slices
    pub fn days_to_slices(&self, days: f64) -> f64 {
        days * SEC_PER_DAY / self.sec_per_slice
    }
}
