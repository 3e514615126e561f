//! Orchestrator Engine
//!
//! Drives the hybrid model one slice at a time:
//!
//! ```text
//! For each slice s (t = s × dt):
//! 1. Read the continuous model's exchange values
//! 2. Broadcast them to every region
//! 3. Run each region's time slice (configuration order)
//! 4. Scale, aggregate and apply the regions' exchange counts
//! 5. Integrate the continuous model over [t, t + dt)
//! 6. Advance the clock
//! ```
//!
//! # Example
//!
//! ```rust
//! use spqsp_abm_core::orchestrator::{Orchestrator, OrchestratorConfig, RegionConfig};
//! use spqsp_abm_core::qsp::{QspConstants, StaticModel};
//!
//! let config = OrchestratorConfig {
//!     regions: vec![RegionConfig::default()],
//!     ..OrchestratorConfig::default()
//! };
//! let model = StaticModel::new(QspConstants::default());
//! let mut orchestrator = Orchestrator::new(config, Box::new(model)).unwrap();
//!
//! let result = orchestrator.slice().unwrap();
//! assert_eq!(result.slice, 0);
//! assert_eq!(orchestrator.current_slice(), 1);
//! ```

use crate::compartment::{
    Compartment, CompartmentError, ContentGenConfig, EntryPointConfig, InitialLayout,
    ShiftReport, SliceContext, VoxelContentGen,
};
use crate::core::time::TimeManager;
use crate::core::Coord3D;
use crate::exchange::{
    aggregate, apply_to_model, region_scaler, tumor_volume, window_volume, AbmExchange,
    CouplingParams, ExchangeReport, QspExchange, RegionKind,
};
use crate::field::{DiffusibleField, LatticeField, LatticeFieldConfig, NullField};
use crate::grid::{lattice_size, MAX_VOXELS};
use crate::models::event::{Event, EventLog};
use crate::models::params::{AbmParams, RecruitmentDerivation};
use crate::qsp::{ContinuousModel, IntegratorError};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// Configuration Types
// ============================================================================

/// Complete orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// RNG seed for deterministic simulation
    pub rng_seed: u64,

    /// Physical length of one slice (s)
    pub sec_per_slice: f64,

    pub abm: AbmParams,

    pub coupling: CouplingParams,

    /// Derive recruitment constants instead of taking them from `abm`
    pub recruitment: Option<RecruitmentDerivation>,

    /// Diffusion solver settings (used when diffusion is enabled)
    pub field: LatticeFieldConfig,

    /// Regions, run in this order every slice
    pub regions: Vec<RegionConfig>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            rng_seed: 12345,
            sec_per_slice: 21_600.0,
            abm: AbmParams::default(),
            coupling: CouplingParams::default(),
            recruitment: None,
            field: LatticeFieldConfig::default(),
            regions: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_json(json: &str) -> Result<Self, SimulationError> {
        serde_json::from_str(json).map_err(|e| {
            SimulationError::InvalidConfig(format!("config parse failed: {}", e))
        })
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        if !(self.sec_per_slice > 0.0) {
            return Err(SimulationError::InvalidConfig(
                "sec_per_slice must be > 0".to_string(),
            ));
        }
        if self.regions.is_empty() {
            return Err(SimulationError::InvalidConfig(
                "Must have at least one region".to_string(),
            ));
        }
        self.abm.validate().map_err(SimulationError::InvalidConfig)?;
        self.coupling
            .validate()
            .map_err(SimulationError::InvalidConfig)?;

        for (i, region) in self.regions.iter().enumerate() {
            if lattice_size(region.size).is_none() {
                return Err(SimulationError::InvalidConfig(format!(
                    "region {} size {} must be positive with at most {} voxels",
                    i, region.size, MAX_VOXELS
                )));
            }
            match &region.content {
                ContentGenConfig::Density { density, .. } if !(0.0..=1.0).contains(density) => {
                    return Err(SimulationError::InvalidConfig(format!(
                        "region {} cancer density must be in [0, 1], got {}",
                        i, density
                    )));
                }
                ContentGenConfig::StemBox { p_stem, .. } if !(0.0..=1.0).contains(p_stem) => {
                    return Err(SimulationError::InvalidConfig(format!(
                        "region {} p_stem must be in [0, 1], got {}",
                        i, p_stem
                    )));
                }
                _ => {}
            }
            if region.entry.tumor_vas_fold < 0.0 || region.entry.normal_vas_fold < 0.0 {
                return Err(SimulationError::InvalidConfig(format!(
                    "region {} vasculature folds must be >= 0",
                    i
                )));
            }
        }
        Ok(())
    }
}

/// One spatial region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub kind: RegionKind,
    /// Lattice dimensions (voxels)
    pub size: Coord3D,
    pub layout: InitialLayout,
    /// Content of voxels filled at initialization and exposed by shifts
    pub content: ContentGenConfig,
    pub shift_enabled: bool,
    pub entry: EntryPointConfig,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            kind: RegionKind::Core,
            size: Coord3D::new(10, 10, 10),
            layout: InitialLayout::Empty,
            content: ContentGenConfig::Empty,
            shift_enabled: false,
            entry: EntryPointConfig::default(),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Simulation error types
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid initial cell in region {region}: {detail}")]
    InvalidInitialCell { region: usize, detail: String },

    #[error("Invariant violated in region {region} at slice {slice}: {detail}")]
    InvariantViolation {
        slice: u64,
        region: usize,
        detail: String,
    },

    #[error("Continuous model failed at slice {slice}: {source}")]
    IntegratorFailure {
        slice: u64,
        #[source]
        source: IntegratorError,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Config mismatch: expected hash {expected}, got {actual}")]
    ConfigMismatch { expected: String, actual: String },

    #[error("State validation error: {0}")]
    StateValidationError(String),
}

fn region_error(slice: u64, region: usize, err: CompartmentError) -> SimulationError {
    match err {
        CompartmentError::InvalidInitialCell(detail) => {
            SimulationError::InvalidInitialCell { region, detail }
        }
        other => SimulationError::InvariantViolation {
            slice,
            region,
            detail: other.to_string(),
        },
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// A compartment together with the share of the tumour it stands for
#[derive(Debug)]
pub struct Region {
    kind: RegionKind,
    compartment: Compartment,
}

impl Region {
    pub fn kind(&self) -> RegionKind {
        self.kind
    }

    pub fn compartment(&self) -> &Compartment {
        &self.compartment
    }

    pub(crate) fn compartment_mut(&mut self) -> &mut Compartment {
        &mut self.compartment
    }
}

/// Result of a single slice
#[derive(Debug, Clone)]
pub struct SliceResult {
    pub slice: u64,
    /// Scaler of each region, in region order
    pub scalers: Vec<f64>,
    /// Unscaled exchange counts of each region
    pub region_exchange: Vec<AbmExchange>,
    pub report: ExchangeReport,
    /// Window shifts performed this slice, by region index
    pub shifts: Vec<(usize, ShiftReport)>,
}

/// Owns the regions, the continuous model, the clock and the RNG stream
///
/// # Determinism
///
/// All randomness is via `rng_manager` with seeded xorshift64*.
/// Same seed + same config = identical results (deterministic replay).
pub struct Orchestrator {
    config: OrchestratorConfig,
    /// ABM parameters after recruitment derivation
    params: AbmParams,
    regions: Vec<Region>,
    model: Box<dyn ContinuousModel>,
    time_manager: TimeManager,
    rng_manager: RngManager,
    event_log: EventLog,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("slice", &self.time_manager.current_slice())
            .field("regions", &self.regions)
            .field("model", &self.model)
            .finish()
    }
}

impl Orchestrator {
    /// Create an orchestrator and its initial populations
    ///
    /// Every region's layout is created first (configuration order), then
    /// the entry points of every region are generated.
    pub fn new(
        config: OrchestratorConfig,
        model: Box<dyn ContinuousModel>,
    ) -> Result<Self, SimulationError> {
        let mut orchestrator = Self::build(config, model)?;
        let dt = orchestrator.time_manager.sec_per_slice();

        for (i, region) in orchestrator.regions.iter_mut().enumerate() {
            let layout = &orchestrator.config.regions[i].layout;
            let mut ctx =
                SliceContext::new(&orchestrator.params, &mut orchestrator.rng_manager, 0, dt);
            region
                .compartment
                .initialize(layout, &mut ctx)
                .map_err(|e| region_error(0, i, e))?;
        }
        for (i, region) in orchestrator.regions.iter_mut().enumerate() {
            let entry = &orchestrator.config.regions[i].entry;
            region.compartment.generate_entry_points(
                entry,
                orchestrator.params.rec_port_prob,
                &mut orchestrator.rng_manager,
            );
        }

        info!(
            regions = orchestrator.regions.len(),
            agents = orchestrator.total_agents(),
            seed = orchestrator.config.rng_seed,
            "orchestrator initialized"
        );
        Ok(orchestrator)
    }

    /// Validated orchestrator with empty regions
    pub(crate) fn build(
        config: OrchestratorConfig,
        model: Box<dyn ContinuousModel>,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        model
            .constants()
            .validate()
            .map_err(SimulationError::InvalidConfig)?;

        let mut params = config.abm.clone();
        if let Some(derivation) = &config.recruitment {
            let derived = derivation
                .derive(
                    params.voxel_size_um,
                    config.sec_per_slice,
                    config.coupling.hybrid_weight,
                )
                .map_err(SimulationError::InvalidConfig)?;
            params.apply_recruitment(&derived);
            params.validate().map_err(SimulationError::InvalidConfig)?;
            debug!(
                teff_recruit_k = derived.teff_recruit_k,
                treg_recruit_k = derived.treg_recruit_k,
                rec_port_prob = derived.rec_port_prob,
                "recruitment constants derived"
            );
        }

        let regions = config
            .regions
            .iter()
            .map(|rc| {
                let field: Box<dyn DiffusibleField> = if params.diffusion_enabled {
                    Box::new(LatticeField::new(
                        rc.size,
                        params.voxel_size_um,
                        config.field.clone(),
                    ))
                } else {
                    Box::new(NullField::new())
                };
                let content = VoxelContentGen::from_config(&rc.content, &params);
                let mut compartment = Compartment::new(rc.size, &params, content, field);
                compartment.set_shift_enabled(rc.shift_enabled);
                Region {
                    kind: rc.kind,
                    compartment,
                }
            })
            .collect();

        Ok(Self {
            time_manager: TimeManager::new(config.sec_per_slice),
            rng_manager: RngManager::new(config.rng_seed),
            params,
            regions,
            model,
            event_log: EventLog::new(),
            config,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Effective ABM parameters
    pub fn params(&self) -> &AbmParams {
        &self.params
    }

    pub fn current_slice(&self) -> u64 {
        self.time_manager.current_slice()
    }

    /// Simulated time at the start of the next slice (s)
    pub fn current_time(&self) -> f64 {
        self.time_manager.slice_start_time()
    }

    pub fn time_manager(&self) -> &TimeManager {
        &self.time_manager
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, index: usize) -> Option<&Region> {
        self.regions.get(index)
    }

    pub fn model(&self) -> &dyn ContinuousModel {
        self.model.as_ref()
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn rng_state(&self) -> u64 {
        self.rng_manager.get_state()
    }

    pub fn total_agents(&self) -> usize {
        self.regions.iter().map(|r| r.compartment.agent_count()).sum()
    }

    pub(crate) fn regions_mut(&mut self) -> &mut [Region] {
        &mut self.regions
    }

    pub(crate) fn model_mut(&mut self) -> &mut dyn ContinuousModel {
        self.model.as_mut()
    }

    pub(crate) fn restore_clock(&mut self, current_slice: u64, rng_state: u64) {
        self.time_manager = TimeManager::at_slice(self.config.sec_per_slice, current_slice);
        self.rng_manager = RngManager::new(rng_state);
    }

    // ========================================================================
    // Main loop
    // ========================================================================

    /// Run one slice
    ///
    /// On integrator failure the clock is not advanced; region mutations of
    /// the slice are kept.
    pub fn slice(&mut self) -> Result<SliceResult, SimulationError> {
        let slice = self.time_manager.current_slice();
        let t = self.time_manager.slice_start_time();
        let dt = self.time_manager.sec_per_slice();
        let coupling = &self.config.coupling;

        // QSP -> ABM
        let inputs = QspExchange::read(self.model.as_ref());
        let max_capacity = self.model.constants().max_capacity;
        for region in &mut self.regions {
            region.compartment.update_from_qsp(&inputs, max_capacity);
        }

        if coupling.resection_enabled && slice == coupling.resection_slice + 1 {
            info!(
                slice,
                fraction_margin = coupling.fraction_margin_post,
                "switching to post-resection region fractions"
            );
            self.event_log.log(Event::ResectionSwitch {
                slice,
                fraction_margin: coupling.fraction_margin_post,
            });
        }

        // Regions
        let mut shifts = Vec::new();
        for (i, region) in self.regions.iter_mut().enumerate() {
            let mut ctx = SliceContext::new(&self.params, &mut self.rng_manager, slice, dt);
            if let Err(e) = region.compartment.time_slice(&mut ctx) {
                warn!(slice, region = i, error = %e, "region slice failed");
                return Err(region_error(slice, i, e));
            }
            if let Some(shift) = region.compartment.last_shift() {
                self.event_log.log(Event::GridShift {
                    slice,
                    region: i,
                    offset: shift.offset,
                    dropped_out: shift.dropped_out,
                    repopulated: shift.repopulated,
                });
                shifts.push((i, shift.clone()));
            }
        }

        // ABM -> QSP
        let w = coupling.hybrid_weight;
        let v_tumor = tumor_volume(self.model.as_ref(), w);
        let parts: Vec<(f64, AbmExchange)> = self
            .regions
            .iter()
            .map(|r| {
                let fraction = coupling.fraction(r.kind, slice);
                let v_window =
                    window_volume(r.compartment.grid().voxel_count(), self.params.voxel_size_um);
                (
                    region_scaler(w, fraction, v_tumor, v_window),
                    *r.compartment.exchange(),
                )
            })
            .collect();
        let combined = aggregate(&parts);
        let report = apply_to_model(self.model.as_mut(), &combined, coupling.qsp_extra);
        debug!(
            slice,
            v_tumor,
            cancer = combined.cancer_count,
            deaths = combined.cancer_deaths,
            "exchange applied"
        );
        self.event_log.log(Event::ExchangeApplied {
            slice,
            damage: report.damage,
            checkpoint_ligand: report.checkpoint_ligand,
            cytokine_maturation: report.cytokine_maturation,
            central_teff: report.central_teff,
            central_treg: report.central_treg,
        });

        if let Err(source) = self.model.solve(t, dt) {
            warn!(slice, error = %source, "continuous model failed");
            self.event_log.log(Event::IntegratorFailed {
                slice,
                message: source.to_string(),
            });
            return Err(SimulationError::IntegratorFailure { slice, source });
        }

        self.time_manager.advance_slice();

        Ok(SliceResult {
            slice,
            scalers: parts.iter().map(|(s, _)| *s).collect(),
            region_exchange: parts.into_iter().map(|(_, e)| e).collect(),
            report,
            shifts,
        })
    }

    /// Run `n` slices, stopping at the first error
    pub fn run(&mut self, n: u64) -> Result<Vec<SliceResult>, SimulationError> {
        (0..n).map(|_| self.slice()).collect()
    }

    /// Verify every region's registration and occupancy invariants
    pub fn check_invariants(&self) -> Result<(), SimulationError> {
        let slice = self.current_slice();
        for (i, region) in self.regions.iter().enumerate() {
            region
                .compartment
                .check_invariants()
                .map_err(|e| region_error(slice, i, e))?;
        }
        Ok(())
    }
}
