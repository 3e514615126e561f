//! Checkpoint - Save/Load Simulation State
//!
//! Enables serialization and deserialization of complete orchestrator state
//! for pause/resume functionality.
//!
//! # Critical Invariants
//!
//! - **Determinism**: a run resumed from a snapshot continues exactly like
//!   the uninterrupted run (RNG state and collection order are restored)
//! - **Registration**: the grid is rebuilt by re-registering every agent, so
//!   occupancy limits are re-checked on load
//! - **Config Matching**: State can only be loaded with matching config

use crate::compartment::CompartmentSnapshot;
use crate::orchestrator::{Orchestrator, OrchestratorConfig, SimulationError};
use crate::qsp::ContinuousModel;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

/// Snapshot layout version; bumped on incompatible changes
pub const SNAPSHOT_VERSION: u32 = 1;

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Complete orchestrator state snapshot, taken between slices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub version: u32,

    /// Next slice to run
    pub current_slice: u64,

    /// RNG state at time of snapshot (CRITICAL for determinism)
    pub rng_state: u64,

    /// SHA256 hash of original config (for validation)
    pub config_hash: String,

    /// One entry per region, in configuration order
    pub regions: Vec<CompartmentSnapshot>,

    /// Continuous model state vector
    pub model_state: Vec<f64>,
}

// ============================================================================
// Save / Load
// ============================================================================

impl Orchestrator {
    pub fn snapshot(&self) -> Result<StateSnapshot, SimulationError> {
        Ok(StateSnapshot {
            version: SNAPSHOT_VERSION,
            current_slice: self.current_slice(),
            rng_state: self.rng_state(),
            config_hash: compute_config_hash(self.config())?,
            regions: self
                .regions()
                .iter()
                .map(|r| r.compartment().snapshot())
                .collect(),
            model_state: self.model().state_vector(),
        })
    }

    /// Serialize the complete state as JSON
    pub fn save_state(&self) -> Result<String, SimulationError> {
        let snapshot = self.snapshot()?;
        serde_json::to_string(&snapshot).map_err(|e| {
            SimulationError::SerializationError(format!("Snapshot serialization failed: {}", e))
        })
    }

    /// Rebuild an orchestrator from `save_state` output
    ///
    /// `config` must hash to the value recorded in the snapshot; `model`
    /// receives the saved state vector.
    pub fn load_state(
        config: OrchestratorConfig,
        model: Box<dyn ContinuousModel>,
        json: &str,
    ) -> Result<Self, SimulationError> {
        let snapshot: StateSnapshot = serde_json::from_str(json).map_err(|e| {
            SimulationError::DeserializationError(format!("Snapshot parse failed: {}", e))
        })?;

        let expected = compute_config_hash(&config)?;
        if snapshot.config_hash != expected {
            return Err(SimulationError::ConfigMismatch {
                expected,
                actual: snapshot.config_hash,
            });
        }
        validate_snapshot(&snapshot, &config)?;

        let mut orchestrator = Orchestrator::build(config, model)?;
        for (i, (region, saved)) in orchestrator
            .regions_mut()
            .iter_mut()
            .zip(&snapshot.regions)
            .enumerate()
        {
            region.compartment_mut().restore(saved).map_err(|e| {
                SimulationError::StateValidationError(format!("region {}: {}", i, e))
            })?;
        }
        orchestrator
            .model_mut()
            .restore_state_vector(&snapshot.model_state)
            .map_err(|e| SimulationError::StateValidationError(e.to_string()))?;
        orchestrator.restore_clock(snapshot.current_slice, snapshot.rng_state);

        info!(
            slice = snapshot.current_slice,
            agents = orchestrator.total_agents(),
            "state restored"
        );
        Ok(orchestrator)
    }
}

// ============================================================================
// Config Hashing
// ============================================================================

/// SHA256 of the canonical (key-sorted) JSON form of a config
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, SimulationError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(config).map_err(|e| {
        SimulationError::SerializationError(format!("Config serialization failed: {}", e))
    })?;

    // Recursively sort all object keys for canonical representation
    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value)).map_err(|e| {
        SimulationError::SerializationError(format!("Config serialization failed: {}", e))
    })?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Validate state snapshot integrity against the config it will be loaded
/// with
///
/// Checks:
/// - Version and region count
/// - Every agent inside its region's window with a state valid for its type
/// - Lineage ids below the region's next lineage id
/// - Non-zero RNG state
pub fn validate_snapshot(
    snapshot: &StateSnapshot,
    config: &OrchestratorConfig,
) -> Result<(), SimulationError> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SimulationError::StateValidationError(format!(
            "Unsupported snapshot version {} (expected {})",
            snapshot.version, SNAPSHOT_VERSION
        )));
    }
    if snapshot.regions.len() != config.regions.len() {
        return Err(SimulationError::StateValidationError(format!(
            "Snapshot has {} regions, config has {}",
            snapshot.regions.len(),
            config.regions.len()
        )));
    }
    if snapshot.rng_state == 0 {
        return Err(SimulationError::StateValidationError(
            "RNG state must be non-zero".to_string(),
        ));
    }

    for (i, (region, rc)) in snapshot.regions.iter().zip(&config.regions).enumerate() {
        if region.dims != rc.size {
            return Err(SimulationError::StateValidationError(format!(
                "Region {} dimensions {} differ from configured {}",
                i, region.dims, rc.size
            )));
        }
        for agent in &region.agents {
            let c = agent.coord;
            let inside = (0..rc.size.x).contains(&c.x)
                && (0..rc.size.y).contains(&c.y)
                && (0..rc.size.z).contains(&c.z);
            if !inside {
                return Err(SimulationError::StateValidationError(format!(
                    "Region {} agent {} at {} is outside the window",
                    i, agent.agent_type, c
                )));
            }
            if !agent.state.is_valid_for(agent.agent_type) {
                return Err(SimulationError::StateValidationError(format!(
                    "Region {} agent {} has invalid state {:?}",
                    i, agent.agent_type, agent.state
                )));
            }
            if agent.agent_type.is_lymphocyte() && agent.life <= 0 {
                return Err(SimulationError::StateValidationError(format!(
                    "Region {} lymphocyte at {} has no remaining life",
                    i, c
                )));
            }
            if agent.lineage_id >= region.next_lineage && region.next_lineage > 0 {
                return Err(SimulationError::StateValidationError(format!(
                    "Region {} lineage {} not below next lineage {}",
                    i, agent.lineage_id, region.next_lineage
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_config_hash_deterministic() {
        #[derive(Serialize)]
        struct TestConfig {
            value: i32,
            name: String,
        }

        let hash1 = compute_config_hash(&TestConfig {
            value: 42,
            name: "test".to_string(),
        })
        .unwrap();
        let hash2 = compute_config_hash(&TestConfig {
            value: 42,
            name: "test".to_string(),
        })
        .unwrap();

        assert_eq!(hash1, hash2, "Same config should produce same hash");
    }

    #[test]
    fn test_compute_config_hash_different_for_different_configs() {
        let a = OrchestratorConfig::default();
        let b = OrchestratorConfig {
            rng_seed: a.rng_seed + 1,
            ..OrchestratorConfig::default()
        };
        assert_ne!(
            compute_config_hash(&a).unwrap(),
            compute_config_hash(&b).unwrap(),
            "Different configs should produce different hashes"
        );
    }
}
