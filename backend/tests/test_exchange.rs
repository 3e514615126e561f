//! Multiscale exchange: scaling, unit conversion and the resection switch

use spqsp_abm_core::compartment::{EntryPointConfig, InitialCell, InitialLayout};
use spqsp_abm_core::exchange::{
    aggregate, apply_to_model, region_scaler, tumor_volume, window_volume,
};
use spqsp_abm_core::qsp::{QspConstants, StaticModel, AVOGADRO};
use spqsp_abm_core::{
    AbmExchange, AbmParams, AgentState, AgentType, ContinuousModel, Coord3D, CouplingParams,
    Orchestrator, OrchestratorConfig, QspVariable, RegionConfig, RegionKind,
};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(f64::MIN_POSITIVE)
}

fn tumor_model() -> StaticModel {
    StaticModel::new(QspConstants::default())
        .with_variable(QspVariable::TumorCancerCells, 1.0e6)
        .with_variable(QspVariable::TumorTeff, 2.0e4)
}

// ============================================================================
// Scaling and aggregation
// ============================================================================

#[test]
fn test_region_scaler_formula() {
    let s = region_scaler(0.5, 0.3, 2.0e-6, 8.0e-12);
    assert!(close(s, 0.5 * 0.3 * 2.0e-6 / 8.0e-12));
    assert_eq!(region_scaler(0.5, 0.3, 2.0e-6, 0.0), 0.0);
}

#[test]
fn test_tumor_volume_from_cell_counts() {
    let model = tumor_model();
    let k = QspConstants::default();
    let expected = (k.vol_t_cell * 2.0e4 / 0.5 + k.vol_cancer_cell * 1.0e6 / 0.5)
        / (1.0 - k.f_vol_interstitial);
    assert!(close(tumor_volume(&model, 0.5), expected));
}

#[test]
fn test_aggregate_is_sum_of_scaled_parts() {
    let core = AbmExchange {
        cancer_count: 120.0,
        cancer_deaths: 4.0,
        cancer_deaths_by_t: 1.0,
        teff_recruited: 3.0,
        treg_recruited: 1.0,
    };
    let margin = AbmExchange {
        cancer_count: 40.0,
        cancer_deaths: 2.0,
        cancer_deaths_by_t: 2.0,
        teff_recruited: 5.0,
        treg_recruited: 0.0,
    };
    let combined = aggregate(&[(10.0, core), (100.0, margin)]);
    let expected = [
        10.0 * 120.0 + 100.0 * 40.0,
        10.0 * 4.0 + 100.0 * 2.0,
        10.0 * 1.0 + 100.0 * 2.0,
        10.0 * 3.0 + 100.0 * 5.0,
        10.0,
    ];
    for (got, want) in combined.to_array().iter().zip(expected) {
        assert!(close(*got, want));
    }
}

#[test]
fn test_damage_uses_all_deaths_and_ligand_uses_t_kills() {
    let mut model = tumor_model();
    let k = QspConstants::default();
    let combined = AbmExchange {
        cancer_deaths: 10.0 * AVOGADRO,
        cancer_deaths_by_t: 4.0 * AVOGADRO,
        ..AbmExchange::default()
    };
    let report = apply_to_model(&mut model, &combined, 2.0);

    let v_conc = (1.0e6 + k.cell_unit) / k.k_c_max * k.vol_tum_max;
    assert!(close(report.damage, 10.0 * k.n_clone_p10 * k.d_per_c / v_conc * 2.0));
    assert!(close(
        report.checkpoint_ligand,
        4.0 * k.n_clone_treg * k.cp_per_c / v_conc * 2.0
    ));
    assert!(close(report.cytokine_maturation, 4.0 * k.damp_per_c / v_conc * 2.0));
    assert!(close(model.variable(QspVariable::DamageSignal), report.damage));
    // Deaths alone leave the central pools untouched
    assert_eq!(report.central_teff, 0.0);
    assert_eq!(report.central_treg, 0.0);
}

// ============================================================================
// Through the orchestrator
// ============================================================================

fn port_region(kind: RegionKind) -> RegionConfig {
    RegionConfig {
        kind,
        size: Coord3D::new(6, 6, 6),
        layout: InitialLayout::Empty,
        entry: EntryPointConfig {
            explicit: Some(vec![Coord3D::new(1, 1, 1), Coord3D::new(4, 4, 4)]),
            ..EntryPointConfig::default()
        },
        ..RegionConfig::default()
    }
}

#[test]
fn test_recruits_are_removed_from_central_compartment() {
    let config = OrchestratorConfig {
        rng_seed: 5,
        abm: AbmParams {
            teff_recruit_k: 1.0,
            t_move_prob: 0.0,
            ..AbmParams::default()
        },
        regions: vec![port_region(RegionKind::Core)],
        ..OrchestratorConfig::default()
    };
    let model = tumor_model().with_variable(QspVariable::CentralTeff, 1.0);
    let mut orch = Orchestrator::new(config, Box::new(model)).unwrap();

    let result = orch.slice().unwrap();
    let recruited = result.region_exchange[0].teff_recruited;
    assert_eq!(recruited, 2.0, "one recruit per port at probability one");

    let scaled = result.scalers[0] * recruited;
    assert!(close(result.report.combined.teff_recruited, scaled));
    assert!(close(result.report.central_teff, -scaled / AVOGADRO));
    assert!(close(
        orch.model().variable(QspVariable::CentralTeff),
        1.0 - scaled / AVOGADRO
    ));
}

#[test]
fn test_resection_switches_margin_scaler() {
    let config = OrchestratorConfig {
        coupling: CouplingParams {
            resection_enabled: true,
            resection_slice: 2,
            fraction_margin_pre: 0.25,
            fraction_margin_post: 0.75,
            ..CouplingParams::default()
        },
        regions: vec![
            port_region(RegionKind::Core),
            port_region(RegionKind::Margin),
        ],
        ..OrchestratorConfig::default()
    };
    let mut orch = Orchestrator::new(config, Box::new(tumor_model())).unwrap();
    let results = orch.run(5).unwrap();

    let pre = results[0].scalers.clone();
    assert!(close(pre[1] / pre[0], 0.25 / 0.75));
    for r in &results[..3] {
        assert!(close(r.scalers[1], pre[1]), "slice {} still pre-resection", r.slice);
    }
    for r in &results[3..] {
        assert!(close(r.scalers[1], 3.0 * pre[1]), "slice {} post-resection", r.slice);
        assert!(close(r.scalers[0], pre[0] / 3.0));
    }

    let switches = orch.event_log().events_of_type("ResectionSwitch");
    assert_eq!(switches.len(), 1);
    assert_eq!(switches[0].slice(), 3);
}

#[test]
fn test_every_slice_logs_its_exchange() {
    let config = OrchestratorConfig {
        regions: vec![port_region(RegionKind::Core)],
        ..OrchestratorConfig::default()
    };
    let mut orch = Orchestrator::new(config, Box::new(tumor_model())).unwrap();
    orch.run(4).unwrap();
    let applied = orch.event_log().events_of_type("ExchangeApplied");
    let slices: Vec<u64> = applied.iter().map(|e| e.slice()).collect();
    assert_eq!(slices, vec![0, 1, 2, 3]);
}

/// Senescent cancer cells, each with a cytotoxic T cell on top of it
fn kill_region(kind: RegionKind, side: i32, pairs: i32) -> RegionConfig {
    let mut cells = Vec::new();
    for i in 0..pairs {
        let target = Coord3D::new(2 * i + 1, 1, 1);
        cells.push(InitialCell {
            agent_type: AgentType::Cancer,
            state: Some(AgentState::CancerSenescent),
            coord: target,
        });
        cells.push(InitialCell {
            agent_type: AgentType::TCell,
            state: Some(AgentState::TCytotoxic),
            coord: target + Coord3D::z_only(1),
        });
    }
    RegionConfig {
        kind,
        size: Coord3D::new(side, side, side),
        layout: InitialLayout::Explicit {
            cells,
            clusters: vec![],
        },
        ..RegionConfig::default()
    }
}

fn kill_params() -> AbmParams {
    AbmParams {
        stem_move_prob: 0.0,
        cancer_move_prob: 0.0,
        t_move_prob: 0.0,
        treg_move_prob: 0.0,
        teff_recruit_k: 0.0,
        treg_recruit_k: 0.0,
        t_kill_prob: 1.0,
        t_div_limit: 0,
        t_life_mean: 1.0e6,
        exhaust_prob_treg: 0.0,
        exhaust_prob_pdl1: 0.0,
        senescent_mean_life: 1e12,
        diffusion_enabled: false,
        ..AbmParams::default()
    }
}

#[test]
fn test_two_region_kills_reach_model_through_each_scaler() {
    let config = OrchestratorConfig {
        rng_seed: 11,
        abm: kill_params(),
        regions: vec![
            kill_region(RegionKind::Core, 6, 2),
            kill_region(RegionKind::Margin, 8, 1),
        ],
        ..OrchestratorConfig::default()
    };
    let voxel_size_um = config.abm.voxel_size_um;
    let coupling = config.coupling.clone();
    let mut orch = Orchestrator::new(config, Box::new(tumor_model())).unwrap();

    let result = orch.slice().unwrap();

    let core = result.region_exchange[0];
    let margin = result.region_exchange[1];
    assert_eq!(core.cancer_deaths_by_t, 2.0);
    assert_eq!(margin.cancer_deaths_by_t, 1.0);
    assert_eq!(core.cancer_deaths, 2.0);
    assert_eq!(margin.cancer_deaths, 1.0);

    // Scalers follow each window's own volume
    let v_tumor = tumor_volume(&tumor_model(), coupling.hybrid_weight);
    let s_core = region_scaler(
        coupling.hybrid_weight,
        coupling.fraction(RegionKind::Core, 0),
        v_tumor,
        window_volume(6 * 6 * 6, voxel_size_um),
    );
    let s_margin = region_scaler(
        coupling.hybrid_weight,
        coupling.fraction(RegionKind::Margin, 0),
        v_tumor,
        window_volume(8 * 8 * 8, voxel_size_um),
    );
    assert!(close(result.scalers[0], s_core));
    assert!(close(result.scalers[1], s_margin));
    assert!(!close(s_core, s_margin));

    let deaths = s_core * core.cancer_deaths + s_margin * margin.cancer_deaths;
    let kills = s_core * core.cancer_deaths_by_t + s_margin * margin.cancer_deaths_by_t;
    assert!(close(result.report.combined.cancer_deaths, deaths));
    assert!(close(result.report.combined.cancer_deaths_by_t, kills));
    assert!(!close(kills, s_core * 3.0), "margin kills use the margin scaler");

    let k = QspConstants::default();
    let v_conc = (1.0e6 + k.cell_unit) / k.k_c_max * k.vol_tum_max;
    let extra = coupling.qsp_extra;
    let damage = deaths / AVOGADRO * k.n_clone_p10 * k.d_per_c / v_conc * extra;
    let ligand = kills / AVOGADRO * k.n_clone_treg * k.cp_per_c / v_conc * extra;
    let maturation = kills / AVOGADRO * k.damp_per_c / v_conc * extra;

    let model = orch.model();
    assert!(close(model.variable(QspVariable::DamageSignal), damage));
    assert!(close(model.variable(QspVariable::CheckpointLigand), ligand));
    assert!(close(model.variable(QspVariable::CytokineMaturation), maturation));
    assert!(close(result.report.damage, damage));
}

#[test]
fn test_tumor_capacity_fraction_is_broadcast() {
    let config = OrchestratorConfig {
        regions: vec![port_region(RegionKind::Core), port_region(RegionKind::Margin)],
        ..OrchestratorConfig::default()
    };
    let mut orch = Orchestrator::new(config, Box::new(tumor_model())).unwrap();
    orch.slice().unwrap();

    let expected = 1.0e6 / QspConstants::default().max_capacity;
    for region in orch.regions() {
        assert!(close(region.compartment().f_tum_cap(), expected));
    }
}

#[test]
fn test_window_volume_matches_region_size() {
    let v = window_volume(6 * 6 * 6, AbmParams::default().voxel_size_um);
    assert!(close(v, 216.0 * (20.0e-6f64).powi(3)));
}
