//! Window re-centering: decision thresholds and conservation of agents

use spqsp_abm_core::compartment::{
    Compartment, ContentGenConfig, InitialCell, InitialLayout, SliceContext, VoxelContentGen,
};
use spqsp_abm_core::field::NullField;
use spqsp_abm_core::grid::{center_of_mass, decide_shift, RecenterState};
use spqsp_abm_core::{AbmParams, AgentState, AgentType, Coord3D, RngManager};

fn still_params() -> AbmParams {
    AbmParams {
        stem_move_prob: 0.0,
        cancer_move_prob: 0.0,
        senescent_mean_life: 1e12,
        shift_interval: 1,
        ..AbmParams::default()
    }
}

/// `n` senescent cancer cells filling the z = 1 layer of a 10x10x3 window
fn layer_compartment(params: &AbmParams, rng: &mut RngManager, n: usize) -> Compartment {
    let mut comp = Compartment::new(
        Coord3D::new(10, 10, 3),
        params,
        VoxelContentGen::empty(params.progenitor_div_max),
        Box::new(NullField::new()),
    );
    let cells = (0..n as i32)
        .map(|i| InitialCell {
            agent_type: AgentType::Cancer,
            state: Some(AgentState::CancerSenescent),
            coord: Coord3D::new(i % 10, i / 10, 1),
        })
        .collect();
    let layout = InitialLayout::Explicit {
        cells,
        clusters: vec![],
    };
    let mut ctx = SliceContext::new(params, rng, 0, 3600.0);
    comp.initialize(&layout, &mut ctx).unwrap();
    comp
}

fn target_of(comp: &Compartment, count: usize) -> RecenterState {
    let coords: Vec<Coord3D> = comp.agents().map(|(_, a)| a.coord()).collect();
    RecenterState {
        enabled: true,
        target_center: center_of_mass(&coords),
        target_count: count,
        threshold: 0.1,
    }
}

#[test]
fn test_shrunk_population_shifts_down() {
    let params = still_params();
    let mut rng = RngManager::new(8);
    let mut comp = layer_compartment(&params, &mut rng, 85);
    let state = target_of(&comp, 100);
    comp.set_recenter_state(state);

    let mut ctx = SliceContext::new(&params, &mut rng, 0, 3600.0);
    comp.time_slice(&mut ctx).unwrap();

    let shift = comp.last_shift().expect("85 < 90 must shift");
    assert_eq!(shift.offset, Coord3D::z_only(-1));
    assert_eq!(shift.dropped_out, 0);
    assert_eq!(shift.remained, 85);
    assert!(comp.agents().all(|(_, a)| a.coord().z == 2));
    comp.check_invariants().unwrap();
}

#[test]
fn test_population_within_threshold_does_not_shift() {
    let params = still_params();
    let mut rng = RngManager::new(8);
    let mut comp = layer_compartment(&params, &mut rng, 95);
    let state = target_of(&comp, 100);
    comp.set_recenter_state(state);

    let mut ctx = SliceContext::new(&params, &mut rng, 0, 3600.0);
    comp.time_slice(&mut ctx).unwrap();

    assert!(comp.last_shift().is_none());
    assert!(comp.agents().all(|(_, a)| a.coord().z == 1));
}

#[test]
fn test_grown_population_shifts_up() {
    let state = RecenterState {
        enabled: true,
        target_center: Coord3D::ORIGIN,
        target_count: 10,
        threshold: 0.1,
    };
    let cells = vec![Coord3D::ORIGIN; 11];
    assert_eq!(decide_shift(&state, &cells), Some(Coord3D::z_only(1)));
}

#[test]
fn test_upward_drift_shifts_up() {
    let state = RecenterState {
        enabled: true,
        target_center: Coord3D::new(5, 5, 5),
        target_count: 4,
        threshold: 0.1,
    };
    let cells = vec![Coord3D::new(5, 5, 6); 4];
    assert_eq!(decide_shift(&state, &cells), Some(Coord3D::z_only(1)));
}

#[test]
fn test_empty_population_uses_origin() {
    assert_eq!(center_of_mass(&[]), Coord3D::ORIGIN);
}

#[test]
fn test_disabled_recentering_never_shifts() {
    let params = still_params();
    let mut rng = RngManager::new(8);
    let mut comp = layer_compartment(&params, &mut rng, 10);
    let mut state = target_of(&comp, 100);
    state.enabled = false;
    comp.set_recenter_state(state);

    let mut ctx = SliceContext::new(&params, &mut rng, 0, 3600.0);
    comp.time_slice(&mut ctx).unwrap();
    assert!(comp.last_shift().is_none());
}

#[test]
fn test_shift_conserves_agents() {
    let params = still_params();
    let mut rng = RngManager::new(99);
    let content = VoxelContentGen::from_config(
        &ContentGenConfig::Density {
            density: 0.6,
            bounds: None,
        },
        &params,
    );
    let mut comp = Compartment::new(
        Coord3D::new(6, 6, 6),
        &params,
        content,
        Box::new(NullField::new()),
    );
    let mut ctx = SliceContext::new(&params, &mut rng, 0, 3600.0);
    comp.initialize(&InitialLayout::RandomFill, &mut ctx).unwrap();
    let before = comp.agent_count();
    let top_layer = comp.agents().filter(|(_, a)| a.coord().z == 0).count();

    let report = comp.shift_grid(Coord3D::z_only(1), &mut ctx).unwrap();

    assert_eq!(report.remained + report.dropped_out, before);
    assert_eq!(report.dropped_out, top_layer);
    let in_window = comp.agents().filter(|(_, a)| !a.is_drop_out()).count();
    assert_eq!(in_window, report.remained + report.repopulated);
    assert_eq!(comp.agent_count(), before + report.repopulated);
    comp.check_invariants().unwrap();

    // Exposed voxels are the z = 5 layer
    assert!(comp
        .agents()
        .skip(before)
        .all(|(_, a)| a.coord().z == 5));
}
