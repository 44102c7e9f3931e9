use stokesim::base::{Config, Essential, ProblemFunctions, RefinementPolicy};
use stokesim::fem::Stokes;
use stokesim::mesh::Samples;

/// Builds a solver without boundary conditions and a velocity field with a
/// kink along x = 0.5, which the jump indicator must flag.
fn kinked_problem(policy: RefinementPolicy, adaptive: bool) -> Stokes {
    let mesh = Samples::rect(2, 2, 1.0, 1.0).unwrap();
    let mut config = Config::new();
    config.error_threshold = 1e-3;
    config.refinement_policy = policy;
    config.adaptive_refinement = adaptive;
    Stokes::new(mesh, config, Essential::new(), ProblemFunctions::zero()).unwrap()
}

fn kinked_field(stokes: &Stokes) -> russell_lab::Vector {
    let mut yy = stokes.create_state_vector();
    for (i, point) in stokes.space.vnodes.iter().enumerate() {
        let x = stokes.mesh.points[*point].coords;
        yy[2 * i] = (x[0] - 0.5).abs();
    }
    yy
}

#[test]
fn restart_changes_the_discretization() {
    let mut stokes = kinked_problem(RefinementPolicy::FixedCount { max_cells: 1000 }, true);
    let n_before = stokes.n_dofs();
    let cells_before = stokes.mesh.n_active_cells();
    let mut yy = kinked_field(&stokes);
    let mut yy_dot = stokes.create_state_vector();
    // remember the value at a node that survives the refinement
    let probe = stokes.space.vnodes[0];
    let probe_x = stokes.mesh.points[probe].coords;
    let probe_value = yy[0];

    let restarted = stokes.should_restart(0.0, 3, 0.1, &mut yy, &mut yy_dot).unwrap();
    assert!(restarted);
    assert!(stokes.n_dofs() != n_before);
    assert!(stokes.mesh.n_active_cells() > cells_before);
    assert_eq!(stokes.stats.n_restart, 1);
    assert_eq!(stokes.stats.n_setup, 2);

    // the state vectors were replaced on the new layout and the block
    // sizes add up to the new total
    assert_eq!(yy.dim(), stokes.n_dofs());
    assert_eq!(yy_dot.dim(), stokes.n_dofs());
    assert_eq!(stokes.space.n_velocity + stokes.space.n_pressure, stokes.n_dofs());

    // the transferred solution keeps the value at the surviving node
    let i_new = stokes
        .space
        .vnodes
        .iter()
        .position(|p| stokes.mesh.points[*p].coords == probe_x)
        .unwrap();
    russell_lab::approx_eq(yy[2 * i_new], probe_value, 1e-14);

    // the mask matches the new layout
    let mask = stokes.differential_components();
    assert_eq!(mask.dim(), stokes.n_dofs());
}

#[test]
fn smooth_fields_do_not_restart() {
    let mut stokes = kinked_problem(RefinementPolicy::FixedFraction, true);
    let n_before = stokes.n_dofs();
    // a linear field has no gradient jumps
    let mut yy = stokes.create_state_vector();
    for (i, point) in stokes.space.vnodes.iter().enumerate() {
        let x = stokes.mesh.points[*point].coords;
        yy[2 * i] = x[0];
        yy[2 * i + 1] = -x[1];
    }
    let mut yy_dot = stokes.create_state_vector();
    let restarted = stokes.should_restart(0.0, 0, 0.1, &mut yy, &mut yy_dot).unwrap();
    assert!(!restarted);
    assert_eq!(stokes.n_dofs(), n_before);
    assert_eq!(stokes.stats.n_restart, 0);
}

#[test]
fn uniform_refinement_path_works() {
    // strict adaptive refinement off: one global refinement instead
    let mut stokes = kinked_problem(RefinementPolicy::FixedFraction, false);
    let cells_before = stokes.mesh.n_active_cells();
    let mut yy = kinked_field(&stokes);
    let mut yy_dot = stokes.create_state_vector();
    let restarted = stokes.should_restart(0.0, 0, 0.1, &mut yy, &mut yy_dot).unwrap();
    assert!(restarted);
    assert_eq!(stokes.mesh.n_active_cells(), 4 * cells_before);
    assert_eq!(yy.dim(), stokes.n_dofs());
}

#[test]
fn hanging_constraints_appear_after_local_refinement() {
    let mut stokes = kinked_problem(RefinementPolicy::FixedCount { max_cells: 1000 }, true);
    assert_eq!(stokes.constraints.n_constrained(), 0);
    let mut yy = kinked_field(&stokes);
    let mut yy_dot = stokes.create_state_vector();
    let restarted = stokes.should_restart(0.0, 0, 0.1, &mut yy, &mut yy_dot).unwrap();
    assert!(restarted);
    // local refinement of the kinked region leaves hanging interfaces,
    // and the transferred solution satisfies their constraints
    assert!(stokes.constraints.n_constrained() > 0);
    let mut check = yy.clone();
    stokes.constraints.distribute(&mut check).unwrap();
    for i in 0..stokes.n_dofs() {
        russell_lab::approx_eq(check[i], yy[i], 1e-13);
    }
}
