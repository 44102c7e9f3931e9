use super::{
    kelly_indicator, mark_fixed_count, mark_fixed_fraction, Amg, BlockOperator, BlockPreconditioner,
    Cg, Constraints, Csr, ElementStokes, Fgmres, Jacobi, LinearSystem, SolutionTransfer, Space,
};
use crate::base::{Config, ProblemFunctions, RefinementPolicy, Stats};
use crate::base::Essential;
use crate::mesh::{EdgeNeighbor, Mesh};
use crate::StrError;
use russell_lab::{vec_copy, Vector};
use std::collections::HashSet;

/// Hanging-edge weights of the Q2 basis at the quarter points of the parent edge
const Q2_HANGING: [f64; 3] = [3.0 / 8.0, 3.0 / 4.0, -1.0 / 8.0];

/// Implements the time-step-local core of the transient Stokes problem
///
/// Owns the mesh, the discretization state (function space, constraints,
/// block matrices) and the run statistics, and exposes the callback
/// contract consumed by the external DAE integrator: residual evaluation,
/// Jacobian assembly with preconditioner construction, the two-tier Krylov
/// solve, the differential/algebraic mask, and the adaptivity restart
/// check with state transfer.
pub struct Stokes {
    /// Configuration
    pub config: Config,

    /// Essential (Dirichlet) boundary conditions on the velocity
    pub essential: Essential,

    /// Analytic problem functions (initial conditions, forcing, exact solution)
    pub functions: ProblemFunctions,

    /// Adaptively refined mesh
    pub mesh: Mesh,

    /// Function space over the active cells (rebuilt on every mesh change)
    pub space: Space,

    /// Affine constraints (rebuilt, at the current time, before every evaluation)
    pub constraints: Constraints,

    /// Block system and preconditioner matrices
    pub system: LinearSystem,

    /// Run statistics (scoped to this solver value)
    pub stats: Stats,

    /// Initial solution interpolated on the first setup
    pub yy0: Vector,

    /// Initial derivative interpolated on the first setup
    pub yy0_dot: Vector,

    /// Constraint-consistent copy of the solution (recomputed, never persisted)
    yy_rel: Vector,

    /// Copy of the derivative in the relevant layout (kept as given)
    yy_dot_rel: Vector,

    /// Time of the last boundary-data update
    time: f64,

    /// Element scratch reused over all cells
    element: ElementStokes,
}

impl Stokes {
    /// Allocates a new instance and performs the first setup
    ///
    /// Interpolates the initial conditions and applies the constraints to
    /// the initial solution (the derivative is kept as interpolated).
    pub fn new(
        mut mesh: Mesh,
        config: Config,
        essential: Essential,
        functions: ProblemFunctions,
    ) -> Result<Self, StrError> {
        if let Some(msg) = config.validate() {
            println!("ERROR: {}", msg);
            return Err("cannot allocate the solver because config.validate() failed");
        }
        for _ in 0..config.initial_refinement {
            mesh.refine_global();
        }
        let space = Space::new(&mut mesh)?;
        let mut constraints = Constraints::new();
        constraints.close()?;
        let system = LinearSystem::new(&space, &constraints)?;
        let n = space.n_dofs();
        let mut stokes = Stokes {
            config,
            essential,
            functions,
            mesh,
            space,
            constraints,
            system,
            stats: Stats::new(),
            yy0: Vector::new(n),
            yy0_dot: Vector::new(n),
            yy_rel: Vector::new(n),
            yy_dot_rel: Vector::new(n),
            time: 0.0,
            element: ElementStokes::new()?,
        };
        stokes.setup_dofs(true)?;
        let Stokes { constraints, yy0, .. } = &mut stokes;
        constraints.distribute(yy0)?;
        Ok(stokes)
    }

    /// Returns the total number of DOFs of the current discretization
    pub fn n_dofs(&self) -> usize {
        self.space.n_dofs()
    }

    /// Returns a new zero-initialized state vector matching the current layout
    pub fn create_state_vector(&self) -> Vector {
        Vector::new(self.space.n_dofs())
    }

    /// Rebuilds the whole discretization state over the current mesh
    ///
    /// Distributes the DOFs (block-contiguous renumbering), rebuilds the
    /// constraint set, recomputes the sparsity bounds and reallocates the
    /// matrices and work vectors. When `first_run` is true, the initial
    /// solution and derivative are interpolated from the problem functions;
    /// otherwise the vectors are left for the caller to fill via the state
    /// transfer. Every previously held matrix, vector, or operator built
    /// from the old state becomes stale.
    pub fn setup_dofs(&mut self, first_run: bool) -> Result<(), StrError> {
        self.stats.n_setup += 1;
        self.space = Space::new(&mut self.mesh)?;
        self.update_constraints(self.time)?;
        self.system = LinearSystem::new(&self.space, &self.constraints)?;
        let n = self.space.n_dofs();
        self.yy_rel = Vector::new(n);
        self.yy_dot_rel = Vector::new(n);
        if first_run {
            let t = self.time;
            let mut yy0 = Vector::new(n);
            let mut yy0_dot = Vector::new(n);
            for (i, point) in self.space.vnodes.iter().enumerate() {
                let x = self.mesh.points[*point].coords;
                yy0[2 * i] = (self.functions.initial_ux)(&x, t);
                yy0[2 * i + 1] = (self.functions.initial_uy)(&x, t);
                yy0_dot[2 * i] = (self.functions.initial_ux_dot)(&x, t);
                yy0_dot[2 * i + 1] = (self.functions.initial_uy_dot)(&x, t);
            }
            for (j, point) in self.space.pnodes.iter().enumerate() {
                let x = self.mesh.points[*point].coords;
                yy0[self.space.n_velocity + j] = (self.functions.initial_p)(&x, t);
                yy0_dot[self.space.n_velocity + j] = (self.functions.initial_p_dot)(&x, t);
            }
            self.yy0 = yy0;
            self.yy0_dot = yy0_dot;
        }
        if self.config.verbose_setup {
            println!(
                "number of active cells: {} (on {} levels)",
                self.mesh.n_active_cells(),
                self.mesh.n_levels()
            );
            println!(
                "number of degrees of freedom: {} ({} + {})",
                n, self.space.n_velocity, self.space.n_pressure
            );
        }
        Ok(())
    }

    /// Rebuilds the constraint set at the given time
    ///
    /// Hanging-node continuity relations come from the mesh topology; the
    /// Dirichlet values come from the essential conditions evaluated at
    /// `t`. The set is closed before returning.
    pub fn update_constraints(&mut self, t: f64) -> Result<(), StrError> {
        self.time = t;
        let mut constraints = Constraints::new();
        let edge_map = self.mesh.build_edge_map();

        // hanging-node continuity
        for cell_id in &self.space.active {
            for e in 0..4 {
                let neighbor = self.mesh.neighbor_across(&edge_map, *cell_id, e)?;
                if let EdgeNeighbor::Refined { midpoint, .. } = neighbor {
                    let (a, b) = self.mesh.cell_edge(*cell_id, e);
                    // the two fine midside nodes hang at the quarter points
                    for (near, far) in [(a, b), (b, a)] {
                        let hang = self
                            .mesh
                            .midpoint_of(near, midpoint)
                            .ok_or("hanging interface lacks a fine midside node")?;
                        for component in 0..2 {
                            let dof = |point| {
                                self.space
                                    .velocity_dof(point, component)
                                    .ok_or("hanging interface node has no velocity DOF")
                            };
                            constraints.constrain(
                                dof(hang)?,
                                &[
                                    (dof(near)?, Q2_HANGING[0]),
                                    (dof(midpoint)?, Q2_HANGING[1]),
                                    (dof(far)?, Q2_HANGING[2]),
                                ],
                                0.0,
                            )?;
                        }
                    }
                    // the shared corner hangs for the pressure (no coarse node there)
                    let dof_p = |point| {
                        self.space
                            .pressure_dof(point)
                            .ok_or("hanging interface node has no pressure DOF")
                    };
                    constraints.constrain(
                        dof_p(midpoint)?,
                        &[(dof_p(a)?, 0.5), (dof_p(b)?, 0.5)],
                        0.0,
                    )?;
                }
            }
        }

        // Dirichlet values at the current time
        let mut done: HashSet<usize> = HashSet::new();
        for cell_id in &self.space.active {
            for e in 0..4 {
                let (a, b) = self.mesh.cell_edge(*cell_id, e);
                let tag = match self.mesh.edge_tag(a, b) {
                    Some(tag) => tag,
                    None => continue,
                };
                let midside = self
                    .mesh
                    .midpoint_of(a, b)
                    .ok_or("boundary edge lacks a midside node")?;
                for ebc in self.essential.at(tag) {
                    for point in [a, b, midside] {
                        let dof = self
                            .space
                            .velocity_dof(point, ebc.component())
                            .ok_or("boundary node has no velocity DOF")?;
                        if done.insert(dof) {
                            let x = self.mesh.points[point].coords;
                            constraints.constrain(dof, &[], ebc.value(&x, t))?;
                        }
                    }
                }
            }
        }

        constraints.close()?;
        self.constraints = constraints;
        Ok(())
    }

    /// Computes the nonlinear residual of the semi-discrete DAE
    ///
    /// Rebuilds the time-dependent constraints, derives the
    /// constraint-consistent solution copy (the derivative is taken as
    /// given), accumulates the weak-form residual over all active cells,
    /// and overwrites the entries at constrained DOFs with the constraint
    /// violation so the nonlinear solver drives them to their prescribed
    /// values. A non-finite contribution is a recoverable error.
    pub fn residual(&mut self, t: f64, yy: &Vector, yy_dot: &Vector, rr: &mut Vector) -> Result<(), StrError> {
        self.stats.n_residual += 1;
        self.stats.sw_restart();
        let n = self.space.n_dofs();
        if yy.dim() != n || yy_dot.dim() != n || rr.dim() != n {
            return Err("vector dimensions do not match the discretization");
        }
        self.update_constraints(t)?;
        vec_copy(&mut self.yy_rel, yy)?;
        self.constraints.distribute(&mut self.yy_rel)?;
        vec_copy(&mut self.yy_dot_rel, yy_dot)?;
        rr.fill(0.0);
        let mu = self.config.mu;
        let (fx, fy) = (self.functions.forcing_fx, self.functions.forcing_fy);
        let mesh = &self.mesh;
        let space = &self.space;
        let constraints = &self.constraints;
        let element = &mut self.element;
        for k in 0..space.active.len() {
            element.set_cell(mesh, &space.cell_nodes[k]);
            element.calc_residual(
                t,
                mu,
                &self.yy_rel,
                &self.yy_dot_rel,
                &space.local_to_global[k],
                fx,
                fy,
            )?;
            constraints.assemble_vector(rr, &element.residual, &space.local_to_global[k]);
        }
        for dof in self.constraints.constrained_dofs() {
            rr[dof] = yy[dof] - self.yy_rel[dof];
        }
        self.stats.nanos_assembly += self.stats.sw_stop();
        Ok(())
    }

    /// Assembles the block system matrix and builds the block preconditioner
    ///
    /// `alpha` is the integrator-supplied derivative/state coupling
    /// coefficient. Assembles the system and the cheaper preconditioner
    /// blocks in one sweep, forces ones on constrained diagonals, and
    /// builds the multigrid (velocity) and relaxation (pressure-mass)
    /// approximate inverses.
    pub fn setup_jacobian(&mut self, t: f64, yy: &Vector, yy_dot: &Vector, alpha: f64) -> Result<(), StrError> {
        self.stats.n_jacobian += 1;
        self.stats.sw_restart();
        let n = self.space.n_dofs();
        if yy.dim() != n || yy_dot.dim() != n {
            return Err("vector dimensions do not match the discretization");
        }
        if alpha == 0.0 {
            return Err("alpha must be nonzero to assemble the Jacobian");
        }
        self.update_constraints(t)?;
        vec_copy(&mut self.yy_rel, yy)?;
        self.constraints.distribute(&mut self.yy_rel)?;
        vec_copy(&mut self.yy_dot_rel, yy_dot)?;
        self.system.reset();
        let mu = self.config.mu;
        let mesh = &self.mesh;
        let space = &self.space;
        let constraints = &self.constraints;
        let element = &mut self.element;
        let system = &mut self.system;
        for k in 0..space.active.len() {
            element.set_cell(mesh, &space.cell_nodes[k]);
            element.calc_jacobian(mu, alpha)?;
            system.add_local(constraints, &space.local_to_global[k], &element.kk, &element.pp)?;
        }
        system.put_identity_rows(constraints)?;

        // near-null-space modes: constant velocity per component
        let nu = self.space.n_velocity;
        let mut mode_x = Vector::new(nu);
        let mut mode_y = Vector::new(nu);
        for i in 0..(nu / 2) {
            mode_x[2 * i] = 1.0;
            mode_y[2 * i + 1] = 1.0;
        }
        self.system.amg = Some(Amg::new(
            nu,
            &self.system.aa_prec,
            &[mode_x, mode_y],
            self.config.amg_strength_threshold,
            self.config.amg_smoother_sweeps,
            self.config.amg_coarsest_max,
        )?);
        let np = self.space.n_pressure;
        self.system.mp_csr = Some(Csr::from_triples(np, &self.system.mp_prec)?);
        self.system.mp_jacobi = Some(Jacobi::new(np, &self.system.mp_prec)?);
        self.stats.nanos_assembly += self.stats.sw_stop();
        Ok(())
    }

    /// Solves the Jacobian system with the two-tier Krylov strategy
    ///
    /// Zeroes constrained entries of the initial guess, attempts the
    /// primary restarted flexible solve, and escalates to a longer restart
    /// with an iteration cap equal to the system dimension on failure.
    /// Persistent non-convergence is a recoverable error: the caller owns
    /// the step-size reduction and retry. Constrained entries of the
    /// result are zeroed again against round-off.
    pub fn solve_jacobian_system(
        &mut self,
        _t: f64,
        _yy: &Vector,
        _yy_dot: &Vector,
        _alpha: f64,
        src: &Vector,
        dst: &mut Vector,
    ) -> Result<(), StrError> {
        self.stats.n_solve += 1;
        self.stats.sw_restart();
        let n = self.space.n_dofs();
        if src.dim() != n || dst.dim() != n {
            return Err("vector dimensions do not match the discretization");
        }
        self.set_constrained_dofs_to_zero(dst);
        let amg = self.system.amg.as_ref().ok_or("the Jacobian must be set up before solving")?;
        let mp_csr = self.system.mp_csr.as_ref().ok_or("the Jacobian must be set up before solving")?;
        let mp_jacobi = self
            .system
            .mp_jacobi
            .as_ref()
            .ok_or("the Jacobian must be set up before solving")?;
        let op = BlockOperator::new(&self.system);
        let prec = BlockPreconditioner::new(
            &self.system,
            amg,
            mp_csr,
            mp_jacobi,
            Cg::new(self.config.inner_it_max, self.config.inner_tol, self.config.inner_reduction),
        );
        let primary = Fgmres::new(self.config.krylov_restart, self.config.krylov_it_max, self.config.tol_linear);
        let n_iterations = match primary.solve(&op, &prec, src, dst) {
            Ok(n1) => n1,
            Err(_) => {
                let escalated = Fgmres::new(
                    self.config.krylov_restart_escalated,
                    self.system.n_dofs(),
                    self.config.tol_linear,
                );
                match escalated.solve(&op, &prec, src, dst) {
                    Ok(n2) => self.config.krylov_it_max + n2,
                    Err(_) => {
                        self.stats.nanos_solve += self.stats.sw_stop();
                        return Err("linear solver did not converge");
                    }
                }
            }
        };
        self.stats.n_krylov_iterations += n_iterations;
        if self.config.verbose_iterations {
            println!(" iterations: {}", n_iterations);
        }
        self.set_constrained_dofs_to_zero(dst);
        self.stats.nanos_solve += self.stats.sw_stop();
        Ok(())
    }

    /// Checks the error indicator and remeshes if it exceeds the threshold
    ///
    /// Returns false (and leaves everything untouched) while the indicator
    /// stays below the threshold or when adaptivity is disabled. Otherwise
    /// marks cells per the configured policy, executes the mesh change (or
    /// one global uniform refinement when strict adaptive refinement is
    /// off), rebuilds the discretization, transfers both fields onto the
    /// new layout (the fixed order prepare → execute → setup → interpolate
    /// is enforced by the transfer state machine), re-applies the
    /// constraints to the solution only, and returns true so the caller
    /// redoes the current step on the new discretization.
    pub fn should_restart(
        &mut self,
        t: f64,
        _step: usize,
        _h: f64,
        yy: &mut Vector,
        yy_dot: &mut Vector,
    ) -> Result<bool, StrError> {
        if !self.config.use_space_adaptivity {
            return Ok(false);
        }
        self.stats.sw_restart();
        self.update_constraints(t)?;
        vec_copy(&mut self.yy_rel, yy)?;
        self.constraints.distribute(&mut self.yy_rel)?;
        let eta = kelly_indicator(&self.mesh, &self.space, &self.yy_rel)?;
        let max_eta = eta.iter().fold(0.0, |acc: f64, v| acc.max(*v));
        self.stats.nanos_estimator += self.stats.sw_stop();
        if max_eta < self.config.error_threshold {
            return Ok(false);
        }
        if self.config.verbose_restart {
            println!("  ################ restart #########");
            println!(
                "max error indicator {} ≥ threshold {}",
                max_eta, self.config.error_threshold
            );
            println!("  ##################################");
        }
        self.stats.n_restart += 1;
        match self.config.refinement_policy {
            RefinementPolicy::FixedFraction => mark_fixed_fraction(
                &mut self.mesh,
                &self.space.active,
                &eta,
                self.config.top_fraction,
                self.config.bottom_fraction,
            ),
            RefinementPolicy::FixedCount { max_cells } => mark_fixed_count(
                &mut self.mesh,
                &self.space.active,
                &eta,
                self.config.top_fraction,
                self.config.bottom_fraction,
                max_cells,
            ),
        }
        self.mesh.prepare_coarsening_and_refinement()?;
        let mut transfer = SolutionTransfer::new();
        transfer.prepare(&self.space, &self.yy_rel, yy_dot)?;
        if self.config.adaptive_refinement {
            self.mesh.execute_coarsening_and_refinement()?;
        } else {
            self.mesh.clear_flags();
            self.mesh.refine_global();
        }
        self.setup_dofs(false)?;
        let n = self.space.n_dofs();
        let mut yy_new = Vector::new(n);
        let mut yy_dot_new = Vector::new(n);
        transfer.interpolate(&self.mesh, &self.space, &mut yy_new, &mut yy_dot_new)?;
        self.constraints.distribute(&mut yy_new)?;
        *yy = yy_new;
        *yy_dot = yy_dot_new;
        Ok(true)
    }

    /// Returns the mask of differential (velocity) vs algebraic (pressure) DOFs
    ///
    /// Constrained DOFs are algebraic regardless of block: their values are
    /// externally imposed, not evolved.
    pub fn differential_components(&self) -> Vector {
        let mut mask = Vector::new(self.space.n_dofs());
        for i in 0..self.space.n_velocity {
            mask[i] = 1.0;
        }
        self.set_constrained_dofs_to_zero(&mut mask);
        mask
    }

    /// Zeroes the entries of a vector at constrained DOFs
    pub fn set_constrained_dofs_to_zero(&self, v: &mut Vector) {
        for dof in self.constraints.constrained_dofs() {
            v[dof] = 0.0;
        }
    }

    /// Computes the L2 velocity error against the exact solution
    pub fn error_from_exact(&mut self, t: f64, yy: &Vector) -> Result<f64, StrError> {
        self.update_constraints(t)?;
        vec_copy(&mut self.yy_rel, yy)?;
        self.constraints.distribute(&mut self.yy_rel)?;
        let (exact_ux, exact_uy) = (self.functions.exact_ux, self.functions.exact_uy);
        let mesh = &self.mesh;
        let space = &self.space;
        let element = &mut self.element;
        let mut sum = 0.0;
        for k in 0..space.active.len() {
            element.set_cell(mesh, &space.cell_nodes[k]);
            sum += element.calc_velocity_error_squared(
                t,
                &self.yy_rel,
                &space.local_to_global[k],
                exact_ux,
                exact_uy,
            )?;
        }
        Ok(sum.sqrt())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Stokes;
    use crate::base::{Config, Ebc, Essential, ProblemFunctions};
    use crate::base::{taylor_ux, taylor_uy};
    use crate::mesh::Samples;
    use russell_lab::{vec_norm, Norm, Vector};

    fn taylor_problem(n_refinements: usize) -> Stokes {
        let mesh = Samples::unit_square(n_refinements).unwrap();
        let config = Config::new();
        let mut essential = Essential::new();
        essential.on(0, Ebc::Ux(taylor_ux)).on(0, Ebc::Uy(taylor_uy));
        Stokes::new(mesh, config, essential, ProblemFunctions::taylor_vortex()).unwrap()
    }

    #[test]
    fn new_validates_the_config() {
        let mesh = Samples::unit_square(1).unwrap();
        let mut config = Config::new();
        config.mu = -1.0;
        let result = Stokes::new(mesh, config, Essential::new(), ProblemFunctions::zero());
        assert_eq!(
            result.err(),
            Some("cannot allocate the solver because config.validate() failed")
        );
    }

    #[test]
    fn setup_interpolates_initial_conditions() {
        let stokes = taylor_problem(2);
        // the initial velocity is the vortex at t = 0 (constraints included)
        let x_mid = [0.5, 0.25];
        let mut found = false;
        for (i, point) in stokes.space.vnodes.iter().enumerate() {
            let x = stokes.mesh.points[*point].coords;
            if (x[0] - x_mid[0]).abs() < 1e-12 && (x[1] - x_mid[1]).abs() < 1e-12 {
                russell_lab::approx_eq(stokes.yy0[2 * i], taylor_ux(&x, 0.0), 1e-12);
                found = true;
            }
        }
        assert!(found);
        assert_eq!(stokes.yy0_dot.dim(), stokes.n_dofs());
    }

    #[test]
    fn differential_components_counts_velocity_minus_constrained() {
        let stokes = taylor_problem(2);
        let mask = stokes.differential_components();
        let n_ones = mask.as_data().iter().filter(|v| **v == 1.0).count();
        let n_constrained_velocity = stokes
            .constraints
            .constrained_dofs()
            .iter()
            .filter(|dof| **dof < stokes.space.n_velocity)
            .count();
        assert_eq!(n_ones, stokes.space.n_velocity - n_constrained_velocity);
        // pressure block is all zeros
        for i in stokes.space.n_velocity..stokes.n_dofs() {
            assert_eq!(mask[i], 0.0);
        }
        // idempotent
        let again = stokes.differential_components();
        assert_eq!(again.as_data(), mask.as_data());
    }

    #[test]
    fn residual_of_the_exact_solution_is_small_and_converges() {
        let mut coarse = taylor_problem(2);
        let mut fine = taylor_problem(3);
        let mut norms = Vec::new();
        for stokes in [&mut coarse, &mut fine] {
            let yy = stokes.yy0.clone();
            let yy_dot = stokes.yy0_dot.clone();
            let mut rr = stokes.create_state_vector();
            stokes.residual(0.0, &yy, &yy_dot, &mut rr).unwrap();
            norms.push(vec_norm(&rr, Norm::Euc));
        }
        assert!(norms[0] < 10.0);
        // refining improves the defect of the interpolated exact solution
        assert!(norms[1] < 0.5 * norms[0]);
    }

    #[test]
    fn jacobian_must_exist_before_solving() {
        let mut stokes = taylor_problem(1);
        let yy = stokes.create_state_vector();
        let yy_dot = stokes.create_state_vector();
        let src = stokes.create_state_vector();
        let mut dst = stokes.create_state_vector();
        assert_eq!(
            stokes.solve_jacobian_system(0.0, &yy, &yy_dot, 1.0, &src, &mut dst).err(),
            Some("the Jacobian must be set up before solving")
        );
    }

    #[test]
    fn solve_reproduces_a_known_vector() {
        let mut stokes = taylor_problem(2);
        let yy = stokes.yy0.clone();
        let yy_dot = stokes.yy0_dot.clone();
        let alpha = 10.0;
        stokes.setup_jacobian(0.0, &yy, &yy_dot, alpha).unwrap();
        // x_known with constrained entries zeroed
        let n = stokes.n_dofs();
        let mut x_known = Vector::new(n);
        for i in 0..n {
            x_known[i] = f64::sin(0.7 * (i as f64));
        }
        stokes.set_constrained_dofs_to_zero(&mut x_known);
        // src = system · x_known
        let op = crate::fem::BlockOperator::new(&stokes.system);
        let mut src = Vector::new(n);
        crate::fem::LinOp::apply(&op, &x_known, &mut src).unwrap();
        let mut dst = Vector::new(n);
        stokes.solve_jacobian_system(0.0, &yy, &yy_dot, alpha, &src, &mut dst).unwrap();
        let mut diff = Vector::new(n);
        for i in 0..n {
            diff[i] = dst[i] - x_known[i];
        }
        // the enclosed-flow pressure is defined up to a constant: remove the
        // constant component of the pressure difference before comparing
        let nu = stokes.space.n_velocity;
        let np = stokes.space.n_pressure;
        let mean: f64 = (nu..n).map(|i| diff[i]).sum::<f64>() / (np as f64);
        for i in nu..n {
            diff[i] -= mean;
        }
        let rel = vec_norm(&diff, Norm::Euc) / vec_norm(&x_known, Norm::Euc);
        assert!(rel < 1e-4, "relative solve error too large: {}", rel);
        assert!(stokes.stats.n_krylov_iterations > 0);
    }

    #[test]
    fn error_from_exact_decreases_with_refinement() {
        let mut coarse = taylor_problem(1);
        let mut fine = taylor_problem(2);
        let yc = coarse.yy0.clone();
        let yf = fine.yy0.clone();
        let ec = coarse.error_from_exact(0.0, &yc).unwrap();
        let ef = fine.error_from_exact(0.0, &yf).unwrap();
        // nodal interpolation of the exact solution: small L2 error that
        // shrinks by roughly 2³ per refinement
        assert!(ec < 0.5);
        assert!(ef < 0.3 * ec);
    }
}
