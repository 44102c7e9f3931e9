use super::Stokes;
use crate::StrError;
use russell_lab::Vector;

/// Defines the callback contract consumed by the external DAE integrator
///
/// The integrator owns the time-stepping loop and the retry/backoff logic:
/// every recoverable condition (linear-solver non-convergence, non-finite
/// assembly) surfaces as an `Err` and is expected to trigger a step-size
/// reduction and a retry with a freshly assembled Jacobian. A `true` from
/// `should_restart` means the state vectors now live on a different
/// discretization and the current step must be redone from the beginning.
pub trait DaeSystem {
    /// Computes the residual r of F(t, y, ẏ) = 0
    fn residual(&mut self, t: f64, yy: &Vector, yy_dot: &Vector, rr: &mut Vector) -> Result<(), StrError>;

    /// Assembles the Jacobian ∂F/∂y + alpha ∂F/∂ẏ and its preconditioner
    fn setup_jacobian(&mut self, t: f64, yy: &Vector, yy_dot: &Vector, alpha: f64) -> Result<(), StrError>;

    /// Solves the Jacobian system for a given right-hand side
    fn solve_jacobian_system(
        &mut self,
        t: f64,
        yy: &Vector,
        yy_dot: &Vector,
        alpha: f64,
        src: &Vector,
        dst: &mut Vector,
    ) -> Result<(), StrError>;

    /// Returns the mask of differential (1) vs algebraic (0) unknowns
    fn differential_components(&self) -> Vector;

    /// Checks the error indicator and remeshes; may replace the state vectors
    fn should_restart(
        &mut self,
        t: f64,
        step: usize,
        h: f64,
        yy: &mut Vector,
        yy_dot: &mut Vector,
    ) -> Result<bool, StrError>;

    /// Returns a new zero-initialized state vector matching the current layout
    fn create_state_vector(&self) -> Vector;

    /// Returns the current number of degrees of freedom
    fn n_dofs(&self) -> usize;
}

impl DaeSystem for Stokes {
    fn residual(&mut self, t: f64, yy: &Vector, yy_dot: &Vector, rr: &mut Vector) -> Result<(), StrError> {
        Stokes::residual(self, t, yy, yy_dot, rr)
    }

    fn setup_jacobian(&mut self, t: f64, yy: &Vector, yy_dot: &Vector, alpha: f64) -> Result<(), StrError> {
        Stokes::setup_jacobian(self, t, yy, yy_dot, alpha)
    }

    fn solve_jacobian_system(
        &mut self,
        t: f64,
        yy: &Vector,
        yy_dot: &Vector,
        alpha: f64,
        src: &Vector,
        dst: &mut Vector,
    ) -> Result<(), StrError> {
        Stokes::solve_jacobian_system(self, t, yy, yy_dot, alpha, src, dst)
    }

    fn differential_components(&self) -> Vector {
        Stokes::differential_components(self)
    }

    fn should_restart(
        &mut self,
        t: f64,
        step: usize,
        h: f64,
        yy: &mut Vector,
        yy_dot: &mut Vector,
    ) -> Result<bool, StrError> {
        Stokes::should_restart(self, t, step, h, yy, yy_dot)
    }

    fn create_state_vector(&self) -> Vector {
        Stokes::create_state_vector(self)
    }

    fn n_dofs(&self) -> usize {
        Stokes::n_dofs(self)
    }
}
