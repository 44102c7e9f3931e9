use crate::FnSpaceTime;
use std::f64::consts::PI;

/// Holds the analytic functions supplied by the problem definition
///
/// These are collaborator interfaces: initial conditions for the solution
/// and its time derivative, the forcing term of the momentum equation, and
/// the exact solution used for error recording. All functions take the
/// spatial coordinates and the time.
#[derive(Clone, Copy)]
pub struct ProblemFunctions {
    /// Initial horizontal velocity
    pub initial_ux: FnSpaceTime,

    /// Initial vertical velocity
    pub initial_uy: FnSpaceTime,

    /// Initial pressure
    pub initial_p: FnSpaceTime,

    /// Initial time derivative of the horizontal velocity
    pub initial_ux_dot: FnSpaceTime,

    /// Initial time derivative of the vertical velocity
    pub initial_uy_dot: FnSpaceTime,

    /// Initial time derivative of the pressure
    pub initial_p_dot: FnSpaceTime,

    /// Horizontal component of the forcing term
    pub forcing_fx: FnSpaceTime,

    /// Vertical component of the forcing term
    pub forcing_fy: FnSpaceTime,

    /// Exact horizontal velocity
    pub exact_ux: FnSpaceTime,

    /// Exact vertical velocity
    pub exact_uy: FnSpaceTime,

    /// Exact pressure
    pub exact_p: FnSpaceTime,
}

/// Returns zero for any point and time
pub fn fn_zero(_x: &[f64], _t: f64) -> f64 {
    0.0
}

/// Horizontal velocity of the decaying Taylor vortex (mu = 1)
pub fn taylor_ux(x: &[f64], t: f64) -> f64 {
    f64::sin(PI * x[0]) * f64::cos(PI * x[1]) * f64::exp(-PI * PI * t)
}

/// Vertical velocity of the decaying Taylor vortex (mu = 1)
pub fn taylor_uy(x: &[f64], t: f64) -> f64 {
    -f64::cos(PI * x[0]) * f64::sin(PI * x[1]) * f64::exp(-PI * PI * t)
}

/// Time derivative of the horizontal Taylor vortex velocity
pub fn taylor_ux_dot(x: &[f64], t: f64) -> f64 {
    -PI * PI * taylor_ux(x, t)
}

/// Time derivative of the vertical Taylor vortex velocity
pub fn taylor_uy_dot(x: &[f64], t: f64) -> f64 {
    -PI * PI * taylor_uy(x, t)
}

impl ProblemFunctions {
    /// Returns the zero problem (all functions vanish)
    pub fn zero() -> Self {
        ProblemFunctions {
            initial_ux: fn_zero,
            initial_uy: fn_zero,
            initial_p: fn_zero,
            initial_ux_dot: fn_zero,
            initial_uy_dot: fn_zero,
            initial_p_dot: fn_zero,
            forcing_fx: fn_zero,
            forcing_fy: fn_zero,
            exact_ux: fn_zero,
            exact_uy: fn_zero,
            exact_p: fn_zero,
        }
    }

    /// Returns the decaying Taylor vortex problem for unit viscosity
    ///
    /// The velocity field `u = (sin(πx) cos(πy), -cos(πx) sin(πy)) exp(-π²t)`
    /// is divergence-free and satisfies the momentum equation in the form
    /// assembled here with `p = 0` and zero forcing.
    pub fn taylor_vortex() -> Self {
        ProblemFunctions {
            initial_ux: taylor_ux,
            initial_uy: taylor_uy,
            initial_p: fn_zero,
            initial_ux_dot: taylor_ux_dot,
            initial_uy_dot: taylor_uy_dot,
            initial_p_dot: fn_zero,
            forcing_fx: fn_zero,
            forcing_fy: fn_zero,
            exact_ux: taylor_ux,
            exact_uy: taylor_uy,
            exact_p: fn_zero,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{taylor_ux, taylor_ux_dot, taylor_uy, ProblemFunctions};
    use russell_lab::approx_eq;
    use std::f64::consts::PI;

    #[test]
    fn taylor_vortex_is_divergence_free() {
        // central finite differences of the divergence at interior points
        let h = 1e-6;
        for &(x, y) in &[(0.3, 0.4), (0.7, 0.2), (0.5, 0.5)] {
            let dux_dx = (taylor_ux(&[x + h, y], 0.1) - taylor_ux(&[x - h, y], 0.1)) / (2.0 * h);
            let duy_dy = (taylor_uy(&[x, y + h], 0.1) - taylor_uy(&[x, y - h], 0.1)) / (2.0 * h);
            approx_eq(dux_dx + duy_dy, 0.0, 1e-8);
        }
    }

    #[test]
    fn taylor_vortex_decays() {
        let x = [0.3, 0.4];
        approx_eq(
            taylor_ux_dot(&x, 0.2),
            -PI * PI * taylor_ux(&x, 0.2),
            1e-14,
        );
        assert!(taylor_ux(&x, 1.0).abs() < taylor_ux(&x, 0.0).abs());
    }

    #[test]
    fn zero_problem_works() {
        let fns = ProblemFunctions::zero();
        assert_eq!((fns.forcing_fx)(&[1.0, 2.0], 3.0), 0.0);
        assert_eq!((fns.exact_p)(&[1.0, 2.0], 3.0), 0.0);
    }
}
