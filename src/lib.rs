//! Time-step-local solver core for a transient Stokes problem discretized
//! by mixed (Taylor-Hood) finite elements on an adaptively refined mesh.
//!
//! The crate implements the callback contract consumed by an external DAE
//! time integrator: nonlinear residual evaluation, Jacobian assembly with a
//! block preconditioner, a two-tier Krylov solve, and mesh adaptation with
//! transfer of the solution and its time derivative onto the new layout.

/// Defines a type alias for the error type as a static string
pub type StrError = &'static str;

/// Defines a function of (x,t) where x is space and t is time
pub type FnSpaceTime = fn(&[f64], f64) -> f64;

pub mod base;
pub mod fem;
pub mod mesh;
