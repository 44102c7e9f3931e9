use russell_lab::{format_nanoseconds, Stopwatch};
use std::fmt;

/// Holds per-run counters and accumulated times
///
/// One instance lives inside each solver value; its lifetime is tied to a
/// single time-integration run (there is no process-wide mutable state).
pub struct Stats {
    /// Number of residual evaluations
    pub n_residual: usize,

    /// Number of Jacobian assemblies
    pub n_jacobian: usize,

    /// Number of linear solves
    pub n_solve: usize,

    /// Number of discretization setups (initial and after remeshing)
    pub n_setup: usize,

    /// Number of triggered restarts (mesh changes)
    pub n_restart: usize,

    /// Accumulated Krylov iterations over all linear solves
    pub n_krylov_iterations: usize,

    /// Accumulated assembly time (residual and Jacobian) in nanoseconds
    pub nanos_assembly: u128,

    /// Accumulated linear-solve time in nanoseconds
    pub nanos_solve: u128,

    /// Accumulated error-estimation time in nanoseconds
    pub nanos_estimator: u128,

    /// Stopwatch reused by the owning component
    pub(crate) stopwatch: Stopwatch,
}

impl Stats {
    /// Allocates a new instance
    pub fn new() -> Self {
        Stats {
            n_residual: 0,
            n_jacobian: 0,
            n_solve: 0,
            n_setup: 0,
            n_restart: 0,
            n_krylov_iterations: 0,
            nanos_assembly: 0,
            nanos_solve: 0,
            nanos_estimator: 0,
            stopwatch: Stopwatch::new(),
        }
    }

    /// Restarts the internal stopwatch
    pub(crate) fn sw_restart(&mut self) {
        self.stopwatch = Stopwatch::new();
    }

    /// Returns the nanoseconds elapsed since the last restart
    pub(crate) fn sw_stop(&mut self) -> u128 {
        self.stopwatch.stop()
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Run statistics\n").unwrap();
        write!(f, "==============\n").unwrap();
        write!(f, "residual evaluations = {}\n", self.n_residual).unwrap();
        write!(f, "jacobian assemblies  = {}\n", self.n_jacobian).unwrap();
        write!(f, "linear solves        = {}\n", self.n_solve).unwrap();
        write!(f, "setups               = {}\n", self.n_setup).unwrap();
        write!(f, "restarts             = {}\n", self.n_restart).unwrap();
        write!(f, "krylov iterations    = {}\n", self.n_krylov_iterations).unwrap();
        write!(f, "assembly time        = {}\n", format_nanoseconds(self.nanos_assembly)).unwrap();
        write!(f, "solve time           = {}\n", format_nanoseconds(self.nanos_solve)).unwrap();
        write!(f, "estimator time       = {}\n", format_nanoseconds(self.nanos_estimator)).unwrap();
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
