use std::fmt;

/// Defines the smallest allowed linear-solver tolerance
pub const CONFIG_MIN_TOL: f64 = 1e-15;

/// Defines the policy used to mark cells for refinement and coarsening
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RefinementPolicy {
    /// Refine/coarsen the cells accounting for fixed fractions of the total error
    FixedFraction,

    /// Refine/coarsen fixed fractions of the number of cells, capped at a maximum cell count
    FixedCount { max_cells: usize },
}

/// Holds configuration data for the transient Stokes solver core
pub struct Config {
    /// Dynamic viscosity coefficient
    pub mu: f64,

    /// Number of global refinements applied to the initial mesh on construction
    pub initial_refinement: usize,

    /// Refine the mesh during the transient (adaptivity on/off switch)
    pub use_space_adaptivity: bool,

    /// Execute the marked refinement/coarsening; otherwise one global uniform refinement
    pub adaptive_refinement: bool,

    /// Threshold on the maximum cell error indicator that triggers a restart
    pub error_threshold: f64,

    /// Fraction controlling how many cells are marked for refinement
    pub top_fraction: f64,

    /// Fraction controlling how many cells are marked for coarsening
    pub bottom_fraction: f64,

    /// Marking policy
    pub refinement_policy: RefinementPolicy,

    /// Maximum number of iterations of the primary Krylov solve
    pub krylov_it_max: usize,

    /// Restart length of the primary Krylov solve
    pub krylov_restart: usize,

    /// Restart length of the escalated Krylov solve (its iteration cap is the system dimension)
    pub krylov_restart_escalated: usize,

    /// Absolute tolerance of the outer Krylov solves
    pub tol_linear: f64,

    /// Iteration cap of the inner approximate-inverse solves
    pub inner_it_max: usize,

    /// Absolute tolerance of the inner approximate-inverse solves
    pub inner_tol: f64,

    /// Residual reduction factor that also stops the inner solves
    pub inner_reduction: f64,

    /// Strength-of-connection threshold of the multigrid aggregation
    pub amg_strength_threshold: f64,

    /// Number of relaxation sweeps per multigrid level
    pub amg_smoother_sweeps: usize,

    /// Size below which the multigrid coarsest level is solved directly
    pub amg_coarsest_max: usize,

    /// Print mesh/DOF counts on setup
    pub verbose_setup: bool,

    /// Print Krylov iteration counts after each solve
    pub verbose_iterations: bool,

    /// Print a banner when the error indicator triggers a restart
    pub verbose_restart: bool,
}

impl Config {
    /// Allocates a new instance with default values
    pub fn new() -> Self {
        Config {
            mu: 1.0,
            initial_refinement: 0,
            use_space_adaptivity: true,
            adaptive_refinement: true,
            error_threshold: 1e-2,
            top_fraction: 0.3,
            bottom_fraction: 0.1,
            refinement_policy: RefinementPolicy::FixedCount { max_cells: 1000 },
            krylov_it_max: 30,
            krylov_restart: 30,
            krylov_restart_escalated: 50,
            tol_linear: 1e-8,
            inner_it_max: 5000,
            inner_tol: 1e-8,
            inner_reduction: 1e-2,
            amg_strength_threshold: 0.02,
            amg_smoother_sweeps: 2,
            amg_coarsest_max: 200,
            verbose_setup: false,
            verbose_iterations: false,
            verbose_restart: false,
        }
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if self.mu <= 0.0 {
            return Some(format!("mu = {:?} is incorrect; it must be > 0.0", self.mu));
        }
        if self.error_threshold < 0.0 {
            return Some(format!(
                "error_threshold = {:?} is incorrect; it must be ≥ 0.0",
                self.error_threshold
            ));
        }
        if self.top_fraction < 0.0 || self.top_fraction > 1.0 {
            return Some(format!(
                "top_fraction = {:?} is incorrect; it must be in [0.0, 1.0]",
                self.top_fraction
            ));
        }
        if self.bottom_fraction < 0.0 || self.bottom_fraction > 1.0 {
            return Some(format!(
                "bottom_fraction = {:?} is incorrect; it must be in [0.0, 1.0]",
                self.bottom_fraction
            ));
        }
        if self.top_fraction + self.bottom_fraction > 1.0 {
            return Some(format!(
                "top_fraction + bottom_fraction = {:?} is incorrect; the sum must be ≤ 1.0",
                self.top_fraction + self.bottom_fraction
            ));
        }
        if self.krylov_it_max < 1 {
            return Some(format!(
                "krylov_it_max = {:?} is incorrect; it must be ≥ 1",
                self.krylov_it_max
            ));
        }
        if self.krylov_restart < 1 || self.krylov_restart_escalated < 1 {
            return Some(format!(
                "krylov restart lengths = {:?}, {:?} are incorrect; they must be ≥ 1",
                self.krylov_restart, self.krylov_restart_escalated
            ));
        }
        if self.tol_linear < CONFIG_MIN_TOL {
            return Some(format!(
                "tol_linear = {:?} is incorrect; it must be ≥ {:e}",
                self.tol_linear, CONFIG_MIN_TOL
            ));
        }
        if self.inner_tol < CONFIG_MIN_TOL {
            return Some(format!(
                "inner_tol = {:?} is incorrect; it must be ≥ {:e}",
                self.inner_tol, CONFIG_MIN_TOL
            ));
        }
        if self.inner_reduction <= 0.0 || self.inner_reduction >= 1.0 {
            return Some(format!(
                "inner_reduction = {:?} is incorrect; it must be in (0.0, 1.0)",
                self.inner_reduction
            ));
        }
        if self.amg_strength_threshold < 0.0 || self.amg_strength_threshold >= 1.0 {
            return Some(format!(
                "amg_strength_threshold = {:?} is incorrect; it must be in [0.0, 1.0)",
                self.amg_strength_threshold
            ));
        }
        if self.amg_coarsest_max < 1 {
            return Some(format!(
                "amg_coarsest_max = {:?} is incorrect; it must be ≥ 1",
                self.amg_coarsest_max
            ));
        }
        if let RefinementPolicy::FixedCount { max_cells } = self.refinement_policy {
            if max_cells < 1 {
                return Some(format!(
                    "max_cells = {:?} is incorrect; it must be ≥ 1",
                    max_cells
                ));
            }
        }
        None
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration data\n").unwrap();
        write!(f, "==================\n").unwrap();
        write!(f, "mu = {:?}\n", self.mu).unwrap();
        write!(f, "initial_refinement = {:?}\n", self.initial_refinement).unwrap();
        write!(f, "use_space_adaptivity = {:?}\n", self.use_space_adaptivity).unwrap();
        write!(f, "adaptive_refinement = {:?}\n", self.adaptive_refinement).unwrap();
        write!(f, "error_threshold = {:?}\n", self.error_threshold).unwrap();
        write!(f, "top_fraction = {:?}\n", self.top_fraction).unwrap();
        write!(f, "bottom_fraction = {:?}\n", self.bottom_fraction).unwrap();
        write!(f, "refinement_policy = {:?}\n", self.refinement_policy).unwrap();
        write!(f, "krylov_it_max = {:?}\n", self.krylov_it_max).unwrap();
        write!(f, "krylov_restart = {:?}\n", self.krylov_restart).unwrap();
        write!(f, "krylov_restart_escalated = {:?}\n", self.krylov_restart_escalated).unwrap();
        write!(f, "tol_linear = {:?}\n", self.tol_linear).unwrap();
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{Config, RefinementPolicy};

    #[test]
    fn new_works() {
        let config = Config::new();
        assert_eq!(config.mu, 1.0);
        assert_eq!(config.krylov_it_max, 30);
        assert_eq!(config.krylov_restart, 30);
        assert_eq!(config.krylov_restart_escalated, 50);
        assert_eq!(config.tol_linear, 1e-8);
        assert_eq!(config.validate(), None);
    }

    #[test]
    fn validate_captures_errors() {
        let mut config = Config::new();
        config.mu = 0.0;
        assert_eq!(
            config.validate(),
            Some("mu = 0.0 is incorrect; it must be > 0.0".to_string())
        );

        let mut config = Config::new();
        config.top_fraction = 1.5;
        assert!(config.validate().unwrap().contains("top_fraction"));

        let mut config = Config::new();
        config.top_fraction = 0.7;
        config.bottom_fraction = 0.6;
        assert!(config.validate().unwrap().contains("the sum must be"));

        let mut config = Config::new();
        config.inner_reduction = 1.0;
        assert!(config.validate().unwrap().contains("inner_reduction"));

        let mut config = Config::new();
        config.refinement_policy = RefinementPolicy::FixedCount { max_cells: 0 };
        assert!(config.validate().unwrap().contains("max_cells"));
    }

    #[test]
    fn display_works() {
        let config = Config::new();
        let text = format!("{}", config);
        assert!(text.contains("mu = 1.0"));
        assert!(text.contains("krylov_restart = 30"));
    }
}
