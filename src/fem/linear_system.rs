use super::{Amg, Constraints, Csr, Jacobi, Space, NDOF_LOCAL};
use crate::StrError;
use russell_lab::Matrix;
use russell_sparse::{CooMatrix, Sym};

/// Holds the block matrices of the Jacobian system and its preconditioner
///
/// The system matrix is stored as the three nonzero blocks of the
/// saddle-point structure (the pressure-pressure block is identically
/// zero). The preconditioner matrix blocks are kept as raw triples because
/// the multigrid and relaxation builders traverse them row-wise.
///
/// **Notes:**
///
/// 1. The global matrices are sparse with the number of nonzero values
///    bounded by `nnz_sup` per block.
/// 2. The local matrices add only to parts of the global matrix; elements
///    share DOFs, thus the exact nnz is (much) less than nrow × ncol.
/// 3. The supremum accounts for the constraint expansion: each local DOF
///    contributes as many global rows/columns as it has masters, plus the
///    ones put on the diagonal at constrained rows.
pub struct LinearSystem {
    /// Number of velocity DOFs
    pub n_velocity: usize,

    /// Number of pressure DOFs
    pub n_pressure: usize,

    /// Velocity-velocity block of the system matrix
    pub aa: CooMatrix,

    /// Velocity-pressure block of the system matrix
    pub bbt: CooMatrix,

    /// Pressure-velocity block of the system matrix
    pub bb: CooMatrix,

    /// Velocity-velocity block of the preconditioner matrix (raw triples)
    pub aa_prec: Vec<(usize, usize, f64)>,

    /// Pressure-mass block of the preconditioner matrix (raw triples)
    pub mp_prec: Vec<(usize, usize, f64)>,

    /// Multigrid approximate inverse of the velocity block (built per Jacobian)
    pub amg: Option<Amg>,

    /// Pressure-mass block in row-wise form (built per Jacobian)
    pub mp_csr: Option<Csr>,

    /// Relaxation for the pressure-mass block (built per Jacobian)
    pub mp_jacobi: Option<Jacobi>,
}

impl LinearSystem {
    /// Allocates a new instance with sparsity bounds from the space and constraints
    pub fn new(space: &Space, constraints: &Constraints) -> Result<Self, StrError> {
        let n_velocity = space.n_velocity;
        let n_pressure = space.n_pressure;

        // supremum of the number of nonzero values per block
        let mut nnz_aa = 0;
        let mut nnz_bbt = 0;
        let mut nnz_bb = 0;
        for l2g in &space.local_to_global {
            let su: usize = l2g[0..18].iter().map(|g| constraints.n_masters(*g)).sum();
            let sp: usize = l2g[18..NDOF_LOCAL].iter().map(|g| constraints.n_masters(*g)).sum();
            nnz_aa += su * su;
            nnz_bbt += su * sp;
            nnz_bb += sp * su;
        }
        nnz_aa += constraints.n_constrained(); // ones on the diagonal

        Ok(LinearSystem {
            n_velocity,
            n_pressure,
            aa: CooMatrix::new(n_velocity, n_velocity, usize::max(1, nnz_aa), Sym::No)?,
            bbt: CooMatrix::new(n_velocity, n_pressure, usize::max(1, nnz_bbt), Sym::No)?,
            bb: CooMatrix::new(n_pressure, n_velocity, usize::max(1, nnz_bb), Sym::No)?,
            aa_prec: Vec::new(),
            mp_prec: Vec::new(),
            amg: None,
            mp_csr: None,
            mp_jacobi: None,
        })
    }

    /// Returns the total number of DOFs
    pub fn n_dofs(&self) -> usize {
        self.n_velocity + self.n_pressure
    }

    /// Clears all matrix values (and drops the built preconditioners)
    pub fn reset(&mut self) {
        self.aa.reset();
        self.bbt.reset();
        self.bb.reset();
        self.aa_prec.clear();
        self.mp_prec.clear();
        self.amg = None;
        self.mp_csr = None;
        self.mp_jacobi = None;
    }

    /// Puts a value into the proper block of the system matrix
    ///
    /// Values landing in the pressure-pressure block are dropped: that
    /// block is identically zero in the saddle-point operator.
    fn put_system(&mut self, i: usize, j: usize, value: f64) -> Result<(), StrError> {
        let nu = self.n_velocity;
        match (i < nu, j < nu) {
            (true, true) => self.aa.put(i, j, value),
            (true, false) => self.bbt.put(i, j - nu, value),
            (false, true) => self.bb.put(i - nu, j, value),
            (false, false) => Ok(()),
        }
    }

    /// Puts a value into the proper block of the preconditioner matrix
    ///
    /// The preconditioner couples only within the diagonal blocks; cross
    /// values are dropped.
    fn put_prec(&mut self, i: usize, j: usize, value: f64) {
        let nu = self.n_velocity;
        match (i < nu, j < nu) {
            (true, true) => self.aa_prec.push((i, j, value)),
            (false, false) => self.mp_prec.push((i - nu, j - nu, value)),
            _ => (),
        }
    }

    /// Adds the local system and preconditioner matrices of one cell
    ///
    /// Constrained rows and columns are redistributed to their masters (the
    /// constrained rows/columns themselves receive nothing; their diagonal
    /// ones are put by `put_identity_rows`).
    pub fn add_local(
        &mut self,
        constraints: &Constraints,
        l2g: &[usize],
        kk: &Matrix,
        pp: &Matrix,
    ) -> Result<(), StrError> {
        for i in 0..NDOF_LOCAL {
            let gi = l2g[i];
            let row_default = [(gi, 1.0)];
            let rows = constraints.masters_of(gi).unwrap_or(&row_default);
            for j in 0..NDOF_LOCAL {
                let gj = l2g[j];
                let col_default = [(gj, 1.0)];
                let cols = constraints.masters_of(gj).unwrap_or(&col_default);
                let vk = kk.get(i, j);
                let vp = pp.get(i, j);
                if vk == 0.0 && vp == 0.0 {
                    continue;
                }
                for (r, cr) in rows {
                    for (c, cc) in cols {
                        let w = cr * cc;
                        if vk != 0.0 {
                            self.put_system(*r, *c, w * vk)?;
                        }
                        if vp != 0.0 {
                            self.put_prec(*r, *c, w * vp);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Puts ones on the diagonal of constrained rows of the system matrix
    ///
    /// Constrained pressure DOFs fall in the zero pressure-pressure block
    /// of the composed operator and are therefore skipped, mirroring the
    /// null operator used there.
    pub fn put_identity_rows(&mut self, constraints: &Constraints) -> Result<(), StrError> {
        for dof in constraints.constrained_dofs() {
            if dof < self.n_velocity {
                self.aa.put(dof, dof, 1.0)?;
            }
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
