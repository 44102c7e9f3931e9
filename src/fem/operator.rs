use super::{Amg, Cg, Csr, Jacobi, LinearSystem};
use crate::StrError;
use russell_lab::Vector;
use russell_sparse::CooMatrix;

/// Defines a matrix-free linear operator
///
/// The block operator and block preconditioner are composed from thin
/// adapters implementing this trait; no concrete composed matrix is ever
/// formed.
pub trait LinOp {
    /// Returns the dimension of the (square) operator
    fn dim(&self) -> usize;

    /// Computes v = Op(u)
    fn apply(&self, u: &Vector, v: &mut Vector) -> Result<(), StrError>;
}

/// Computes v = A·u for a sparse block, with v cleared first
pub(crate) fn coo_mat_vec(a: &CooMatrix, v: &mut Vector, u: &Vector) -> Result<(), StrError> {
    v.fill(0.0);
    a.mat_vec_mul(v, 1.0, u)
}

/// Wraps one square sparse block as a linear operator
pub struct MatOp<'a> {
    /// The wrapped block
    pub mat: &'a CooMatrix,

    /// Dimension
    pub n: usize,
}

impl<'a> LinOp for MatOp<'a> {
    fn dim(&self) -> usize {
        self.n
    }
    fn apply(&self, u: &Vector, v: &mut Vector) -> Result<(), StrError> {
        coo_mat_vec(self.mat, v, u)
    }
}

/// Composes the saddle-point block operator
///
/// ```text
/// [ A   Bt ] [ u_u ]
/// [ B   0  ] [ u_p ]
/// ```
pub struct BlockOperator<'a> {
    aa: &'a CooMatrix,
    bbt: &'a CooMatrix,
    bb: &'a CooMatrix,
    n_velocity: usize,
    n_pressure: usize,
}

impl<'a> BlockOperator<'a> {
    /// Composes the operator over the assembled system blocks
    pub fn new(system: &'a LinearSystem) -> Self {
        BlockOperator {
            aa: &system.aa,
            bbt: &system.bbt,
            bb: &system.bb,
            n_velocity: system.n_velocity,
            n_pressure: system.n_pressure,
        }
    }
}

impl<'a> LinOp for BlockOperator<'a> {
    fn dim(&self) -> usize {
        self.n_velocity + self.n_pressure
    }
    fn apply(&self, u: &Vector, v: &mut Vector) -> Result<(), StrError> {
        let (nu, np) = (self.n_velocity, self.n_pressure);
        let mut uu = Vector::new(nu);
        let mut up = Vector::new(np);
        for i in 0..nu {
            uu[i] = u[i];
        }
        for i in 0..np {
            up[i] = u[nu + i];
        }
        let mut t1 = Vector::new(nu);
        let mut t2 = Vector::new(nu);
        let mut t3 = Vector::new(np);
        coo_mat_vec(self.aa, &mut t1, &uu)?;
        coo_mat_vec(self.bbt, &mut t2, &up)?;
        coo_mat_vec(self.bb, &mut t3, &uu)?;
        for i in 0..nu {
            v[i] = t1[i] + t2[i];
        }
        for i in 0..np {
            v[nu + i] = t3[i];
        }
        Ok(())
    }
}

/// Composes the lower-triangular block preconditioner
///
/// ```text
///     [ A⁻¹            0    ]
/// P = [ S⁻¹·B·A⁻¹     -S⁻¹  ]
/// ```
///
/// where `A⁻¹` is the multigrid-preconditioned inner solve over the
/// velocity block of the system matrix and `S⁻¹` approximates the inverse
/// pressure Schur complement by the relaxation-preconditioned inner solve
/// over the pressure-mass block of the preconditioner matrix. Only two
/// approximate sub-solves are needed per application; the outer Krylov
/// method pays for the quality gap with extra iterations.
pub struct BlockPreconditioner<'a> {
    aa_op: MatOp<'a>,
    amg: &'a Amg,
    mp_csr: &'a Csr,
    mp_jacobi: &'a Jacobi,
    bb: &'a CooMatrix,
    cg: Cg,
    n_velocity: usize,
    n_pressure: usize,
}

impl<'a> BlockPreconditioner<'a> {
    /// Composes the preconditioner from the assembled system and the built
    /// approximate inverses
    pub fn new(
        system: &'a LinearSystem,
        amg: &'a Amg,
        mp_csr: &'a Csr,
        mp_jacobi: &'a Jacobi,
        cg: Cg,
    ) -> Self {
        BlockPreconditioner {
            aa_op: MatOp {
                mat: &system.aa,
                n: system.n_velocity,
            },
            amg,
            mp_csr,
            mp_jacobi,
            bb: &system.bb,
            cg,
            n_velocity: system.n_velocity,
            n_pressure: system.n_pressure,
        }
    }
}

impl<'a> LinOp for BlockPreconditioner<'a> {
    fn dim(&self) -> usize {
        self.n_velocity + self.n_pressure
    }
    fn apply(&self, r: &Vector, z: &mut Vector) -> Result<(), StrError> {
        let (nu, np) = (self.n_velocity, self.n_pressure);
        let mut ru = Vector::new(nu);
        let mut rp = Vector::new(np);
        for i in 0..nu {
            ru[i] = r[i];
        }
        for i in 0..np {
            rp[i] = r[nu + i];
        }
        // z_u = A⁻¹ r_u
        let mut zu = Vector::new(nu);
        self.cg.solve(&self.aa_op, self.amg, &ru, &mut zu)?;
        // z_p = S⁻¹ (B z_u - r_p) = (S⁻¹·B·A⁻¹) r_u - S⁻¹ r_p
        let mut bzu = Vector::new(np);
        coo_mat_vec(self.bb, &mut bzu, &zu)?;
        for i in 0..np {
            bzu[i] -= rp[i];
        }
        let mut zp = Vector::new(np);
        self.cg.solve(self.mp_csr, self.mp_jacobi, &bzu, &mut zp)?;
        for i in 0..nu {
            z[i] = zu[i];
        }
        for i in 0..np {
            z[nu + i] = zp[i];
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{coo_mat_vec, BlockOperator, LinOp, MatOp};
    use crate::fem::{Constraints, LinearSystem, Space};
    use crate::mesh::Samples;
    use russell_lab::{approx_eq, Vector};
    use russell_sparse::{CooMatrix, Sym};

    #[test]
    fn mat_op_works() {
        let mut a = CooMatrix::new(2, 2, 4, Sym::No).unwrap();
        a.put(0, 0, 2.0).unwrap();
        a.put(0, 1, 1.0).unwrap();
        a.put(1, 1, 3.0).unwrap();
        let op = MatOp { mat: &a, n: 2 };
        assert_eq!(op.dim(), 2);
        let mut v = Vector::new(2);
        op.apply(&Vector::from(&[1.0, 2.0]), &mut v).unwrap();
        assert_eq!(v.as_data(), &[4.0, 6.0]);
        // the work vector is cleared before the product
        coo_mat_vec(&a, &mut v, &Vector::from(&[1.0, 0.0])).unwrap();
        assert_eq!(v.as_data(), &[2.0, 0.0]);
    }

    #[test]
    fn block_operator_keeps_the_zero_pressure_block() {
        let mut mesh = Samples::rect(1, 1, 1.0, 1.0).unwrap();
        let space = Space::new(&mut mesh).unwrap();
        let mut constraints = Constraints::new();
        constraints.close().unwrap();
        let system = LinearSystem::new(&space, &constraints).unwrap();
        // with empty blocks the operator maps everything to zero
        let op = BlockOperator::new(&system);
        assert_eq!(op.dim(), space.n_dofs());
        let u = Vector::filled(space.n_dofs(), 1.0);
        let mut v = Vector::filled(space.n_dofs(), 123.0);
        op.apply(&u, &mut v).unwrap();
        for i in 0..space.n_dofs() {
            approx_eq(v[i], 0.0, 1e-15);
        }
    }
}
