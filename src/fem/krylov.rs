use super::LinOp;
use crate::StrError;
use russell_lab::{vec_copy, vec_inner, vec_norm, Norm, Vector};

/// Implements the preconditioned conjugate-gradient method
///
/// Used for the inner approximate-inverse solves of the block
/// preconditioner. The stopping criterion combines an absolute tolerance
/// with a residual-reduction factor (whichever is reached first).
pub struct Cg {
    /// Maximum number of iterations
    pub it_max: usize,

    /// Absolute tolerance on the residual norm
    pub tol_abs: f64,

    /// Residual reduction factor
    pub reduction: f64,
}

impl Cg {
    /// Allocates a new instance
    pub fn new(it_max: usize, tol_abs: f64, reduction: f64) -> Self {
        Cg {
            it_max,
            tol_abs,
            reduction,
        }
    }

    /// Solves A x = b with a zero initial guess; returns the number of iterations
    pub fn solve(
        &self,
        op: &dyn LinOp,
        prec: &dyn LinOp,
        b: &Vector,
        x: &mut Vector,
    ) -> Result<usize, StrError> {
        let n = b.dim();
        x.fill(0.0);
        let mut r = b.clone();
        let norm0 = vec_norm(&r, Norm::Euc);
        if norm0 == 0.0 {
            return Ok(0);
        }
        let tol = f64::max(self.tol_abs, self.reduction * norm0);
        let mut z = Vector::new(n);
        prec.apply(&r, &mut z)?;
        let mut p = z.clone();
        let mut rz = vec_inner(&r, &z);
        let mut q = Vector::new(n);
        for it in 0..self.it_max {
            op.apply(&p, &mut q)?;
            let pq = vec_inner(&p, &q);
            if pq == 0.0 {
                return Err("inner solve broke down (p·Ap = 0)");
            }
            let alpha = rz / pq;
            for i in 0..n {
                x[i] += alpha * p[i];
                r[i] -= alpha * q[i];
            }
            if vec_norm(&r, Norm::Euc) <= tol {
                return Ok(it + 1);
            }
            prec.apply(&r, &mut z)?;
            let rz_new = vec_inner(&r, &z);
            let beta = rz_new / rz;
            rz = rz_new;
            for i in 0..n {
                p[i] = z[i] + beta * p[i];
            }
        }
        Err("inner solve did not converge")
    }
}

/// Implements the restarted flexible GMRES method
///
/// The preconditioner is applied on the right and may change between
/// iterations (its action is an iterative solve), hence the flexible
/// variant storing the preconditioned directions.
pub struct Fgmres {
    /// Restart length (maximum Krylov basis size)
    pub restart: usize,

    /// Maximum number of iterations over all restarts
    pub it_max: usize,

    /// Absolute tolerance on the residual norm
    pub tol: f64,
}

impl Fgmres {
    /// Allocates a new instance
    pub fn new(restart: usize, it_max: usize, tol: f64) -> Self {
        Fgmres { restart, it_max, tol }
    }

    /// Solves A x = b starting from the current x; returns the number of iterations
    pub fn solve(
        &self,
        op: &dyn LinOp,
        prec: &dyn LinOp,
        b: &Vector,
        x: &mut Vector,
    ) -> Result<usize, StrError> {
        let n = b.dim();
        let m = self.restart;
        let mut total = 0;
        let mut work = Vector::new(n);
        loop {
            // initial residual of this restart cycle
            op.apply(x, &mut work)?;
            let mut r = Vector::new(n);
            for i in 0..n {
                r[i] = b[i] - work[i];
            }
            let beta = vec_norm(&r, Norm::Euc);
            if beta <= self.tol {
                return Ok(total);
            }
            if total >= self.it_max {
                return Err("linear solver did not converge");
            }

            // Arnoldi with Givens rotations
            let mut vv: Vec<Vector> = Vec::with_capacity(m + 1);
            let mut zz: Vec<Vector> = Vec::with_capacity(m);
            let mut hh = vec![vec![0.0; m]; m + 1];
            let mut cs = vec![0.0; m];
            let mut sn = vec![0.0; m];
            let mut g = vec![0.0; m + 1];
            g[0] = beta;
            let mut v0 = r;
            for i in 0..n {
                v0[i] /= beta;
            }
            vv.push(v0);

            let mut k_used = 0;
            let mut converged = false;
            for j in 0..m {
                if total >= self.it_max {
                    break;
                }
                let mut z = Vector::new(n);
                prec.apply(&vv[j], &mut z)?;
                let mut w = Vector::new(n);
                op.apply(&z, &mut w)?;
                zz.push(z);
                for i in 0..=j {
                    let h = vec_inner(&w, &vv[i]);
                    hh[i][j] = h;
                    for l in 0..n {
                        w[l] -= h * vv[i][l];
                    }
                }
                let h_next = vec_norm(&w, Norm::Euc);
                hh[j + 1][j] = h_next;
                // apply the previous rotations to the new column
                for i in 0..j {
                    let tmp = cs[i] * hh[i][j] + sn[i] * hh[i + 1][j];
                    hh[i + 1][j] = -sn[i] * hh[i][j] + cs[i] * hh[i + 1][j];
                    hh[i][j] = tmp;
                }
                // new rotation annihilating hh[j+1][j]
                let denom = f64::hypot(hh[j][j], hh[j + 1][j]);
                if denom == 0.0 {
                    return Err("linear solver broke down (zero Hessenberg column)");
                }
                cs[j] = hh[j][j] / denom;
                sn[j] = hh[j + 1][j] / denom;
                hh[j][j] = denom;
                hh[j + 1][j] = 0.0;
                g[j + 1] = -sn[j] * g[j];
                g[j] *= cs[j];
                total += 1;
                k_used = j + 1;
                if g[j + 1].abs() <= self.tol {
                    converged = true;
                    break;
                }
                if h_next == 0.0 {
                    break; // invariant subspace reached
                }
                let mut v = w;
                for l in 0..n {
                    v[l] /= h_next;
                }
                vv.push(v);
            }

            // solve the triangular system and update x with the stored directions
            if k_used > 0 {
                let mut y = vec![0.0; k_used];
                for i in (0..k_used).rev() {
                    let mut sum = g[i];
                    for j in (i + 1)..k_used {
                        sum -= hh[i][j] * y[j];
                    }
                    y[i] = sum / hh[i][i];
                }
                for j in 0..k_used {
                    for l in 0..n {
                        x[l] += y[j] * zz[j][l];
                    }
                }
            }
            if converged {
                return Ok(total);
            }
            if total >= self.it_max {
                // final residual check before reporting failure
                op.apply(x, &mut work)?;
                let mut rr = Vector::new(n);
                vec_copy(&mut rr, b).unwrap();
                for i in 0..n {
                    rr[i] -= work[i];
                }
                if vec_norm(&rr, Norm::Euc) <= self.tol {
                    return Ok(total);
                }
                return Err("linear solver did not converge");
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
