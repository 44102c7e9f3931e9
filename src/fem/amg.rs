use super::LinOp;
use crate::StrError;
use russell_lab::{solve_lin_sys, Matrix, Vector};
use std::collections::HashMap;

/// Holds a sparse matrix in compressed-row form
///
/// Built from assembly triples (duplicates are summed). This is the
/// row-wise storage traversed by the multigrid setup and relaxations; the
/// solver-facing system blocks stay in the sparse-solver format.
pub struct Csr {
    /// Matrix dimension (square)
    pub n: usize,

    /// Row pointers (n + 1)
    pub ptr: Vec<usize>,

    /// Column indices
    pub col: Vec<usize>,

    /// Values
    pub val: Vec<f64>,
}

impl Csr {
    /// Builds from (i, j, value) triples, summing duplicates
    pub fn from_triples(n: usize, triples: &[(usize, usize, f64)]) -> Result<Self, StrError> {
        if n < 1 {
            return Err("the matrix dimension must be ≥ 1");
        }
        let mut rows: Vec<HashMap<usize, f64>> = vec![HashMap::new(); n];
        for (i, j, v) in triples {
            if *i >= n || *j >= n {
                return Err("triple indices are out of bounds");
            }
            *rows[*i].entry(*j).or_insert(0.0) += v;
        }
        let mut ptr = Vec::with_capacity(n + 1);
        let mut col = Vec::new();
        let mut val = Vec::new();
        ptr.push(0);
        for row in &rows {
            let mut entries: Vec<(usize, f64)> = row.iter().map(|(j, v)| (*j, *v)).collect();
            entries.sort_by_key(|(j, _)| *j);
            for (j, v) in entries {
                col.push(j);
                val.push(v);
            }
            ptr.push(col.len());
        }
        Ok(Csr { n, ptr, col, val })
    }

    /// Computes v = A·u
    pub fn mat_vec(&self, v: &mut Vector, u: &Vector) {
        for i in 0..self.n {
            let mut sum = 0.0;
            for k in self.ptr[i]..self.ptr[i + 1] {
                sum += self.val[k] * u[self.col[k]];
            }
            v[i] = sum;
        }
    }

    /// Returns the diagonal entries
    pub fn diagonal(&self) -> Vector {
        let mut d = Vector::new(self.n);
        for i in 0..self.n {
            for k in self.ptr[i]..self.ptr[i + 1] {
                if self.col[k] == i {
                    d[i] = self.val[k];
                }
            }
        }
        d
    }

    /// Converts to a dense matrix
    pub fn to_dense(&self) -> Matrix {
        let mut a = Matrix::new(self.n, self.n);
        for i in 0..self.n {
            for k in self.ptr[i]..self.ptr[i + 1] {
                a.set(i, self.col[k], self.val[k]);
            }
        }
        a
    }
}

impl LinOp for Csr {
    fn dim(&self) -> usize {
        self.n
    }
    fn apply(&self, u: &Vector, v: &mut Vector) -> Result<(), StrError> {
        self.mat_vec(v, u);
        Ok(())
    }
}

/// Implements the Jacobi (diagonal) relaxation as an approximate inverse
pub struct Jacobi {
    inv_diag: Vector,
}

impl Jacobi {
    /// Builds the relaxation from assembly triples
    pub fn new(n: usize, triples: &[(usize, usize, f64)]) -> Result<Self, StrError> {
        let mut diag = Vector::new(n);
        for (i, j, v) in triples {
            if i == j {
                diag[*i] += v;
            }
        }
        let mut inv_diag = Vector::new(n);
        for i in 0..n {
            if diag[i] == 0.0 {
                return Err("cannot build the Jacobi relaxation with a zero diagonal entry");
            }
            inv_diag[i] = 1.0 / diag[i];
        }
        Ok(Jacobi { inv_diag })
    }
}

impl LinOp for Jacobi {
    fn dim(&self) -> usize {
        self.inv_diag.dim()
    }
    fn apply(&self, u: &Vector, v: &mut Vector) -> Result<(), StrError> {
        for i in 0..self.inv_diag.dim() {
            v[i] = self.inv_diag[i] * u[i];
        }
        Ok(())
    }
}

/// Holds one level of the multigrid hierarchy
struct AmgLevel {
    /// Operator on this level
    a: Csr,

    /// Prolongation from the next coarser level (n × nc)
    p_ptr: Vec<usize>,
    p_col: Vec<usize>,
    p_val: Vec<f64>,

    /// Coarse dimension
    nc: usize,

    /// Inverse diagonal for the damped-Jacobi smoother
    inv_diag: Vector,
}

impl AmgLevel {
    /// Computes vc = Pᵀ·v (restriction)
    fn restrict(&self, vc: &mut Vector, v: &Vector) {
        vc.fill(0.0);
        for i in 0..self.a.n {
            for k in self.p_ptr[i]..self.p_ptr[i + 1] {
                vc[self.p_col[k]] += self.p_val[k] * v[i];
            }
        }
    }

    /// Computes v += P·vc (prolongation)
    fn prolongate_add(&self, v: &mut Vector, vc: &Vector) {
        for i in 0..self.a.n {
            for k in self.p_ptr[i]..self.p_ptr[i + 1] {
                v[i] += self.p_val[k] * vc[self.p_col[k]];
            }
        }
    }
}

/// Implements an aggregation-based algebraic multigrid approximate inverse
///
/// Setup: strength-filtered greedy aggregation, a tentative prolongator
/// built from the near-null-space modes (orthonormalized per aggregate,
/// zero columns dropped), and Galerkin coarse operators. One application
/// performs a single V-cycle with damped-Jacobi smoothing and a dense
/// solve on the coarsest level.
pub struct Amg {
    levels: Vec<AmgLevel>,
    coarsest: Matrix,
    coarsest_n: usize,
    smoother_sweeps: usize,
}

/// Damping factor of the Jacobi smoother
const JACOBI_OMEGA: f64 = 2.0 / 3.0;

impl Amg {
    /// Builds the hierarchy
    ///
    /// # Input
    ///
    /// * `n` -- dimension of the (velocity) block
    /// * `triples` -- assembly triples of the block
    /// * `near_null` -- near-null-space modes (e.g. per-component constants)
    /// * `strength_threshold` -- strength-of-connection filter
    /// * `smoother_sweeps` -- relaxation sweeps before and after coarse correction
    /// * `coarsest_max` -- size at which the hierarchy stops and a dense solve is used
    pub fn new(
        n: usize,
        triples: &[(usize, usize, f64)],
        near_null: &[Vector],
        strength_threshold: f64,
        smoother_sweeps: usize,
        coarsest_max: usize,
    ) -> Result<Self, StrError> {
        if near_null.is_empty() {
            return Err("at least one near-null-space mode is required");
        }
        let mut a = Csr::from_triples(n, triples)?;
        let mut modes: Vec<Vector> = near_null.to_vec();
        let mut levels = Vec::new();
        const MAX_LEVELS: usize = 10;
        while a.n > coarsest_max && levels.len() < MAX_LEVELS {
            let aggregates = Self::aggregate(&a, strength_threshold);
            let n_agg = 1 + aggregates.iter().copied().max().unwrap_or(0);
            let (p_rows, nc, coarse_modes) = Self::tentative_prolongator(&a, &aggregates, n_agg, &modes)?;
            if nc == 0 || nc >= a.n {
                break; // aggregation stalled; stop coarsening here
            }
            // CSR of P (row-wise over fine rows)
            let mut p_ptr = Vec::with_capacity(a.n + 1);
            let mut p_col = Vec::new();
            let mut p_val = Vec::new();
            p_ptr.push(0);
            for row in &p_rows {
                for (j, v) in row {
                    p_col.push(*j);
                    p_val.push(*v);
                }
                p_ptr.push(p_col.len());
            }
            // Galerkin coarse operator Ac = Pᵀ A P
            let mut coarse: HashMap<(usize, usize), f64> = HashMap::new();
            for i in 0..a.n {
                for k in a.ptr[i]..a.ptr[i + 1] {
                    let j = a.col[k];
                    let v = a.val[k];
                    for ki in p_ptr[i]..p_ptr[i + 1] {
                        for kj in p_ptr[j]..p_ptr[j + 1] {
                            *coarse.entry((p_col[ki], p_col[kj])).or_insert(0.0) +=
                                p_val[ki] * v * p_val[kj];
                        }
                    }
                }
            }
            let coarse_triples: Vec<(usize, usize, f64)> =
                coarse.into_iter().map(|((i, j), v)| (i, j, v)).collect();
            let a_coarse = Csr::from_triples(nc, &coarse_triples)?;
            let inv_diag = Self::inverse_diagonal(&a)?;
            levels.push(AmgLevel {
                a,
                p_ptr,
                p_col,
                p_val,
                nc,
                inv_diag,
            });
            a = a_coarse;
            modes = coarse_modes;
        }
        let coarsest = a.to_dense();
        Ok(Amg {
            levels,
            coarsest_n: a.n,
            coarsest,
            smoother_sweeps,
        })
    }

    fn inverse_diagonal(a: &Csr) -> Result<Vector, StrError> {
        let diag = a.diagonal();
        let mut inv = Vector::new(a.n);
        for i in 0..a.n {
            if diag[i] == 0.0 {
                return Err("cannot smooth a level with a zero diagonal entry");
            }
            inv[i] = 1.0 / diag[i];
        }
        Ok(inv)
    }

    /// Greedy aggregation over the strength-filtered graph
    fn aggregate(a: &Csr, theta: f64) -> Vec<usize> {
        let diag = a.diagonal();
        let strong = |i: usize, k: usize| -> bool {
            let j = a.col[k];
            if j == i {
                return false;
            }
            let v = a.val[k].abs();
            v > theta * f64::sqrt(diag[i].abs() * diag[j].abs())
        };
        const UNSET: usize = usize::MAX;
        let mut agg = vec![UNSET; a.n];
        let mut next = 0;
        // pass 1: roots whose strong neighborhood is fully unaggregated
        for i in 0..a.n {
            if agg[i] != UNSET {
                continue;
            }
            let all_free = (a.ptr[i]..a.ptr[i + 1]).all(|k| !strong(i, k) || agg[a.col[k]] == UNSET);
            if all_free {
                agg[i] = next;
                for k in a.ptr[i]..a.ptr[i + 1] {
                    if strong(i, k) {
                        agg[a.col[k]] = next;
                    }
                }
                next += 1;
            }
        }
        // pass 2: attach leftovers to a neighboring aggregate (or make singletons)
        for i in 0..a.n {
            if agg[i] != UNSET {
                continue;
            }
            let mut joined = false;
            for k in a.ptr[i]..a.ptr[i + 1] {
                if strong(i, k) && agg[a.col[k]] != UNSET {
                    agg[i] = agg[a.col[k]];
                    joined = true;
                    break;
                }
            }
            if !joined {
                for k in a.ptr[i]..a.ptr[i + 1] {
                    if agg[a.col[k]] != UNSET {
                        agg[i] = agg[a.col[k]];
                        joined = true;
                        break;
                    }
                }
            }
            if !joined {
                agg[i] = next;
                next += 1;
            }
        }
        agg
    }

    /// Builds the tentative prolongator from the near-null-space modes
    ///
    /// Returns the P rows, the coarse dimension, and the coarse-level modes.
    #[allow(clippy::type_complexity)]
    fn tentative_prolongator(
        a: &Csr,
        aggregates: &[usize],
        n_agg: usize,
        modes: &[Vector],
    ) -> Result<(Vec<Vec<(usize, f64)>>, usize, Vec<Vector>), StrError> {
        let n_modes = modes.len();
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); n_agg];
        for (i, g) in aggregates.iter().enumerate() {
            members[*g].push(i);
        }
        let mut p_rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); a.n];
        let mut nc = 0;
        let mut coarse_cols: Vec<Vec<(usize, Vec<f64>)>> = Vec::with_capacity(n_agg);
        for rows in &members {
            // modified Gram-Schmidt over the restricted modes; zero-norm
            // columns (modes vanishing on this aggregate) are dropped
            let mut kept: Vec<(usize, Vec<f64>)> = Vec::new(); // (coarse dof, orthonormal column)
            for mode in modes {
                let mut col: Vec<f64> = rows.iter().map(|i| mode[*i]).collect();
                for (_, q) in &kept {
                    let dot: f64 = col.iter().zip(q.iter()).map(|(x, y)| x * y).sum();
                    for (x, y) in col.iter_mut().zip(q.iter()) {
                        *x -= dot * y;
                    }
                }
                let norm: f64 = f64::sqrt(col.iter().map(|x| x * x).sum());
                if norm > 1e-12 {
                    for x in col.iter_mut() {
                        *x /= norm;
                    }
                    kept.push((nc, col));
                    nc += 1;
                }
            }
            for (cdof, q) in &kept {
                for (local, i) in rows.iter().enumerate() {
                    if q[local] != 0.0 {
                        p_rows[*i].push((*cdof, q[local]));
                    }
                }
            }
            coarse_cols.push(kept);
        }
        // coarse-level modes: entries are the projections of the fine modes
        // onto the kept columns, computed per aggregate
        let mut coarse_modes: Vec<Vector> = (0..n_modes).map(|_| Vector::new(nc)).collect();
        for (g, rows) in members.iter().enumerate() {
            for (cdof, q) in &coarse_cols[g] {
                for (j, mode) in modes.iter().enumerate() {
                    let mut dot = 0.0;
                    for (local, i) in rows.iter().enumerate() {
                        dot += q[local] * mode[*i];
                    }
                    coarse_modes[j][*cdof] = dot;
                }
            }
        }
        Ok((p_rows, nc, coarse_modes))
    }

    /// Performs the damped-Jacobi sweeps x += ω D⁻¹ (b − A x)
    fn smooth(level: &AmgLevel, x: &mut Vector, b: &Vector, sweeps: usize, work: &mut Vector) {
        for _ in 0..sweeps {
            level.a.mat_vec(work, x);
            for i in 0..level.a.n {
                x[i] += JACOBI_OMEGA * level.inv_diag[i] * (b[i] - work[i]);
            }
        }
    }

    /// Runs one V-cycle starting at the given level with a zero initial guess
    fn vcycle(&self, depth: usize, b: &Vector) -> Result<Vector, StrError> {
        if depth == self.levels.len() {
            // dense solve on the coarsest level
            let mut a = self.coarsest.clone();
            let mut x = b.clone();
            if self.coarsest_n > 0 {
                solve_lin_sys(&mut x, &mut a)?;
            }
            return Ok(x);
        }
        let level = &self.levels[depth];
        let n = level.a.n;
        let mut x = Vector::new(n);
        let mut work = Vector::new(n);
        Self::smooth(level, &mut x, b, self.smoother_sweeps, &mut work);
        // coarse-grid correction
        level.a.mat_vec(&mut work, &x);
        let mut residual = Vector::new(n);
        for i in 0..n {
            residual[i] = b[i] - work[i];
        }
        let mut coarse_b = Vector::new(level.nc);
        level.restrict(&mut coarse_b, &residual);
        let coarse_x = self.vcycle(depth + 1, &coarse_b)?;
        level.prolongate_add(&mut x, &coarse_x);
        Self::smooth(level, &mut x, b, self.smoother_sweeps, &mut work);
        Ok(x)
    }

    /// Returns the number of levels (including the coarsest)
    pub fn n_levels(&self) -> usize {
        self.levels.len() + 1
    }
}

impl LinOp for Amg {
    fn dim(&self) -> usize {
        match self.levels.first() {
            Some(level) => level.a.n,
            None => self.coarsest_n,
        }
    }
    fn apply(&self, u: &Vector, v: &mut Vector) -> Result<(), StrError> {
        let x = self.vcycle(0, u)?;
        for i in 0..x.dim() {
            v[i] = x[i];
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
