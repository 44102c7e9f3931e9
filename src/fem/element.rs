use super::{NDOF_LOCAL, NNODE_PRESSURE, NNODE_VELOCITY};
use crate::mesh::{Mesh, PointId};
use crate::{FnSpaceTime, StrError};
use gemlab::integ::Gauss;
use gemlab::shapes::{GeoKind, Scratchpad};
use russell_lab::{Matrix, Vector};

#[inline]
fn acc(m: &mut Matrix, i: usize, j: usize, value: f64) {
    let current = m.get(i, j);
    m.set(i, j, current + value);
}

/// Implements the local equations of the transient Stokes problem
///
/// Local DOF layout: velocity DOFs first (two components per Q2 node,
/// node-major), then the four Q1 pressure DOFs. The same scratch instance
/// is reused for every cell: call `set_cell` and then one of the
/// calculation functions.
pub struct ElementStokes {
    /// Scratchpad of the Q2 velocity basis
    pad_u: Scratchpad,

    /// Scratchpad of the Q1 pressure basis
    pad_p: Scratchpad,

    /// Integration (Gauss) points (3 × 3)
    gauss: Gauss,

    /// Local residual vector
    pub residual: Vector,

    /// Local matrix of the system (Jacobian) block form
    pub kk: Matrix,

    /// Local matrix of the cheaper preconditioner block form
    pub pp: Matrix,
}

impl ElementStokes {
    /// Allocates a new instance
    pub fn new() -> Result<Self, StrError> {
        Ok(ElementStokes {
            pad_u: Scratchpad::new(2, GeoKind::Qua9)?,
            pad_p: Scratchpad::new(2, GeoKind::Qua4)?,
            gauss: Gauss::new(GeoKind::Qua9),
            residual: Vector::new(NDOF_LOCAL),
            kk: Matrix::new(NDOF_LOCAL, NDOF_LOCAL),
            pp: Matrix::new(NDOF_LOCAL, NDOF_LOCAL),
        })
    }

    /// Sets the coordinates of the pads from the nine velocity nodes of a cell
    pub fn set_cell(&mut self, mesh: &Mesh, nodes: &[PointId; NNODE_VELOCITY]) {
        for m in 0..NNODE_VELOCITY {
            let coords = mesh.points[nodes[m]].coords;
            self.pad_u.set_xx(m, 0, coords[0]);
            self.pad_u.set_xx(m, 1, coords[1]);
        }
        for m in 0..NNODE_PRESSURE {
            let coords = mesh.points[nodes[m]].coords;
            self.pad_p.set_xx(m, 0, coords[0]);
            self.pad_p.set_xx(m, 1, coords[1]);
        }
    }

    /// Computes the local residual of the weak form at (t, y, y_dot)
    ///
    /// Accumulates, for every test function, the time-derivative term, the
    /// viscous term `mu ε(u):ε(v)`, the two pressure-divergence coupling
    /// terms, and the forcing term.
    pub fn calc_residual(
        &mut self,
        t: f64,
        mu: f64,
        yy: &Vector,
        yy_dot: &Vector,
        l2g: &[usize],
        forcing_fx: FnSpaceTime,
        forcing_fy: FnSpaceTime,
    ) -> Result<(), StrError> {
        self.residual.fill(0.0);
        for p in 0..self.gauss.npoint() {
            let iota = self.gauss.coords(p);
            let det_jac = self.pad_u.calc_gradient(iota)?;
            (self.pad_u.fn_interp)(&mut self.pad_u.interp, iota);
            (self.pad_p.fn_interp)(&mut self.pad_p.interp, iota);
            let wdet = self.gauss.weight(p) * det_jac;

            // solution values at the integration point
            let mut u_dot = [0.0; 2];
            let mut grad = [[0.0; 2]; 2]; // grad[c][d] = ∂u_c/∂x_d
            let mut x = [0.0; 2];
            for m in 0..NNODE_VELOCITY {
                let nm = self.pad_u.interp[m];
                let gm = [self.pad_u.gradient.get(m, 0), self.pad_u.gradient.get(m, 1)];
                for c in 0..2 {
                    let v = yy[l2g[2 * m + c]];
                    u_dot[c] += nm * yy_dot[l2g[2 * m + c]];
                    grad[c][0] += gm[0] * v;
                    grad[c][1] += gm[1] * v;
                }
                x[0] += nm * self.pad_u.xxt.get(0, m);
                x[1] += nm * self.pad_u.xxt.get(1, m);
            }
            let eps = [
                [grad[0][0], 0.5 * (grad[0][1] + grad[1][0])],
                [0.5 * (grad[0][1] + grad[1][0]), grad[1][1]],
            ];
            let div_u = grad[0][0] + grad[1][1];
            let mut p_val = 0.0;
            for c in 0..NNODE_PRESSURE {
                p_val += self.pad_p.interp[c] * yy[l2g[18 + c]];
            }
            let f = [forcing_fx(&x, t), forcing_fy(&x, t)];

            // momentum test functions
            for m in 0..NNODE_VELOCITY {
                let nm = self.pad_u.interp[m];
                let gm = [self.pad_u.gradient.get(m, 0), self.pad_u.gradient.get(m, 1)];
                for c in 0..2 {
                    let eps_uv = eps[c][0] * gm[0] + eps[c][1] * gm[1];
                    self.residual[2 * m + c] +=
                        (u_dot[c] * nm + mu * eps_uv - p_val * gm[c] - f[c] * nm) * wdet;
                }
            }
            // incompressibility test functions
            for c in 0..NNODE_PRESSURE {
                self.residual[18 + c] -= div_u * self.pad_p.interp[c] * wdet;
            }
        }
        if self.residual.as_data().iter().any(|v| !v.is_finite()) {
            return Err("assembly produced a non-finite residual value");
        }
        Ok(())
    }

    /// Computes the local system and preconditioner matrices
    ///
    /// The system block carries `alpha`-scaled velocity mass, the viscous
    /// bilinear form and the symmetric pressure-divergence coupling. The
    /// preconditioner block is the cheaper spectrally-equivalent surrogate:
    /// velocity mass scaled by `1/alpha`, the full-gradient viscous form,
    /// and pressure mass scaled by `1/mu`.
    pub fn calc_jacobian(&mut self, mu: f64, alpha: f64) -> Result<(), StrError> {
        if alpha == 0.0 {
            return Err("alpha must be nonzero to assemble the Jacobian");
        }
        self.kk.fill(0.0);
        self.pp.fill(0.0);
        for p in 0..self.gauss.npoint() {
            let iota = self.gauss.coords(p);
            let det_jac = self.pad_u.calc_gradient(iota)?;
            (self.pad_u.fn_interp)(&mut self.pad_u.interp, iota);
            (self.pad_p.fn_interp)(&mut self.pad_p.interp, iota);
            let wdet = self.gauss.weight(p) * det_jac;

            for m in 0..NNODE_VELOCITY {
                let nm = self.pad_u.interp[m];
                let gm = [self.pad_u.gradient.get(m, 0), self.pad_u.gradient.get(m, 1)];
                for n in 0..NNODE_VELOCITY {
                    let nn = self.pad_u.interp[n];
                    let gn = [self.pad_u.gradient.get(n, 0), self.pad_u.gradient.get(n, 1)];
                    let gg = gm[0] * gn[0] + gm[1] * gn[1];
                    for c in 0..2 {
                        for d in 0..2 {
                            let delta = if c == d { 1.0 } else { 0.0 };
                            let eps_ij = 0.5 * (delta * gg + gm[d] * gn[c]);
                            acc(
                                &mut self.kk,
                                2 * m + c,
                                2 * n + d,
                                (alpha * nm * nn * delta + mu * eps_ij) * wdet,
                            );
                            acc(
                                &mut self.pp,
                                2 * m + c,
                                2 * n + d,
                                ((1.0 / alpha) * nm * nn * delta + mu * gg * delta) * wdet,
                            );
                        }
                    }
                }
                // pressure-divergence coupling (symmetric)
                for e in 0..NNODE_PRESSURE {
                    let psi = self.pad_p.interp[e];
                    for c in 0..2 {
                        acc(&mut self.kk, 2 * m + c, 18 + e, -gm[c] * psi * wdet);
                        acc(&mut self.kk, 18 + e, 2 * m + c, -psi * gm[c] * wdet);
                    }
                }
            }
            // pressure mass of the preconditioner
            for e in 0..NNODE_PRESSURE {
                for f in 0..NNODE_PRESSURE {
                    acc(
                        &mut self.pp,
                        18 + e,
                        18 + f,
                        (1.0 / mu) * self.pad_p.interp[e] * self.pad_p.interp[f] * wdet,
                    );
                }
            }
        }
        if self.kk.as_data().iter().any(|v| !v.is_finite()) {
            return Err("assembly produced a non-finite Jacobian value");
        }
        Ok(())
    }

    /// Computes the squared L2 error of the velocity against an exact solution
    pub fn calc_velocity_error_squared(
        &mut self,
        t: f64,
        yy: &Vector,
        l2g: &[usize],
        exact_ux: FnSpaceTime,
        exact_uy: FnSpaceTime,
    ) -> Result<f64, StrError> {
        let mut sum = 0.0;
        for p in 0..self.gauss.npoint() {
            let iota = self.gauss.coords(p);
            let det_jac = self.pad_u.calc_gradient(iota)?;
            (self.pad_u.fn_interp)(&mut self.pad_u.interp, iota);
            let wdet = self.gauss.weight(p) * det_jac;
            let mut u = [0.0; 2];
            let mut x = [0.0; 2];
            for m in 0..NNODE_VELOCITY {
                let nm = self.pad_u.interp[m];
                u[0] += nm * yy[l2g[2 * m]];
                u[1] += nm * yy[l2g[2 * m + 1]];
                x[0] += nm * self.pad_u.xxt.get(0, m);
                x[1] += nm * self.pad_u.xxt.get(1, m);
            }
            let dx = u[0] - exact_ux(&x, t);
            let dy = u[1] - exact_uy(&x, t);
            sum += (dx * dx + dy * dy) * wdet;
        }
        Ok(sum)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::ElementStokes;
    use crate::base::fn_zero;
    use crate::fem::Space;
    use crate::mesh::Samples;
    use russell_lab::{approx_eq, Vector};

    /// ∫ N_m over the unit square for the Q2 basis (corners, edges, center)
    const Q2_INTEGRALS: [f64; 9] = [
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 9.0,
        1.0 / 9.0,
        1.0 / 9.0,
        1.0 / 9.0,
        4.0 / 9.0,
    ];

    #[test]
    fn residual_vanishes_for_rigid_motion() {
        let mut mesh = Samples::rect(1, 1, 1.0, 1.0).unwrap();
        let space = Space::new(&mut mesh).unwrap();
        let mut elem = ElementStokes::new().unwrap();
        elem.set_cell(&mesh, &space.cell_nodes[0]);
        // constant velocity, zero pressure, zero derivative
        let mut yy = Vector::new(space.n_dofs());
        for i in 0..space.vnodes.len() {
            yy[2 * i] = 3.0;
            yy[2 * i + 1] = -2.0;
        }
        let yy_dot = Vector::new(space.n_dofs());
        elem.calc_residual(0.0, 1.0, &yy, &yy_dot, &space.local_to_global[0], fn_zero, fn_zero)
            .unwrap();
        for i in 0..22 {
            approx_eq(elem.residual[i], 0.0, 1e-13);
        }
    }

    #[test]
    fn jacobian_is_symmetric() {
        let mut mesh = Samples::rect(1, 1, 1.0, 1.0).unwrap();
        let space = Space::new(&mut mesh).unwrap();
        let mut elem = ElementStokes::new().unwrap();
        elem.set_cell(&mesh, &space.cell_nodes[0]);
        elem.calc_jacobian(0.7, 2.5).unwrap();
        for i in 0..22 {
            for j in 0..22 {
                approx_eq(elem.kk.get(i, j), elem.kk.get(j, i), 1e-13);
                approx_eq(elem.pp.get(i, j), elem.pp.get(j, i), 1e-13);
            }
        }
        // the pressure-pressure block of the system matrix is zero
        for e in 18..22 {
            for f in 18..22 {
                assert_eq!(elem.kk.get(e, f), 0.0);
            }
        }
    }

    #[test]
    fn mass_term_scales_with_alpha() {
        let mut mesh = Samples::rect(1, 1, 1.0, 1.0).unwrap();
        let space = Space::new(&mut mesh).unwrap();
        let mut elem = ElementStokes::new().unwrap();
        elem.set_cell(&mesh, &space.cell_nodes[0]);
        elem.calc_jacobian(1.0, 1.0).unwrap();
        let kk1 = elem.kk.clone();
        elem.calc_jacobian(1.0, 3.0).unwrap();
        let kk3 = elem.kk.clone();
        // (kk3 - kk1)/2 is the velocity mass matrix; its row sums over one
        // component equal the exact integrals of the Q2 basis functions
        for m in 0..9 {
            for c in 0..2 {
                let mut row_sum = 0.0;
                for n in 0..9 {
                    row_sum += (kk3.get(2 * m + c, 2 * n + c) - kk1.get(2 * m + c, 2 * n + c)) / 2.0;
                }
                approx_eq(row_sum, Q2_INTEGRALS[m], 1e-14);
            }
        }
    }

    #[test]
    fn residual_is_consistent_with_jacobian() {
        // for the linear Stokes weak form: r(y, ẏ) = M ẏ + K y with zero
        // forcing, where kk(alpha) = alpha M + K
        let mut mesh = Samples::rect(1, 1, 1.0, 1.0).unwrap();
        let space = Space::new(&mut mesh).unwrap();
        let mut elem = ElementStokes::new().unwrap();
        elem.set_cell(&mesh, &space.cell_nodes[0]);
        let mu = 1.3;
        elem.calc_jacobian(mu, 1.0).unwrap();
        let kk1 = elem.kk.clone();
        elem.calc_jacobian(mu, 2.0).unwrap();
        let kk2 = elem.kk.clone();

        // random-ish local fields
        let l2g = &space.local_to_global[0];
        let mut yy = Vector::new(space.n_dofs());
        let mut yy_dot = Vector::new(space.n_dofs());
        for (i, g) in l2g.iter().enumerate() {
            yy[*g] = f64::sin(1.0 + i as f64);
            yy_dot[*g] = f64::cos(2.0 + 0.5 * (i as f64));
        }
        elem.calc_residual(0.0, mu, &yy, &yy_dot, l2g, fn_zero, fn_zero).unwrap();

        // note: the mass matrix only acts on velocity DOFs
        for i in 0..22 {
            let mut expected = 0.0;
            for j in 0..22 {
                let mass = kk2.get(i, j) - kk1.get(i, j);
                let stiff = kk1.get(i, j) - mass;
                expected += mass * yy_dot[l2g[j]] + stiff * yy[l2g[j]];
            }
            approx_eq(elem.residual[i], expected, 1e-12);
        }
    }
}
