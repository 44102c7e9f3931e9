use super::Mesh;
use crate::StrError;

/// Holds sample mesh builders
///
/// These stand in for the external mesh/geometry provider: they build the
/// initial (coarse) mesh that the solver then refines.
pub struct Samples {}

impl Samples {
    /// Returns a rectangle [0,lx] × [0,ly] divided into nx × ny quadrilaterals
    ///
    /// All boundary edges are tagged 0.
    pub fn rect(nx: usize, ny: usize, lx: f64, ly: f64) -> Result<Mesh, StrError> {
        if nx < 1 || ny < 1 {
            return Err("nx and ny must be ≥ 1");
        }
        if lx <= 0.0 || ly <= 0.0 {
            return Err("lx and ly must be > 0.0");
        }
        let mut mesh = Mesh::new();
        let dx = lx / (nx as f64);
        let dy = ly / (ny as f64);
        for j in 0..(ny + 1) {
            for i in 0..(nx + 1) {
                mesh.add_point((i as f64) * dx, (j as f64) * dy);
            }
        }
        let index = |i: usize, j: usize| j * (nx + 1) + i;
        for j in 0..ny {
            for i in 0..nx {
                mesh.add_cell([index(i, j), index(i + 1, j), index(i + 1, j + 1), index(i, j + 1)]);
            }
        }
        for i in 0..nx {
            mesh.set_boundary_edge(index(i, 0), index(i + 1, 0), 0);
            mesh.set_boundary_edge(index(i, ny), index(i + 1, ny), 0);
        }
        for j in 0..ny {
            mesh.set_boundary_edge(index(0, j), index(0, j + 1), 0);
            mesh.set_boundary_edge(index(nx, j), index(nx, j + 1), 0);
        }
        Ok(mesh)
    }

    /// Returns the unit square as a single cell refined globally n times
    pub fn unit_square(n_refinements: usize) -> Result<Mesh, StrError> {
        let mut mesh = Samples::rect(1, 1, 1.0, 1.0)?;
        for _ in 0..n_refinements {
            mesh.refine_global();
        }
        Ok(mesh)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
