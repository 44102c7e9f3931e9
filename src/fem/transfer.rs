use super::{Space, NDOF_LOCAL, NNODE_PRESSURE, NNODE_VELOCITY};
use crate::mesh::{CellId, Mesh};
use crate::StrError;
use gemlab::shapes::{GeoKind, Scratchpad};
use russell_lab::Vector;
use std::collections::HashMap;

/// Reference coordinates of the Qua9 nodes
const REF_QUA9: [[f64; 2]; 9] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
    [0.0, -1.0],
    [1.0, 0.0],
    [0.0, 1.0],
    [-1.0, 0.0],
    [0.0, 0.0],
];

/// Shift mapping child reference coordinates into the parent: ξp = (ξc + shift)/2
const CHILD_SHIFT: [[f64; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

/// Parent velocity node m coincides with corner `.1` of child `.0`
const INJECT_V: [(usize, usize); 9] = [
    (0, 0),
    (1, 1),
    (2, 2),
    (3, 3),
    (0, 1),
    (1, 2),
    (2, 3),
    (0, 3),
    (0, 2),
];

/// Defines the phases of the transfer protocol
///
/// The fixed ordering (prepare → execute the mesh change → rebuild the
/// discretization → interpolate) is enforced by these states; calling a
/// step out of order is a hard error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferPhase {
    Stable,
    Prepared,
    Interpolated,
}

/// Holds the per-cell snapshot of both transferred fields
struct CellSnapshot {
    /// Local values of the solution and of its time derivative
    values: [[f64; NDOF_LOCAL]; 2],
}

/// Transfers the solution and its derivative across a mesh change
///
/// Snapshots the local values of every active cell before the change;
/// after the discretization is rebuilt, unchanged cells copy their values,
/// children of refined cells interpolate from the parent basis, and
/// reactivated parents of coarsened families gather the coinciding child
/// values (injection). Both fields are transferred identically so the
/// index-1 pairing of solution and derivative survives the remeshing.
pub struct SolutionTransfer {
    phase: TransferPhase,
    stored: HashMap<CellId, CellSnapshot>,
}

impl SolutionTransfer {
    /// Allocates a new (stable) instance
    pub fn new() -> Self {
        SolutionTransfer {
            phase: TransferPhase::Stable,
            stored: HashMap::new(),
        }
    }

    /// Returns the current phase
    pub fn phase(&self) -> TransferPhase {
        self.phase
    }

    /// Snapshots the local values of all active cells (before the mesh change)
    pub fn prepare(&mut self, space: &Space, yy: &Vector, yy_dot: &Vector) -> Result<(), StrError> {
        if self.phase != TransferPhase::Stable {
            return Err("the transfer must be prepared from the stable phase");
        }
        self.stored.clear();
        for (k, cell_id) in space.active.iter().enumerate() {
            let l2g = &space.local_to_global[k];
            let mut values = [[0.0; NDOF_LOCAL]; 2];
            for i in 0..NDOF_LOCAL {
                values[0][i] = yy[l2g[i]];
                values[1][i] = yy_dot[l2g[i]];
            }
            self.stored.insert(*cell_id, CellSnapshot { values });
        }
        self.phase = TransferPhase::Prepared;
        Ok(())
    }

    /// Writes the snapshotted fields onto the rebuilt discretization
    ///
    /// The vectors must already be allocated with the new layout.
    pub fn interpolate(
        &mut self,
        mesh: &Mesh,
        space: &Space,
        yy: &mut Vector,
        yy_dot: &mut Vector,
    ) -> Result<(), StrError> {
        if self.phase != TransferPhase::Prepared {
            return Err("the transfer must be prepared before interpolation");
        }
        if yy.dim() != space.n_dofs() || yy_dot.dim() != space.n_dofs() {
            return Err("the target vectors do not match the new layout");
        }
        let mut pad_u = Scratchpad::new(2, GeoKind::Qua9)?;
        let mut pad_p = Scratchpad::new(2, GeoKind::Qua4)?;
        for (k, cell_id) in space.active.iter().enumerate() {
            let l2g = &space.local_to_global[k];
            let mut targets = [&mut *yy, &mut *yy_dot];
            if let Some(snapshot) = self.stored.get(cell_id) {
                // unchanged cell
                for (f, target) in targets.iter_mut().enumerate() {
                    for i in 0..NDOF_LOCAL {
                        target[l2g[i]] = snapshot.values[f][i];
                    }
                }
                continue;
            }
            let parent = mesh.cells[*cell_id].parent;
            if let Some(p) = parent {
                if let Some(snapshot) = self.stored.get(&p) {
                    // child of a refined cell: evaluate the parent basis
                    let kids = mesh.cells[p].children.ok_or("refined cell has no children")?;
                    let c = kids
                        .iter()
                        .position(|kid| kid == cell_id)
                        .ok_or("cell is not a child of its parent")?;
                    let shift = CHILD_SHIFT[c];
                    for m in 0..NNODE_VELOCITY {
                        let ksi = [
                            (REF_QUA9[m][0] + shift[0]) / 2.0,
                            (REF_QUA9[m][1] + shift[1]) / 2.0,
                        ];
                        (pad_u.fn_interp)(&mut pad_u.interp, &ksi);
                        for (f, target) in targets.iter_mut().enumerate() {
                            for comp in 0..2 {
                                let mut value = 0.0;
                                for n in 0..NNODE_VELOCITY {
                                    value += pad_u.interp[n] * snapshot.values[f][2 * n + comp];
                                }
                                target[l2g[2 * m + comp]] = value;
                            }
                        }
                    }
                    for e in 0..NNODE_PRESSURE {
                        let ksi = [
                            (REF_QUA9[e][0] + shift[0]) / 2.0,
                            (REF_QUA9[e][1] + shift[1]) / 2.0,
                        ];
                        (pad_p.fn_interp)(&mut pad_p.interp, &ksi);
                        for (f, target) in targets.iter_mut().enumerate() {
                            let mut value = 0.0;
                            for n in 0..NNODE_PRESSURE {
                                value += pad_p.interp[n] * snapshot.values[f][18 + n];
                            }
                            target[l2g[18 + e]] = value;
                        }
                    }
                    continue;
                }
            }
            // reactivated parent of a coarsened family: inject child values
            let kids = mesh.cells[*cell_id]
                .children
                .ok_or("cannot transfer state onto an unrelated cell")?;
            for m in 0..NNODE_VELOCITY {
                let (ci, corner) = INJECT_V[m];
                let snapshot = self
                    .stored
                    .get(&kids[ci])
                    .ok_or("cannot transfer state onto an unrelated cell")?;
                for (f, target) in targets.iter_mut().enumerate() {
                    for comp in 0..2 {
                        target[l2g[2 * m + comp]] = snapshot.values[f][2 * corner + comp];
                    }
                }
            }
            for e in 0..NNODE_PRESSURE {
                let snapshot = self
                    .stored
                    .get(&kids[e])
                    .ok_or("cannot transfer state onto an unrelated cell")?;
                for (f, target) in targets.iter_mut().enumerate() {
                    target[l2g[18 + e]] = snapshot.values[f][18 + e];
                }
            }
        }
        self.phase = TransferPhase::Interpolated;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{SolutionTransfer, TransferPhase};
    use crate::fem::Space;
    use crate::mesh::Samples;
    use russell_lab::{approx_eq, Vector};

    /// Fills nodal vectors from u = (x² + y, x·y), p = x - 2y (Q2/Q1-exact)
    fn fill(space: &Space, mesh: &crate::mesh::Mesh) -> (Vector, Vector) {
        let mut yy = Vector::new(space.n_dofs());
        let mut yy_dot = Vector::new(space.n_dofs());
        for (i, point) in space.vnodes.iter().enumerate() {
            let x = mesh.points[*point].coords;
            yy[2 * i] = x[0] * x[0] + x[1];
            yy[2 * i + 1] = x[0] * x[1];
            yy_dot[2 * i] = 2.0 * yy[2 * i];
            yy_dot[2 * i + 1] = -yy[2 * i + 1];
        }
        for (j, point) in space.pnodes.iter().enumerate() {
            let x = mesh.points[*point].coords;
            yy[space.n_velocity + j] = x[0] - 2.0 * x[1];
            yy_dot[space.n_velocity + j] = 0.5 * (x[0] - 2.0 * x[1]);
        }
        (yy, yy_dot)
    }

    #[test]
    fn phases_are_enforced() {
        let mut mesh = Samples::rect(1, 1, 1.0, 1.0).unwrap();
        let space = Space::new(&mut mesh).unwrap();
        let mut transfer = SolutionTransfer::new();
        assert_eq!(transfer.phase(), TransferPhase::Stable);
        let mut yy = Vector::new(space.n_dofs());
        let mut yy_dot = Vector::new(space.n_dofs());
        assert_eq!(
            transfer.interpolate(&mesh, &space, &mut yy, &mut yy_dot).err(),
            Some("the transfer must be prepared before interpolation")
        );
        transfer.prepare(&space, &yy, &yy_dot).unwrap();
        assert_eq!(
            transfer.prepare(&space, &yy, &yy_dot).err(),
            Some("the transfer must be prepared from the stable phase")
        );
        transfer.interpolate(&mesh, &space, &mut yy, &mut yy_dot).unwrap();
        assert_eq!(transfer.phase(), TransferPhase::Interpolated);
    }

    #[test]
    fn refinement_preserves_representable_fields() {
        let mut mesh = Samples::rect(2, 2, 1.0, 1.0).unwrap();
        let space = Space::new(&mut mesh).unwrap();
        let (yy, yy_dot) = fill(&space, &mesh);
        let mut transfer = SolutionTransfer::new();
        transfer.prepare(&space, &yy, &yy_dot).unwrap();
        mesh.refine_global();
        let space2 = Space::new(&mut mesh).unwrap();
        let mut yy2 = Vector::new(space2.n_dofs());
        let mut yy2_dot = Vector::new(space2.n_dofs());
        transfer.interpolate(&mesh, &space2, &mut yy2, &mut yy2_dot).unwrap();
        let (expected, expected_dot) = fill(&space2, &mesh);
        for i in 0..space2.n_dofs() {
            approx_eq(yy2[i], expected[i], 1e-13);
            approx_eq(yy2_dot[i], expected_dot[i], 1e-13);
        }
    }

    #[test]
    fn coarsening_injects_child_values() {
        let mut mesh = Samples::rect(1, 1, 1.0, 1.0).unwrap();
        mesh.refine_global();
        let space = Space::new(&mut mesh).unwrap();
        let (yy, yy_dot) = fill(&space, &mesh);
        let mut transfer = SolutionTransfer::new();
        transfer.prepare(&space, &yy, &yy_dot).unwrap();
        for id in mesh.active_cells() {
            mesh.flag_coarsen(id);
        }
        mesh.prepare_coarsening_and_refinement().unwrap();
        mesh.execute_coarsening_and_refinement().unwrap();
        let space2 = Space::new(&mut mesh).unwrap();
        assert_eq!(space2.active.len(), 1);
        let mut yy2 = Vector::new(space2.n_dofs());
        let mut yy2_dot = Vector::new(space2.n_dofs());
        transfer.interpolate(&mesh, &space2, &mut yy2, &mut yy2_dot).unwrap();
        let (expected, expected_dot) = fill(&space2, &mesh);
        for i in 0..space2.n_dofs() {
            approx_eq(yy2[i], expected[i], 1e-14);
            approx_eq(yy2_dot[i], expected_dot[i], 1e-14);
        }
    }

    #[test]
    fn mixed_refine_and_keep_works() {
        let mut mesh = Samples::rect(2, 1, 2.0, 1.0).unwrap();
        let space = Space::new(&mut mesh).unwrap();
        let (yy, yy_dot) = fill(&space, &mesh);
        let mut transfer = SolutionTransfer::new();
        transfer.prepare(&space, &yy, &yy_dot).unwrap();
        mesh.flag_refine(0);
        mesh.prepare_coarsening_and_refinement().unwrap();
        mesh.execute_coarsening_and_refinement().unwrap();
        let space2 = Space::new(&mut mesh).unwrap();
        let mut yy2 = Vector::new(space2.n_dofs());
        let mut yy2_dot = Vector::new(space2.n_dofs());
        transfer.interpolate(&mesh, &space2, &mut yy2, &mut yy2_dot).unwrap();
        let (expected, expected_dot) = fill(&space2, &mesh);
        for i in 0..space2.n_dofs() {
            approx_eq(yy2[i], expected[i], 1e-13);
            approx_eq(yy2_dot[i], expected_dot[i], 1e-13);
        }
    }
}
