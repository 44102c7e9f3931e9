use super::{Space, NNODE_VELOCITY};
use crate::mesh::{CellId, EdgeNeighbor, Mesh, PointId};
use crate::StrError;
use gemlab::shapes::{GeoKind, Scratchpad};
use russell_lab::Vector;

/// Face quadrature: 3-point Gauss on [0, 1]
const FACE_POINTS: [f64; 3] = [
    0.5 - 0.387298334620741688, // 0.5 - 0.5*sqrt(3/5)
    0.5,
    0.5 + 0.387298334620741688,
];
const FACE_WEIGHTS: [f64; 3] = [5.0 / 18.0, 8.0 / 18.0, 5.0 / 18.0];

/// Returns the reference coordinates of the point at parameter s of a local edge
///
/// The parameter runs from the first to the second corner of the directed
/// edge (counterclockwise ordering).
fn edge_ref_coords(e: usize, s: f64) -> [f64; 2] {
    let q = 2.0 * s - 1.0;
    match e {
        0 => [q, -1.0],
        1 => [1.0, q],
        2 => [-q, 1.0],
        _ => [-1.0, -q],
    }
}

/// Returns the local edge of a cell whose corner pair matches the given key
fn find_local_edge(mesh: &Mesh, cell_id: CellId, key: (PointId, PointId)) -> Result<usize, StrError> {
    for e in 0..4 {
        let (a, b) = mesh.cell_edge(cell_id, e);
        if Mesh::edge_key(a, b) == key {
            return Ok(e);
        }
    }
    Err("cannot find the local edge matching an interface")
}

/// Evaluates the velocity gradient of a cell at a reference point
///
/// Returns grad[c][d] = ∂u_c/∂x_d.
fn velocity_gradient(
    pad: &mut Scratchpad,
    mesh: &Mesh,
    space: &Space,
    cell_index: usize,
    ksi: &[f64],
    yy: &Vector,
) -> Result<[[f64; 2]; 2], StrError> {
    let nodes = &space.cell_nodes[cell_index];
    for m in 0..NNODE_VELOCITY {
        let coords = mesh.points[nodes[m]].coords;
        pad.set_xx(m, 0, coords[0]);
        pad.set_xx(m, 1, coords[1]);
    }
    pad.calc_gradient(ksi)?;
    let l2g = &space.local_to_global[cell_index];
    let mut grad = [[0.0; 2]; 2];
    for m in 0..NNODE_VELOCITY {
        let gm = [pad.gradient.get(m, 0), pad.gradient.get(m, 1)];
        for c in 0..2 {
            let v = yy[l2g[2 * m + c]];
            grad[c][0] += gm[0] * v;
            grad[c][1] += gm[1] * v;
        }
    }
    Ok(grad)
}

/// Computes a Kelly-type error indicator per active cell
///
/// For every interior face, the squared jump of the normal derivative of
/// the velocity components is integrated with a 3-point Gauss rule and
/// scaled by `h_F/24`; the face term is accumulated into both adjacent
/// cells. Hanging interfaces are integrated from the fine side. Pressure
/// does not contribute. Boundary faces contribute nothing.
///
/// The returned values are indexed like `space.active` and are valid only
/// until the next mesh or solution change.
pub fn kelly_indicator(mesh: &Mesh, space: &Space, yy: &Vector) -> Result<Vec<f64>, StrError> {
    let edge_map = mesh.build_edge_map();
    let mut eta2 = vec![0.0; space.active.len()];
    let mut pad_a = Scratchpad::new(2, GeoKind::Qua9)?;
    let mut pad_b = Scratchpad::new(2, GeoKind::Qua9)?;

    for (ka, cell_a) in space.active.iter().enumerate() {
        for e in 0..4 {
            let neighbor = mesh.neighbor_across(&edge_map, *cell_a, e)?;
            let cell_b = match neighbor {
                EdgeNeighbor::Boundary(..) => continue,
                EdgeNeighbor::Refined { .. } => continue, // integrated from the fine side
                EdgeNeighbor::Conforming(other) => {
                    if *cell_a > other {
                        continue; // count each conforming face once
                    }
                    other
                }
                EdgeNeighbor::Coarse { cell, .. } => cell,
            };
            let kb = *space
                .cell_index
                .get(&cell_b)
                .ok_or("the neighbor cell is not part of the space")?;

            // geometry of the integrated (possibly fine) edge
            let (a, b) = mesh.cell_edge(*cell_a, e);
            let xa = mesh.points[a].coords;
            let xb = mesh.points[b].coords;
            let length = mesh.edge_length(a, b);
            let normal = [(xb[1] - xa[1]) / length, -(xb[0] - xa[0]) / length];

            // neighbor edge (the parent edge on hanging interfaces)
            let key_b = match neighbor {
                EdgeNeighbor::Coarse { parent_edge, .. } => parent_edge,
                _ => Mesh::edge_key(a, b),
            };
            let eb = find_local_edge(mesh, cell_b, key_b)?;
            let (a2, b2) = mesh.cell_edge(cell_b, eb);
            let xa2 = mesh.points[a2].coords;
            let xb2 = mesh.points[b2].coords;
            let len2_sq = (xb2[0] - xa2[0]) * (xb2[0] - xa2[0]) + (xb2[1] - xa2[1]) * (xb2[1] - xa2[1]);

            let mut face_sum = 0.0;
            for (s, w) in FACE_POINTS.iter().zip(FACE_WEIGHTS.iter()) {
                let x = [xa[0] + s * (xb[0] - xa[0]), xa[1] + s * (xb[1] - xa[1])];
                let ksi_a = edge_ref_coords(e, *s);
                // parameter of the same physical point on the neighbor edge
                let s2 = ((x[0] - xa2[0]) * (xb2[0] - xa2[0]) + (x[1] - xa2[1]) * (xb2[1] - xa2[1]))
                    / len2_sq;
                let ksi_b = edge_ref_coords(eb, s2);
                let grad_a = velocity_gradient(&mut pad_a, mesh, space, ka, &ksi_a, yy)?;
                let grad_b = velocity_gradient(&mut pad_b, mesh, space, kb, &ksi_b, yy)?;
                let mut jump_sq = 0.0;
                for c in 0..2 {
                    let jump = (grad_a[c][0] - grad_b[c][0]) * normal[0]
                        + (grad_a[c][1] - grad_b[c][1]) * normal[1];
                    jump_sq += jump * jump;
                }
                face_sum += w * jump_sq * length;
            }
            let contribution = (length / 24.0) * face_sum;
            eta2[ka] += contribution;
            eta2[kb] += contribution;
        }
    }
    Ok(eta2.iter().map(|v| v.sqrt()).collect())
}

/// Marks cells accounting for fixed fractions of the total indicated error
///
/// Cells are sorted by indicator value; the smallest sets whose sums reach
/// `top_fraction` (respectively `bottom_fraction`) of the total are marked
/// for refinement (respectively coarsening).
pub fn mark_fixed_fraction(
    mesh: &mut Mesh,
    active: &[CellId],
    eta: &[f64],
    top_fraction: f64,
    bottom_fraction: f64,
) {
    let total: f64 = eta.iter().sum();
    if total <= 0.0 {
        return;
    }
    let mut order: Vec<usize> = (0..active.len()).collect();
    order.sort_by(|i, j| eta[*j].partial_cmp(&eta[*i]).unwrap());
    let mut accumulated = 0.0;
    let mut n_refine = 0;
    for k in &order {
        if accumulated >= top_fraction * total {
            break;
        }
        accumulated += eta[*k];
        n_refine += 1;
    }
    // coarsen the cheapest cells whose combined error stays within the fraction
    let mut accumulated = 0.0;
    let mut n_coarsen = 0;
    for k in order.iter().rev() {
        if accumulated + eta[*k] > bottom_fraction * total {
            break;
        }
        accumulated += eta[*k];
        n_coarsen += 1;
    }
    apply_marks(mesh, active, &order, n_refine, n_coarsen);
}

/// Marks fixed fractions of the number of cells, capped at a cell count
///
/// The number of cells marked for refinement is reduced so the projected
/// number of active cells after execution stays at or below `max_cells`.
pub fn mark_fixed_count(
    mesh: &mut Mesh,
    active: &[CellId],
    eta: &[f64],
    top_fraction: f64,
    bottom_fraction: f64,
    max_cells: usize,
) {
    let n = active.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|i, j| eta[*j].partial_cmp(&eta[*i]).unwrap());
    let mut n_refine = (top_fraction * (n as f64)).round() as usize;
    let n_coarsen = (bottom_fraction * (n as f64)).round() as usize;
    // each refinement adds 3 cells, each coarsened family removes 3
    let projected = |r: usize| n + 3 * r;
    if projected(n_refine) > max_cells {
        n_refine = (max_cells.saturating_sub(n)) / 3;
    }
    apply_marks(mesh, active, &order, n_refine, n_coarsen);
}

fn apply_marks(mesh: &mut Mesh, active: &[CellId], order: &[usize], n_refine: usize, n_coarsen: usize) {
    let n = order.len();
    let n_coarsen = usize::min(n_coarsen, n.saturating_sub(n_refine));
    for k in &order[0..n_refine] {
        mesh.flag_refine(active[*k]);
    }
    for k in &order[(n - n_coarsen)..n] {
        mesh.flag_coarsen(active[*k]);
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{kelly_indicator, mark_fixed_count, mark_fixed_fraction};
    use crate::fem::Space;
    use crate::mesh::{RefineFlag, Samples};
    use russell_lab::{approx_eq, Vector};

    #[test]
    fn indicator_vanishes_for_a_smooth_linear_field() {
        // u = (x, -y) has a continuous gradient: all jumps vanish
        let mut mesh = Samples::rect(3, 3, 1.0, 1.0).unwrap();
        let space = Space::new(&mut mesh).unwrap();
        let mut yy = Vector::new(space.n_dofs());
        for (i, point) in space.vnodes.iter().enumerate() {
            let x = mesh.points[*point].coords;
            yy[2 * i] = x[0];
            yy[2 * i + 1] = -x[1];
        }
        let eta = kelly_indicator(&mesh, &space, &yy).unwrap();
        for value in eta {
            approx_eq(value, 0.0, 1e-12);
        }
    }

    #[test]
    fn indicator_is_symmetric_for_symmetric_data() {
        // u_x = |x - ½| has a kink along the middle line of a 4x1 strip;
        // the two middle cells must indicate equally and the outer ones less
        let mut mesh = Samples::rect(4, 1, 1.0, 1.0).unwrap();
        let space = Space::new(&mut mesh).unwrap();
        let mut yy = Vector::new(space.n_dofs());
        for (i, point) in space.vnodes.iter().enumerate() {
            let x = mesh.points[*point].coords;
            yy[2 * i] = (x[0] - 0.5).abs();
        }
        let eta = kelly_indicator(&mesh, &space, &yy).unwrap();
        approx_eq(eta[1], eta[2], 1e-12);
        approx_eq(eta[0], eta[3], 1e-12);
        assert!(eta[1] > eta[0]);
    }

    #[test]
    fn indicator_covers_hanging_interfaces() {
        let mut mesh = Samples::rect(2, 1, 2.0, 1.0).unwrap();
        mesh.flag_refine(0);
        mesh.prepare_coarsening_and_refinement().unwrap();
        mesh.execute_coarsening_and_refinement().unwrap();
        let space = Space::new(&mut mesh).unwrap();
        // a field with a kink at the hanging interface x = 1
        let mut yy = Vector::new(space.n_dofs());
        for (i, point) in space.vnodes.iter().enumerate() {
            let x = mesh.points[*point].coords;
            yy[2 * i] = (x[0] - 1.0).abs();
        }
        let eta = kelly_indicator(&mesh, &space, &yy).unwrap();
        // the coarse cell at the interface must see the jump
        let k_coarse = space.cell_index[&1];
        assert!(eta[k_coarse] > 1e-3);
    }

    #[test]
    fn mark_fixed_fraction_marks_extremes() {
        let mut mesh = Samples::rect(4, 1, 4.0, 1.0).unwrap();
        let active = mesh.active_cells();
        let eta = vec![10.0, 1.0, 0.1, 0.01];
        mark_fixed_fraction(&mut mesh, &active, &eta, 0.5, 0.05);
        assert_eq!(mesh.cells[0].flag, RefineFlag::Refine);
        assert_eq!(mesh.cells[1].flag, RefineFlag::None);
        assert_eq!(mesh.cells[3].flag, RefineFlag::Coarsen);
    }

    #[test]
    fn mark_fixed_count_honors_the_cap() {
        let mut mesh = Samples::rect(4, 1, 4.0, 1.0).unwrap();
        let active = mesh.active_cells();
        let eta = vec![10.0, 5.0, 1.0, 0.5];
        // cap already reached: nothing may be refined
        mark_fixed_count(&mut mesh, &active, &eta, 0.5, 0.0, 4);
        assert_eq!(mesh.cells[0].flag, RefineFlag::None);
        // generous cap: two cells refined
        mark_fixed_count(&mut mesh, &active, &eta, 0.5, 0.25, 100);
        assert_eq!(mesh.cells[0].flag, RefineFlag::Refine);
        assert_eq!(mesh.cells[1].flag, RefineFlag::Refine);
        assert_eq!(mesh.cells[3].flag, RefineFlag::Coarsen);
    }
}
