use crate::mesh::{CellId, Mesh, PointId};
use crate::StrError;
use std::collections::HashMap;
use std::ops::Range;

/// Index of the velocity block
pub const VELOCITY_BLOCK: usize = 0;

/// Index of the pressure block
pub const PRESSURE_BLOCK: usize = 1;

/// Number of velocity (Q2) nodes per cell
pub const NNODE_VELOCITY: usize = 9;

/// Number of pressure (Q1) nodes per cell
pub const NNODE_PRESSURE: usize = 4;

/// Number of local DOFs per cell (18 velocity + 4 pressure)
pub const NDOF_LOCAL: usize = 22;

/// Holds the per-block index ranges of the DOF numbering
///
/// The numbering is block-contiguous: the velocity block occupies
/// `[0, n_velocity)` and the pressure block `[n_velocity, n_dofs)`.
/// The owned and relevant (with ghosts) views coincide in this
/// single-process rendition but are kept separate so every consumer
/// addresses DOFs through the two-block layout.
#[derive(Clone, Debug)]
pub struct BlockPartition {
    /// Locally owned range per block
    pub owned: [Range<usize>; 2],

    /// Locally relevant (owned plus ghosts) range per block
    pub relevant: [Range<usize>; 2],
}

/// Holds the mixed Taylor-Hood (Q2/Q1) function space over the active cells
///
/// The whole structure is rebuilt wholesale after any mesh change; any
/// local-to-global map or matrix built from a previous instance is stale.
pub struct Space {
    /// Active cells in ascending id order
    pub active: Vec<CellId>,

    /// Maps a cell id to its index in `active`
    pub cell_index: HashMap<CellId, usize>,

    /// The nine velocity nodes of each active cell (Qua9 local order)
    pub cell_nodes: Vec<[PointId; NNODE_VELOCITY]>,

    /// Velocity node points in numbering order
    pub vnodes: Vec<PointId>,

    /// Pressure node points in numbering order
    pub pnodes: Vec<PointId>,

    /// Maps a point to its velocity node index
    vnode_index: HashMap<PointId, usize>,

    /// Maps a point to its pressure node index
    pnode_index: HashMap<PointId, usize>,

    /// Number of velocity DOFs (two per velocity node)
    pub n_velocity: usize,

    /// Number of pressure DOFs
    pub n_pressure: usize,

    /// Local-to-global DOF map per active cell (NDOF_LOCAL entries)
    pub local_to_global: Vec<Vec<usize>>,

    /// Per-block index ranges
    pub partition: BlockPartition,
}

impl Space {
    /// Distributes the degrees of freedom over the active cells
    ///
    /// Creates the missing edge-midpoint and cell-center points needed by
    /// the Q2 basis; this is the only mutation applied to the mesh.
    pub fn new(mesh: &mut Mesh) -> Result<Self, StrError> {
        let active = mesh.active_cells();
        if active.is_empty() {
            return Err("cannot distribute DOFs because there are no active cells");
        }

        // first pass: collect nodes
        let mut cell_index = HashMap::new();
        let mut cell_nodes = Vec::with_capacity(active.len());
        let mut vnodes = Vec::new();
        let mut pnodes = Vec::new();
        let mut vnode_index = HashMap::new();
        let mut pnode_index = HashMap::new();
        for (k, cell_id) in active.iter().enumerate() {
            cell_index.insert(*cell_id, k);
            let [p0, p1, p2, p3] = mesh.cells[*cell_id].points;
            let m01 = mesh.get_or_create_midpoint(p0, p1);
            let m12 = mesh.get_or_create_midpoint(p1, p2);
            let m23 = mesh.get_or_create_midpoint(p2, p3);
            let m30 = mesh.get_or_create_midpoint(p3, p0);
            let ctr = mesh.get_or_create_center(*cell_id);
            let nodes = [p0, p1, p2, p3, m01, m12, m23, m30, ctr];
            for point in nodes {
                if !vnode_index.contains_key(&point) {
                    vnode_index.insert(point, vnodes.len());
                    vnodes.push(point);
                }
            }
            for point in [p0, p1, p2, p3] {
                if !pnode_index.contains_key(&point) {
                    pnode_index.insert(point, pnodes.len());
                    pnodes.push(point);
                }
            }
            cell_nodes.push(nodes);
        }
        let n_velocity = 2 * vnodes.len();
        let n_pressure = pnodes.len();

        // second pass: local-to-global maps
        let mut local_to_global = Vec::with_capacity(active.len());
        for nodes in &cell_nodes {
            let mut l2g = Vec::with_capacity(NDOF_LOCAL);
            for point in nodes {
                let i = vnode_index[point];
                l2g.push(2 * i);
                l2g.push(2 * i + 1);
            }
            for point in &nodes[0..NNODE_PRESSURE] {
                l2g.push(n_velocity + pnode_index[point]);
            }
            local_to_global.push(l2g);
        }

        let partition = BlockPartition {
            owned: [0..n_velocity, n_velocity..(n_velocity + n_pressure)],
            relevant: [0..n_velocity, n_velocity..(n_velocity + n_pressure)],
        };
        Ok(Space {
            active,
            cell_index,
            cell_nodes,
            vnodes,
            pnodes,
            vnode_index,
            pnode_index,
            n_velocity,
            n_pressure,
            local_to_global,
            partition,
        })
    }

    /// Returns the total number of DOFs
    pub fn n_dofs(&self) -> usize {
        self.n_velocity + self.n_pressure
    }

    /// Returns the velocity DOF of a point and component, if the point is a velocity node
    pub fn velocity_dof(&self, point: PointId, component: usize) -> Option<usize> {
        self.vnode_index.get(&point).map(|i| 2 * i + component)
    }

    /// Returns the pressure DOF of a point, if the point is a pressure node
    pub fn pressure_dof(&self, point: PointId) -> Option<usize> {
        self.pnode_index.get(&point).map(|i| self.n_velocity + i)
    }

    /// Returns the block (velocity or pressure) containing a DOF
    pub fn block_of(&self, dof: usize) -> usize {
        if dof < self.n_velocity {
            VELOCITY_BLOCK
        } else {
            PRESSURE_BLOCK
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{Space, NDOF_LOCAL, PRESSURE_BLOCK, VELOCITY_BLOCK};
    use crate::mesh::Samples;

    #[test]
    fn new_handles_errors() {
        let mut mesh = Samples::rect(1, 1, 1.0, 1.0).unwrap();
        mesh.cells[0].active = false;
        assert_eq!(
            Space::new(&mut mesh).err(),
            Some("cannot distribute DOFs because there are no active cells")
        );
    }

    #[test]
    fn new_works_on_uniform_grid() {
        let mut mesh = Samples::rect(2, 2, 1.0, 1.0).unwrap();
        let space = Space::new(&mut mesh).unwrap();
        // Q2 grid has 5x5 nodes, Q1 grid has 3x3 nodes
        assert_eq!(space.vnodes.len(), 25);
        assert_eq!(space.pnodes.len(), 9);
        assert_eq!(space.n_velocity, 50);
        assert_eq!(space.n_pressure, 9);
        assert_eq!(space.n_dofs(), 59);
        assert_eq!(space.local_to_global.len(), 4);
        for l2g in &space.local_to_global {
            assert_eq!(l2g.len(), NDOF_LOCAL);
        }
    }

    #[test]
    fn blocks_are_contiguous() {
        let mut mesh = Samples::rect(2, 1, 2.0, 1.0).unwrap();
        let space = Space::new(&mut mesh).unwrap();
        assert_eq!(space.partition.owned[VELOCITY_BLOCK], 0..space.n_velocity);
        assert_eq!(
            space.partition.owned[PRESSURE_BLOCK],
            space.n_velocity..space.n_dofs()
        );
        assert_eq!(space.partition.owned, space.partition.relevant);
        // every velocity local DOF precedes every pressure local DOF
        for l2g in &space.local_to_global {
            for i in 0..18 {
                assert_eq!(space.block_of(l2g[i]), VELOCITY_BLOCK);
            }
            for i in 18..22 {
                assert_eq!(space.block_of(l2g[i]), PRESSURE_BLOCK);
            }
        }
    }

    #[test]
    fn dof_lookup_works() {
        let mut mesh = Samples::rect(1, 1, 1.0, 1.0).unwrap();
        let space = Space::new(&mut mesh).unwrap();
        assert_eq!(space.velocity_dof(0, 0), Some(0));
        assert_eq!(space.velocity_dof(0, 1), Some(1));
        assert_eq!(space.pressure_dof(0), Some(space.n_velocity));
        assert_eq!(space.pressure_dof(999), None);
    }

    #[test]
    fn hanging_mesh_counts_are_consistent() {
        let mut mesh = Samples::rect(2, 1, 2.0, 1.0).unwrap();
        mesh.flag_refine(0);
        mesh.prepare_coarsening_and_refinement().unwrap();
        mesh.execute_coarsening_and_refinement().unwrap();
        let space = Space::new(&mut mesh).unwrap();
        assert_eq!(space.active.len(), 5);
        // 25 nodes on the refined left half + 6 new nodes of the coarse right cell
        assert_eq!(space.vnodes.len(), 31);
        assert_eq!(space.pnodes.len(), 11);
        assert_eq!(space.n_dofs(), 2 * 31 + 11);
    }
}
