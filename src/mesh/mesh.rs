use crate::StrError;
use std::collections::HashMap;

/// Defines the point id type
pub type PointId = usize;

/// Defines the cell id type
pub type CellId = usize;

/// Defines the key of an edge (sorted pair of corner ids)
pub type EdgeKey = (PointId, PointId);

/// Holds a mesh point
#[derive(Clone, Debug)]
pub struct Point {
    /// Identification number (index in the points vector)
    pub id: PointId,

    /// Coordinates
    pub coords: [f64; 2],
}

/// Defines the refinement flag of a cell
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefineFlag {
    None,
    Refine,
    Coarsen,
}

/// Holds a quadrilateral cell of the refinement tree
///
/// Only active cells belong to the computational mesh; refined cells keep
/// their children links so that coarsening can reactivate the parent and a
/// later re-refinement can reactivate the children.
#[derive(Clone, Debug)]
pub struct Cell {
    /// Identification number (index in the cells vector)
    pub id: CellId,

    /// Refinement level (root cells have level 0)
    pub level: usize,

    /// Parent cell in the refinement tree
    pub parent: Option<CellId>,

    /// Children cells in the refinement tree
    pub children: Option<[CellId; 4]>,

    /// Corner point ids in counterclockwise order
    pub points: [PointId; 4],

    /// Whether this cell belongs to the computational mesh
    pub active: bool,

    /// Refinement flag
    pub flag: RefineFlag,
}

/// Classifies what lies across an edge of an active cell
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeNeighbor {
    /// Domain boundary with a tag
    Boundary(usize),

    /// Active neighbor at the same refinement level
    Conforming(CellId),

    /// The neighbor is refined: two finer active cells across the two
    /// halves of this edge (ordered along the edge direction), with the
    /// hanging point between them
    Refined { fine: [CellId; 2], midpoint: PointId },

    /// The neighbor is coarser: this edge is one half of the neighbor's
    /// (parent) edge
    Coarse { cell: CellId, parent_edge: EdgeKey },
}

/// Holds an adaptively refined quadrilateral mesh
pub struct Mesh {
    /// All points (append-only; points are never deleted)
    pub points: Vec<Point>,

    /// All cells of the refinement tree (active and inactive)
    pub cells: Vec<Cell>,

    /// Maps an edge to its midpoint, if one has been created
    pub(crate) edge_midpoints: HashMap<EdgeKey, PointId>,

    /// Maps a midpoint back to the edge it subdivides
    pub(crate) midpoint_parents: HashMap<PointId, EdgeKey>,

    /// Maps a cell to its center point, if one has been created
    pub(crate) cell_centers: HashMap<CellId, PointId>,

    /// Maps boundary edges (including split sub-edges) to their tag
    pub(crate) boundary_edges: HashMap<EdgeKey, usize>,
}

impl Mesh {
    /// Allocates an empty mesh
    pub fn new() -> Self {
        Mesh {
            points: Vec::new(),
            cells: Vec::new(),
            edge_midpoints: HashMap::new(),
            midpoint_parents: HashMap::new(),
            cell_centers: HashMap::new(),
            boundary_edges: HashMap::new(),
        }
    }

    /// Appends a new point and returns its id
    pub fn add_point(&mut self, x: f64, y: f64) -> PointId {
        let id = self.points.len();
        self.points.push(Point { id, coords: [x, y] });
        id
    }

    /// Appends a new root cell (level 0) and returns its id
    pub fn add_cell(&mut self, points: [PointId; 4]) -> CellId {
        let id = self.cells.len();
        self.cells.push(Cell {
            id,
            level: 0,
            parent: None,
            children: None,
            points,
            active: true,
            flag: RefineFlag::None,
        });
        id
    }

    /// Tags an edge as a boundary edge
    pub fn set_boundary_edge(&mut self, a: PointId, b: PointId, tag: usize) {
        self.boundary_edges.insert(Self::edge_key(a, b), tag);
    }

    /// Returns the sorted key of an edge
    pub fn edge_key(a: PointId, b: PointId) -> EdgeKey {
        if a < b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Returns the ids of all active cells in ascending order
    pub fn active_cells(&self) -> Vec<CellId> {
        self.cells.iter().filter(|c| c.active).map(|c| c.id).collect()
    }

    /// Returns the number of active cells
    pub fn n_active_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.active).count()
    }

    /// Returns the number of refinement levels spanned by active cells
    pub fn n_levels(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| c.active)
            .map(|c| c.level + 1)
            .max()
            .unwrap_or(0)
    }

    /// Returns the directed corners (a, b) of the local edge e of a cell
    ///
    /// Local edges follow the counterclockwise corner ordering:
    /// edge 0 = (0,1), edge 1 = (1,2), edge 2 = (2,3), edge 3 = (3,0).
    pub fn cell_edge(&self, cell_id: CellId, e: usize) -> (PointId, PointId) {
        let p = &self.cells[cell_id].points;
        (p[e], p[(e + 1) % 4])
    }

    /// Returns the midpoint of an edge, creating the point if needed
    ///
    /// When the edge is a tagged boundary edge, the two sub-edges inherit
    /// the tag so boundary classification survives refinement.
    pub fn get_or_create_midpoint(&mut self, a: PointId, b: PointId) -> PointId {
        let key = Self::edge_key(a, b);
        if let Some(m) = self.edge_midpoints.get(&key) {
            return *m;
        }
        let xa = self.points[a].coords;
        let xb = self.points[b].coords;
        let m = self.add_point(0.5 * (xa[0] + xb[0]), 0.5 * (xa[1] + xb[1]));
        self.edge_midpoints.insert(key, m);
        self.midpoint_parents.insert(m, key);
        if let Some(tag) = self.boundary_edges.get(&key).copied() {
            self.boundary_edges.insert(Self::edge_key(a, m), tag);
            self.boundary_edges.insert(Self::edge_key(m, b), tag);
        }
        m
    }

    /// Returns the center point of a cell, creating it if needed
    pub fn get_or_create_center(&mut self, cell_id: CellId) -> PointId {
        if let Some(c) = self.cell_centers.get(&cell_id) {
            return *c;
        }
        let p = self.cells[cell_id].points;
        let mut x = 0.0;
        let mut y = 0.0;
        for id in p {
            x += 0.25 * self.points[id].coords[0];
            y += 0.25 * self.points[id].coords[1];
        }
        let c = self.add_point(x, y);
        self.cell_centers.insert(cell_id, c);
        c
    }

    /// Builds the map from edge keys to the active cells owning them
    pub fn build_edge_map(&self) -> HashMap<EdgeKey, Vec<CellId>> {
        let mut map: HashMap<EdgeKey, Vec<CellId>> = HashMap::new();
        for cell in self.cells.iter().filter(|c| c.active) {
            for e in 0..4 {
                let (a, b) = self.cell_edge(cell.id, e);
                map.entry(Self::edge_key(a, b)).or_insert_with(Vec::new).push(cell.id);
            }
        }
        map
    }

    /// Classifies what lies across the local edge e of an active cell
    pub fn neighbor_across(
        &self,
        edge_map: &HashMap<EdgeKey, Vec<CellId>>,
        cell_id: CellId,
        e: usize,
    ) -> Result<EdgeNeighbor, StrError> {
        let (a, b) = self.cell_edge(cell_id, e);
        let key = Self::edge_key(a, b);
        if let Some(owners) = edge_map.get(&key) {
            if let Some(other) = owners.iter().find(|id| **id != cell_id) {
                return Ok(EdgeNeighbor::Conforming(*other));
            }
        }
        if let Some(tag) = self.boundary_edges.get(&key) {
            return Ok(EdgeNeighbor::Boundary(*tag));
        }
        // the neighbor is refined when both sub-edges have active owners
        if let Some(m) = self.edge_midpoints.get(&key).copied() {
            let first = edge_map
                .get(&Self::edge_key(a, m))
                .and_then(|owners| owners.first().copied());
            let second = edge_map
                .get(&Self::edge_key(m, b))
                .and_then(|owners| owners.first().copied());
            if let (Some(f0), Some(f1)) = (first, second) {
                return Ok(EdgeNeighbor::Refined {
                    fine: [f0, f1],
                    midpoint: m,
                });
            }
        }
        // otherwise the neighbor is coarser: one endpoint must be the
        // midpoint of an active (parent) edge containing the other endpoint
        for (h, other) in [(a, b), (b, a)] {
            if let Some(parent_edge) = self.midpoint_parents.get(&h).copied() {
                if parent_edge.0 == other || parent_edge.1 == other {
                    if let Some(owners) = edge_map.get(&parent_edge) {
                        if let Some(cell) = owners.first() {
                            return Ok(EdgeNeighbor::Coarse {
                                cell: *cell,
                                parent_edge,
                            });
                        }
                    }
                }
            }
        }
        Err("mesh connectivity is inconsistent")
    }

    /// Returns the length of the edge (a, b)
    pub fn edge_length(&self, a: PointId, b: PointId) -> f64 {
        let xa = self.points[a].coords;
        let xb = self.points[b].coords;
        f64::hypot(xb[0] - xa[0], xb[1] - xa[1])
    }

    /// Returns the diameter of a cell (largest diagonal)
    pub fn cell_diameter(&self, cell_id: CellId) -> f64 {
        let p = &self.cells[cell_id].points;
        f64::max(self.edge_length(p[0], p[2]), self.edge_length(p[1], p[3]))
    }

    /// Returns the boundary tag of an edge, if any
    pub fn edge_tag(&self, a: PointId, b: PointId) -> Option<usize> {
        self.boundary_edges.get(&Self::edge_key(a, b)).copied()
    }

    /// Returns the midpoint of an edge, if one has been created
    pub fn midpoint_of(&self, a: PointId, b: PointId) -> Option<PointId> {
        self.edge_midpoints.get(&Self::edge_key(a, b)).copied()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
