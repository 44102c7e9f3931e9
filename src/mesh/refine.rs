use super::{CellId, EdgeNeighbor, Mesh, RefineFlag};
use crate::StrError;

impl Mesh {
    /// Flags an active cell for refinement
    pub fn flag_refine(&mut self, cell_id: CellId) {
        if self.cells[cell_id].active {
            self.cells[cell_id].flag = RefineFlag::Refine;
        }
    }

    /// Flags an active cell for coarsening
    pub fn flag_coarsen(&mut self, cell_id: CellId) {
        if self.cells[cell_id].active {
            self.cells[cell_id].flag = RefineFlag::Coarsen;
        }
    }

    /// Clears all refinement flags
    pub fn clear_flags(&mut self) {
        for cell in &mut self.cells {
            cell.flag = RefineFlag::None;
        }
    }

    /// Refines every active cell once
    pub fn refine_global(&mut self) {
        let active = self.active_cells();
        for id in active {
            self.refine_cell(id);
        }
    }

    /// Adjusts the refinement flags so the executed mesh stays one-irregular
    ///
    /// Two rules are enforced:
    /// 1. a flagged cell whose neighbor across an edge is coarser forces the
    ///    refinement of that neighbor (repeated to a fixed point);
    /// 2. a family is coarsened only when all four siblings are active and
    ///    flagged, and no sibling touches a finer or about-to-refine neighbor.
    pub fn prepare_coarsening_and_refinement(&mut self) -> Result<(), StrError> {
        // rule 1: spread refine flags to coarser neighbors
        loop {
            let mut changed = false;
            let edge_map = self.build_edge_map();
            let flagged: Vec<CellId> = self
                .cells
                .iter()
                .filter(|c| c.active && c.flag == RefineFlag::Refine)
                .map(|c| c.id)
                .collect();
            for id in flagged {
                for e in 0..4 {
                    if let EdgeNeighbor::Coarse { cell, .. } = self.neighbor_across(&edge_map, id, e)? {
                        if self.cells[cell].flag != RefineFlag::Refine {
                            self.cells[cell].flag = RefineFlag::Refine;
                            changed = true;
                        }
                    }
                }
            }
            if !changed {
                break;
            }
        }

        // rule 2: validate coarsen flags family by family
        let edge_map = self.build_edge_map();
        let candidates: Vec<CellId> = self
            .cells
            .iter()
            .filter(|c| c.active && c.flag == RefineFlag::Coarsen)
            .map(|c| c.id)
            .collect();
        for id in &candidates {
            let parent = match self.cells[*id].parent {
                Some(p) => p,
                None => {
                    self.cells[*id].flag = RefineFlag::None;
                    continue;
                }
            };
            let siblings = self.cells[parent].children.unwrap();
            let whole_family = siblings
                .iter()
                .all(|s| self.cells[*s].active && self.cells[*s].flag == RefineFlag::Coarsen);
            let mut valid = whole_family;
            if valid {
                'family: for s in siblings {
                    for e in 0..4 {
                        match self.neighbor_across(&edge_map, s, e)? {
                            EdgeNeighbor::Refined { .. } => {
                                valid = false;
                                break 'family;
                            }
                            EdgeNeighbor::Conforming(d) => {
                                let is_sibling = self.cells[d].parent == Some(parent);
                                if !is_sibling && self.cells[d].flag == RefineFlag::Refine {
                                    valid = false;
                                    break 'family;
                                }
                            }
                            _ => (),
                        }
                    }
                }
            }
            if !valid {
                for s in siblings {
                    if self.cells[s].flag == RefineFlag::Coarsen {
                        self.cells[s].flag = RefineFlag::None;
                    }
                }
            }
        }
        Ok(())
    }

    /// Executes the flagged coarsening and refinement
    ///
    /// Call `prepare_coarsening_and_refinement` first; this function assumes
    /// the flags already satisfy the one-irregularity rules.
    pub fn execute_coarsening_and_refinement(&mut self) -> Result<(), StrError> {
        // coarsen whole families
        let candidates: Vec<CellId> = self
            .cells
            .iter()
            .filter(|c| c.active && c.flag == RefineFlag::Coarsen)
            .map(|c| c.id)
            .collect();
        for id in candidates {
            if !self.cells[id].active || self.cells[id].flag != RefineFlag::Coarsen {
                continue; // already handled with its siblings
            }
            let parent = self.cells[id].parent.ok_or("cannot coarsen a root cell")?;
            let siblings = self.cells[parent].children.unwrap();
            for s in siblings {
                self.cells[s].active = false;
                self.cells[s].flag = RefineFlag::None;
            }
            self.cells[parent].active = true;
            self.cells[parent].flag = RefineFlag::None;
        }

        // refine flagged cells
        let to_refine: Vec<CellId> = self
            .cells
            .iter()
            .filter(|c| c.active && c.flag == RefineFlag::Refine)
            .map(|c| c.id)
            .collect();
        for id in to_refine {
            self.refine_cell(id);
        }
        Ok(())
    }

    /// Refines one active cell into four children
    ///
    /// Children created by an earlier refinement are reactivated instead of
    /// being recreated, so cell ids stay stable across refine/coarsen cycles.
    pub fn refine_cell(&mut self, cell_id: CellId) {
        let [p0, p1, p2, p3] = self.cells[cell_id].points;
        let m01 = self.get_or_create_midpoint(p0, p1);
        let m12 = self.get_or_create_midpoint(p1, p2);
        let m23 = self.get_or_create_midpoint(p2, p3);
        let m30 = self.get_or_create_midpoint(p3, p0);
        let ctr = self.get_or_create_center(cell_id);
        if let Some(kids) = self.cells[cell_id].children {
            for k in kids {
                self.cells[k].active = true;
                self.cells[k].flag = RefineFlag::None;
            }
        } else {
            let level = self.cells[cell_id].level + 1;
            let corner_sets = [
                [p0, m01, ctr, m30],
                [m01, p1, m12, ctr],
                [ctr, m12, p2, m23],
                [m30, ctr, m23, p3],
            ];
            let mut kids = [0; 4];
            for (i, points) in corner_sets.iter().enumerate() {
                let id = self.cells.len();
                self.cells.push(super::Cell {
                    id,
                    level,
                    parent: Some(cell_id),
                    children: None,
                    points: *points,
                    active: true,
                    flag: RefineFlag::None,
                });
                kids[i] = id;
            }
            self.cells[cell_id].children = Some(kids);
        }
        self.cells[cell_id].active = false;
        self.cells[cell_id].flag = RefineFlag::None;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
