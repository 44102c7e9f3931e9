use crate::StrError;
use russell_lab::Vector;
use std::collections::HashMap;

/// Maximum number of rounds allowed when flattening constraint chains
const MAX_CLOSE_ROUNDS: usize = 32;

/// Holds one affine constraint line: dof = Σ coefficient·master + inhomogeneity
#[derive(Clone, Debug)]
struct Line {
    masters: Vec<(usize, f64)>,
    rhs: f64,
}

/// Holds the affine constraints of the discretization
///
/// Two kinds of lines are stored: hanging-node continuity relations (with
/// masters and zero inhomogeneity) and Dirichlet values (no masters, the
/// prescribed value as inhomogeneity). The set must be closed before any
/// distribution or assembly operation uses it; it is rebuilt from scratch,
/// at the current time, before every residual/Jacobian evaluation.
pub struct Constraints {
    lines: HashMap<usize, Line>,
    closed: bool,
}

impl Constraints {
    /// Allocates an empty (open) set
    pub fn new() -> Self {
        Constraints {
            lines: HashMap::new(),
            closed: false,
        }
    }

    /// Adds a constraint line for a DOF
    pub fn constrain(&mut self, dof: usize, masters: &[(usize, f64)], rhs: f64) -> Result<(), StrError> {
        if self.closed {
            return Err("cannot add a constraint to a closed set");
        }
        if self.lines.contains_key(&dof) {
            return Err("degree of freedom is already constrained");
        }
        self.lines.insert(
            dof,
            Line {
                masters: masters.to_vec(),
                rhs,
            },
        );
        Ok(())
    }

    /// Closes the set, flattening chains of constrained masters
    pub fn close(&mut self) -> Result<(), StrError> {
        for _ in 0..MAX_CLOSE_ROUNDS {
            let mut pending: Vec<usize> = Vec::new();
            for (dof, line) in &self.lines {
                if line.masters.iter().any(|(m, _)| self.lines.contains_key(m)) {
                    pending.push(*dof);
                }
            }
            if pending.is_empty() {
                // merge duplicate masters and drop zero coefficients
                for line in self.lines.values_mut() {
                    line.masters.sort_by_key(|(m, _)| *m);
                    let mut merged: Vec<(usize, f64)> = Vec::with_capacity(line.masters.len());
                    for (m, c) in &line.masters {
                        match merged.last_mut() {
                            Some((last, sum)) if last == m => *sum += c,
                            _ => merged.push((*m, *c)),
                        }
                    }
                    merged.retain(|(_, c)| *c != 0.0);
                    line.masters = merged;
                }
                self.closed = true;
                return Ok(());
            }
            for dof in pending {
                let line = self.lines.get(&dof).unwrap().clone();
                let mut masters = Vec::with_capacity(line.masters.len());
                let mut rhs = line.rhs;
                for (m, c) in line.masters {
                    match self.lines.get(&m) {
                        Some(inner) => {
                            rhs += c * inner.rhs;
                            for (mm, cc) in &inner.masters {
                                masters.push((*mm, c * cc));
                            }
                        }
                        None => masters.push((m, c)),
                    }
                }
                self.lines.insert(dof, Line { masters, rhs });
            }
        }
        Err("constraint chains are too deep (cyclic constraints?)")
    }

    /// Tells whether the set is closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Tells whether a DOF is constrained
    pub fn is_constrained(&self, dof: usize) -> bool {
        self.lines.contains_key(&dof)
    }

    /// Returns the number of constrained DOFs
    pub fn n_constrained(&self) -> usize {
        self.lines.len()
    }

    /// Returns the constrained DOFs in ascending order
    pub fn constrained_dofs(&self) -> Vec<usize> {
        let mut dofs: Vec<usize> = self.lines.keys().copied().collect();
        dofs.sort_unstable();
        dofs
    }

    /// Returns the masters of a constrained DOF (None when unconstrained)
    pub fn masters_of(&self, dof: usize) -> Option<&[(usize, f64)]> {
        self.lines.get(&dof).map(|line| line.masters.as_slice())
    }

    /// Returns the number of global entries a DOF expands to in assembly
    pub fn n_masters(&self, dof: usize) -> usize {
        match self.lines.get(&dof) {
            Some(line) => line.masters.len(),
            None => 1,
        }
    }

    /// Sets the constrained entries of a vector from their masters and inhomogeneities
    pub fn distribute(&self, v: &mut Vector) -> Result<(), StrError> {
        if !self.closed {
            return Err("the constraint set must be closed before distribute");
        }
        for (dof, line) in &self.lines {
            let mut value = line.rhs;
            for (m, c) in &line.masters {
                value += c * v[*m];
            }
            v[*dof] = value;
        }
        Ok(())
    }

    /// Adds a local vector into a global vector, redistributing constrained rows
    pub fn assemble_vector(&self, global: &mut Vector, local: &Vector, l2g: &[usize]) {
        for i in 0..local.dim() {
            let gi = l2g[i];
            match self.lines.get(&gi) {
                Some(line) => {
                    for (m, c) in &line.masters {
                        global[*m] += c * local[i];
                    }
                }
                None => global[gi] += local[i],
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Constraints;
    use russell_lab::{vec_approx_eq, Vector};

    #[test]
    fn constrain_handles_errors() {
        let mut constraints = Constraints::new();
        constraints.constrain(0, &[], 1.0).unwrap();
        assert_eq!(
            constraints.constrain(0, &[], 2.0).err(),
            Some("degree of freedom is already constrained")
        );
        constraints.close().unwrap();
        assert_eq!(
            constraints.constrain(1, &[], 2.0).err(),
            Some("cannot add a constraint to a closed set")
        );
    }

    #[test]
    fn close_flattens_chains() {
        // dof2 = ½ dof1 + ½ dof0 ; dof1 = 3 (Dirichlet)
        let mut constraints = Constraints::new();
        constraints.constrain(2, &[(1, 0.5), (0, 0.5)], 0.0).unwrap();
        constraints.constrain(1, &[], 3.0).unwrap();
        constraints.close().unwrap();
        assert_eq!(constraints.masters_of(2).unwrap(), &[(0, 0.5)]);
        let mut v = Vector::from(&[2.0, 0.0, 0.0]);
        constraints.distribute(&mut v).unwrap();
        // dof1 = 3, dof2 = ½·3 + ½·2 = 2.5
        vec_approx_eq(&v, &Vector::from(&[2.0, 3.0, 2.5]), 1e-15);
    }

    #[test]
    fn distribute_requires_close() {
        let constraints = Constraints::new();
        let mut v = Vector::new(3);
        assert_eq!(
            constraints.distribute(&mut v).err(),
            Some("the constraint set must be closed before distribute")
        );
    }

    #[test]
    fn assemble_vector_redistributes_constrained_rows() {
        // dof1 = ¾ dof0 + ¼ dof2
        let mut constraints = Constraints::new();
        constraints.constrain(1, &[(0, 0.75), (2, 0.25)], 0.0).unwrap();
        constraints.close().unwrap();
        let mut global = Vector::new(3);
        let local = Vector::from(&[10.0, 4.0, 20.0]);
        constraints.assemble_vector(&mut global, &local, &[0, 1, 2]);
        vec_approx_eq(&global, &Vector::from(&[13.0, 0.0, 21.0]), 1e-15);
    }

    #[test]
    fn counters_work() {
        let mut constraints = Constraints::new();
        constraints.constrain(4, &[], 1.0).unwrap();
        constraints.constrain(2, &[(0, 1.0)], 0.0).unwrap();
        constraints.close().unwrap();
        assert_eq!(constraints.n_constrained(), 2);
        assert_eq!(constraints.constrained_dofs(), &[2, 4]);
        assert!(constraints.is_constrained(4));
        assert!(!constraints.is_constrained(0));
        assert_eq!(constraints.n_masters(2), 1);
        assert_eq!(constraints.n_masters(4), 0);
        assert_eq!(constraints.n_masters(0), 1);
    }
}
