use crate::FnSpaceTime;

/// Defines the boundary tag type (assigned to boundary edges by the mesh builder)
pub type BoundaryTag = usize;

/// Defines essential (Dirichlet) boundary conditions on velocity components
#[derive(Clone, Copy)]
pub enum Ebc {
    /// Horizontal velocity component
    Ux(FnSpaceTime),

    /// Vertical velocity component
    Uy(FnSpaceTime),
}

impl Ebc {
    /// Returns the velocity component index corresponding to this condition
    pub fn component(&self) -> usize {
        match self {
            Ebc::Ux(..) => 0,
            Ebc::Uy(..) => 1,
        }
    }

    /// Evaluates the prescribed value at a point and time
    pub fn value(&self, x: &[f64], t: f64) -> f64 {
        match self {
            Ebc::Ux(f) => f(x, t),
            Ebc::Uy(f) => f(x, t),
        }
    }
}

/// Holds a collection of essential boundary conditions, keyed by boundary tag
///
/// The boundary data is time-dependent; the constraint set is rebuilt from
/// this collection (at the current time) before every residual or Jacobian
/// evaluation.
pub struct Essential {
    /// All (tag, condition) pairs
    pub all: Vec<(BoundaryTag, Ebc)>,
}

impl Essential {
    /// Allocates a new instance
    pub fn new() -> Self {
        Essential { all: Vec::new() }
    }

    /// Sets a condition on all boundary edges carrying the given tag
    pub fn on(&mut self, tag: BoundaryTag, ebc: Ebc) -> &mut Self {
        self.all.push((tag, ebc));
        self
    }

    /// Returns the conditions registered for a tag
    pub fn at(&self, tag: BoundaryTag) -> impl Iterator<Item = &Ebc> {
        self.all.iter().filter(move |(t, _)| *t == tag).map(|(_, e)| e)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{Ebc, Essential};

    #[test]
    fn on_and_at_work() {
        let f = |x: &[f64], t: f64| x[0] + t;
        let g = |x: &[f64], t: f64| x[1] - t;
        let mut essential = Essential::new();
        essential.on(0, Ebc::Ux(f)).on(0, Ebc::Uy(g)).on(1, Ebc::Ux(g));
        assert_eq!(essential.at(0).count(), 2);
        assert_eq!(essential.at(1).count(), 1);
        assert_eq!(essential.at(2).count(), 0);
    }

    #[test]
    fn component_and_value_work() {
        let f = |x: &[f64], t: f64| 2.0 * x[0] + t;
        let ux = Ebc::Ux(f);
        let uy = Ebc::Uy(f);
        assert_eq!(ux.component(), 0);
        assert_eq!(uy.component(), 1);
        assert_eq!(ux.value(&[3.0, 0.0], 1.0), 7.0);
    }
}
