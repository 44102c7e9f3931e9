//! Implements the finite element solver core

mod amg;
mod constraints;
mod dae;
mod element;
mod error_estimator;
mod krylov;
mod linear_system;
mod operator;
mod space;
mod stokes;
mod transfer;
pub use crate::fem::amg::*;
pub use crate::fem::constraints::*;
pub use crate::fem::dae::*;
pub use crate::fem::element::*;
pub use crate::fem::error_estimator::*;
pub use crate::fem::krylov::*;
pub use crate::fem::linear_system::*;
pub use crate::fem::operator::*;
pub use crate::fem::space::*;
pub use crate::fem::stokes::*;
pub use crate::fem::transfer::*;
