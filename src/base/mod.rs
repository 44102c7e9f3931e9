//! Implements configuration, boundary-condition and collaborator interfaces

mod config;
mod essential;
mod functions;
mod output;
mod stats;
pub use crate::base::config::*;
pub use crate::base::essential::*;
pub use crate::base::functions::*;
pub use crate::base::output::*;
pub use crate::base::stats::*;
