//! Simple Temporal Network engine.
//!
//! This is the numerical core the rest of the crate treats as a narrow,
//! swappable solver: construct, insert/remove timepoints, constrain edges,
//! compute the minimal network, check consistency, force-assign a
//! timepoint, mark edges executed, and (de)serialize to a plain mapping.

mod error;
mod graph;
mod solver;
mod wire;

pub use error::StnError;
pub use graph::{DistanceMatrix, EdgeWeight, NodeIndex, NodeKind, Stn, TimepointNode, ZTP};
pub use solver::{AllocationMethod, SolverKind, StnSolver};
pub use wire::StnDict;
