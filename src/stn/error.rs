use thiserror::Error;

use super::NodeIndex;

/// Errors raised by the STN engine.
///
/// Callers (the timetable, the bidding rule) translate these into the
/// behavioral error kinds described in the crate's top-level error module.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StnError {
    #[error("STN has no consistent solution")]
    NoSolution,

    #[error("invalid node index: {0:?}")]
    InvalidNode(NodeIndex),

    #[error("timepoint {0:?} cannot be forced to {1}")]
    InconsistentAssignment(NodeIndex, f64),
}
