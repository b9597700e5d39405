use thiserror::Error;

use crate::ids::TaskId;
use crate::stn::StnError;

#[derive(Debug, Error)]
pub enum TimetableError {
    #[error("no feasible insertion point for task {0}")]
    NoFeasibleInsertion(TaskId),
    #[error("task {0} is not present in this timetable")]
    UnknownTask(TaskId),
    #[error("contract snapshot for task {0} does not add exactly one task's worth of timepoints")]
    InvalidSnapshot(TaskId),
    #[error(transparent)]
    Stn(#[from] StnError),
}
