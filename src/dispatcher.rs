//! Picks which committed task to hand to the executor next, in ascending
//! earliest-start order, and freezes it so later insertions can't displace
//! it (§4.1, §4.4 "frozen" tasks).

use crate::ids::TaskId;
use crate::task::{Task, TaskStatus};
use crate::timetable::{Timetable, TimetableError};

pub struct Dispatcher;

impl Dispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Returns the next task in `timetable`'s order whose status is still
    /// `ALLOCATED`/`PLANNED` (not yet frozen), i.e. the task this robot
    /// should dispatch next, since the order is already earliest-start
    /// ascending by construction (§4.1: insertion preserves order).
    pub fn next_ready<'a>(&self, timetable: &Timetable, tasks: &'a [Task]) -> Option<&'a Task> {
        timetable.order().iter().find_map(|task_id| {
            tasks
                .iter()
                .find(|t| t.task_id() == task_id && !t.status().is_frozen())
        })
    }

    /// Freezes `task_id` by advancing its status and forcing its `start`
    /// timepoint to `now`, committing the robot to this dispatch.
    pub fn dispatch(&self, timetable: &mut Timetable, task: &mut Task, now: f64) -> Result<(), TimetableError> {
        timetable.assign_timepoint(task.task_id(), crate::timetable::TimetableNode::Start, now)?;
        task.set_status(TaskStatus::Dispatched);
        Ok(())
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
