//! Drives a dispatched task through its STN edges as the robot physically
//! executes it: ztp -> start -> pickup -> delivery (§4.1 `execute_edge`).

use crate::messages::Message;
use crate::task::{Task, TaskStatus};
use crate::timetable::{Timetable, TimetableError, TimetableNode};

pub struct Executor;

impl Executor {
    pub fn new() -> Self {
        Self
    }

    /// Marks the robot as having reached this task's start and pickup
    /// timepoints, advancing its status to `ONGOING`.
    pub fn execute_to_pickup(&self, timetable: &mut Timetable, task: &mut Task) -> Result<Message, TimetableError> {
        timetable.execute_edge(None, TimetableNode::Start, task.task_id(), TimetableNode::Start)?;
        timetable.execute_edge(Some(task.task_id()), TimetableNode::Start, task.task_id(), TimetableNode::Pickup)?;
        task.set_status(TaskStatus::Ongoing);
        Ok(self.status_update(timetable, task))
    }

    /// Marks delivery reached, completing the task.
    pub fn execute_to_delivery(&self, timetable: &mut Timetable, task: &mut Task) -> Result<Message, TimetableError> {
        timetable.execute_edge(Some(task.task_id()), TimetableNode::Pickup, task.task_id(), TimetableNode::Delivery)?;
        task.set_status(TaskStatus::Completed);
        Ok(self.status_update(timetable, task))
    }

    fn status_update(&self, timetable: &Timetable, task: &Task) -> Message {
        Message::TaskStatusUpdate {
            task_id: task.task_id().clone(),
            robot_id: timetable.robot_id().clone(),
            status: task.status(),
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{RobotId, TaskId};
    use crate::stn::AllocationMethod;

    #[test]
    fn execution_advances_status_through_pickup_and_delivery() {
        let mut timetable = Timetable::new(RobotId::new("robot_001"), AllocationMethod::Tessi);
        let mut task = Task::new(TaskId::new("T1"), "A", "B", 0.0, 100.0);
        let trial = timetable.try_insert(&task, 1, crate::bidding_rule::SENTINEL_TRAVEL_TIME).unwrap();
        timetable.commit_insertion(task.task_id().clone(), 1, trial);

        let executor = Executor::new();
        executor.execute_to_pickup(&mut timetable, &mut task).unwrap();
        assert_eq!(task.status(), TaskStatus::Ongoing);

        executor.execute_to_delivery(&mut timetable, &mut task).unwrap();
        assert_eq!(task.status(), TaskStatus::Completed);
    }
}
