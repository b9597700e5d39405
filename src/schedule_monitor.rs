//! Detects an at-risk next task and decides which recovery strategy to
//! apply, mirroring the original robot's `recover()` branches (§4.9).

use std::collections::HashSet;

use crate::ids::TaskId;
use crate::task::Task;
use crate::timetable::Timetable;

/// Which corrective action a detected risk should trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum RecoveryStrategy {
    /// Withdraw the task and let the auctioneer re-announce it.
    Reallocate,
    /// Re-solve this robot's own timetable in place, keeping the task.
    RescheduleInPlace,
    /// Re-solve starting from the next unexecuted task onward, discarding
    /// any slack assumptions made for tasks already passed.
    RescheduleFromNext,
    /// Give up on the task entirely.
    Abort,
}

/// Tracks which tasks have already triggered recovery this cycle so a
/// single risk doesn't fire the same strategy repeatedly every tick.
#[derive(Debug, Default)]
pub struct ScheduleMonitor {
    strategy: Option<RecoveryStrategy>,
    already_triggered: HashSet<TaskId>,
}

impl ScheduleMonitor {
    pub fn new(strategy: RecoveryStrategy) -> Self {
        Self { strategy: Some(strategy), already_triggered: HashSet::new() }
    }

    /// Checks the `(current, next)` pair (§4.1/§4.8): `next` is late if
    /// `current`'s predicted finish already overruns `next`'s latest start,
    /// or invalid if `current`'s latest possible finish cannot meet `next`'s
    /// window at all. Returns the configured recovery strategy at most once
    /// per `next` task until [`Self::reset`] is called.
    pub fn check(&mut self, timetable: &Timetable, current: &Task, next: &mut Task) -> Option<RecoveryStrategy> {
        let task_id = next.task_id().clone();
        if self.already_triggered.contains(&task_id) {
            return None;
        }
        let invalid = timetable.is_next_task_invalid(current, next).unwrap_or(false);
        let late = timetable.is_next_task_late(current, next).unwrap_or(false);
        if invalid || late {
            self.already_triggered.insert(task_id);
            self.strategy
        } else {
            None
        }
    }

    pub fn reset(&mut self, task_id: &TaskId) {
        self.already_triggered.remove(task_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RobotId;
    use crate::stn::AllocationMethod;
    use crate::task::Task;

    #[test]
    fn late_task_triggers_strategy_once() {
        let mut timetable = Timetable::new(RobotId::new("robot_001"), AllocationMethod::Tessi);
        let current = Task::new(TaskId::new("T1"), "A", "B", 0.0, 10.0);
        let trial = timetable.try_insert(&current, 1, crate::bidding_rule::SENTINEL_TRAVEL_TIME).unwrap();
        timetable.commit_insertion(current.task_id().clone(), 1, trial);

        // T1's pickup-to-delivery conservative estimate is 12.0 (mean 10,
        // variance 1), so a next task with a latest start right after T1's
        // earliest pickup is already unreachable.
        let mut next = Task::new(TaskId::new("T2"), "B", "C", 0.0, 5.0);

        let mut monitor = ScheduleMonitor::new(RecoveryStrategy::Reallocate);
        let triggered = monitor.check(&timetable, &current, &mut next);
        assert_eq!(triggered, Some(RecoveryStrategy::Reallocate));
        assert_eq!(monitor.check(&timetable, &current, &mut next), None);
    }
}
