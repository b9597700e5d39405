//! Task records: immutable identity, mutable lifecycle status, and the
//! temporal constraints the timetable needs to splice the task into a plan.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{RobotId, TaskId};

/// Lifecycle status of a task (§3). Advances monotonically except that
/// recovery may push a task back to `Unallocated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum TaskStatus {
    Unallocated,
    Allocated,
    Planned,
    Dispatched,
    Scheduled,
    Ongoing,
    Completed,
    Preempted,
    Canceled,
    Aborted,
}

impl TaskStatus {
    /// Tasks at this status or later are considered frozen for the purposes
    /// of insertion-point enumeration (§4.4): a bidder must not displace them.
    pub fn is_frozen(self) -> bool {
        !matches!(self, TaskStatus::Unallocated | TaskStatus::Allocated)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Preempted | TaskStatus::Canceled | TaskStatus::Aborted
        )
    }
}

/// A named inter-timepoint constraint, e.g. the travel time preceding a
/// task's `start` node, or the pickup-to-delivery duration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TemporalConstraint {
    pub mean: f64,
    pub variance: f64,
    pub hard: bool,
}

impl TemporalConstraint {
    pub fn hard(mean: f64, variance: f64) -> Self {
        Self { mean, variance, hard: true }
    }

    pub fn soft(mean: f64, variance: f64) -> Self {
        Self { mean, variance, hard: false }
    }

    /// `mean + 2 * sqrt(variance)`, the conservative duration estimate used
    /// by the schedule monitor's risk check (§4.1 `is_next_task_late`).
    pub fn conservative_duration(&self) -> f64 {
        self.mean + 2.0 * self.variance.sqrt()
    }
}

/// Name of the constraint bounding the robot's approach to this task's pickup.
pub const TRAVEL_TIME: &str = "travel_time";
/// Name of the constraint bounding pickup -> delivery duration.
pub const PICKUP_TO_DELIVERY: &str = "pickup_to_delivery";

/// A transportation task: pickup at one location, delivery at another,
/// bounded by a hard temporal window unless relaxed by alternative-timeslot
/// escalation (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    task_id: TaskId,
    status: TaskStatus,
    assigned_robots: Vec<RobotId>,
    pub pickup_location: String,
    pub delivery_location: String,
    /// Earliest/latest permitted absolute start time, seconds relative to
    /// the announcing allocator's zero timepoint.
    pub earliest_start: f64,
    pub latest_start: f64,
    /// Whether `[earliest_start, latest_start]` is a hard constraint. Set to
    /// `false` by alternative-timeslot relaxation (§4.6); a `false` window
    /// may be exceeded by a bid that then reports `alternative_start_time`.
    pub hard_window: bool,
    constraints: BTreeMap<String, TemporalConstraint>,
    delayed: bool,
}

impl Task {
    pub fn new(
        task_id: TaskId,
        pickup_location: impl Into<String>,
        delivery_location: impl Into<String>,
        earliest_start: f64,
        latest_start: f64,
    ) -> Self {
        let mut constraints = BTreeMap::new();
        constraints.insert(PICKUP_TO_DELIVERY.to_string(), TemporalConstraint::hard(10.0, 1.0));
        Self {
            task_id,
            status: TaskStatus::Unallocated,
            assigned_robots: Vec::new(),
            pickup_location: pickup_location.into(),
            delivery_location: delivery_location.into(),
            earliest_start,
            latest_start,
            hard_window: true,
            constraints,
            delayed: false,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
    }

    pub fn assigned_robots(&self) -> &[RobotId] {
        &self.assigned_robots
    }

    pub fn assign_robots(&mut self, robots: Vec<RobotId>) {
        self.assigned_robots = robots;
    }

    pub fn is_delayed(&self) -> bool {
        self.delayed
    }

    pub fn mark_as_delayed(&mut self) {
        self.delayed = true;
    }

    pub fn constraint(&self, name: &str) -> Option<&TemporalConstraint> {
        self.constraints.get(name)
    }

    pub fn set_constraint(&mut self, name: impl Into<String>, constraint: TemporalConstraint) {
        self.constraints.insert(name.into(), constraint);
    }

    pub fn update_inter_timepoint_constraint(&mut self, name: &str, mean: f64, variance: f64) {
        let hard = self.constraints.get(name).map(|c| c.hard).unwrap_or(true);
        self.constraints
            .insert(name.to_string(), TemporalConstraint { mean, variance, hard });
    }

    pub fn constraints(&self) -> &BTreeMap<String, TemporalConstraint> {
        &self.constraints
    }

    /// Relaxes this task's hard window, enabling alternative-timeslot
    /// escalation (§4.6 round-close retry).
    pub fn set_soft_constraints(&mut self) {
        self.hard_window = false;
    }

    pub fn pickup_to_delivery(&self) -> TemporalConstraint {
        self.constraints
            .get(PICKUP_TO_DELIVERY)
            .copied()
            .unwrap_or_else(|| TemporalConstraint::hard(10.0, 1.0))
    }

    /// Conservative estimate of the time still needed to finish this task's
    /// outstanding work (§4.1/§4.8 schedule-monitor risk check): the sum of
    /// `conservative_duration()` over every recorded constraint, or zero
    /// once the task is done.
    pub fn remaining_duration_estimate(&self) -> f64 {
        if self.status.is_terminal() {
            return 0.0;
        }
        self.constraints.values().map(TemporalConstraint::conservative_duration).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_starts_unallocated() {
        let task = Task::new(TaskId::new("T1"), "A", "B", 10.0, 30.0);
        assert_eq!(task.status(), TaskStatus::Unallocated);
        assert!(task.hard_window);
    }

    #[test]
    fn frozen_statuses_exclude_unallocated_and_allocated() {
        assert!(!TaskStatus::Unallocated.is_frozen());
        assert!(!TaskStatus::Allocated.is_frozen());
        assert!(TaskStatus::Planned.is_frozen());
        assert!(TaskStatus::Dispatched.is_frozen());
    }

    #[test]
    fn conservative_duration_adds_two_std_devs() {
        let c = TemporalConstraint::hard(10.0, 1.0);
        assert_eq!(c.conservative_duration(), 12.0);
    }
}
