//! The bidding rule (§4.3): a pure function from a robot's current
//! timetable and an announced task to either a [`Bid`] or a [`NoBid`].
//!
//! Grounded on the insertion-point enumeration in the original bidder: try
//! every position `1..=n_tasks+1` (inserting after the zero timepoint, after
//! each existing task, or at the very end), keep the feasible ones, and
//! report whichever is cheapest under `(risk_metric, temporal_metric)`.

use crate::bid::{Bid, NoBid, NoBidReason};
use crate::ids::RoundId;
use crate::task::{Task, TemporalConstraint};
use crate::timetable::Timetable;

/// Sentinel travel-time estimate used when no path planner is wired in:
/// mean 1 second, variance 0.1, matching the original bidder's placeholder.
pub const SENTINEL_TRAVEL_TIME: TemporalConstraint = TemporalConstraint { mean: 1.0, variance: 0.1, hard: false };

/// Computes a robot's cost quote for `task` against `timetable`, or a
/// refusal if no insertion point yields a consistent network.
pub fn compute_bid(timetable: &Timetable, task: &Task, round_id: RoundId) -> Result<Bid, NoBid> {
    let n_tasks = timetable.len();
    let mut best: Option<(usize, crate::timetable::TrialInsertion)> = None;

    for position in 1..=(n_tasks + 1) {
        let Ok(trial) = timetable.try_insert(task, position, travel_time_for(task)) else {
            continue;
        };
        let better = match &best {
            None => true,
            Some((_, current)) => {
                (trial.risk_metric, trial.temporal_metric) < (current.risk_metric, current.temporal_metric)
            }
        };
        if better {
            best = Some((position, trial));
        }
    }

    match best {
        Some((insertion_point, trial)) => Ok(Bid {
            task_id: task.task_id().clone(),
            robot_id: timetable.robot_id().clone(),
            round_id,
            allocation_method: timetable.allocation_method(),
            risk_metric: trial.risk_metric,
            temporal_metric: trial.temporal_metric,
            insertion_point,
            stn: trial.stn().to_wire(),
            dispatchable_graph: trial.dispatchable().to_wire(),
            alternative_start_time: if task.hard_window {
                None
            } else {
                trial.dispatchable().get_time(trial.start_node(), true).ok()
            },
        }),
        None => Err(NoBid {
            task_id: task.task_id().clone(),
            robot_id: timetable.robot_id().clone(),
            round_id,
            reason: NoBidReason::NoStpSolution,
        }),
    }
}

/// `travel_time` is always the sentinel estimate here: a real deployment
/// would query a path planner keyed by (previous location, pickup location),
/// which is out of scope for this core (§4.3 Non-goals).
fn travel_time_for(_task: &Task) -> TemporalConstraint {
    SENTINEL_TRAVEL_TIME
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{RobotId, TaskId};
    use crate::stn::AllocationMethod;

    #[test]
    fn feasible_task_produces_a_bid() {
        let timetable = Timetable::new(RobotId::new("robot_001"), AllocationMethod::Tessi);
        let task = Task::new(TaskId::new("T1"), "A", "B", 10.0, 30.0);
        let bid = compute_bid(&timetable, &task, RoundId::new("R1")).expect("bid");
        assert_eq!(bid.insertion_point, 1);
        assert_eq!(bid.risk_metric, 0.0);
    }

    #[test]
    fn impossible_window_produces_no_bid() {
        let timetable = Timetable::new(RobotId::new("robot_001"), AllocationMethod::Tessi);
        let task = Task::new(TaskId::new("T1"), "A", "B", 100.0, 50.0);
        let outcome = compute_bid(&timetable, &task, RoundId::new("R1"));
        assert!(outcome.is_err());
    }
}
