//! Bids and the §4.5 ordering robots and auctioneers use to compare them.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::ids::{RobotId, TaskId};
use crate::stn::{AllocationMethod, StnDict};

/// A robot's response to a `TASK-ANNOUNCEMENT` for a single task: either a
/// cost quote, or an explicit refusal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub task_id: TaskId,
    pub robot_id: RobotId,
    pub round_id: crate::ids::RoundId,
    pub allocation_method: AllocationMethod,
    /// Risk reported by the solver used to compute this bid; smaller is
    /// safer. Primary sort key (§4.5).
    pub risk_metric: f64,
    /// Secondary sort key: the added makespan this task would cost the
    /// robot's schedule if elected.
    pub temporal_metric: f64,
    /// Index at which the task would be inserted into the robot's plan.
    pub insertion_point: usize,
    /// As-allocated STN the robot would adopt if this bid wins: committing
    /// the bid replaces the winner's plan with this snapshot directly
    /// rather than recomputing the insertion (§3, §4.4).
    pub stn: StnDict,
    /// Dispatchable graph the robot would adopt if this bid wins, so the
    /// auctioneer need not recompute it.
    pub dispatchable_graph: StnDict,
    /// Present only when the task's window was relaxed (§4.6) and this bid
    /// proposes a start time outside the originally announced window.
    pub alternative_start_time: Option<f64>,
}

impl Bid {
    /// Sort key used for both the robot's own best-bid choice and the
    /// auctioneer's cross-robot election: `(risk_metric, temporal_metric)`,
    /// both ascending — lower cost wins.
    fn sort_key(&self) -> (OrderedF64, OrderedF64) {
        (OrderedF64(self.risk_metric), OrderedF64(self.temporal_metric))
    }

    /// Tie-break key applied when two bids carry an identical `sort_key`:
    /// smaller `task_id` first, then the bidding robot's numeric suffix
    /// (§4.5), so the ordering is a deterministic total order.
    fn tie_break_key(&self) -> (&str, (bool, Option<u64>, &str)) {
        (self.task_id.as_str(), self.robot_id.tie_break_key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct OrderedF64(f64);

impl Eq for OrderedF64 {}

impl PartialOrd for OrderedF64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedF64 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

impl PartialEq for Bid {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key() && self.tie_break_key() == other.tie_break_key()
    }
}

impl Eq for Bid {}

impl PartialOrd for Bid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Bid {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.tie_break_key().cmp(&other.tie_break_key()))
    }
}

/// A robot's response when no feasible insertion point exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoBid {
    pub task_id: TaskId,
    pub robot_id: RobotId,
    pub round_id: crate::ids::RoundId,
    pub reason: NoBidReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum NoBidReason {
    /// No insertion point in `1..=n_tasks+1` yielded a consistent network.
    NoStpSolution,
    /// The robot is already fully booked or otherwise unable to bid.
    Unavailable,
}

/// Either side of a robot's response to a task announcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BidResponse {
    Bid(Bid),
    NoBid(NoBid),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RoundId;

    fn bid(task: &str, robot: &str, risk: f64, temporal: f64) -> Bid {
        Bid {
            task_id: TaskId::new(task),
            robot_id: RobotId::new(robot),
            round_id: RoundId::new("R1"),
            allocation_method: AllocationMethod::Tessi,
            risk_metric: risk,
            temporal_metric: temporal,
            insertion_point: 1,
            stn: StnDict::default(),
            dispatchable_graph: StnDict::default(),
            alternative_start_time: None,
        }
    }

    #[test]
    fn lower_risk_metric_wins() {
        let cheap = bid("T1", "robot_001", 0.0, 50.0);
        let risky = bid("T1", "robot_002", 1.0, 1.0);
        assert!(cheap < risky);
    }

    #[test]
    fn equal_risk_breaks_by_temporal_metric() {
        let fast = bid("T1", "robot_001", 0.0, 10.0);
        let slow = bid("T1", "robot_002", 0.0, 20.0);
        assert!(fast < slow);
    }

    #[test]
    fn full_tie_breaks_by_robot_numeric_suffix() {
        let a = bid("T1", "robot_001", 0.0, 10.0);
        let b = bid("T1", "robot_002", 0.0, 10.0);
        assert!(a < b);
    }
}
