//! Robot-side reaction to auction messages: on announcement, compute a bid
//! against the robot's own timetable; on contract, commit the winning
//! insertion (§4.3-§4.4).

use crate::bid::BidResponse;
use crate::bidding_rule::compute_bid;
use crate::ids::{RoundId, TaskId};
use crate::stn::StnDict;
use crate::task::Task;
use crate::timetable::{Timetable, TimetableError};

/// Holds nothing beyond what it's handed; a robot has exactly one of these,
/// but it carries no state of its own so tests can call it directly against
/// a scratch timetable.
#[derive(Debug, Default)]
pub struct Bidder;

impl Bidder {
    pub fn new() -> Self {
        Self
    }

    /// Reacts to a `TASK-ANNOUNCEMENT` carrying a batch of tasks: computes
    /// this robot's best bid across the whole batch without mutating
    /// `timetable` (the insertion is only committed once a `TASK-CONTRACT`
    /// names this robot the winner), plus one refusal for every task that
    /// has no feasible insertion point at all (§4.4).
    pub fn on_task_announcement(&self, timetable: &Timetable, tasks: &[Task], round_id: RoundId) -> Vec<BidResponse> {
        let mut best: Option<crate::bid::Bid> = None;
        let mut responses = Vec::new();

        for task in tasks {
            match compute_bid(timetable, task, round_id.clone()) {
                Ok(bid) => {
                    let better = match &best {
                        None => true,
                        Some(current) => bid < *current,
                    };
                    if better {
                        best = Some(bid);
                    }
                }
                Err(no_bid) => responses.push(BidResponse::NoBid(no_bid)),
            }
        }

        if let Some(bid) = best {
            responses.push(BidResponse::Bid(bid));
        }
        responses
    }

    /// Reacts to a `TASK-CONTRACT` naming this robot the winner: adopts the
    /// `stn`/`dispatchable_graph` snapshots the winning bid already carried
    /// (§3, §4.4) rather than recomputing the insertion, so the committed
    /// plan can never silently diverge from what was quoted.
    pub fn on_task_contract(
        &self,
        timetable: &mut Timetable,
        task: &Task,
        insertion_point: usize,
        stn: StnDict,
        dispatchable_graph: StnDict,
    ) -> Result<(), TimetableError> {
        timetable.adopt_contract(task.task_id().clone(), insertion_point, stn, dispatchable_graph)
    }

    /// Reacts to a `REALLOCATE` instruction: drops the task from this
    /// robot's timetable so it can be re-announced elsewhere.
    pub fn on_reallocate(&self, timetable: &mut Timetable, task_id: &TaskId) -> Result<(), TimetableError> {
        timetable.remove_task(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RobotId;
    use crate::stn::AllocationMethod;

    #[test]
    fn announcement_then_contract_commits_the_same_insertion() {
        let bidder = Bidder::new();
        let mut timetable = Timetable::new(RobotId::new("robot_001"), AllocationMethod::Tessi);
        let task = Task::new(TaskId::new("T1"), "A", "B", 10.0, 30.0);

        let responses = bidder.on_task_announcement(&timetable, std::slice::from_ref(&task), RoundId::new("R1"));
        let bid = match responses.into_iter().next() {
            Some(BidResponse::Bid(bid)) => bid,
            _ => panic!("expected a bid"),
        };

        bidder
            .on_task_contract(
                &mut timetable,
                &task,
                bid.insertion_point,
                bid.stn.clone(),
                bid.dispatchable_graph.clone(),
            )
            .unwrap();
        assert_eq!(timetable.order(), &[TaskId::new("T1")]);
    }
}
