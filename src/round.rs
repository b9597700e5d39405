//! A single auction round for a batch of tasks (§4.6): every expected robot
//! bids against the whole batch, but the round still elects exactly one
//! winning `(task, bid)` pair per round (single-award policy). Exposes the
//! state machine IDLE -> OPEN -> CLOSED -> ELECTED/NO-ALLOCATION -> FINISHED.

use std::collections::{HashMap, HashSet};

use crate::bid::{Bid, BidResponse};
use crate::ids::{RobotId, RoundId, TaskId};
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    Open,
    Closed,
    Elected,
    NoAllocation,
    Finished,
}

#[derive(Debug, Clone)]
pub struct ElectionResult {
    pub task: Task,
    pub winner: Bid,
    pub runner_up: Option<Bid>,
}

#[derive(Debug)]
pub struct Round {
    round_id: RoundId,
    tasks: HashMap<TaskId, Task>,
    state: RoundState,
    /// Best bid seen so far for each task, keyed by task id (§3).
    received_bids: HashMap<TaskId, Bid>,
    /// Robots that explicitly refused each task.
    received_no_bids: HashMap<TaskId, HashSet<RobotId>>,
    expected_robots: Vec<RobotId>,
    responded: HashSet<RobotId>,
}

impl Round {
    pub fn open(round_id: RoundId, tasks: Vec<Task>, expected_robots: Vec<RobotId>) -> Self {
        Self {
            round_id,
            tasks: tasks.into_iter().map(|t| (t.task_id().clone(), t)).collect(),
            state: RoundState::Open,
            received_bids: HashMap::new(),
            received_no_bids: HashMap::new(),
            expected_robots,
            responded: HashSet::new(),
        }
    }

    pub fn round_id(&self) -> &RoundId {
        &self.round_id
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn bids(&self) -> impl Iterator<Item = &Bid> {
        self.received_bids.values()
    }

    /// Records a robot's response to one task in the batch. A later bid for
    /// a task supersedes an earlier one only if it's cheaper (§4.5); the
    /// round keeps the best-so-far bid per task, not the latest.
    pub fn process_response(&mut self, response: BidResponse) {
        match response {
            BidResponse::Bid(bid) => {
                self.responded.insert(bid.robot_id.clone());
                let better = match self.received_bids.get(&bid.task_id) {
                    None => true,
                    Some(existing) => bid < *existing,
                };
                if better {
                    self.received_bids.insert(bid.task_id.clone(), bid);
                }
            }
            BidResponse::NoBid(no_bid) => {
                self.responded.insert(no_bid.robot_id.clone());
                self.received_no_bids.entry(no_bid.task_id.clone()).or_default().insert(no_bid.robot_id.clone());
            }
        }
    }

    /// Whether every expected robot has sent at least one response this
    /// round. A soft early-exit heuristic: a robot that bids on one task in
    /// the batch and no-bids on the rest is already done responding, but
    /// this can't distinguish that from a robot still mid-flight, so callers
    /// should still close the round on a timeout even when this is false.
    pub fn is_complete(&self) -> bool {
        self.expected_robots.iter().all(|r| self.responded.contains(r))
    }

    /// Closes the round and transitions to `ELECTED` or `NO-ALLOCATION`.
    pub fn close(&mut self) -> RoundState {
        self.state = if self.received_bids.is_empty() {
            RoundState::NoAllocation
        } else {
            RoundState::Elected
        };
        self.state
    }

    /// Elects the winning `(task, bid)` pair across the whole batch under
    /// the §4.5 ordering: smallest `(risk_metric, temporal_metric)`, ties
    /// broken by task id then the bidding robot's numeric suffix. Only this
    /// one task is awarded this round; every other task carries forward.
    pub fn elect_winner(&self) -> Option<ElectionResult> {
        let mut sorted: Vec<&Bid> = self.received_bids.values().collect();
        sorted.sort();
        let winner = (*sorted.first()?).clone();
        let runner_up = sorted.get(1).map(|b| (*b).clone());
        let task = self.tasks.get(&winner.task_id)?.clone();
        Some(ElectionResult { task, winner, runner_up })
    }

    pub fn finish(&mut self) {
        self.state = RoundState::Finished;
    }

    /// Consumes this round's tasks other than `awarded` (if any), splitting
    /// them by what happened this round for the next round's announcement
    /// (§4.6): a relaxed task drew at least one explicit refusal and no bid
    /// at all, so its window should loosen before trying again; a starved
    /// task drew no response whatsoever; a passthrough task drew a real bid
    /// but lost the single-award lottery to a different task. Starved and
    /// passthrough tasks carry forward with their window unchanged.
    pub fn carry_forward(self, awarded: Option<&TaskId>) -> (Vec<Task>, Vec<Task>, Vec<Task>) {
        let mut relaxed = Vec::new();
        let mut starved = Vec::new();
        let mut passthrough = Vec::new();

        for (task_id, mut task) in self.tasks {
            if Some(&task_id) == awarded {
                continue;
            }
            if self.received_bids.contains_key(&task_id) {
                passthrough.push(task);
            } else if self.received_no_bids.contains_key(&task_id) {
                task.set_soft_constraints();
                relaxed.push(task);
            } else {
                starved.push(task);
            }
        }
        (relaxed, starved, passthrough)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{RoundId, TaskId};
    use crate::stn::AllocationMethod;
    use crate::stn::StnDict;

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
    fn closes_to_no_allocation_when_every_robot_declines() {
        let task = Task::new(TaskId::new("T1"), "A", "B", 10.0, 30.0);
        let mut round = Round::open(RoundId::new("R1"), vec![task], vec![RobotId::new("robot_001")]);
        round.process_response(BidResponse::NoBid(crate::bid::NoBid {
            task_id: TaskId::new("T1"),
            robot_id: RobotId::new("robot_001"),
            round_id: RoundId::new("R1"),
            reason: crate::bid::NoBidReason::NoStpSolution,
        }));
        assert!(round.is_complete());
        assert_eq!(round.close(), RoundState::NoAllocation);
    }

    #[test]
    fn cheapest_bid_wins_across_the_whole_batch() {
        let t1 = Task::new(TaskId::new("T1"), "A", "B", 10.0, 30.0);
        let t2 = Task::new(TaskId::new("T2"), "A", "B", 10.0, 30.0);
        let mut round = Round::open(
            RoundId::new("R1"),
            vec![t1, t2],
            vec![RobotId::new("robot_001"), RobotId::new("robot_002")],
        );
        round.process_response(BidResponse::Bid(bid("T1", "robot_001", 1.0, 10.0)));
        round.process_response(BidResponse::Bid(bid("T2", "robot_002", 0.0, 20.0)));
        round.close();
        let election = round.elect_winner().unwrap();
        assert_eq!(election.task.task_id(), &TaskId::new("T2"));
        assert_eq!(election.winner.robot_id, RobotId::new("robot_002"));
    }

    #[test]
    fn carry_forward_splits_by_response_outcome() {
        let t1 = Task::new(TaskId::new("T1"), "A", "B", 10.0, 30.0);
        let t2 = Task::new(TaskId::new("T2"), "A", "B", 10.0, 30.0);
        let t3 = Task::new(TaskId::new("T3"), "A", "B", 10.0, 30.0);
        let mut round = Round::open(RoundId::new("R1"), vec![t1, t2, t3], vec![RobotId::new("robot_001")]);
        round.process_response(BidResponse::Bid(bid("T1", "robot_001", 0.0, 0.0)));
        round.process_response(BidResponse::NoBid(crate::bid::NoBid {
            task_id: TaskId::new("T2"),
            robot_id: RobotId::new("robot_001"),
            round_id: RoundId::new("R1"),
            reason: crate::bid::NoBidReason::NoStpSolution,
        }));
        round.close();

        let (relaxed, starved, passthrough) = round.carry_forward(Some(&TaskId::new("T1")));
        assert_eq!(relaxed.len(), 1);
        assert_eq!(relaxed[0].task_id(), &TaskId::new("T2"));
        assert!(!relaxed[0].hard_window);
        assert_eq!(starved.len(), 1);
        assert_eq!(starved[0].task_id(), &TaskId::new("T3"));
        assert!(passthrough.is_empty());
    }
}
