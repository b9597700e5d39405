//! A single robot's temporal plan: an ordered sequence of tasks threaded
//! through one STN, plus the dispatchable graph derived from it (§4.1).

mod error;

pub use error::TimetableError;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::ids::{RobotId, TaskId};
use crate::stn::{AllocationMethod, NodeIndex, NodeKind, Stn, StnDict, ZTP};
use crate::task::{Task, TemporalConstraint};

/// Which of a task's three timepoints an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimetableNode {
    Start,
    Pickup,
    Delivery,
}

/// The three STN nodes representing one task within a robot's timetable.
#[derive(Debug, Clone, Copy)]
struct TaskNodes {
    start: NodeIndex,
    pickup: NodeIndex,
    delivery: NodeIndex,
}

impl TaskNodes {
    fn pick(&self, node: TimetableNode) -> NodeIndex {
        match node {
            TimetableNode::Start => self.start,
            TimetableNode::Pickup => self.pickup,
            TimetableNode::Delivery => self.delivery,
        }
    }
}

/// The outcome of probing an insertion point without committing it, as
/// produced by [`Timetable::try_insert`] and consumed by the bidding rule.
pub struct TrialInsertion {
    trial: Stn,
    dispatchable: Stn,
    nodes: TaskNodes,
    pub risk_metric: f64,
    pub temporal_metric: f64,
}

impl TrialInsertion {
    /// The as-allocated STN the bid would carry if it wins, prior to
    /// minimal-network derivation — what a `BID`/`TASK-CONTRACT` message's
    /// `stn` field is built from.
    pub fn stn(&self) -> &Stn {
        &self.trial
    }

    pub fn dispatchable(&self) -> &Stn {
        &self.dispatchable
    }

    /// Node index of the task's `start` timepoint in [`Self::dispatchable`],
    /// useful for reporting an alternative start time on a relaxed bid.
    pub fn start_node(&self) -> NodeIndex {
        self.nodes.start
    }
}

#[derive(Debug, Clone)]
pub struct Timetable {
    robot_id: RobotId,
    allocation_method: AllocationMethod,
    /// Wall-clock instant this timetable's STN is relative to (§3/§4.10).
    ztp: DateTime<Utc>,
    stn: Stn,
    dispatchable: Stn,
    order: Vec<TaskId>,
    nodes: BTreeMap<TaskId, TaskNodes>,
}

impl Timetable {
    pub fn new(robot_id: RobotId, allocation_method: AllocationMethod) -> Self {
        let stn = Stn::new();
        let dispatchable = stn.clone();
        Self {
            robot_id,
            allocation_method,
            ztp: Utc::now(),
            stn,
            dispatchable,
            order: Vec::new(),
            nodes: BTreeMap::new(),
        }
    }

    pub fn robot_id(&self) -> &RobotId {
        &self.robot_id
    }

    pub fn ztp(&self) -> DateTime<Utc> {
        self.ztp
    }

    pub fn set_ztp(&mut self, ztp: DateTime<Utc>) {
        self.ztp = ztp;
    }

    pub fn allocation_method(&self) -> AllocationMethod {
        self.allocation_method
    }

    pub fn order(&self) -> &[TaskId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn stn(&self) -> &Stn {
        &self.stn
    }

    pub fn dispatchable(&self) -> &Stn {
        &self.dispatchable
    }

    /// Node the new task's travel time is measured from: the predecessor
    /// task's `delivery` timepoint (a robot must finish a delivery before
    /// it can travel to the next pickup), or `None` for "anchor to ztp"
    /// when inserting at the very front, per the bidder's
    /// `range(1, n_tasks + 2)` enumeration.
    fn previous_anchor(&self, position: usize) -> Option<NodeIndex> {
        if position <= 1 {
            None
        } else {
            self.order
                .get(position - 2)
                .and_then(|id| self.nodes.get(id))
                .map(|n| n.delivery)
        }
    }

    fn makespan(&self, graph: &Stn) -> f64 {
        graph
            .node_indices()
            .filter(|&n| n != ZTP)
            .filter_map(|n| graph.get_time(n, false).ok())
            .fold(0.0, f64::max)
    }

    /// Tries inserting `task` at 1-indexed `position` into a scratch copy of
    /// this timetable's STN without mutating `self`. On success, returns the
    /// dispatchable graph and the risk/temporal metrics a bid reports.
    pub fn try_insert(
        &self,
        task: &Task,
        position: usize,
        travel_time: TemporalConstraint,
    ) -> Result<TrialInsertion, TimetableError> {
        let mut trial = self.stn.clone();
        let start = trial.add_timepoint(NodeKind::Start);
        let pickup = trial.add_timepoint(NodeKind::Pickup);
        let delivery = trial.add_timepoint(NodeKind::Delivery);

        let anchor = self.previous_anchor(position).unwrap_or(ZTP);
        let travel_lb = (travel_time.mean - 2.0 * travel_time.variance.sqrt()).max(0.0);
        let travel_ub = travel_time.mean + 2.0 * travel_time.variance.sqrt();
        trial.set_constraint(anchor, start, travel_lb, travel_ub);

        if task.hard_window {
            trial.set_constraint(ZTP, start, task.earliest_start, task.latest_start);
        }

        trial.set_constraint(start, pickup, 0.0, 0.0);
        let pd = task.pickup_to_delivery();
        let pd_lb = (pd.mean - 2.0 * pd.variance.sqrt()).max(0.0);
        let pd_ub = pd.mean + 2.0 * pd.variance.sqrt();
        trial.set_constraint(pickup, delivery, pd_lb, pd_ub);

        // Re-anchor whatever already followed `anchor` to this task's
        // delivery instead, preserving the existing gap between them.
        if let Some(next_id) = self.order.get(position - 1) {
            if let Some(next_nodes) = self.nodes.get(next_id) {
                if let Some((lb, ub)) = self.stn.constraint(anchor, next_nodes.start) {
                    trial.set_constraint(delivery, next_nodes.start, lb.max(0.0), ub);
                }
            }
        }

        let solver = self.allocation_method.solver();
        let dispatchable = solver.solve(&trial)?;
        let risk_metric = solver.risk_metric(&dispatchable);
        let temporal_metric = (self.makespan(&dispatchable) - self.makespan(&self.dispatchable)).max(0.0);

        Ok(TrialInsertion {
            trial,
            dispatchable,
            nodes: TaskNodes { start, pickup, delivery },
            risk_metric,
            temporal_metric,
        })
    }

    /// Commits a previously computed [`TrialInsertion`] at 1-indexed
    /// `position`, threading `task_id` into the order.
    pub fn commit_insertion(&mut self, task_id: TaskId, position: usize, trial: TrialInsertion) {
        self.stn = trial.trial;
        self.dispatchable = trial.dispatchable;
        self.nodes.insert(task_id.clone(), trial.nodes);
        self.order.insert(position - 1, task_id);
    }

    pub fn remove_task(&mut self, task_id: &TaskId) -> Result<(), TimetableError> {
        let nodes = self
            .nodes
            .remove(task_id)
            .ok_or_else(|| TimetableError::UnknownTask(task_id.clone()))?;
        self.order.retain(|id| id != task_id);
        self.stn.remove_timepoint(nodes.start);
        self.stn.remove_timepoint(nodes.pickup);
        self.stn.remove_timepoint(nodes.delivery);
        self.resolve()
    }

    /// Re-derives the dispatchable graph after a structural change.
    pub fn resolve(&mut self) -> Result<(), TimetableError> {
        let solver = self.allocation_method.solver();
        self.dispatchable = solver.solve(&self.stn)?;
        Ok(())
    }

    /// Forces `node` of `task_id` to absolute time `t`. Works on a clone of
    /// the STN: the assignment is only written back once the clone still
    /// solves, so a caller that forces an inconsistent time never leaves
    /// `self.stn` inconsistent (invariant (a), §3).
    pub fn assign_timepoint(&mut self, task_id: &TaskId, node: TimetableNode, t: f64) -> Result<(), TimetableError> {
        let idx = self
            .nodes
            .get(task_id)
            .ok_or_else(|| TimetableError::UnknownTask(task_id.clone()))?
            .pick(node);

        let mut trial = self.stn.clone();
        trial.assign_timepoint(idx, t);
        let dispatchable = self.allocation_method.solver().solve(&trial)?;

        self.stn = trial;
        self.dispatchable = dispatchable;
        Ok(())
    }

    /// Adopts a previously quoted bid's snapshot directly instead of
    /// recomputing the insertion (§4.4): the winning bid already carries the
    /// `stn`/`dispatchable_graph` that would result from accepting it, so
    /// committing replaces this timetable's plan with those snapshots
    /// outright rather than re-deriving them, which could silently diverge
    /// if this timetable changed between the bid and the contract.
    ///
    /// Assumes `stn` was built by extending this timetable's STN with
    /// exactly one task's three timepoints, appended in `(start, pickup,
    /// delivery)` order — what [`Self::try_insert`] produces. A snapshot of
    /// any other shape is rejected rather than silently misread.
    pub fn adopt_contract(
        &mut self,
        task_id: TaskId,
        position: usize,
        stn: StnDict,
        dispatchable_graph: StnDict,
    ) -> Result<(), TimetableError> {
        let new_stn = stn.to_stn();
        let existing = self.stn.node_count();
        if new_stn.node_count() != existing + 3 {
            return Err(TimetableError::InvalidSnapshot(task_id));
        }
        let nodes = TaskNodes {
            start: NodeIndex::new(existing),
            pickup: NodeIndex::new(existing + 1),
            delivery: NodeIndex::new(existing + 2),
        };

        self.stn = new_stn;
        self.dispatchable = dispatchable_graph.to_stn();
        self.nodes.insert(task_id.clone(), nodes);
        self.order.insert(position - 1, task_id);
        Ok(())
    }

    pub fn execute_edge(
        &mut self,
        from_task: Option<&TaskId>,
        from_node: TimetableNode,
        to_task: &TaskId,
        to_node: TimetableNode,
    ) -> Result<(), TimetableError> {
        let from = match from_task {
            Some(id) => self
                .nodes
                .get(id)
                .ok_or_else(|| TimetableError::UnknownTask(id.clone()))?
                .pick(from_node),
            None => ZTP,
        };
        let to = self
            .nodes
            .get(to_task)
            .ok_or_else(|| TimetableError::UnknownTask(to_task.clone()))?
            .pick(to_node);
        self.stn.execute_edge(from, to);
        self.dispatchable.execute_edge(from, to);
        Ok(())
    }

    fn time_of(&self, task_id: &TaskId, node: TimetableNode, lower_bound: bool) -> Result<f64, TimetableError> {
        let idx = self
            .nodes
            .get(task_id)
            .ok_or_else(|| TimetableError::UnknownTask(task_id.clone()))?
            .pick(node);
        Ok(self.dispatchable.get_time(idx, lower_bound)?)
    }

    pub fn start_time(&self, task_id: &TaskId, lower_bound: bool) -> Result<f64, TimetableError> {
        self.time_of(task_id, TimetableNode::Start, lower_bound)
    }

    pub fn pickup_time(&self, task_id: &TaskId, lower_bound: bool) -> Result<f64, TimetableError> {
        self.time_of(task_id, TimetableNode::Pickup, lower_bound)
    }

    pub fn delivery_time(&self, task_id: &TaskId, lower_bound: bool) -> Result<f64, TimetableError> {
        self.time_of(task_id, TimetableNode::Delivery, lower_bound)
    }

    pub fn next_task(&self, task_id: &TaskId) -> Option<&TaskId> {
        let pos = self.order.iter().position(|id| id == task_id)?;
        self.order.get(pos + 1)
    }

    pub fn previous_task(&self, task_id: &TaskId) -> Option<&TaskId> {
        let pos = self.order.iter().position(|id| id == task_id)?;
        pos.checked_sub(1).and_then(|p| self.order.get(p))
    }

    /// Predictive lateness check (§4.1/§4.8): would finishing `current`'s
    /// remaining work push past `next`'s latest permitted start?
    /// `last_known_time(current)` is this task's pickup time — exact once
    /// the robot has actually reached pickup (`assign_timepoint`/
    /// `execute_edge` collapse the window to a point), a prediction
    /// otherwise — plus a conservative estimate of the time still needed to
    /// reach delivery.
    pub fn is_next_task_late(&self, current: &Task, next: &Task) -> Result<bool, TimetableError> {
        let last_known = self.pickup_time(current.task_id(), true)?;
        let remaining = current.remaining_duration_estimate();
        Ok(last_known + remaining > next.latest_start)
    }

    /// Checks whether `current` finishing at its latest possible time would
    /// already violate `next`'s window (§4.1). When it would not, tightens
    /// `next`'s earliest start in place to `current`'s scheduled finish —
    /// the side effect that keeps a later insertion-point search from
    /// proposing a start earlier than the predecessor can actually hand the
    /// task off.
    pub fn is_next_task_invalid(&self, current: &Task, next: &mut Task) -> Result<bool, TimetableError> {
        let scheduled_finish = self.delivery_time(current.task_id(), false)?;
        if next.latest_start < scheduled_finish {
            return Ok(true);
        }
        if next.earliest_start < scheduled_finish {
            next.earliest_start = scheduled_finish;
        }
        Ok(false)
    }

    /// Subgraph of the zero timepoint plus the first `n` tasks in dispatch
    /// order (§4.1), bounding a `D-GRAPH-UPDATE` broadcast to the dispatch
    /// window instead of the whole plan.
    pub fn get_d_graph_update(&self, n: usize) -> StnDict {
        let keep: Vec<NodeIndex> = std::iter::once(ZTP)
            .chain(
                self.order
                    .iter()
                    .take(n)
                    .filter_map(|id| self.nodes.get(id))
                    .flat_map(|t| [t.start, t.pickup, t.delivery]),
            )
            .collect();
        self.dispatchable.subgraph(&keep).to_wire()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RobotId;

    fn task(id: &str, earliest: f64, latest: f64) -> Task {
        Task::new(TaskId::new(id), "A", "B", earliest, latest)
    }

    fn sentinel_travel_time() -> TemporalConstraint {
        TemporalConstraint::hard(1.0, 0.1)
    }

    #[test]
    fn insert_single_task_then_commit() {
        let tt = Timetable::new(RobotId::new("robot_001"), AllocationMethod::Tessi);
        let t1 = task("T1", 10.0, 30.0);
        let trial = tt.try_insert(&t1, 1, sentinel_travel_time()).unwrap();
        assert!(trial.risk_metric >= 0.0);

        let mut tt = tt;
        tt.commit_insertion(t1.task_id().clone(), 1, trial);
        assert_eq!(tt.order(), &[TaskId::new("T1")]);
        assert!(tt.start_time(&TaskId::new("T1"), true).unwrap() >= 10.0);
    }

    #[test]
    fn second_task_inserted_after_first() {
        let mut tt = Timetable::new(RobotId::new("robot_001"), AllocationMethod::Tessi);
        let t1 = task("T1", 0.0, 100.0);
        let trial = tt.try_insert(&t1, 1, sentinel_travel_time()).unwrap();
        tt.commit_insertion(t1.task_id().clone(), 1, trial);

        let t2 = task("T2", 0.0, 200.0);
        let trial = tt.try_insert(&t2, 2, sentinel_travel_time()).unwrap();
        tt.commit_insertion(t2.task_id().clone(), 2, trial);

        assert_eq!(tt.order(), &[TaskId::new("T1"), TaskId::new("T2")]);
        assert_eq!(tt.next_task(&TaskId::new("T1")), Some(&TaskId::new("T2")));
    }

    #[test]
    fn infeasible_window_yields_no_solution() {
        let tt = Timetable::new(RobotId::new("robot_001"), AllocationMethod::Tessi);
        let bad = Task::new(TaskId::new("T1"), "A", "B", 100.0, 50.0);
        assert!(tt.try_insert(&bad, 1, sentinel_travel_time()).is_err());
    }
}
