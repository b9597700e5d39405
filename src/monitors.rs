//! Aggregators that keep a read-only view of state owned elsewhere: the
//! fleet monitor mirrors every other robot's dispatchable graph from
//! `D-GRAPH-UPDATE` broadcasts (§4.11); the timetable monitor is the
//! single-robot counterpart a robot runs over its own plan to decide when
//! to emit one.

use std::collections::HashMap;

use crate::ids::RobotId;
use crate::stn::{Stn, StnDict};
use crate::timetable::Timetable;

/// Fleet-wide shadow copies of every robot's dispatchable graph, kept in
/// sync by `D-GRAPH-UPDATE` messages rather than direct auction traffic.
#[derive(Debug, Default)]
pub struct FleetMonitor {
    shadow: HashMap<RobotId, Stn>,
}

impl FleetMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an incoming update: `replace` discards the prior shadow
    /// outright, otherwise the update is merged edge-by-edge.
    pub fn on_d_graph_update(&mut self, robot_id: RobotId, graph: &StnDict, replace: bool) {
        if replace {
            self.shadow.insert(robot_id, graph.to_stn());
            return;
        }
        match self.shadow.get_mut(&robot_id) {
            Some(existing) => graph.merge_into(existing),
            None => {
                self.shadow.insert(robot_id, graph.to_stn());
            }
        }
    }

    pub fn shadow(&self, robot_id: &RobotId) -> Option<&Stn> {
        self.shadow.get(robot_id)
    }

    pub fn known_robots(&self) -> impl Iterator<Item = &RobotId> {
        self.shadow.keys()
    }
}

/// Watches a single robot's own timetable and decides whether its
/// dispatchable graph has changed enough since the last broadcast to
/// warrant a fresh `D-GRAPH-UPDATE` (comparing makespans is cheap and
/// catches every structural change: insertion, removal, or execution).
#[derive(Debug)]
pub struct TimetableMonitor {
    last_broadcast_makespan: Option<f64>,
    /// How many of the robot's upcoming tasks a broadcast update covers
    /// (§4.1), rather than the whole plan.
    n_tasks_queue: usize,
}

impl TimetableMonitor {
    pub fn new(n_tasks_queue: usize) -> Self {
        Self { last_broadcast_makespan: None, n_tasks_queue }
    }

    /// Returns the dispatchable graph to broadcast if it changed since the
    /// last call that returned `Some`.
    pub fn poll(&mut self, timetable: &Timetable) -> Option<StnDict> {
        let makespan = timetable
            .dispatchable()
            .node_indices()
            .filter(|&n| n != crate::stn::ZTP)
            .filter_map(|n| timetable.dispatchable().get_time(n, false).ok())
            .fold(0.0_f64, f64::max);

        let changed = match self.last_broadcast_makespan {
            Some(prev) => (prev - makespan).abs() > 1e-9,
            None => true,
        };
        if changed {
            self.last_broadcast_makespan = Some(makespan);
            Some(timetable.get_d_graph_update(self.n_tasks_queue))
        } else {
            None
        }
    }
}
