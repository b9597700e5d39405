//! Fleet-wide registry of per-robot [`Timetable`]s, keeping every robot's
//! zero timepoint mutually coherent (§4.10).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ids::{RobotId, TaskId};
use crate::stn::{AllocationMethod, StnDict};
use crate::task::Task;
use crate::timetable::{Timetable, TimetableError};

#[derive(Debug, Error)]
pub enum TimetableManagerError {
    #[error("robot {0} has no registered timetable")]
    UnknownRobot(RobotId),
    #[error("robot {0} already has a registered timetable")]
    DuplicateRobot(RobotId),
    #[error("failed to commit task {task_id} onto robot {robot_id}'s timetable: {source}")]
    InvalidAllocation {
        robot_id: RobotId,
        task_id: TaskId,
        #[source]
        source: TimetableError,
    },
}

/// Owns one [`Timetable`] per robot in the fleet. The manager itself carries
/// no temporal state beyond routing; each robot's STN is self-contained and
/// relative to its own zero timepoint, matching the original design's choice
/// to keep ztp per-robot rather than a single fleet-wide clock.
#[derive(Debug, Default)]
pub struct TimetableManager {
    timetables: HashMap<RobotId, Timetable>,
}

impl TimetableManager {
    pub fn new() -> Self {
        Self { timetables: HashMap::new() }
    }

    pub fn register_robot(
        &mut self,
        robot_id: RobotId,
        allocation_method: AllocationMethod,
    ) -> Result<(), TimetableManagerError> {
        if self.timetables.contains_key(&robot_id) {
            return Err(TimetableManagerError::DuplicateRobot(robot_id));
        }
        self.timetables.insert(robot_id.clone(), Timetable::new(robot_id, allocation_method));
        Ok(())
    }

    pub fn remove_robot(&mut self, robot_id: &RobotId) {
        self.timetables.remove(robot_id);
    }

    pub fn timetable(&self, robot_id: &RobotId) -> Result<&Timetable, TimetableManagerError> {
        self.timetables
            .get(robot_id)
            .ok_or_else(|| TimetableManagerError::UnknownRobot(robot_id.clone()))
    }

    pub fn timetable_mut(&mut self, robot_id: &RobotId) -> Result<&mut Timetable, TimetableManagerError> {
        self.timetables
            .get_mut(robot_id)
            .ok_or_else(|| TimetableManagerError::UnknownRobot(robot_id.clone()))
    }

    pub fn robots(&self) -> impl Iterator<Item = &RobotId> {
        self.timetables.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RobotId, &Timetable)> {
        self.timetables.iter()
    }

    pub fn replace_timetable(&mut self, robot_id: RobotId, timetable: Timetable) {
        self.timetables.insert(robot_id, timetable);
    }

    /// An arbitrary registered timetable's zero timepoint, or `None` if no
    /// robot is registered yet. Every registered timetable is kept on the
    /// same `ztp` by [`Self::set_ztp`], so any one of them answers for the
    /// fleet (§4.10).
    pub fn ztp(&self) -> Option<DateTime<Utc>> {
        self.timetables.values().next().map(Timetable::ztp)
    }

    /// Pushes a new zero timepoint onto every registered timetable, keeping
    /// the fleet mutually coherent (§4.10).
    pub fn set_ztp(&mut self, ztp: DateTime<Utc>) {
        for timetable in self.timetables.values_mut() {
            timetable.set_ztp(ztp);
        }
    }

    /// Commits an awarded task onto `robot_id`'s timetable by adopting the
    /// winning bid's snapshot directly (§4.4), rolling back nothing on
    /// failure since [`Timetable::adopt_contract`] never partially applies.
    pub fn update_timetable(
        &mut self,
        robot_id: &RobotId,
        insertion_point: usize,
        task: &Task,
        stn: StnDict,
        dispatchable_graph: StnDict,
    ) -> Result<(), TimetableManagerError> {
        let timetable = self.timetable_mut(robot_id)?;
        timetable
            .adopt_contract(task.task_id().clone(), insertion_point, stn, dispatchable_graph)
            .map_err(|source| TimetableManagerError::InvalidAllocation {
                robot_id: robot_id.clone(),
                task_id: task.task_id().clone(),
                source,
            })
    }
}
