//! Wire messages exchanged over the "TASK-ALLOCATION" group and per-robot
//! unicast channels (§6). Every message is `{header, payload}`, tagged by
//! its `msg_type` so a receiver can dispatch on [`Message`] alone.

use serde::{Deserialize, Serialize};

use crate::bid::{Bid, NoBid};
use crate::ids::{RobotId, RoundId, TaskId};
use crate::stn::StnDict;
use crate::task::Task;

/// Common envelope fields carried by every message, mirroring the original
/// message header (sender, timestamp, message id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub sender_id: String,
    pub msg_id: String,
    /// Seconds since the Unix epoch; populated by the transport layer at
    /// send time, not computed here (this crate never calls a clock itself
    /// so that message construction stays deterministic and testable).
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub header: Header,
    #[serde(flatten)]
    pub payload: Message,
}

/// Every message the allocator and robots exchange, tagged by `msg_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "msg_type", content = "payload")]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum Message {
    /// Auctioneer -> group: the open batch of tasks this round (§4.6):
    /// robots bid on the whole batch, but the auctioneer still elects and
    /// awards exactly one task per round (single-award policy).
    TaskAnnouncement {
        round_id: RoundId,
        tasks: Vec<Task>,
    },
    /// Robot -> auctioneer: cost quote for an announced task.
    Bid(Bid),
    /// Robot -> auctioneer: explicit refusal to bid.
    NoBid(NoBid),
    /// Auctioneer -> winning robot: the task is awarded. Carries the same
    /// `stn`/`dispatchable_graph` snapshot the winning bid quoted, so the
    /// robot adopts it outright instead of recomputing the insertion (§4.4).
    TaskContract {
        round_id: RoundId,
        task: Task,
        robot_id: RobotId,
        insertion_point: usize,
        stn: StnDict,
        dispatchable_graph: StnDict,
        alternative_start_time: Option<f64>,
    },
    /// Robot -> auctioneer: contract received and committed locally.
    TaskContractAcknowledgment {
        round_id: RoundId,
        task_id: TaskId,
        robot_id: RobotId,
    },
    /// Robot -> fleet: this robot's dispatchable graph changed and every
    /// peer should refresh its shadow copy (§4.11).
    DGraphUpdate {
        robot_id: RobotId,
        dispatchable_graph: StnDict,
        /// `true` replaces the receiver's shadow graph outright; `false`
        /// merges edge-by-edge, matching the original update's two modes.
        replace: bool,
    },
    /// Robot -> fleet: a task's status changed (dispatched, completed, ...).
    TaskStatusUpdate {
        task_id: TaskId,
        robot_id: RobotId,
        status: crate::task::TaskStatus,
    },
    /// Allocator -> robot: withdraw and re-allocate this task elsewhere.
    Reallocate {
        task_id: TaskId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RoundId;

    #[test]
    fn task_announcement_round_trips_through_json() {
        let msg = Message::TaskAnnouncement {
            round_id: RoundId::new("R1"),
            tasks: vec![Task::new(TaskId::new("T1"), "A", "B", 10.0, 30.0)],
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        match back {
            Message::TaskAnnouncement { round_id, .. } => assert_eq!(round_id, RoundId::new("R1")),
            _ => panic!("wrong variant"),
        }
    }
}
