//! Closes a batch round and decides what happens to every task in it,
//! tracking per-task retry counts across however many rounds
//! alternative-timeslot escalation needs (§4.6).

use std::collections::HashMap;

use crate::ids::TaskId;
use crate::round::{ElectionResult, Round, RoundState};
use crate::task::Task;

/// What the caller should do after a round closes: at most one task was
/// awarded (single-award policy), the rest either carry into the next
/// round's announcement or are abandoned for this cycle.
pub struct RoundOutcome {
    pub contract: Option<ElectionResult>,
    pub carry_forward: Vec<Task>,
    pub abandoned: Vec<TaskId>,
}

/// Stateful per-task retry tracker: how many empty rounds a task has been
/// through before it's dropped for this announcement cycle.
pub struct Auctioneer {
    max_retries: u32,
    attempts: HashMap<TaskId, u32>,
}

impl Auctioneer {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries, attempts: HashMap::new() }
    }

    /// Closes `round`, elects its single winner if any, and splits every
    /// other task into carry-forward or abandoned based on this task's own
    /// retry count so far.
    pub fn resolve(&mut self, mut round: Round) -> RoundOutcome {
        let (awarded, contract) = match round.close() {
            RoundState::Elected => {
                let election = round.elect_winner().expect("ELECTED state implies a winning bid");
                let awarded = election.task.task_id().clone();
                self.attempts.remove(&awarded);
                round.finish();
                (Some(awarded), Some(election))
            }
            _ => (None, None),
        };

        let (relaxed, starved, passthrough) = round.carry_forward(awarded.as_ref());

        let mut carry_forward = Vec::new();
        let mut abandoned = Vec::new();
        for task in relaxed.into_iter().chain(starved) {
            let task_id = task.task_id().clone();
            let attempt = self.attempts.entry(task_id.clone()).or_insert(0);
            if *attempt < self.max_retries {
                *attempt += 1;
                carry_forward.push(task);
            } else {
                self.attempts.remove(&task_id);
                abandoned.push(task_id);
            }
        }
        carry_forward.extend(passthrough);

        RoundOutcome { contract, carry_forward, abandoned }
    }
}

impl Default for Auctioneer {
    fn default() -> Self {
        Self::new(1)
    }
}
