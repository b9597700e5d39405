//! End-to-end scenarios from the allocation protocol's testable properties:
//! drives `Bidder`, `Round`, and `Auctioneer` together the way the
//! allocator and robot binaries do, without the transport layer.

use mrta::auctioneer::Auctioneer;
use mrta::bid::BidResponse;
use mrta::bidder::Bidder;
use mrta::ids::{RobotId, RoundId, TaskId};
use mrta::round::Round;
use mrta::stn::AllocationMethod;
use mrta::task::Task;
use mrta::timetable::Timetable;

fn fresh_timetable(robot: &str) -> Timetable {
    Timetable::new(RobotId::new(robot), AllocationMethod::Tessi)
}

/// Runs one round of the protocol over a batch of tasks: every robot bids
/// its best quote across the whole batch (plus a no-bid for anything it
/// can't serve), then the round is ready to elect its single winner.
fn run_round(tasks: &[Task], robots: &mut [(&RobotId, &Timetable)]) -> Round {
    let bidder = Bidder::new();
    let round_id = RoundId::generate();
    let mut round = Round::open(
        round_id.clone(),
        tasks.to_vec(),
        robots.iter().map(|(id, _)| (*id).clone()).collect(),
    );
    for (_, timetable) in robots.iter() {
        for response in bidder.on_task_announcement(timetable, tasks, round_id.clone()) {
            round.process_response(response);
        }
    }
    round
}

#[test]
fn single_task_single_robot() {
    let task = Task::new(TaskId::new("T1"), "A", "B", 10.0, 30.0);
    let timetable = fresh_timetable("robot_001");
    let robot_id = timetable.robot_id().clone();

    let round = run_round(std::slice::from_ref(&task), &mut [(&robot_id, &timetable)]);
    assert_eq!(round.bids().count(), 1);

    let mut auctioneer = Auctioneer::new(1);
    let outcome = auctioneer.resolve(round);
    let election = outcome.contract.expect("expected a contract");
    assert_eq!(election.winner.task_id, TaskId::new("T1"));
    assert_eq!(election.winner.robot_id, RobotId::new("robot_001"));

    let bidder = Bidder::new();
    let mut timetable = timetable;
    bidder
        .on_task_contract(
            &mut timetable,
            &task,
            election.winner.insertion_point,
            election.winner.stn.clone(),
            election.winner.dispatchable_graph.clone(),
        )
        .unwrap();

    assert_eq!(timetable.len(), 1);
    // ztp + start + pickup + delivery.
    assert_eq!(timetable.stn().node_count(), 4);
    let start = timetable.start_time(&TaskId::new("T1"), true).unwrap();
    assert!((10.0..=30.0).contains(&start));
}

/// A genuine batch round: both tasks are announced together, each robot
/// bids its best quote across the two, and the auctioneer's single-award
/// policy elects exactly one of them this round — the other carries
/// forward, gets re-announced, and is picked up by the robot left over.
#[test]
fn two_robots_two_non_overlapping_tasks() {
    let t1 = Task::new(TaskId::new("T1"), "Dock-A", "Dock-B", 0.0, 100.0);
    let t2 = Task::new(TaskId::new("T2"), "Dock-C", "Dock-D", 0.0, 100.0);

    let mut tt1 = fresh_timetable("robot_001");
    let mut tt2 = fresh_timetable("robot_002");
    let bidder = Bidder::new();

    let r1 = tt1.robot_id().clone();
    let r2 = tt2.robot_id().clone();

    let mut auctioneer = Auctioneer::new(1);
    let mut pool = vec![t1, t2];
    let mut awarded = Vec::new();

    while !pool.is_empty() {
        let round = run_round(&pool, &mut [(&r1, &tt1), (&r2, &tt2)]);
        let outcome = auctioneer.resolve(round);
        let election = outcome.contract.expect("expected a contract every round in this scenario");
        let winner = election.winner.clone();

        let timetable = if winner.robot_id == r1 { &mut tt1 } else { &mut tt2 };
        bidder
            .on_task_contract(
                timetable,
                &election.task,
                winner.insertion_point,
                winner.stn.clone(),
                winner.dispatchable_graph.clone(),
            )
            .unwrap();
        awarded.push(winner.robot_id.clone());

        pool = outcome.carry_forward;
    }

    assert_eq!(awarded.len(), 2);
    assert_ne!(awarded[0], awarded[1], "each robot should take one task when both are equally cheap for it");
}

#[test]
fn tie_on_cost_breaks_toward_smaller_robot_suffix() {
    let task = Task::new(TaskId::new("T1"), "A", "B", 0.0, 100.0);
    let tt1 = fresh_timetable("robot_001");
    let tt2 = fresh_timetable("robot_002");
    let r1 = tt1.robot_id().clone();
    let r2 = tt2.robot_id().clone();

    let round = run_round(std::slice::from_ref(&task), &mut [(&r1, &tt1), (&r2, &tt2)]);
    let mut auctioneer = Auctioneer::new(1);
    let outcome = auctioneer.resolve(round);
    let election = outcome.contract.expect("expected a contract");
    assert_eq!(election.winner.robot_id, RobotId::new("robot_001"));
}

#[test]
fn infeasible_insertion_yields_no_allocation() {
    // earliest_start > latest_start: no insertion point can ever satisfy it.
    let task = Task::new(TaskId::new("T1"), "A", "B", 100.0, 50.0);
    let timetable = fresh_timetable("robot_001");
    let robot_id = timetable.robot_id().clone();

    let round = run_round(std::slice::from_ref(&task), &mut [(&robot_id, &timetable)]);
    assert_eq!(round.bids().count(), 0);

    let mut auctioneer = Auctioneer::new(0);
    let outcome = auctioneer.resolve(round);
    assert_eq!(outcome.abandoned, vec![TaskId::new("T1")]);
}

#[test]
fn alternative_timeslot_relaxation_eventually_yields_a_contract() {
    // Infeasible on the first pass; relaxing the window lets the robot
    // propose an alternative start time outside the original bound.
    let task = Task::new(TaskId::new("T1"), "A", "B", 100.0, 50.0);
    let timetable = fresh_timetable("robot_001");
    let robot_id = timetable.robot_id().clone();

    let round = run_round(std::slice::from_ref(&task), &mut [(&robot_id, &timetable)]);
    let mut auctioneer = Auctioneer::new(1);
    let outcome = auctioneer.resolve(round);
    assert!(outcome.contract.is_none());
    let relaxed = outcome.carry_forward.into_iter().next().expect("expected a relaxed retry");
    assert!(!relaxed.hard_window);

    let round = run_round(std::slice::from_ref(&relaxed), &mut [(&robot_id, &timetable)]);
    assert_eq!(round.bids().count(), 1);
    assert!(round.bids().next().unwrap().alternative_start_time.is_some());

    let outcome = auctioneer.resolve(round);
    let election = outcome.contract.expect("expected the relaxed retry to produce a contract");
    assert!(election.winner.alternative_start_time.is_some());
}

#[test]
fn delay_recovery_removes_and_reallocates_the_next_task() {
    use mrta::schedule_monitor::{RecoveryStrategy, ScheduleMonitor};

    let mut timetable = fresh_timetable("robot_001");
    let bidder = Bidder::new();

    let t1 = Task::new(TaskId::new("T1"), "A", "B", 0.0, 20.0);
    let trial = timetable.try_insert(&t1, 1, mrta::bidding_rule::SENTINEL_TRAVEL_TIME).unwrap();
    timetable.commit_insertion(t1.task_id().clone(), 1, trial);

    let mut t2 = Task::new(TaskId::new("T2"), "A", "B", 0.0, 5.0);
    let trial = timetable.try_insert(&t2, 2, mrta::bidding_rule::SENTINEL_TRAVEL_TIME).unwrap();
    timetable.commit_insertion(t2.task_id().clone(), 2, trial);

    let mut monitor = ScheduleMonitor::new(RecoveryStrategy::Reallocate);
    let strategy = monitor.check(&timetable, &t1, &mut t2);
    assert_eq!(strategy, Some(RecoveryStrategy::Reallocate));

    bidder.on_reallocate(&mut timetable, &TaskId::new("T2")).unwrap();
    assert!(!timetable.order().contains(&TaskId::new("T2")));

    let robot_id = timetable.robot_id().clone();
    let round = run_round(std::slice::from_ref(&t2), &mut [(&robot_id, &timetable)]);
    let mut auctioneer = Auctioneer::new(1);
    let outcome = auctioneer.resolve(round);
    let election = outcome.contract.expect("expected T2 to be re-awarded");
    assert_eq!(election.winner.task_id, TaskId::new("T2"));
}
