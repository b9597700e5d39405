//! Robot process: bids on batch announcements, executes contracts, and
//! watches its own timetable for tasks at risk of running late.

use std::collections::HashMap;
use std::time::Duration;

use clap::Parser;
use mrta::bid::BidResponse;
use mrta::bidder::Bidder;
use mrta::config::Config;
use mrta::ids::{RobotId, TaskId};
use mrta::messages::{Envelope, Header, Message};
use mrta::monitors::TimetableMonitor;
use mrta::schedule_monitor::{RecoveryStrategy, ScheduleMonitor};
use mrta::task::Task;
use mrta::timetable::Timetable;
use mrta::transport::{InProcessTransport, Transport};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "robot", about = "Runs a single robot's bidding and execution loop")]
struct Args {
    /// This robot's id, e.g. `robot_001`.
    #[arg(long)]
    robot_id: String,
    /// Path to the deployment config YAML.
    #[arg(long, default_value = "config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;
    let robot_id = RobotId::new(args.robot_id.clone());
    info!(robot_id = %robot_id, "robot starting");

    let transport = InProcessTransport::new(256);
    let mut inbox = transport.subscribe(robot_id.clone(), 256);

    let mut timetable = Timetable::new(robot_id.clone(), config.allocation_method);
    let bidder = Bidder::new();
    let mut timetable_monitor = TimetableMonitor::new(config.n_tasks_queue);
    let mut schedule_monitor = ScheduleMonitor::new(RecoveryStrategy::Reallocate);
    // Tasks this robot currently holds, needed to resolve the (current,
    // next) pair the schedule monitor checks every tick.
    let mut held_tasks: HashMap<TaskId, Task> = HashMap::new();

    let mut tick = tokio::time::interval(Duration::from_secs_f64(config.tick_interval_secs));
    loop {
        tokio::select! {
            Some(received) = inbox.group.recv() => {
                handle_group_message(&args.robot_id, &bidder, &timetable, &transport, received).await;
            }
            Some(received) = inbox.unicast.recv() => {
                handle_unicast_message(&bidder, &mut timetable, &mut held_tasks, received);
            }
            _ = tick.tick() => {
                if let Some(graph) = timetable_monitor.poll(&timetable) {
                    let update = envelope(&args.robot_id, Message::DGraphUpdate {
                        robot_id: robot_id.clone(),
                        dispatchable_graph: graph,
                        replace: false,
                    });
                    let _ = transport.publish(update).await;
                }
                check_schedule(&timetable, &held_tasks, &mut schedule_monitor);
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("received shutdown signal");
                break;
            }
        }
    }

    Ok(())
}

/// Runs the schedule monitor over the robot's current `(current, next)`
/// task pair, if it has at least two tasks queued (§4.1/§4.8).
fn check_schedule(timetable: &Timetable, held_tasks: &HashMap<TaskId, Task>, schedule_monitor: &mut ScheduleMonitor) {
    let Some(current_id) = timetable.order().first() else { return };
    let Some(next_id) = timetable.next_task(current_id) else { return };
    let (Some(current), Some(mut next)) = (held_tasks.get(current_id), held_tasks.get(next_id).cloned()) else {
        return;
    };
    if let Some(strategy) = schedule_monitor.check(timetable, current, &mut next) {
        warn!(task_id = %next.task_id(), ?strategy, "task at risk, applying recovery strategy");
    }
}

async fn handle_group_message(
    robot_id: &str,
    bidder: &Bidder,
    timetable: &Timetable,
    transport: &InProcessTransport,
    envelope_in: Envelope,
) {
    if let Message::TaskAnnouncement { round_id, tasks } = envelope_in.payload {
        for response in bidder.on_task_announcement(timetable, &tasks, round_id) {
            let reply = match response {
                BidResponse::Bid(bid) => Message::Bid(bid),
                BidResponse::NoBid(no_bid) => Message::NoBid(no_bid),
            };
            let out = envelope(robot_id, reply);
            if let Err(err) = transport.unicast(&RobotId::new("allocator"), out).await {
                warn!(%err, "failed to send bid response");
            }
        }
    }
}

fn handle_unicast_message(
    bidder: &Bidder,
    timetable: &mut Timetable,
    held_tasks: &mut HashMap<TaskId, Task>,
    envelope_in: Envelope,
) {
    match envelope_in.payload {
        Message::TaskContract { task, insertion_point, stn, dispatchable_graph, .. } => {
            let task_id = task.task_id().clone();
            match bidder.on_task_contract(timetable, &task, insertion_point, stn, dispatchable_graph) {
                Ok(()) => {
                    held_tasks.insert(task_id, task);
                }
                Err(err) => warn!(%task_id, %err, "failed to commit awarded task"),
            }
        }
        Message::Reallocate { task_id } => {
            held_tasks.remove(&task_id);
            if let Err(err) = bidder.on_reallocate(timetable, &task_id) {
                warn!(%task_id, %err, "failed to withdraw task for reallocation");
            }
        }
        _ => {}
    }
}

fn envelope(sender_id: &str, payload: Message) -> Envelope {
    Envelope {
        header: Header { sender_id: sender_id.to_string(), msg_id: mrta::generate_id(), timestamp: 0.0 },
        payload,
    }
}
