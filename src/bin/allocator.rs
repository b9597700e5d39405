//! Allocator process: announces the open task pool in batches, collects
//! bids, and elects one winner per round until the pool is cleared (§4.6).

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mrta::auctioneer::Auctioneer;
use mrta::config::Config;
use mrta::ids::{RobotId, RoundId, TaskId};
use mrta::messages::{Envelope, Header, Message};
use mrta::round::Round;
use mrta::store::{DashMapStore, Store};
use mrta::task::Task;
use mrta::transport::{InProcessTransport, Transport};
use tracing::{info, warn};

/// The peer id the allocator registers under so robots can unicast their
/// bids and no-bids back to it.
const ALLOCATOR_PEER_ID: &str = "allocator";

#[derive(Parser, Debug)]
#[command(name = "allocator", about = "Runs the multi-robot task auctioneer")]
struct Args {
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
    info!(robots = config.fleet.len(), method = ?config.allocation_method, "allocator starting");

    let store: Arc<dyn Store> = Arc::new(DashMapStore::new());
    let transport = Arc::new(InProcessTransport::new(256));
    let mut inbox = transport.subscribe(RobotId::new(ALLOCATOR_PEER_ID), 256);
    let fleet: Vec<RobotId> = config.fleet.iter().map(RobotId::new).collect();
    let mut auctioneer = Auctioneer::new(config.max_round_retries);
    let round_timeout = Duration::from_secs_f64(config.round_timeout_secs);

    let pool: Vec<Task> = store
        .keys("tasks")?
        .into_iter()
        .filter_map(|task_id| store.get::<Task>("tasks", &task_id).ok().flatten())
        .collect();

    run_auction_pool(&mut auctioneer, &transport, &mut inbox, pool, fleet, round_timeout, &store).await?;

    let mut tick = tokio::time::interval(Duration::from_secs_f64(config.tick_interval_secs));
    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                warn!("received shutdown signal");
                break;
            }
        }
    }

    Ok(())
}

/// Drives the pool through however many rounds it takes to award or abandon
/// every task: each round announces every still-open task, the auctioneer
/// awards at most one of them, and the rest (relaxed, starved, or simply
/// outbid this round) carry into the next round's announcement (§4.6).
async fn run_auction_pool(
    auctioneer: &mut Auctioneer,
    transport: &Arc<InProcessTransport>,
    inbox: &mut mrta::transport::Inbox,
    mut pool: Vec<Task>,
    robots: Vec<RobotId>,
    round_timeout: Duration,
    store: &Arc<dyn Store>,
) -> anyhow::Result<()> {
    while !pool.is_empty() {
        let round_id = RoundId::generate();
        let mut round = Round::open(round_id.clone(), pool.clone(), robots.clone());

        let tasks: Vec<Task> = round.tasks().cloned().collect();
        let announcement = envelope(Message::TaskAnnouncement { round_id: round_id.clone(), tasks });
        if transport.publish(announcement).await.is_err() {
            warn!(round_id = %round_id, "failed to publish task announcement");
        }

        let deadline = tokio::time::Instant::now() + round_timeout;
        while !round.is_complete() && tokio::time::Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, inbox.unicast.recv()).await {
                Ok(Some(received)) => match received.payload {
                    Message::Bid(bid) if bid.round_id == round_id => {
                        round.process_response(mrta::bid::BidResponse::Bid(bid));
                    }
                    Message::NoBid(no_bid) if no_bid.round_id == round_id => {
                        round.process_response(mrta::bid::BidResponse::NoBid(no_bid));
                    }
                    _ => {}
                },
                Ok(None) => break,
                Err(_) => break,
            }
        }

        let outcome = auctioneer.resolve(round);

        if let Some(election) = outcome.contract {
            let winner = election.winner;
            info!(task_id = %winner.task_id, robot_id = %winner.robot_id, "task awarded");
            let contract = envelope(Message::TaskContract {
                round_id: winner.round_id.clone(),
                task: election.task,
                robot_id: winner.robot_id.clone(),
                insertion_point: winner.insertion_point,
                stn: winner.stn.clone(),
                dispatchable_graph: winner.dispatchable_graph.clone(),
                alternative_start_time: winner.alternative_start_time,
            });
            transport.unicast(&winner.robot_id, contract).await?;
            store.put("contracts", winner.task_id.as_str(), &winner)?;
        }

        for task_id in &outcome.abandoned {
            warn!(%task_id, "task abandoned for this announcement cycle");
        }
        log_dropped(&pool, &outcome.carry_forward, &outcome.abandoned);

        pool = outcome.carry_forward;
    }

    Ok(())
}

/// Every task that didn't carry forward and wasn't explicitly abandoned was
/// the one awarded this round; nothing here is dropped silently, but it's
/// worth a trace line when the pool shrinks by more than the one award.
fn log_dropped(previous: &[Task], carry_forward: &[Task], abandoned: &[TaskId]) {
    if previous.len() > carry_forward.len() + abandoned.len() + 1 {
        warn!(
            previous = previous.len(),
            carried = carry_forward.len(),
            abandoned = abandoned.len(),
            "task pool shrank by more than one award this round"
        );
    }
}

fn envelope(payload: Message) -> Envelope {
    Envelope {
        header: Header {
            sender_id: ALLOCATOR_PEER_ID.to_string(),
            msg_id: mrta::generate_id(),
            timestamp: 0.0,
        },
        payload,
    }
}
