//! `parley simulate`: the driver loop.
//!
//! Each tick advances the simulated clock, proposes conversations between
//! idle agents who share a scene, and calls the scheduler's `update`.
//! Events are printed as they arrive on the bus.

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{TimeDelta, Utc};
use console::style;
use parley_core::conversation::{ConversationRegistry, TickReport};
use parley_core::roster::AgentRoster;
use parley_types::agent::AgentId;
use parley_types::event::ConversationEvent;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::SimulateArgs;
use super::render::render_event;
use crate::state::AppState;

/// Proposals stop while this many conversations are waiting.
const MAX_QUEUED: usize = 3;

#[derive(Debug, Default)]
struct RunStats {
    started: usize,
    completed: usize,
    failed: usize,
    timed_out: usize,
    cleared_for_night: usize,
    dropped_for_bedtime: usize,
}

impl RunStats {
    fn absorb(&mut self, report: &TickReport) {
        self.started += usize::from(report.started.is_some());
        self.completed += usize::from(report.completed.is_some());
        self.failed += usize::from(report.failed.is_some());
        self.timed_out += report.timed_out.len();
        self.cleared_for_night += report.cleared_for_night;
        self.dropped_for_bedtime += usize::from(report.dropped_for_bedtime.is_some());
    }
}

pub async fn run(config_path: &Path, args: SimulateArgs, json: bool) -> anyhow::Result<()> {
    let state = AppState::init(config_path, &args.agents).await?;
    let mut scheduler = state.scheduler(config_path).await?;

    let stop = CancellationToken::new();
    let printer = tokio::spawn(print_events(state.bus.subscribe(), stop.clone(), json));

    let mut interval = tokio::time::interval(Duration::from_millis(args.tick_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let tick_secs = args.tick_ms as f64 / 1000.0;
    let pair_window = TimeDelta::seconds(args.pair_cooldown_secs);
    let mut stats = RunStats::default();

    for _ in 0..args.ticks {
        interval.tick().await;
        state.world.update(|w| w.advance_minutes(args.minutes_per_tick));
        state.roster.tick_cooldowns(tick_secs);

        if scheduler.queue_len() < MAX_QUEUED {
            let proposals = propose_pairs(&state.roster, scheduler.registry(), pair_window);
            for (a, b) in proposals {
                if let Err(rejection) = scheduler.request(&a, &b, Instant::now()) {
                    debug!(%a, %b, %rejection, "proposal rejected");
                }
            }
        }

        let hour = state.world.snapshot().hour;
        stats.absorb(&scheduler.update(Instant::now(), hour));
    }

    // Let the conversation in progress finish so its effects land.
    scheduler.join_active().await;
    stop.cancel();
    printer.await?;

    if json {
        let summary = serde_json::json!({
            "started": stats.started,
            "completed": stats.completed,
            "failed": stats.failed,
            "timed_out": stats.timed_out,
            "cleared_for_night": stats.cleared_for_night,
            "dropped_for_bedtime": stats.dropped_for_bedtime,
            "health": state.gate.health().status(),
        });
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        let health = state.gate.health().status();
        println!();
        println!("  {}", style("── Run summary ──").dim());
        println!("  Started:    {}", style(stats.started).bold());
        println!("  Completed:  {}", style(stats.completed).green());
        if stats.failed + stats.timed_out > 0 {
            println!("  Failed:     {}", style(stats.failed).red());
            println!("  Timed out:  {}", style(stats.timed_out).yellow());
        }
        println!("  Night/bed:  {}", stats.cleared_for_night + stats.dropped_for_bedtime);
        println!("  Generator:  {}", serde_json::to_string(&health)?);
        println!();
    }
    Ok(())
}

/// Idle, co-located pairs in id order, each agent used at most once.
/// Pairs that talked within `window` are skipped. Admission proper is
/// left to the registry.
fn propose_pairs(
    roster: &AgentRoster,
    registry: &ConversationRegistry,
    window: TimeDelta,
) -> Vec<(AgentId, AgentId)> {
    let now = Utc::now();
    let idle: Vec<AgentId> = roster
        .ids()
        .into_iter()
        .filter(|id| !roster.is_chatting(id))
        .collect();

    let mut taken: Vec<&AgentId> = Vec::new();
    let mut pairs = Vec::new();
    for (i, a) in idle.iter().enumerate() {
        if taken.contains(&a) {
            continue;
        }
        let partner = idle[i + 1..].iter().find(|b| {
            !taken.contains(b)
                && roster.co_located(a, b)
                && !registry.recently_chatted(a, b, now, window)
                && !registry.recently_chatted(b, a, now, window)
        });
        if let Some(b) = partner {
            taken.push(a);
            taken.push(b);
            pairs.push((a.clone(), b.clone()));
        }
    }
    pairs
}

async fn print_events(mut rx: Receiver<ConversationEvent>, stop: CancellationToken, json: bool) {
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(event) => print_event(&event, json),
                Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "event printer lagged"),
                Err(RecvError::Closed) => return,
            },
            () = stop.cancelled() => {
                while let Ok(event) = rx.try_recv() {
                    print_event(&event, json);
                }
                return;
            }
        }
    }
}

fn print_event(event: &ConversationEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "failed to serialize event"),
        }
    } else {
        println!("{}", render_event(event));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parley_core::world::{Switches, WorldSnapshot};
    use parley_types::agent::{Agent, ConversationState};
    use parley_types::config::ConversationPolicy;

    use super::*;

    fn setup() -> (Arc<AgentRoster>, ConversationRegistry) {
        let roster = Arc::new(AgentRoster::from_agents([
            Agent::new("ada", "Ada", "cabin"),
            Agent::new("bo", "Bo", "cabin"),
            Agent::new("cy", "Cy", "yard"),
            Agent::new("dan", "Dan", "cabin"),
            Agent::new("eve", "Eve", "cabin"),
        ]));
        let world = WorldSnapshot {
            hour: 10.0,
            ..WorldSnapshot::default()
        };
        let registry = ConversationRegistry::new(
            Arc::clone(&roster),
            Arc::new(world),
            Arc::new(Switches::default()),
            ConversationPolicy::default(),
        );
        (roster, registry)
    }

    #[test]
    fn pairs_idle_neighbours_once_each() {
        let (roster, registry) = setup();
        let pairs = propose_pairs(&roster, &registry, TimeDelta::seconds(120));
        assert_eq!(
            pairs,
            vec![
                (AgentId::from("ada"), AgentId::from("bo")),
                (AgentId::from("dan"), AgentId::from("eve")),
            ]
        );
    }

    #[test]
    fn skips_busy_and_recent_partners() {
        let (roster, registry) = setup();
        roster.update(&AgentId::from("bo"), |a| a.state = ConversationState::Chatting);
        roster.update(&AgentId::from("ada"), |a| {
            a.chat_cooldowns.insert(AgentId::from("dan"), Utc::now());
        });

        let pairs = propose_pairs(&roster, &registry, TimeDelta::seconds(120));

        assert_eq!(pairs, vec![(AgentId::from("ada"), AgentId::from("eve"))]);
    }

    #[test]
    fn stats_accumulate_reports() {
        let mut stats = RunStats::default();
        stats.absorb(&TickReport {
            timed_out: vec![Default::default(), Default::default()],
            cleared_for_night: 1,
            ..TickReport::default()
        });
        assert_eq!(stats.timed_out, 2);
        assert_eq!(stats.cleared_for_night, 1);
        assert_eq!(stats.started, 0);
    }
}
