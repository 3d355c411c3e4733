//! Single-active conversation scheduler.
//!
//! Conversations wait in a FIFO queue. At most one is ACTIVE at a time; it
//! stays at the head of the queue while its `TurnEngine` task runs. A
//! driver calls [`ConversationScheduler::update`] once per tick, which
//! reaps a finished task, enforces liveness, and promotes the next request.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use parley_types::agent::{AgentId, ConversationState, MemoryEntry, MemoryKind};
use parley_types::config::ConversationPolicy;
use parley_types::conversation::{
    ConversationId, ConversationOutcome, ConversationRequest, ConversationStatus, TranscriptLine,
};
use parley_types::error::ConversationError;
use parley_types::event::{Channel, ConversationEvent};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use super::log::{TranscriptEntry, TranscriptLog};
use super::registry::{ConversationRegistry, Rejection};
use super::turn::TurnEngine;
use crate::event::EventBus;
use crate::roster::AgentRoster;
use crate::sentiment::{SentimentScorer, apply_effects};
use crate::world::WorldContext;

type TaskResult = Result<ConversationOutcome, ConversationError>;

struct ActiveConversation {
    id: ConversationId,
    handle: JoinHandle<TaskResult>,
    cancel: CancellationToken,
}

/// What one `update` call did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub completed: Option<ConversationId>,
    pub failed: Option<ConversationId>,
    pub timed_out: Vec<ConversationId>,
    pub cleared_for_night: usize,
    pub dropped_for_bedtime: Option<ConversationId>,
    pub started: Option<ConversationId>,
}

pub struct ConversationScheduler {
    registry: ConversationRegistry,
    engine: Arc<TurnEngine>,
    roster: Arc<AgentRoster>,
    world: Arc<dyn WorldContext>,
    bus: EventBus,
    scorer: Arc<dyn SentimentScorer>,
    log: Option<Arc<dyn TranscriptLog>>,
    policy: ConversationPolicy,
    queue: VecDeque<ConversationRequest>,
    active: Option<ActiveConversation>,
}

impl ConversationScheduler {
    pub fn new(
        registry: ConversationRegistry,
        engine: TurnEngine,
        roster: Arc<AgentRoster>,
        world: Arc<dyn WorldContext>,
        bus: EventBus,
        scorer: Arc<dyn SentimentScorer>,
    ) -> Self {
        let policy = registry.policy().clone();
        Self {
            registry,
            engine: Arc::new(engine),
            roster,
            world,
            bus,
            scorer,
            log: None,
            policy,
            queue: VecDeque::new(),
            active: None,
        }
    }

    pub fn with_transcript_log(mut self, log: Arc<dyn TranscriptLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn registry(&self) -> &ConversationRegistry {
        &self.registry
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn active_id(&self) -> Option<ConversationId> {
        self.active.as_ref().map(|a| a.id)
    }

    /// No active conversation and nothing queued.
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.queue.is_empty()
    }

    /// Admit and enqueue a conversation between `a` and `b`.
    pub fn request(
        &mut self,
        a: &AgentId,
        b: &AgentId,
        now: Instant,
    ) -> Result<ConversationId, Rejection> {
        let request = self.registry.try_start(a, b, now)?;
        let id = request.id;
        if self.enqueue(request) {
            Ok(id)
        } else {
            // Only release agents the queue does not already own.
            for agent in [a, b] {
                if !self.queue.iter().any(|r| r.involves(agent)) {
                    self.roster.release(agent);
                }
            }
            Err(Rejection::AlreadyQueued)
        }
    }

    /// Append to the tail. Refused if either participant is already queued.
    pub fn enqueue(&mut self, request: ConversationRequest) -> bool {
        if self.queue.iter().any(|r| r.overlaps(&request)) {
            debug!(conversation_id = %request.id, "participant already queued");
            return false;
        }
        self.bus.publish(ConversationEvent::ConversationQueued {
            conversation_id: request.id,
            participant_a: request.participant_a.clone(),
            participant_b: request.participant_b.clone(),
            queue_len: self.queue.len() + 1,
        });
        self.queue.push_back(request);
        true
    }

    /// One scheduler tick: reap, timeout sweep, night sweep, promote.
    pub fn update(&mut self, now: Instant, sim_hour: f64) -> TickReport {
        let mut report = TickReport::default();
        self.reap(&mut report);
        self.sweep_timeouts(now, &mut report);
        self.sweep_night(sim_hour, &mut report);
        self.promote(sim_hour, &mut report);
        report
    }

    /// Await the active conversation, then reap it. Used by drivers that
    /// drain the queue and by tests.
    pub async fn join_active(&mut self) -> Option<ConversationId> {
        let active = self.active.take()?;
        let id = active.id;
        let result = active.handle.await;
        let mut report = TickReport::default();
        self.settle(id, result, &mut report);
        Some(id)
    }

    // ------------------------------------------------------------------
    // Reap
    // ------------------------------------------------------------------

    fn reap(&mut self, report: &mut TickReport) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        if !active.handle.is_finished() {
            self.active = Some(active);
            return;
        }
        match (&mut active.handle).now_or_never() {
            Some(result) => self.settle(active.id, result, report),
            None => self.active = Some(active),
        }
    }

    fn settle(
        &mut self,
        id: ConversationId,
        result: Result<TaskResult, JoinError>,
        report: &mut TickReport,
    ) {
        match result {
            Ok(Ok(outcome)) => {
                self.complete(outcome);
                report.completed = Some(id);
            }
            Ok(Err(e)) => {
                self.fail(id, &e);
                report.failed = Some(id);
            }
            Err(join_error) => {
                self.fail(id, &ConversationError::TaskFailed(join_error.to_string()));
                report.failed = Some(id);
            }
        }
    }

    fn complete(&mut self, outcome: ConversationOutcome) {
        let a = &outcome.participant_a;
        let b = &outcome.participant_b;
        let day = self.world.day();
        let hour = self.world.hour();
        let scorer = Arc::clone(&self.scorer);
        let transcript = &outcome.transcript;

        let settled = self.roster.update_pair(a, b, |agent_a, agent_b| {
            agent_a.speaking = None;
            agent_b.speaking = None;

            let effects = if transcript.is_empty() {
                None
            } else {
                let (name_a, name_b) = (agent_a.name.clone(), agent_b.name.clone());
                agent_a.add_memory(chat_memory(name_b, transcript, day, hour));
                agent_b.add_memory(chat_memory(name_a, transcript, day, hour));
                Some(apply_effects(transcript, agent_a, agent_b, scorer.as_ref()))
            };

            for agent in [&mut *agent_a, &mut *agent_b] {
                agent.state = ConversationState::Idle;
                agent.state_desc.clear();
            }
            (effects, [agent_a.name.clone(), agent_b.name.clone()])
        });

        let Some((effects, names)) = settled else {
            warn!(conversation_id = %outcome.id, "participant missing at completion, releasing");
            self.roster.release(a);
            self.roster.release(b);
            self.remove(outcome.id);
            return;
        };

        if let Some(report) = effects {
            info!(
                conversation_id = %outcome.id,
                sentiment = %report.sentiment,
                net_score = report.score.net_score,
                "conversation effects applied"
            );
            self.bus.publish(ConversationEvent::EffectApplied {
                conversation_id: outcome.id,
                sentiment: report.sentiment,
                net_score: report.score.net_score,
                notes: report.notes,
            });
        }

        self.bus.publish(ConversationEvent::ConversationEnded {
            conversation_id: outcome.id,
            channel: Channel::Agents,
            participants: vec![a.clone(), b.clone()],
            line_count: outcome.transcript.len(),
            end_reason: Some(outcome.end_reason),
        });

        if let Some(log) = &self.log
            && !outcome.transcript.is_empty()
        {
            let log = Arc::clone(log);
            let entry = TranscriptEntry {
                conversation_id: outcome.id,
                day,
                hour,
                participants: names,
                lines: outcome.transcript.clone(),
            };
            tokio::spawn(async move {
                if let Err(e) = log.append(&entry).await {
                    warn!(conversation_id = %entry.conversation_id, error = %e, "failed to persist transcript");
                }
            });
        }

        self.remove(outcome.id);
        info!(
            conversation_id = %outcome.id,
            lines = outcome.transcript.len(),
            reason = %outcome.end_reason,
            "conversation completed"
        );
    }

    fn fail(&mut self, id: ConversationId, error: &ConversationError) {
        let participants = match self.remove(id) {
            Some(request) => vec![request.participant_a, request.participant_b],
            None => Vec::new(),
        };
        for agent in &participants {
            self.roster.release(agent);
        }
        warn!(conversation_id = %id, error = %error, "conversation failed, participants released");
        self.bus.publish(ConversationEvent::ConversationFailed {
            conversation_id: id,
            participants,
            error: error.to_string(),
        });
    }

    fn remove(&mut self, id: ConversationId) -> Option<ConversationRequest> {
        let index = self.queue.iter().position(|r| r.id == id)?;
        self.queue.remove(index)
    }

    // ------------------------------------------------------------------
    // Liveness
    // ------------------------------------------------------------------

    fn sweep_timeouts(&mut self, now: Instant, report: &mut TickReport) {
        let timeout = self.policy.timeout;
        let (expired, kept): (Vec<_>, Vec<_>) = self
            .queue
            .drain(..)
            .partition(|r| now.saturating_duration_since(r.started_at) > timeout);
        self.queue = kept.into();

        for request in expired {
            let elapsed = now.saturating_duration_since(request.started_at);
            let was_active = self.active.as_ref().is_some_and(|a| a.id == request.id);
            if was_active && let Some(active) = self.active.take() {
                // The task keeps running until its in-flight call returns,
                // then observes the token and exits without touching state.
                active.cancel.cancel();
            }
            self.release_request(&request);
            warn!(
                conversation_id = %request.id,
                was_active,
                elapsed_secs = elapsed.as_secs(),
                "conversation timed out"
            );
            self.bus.publish(ConversationEvent::ConversationTimedOut {
                conversation_id: request.id,
                participants: vec![request.participant_a, request.participant_b],
                was_active,
                elapsed_secs: elapsed.as_secs(),
            });
            report.timed_out.push(request.id);
        }
    }

    fn sweep_night(&mut self, sim_hour: f64, report: &mut TickReport) {
        if !self.policy.in_deep_sleep(sim_hour) {
            return;
        }
        let (cleared, kept): (Vec<_>, Vec<_>) = self
            .queue
            .drain(..)
            .partition(|r| r.status != ConversationStatus::Active);
        self.queue = kept.into();
        if cleared.is_empty() {
            return;
        }
        for request in &cleared {
            self.release_request(request);
        }
        info!(removed = cleared.len(), hour = sim_hour, "cleared queued conversations for the night");
        self.bus.publish(ConversationEvent::QueueClearedForNight {
            removed: cleared.len(),
        });
        report.cleared_for_night = cleared.len();
    }

    fn release_request(&self, request: &ConversationRequest) {
        self.roster.release(&request.participant_a);
        self.roster.release(&request.participant_b);
    }

    // ------------------------------------------------------------------
    // Promote
    // ------------------------------------------------------------------

    fn promote(&mut self, sim_hour: f64, report: &mut TickReport) {
        if self.active.is_some() {
            return;
        }
        let Some(head) = self.queue.front() else {
            return;
        };

        let past_bedtime = head.participants().into_iter().any(|id| {
            self.roster
                .read(id, |agent| agent.is_bedtime(sim_hour))
                .unwrap_or(true)
        });
        if past_bedtime {
            if let Some(request) = self.queue.pop_front() {
                self.release_request(&request);
                info!(conversation_id = %request.id, hour = sim_hour, "dropping conversation past bedtime");
                report.dropped_for_bedtime = Some(request.id);
            }
            return;
        }

        let Some(head) = self.queue.front_mut() else {
            return;
        };
        head.status = ConversationStatus::Active;
        let request = head.clone();
        let id = request.id;
        let participants = vec![request.participant_a.clone(), request.participant_b.clone()];

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let engine = Arc::clone(&self.engine);
        let span = info_span!(
            "conversation",
            conversation_id = %id,
            a = %request.participant_a,
            b = %request.participant_b,
        );
        let handle = tokio::spawn(async move { engine.run(request, token).await }.instrument(span));

        self.bus.publish(ConversationEvent::ConversationStarted {
            conversation_id: id,
            channel: Channel::Agents,
            participants,
        });
        info!(conversation_id = %id, queued = self.queue.len() - 1, "conversation started");
        self.active = Some(ActiveConversation { id, handle, cancel });
        report.started = Some(id);
    }
}

fn chat_memory(partner: String, transcript: &[TranscriptLine], day: u32, hour: f64) -> MemoryEntry {
    MemoryEntry {
        kind: MemoryKind::Chat,
        summary: format!("Talked with {partner}"),
        partner,
        lines: transcript.to_vec(),
        day,
        hour,
    }
}
