//! The turn-taking loop for one agent-to-agent conversation.
//!
//! Phases run `Greeting -> Exchanging -> Ending -> Done`. One generation
//! call produces one line; after the greeting each reply counts as one
//! turn. Agent state is only touched between awaits, and never after the
//! conversation has been cancelled.

use std::sync::Arc;

use parley_types::agent::{Agent, AgentId};
use parley_types::config::ConversationPolicy;
use parley_types::conversation::{
    ConversationOutcome, ConversationRequest, ConversationStatus, EndReason, TranscriptLine,
};
use parley_types::error::ConversationError;
use parley_types::event::{Channel, ConversationEvent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::lines::{CLOSING_FALLBACK, agent_fallback, greeting_fallback, parse_reply, topic_for_day};
use crate::event::EventBus;
use crate::generation::GenerationGate;
use crate::prompt::{self, LineMode, LinePrompt};
use crate::roster::AgentRoster;
use crate::world::WorldContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Greeting,
    Exchanging,
    Ending,
    Done,
}

/// Result of asking one participant to speak.
enum Spoken {
    Line { wants_end: bool, fallback: bool },
    /// The line was discarded because an invariant broke during the call.
    Interrupted(EndReason),
}

/// Per-line options for [`TurnEngine::speak`].
struct LineRequest<'a> {
    speaker: &'a AgentId,
    listener: &'a AgentId,
    mode: LineMode<'a>,
    end_allowed: bool,
    must_conclude: bool,
}

pub struct TurnEngine {
    roster: Arc<AgentRoster>,
    world: Arc<dyn WorldContext>,
    gate: Arc<GenerationGate>,
    bus: EventBus,
    policy: ConversationPolicy,
}

impl TurnEngine {
    pub fn new(
        roster: Arc<AgentRoster>,
        world: Arc<dyn WorldContext>,
        gate: Arc<GenerationGate>,
        bus: EventBus,
        policy: ConversationPolicy,
    ) -> Self {
        Self {
            roster,
            world,
            gate,
            bus,
            policy,
        }
    }

    /// Drive a conversation to completion.
    ///
    /// Returns `Err(Cancelled)` if `cancel` fires; in that case no agent
    /// state is touched after the cancellation is observed. On success both
    /// participants are still `Chatting`; releasing them is the caller's job.
    pub async fn run(
        &self,
        mut request: ConversationRequest,
        cancel: CancellationToken,
    ) -> Result<ConversationOutcome, ConversationError> {
        let a = request.participant_a.clone();
        let b = request.participant_b.clone();
        let seed = request.id.seed();

        let mut phase = TurnPhase::Greeting;
        let mut fallbacks: u32 = 0;
        let mut finish_at: Option<u32> = None;
        let mut end_reason = EndReason::MaxTurns;

        while phase != TurnPhase::Done {
            if cancel.is_cancelled() {
                return Err(ConversationError::Cancelled);
            }

            phase = match phase {
                TurnPhase::Greeting => {
                    if let Some(reason) = self.precheck(&a, &b, fallbacks)? {
                        end_reason = reason;
                        TurnPhase::Ending
                    } else {
                        let topic = topic_for_day(self.world.day(), seed);
                        let line = LineRequest {
                            speaker: &a,
                            listener: &b,
                            mode: LineMode::Greeting { topic },
                            end_allowed: false,
                            must_conclude: false,
                        };
                        match self.speak(&mut request, line, &cancel).await? {
                            Spoken::Line { fallback, .. } => {
                                fallbacks = if fallback { fallbacks + 1 } else { 0 };
                                TurnPhase::Exchanging
                            }
                            Spoken::Interrupted(reason) => {
                                end_reason = reason;
                                TurnPhase::Ending
                            }
                        }
                    }
                }

                TurnPhase::Exchanging => {
                    let turn = request.turn_index;
                    if turn >= request.max_turns {
                        end_reason = EndReason::MaxTurns;
                        TurnPhase::Ending
                    } else if finish_at.is_some_and(|stop| turn >= stop) {
                        end_reason = EndReason::Hazard;
                        TurnPhase::Ending
                    } else if let Some(reason) = self.precheck(&a, &b, fallbacks)? {
                        end_reason = reason;
                        TurnPhase::Ending
                    } else {
                        if finish_at.is_none() && self.hazard(&a, &b)? {
                            // Finish the current B/A pair.
                            let stop = if turn % 2 == 0 { turn + 2 } else { turn + 1 };
                            info!(conversation_id = %request.id, turn, stop, "hazard, finishing after this exchange");
                            finish_at = Some(stop);
                        }

                        let (speaker, listener) = if turn % 2 == 0 { (&b, &a) } else { (&a, &b) };
                        let turn_number = turn + 1;
                        let end_allowed = turn_number >= self.policy.min_turns;
                        let must_conclude =
                            turn_number >= request.max_turns || finish_at == Some(turn_number);
                        let line = LineRequest {
                            speaker,
                            listener,
                            mode: LineMode::Reply,
                            end_allowed,
                            must_conclude,
                        };

                        match self.speak(&mut request, line, &cancel).await? {
                            Spoken::Line {
                                wants_end,
                                fallback,
                            } => {
                                request.turn_index = turn_number;
                                fallbacks = if fallback { fallbacks + 1 } else { 0 };
                                if wants_end && end_allowed {
                                    end_reason = EndReason::EndMarker;
                                    TurnPhase::Ending
                                } else {
                                    TurnPhase::Exchanging
                                }
                            }
                            Spoken::Interrupted(reason) => {
                                end_reason = reason;
                                TurnPhase::Ending
                            }
                        }
                    }
                }

                TurnPhase::Ending => {
                    self.roster.set_speaking(&a, None);
                    self.roster.set_speaking(&b, None);
                    debug!(
                        conversation_id = %request.id,
                        turns = request.turn_index,
                        reason = %end_reason,
                        "conversation finished generating"
                    );
                    TurnPhase::Done
                }

                TurnPhase::Done => TurnPhase::Done,
            };
        }

        request.status = ConversationStatus::Done;
        Ok(ConversationOutcome {
            id: request.id,
            participant_a: request.participant_a,
            participant_b: request.participant_b,
            transcript: request.transcript,
            turn_index: request.turn_index,
            max_turns: request.max_turns,
            end_reason,
        })
    }

    /// Checks made before every generation call.
    fn precheck(
        &self,
        a: &AgentId,
        b: &AgentId,
        fallbacks: u32,
    ) -> Result<Option<EndReason>, ConversationError> {
        if self.gate.is_degraded() {
            return Ok(Some(EndReason::ServiceDegraded));
        }
        if fallbacks >= self.policy.fallback_limit {
            return Ok(Some(EndReason::FallbackLimit));
        }
        self.environment_violation(a, b)
    }

    /// Co-location and bedtime, checked before a call and again after it.
    fn environment_violation(
        &self,
        a: &AgentId,
        b: &AgentId,
    ) -> Result<Option<EndReason>, ConversationError> {
        let (agent_a, agent_b) = self.pair(a, b)?;
        if agent_a.scene != agent_b.scene {
            return Ok(Some(EndReason::Separated));
        }
        let hour = self.world.hour();
        if agent_a.is_bedtime(hour) || agent_b.is_bedtime(hour) {
            return Ok(Some(EndReason::Bedtime));
        }
        Ok(None)
    }

    fn hazard(&self, a: &AgentId, b: &AgentId) -> Result<bool, ConversationError> {
        if !self.world.is_raining() {
            return Ok(false);
        }
        let (agent_a, agent_b) = self.pair(a, b)?;
        Ok(self.world.is_outdoor(&agent_a.scene) || self.world.is_outdoor(&agent_b.scene))
    }

    fn pair(&self, a: &AgentId, b: &AgentId) -> Result<(Agent, Agent), ConversationError> {
        let agent_a = self
            .roster
            .snapshot(a)
            .ok_or_else(|| ConversationError::UnknownAgent(a.clone()))?;
        let agent_b = self
            .roster
            .snapshot(b)
            .ok_or_else(|| ConversationError::UnknownAgent(b.clone()))?;
        Ok((agent_a, agent_b))
    }

    /// Generate, validate, and publish one line.
    async fn speak(
        &self,
        request: &mut ConversationRequest,
        line: LineRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<Spoken, ConversationError> {
        let (speaker, listener) = self.pair(line.speaker, line.listener)?;

        let prompt = prompt::agent_line(
            &LinePrompt {
                speaker: &speaker,
                listener: &listener,
                transcript: &request.transcript,
                mode: line.mode,
                turn_count: request.turn_index,
                end_allowed: line.end_allowed,
                must_conclude: line.must_conclude,
            },
            self.world.as_ref(),
        );
        let max_tokens = match line.mode {
            LineMode::Greeting { .. } => self.policy.greeting_max_tokens,
            LineMode::Reply => self.policy.reply_max_tokens,
        };

        let raw = self
            .gate
            .generate(&prompt.system, &prompt.user, max_tokens)
            .await;

        if cancel.is_cancelled() {
            return Err(ConversationError::Cancelled);
        }
        if let Some(reason) = self.environment_violation(line.speaker, line.listener)? {
            debug!(conversation_id = %request.id, %reason, "discarding line");
            return Ok(Spoken::Interrupted(reason));
        }

        let (text, wants_end, fallback) = match raw {
            Some(raw) => {
                let parsed = parse_reply(&raw, self.policy.line_max_chars);
                if parsed.text.is_empty() {
                    // Nothing but the end marker.
                    (CLOSING_FALLBACK.to_string(), parsed.wants_end, false)
                } else {
                    (parsed.text, parsed.wants_end, false)
                }
            }
            None => {
                let text = match line.mode {
                    LineMode::Greeting { .. } => greeting_fallback(&speaker.name),
                    LineMode::Reply => agent_fallback(
                        request.id.seed(),
                        request.turn_index,
                        line.must_conclude,
                    )
                    .to_string(),
                };
                warn!(
                    conversation_id = %request.id,
                    speaker = %speaker.id,
                    text = %text,
                    "generation unavailable, using fallback line"
                );
                (text, false, true)
            }
        };

        self.show_line(&speaker.id, &listener.id, &text, cancel)?;

        let transcript_line = TranscriptLine::agent(&speaker.id, &speaker.name, text);
        request.transcript.push(transcript_line.clone());
        self.bus.publish(ConversationEvent::LineSpoken {
            conversation_id: request.id,
            channel: Channel::Agents,
            line: transcript_line,
            fallback,
        });

        Ok(Spoken::Line {
            wants_end,
            fallback,
        })
    }

    /// Put `text` in the speaker's bubble and clear the listener's. The token
    /// is re-checked under both agent locks, so a sweep that cancels and then
    /// releases the pair always wins over a late write.
    fn show_line(
        &self,
        speaker: &AgentId,
        listener: &AgentId,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ConversationError> {
        let written = self.roster.update_pair(speaker, listener, |s, l| {
            if cancel.is_cancelled() {
                return false;
            }
            s.speaking = Some(text.to_string());
            l.speaking = None;
            true
        });
        match written {
            Some(false) => Err(ConversationError::Cancelled),
            _ => Ok(()),
        }
    }
}
