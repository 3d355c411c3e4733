//! Player-to-agent chat.
//!
//! A single-participant variant of the turn engine. The player drives the
//! pace: each `send` is one turn and produces exactly one agent reply.
//! At most one session is open at a time.

use std::sync::Arc;

use parley_types::agent::{Agent, AgentId, ConversationState, MemoryEntry, MemoryKind};
use parley_types::config::ConversationPolicy;
use parley_types::conversation::{ConversationId, EndReason, PLAYER_NAME, TranscriptLine};
use parley_types::error::PlayerChatError;
use parley_types::event::{Channel, ConversationEvent};
use tracing::{debug, info, warn};

use super::lines::{PLAYER_CLOSING_FALLBACK, greeting_fallback, parse_reply, player_fallback};
use crate::event::EventBus;
use crate::generation::GenerationGate;
use crate::prompt;
use crate::roster::AgentRoster;
use crate::world::WorldContext;

/// State of the open player chat.
#[derive(Debug, Clone)]
pub struct PlayerChatSession {
    pub id: ConversationId,
    pub agent: AgentId,
    pub transcript: Vec<TranscriptLine>,
    /// Player messages sent so far.
    pub turn_index: u32,
    pub max_turns: u32,
    /// Set once the turn ceiling is reached; the next reply must conclude.
    pub awaiting_end_signal: bool,
}

/// The agent's answer to one player message.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerReply {
    pub text: String,
    /// The session ended with this reply and has been torn down.
    pub ended: bool,
}

pub struct PlayerChat {
    roster: Arc<AgentRoster>,
    world: Arc<dyn WorldContext>,
    gate: Arc<GenerationGate>,
    bus: EventBus,
    policy: ConversationPolicy,
    session: Option<PlayerChatSession>,
}

impl PlayerChat {
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
            session: None,
        }
    }

    pub fn session(&self) -> Option<&PlayerChatSession> {
        self.session.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Open a session with `agent`, marking it `Chatting`.
    pub fn start(&mut self, agent: &AgentId) -> Result<ConversationId, PlayerChatError> {
        if self.session.is_some() {
            return Err(PlayerChatError::SessionOpen);
        }
        let engaged = self
            .roster
            .update(agent, |a| {
                if a.is_chatting() {
                    return false;
                }
                a.freeze_movement();
                a.state = ConversationState::Chatting;
                a.state_desc = format!("talking with {PLAYER_NAME}");
                true
            })
            .ok_or_else(|| PlayerChatError::UnknownAgent(agent.clone()))?;
        if !engaged {
            return Err(PlayerChatError::AgentBusy(agent.clone()));
        }

        let session = PlayerChatSession {
            id: ConversationId::new(),
            agent: agent.clone(),
            transcript: Vec::new(),
            turn_index: 0,
            max_turns: self.policy.player_max_turns,
            awaiting_end_signal: false,
        };
        let id = session.id;
        self.session = Some(session);

        info!(conversation_id = %id, agent = %agent, "player chat started");
        self.bus.publish(ConversationEvent::ConversationStarted {
            conversation_id: id,
            channel: Channel::Player,
            participants: vec![agent.clone()],
        });
        Ok(id)
    }

    /// The agent's opening line. Does not count as a turn.
    pub async fn greet(&mut self) -> Result<String, PlayerChatError> {
        let agent_id = self.open_agent()?;
        let agent = self.agent_snapshot(&agent_id)?;

        let prompt = prompt::player_greeting(&agent, self.world.as_ref());
        let raw = self
            .gate
            .generate(&prompt.system, &prompt.user, self.policy.greeting_max_tokens)
            .await;

        let (text, fallback) = match raw {
            Some(raw) => {
                let parsed = parse_reply(&raw, self.policy.line_max_chars);
                if parsed.text.is_empty() {
                    (greeting_fallback(&agent.name), true)
                } else {
                    (parsed.text, false)
                }
            }
            None => (greeting_fallback(&agent.name), true),
        };
        self.push_agent_line(&agent_id, &agent.name, &text, fallback);
        Ok(text)
    }

    /// Send one player message and return the agent's reply.
    pub async fn send(&mut self, message: &str) -> Result<PlayerReply, PlayerChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(PlayerChatError::EmptyMessage);
        }
        let agent_id = self.open_agent()?;
        let agent = match self.agent_snapshot(&agent_id) {
            Ok(agent) => agent,
            Err(e) => {
                self.close();
                return Err(e);
            }
        };

        let (seed, turn, end_allowed, must_conclude, prompt) = {
            let Some(session) = self.session.as_mut() else {
                return Err(PlayerChatError::NoSession);
            };
            let line = TranscriptLine::player(message);
            session.transcript.push(line.clone());
            session.turn_index += 1;
            if session.turn_index >= session.max_turns {
                session.awaiting_end_signal = true;
            }
            self.bus.publish(ConversationEvent::LineSpoken {
                conversation_id: session.id,
                channel: Channel::Player,
                line,
                fallback: false,
            });

            let end_allowed = session.turn_index >= self.policy.player_min_turns;
            let must_conclude = session.awaiting_end_signal;
            let prompt = prompt::player_reply(
                &agent,
                &session.transcript,
                session.turn_index,
                end_allowed,
                must_conclude,
            );
            (session.id.seed(), session.turn_index, end_allowed, must_conclude, prompt)
        };

        let raw = self
            .gate
            .generate(&prompt.system, &prompt.user, self.policy.player_reply_max_tokens)
            .await;

        let (text, wants_end, fallback) = match raw {
            Some(raw) => {
                let parsed = parse_reply(&raw, self.policy.line_max_chars);
                if parsed.text.is_empty() {
                    (PLAYER_CLOSING_FALLBACK.to_string(), parsed.wants_end, false)
                } else {
                    (parsed.text, parsed.wants_end, false)
                }
            }
            None => {
                let text = player_fallback(seed, turn, must_conclude).to_string();
                warn!(agent = %agent_id, text = %text, "generation unavailable, using fallback reply");
                (text, false, true)
            }
        };
        self.push_agent_line(&agent_id, &agent.name, &text, fallback);

        let end_reason = if wants_end && end_allowed {
            Some(EndReason::EndMarker)
        } else if must_conclude {
            Some(EndReason::MaxTurns)
        } else {
            if wants_end {
                debug!(turn, floor = self.policy.player_min_turns, "end marker below the floor, ignored");
            }
            None
        };
        if let Some(reason) = end_reason {
            self.finish(reason);
        }

        Ok(PlayerReply {
            text,
            ended: end_reason.is_some(),
        })
    }

    /// Tear the session down without recording it.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            self.roster.release(&session.agent);
            info!(conversation_id = %session.id, agent = %session.agent, "player chat closed");
        }
    }

    fn finish(&mut self, reason: EndReason) {
        let Some(session) = self.session.take() else {
            return;
        };
        let day = self.world.day();
        let hour = self.world.hour();
        self.roster.update(&session.agent, |agent| {
            agent.add_memory(MemoryEntry {
                kind: MemoryKind::Chat,
                partner: PLAYER_NAME.to_string(),
                summary: format!("Talked with {PLAYER_NAME}"),
                lines: session.transcript.clone(),
                day,
                hour,
            });
        });
        self.roster.release(&session.agent);

        info!(
            conversation_id = %session.id,
            agent = %session.agent,
            turns = session.turn_index,
            reason = %reason,
            "player chat ended"
        );
        self.bus.publish(ConversationEvent::ConversationEnded {
            conversation_id: session.id,
            channel: Channel::Player,
            participants: vec![session.agent],
            line_count: session.transcript.len(),
            end_reason: Some(reason),
        });
    }

    fn open_agent(&self) -> Result<AgentId, PlayerChatError> {
        self.session
            .as_ref()
            .map(|s| s.agent.clone())
            .ok_or(PlayerChatError::NoSession)
    }

    fn agent_snapshot(&self, id: &AgentId) -> Result<Agent, PlayerChatError> {
        self.roster
            .snapshot(id)
            .ok_or_else(|| PlayerChatError::UnknownAgent(id.clone()))
    }

    fn push_agent_line(&mut self, agent: &AgentId, name: &str, text: &str, fallback: bool) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        self.roster.set_speaking(agent, Some(text.to_string()));
        let line = TranscriptLine::agent(agent, name, text);
        session.transcript.push(line.clone());
        self.bus.publish(ConversationEvent::LineSpoken {
            conversation_id: session.id,
            channel: Channel::Player,
            line,
            fallback,
        });
    }
}
