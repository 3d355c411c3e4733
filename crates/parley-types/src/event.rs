//! Event types for the Parley event bus.
//!
//! `ConversationEvent` is broadcast while conversations are scheduled,
//! generated, and resolved. All variants are Clone + Send + Sync for use
//! with tokio broadcast channels.

use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::conversation::{ConversationId, EndReason, TranscriptLine};
use crate::sentiment::Sentiment;

/// Which channel a conversation runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Agent-to-agent conversation driven by the scheduler.
    Agents,
    /// Player-to-agent chat session.
    Player,
}

/// Events emitted by the conversation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    /// A request was accepted into the queue.
    ConversationQueued {
        conversation_id: ConversationId,
        participant_a: AgentId,
        participant_b: AgentId,
        queue_len: usize,
    },

    /// A conversation became active and started generating.
    ConversationStarted {
        conversation_id: ConversationId,
        channel: Channel,
        participants: Vec<AgentId>,
    },

    /// A single line was produced and should be shown right away.
    LineSpoken {
        conversation_id: ConversationId,
        channel: Channel,
        line: TranscriptLine,
        /// Whether the line is fallback text rather than generated text.
        fallback: bool,
    },

    /// A conversation finished and its effects were applied.
    ConversationEnded {
        conversation_id: ConversationId,
        channel: Channel,
        participants: Vec<AgentId>,
        line_count: usize,
        end_reason: Option<EndReason>,
    },

    /// A conversation was removed by the timeout sweep.
    ConversationTimedOut {
        conversation_id: ConversationId,
        participants: Vec<AgentId>,
        was_active: bool,
        elapsed_secs: u64,
    },

    /// Queued conversations were discarded for the night.
    QueueClearedForNight { removed: usize },

    /// A conversation failed unexpectedly and was discarded.
    ConversationFailed {
        conversation_id: ConversationId,
        participants: Vec<AgentId>,
        error: String,
    },

    /// Relationship and sanity effects were applied after a conversation.
    EffectApplied {
        conversation_id: ConversationId,
        sentiment: Sentiment,
        net_score: i32,
        notes: Vec<String>,
    },
}

impl ConversationEvent {
    /// Conversation id carried by the event, if any.
    pub fn conversation_id(&self) -> Option<ConversationId> {
        match self {
            ConversationEvent::ConversationQueued { conversation_id, .. }
            | ConversationEvent::ConversationStarted { conversation_id, .. }
            | ConversationEvent::LineSpoken { conversation_id, .. }
            | ConversationEvent::ConversationEnded { conversation_id, .. }
            | ConversationEvent::ConversationTimedOut { conversation_id, .. }
            | ConversationEvent::ConversationFailed { conversation_id, .. }
            | ConversationEvent::EffectApplied { conversation_id, .. } => Some(*conversation_id),
            ConversationEvent::QueueClearedForNight { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_type_tag() {
        let event = ConversationEvent::QueueClearedForNight { removed: 2 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "queue_cleared_for_night");
        assert_eq!(json["removed"], 2);
    }

    #[test]
    fn line_spoken_carries_conversation_id() {
        let id = ConversationId::new();
        let event = ConversationEvent::LineSpoken {
            conversation_id: id,
            channel: Channel::Agents,
            line: TranscriptLine::player("hello"),
            fallback: false,
        };
        assert_eq!(event.conversation_id(), Some(id));
        assert!(
            ConversationEvent::QueueClearedForNight { removed: 0 }
                .conversation_id()
                .is_none()
        );
    }
}
