//! Conversation requests, transcripts, and outcomes.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::AgentId;

/// Unique identifier for a conversation, wrapping a UUID v7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Low 64 bits of the id; they are random for UUID v7 and serve as a
    /// per-conversation seed for topic and fallback selection.
    pub fn seed(&self) -> u64 {
        let bytes = self.0.as_bytes();
        let mut low = [0u8; 8];
        low.copy_from_slice(&bytes[8..16]);
        u64::from_be_bytes(low)
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who said a transcript line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Speaker {
    Agent(AgentId),
    Player,
}

/// One line of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub speaker: Speaker,
    pub speaker_name: String,
    pub text: String,
}

impl TranscriptLine {
    pub fn agent(id: &AgentId, name: &str, text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Agent(id.clone()),
            speaker_name: name.to_string(),
            text: text.into(),
        }
    }

    pub fn player(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Player,
            speaker_name: PLAYER_NAME.to_string(),
            text: text.into(),
        }
    }
}

/// Display name used for the human player in transcripts and memories.
pub const PLAYER_NAME: &str = "Player";

/// Join all transcript text with single spaces.
pub fn joined_text(lines: &[TranscriptLine]) -> String {
    lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lifecycle status of a conversation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Queued,
    Active,
    Done,
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationStatus::Queued => write!(f, "queued"),
            ConversationStatus::Active => write!(f, "active"),
            ConversationStatus::Done => write!(f, "done"),
        }
    }
}

/// Unit of agent-to-agent dialogue work.
#[derive(Debug, Clone)]
pub struct ConversationRequest {
    pub id: ConversationId,
    pub participant_a: AgentId,
    pub participant_b: AgentId,
    pub transcript: Vec<TranscriptLine>,
    pub turn_index: u32,
    pub max_turns: u32,
    /// Wall-clock instant the request was created; drives the timeout sweep.
    pub started_at: Instant,
    pub status: ConversationStatus,
}

impl ConversationRequest {
    pub fn new(a: AgentId, b: AgentId, max_turns: u32, started_at: Instant) -> Self {
        Self {
            id: ConversationId::new(),
            participant_a: a,
            participant_b: b,
            transcript: Vec::new(),
            turn_index: 0,
            max_turns,
            started_at,
            status: ConversationStatus::Queued,
        }
    }

    pub fn involves(&self, agent: &AgentId) -> bool {
        &self.participant_a == agent || &self.participant_b == agent
    }

    /// Whether this request shares a participant with `other`.
    pub fn overlaps(&self, other: &ConversationRequest) -> bool {
        self.involves(&other.participant_a) || self.involves(&other.participant_b)
    }

    pub fn participants(&self) -> [&AgentId; 2] {
        [&self.participant_a, &self.participant_b]
    }
}

/// Why a conversation stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// A participant emitted the end marker past the minimum-turn floor.
    EndMarker,
    /// The turn ceiling was reached.
    MaxTurns,
    /// The participants are no longer in the same scene.
    Separated,
    /// A participant is past bedtime.
    Bedtime,
    /// The generation service is flagged as degraded.
    ServiceDegraded,
    /// Too many consecutive fallback lines.
    FallbackLimit,
    /// An environmental hazard forced an early finish.
    Hazard,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EndReason::EndMarker => "end_marker",
            EndReason::MaxTurns => "max_turns",
            EndReason::Separated => "separated",
            EndReason::Bedtime => "bedtime",
            EndReason::ServiceDegraded => "service_degraded",
            EndReason::FallbackLimit => "fallback_limit",
            EndReason::Hazard => "hazard",
        };
        f.write_str(s)
    }
}

/// Result of running a conversation to completion.
#[derive(Debug, Clone)]
pub struct ConversationOutcome {
    pub id: ConversationId,
    pub participant_a: AgentId,
    pub participant_b: AgentId,
    pub transcript: Vec<TranscriptLine>,
    pub turn_index: u32,
    pub max_turns: u32,
    pub end_reason: EndReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_is_queued_with_empty_transcript() {
        let req = ConversationRequest::new("a".into(), "b".into(), 20, Instant::now());
        assert_eq!(req.status, ConversationStatus::Queued);
        assert!(req.transcript.is_empty());
        assert_eq!(req.turn_index, 0);
    }

    #[test]
    fn overlap_detects_shared_participant_in_either_slot() {
        let now = Instant::now();
        let ab = ConversationRequest::new("a".into(), "b".into(), 20, now);
        let bc = ConversationRequest::new("b".into(), "c".into(), 20, now);
        let cd = ConversationRequest::new("c".into(), "d".into(), 20, now);
        assert!(ab.overlaps(&bc));
        assert!(!ab.overlaps(&cd));
    }

    #[test]
    fn joined_text_uses_spaces() {
        let a = AgentId::from("a");
        let lines = vec![
            TranscriptLine::agent(&a, "Ada", "hello"),
            TranscriptLine::player("hi"),
        ];
        assert_eq!(joined_text(&lines), "hello hi");
    }

    #[test]
    fn speaker_serializes_tagged() {
        let json = serde_json::to_string(&Speaker::Agent("ada".into())).unwrap();
        assert_eq!(json, r#"{"kind":"agent","id":"ada"}"#);
        let player = serde_json::to_string(&Speaker::Player).unwrap();
        assert_eq!(player, r#"{"kind":"player"}"#);
    }

    #[test]
    fn seeds_differ_between_conversations() {
        let a = ConversationId::new();
        let b = ConversationId::new();
        assert_ne!(a.seed(), b.seed());
    }
}
