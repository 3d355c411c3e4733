//! Agent records as seen by the conversation engine.
//!
//! An `Agent` is owned by the wider simulation; the conversation engine only
//! reads it and mutates the fields it is responsible for: conversation
//! state, affinity, sanity, affinity cooldowns, memories, and the movement
//! fields it resets when a conversation starts.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::TranscriptLine;

/// Lower bound for affinity and sanity.
pub const STAT_MIN: f64 = 0.0;
/// Upper bound for affinity and sanity.
pub const STAT_MAX: f64 = 100.0;
/// Affinity assumed toward an agent with no recorded relationship.
pub const DEFAULT_AFFINITY: f64 = 50.0;
/// Default number of memories retained per agent.
pub const DEFAULT_MEMORY_CAPACITY: usize = 50;

/// Clamp a stat into `[STAT_MIN, STAT_MAX]`.
pub fn clamp_stat(value: f64) -> f64 {
    value.clamp(STAT_MIN, STAT_MAX)
}

/// Stable identifier for an agent (e.g. `"old_qian"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Whether an agent is free or engaged in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationState {
    #[default]
    Idle,
    Chatting,
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationState::Idle => write!(f, "idle"),
            ConversationState::Chatting => write!(f, "chatting"),
        }
    }
}

/// Movement and path state owned by the movement system.
///
/// The conversation engine only resets it (see [`Agent::freeze_movement`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementState {
    #[serde(default)]
    pub path: Vec<(i32, i32)>,
    #[serde(default)]
    pub path_index: usize,
    #[serde(default)]
    pub is_moving: bool,
    /// Scene the agent is about to enter once it reaches a door.
    #[serde(default)]
    pub pending_scene: Option<String>,
    /// Agent this one is walking toward to start a chat.
    #[serde(default)]
    pub walk_target: Option<AgentId>,
    #[serde(default)]
    pub walking_to_door: bool,
}

impl MovementState {
    pub fn is_frozen(&self) -> bool {
        self.path.is_empty()
            && self.path_index == 0
            && !self.is_moving
            && self.pending_scene.is_none()
            && self.walk_target.is_none()
            && !self.walking_to_door
    }
}

/// Kind of a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Chat,
    Event,
}

/// A single entry in an agent's bounded memory log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub kind: MemoryKind,
    /// Display name of the other party ("Player" for player chats).
    pub partner: String,
    /// One-line summary.
    pub summary: String,
    /// Structured transcript, present for chat memories.
    #[serde(default)]
    pub lines: Vec<TranscriptLine>,
    /// Simulated day the memory was recorded on.
    pub day: u32,
    /// Simulated hour the memory was recorded at.
    pub hour: f64,
}

impl MemoryEntry {
    /// `HH:MM` rendering of the simulated hour.
    pub fn clock(&self) -> String {
        format_clock(self.hour)
    }
}

/// Format a fractional hour (e.g. `13.5`) as `HH:MM`.
pub fn format_clock(hour: f64) -> String {
    let total_minutes = (hour.rem_euclid(24.0) * 60.0).floor() as u32;
    format!("{:02}:{:02}", total_minutes / 60, total_minutes % 60)
}

fn default_sanity() -> f64 {
    80.0
}

fn default_bedtime() -> f64 {
    23.0
}

fn default_wake() -> f64 {
    6.0
}

fn default_memory_capacity() -> usize {
    DEFAULT_MEMORY_CAPACITY
}

/// An autonomous simulated character.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub mood: String,
    /// Scene (location) the agent is currently in.
    pub scene: String,
    #[serde(default)]
    pub state: ConversationState,
    /// Short human-readable description of what the agent is doing.
    #[serde(default)]
    pub state_desc: String,
    #[serde(default = "default_sanity")]
    pub sanity: f64,
    /// Directional affinity toward other agents.
    #[serde(default)]
    pub affinity: HashMap<AgentId, f64>,
    /// Seconds remaining during which passive affinity growth toward a peer
    /// is suppressed.
    #[serde(default)]
    pub affinity_cooldown: HashMap<AgentId, f64>,
    /// When this agent last entered a conversation with each peer.
    #[serde(default)]
    pub chat_cooldowns: HashMap<AgentId, DateTime<Utc>>,
    #[serde(default)]
    pub memories: VecDeque<MemoryEntry>,
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
    /// Hour at or after which the agent should be asleep.
    #[serde(default = "default_bedtime")]
    pub bedtime_hour: f64,
    /// Hour before which the agent is still asleep.
    #[serde(default = "default_wake")]
    pub wake_hour: f64,
    /// Speech bubble currently shown above the agent.
    #[serde(default)]
    pub speaking: Option<String>,
    #[serde(default)]
    pub movement: MovementState,
}

impl Agent {
    /// Create an agent with neutral defaults.
    pub fn new(id: impl Into<String>, name: impl Into<String>, scene: impl Into<String>) -> Self {
        Self {
            id: AgentId::new(id),
            name: name.into(),
            age: 0,
            gender: String::new(),
            occupation: String::new(),
            personality: String::new(),
            mood: String::new(),
            scene: scene.into(),
            state: ConversationState::Idle,
            state_desc: String::new(),
            sanity: default_sanity(),
            affinity: HashMap::new(),
            affinity_cooldown: HashMap::new(),
            chat_cooldowns: HashMap::new(),
            memories: VecDeque::new(),
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            bedtime_hour: default_bedtime(),
            wake_hour: default_wake(),
            speaking: None,
            movement: MovementState::default(),
        }
    }

    pub fn is_chatting(&self) -> bool {
        self.state == ConversationState::Chatting
    }

    /// Affinity toward `other`, defaulting to [`DEFAULT_AFFINITY`].
    pub fn affinity_toward(&self, other: &AgentId) -> f64 {
        self.affinity
            .get(other)
            .copied()
            .unwrap_or(DEFAULT_AFFINITY)
    }

    /// Set affinity toward `other`, clamped.
    pub fn set_affinity(&mut self, other: &AgentId, value: f64) {
        self.affinity.insert(other.clone(), clamp_stat(value));
    }

    /// Add `delta` to the affinity toward `other`, clamped.
    pub fn change_affinity(&mut self, other: &AgentId, delta: f64) {
        let current = self.affinity_toward(other);
        self.set_affinity(other, current + delta);
    }

    /// Add `delta` to sanity, clamped.
    pub fn adjust_sanity(&mut self, delta: f64) {
        self.sanity = clamp_stat(self.sanity + delta);
    }

    /// Seconds of affinity cooldown remaining toward `other`.
    pub fn cooldown_toward(&self, other: &AgentId) -> f64 {
        self.affinity_cooldown.get(other).copied().unwrap_or(0.0)
    }

    pub fn set_cooldown(&mut self, other: &AgentId, seconds: f64) {
        self.affinity_cooldown.insert(other.clone(), seconds.max(0.0));
    }

    /// Passive (non-conversational) affinity growth toward `other`.
    ///
    /// Returns `false` without changing anything while a cooldown toward
    /// `other` is running.
    pub fn passive_affinity_gain(&mut self, other: &AgentId, amount: f64) -> bool {
        if self.cooldown_toward(other) > 0.0 {
            return false;
        }
        self.change_affinity(other, amount);
        true
    }

    /// Decay every affinity cooldown by `dt_secs`, dropping expired ones.
    pub fn tick_cooldowns(&mut self, dt_secs: f64) {
        for remaining in self.affinity_cooldown.values_mut() {
            *remaining -= dt_secs;
        }
        self.affinity_cooldown.retain(|_, remaining| *remaining > 0.0);
    }

    /// Whether the agent should be asleep at the given simulated hour.
    pub fn is_bedtime(&self, hour: f64) -> bool {
        hour >= self.bedtime_hour || hour < self.wake_hour
    }

    /// Stop all movement so the agent stays put while it talks.
    pub fn freeze_movement(&mut self) {
        self.movement = MovementState::default();
    }

    /// Append a memory, evicting the oldest entries beyond capacity.
    pub fn add_memory(&mut self, entry: MemoryEntry) {
        self.memories.push_back(entry);
        while self.memories.len() > self.memory_capacity.max(1) {
            self.memories.pop_front();
        }
    }

    /// Up to `n` most recent memories that involve `other_name`.
    pub fn recent_memories_with(&self, other_name: &str, n: usize) -> Vec<&MemoryEntry> {
        let mut related: Vec<&MemoryEntry> = self
            .memories
            .iter()
            .rev()
            .filter(|m| m.partner == other_name || m.summary.contains(other_name))
            .take(n)
            .collect();
        related.reverse();
        related
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(partner: &str, summary: &str) -> MemoryEntry {
        MemoryEntry {
            kind: MemoryKind::Chat,
            partner: partner.to_string(),
            summary: summary.to_string(),
            lines: Vec::new(),
            day: 1,
            hour: 9.0,
        }
    }

    #[test]
    fn affinity_defaults_to_fifty() {
        let agent = Agent::new("a", "Ada", "village");
        assert_eq!(agent.affinity_toward(&AgentId::from("b")), DEFAULT_AFFINITY);
    }

    #[test]
    fn change_affinity_clamps_both_ends() {
        let mut agent = Agent::new("a", "Ada", "village");
        let b = AgentId::from("b");
        agent.change_affinity(&b, 80.0);
        assert_eq!(agent.affinity_toward(&b), 100.0);
        agent.change_affinity(&b, -250.0);
        assert_eq!(agent.affinity_toward(&b), 0.0);
    }

    #[test]
    fn adjust_sanity_clamps() {
        let mut agent = Agent::new("a", "Ada", "village");
        agent.adjust_sanity(-500.0);
        assert_eq!(agent.sanity, 0.0);
        agent.adjust_sanity(500.0);
        assert_eq!(agent.sanity, 100.0);
    }

    #[test]
    fn passive_gain_suppressed_during_cooldown() {
        let mut agent = Agent::new("a", "Ada", "village");
        let b = AgentId::from("b");
        agent.set_cooldown(&b, 300.0);
        assert!(!agent.passive_affinity_gain(&b, 2.0));
        assert_eq!(agent.affinity_toward(&b), 50.0);

        agent.tick_cooldowns(299.0);
        assert!(!agent.passive_affinity_gain(&b, 2.0));

        agent.tick_cooldowns(1.0);
        assert!(agent.affinity_cooldown.is_empty());
        assert!(agent.passive_affinity_gain(&b, 2.0));
        assert_eq!(agent.affinity_toward(&b), 52.0);
    }

    #[test]
    fn bedtime_covers_late_night_and_early_morning() {
        let agent = Agent::new("a", "Ada", "village");
        assert!(!agent.is_bedtime(12.0));
        assert!(agent.is_bedtime(23.5));
        assert!(agent.is_bedtime(2.0));
        assert!(!agent.is_bedtime(6.0));
    }

    #[test]
    fn freeze_movement_clears_everything() {
        let mut agent = Agent::new("a", "Ada", "village");
        agent.movement = MovementState {
            path: vec![(1, 1), (2, 2)],
            path_index: 1,
            is_moving: true,
            pending_scene: Some("tavern".to_string()),
            walk_target: Some(AgentId::from("b")),
            walking_to_door: true,
        };
        agent.freeze_movement();
        assert!(agent.movement.is_frozen());
    }

    #[test]
    fn memory_log_is_bounded() {
        let mut agent = Agent::new("a", "Ada", "village");
        agent.memory_capacity = 3;
        for i in 0..5 {
            agent.add_memory(memory("Bo", &format!("chat {i}")));
        }
        assert_eq!(agent.memories.len(), 3);
        assert_eq!(agent.memories.front().map(|m| m.summary.as_str()), Some("chat 2"));
    }

    #[test]
    fn recent_memories_with_filters_and_keeps_order() {
        let mut agent = Agent::new("a", "Ada", "village");
        agent.add_memory(memory("Bo", "first"));
        agent.add_memory(memory("Cy", "unrelated"));
        agent.add_memory(memory("Player", "talked about Bo"));
        agent.add_memory(memory("Bo", "second"));

        let related = agent.recent_memories_with("Bo", 2);
        let summaries: Vec<&str> = related.iter().map(|m| m.summary.as_str()).collect();
        assert_eq!(summaries, vec!["talked about Bo", "second"]);
    }

    #[test]
    fn format_clock_renders_minutes() {
        assert_eq!(format_clock(13.5), "13:30");
        assert_eq!(format_clock(0.25), "00:15");
    }

    #[test]
    fn agent_deserializes_with_defaults() {
        let json = r#"{"id":"ada","name":"Ada","scene":"village"}"#;
        let agent: Agent = serde_json::from_str(json).unwrap();
        assert_eq!(agent.id, AgentId::from("ada"));
        assert_eq!(agent.state, ConversationState::Idle);
        assert_eq!(agent.sanity, 80.0);
        assert_eq!(agent.memory_capacity, DEFAULT_MEMORY_CAPACITY);
    }
}
