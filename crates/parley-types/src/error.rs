use thiserror::Error;

use crate::agent::AgentId;

/// Errors from a single text-generation call.
///
/// These never escape the generation gate: the gate records them for
/// health tracking and turns them into an absent result.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("rate limited")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("request timed out")]
    Timeout,

    #[error("empty response")]
    EmptyResponse,

    #[error("failed to parse response: {0}")]
    Deserialization(String),

    #[error("generation service paused after repeated failures")]
    Paused,
}

/// Errors from running an agent-to-agent conversation.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// The conversation was cancelled (timed out) while generating.
    #[error("conversation cancelled")]
    Cancelled,

    #[error("agent '{0}' not found")]
    UnknownAgent(AgentId),

    /// The conversation task ended abnormally (panic or abort).
    #[error("conversation task failed: {0}")]
    TaskFailed(String),
}

/// Errors from the player chat channel.
#[derive(Debug, Error)]
pub enum PlayerChatError {
    #[error("a player chat session is already open")]
    SessionOpen,

    #[error("no player chat session is open")]
    NoSession,

    #[error("agent '{0}' is already in a conversation")]
    AgentBusy(AgentId),

    #[error("agent '{0}' not found")]
    UnknownAgent(AgentId),

    #[error("message is empty")]
    EmptyMessage,
}

/// Errors from persisting finished transcripts.
#[derive(Debug, Error)]
pub enum TranscriptLogError {
    #[error("failed to write transcript log: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("minimum turn floor {floor} must be below the turn ceiling {ceiling}")]
    InvalidTurnBounds { floor: u32, ceiling: u32 },

    #[error("deep sleep window [{start}, {end}) is invalid")]
    InvalidDeepSleepWindow { start: f64, end: f64 },

    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },

    #[error("failed to read config: {0}")]
    Io(String),

    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_bounds_error_display() {
        let err = ConfigError::InvalidTurnBounds {
            floor: 10,
            ceiling: 8,
        };
        assert_eq!(
            err.to_string(),
            "minimum turn floor 10 must be below the turn ceiling 8"
        );
    }

    #[test]
    fn test_player_chat_error_display() {
        let err = PlayerChatError::AgentBusy(AgentId::from("ada"));
        assert_eq!(err.to_string(), "agent 'ada' is already in a conversation");
    }

    #[test]
    fn test_generation_error_display() {
        let err = GenerationError::Provider {
            message: "HTTP 500".to_string(),
        };
        assert_eq!(err.to_string(), "provider error: HTTP 500");
    }
}
