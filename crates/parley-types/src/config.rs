//! Configuration types for Parley.
//!
//! `ParleyConfig` represents the top-level `parley.toml`. Every field has a
//! default so an empty file (or no file) yields a working configuration.
//! The conversation section resolves into a [`ConversationPolicy`] that the
//! engine consumes.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl ParleyConfig {
    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let policy = self.conversation.policy();
        if policy.min_turns >= policy.max_turns {
            return Err(ConfigError::InvalidTurnBounds {
                floor: policy.min_turns,
                ceiling: policy.max_turns,
            });
        }
        if policy.player_min_turns >= policy.player_max_turns {
            return Err(ConfigError::InvalidTurnBounds {
                floor: policy.player_min_turns,
                ceiling: policy.player_max_turns,
            });
        }
        let c = &self.conversation;
        let in_day = |h: f64| (0.0..=24.0).contains(&h);
        if !(in_day(c.deep_sleep_start) && in_day(c.deep_sleep_end))
            || c.deep_sleep_start >= c.deep_sleep_end
        {
            return Err(ConfigError::InvalidDeepSleepWindow {
                start: c.deep_sleep_start,
                end: c.deep_sleep_end,
            });
        }
        if c.timeout_secs == 0 {
            return Err(ConfigError::NonPositive {
                field: "conversation.timeout_secs",
            });
        }
        if c.fallback_limit == 0 {
            return Err(ConfigError::NonPositive {
                field: "conversation.fallback_limit",
            });
        }
        if self.health.failure_threshold == 0 {
            return Err(ConfigError::NonPositive {
                field: "health.failure_threshold",
            });
        }
        Ok(())
    }
}

/// Tuning profile. `debug` shortens conversations for faster iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Normal,
    Debug,
}

/// `[conversation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Process-wide switch for agent-to-agent conversation initiation.
    #[serde(default = "default_true")]
    pub chat_enabled: bool,
    #[serde(default)]
    pub profile: Profile,
    /// Wall-clock ceiling for a queued or active conversation.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Simulated hour at which the deep-sleep window starts (inclusive).
    #[serde(default = "default_deep_sleep_start")]
    pub deep_sleep_start: f64,
    /// Simulated hour at which the deep-sleep window ends (exclusive).
    #[serde(default = "default_deep_sleep_end")]
    pub deep_sleep_end: f64,
    /// Consecutive fallback lines that end a conversation.
    #[serde(default = "default_fallback_limit")]
    pub fallback_limit: u32,
    /// Generated lines are truncated to this many characters.
    #[serde(default = "default_line_max_chars")]
    pub line_max_chars: usize,
    /// Overrides the profile's minimum-turn floor.
    #[serde(default)]
    pub min_turns: Option<u32>,
    /// Overrides the profile's turn ceiling.
    #[serde(default)]
    pub max_turns: Option<u32>,
    /// Safety ceiling for player chat sessions.
    #[serde(default = "default_player_max_turns")]
    pub player_max_turns: u32,
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_deep_sleep_start() -> f64 {
    1.0
}

fn default_deep_sleep_end() -> f64 {
    6.0
}

fn default_fallback_limit() -> u32 {
    3
}

fn default_line_max_chars() -> usize {
    480
}

fn default_player_max_turns() -> u32 {
    50
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            chat_enabled: default_true(),
            profile: Profile::default(),
            timeout_secs: default_timeout_secs(),
            deep_sleep_start: default_deep_sleep_start(),
            deep_sleep_end: default_deep_sleep_end(),
            fallback_limit: default_fallback_limit(),
            line_max_chars: default_line_max_chars(),
            min_turns: None,
            max_turns: None,
            player_max_turns: default_player_max_turns(),
        }
    }
}

impl ConversationConfig {
    /// Resolve the profile and overrides into a concrete policy.
    pub fn policy(&self) -> ConversationPolicy {
        let base = ConversationPolicy::for_profile(self.profile);
        ConversationPolicy {
            min_turns: self.min_turns.unwrap_or(base.min_turns),
            max_turns: self.max_turns.unwrap_or(base.max_turns),
            player_max_turns: self.player_max_turns,
            fallback_limit: self.fallback_limit,
            line_max_chars: self.line_max_chars,
            timeout: Duration::from_secs(self.timeout_secs),
            deep_sleep_start: self.deep_sleep_start,
            deep_sleep_end: self.deep_sleep_end,
            ..base
        }
    }
}

/// Resolved conversation rules consumed by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationPolicy {
    /// Turns before which the end marker is ignored.
    pub min_turns: u32,
    /// Hard ceiling on turns after the greeting.
    pub max_turns: u32,
    pub player_min_turns: u32,
    pub player_max_turns: u32,
    pub fallback_limit: u32,
    pub line_max_chars: usize,
    pub greeting_max_tokens: u32,
    pub reply_max_tokens: u32,
    pub player_reply_max_tokens: u32,
    pub timeout: Duration,
    pub deep_sleep_start: f64,
    pub deep_sleep_end: f64,
}

impl ConversationPolicy {
    /// Defaults for a tuning profile.
    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Normal => Self {
                min_turns: 8,
                max_turns: 20,
                player_min_turns: 6,
                player_max_turns: default_player_max_turns(),
                fallback_limit: default_fallback_limit(),
                line_max_chars: default_line_max_chars(),
                greeting_max_tokens: 150,
                reply_max_tokens: 500,
                player_reply_max_tokens: 300,
                timeout: Duration::from_secs(default_timeout_secs()),
                deep_sleep_start: default_deep_sleep_start(),
                deep_sleep_end: default_deep_sleep_end(),
            },
            Profile::Debug => Self {
                min_turns: 6,
                max_turns: 12,
                player_min_turns: 3,
                player_max_turns: default_player_max_turns(),
                fallback_limit: default_fallback_limit(),
                line_max_chars: default_line_max_chars(),
                greeting_max_tokens: 100,
                reply_max_tokens: 300,
                player_reply_max_tokens: 100,
                timeout: Duration::from_secs(default_timeout_secs()),
                deep_sleep_start: default_deep_sleep_start(),
                deep_sleep_end: default_deep_sleep_end(),
            },
        }
    }

    /// Whether the simulated hour falls in the deep-sleep window.
    pub fn in_deep_sleep(&self, hour: f64) -> bool {
        hour >= self.deep_sleep_start && hour < self.deep_sleep_end
    }
}

impl Default for ConversationPolicy {
    fn default() -> Self {
        Self::for_profile(Profile::Normal)
    }
}

/// Wire format of the generation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiStyle {
    /// `POST {base_url}/v1/chat/completions`.
    OpenAi,
    /// `POST {base_url}/api/chat` with thinking disabled.
    #[default]
    OllamaNative,
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub api_style: ApiStyle,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Bearer token; omitted for local servers.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen3:14b".to_string()
}

fn default_temperature() -> f64 {
    0.85
}

fn default_request_timeout_secs() -> u64 {
    90
}

fn default_max_retries() -> u32 {
    2
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_style: ApiStyle::default(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// `[health]` section: when to flag the generation service as degraded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Consecutive failed calls that trip the degraded flag.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// How long calls are short-circuited once tripped.
    #[serde(default = "default_pause_secs")]
    pub pause_secs: u64,
}

fn default_failure_threshold() -> u32 {
    10
}

fn default_pause_secs() -> u64 {
    60
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            pause_secs: default_pause_secs(),
        }
    }
}

/// `[log]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// File finished transcripts are appended to. `None` disables it.
    #[serde(default = "default_transcript_path")]
    pub transcript_path: Option<PathBuf>,
}

fn default_transcript_path() -> Option<PathBuf> {
    Some(PathBuf::from("current_session.log"))
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            transcript_path: default_transcript_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config: ParleyConfig = toml::from_str("").unwrap();
        assert!(config.conversation.chat_enabled);
        assert_eq!(config.conversation.timeout_secs, 60);
        assert_eq!(config.health.failure_threshold, 10);
        assert_eq!(config.generation.api_style, ApiStyle::OllamaNative);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_profile_policies() {
        let normal = ConversationPolicy::for_profile(Profile::Normal);
        assert_eq!((normal.min_turns, normal.max_turns), (8, 20));
        let debug = ConversationPolicy::for_profile(Profile::Debug);
        assert_eq!((debug.min_turns, debug.max_turns), (6, 12));
        assert_eq!(debug.player_min_turns, 3);
    }

    #[test]
    fn test_overrides_apply_on_top_of_profile() {
        let toml_str = r#"
[conversation]
profile = "debug"
max_turns = 16
timeout_secs = 30
"#;
        let config: ParleyConfig = toml::from_str(toml_str).unwrap();
        let policy = config.conversation.policy();
        assert_eq!(policy.min_turns, 6);
        assert_eq!(policy.max_turns, 16);
        assert_eq!(policy.timeout, Duration::from_secs(30));
        assert_eq!(policy.reply_max_tokens, 300);
    }

    #[test]
    fn test_validate_rejects_floor_at_or_above_ceiling() {
        let mut config = ParleyConfig::default();
        config.conversation.min_turns = Some(20);
        config.conversation.max_turns = Some(20);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTurnBounds {
                floor: 20,
                ceiling: 20
            })
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_sleep_window() {
        let mut config = ParleyConfig::default();
        config.conversation.deep_sleep_start = 6.0;
        config.conversation.deep_sleep_end = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDeepSleepWindow { .. })
        ));
    }

    #[test]
    fn test_deep_sleep_window_is_half_open() {
        let policy = ConversationPolicy::default();
        assert!(!policy.in_deep_sleep(0.5));
        assert!(policy.in_deep_sleep(1.0));
        assert!(policy.in_deep_sleep(5.99));
        assert!(!policy.in_deep_sleep(6.0));
    }

    #[test]
    fn test_log_path_override() {
        let toml_str = r#"
[log]
transcript_path = "logs/session.log"
"#;
        let config: ParleyConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.log.transcript_path,
            Some(PathBuf::from("logs/session.log"))
        );
    }
}
