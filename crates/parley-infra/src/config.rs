//! Configuration loader for Parley.
//!
//! Reads `parley.toml` and deserializes it into [`ParleyConfig`]. Falls back
//! to defaults when the file is missing, malformed, or fails validation.
//! An optional lexicon file overrides the sentiment word lists the same way.

use std::path::Path;

use parley_core::sentiment::Lexicon;
use parley_types::config::ParleyConfig;

/// Load configuration from `path`.
///
/// - Missing file: defaults, logged at debug.
/// - Unreadable, unparsable, or invalid file: defaults, logged at warn.
pub async fn load_config(path: &Path) -> ParleyConfig {
    let Some(content) = read_optional(path).await else {
        return ParleyConfig::default();
    };

    let config = match toml::from_str::<ParleyConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            return ParleyConfig::default();
        }
    };

    if let Err(err) = config.validate() {
        tracing::warn!("Invalid config in {}: {err}, using defaults", path.display());
        return ParleyConfig::default();
    }
    config
}

/// Load a lexicon override from `path`, falling back to the built-in lists.
pub async fn load_lexicon(path: &Path) -> Lexicon {
    let Some(content) = read_optional(path).await else {
        return Lexicon::default();
    };
    match Lexicon::from_toml_str(&content) {
        Ok(lexicon) => lexicon,
        Err(err) => {
            tracing::warn!("Failed to parse lexicon {}: {err}, using built-in lists", path.display());
            Lexicon::default()
        }
    }
}

async fn read_optional(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Some(content),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No file at {}, using defaults", path.display());
            None
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parley_types::config::ApiStyle;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("parley.toml")).await;
        assert_eq!(config.conversation.timeout_secs, 60);
        assert_eq!(config.generation.api_style, ApiStyle::OllamaNative);
    }

    #[tokio::test]
    async fn valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("parley.toml");
        tokio::fs::write(
            &path,
            r#"
[conversation]
profile = "debug"
timeout_secs = 45

[generation]
api_style = "open_ai"
base_url = "https://api.example.com"
model = "glm-4"

[health]
failure_threshold = 5
"#,
        )
        .await
        .unwrap();

        let config = load_config(&path).await;
        assert_eq!(config.generation.api_style, ApiStyle::OpenAi);
        assert_eq!(config.generation.model, "glm-4");
        assert_eq!(config.health.failure_threshold, 5);
        let policy = config.conversation.policy();
        assert_eq!(policy.max_turns, 12);
        assert_eq!(policy.timeout, Duration::from_secs(45));
    }

    #[tokio::test]
    async fn invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("parley.toml");
        tokio::fs::write(&path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(&path).await;
        assert_eq!(config.conversation.timeout_secs, 60);
    }

    #[tokio::test]
    async fn failed_validation_returns_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("parley.toml");
        tokio::fs::write(&path, "[conversation]\nmin_turns = 30\nmax_turns = 10\n")
            .await
            .unwrap();

        let policy = load_config(&path).await.conversation.policy();
        assert_eq!((policy.min_turns, policy.max_turns), (8, 20));
    }

    #[tokio::test]
    async fn lexicon_override_replaces_lists() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("lexicon.toml");
        tokio::fs::write(&path, "positive = [\"splendid\"]\n").await.unwrap();

        let lexicon = load_lexicon(&path).await;
        assert_eq!(lexicon.positive, vec!["splendid".to_string()]);
        assert!(!lexicon.negative.is_empty(), "unset lists keep their defaults");
    }
}
