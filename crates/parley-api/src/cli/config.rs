//! `parley config check`: strict validation of a config file.
//!
//! Unlike the runtime loader, which falls back to defaults, this command
//! reports every problem as an error.

use std::path::Path;

use anyhow::Context;
use console::style;
use parley_types::config::ParleyConfig;

pub async fn check(path: &Path, json: bool) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = parse_and_validate(&content).with_context(|| format!("{} is invalid", path.display()))?;
    let policy = config.conversation.policy();

    if json {
        let summary = serde_json::json!({
            "path": path.display().to_string(),
            "valid": true,
            "min_turns": policy.min_turns,
            "max_turns": policy.max_turns,
            "player_min_turns": policy.player_min_turns,
            "player_max_turns": policy.player_max_turns,
            "timeout_secs": policy.timeout.as_secs(),
            "deep_sleep": [policy.deep_sleep_start, policy.deep_sleep_end],
            "generation": {
                "api_style": config.generation.api_style,
                "base_url": config.generation.base_url,
                "model": config.generation.model,
            },
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("  {} {} is valid", style("✓").green(), style(path.display()).cyan());
    println!();
    println!("  {}", style("── Conversation ──").dim());
    println!("  Turns:        {} to {}", policy.min_turns, policy.max_turns);
    println!("  Player turns: {} to {}", policy.player_min_turns, policy.player_max_turns);
    println!("  Timeout:      {}s", policy.timeout.as_secs());
    println!(
        "  Deep sleep:   {:.1}h to {:.1}h",
        policy.deep_sleep_start, policy.deep_sleep_end
    );
    println!("  {}", style("── Generation ──").dim());
    println!("  Endpoint:     {}", config.generation.base_url);
    println!("  Model:        {}", config.generation.model);
    println!();
    Ok(())
}

fn parse_and_validate(content: &str) -> anyhow::Result<ParleyConfig> {
    let config: ParleyConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}
