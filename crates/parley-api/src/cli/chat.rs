//! `parley chat`: talk to one agent over stdin.

use std::path::Path;

use console::style;
use parley_types::agent::AgentId;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::state::AppState;

const QUIT_COMMANDS: &[&str] = &["/quit", "/exit", "/bye"];

pub async fn run(config_path: &Path, scene_path: &Path, agent: &str) -> anyhow::Result<()> {
    let state = AppState::init(config_path, scene_path).await?;
    let agent_id = AgentId::from(agent);
    let name = state
        .roster
        .read(&agent_id, |a| a.name.clone())
        .ok_or_else(|| anyhow::anyhow!("agent '{agent}' not found in {}", scene_path.display()))?;

    let mut chat = state.player_chat();
    chat.start(&agent_id)?;

    println!();
    println!(
        "  {} Talking with {} {}",
        style("💬").bold(),
        style(&name).cyan().bold(),
        style("(/quit to leave)").dim()
    );
    println!();
    let greeting = chat.greet().await?;
    println!("  {}: {greeting}", style(&name).bold());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  {} ", style("you>").green());
        std::io::Write::flush(&mut std::io::stdout())?;

        let Some(input) = lines.next_line().await? else {
            chat.close();
            break;
        };
        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if QUIT_COMMANDS.contains(&input) {
            chat.close();
            println!("  {}", style("Left the conversation.").dim());
            break;
        }

        let reply = chat.send(input).await?;
        println!("  {}: {}", style(&name).bold(), reply.text);
        if reply.ended {
            println!();
            println!("  {}", style(format!("{name} has ended the conversation.")).dim());
            break;
        }
    }
    Ok(())
}
