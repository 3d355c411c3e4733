//! Prompt construction for greeting, reply, and player-chat calls.
//!
//! Prompts carry the speaker's persona, the relationship with the listener,
//! recent shared memories, mental-state hints, and whatever world context
//! the `WorldContext` offers. Wording is data; the engine only depends on
//! the end-marker instruction being present when ending is allowed.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use parley_types::agent::Agent;
use parley_types::conversation::{PLAYER_NAME, TranscriptLine};

use crate::conversation::lines::END_MARKER;
use crate::world::WorldContext;

/// Lines of history included in a reply prompt.
const HISTORY_LINES: usize = 10;
/// Shared memories included in a reply prompt.
const MEMORY_HINTS: usize = 3;

/// A system/user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// What kind of agent line is being requested.
#[derive(Debug, Clone, Copy)]
pub enum LineMode<'a> {
    /// Opening line steered toward a topic.
    Greeting { topic: &'a str },
    /// Reply to the last transcript line.
    Reply,
}

/// Inputs for one agent-to-agent line.
pub struct LinePrompt<'a> {
    pub speaker: &'a Agent,
    pub listener: &'a Agent,
    pub transcript: &'a [TranscriptLine],
    pub mode: LineMode<'a>,
    /// Completed turns so far.
    pub turn_count: u32,
    /// The end marker will be honoured for this line.
    pub end_allowed: bool,
    /// This is the last permitted line.
    pub must_conclude: bool,
}

/// Relationship descriptor by affinity band.
pub fn relationship_descriptor(affinity: f64, listener: &str) -> String {
    let a = affinity.round();
    if affinity >= 90.0 {
        format!("You and {listener} are very close (affinity {a}); you speak warmly, like old friends.")
    } else if affinity >= 70.0 {
        format!("You and {listener} get along well (affinity {a}); the conversation is relaxed.")
    } else if affinity >= 50.0 {
        format!("You and {listener} are acquaintances (affinity {a}); you are polite.")
    } else if affinity >= 30.0 {
        format!("You and {listener} do not get along (affinity {a}); you are cool and curt with them.")
    } else {
        format!("You can barely stand {listener} (affinity {a}); you are impatient and may be sarcastic.")
    }
}

fn sanity_hint(speaker: &Agent) -> Option<String> {
    let s = speaker.sanity.round();
    if speaker.sanity < 15.0 {
        Some(format!(
            "Your mind is in terrible shape (sanity {s}). You are sharp, irritable and hostile; you may blame the other person and say hurtful things."
        ))
    } else if speaker.sanity < 30.0 {
        Some(format!(
            "You are in a bad state (sanity {s}). You are impatient and easily provoked, and may complain or snap."
        ))
    } else if speaker.sanity < 45.0 {
        Some("You are anxious and tired, and it shows in a slightly gloomy tone.".to_string())
    } else {
        None
    }
}

fn cooldown_hint(speaker: &Agent, listener: &Agent) -> Option<String> {
    let remaining = speaker.cooldown_toward(&listener.id);
    (remaining > 0.0).then(|| {
        let minutes = (remaining / 60.0).round();
        format!(
            "You recently argued with {} and are still upset (about {minutes} more minutes). You will not be friendly unless they sincerely apologize.",
            listener.name
        )
    })
}

fn memory_hint(speaker: &Agent, listener: &Agent) -> Option<String> {
    let memories = speaker.recent_memories_with(&listener.name, MEMORY_HINTS);
    if memories.is_empty() {
        return None;
    }
    let mut out = format!("Recent memories with {}:", listener.name);
    for m in memories {
        let _ = write!(out, "\n[D{} {}] {}", m.day, m.clock(), m.summary);
        if !m.lines.is_empty() {
            let tail: Vec<String> = m
                .lines
                .iter()
                .rev()
                .take(2)
                .rev()
                .map(|l| format!("{}: {}", l.speaker_name, l.text))
                .collect();
            let _ = write!(out, " ({})", tail.join(" / "));
        }
    }
    Some(out)
}

fn grief_hint(world: &dyn WorldContext, agent: &Agent, own: bool) -> Option<String> {
    let mourned = world.grief(&agent.id);
    if mourned.is_empty() {
        return None;
    }
    let names = mourned.join(", ");
    Some(if own {
        format!("You are grieving the death of {names}. You are slow, low, and keep coming back to them.")
    } else {
        format!("{} is grieving the loss of {names}; you can feel their sorrow.", agent.name)
    })
}

fn care_hint(speaker: &Agent, listener: &Agent) -> Option<String> {
    (listener.sanity < 30.0 && speaker.affinity_toward(&listener.id) >= 70.0).then(|| {
        format!(
            "You notice {} is in a bad way and you are worried. Comfort them, ask what is wrong, suggest rest. You truly care.",
            listener.name
        )
    })
}

/// Warn when a word of 4+ letters appears 3+ times across the last 4 lines.
pub fn repetition_warning(transcript: &[TranscriptLine]) -> Option<String> {
    if transcript.len() < 4 {
        return None;
    }
    let mut freq: BTreeMap<String, usize> = BTreeMap::new();
    for line in &transcript[transcript.len() - 4..] {
        for word in line
            .text
            .split(|c: char| !c.is_alphabetic())
            .filter(|w| w.chars().count() >= 4)
        {
            *freq.entry(word.to_lowercase()).or_default() += 1;
        }
    }
    let repeated: Vec<&str> = freq
        .iter()
        .filter(|(_, count)| **count >= 3)
        .map(|(word, _)| word.as_str())
        .take(2)
        .collect();
    if repeated.is_empty() {
        return None;
    }
    Some(format!(
        "Note: words like \"{}\" keep coming up. Take a new angle and avoid repeating yourself.",
        repeated.join("\", \"")
    ))
}

fn persona(agent: &Agent) -> String {
    let mut out = format!("You are {}", agent.name);
    if agent.age > 0 {
        let _ = write!(out, ", {} years old", agent.age);
    }
    if !agent.gender.is_empty() {
        let _ = write!(out, ", {}", agent.gender);
    }
    if !agent.occupation.is_empty() {
        let _ = write!(out, ", {}", agent.occupation);
    }
    out.push('.');
    if !agent.personality.is_empty() {
        let _ = write!(out, "\nPersonality: {}.", agent.personality);
    }
    if !agent.mood.is_empty() {
        let _ = write!(out, " Mood: {}.", agent.mood);
    }
    out
}

fn history(transcript: &[TranscriptLine]) -> String {
    let start = transcript.len().saturating_sub(HISTORY_LINES);
    transcript[start..]
        .iter()
        .map(|l| format!("{}: {}", l.speaker_name, l.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn ending_rule(end_allowed: bool, must_conclude: bool) -> String {
    if must_conclude {
        format!("You have been talking for a long time. Wrap up now, say goodbye, and end with {END_MARKER}.")
    } else if end_allowed {
        format!(
            "If the topic is truly exhausted you may say goodbye and append {END_MARKER} (the other person will not see it). Keep going if there is anything left to say."
        )
    } else {
        "Keep the conversation going: ask follow-up questions or share your own experience.".to_string()
    }
}

/// Build the prompt pair for one agent-to-agent line.
pub fn agent_line(ctx: &LinePrompt<'_>, world: &dyn WorldContext) -> PromptPair {
    let speaker = ctx.speaker;
    let listener = ctx.listener;

    let mut system = persona(speaker);
    let _ = write!(
        system,
        "\nYou are talking face to face with {}{}.\n{}",
        listener.name,
        if listener.occupation.is_empty() {
            String::new()
        } else {
            format!(" ({})", listener.occupation)
        },
        relationship_descriptor(speaker.affinity_toward(&listener.id), &listener.name),
    );
    let hints = [
        cooldown_hint(speaker, listener),
        memory_hint(speaker, listener),
        sanity_hint(speaker),
        grief_hint(world, speaker, true),
        care_hint(speaker, listener),
        grief_hint(world, listener, false),
    ];
    for hint in hints.into_iter().flatten() {
        system.push('\n');
        system.push_str(&hint);
    }

    let context = [
        world.urgency_summary(),
        world.survival_summary(),
        world
            .task_description(&speaker.id)
            .map(|t| format!("Your current task: {t}")),
        world.death_summary(),
        world.past_life_hint(),
    ];
    let context: Vec<String> = context.into_iter().flatten().collect();
    if !context.is_empty() {
        system.push_str("\n\n");
        system.push_str(&context.join("\n"));
    }

    let _ = write!(
        system,
        "\n\nRules:\n\
         1. Respond directly to what was just said.\n\
         2. Speak naturally in 1-3 sentences and bring something new each time.\n\
         3. Your tone must match the relationship described above.\n\
         4. No JSON, just speech.\n\
         5. {}",
        ending_rule(ctx.end_allowed, ctx.must_conclude)
    );

    let situation = match ctx.mode {
        LineMode::Greeting { topic } => format!(
            "You have just run into {}. Greet them naturally, then {topic}.",
            listener.name
        ),
        LineMode::Reply => match ctx.transcript.last() {
            Some(last) => {
                let mut s = format!(
                    "{} just said \"{}\". Respond to that.",
                    last.speaker_name, last.text
                );
                if let Some(warning) = repetition_warning(ctx.transcript) {
                    s.push('\n');
                    s.push_str(&warning);
                }
                s
            }
            None => format!("Say something to {}.", listener.name),
        },
    };

    let mut user = String::new();
    if !ctx.transcript.is_empty() {
        let _ = write!(
            user,
            "Conversation so far ({} turns):\n{}\n\n",
            ctx.turn_count,
            history(ctx.transcript)
        );
    }
    let _ = write!(user, "{situation}\nYou say:");

    PromptPair { system, user }
}

/// Opening line for a player chat.
pub fn player_greeting(agent: &Agent, world: &dyn WorldContext) -> PromptPair {
    let system = format!(
        "{}\nSomeone has come over to say hello. Answer briefly (1-2 sentences), in character.",
        persona(agent)
    );
    let doing = if agent.state_desc.is_empty() {
        "going about your day".to_string()
    } else {
        agent.state_desc.clone()
    };
    let user = format!(
        "It is {} on day {}. You are {doing}.\nSay what you want to say (no JSON, just speech).",
        parley_types::agent::format_clock(world.hour()),
        world.day()
    );
    PromptPair { system, user }
}

/// Reply to the player.
pub fn player_reply(
    agent: &Agent,
    transcript: &[TranscriptLine],
    turn_count: u32,
    end_allowed: bool,
    must_conclude: bool,
) -> PromptPair {
    let system = format!(
        "{}\n\nRules:\n\
         1. Reply directly, 1-3 sentences, no JSON.\n\
         2. Engage with what was said: ask, share opinions, tell stories.\n\
         3. {}",
        persona(agent),
        ending_rule(end_allowed, must_conclude)
    );
    let user = format!(
        "Conversation so far ({turn_count} turns):\n{}\n\nReply to {PLAYER_NAME}:",
        history(transcript)
    );
    PromptPair { system, user }
}
