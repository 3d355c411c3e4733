//! Console rendering of engine events.

use console::style;
use parley_types::event::{Channel, ConversationEvent};
use parley_types::sentiment::Sentiment;

/// Styled text for one event.
pub fn render_event(event: &ConversationEvent) -> String {
    match event {
        ConversationEvent::ConversationQueued {
            participant_a,
            participant_b,
            queue_len,
            ..
        } => format!(
            "  {} {participant_a} ↔ {participant_b} queued ({queue_len} waiting)",
            style("·").dim()
        ),
        ConversationEvent::ConversationStarted { participants, channel, .. } => {
            let who = participants
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ↔ ");
            let label = match channel {
                Channel::Agents => "conversation",
                Channel::Player => "player chat",
            };
            format!("\n  {} {label}: {}", style("▶").cyan().bold(), style(who).cyan())
        }
        ConversationEvent::LineSpoken { line, fallback, .. } => {
            let name = style(&line.speaker_name).bold();
            if *fallback {
                format!("    {name}: {}", style(&line.text).dim())
            } else {
                format!("    {name}: {}", line.text)
            }
        }
        ConversationEvent::ConversationEnded {
            line_count,
            end_reason,
            ..
        } => {
            let reason = end_reason.map(|r| r.to_string()).unwrap_or_else(|| "closed".into());
            format!(
                "  {} ended after {line_count} lines ({})",
                style("■").dim(),
                style(reason).dim()
            )
        }
        ConversationEvent::EffectApplied {
            sentiment,
            net_score,
            notes,
            ..
        } => {
            let mood = match sentiment {
                Sentiment::Positive => style(sentiment.to_string()).green(),
                Sentiment::Neutral => style(sentiment.to_string()).dim(),
                Sentiment::Negative => style(sentiment.to_string()).red(),
            };
            let mut out = format!("  {} {mood} (net {net_score})", style("♥").magenta());
            for note in notes {
                out.push_str(&format!("\n      {}", style(note).dim()));
            }
            out
        }
        ConversationEvent::ConversationTimedOut {
            participants,
            was_active,
            elapsed_secs,
            ..
        } => format!(
            "  {} timed out after {elapsed_secs}s{}: {}",
            style("⏱").yellow(),
            if *was_active { " while active" } else { "" },
            participants
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        ConversationEvent::QueueClearedForNight { removed } => format!(
            "  {} night falls, {removed} queued conversation(s) dropped",
            style("☾").blue()
        ),
        ConversationEvent::ConversationFailed { error, .. } => {
            format!("  {} conversation failed: {}", style("✗").red(), error)
        }
    }
}
