//! Transcript persistence port.

use futures_util::future::BoxFuture;
use parley_types::agent::format_clock;
use parley_types::conversation::{ConversationId, TranscriptLine};
use parley_types::error::TranscriptLogError;

/// A finished conversation, ready to be persisted.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub conversation_id: ConversationId,
    pub day: u32,
    pub hour: f64,
    /// Display names of both parties.
    pub participants: [String; 2],
    pub lines: Vec<TranscriptLine>,
}

impl TranscriptEntry {
    /// Human-readable block:
    ///
    /// ```text
    /// [D2 14:30] Ada ↔ Bo (3 lines)
    ///   Ada: ...
    /// ```
    pub fn render(&self) -> String {
        let mut out = format!(
            "[D{} {}] {} ↔ {} ({} lines)\n",
            self.day,
            format_clock(self.hour),
            self.participants[0],
            self.participants[1],
            self.lines.len()
        );
        for line in &self.lines {
            out.push_str("  ");
            out.push_str(&line.speaker_name);
            out.push_str(": ");
            out.push_str(&line.text);
            out.push('\n');
        }
        out
    }
}

/// Best-effort sink for finished transcripts. Callers log and swallow
/// failures; persistence never affects a conversation's outcome.
pub trait TranscriptLog: Send + Sync {
    fn append<'a>(&'a self, entry: &'a TranscriptEntry)
    -> BoxFuture<'a, Result<(), TranscriptLogError>>;
}
