//! Line post-processing, greeting topics, and fallback text.
//!
//! Topic and fallback choices are derived from the conversation seed so a
//! given conversation always picks the same lines, while different
//! conversations vary.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;

/// Marker a speaker appends when it wants the conversation to stop.
pub const END_MARKER: &str = "[END]";

/// Fallback used when the final, concluding line could not be generated.
pub const CLOSING_FALLBACK: &str = "Alright, let's pick this up later.";

/// Fallback used when a player-chat farewell could not be generated.
pub const PLAYER_CLOSING_FALLBACK: &str = "Right, I should get back to work. Talk soon!";

const AGENT_FALLBACKS: &[&str] = &[
    "Hmm... I was just thinking.",
    "Ah... you're right.",
    "Is that so...",
    "Oh, I see.",
    "Mm-hm, and then?",
    "Sorry, my mind wandered. What were you saying?",
    "Let me think about how to put it...",
    "Ha, really?",
];

const PLAYER_FALLBACKS: &[&str] = &[
    "Mm, got it.",
    "Ah... you have a point.",
    "Is that so? Let me think...",
    "Oh? And then?",
    "Hmm... I see what you mean.",
];

const DAY_ONE_TOPICS: &[&str] = &[
    "talk about how today's firewood and food gathering is going",
    "work out how to split the preparations before the blizzard arrives",
    "ask when the second furnace will be finished",
    "decide who should chop wood and who should look for food",
    "admit how worried you are about the coming blizzard",
    "agree on a backup plan in case supplies run short",
    "go over how today's tasks turned out",
    "check whether anyone's health needs special attention",
    "share something useful you found in the ruins",
    "talk about what you miss most from life before",
];

const DAY_TWO_TOPICS: &[&str] = &[
    "discuss how to finish outdoor work safely at thirty below",
    "describe how brutal the wind is out there today",
    "plan tomorrow, the last calm day before the storm",
    "ask whether the stockpile will last through the deep freeze",
    "worry about how fast the furnace is burning through wood",
    "check on a companion who just came in from the cold",
    "talk about what scares you most about the storm",
    "ask how the second furnace is coming along",
];

const DAY_THREE_TOPICS: &[&str] = &[
    "urgently list what is still missing before the storm hits tonight",
    "decide what matters most in the last few hours",
    "ask whether the second furnace can be finished today",
    "go through the supply list one more time",
    "admit whether you think everyone will make it through tonight",
    "cheer each other on and plan how to get through tomorrow together",
    "ask whether the radio works yet and if rescue can be reached",
    "make sure nobody is falling behind physically",
    "plan for the worst if supplies do not last",
];

const LATER_TOPICS: &[&str] = &[
    "encourage each other while the storm rages outside",
    "estimate how long the furnace wood will last",
    "ask each other about signs of hypothermia",
    "wonder aloud whether rescue will come in time",
    "remember the companions who are gone",
    "discuss how much food is left and whether to ration it",
    "remind each other that rescue comes if you hold out until sunset",
];

/// A generated line after marker detection and cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub text: String,
    /// The raw reply contained the end marker.
    pub wants_end: bool,
}

/// Strip the end marker, trim, and truncate to `max_chars` characters.
pub fn parse_reply(raw: &str, max_chars: usize) -> ParsedLine {
    let wants_end = raw.contains(END_MARKER);
    let cleaned = raw.replace(END_MARKER, "");
    ParsedLine {
        text: truncate_chars(cleaned.trim(), max_chars),
        wants_end,
    }
}

/// Truncate on a character boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

/// Greeting topic for the survival day.
pub fn topic_for_day(day: u32, seed: u64) -> &'static str {
    let pool = match day {
        0 | 1 => DAY_ONE_TOPICS,
        2 => DAY_TWO_TOPICS,
        3 => DAY_THREE_TOPICS,
        _ => LATER_TOPICS,
    };
    choose(pool, seed, 0)
}

/// Fallback for an agent-to-agent line.
pub fn agent_fallback(seed: u64, turn: u32, concluding: bool) -> &'static str {
    if concluding {
        return CLOSING_FALLBACK;
    }
    choose(AGENT_FALLBACKS, seed, u64::from(turn) + 1)
}

/// Fallback for a player-chat reply.
pub fn player_fallback(seed: u64, turn: u32, concluding: bool) -> &'static str {
    if concluding {
        return PLAYER_CLOSING_FALLBACK;
    }
    choose(PLAYER_FALLBACKS, seed, u64::from(turn) + 1)
}

/// Fallback for an opening line.
pub fn greeting_fallback(name: &str) -> String {
    format!("Oh, hello! It's me, {name}.")
}

// Deterministic per (seed, salt), so a conversation replays the same lines.
fn choose(pool: &[&'static str], seed: u64, salt: u64) -> &'static str {
    let mut rng = StdRng::seed_from_u64(seed ^ salt);
    pool.choose(&mut rng).copied().unwrap_or_default()
}
