//! Sentiment scores derived from finished transcripts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Net score above which a conversation counts as positive.
pub const POSITIVE_THRESHOLD: i32 = 2;

/// Weighted keyword counts for one transcript. Derived, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentScore {
    /// Weighted negative count (conflict patterns count double).
    pub negative_count: i32,
    pub positive_count: i32,
    /// `positive_count - negative_count`.
    pub net_score: i32,
}

impl SentimentScore {
    pub fn new(positive_count: i32, negative_count: i32) -> Self {
        Self {
            negative_count,
            positive_count,
            net_score: positive_count - negative_count,
        }
    }

    /// Classify the score: negative below zero, positive above
    /// [`POSITIVE_THRESHOLD`], neutral otherwise.
    pub fn classify(&self) -> Sentiment {
        if self.net_score < 0 {
            Sentiment::Negative
        } else if self.net_score > POSITIVE_THRESHOLD {
            Sentiment::Positive
        } else {
            Sentiment::Neutral
        }
    }
}

/// Overall tone of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Negative => write!(f, "negative"),
            Sentiment::Neutral => write!(f, "neutral"),
            Sentiment::Positive => write!(f, "positive"),
        }
    }
}
