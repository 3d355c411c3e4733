//! Sentiment scoring and the relationship effects derived from it.

pub mod effects;
pub mod lexicon;

pub use effects::{EffectReport, apply_effects};
pub use lexicon::{Lexicon, LexiconScorer, SentimentScorer};
