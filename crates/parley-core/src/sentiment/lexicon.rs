//! Keyword and pattern based sentiment scoring.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use parley_types::sentiment::SentimentScore;

/// Turns a joined transcript into a [`SentimentScore`].
pub trait SentimentScorer: Send + Sync {
    fn score(&self, text: &str) -> SentimentScore;
}

/// Word lists and conflict patterns. Loadable from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lexicon {
    pub negative: Vec<String>,
    pub positive: Vec<String>,
    /// Regular expressions; each match counts twice toward the negative total.
    pub conflict_patterns: Vec<String>,
    /// Exclamation marks at or above which one negative point is added.
    pub exclamation_threshold: usize,
    /// Question marks at or above which one negative point is added.
    pub question_threshold: usize,
}

const NEGATIVE: &[&str] = &[
    "hypocrite",
    "fake",
    "pretending",
    "sarcastic",
    "your fault",
    "blame",
    "lecture me",
    "ridiculous",
    "absurd",
    "shameless",
    "selfish",
    "heartless",
    "cruel",
    "stupid",
    "idiot",
    "useless",
    "worthless",
    "shut up",
    "get lost",
    "go away",
    "disgusting",
    "annoying",
    "hate",
    "leave me alone",
    "none of your business",
    "coward",
    "pathetic",
    "whatever",
    "forget it",
    "that's enough",
    "disappointed",
    "fed up",
    "sick of",
    "tired of you",
    "don't bother",
    "what's the point",
    "you never",
    "you always",
    "how dare",
    "don't care",
    "doesn't matter",
    "ignore",
    "angry",
    "furious",
    "pointless",
];

const POSITIVE: &[&str] = &[
    "thank",
    "grateful",
    "appreciate",
    "care about",
    "warm",
    "help",
    "support",
    "trust",
    "encourage",
    "comfort",
    "friend",
    "glad",
    "happy",
    "kind",
    "sorry",
    "forgive",
    "together",
    "hope",
    "we can do it",
    "hang in there",
    "don't worry",
    "take care",
    "well done",
    "proud of",
];

const CONFLICT_PATTERNS: &[&str] = &[
    r"\bare you even\b",
    r"\bwhat(?: is|'s) wrong with you\b",
    r"\bwhy (?:do|are) you always\b",
    r"\bwho do you think you are\b",
    r"\bhave you ever (?:thought|considered)\b",
    r"\bi'?m done with\b",
    r"\bi can'?t take (?:it|this|you)\b",
    r"\byou [^.?!]*\breally\b[^.?!]*\?",
    r"\bseriously\?",
];

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            negative: NEGATIVE.iter().map(|s| s.to_string()).collect(),
            positive: POSITIVE.iter().map(|s| s.to_string()).collect(),
            conflict_patterns: CONFLICT_PATTERNS.iter().map(|s| s.to_string()).collect(),
            exclamation_threshold: 3,
            question_threshold: 4,
        }
    }
}

impl Lexicon {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

/// Default scorer backed by a [`Lexicon`].
///
/// Terms match case-insensitively at the start of a word, so "thank"
/// also counts "thanks" but "hate" does not count "whatever".
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    negative: Vec<Regex>,
    positive: Vec<Regex>,
    conflicts: Vec<Regex>,
    exclamation_threshold: usize,
    question_threshold: usize,
}

fn term_regex(term: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!(r"\b{}", regex::escape(term)))
        .case_insensitive(true)
        .build()
}

impl LexiconScorer {
    pub fn new(lexicon: &Lexicon) -> Result<Self, regex::Error> {
        let negative = lexicon
            .negative
            .iter()
            .map(|t| term_regex(t))
            .collect::<Result<_, _>>()?;
        let positive = lexicon
            .positive
            .iter()
            .map(|t| term_regex(t))
            .collect::<Result<_, _>>()?;
        let conflicts = lexicon
            .conflict_patterns
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<Result<_, _>>()?;
        Ok(Self {
            negative,
            positive,
            conflicts,
            exclamation_threshold: lexicon.exclamation_threshold,
            question_threshold: lexicon.question_threshold,
        })
    }

    fn count(patterns: &[Regex], text: &str) -> i32 {
        patterns
            .iter()
            .map(|re| re.find_iter(text).count() as i32)
            .sum()
    }
}

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> SentimentScore {
        let mut negative = Self::count(&self.negative, text);
        let positive = Self::count(&self.positive, text);

        negative += 2 * Self::count(&self.conflicts, text);

        let exclamations = text.chars().filter(|c| matches!(c, '!' | '！')).count();
        if exclamations >= self.exclamation_threshold {
            negative += 1;
        }
        let questions = text.chars().filter(|c| matches!(c, '?' | '？')).count();
        if questions >= self.question_threshold {
            negative += 1;
        }

        SentimentScore::new(positive, negative)
    }
}

#[cfg(test)]
mod tests {
    use parley_types::sentiment::Sentiment;

    use super::*;

    fn score(text: &str) -> SentimentScore {
        LexiconScorer::new(&Lexicon::default()).unwrap().score(text)
    }

    #[test]
    fn default_lexicon_compiles() {
        let scorer = LexiconScorer::new(&Lexicon::default()).unwrap();
        assert!(!scorer.conflicts.is_empty());
    }

    #[test]
    fn counts_positive_terms_case_insensitively() {
        let s = score("Thank you so much. I am glad you came. You are very kind.");
        assert_eq!(s.positive_count, 3);
        assert_eq!(s.negative_count, 0);
        assert_eq!(s.classify(), Sentiment::Positive);
    }

    #[test]
    fn terms_anchor_at_word_start() {
        // "whatever" is a negative term on its own, but must not also count "hate".
        let s = score("Whatever.");
        assert_eq!(s.negative_count, 1);
        let s = score("Thanks, thanks.");
        assert_eq!(s.positive_count, 2);
    }

    #[test]
    fn conflict_patterns_count_double() {
        let s = score("What is wrong with you");
        assert_eq!(s.negative_count, 2);
    }

    #[test]
    fn punctuation_density_adds_negative_points() {
        let s = score("No! No! No!");
        assert_eq!(s.negative_count, 1);
        let s = score("Why? When? Where? How?");
        assert_eq!(s.negative_count, 1);
        let s = score("Why? When? Where?");
        assert_eq!(s.negative_count, 0);
    }

    #[test]
    fn lexicon_loads_from_toml_with_defaults() {
        let lexicon = Lexicon::from_toml_str(
            r#"
            negative = ["grr"]
            positive = ["yay"]
            "#,
        )
        .unwrap();
        assert_eq!(lexicon.exclamation_threshold, 3);
        let scorer = LexiconScorer::new(&lexicon).unwrap();
        let s = scorer.score("yay yay grr");
        assert_eq!(s.net_score, 1);
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let lexicon = Lexicon {
            conflict_patterns: vec!["(unclosed".to_string()],
            ..Lexicon::default()
        };
        assert!(LexiconScorer::new(&lexicon).is_err());
    }
}
