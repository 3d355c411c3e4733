//! Relationship and sanity effects of a finished conversation.
//!
//! Deterministic: the same transcript and starting state always produce
//! the same mutations. Every change goes through the clamping helpers on
//! `Agent`, so stats stay within `[0, 100]`.

use parley_types::agent::Agent;
use parley_types::conversation::{TranscriptLine, joined_text};
use parley_types::sentiment::{Sentiment, SentimentScore};

use super::lexicon::SentimentScorer;

/// Sanity below which an agent counts as unstable.
pub const LOW_SANITY: f64 = 30.0;
/// Minimum sanity of the carer for the care bonus.
pub const CARER_MIN_SANITY: f64 = 40.0;
/// Affinity from the carer toward the unstable agent for the care bonus.
pub const CARE_AFFINITY: f64 = 70.0;

/// Summary of what one effects pass did.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectReport {
    pub score: SentimentScore,
    pub sentiment: Sentiment,
    pub notes: Vec<String>,
}

/// Score the transcript and apply every effect to the two participants.
pub fn apply_effects(
    transcript: &[TranscriptLine],
    a: &mut Agent,
    b: &mut Agent,
    scorer: &dyn SentimentScorer,
) -> EffectReport {
    let score = scorer.score(&joined_text(transcript));
    let sentiment = score.classify();
    let mut notes = Vec::new();

    let a_low = a.sanity < LOW_SANITY;
    let b_low = b.sanity < LOW_SANITY;

    // The second penalty sees whatever the first one left behind.
    if a_low {
        notes.push(low_sanity_penalty(a, b));
    }
    if b_low {
        notes.push(low_sanity_penalty(b, a));
    }

    let any_low = a_low || b_low;
    match sentiment {
        Sentiment::Negative => {
            let net = f64::from(score.net_score.abs());
            let drop = (net * 1.5).clamp(3.0, 12.0);
            let sanity_loss = (drop * 0.5).min(5.0);
            let cooldown = (300.0 + net * 60.0).min(900.0);
            a.change_affinity(&b.id, -drop);
            b.change_affinity(&a.id, -drop);
            a.adjust_sanity(-sanity_loss);
            b.adjust_sanity(-sanity_loss);
            a.set_cooldown(&b.id, cooldown);
            b.set_cooldown(&a.id, cooldown);
            notes.push(format!(
                "{} and {} argued: affinity -{drop}, sanity -{sanity_loss}, cooldown {cooldown}s",
                a.name, b.name
            ));
        }
        Sentiment::Positive if !any_low => {
            let bonus = f64::from((2 + score.net_score).min(5));
            a.change_affinity(&b.id, bonus);
            b.change_affinity(&a.id, bonus);
            notes.push(format!(
                "{} and {} got along: affinity +{bonus}",
                a.name, b.name
            ));
        }
        Sentiment::Neutral if !any_low => {
            a.change_affinity(&b.id, 1.0);
            b.change_affinity(&a.id, 1.0);
        }
        Sentiment::Positive | Sentiment::Neutral => {}
    }

    let a_toward_b = a.affinity_toward(&b.id);
    let b_toward_a = b.affinity_toward(&a.id);
    if let Some(note) = care_bonus(b, a, a_toward_b) {
        notes.push(note);
    }
    if let Some(note) = care_bonus(a, b, b_toward_a) {
        notes.push(note);
    }

    EffectReport {
        score,
        sentiment,
        notes,
    }
}

/// An unstable `source` wears down `target`.
///
/// The tier comes from the source's current sanity. The damage scales with
/// how much the target cares about the source.
pub fn low_sanity_penalty(source: &mut Agent, target: &mut Agent) -> String {
    let source_sanity = source.sanity;
    let damage = if source_sanity < 15.0 {
        8.0
    } else if source_sanity < 25.0 {
        4.0
    } else {
        2.0
    };
    let target_affinity = target.affinity_toward(&source.id);
    let multiplier = if target_affinity >= 70.0 {
        2.5
    } else if target_affinity >= 40.0 {
        1.5
    } else {
        1.0
    };
    let sanity_loss = damage * multiplier;
    let affinity_drop = if source_sanity < 15.0 { 4.0 } else { 2.0 };

    target.adjust_sanity(-sanity_loss);
    target.change_affinity(&source.id, -affinity_drop);
    source.change_affinity(&target.id, -1.0);

    format!(
        "{} lashed out at {}: {} sanity -{sanity_loss}, affinity -{affinity_drop}",
        source.name, target.name, target.name
    )
}

/// `carer` comforts an unstable `patient`. `carer_affinity` is the carer's
/// affinity toward the patient, read before either direction is applied.
fn care_bonus(patient: &mut Agent, carer: &Agent, carer_affinity: f64) -> Option<String> {
    if patient.sanity < LOW_SANITY
        && carer_affinity >= CARE_AFFINITY
        && carer.sanity >= CARER_MIN_SANITY
    {
        patient.adjust_sanity(8.0);
        patient.change_affinity(&carer.id, 3.0);
        Some(format!("{} comforted {}: sanity +8", carer.name, patient.name))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use parley_types::agent::AgentId;

    use super::*;
    use crate::sentiment::lexicon::{Lexicon, LexiconScorer};

    fn scorer() -> LexiconScorer {
        LexiconScorer::new(&Lexicon::default()).unwrap()
    }

    fn agents() -> (Agent, Agent) {
        (Agent::new("x", "Xan", "cabin"), Agent::new("y", "Yun", "cabin"))
    }

    fn transcript(texts: &[&str]) -> Vec<TranscriptLine> {
        let x = AgentId::from("x");
        let y = AgentId::from("y");
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                if i % 2 == 0 {
                    TranscriptLine::agent(&x, "Xan", *t)
                } else {
                    TranscriptLine::agent(&y, "Yun", *t)
                }
            })
            .collect()
    }

    #[test]
    fn positive_conversation_raises_affinity_both_ways() {
        let (mut a, mut b) = agents();
        let lines = transcript(&["Thank you so much.", "I am glad you came.", "You are very kind."]);
        let report = apply_effects(&lines, &mut a, &mut b, &scorer());
        assert_eq!(report.sentiment, Sentiment::Positive);
        assert_eq!(report.score.net_score, 3);
        assert_eq!(a.affinity_toward(&b.id), 55.0);
        assert_eq!(b.affinity_toward(&a.id), 55.0);
        assert_eq!(a.sanity, 80.0);
        assert_eq!(b.sanity, 80.0);
    }

    #[test]
    fn penalty_scales_with_target_affection() {
        let (mut x, mut y) = agents();
        x.sanity = 10.0;
        y.sanity = 80.0;
        y.set_affinity(&x.id, 75.0);

        low_sanity_penalty(&mut x, &mut y);

        assert_eq!(y.sanity, 60.0);
        assert_eq!(y.affinity_toward(&x.id), 71.0);
        assert_eq!(x.affinity_toward(&y.id), 49.0);
    }

    #[test]
    fn penalty_tiers() {
        let (mut x, mut y) = agents();
        x.sanity = 20.0;
        y.set_affinity(&x.id, 20.0);
        low_sanity_penalty(&mut x, &mut y);
        // damage 4, multiplier 1.0, affinity drop 2
        assert_eq!(y.sanity, 76.0);
        assert_eq!(y.affinity_toward(&x.id), 18.0);
    }

    #[test]
    fn full_pass_with_unstable_participant_applies_penalty_then_care() {
        let (mut x, mut y) = agents();
        x.sanity = 10.0;
        y.set_affinity(&x.id, 75.0);
        let lines = transcript(&["We should check the stores.", "Right."]);

        let report = apply_effects(&lines, &mut x, &mut y, &scorer());

        assert_eq!(report.sentiment, Sentiment::Neutral);
        // Penalty: Yun 80 -> 60, Yun->Xan 75 -> 71, Xan->Yun 50 -> 49.
        // Neutral gain skipped. Care: Yun still cares (71) and is stable.
        assert_eq!(y.sanity, 60.0);
        assert_eq!(y.affinity_toward(&x.id), 71.0);
        assert_eq!(x.sanity, 18.0);
        assert_eq!(x.affinity_toward(&y.id), 52.0);
        assert_eq!(report.notes.len(), 2);
    }

    #[test]
    fn both_unstable_second_penalty_uses_sanity_left_by_first() {
        let (mut x, mut y) = agents();
        x.sanity = 10.0;
        y.sanity = 20.0;
        x.set_affinity(&y.id, 75.0);
        y.set_affinity(&x.id, 75.0);
        let lines = transcript(&["We should check the stores.", "Right."]);

        let report = apply_effects(&lines, &mut x, &mut y, &scorer());

        assert_eq!(report.sentiment, Sentiment::Neutral);
        // Xan lashes out first: Yun 20 -> 0, Yun->Xan 75 -> 71, Xan->Yun 75 -> 74.
        // Yun is now at 0, so the top tier applies: Xan 10 -> 0,
        // Xan->Yun 74 -> 70, Yun->Xan 71 -> 70.
        assert_eq!(x.affinity_toward(&y.id), 70.0);
        assert_eq!(y.affinity_toward(&x.id), 70.0);
        assert_eq!(x.sanity, 0.0);
        assert_eq!(y.sanity, 0.0);
        assert_eq!(report.notes.len(), 2);
    }

    #[test]
    fn negative_conversation_sets_cooldown() {
        let (mut a, mut b) = agents();
        let lines = transcript(&["You are so selfish.", "Shut up, you idiot.", "Whatever."]);
        let report = apply_effects(&lines, &mut a, &mut b, &scorer());
        assert_eq!(report.score.net_score, -4);
        assert_eq!(report.sentiment, Sentiment::Negative);
        // drop = clamp(4 * 1.5, 3, 12) = 6, sanity loss 3, cooldown 540
        assert_eq!(a.affinity_toward(&b.id), 44.0);
        assert_eq!(b.affinity_toward(&a.id), 44.0);
        assert_eq!(a.sanity, 77.0);
        assert_eq!(a.cooldown_toward(&b.id), 540.0);
        assert_eq!(b.cooldown_toward(&a.id), 540.0);
    }

    #[test]
    fn effects_stay_clamped() {
        let (mut a, mut b) = agents();
        a.set_affinity(&b.id, 99.0);
        b.set_affinity(&a.id, 1.0);
        a.sanity = 1.0;
        b.sanity = 1.0;
        let lines = transcript(&["I hate you!", "Shut up!", "Get lost!", "Pathetic!"]);
        apply_effects(&lines, &mut a, &mut b, &scorer());
        for v in [a.sanity, b.sanity, a.affinity_toward(&b.id), b.affinity_toward(&a.id)] {
            assert!((0.0..=100.0).contains(&v), "{v} out of range");
        }
        assert_eq!(b.affinity_toward(&a.id), 0.0);
    }

    #[test]
    fn deterministic_for_same_input() {
        let lines = transcript(&["Thanks for the help.", "Don't worry about it, friend."]);
        let (mut a1, mut b1) = agents();
        let (mut a2, mut b2) = agents();
        let r1 = apply_effects(&lines, &mut a1, &mut b1, &scorer());
        let r2 = apply_effects(&lines, &mut a2, &mut b2, &scorer());
        assert_eq!(r1, r2);
        assert_eq!(a1.affinity_toward(&b1.id), a2.affinity_toward(&b2.id));
    }
}
