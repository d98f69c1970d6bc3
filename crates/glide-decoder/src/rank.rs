//! Final ordering of scored candidates.

use crate::scorer::ScoredCandidate;
use glide_types::Prediction;
use std::cmp::Ordering;

/// How many candidates the decoder returns by default.
pub const DEFAULT_TOP_K: usize = 5;
/// Below this top-to-runner-up ratio the winner is not trusted alone.
pub const AMBIGUITY_RATIO: f32 = 1.15;

/// Sort by score descending with deterministic tie-breaks: higher raw
/// frequency, then shorter word, then lexicographic. Marks the top pair
/// ambiguous when the winner's margin is thin.
pub fn rank(mut candidates: Vec<ScoredCandidate>, k: usize) -> Vec<Prediction> {
    candidates.sort_by(compare);
    candidates.truncate(k);

    let ambiguous = match (candidates.first(), candidates.get(1)) {
        (Some(top), Some(runner)) if runner.score > 0.0 => {
            top.score / runner.score < AMBIGUITY_RATIO
        }
        _ => false,
    };

    candidates
        .into_iter()
        .enumerate()
        .map(|(i, c)| Prediction {
            word: c.word,
            score: c.score,
            freq: c.frequency,
            is_ambiguous: ambiguous && i < 2,
        })
        .collect()
}

fn compare(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.frequency.cmp(&a.frequency))
        .then_with(|| a.word.len().cmp(&b.word.len()))
        .then_with(|| a.word.cmp(&b.word))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(word: &str, score: f32, frequency: u32) -> ScoredCandidate {
        ScoredCandidate {
            word: word.to_string(),
            score,
            spatial: score,
            frequency,
            alignment: Vec::new(),
        }
    }

    #[test]
    fn orders_by_score_then_frequency() {
        let ranked = rank(
            vec![
                cand("low", 0.2, 9000),
                cand("high", 0.8, 10),
                cand("mid", 0.5, 10),
            ],
            5,
        );
        let words: Vec<&str> = ranked.iter().map(|p| p.word.as_str()).collect();
        assert_eq!(words, vec!["high", "mid", "low"]);
    }

    #[test]
    fn equal_scores_prefer_frequency_then_length_then_lexicographic() {
        let ranked = rank(
            vec![
                cand("zeta", 0.5, 100),
                cand("beta", 0.5, 100),
                cand("be", 0.5, 100),
                cand("alphabet", 0.5, 500),
            ],
            5,
        );
        let words: Vec<&str> = ranked.iter().map(|p| p.word.as_str()).collect();
        assert_eq!(words, vec!["alphabet", "be", "beta", "zeta"]);
    }

    #[test]
    fn thin_margin_flags_top_pair() {
        let ranked = rank(vec![cand("one", 1.0, 10), cand("two", 0.95, 10)], 5);
        assert!(ranked[0].is_ambiguous);
        assert!(ranked[1].is_ambiguous);

        let clear = rank(vec![cand("one", 1.0, 10), cand("two", 0.5, 10)], 5);
        assert!(!clear[0].is_ambiguous);
        assert!(!clear[1].is_ambiguous);
    }

    #[test]
    fn truncates_to_k() {
        let many: Vec<ScoredCandidate> = (0..10)
            .map(|i| cand(&format!("w{i}"), 1.0 - i as f32 * 0.1, 0))
            .collect();
        let ranked = rank(many, 3);
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn singleton_is_never_ambiguous() {
        let ranked = rank(vec![cand("only", 0.4, 10)], 5);
        assert!(!ranked[0].is_ambiguous);
    }
}
