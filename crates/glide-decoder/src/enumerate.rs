//! Candidate enumeration: lexicon + learned words, gated by the signal
//! before any per-letter scoring happens.

use crate::geometry::GeometricAnalysis;
use crate::lexicon::{DictionaryView, LanguageTag, LearnedView};
use crate::signal::{SwipeSignal, VERTEX_GATE_MIN_POINTS, VERTEX_GATE_MIN_SIGNIFICANT};
use std::collections::HashSet;
use tracing::debug;

/// How deep into the frequency-ordered lexicon enumeration reaches.
pub const LEXICON_TOP_N: usize = 20_000;

/// Candidates shorter than expected by this much are dropped outright
/// (long words get a scoring penalty instead).
const LENGTH_DEFICIT_DROP: usize = 5;
const LONG_WORD_LEN: usize = 7;

/// A word admitted to scoring, with the frequency facts captured up front so
/// the scoring loop never touches the stores.
#[derive(Clone, Debug)]
pub struct CandidateSeed {
    pub word: String,
    pub frequency: u32,
    pub learned_frequency: u32,
}

/// Pull and gate candidates. The blacklist is snapshotted here, once per
/// gesture; later blacklist writes do not affect an in-flight decode.
pub fn enumerate(
    dict: &dyn DictionaryView,
    learned: &dyn LearnedView,
    language: LanguageTag,
    signal: &SwipeSignal,
    analysis: &GeometricAnalysis,
    path_len: usize,
) -> Vec<CandidateSeed> {
    let blacklist: HashSet<String> = learned.blacklisted().clone();
    let significant = analysis.significant_vertex_count();

    let mut seeds = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let mut admit = |word: &str, frequency: u32| {
        let lower = word.to_lowercase();
        if seen.contains(&lower) || blacklist.contains(&lower) {
            return;
        }
        if !passes_gates(&lower, signal, significant, path_len) {
            return;
        }
        seen.insert(lower.clone());
        seeds.push(CandidateSeed {
            learned_frequency: learned.frequency(&lower),
            word: lower,
            frequency,
        });
    };

    for (word, freq) in dict.enumerate(language, LEXICON_TOP_N) {
        admit(word, freq);
    }
    for (word, _) in learned.learned_words() {
        admit(word, dict.frequency(word));
    }

    debug!(
        candidates = seeds.len(),
        significant_vertices = significant,
        "enumeration done"
    );
    seeds
}

fn passes_gates(
    word: &str,
    signal: &SwipeSignal,
    significant_vertices: usize,
    path_len: usize,
) -> bool {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    // Start-letter gate, with the ambiguity rescue.
    let mut admitted = signal.start.candidate_keys.contains(first);
    if !admitted && (signal.start.is_ambiguous() || signal.point_zero_dominant) {
        admitted = signal.start.point_zero_nearest == Some(first)
            || signal.start.point_zero_second == Some(first);
    }
    if !admitted {
        return false;
    }

    // In-bounds gate: the gesture must have gone near every letter.
    if !word.chars().all(|c| signal.chars_in_bounds.contains(c)) {
        return false;
    }

    // Vertex-length gates.
    let len = word.chars().count();
    let expected = signal.expected_word_length;
    if significant_vertices == 0 && len >= expected + 2 {
        // A path with no discernible turns cannot spell a much longer word.
        return false;
    }
    if path_len >= VERTEX_GATE_MIN_POINTS && significant_vertices >= VERTEX_GATE_MIN_SIGNIFICANT {
        let deficit = expected.saturating_sub(len);
        if deficit >= LENGTH_DEFICIT_DROP && len < LONG_WORD_LEN {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PathAnalyzer;
    use crate::layout::{trace_word, KeyLayout};
    use crate::lexicon::{Lexicon, MemoryLearnedStore};
    use crate::sampler::sample;
    use crate::signal::extract;

    fn grid() -> KeyLayout {
        KeyLayout::qwerty(100.0)
    }

    fn scenario(word: &str) -> (SwipeSignal, GeometricAnalysis, usize) {
        let layout = grid();
        let raw = trace_word(word, &layout, 5.0);
        let path = sample(&raw).unwrap();
        let analysis = PathAnalyzer::new().analyze(&path, &layout);
        let signal = extract(&path, &layout, &analysis);
        (signal, analysis, path.len())
    }

    fn lexicon(text: &str) -> Lexicon {
        let mut lex = Lexicon::new();
        lex.load_from_text(text);
        lex
    }

    const FIVE: &str = "hello\t5000\nworld\t4000\nhelp\t3500\ntest\t3000\nword\t1800\n";

    #[test]
    fn start_and_bounds_gates_filter_the_lexicon() {
        let (signal, analysis, n) = scenario("hello");
        let lex = lexicon(FIVE);
        let learned = MemoryLearnedStore::new();

        let seeds = enumerate(&lex, &learned, LanguageTag::En, &signal, &analysis, n);
        let words: Vec<&str> = seeds.iter().map(|s| s.word.as_str()).collect();

        assert!(words.contains(&"hello"));
        assert!(words.contains(&"help"));
        // Wrong start letter, and w/t were never approached.
        assert!(!words.contains(&"world"));
        assert!(!words.contains(&"test"));
        assert!(!words.contains(&"word"));
    }

    #[test]
    fn blacklisted_words_never_enumerate() {
        let (signal, analysis, n) = scenario("hello");
        let lex = lexicon(FIVE);
        let mut learned = MemoryLearnedStore::new();
        learned.blacklist_word("hello");

        let seeds = enumerate(&lex, &learned, LanguageTag::En, &signal, &analysis, n);
        assert!(seeds.iter().all(|s| s.word != "hello"));
        assert!(seeds.iter().any(|s| s.word == "help"));
    }

    #[test]
    fn learned_words_join_the_pool() {
        let (signal, analysis, n) = scenario("hello");
        let lex = lexicon(FIVE);
        let mut learned = MemoryLearnedStore::new();
        // All letters lie inside the hello path's bounds.
        learned.learn("helio");
        learned.learn("helio");

        let seeds = enumerate(&lex, &learned, LanguageTag::En, &signal, &analysis, n);
        let helio = seeds.iter().find(|s| s.word == "helio").expect("admitted");
        assert_eq!(helio.frequency, 0);
        assert_eq!(helio.learned_frequency, 2);
    }

    #[test]
    fn turnless_paths_reject_longer_words() {
        // A straight h -> i hop with a dwell has no significant vertices;
        // five letters is far more word than this path can mean.
        let (signal, analysis, n) = scenario("hi");
        let lex = lexicon("hi\t100\nhukij\t50\n");
        let learned = MemoryLearnedStore::new();

        let seeds = enumerate(&lex, &learned, LanguageTag::En, &signal, &analysis, n);
        let words: Vec<&str> = seeds.iter().map(|s| s.word.as_str()).collect();
        assert!(words.contains(&"hi"));
        assert!(!words.contains(&"hukij"));
    }
}
