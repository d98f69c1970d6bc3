//! Dictionary and learned-store contracts, plus the bundled lexicon.
//!
//! The decoder only ever reads through these traits; the keyboard owns the
//! stores and their persistence.

use glide_types::{LexiconData, WordInfo};
use std::collections::{HashMap, HashSet};

pub use codes_iso_639::part_1::LanguageCode as LanguageTag;

/// Learned words outrank dictionary words of equal raw frequency.
pub const LEARNED_BOOST: u32 = 3;

/// Read-only dictionary contract.
///
/// `enumerate` must be deterministic: descending frequency, lexicographic
/// tie-break. Ranking depends on it.
pub trait DictionaryView {
    fn contains(&self, word: &str) -> bool;
    fn frequency(&self, word: &str) -> u32;
    /// Total corpus token count the Zipf prior normalises against.
    fn corpus_size(&self) -> u64;
    fn enumerate<'a>(
        &'a self,
        language: LanguageTag,
        limit: usize,
    ) -> Box<dyn Iterator<Item = (&'a str, u32)> + 'a>;
    fn prefix_match<'a>(
        &'a self,
        prefix: &str,
        limit: usize,
    ) -> Box<dyn Iterator<Item = (&'a str, u32)> + 'a>;
}

/// Read-only snapshot of the word-learning store.
pub trait LearnedView {
    fn frequency(&self, word: &str) -> u32;
    fn is_learned(&self, word: &str) -> bool;
    /// Words the user rejected. The enumerator snapshots this set once per
    /// gesture at its own entry.
    fn blacklisted(&self) -> &HashSet<String>;
    fn learned_words<'a>(&'a self) -> Box<dyn Iterator<Item = (&'a str, u32)> + 'a>;
}

/// Zipf-style prior in (0, 1]: log-scaled frequency per billion corpus
/// tokens. Raw counts from differently sized corpora land on one scale.
pub fn zipf_score(frequency: u32, corpus_size: u64) -> f32 {
    if frequency == 0 {
        return 1e-4;
    }
    let per_billion = frequency as f64 * 1.0e9 / corpus_size.max(1) as f64;
    let z = (1.0 + per_billion).log10() / 9.0;
    (z as f32).clamp(1e-4, 1.0)
}

/// In-memory lexicon backed by the serializable [`LexiconData`] model.
pub struct Lexicon {
    data: LexiconData,
}

impl Lexicon {
    pub fn new() -> Self {
        Self {
            data: LexiconData::new(),
        }
    }

    /// Load `word<TAB>count` lines, the corpus frequency-list format.
    /// Re-sorts into the deterministic enumeration order.
    pub fn load_from_text(&mut self, freq_text: &str) {
        let mut info: HashMap<String, WordInfo> = HashMap::new();
        let mut total: u64 = 0;

        for line in freq_text.lines() {
            let Some((word, count_str)) = line.split_once('\t') else {
                continue;
            };
            let word = word.trim().to_lowercase();
            if word.is_empty() {
                continue;
            }
            let Ok(count) = count_str.trim().parse::<u32>() else {
                continue;
            };
            total += count as u64;
            let entry = info.entry(word).or_default();
            entry.count = entry.count.max(count);
        }

        let mut words: Vec<String> = info.keys().cloned().collect();
        words.sort_by(|a, b| {
            info[b]
                .count
                .cmp(&info[a].count)
                .then_with(|| a.cmp(b))
        });

        self.data = LexiconData {
            words,
            word_info: info,
            corpus_total: total,
        };
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        let (data, _len) = bincode::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(Self { data })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        bincode::encode_to_vec(&self.data, bincode::config::standard())
    }

    pub fn len(&self) -> usize {
        self.data.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.words.is_empty()
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new()
    }
}

impl DictionaryView for Lexicon {
    fn contains(&self, word: &str) -> bool {
        self.data.word_info.contains_key(word)
    }

    fn frequency(&self, word: &str) -> u32 {
        self.data.word_info.get(word).map_or(0, |i| i.count)
    }

    fn corpus_size(&self) -> u64 {
        self.data.corpus_total
    }

    fn enumerate<'a>(
        &'a self,
        _language: LanguageTag,
        limit: usize,
    ) -> Box<dyn Iterator<Item = (&'a str, u32)> + 'a> {
        Box::new(
            self.data
                .words
                .iter()
                .take(limit)
                .map(|w| (w.as_str(), self.data.word_info[w].count)),
        )
    }

    fn prefix_match<'a>(
        &'a self,
        prefix: &str,
        limit: usize,
    ) -> Box<dyn Iterator<Item = (&'a str, u32)> + 'a> {
        let prefix = prefix.to_lowercase();
        Box::new(
            self.data
                .words
                .iter()
                .filter(move |w| w.starts_with(&prefix))
                .take(limit)
                .map(|w| (w.as_str(), self.data.word_info[w].count)),
        )
    }
}

/// Simple owned learned store: learned counts plus a blacklist. The real
/// keyboard persists this through its DAO; tests and the CLI use it directly.
#[derive(Default)]
pub struct MemoryLearnedStore {
    learned: HashMap<String, u32>,
    blacklist: HashSet<String>,
}

impl MemoryLearnedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn learn(&mut self, word: &str) {
        let entry = self.learned.entry(word.to_lowercase()).or_insert(0);
        *entry += 1;
        self.blacklist.remove(&word.to_lowercase());
    }

    pub fn blacklist_word(&mut self, word: &str) {
        let word = word.to_lowercase();
        self.learned.remove(&word);
        self.blacklist.insert(word);
    }
}

impl LearnedView for MemoryLearnedStore {
    fn frequency(&self, word: &str) -> u32 {
        self.learned.get(word).copied().unwrap_or(0)
    }

    fn is_learned(&self, word: &str) -> bool {
        self.learned.contains_key(word)
    }

    fn blacklisted(&self) -> &HashSet<String> {
        &self.blacklist
    }

    fn learned_words<'a>(&'a self) -> Box<dyn Iterator<Item = (&'a str, u32)> + 'a> {
        let mut words: Vec<(&str, u32)> = self
            .learned
            .iter()
            .map(|(w, c)| (w.as_str(), *c))
            .collect();
        words.sort_by(|a, b| a.0.cmp(b.0));
        Box::new(words.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon() -> Lexicon {
        let mut lex = Lexicon::new();
        lex.load_from_text("hello\t5000\nworld\t4000\nhelp\t3500\ntest\t3000\nword\t1800\n");
        lex
    }

    #[test]
    fn text_loading_and_lookup() {
        let lex = lexicon();
        assert_eq!(lex.len(), 5);
        assert!(lex.contains("hello"));
        assert_eq!(lex.frequency("world"), 4000);
        assert_eq!(lex.frequency("nothere"), 0);
        assert_eq!(lex.corpus_size(), 17300);
    }

    #[test]
    fn enumeration_is_frequency_ordered() {
        let lex = lexicon();
        let words: Vec<&str> = lex
            .enumerate(LanguageTag::En, 10)
            .map(|(w, _)| w)
            .collect();
        assert_eq!(words, vec!["hello", "world", "help", "test", "word"]);
        let top2: Vec<&str> = lex.enumerate(LanguageTag::En, 2).map(|(w, _)| w).collect();
        assert_eq!(top2, vec!["hello", "world"]);
    }

    #[test]
    fn enumeration_ties_break_lexicographically() {
        let mut lex = Lexicon::new();
        lex.load_from_text("beta\t10\nalpha\t10\ngamma\t20\n");
        let words: Vec<&str> = lex.enumerate(LanguageTag::En, 10).map(|(w, _)| w).collect();
        assert_eq!(words, vec!["gamma", "alpha", "beta"]);
    }

    #[test]
    fn prefix_match_filters_in_order() {
        let lex = lexicon();
        let words: Vec<&str> = lex.prefix_match("hel", 10).map(|(w, _)| w).collect();
        assert_eq!(words, vec!["hello", "help"]);
    }

    #[test]
    fn bincode_roundtrip() {
        let lex = lexicon();
        let bytes = lex.to_bytes().unwrap();
        let back = Lexicon::from_bytes(&bytes).unwrap();
        assert_eq!(back.len(), 5);
        assert_eq!(back.frequency("help"), 3500);
        assert_eq!(back.corpus_size(), 17300);
    }

    #[test]
    fn zipf_is_monotone_and_bounded() {
        let corpus = 1_000_000u64;
        let lo = zipf_score(10, corpus);
        let hi = zipf_score(10_000, corpus);
        assert!(hi > lo);
        assert!(lo > 0.0 && hi <= 1.0);
        assert_eq!(zipf_score(0, corpus), 1e-4);
    }

    #[test]
    fn learned_store_tracks_blacklist() {
        let mut store = MemoryLearnedStore::new();
        store.learn("zarf");
        store.learn("zarf");
        assert!(store.is_learned("zarf"));
        assert_eq!(store.frequency("zarf"), 2);

        store.blacklist_word("zarf");
        assert!(!store.is_learned("zarf"));
        assert!(store.blacklisted().contains("zarf"));

        store.learn("zarf");
        assert!(!store.blacklisted().contains("zarf"));
    }
}
