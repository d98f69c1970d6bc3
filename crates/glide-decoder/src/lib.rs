//! Swipe-gesture word decoder.
//!
//! Turns a raw touch trajectory over a virtual key grid into a ranked list
//! of candidate words: sample -> analyze -> extract signal -> enumerate ->
//! score -> rank, all per gesture, with cancellation and deadline support.

pub mod enumerate;
pub mod geometry;
pub mod layout;
pub mod lexicon;
pub mod rank;
pub mod sampler;
pub mod scorer;
pub mod signal;

#[cfg(feature = "wasm")]
pub mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::*;

#[cfg(feature = "ffi")]
pub mod ffi;

use crate::geometry::PathAnalyzer;
use crate::layout::KeyLayout;
use crate::lexicon::{DictionaryView, LanguageTag, LearnedView};
use crate::scorer::{score_candidate, ScoreContext, ScoredCandidate};
use glide_types::{Decoded, DecodeError, Diagnostics, RawPoint};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub use crate::layout::trace_word;
pub use crate::lexicon::{Lexicon, MemoryLearnedStore};
pub use crate::rank::DEFAULT_TOP_K;
pub use glide_types::{Prediction, RawPoint as GesturePoint};

/// Above this many candidates the scoring loop fans out over a worker pool.
pub const PARALLEL_MIN_CANDIDATES: usize = 1000;

/// Monotonic generation counter shared between the decoder and whoever owns
/// gesture arbitration. A new gesture bumps the generation; in-flight scoring
/// notices at the next candidate boundary.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<AtomicU64>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.inner.load(Ordering::Acquire)
    }

    /// Invalidate whatever decode currently runs under this token.
    pub fn invalidate(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// One decoder instance: owns the analysis scratch buffers and serialises
/// gestures (decode takes `&mut self`).
pub struct SwipeDecoder {
    analyzer: PathAnalyzer,
}

impl Default for SwipeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SwipeDecoder {
    pub fn new() -> Self {
        Self {
            analyzer: PathAnalyzer::new(),
        }
    }

    /// Decode one gesture against the given layout and stores.
    ///
    /// The generation under `cancel` is captured at entry; a later
    /// [`CancelToken::invalidate`] aborts at the next candidate boundary with
    /// [`DecodeError::Cancelled`]. A missed `deadline` returns whatever
    /// ranked so far inside [`DecodeError::DeadlineExceeded`].
    #[allow(clippy::too_many_arguments)]
    pub fn decode(
        &mut self,
        raw: &[RawPoint],
        layout: &KeyLayout,
        dict: &dyn DictionaryView,
        learned: &dyn LearnedView,
        language: LanguageTag,
        deadline: Option<Instant>,
        cancel: &CancelToken,
    ) -> Result<Decoded, DecodeError> {
        let t0 = Instant::now();
        let generation = cancel.generation();

        let path = sampler::sample(raw)?;
        let analysis = self.analyzer.analyze(&path, layout);
        let sig = signal::extract(&path, layout, &analysis);
        debug!(
            points = path.len(),
            confidence = analysis.confidence,
            "signal ready"
        );

        let seeds = enumerate::enumerate(dict, learned, language, &sig, &analysis, path.len());
        let candidate_count = seeds.len();

        let ctx = ScoreContext {
            path: &path,
            layout,
            analysis: &analysis,
            signal: &sig,
            corpus_size: dict.corpus_size(),
        };

        let deadline_hit = AtomicBool::new(false);
        let score_one = |seed: &enumerate::CandidateSeed| {
            if cancel.generation() != generation {
                return Ok(None);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                deadline_hit.store(true, Ordering::Relaxed);
                return Ok(None);
            }
            score_candidate(&ctx, seed)
        };

        let scored = self.score_all(&seeds, &score_one)?;
        let ranked = rank::rank(scored, rank::DEFAULT_TOP_K);

        if cancel.generation() != generation {
            return Err(DecodeError::Cancelled);
        }
        if deadline_hit.load(Ordering::Relaxed) {
            return Err(DecodeError::DeadlineExceeded { partial: ranked });
        }
        if ranked.is_empty() {
            return Err(DecodeError::NoViableCandidate);
        }

        Ok(Decoded {
            candidates: ranked,
            diagnostics: Diagnostics {
                path_confidence: analysis.confidence,
                candidate_count,
                elapsed_ms: t0.elapsed().as_millis() as u32,
            },
        })
    }

    #[cfg(feature = "parallel")]
    fn score_all(
        &self,
        seeds: &[enumerate::CandidateSeed],
        score_one: &(dyn Fn(
            &enumerate::CandidateSeed,
        ) -> Result<Option<ScoredCandidate>, DecodeError>
              + Sync),
    ) -> Result<Vec<ScoredCandidate>, DecodeError> {
        if seeds.len() > PARALLEL_MIN_CANDIDATES {
            let results: Result<Vec<Option<ScoredCandidate>>, DecodeError> =
                seeds.par_iter().map(score_one).collect();
            Ok(results?
                .into_iter()
                .flatten()
                .filter(|s| s.score > 0.0)
                .collect())
        } else {
            self.score_serial(seeds, score_one)
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn score_all(
        &self,
        seeds: &[enumerate::CandidateSeed],
        score_one: &(dyn Fn(
            &enumerate::CandidateSeed,
        ) -> Result<Option<ScoredCandidate>, DecodeError>
              + Sync),
    ) -> Result<Vec<ScoredCandidate>, DecodeError> {
        self.score_serial(seeds, score_one)
    }

    fn score_serial(
        &self,
        seeds: &[enumerate::CandidateSeed],
        score_one: &(dyn Fn(
            &enumerate::CandidateSeed,
        ) -> Result<Option<ScoredCandidate>, DecodeError>
              + Sync),
    ) -> Result<Vec<ScoredCandidate>, DecodeError> {
        let mut scored = Vec::new();
        for seed in seeds {
            if let Some(s) = score_one(seed)? {
                if s.score > 0.0 {
                    scored.push(s);
                }
            }
        }
        Ok(scored)
    }
}
