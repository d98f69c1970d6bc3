//! Per-candidate scoring: greedy letter-to-path alignment through a Gaussian
//! spatial kernel, evidence boosts, then the residual coherence multipliers
//! and the frequency prior.

use crate::enumerate::CandidateSeed;
use crate::geometry::{
    GeometricAnalysis, DWELL_VELOCITY, NORMAL_VELOCITY_THRESHOLD, SLOW_VELOCITY,
};
use crate::layout::KeyLayout;
use crate::lexicon::{zipf_score, LEARNED_BOOST};
use crate::sampler::SampledPath;
use crate::signal::SwipeSignal;
use glide_types::{DecodeError, Point};

/// Adaptive Gaussian widths (px) by how crowded the key's surroundings are.
pub const SIGMA_TIGHT: f32 = 35.0;
pub const SIGMA_NORMAL: f32 = 42.0;
pub const SIGMA_EDGE: f32 = 55.0;
const SIGMA_NEIGHBOUR_RADIUS: f32 = 100.0;

const ANCHOR_SIGMA_SCALE: f32 = 0.80;
const INFLECTION_SIGMA_SCALE: f32 = 0.88;
const MID_SIGMA_SCALE: f32 = 1.20;
const MID_SIGMA_SCALE_LONG: f32 = 1.40;
const LONG_WORD_LEN: usize = 7;

/// Below this gaussian a letter is weak enough to try neighbour rescue.
const RESCUE_TRIGGER: f32 = 0.35;
/// The neighbour itself must be matched at least this strongly.
const RESCUE_NEIGHBOUR_MIN: f32 = 0.5;
const RESCUE_TRANSFER: f32 = 0.65;
/// At most this fraction of the neighbour's gaussian can transfer.
const RESCUE_CAP: f32 = 0.70;

const SLOW_BOOST: f32 = 1.35;
/// Calibrated against representative fast gestures.
pub const FAST_VELOCITY_DISCOUNT: f32 = 0.82;
const VERTEX_BOOST: f32 = 1.30;
const VERTEX_INDEX_WINDOW: usize = 8;
const DWELL_BOOST: f32 = 1.25;
const TROUGH_BOOST: f32 = 1.25;
const REPEAT_BOOST: f32 = 1.25;
const PASSTHROUGH_DISCOUNT: f32 = 0.90;
const OFF_ROW_DISCOUNT: f32 = 0.92;

/// Path points this close to an aligned key count as covered.
const COVERAGE_RADIUS: f32 = 45.0;
/// Vertical agreement weighs heavier than horizontal: rows are what
/// neighbouring keys disagree about.
const VERTICAL_COHERENCE_WEIGHT: f32 = 1.45;

const LEXICAL_BONUS: f32 = 1.10;
const NEAR_MISS_LO: f32 = 0.35;
const NEAR_MISS_HI: f32 = 0.75;
const NEAR_MISS_MEAN: f32 = 0.55;

/// Everything the per-candidate kernel reads. All borrows are immutable; the
/// same context serves every candidate of a gesture, including in parallel.
pub struct ScoreContext<'a> {
    pub path: &'a SampledPath,
    pub layout: &'a KeyLayout,
    pub analysis: &'a GeometricAnalysis,
    pub signal: &'a SwipeSignal,
    pub corpus_size: u64,
}

/// A candidate that survived scoring.
#[derive(Clone, Debug)]
pub struct ScoredCandidate {
    pub word: String,
    pub score: f32,
    pub spatial: f32,
    pub frequency: u32,
    /// Path index each letter bound to, strictly increasing.
    pub alignment: Vec<usize>,
}

/// Score one candidate. `Ok(None)` means the alignment could not complete or
/// the score degenerated; the candidate is silently omitted.
pub fn score_candidate(
    ctx: &ScoreContext<'_>,
    seed: &CandidateSeed,
) -> Result<Option<ScoredCandidate>, DecodeError> {
    let letters: Vec<char> = seed.word.chars().collect();
    let word_len = letters.len();
    if word_len == 0 {
        return Ok(None);
    }

    let n = ctx.path.len();
    let horizon = (3 * n / word_len).max(8);

    let mut spatial = 1.0f32;
    let mut gaussians = Vec::with_capacity(word_len);
    let mut alignment = Vec::with_capacity(word_len);
    let mut keys = Vec::with_capacity(word_len);
    let mut cursor = 0usize;

    for (i, &c) in letters.iter().enumerate() {
        let key = ctx
            .layout
            .key_centroid(c)
            .ok_or(DecodeError::LayoutMismatch { letter: c })?;
        keys.push(key);

        // Later letters still need room: never let a greedy match consume
        // the path tail reserved for them.
        let reserved = word_len - 1 - i;
        let window_end = (cursor + horizon).min(n - reserved.min(n));
        if cursor >= window_end {
            return Ok(None);
        }

        let sigma = sigma_for(ctx, c, i, word_len);
        let (best_j, mut g) = best_in_window(ctx.path, key, sigma, cursor, window_end);

        if g < RESCUE_TRIGGER {
            g = g.max(neighbour_rescue(ctx, c, ctx.path.pos(best_j), sigma));
        }

        let boosted =
            g * letter_boosts(ctx, c, key, i, &letters, best_j, alignment.last().copied(), sigma);
        spatial *= boosted;
        gaussians.push(g);
        alignment.push(best_j);
        cursor = best_j + 1;
    }

    spatial *= coverage(ctx.path, &keys);
    spatial *= path_coherence(ctx.path, &alignment, &keys);
    spatial *= lexical_coherence_bonus(&gaussians);
    spatial *= vertex_length_penalty(ctx.signal.expected_word_length, word_len);

    let boosted_freq = seed
        .frequency
        .max(seed.learned_frequency.saturating_mul(LEARNED_BOOST));
    let prior = zipf_score(boosted_freq, ctx.corpus_size);

    let score = spatial.powf(ctx.signal.spatial_weight) * prior.powf(ctx.signal.frequency_weight);
    if !score.is_finite() || score <= 0.0 {
        return Ok(None);
    }

    Ok(Some(ScoredCandidate {
        word: seed.word.clone(),
        score,
        spatial,
        frequency: seed.frequency,
        alignment,
    }))
}

/// Kernel width per letter: crowding picks the base, the letter's role in
/// the word scales it.
fn sigma_for(ctx: &ScoreContext<'_>, c: char, i: usize, word_len: usize) -> f32 {
    let crowd = ctx
        .layout
        .neighbour_count_within(c, SIGMA_NEIGHBOUR_RADIUS);
    let base = if crowd >= 4 {
        SIGMA_TIGHT
    } else if crowd >= 2 {
        SIGMA_NORMAL
    } else {
        SIGMA_EDGE
    };

    let scale = if i == 0 || i == word_len - 1 {
        ANCHOR_SIGMA_SCALE
    } else if ctx.analysis.intentional_inflection_on(c) {
        INFLECTION_SIGMA_SCALE
    } else if word_len >= LONG_WORD_LEN {
        MID_SIGMA_SCALE_LONG
    } else {
        MID_SIGMA_SCALE
    };

    base * scale
}

fn gaussian(d_sq: f32, sigma: f32) -> f32 {
    (-d_sq / (2.0 * sigma * sigma)).exp()
}

fn best_in_window(
    path: &SampledPath,
    key: Point,
    sigma: f32,
    start: usize,
    end: usize,
) -> (usize, f32) {
    let mut best_j = start;
    let mut best_d_sq = f32::INFINITY;
    for j in start..end {
        let d_sq = path.pos(j).dist_sq(&key);
        if d_sq < best_d_sq {
            best_d_sq = d_sq;
            best_j = j;
        }
    }
    (best_j, gaussian(best_d_sq, sigma))
}

/// A weakly matched letter can borrow from a strongly matched neighbour key:
/// fat-finger releases land one key over.
fn neighbour_rescue(ctx: &ScoreContext<'_>, c: char, at: Point, sigma: f32) -> f32 {
    let radius = ctx.layout.neighbourhood_radius();
    let mut best = 0.0f32;
    let neighbours = ctx.layout.neighbours(c);
    for (nb, inter_key) in neighbours.iter() {
        let Some(centre) = ctx.layout.key_centroid(nb) else {
            continue;
        };
        let g_nb = gaussian(at.dist_sq(&centre), sigma);
        if g_nb <= RESCUE_NEIGHBOUR_MIN {
            continue;
        }
        let transfer =
            (g_nb * (1.0 - inter_key / radius) * RESCUE_TRANSFER).min(RESCUE_CAP * g_nb);
        best = best.max(transfer);
    }
    best
}

#[allow(clippy::too_many_arguments)]
fn letter_boosts(
    ctx: &ScoreContext<'_>,
    c: char,
    key: Point,
    i: usize,
    letters: &[char],
    j: usize,
    prev_j: Option<usize>,
    sigma: f32,
) -> f32 {
    let v = ctx.path.point(j).v;
    let mut boost = if v < SLOW_VELOCITY {
        SLOW_BOOST
    } else if v < NORMAL_VELOCITY_THRESHOLD {
        1.0
    } else {
        FAST_VELOCITY_DISCOUNT
    };

    let vertex_hit = ctx.analysis.vertices.iter().any(|vx| {
        vx.is_significant
            && vx.index.abs_diff(j) <= VERTEX_INDEX_WINDOW
            && (vx.nearest_key == Some(c) || vx.position.dist(&key) < sigma)
    });
    if vertex_hit {
        boost *= VERTEX_BOOST;
    }

    let in_dwell = ctx
        .analysis
        .dwell_points
        .iter()
        .any(|d| d.contains_index(j) && d.nearest_key == Some(c));
    if in_dwell {
        boost *= DWELL_BOOST;
    }

    if velocity_trough(&ctx.analysis.velocity, j) {
        boost *= TROUGH_BOOST;
    }

    // Double letters need dwell or oscillation evidence right where the
    // previous copy bound.
    if i > 0 && letters[i - 1] == c {
        let lingered = prev_j
            .map(|p| ctx.path.pos(p).dist(&ctx.path.pos(j)) < ctx.layout.half_pitch())
            .unwrap_or(false);
        if in_dwell || lingered {
            boost *= REPEAT_BOOST;
        }
    }

    if ctx.signal.passthrough_keys.contains(c) && !vertex_hit {
        boost *= PASSTHROUGH_DISCOUNT;
    }
    if ctx.signal.off_row_keys.contains(c) {
        boost *= OFF_ROW_DISCOUNT;
    }

    boost
}

fn velocity_trough(velocity: &[f32], j: usize) -> bool {
    if velocity.len() <= j {
        return false;
    }
    let lo = j.saturating_sub(4);
    let hi = (j + 4).min(velocity.len() - 1);
    let mut sum = 0.0;
    let mut count = 0;
    for (k, v) in velocity.iter().enumerate().take(hi + 1).skip(lo) {
        if k != j {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        return false;
    }
    let local = sum / count as f32;
    local > 0.0 && velocity[j] < 0.5 * local && velocity[j] < DWELL_VELOCITY
}

/// Fraction of path points explained by (within [`COVERAGE_RADIUS`] of) some
/// aligned key. Detours the word cannot account for cost everyone equally
/// and mismatched words dearly.
fn coverage(path: &SampledPath, keys: &[Point]) -> f32 {
    let r_sq = COVERAGE_RADIUS * COVERAGE_RADIUS;
    let covered = path
        .points()
        .iter()
        .filter(|p| keys.iter().any(|k| k.dist_sq(&p.pos()) <= r_sq))
        .count();
    covered as f32 / path.len() as f32
}

/// Direction and magnitude agreement between expected inter-key edges and
/// the realised path deltas between aligned points.
fn path_coherence(path: &SampledPath, alignment: &[usize], keys: &[Point]) -> f32 {
    let mut sum = 0.0f32;
    let mut count = 0usize;

    for i in 0..keys.len().saturating_sub(1) {
        let ex = keys[i + 1].x - keys[i].x;
        let ey = keys[i + 1].y - keys[i].y;
        let e_len = (ex * ex + ey * ey).sqrt();
        if e_len < 1.0 {
            // Repeated letter, no expected displacement.
            continue;
        }

        let a = path.pos(alignment[i]);
        let b = path.pos(alignment[i + 1]);
        let rx = b.x - a.x;
        let ry = b.y - a.y;
        let r_len = (rx * rx + ry * ry).sqrt();

        let direction = if r_len > f32::EPSILON {
            let ewy = ey * VERTICAL_COHERENCE_WEIGHT;
            let rwy = ry * VERTICAL_COHERENCE_WEIGHT;
            let ew_len = (ex * ex + ewy * ewy).sqrt();
            let rw_len = (rx * rx + rwy * rwy).sqrt();
            let cos = (ex * rx + ewy * rwy) / (ew_len * rw_len);
            (1.0 + cos.clamp(-1.0, 1.0)) * 0.5
        } else {
            0.0
        };
        let magnitude = if r_len > f32::EPSILON {
            (e_len.min(r_len)) / (e_len.max(r_len))
        } else {
            0.0
        };

        sum += 0.6 * direction + 0.4 * magnitude;
        count += 1;
    }

    if count == 0 {
        1.0
    } else {
        (sum / count as f32).clamp(0.05, 1.0)
    }
}

/// A candidate whose letters mostly land as near-misses but consistently so
/// reads as a sloppy rendition of the right word.
fn lexical_coherence_bonus(gaussians: &[f32]) -> f32 {
    if gaussians.is_empty() {
        return 1.0;
    }
    let near_misses = gaussians
        .iter()
        .filter(|g| (NEAR_MISS_LO..=NEAR_MISS_HI).contains(*g))
        .count();
    let mean = gaussians.iter().sum::<f32>() / gaussians.len() as f32;
    if near_misses * 2 >= gaussians.len() && mean >= NEAR_MISS_MEAN {
        LEXICAL_BONUS
    } else {
        1.0
    }
}

fn vertex_length_penalty(expected: usize, word_len: usize) -> f32 {
    let deficit = expected.saturating_sub(word_len);
    if deficit == 0 {
        1.0
    } else if word_len >= LONG_WORD_LEN && deficit >= 5 {
        0.55
    } else if deficit == 1 {
        0.75
    } else {
        0.40
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerate::CandidateSeed;
    use crate::geometry::PathAnalyzer;
    use crate::layout::{trace_word, KeyLayout};
    use crate::sampler::sample;
    use crate::signal::extract;
    use glide_types::RawPoint;

    fn grid() -> KeyLayout {
        KeyLayout::qwerty(100.0)
    }

    struct Fixture {
        path: SampledPath,
        layout: KeyLayout,
        analysis: GeometricAnalysis,
        signal: crate::signal::SwipeSignal,
    }

    impl Fixture {
        fn from_raw(raw: &[RawPoint]) -> Self {
            let layout = grid();
            let path = sample(raw).unwrap();
            let analysis = PathAnalyzer::new().analyze(&path, &layout);
            let signal = extract(&path, &layout, &analysis);
            Self {
                path,
                layout,
                analysis,
                signal,
            }
        }

        fn traced(word: &str) -> Self {
            let raw = trace_word(word, &grid(), 5.0);
            Self::from_raw(&raw)
        }

        fn ctx(&self) -> ScoreContext<'_> {
            ScoreContext {
                path: &self.path,
                layout: &self.layout,
                analysis: &self.analysis,
                signal: &self.signal,
                corpus_size: 17_300,
            }
        }
    }

    fn seed(word: &str, frequency: u32) -> CandidateSeed {
        CandidateSeed {
            word: word.to_string(),
            frequency,
            learned_frequency: 0,
        }
    }

    #[test]
    fn traced_word_scores_itself_highest() {
        let fx = Fixture::traced("hello");
        let ctx = fx.ctx();

        let hello = score_candidate(&ctx, &seed("hello", 5000))
            .unwrap()
            .expect("hello scores");
        let help = score_candidate(&ctx, &seed("help", 3500))
            .unwrap()
            .expect("help scores");

        assert!(hello.score > help.score);
        // Clear winner: past the ambiguity ratio.
        assert!(hello.score / help.score > 1.15);
    }

    #[test]
    fn alignment_is_strictly_increasing() {
        let fx = Fixture::traced("world");
        let ctx = fx.ctx();
        let scored = score_candidate(&ctx, &seed("world", 4000))
            .unwrap()
            .expect("scores");
        assert_eq!(scored.alignment.len(), 5);
        for w in scored.alignment.windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn missing_layout_letter_is_a_mismatch() {
        let fx = Fixture::traced("hello");
        let mut ctx = fx.ctx();
        let partial = KeyLayout::from_centroids(
            "helo".chars().filter_map(|c| {
                fx.layout.key_centroid(c).map(|p| (c, p))
            }),
            50.0,
        );
        ctx.layout = &partial;

        let err = score_candidate(&ctx, &seed("help", 3500)).unwrap_err();
        assert!(matches!(err, DecodeError::LayoutMismatch { letter: 'p' }));
    }

    #[test]
    fn double_letter_boost_needs_dwell_evidence() {
        // trace_word dwells on the doubled l, so hello outruns a dwell-less
        // rendition of the same path.
        let fx = Fixture::traced("hello");
        let ctx = fx.ctx();
        let hello = score_candidate(&ctx, &seed("hello", 5000))
            .unwrap()
            .unwrap();

        let no_dwell: Vec<RawPoint> = trace_word("helo", &grid(), 5.0);
        let fx2 = Fixture::from_raw(&no_dwell);
        let ctx2 = fx2.ctx();
        let hello2 = score_candidate(&ctx2, &seed("hello", 5000))
            .unwrap()
            .unwrap();

        assert!(hello.spatial > hello2.spatial);
    }

    #[test]
    fn end_release_on_neighbour_is_rescued() {
        // h -> e -> l then release between l and p, on p's side.
        let layout = grid();
        let mut raw = trace_word("hel", &layout, 5.0);
        let t0 = raw.last().unwrap().t_ms;
        // Continue from l (900,150) toward p (950,50).
        raw.push(RawPoint::new(920.0, 110.0, t0 + 10));
        raw.push(RawPoint::new(940.0, 70.0, t0 + 20));
        let fx = Fixture::from_raw(&raw);
        let ctx = fx.ctx();

        let help = score_candidate(&ctx, &seed("help", 3500))
            .unwrap()
            .expect("rescued");
        assert!(help.score > 0.0);
        let hello = score_candidate(&ctx, &seed("hello", 5000)).unwrap();
        if let Some(hello) = hello {
            assert!(help.score > hello.score);
        }
    }

    #[test]
    fn length_penalty_bands() {
        assert_eq!(vertex_length_penalty(4, 5), 1.0);
        assert_eq!(vertex_length_penalty(5, 5), 1.0);
        assert_eq!(vertex_length_penalty(6, 5), 0.75);
        assert_eq!(vertex_length_penalty(8, 5), 0.40);
        assert_eq!(vertex_length_penalty(12, 7), 0.55);
    }

    #[test]
    fn coverage_counts_only_explained_points() {
        let fx = Fixture::traced("hello");
        let keys: Vec<Point> = "hello"
            .chars()
            .map(|c| fx.layout.key_centroid(c).unwrap())
            .collect();
        let c = coverage(&fx.path, &keys);
        assert!(c > 0.0 && c < 1.0);

        let far = vec![Point::new(-1000.0, -1000.0)];
        assert_eq!(coverage(&fx.path, &far), 0.0);
    }
}
