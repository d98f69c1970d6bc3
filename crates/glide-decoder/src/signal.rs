//! The immutable per-gesture feature bundle the scoring loop consumes.

use crate::geometry::{GeometricAnalysis, NORMAL_VELOCITY_THRESHOLD};
use crate::layout::{KeyLayout, LetterSet, RowThird};
use crate::sampler::SampledPath;
use glide_types::Point;

/// Margin added around the path bounding box when collecting in-bounds keys.
pub const BOUNDS_MARGIN: f32 = 55.0;
/// Initial speed above which the start anchor widens and back-projects.
pub const HIGH_INITIAL_VELOCITY: f32 = 3.0;
/// Below this average speed the whole gesture reads as a deliberate tap-dwell
/// and point zero dominates the start anchor.
pub const LOW_AVERAGE_VELOCITY: f32 = 0.25;
/// Candidate start keys are capped at this many centroid-ranked entries.
pub const MAX_START_KEYS: usize = 8;

/// Vertex-length gate applies only to paths at least this long...
pub const VERTEX_GATE_MIN_POINTS: usize = 30;
/// ...with at least this many significant vertices.
pub const VERTEX_GATE_MIN_SIGNIFICANT: usize = 2;

const START_ANCHOR_POINTS: usize = 3;
const START_ANCHOR_POINTS_FAST: usize = 5;
const BACKPROJECT_SCALE_MS: f32 = 8.0;
const BACKPROJECT_MAX: f32 = 40.0;
const POINT_ZERO_DISTANCE_SCALE: f32 = 1.2;
const ANCHOR_LOCK_RATIO: f32 = 1.6;

/// Axis-aligned path bounding box.
#[derive(Clone, Copy, Debug)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    fn of_path(path: &SampledPath) -> Self {
        let mut b = Bounds {
            min_x: f32::INFINITY,
            min_y: f32::INFINITY,
            max_x: f32::NEG_INFINITY,
            max_y: f32::NEG_INFINITY,
        };
        for p in path.points() {
            b.min_x = b.min_x.min(p.x);
            b.min_y = b.min_y.min(p.y);
            b.max_x = b.max_x.max(p.x);
            b.max_y = b.max_y.max(p.y);
        }
        b
    }

    pub fn expanded(&self, margin: f32) -> Self {
        Bounds {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}

/// Where the gesture began, resolved to a set of plausible first keys.
#[derive(Clone, Debug)]
pub struct StartAnchor {
    pub centroid: Point,
    /// Tangent extrapolation upstream of point zero, present on fast starts.
    pub back_projection: Option<Point>,
    pub candidate_keys: LetterSet,
    /// Best distance per candidate key across centroid / point-zero /
    /// back-projection sources, ascending.
    pub key_distances: Vec<(char, f32)>,
    pub closest_key: Option<char>,
    pub point_zero_nearest: Option<char>,
    pub point_zero_second: Option<char>,
    /// Point zero's nearest key unambiguously beats the runner-up.
    pub is_locked: bool,
}

impl StartAnchor {
    pub fn is_ambiguous(&self) -> bool {
        !self.is_locked
    }
}

/// Where the gesture ended.
#[derive(Clone, Debug)]
pub struct EndAnchor {
    pub centroid: Point,
    pub ranked_keys: Vec<(char, f32)>,
    pub closest_key: Option<char>,
}

/// Precomputed projection of one gesture, read-only for the scorer.
#[derive(Clone, Debug)]
pub struct SwipeSignal {
    pub bounds: Bounds,
    pub chars_in_bounds: LetterSet,
    pub start: StartAnchor,
    pub end: EndAnchor,
    pub average_velocity: f32,
    pub point_zero_dominant: bool,
    /// Keys crossed fast with no intentional turn on them.
    pub passthrough_keys: LetterSet,
    /// Top/bottom-third keys crossed during a fast gesture.
    pub off_row_keys: LetterSet,
    pub expected_word_length: usize,
    pub spatial_weight: f32,
    pub frequency_weight: f32,
}

/// Project the analysis into the scoring-ready signal. Pure in
/// `(path, layout, analysis)`.
pub fn extract(path: &SampledPath, layout: &KeyLayout, analysis: &GeometricAnalysis) -> SwipeSignal {
    let bounds = Bounds::of_path(path);
    let expanded = bounds.expanded(BOUNDS_MARGIN);
    let chars_in_bounds: LetterSet = layout
        .letters()
        .filter(|(_, p)| expanded.contains(*p))
        .map(|(c, _)| c)
        .collect();

    let average_velocity = path.average_velocity();
    let point_zero_dominant = average_velocity < LOW_AVERAGE_VELOCITY;

    let start = start_anchor(path, layout);
    let end = end_anchor(path, layout);

    let mut passthrough_keys = LetterSet::new();
    let mut off_row_keys = LetterSet::new();
    let fast_gesture = average_velocity > NORMAL_VELOCITY_THRESHOLD;
    for t in analysis.traversals() {
        if t.velocity > NORMAL_VELOCITY_THRESHOLD
            && !analysis.intentional_inflection_near_index(t.index, 2)
        {
            passthrough_keys.insert(t.letter);
        }
        if fast_gesture {
            match layout.row_third(t.letter) {
                Some(RowThird::Top) | Some(RowThird::Bottom) => off_row_keys.insert(t.letter),
                _ => {}
            }
        }
    }

    let expected_word_length = expected_word_length(path.len(), analysis);
    let (spatial_weight, frequency_weight) = confidence_weights(analysis.confidence);

    SwipeSignal {
        bounds,
        chars_in_bounds,
        start,
        end,
        average_velocity,
        point_zero_dominant,
        passthrough_keys,
        off_row_keys,
        expected_word_length,
        spatial_weight,
        frequency_weight,
    }
}

/// Confidence decides how much the gesture itself is trusted over the
/// lexicon frequency prior.
fn confidence_weights(confidence: f32) -> (f32, f32) {
    if confidence > 0.80 {
        (0.85, 0.15)
    } else if confidence > 0.60 {
        (0.72, 0.28)
    } else if confidence > 0.40 {
        (0.60, 0.40)
    } else {
        (0.52, 0.48)
    }
}

/// How many letters the path shape suggests. The turn-based estimate is
/// clamped by path size so a jittery short path cannot demand a long word.
fn expected_word_length(path_len: usize, analysis: &GeometricAnalysis) -> usize {
    let turn_cap = match path_len {
        0..=24 => 5,
        25..=59 => 9,
        60..=119 => 14,
        _ => 20,
    };
    let by_turns = (analysis.intentional_inflection_count() + 2).clamp(2, turn_cap);
    let by_size = (path_len / 14).clamp(2, 20);
    by_turns.max(by_size)
}

fn initial_velocity(path: &SampledPath) -> f32 {
    let take = path.len().min(4);
    if take < 2 {
        return 0.0;
    }
    path.points()[1..take].iter().map(|p| p.v).sum::<f32>() / (take - 1) as f32
}

fn centroid_of(path: &SampledPath, range: std::ops::Range<usize>) -> Point {
    let count = (range.end - range.start) as f32;
    let mut x = 0.0;
    let mut y = 0.0;
    for i in range {
        let p = path.pos(i);
        x += p.x;
        y += p.y;
    }
    Point::new(x / count, y / count)
}

fn start_anchor(path: &SampledPath, layout: &KeyLayout) -> StartAnchor {
    let v_init = initial_velocity(path);
    let fast_start = v_init > HIGH_INITIAL_VELOCITY;

    let n = if fast_start {
        START_ANCHOR_POINTS_FAST
    } else {
        START_ANCHOR_POINTS
    }
    .min(path.len());
    let centroid = centroid_of(path, 0..n);

    let p0 = path.pos(0);
    let back_projection = if fast_start {
        back_project(path, v_init)
    } else {
        None
    };

    // Search radius widens up to ~3x with initial speed.
    let radius = layout.half_pitch() * 1.2 * (1.0 + 2.0 * v_init / (v_init + 2.0));

    let mut best: Vec<(char, f32)> = layout.keys_within(centroid, radius, MAX_START_KEYS);

    let (p0_first, p0_second) = layout.nearest_two(p0);
    let point_zero_nearest = p0_first.map(|(c, _)| c);
    let point_zero_second = p0_second.map(|(c, _)| c);

    let mut merge = |entry: Option<(char, f32)>| {
        if let Some((c, d)) = entry {
            match best.iter_mut().find(|(k, _)| *k == c) {
                Some((_, old)) => *old = old.min(d),
                None => best.push((c, d)),
            }
        }
    };

    // Point zero speaks with a slight discount against the centroid.
    merge(p0_first.map(|(c, d)| (c, d * POINT_ZERO_DISTANCE_SCALE)));
    merge(p0_second.map(|(c, d)| (c, d * POINT_ZERO_DISTANCE_SCALE)));
    if let Some(bp) = back_projection {
        let (b1, b2) = layout.nearest_two(bp);
        merge(b1);
        merge(b2);
    }

    best.sort_by(|a, b| a.1.total_cmp(&b.1));
    let closest_key = best.first().map(|(c, _)| *c);
    let candidate_keys: LetterSet = best.iter().map(|(c, _)| *c).collect();

    let is_locked = match (p0_first, p0_second) {
        (Some((_, d1)), Some((_, d2))) => d1 * ANCHOR_LOCK_RATIO < d2,
        (Some(_), None) => true,
        _ => false,
    };

    StartAnchor {
        centroid,
        back_projection,
        candidate_keys,
        key_distances: best,
        closest_key,
        point_zero_nearest,
        point_zero_second,
        is_locked,
    }
}

/// Extrapolate the start tangent upstream of point zero: a fast start means
/// the first report already trails the intended key.
fn back_project(path: &SampledPath, v_init: f32) -> Option<Point> {
    let p0 = path.pos(0);
    let p1 = path.pos(1);
    let dx = p1.x - p0.x;
    let dy = p1.y - p0.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len <= f32::EPSILON {
        return None;
    }
    let mag = (v_init * BACKPROJECT_SCALE_MS).min(BACKPROJECT_MAX);
    Some(Point::new(p0.x - dx / len * mag, p0.y - dy / len * mag))
}

fn end_anchor(path: &SampledPath, layout: &KeyLayout) -> EndAnchor {
    let n = path.len();
    let take = START_ANCHOR_POINTS.min(n);
    let centroid = centroid_of(path, n - take..n);

    let ranked_keys = layout.keys_within(centroid, layout.neighbourhood_radius(), MAX_START_KEYS);
    let closest_key = ranked_keys.first().map(|(c, _)| *c);

    EndAnchor {
        centroid,
        ranked_keys,
        closest_key,
    }
}
