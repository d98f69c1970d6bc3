use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A position in view coordinates (pixels). Single precision throughout the
/// decoder so scored test vectors reproduce across targets.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn dist_sq(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn dist(&self, other: &Point) -> f32 {
        self.dist_sq(other).sqrt()
    }
}

/// One raw touch event, timestamped in milliseconds since gesture start.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RawPoint {
    pub x: f32,
    pub y: f32,
    pub t_ms: u32,
}

impl RawPoint {
    pub fn new(x: f32, y: f32, t_ms: u32) -> Self {
        Self { x, y, t_ms }
    }

    pub fn pos(&self) -> Point {
        Point { x: self.x, y: self.y }
    }
}

/// A sampled path point carrying instantaneous speed in px/ms.
#[derive(Clone, Copy, Debug)]
pub struct PathPoint {
    pub x: f32,
    pub y: f32,
    pub t_ms: u32,
    pub v: f32,
}

impl PathPoint {
    pub fn pos(&self) -> Point {
        Point { x: self.x, y: self.y }
    }
}

/// One ranked candidate returned to the caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Prediction {
    pub word: String,
    pub score: f32,
    pub freq: u32,
    /// Set on the top pair when the winner does not clear the runner-up by a
    /// safe margin; callers typically render both.
    pub is_ambiguous: bool,
}

/// Per-gesture decode telemetry.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub path_confidence: f32,
    pub candidate_count: usize,
    pub elapsed_ms: u32,
}

/// Successful decode result: ranked candidates plus telemetry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Decoded {
    pub candidates: Vec<Prediction>,
    pub diagnostics: Diagnostics,
}

/// Serializable lexicon model: words in descending frequency order with
/// per-word counts.
#[derive(Encode, Decode)]
pub struct LexiconData {
    /// Descending frequency, lexicographic tie-break.
    pub words: Vec<String>,
    pub word_info: HashMap<String, WordInfo>,
    /// Sum of all counts; the corpus size the Zipf prior normalises against.
    pub corpus_total: u64,
}

#[derive(Encode, Decode, Clone, Copy, Debug, Default)]
pub struct WordInfo {
    pub count: u32,
}

impl LexiconData {
    pub fn new() -> Self {
        Self {
            words: Vec::new(),
            word_info: HashMap::new(),
            corpus_total: 0,
        }
    }
}

impl Default for LexiconData {
    fn default() -> Self {
        Self::new()
    }
}
