//! Key layout model: letter centroids, per-key neighbourhoods, and the
//! synthetic gesture tracer used by the CLI and tests.

use glide_types::{Point, RawPoint};

/// Neighbourhood radius as a multiple of key half-pitch.
pub const NEIGHBOURHOOD_FACTOR: f32 = 2.5;
/// A key keeps at most this many neighbours.
pub const MAX_NEIGHBOURS: usize = 6;
/// A point sits in a dense layout region when at least this many keys fall
/// within [`DENSE_REGION_RADIUS`].
pub const DENSE_REGION_KEYS: usize = 4;
pub const DENSE_REGION_RADIUS: f32 = 55.0;

/// Synthetic gestures emit one point per this interval, mimicking a ~100 Hz
/// touch stream.
pub const TRACE_INTERVAL_MS: u32 = 10;

const LETTER_COUNT: usize = 26;

#[inline]
pub(crate) fn letter_index(c: char) -> Option<usize> {
    if c.is_ascii_lowercase() {
        Some(c as usize - 'a' as usize)
    } else {
        None
    }
}

#[inline]
fn index_letter(i: usize) -> char {
    (b'a' + i as u8) as char
}

/// Vertical third of the layout a key's centroid falls in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowThird {
    Top,
    Middle,
    Bottom,
}

/// Fixed-capacity neighbour list, distance-sorted ascending.
#[derive(Clone, Copy, Debug)]
pub struct Neighbours {
    entries: [(char, f32); MAX_NEIGHBOURS],
    len: usize,
}

impl Default for Neighbours {
    fn default() -> Self {
        Self {
            entries: [('\0', 0.0); MAX_NEIGHBOURS],
            len: 0,
        }
    }
}

impl Neighbours {
    pub fn iter(&self) -> impl Iterator<Item = (char, f32)> + '_ {
        self.entries[..self.len].iter().copied()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn push(&mut self, letter: char, dist: f32) {
        if self.len < MAX_NEIGHBOURS {
            self.entries[self.len] = (letter, dist);
            self.len += 1;
        }
    }
}

/// Immutable letter -> centroid mapping with derived neighbourhoods.
///
/// Letter-indexed dense arrays rather than hash maps: the scoring loop looks
/// keys up per letter per candidate.
#[derive(Clone, Debug)]
pub struct KeyLayout {
    centroids: [Option<Point>; LETTER_COUNT],
    neighbours: [Neighbours; LETTER_COUNT],
    half_pitch: f32,
    y_min: f32,
    y_max: f32,
}

impl KeyLayout {
    /// Build a layout from arbitrary letter centroids. Non-lowercase-ASCII
    /// letters are ignored.
    pub fn from_centroids<I>(centroids: I, half_pitch: f32) -> Self
    where
        I: IntoIterator<Item = (char, Point)>,
    {
        let mut keys: [Option<Point>; LETTER_COUNT] = [None; LETTER_COUNT];
        for (c, p) in centroids {
            if let Some(i) = letter_index(c) {
                keys[i] = Some(p);
            }
        }

        let mut y_min = f32::INFINITY;
        let mut y_max = f32::NEG_INFINITY;
        for p in keys.iter().flatten() {
            y_min = y_min.min(p.y);
            y_max = y_max.max(p.y);
        }
        if !y_min.is_finite() {
            y_min = 0.0;
            y_max = 0.0;
        }

        let mut layout = Self {
            centroids: keys,
            neighbours: [Neighbours::default(); LETTER_COUNT],
            half_pitch,
            y_min,
            y_max,
        };
        layout.build_neighbourhoods();
        layout
    }

    /// The three-row QWERTY grid, centroids centred on a uniform pitch.
    pub fn qwerty(pitch: f32) -> Self {
        let rows = [
            ("qwertyuiop", 0.0, 0.0),
            ("asdfghjkl", 0.5, 1.0),
            ("zxcvbnm", 1.5, 2.0),
        ];

        let half = pitch * 0.5;
        let mut centroids = Vec::with_capacity(LETTER_COUNT);
        for (chars, x_offset, y) in rows {
            for (i, c) in chars.chars().enumerate() {
                centroids.push((
                    c,
                    Point::new((i as f32 + x_offset) * pitch + half, y * pitch + half),
                ));
            }
        }
        Self::from_centroids(centroids, half)
    }

    fn build_neighbourhoods(&mut self) {
        let radius_sq = self.neighbourhood_radius() * self.neighbourhood_radius();
        for i in 0..LETTER_COUNT {
            let Some(centre) = self.centroids[i] else {
                continue;
            };
            let mut near: Vec<(char, f32)> = Vec::new();
            for (j, other) in self.centroids.iter().enumerate() {
                if i == j {
                    continue;
                }
                if let Some(p) = other {
                    let d_sq = centre.dist_sq(p);
                    if d_sq < radius_sq {
                        near.push((index_letter(j), d_sq.sqrt()));
                    }
                }
            }
            near.sort_by(|a, b| a.1.total_cmp(&b.1));
            let mut list = Neighbours::default();
            for (c, d) in near.into_iter().take(MAX_NEIGHBOURS) {
                list.push(c, d);
            }
            self.neighbours[i] = list;
        }
    }

    pub fn key_centroid(&self, letter: char) -> Option<Point> {
        letter_index(letter).and_then(|i| self.centroids[i])
    }

    pub fn contains(&self, letter: char) -> bool {
        self.key_centroid(letter).is_some()
    }

    pub fn half_pitch(&self) -> f32 {
        self.half_pitch
    }

    /// Traversal disc radius, roughly half the key pitch.
    pub fn key_radius(&self) -> f32 {
        self.half_pitch
    }

    pub fn neighbourhood_radius(&self) -> f32 {
        self.half_pitch * NEIGHBOURHOOD_FACTOR
    }

    pub fn neighbours(&self, letter: char) -> Neighbours {
        letter_index(letter)
            .map(|i| self.neighbours[i])
            .unwrap_or_default()
    }

    pub fn letters(&self) -> impl Iterator<Item = (char, Point)> + '_ {
        self.centroids
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.map(|p| (index_letter(i), p)))
    }

    pub fn nearest_key(&self, p: Point) -> Option<(char, f32)> {
        let (first, _) = self.nearest_two(p);
        first
    }

    /// Closest key and runner-up, by centroid distance.
    pub fn nearest_two(&self, p: Point) -> (Option<(char, f32)>, Option<(char, f32)>) {
        let mut first: Option<(char, f32)> = None;
        let mut second: Option<(char, f32)> = None;
        for (c, centre) in self.letters() {
            let d = centre.dist(&p);
            match first {
                Some((_, best)) if d >= best => {
                    if second.map_or(true, |(_, s)| d < s) {
                        second = Some((c, d));
                    }
                }
                _ => {
                    second = first;
                    first = Some((c, d));
                }
            }
        }
        (first, second)
    }

    /// Keys within `radius` of `p`, ascending by distance, at most `cap`.
    pub fn keys_within(&self, p: Point, radius: f32, cap: usize) -> Vec<(char, f32)> {
        let mut hits: Vec<(char, f32)> = self
            .letters()
            .filter_map(|(c, centre)| {
                let d = centre.dist(&p);
                (d <= radius).then_some((c, d))
            })
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits.truncate(cap);
        hits
    }

    /// Number of other keys within `radius` of this key's centroid.
    pub fn neighbour_count_within(&self, letter: char, radius: f32) -> usize {
        let Some(centre) = self.key_centroid(letter) else {
            return 0;
        };
        let r_sq = radius * radius;
        self.letters()
            .filter(|(c, p)| *c != letter && centre.dist_sq(p) < r_sq)
            .count()
    }

    pub fn is_dense_region(&self, p: Point) -> bool {
        let r_sq = DENSE_REGION_RADIUS * DENSE_REGION_RADIUS;
        self.letters().filter(|(_, k)| k.dist_sq(&p) < r_sq).count() >= DENSE_REGION_KEYS
    }

    pub fn row_third(&self, letter: char) -> Option<RowThird> {
        let p = self.key_centroid(letter)?;
        let span = self.y_max - self.y_min;
        if span <= 0.0 {
            return Some(RowThird::Middle);
        }
        let rel = (p.y - self.y_min) / span;
        Some(if rel < 1.0 / 3.0 {
            RowThird::Top
        } else if rel > 2.0 / 3.0 {
            RowThird::Bottom
        } else {
            RowThird::Middle
        })
    }
}

/// Set of lowercase letters as a 26-bit mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LetterSet(u32);

impl LetterSet {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, letter: char) {
        if let Some(i) = letter_index(letter) {
            self.0 |= 1 << i;
        }
    }

    pub fn contains(&self, letter: char) -> bool {
        letter_index(letter).is_some_and(|i| self.0 & (1 << i) != 0)
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        let bits = self.0;
        (0..LETTER_COUNT).filter_map(move |i| (bits & (1 << i) != 0).then(|| index_letter(i)))
    }
}

impl FromIterator<char> for LetterSet {
    fn from_iter<I: IntoIterator<Item = char>>(iter: I) -> Self {
        let mut set = Self::new();
        for c in iter {
            set.insert(c);
        }
        set
    }
}

/// Interpolate a synthetic gesture through a word's key centroids at a given
/// speed (px/ms), one point per [`TRACE_INTERVAL_MS`]. Repeated letters get a
/// short dwell so the path carries the same evidence a finger would leave.
pub fn trace_word(word: &str, layout: &KeyLayout, speed: f32) -> Vec<RawPoint> {
    let key_points: Vec<Point> = word
        .chars()
        .filter_map(|c| layout.key_centroid(c.to_ascii_lowercase()))
        .collect();

    if key_points.is_empty() {
        return vec![];
    }

    let step = (speed.max(0.1)) * TRACE_INTERVAL_MS as f32;
    let mut t_ms = 0u32;
    let mut path = vec![RawPoint::new(key_points[0].x, key_points[0].y, 0)];

    for i in 1..key_points.len() {
        let p1 = key_points[i - 1];
        let p2 = key_points[i];
        let dist = p1.dist(&p2);

        if dist < 1.0 {
            // Repeated letter: dwell in place for a few frames.
            for _ in 0..4 {
                t_ms += TRACE_INTERVAL_MS;
                path.push(RawPoint::new(p1.x, p1.y, t_ms));
            }
            continue;
        }

        let num_steps = (dist / step).ceil() as u32;
        let dx = (p2.x - p1.x) / num_steps as f32;
        let dy = (p2.y - p1.y) / num_steps as f32;
        for s in 1..num_steps {
            t_ms += TRACE_INTERVAL_MS;
            path.push(RawPoint::new(
                p1.x + dx * s as f32,
                p1.y + dy * s as f32,
                t_ms,
            ));
        }
        t_ms += TRACE_INTERVAL_MS;
        path.push(RawPoint::new(p2.x, p2.y, t_ms));
    }

    path
}
