//! Per-gesture geometric analysis: curvature, inflections, simplified
//! vertices, dwell clusters, key traversals, and the scalar path confidence.
//!
//! Everything here is a pure function of `(SampledPath, KeyLayout)`. The
//! analyzer owns reusable scratch buffers sized to the sampler cap; one
//! analyzer instance serves one decoder.

use crate::layout::KeyLayout;
use crate::sampler::{SampledPath, MAX_POINTS};
use glide_types::Point;
use tracing::warn;

/// Curvature magnitude that makes a point an inflection (rad).
pub const INFLECTION_THRESHOLD: f32 = 0.52;
/// Stricter angle for an intentional turn (rad).
pub const INTENTIONAL_ANGLE: f32 = 0.87;
/// An intentional turn must land this close to some key (px).
pub const INTENTIONAL_KEY_DISTANCE: f32 = 60.0;
/// Corner-compensation offset cap (px).
pub const CORNER_COMPENSATION_MAX: f32 = 25.0;
/// Corners faster than this get compensated (px/ms).
const CORNER_COMPENSATION_VELOCITY: f32 = 2.0;
const CORNER_COMPENSATION_SCALE: f32 = 4.0;

/// Douglas-Peucker tolerance (px).
pub const VERTEX_EPSILON: f32 = 15.0;
/// Turn angle that makes a simplified vertex significant (rad).
pub const VERTEX_ANGLE: f32 = 1.22;
/// Angle threshold scale inside dense layout regions.
const DENSE_ANGLE_SCALE: f32 = 0.9;
/// Velocity-drop fraction that makes a vertex significant.
pub const VERTEX_VELOCITY_DROP: f32 = 0.35;
/// A vertex remembers its nearest key when within this radius (px).
pub const WIDE_ANGLE_RADIUS: f32 = 65.0;
/// Fly-by candidates must clear both segment anchors by this much (px).
pub const FLYBY_GAP: f32 = 35.0;
/// Only segments at least this long are swept for fly-by keys (px).
const FLYBY_MIN_SEGMENT: f32 = 100.0;

/// Dwell speed ceiling (px/ms).
pub const DWELL_VELOCITY: f32 = 3.0;
/// Minimum run length for a dwell cluster.
pub const DWELL_MIN_RUN: usize = 3;
/// Dwell cluster point cloud must fit this radius (squared px).
pub const DWELL_CLUSTER_RADIUS_SQ: f32 = 2500.0;
/// Dwell cluster centroid must land this close to a key (px).
pub const DWELL_KEY_DISTANCE: f32 = 55.0;

/// Velocity bands (px/ms). SLOW comes from the contract; the NORMAL ceiling
/// is calibrated against representative gestures.
pub const SLOW_VELOCITY: f32 = 0.3;
pub const NORMAL_VELOCITY_THRESHOLD: f32 = 6.0;

const MAX_CURVATURE: f32 = std::f32::consts::PI;

/// A curvature extremum on the path.
#[derive(Clone, Copy, Debug)]
pub struct InflectionPoint {
    pub index: usize,
    pub position: Point,
    pub angle: f32,
    pub nearest_key: Option<char>,
    pub key_distance: f32,
    pub is_intentional: bool,
    /// Overshoot-corrected apex for fast intentional corners.
    pub compensated: Option<Point>,
    pub velocity: f32,
}

/// A Douglas-Peucker anchor (or synthetic fly-by) on the simplified path.
#[derive(Clone, Copy, Debug)]
pub struct PathVertex {
    pub index: usize,
    pub position: Point,
    pub angle: f32,
    pub nearest_key: Option<char>,
    pub is_significant: bool,
    pub is_fly_by: bool,
}

/// A contiguous low-velocity run collapsed to one interest point.
#[derive(Clone, Copy, Debug)]
pub struct DwellInterestPoint {
    pub start: usize,
    pub end: usize,
    pub centroid: Point,
    pub nearest_key: Option<char>,
    pub key_distance: f32,
}

impl DwellInterestPoint {
    pub fn contains_index(&self, i: usize) -> bool {
        i >= self.start && i <= self.end
    }
}

/// Best segment-disc crossing for one key.
#[derive(Clone, Copy, Debug)]
pub struct KeyTraversal {
    pub letter: char,
    pub index: usize,
    pub intersection: Point,
    pub entry_angle: f32,
    pub dwell_time_ms: u32,
    pub velocity: f32,
    pub confidence: f32,
}

const LETTER_COUNT: usize = 26;

/// Read-only analysis bundle, computed once per gesture.
#[derive(Clone, Debug)]
pub struct GeometricAnalysis {
    pub curvature: Vec<f32>,
    pub velocity: Vec<f32>,
    pub inflections: Vec<InflectionPoint>,
    pub vertices: Vec<PathVertex>,
    pub dwell_points: Vec<DwellInterestPoint>,
    traversed: [Option<KeyTraversal>; LETTER_COUNT],
    pub confidence: f32,
}

impl GeometricAnalysis {
    /// The all-empty analysis a stage falls back to on numeric anomalies.
    pub fn empty() -> Self {
        Self {
            curvature: Vec::new(),
            velocity: Vec::new(),
            inflections: Vec::new(),
            vertices: Vec::new(),
            dwell_points: Vec::new(),
            traversed: [None; LETTER_COUNT],
            confidence: 0.0,
        }
    }

    pub fn traversal(&self, letter: char) -> Option<&KeyTraversal> {
        crate::layout::letter_index(letter).and_then(|i| self.traversed[i].as_ref())
    }

    pub fn traversals(&self) -> impl Iterator<Item = &KeyTraversal> {
        self.traversed.iter().flatten()
    }

    pub fn significant_vertex_count(&self) -> usize {
        self.vertices.iter().filter(|v| v.is_significant).count()
    }

    pub fn intentional_inflection_count(&self) -> usize {
        self.inflections.iter().filter(|i| i.is_intentional).count()
    }

    /// Is there an intentional inflection whose nearest key is `letter`?
    pub fn intentional_inflection_on(&self, letter: char) -> bool {
        self.inflections
            .iter()
            .any(|i| i.is_intentional && i.nearest_key == Some(letter))
    }

    pub fn intentional_inflection_near_index(&self, index: usize, window: usize) -> bool {
        self.inflections
            .iter()
            .any(|i| i.is_intentional && i.index.abs_diff(index) <= window)
    }
}

/// Geometry stage with pooled scratch buffers, reused across gestures.
pub struct PathAnalyzer {
    curvature: Vec<f32>,
    keep: Vec<bool>,
    stack: Vec<(usize, usize)>,
}

impl Default for PathAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl PathAnalyzer {
    pub fn new() -> Self {
        Self {
            curvature: Vec::with_capacity(MAX_POINTS),
            keep: Vec::with_capacity(MAX_POINTS),
            stack: Vec::with_capacity(64),
        }
    }

    /// Analyze one gesture. Falls back to the empty analysis when the math
    /// degenerates instead of letting NaNs reach the scorer.
    pub fn analyze(&mut self, path: &SampledPath, layout: &KeyLayout) -> GeometricAnalysis {
        let analysis = self.analyze_inner(path, layout);
        let finite = analysis.confidence.is_finite()
            && analysis.curvature.iter().all(|c| c.is_finite())
            && analysis.velocity.iter().all(|v| v.is_finite());
        if finite {
            analysis
        } else {
            warn!(points = path.len(), "non-finite geometry, dropping analysis");
            GeometricAnalysis::empty()
        }
    }

    fn analyze_inner(&mut self, path: &SampledPath, layout: &KeyLayout) -> GeometricAnalysis {
        let n = path.len();
        self.compute_curvature(path);

        let velocity: Vec<f32> = path.points().iter().map(|p| p.v).collect();
        let inflections = self.find_inflections(path, layout, &velocity);
        let anchors = self.douglas_peucker(path);
        let mut vertices = find_vertices(&anchors, path, layout, &velocity);
        add_fly_by_vertices(&anchors, path, layout, &mut vertices);
        let dwell_points = find_dwell_points(path, layout, &velocity);
        let traversed = sweep_traversals(path, layout);
        let confidence = self.path_confidence(&inflections, &velocity, n);

        GeometricAnalysis {
            curvature: self.curvature.clone(),
            velocity,
            inflections,
            vertices,
            dwell_points,
            traversed,
            confidence,
        }
    }

    fn compute_curvature(&mut self, path: &SampledPath) {
        let n = path.len();
        self.curvature.clear();
        self.curvature.resize(n, 0.0);
        for i in 1..n - 1 {
            self.curvature[i] = turn_angle(path.pos(i - 1), path.pos(i), path.pos(i + 1));
        }
        if n > 2 {
            self.curvature[0] = self.curvature[1];
            self.curvature[n - 1] = self.curvature[n - 2];
        }
    }

    fn find_inflections(
        &self,
        path: &SampledPath,
        layout: &KeyLayout,
        velocity: &[f32],
    ) -> Vec<InflectionPoint> {
        let n = path.len();
        let mut out = Vec::new();
        for i in 1..n - 1 {
            let angle = self.curvature[i];
            if angle.abs() <= INFLECTION_THRESHOLD {
                continue;
            }
            let position = path.pos(i);
            let (mut nearest_key, mut key_distance) = match layout.nearest_key(position) {
                Some((c, d)) => (Some(c), d),
                None => (None, f32::INFINITY),
            };
            let is_intentional =
                angle.abs() > INTENTIONAL_ANGLE && key_distance < INTENTIONAL_KEY_DISTANCE;

            let mut compensated = None;
            if is_intentional && velocity[i] > CORNER_COMPENSATION_VELOCITY {
                if let Some(apex) = compensate_corner(path, i, velocity[i]) {
                    // A fast finger overshoots; the corrected apex may point
                    // at a different key than the raw corner does.
                    if let Some((c, d)) = layout.nearest_key(apex) {
                        if d < key_distance {
                            nearest_key = Some(c);
                            key_distance = d;
                        }
                    }
                    compensated = Some(apex);
                }
            }

            out.push(InflectionPoint {
                index: i,
                position,
                angle,
                nearest_key,
                key_distance,
                is_intentional,
                compensated,
                velocity: velocity[i],
            });
        }
        out
    }

    fn douglas_peucker(&mut self, path: &SampledPath) -> Vec<usize> {
        let n = path.len();
        self.keep.clear();
        self.keep.resize(n, false);
        self.keep[0] = true;
        self.keep[n - 1] = true;

        self.stack.clear();
        self.stack.push((0, n - 1));
        while let Some((lo, hi)) = self.stack.pop() {
            if hi <= lo + 1 {
                continue;
            }
            let a = path.pos(lo);
            let b = path.pos(hi);
            let mut worst = 0.0f32;
            let mut worst_i = lo;
            for i in lo + 1..hi {
                let d = perpendicular_distance(path.pos(i), a, b);
                if d > worst {
                    worst = d;
                    worst_i = i;
                }
            }
            if worst > VERTEX_EPSILON {
                self.keep[worst_i] = true;
                self.stack.push((lo, worst_i));
                self.stack.push((worst_i, hi));
            }
        }

        (0..n).filter(|&i| self.keep[i]).collect()
    }

    fn path_confidence(&self, inflections: &[InflectionPoint], velocity: &[f32], n: usize) -> f32 {
        let intentional_ratio = if inflections.is_empty() {
            1.0
        } else {
            inflections.iter().filter(|i| i.is_intentional).count() as f32
                / inflections.len() as f32
        };

        let consistency = velocity_consistency(&velocity[1..]);

        let mean_curvature = if n > 2 {
            self.curvature[1..n - 1].iter().map(|c| c.abs()).sum::<f32>() / (n - 2) as f32
        } else {
            0.0
        };
        let smoothness = (1.0 - mean_curvature / MAX_CURVATURE).clamp(0.0, 1.0);

        (0.40 * intentional_ratio + 0.25 * consistency + 0.35 * smoothness).clamp(0.0, 1.0)
    }
}

fn find_vertices(
    anchors: &[usize],
    path: &SampledPath,
    layout: &KeyLayout,
    velocity: &[f32],
) -> Vec<PathVertex> {
    let mut out = Vec::new();

    for k in 1..anchors.len().saturating_sub(1) {
        let idx = anchors[k];
        let prev = path.pos(anchors[k - 1]);
        let next = path.pos(anchors[k + 1]);
        let raw_pos = path.pos(idx);

        let mut position = raw_pos;
        let mut angle = turn_angle(prev, raw_pos, next).abs();

        // Bias toward key-snapped vertices: when the nearest key sits closer
        // than the anchor's own approximation error, the key is the better
        // estimate of the intended corner.
        let nearest = layout.nearest_key(raw_pos);
        if let Some((c, d)) = nearest {
            let approx_err = perpendicular_distance(raw_pos, prev, next);
            if d < approx_err {
                if let Some(snapped) = layout.key_centroid(c) {
                    position = snapped;
                    angle = turn_angle(prev, snapped, next).abs();
                }
            }
        }

        let mut angle_threshold = VERTEX_ANGLE;
        if layout.is_dense_region(position) {
            angle_threshold *= DENSE_ANGLE_SCALE;
        }

        let by_angle = angle > angle_threshold;
        let by_velocity = {
            let local = local_average(velocity, idx, 4);
            local > 0.0 && velocity[idx] < VERTEX_VELOCITY_DROP * local
        };

        out.push(PathVertex {
            index: idx,
            position,
            angle,
            nearest_key: nearest.filter(|(_, d)| *d < WIDE_ANGLE_RADIUS).map(|(c, _)| c),
            is_significant: by_angle || by_velocity,
            is_fly_by: false,
        });
    }
    out
}

/// Promote keys closely skimmed mid-segment to synthetic vertices.
fn add_fly_by_vertices(
    anchors: &[usize],
    path: &SampledPath,
    layout: &KeyLayout,
    vertices: &mut Vec<PathVertex>,
) {
    let mut extra = Vec::new();

    for w in anchors.windows(2) {
        let a = path.pos(w[0]);
        let b = path.pos(w[1]);
        if a.dist(&b) < FLYBY_MIN_SEGMENT {
            continue;
        }

        for (letter, centroid) in layout.letters() {
            let accounted = vertices
                .iter()
                .chain(extra.iter())
                .any(|v: &PathVertex| v.nearest_key == Some(letter));
            if accounted {
                continue;
            }
            if centroid.dist(&a) < FLYBY_GAP || centroid.dist(&b) < FLYBY_GAP {
                continue;
            }
            if segment_distance(centroid, a, b) > layout.key_radius() {
                continue;
            }
            let angle = turn_angle(a, centroid, b).abs();
            if angle <= VERTEX_ANGLE {
                continue;
            }
            let index = nearest_path_index(path, centroid, w[0], w[1]);
            extra.push(PathVertex {
                index,
                position: centroid,
                angle,
                nearest_key: Some(letter),
                is_significant: true,
                is_fly_by: true,
            });
        }
    }

    vertices.extend(extra);
    vertices.sort_by_key(|v| v.index);
}

fn velocity_consistency(v: &[f32]) -> f32 {
    if v.is_empty() {
        return 0.0;
    }
    let mean = v.iter().sum::<f32>() / v.len() as f32;
    if mean <= 0.0 {
        return 0.0;
    }
    let var = v.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / v.len() as f32;
    (1.0 - var.sqrt() / mean).clamp(0.0, 1.0)
}

/// Signed turn angle at `b` between `a -> b` and `b -> c`.
fn turn_angle(a: Point, b: Point, c: Point) -> f32 {
    let v1x = b.x - a.x;
    let v1y = b.y - a.y;
    let v2x = c.x - b.x;
    let v2y = c.y - b.y;
    let cross = v1x * v2y - v1y * v2x;
    let dot = v1x * v2x + v1y * v2y;
    if cross == 0.0 && dot == 0.0 {
        0.0
    } else {
        cross.atan2(dot)
    }
}

fn compensate_corner(path: &SampledPath, i: usize, velocity: f32) -> Option<Point> {
    let p = path.pos(i);
    let u1 = normalize(path.pos(i - 1), p)?;
    let u2 = normalize(p, path.pos(i + 1))?;
    let (bx, by) = (u2.0 - u1.0, u2.1 - u1.1);
    let len = (bx * bx + by * by).sqrt();
    if len <= f32::EPSILON {
        return None;
    }
    let mag = (velocity * CORNER_COMPENSATION_SCALE).min(CORNER_COMPENSATION_MAX);
    Some(Point::new(p.x + bx / len * mag, p.y + by / len * mag))
}

fn normalize(from: Point, to: Point) -> Option<(f32, f32)> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len <= f32::EPSILON {
        None
    } else {
        Some((dx / len, dy / len))
    }
}

fn perpendicular_distance(p: Point, a: Point, b: Point) -> f32 {
    let len_sq = a.dist_sq(&b);
    if len_sq <= f32::EPSILON {
        return p.dist(&a);
    }
    let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    cross.abs() / len_sq.sqrt()
}

/// Distance from `p` to the closed segment `a..b`.
fn segment_distance(p: Point, a: Point, b: Point) -> f32 {
    closest_on_segment(p, a, b).dist(&p)
}

fn closest_on_segment(p: Point, a: Point, b: Point) -> Point {
    let len_sq = a.dist_sq(&b);
    if len_sq <= f32::EPSILON {
        return a;
    }
    let t = (((p.x - a.x) * (b.x - a.x) + (p.y - a.y) * (b.y - a.y)) / len_sq).clamp(0.0, 1.0);
    Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

fn nearest_path_index(path: &SampledPath, target: Point, lo: usize, hi: usize) -> usize {
    let mut best = lo;
    let mut best_d = f32::INFINITY;
    for i in lo..=hi.min(path.len() - 1) {
        let d = path.pos(i).dist_sq(&target);
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

fn local_average(v: &[f32], i: usize, window: usize) -> f32 {
    let lo = i.saturating_sub(window);
    let hi = (i + window).min(v.len() - 1);
    let mut sum = 0.0;
    let mut count = 0;
    for (j, x) in v.iter().enumerate().take(hi + 1).skip(lo) {
        if j != i {
            sum += x;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

fn find_dwell_points(
    path: &SampledPath,
    layout: &KeyLayout,
    velocity: &[f32],
) -> Vec<DwellInterestPoint> {
    let mut out = Vec::new();
    let n = path.len();
    let mut i = 0;
    while i < n {
        if velocity[i] >= DWELL_VELOCITY {
            i += 1;
            continue;
        }
        let start = i;
        while i < n && velocity[i] < DWELL_VELOCITY {
            i += 1;
        }
        let end = i - 1;
        if end - start + 1 < DWELL_MIN_RUN {
            continue;
        }

        let count = (end - start + 1) as f32;
        let cx = (start..=end).map(|j| path.pos(j).x).sum::<f32>() / count;
        let cy = (start..=end).map(|j| path.pos(j).y).sum::<f32>() / count;
        let centroid = Point::new(cx, cy);

        let compact = (start..=end)
            .all(|j| path.pos(j).dist_sq(&centroid) <= DWELL_CLUSTER_RADIUS_SQ);
        if !compact {
            continue;
        }

        if let Some((c, d)) = layout.nearest_key(centroid) {
            if d < DWELL_KEY_DISTANCE {
                out.push(DwellInterestPoint {
                    start,
                    end,
                    centroid,
                    nearest_key: Some(c),
                    key_distance: d,
                });
            }
        }
    }
    out
}

fn sweep_traversals(path: &SampledPath, layout: &KeyLayout) -> [Option<KeyTraversal>; LETTER_COUNT] {
    let mut out: [Option<KeyTraversal>; LETTER_COUNT] = [None; LETTER_COUNT];
    let r = layout.key_radius();
    let n = path.len();

    for (letter, centroid) in layout.letters() {
        let slot = crate::layout::letter_index(letter).unwrap();
        let mut best: Option<KeyTraversal> = None;

        for i in 0..n - 1 {
            let a = path.pos(i);
            let b = path.pos(i + 1);
            let hit = closest_on_segment(centroid, a, b);
            let d = hit.dist(&centroid);
            if d > r {
                continue;
            }
            let v = path.point(i + 1).v;
            let vscore = if v <= SLOW_VELOCITY {
                1.0
            } else if v <= NORMAL_VELOCITY_THRESHOLD {
                0.85
            } else {
                0.7
            };
            let confidence = (1.0 - d / r) * 0.7 + vscore * 0.3;
            if best.as_ref().map_or(true, |t| confidence > t.confidence) {
                best = Some(KeyTraversal {
                    letter,
                    index: i,
                    intersection: hit,
                    entry_angle: (b.y - a.y).atan2(b.x - a.x),
                    dwell_time_ms: 0,
                    velocity: v,
                    confidence,
                });
            }
        }

        if let Some(mut t) = best {
            let r_sq = r * r;
            let mut dwell = 0u32;
            for i in 1..n {
                let p = path.point(i);
                if p.v < DWELL_VELOCITY && p.pos().dist_sq(&centroid) <= r_sq {
                    dwell += p.t_ms - path.point(i - 1).t_ms;
                }
            }
            t.dwell_time_ms = dwell;
            out[slot] = Some(t);
        }
    }
    out
}
