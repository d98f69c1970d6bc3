//! Raw touch stream -> decimated, velocity-annotated path.

use glide_types::{DecodeError, PathPoint, Point, RawPoint};

/// Hard cap on sampled path length; longer inputs are re-interpolated.
pub const MAX_POINTS: usize = 500;
/// Successive points closer than this (squared px) are decimated.
pub const MIN_DISTANCE_SQ: f32 = 25.0;
/// Below this speed (px/ms) close points are kept anyway, so dwells survive
/// decimation.
pub const DWELL_KEEP_VELOCITY: f32 = 0.3;

/// An ordered gesture path with per-point instantaneous speed.
#[derive(Clone, Debug)]
pub struct SampledPath {
    points: Vec<PathPoint>,
    arc_length: f32,
}

impl SampledPath {
    pub fn points(&self) -> &[PathPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, i: usize) -> PathPoint {
        self.points[i]
    }

    pub fn pos(&self, i: usize) -> Point {
        self.points[i].pos()
    }

    pub fn first(&self) -> PathPoint {
        self.points[0]
    }

    pub fn last(&self) -> PathPoint {
        self.points[self.points.len() - 1]
    }

    pub fn arc_length(&self) -> f32 {
        self.arc_length
    }

    pub fn duration_ms(&self) -> u32 {
        self.last().t_ms - self.first().t_ms
    }

    pub fn average_velocity(&self) -> f32 {
        let dur = self.duration_ms();
        if dur == 0 {
            0.0
        } else {
            self.arc_length / dur as f32
        }
    }
}

/// Decimate, re-interpolate, and annotate one gesture's raw events.
pub fn sample(raw: &[RawPoint]) -> Result<SampledPath, DecodeError> {
    if raw.len() < 2 {
        return Err(DecodeError::NotASwipe);
    }

    let mut accepted: Vec<RawPoint> = Vec::with_capacity(raw.len().min(MAX_POINTS * 2));
    accepted.push(raw[0]);

    for p in &raw[1..] {
        let prev = *accepted.last().unwrap();
        // Timestamps must be strictly increasing downstream.
        let t_ms = p.t_ms.max(prev.t_ms + 1);
        let p = RawPoint::new(p.x, p.y, t_ms);

        let d_sq = prev.pos().dist_sq(&p.pos());
        if d_sq < MIN_DISTANCE_SQ {
            let dt = (p.t_ms - prev.t_ms).max(1) as f32;
            let v = d_sq.sqrt() / dt;
            if v >= DWELL_KEEP_VELOCITY {
                continue;
            }
        }
        accepted.push(p);
    }

    if accepted.len() < 3 {
        return Err(DecodeError::NotASwipe);
    }

    let arc_length: f32 = accepted
        .windows(2)
        .map(|w| w[0].pos().dist(&w[1].pos()))
        .sum();
    if arc_length <= 0.0 {
        return Err(DecodeError::NotASwipe);
    }

    let resampled = if accepted.len() > MAX_POINTS {
        resample_uniform(&accepted, arc_length, MAX_POINTS)
    } else {
        accepted
    };

    let mut points = Vec::with_capacity(resampled.len());
    points.push(PathPoint {
        x: resampled[0].x,
        y: resampled[0].y,
        t_ms: resampled[0].t_ms,
        v: 0.0,
    });
    for w in resampled.windows(2) {
        let d = w[0].pos().dist(&w[1].pos());
        let dt = (w[1].t_ms - w[0].t_ms).max(1) as f32;
        points.push(PathPoint {
            x: w[1].x,
            y: w[1].y,
            t_ms: w[1].t_ms,
            v: d / dt,
        });
    }

    Ok(SampledPath { points, arc_length })
}

/// Uniform arc-length re-interpolation down to `target` points.
fn resample_uniform(points: &[RawPoint], arc_length: f32, target: usize) -> Vec<RawPoint> {
    let mut out = Vec::with_capacity(target);
    out.push(points[0]);

    let step = arc_length / (target - 1) as f32;
    let mut seg = 0;
    let mut seg_start_arc = 0.0;
    let mut seg_len = points[1].pos().dist(&points[0].pos());

    for i in 1..target - 1 {
        let want = step * i as f32;
        while seg_start_arc + seg_len < want && seg + 2 < points.len() {
            seg_start_arc += seg_len;
            seg += 1;
            seg_len = points[seg + 1].pos().dist(&points[seg].pos());
        }
        let a = points[seg];
        let b = points[seg + 1];
        let t = if seg_len > 0.0 {
            ((want - seg_start_arc) / seg_len).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let t_ms = a.t_ms + ((b.t_ms - a.t_ms) as f32 * t) as u32;
        let prev_t = out.last().unwrap().t_ms;
        out.push(RawPoint::new(
            a.x + (b.x - a.x) * t,
            a.y + (b.y - a.y) * t,
            t_ms.max(prev_t + 1),
        ));
    }

    let last = points[points.len() - 1];
    let prev_t = out.last().unwrap().t_ms;
    out.push(RawPoint::new(last.x, last.y, last.t_ms.max(prev_t + 1)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize, spacing: f32, dt: u32) -> Vec<RawPoint> {
        (0..n)
            .map(|i| RawPoint::new(i as f32 * spacing, 100.0, i as u32 * dt))
            .collect()
    }

    #[test]
    fn rejects_short_gestures() {
        assert!(matches!(sample(&[]), Err(DecodeError::NotASwipe)));
        let one = [RawPoint::new(0.0, 0.0, 0)];
        assert!(matches!(sample(&one), Err(DecodeError::NotASwipe)));
        let two = [RawPoint::new(0.0, 0.0, 0), RawPoint::new(50.0, 0.0, 10)];
        assert!(matches!(sample(&two), Err(DecodeError::NotASwipe)));
    }

    #[test]
    fn rejects_zero_arc_length() {
        let still: Vec<RawPoint> = (0..5).map(|i| RawPoint::new(10.0, 10.0, i * 10)).collect();
        assert!(matches!(sample(&still), Err(DecodeError::NotASwipe)));
    }

    #[test]
    fn drops_near_duplicates_but_keeps_dwells() {
        // Fast jitter under 5 px gets decimated.
        let mut raw = line(10, 50.0, 10);
        raw.insert(5, RawPoint::new(201.0, 100.0, 41));
        let path = sample(&raw).unwrap();
        assert_eq!(path.len(), 10);

        // A slow dwell keeps its sub-5 px points.
        let mut dwell = line(5, 50.0, 10);
        let t0 = dwell.last().unwrap().t_ms;
        for i in 1..=10 {
            dwell.push(RawPoint::new(201.0, 100.0 + (i % 2) as f32, t0 + i * 15));
        }
        let path = sample(&dwell).unwrap();
        assert!(path.len() > 10);
    }

    #[test]
    fn velocity_profile() {
        let path = sample(&line(10, 50.0, 10)).unwrap();
        assert_eq!(path.point(0).v, 0.0);
        for p in &path.points()[1..] {
            assert!((p.v - 5.0).abs() < 1e-3);
        }
        assert!((path.average_velocity() - 5.0).abs() < 1e-3);
    }

    #[test]
    fn long_inputs_resample_to_cap() {
        let raw = line(2000, 3.0, 5);
        let path = sample(&raw).unwrap();
        assert_eq!(path.len(), MAX_POINTS);
        // Still monotonic and still spanning the same extent.
        for w in path.points().windows(2) {
            assert!(w[1].t_ms > w[0].t_ms);
        }
        assert!((path.last().x - 1999.0 * 3.0).abs() < 1e-3);
    }

    #[test]
    fn clamps_non_monotonic_timestamps() {
        let raw = vec![
            RawPoint::new(0.0, 0.0, 10),
            RawPoint::new(50.0, 0.0, 5),
            RawPoint::new(100.0, 0.0, 30),
            RawPoint::new(150.0, 0.0, 30),
        ];
        let path = sample(&raw).unwrap();
        for w in path.points().windows(2) {
            assert!(w[1].t_ms > w[0].t_ms);
        }
    }
}
