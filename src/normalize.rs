//! Resample → scale → translate pipeline producing comparable strokes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stroke::Point;

/// Points in every normalized stroke.
pub const NUM_POINTS: usize = 64;
/// Bounding-box extent each axis is scaled to.
pub const SQUARE_SIZE: f64 = 250.0;

#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    #[error("template has {0} points, expected {expected}", expected = NUM_POINTS)]
    WrongLength(usize),
    #[error("template contains a non-finite coordinate")]
    NonFinite,
}

/// A stroke in canonical form: exactly [`NUM_POINTS`] points centred on the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct NormalizedStroke(Vec<Point>);

impl NormalizedStroke {
    pub fn points(&self) -> &[Point] {
        &self.0
    }
}

impl TryFrom<Vec<Point>> for NormalizedStroke {
    type Error = TemplateError;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        if points.len() != NUM_POINTS {
            return Err(TemplateError::WrongLength(points.len()));
        }
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(TemplateError::NonFinite);
        }
        Ok(Self(points))
    }
}

impl From<NormalizedStroke> for Vec<Point> {
    fn from(s: NormalizedStroke) -> Self {
        s.0
    }
}

pub fn normalize(points: &[Point]) -> NormalizedStroke {
    let resampled = resample(points, NUM_POINTS);
    let scaled = scale(&resampled, SQUARE_SIZE);
    NormalizedStroke(translate(&scaled, Point::ORIGIN))
}

pub fn path_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

/// Resamples the polyline to `n` points spaced evenly along its length.
///
/// Interpolated points become the start of the next segment, so long
/// segments may receive several points. Rounding can leave the walk one short
/// of `n`; the last input point pads the result.
pub fn resample(points: &[Point], n: usize) -> Vec<Point> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };
    if n < 2 {
        return vec![first; n];
    }
    let interval = path_length(points) / (n - 1) as f64;
    if interval <= 0.0 {
        return vec![first; n];
    }

    let mut out = Vec::with_capacity(n);
    out.push(first);
    let mut acc = 0.0;
    let mut prev = first;
    for &cur in &points[1..] {
        let mut d = prev.distance(cur);
        while d > 0.0 && acc + d >= interval && out.len() < n {
            let t = (interval - acc) / d;
            let q = Point::new(prev.x + t * (cur.x - prev.x), prev.y + t * (cur.y - prev.y));
            out.push(q);
            prev = q;
            d = prev.distance(cur);
            acc = 0.0;
        }
        acc += d;
        prev = cur;
    }

    let last = points[points.len() - 1];
    out.resize(n, last);
    out
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

pub fn bounding_box(points: &[Point]) -> BoundingBox {
    let mut min = Point::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    BoundingBox { min, max }
}

/// Scales each axis independently so the bounding box spans `size`.
///
/// An axis with no extent (a perfectly straight horizontal or vertical
/// stroke) is left as is.
pub fn scale(points: &[Point], size: f64) -> Vec<Point> {
    let bb = bounding_box(points);
    let fx = axis_factor(bb.width(), size);
    let fy = axis_factor(bb.height(), size);
    points.iter().map(|p| Point::new(p.x * fx, p.y * fy)).collect()
}

fn axis_factor(extent: f64, size: f64) -> f64 {
    if extent > f64::EPSILON { size / extent } else { 1.0 }
}

pub fn centroid(points: &[Point]) -> Point {
    if points.is_empty() {
        return Point::ORIGIN;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point::new(sx / n, sy / n)
}

/// Shifts the stroke so its centroid lands on `target`.
pub fn translate(points: &[Point], target: Point) -> Vec<Point> {
    let c = centroid(points);
    let (dx, dy) = (target.x - c.x, target.y - c.y);
    points.iter().map(|p| Point::new(p.x + dx, p.y + dy)).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    pub(crate) fn circle(samples: usize, r: f64, cx: f64, cy: f64) -> Vec<Point> {
        (0..samples)
            .map(|i| {
                let a = i as f64 / (samples - 1) as f64 * std::f64::consts::TAU;
                Point::new(cx + r * a.cos(), cy + r * a.sin())
            })
            .collect()
    }

    pub(crate) fn line(samples: usize, from: Point, to: Point) -> Vec<Point> {
        (0..samples)
            .map(|i| {
                let t = i as f64 / (samples - 1) as f64;
                Point::new(from.x + t * (to.x - from.x), from.y + t * (to.y - from.y))
            })
            .collect()
    }

    // Three legs of equal slope: corners sit exactly on resample positions.
    fn zigzag() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(12.0, 24.0),
            Point::new(30.0, 60.0),
            Point::new(60.0, 0.0),
            Point::new(90.0, 60.0),
        ]
    }

    fn scribble() -> Vec<Point> {
        vec![
            Point::new(3.0, 7.0),
            Point::new(40.0, 12.0),
            Point::new(55.0, 80.0),
            Point::new(20.0, 95.0),
            Point::new(-10.0, 60.0),
            Point::new(5.0, 30.0),
            Point::new(70.0, 33.0),
        ]
    }

    pub(crate) fn assert_strokes_close(a: &[Point], b: &[Point], eps: f64) {
        assert_eq!(a.len(), b.len());
        for (i, (p, q)) in a.iter().zip(b).enumerate() {
            assert!(
                (p.x - q.x).abs() < eps && (p.y - q.y).abs() < eps,
                "point {i} differs: {p:?} vs {q:?}"
            );
        }
    }

    #[test]
    fn resample_returns_exactly_n_points() {
        let shapes = [
            zigzag(),
            scribble(),
            circle(37, 40.0, 5.0, 5.0),
            line(2, Point::ORIGIN, Point::new(1.0, 1.0)),
        ];
        for shape in &shapes {
            for n in [2, 3, 5, 16, 64, 200] {
                assert_eq!(resample(shape, n).len(), n, "n={n}");
            }
        }
    }

    #[test]
    fn resample_spacing_is_even() {
        let out = resample(&line(5, Point::ORIGIN, Point::new(63.0, 0.0)), 64);
        for (i, p) in out.iter().enumerate() {
            assert!((p.x - i as f64).abs() < EPS, "point {i} at {}", p.x);
        }
    }

    #[test]
    fn resample_keeps_endpoints() {
        let s = scribble();
        let out = resample(&s, NUM_POINTS);
        assert_eq!(out[0], s[0]);
        let end = out[NUM_POINTS - 1];
        assert!(end.distance(s[s.len() - 1]) < EPS);
    }

    #[test]
    fn resample_of_stationary_stroke_repeats_point() {
        let p = Point::new(4.0, 4.0);
        assert_eq!(resample(&[p; 6], 8), vec![p; 8]);
    }

    #[test]
    fn normalize_yields_centred_canonical_stroke() {
        let n = normalize(&scribble());
        assert_eq!(n.points().len(), NUM_POINTS);
        let c = centroid(n.points());
        assert!(c.x.abs() < EPS && c.y.abs() < EPS);
        let bb = bounding_box(n.points());
        assert!((bb.width() - SQUARE_SIZE).abs() < EPS);
        assert!((bb.height() - SQUARE_SIZE).abs() < EPS);
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize(&zigzag());
        let twice = normalize(once.points());
        assert_strokes_close(once.points(), twice.points(), EPS);
    }

    #[test]
    fn normalize_ignores_uniform_scale() {
        let s = scribble();
        for k in [0.01, 0.5, 3.0, 1000.0] {
            let scaled: Vec<Point> = s.iter().map(|p| Point::new(p.x * k, p.y * k)).collect();
            assert_strokes_close(normalize(&s).points(), normalize(&scaled).points(), EPS);
        }
    }

    #[test]
    fn normalize_ignores_translation() {
        let s = scribble();
        let moved: Vec<Point> = s.iter().map(|p| Point::new(p.x + 512.0, p.y - 77.5)).collect();
        assert_strokes_close(normalize(&s).points(), normalize(&moved).points(), EPS);
    }

    #[test]
    fn straight_horizontal_stroke_stays_finite() {
        let n = normalize(&line(10, Point::new(0.0, 20.0), Point::new(100.0, 20.0)));
        assert!(n.points().iter().all(|p| p.x.is_finite() && p.y.abs() < EPS));
        let bb = bounding_box(n.points());
        assert!((bb.width() - SQUARE_SIZE).abs() < EPS);
    }

    #[test]
    fn scale_is_non_uniform() {
        let out = scale(&[Point::new(0.0, 0.0), Point::new(10.0, 50.0)], 250.0);
        assert_eq!(out[1], Point::new(250.0, 250.0));
    }

    #[test]
    fn template_rejects_wrong_length() {
        let err = NormalizedStroke::try_from(vec![Point::ORIGIN; 10]).unwrap_err();
        assert_eq!(err, TemplateError::WrongLength(10));

        let mut pts = vec![Point::ORIGIN; NUM_POINTS];
        pts[3].x = f64::NAN;
        assert_eq!(NormalizedStroke::try_from(pts).unwrap_err(), TemplateError::NonFinite);
    }
}
