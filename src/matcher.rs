//! Rotation-invariant template matching ($1 unistroke distance).
//!
//! Both sides must already be normalized to the same point count: distances
//! are taken between index-aligned points, with no time warping. The best
//! rotation is searched with golden-section narrowing over ±45°, which assumes
//! the distance curve is unimodal in that range. That holds for strokes drawn
//! roughly upright against similarly oriented templates; matches rotated
//! further than that are not guaranteed.

use std::f64::consts::{FRAC_PI_4, PI};

use crate::normalize::{NormalizedStroke, SQUARE_SIZE, centroid};
use crate::stroke::Point;

/// Search bracket half-width.
pub const ANGLE_RANGE: f64 = FRAC_PI_4;
/// Search stops once the bracket is narrower than 2°.
pub const ANGLE_TOLERANCE: f64 = PI / 90.0;
/// (√5 − 1) / 2
const PHI: f64 = 0.618_033_988_749_894_9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    pub template: usize,
    pub distance: f64,
    pub score: f64,
}

/// Mean distance between index-aligned points.
pub fn path_distance(a: &[Point], b: &[Point]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return 0.0;
    }
    let total: f64 = a.iter().zip(b).map(|(p, q)| p.distance(*q)).sum();
    total / a.len() as f64
}

/// Rotates the stroke about its own centroid.
pub fn rotate_by(points: &[Point], angle: f64) -> Vec<Point> {
    let c = centroid(points);
    let (sin, cos) = angle.sin_cos();
    points
        .iter()
        .map(|p| {
            let (dx, dy) = (p.x - c.x, p.y - c.y);
            Point::new(dx * cos - dy * sin + c.x, dx * sin + dy * cos + c.y)
        })
        .collect()
}

pub fn distance_at_angle(stroke: &[Point], template: &[Point], angle: f64) -> f64 {
    path_distance(&rotate_by(stroke, angle), template)
}

/// Minimizes [`distance_at_angle`] over `[a, b]`.
///
/// Returns the smaller of the two final sampled distances once the bracket is
/// narrower than `tolerance`.
pub fn golden_section_search(
    stroke: &[Point],
    template: &[Point],
    mut a: f64,
    mut b: f64,
    tolerance: f64,
) -> f64 {
    let mut x1 = PHI * a + (1.0 - PHI) * b;
    let mut f1 = distance_at_angle(stroke, template, x1);
    let mut x2 = (1.0 - PHI) * a + PHI * b;
    let mut f2 = distance_at_angle(stroke, template, x2);

    while (b - a).abs() > tolerance {
        if f1 < f2 {
            b = x2;
            x2 = x1;
            f2 = f1;
            x1 = PHI * a + (1.0 - PHI) * b;
            f1 = distance_at_angle(stroke, template, x1);
        } else {
            a = x1;
            x1 = x2;
            f1 = f2;
            x2 = (1.0 - PHI) * a + PHI * b;
            f2 = distance_at_angle(stroke, template, x2);
        }
    }
    f1.min(f2)
}

pub fn distance_at_best_angle(stroke: &[Point], template: &[Point]) -> f64 {
    golden_section_search(stroke, template, -ANGLE_RANGE, ANGLE_RANGE, ANGLE_TOLERANCE)
}

/// Half the diagonal of the normalization square.
pub fn half_diagonal() -> f64 {
    0.5 * (2.0 * SQUARE_SIZE * SQUARE_SIZE).sqrt()
}

/// 1.0 for identical strokes; negative once the distance exceeds the half diagonal.
pub fn score_for_distance(distance: f64) -> f64 {
    1.0 - distance / half_diagonal()
}

/// Closest template after rotation search, or `None` for an empty list.
pub fn best_template_match(
    stroke: &NormalizedStroke,
    templates: &[NormalizedStroke],
) -> Option<TemplateMatch> {
    let mut best: Option<(usize, f64)> = None;
    for (i, t) in templates.iter().enumerate() {
        let d = distance_at_best_angle(stroke.points(), t.points());
        match best {
            Some((_, bd)) if bd <= d => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(template, distance)| TemplateMatch {
        template,
        distance,
        score: score_for_distance(distance),
    })
}
