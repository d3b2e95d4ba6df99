//! Picks the library gesture closest to a finished raw stroke.

use log::{debug, info};

use crate::library::GestureLibrary;
use crate::matcher::best_template_match;
use crate::normalize::normalize;
use crate::stroke::Point;

/// Fewer raw samples than this are never matched.
pub const MIN_STROKE_POINTS: usize = 5;
/// A match needs a score strictly above this.
pub const MATCH_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    Match {
        command: String,
        score: f64,
        template: usize,
    },
    NoMatch(NoMatch),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoMatch {
    InputTooShort { samples: usize },
    /// `best_score` is `None` when the library holds no templates at all.
    NoConfidentMatch { best_score: Option<f64> },
}

pub fn is_confident(score: f64) -> bool {
    score > MATCH_THRESHOLD
}

pub fn recognize(library: &GestureLibrary, stroke: &[Point]) -> Recognition {
    if stroke.len() < MIN_STROKE_POINTS {
        info!("gesture too short ({} samples), ignoring", stroke.len());
        return Recognition::NoMatch(NoMatch::InputTooShort {
            samples: stroke.len(),
        });
    }

    let normalized = normalize(stroke);
    let mut best: Option<(&str, usize, f64)> = None;
    for def in library.iter() {
        let Some(m) = best_template_match(&normalized, &def.templates) else {
            debug!("gesture '{}' has no templates, skipping", def.command);
            continue;
        };
        debug!(
            "gesture '{}': template {}, distance {:.2}, score {:.3}",
            def.command, m.template, m.distance, m.score
        );
        if best.is_none_or(|(_, _, s)| m.score > s) {
            best = Some((def.command.as_str(), m.template, m.score));
        }
    }

    match best {
        Some((command, template, score)) if is_confident(score) => {
            info!("matched gesture '{command}' (score {score:.3})");
            Recognition::Match {
                command: command.to_string(),
                score,
                template,
            }
        }
        other => {
            let best_score = other.map(|(_, _, s)| s);
            match best_score {
                Some(s) => info!("no confident match (best score {s:.3})"),
                None => info!("no confident match (library has no templates)"),
            }
            Recognition::NoMatch(NoMatch::NoConfidentMatch { best_score })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::GestureDefinition;
    use crate::matcher::half_diagonal;
    use crate::normalize::NormalizedStroke;
    use crate::normalize::tests::{circle, line};

    fn library_with(defs: Vec<(&str, Vec<Vec<Point>>)>) -> GestureLibrary {
        let mut lib = GestureLibrary::new();
        for (command, strokes) in defs {
            lib.upsert(GestureDefinition {
                command: command.to_string(),
                templates: strokes.iter().map(|s| normalize(s)).collect(),
            })
            .unwrap();
        }
        lib
    }

    #[test]
    fn horizontal_line_matches_at_other_position_and_scale() {
        let template = line(10, Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        let lib = library_with(vec![("echo hi", vec![template])]);

        let input = line(8, Point::new(10.0, 50.0), Point::new(300.0, 50.0));
        match recognize(&lib, &input) {
            Recognition::Match { command, score, .. } => {
                assert_eq!(command, "echo hi");
                assert!(score > MATCH_THRESHOLD, "score {score}");
            }
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn short_stroke_never_matches() {
        let lib = library_with(vec![(
            "echo hi",
            vec![line(3, Point::ORIGIN, Point::new(100.0, 0.0))],
        )]);
        let before = lib.clone();
        let input = line(3, Point::ORIGIN, Point::new(100.0, 0.0));
        assert_eq!(
            recognize(&lib, &input),
            Recognition::NoMatch(NoMatch::InputTooShort { samples: 3 })
        );
        assert_eq!(lib, before);
    }

    #[test]
    fn empty_library_has_no_match() {
        let input = circle(30, 40.0, 100.0, 100.0);
        assert_eq!(
            recognize(&GestureLibrary::new(), &input),
            Recognition::NoMatch(NoMatch::NoConfidentMatch { best_score: None })
        );
    }

    #[test]
    fn picks_best_definition() {
        let lib = library_with(vec![
            ("line", vec![line(10, Point::ORIGIN, Point::new(100.0, 0.0))]),
            ("circle", vec![circle(60, 50.0, 0.0, 0.0)]),
        ]);
        let input = circle(45, 120.0, 400.0, 300.0);
        match recognize(&lib, &input) {
            Recognition::Match { command, .. } => assert_eq!(command, "circle"),
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn dissimilar_shape_is_rejected() {
        // a tight zig-zag against a single closed loop
        let zig: Vec<Point> = (0..20)
            .map(|i| Point::new(i as f64 * 10.0, if i % 2 == 0 { 0.0 } else { 100.0 }))
            .collect();
        let lib = library_with(vec![("circle", vec![circle(60, 50.0, 0.0, 0.0)])]);
        match recognize(&lib, &zig) {
            Recognition::NoMatch(NoMatch::NoConfidentMatch { best_score: Some(s) }) => {
                assert!(s <= MATCH_THRESHOLD)
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    // Shifting the template by d leaves d as the best distance, since rotation
    // about the centroid can only move points further from a uniform offset.
    #[test]
    fn recognize_rejects_scores_at_or_below_threshold() {
        let raw = circle(40, 60.0, 150.0, 150.0);
        let base = normalize(&raw);
        let shifted_for = |score: f64| {
            let d = (1.0 - score) * half_diagonal();
            let pts: Vec<Point> = base
                .points()
                .iter()
                .map(|p| Point::new(p.x + d, p.y))
                .collect();
            NormalizedStroke::try_from(pts).unwrap()
        };

        for (target, matches) in [(MATCH_THRESHOLD + 0.01, true), (MATCH_THRESHOLD - 0.01, false)] {
            let mut lib = GestureLibrary::new();
            lib.upsert(GestureDefinition {
                command: "edge".into(),
                templates: vec![shifted_for(target)],
            })
            .unwrap();
            match recognize(&lib, &raw) {
                Recognition::Match { score, .. } => {
                    assert!(matches, "matched at {score}");
                    assert!((score - target).abs() < 1e-3, "score {score}");
                }
                Recognition::NoMatch(NoMatch::NoConfidentMatch { best_score: Some(s) }) => {
                    assert!(!matches, "rejected at {s}");
                    assert!(s <= MATCH_THRESHOLD);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn threshold_is_strict() {
        assert!(!is_confident(MATCH_THRESHOLD));
        assert!(is_confident(MATCH_THRESHOLD + 1e-9));
        assert!(!is_confident(-3.0));
    }
}
