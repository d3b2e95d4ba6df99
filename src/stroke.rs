//! Raw pointer samples for one in-progress stroke.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Squared pixel distance a sample must move before it is kept.
const MIN_SAMPLE_DIST_SQ: f64 = 4.0;
/// Oldest samples are evicted past this many retained points.
pub const MAX_POINTS: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    #[serde(alias = "X")]
    pub x: f64,
    #[serde(alias = "Y")]
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_sq(self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(self, other: Point) -> f64 {
        self.distance_sq(other).sqrt()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StrokeBuffer {
    points: VecDeque<Point>,
}

impl StrokeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps `p` unless it sits within 2px of the last retained sample.
    pub fn add_sample(&mut self, p: Point) {
        let keep = match self.points.back() {
            None => true,
            Some(last) => last.distance_sq(p) > MIN_SAMPLE_DIST_SQ,
        };
        if !keep {
            return;
        }
        if self.points.len() == MAX_POINTS {
            self.points.pop_front();
        }
        self.points.push_back(p);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Snapshot of the retained samples in drawing order.
    pub fn points(&self) -> Vec<Point> {
        self.points.iter().copied().collect()
    }
}
