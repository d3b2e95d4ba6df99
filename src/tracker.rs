//! Folds raw pointer events into polled frames and press/release edges.

use crate::session::SessionInput;
use crate::stroke::Point;

/// Pointer state as seen once per poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerFrame {
    pub position: Point,
    pub pressed: bool,
    /// One-shot: set on the frame the cancel key went down.
    pub cancel: bool,
}

#[derive(Debug, Clone, Copy)]
struct AxisRange {
    min: i32,
    max: i32,
}

impl AxisRange {
    fn to_canvas(self, raw: i32, extent: f64) -> f64 {
        let span = i64::from(self.max) - i64::from(self.min);
        if span <= 0 {
            return 0.0;
        }
        let t = (i64::from(raw) - i64::from(self.min)) as f64 / span as f64;
        t.clamp(0.0, 1.0) * extent
    }
}

/// Tracks one virtual cursor on a `width` × `height` canvas.
///
/// Relative devices move it by their deltas, absolute devices map their axis
/// range onto the canvas.
#[derive(Debug)]
pub struct PointerTracker {
    width: f64,
    height: f64,
    x_range: AxisRange,
    y_range: AxisRange,
    position: Point,
    pressed: bool,
    cancel: bool,
    changed: bool,
}

impl PointerTracker {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            x_range: AxisRange { min: 0, max: 4096 },
            y_range: AxisRange { min: 0, max: 4096 },
            position: Point::new(width / 2.0, height / 2.0),
            pressed: false,
            cancel: false,
            changed: false,
        }
    }

    pub fn set_abs_ranges(&mut self, x_min: i32, x_max: i32, y_min: i32, y_max: i32) {
        self.x_range = AxisRange {
            min: x_min,
            max: x_max.max(x_min.saturating_add(1)),
        };
        self.y_range = AxisRange {
            min: y_min,
            max: y_max.max(y_min.saturating_add(1)),
        };
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn on_abs_x(&mut self, raw: i32) {
        self.position.x = self.x_range.to_canvas(raw, self.width);
        self.changed = true;
    }

    pub fn on_abs_y(&mut self, raw: i32) {
        self.position.y = self.y_range.to_canvas(raw, self.height);
        self.changed = true;
    }

    pub fn on_rel_x(&mut self, delta: i32) {
        self.position.x = (self.position.x + delta as f64).clamp(0.0, self.width);
        self.changed = true;
    }

    pub fn on_rel_y(&mut self, delta: i32) {
        self.position.y = (self.position.y + delta as f64).clamp(0.0, self.height);
        self.changed = true;
    }

    /// evdev key value: 0 release, 1 press, 2 autorepeat.
    pub fn on_button(&mut self, value: i32) {
        let pressed = value != 0;
        if pressed != self.pressed {
            self.pressed = pressed;
            self.changed = true;
        }
    }

    pub fn on_cancel_key(&mut self, value: i32) {
        if value == 1 {
            self.cancel = true;
            self.changed = true;
        }
    }

    /// Closes the current event packet; `None` when nothing changed.
    pub fn on_syn_report(&mut self) -> Option<PointerFrame> {
        if !std::mem::take(&mut self.changed) {
            return None;
        }
        Some(PointerFrame {
            position: self.position,
            pressed: self.pressed,
            cancel: std::mem::take(&mut self.cancel),
        })
    }
}

/// Turns successive frames into session inputs.
#[derive(Debug, Default)]
pub struct PressEdges {
    was_pressed: bool,
}

impl PressEdges {
    pub fn inputs(&mut self, frame: &PointerFrame) -> Vec<SessionInput> {
        let mut out = Vec::with_capacity(2);
        if frame.cancel {
            out.push(SessionInput::Cancel);
        }
        match (self.was_pressed, frame.pressed) {
            (false, true) => out.push(SessionInput::PointerDown(frame.position)),
            (true, true) => out.push(SessionInput::PointerMove(frame.position)),
            (true, false) => out.push(SessionInput::PointerUp),
            (false, false) => {}
        }
        self.was_pressed = frame.pressed;
        out
    }
}
