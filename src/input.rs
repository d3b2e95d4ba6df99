//! Pointer sources: evdev devices (evdev 0.13) and recorded replay files.

use anyhow::{Context, Result, anyhow};
use evdev::{
    AbsoluteAxisCode, Device, EventType, InputEvent, KeyCode, RelativeAxisCode,
    SynchronizationCode,
};
use log::{debug, info, warn};
use serde::Deserialize;
use std::{collections::VecDeque, fs, io, path::Path};

use crate::config::InputSettings;
use crate::stroke::Point;
use crate::tracker::{PointerFrame, PointerTracker};

pub enum SourcePoll {
    Frame(PointerFrame),
    /// Nothing new since the last poll.
    Idle,
    /// The source will never produce another frame.
    Closed,
}

pub trait PointerSource {
    fn poll(&mut self) -> Result<SourcePoll>;
}

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub kind: DeviceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    RelativePointer,
    AbsolutePointer,
    /// Only useful for its Escape key.
    Keyboard,
}

fn classify(dev: &Device) -> Option<DeviceKind> {
    let keys = dev.supported_keys();
    let has_button =
        keys.is_some_and(|k| k.contains(KeyCode::BTN_LEFT) || k.contains(KeyCode::BTN_TOUCH));
    let has_rel = dev.supported_relative_axes().is_some_and(|a| {
        a.contains(RelativeAxisCode::REL_X) && a.contains(RelativeAxisCode::REL_Y)
    });
    let has_abs = dev.supported_absolute_axes().is_some_and(|a| {
        a.contains(AbsoluteAxisCode::ABS_X) && a.contains(AbsoluteAxisCode::ABS_Y)
    });
    if has_button && has_rel {
        Some(DeviceKind::RelativePointer)
    } else if has_button && has_abs {
        Some(DeviceKind::AbsolutePointer)
    } else if keys.is_some_and(|k| k.contains(KeyCode::KEY_ESC)) {
        Some(DeviceKind::Keyboard)
    } else {
        None
    }
}

pub fn discover_devices() -> Vec<DeviceInfo> {
    let mut out = vec![];
    if let Ok(rd) = fs::read_dir("/dev/input") {
        for e in rd.flatten() {
            let p = e.path();
            if !p
                .file_name()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.starts_with("event"))
            {
                continue;
            }
            if let Ok(dev) = Device::open(&p) {
                if let Some(kind) = classify(&dev) {
                    out.push(DeviceInfo {
                        path: p.display().to_string(),
                        name: dev.name().unwrap_or("unknown").to_string(),
                        kind,
                    });
                }
            }
        }
    }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

pub struct EvdevSource {
    devices: Vec<Device>,
    tracker: PointerTracker,
    pending: VecDeque<PointerFrame>,
    grabbed: bool,
}

impl EvdevSource {
    pub fn open(settings: &InputSettings) -> Result<Self> {
        let infos = match &settings.device {
            Some(path) => {
                let dev = Device::open(path)
                    .with_context(|| format!("failed to open input device {}", path.display()))?;
                let kind = classify(&dev)
                    .ok_or_else(|| anyhow!("{} is not a pointer device", path.display()))?;
                vec![DeviceInfo {
                    path: path.display().to_string(),
                    name: dev.name().unwrap_or("unknown").to_string(),
                    kind,
                }]
            }
            None => discover_devices(),
        };
        if !infos.iter().any(|d| d.kind != DeviceKind::Keyboard) {
            return Err(anyhow!(
                "no pointer devices found; run `sigilctl doctor` to check permissions"
            ));
        }

        let mut tracker = PointerTracker::new(settings.width as f64, settings.height as f64);
        let mut devices = vec![];
        for d in &infos {
            let dev = match Device::open(&d.path) {
                Ok(dev) => dev,
                Err(e) => {
                    warn!("failed to open {}: {e}", d.path);
                    continue;
                }
            };
            if let Err(e) = dev.set_nonblocking(true) {
                warn!("failed to make {} non-blocking: {e}", d.path);
                continue;
            }
            if d.kind == DeviceKind::AbsolutePointer {
                if let Ok(axes) = dev.get_absinfo() {
                    let mut x = (0, 4096);
                    let mut y = (0, 4096);
                    for (code, info) in axes {
                        if code == AbsoluteAxisCode::ABS_X {
                            x = (info.minimum(), info.maximum());
                        } else if code == AbsoluteAxisCode::ABS_Y {
                            y = (info.minimum(), info.maximum());
                        }
                    }
                    tracker.set_abs_ranges(x.0, x.1, y.0, y.1);
                }
            }
            info!("input: using {} ({}, {:?})", d.name, d.path, d.kind);
            devices.push(dev);
        }
        if devices.is_empty() {
            return Err(anyhow!("failed to open all detected input devices"));
        }
        debug!(
            "canvas {}x{}, pointer starts at {:?}",
            settings.width,
            settings.height,
            tracker.position()
        );

        let mut source = Self {
            devices,
            tracker,
            pending: VecDeque::new(),
            grabbed: false,
        };
        if settings.grab {
            source.grab();
        }
        Ok(source)
    }

    fn grab(&mut self) {
        for d in self.devices.iter_mut() {
            if let Err(e) = d.grab() {
                warn!("failed to grab input device: {e}");
            }
        }
        self.grabbed = true;
        info!("grabbed pointer devices");
    }

    fn apply(&mut self, ev: &InputEvent) {
        let code = ev.code();
        let value = ev.value();
        match ev.event_type() {
            t if t == EventType::ABSOLUTE => match code {
                c if c == AbsoluteAxisCode::ABS_X.0 => self.tracker.on_abs_x(value),
                c if c == AbsoluteAxisCode::ABS_Y.0 => self.tracker.on_abs_y(value),
                _ => {}
            },
            t if t == EventType::RELATIVE => match code {
                c if c == RelativeAxisCode::REL_X.0 => self.tracker.on_rel_x(value),
                c if c == RelativeAxisCode::REL_Y.0 => self.tracker.on_rel_y(value),
                _ => {}
            },
            t if t == EventType::KEY => match code {
                c if c == KeyCode::BTN_LEFT.0 || c == KeyCode::BTN_TOUCH.0 => {
                    self.tracker.on_button(value)
                }
                c if c == KeyCode::KEY_ESC.0 => self.tracker.on_cancel_key(value),
                _ => {}
            },
            t if t == EventType::SYNCHRONIZATION && code == SynchronizationCode::SYN_REPORT.0 => {
                if let Some(frame) = self.tracker.on_syn_report() {
                    self.pending.push_back(frame);
                }
            }
            _ => {}
        }
    }
}

impl PointerSource for EvdevSource {
    fn poll(&mut self) -> Result<SourcePoll> {
        if self.pending.is_empty() {
            let mut events = vec![];
            for dev in self.devices.iter_mut() {
                match dev.fetch_events() {
                    Ok(batch) => events.extend(batch),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => return Err(e).context("reading input events"),
                }
            }
            for ev in &events {
                self.apply(ev);
            }
        }
        Ok(match self.pending.pop_front() {
            Some(frame) => SourcePoll::Frame(frame),
            None => SourcePoll::Idle,
        })
    }
}

impl Drop for EvdevSource {
    fn drop(&mut self) {
        if self.grabbed {
            for d in self.devices.iter_mut() {
                let _ = d.ungrab();
            }
            debug!("released pointer devices");
        }
    }
}

/// One line of a replay file: a pointer sample or `{"cancel": true}`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReplayLine {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    down: bool,
    #[serde(default)]
    cancel: bool,
}

/// Feeds a recorded JSON-lines pointer trace, one frame per poll.
pub struct ReplaySource {
    frames: VecDeque<PointerFrame>,
}

impl ReplaySource {
    pub fn open(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .with_context(|| format!("failed to read replay {}", path.display()))?;
        Self::parse(&txt).with_context(|| format!("failed to parse replay {}", path.display()))
    }

    pub fn parse(txt: &str) -> Result<Self> {
        let mut frames = VecDeque::new();
        let mut last = Point::ORIGIN;
        let mut pressed = false;
        for (i, line) in txt.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let rec: ReplayLine =
                serde_json::from_str(line).map_err(|e| anyhow!("line {}: {e}", i + 1))?;
            let frame = if rec.cancel {
                PointerFrame {
                    position: last,
                    pressed,
                    cancel: true,
                }
            } else {
                last = Point::new(rec.x, rec.y);
                pressed = rec.down;
                PointerFrame {
                    position: last,
                    pressed,
                    cancel: false,
                }
            };
            frames.push_back(frame);
        }
        debug!("replay: {} frame(s)", frames.len());
        Ok(Self { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

impl PointerSource for ReplaySource {
    fn poll(&mut self) -> Result<SourcePoll> {
        Ok(match self.frames.pop_front() {
            Some(frame) => SourcePoll::Frame(frame),
            None => SourcePoll::Closed,
        })
    }
}
