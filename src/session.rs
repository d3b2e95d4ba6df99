//! Draw → recognize and draw → learn cycles.
//!
//! The pipeline owns a [`Session`] and feeds it discrete pointer inputs; the
//! session hands back what the outside world should react to (a command to
//! launch, learn progress, shutdown). Persistence goes through the
//! [`LibraryStore`] passed into each call.

use log::{debug, info, warn};

use crate::library::{GestureDefinition, GestureLibrary, LibraryError, LibraryStore};
use crate::normalize::{NormalizedStroke, normalize};
use crate::recognizer::{NoMatch, Recognition, recognize};
use crate::stroke::{Point, StrokeBuffer};

/// Repetitions captured before a learned gesture is saved.
pub const LEARN_REPETITIONS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Run,
    Learn { command: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Drawing,
    Recognizing,
    /// Learn mode between repetitions.
    Learning { captured: usize },
    Exiting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionInput {
    PointerDown(Point),
    PointerMove(Point),
    PointerUp,
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Matched { command: String, score: f64 },
    NotMatched(NoMatch),
    TemplateCaptured { captured: usize, required: usize },
    Learned { command: String, templates: usize },
    Cancelled,
}

#[derive(Debug)]
pub struct Session {
    mode: Mode,
    state: SessionState,
    buffer: StrokeBuffer,
    library: GestureLibrary,
    captured: Vec<NormalizedStroke>,
}

impl Session {
    pub fn run(library: GestureLibrary) -> Self {
        Self {
            mode: Mode::Run,
            state: SessionState::Idle,
            buffer: StrokeBuffer::new(),
            library,
            captured: Vec::new(),
        }
    }

    pub fn learn(command: impl Into<String>) -> Result<Self, LibraryError> {
        let command = command.into();
        if command.trim().is_empty() {
            return Err(LibraryError::EmptyCommand);
        }
        Ok(Self {
            mode: Mode::Learn { command },
            state: SessionState::Learning { captured: 0 },
            buffer: StrokeBuffer::new(),
            library: GestureLibrary::new(),
            captured: Vec::with_capacity(LEARN_REPETITIONS),
        })
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_exiting(&self) -> bool {
        self.state == SessionState::Exiting
    }

    /// `(captured, required)` while learning.
    pub fn learn_progress(&self) -> Option<(usize, usize)> {
        match self.mode {
            Mode::Learn { .. } => Some((self.captured.len(), LEARN_REPETITIONS)),
            Mode::Run => None,
        }
    }

    /// Advances the state machine by one input.
    ///
    /// Errors only when saving a learned gesture fails; the session is
    /// `Exiting` afterwards and nothing was written.
    pub fn handle(
        &mut self,
        input: SessionInput,
        store: &mut dyn LibraryStore,
    ) -> Result<Option<SessionEvent>, LibraryError> {
        if self.state == SessionState::Exiting {
            return Ok(None);
        }

        match (input, self.state) {
            (SessionInput::Cancel, _) => {
                info!("session cancelled");
                self.state = SessionState::Exiting;
                Ok(Some(SessionEvent::Cancelled))
            }
            (SessionInput::PointerDown(p), SessionState::Idle | SessionState::Learning { .. }) => {
                self.buffer.clear();
                self.buffer.add_sample(p);
                self.state = SessionState::Drawing;
                Ok(None)
            }
            (SessionInput::PointerMove(p), SessionState::Drawing) => {
                self.buffer.add_sample(p);
                Ok(None)
            }
            (SessionInput::PointerUp, SessionState::Drawing) => self.finish_stroke(store),
            _ => Ok(None),
        }
    }

    fn finish_stroke(
        &mut self,
        store: &mut dyn LibraryStore,
    ) -> Result<Option<SessionEvent>, LibraryError> {
        debug!("stroke finished with {} samples", self.buffer.len());
        let empty = self.buffer.is_empty();
        let stroke = self.buffer.points();
        self.buffer.clear();

        match &self.mode {
            Mode::Run => {
                self.state = SessionState::Recognizing;
                match recognize(&self.library, &stroke) {
                    Recognition::Match { command, score, .. } => {
                        self.state = SessionState::Exiting;
                        Ok(Some(SessionEvent::Matched { command, score }))
                    }
                    Recognition::NoMatch(reason) => {
                        self.state = SessionState::Idle;
                        Ok(Some(SessionEvent::NotMatched(reason)))
                    }
                }
            }
            Mode::Learn { command } => {
                let command = command.clone();
                if empty {
                    self.state = SessionState::Learning {
                        captured: self.captured.len(),
                    };
                    return Ok(None);
                }
                self.captured.push(normalize(&stroke));
                let captured = self.captured.len();
                info!("captured gesture {captured}/{LEARN_REPETITIONS}");

                if captured < LEARN_REPETITIONS {
                    self.state = SessionState::Learning { captured };
                    return Ok(Some(SessionEvent::TemplateCaptured {
                        captured,
                        required: LEARN_REPETITIONS,
                    }));
                }

                self.state = SessionState::Exiting;
                let def = GestureDefinition {
                    command: command.clone(),
                    templates: self.captured.clone(),
                };
                let templates = def.templates.len();
                let library = match save_definition(store, def) {
                    Ok(lib) => lib,
                    Err(e) => {
                        warn!("could not save gesture for '{command}': {e}");
                        return Err(e);
                    }
                };
                self.library = library;
                info!("gesture saved for command: {command}");
                Ok(Some(SessionEvent::Learned { command, templates }))
            }
        }
    }
}

/// Read-modify-write of the whole library.
fn save_definition(
    store: &mut dyn LibraryStore,
    def: GestureDefinition,
) -> Result<GestureLibrary, LibraryError> {
    let mut library = store.load()?;
    library.upsert(def)?;
    store.save(&library)?;
    Ok(library)
}
