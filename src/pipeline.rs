//! The control loop: poll input, drive the session, act on its events.

use anyhow::{Context, Result};
use log::{debug, error, info};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

use crate::actions::Launcher;
use crate::input::{PointerSource, SourcePoll};
use crate::library::LibraryStore;
use crate::session::{Session, SessionEvent, SessionInput};
use crate::tracker::PressEdges;

#[derive(Debug, Clone, Copy)]
pub struct LoopTiming {
    pub poll_interval: Duration,
    pub exit_grace: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Matched(String),
    Learned(String),
    Cancelled,
    /// The source ran dry before the session finished.
    InputClosed,
}

/// Collaborators the loop drives alongside the session.
pub struct Pipeline<'a> {
    pub source: &'a mut dyn PointerSource,
    pub store: &'a mut dyn LibraryStore,
    pub launcher: &'a mut dyn Launcher,
    /// Raised from a signal handler.
    pub cancel: &'a AtomicBool,
    pub timing: LoopTiming,
}

impl Pipeline<'_> {
    pub fn run(&mut self, session: &mut Session) -> Result<Outcome> {
        let mut edges = PressEdges::default();
        let mut outcome = None;
        debug!("session started: {:?}", session.mode());

        while !session.is_exiting() {
            if self.cancel.load(Ordering::Relaxed) {
                self.dispatch(session, SessionInput::Cancel, &mut outcome)?;
                break;
            }
            match self.source.poll()? {
                SourcePoll::Frame(frame) => {
                    for input in edges.inputs(&frame) {
                        self.dispatch(session, input, &mut outcome)?;
                    }
                }
                SourcePoll::Idle => thread::sleep(self.timing.poll_interval),
                SourcePoll::Closed => {
                    info!("input closed");
                    return Ok(Outcome::InputClosed);
                }
            }
        }

        debug!("exiting in {:?}", self.timing.exit_grace);
        thread::sleep(self.timing.exit_grace);
        Ok(outcome.unwrap_or(Outcome::Cancelled))
    }

    fn dispatch(
        &mut self,
        session: &mut Session,
        input: SessionInput,
        outcome: &mut Option<Outcome>,
    ) -> Result<()> {
        let before = session.state();
        let event = session
            .handle(input, self.store)
            .context("failed to save gesture")?;
        if session.state() != before {
            debug!("session {before:?} -> {:?}", session.state());
        }
        match event {
            Some(SessionEvent::Matched { command, .. }) => {
                // fire and forget: a failed spawn is reported, never retried
                if let Err(e) = self.launcher.launch(&command) {
                    error!("failed to execute command '{command}': {e}");
                }
                *outcome = Some(Outcome::Matched(command));
            }
            Some(SessionEvent::Learned { command, .. }) => {
                *outcome = Some(Outcome::Learned(command));
            }
            Some(SessionEvent::TemplateCaptured { captured, required }) => {
                info!("draw the gesture again ({captured}/{required})");
            }
            Some(SessionEvent::NotMatched(reason)) => debug!("no match: {reason:?}"),
            Some(SessionEvent::Cancelled) => *outcome = Some(Outcome::Cancelled),
            None => {}
        }
        Ok(())
    }
}
