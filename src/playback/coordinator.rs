//! Owns both sessions and decides which one the user is talking to.
//!
//! Only the active mode's session receives user commands; completion
//! events are routed to the session of the mode that produced them.
//! Switching modes is refused while either session is playing.  The session
//! that is left is always stopped, which also cancels a restart that is
//! still waiting for its delay.  A mode that is left remembers its selection (position and highlight) and gets it back
//! when the user returns.

use std::sync::Arc;

use thiserror::Error;

use super::event::ModeEvent;
use super::session::{Mode, PlayState, PlaybackError, PlaybackSession, SessionSnapshot};
use crate::text::segment_with_limit;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinatorError {
    #[error("stop {playing} playback before switching modes")]
    SwitchWhilePlaying { playing: Mode },

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Selection {
    position: usize,
    highlight: bool,
}

pub struct ModeCoordinator {
    device: Box<dyn PlaybackSession>,
    remote: Box<dyn PlaybackSession>,
    active: Mode,
    device_memory: Option<Selection>,
    remote_memory: Option<Selection>,
    segments: Arc<[String]>,
    max_segment_chars: usize,
}

impl ModeCoordinator {
    pub fn new(
        device: Box<dyn PlaybackSession>,
        remote: Box<dyn PlaybackSession>,
        initial_mode: Mode,
        max_segment_chars: usize,
    ) -> Self {
        Self {
            device,
            remote,
            active: initial_mode,
            device_memory: None,
            remote_memory: None,
            segments: Arc::from(Vec::new()),
            max_segment_chars,
        }
    }

    /// Segment `text` and hand the result to both sessions.
    ///
    /// Stops any playback and forgets remembered selections.  Returns the
    /// number of segments.
    pub fn load_text(&mut self, text: &str) -> usize {
        self.segments = segment_with_limit(text, self.max_segment_chars).into();
        self.device.load(Arc::clone(&self.segments));
        self.remote.load(Arc::clone(&self.segments));
        self.device_memory = None;
        self.remote_memory = None;
        log::info!("loaded {} segment(s)", self.segments.len());
        self.segments.len()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn active_mode(&self) -> Mode {
        self.active
    }

    pub fn session(&self, mode: Mode) -> &dyn PlaybackSession {
        match mode {
            Mode::Device => self.device.as_ref(),
            Mode::Remote => self.remote.as_ref(),
        }
    }

    fn session_mut(&mut self, mode: Mode) -> &mut dyn PlaybackSession {
        match mode {
            Mode::Device => self.device.as_mut(),
            Mode::Remote => self.remote.as_mut(),
        }
    }

    fn active_session(&self) -> &dyn PlaybackSession {
        self.session(self.active)
    }

    fn active_session_mut(&mut self) -> &mut dyn PlaybackSession {
        self.session_mut(self.active)
    }

    fn memory_mut(&mut self, mode: Mode) -> &mut Option<Selection> {
        match mode {
            Mode::Device => &mut self.device_memory,
            Mode::Remote => &mut self.remote_memory,
        }
    }

    /// Make `mode` the active one.
    ///
    /// Rejected while either session is playing.  The leaving session is
    /// stopped after its selection has been remembered.
    pub fn switch_mode(&mut self, mode: Mode) -> Result<(), CoordinatorError> {
        if mode == self.active {
            return Ok(());
        }
        for playing in [Mode::Device, Mode::Remote] {
            if self.session(playing).state() == PlayState::Playing {
                return Err(CoordinatorError::SwitchWhilePlaying { playing });
            }
        }

        let leaving = self.active;
        let session = self.session_mut(leaving);
        let remembered = session.position().map(|position| Selection {
            position,
            highlight: session.highlight(),
        });
        session.stop();
        *self.memory_mut(leaving) = remembered;

        self.active = mode;
        if let Some(selection) = self.memory_mut(mode).take() {
            self.session_mut(mode)
                .restore_selection(selection.position, selection.highlight);
        }
        log::info!("switched from {leaving} to {mode} mode");
        Ok(())
    }

    // --- user commands, forwarded to the active session ---

    pub fn play(&mut self) -> Result<(), PlaybackError> {
        self.active_session_mut().play()
    }

    /// Jump to segment `index` (0-based).
    pub fn seek(&mut self, index: usize) -> Result<(), PlaybackError> {
        self.active_session_mut().select(index)
    }

    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        self.active_session_mut().pause()
    }

    pub fn resume(&mut self) -> Result<(), PlaybackError> {
        self.active_session_mut().resume()
    }

    pub fn stop(&mut self) {
        self.active_session_mut().stop();
    }

    pub fn restart(&mut self) -> Result<(), PlaybackError> {
        self.active_session_mut().restart()
    }

    pub fn select_voice(&mut self, id: &str) -> Result<(), PlaybackError> {
        self.active_session_mut().select_voice(id)
    }

    pub fn set_rate(&mut self, rate: f32) -> Result<(), PlaybackError> {
        self.active_session_mut().set_rate(rate)
    }

    /// Stop both sessions, e.g. on shutdown.
    pub fn stop_all(&mut self) {
        self.device.stop();
        self.remote.stop();
    }

    /// Route a completion event to the session that asked for it.
    pub fn handle_event(&mut self, event: ModeEvent) -> Result<(), PlaybackError> {
        self.session_mut(event.mode).handle_event(event.event)
    }

    // --- observers for the active session ---

    pub fn state(&self) -> PlayState {
        self.active_session().state()
    }

    /// Index of the segment to highlight, `None` when the highlight is off.
    pub fn highlighted_index(&self) -> Option<usize> {
        let session = self.active_session();
        session.position().filter(|_| session.highlight())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.active_session().snapshot()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
