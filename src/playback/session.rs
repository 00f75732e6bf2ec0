//! Shared vocabulary of the two playback sessions.
//!
//! Both sessions iterate the same segment list and expose the same control
//! surface through [`PlaybackSession`], which lets the coordinator treat
//! them uniformly.
//!
//! ```text
//! Idle ──play / seek──▶ Playing ──pause──▶ Paused
//!   ▲                    │   ▲               │
//!   │                    │   └────resume─────┘
//!   └──stop / end / error┴───────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::event::SessionEvent;

/// Lowest accepted speaking rate.
pub const MIN_RATE: f32 = 0.5;
/// Highest accepted speaking rate.
pub const MAX_RATE: f32 = 2.0;

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Which synthesis path is reading the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Local speech engine, one utterance per segment.
    #[default]
    Device,
    /// Remote AI voice, one fetched clip per segment.
    Remote,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::Device => "device",
            Mode::Remote => "remote",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "device" | "local" => Ok(Mode::Device),
            "remote" | "ai" => Ok(Mode::Remote),
            other => Err(format!("unknown mode '{other}' (expected device or remote)")),
        }
    }
}

// ---------------------------------------------------------------------------
// PlayState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Idle,
    Playing,
    Paused,
}

impl PlayState {
    pub fn label(self) -> &'static str {
        match self {
            PlayState::Idle => "idle",
            PlayState::Playing => "playing",
            PlayState::Paused => "paused",
        }
    }
}

impl fmt::Display for PlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

/// Errors surfaced by playback operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    #[error("no text loaded")]
    NoSegments,

    #[error("segment {index} is out of range (document has {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: PlayState,
    },

    #[error("the voice cannot be changed during playback")]
    VoiceLocked,

    #[error("unknown voice: {0}")]
    UnknownVoice(String),

    #[error("{0} is not supported in this mode")]
    Unsupported(&'static str),

    #[error("rate {0} is outside 0.5..=2.0")]
    InvalidRate(f32),

    #[error("speech engine error: {0}")]
    Engine(String),

    /// Remote synthesis failed; carries the backend's message unchanged.
    #[error("{0}")]
    Synthesis(String),

    #[error("audio output error: {0}")]
    Output(String),
}

// ---------------------------------------------------------------------------
// VoiceOption / SessionSnapshot
// ---------------------------------------------------------------------------

/// One entry of a session's voice catalog, for display.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceOption {
    pub id: String,
    pub label: String,
    pub selected: bool,
}

/// Point-in-time view of a session for status display.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub state: PlayState,
    pub position: Option<usize>,
    pub highlight: bool,
    pub segment_count: usize,
    pub loading: bool,
    /// Look-ahead requests issued for the current segment.
    pub prefetching: usize,
    pub voice: Option<String>,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// PlaybackSession trait
// ---------------------------------------------------------------------------

/// Control surface shared by device and remote playback.
///
/// Every operation that starts, moves or stops playback invalidates all
/// completions still in flight; [`handle_event`](Self::handle_event) drops
/// events whose generation no longer matches.
pub trait PlaybackSession {
    fn mode(&self) -> Mode;

    /// Replace the segment list.  Stops playback and resets the position.
    fn load(&mut self, segments: Arc<[String]>);

    /// Start reading.  The starting segment depends on the mode.
    fn play(&mut self) -> Result<(), PlaybackError>;

    /// Start reading at `index`, discarding whatever was playing.
    fn play_from_index(&mut self, index: usize) -> Result<(), PlaybackError>;

    /// React to the user picking segment `index`.
    fn select(&mut self, index: usize) -> Result<(), PlaybackError>;

    fn pause(&mut self) -> Result<(), PlaybackError>;
    fn resume(&mut self) -> Result<(), PlaybackError>;

    /// Stop playback: idle, position 0, no highlight.
    fn stop(&mut self);

    /// Stop, then begin again from segment 0 after a short delay.
    fn restart(&mut self) -> Result<(), PlaybackError>;

    /// Put back a remembered position and highlight while idle.
    fn restore_selection(&mut self, position: usize, highlight: bool);

    /// Apply a completion event from an engine, fetch or sink.
    fn handle_event(&mut self, event: SessionEvent) -> Result<(), PlaybackError>;

    fn state(&self) -> PlayState;

    /// Current segment index, `None` when nothing is loaded.
    fn position(&self) -> Option<usize>;

    fn highlight(&self) -> bool;
    fn segment_count(&self) -> usize;
    fn last_error(&self) -> Option<&str>;

    fn voices(&self) -> Vec<VoiceOption>;
    fn selected_voice(&self) -> Option<&str>;
    fn select_voice(&mut self, id: &str) -> Result<(), PlaybackError>;

    fn set_rate(&mut self, _rate: f32) -> Result<(), PlaybackError> {
        Err(PlaybackError::Unsupported("changing the rate"))
    }

    /// `true` while the current segment's audio is being produced.
    fn loading(&self) -> bool {
        false
    }

    /// Look-ahead requests issued when the current segment started.
    fn prefetching(&self) -> usize {
        0
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode(),
            state: self.state(),
            position: self.position(),
            highlight: self.highlight(),
            segment_count: self.segment_count(),
            loading: self.loading(),
            prefetching: self.prefetching(),
            voice: self.selected_voice().map(str::to_string),
            error: self.last_error().map(str::to_string),
        }
    }
}

/// Bounds check shared by both sessions.
pub(crate) fn check_index(index: usize, len: usize) -> Result<(), PlaybackError> {
    if len == 0 {
        return Err(PlaybackError::NoSegments);
    }
    if index >= len {
        return Err(PlaybackError::IndexOutOfRange { index, len });
    }
    Ok(())
}
