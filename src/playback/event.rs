//! Completion events flowing back from engines, fetches and the sink.
//!
//! Everything asynchronous in playback (an utterance finishing, a clip
//! arriving, a scheduled restart) reports back through one unbounded
//! channel.  The run loop forwards each [`ModeEvent`] to the session of the
//! mode that produced it, so all state changes happen on one control flow.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::cache::FetchError;
use super::engine::DeviceVoice;
use super::session::Mode;
use crate::audio::AudioClip;

/// Something a session asked for has completed.
///
/// `generation` is the session's token at the time the work was started.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    UtteranceEnded {
        generation: u64,
    },
    UtteranceFailed {
        generation: u64,
        message: String,
    },
    /// The device voice catalog was (re)discovered.
    VoicesChanged(Vec<DeviceVoice>),
    AudioReady {
        generation: u64,
        index: usize,
        result: Result<Arc<AudioClip>, FetchError>,
    },
    ClipEnded {
        generation: u64,
    },
    ClipFailed {
        generation: u64,
        message: String,
    },
    RestartDue {
        generation: u64,
    },
}

/// A [`SessionEvent`] tagged with the mode whose session should receive it.
#[derive(Debug, Clone)]
pub struct ModeEvent {
    pub mode: Mode,
    pub event: SessionEvent,
}

/// Sending half bound to one mode.
#[derive(Debug, Clone)]
pub struct EventSender {
    mode: Mode,
    tx: mpsc::UnboundedSender<ModeEvent>,
}

impl EventSender {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Post an event.  Events sent after the run loop exits are dropped.
    pub fn send(&self, event: SessionEvent) {
        if self
            .tx
            .send(ModeEvent {
                mode: self.mode,
                event,
            })
            .is_err()
        {
            log::debug!("{} event dropped: receiver closed", self.mode);
        }
    }
}

/// Factory for per-mode senders sharing one receiver.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<ModeEvent>,
}

impl EventBus {
    pub fn sender(&self, mode: Mode) -> EventSender {
        EventSender {
            mode,
            tx: self.tx.clone(),
        }
    }
}

/// Create the session event channel.
pub fn event_channel() -> (EventBus, mpsc::UnboundedReceiver<ModeEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventBus { tx }, rx)
}
