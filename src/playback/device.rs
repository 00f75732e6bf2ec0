//! Device playback: one local utterance per segment.
//!
//! ```text
//! play ──▶ speak(segment 0) ──UtteranceEnded──▶ speak(1) ──▶ … ──▶ Idle (position 0)
//! seek i ──▶ cancel, speak(i)
//! engine error ──▶ Idle (position 0), error kept
//! ```
//!
//! Voice and rate are read when each utterance is dispatched, so a change
//! made mid-document applies from the next segment on.

use std::sync::Arc;
use std::time::Duration;

use super::engine::{choose_default_voice, DeviceVoice, Utterance, VoiceEngine};
use super::event::{EventSender, SessionEvent};
use super::session::{
    check_index, Mode, PlayState, PlaybackError, PlaybackSession, VoiceOption, MAX_RATE,
    MIN_RATE,
};
use crate::config::DeviceVoiceConfig;

pub struct DeviceSession {
    engine: Box<dyn VoiceEngine>,
    events: EventSender,
    segments: Arc<[String]>,
    state: PlayState,
    position: usize,
    highlight: bool,
    generation: u64,
    voices: Vec<DeviceVoice>,
    selected_voice: Option<String>,
    /// Voice asked for before the catalog arrived.
    requested_voice: Option<String>,
    preferred_language: String,
    fallback_language: String,
    rate: f32,
    restart_delay: Duration,
    last_error: Option<String>,
}

impl DeviceSession {
    pub fn new(
        engine: Box<dyn VoiceEngine>,
        events: EventSender,
        config: &DeviceVoiceConfig,
        restart_delay: Duration,
    ) -> Self {
        Self {
            engine,
            events,
            segments: Arc::from(Vec::new()),
            state: PlayState::Idle,
            position: 0,
            highlight: false,
            generation: 0,
            voices: Vec::new(),
            selected_voice: None,
            requested_voice: None,
            preferred_language: config.preferred_language.clone(),
            fallback_language: config.fallback_language.clone(),
            rate: config.rate.clamp(MIN_RATE, MAX_RATE),
            restart_delay,
            last_error: None,
        }
    }

    /// Replace the voice catalog.
    ///
    /// A voice requested while the catalog was empty wins if it is listed.
    /// Otherwise the default is re-picked when nothing is selected yet or the
    /// selected voice disappeared.
    pub fn set_voices(&mut self, voices: Vec<DeviceVoice>) {
        self.voices = voices;
        if let Some(requested) = self.requested_voice.take() {
            if self.voices.iter().any(|v| v.id == requested) {
                log::info!("device voice: {requested}");
                self.selected_voice = Some(requested);
                return;
            }
            log::warn!("requested device voice '{requested}' is not available");
        }
        let still_present = self
            .selected_voice
            .as_deref()
            .is_some_and(|id| self.voices.iter().any(|v| v.id == id));
        if !still_present {
            self.selected_voice =
                choose_default_voice(&self.voices, &self.preferred_language, &self.fallback_language)
                    .map(|v| v.id.clone());
            if let Some(id) = &self.selected_voice {
                log::info!("device voice: {id}");
            }
        }
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    fn current_voice(&self) -> Option<&DeviceVoice> {
        let selected = self.selected_voice.as_deref()?;
        self.voices.iter().find(|v| v.id == selected)
    }

    /// Cancel whatever is speaking and start segment `index`.
    fn begin(&mut self, index: usize) -> Result<(), PlaybackError> {
        check_index(index, self.segments.len())?;
        self.engine.cancel();
        self.generation += 1;
        self.position = index;
        self.state = PlayState::Playing;
        self.highlight = true;
        self.last_error = None;
        self.dispatch(index)
    }

    fn dispatch(&mut self, index: usize) -> Result<(), PlaybackError> {
        let voice = self.current_voice().cloned();
        let lang = voice
            .as_ref()
            .map_or_else(|| self.fallback_language.clone(), |v| v.lang.clone());
        let utterance = Utterance {
            text: self.segments[index].clone(),
            voice,
            lang,
            rate: self.rate,
            pitch: 1.0,
        };
        match self.engine.speak(utterance, self.generation) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e.to_string())),
        }
    }

    fn fail(&mut self, message: String) -> PlaybackError {
        log::error!("device playback failed: {message}");
        self.engine.cancel();
        self.generation += 1;
        self.state = PlayState::Idle;
        self.position = 0;
        self.last_error = Some(message.clone());
        PlaybackError::Engine(message)
    }

    fn advance(&mut self) -> Result<(), PlaybackError> {
        let next = self.position + 1;
        if next < self.segments.len() {
            self.position = next;
            return self.dispatch(next);
        }
        log::info!("device playback finished");
        self.generation += 1;
        self.state = PlayState::Idle;
        self.position = 0;
        Ok(())
    }

    fn is_current(&self, generation: u64) -> bool {
        if generation != self.generation {
            log::debug!(
                "ignoring stale device event (generation {generation}, current {})",
                self.generation
            );
            return false;
        }
        true
    }
}

impl PlaybackSession for DeviceSession {
    fn mode(&self) -> Mode {
        Mode::Device
    }

    fn load(&mut self, segments: Arc<[String]>) {
        self.stop();
        self.segments = segments;
        self.last_error = None;
    }

    /// Always reads from the first segment.
    fn play(&mut self) -> Result<(), PlaybackError> {
        if self.segments.is_empty() {
            return Err(PlaybackError::NoSegments);
        }
        self.begin(0)
    }

    fn play_from_index(&mut self, index: usize) -> Result<(), PlaybackError> {
        self.begin(index)
    }

    /// Picking a segment starts reading there, whatever the state.
    fn select(&mut self, index: usize) -> Result<(), PlaybackError> {
        self.begin(index)
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        if self.state != PlayState::Playing {
            return Err(PlaybackError::InvalidTransition {
                action: "pause",
                state: self.state,
            });
        }
        self.engine.pause();
        self.state = PlayState::Paused;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), PlaybackError> {
        if self.state != PlayState::Paused {
            return Err(PlaybackError::InvalidTransition {
                action: "resume",
                state: self.state,
            });
        }
        self.engine.resume();
        self.state = PlayState::Playing;
        Ok(())
    }

    fn stop(&mut self) {
        self.engine.cancel();
        self.generation += 1;
        self.state = PlayState::Idle;
        self.position = 0;
        self.highlight = false;
    }

    fn restart(&mut self) -> Result<(), PlaybackError> {
        if self.segments.is_empty() {
            return Err(PlaybackError::NoSegments);
        }
        self.stop();
        self.highlight = true;

        let generation = self.generation;
        let events = self.events.clone();
        let delay = self.restart_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            events.send(SessionEvent::RestartDue { generation });
        });
        Ok(())
    }

    fn restore_selection(&mut self, position: usize, highlight: bool) {
        if self.state != PlayState::Idle || self.segments.is_empty() {
            return;
        }
        self.position = position.min(self.segments.len() - 1);
        self.highlight = highlight;
    }

    fn handle_event(&mut self, event: SessionEvent) -> Result<(), PlaybackError> {
        match event {
            SessionEvent::UtteranceEnded { generation } => {
                if self.is_current(generation) && self.state != PlayState::Idle {
                    return self.advance();
                }
            }
            SessionEvent::UtteranceFailed {
                generation,
                message,
            } => {
                if self.is_current(generation) && self.state != PlayState::Idle {
                    return Err(self.fail(message));
                }
            }
            SessionEvent::RestartDue { generation } => {
                if self.is_current(generation) && self.state == PlayState::Idle {
                    return self.play();
                }
            }
            SessionEvent::VoicesChanged(voices) => self.set_voices(voices),
            other => log::debug!("device session ignoring {other:?}"),
        }
        Ok(())
    }

    fn state(&self) -> PlayState {
        self.state
    }

    fn position(&self) -> Option<usize> {
        (!self.segments.is_empty()).then_some(self.position)
    }

    fn highlight(&self) -> bool {
        self.highlight
    }

    fn segment_count(&self) -> usize {
        self.segments.len()
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn voices(&self) -> Vec<VoiceOption> {
        self.voices
            .iter()
            .map(|v| VoiceOption {
                id: v.id.clone(),
                label: format!("{} ({})", v.name, v.lang),
                selected: self.selected_voice.as_deref() == Some(v.id.as_str()),
            })
            .collect()
    }

    fn selected_voice(&self) -> Option<&str> {
        self.selected_voice.as_deref()
    }

    /// Takes effect from the next utterance; allowed while playing.
    ///
    /// Before the catalog has been discovered the id is kept and applied by
    /// [`DeviceSession::set_voices`].
    fn select_voice(&mut self, id: &str) -> Result<(), PlaybackError> {
        if self.voices.is_empty() {
            log::info!("voice catalog not loaded yet; '{id}' will be applied when it arrives");
            self.requested_voice = Some(id.to_string());
            return Ok(());
        }
        let voice = self
            .voices
            .iter()
            .find(|v| v.id == id)
            .ok_or_else(|| PlaybackError::UnknownVoice(id.to_string()))?;
        self.selected_voice = Some(voice.id.clone());
        self.requested_voice = None;
        Ok(())
    }

    fn set_rate(&mut self, rate: f32) -> Result<(), PlaybackError> {
        if !(MIN_RATE..=MAX_RATE).contains(&rate) {
            return Err(PlaybackError::InvalidRate(rate));
        }
        self.rate = rate;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
