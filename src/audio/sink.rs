//! Audio output for synthesized clips.
//!
//! [`AudioSink`] is the seam between the remote playback session and the
//! sound card.  [`RodioSink`] plays clips through the default output device;
//! completion is reported back as a [`SessionEvent::ClipEnded`] carrying the
//! generation token the clip was started with, so a clip that was stopped or
//! replaced never advances playback.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use thiserror::Error;

use super::wav::AudioClip;
use crate::playback::{EventSender, SessionEvent};

// ---------------------------------------------------------------------------
// SinkError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no audio output device available: {0}")]
    NoDevice(String),

    #[error("failed to create output sink: {0}")]
    Sink(String),

    #[error("failed to decode clip: {0}")]
    Decode(String),

    #[error("audio output unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// AudioSink trait
// ---------------------------------------------------------------------------

/// Something that can play one clip at a time.
///
/// `play` replaces whatever is currently playing.  With `start_paused` the
/// clip is queued silent until `resume`.  Implementations report
/// the natural end of a clip asynchronously through the session event
/// channel, tagged with `generation`.
pub trait AudioSink {
    fn play(
        &mut self,
        clip: Arc<AudioClip>,
        generation: u64,
        start_paused: bool,
    ) -> Result<(), SinkError>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
}

// ---------------------------------------------------------------------------
// RodioSink
// ---------------------------------------------------------------------------

/// Default-device output built on `rodio`.
///
/// The output stream must stay on the thread that created it, so this type
/// is not `Send` and lives with the coordinator in the main task.
pub struct RodioSink {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    events: EventSender,
    current: Option<PlayingClip>,
}

struct PlayingClip {
    sink: Arc<Sink>,
    cancelled: Arc<AtomicBool>,
}

impl RodioSink {
    /// Open the default output device.
    pub fn new(events: EventSender) -> Result<Self, SinkError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| SinkError::NoDevice(e.to_string()))?;
        log::info!("audio output opened on default device");
        Ok(Self {
            _stream: stream,
            handle,
            events,
            current: None,
        })
    }
}

impl AudioSink for RodioSink {
    fn play(
        &mut self,
        clip: Arc<AudioClip>,
        generation: u64,
        start_paused: bool,
    ) -> Result<(), SinkError> {
        self.stop();

        let source = Decoder::new(Cursor::new(clip.shared_bytes()))
            .map_err(|e| SinkError::Decode(e.to_string()))?;
        let sink = Sink::try_new(&self.handle).map_err(|e| SinkError::Sink(e.to_string()))?;
        if start_paused {
            sink.pause();
        }
        sink.append(source);

        let sink = Arc::new(sink);
        let cancelled = Arc::new(AtomicBool::new(false));

        // Completion watcher: blocks until the queue drains, then reports the
        // end unless the clip was stopped in the meantime.
        {
            let sink = Arc::clone(&sink);
            let cancelled = Arc::clone(&cancelled);
            let events = self.events.clone();
            std::thread::Builder::new()
                .name("clip-watcher".into())
                .spawn(move || {
                    sink.sleep_until_end();
                    if !cancelled.load(Ordering::SeqCst) {
                        events.send(SessionEvent::ClipEnded { generation });
                    }
                })
                .map_err(|e| SinkError::Sink(e.to_string()))?;
        }

        log::debug!(
            "playing clip ({:.1}s, generation {generation})",
            clip.duration().as_secs_f32()
        );
        self.current = Some(PlayingClip { sink, cancelled });
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(current) = &self.current {
            current.sink.pause();
        }
    }

    fn resume(&mut self) {
        if let Some(current) = &self.current {
            current.sink.play();
        }
    }

    fn stop(&mut self) {
        if let Some(current) = self.current.take() {
            current.cancelled.store(true, Ordering::SeqCst);
            current.sink.stop();
        }
    }
}

impl Drop for RodioSink {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// UnavailableSink
// ---------------------------------------------------------------------------

/// Stand-in used when no output device could be opened.
///
/// Every `play` fails with the original reason, which surfaces as a
/// playback error instead of silently skipping audio.
pub struct UnavailableSink {
    reason: String,
}

impl UnavailableSink {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl AudioSink for UnavailableSink {
    fn play(
        &mut self,
        _clip: Arc<AudioClip>,
        _generation: u64,
        _start_paused: bool,
    ) -> Result<(), SinkError> {
        Err(SinkError::Unavailable(self.reason.clone()))
    }

    fn pause(&mut self) {}
    fn resume(&mut self) {}
    fn stop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PcmFormat;

    #[test]
    fn unavailable_sink_reports_reason() {
        let clip = Arc::new(AudioClip::from_pcm(&[0; 4], PcmFormat::default()).unwrap());
        let mut sink = UnavailableSink::new("no device");
        let err = sink.play(clip, 1, false).unwrap_err();
        assert_eq!(err.to_string(), "audio output unavailable: no device");
    }
}
