//! Remote playback: one synthesized clip per segment.
//!
//! ```text
//! begin(i) ──▶ fetch clip i (cache / shared request) ──AudioReady──▶ sink.play
//!          └─▶ prefetch i+1 ..= i+depth (best effort)
//! ClipEnded ──▶ continue? ──yes──▶ begin(i+1) … ──last──▶ Idle (position 0)
//! fetch error ──▶ Idle, position kept, error shown
//! ```
//!
//! Fetches run as spawned tasks and report back through the event channel,
//! tagged with the generation they were started under.  Anything tagged
//! with an older generation is ignored.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::cache::{AudioFetcher, CacheKey, FetchError, FetchResult};
use super::event::{EventSender, SessionEvent};
use super::session::{check_index, Mode, PlayState, PlaybackError, PlaybackSession, VoiceOption};
use crate::audio::{AudioClip, AudioSink};
use crate::config::RemoteVoiceConfig;
use crate::gateway::{find_voice, SynthesisGateway, DEFAULT_REMOTE_VOICE, REMOTE_VOICES};

pub struct RemoteSession {
    fetcher: AudioFetcher,
    sink: Box<dyn AudioSink>,
    events: EventSender,
    segments: Arc<[String]>,
    state: PlayState,
    position: usize,
    highlight: bool,
    loading: bool,
    continue_playback: bool,
    generation: u64,
    voice: String,
    prefetch_depth: usize,
    /// Look-ahead requests issued when the current segment started.
    prefetch_issued: usize,
    prefetch_in_flight: Arc<AtomicUsize>,
    restart_delay: Duration,
    last_error: Option<String>,
}

impl RemoteSession {
    pub fn new(
        gateway: Arc<dyn SynthesisGateway>,
        sink: Box<dyn AudioSink>,
        events: EventSender,
        config: &RemoteVoiceConfig,
        restart_delay: Duration,
    ) -> Self {
        let voice = match find_voice(&config.default_voice) {
            Some(voice) => voice.id,
            None => {
                log::warn!(
                    "unknown remote voice '{}', using {DEFAULT_REMOTE_VOICE}",
                    config.default_voice
                );
                DEFAULT_REMOTE_VOICE
            }
        };

        Self {
            fetcher: AudioFetcher::new(gateway, config.sample_rate),
            sink,
            events,
            segments: Arc::from(Vec::new()),
            state: PlayState::Idle,
            position: 0,
            highlight: false,
            loading: false,
            continue_playback: false,
            generation: 0,
            voice: voice.to_string(),
            prefetch_depth: config.prefetch_depth,
            prefetch_issued: 0,
            prefetch_in_flight: Arc::new(AtomicUsize::new(0)),
            restart_delay,
            last_error: None,
        }
    }

    /// Clip for segment `index` with the current voice.
    ///
    /// Served from the cache when possible; otherwise joins or starts the
    /// single request for that key.  The returned future owns everything it
    /// needs, so it can be spawned.
    pub fn fetch_audio(&self, index: usize) -> impl Future<Output = FetchResult> + Send + 'static {
        let fetcher = self.fetcher.clone();
        let key = CacheKey::new(index, self.voice.as_str());
        let text = self.segments.get(index).cloned();
        async move {
            match text {
                Some(text) => fetcher.fetch(key, text).await,
                None => Err(FetchError::InvalidIndex(index)),
            }
        }
    }

    pub fn fetcher(&self) -> &AudioFetcher {
        &self.fetcher
    }

    /// Look-ahead requests that have not finished yet, across segments.
    pub fn prefetches_in_flight(&self) -> usize {
        self.prefetch_in_flight.load(Ordering::SeqCst)
    }

    /// Stop the current clip and start segment `index`.
    fn begin(&mut self, index: usize) -> Result<(), PlaybackError> {
        check_index(index, self.segments.len())?;
        self.generation += 1;
        self.sink.stop();
        self.position = index;
        self.highlight = true;
        self.state = PlayState::Playing;
        self.loading = true;
        self.continue_playback = true;
        self.last_error = None;

        let fetch = self.fetch_audio(index);
        let events = self.events.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = fetch.await;
            events.send(SessionEvent::AudioReady {
                generation,
                index,
                result,
            });
        });

        self.prefetch_after(index);
        Ok(())
    }

    /// Warm the cache for the segments following `index`.
    fn prefetch_after(&mut self, index: usize) {
        let last = index
            .saturating_add(self.prefetch_depth)
            .min(self.segments.len().saturating_sub(1));
        let mut issued = 0;
        for next in index + 1..=last {
            let key = CacheKey::new(next, self.voice.as_str());
            if self.fetcher.cache().is_known(&key) {
                continue;
            }
            let fetch = self.fetch_audio(next);
            let counter = Arc::clone(&self.prefetch_in_flight);
            counter.fetch_add(1, Ordering::SeqCst);
            issued += 1;
            tokio::spawn(async move {
                if let Err(e) = fetch.await {
                    log::warn!("prefetch of segment {next} failed: {e}");
                }
                counter.fetch_sub(1, Ordering::SeqCst);
            });
        }
        self.prefetch_issued = issued;
        log::debug!("segment {index}: {issued} prefetch(es) issued");
    }

    fn start_clip(&mut self, clip: Arc<AudioClip>) -> Result<(), PlaybackError> {
        self.loading = false;
        // Paused while loading: queue the clip without letting it sound.
        let start_paused = self.state == PlayState::Paused;
        if let Err(e) = self.sink.play(clip, self.generation, start_paused) {
            return Err(self.fail(PlaybackError::Output(e.to_string())));
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<(), PlaybackError> {
        let next = self.position + 1;
        if self.continue_playback && next < self.segments.len() {
            return self.begin(next);
        }
        log::info!("remote playback finished");
        self.generation += 1;
        self.state = PlayState::Idle;
        self.loading = false;
        self.continue_playback = false;
        self.prefetch_issued = 0;
        self.position = 0;
        Ok(())
    }

    /// Stop on error.  The position is kept so the user can retry in place.
    fn fail(&mut self, error: PlaybackError) -> PlaybackError {
        log::error!("remote playback failed: {error}");
        self.generation += 1;
        self.sink.stop();
        self.state = PlayState::Idle;
        self.loading = false;
        self.continue_playback = false;
        self.prefetch_issued = 0;
        self.last_error = Some(error.to_string());
        error
    }

    fn is_current(&self, generation: u64) -> bool {
        if generation != self.generation {
            log::debug!(
                "ignoring stale remote event (generation {generation}, current {})",
                self.generation
            );
            return false;
        }
        true
    }
}

impl PlaybackSession for RemoteSession {
    fn mode(&self) -> Mode {
        Mode::Remote
    }

    fn load(&mut self, segments: Arc<[String]>) {
        self.stop();
        self.fetcher.cache().clear();
        self.segments = segments;
        self.last_error = None;
    }

    /// Reads from the selected segment onwards; resumes when paused.
    fn play(&mut self) -> Result<(), PlaybackError> {
        match self.state {
            PlayState::Paused => self.resume(),
            PlayState::Playing => Err(PlaybackError::InvalidTransition {
                action: "play",
                state: self.state,
            }),
            PlayState::Idle => {
                if self.segments.is_empty() {
                    return Err(PlaybackError::NoSegments);
                }
                let start = self.position.min(self.segments.len() - 1);
                self.begin(start)
            }
        }
    }

    fn play_from_index(&mut self, index: usize) -> Result<(), PlaybackError> {
        self.begin(index)
    }

    /// While idle, only moves the selection; otherwise jumps there.
    fn select(&mut self, index: usize) -> Result<(), PlaybackError> {
        check_index(index, self.segments.len())?;
        if self.state == PlayState::Idle {
            self.position = index;
            self.highlight = true;
            return Ok(());
        }
        self.begin(index)
    }

    /// Allowed while the clip is still loading; it then starts paused.
    fn pause(&mut self) -> Result<(), PlaybackError> {
        if self.state != PlayState::Playing {
            return Err(PlaybackError::InvalidTransition {
                action: "pause",
                state: self.state,
            });
        }
        self.sink.pause();
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
        self.sink.resume();
        self.state = PlayState::Playing;
        Ok(())
    }

    fn stop(&mut self) {
        self.continue_playback = false;
        self.generation += 1;
        self.sink.stop();
        self.state = PlayState::Idle;
        self.loading = false;
        self.prefetch_issued = 0;
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
            SessionEvent::AudioReady {
                generation,
                index,
                result,
            } => {
                if !self.is_current(generation) || self.state == PlayState::Idle {
                    return Ok(());
                }
                debug_assert_eq!(index, self.position);
                return match result {
                    Ok(clip) => self.start_clip(clip),
                    Err(e) => Err(self.fail(PlaybackError::Synthesis(e.to_string()))),
                };
            }
            SessionEvent::ClipEnded { generation } => {
                if self.is_current(generation) && self.state != PlayState::Idle {
                    return self.advance();
                }
            }
            SessionEvent::ClipFailed {
                generation,
                message,
            } => {
                if self.is_current(generation) && self.state != PlayState::Idle {
                    return Err(self.fail(PlaybackError::Output(message)));
                }
            }
            SessionEvent::RestartDue { generation } => {
                if self.is_current(generation) && self.state == PlayState::Idle {
                    return self.begin(0);
                }
            }
            other => log::debug!("remote session ignoring {other:?}"),
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
        REMOTE_VOICES
            .iter()
            .map(|v| VoiceOption {
                id: v.id.to_string(),
                label: v.description.to_string(),
                selected: v.id == self.voice,
            })
            .collect()
    }

    fn selected_voice(&self) -> Option<&str> {
        Some(self.voice.as_str())
    }

    /// Only while idle.  A different voice empties the cache.
    fn select_voice(&mut self, id: &str) -> Result<(), PlaybackError> {
        let voice = find_voice(id).ok_or_else(|| PlaybackError::UnknownVoice(id.to_string()))?;
        if self.state != PlayState::Idle {
            return Err(PlaybackError::VoiceLocked);
        }
        if voice.id != self.voice {
            log::info!("remote voice: {}", voice.id);
            self.voice = voice.id.to_string();
            self.fetcher.cache().clear();
        }
        Ok(())
    }

    fn loading(&self) -> bool {
        self.loading
    }

    fn prefetching(&self) -> usize {
        self.prefetch_issued
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::sync::mpsc;

    use super::*;
    use crate::audio::SinkError;
    use crate::playback::cache::fakes::FakeGateway;
    use crate::playback::{event_channel, ModeEvent};

    #[derive(Debug, Clone, PartialEq)]
    enum SinkCall {
        Play(u64),
        PlayPaused(u64),
        Pause,
        Resume,
        Stop,
    }

    struct FakeSink {
        calls: Arc<Mutex<Vec<SinkCall>>>,
    }

    impl AudioSink for FakeSink {
        fn play(
            &mut self,
            _clip: Arc<AudioClip>,
            generation: u64,
            start_paused: bool,
        ) -> Result<(), SinkError> {
            let call = if start_paused {
                SinkCall::PlayPaused(generation)
            } else {
                SinkCall::Play(generation)
            };
            self.calls.lock().unwrap().push(call);
            Ok(())
        }
        fn pause(&mut self) {
            self.calls.lock().unwrap().push(SinkCall::Pause);
        }
        fn resume(&mut self) {
            self.calls.lock().unwrap().push(SinkCall::Resume);
        }
        fn stop(&mut self) {
            self.calls.lock().unwrap().push(SinkCall::Stop);
        }
    }

    struct Harness {
        session: RemoteSession,
        gateway: Arc<FakeGateway>,
        sink_calls: Arc<Mutex<Vec<SinkCall>>>,
        events: mpsc::UnboundedReceiver<ModeEvent>,
    }

    impl Harness {
        /// Deliver the next event to the session.
        async fn pump(&mut self) -> Result<(), PlaybackError> {
            let event = self.events.recv().await.unwrap();
            assert_eq!(event.mode, Mode::Remote);
            self.session.handle_event(event.event)
        }

        /// Deliver events until a clip has been handed to the sink; returns
        /// the generation it was started with.
        async fn pump_until_playing(&mut self) -> u64 {
            loop {
                self.pump().await.unwrap();
                if self.session.loading() || self.session.state() == PlayState::Idle {
                    continue;
                }
                let last_play = self
                    .sink_calls
                    .lock()
                    .unwrap()
                    .iter()
                    .rev()
                    .find_map(|c| match c {
                        SinkCall::Play(generation) | SinkCall::PlayPaused(generation) => {
                            Some(*generation)
                        }
                        _ => None,
                    });
                if let Some(generation) = last_play {
                    return generation;
                }
            }
        }

        fn plays(&self) -> usize {
            self.sink_calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| matches!(c, SinkCall::Play(_) | SinkCall::PlayPaused(_)))
                .count()
        }

        /// Wait until every look-ahead request has settled.
        async fn settle_prefetches(&self) {
            while self.session.prefetches_in_flight() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
    }

    fn harness_with(segments: &[&str], gateway: FakeGateway, prefetch_depth: usize) -> Harness {
        let (bus, events) = event_channel();
        let gateway = Arc::new(gateway);
        let sink_calls = Arc::new(Mutex::new(Vec::new()));
        let config = RemoteVoiceConfig {
            prefetch_depth,
            ..RemoteVoiceConfig::default()
        };
        let dyn_gateway: Arc<dyn SynthesisGateway> = gateway.clone();
        let mut session = RemoteSession::new(
            dyn_gateway,
            Box::new(FakeSink {
                calls: Arc::clone(&sink_calls),
            }),
            bus.sender(Mode::Remote),
            &config,
            Duration::from_millis(10),
        );
        session.load(segments.iter().map(|s| s.to_string()).collect());
        Harness {
            session,
            gateway,
            sink_calls,
            events,
        }
    }

    fn harness(segments: &[&str]) -> Harness {
        harness_with(segments, FakeGateway::new(Duration::ZERO), 0)
    }

    // --- fetching ---

    #[tokio::test]
    async fn concurrent_fetch_audio_calls_share_one_request() {
        let h = harness_with(&["a", "b"], FakeGateway::new(Duration::from_millis(30)), 0);
        let (a, b) = tokio::join!(h.session.fetch_audio(0), h.session.fetch_audio(0));

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(h.gateway.calls(), 1);
    }

    #[tokio::test]
    async fn fetch_audio_out_of_range_is_an_error() {
        let h = harness(&["a"]);
        assert_eq!(
            h.session.fetch_audio(4).await,
            Err(FetchError::InvalidIndex(4))
        );
        assert_eq!(h.gateway.calls(), 0);
    }

    #[tokio::test]
    async fn changing_voice_clears_cache_and_refetches() {
        let mut h = harness(&["a", "b"]);
        h.session.fetch_audio(0).await.unwrap();
        h.session.select_voice("Puck").unwrap();
        assert!(h.session.fetcher().cache().is_empty());

        h.session.fetch_audio(0).await.unwrap();
        assert_eq!(h.gateway.calls(), 2);
        let voices: Vec<_> = h
            .gateway
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.voice_id.clone().unwrap())
            .collect();
        assert_eq!(voices, vec!["Kore", "Puck"]);
    }

    #[tokio::test]
    async fn selecting_same_voice_keeps_cache() {
        let mut h = harness(&["a"]);
        h.session.fetch_audio(0).await.unwrap();
        h.session.select_voice("kore").unwrap();
        assert_eq!(h.session.fetcher().cache().len(), 1);
    }

    // --- playing through ---

    #[tokio::test]
    async fn plays_all_segments_then_resets() {
        let mut h = harness(&["a", "b", "c"]);
        h.session.play().unwrap();
        assert!(h.session.loading());

        for expected in 0..3 {
            let generation = h.pump_until_playing().await;
            assert_eq!(h.session.position(), Some(expected));
            h.session
                .handle_event(SessionEvent::ClipEnded { generation })
                .unwrap();
        }

        assert_eq!(h.plays(), 3);
        assert_eq!(h.session.state(), PlayState::Idle);
        assert_eq!(h.session.position(), Some(0));
        assert_eq!(h.gateway.requested_texts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn play_starts_from_selected_segment() {
        let mut h = harness(&["a", "b", "c"]);
        h.session.select(2).unwrap();
        assert_eq!(h.session.state(), PlayState::Idle);
        assert!(h.session.highlight());

        h.session.play().unwrap();
        h.pump_until_playing().await;
        assert_eq!(h.gateway.requested_texts(), vec!["c"]);
    }

    #[tokio::test]
    async fn prefetch_warms_following_segments() {
        let mut h = harness_with(&["a", "b", "c", "d"], FakeGateway::new(Duration::ZERO), 2);
        h.session.play().unwrap();
        assert_eq!(h.session.prefetching(), 2);
        h.pump_until_playing().await;

        h.settle_prefetches().await;
        assert_eq!(h.session.prefetching(), 2);
        let cache = h.session.fetcher().cache();
        assert!(cache.get(&CacheKey::new(1, "Kore")).is_some());
        assert!(cache.get(&CacheKey::new(2, "Kore")).is_some());
        assert!(cache.get(&CacheKey::new(3, "Kore")).is_none());
        assert_eq!(h.gateway.calls(), 3);
    }

    #[tokio::test]
    async fn failed_prefetch_does_not_disturb_playback() {
        let gateway = FakeGateway::new(Duration::ZERO);
        gateway.fail_once_for("b", "upstream busy");
        let mut h = harness_with(&["a", "b", "c"], gateway, 2);

        h.session.play().unwrap();
        let generation = h.pump_until_playing().await;
        h.settle_prefetches().await;

        assert_eq!(h.session.state(), PlayState::Playing);
        assert_eq!(h.session.position(), Some(0));
        assert_eq!(h.session.last_error(), None);
        let cache = h.session.fetcher().cache();
        assert!(!cache.is_known(&CacheKey::new(1, "Kore")));
        assert!(cache.get(&CacheKey::new(2, "Kore")).is_some());

        // Segment 1 was never cached, so advancing asks the gateway again.
        h.session
            .handle_event(SessionEvent::ClipEnded { generation })
            .unwrap();
        h.pump_until_playing().await;
        assert_eq!(h.session.position(), Some(1));
        assert_eq!(h.plays(), 2);
        let b_requests = h
            .gateway
            .requested_texts()
            .iter()
            .filter(|t| t.as_str() == "b")
            .count();
        assert_eq!(b_requests, 2);
        assert_eq!(h.gateway.calls(), 4);
    }

    #[tokio::test]
    async fn huge_prefetch_depth_is_clipped_to_the_document() {
        let mut h = harness_with(&["a", "b", "c"], FakeGateway::new(Duration::ZERO), usize::MAX);
        h.session.play().unwrap();
        assert_eq!(h.session.prefetching(), 2);
        h.pump_until_playing().await;
        h.settle_prefetches().await;
        assert_eq!(h.gateway.calls(), 3);
    }

    #[tokio::test]
    async fn stop_resets_prefetch_count() {
        let mut h = harness_with(&["a", "b"], FakeGateway::new(Duration::ZERO), 2);
        h.session.play().unwrap();
        assert_eq!(h.session.prefetching(), 1);
        h.session.stop();
        assert_eq!(h.session.prefetching(), 0);
    }

    // --- seeking and stopping ---

    #[tokio::test]
    async fn seek_while_playing_discards_pending_clip() {
        let mut h = harness_with(&["a", "b", "c"], FakeGateway::new(Duration::from_millis(20)), 0);
        h.session.play().unwrap();
        h.session.select(2).unwrap();

        let generation = h.pump_until_playing().await;
        assert_eq!(h.session.position(), Some(2));
        // Only the clip for the new position ever reaches the sink.
        assert_eq!(h.plays(), 1);
        assert_eq!(
            h.sink_calls.lock().unwrap().last(),
            Some(&SinkCall::Play(generation))
        );
    }

    #[tokio::test]
    async fn seek_then_stop_clears_position_and_highlight() {
        let mut h = harness(&["a", "b", "c"]);
        h.session.play().unwrap();
        h.session.select(2).unwrap();
        h.session.stop();

        assert_eq!(h.session.state(), PlayState::Idle);
        assert_eq!(h.session.position(), Some(0));
        assert!(!h.session.highlight());
        assert!(!h.session.loading());
    }

    #[tokio::test]
    async fn clip_end_after_stop_is_ignored() {
        let mut h = harness(&["a", "b"]);
        h.session.play().unwrap();
        let generation = h.pump_until_playing().await;
        h.session.stop();

        h.session
            .handle_event(SessionEvent::ClipEnded { generation })
            .unwrap();
        assert_eq!(h.session.state(), PlayState::Idle);
        assert_eq!(h.plays(), 1);
    }

    // --- pause / resume ---

    #[tokio::test]
    async fn pause_during_loading_starts_clip_paused() {
        let mut h = harness(&["a"]);
        h.session.play().unwrap();
        h.session.pause().unwrap();
        let generation = h.pump_until_playing().await;

        let calls = h.sink_calls.lock().unwrap().clone();
        assert_eq!(calls.last(), Some(&SinkCall::PlayPaused(generation)));
        assert!(!calls.contains(&SinkCall::Play(generation)));
        assert_eq!(h.session.state(), PlayState::Paused);

        h.session.resume().unwrap();
        assert_eq!(h.sink_calls.lock().unwrap().last(), Some(&SinkCall::Resume));
    }

    #[tokio::test]
    async fn play_while_paused_resumes() {
        let mut h = harness(&["a"]);
        h.session.play().unwrap();
        h.pump_until_playing().await;
        h.session.pause().unwrap();
        h.session.play().unwrap();
        assert_eq!(h.session.state(), PlayState::Playing);
        assert_eq!(h.gateway.calls(), 1);
    }

    // --- errors ---

    #[tokio::test]
    async fn synthesis_error_stops_and_keeps_position() {
        let mut h = harness_with(&["a", "b", "c"], FakeGateway::failing("quota exceeded"), 0);
        h.session.select(1).unwrap();
        h.session.play().unwrap();

        let err = h.pump().await.unwrap_err();
        assert_eq!(err, PlaybackError::Synthesis("quota exceeded".into()));
        assert_eq!(h.session.state(), PlayState::Idle);
        assert_eq!(h.session.position(), Some(1));
        assert_eq!(h.session.last_error(), Some("quota exceeded"));
        assert_eq!(h.plays(), 0);
    }

    #[tokio::test]
    async fn voice_change_is_rejected_while_playing() {
        let mut h = harness(&["a"]);
        h.session.play().unwrap();
        assert_eq!(h.session.select_voice("Puck"), Err(PlaybackError::VoiceLocked));
        assert_eq!(h.session.selected_voice(), Some("Kore"));
        assert!(matches!(
            h.session.select_voice("Nobody"),
            Err(PlaybackError::UnknownVoice(_))
        ));
    }

    // --- restart ---

    #[tokio::test]
    async fn restart_reads_from_the_top() {
        let mut h = harness(&["a", "b", "c"]);
        h.session.select(2).unwrap();
        h.session.play().unwrap();
        h.pump_until_playing().await;

        h.session.restart().unwrap();
        assert_eq!(h.session.state(), PlayState::Idle);
        assert!(h.session.highlight());

        h.pump().await.unwrap(); // RestartDue
        assert_eq!(h.session.state(), PlayState::Playing);
        assert_eq!(h.session.position(), Some(0));
        h.pump_until_playing().await;
        assert_eq!(h.gateway.requested_texts(), vec!["c", "a"]);
    }

    #[test]
    fn unknown_configured_voice_falls_back_to_default() {
        let (bus, _events) = event_channel();
        let config = RemoteVoiceConfig {
            default_voice: "Nobody".into(),
            ..RemoteVoiceConfig::default()
        };
        let session = RemoteSession::new(
            Arc::new(FakeGateway::new(Duration::ZERO)),
            Box::new(FakeSink {
                calls: Arc::new(Mutex::new(Vec::new())),
            }),
            bus.sender(Mode::Remote),
            &config,
            Duration::ZERO,
        );
        assert_eq!(session.selected_voice(), Some("Kore"));
        assert_eq!(session.voices().len(), 13);
    }
}
