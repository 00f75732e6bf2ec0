//! Read-aloud playback in two modes.
//!
//! # Flow
//!
//! ```text
//! user command ──▶ ModeCoordinator ──▶ active PlaybackSession
//!                                        ├─ DeviceSession  ──▶ VoiceEngine (espeak-ng)
//!                                        └─ RemoteSession  ──▶ AudioFetcher ──▶ SynthesisGateway
//!                                                           └─▶ AudioSink (rodio)
//!
//! engine / fetch / sink completion ──▶ ModeEvent (mpsc) ──▶ ModeCoordinator::handle_event
//! ```
//!
//! Each session keeps a generation counter.  Starting, seeking, stopping
//! and failing all bump it, and every completion carries the generation it
//! was started under, so late completions from abandoned work are dropped.

pub mod cache;
pub mod coordinator;
pub mod device;
pub mod engine;
pub mod event;
pub mod remote;
pub mod session;

pub use cache::{AudioCache, AudioFetcher, CacheKey, FetchError, FetchResult};
pub use coordinator::{CoordinatorError, ModeCoordinator};
pub use device::DeviceSession;
pub use engine::{
    choose_default_voice, parse_voice_list, CommandVoiceEngine, DeviceVoice, EngineError,
    Utterance, VoiceEngine,
};
pub use event::{event_channel, EventBus, EventSender, ModeEvent, SessionEvent};
pub use remote::RemoteSession;
pub use session::{
    Mode, PlayState, PlaybackError, PlaybackSession, SessionSnapshot, VoiceOption, MAX_RATE,
    MIN_RATE,
};
