//! Audio for remote playback: PCM wrapping and output.
//!
//! # Pipeline
//!
//! ```text
//! base64 PCM (gateway) → decode → AudioClip::from_pcm (WAV header)
//!                      → AudioSink::play → ClipEnded { generation }
//! ```

pub mod sink;
pub mod wav;

pub use sink::{AudioSink, RodioSink, SinkError, UnavailableSink};
pub use wav::{AudioClip, PcmFormat, WavError, DEFAULT_SAMPLE_RATE, WAV_HEADER_LEN};
