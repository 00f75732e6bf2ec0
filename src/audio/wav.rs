//! Raw PCM → playable WAV container.
//!
//! Remote synthesis returns headerless little-endian PCM.  Audio output
//! backends expect a container, so [`AudioClip::from_pcm`] prepends a
//! standard 44-byte RIFF/WAVE header using `hound` and keeps the result
//! in a shared buffer that can be handed to the sink without copying.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Sample rate assumed when the MIME type does not carry one.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Size of the canonical RIFF/WAVE header written for PCM data.
pub const WAV_HEADER_LEN: usize = 44;

// ---------------------------------------------------------------------------
// WavError
// ---------------------------------------------------------------------------

/// Errors raised while wrapping PCM into a WAV container.
#[derive(Debug, Error)]
pub enum WavError {
    #[error("only 16-bit PCM is supported, got {0}-bit")]
    UnsupportedBitDepth(u16),

    #[error("PCM payload is empty")]
    Empty,

    #[error("failed to encode WAV: {0}")]
    Encode(#[from] hound::Error),
}

// ---------------------------------------------------------------------------
// PcmFormat
// ---------------------------------------------------------------------------

/// Layout of a headerless PCM payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

impl PcmFormat {
    /// Mono 16-bit PCM at `sample_rate`.
    pub fn mono16(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Derive the format from a MIME type such as `audio/L16;rate=24000`.
    ///
    /// A `rate=` parameter overrides `default_rate`; everything else stays
    /// mono 16-bit.
    pub fn from_mime(mime: &str, default_rate: u32) -> Self {
        Self::mono16(parse_rate(mime).unwrap_or(default_rate))
    }

    fn block_align(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bits_per_sample / 8)
    }
}

/// Extract the `rate=` parameter from a MIME type, if present and valid.
fn parse_rate(mime: &str) -> Option<u32> {
    mime.split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("rate"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .filter(|rate| *rate > 0)
}

// ---------------------------------------------------------------------------
// AudioClip
// ---------------------------------------------------------------------------

/// A complete WAV file ready for playback.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    wav: Arc<[u8]>,
    format: PcmFormat,
    data_len: u32,
}

impl AudioClip {
    /// Wrap raw little-endian 16-bit PCM in a WAV container.
    ///
    /// A trailing partial sample frame is dropped with a warning rather than
    /// rejected, so slightly truncated payloads still play.
    pub fn from_pcm(pcm: &[u8], format: PcmFormat) -> Result<Self, WavError> {
        if format.bits_per_sample != 16 {
            return Err(WavError::UnsupportedBitDepth(format.bits_per_sample));
        }

        let align = format.block_align();
        let usable = pcm.len() - pcm.len() % align;
        if usable < pcm.len() {
            log::warn!(
                "PCM payload has {} trailing byte(s) that do not form a full frame; dropping",
                pcm.len() - usable
            );
        }
        if usable == 0 {
            return Err(WavError::Empty);
        }

        let spec = hound::WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: format.bits_per_sample,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + usable));
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            let mut samples = writer.get_i16_writer((usable / 2) as u32);
            for pair in pcm[..usable].chunks_exact(2) {
                samples.write_sample(i16::from_le_bytes([pair[0], pair[1]]));
            }
            samples.flush()?;
            writer.finalize()?;
        }

        Ok(Self {
            wav: cursor.into_inner().into(),
            format,
            data_len: usable as u32,
        })
    }

    /// The full WAV file, header included.
    pub fn wav_bytes(&self) -> &[u8] {
        &self.wav
    }

    /// A cheap handle to the WAV bytes for decoders that need ownership.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.wav)
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Number of PCM bytes in the data chunk.
    pub fn data_len(&self) -> u32 {
        self.data_len
    }

    /// Playback length derived from the data size and format.
    pub fn duration(&self) -> Duration {
        let bytes_per_second = self.format.sample_rate as u64 * self.format.block_align() as u64;
        if bytes_per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.data_len as f64 / bytes_per_second as f64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
