//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and handed to the
//! playback backends at startup.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::playback::Mode;

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// Settings shared by both playback modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Mode that is active when a document is first opened.
    pub default_mode: Mode,
    /// Upper bound (in characters) for a segment built from several
    /// sentences.  A single longer sentence is kept whole.
    pub max_segment_chars: usize,
    /// Pause between the stop half and the play half of a restart, giving the
    /// backend time to release its previous utterance.
    pub restart_delay_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_mode: Mode::Device,
            max_segment_chars: 200,
            restart_delay_ms: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// DeviceVoiceConfig
// ---------------------------------------------------------------------------

/// Settings for the local speech engine (device mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceVoiceConfig {
    /// Speech engine executable, e.g. `"espeak-ng"`.
    pub program: String,
    /// Language prefix preferred when choosing the default voice.
    pub preferred_language: String,
    /// Language tag used when no voice can be resolved at all.
    pub fallback_language: String,
    /// Speaking-rate multiplier (1.0 = engine default).
    pub rate: f32,
    /// Words per minute the engine speaks at `rate == 1.0`.
    pub base_words_per_minute: u32,
}

impl Default for DeviceVoiceConfig {
    fn default() -> Self {
        Self {
            program: "espeak-ng".into(),
            preferred_language: "th".into(),
            fallback_language: "th-TH".into(),
            rate: 0.95,
            base_words_per_minute: 175,
        }
    }
}

// ---------------------------------------------------------------------------
// GatewayProvider
// ---------------------------------------------------------------------------

/// Which wire protocol the remote synthesis gateway speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayProvider {
    /// A proxy exposing `POST {text, voiceId}` → `{audio, mimeType}`.
    Proxy,
    /// The upstream Gemini `generateContent` endpoint, called directly.
    Gemini,
}

impl Default for GatewayProvider {
    fn default() -> Self {
        Self::Proxy
    }
}

// ---------------------------------------------------------------------------
// RemoteVoiceConfig
// ---------------------------------------------------------------------------

/// Settings for the remote AI voice (remote mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteVoiceConfig {
    /// Which gateway protocol to use.
    pub provider: GatewayProvider,
    /// Proxy endpoint URL (used when `provider == Proxy`).
    pub endpoint: String,
    /// Upstream base URL (used when `provider == Gemini`).
    pub gemini_base_url: String,
    /// Upstream model identifier.
    pub model: String,
    /// API key for the upstream service.  `None` falls back to the
    /// `GEMINI_API_KEY` environment variable.
    pub api_key: Option<String>,
    /// Voice selected on startup.
    pub default_voice: String,
    /// How many upcoming segments are fetched ahead of playback.
    pub prefetch_depth: usize,
    /// Sample rate assumed for the returned PCM when the mime type does not
    /// carry one.
    pub sample_rate: u32,
    /// Optional per-request timeout.  `None` waits for the gateway
    /// indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for RemoteVoiceConfig {
    fn default() -> Self {
        Self {
            provider: GatewayProvider::default(),
            endpoint: "http://localhost:3000/api/tts".into(),
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-2.5-flash-preview-tts".into(),
            api_key: None,
            default_voice: "Kore".into(),
            prefetch_depth: 2,
            sample_rate: 24_000,
            timeout_secs: None,
        }
    }
}

impl RemoteVoiceConfig {
    /// Environment variable consulted when `api_key` is not set.
    pub const API_KEY_ENV: &'static str = "GEMINI_API_KEY";

    /// The configured API key, or the value of [`Self::API_KEY_ENV`].
    ///
    /// Empty strings count as "not set".
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(Self::API_KEY_ENV).ok())
            .filter(|k| !k.is_empty())
    }
}

// ---------------------------------------------------------------------------
// DocumentConfig
// ---------------------------------------------------------------------------

/// Settings for document loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Largest accepted document, in megabytes.
    pub max_file_mb: u64,
    /// External PDF-to-text converter (reads PDF on stdin, writes text to
    /// stdout).
    pub pdf_program: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            max_file_mb: 15,
            pdf_program: "pdftotext".into(),
        }
    }
}

impl DocumentConfig {
    /// `max_file_mb` expressed in bytes.
    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_mb * 1024 * 1024
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use speech_reader::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Settings shared by both playback modes.
    pub playback: PlaybackConfig,
    /// Local speech engine settings.
    pub device: DeviceVoiceConfig,
    /// Remote AI voice settings.
    pub remote: RemoteVoiceConfig,
    /// Document loading settings.
    pub document: DocumentConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests and `--config`).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// A default `AppConfig` survives a TOML round trip.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.playback.default_mode, loaded.playback.default_mode);
        assert_eq!(
            original.playback.max_segment_chars,
            loaded.playback.max_segment_chars
        );
        assert_eq!(original.device.program, loaded.device.program);
        assert_eq!(original.device.rate, loaded.device.rate);
        assert_eq!(original.remote.provider, loaded.remote.provider);
        assert_eq!(original.remote.endpoint, loaded.remote.endpoint);
        assert_eq!(original.remote.default_voice, loaded.remote.default_voice);
        assert_eq!(original.remote.timeout_secs, loaded.remote.timeout_secs);
        assert_eq!(original.document.max_file_mb, loaded.document.max_file_mb);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.playback.default_mode, Mode::Device);
        assert_eq!(config.remote.default_voice, "Kore");
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.playback.max_segment_chars, 200);
        assert_eq!(cfg.playback.restart_delay_ms, 100);
        assert_eq!(cfg.device.preferred_language, "th");
        assert_eq!(cfg.device.fallback_language, "th-TH");
        assert!((cfg.device.rate - 0.95).abs() < f32::EPSILON);
        assert_eq!(cfg.remote.provider, GatewayProvider::Proxy);
        assert_eq!(cfg.remote.prefetch_depth, 2);
        assert_eq!(cfg.remote.sample_rate, 24_000);
        assert!(cfg.remote.timeout_secs.is_none());
        assert_eq!(cfg.document.max_file_bytes(), 15 * 1024 * 1024);
    }

    /// A partial file only overrides what it names.
    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[remote]\nprovider = \"gemini\"\ndefault_voice = \"Puck\"\n",
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).expect("load");
        assert_eq!(cfg.remote.provider, GatewayProvider::Gemini);
        assert_eq!(cfg.remote.default_voice, "Puck");
        assert_eq!(cfg.remote.prefetch_depth, 2);
        assert_eq!(cfg.playback.max_segment_chars, 200);
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.playback.default_mode = Mode::Remote;
        cfg.device.rate = 1.25;
        cfg.remote.api_key = Some("key-123".into());
        cfg.remote.timeout_secs = Some(30);
        cfg.document.max_file_mb = 5;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.playback.default_mode, Mode::Remote);
        assert!((loaded.device.rate - 1.25).abs() < f32::EPSILON);
        assert_eq!(loaded.remote.api_key.as_deref(), Some("key-123"));
        assert_eq!(loaded.remote.timeout_secs, Some(30));
        assert_eq!(loaded.document.max_file_mb, 5);
    }

    #[test]
    fn configured_api_key_wins_over_environment() {
        let cfg = RemoteVoiceConfig {
            api_key: Some("from-config".into()),
            ..RemoteVoiceConfig::default()
        };
        assert_eq!(cfg.resolved_api_key().as_deref(), Some("from-config"));
    }
}
