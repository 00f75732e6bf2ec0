//! Remote speech synthesis.
//!
//! A [`SynthesisGateway`] turns one segment of text into base64 PCM audio.
//! Two backends speak the same request/response contract:
//!
//! - [`ProxyGateway`] posts `{ text, voiceId }` to a synthesis proxy that
//!   holds the credentials and answers `{ audio, mimeType }` or `{ error }`.
//! - [`GeminiGateway`] calls the Gemini `generateContent` endpoint directly
//!   with an API key from config or the environment.
//!
//! Which one is used is decided by [`RemoteVoiceConfig::provider`].

pub mod gemini;
pub mod proxy;
pub mod voices;

pub use gemini::GeminiGateway;
pub use proxy::ProxyGateway;
pub use voices::{find_voice, RemoteVoice, DEFAULT_REMOTE_VOICE, REMOTE_VOICES};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{GatewayProvider, RemoteVoiceConfig};

/// MIME type reported when a backend does not name one.
pub const DEFAULT_AUDIO_MIME: &str = "audio/L16;rate=24000";

/// Message used when a failed response carries no error text.
const GENERIC_FAILURE: &str = "TTS request failed";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One synthesis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_id: Some(voice_id.into()),
        }
    }

    /// The requested voice, or the default remote voice.
    pub fn voice_or_default(&self) -> &str {
        self.voice_id
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_REMOTE_VOICE)
    }
}

/// Successful synthesis result: base64 PCM plus its MIME type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisResponse {
    pub audio: String,
    #[serde(default = "default_mime")]
    pub mime_type: String,
}

fn default_mime() -> String {
    DEFAULT_AUDIO_MIME.to_string()
}

// ---------------------------------------------------------------------------
// GatewayError
// ---------------------------------------------------------------------------

/// Errors returned by a synthesis backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The backend answered with a non-success status.  Displays the
    /// backend's own message so it can be shown to the user unchanged.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("synthesis request timed out")]
    Timeout,

    #[error("failed to parse synthesis response: {0}")]
    Parse(String),

    #[error("No audio data in response")]
    MissingAudio,

    #[error("Text is required")]
    EmptyText,

    #[error("no API key configured (set {0} or remote.api_key)")]
    MissingApiKey(&'static str),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// SynthesisGateway trait
// ---------------------------------------------------------------------------

/// Async text-to-speech backend.
///
/// Implementors must be `Send + Sync`; the fetcher shares one instance
/// across concurrently running requests as `Arc<dyn SynthesisGateway>`.
#[async_trait]
pub trait SynthesisGateway: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest)
        -> Result<SynthesisResponse, GatewayError>;
}

/// Build the configured backend.
pub fn build_gateway(config: &RemoteVoiceConfig) -> Arc<dyn SynthesisGateway> {
    match config.provider {
        GatewayProvider::Proxy => {
            log::info!("remote synthesis via proxy at {}", config.endpoint);
            Arc::new(ProxyGateway::from_config(config))
        }
        GatewayProvider::Gemini => {
            log::info!("remote synthesis via Gemini model {}", config.model);
            Arc::new(GeminiGateway::from_config(config))
        }
    }
}

/// Shared HTTP client setup: optional per-request timeout.
fn http_client(timeout_secs: Option<u64>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build().unwrap_or_else(|_| reqwest::Client::new())
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

/// One-shot HTTP responder for exercising the gateways end to end.
#[cfg(test)]
pub(crate) mod test_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    pub struct Captured {
        pub head: String,
        pub body: String,
    }

    /// Serve exactly one request with `status` and a JSON `body`.
    ///
    /// Returns the base URL and a receiver for the captured request.
    pub async fn serve_once(status: u16, body: &str) -> (String, oneshot::Receiver<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let body = body.to_string();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];

            let header_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
                if n == 0 {
                    break buf.len();
                }
            };

            let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let content_length = head
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < header_end + content_length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let request_body = String::from_utf8_lossy(&buf[header_end..]).to_string();

            let response = format!(
                "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            let _ = tx.send(Captured {
                head,
                body: request_body,
            });
        });

        (format!("http://{addr}"), rx)
    }
}
