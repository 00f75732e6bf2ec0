//! Direct Gemini text-to-speech gateway.
//!
//! Sends `generateContent` with an audio response modality and a prebuilt
//! voice, then pulls the inline audio out of the first candidate.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{
    http_client, GatewayError, SynthesisGateway, SynthesisRequest, SynthesisResponse,
    DEFAULT_AUDIO_MIME, GENERIC_FAILURE,
};
use crate::config::RemoteVoiceConfig;

/// Calls `{base_url}/models/{model}:generateContent`.
///
/// The API key is resolved once at construction (config first, then the
/// `GEMINI_API_KEY` environment variable).  A missing key is reported per
/// request so device-only sessions still start without one.
pub struct GeminiGateway {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl GeminiGateway {
    pub fn from_config(config: &RemoteVoiceConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            url: format!(
                "{}/models/{}:generateContent",
                config.gemini_base_url.trim_end_matches('/'),
                config.model
            ),
            api_key: config.resolved_api_key(),
        }
    }
}

/// Request body for one synthesis call.
fn request_body(text: &str, voice: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": text }] }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": voice }
                }
            }
        }
    })
}

/// Pull `{ data, mimeType }` out of a successful response.
fn extract_audio(json: &Value) -> Result<SynthesisResponse, GatewayError> {
    let inline = &json["candidates"][0]["content"]["parts"][0]["inlineData"];
    let audio = inline["data"]
        .as_str()
        .filter(|data| !data.is_empty())
        .ok_or(GatewayError::MissingAudio)?;
    let mime_type = inline["mimeType"]
        .as_str()
        .filter(|mime| !mime.is_empty())
        .unwrap_or(DEFAULT_AUDIO_MIME);

    Ok(SynthesisResponse {
        audio: audio.to_string(),
        mime_type: mime_type.to_string(),
    })
}

/// Upstream error message, or the generic failure text.
fn error_message(json: Option<&Value>) -> String {
    json.and_then(|j| j["error"]["message"].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

#[async_trait]
impl SynthesisGateway for GeminiGateway {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesisResponse, GatewayError> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(GatewayError::EmptyText);
        }
        let key = self
            .api_key
            .as_deref()
            .ok_or(GatewayError::MissingApiKey(RemoteVoiceConfig::API_KEY_ENV))?;

        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", key)
            .json(&request_body(text, request.voice_or_default()))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let json = response.json::<Value>().await.ok();
            let message = error_message(json.as_ref());
            log::warn!("Gemini synthesis failed ({status}): {message}");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;
        extract_audio(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::test_server::serve_once;

    fn config_for(base: &str, key: Option<&str>) -> RemoteVoiceConfig {
        RemoteVoiceConfig {
            gemini_base_url: base.to_string(),
            api_key: key.map(str::to_string),
            timeout_secs: Some(5),
            ..RemoteVoiceConfig::default()
        }
    }

    #[test]
    fn body_requests_audio_with_prebuilt_voice() {
        let body = request_body("สวัสดี", "Leda");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "สวัสดี");
        assert_eq!(body["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            body["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Leda"
        );
    }

    #[test]
    fn extracts_inline_audio() {
        let json = json!({
            "candidates": [{ "content": { "parts": [{
                "inlineData": { "data": "AAEC", "mimeType": "audio/L16;codec=pcm;rate=24000" }
            }]}}]
        });
        let response = extract_audio(&json).unwrap();
        assert_eq!(response.audio, "AAEC");
        assert_eq!(response.mime_type, "audio/L16;codec=pcm;rate=24000");
    }

    #[test]
    fn missing_mime_type_defaults() {
        let json = json!({
            "candidates": [{ "content": { "parts": [{ "inlineData": { "data": "AAEC" } }]}}]
        });
        assert_eq!(extract_audio(&json).unwrap().mime_type, DEFAULT_AUDIO_MIME);
    }

    #[test]
    fn missing_audio_is_reported() {
        let err = extract_audio(&json!({ "candidates": [] })).unwrap_err();
        assert_eq!(err.to_string(), "No audio data in response");
    }

    #[test]
    fn error_message_prefers_upstream_text() {
        let json = json!({ "error": { "code": 429, "message": "Resource exhausted" } });
        assert_eq!(error_message(Some(&json)), "Resource exhausted");
        assert_eq!(error_message(None), "TTS request failed");
    }

    #[tokio::test]
    async fn empty_text_is_rejected_locally() {
        let gateway = GeminiGateway::from_config(&config_for("http://127.0.0.1:9", Some("k")));
        let err = gateway
            .synthesize(&SynthesisRequest::new("   ", "Kore"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::EmptyText));
    }

    #[tokio::test]
    async fn calls_generate_content_with_key_header() {
        let (base, captured) = serve_once(
            200,
            r#"{"candidates":[{"content":{"parts":[{"inlineData":{"data":"AAEC","mimeType":"audio/L16;rate=24000"}}]}}]}"#,
        )
        .await;
        let gateway = GeminiGateway::from_config(&config_for(&base, Some("secret")));

        let response = gateway
            .synthesize(&SynthesisRequest::new("hello", "Charon"))
            .await
            .unwrap();
        assert_eq!(response.audio, "AAEC");

        let captured = captured.await.unwrap();
        let head = captured.head.to_lowercase();
        assert!(head.starts_with("post /models/gemini-2.5-flash-preview-tts:generatecontent "));
        assert!(head.contains("x-goog-api-key: secret"));
        let sent: Value = serde_json::from_str(&captured.body).unwrap();
        assert_eq!(
            sent["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Charon"
        );
    }

    #[tokio::test]
    async fn upstream_error_message_is_surfaced() {
        let (base, _captured) =
            serve_once(429, r#"{"error":{"code":429,"message":"quota exceeded"}}"#).await;
        let gateway = GeminiGateway::from_config(&config_for(&base, Some("secret")));

        let err = gateway
            .synthesize(&SynthesisRequest::new("hello", "Kore"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "quota exceeded");
    }
}
