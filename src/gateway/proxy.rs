//! Gateway that talks to a synthesis proxy.
//!
//! The proxy keeps the upstream credentials server-side.  Contract:
//!
//! ```text
//! POST {endpoint}  { "text": "...", "voiceId": "Kore" }
//!   200 → { "audio": "<base64 PCM>", "mimeType": "audio/L16;rate=24000" }
//!   4xx/5xx → { "error": "<message>" }
//! ```

use async_trait::async_trait;

use super::{
    http_client, GatewayError, SynthesisGateway, SynthesisRequest, SynthesisResponse,
    GENERIC_FAILURE,
};
use crate::config::RemoteVoiceConfig;

/// Posts requests to a synthesis proxy endpoint.
pub struct ProxyGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl ProxyGateway {
    pub fn new(endpoint: impl Into<String>, timeout_secs: Option<u64>) -> Self {
        Self {
            client: http_client(timeout_secs),
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(config: &RemoteVoiceConfig) -> Self {
        Self::new(config.endpoint.clone(), config.timeout_secs)
    }
}

#[async_trait]
impl SynthesisGateway for ProxyGateway {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesisResponse, GatewayError> {
        let response = self.client.post(&self.endpoint).json(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            // The error body is best-effort; a proxy that crashed may not
            // send JSON at all.
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|json| json["error"].as_str().map(str::to_string))
                .unwrap_or_else(|| GENERIC_FAILURE.to_string());
            log::warn!("proxy synthesis failed ({status}): {message}");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: SynthesisResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        if body.audio.is_empty() {
            return Err(GatewayError::MissingAudio);
        }
        Ok(body)
    }
}
