//! HTTP client for the remote assistant

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use super::schema::{ChatCompletionRequest, ChatCompletionResponse, SpeechRequest};
use super::{Assistant, AssistantReply, AssistantRequest, FailureReason};
use crate::config::AssistantConfig;
use crate::voice::AudioClip;
use crate::{Error, Result};

/// Talks to an OpenAI-compatible chat completion and speech API
pub struct RemoteAssistantClient {
    client: Client,
    api_base: String,
    api_key: SecretString,
    tts_model: String,
}

impl RemoteAssistantClient {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if no API key is configured
    pub fn new(config: &AssistantConfig) -> Result<Self> {
        let api_key = config.api_key().ok_or_else(|| {
            Error::ConfigurationMissing("OPENAI_API_KEY is required for the assistant".to_string())
        })?;

        Ok(Self::with_api_key(&config.api_base, api_key, &config.tts_model))
    }

    /// Create a client for an explicit base URL and key
    #[must_use]
    pub fn with_api_key(api_base: &str, api_key: SecretString, tts_model: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            tts_model: tts_model.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.api_base)
    }
}

#[async_trait]
impl Assistant for RemoteAssistantClient {
    async fn request_completion(&self, request: &AssistantRequest) -> AssistantReply {
        let body = ChatCompletionRequest::user(&request.model, &request.prompt);

        let response = match self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "completion request failed");
                return AssistantReply::Failure(FailureReason::ContactingService);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "completion API error");
            return AssistantReply::Failure(FailureReason::ContactingService);
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "failed to read completion response");
                return AssistantReply::Failure(FailureReason::ContactingService);
            }
        };

        let content = serde_json::from_slice::<ChatCompletionResponse>(&bytes)
            .map_err(|e| Error::Parse(e.to_string()))
            .and_then(|parsed| {
                parsed
                    .into_first_content()
                    .ok_or_else(|| Error::Parse("missing choices[0].message.content".to_string()))
            });

        match content {
            Ok(text) => {
                tracing::debug!(reply_len = text.len(), "completion received");
                AssistantReply::Text(text)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse completion response");
                AssistantReply::Failure(FailureReason::ParsingResponse)
            }
        }
    }

    async fn request_speech(&self, text: &str, voice: &str) -> Result<AudioClip> {
        let body = SpeechRequest {
            model: &self.tts_model,
            input: text,
            voice,
        };

        let response = self
            .client
            .post(self.endpoint("audio/speech"))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("speech API error {status}: {body}")));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        tracing::debug!(audio_bytes = audio.len(), "speech received");
        AudioClip::from_mp3(&audio)
    }
}
