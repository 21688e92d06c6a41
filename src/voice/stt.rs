//! Speech-to-text (STT) over the remote transcription endpoint

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Response from the transcription API
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcribes WAV segments to text
#[derive(Clone)]
pub struct SpeechToText {
    client: reqwest::Client,
    endpoint: String,
    api_key: Arc<SecretString>,
    model: String,
}

impl SpeechToText {
    /// Create a transcriber for an OpenAI-compatible API
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(api_base: &str, api_key: Option<SecretString>, model: String) -> Result<Self> {
        let api_key = api_key.ok_or_else(|| {
            Error::ConfigurationMissing("API key required for transcription".to_string())
        })?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/audio/transcriptions", api_base.trim_end_matches('/')),
            api_key: Arc::new(api_key),
            model,
        })
    }

    /// Transcribe audio to text
    ///
    /// # Arguments
    ///
    /// * `audio` - WAV audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed
    pub async fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Transport(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Transport(format!("transcription error {status}: {body}")));
        }

        let result: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        tracing::debug!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}
