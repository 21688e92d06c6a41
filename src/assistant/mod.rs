//! Remote assistant
//!
//! Chat completion and speech synthesis against an OpenAI-compatible API.
//! Every failure comes back as data; nothing here retries.

mod client;
mod schema;

use std::fmt;

use async_trait::async_trait;

use crate::Result;
use crate::voice::AudioClip;

pub use client::RemoteAssistantClient;

/// Text shown when the completion service cannot be reached
pub const CONTACT_ERROR_TEXT: &str = "Error contacting service.";

/// Text shown when the completion response cannot be understood
pub const PARSE_ERROR_TEXT: &str = "Error parsing response.";

/// One turn's request to the assistant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantRequest {
    /// User prompt, wake phrase already removed
    pub prompt: String,
    /// Voice used to speak the reply
    pub voice: String,
    /// Chat completion model
    pub model: String,
}

impl AssistantRequest {
    /// Create a request
    pub fn new(prompt: impl Into<String>, voice: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            voice: voice.into(),
            model: model.into(),
        }
    }
}

/// Why a completion failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Transport failure or non-success status
    ContactingService,
    /// Malformed body or missing `choices[0].message.content`
    ParsingResponse,
}

impl FailureReason {
    /// Fixed user-facing message
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::ContactingService => CONTACT_ERROR_TEXT,
            Self::ParsingResponse => PARSE_ERROR_TEXT,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContactingService => f.write_str("contacting service"),
            Self::ParsingResponse => f.write_str("parsing response"),
        }
    }
}

/// Outcome of a completion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantReply {
    /// Reply text from the first completion choice
    Text(String),
    /// The request failed
    Failure(FailureReason),
}

impl AssistantReply {
    /// Text to display for this reply
    #[must_use]
    pub fn display_text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Failure(reason) => reason.user_message(),
        }
    }

    /// Check if the reply carries assistant text
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

/// Remote completion and synthesis service
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Ask for a chat completion; failures are reported in the reply
    async fn request_completion(&self, request: &AssistantRequest) -> AssistantReply;

    /// Synthesize speech for `text` with the given voice
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the audio cannot be decoded;
    /// callers treat this as non-fatal
    async fn request_speech(&self, text: &str, voice: &str) -> Result<AudioClip>;
}
