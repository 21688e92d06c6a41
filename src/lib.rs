//! Sakura Companion - voice-driven avatar companion
//!
//! This library provides the core functionality for the Sakura companion:
//! - Continuous dictation with automatic restart
//! - Wake word gating and locally answered identity questions
//! - Chat completion and speech synthesis via an OpenAI-compatible API
//! - Avatar loading that gates when speech is acted upon
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │   Microphone / Console      Avatar loader           │
//! └──────────┬───────────────────────┬──────────────────┘
//!            │ utterances            │ ready
//! ┌──────────▼───────────────────────▼──────────────────┐
//! │                 VoiceOrchestrator                   │
//! │  SpeechSession  │  WakeWordMatcher  │  Readiness    │
//! └──────────┬───────────────────────┬──────────────────┘
//!            │ prompts               │ clips
//! ┌──────────▼──────────┐  ┌─────────▼──────────────────┐
//! │ RemoteAssistantClient│  │ AudioOutput → LipSync     │
//! └─────────────────────┘  └────────────────────────────┘
//! ```

pub mod assistant;
pub mod avatar;
pub mod config;
pub mod conversation;
pub mod error;
pub mod orchestrator;
pub mod voice;

pub use assistant::{Assistant, AssistantReply, AssistantRequest, FailureReason, RemoteAssistantClient};
pub use avatar::{AvatarHandle, AvatarLoadOutcome, AvatarLoader, AvatarPreferences, HttpAvatarLoader};
pub use config::Config;
pub use conversation::{ConversationLog, TerminalLog, Transcript};
pub use error::{Error, Result};
pub use orchestrator::{OrchestratorSettings, TurnPlan, VoiceOrchestrator};
pub use voice::{SpeechSession, WakeWordMatcher};
