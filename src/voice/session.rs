//! Continuous dictation session
//!
//! Owns the recognizer lifecycle: start, stop, suspension while audio is
//! playing, and automatic restart after an abnormal end. At most one
//! recognizer instance exists at a time; a restart tears the old one down
//! before the settle delay and only then creates the next.
//!
//! ```text
//!   Idle ──start──▶ Listening ◀──audio idle── Suspended
//!                      │    ──audio playing──▶   │
//!                      │ abnormal end            │ abnormal end
//!                      ▼                         ▼
//!                  Restarting ──audio idle + settle──▶ Listening
//! ```

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::{Error, Result};

/// A completed recognition result
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    /// Recognized text
    pub text: String,
    /// Recognizer confidence in `[0, 1]`
    pub confidence: f32,
}

impl Utterance {
    /// Create an utterance
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Why a recognizer stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionCause {
    /// Stopped on request
    Complete,
    /// Silence timeout elapsed
    Timeout,
    /// Utterance exceeded the pause limit
    PauseLimit,
    /// Input too noisy or quiet to recognize
    AudioQuality,
    /// Cancelled by the platform
    Canceled,
    /// Remote recognition backend unreachable
    NetworkFailure,
    /// Capture device could not be opened
    MicrophoneUnavailable,
    /// Anything else
    Unknown,
}

impl CompletionCause {
    /// Check if this is a clean, caller-initiated end
    #[must_use]
    pub const fn is_clean(self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl fmt::Display for CompletionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Complete => "complete",
            Self::Timeout => "timeout",
            Self::PauseLimit => "pause limit exceeded",
            Self::AudioQuality => "audio quality failure",
            Self::Canceled => "canceled",
            Self::NetworkFailure => "network failure",
            Self::MicrophoneUnavailable => "microphone unavailable",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Event reported by a recognizer
#[derive(Debug, Clone, PartialEq)]
pub enum RecognizerEvent {
    /// An utterance was recognized
    Result(Utterance),
    /// The recognizer stopped
    Completed(CompletionCause),
}

/// Recognizer event tagged with the instance that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    generation: u64,
    event: RecognizerEvent,
}

impl SessionEvent {
    /// Instance generation the event came from
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// The recognizer event
    #[must_use]
    pub const fn event(&self) -> &RecognizerEvent {
        &self.event
    }
}

/// Handle a recognizer uses to report events to its session
#[derive(Debug, Clone)]
pub struct RecognizerSink {
    generation: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl RecognizerSink {
    /// Report a recognized utterance
    ///
    /// Returns false if the session is gone.
    pub fn result(&self, text: impl Into<String>, confidence: f32) -> bool {
        self.send(RecognizerEvent::Result(Utterance::new(text, confidence)))
    }

    /// Report that the recognizer stopped
    ///
    /// Returns false if the session is gone.
    pub fn completed(&self, cause: CompletionCause) -> bool {
        self.send(RecognizerEvent::Completed(cause))
    }

    /// Generation of the recognizer instance this sink belongs to
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    fn send(&self, event: RecognizerEvent) -> bool {
        self.tx
            .send(SessionEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Recognizer timeouts and restart pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictationSettings {
    /// Silence allowed before the first word
    pub initial_silence_timeout: Duration,
    /// Silence after the last word that ends the session
    pub auto_silence_timeout: Duration,
    /// Wait between tearing down a recognizer and starting the next
    pub restart_settle: Duration,
}

impl Default for DictationSettings {
    fn default() -> Self {
        Self {
            initial_silence_timeout: Duration::from_secs(8),
            auto_silence_timeout: Duration::from_secs(6),
            restart_settle: Duration::from_millis(500),
        }
    }
}

/// A running speech recognizer instance
pub trait Recognizer {
    /// Begin continuous recognition
    ///
    /// # Errors
    ///
    /// Returns error if recognition cannot start
    fn start(&mut self) -> Result<()>;

    /// Stop recognition and release resources; must be idempotent
    fn stop(&mut self);

    /// Check if the recognizer is capturing
    fn is_running(&self) -> bool;

    /// Pause or resume capture while audio plays
    ///
    /// A suspended recognizer must drop what it hears, including any
    /// utterance already in progress, so playback never turns into a result.
    fn set_suspended(&mut self, _suspended: bool) {}
}

/// Creates recognizer instances for a session
pub trait RecognizerFactory {
    /// Create a recognizer that reports through `sink`
    ///
    /// # Errors
    ///
    /// Returns error if the recognizer cannot be created
    fn create(
        &mut self,
        settings: &DictationSettings,
        sink: RecognizerSink,
    ) -> Result<Box<dyn Recognizer>>;
}

/// State of the dictation session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No recognizer
    Idle,
    /// Recognizer running, results delivered
    Listening,
    /// Recognizer running, results discarded while audio plays
    Suspended,
    /// Waiting to replace a recognizer that ended abnormally
    Restarting,
}

/// Notable state changes reported by [`SpeechSession::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    /// Audio started playing, listening suspended
    Suspended,
    /// Audio finished, listening resumed
    Resumed,
    /// A fresh recognizer replaced one that ended abnormally
    Restarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestartPhase {
    AwaitingAudio,
    Settling { until: Instant },
}

/// Continuous dictation session
pub struct SpeechSession {
    factory: Box<dyn RecognizerFactory>,
    settings: DictationSettings,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    active: Option<Box<dyn Recognizer>>,
    generation: u64,
    state: SessionState,
    restart: Option<RestartPhase>,
    restart_count: u32,
}

impl SpeechSession {
    /// Create an idle session and the channel its recognizers report on
    #[must_use]
    pub fn new(
        factory: Box<dyn RecognizerFactory>,
        settings: DictationSettings,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = Self {
            factory,
            settings,
            events_tx,
            active: None,
            generation: 0,
            state: SessionState::Idle,
            restart: None,
            restart_count: 0,
        };
        (session, events_rx)
    }

    /// Begin listening
    ///
    /// Returns `Ok(false)` without side effects if the session is already
    /// active. A recognizer that fails to start is retried through the
    /// restart sequence.
    ///
    /// # Errors
    ///
    /// Returns error if the recognizer could not be created or started
    pub fn start(&mut self) -> Result<bool> {
        if self.state != SessionState::Idle {
            return Ok(false);
        }

        match self.spawn_recognizer() {
            Ok(()) => {
                self.state = SessionState::Listening;
                tracing::info!(generation = self.generation, "dictation started");
                Ok(true)
            }
            Err(e) => {
                self.restart_count += 1;
                self.state = SessionState::Restarting;
                self.restart = Some(RestartPhase::AwaitingAudio);
                Err(e)
            }
        }
    }

    /// Stop listening and release the recognizer; idempotent
    pub fn stop(&mut self) {
        self.teardown();
        self.restart = None;
        if self.state != SessionState::Idle {
            tracing::info!("dictation stopped");
        }
        self.state = SessionState::Idle;
    }

    /// Process an event from a recognizer
    ///
    /// Returns the utterance to act on, if any. Events from torn-down
    /// instances are ignored, and results are only delivered while listening.
    pub fn handle_event(&mut self, event: SessionEvent) -> Option<Utterance> {
        if self.active.is_none() || event.generation != self.generation {
            tracing::debug!(
                event_generation = event.generation,
                generation = self.generation,
                "ignoring event from stale recognizer"
            );
            return None;
        }

        match event.event {
            RecognizerEvent::Result(utterance) => {
                if self.state == SessionState::Listening {
                    Some(utterance)
                } else {
                    tracing::debug!(
                        state = ?self.state,
                        text = %utterance.text,
                        "discarding result while not listening"
                    );
                    None
                }
            }
            RecognizerEvent::Completed(cause) if cause.is_clean() => {
                tracing::info!(%cause, "dictation ended");
                self.stop();
                None
            }
            RecognizerEvent::Completed(cause) => {
                self.restart_count += 1;
                let err = Error::RecognitionInterrupted(cause.to_string());
                tracing::warn!(
                    error = %err,
                    restarts = self.restart_count,
                    "restarting recognizer"
                );
                self.state = SessionState::Restarting;
                self.restart = Some(RestartPhase::AwaitingAudio);
                None
            }
        }
    }

    /// Advance suspension and restart against the audio output state
    pub fn tick(&mut self, audio_playing: bool, now: Instant) -> Option<SessionTransition> {
        match self.state {
            SessionState::Idle => None,
            SessionState::Listening if audio_playing => {
                self.state = SessionState::Suspended;
                self.set_recognizer_suspended(true);
                tracing::trace!("listening suspended during playback");
                Some(SessionTransition::Suspended)
            }
            SessionState::Suspended if !audio_playing => {
                self.state = SessionState::Listening;
                self.set_recognizer_suspended(false);
                tracing::trace!("listening resumed");
                Some(SessionTransition::Resumed)
            }
            SessionState::Listening | SessionState::Suspended => None,
            SessionState::Restarting => self.advance_restart(audio_playing, now),
        }
    }

    fn advance_restart(&mut self, audio_playing: bool, now: Instant) -> Option<SessionTransition> {
        match self.restart? {
            RestartPhase::AwaitingAudio => {
                if !audio_playing {
                    self.teardown();
                    self.restart = Some(RestartPhase::Settling {
                        until: now + self.settings.restart_settle,
                    });
                }
                None
            }
            RestartPhase::Settling { until } if now >= until => {
                if audio_playing {
                    self.restart = Some(RestartPhase::AwaitingAudio);
                    return None;
                }

                match self.spawn_recognizer() {
                    Ok(()) => {
                        self.state = SessionState::Listening;
                        self.restart = None;
                        tracing::info!(
                            generation = self.generation,
                            restarts = self.restart_count,
                            "dictation restarted"
                        );
                        Some(SessionTransition::Restarted)
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to restart recognizer, retrying");
                        self.restart = Some(RestartPhase::Settling {
                            until: now + self.settings.restart_settle,
                        });
                        None
                    }
                }
            }
            RestartPhase::Settling { .. } => None,
        }
    }

    /// Create and start a new recognizer, tearing down any previous one
    fn spawn_recognizer(&mut self) -> Result<()> {
        self.teardown();

        self.generation += 1;
        let sink = RecognizerSink {
            generation: self.generation,
            tx: self.events_tx.clone(),
        };

        let mut recognizer = self.factory.create(&self.settings, sink)?;
        if let Err(e) = recognizer.start() {
            recognizer.stop();
            return Err(e);
        }

        self.active = Some(recognizer);
        Ok(())
    }

    fn set_recognizer_suspended(&mut self, suspended: bool) {
        if let Some(recognizer) = self.active.as_mut() {
            recognizer.set_suspended(suspended);
        }
    }

    fn teardown(&mut self) {
        if let Some(mut recognizer) = self.active.take() {
            recognizer.stop();
            tracing::debug!(generation = self.generation, "recognizer torn down");
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Number of abnormal ends so far (diagnostics only)
    #[must_use]
    pub const fn restart_count(&self) -> u32 {
        self.restart_count
    }

    /// Check if a recognizer instance currently exists
    #[must_use]
    pub const fn has_recognizer(&self) -> bool {
        self.active.is_some()
    }

    /// Timeouts handed to new recognizers
    #[must_use]
    pub const fn settings(&self) -> &DictationSettings {
        &self.settings
    }
}

impl Drop for SpeechSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
