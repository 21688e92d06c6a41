//! Voice orchestrator
//!
//! Turns recognized utterances into replies and replies into speech. All
//! mutable state lives in one cooperative loop: the dictation session, the
//! readiness gate, audio output and the conversation log. Remote requests
//! run as spawned tasks and report back over a channel, so a second
//! utterance is handled while an earlier reply is still outstanding.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

use crate::Result;
use crate::assistant::{Assistant, AssistantReply, AssistantRequest};
use crate::avatar::AvatarLoadOutcome;
use crate::config::Config;
use crate::conversation::ConversationLog;
use crate::voice::{
    AudioClip, AudioOutput, SessionEvent, SessionState, SessionTransition, SpeechSession,
    Utterance, WakeWordMatcher,
};

/// Shown when an utterance lacks the wake word
pub const WAKE_WORD_NOT_DETECTED: &str = "(Wake word not detected)";

/// Local reply to a bare wake word
pub const ACKNOWLEDGEMENT: &str = "Yes?";

/// Interval of the session suspension and restart check
const SESSION_TICK: Duration = Duration::from_millis(50);

/// Pause between lines in presentation mode
const PRESENT_PAUSE: Duration = Duration::from_millis(500);

/// Per-turn settings
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Chat completion model
    pub chat_model: String,
    /// Voice used for every spoken reply
    pub voice: String,
    /// Canned reply to identity questions
    pub identity_reply: String,
    /// Played while a completion is in flight
    pub thinking_cue: Option<AudioClip>,
    /// Played whenever dictation (re)starts
    pub listening_cue: Option<AudioClip>,
}

impl OrchestratorSettings {
    /// Settings without cue sounds
    pub fn new(
        chat_model: impl Into<String>,
        voice: impl Into<String>,
        identity_reply: impl Into<String>,
    ) -> Self {
        Self {
            chat_model: chat_model.into(),
            voice: voice.into(),
            identity_reply: identity_reply.into(),
            thinking_cue: None,
            listening_cue: None,
        }
    }

    /// Settings from configuration, loading cue files
    ///
    /// A cue that fails to load is logged and left out.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let load_cue = |path: Option<&std::path::Path>, name: &str| {
            let path = path?;
            match AudioClip::from_file(path) {
                Ok(clip) => Some(clip),
                Err(e) => {
                    tracing::warn!(cue = name, path = %path.display(), error = %e, "failed to load cue");
                    None
                }
            }
        };

        Self {
            chat_model: config.assistant.chat_model.clone(),
            voice: config.assistant.voice.clone(),
            identity_reply: config.wake.identity_reply.clone(),
            thinking_cue: load_cue(config.audio.thinking_cue.as_deref(), "thinking"),
            listening_cue: load_cue(config.audio.listening_cue.as_deref(), "listening"),
        }
    }
}

/// How an utterance is answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnPlan {
    /// Nothing but whitespace
    Ignore,
    /// Identity question, answered with the canned reply
    Identity,
    /// Wake word alone, acknowledged locally
    Acknowledge,
    /// Wake word plus prompt, forwarded for completion
    Complete(String),
    /// No wake word
    NoWakeWord,
}

/// Result of a spawned remote request
enum TurnEvent {
    Reply(AssistantReply),
    Speech(Result<AudioClip>),
}

/// Coordinates dictation, the remote assistant and audio output
pub struct VoiceOrchestrator {
    session: SpeechSession,
    session_events: mpsc::UnboundedReceiver<SessionEvent>,
    assistant: Arc<dyn Assistant>,
    output: Box<dyn AudioOutput>,
    log: Box<dyn ConversationLog>,
    matcher: WakeWordMatcher,
    settings: OrchestratorSettings,
    ready: bool,
    turns: JoinSet<()>,
    turn_tx: mpsc::UnboundedSender<TurnEvent>,
    turn_rx: mpsc::UnboundedReceiver<TurnEvent>,
}

impl VoiceOrchestrator {
    /// Create an orchestrator; nothing is heard until the avatar is ready
    #[must_use]
    pub fn new(
        session: SpeechSession,
        session_events: mpsc::UnboundedReceiver<SessionEvent>,
        assistant: Arc<dyn Assistant>,
        output: Box<dyn AudioOutput>,
        log: Box<dyn ConversationLog>,
        matcher: WakeWordMatcher,
        settings: OrchestratorSettings,
    ) -> Self {
        let (turn_tx, turn_rx) = mpsc::unbounded_channel();
        Self {
            session,
            session_events,
            assistant,
            output,
            log,
            matcher,
            settings,
            ready: false,
            turns: JoinSet::new(),
            turn_tx,
            turn_rx,
        }
    }

    /// Decide how to answer an utterance
    ///
    /// Identity questions win over the wake word.
    #[must_use]
    pub fn plan_turn(&self, text: &str) -> TurnPlan {
        let text = text.trim();
        if text.is_empty() {
            return TurnPlan::Ignore;
        }

        if self.matcher.is_identity_question(text) {
            return TurnPlan::Identity;
        }

        if !self.matcher.contains_wake_word(text) {
            return TurnPlan::NoWakeWord;
        }

        let prompt = self.matcher.strip_wake_word(text);
        if prompt.is_empty() {
            TurnPlan::Acknowledge
        } else {
            TurnPlan::Complete(prompt)
        }
    }

    /// Check if the avatar finished loading
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Current dictation state
    #[must_use]
    pub const fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Run until shutdown is requested
    ///
    /// Dictation starts once `avatar_ready` yields an outcome, whether the
    /// avatar loaded or not.
    #[allow(clippy::future_not_send)]
    pub async fn run(
        mut self,
        avatar_ready: oneshot::Receiver<AvatarLoadOutcome>,
        mut shutdown: mpsc::Receiver<()>,
    ) {
        let mut avatar_ready = Some(avatar_ready);
        let mut ticker = tokio::time::interval(SESSION_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("voice orchestrator running, waiting for avatar");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                outcome = wait_for_avatar(&mut avatar_ready) => {
                    avatar_ready = None;
                    self.on_avatar_ready(outcome);
                }
                Some(event) = self.session_events.recv() => {
                    if let Some(utterance) = self.session.handle_event(event) {
                        self.handle_utterance(utterance);
                    }
                }
                Some(event) = self.turn_rx.recv() => {
                    self.on_turn_event(event);
                }
                Some(joined) = self.turns.join_next(), if !self.turns.is_empty() => {
                    if let Err(e) = joined {
                        tracing::warn!(error = %e, "assistant request task failed");
                    }
                }
                _ = ticker.tick() => {
                    let playing = self.output.is_playing();
                    if self.session.tick(playing, Instant::now()) == Some(SessionTransition::Restarted) {
                        play_cue(self.output.as_mut(), self.settings.listening_cue.as_ref(), "listening");
                    }
                }
            }
        }

        // Detach from the avatar signal before tearing the rest down
        drop(avatar_ready);
        self.shutdown();
    }

    /// Act on a recognized utterance
    ///
    /// Discarded while the readiness gate is closed.
    pub fn handle_utterance(&mut self, utterance: Utterance) {
        if !self.ready {
            tracing::debug!(text = %utterance.text, "discarding utterance, avatar not ready");
            return;
        }

        let text = utterance.text.trim();
        tracing::debug!(text, confidence = utterance.confidence, "utterance recognized");

        match self.plan_turn(text) {
            TurnPlan::Ignore => {}
            TurnPlan::Identity => {
                self.log.append_user(text);
                let reply = self.settings.identity_reply.clone();
                self.log.append_assistant(&reply);
                self.speak(reply);
            }
            TurnPlan::Acknowledge => {
                self.log.append_user(text);
                self.log.append_assistant(ACKNOWLEDGEMENT);
                self.speak(ACKNOWLEDGEMENT.to_string());
            }
            TurnPlan::NoWakeWord => {
                self.log.append_user(text);
                self.log.append_assistant(WAKE_WORD_NOT_DETECTED);
            }
            TurnPlan::Complete(prompt) => {
                self.log.append_user(text);
                tracing::info!(prompt = %prompt, "requesting completion");
                play_cue(self.output.as_mut(), self.settings.thinking_cue.as_ref(), "thinking");

                let request = AssistantRequest::new(
                    prompt,
                    self.settings.voice.clone(),
                    self.settings.chat_model.clone(),
                );
                let assistant = Arc::clone(&self.assistant);
                let tx = self.turn_tx.clone();
                self.turns.spawn(async move {
                    let reply = assistant.request_completion(&request).await;
                    report_turn(&tx, TurnEvent::Reply(reply));
                });
            }
        }
    }

    /// Speak a text line by line, pausing after each line
    ///
    /// Lines that fail to synthesize are logged and skipped.
    #[allow(clippy::future_not_send)]
    pub async fn present(&mut self, text: &str) {
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            self.log.append_assistant(line);

            match self.assistant.request_speech(line, &self.settings.voice).await {
                Ok(clip) => {
                    if let Err(e) = self.output.play(&clip) {
                        tracing::warn!(error = %e, "failed to play line");
                        continue;
                    }
                    while self.output.is_playing() {
                        tokio::time::sleep(SESSION_TICK).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "speech synthesis failed, skipping line");
                    continue;
                }
            }

            tokio::time::sleep(PRESENT_PAUSE).await;
        }
    }

    fn on_avatar_ready(&mut self, outcome: AvatarLoadOutcome) {
        match &outcome {
            AvatarLoadOutcome::Loaded(handle) => {
                tracing::info!(url = %handle.url, "avatar ready");
            }
            AvatarLoadOutcome::Failed(reason) => {
                tracing::warn!(reason = %reason, "avatar failed to load, continuing without it");
            }
        }

        self.ready = true;

        match self.session.start() {
            Ok(true) => {
                play_cue(self.output.as_mut(), self.settings.listening_cue.as_ref(), "listening");
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "failed to start dictation, will retry"),
        }
    }

    fn on_turn_event(&mut self, event: TurnEvent) {
        match event {
            TurnEvent::Reply(reply) => {
                self.log.append_assistant(reply.display_text());
                match reply {
                    AssistantReply::Text(text) => self.speak(text),
                    AssistantReply::Failure(reason) => {
                        tracing::warn!(%reason, "completion failed");
                    }
                }
            }
            TurnEvent::Speech(Ok(clip)) => {
                if let Err(e) = self.output.play(&clip) {
                    tracing::warn!(error = %e, "failed to play reply");
                }
            }
            TurnEvent::Speech(Err(e)) => {
                tracing::warn!(error = %e, "speech synthesis failed, reply shown as text only");
            }
        }
    }

    fn speak(&mut self, text: String) {
        let assistant = Arc::clone(&self.assistant);
        let voice = self.settings.voice.clone();
        let tx = self.turn_tx.clone();
        self.turns.spawn(async move {
            let clip = assistant.request_speech(&text, &voice).await;
            report_turn(&tx, TurnEvent::Speech(clip));
        });
    }

    fn shutdown(&mut self) {
        self.session.stop();
        self.turns.abort_all();
        self.ready = false;
        tracing::info!(
            restarts = self.session.restart_count(),
            "voice orchestrator stopped"
        );
    }
}

/// Resolves once with the avatar outcome, then never again
async fn wait_for_avatar(
    avatar_ready: &mut Option<oneshot::Receiver<AvatarLoadOutcome>>,
) -> AvatarLoadOutcome {
    match avatar_ready {
        Some(rx) => rx.await.unwrap_or_else(|_| {
            AvatarLoadOutcome::Failed("avatar loader dropped without reporting".to_string())
        }),
        None => std::future::pending().await,
    }
}

/// Hand a finished request back to the loop
///
/// Returns false when the loop has already shut down.
fn report_turn(tx: &mpsc::UnboundedSender<TurnEvent>, event: TurnEvent) -> bool {
    if tx.send(event).is_err() {
        tracing::debug!("turn result dropped, orchestrator stopped");
        return false;
    }
    true
}

fn play_cue(output: &mut dyn AudioOutput, cue: Option<&AudioClip>, name: &str) {
    let Some(cue) = cue else {
        return;
    };

    if let Err(e) = output.play(cue) {
        tracing::warn!(cue = name, error = %e, "failed to play cue");
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::conversation::Transcript;
    use crate::voice::{DictationSettings, Recognizer, RecognizerFactory, RecognizerSink};

    struct NoAssistant;

    #[async_trait]
    impl Assistant for NoAssistant {
        async fn request_completion(&self, _request: &AssistantRequest) -> AssistantReply {
            AssistantReply::Text(String::new())
        }

        async fn request_speech(&self, _text: &str, _voice: &str) -> Result<AudioClip> {
            Ok(AudioClip::new(vec![0.0; 16], 16_000))
        }
    }

    struct Silent;

    impl AudioOutput for Silent {
        fn play(&mut self, _clip: &AudioClip) -> Result<()> {
            Ok(())
        }

        fn is_playing(&self) -> bool {
            false
        }
    }

    struct NeverFactory;

    impl RecognizerFactory for NeverFactory {
        fn create(
            &mut self,
            _settings: &DictationSettings,
            _sink: RecognizerSink,
        ) -> Result<Box<dyn Recognizer>> {
            Err(crate::Error::Audio("no recognizer".to_string()))
        }
    }

    fn orchestrator() -> VoiceOrchestrator {
        let (session, events) = SpeechSession::new(Box::new(NeverFactory), DictationSettings::default());
        VoiceOrchestrator::new(
            session,
            events,
            Arc::new(NoAssistant),
            Box::new(Silent),
            Box::new(Transcript::new()),
            WakeWordMatcher::new(vec!["ok sakura".to_string()], vec!["who made you".to_string()]),
            OrchestratorSettings::new("gpt-4o-mini", "nova", "I am Sakura."),
        )
    }

    #[test]
    fn test_plan_turn() {
        let o = orchestrator();

        assert_eq!(o.plan_turn("   "), TurnPlan::Ignore);
        assert_eq!(o.plan_turn("Who made you?"), TurnPlan::Identity);
        assert_eq!(o.plan_turn("ok sakura who made you"), TurnPlan::Identity);
        assert_eq!(o.plan_turn("OK Sakura"), TurnPlan::Acknowledge);
        assert_eq!(
            o.plan_turn("ok sakura what time is it"),
            TurnPlan::Complete("what time is it".to_string())
        );
        assert_eq!(o.plan_turn("hello there"), TurnPlan::NoWakeWord);
    }

    #[test]
    fn test_starts_closed() {
        let o = orchestrator();
        assert!(!o.is_ready());
        assert_eq!(o.session_state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_wait_for_avatar_dropped_sender() {
        let (tx, rx) = oneshot::channel();
        drop(tx);

        let mut slot = Some(rx);
        let outcome = wait_for_avatar(&mut slot).await;
        assert!(matches!(outcome, AvatarLoadOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_turn_result_after_shutdown_is_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(report_turn(&tx, TurnEvent::Reply(AssistantReply::Text("hi".to_string()))));
        assert!(matches!(rx.recv().await, Some(TurnEvent::Reply(_))));

        drop(rx);
        assert!(!report_turn(
            &tx,
            TurnEvent::Speech(Ok(AudioClip::new(vec![0.0; 16], 16_000)))
        ));
    }
}
