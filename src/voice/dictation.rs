//! Microphone dictation
//!
//! A recognizer that captures the microphone, cuts the stream into
//! utterances with an energy gate and transcribes each one remotely.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::capture::{MicrophoneStream, SAMPLE_RATE, samples_to_wav};
use super::segmenter::{SegmentEvent, UtteranceSegmenter};
use super::session::{CompletionCause, DictationSettings, Recognizer, RecognizerFactory, RecognizerSink};
use super::stt::SpeechToText;
use crate::{Error, Result};

/// Creates microphone recognizers sharing one transcription client
pub struct MicrophoneDictationFactory {
    stt: SpeechToText,
}

impl MicrophoneDictationFactory {
    /// Create a factory
    #[must_use]
    pub const fn new(stt: SpeechToText) -> Self {
        Self { stt }
    }
}

impl RecognizerFactory for MicrophoneDictationFactory {
    fn create(
        &mut self,
        settings: &DictationSettings,
        sink: RecognizerSink,
    ) -> Result<Box<dyn Recognizer>> {
        Ok(Box::new(MicrophoneDictation {
            stt: self.stt.clone(),
            settings: *settings,
            sink,
            capture: None,
            worker: None,
            suspended: Arc::new(AtomicBool::new(false)),
        }))
    }
}

/// One microphone recognition run
pub struct MicrophoneDictation {
    stt: SpeechToText,
    settings: DictationSettings,
    sink: RecognizerSink,
    capture: Option<MicrophoneStream>,
    worker: Option<JoinHandle<()>>,
    suspended: Arc<AtomicBool>,
}

impl Recognizer for MicrophoneDictation {
    fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let (capture, chunks) = match MicrophoneStream::open() {
            Ok(opened) => opened,
            Err(e) => {
                tracing::warn!(error = %e, "microphone unavailable");
                self.sink.completed(CompletionCause::MicrophoneUnavailable);
                return Ok(());
            }
        };

        let segmenter = UtteranceSegmenter::new(
            SAMPLE_RATE,
            self.settings.initial_silence_timeout,
            self.settings.auto_silence_timeout,
        );

        self.worker = Some(tokio::spawn(transcribe_stream(
            chunks,
            CaptureGate::new(segmenter, Arc::clone(&self.suspended)),
            self.stt.clone(),
            self.sink.clone(),
        )));
        self.capture = Some(capture);

        tracing::debug!(generation = self.sink.generation(), "microphone dictation started");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
    }

    fn is_running(&self) -> bool {
        self.capture
            .as_ref()
            .is_some_and(MicrophoneStream::is_capturing)
    }

    fn set_suspended(&mut self, suspended: bool) {
        self.suspended.store(suspended, Ordering::Release);
    }
}

impl Drop for MicrophoneDictation {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Keeps audio captured during playback away from the segmenter
struct CaptureGate {
    segmenter: UtteranceSegmenter,
    suspended: Arc<AtomicBool>,
    was_suspended: bool,
}

impl CaptureGate {
    fn new(segmenter: UtteranceSegmenter, suspended: Arc<AtomicBool>) -> Self {
        Self {
            segmenter,
            suspended,
            was_suspended: false,
        }
    }

    fn process(&mut self, chunk: &[f32]) -> SegmentEvent {
        if self.suspended.load(Ordering::Acquire) {
            self.was_suspended = true;
            return SegmentEvent::Pending;
        }

        if self.was_suspended {
            // Whatever was being said before playback started is stale
            tracing::trace!("capture resumed, segmenter reset");
            self.segmenter.reset();
            self.was_suspended = false;
        }

        self.segmenter.process(chunk)
    }
}

/// Segment captured audio and report transcripts until a timeout or failure
async fn transcribe_stream(
    mut chunks: mpsc::UnboundedReceiver<Vec<f32>>,
    mut gate: CaptureGate,
    stt: SpeechToText,
    sink: RecognizerSink,
) {
    while let Some(chunk) = chunks.recv().await {
        let samples = match gate.process(&chunk) {
            SegmentEvent::Pending => continue,
            SegmentEvent::TimedOut => {
                sink.completed(CompletionCause::Timeout);
                return;
            }
            SegmentEvent::Utterance(samples) => samples,
        };

        let wav = match samples_to_wav(&samples, SAMPLE_RATE) {
            Ok(wav) => wav,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode segment");
                continue;
            }
        };

        match stt.transcribe(wav).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    tracing::debug!("empty transcript");
                } else {
                    sink.result(text, 1.0);
                }
            }
            Err(Error::Transport(e)) => {
                tracing::warn!(error = %e, "transcription unreachable");
                sink.completed(CompletionCause::NetworkFailure);
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed, segment dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const CHUNK: usize = 1_600;

    fn chunks(amplitude: f32, count: usize) -> Vec<Vec<f32>> {
        (0..count)
            .map(|_| {
                (0..CHUNK)
                    .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
                    .collect()
            })
            .collect()
    }

    fn gate() -> (CaptureGate, Arc<AtomicBool>) {
        let suspended = Arc::new(AtomicBool::new(false));
        let segmenter =
            UtteranceSegmenter::new(SAMPLE_RATE, Duration::from_secs(8), Duration::from_secs(6));
        (CaptureGate::new(segmenter, Arc::clone(&suspended)), suspended)
    }

    #[test]
    fn test_speech_during_playback_never_delivered() {
        let (mut gate, suspended) = gate();

        suspended.store(true, Ordering::Release);
        for chunk in chunks(0.3, 10) {
            assert_eq!(gate.process(&chunk), SegmentEvent::Pending);
        }

        suspended.store(false, Ordering::Release);
        for chunk in chunks(0.0, 6) {
            assert_eq!(gate.process(&chunk), SegmentEvent::Pending);
        }
    }

    #[test]
    fn test_partial_utterance_dropped_when_playback_starts() {
        let (mut gate, suspended) = gate();

        for chunk in chunks(0.3, 10) {
            assert_eq!(gate.process(&chunk), SegmentEvent::Pending);
        }

        suspended.store(true, Ordering::Release);
        for chunk in chunks(0.3, 5) {
            gate.process(&chunk);
        }

        suspended.store(false, Ordering::Release);
        for chunk in chunks(0.0, 6) {
            assert_eq!(gate.process(&chunk), SegmentEvent::Pending);
        }
    }

    #[test]
    fn test_speech_after_resume_delivered() {
        let (mut gate, suspended) = gate();

        suspended.store(true, Ordering::Release);
        gate.process(&chunks(0.3, 1)[0]);
        suspended.store(false, Ordering::Release);

        for chunk in chunks(0.3, 5) {
            assert_eq!(gate.process(&chunk), SegmentEvent::Pending);
        }

        let delivered = chunks(0.0, 6)
            .iter()
            .any(|chunk| matches!(gate.process(chunk), SegmentEvent::Utterance(_)));
        assert!(delivered);
    }
}
