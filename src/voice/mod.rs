//! Voice processing module
//!
//! Dictation sessions and recognizers, wake word matching, audio clips,
//! playback and lip sync.

mod capture;
mod clip;
mod console;
mod dictation;
mod lip_sync;
mod playback;
mod segmenter;
mod session;
mod stt;
mod wake_word;

pub use capture::{MicrophoneStream, SAMPLE_RATE, samples_to_wav};
pub use clip::AudioClip;
pub use console::{ConsoleDictation, ConsoleInput};
pub use dictation::{MicrophoneDictation, MicrophoneDictationFactory};
pub use lip_sync::{DEFAULT_MAX_OPEN, LipSync};
pub use playback::{AudioOutput, AudioPlayback, Mixer, OutputTap, TAP_WINDOW};
pub use segmenter::{SegmentEvent, UtteranceSegmenter};
pub use session::{
    CompletionCause, DictationSettings, Recognizer, RecognizerEvent, RecognizerFactory,
    RecognizerSink, SessionEvent, SessionState, SessionTransition, SpeechSession, Utterance,
};
pub use stt::SpeechToText;
pub use wake_word::WakeWordMatcher;
