//! Configuration management for the Sakura companion
//!
//! Values resolve with priority env > TOML file > default.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::voice::DictationSettings;
use crate::{Error, Result};

/// Default trigger phrases
pub const DEFAULT_WAKE_WORDS: &[&str] = &["ok sakura", "okay sakura", "okej sakura"];

/// Default phrases answered locally with the identity reply
pub const DEFAULT_IDENTITY_PROMPTS: &[&str] = &[
    "who are you",
    "what are you",
    "what is your purpose",
    "why were you made",
    "why are you here",
    "what do you do",
    "who created you",
    "who made you",
    "what's your purpose",
];

/// Default canned identity reply
pub const DEFAULT_IDENTITY_REPLY: &str =
    "I'm a personal assistant made by Boguslav Pacyno to assist you in your work or have a chat.";

/// Default API base URL
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Sakura companion configuration
#[derive(Debug)]
pub struct Config {
    /// Remote assistant configuration
    pub assistant: AssistantConfig,

    /// Wake word configuration
    pub wake: WakeConfig,

    /// Dictation session timeouts
    pub dictation: DictationSettings,

    /// Cue sounds and lip sync
    pub audio: AudioConfig,

    /// Avatar URL override (takes precedence over the stored preference)
    pub avatar_url: Option<String>,

    /// Path to data directory (preferences)
    pub data_dir: PathBuf,

    /// Path to cache directory (downloaded avatars)
    pub cache_dir: PathBuf,
}

/// Remote assistant configuration
#[derive(Debug)]
pub struct AssistantConfig {
    /// Bearer token for the remote service
    pub api_key: Option<SecretString>,

    /// Base URL of the OpenAI-compatible API
    pub api_base: String,

    /// Chat completion model
    pub chat_model: String,

    /// Speech synthesis model
    pub tts_model: String,

    /// Speech synthesis voice identifier
    pub voice: String,

    /// Transcription model used by microphone dictation
    pub stt_model: String,
}

/// Wake word and identity configuration
#[derive(Debug, Clone)]
pub struct WakeConfig {
    /// Lowercase trigger phrases, in order
    pub words: Vec<String>,

    /// Lowercase identity phrases, in order
    pub identity_prompts: Vec<String>,

    /// Canned identity reply
    pub identity_reply: String,
}

impl AssistantConfig {
    /// Fresh copy of the API key, if configured
    #[must_use]
    pub fn api_key(&self) -> Option<SecretString> {
        self.api_key
            .as_ref()
            .map(|k| SecretString::from(k.expose_secret().to_string()))
    }
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            words: DEFAULT_WAKE_WORDS.iter().map(ToString::to_string).collect(),
            identity_prompts: DEFAULT_IDENTITY_PROMPTS
                .iter()
                .map(ToString::to_string)
                .collect(),
            identity_reply: DEFAULT_IDENTITY_REPLY.to_string(),
        }
    }
}

/// Cue sounds and lip sync configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Cue played while a completion request is in flight
    pub thinking_cue: Option<PathBuf>,

    /// Cue played whenever dictation (re)starts
    pub listening_cue: Option<PathBuf>,

    /// Maximum mouth opening driven by lip sync
    pub lip_sync_max_open: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            thinking_cue: None,
            listening_cue: None,
            lip_sync_max_open: 10.0,
        }
    }
}

impl Config {
    /// Load configuration from the environment and the TOML config file
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed config file and an env lookup
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn from_sources(
        fc: file::SakuraConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let assistant = AssistantConfig {
            api_key: env("OPENAI_API_KEY")
                .or(fc.assistant.api_key)
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from),
            api_base: env("SAKURA_API_BASE")
                .or(fc.assistant.api_base)
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            chat_model: env("SAKURA_CHAT_MODEL")
                .or(fc.assistant.chat_model)
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            tts_model: env("SAKURA_TTS_MODEL")
                .or(fc.assistant.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
            voice: env("SAKURA_VOICE")
                .or(fc.assistant.voice)
                .unwrap_or_else(|| "nova".to_string()),
            stt_model: env("SAKURA_STT_MODEL")
                .or(fc.assistant.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
        };

        url::Url::parse(&assistant.api_base)
            .map_err(|e| Error::Config(format!("invalid api base {}: {e}", assistant.api_base)))?;

        let defaults = WakeConfig::default();
        let wake = WakeConfig {
            words: normalize_phrases(
                env("SAKURA_WAKE_WORDS")
                    .map(|s| s.split(',').map(ToString::to_string).collect())
                    .or(fc.wake.words)
                    .unwrap_or(defaults.words),
            ),
            identity_prompts: normalize_phrases(
                fc.wake.identity_prompts.unwrap_or(defaults.identity_prompts),
            ),
            identity_reply: fc.wake.identity_reply.unwrap_or(defaults.identity_reply),
        };

        if wake.words.is_empty() {
            return Err(Error::Config("at least one wake word is required".to_string()));
        }

        let base = DictationSettings::default();
        let dictation = DictationSettings {
            initial_silence_timeout: seconds(fc.dictation.initial_silence_secs)?
                .unwrap_or(base.initial_silence_timeout),
            auto_silence_timeout: seconds(fc.dictation.auto_silence_secs)?
                .unwrap_or(base.auto_silence_timeout),
            restart_settle: fc
                .dictation
                .restart_settle_ms
                .map_or(base.restart_settle, Duration::from_millis),
        };

        let audio = AudioConfig {
            thinking_cue: env("SAKURA_THINKING_CUE")
                .or(fc.audio.thinking_cue)
                .map(PathBuf::from),
            listening_cue: env("SAKURA_LISTENING_CUE")
                .or(fc.audio.listening_cue)
                .map(PathBuf::from),
            lip_sync_max_open: fc
                .audio
                .lip_sync_max_open
                .unwrap_or_else(|| AudioConfig::default().lip_sync_max_open),
        };

        let avatar_url = env("SAKURA_AVATAR_URL")
            .or(fc.avatar.url)
            .filter(|u| !u.trim().is_empty());

        // Data directory (~/.local/share/sakura on Linux)
        let data_dir = env("SAKURA_DATA_DIR").map_or_else(
            || {
                directories::BaseDirs::new()
                    .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("sakura"))
            },
            PathBuf::from,
        );

        // Cache directory (~/.cache/sakura on Linux)
        let cache_dir = env("SAKURA_CACHE_DIR").map_or_else(
            || {
                directories::BaseDirs::new().map_or_else(
                    || PathBuf::from(".cache/sakura"),
                    |d| d.cache_dir().join("sakura"),
                )
            },
            PathBuf::from,
        );

        Ok(Self {
            assistant,
            wake,
            dictation,
            audio,
            avatar_url,
            data_dir,
            cache_dir,
        })
    }
}

/// Trim and lowercase phrases, dropping empty entries
fn normalize_phrases(phrases: Vec<String>) -> Vec<String> {
    phrases
        .into_iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

fn seconds(value: Option<f64>) -> Result<Option<Duration>> {
    value
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .map_err(|e| Error::Config(format!("invalid timeout {secs}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(file::SakuraConfigFile::default(), lookup(&[])).unwrap();

        assert!(config.assistant.api_key.is_none());
        assert_eq!(config.assistant.api_base, DEFAULT_API_BASE);
        assert_eq!(config.assistant.tts_model, "tts-1");
        assert_eq!(config.assistant.voice, "nova");
        assert_eq!(config.wake.words, DEFAULT_WAKE_WORDS);
        assert_eq!(config.wake.identity_prompts.len(), 9);
        assert_eq!(config.dictation.initial_silence_timeout, Duration::from_secs(8));
        assert_eq!(config.dictation.auto_silence_timeout, Duration::from_secs(6));
        assert_eq!(config.dictation.restart_settle, Duration::from_millis(500));
        assert!(config.avatar_url.is_none());
    }

    #[test]
    fn test_env_overrides_file() {
        let fc = file::parse_config_file(
            r#"
            [assistant]
            api_key = "from-file"
            voice = "shimmer"
            chat_model = "file-model"
            "#,
        )
        .unwrap();

        let config = Config::from_sources(
            fc,
            lookup(&[("OPENAI_API_KEY", "from-env"), ("SAKURA_VOICE", "alloy")]),
        )
        .unwrap();

        let key = config.assistant.api_key.unwrap();
        assert_eq!(key.expose_secret(), "from-env");
        assert_eq!(config.assistant.voice, "alloy");
        assert_eq!(config.assistant.chat_model, "file-model");
    }

    #[test]
    fn test_wake_words_normalized() {
        let config = Config::from_sources(
            file::SakuraConfigFile::default(),
            lookup(&[("SAKURA_WAKE_WORDS", "  Hey SAKURA , ,Sakura")]),
        )
        .unwrap();

        assert_eq!(config.wake.words, vec!["hey sakura", "sakura"]);
    }

    #[test]
    fn test_empty_wake_words_rejected() {
        let result = Config::from_sources(
            file::SakuraConfigFile::default(),
            lookup(&[("SAKURA_WAKE_WORDS", " , ")]),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_api_base_trailing_slash_trimmed() {
        let config = Config::from_sources(
            file::SakuraConfigFile::default(),
            lookup(&[("SAKURA_API_BASE", "http://localhost:8080/v1/")]),
        )
        .unwrap();
        assert_eq!(config.assistant.api_base, "http://localhost:8080/v1");
    }

    #[test]
    fn test_invalid_api_base_rejected() {
        let result = Config::from_sources(
            file::SakuraConfigFile::default(),
            lookup(&[("SAKURA_API_BASE", "not a url")]),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_blank_api_key_ignored() {
        let config = Config::from_sources(
            file::SakuraConfigFile::default(),
            lookup(&[("OPENAI_API_KEY", "   ")]),
        )
        .unwrap();
        assert!(config.assistant.api_key.is_none());
    }
}
