//! TOML configuration file loading
//!
//! Supports `~/.config/sakura/config.toml` as a persistent config source.
//! All fields are optional, the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct SakuraConfigFile {
    /// Remote assistant configuration
    #[serde(default)]
    pub assistant: AssistantFileConfig,

    /// Wake word and identity configuration
    #[serde(default)]
    pub wake: WakeFileConfig,

    /// Dictation session configuration
    #[serde(default)]
    pub dictation: DictationFileConfig,

    /// Audio cue and lip sync configuration
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Avatar configuration
    #[serde(default)]
    pub avatar: AvatarFileConfig,
}

/// Remote assistant settings
#[derive(Debug, Default, Deserialize)]
pub struct AssistantFileConfig {
    /// API key for the remote service
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API (e.g. "https://api.openai.com/v1")
    pub api_base: Option<String>,

    /// Chat completion model (e.g. "gpt-4o-mini")
    pub chat_model: Option<String>,

    /// Speech synthesis model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// Speech synthesis voice (e.g. "nova")
    pub voice: Option<String>,

    /// Transcription model (e.g. "whisper-1")
    pub stt_model: Option<String>,
}

/// Wake word settings
#[derive(Debug, Default, Deserialize)]
pub struct WakeFileConfig {
    /// Trigger phrases
    pub words: Option<Vec<String>>,

    /// Phrases answered with the identity reply
    pub identity_prompts: Option<Vec<String>>,

    /// Canned identity reply
    pub identity_reply: Option<String>,
}

/// Dictation settings
#[derive(Debug, Default, Deserialize)]
pub struct DictationFileConfig {
    /// Seconds of silence allowed before the first word
    pub initial_silence_secs: Option<f64>,

    /// Seconds of silence after the last word that end the session
    pub auto_silence_secs: Option<f64>,

    /// Milliseconds to wait between teardown and restart
    pub restart_settle_ms: Option<u64>,
}

/// Audio settings
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Cue played while a completion request is in flight
    pub thinking_cue: Option<String>,

    /// Cue played whenever dictation (re)starts
    pub listening_cue: Option<String>,

    /// Maximum mouth opening driven by lip sync
    pub lip_sync_max_open: Option<f32>,
}

/// Avatar settings
#[derive(Debug, Default, Deserialize)]
pub struct AvatarFileConfig {
    /// Avatar URL override
    pub url: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `SakuraConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> SakuraConfigFile {
    let Some(path) = config_file_path() else {
        return SakuraConfigFile::default();
    };

    if !path.exists() {
        return SakuraConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => parse_config_file(&content).unwrap_or_else(|e| {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse config file, using defaults"
            );
            SakuraConfigFile::default()
        }),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            SakuraConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the contents are not valid TOML for the schema
pub fn parse_config_file(content: &str) -> crate::Result<SakuraConfigFile> {
    let config = toml::from_str(content)?;
    tracing::info!("loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/sakura/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("sakura").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_file() {
        let fc = parse_config_file(
            r#"
            [assistant]
            voice = "shimmer"

            [wake]
            words = ["hey sakura"]

            [dictation]
            restart_settle_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(fc.assistant.voice.as_deref(), Some("shimmer"));
        assert!(fc.assistant.chat_model.is_none());
        assert_eq!(fc.wake.words, Some(vec!["hey sakura".to_string()]));
        assert_eq!(fc.dictation.restart_settle_ms, Some(250));
        assert!(fc.avatar.url.is_none());
    }

    #[test]
    fn test_parse_empty_file() {
        let fc = parse_config_file("").unwrap();
        assert!(fc.assistant.api_key.is_none());
        assert!(fc.wake.words.is_none());
    }

    #[test]
    fn test_parse_invalid_file() {
        assert!(parse_config_file("[assistant\nvoice = 1").is_err());
    }
}
