//! Error types for the Sakura companion

use thiserror::Error;

/// Result type alias for Sakura operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Sakura companion
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A required collaborator or setting was not wired
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    /// Network or non-success status from a remote service
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed or unexpected response shape
    #[error("parse error: {0}")]
    Parse(String),

    /// Dictation ended for any reason other than a requested stop
    #[error("recognition interrupted: {0}")]
    RecognitionInterrupted(String),

    /// Audio device or decoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Avatar loading error
    #[error("avatar error: {0}")]
    Avatar(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
