//! Avatar loading
//!
//! The companion only acts on speech once its avatar is ready. A load
//! attempt reports exactly one [`AvatarLoadOutcome`]; success and failure
//! both open the readiness gate.

mod http;
mod preferences;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::Result;

pub use http::HttpAvatarLoader;
pub use preferences::{AvatarPreferences, normalize_avatar_url};

/// A loaded avatar model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarHandle {
    /// Source URL
    pub url: String,
    /// Local copy of the model
    pub path: PathBuf,
}

/// Result of one load attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarLoadOutcome {
    /// Avatar ready to render
    Loaded(AvatarHandle),
    /// Load failed; the companion runs without its avatar
    Failed(String),
}

/// Loads avatar models
#[async_trait]
pub trait AvatarLoader: Send + Sync {
    /// Load the avatar at `url`
    ///
    /// # Errors
    ///
    /// Returns error if the avatar cannot be fetched or is invalid
    async fn load(&self, url: &str) -> Result<AvatarHandle>;
}

/// Start a load attempt in the background
///
/// The returned channel yields exactly one outcome.
pub fn begin_load(loader: Arc<dyn AvatarLoader>, url: String) -> oneshot::Receiver<AvatarLoadOutcome> {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        tracing::info!(url = %url, "loading avatar");
        let outcome = match loader.load(&url).await {
            Ok(handle) => {
                tracing::info!(path = %handle.path.display(), "avatar loaded");
                AvatarLoadOutcome::Loaded(handle)
            }
            Err(e) => {
                tracing::error!(error = %e, url = %url, "failed to load avatar");
                AvatarLoadOutcome::Failed(e.to_string())
            }
        };

        if tx.send(outcome).is_err() {
            tracing::debug!("avatar outcome dropped, nobody waiting");
        }
    });

    rx
}

/// A readiness channel that is already resolved
#[must_use]
pub fn resolved(outcome: AvatarLoadOutcome) -> oneshot::Receiver<AvatarLoadOutcome> {
    let (tx, rx) = oneshot::channel();
    // Receiver is held right here, send cannot fail
    let _ = tx.send(outcome);
    rx
}
