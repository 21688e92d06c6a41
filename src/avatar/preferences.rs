//! Last used avatar URL, persisted in the data directory

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::{AvatarLoadOutcome, AvatarLoader, begin_load, resolved};
use crate::{Error, Result};

const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    avatar_url: Option<String>,
}

/// Stored avatar URL preference
pub struct AvatarPreferences {
    path: PathBuf,
}

impl AvatarPreferences {
    /// Preferences stored in `data_dir`
    #[must_use]
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(PREFERENCES_FILE),
        }
    }

    /// The saved avatar URL, if any
    #[must_use]
    pub fn avatar_url(&self) -> Option<String> {
        self.read()
            .avatar_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
    }

    /// Normalize and save a URL, then forward it to the loader if one is wired
    ///
    /// Returns the readiness channel of the started load, if any. Empty
    /// input is ignored with a warning.
    ///
    /// # Errors
    ///
    /// Returns error if the preference cannot be written
    pub fn submit_url(
        &self,
        raw: &str,
        loader: Option<Arc<dyn AvatarLoader>>,
    ) -> Result<Option<oneshot::Receiver<AvatarLoadOutcome>>> {
        let Some(url) = normalize_avatar_url(raw) else {
            tracing::warn!("avatar URL is empty");
            return Ok(None);
        };

        self.save_url(&url)?;
        tracing::info!(url = %url, "avatar URL saved");

        match loader {
            Some(loader) => Ok(Some(begin_load(loader, url))),
            None => {
                let err = Error::ConfigurationMissing("avatar loader not wired".to_string());
                tracing::warn!(error = %err, "avatar URL not forwarded");
                Ok(None)
            }
        }
    }

    /// Load the avatar used at startup
    ///
    /// `override_url` wins over the saved preference and is saved in turn.
    /// A missing or empty URL, or a preference that cannot be written, is
    /// logged; the returned channel always yields an outcome.
    #[must_use]
    pub fn start_load(
        &self,
        override_url: Option<&str>,
        loader: Arc<dyn AvatarLoader>,
    ) -> oneshot::Receiver<AvatarLoadOutcome> {
        let raw = override_url.map(str::to_string).or_else(|| self.avatar_url());
        let Some(raw) = raw else {
            let err = Error::ConfigurationMissing("no avatar URL configured".to_string());
            tracing::warn!(error = %err, "starting without avatar");
            return resolved(AvatarLoadOutcome::Failed(err.to_string()));
        };

        let Some(url) = normalize_avatar_url(&raw) else {
            let err = Error::ConfigurationMissing("avatar URL is empty".to_string());
            tracing::warn!(error = %err, "starting without avatar");
            return resolved(AvatarLoadOutcome::Failed(err.to_string()));
        };

        match self.save_url(&url) {
            Ok(()) => tracing::debug!(url = %url, "avatar URL saved"),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to save avatar URL");
            }
        }

        begin_load(loader, url)
    }

    fn save_url(&self, url: &str) -> Result<()> {
        let mut stored = self.read();
        stored.avatar_url = Some(url.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(&stored)?)?;
        Ok(())
    }

    fn read(&self) -> StoredPreferences {
        let Ok(content) = std::fs::read(&self.path) else {
            return StoredPreferences::default();
        };

        serde_json::from_slice(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable preferences");
            StoredPreferences::default()
        })
    }
}

/// Trim a URL and force the `.glb` model format
///
/// Returns `None` for empty input.
#[must_use]
pub fn normalize_avatar_url(raw: &str) -> Option<String> {
    let url = raw.trim();
    if url.is_empty() {
        return None;
    }

    if let Some(base) = url.strip_suffix(".json") {
        Some(format!("{base}.glb"))
    } else if url.ends_with(".glb") {
        Some(url.to_string())
    } else {
        Some(format!("{url}.glb"))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::avatar::AvatarHandle;

    struct InstantLoader;

    #[async_trait]
    impl AvatarLoader for InstantLoader {
        async fn load(&self, url: &str) -> Result<AvatarHandle> {
            Ok(AvatarHandle {
                url: url.to_string(),
                path: PathBuf::from("/tmp/avatar.glb"),
            })
        }
    }

    #[test]
    fn test_normalize_avatar_url() {
        assert_eq!(
            normalize_avatar_url(" https://models.example/abc.json ").as_deref(),
            Some("https://models.example/abc.glb")
        );
        assert_eq!(
            normalize_avatar_url("https://models.example/abc.glb").as_deref(),
            Some("https://models.example/abc.glb")
        );
        assert_eq!(
            normalize_avatar_url("https://models.example/abc").as_deref(),
            Some("https://models.example/abc.glb")
        );
        assert!(normalize_avatar_url("   ").is_none());
    }

    #[test]
    fn test_submit_without_loader_saves() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = AvatarPreferences::in_dir(dir.path());
        assert!(prefs.avatar_url().is_none());

        let pending = prefs.submit_url("https://models.example/abc", None).unwrap();
        assert!(pending.is_none());
        assert_eq!(
            prefs.avatar_url().as_deref(),
            Some("https://models.example/abc.glb")
        );
    }

    #[test]
    fn test_submit_empty_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = AvatarPreferences::in_dir(dir.path());

        assert!(prefs.submit_url("  ", None).unwrap().is_none());
        assert!(!dir.path().join(PREFERENCES_FILE).exists());
    }

    #[test]
    fn test_corrupt_file_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PREFERENCES_FILE), b"{not json").unwrap();

        let prefs = AvatarPreferences::in_dir(dir.path());
        assert!(prefs.avatar_url().is_none());
    }

    #[tokio::test]
    async fn test_start_load_without_url_resolves_failed() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = AvatarPreferences::in_dir(dir.path());

        let outcome = prefs.start_load(None, Arc::new(InstantLoader)).await.unwrap();
        assert!(matches!(outcome, AvatarLoadOutcome::Failed(_)));

        let outcome = prefs
            .start_load(Some("  "), Arc::new(InstantLoader))
            .await
            .unwrap();
        assert!(matches!(outcome, AvatarLoadOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_start_load_prefers_override_and_saves_it() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = AvatarPreferences::in_dir(dir.path());
        prefs.submit_url("https://models.example/old", None).unwrap();

        let outcome = prefs
            .start_load(Some("https://models.example/new.json"), Arc::new(InstantLoader))
            .await
            .unwrap();

        assert!(
            matches!(outcome, AvatarLoadOutcome::Loaded(ref h) if h.url == "https://models.example/new.glb")
        );
        assert_eq!(
            prefs.avatar_url().as_deref(),
            Some("https://models.example/new.glb")
        );
    }

    #[tokio::test]
    async fn test_start_load_survives_unwritable_preferences() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        // The data directory sits under a regular file, so saving fails
        let prefs = AvatarPreferences::in_dir(&blocker.join("data"));
        let outcome = prefs
            .start_load(Some("https://models.example/abc"), Arc::new(InstantLoader))
            .await
            .unwrap();

        assert!(
            matches!(outcome, AvatarLoadOutcome::Loaded(ref h) if h.url == "https://models.example/abc.glb")
        );
        assert!(prefs.avatar_url().is_none());
    }
}
