//! Avatar download over HTTP

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::{AvatarHandle, AvatarLoader};
use crate::{Error, Result};

/// Magic bytes at the start of a binary glTF file
const GLB_MAGIC: &[u8; 4] = b"glTF";

/// Downloads `.glb` avatars into a cache directory
pub struct HttpAvatarLoader {
    client: reqwest::Client,
    cache_dir: PathBuf,
    loading: AtomicBool,
}

impl HttpAvatarLoader {
    /// Create a loader caching into `cache_dir`
    #[must_use]
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache_dir,
            loading: AtomicBool::new(false),
        }
    }

    /// Cache directory for downloaded avatars
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    async fn download(&self, url: &str) -> Result<AvatarHandle> {
        let parsed =
            url::Url::parse(url).map_err(|e| Error::Avatar(format!("invalid avatar URL {url}: {e}")))?;

        std::fs::create_dir_all(&self.cache_dir)?;
        clear_cached_models(&self.cache_dir);

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Avatar(format!("avatar download failed with {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if !bytes.starts_with(GLB_MAGIC) {
            return Err(Error::Avatar("downloaded file is not a GLB model".to_string()));
        }

        let file_name = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| name.ends_with(".glb"))
            .unwrap_or("avatar.glb");
        let path = self.cache_dir.join(file_name);

        std::fs::write(&path, &bytes)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "avatar cached");

        Ok(AvatarHandle {
            url: url.to_string(),
            path,
        })
    }
}

#[async_trait]
impl AvatarLoader for HttpAvatarLoader {
    async fn load(&self, url: &str) -> Result<AvatarHandle> {
        if self.loading.swap(true, Ordering::SeqCst) {
            tracing::info!(url, "avatar already loading, skipping duplicate");
            return Err(Error::Avatar("avatar load already in progress".to_string()));
        }

        // Cleared on every exit, including a dropped future
        let _guard = LoadingGuard(&self.loading);
        self.download(url).await
    }
}

/// Releases the in-progress flag when dropped
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Delete stale `.glb` files; failures are logged, not fatal
fn clear_cached_models(dir: &Path) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "failed to read avatar cache");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "glb") {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove cached avatar");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_cached_models_keeps_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.glb"), b"glTF").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

        clear_cached_models(dir.path());

        assert!(!dir.path().join("old.glb").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_loading_guard_releases_flag() {
        let loading = AtomicBool::new(true);
        drop(LoadingGuard(&loading));
        assert!(!loading.load(Ordering::SeqCst));
    }
}
