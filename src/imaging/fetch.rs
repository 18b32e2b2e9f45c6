use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use super::{FetchErrorKind, ImageFetcher, ImageHandle};

/// Resolves image refs against a local media directory.
///
/// The timeout lives here rather than in the loader: a read that outlasts it
/// is reported as a network failure.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
    timeout: Duration,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            root: root.into(),
            timeout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, image_ref: &str) -> Option<PathBuf> {
        let raw = image_ref.strip_prefix("file://").unwrap_or(image_ref);
        if raw.contains("://") {
            return None;
        }
        let path = Path::new(raw);
        if path.is_absolute() {
            Some(path.to_path_buf())
        } else {
            Some(self.root.join(path))
        }
    }
}

#[async_trait]
impl ImageFetcher for FileFetcher {
    async fn fetch(&self, image_ref: &str) -> Result<ImageHandle, FetchErrorKind> {
        let Some(path) = self.resolve(image_ref) else {
            tracing::warn!(image_ref, "unsupported image scheme for local media");
            return Err(FetchErrorKind::NotFound);
        };
        let bytes = match tokio::time::timeout(self.timeout, tokio::fs::read(&path)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(err)) if err.kind() == io::ErrorKind::NotFound => {
                return Err(FetchErrorKind::NotFound)
            }
            Ok(Err(err)) => {
                tracing::warn!(?err, "reading image {}", path.display());
                return Err(FetchErrorKind::Network);
            }
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "image read timed out: {}", path.display());
                return Err(FetchErrorKind::Network);
            }
        };
        ImageHandle::decode(bytes)
    }
}
