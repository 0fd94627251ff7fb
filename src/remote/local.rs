//! Filesystem-backed [`RemoteStore`].
//!
//! Objects are written to `{root}/{folder}/{public_id}.jpg` and exposed as
//! `{base_url}/{folder}/{public_id}.jpg`. The buffer is written to a
//! `.part` file first and renamed into place, so a failed or interrupted
//! upload never leaves a readable object behind.
//!
//! The store keeps the normalised JPEG as-is; the `format` and `quality`
//! options are delivery hints that only a CDN can honour.

use super::{RemoteStore, UploadOptions};
use crate::error::UploadError;
use crate::model::UploadedImage;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

const EXTENSION: &str = "jpg";

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    base_url: String,
}

impl LocalStore {
    /// `base_url` is the public prefix under which `root` is served.
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a URL issued by this store back to its file. Rejects URLs from
    /// other hosts and paths that would escape `root`.
    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let rel = url.strip_prefix(&self.base_url)?.strip_prefix('/')?;
        let rel = Path::new(rel);
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.root.join(rel))
    }

    fn io_err(path: &Path, source: std::io::Error) -> UploadError {
        UploadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
impl RemoteStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<UploadedImage, UploadError> {
        let key = format!("{}/{}.{}", options.folder, options.public_id, EXTENSION);
        let url = format!("{}/{}", self.base_url, key);
        let path = self
            .path_for_url(&url)
            .ok_or_else(|| UploadError::ForeignUrl {
                store: self.name().to_string(),
                url: url.clone(),
            })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_err(parent, e))?;
        }

        let part = path.with_extension(format!("{EXTENSION}.part"));
        if let Err(e) = tokio::fs::write(&part, &bytes).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(Self::io_err(&part, e));
        }
        tokio::fs::rename(&part, &path)
            .await
            .map_err(|e| Self::io_err(&path, e))?;

        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(UploadedImage {
            url,
            public_id: format!("{}/{}", options.folder, options.public_id),
            bytes: bytes.len(),
        })
    }

    async fn delete(&self, url: &str) -> Result<(), UploadError> {
        let path = self.path_for_url(url).ok_or_else(|| UploadError::ForeignUrl {
            store: self.name().to_string(),
            url: url.to_string(),
        })?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| Self::io_err(&path, e))
    }
}
