//! Remote image stores.
//!
//! The pipeline talks to the store only through [`RemoteStore`]: one upload
//! per call, no retries, and a best-effort `delete` used when a chapter is
//! removed. Two implementations ship with the crate:
//!
//! - [`CloudinaryStore`] : signed HTTP uploads to a Cloudinary-compatible API;
//! - [`LocalStore`] : files under a directory served by some static host.

mod cloudinary;
mod local;

pub use cloudinary::CloudinaryStore;
pub use local::LocalStore;

use crate::error::UploadError;
use crate::model::UploadedImage;
use async_trait::async_trait;

/// Where and how a single buffer should be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Destination folder, e.g. `comic_pages`.
    pub folder: String,
    /// Unique, folder-relative object name (no extension).
    pub public_id: String,
    /// Delivery format the store should serve, e.g. `webp`.
    pub format: String,
    /// Store-side quality hint, e.g. `auto:good`.
    pub quality: String,
}

/// A content store that accepts image buffers and hands back retrieval URLs.
///
/// A failed `upload` must not leave an object that a later `delete` or read
/// would consider committed.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Store `bytes` once. A success always carries a non-empty URL.
    async fn upload(
        &self,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<UploadedImage, UploadError>;

    /// Remove the object behind a URL previously returned by `upload`.
    async fn delete(&self, url: &str) -> Result<(), UploadError>;
}
