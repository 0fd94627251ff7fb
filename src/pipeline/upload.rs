//! Upload wrapper: build storage options and unique ids, then make exactly
//! one [`RemoteStore::upload`] call.
//!
//! No retry happens here. A failed page fails its job; whether to resubmit
//! is the caller's decision.

use crate::config::IngestConfig;
use crate::error::UploadError;
use crate::model::{ComicId, UploadedImage, UserId};
use crate::remote::{RemoteStore, UploadOptions};
use std::sync::Arc;
use tracing::debug;

/// Storage options for page `index` (0-based) of a chapter of `comic`.
///
/// Ids look like `comic_{comic}_chap_{millis}_{nonce}_{index}`: the nonce
/// keeps two concurrent jobs for the same comic from colliding, the index
/// keeps pages of one job apart.
pub fn page_options(comic: ComicId, index: usize, config: &IngestConfig) -> UploadOptions {
    UploadOptions {
        folder: config.page_folder.clone(),
        public_id: format!(
            "comic_{}_chap_{}_{}_{}",
            comic.simple(),
            chrono::Utc::now().timestamp_millis(),
            nonce(),
            index
        ),
        format: config.remote_format.clone(),
        quality: config.page_remote_quality.clone(),
    }
}

/// Storage options for a cover uploaded by `user`.
pub fn cover_options(user: UserId, config: &IngestConfig) -> UploadOptions {
    UploadOptions {
        folder: config.cover_folder.clone(),
        public_id: format!(
            "cover_{}_{}_{}",
            user.simple(),
            chrono::Utc::now().timestamp_millis(),
            nonce()
        ),
        format: config.remote_format.clone(),
        quality: config.cover_remote_quality.clone(),
    }
}

/// Single upload attempt. A success without a URL is treated as a failure.
pub async fn upload_image(
    remote: &Arc<dyn RemoteStore>,
    bytes: Vec<u8>,
    options: &UploadOptions,
) -> Result<UploadedImage, UploadError> {
    let image = remote.upload(bytes, options).await?;
    if image.url.trim().is_empty() {
        return Err(UploadError::MissingUrl {
            store: remote.name().to_string(),
        });
    }
    debug!("{} stored {} ({} bytes)", remote.name(), image.public_id, image.bytes);
    Ok(image)
}

fn nonce() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn page_ids_carry_comic_and_index() {
        let comic = Uuid::new_v4();
        let opts = page_options(comic, 4, &IngestConfig::default());
        assert_eq!(opts.folder, "comic_pages");
        assert_eq!(opts.format, "webp");
        assert_eq!(opts.quality, "auto:good");
        assert!(opts.public_id.starts_with(&format!("comic_{}_chap_", comic.simple())));
        assert!(opts.public_id.ends_with("_4"));
    }

    #[test]
    fn ids_are_unique_across_calls() {
        let comic = Uuid::new_v4();
        let config = IngestConfig::default();
        let a = page_options(comic, 0, &config);
        let b = page_options(comic, 0, &config);
        assert_ne!(a.public_id, b.public_id);
    }

    #[test]
    fn cover_options_use_cover_folder_and_quality() {
        let opts = cover_options(Uuid::new_v4(), &IngestConfig::default());
        assert_eq!(opts.folder, "comic_thumbnails");
        assert_eq!(opts.quality, "auto:eco");
        assert!(opts.public_id.starts_with("cover_"));
    }
}
