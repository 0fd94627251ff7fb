//! The ingestion entry points.
//!
//! [`Ingestor`] bundles the two collaborators (document store and remote
//! image store) with an [`IngestConfig`]. It is cheap to clone and meant to
//! be built once at startup and shared between request handlers. Each call
//! owns its own queue and output slots, so concurrent jobs share nothing but
//! the collaborators.

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::model::{Chapter, Comic, ComicId, FormFields, PageFile, Stats, UserId};
use crate::pipeline::transform::{transform, ImageRole};
use crate::pipeline::upload::{cover_options, upload_image};
use crate::pipeline::{commit, intake, pool};
use crate::remote::RemoteStore;
use crate::store::DocumentStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct Ingestor {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) remote: Arc<dyn RemoteStore>,
    pub(crate) config: IngestConfig,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        remote: Arc<dyn RemoteStore>,
        config: IngestConfig,
    ) -> Self {
        Self {
            store,
            remote,
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    /// Validate, transform, upload and commit one chapter.
    ///
    /// # Returns
    /// The persisted chapter, whose `pages[i]` is the stored form of
    /// `files[i]`.
    ///
    /// # Errors
    /// - [`IngestError::Validation`] : nothing was attempted
    /// - [`IngestError::Ingestion`] : a page failed; no chapter exists, but
    ///   pages uploaded before the failure remain in the remote store
    /// - [`IngestError::Commit`] : every page was stored but the comic is
    ///   missing or the store refused the write
    pub async fn ingest_chapter(
        &self,
        fields: &FormFields,
        files: Vec<PageFile>,
        comic_id: ComicId,
        acting_user: UserId,
    ) -> Result<Chapter, IngestError> {
        let start = Instant::now();

        // ── Step 1: Intake ───────────────────────────────────────────────────
        let draft = intake::validate_chapter(fields, &files, &self.config)?;
        info!(
            "Ingesting chapter '{}' ({} pages) for comic {}",
            draft.title,
            files.len(),
            comic_id
        );

        // ── Step 2: Transform + upload ───────────────────────────────────────
        let images = pool::run_pool(files, comic_id, &self.remote, &self.config).await?;
        let pages: Vec<String> = images.into_iter().map(|img| img.url).collect();

        // ── Step 3: Commit ───────────────────────────────────────────────────
        let chapter =
            commit::commit_chapter(&self.store, draft, pages, comic_id, Some(acting_user)).await?;

        info!(
            "Chapter {} ingested in {}ms",
            chapter.id,
            start.elapsed().as_millis()
        );
        Ok(chapter)
    }

    /// Create a comic from its form fields and a cover image.
    ///
    /// The cover goes through the same normalisation as pages but with the
    /// cover quality, and is stored in the cover folder.
    pub async fn create_comic(
        &self,
        fields: &FormFields,
        cover: Option<PageFile>,
        acting_user: UserId,
    ) -> Result<Comic, IngestError> {
        let draft = intake::validate_comic(fields, cover.as_ref(), &self.config)?;
        let cover = cover.ok_or(IngestError::Internal("cover vanished after validation".into()))?;

        let normalised = transform(cover.bytes, ImageRole::Cover, &self.config).await?;
        let options = cover_options(acting_user, &self.config);
        let image = upload_image(&self.remote, normalised, &options).await?;
        debug!("Cover stored at {}", image.url);

        let now = Utc::now();
        let comic = Comic {
            id: Uuid::new_v4(),
            title: draft.title,
            author: acting_user,
            tags: draft.tags,
            cover: image.url,
            release_date: draft.release_date,
            synopsis: draft.synopsis,
            nsfw: draft.nsfw,
            paywalled: draft.paywalled,
            chapters: Vec::new(),
            stats: Stats::default(),
            created_at: now,
            updated_at: now,
        };
        self.store.save_comic(&comic).await?;
        info!("Created comic {} ('{}')", comic.id, comic.title);
        Ok(comic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::remote::LocalStore;
    use crate::store::MemoryStore;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 10, 10])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn fields(pairs: &[(&str, &str)]) -> FormFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn create_comic_then_ingest_chapter() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = Ingestor::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LocalStore::new(dir.path(), "http://cdn.test")),
            IngestConfig::default(),
        );
        let user = Uuid::new_v4();

        let comic = ingestor
            .create_comic(
                &fields(&[("title", "Moonlit"), ("releaseDate", "2024-01-01"), ("tags", "a,b")]),
                Some(PageFile::new("cover.png", "image/png", png(32, 48))),
                user,
            )
            .await
            .unwrap();
        assert!(comic.cover.starts_with("http://cdn.test/comic_thumbnails/cover_"));
        assert_eq!(comic.author, user);

        let chapter = ingestor
            .ingest_chapter(
                &fields(&[("title", "One"), ("chapterNumber", "1"), ("releaseDate", "2024-02-01")]),
                vec![
                    PageFile::new("1.png", "image/png", png(10, 10)),
                    PageFile::new("2.png", "image/png", png(12, 10)),
                ],
                comic.id,
                user,
            )
            .await
            .unwrap();

        assert_eq!(chapter.pages.len(), 2);
        assert!(chapter.pages[0].ends_with("_0.jpg"));
        assert!(chapter.pages[1].ends_with("_1.jpg"));
        assert_eq!(chapter.author, Some(user));
        let stored = ingestor.store().find_comic(comic.id).await.unwrap().unwrap();
        assert_eq!(stored.chapters, vec![chapter.id]);
    }

    #[tokio::test]
    async fn validation_failure_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = Ingestor::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LocalStore::new(dir.path(), "http://cdn.test")),
            IngestConfig::default(),
        );
        let err = ingestor
            .ingest_chapter(
                &fields(&[("chapterNumber", "1"), ("releaseDate", "2024-02-01")]),
                vec![PageFile::new("1.png", "image/png", png(10, 10))],
                Uuid::new_v4(),
                Uuid::new_v4(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Validation(ValidationError::MissingField("title"))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn undecodable_cover_is_a_transform_error() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = Ingestor::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LocalStore::new(dir.path(), "http://cdn.test")),
            IngestConfig::default(),
        );
        let err = ingestor
            .create_comic(
                &fields(&[("title", "Moonlit"), ("releaseDate", "2024-01-01")]),
                Some(PageFile::new("cover.png", "image/png", b"nope".to_vec())),
                Uuid::new_v4(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Transform(_)), "{err:?}");
        assert!(ingestor.store().list_comics().await.unwrap().is_empty());
    }
}
