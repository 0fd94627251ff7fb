//! Catalog operations on comics and chapters that already exist.
//!
//! These are the counterparts of ingestion: deleting a chapter (and its
//! stored pages), counting views, editing, and the read-side listings.
//! Comic view totals are always derived from the chapters, never
//! incremented in place.

use crate::error::{IngestError, ValidationError};
use crate::ingest::Ingestor;
use crate::model::{Chapter, ChapterId, Comic, ComicDetail, ComicId, DeleteOutcome, UserId};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

/// Default number of chapters returned by [`Ingestor::latest_releases`].
pub const DEFAULT_LATEST_LIMIT: usize = 30;

impl Ingestor {
    /// Delete a chapter, unlink it from its comic and remove its pages from
    /// the remote store.
    ///
    /// Remote removal is best-effort: failures are logged and returned in
    /// [`DeleteOutcome::warnings`], the chapter is gone either way.
    pub async fn delete_chapter(
        &self,
        chapter_id: ChapterId,
        acting_user: UserId,
    ) -> Result<DeleteOutcome, IngestError> {
        let chapter = self.require_chapter(chapter_id).await?;
        let comic = self.store.find_comic(chapter.comic).await?;
        ensure_owner(comic.as_ref(), &chapter, acting_user, "delete this chapter")?;

        let chapter = self
            .store
            .detach_chapter(chapter.id)
            .await?
            .ok_or(IngestError::NotFound {
                kind: "chapter",
                id: chapter_id,
            })?;

        let comic_views = self.recompute_comic_views(chapter.comic).await?;
        if comic.is_none() {
            warn!(
                "Chapter {} pointed at missing comic {}",
                chapter.id, chapter.comic
            );
        }

        let remote = &self.remote;
        let warnings: Vec<String> = stream::iter(chapter.pages.iter())
            .map(|url| async move {
                remote
                    .delete(url)
                    .await
                    .map_err(|e| format!("Could not remove {url}: {e}"))
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .filter_map(|res| async move { res.err() })
            .collect()
            .await;
        for w in &warnings {
            warn!("{w}");
        }

        info!(
            "Deleted chapter {} ({} pages, {} not removed)",
            chapter.id,
            chapter.pages.len(),
            warnings.len()
        );
        Ok(DeleteOutcome {
            chapter,
            comic_views,
            warnings,
        })
    }

    /// Count one view of a chapter and refresh the parent comic's total.
    pub async fn record_view(&self, chapter_id: ChapterId) -> Result<Chapter, IngestError> {
        let chapter = self
            .store
            .increment_chapter_views(chapter_id)
            .await?
            .ok_or(IngestError::NotFound {
                kind: "chapter",
                id: chapter_id,
            })?;
        self.recompute_comic_views(chapter.comic).await?;
        Ok(chapter)
    }

    /// Change a chapter's title. Only the comic's author may do this.
    pub async fn rename_chapter(
        &self,
        chapter_id: ChapterId,
        title: &str,
        acting_user: UserId,
    ) -> Result<Chapter, IngestError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::MissingField("title").into());
        }

        let chapter = self.require_chapter(chapter_id).await?;
        let comic = self.store.find_comic(chapter.comic).await?;
        ensure_owner(comic.as_ref(), &chapter, acting_user, "edit this chapter")?;

        let chapter = self
            .store
            .set_chapter_title(chapter_id, title)
            .await?
            .ok_or(IngestError::NotFound {
                kind: "chapter",
                id: chapter_id,
            })?;
        debug!("Renamed chapter {} to '{}'", chapter.id, chapter.title);
        Ok(chapter)
    }

    /// Set the comic's view total to the sum over its chapters.
    ///
    /// Returns the new total, or `None` when the comic no longer exists.
    pub async fn recompute_comic_views(
        &self,
        comic_id: ComicId,
    ) -> Result<Option<u64>, IngestError> {
        Ok(self.store.refresh_comic_views(comic_id).await?)
    }

    /// Most recently released chapters first.
    pub async fn latest_releases(&self, limit: usize) -> Result<Vec<Chapter>, IngestError> {
        let mut chapters = self.store.list_chapters().await?;
        chapters.sort_by(|a, b| b.release_date.cmp(&a.release_date));
        chapters.truncate(limit);
        Ok(chapters)
    }

    /// Comics owned by `author`, newest first.
    pub async fn comics_by_author(&self, author: UserId) -> Result<Vec<Comic>, IngestError> {
        let mut comics: Vec<Comic> = self
            .store
            .list_comics()
            .await?
            .into_iter()
            .filter(|c| c.author == author)
            .collect();
        comics.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(comics)
    }

    /// A comic with its chapters in chapter-number order.
    pub async fn comic_detail(&self, comic_id: ComicId) -> Result<ComicDetail, IngestError> {
        let comic = self
            .store
            .find_comic(comic_id)
            .await?
            .ok_or(IngestError::NotFound {
                kind: "comic",
                id: comic_id,
            })?;
        let mut chapters = self.store.chapters_of_comic(comic_id).await?;
        chapters.sort_by(|a, b| a.chapter_number.total_cmp(&b.chapter_number));
        Ok(ComicDetail { comic, chapters })
    }

    async fn require_chapter(&self, id: ChapterId) -> Result<Chapter, IngestError> {
        self.store
            .find_chapter(id)
            .await?
            .ok_or(IngestError::NotFound { kind: "chapter", id })
    }
}

/// The comic's author owns its chapters. A chapter whose comic is gone
/// falls back to the chapter's own author; with neither, anyone may act.
fn ensure_owner(
    comic: Option<&Comic>,
    chapter: &Chapter,
    acting_user: UserId,
    action: &'static str,
) -> Result<(), IngestError> {
    let owner = comic.map(|c| c.author).or(chapter.author);
    match owner {
        Some(owner) if owner != acting_user => Err(IngestError::Forbidden { action }),
        _ => Ok(()),
    }
}
