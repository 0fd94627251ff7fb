//! Document stores for comics and chapters.
//!
//! [`DocumentStore`] is the persistence seam used by the commit step and the
//! catalog operations. Besides single-document reads and writes it offers a
//! few compound writes (attach, detach, view increment, view refresh). Each
//! completes under one lock, so concurrent requests on one comic never
//! overwrite each other's chapter links. Two implementations ship with the
//! crate:
//!
//! - [`MemoryStore`] : process-local, for tests and scratch runs;
//! - [`JsonFileStore`] : the same data persisted to one JSON file.

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::model::{Chapter, ChapterId, Comic, ComicId};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_comic(&self, id: ComicId) -> Result<Option<Comic>, StoreError>;

    /// Insert or replace a comic.
    async fn save_comic(&self, comic: &Comic) -> Result<(), StoreError>;

    async fn list_comics(&self) -> Result<Vec<Comic>, StoreError>;

    /// Insert a chapter without touching its comic.
    async fn create_chapter(&self, chapter: &Chapter) -> Result<(), StoreError>;

    /// Insert `chapter` and append its id to its comic's chapter list in one
    /// write. Returns `false`, having written nothing, when the comic does
    /// not exist.
    async fn attach_chapter(&self, chapter: &Chapter) -> Result<bool, StoreError>;

    async fn find_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StoreError>;

    /// Set a chapter's title; returns the updated chapter.
    async fn set_chapter_title(
        &self,
        id: ChapterId,
        title: &str,
    ) -> Result<Option<Chapter>, StoreError>;

    /// Returns whether a chapter was removed.
    async fn delete_chapter(&self, id: ChapterId) -> Result<bool, StoreError>;

    /// Remove a chapter and pull its id from its comic in one write.
    /// Returns the removed chapter.
    async fn detach_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StoreError>;

    async fn list_chapters(&self) -> Result<Vec<Chapter>, StoreError>;

    /// Atomically add one view; returns the updated chapter.
    async fn increment_chapter_views(&self, id: ChapterId) -> Result<Option<Chapter>, StoreError>;

    /// Set the comic's view total to the sum over its chapters, reading and
    /// writing in one step. `None` when the comic does not exist.
    async fn refresh_comic_views(&self, comic: ComicId) -> Result<Option<u64>, StoreError>;

    /// Every chapter whose `comic` field points at `comic`.
    async fn chapters_of_comic(&self, comic: ComicId) -> Result<Vec<Chapter>, StoreError> {
        Ok(self
            .list_chapters()
            .await?
            .into_iter()
            .filter(|c| c.comic == comic)
            .collect())
    }
}

/// The full data set of both bundled stores.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    #[serde(default)]
    pub comics: HashMap<ComicId, Comic>,
    #[serde(default)]
    pub chapters: HashMap<ChapterId, Chapter>,
}

impl Snapshot {
    pub fn attach_chapter(&mut self, chapter: &Chapter) -> bool {
        let Some(comic) = self.comics.get_mut(&chapter.comic) else {
            return false;
        };
        comic.chapters.push(chapter.id);
        comic.updated_at = Utc::now();
        self.chapters.insert(chapter.id, chapter.clone());
        true
    }

    pub fn detach_chapter(&mut self, id: ChapterId) -> Option<Chapter> {
        let chapter = self.chapters.remove(&id)?;
        if let Some(comic) = self.comics.get_mut(&chapter.comic) {
            comic.chapters.retain(|c| *c != id);
            comic.updated_at = Utc::now();
        }
        Some(chapter)
    }

    pub fn set_chapter_title(&mut self, id: ChapterId, title: &str) -> Option<Chapter> {
        let chapter = self.chapters.get_mut(&id)?;
        chapter.title = title.to_string();
        chapter.updated_at = Utc::now();
        Some(chapter.clone())
    }

    pub fn increment_views(&mut self, id: ChapterId) -> Option<Chapter> {
        let chapter = self.chapters.get_mut(&id)?;
        chapter.stats.views += 1;
        chapter.updated_at = Utc::now();
        Some(chapter.clone())
    }

    pub fn refresh_comic_views(&mut self, id: ComicId) -> Option<u64> {
        let total: u64 = self
            .chapters
            .values()
            .filter(|c| c.comic == id)
            .map(|c| c.stats.views)
            .sum();
        let comic = self.comics.get_mut(&id)?;
        comic.stats.views = total;
        Some(total)
    }
}
