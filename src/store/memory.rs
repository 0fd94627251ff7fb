use super::{DocumentStore, Snapshot};
use crate::error::StoreError;
use crate::model::{Chapter, ChapterId, Comic, ComicId};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// In-memory [`DocumentStore`]. Clones of the documents are handed out, so
/// callers never observe each other's unsaved edits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_comic(&self, id: ComicId) -> Result<Option<Comic>, StoreError> {
        Ok(self.inner.read().await.comics.get(&id).cloned())
    }

    async fn save_comic(&self, comic: &Comic) -> Result<(), StoreError> {
        self.inner.write().await.comics.insert(comic.id, comic.clone());
        Ok(())
    }

    async fn list_comics(&self) -> Result<Vec<Comic>, StoreError> {
        Ok(self.inner.read().await.comics.values().cloned().collect())
    }

    async fn create_chapter(&self, chapter: &Chapter) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .chapters
            .insert(chapter.id, chapter.clone());
        Ok(())
    }

    async fn attach_chapter(&self, chapter: &Chapter) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.attach_chapter(chapter))
    }

    async fn find_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StoreError> {
        Ok(self.inner.read().await.chapters.get(&id).cloned())
    }

    async fn set_chapter_title(
        &self,
        id: ChapterId,
        title: &str,
    ) -> Result<Option<Chapter>, StoreError> {
        Ok(self.inner.write().await.set_chapter_title(id, title))
    }

    async fn delete_chapter(&self, id: ChapterId) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.chapters.remove(&id).is_some())
    }

    async fn detach_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StoreError> {
        Ok(self.inner.write().await.detach_chapter(id))
    }

    async fn list_chapters(&self) -> Result<Vec<Chapter>, StoreError> {
        Ok(self.inner.read().await.chapters.values().cloned().collect())
    }

    async fn increment_chapter_views(&self, id: ChapterId) -> Result<Option<Chapter>, StoreError> {
        Ok(self.inner.write().await.increment_views(id))
    }

    async fn refresh_comic_views(&self, comic: ComicId) -> Result<Option<u64>, StoreError> {
        Ok(self.inner.write().await.refresh_comic_views(comic))
    }
}
