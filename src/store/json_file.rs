//! [`DocumentStore`] persisted to a single JSON file.
//!
//! Every write serialises the whole data set to `<file>.tmp` and renames it
//! over the original, so a crash mid-write leaves the previous version
//! intact. The in-memory copy is only replaced after the rename succeeded.

use super::{DocumentStore, Snapshot};
use crate::error::StoreError;
use crate::model::{Chapter, ChapterId, Comic, ComicId};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: RwLock<Snapshot>,
}

impl JsonFileStore {
    /// Open `path`, starting empty if the file does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match tokio::fs::read(&path).await {
            Ok(raw) => serde_json::from_slice::<Snapshot>(&raw).map_err(|e| StoreError::Serde {
                path: path.clone(),
                source: e,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Store file {} not found; starting empty", path.display());
                Snapshot::default()
            }
            Err(e) => return Err(StoreError::Io { path, source: e }),
        };
        debug!(
            "Opened {}: {} comics, {} chapters",
            path.display(),
            snapshot.comics.len(),
            snapshot.chapters.len()
        );
        Ok(Self {
            path,
            inner: RwLock::new(snapshot),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `f` to a copy, persist it, then publish it.
    async fn mutate<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Snapshot) -> Result<T, StoreError> + Send,
        T: Send,
    {
        let mut guard = self.inner.write().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.persist(&next).await?;
        *guard = next;
        Ok(out)
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let io = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_vec_pretty(snapshot).map_err(|e| StoreError::Serde {
            path: self.path.clone(),
            source: e,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await.map_err(io)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn find_comic(&self, id: ComicId) -> Result<Option<Comic>, StoreError> {
        Ok(self.inner.read().await.comics.get(&id).cloned())
    }

    async fn save_comic(&self, comic: &Comic) -> Result<(), StoreError> {
        let comic = comic.clone();
        self.mutate(move |s| {
            s.comics.insert(comic.id, comic);
            Ok(())
        })
        .await
    }

    async fn list_comics(&self) -> Result<Vec<Comic>, StoreError> {
        Ok(self.inner.read().await.comics.values().cloned().collect())
    }

    async fn create_chapter(&self, chapter: &Chapter) -> Result<(), StoreError> {
        let chapter = chapter.clone();
        self.mutate(move |s| {
            s.chapters.insert(chapter.id, chapter);
            Ok(())
        })
        .await
    }

    async fn attach_chapter(&self, chapter: &Chapter) -> Result<bool, StoreError> {
        self.mutate(|s| Ok(s.attach_chapter(chapter))).await
    }

    async fn find_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StoreError> {
        Ok(self.inner.read().await.chapters.get(&id).cloned())
    }

    async fn set_chapter_title(
        &self,
        id: ChapterId,
        title: &str,
    ) -> Result<Option<Chapter>, StoreError> {
        self.mutate(|s| Ok(s.set_chapter_title(id, title))).await
    }

    async fn delete_chapter(&self, id: ChapterId) -> Result<bool, StoreError> {
        if !self.inner.read().await.chapters.contains_key(&id) {
            return Ok(false);
        }
        self.mutate(move |s| Ok(s.chapters.remove(&id).is_some())).await
    }

    async fn detach_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StoreError> {
        if !self.inner.read().await.chapters.contains_key(&id) {
            return Ok(None);
        }
        self.mutate(move |s| Ok(s.detach_chapter(id))).await
    }

    async fn list_chapters(&self) -> Result<Vec<Chapter>, StoreError> {
        Ok(self.inner.read().await.chapters.values().cloned().collect())
    }

    async fn increment_chapter_views(&self, id: ChapterId) -> Result<Option<Chapter>, StoreError> {
        self.mutate(move |s| Ok(s.increment_views(id))).await
    }

    async fn refresh_comic_views(&self, comic: ComicId) -> Result<Option<u64>, StoreError> {
        self.mutate(move |s| Ok(s.refresh_comic_views(comic))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stats;
    use chrono::Utc;
    use uuid::Uuid;

    fn comic() -> Comic {
        let now = Utc::now();
        Comic {
            id: Uuid::new_v4(),
            title: "Moonlit".into(),
            author: Uuid::new_v4(),
            tags: vec!["fantasy".into()],
            cover: "http://cdn.test/c.jpg".into(),
            release_date: now,
            synopsis: String::new(),
            nsfw: false,
            paywalled: false,
            chapters: vec![],
            stats: Stats::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn chapter(comic: ComicId) -> Chapter {
        let now = Utc::now();
        Chapter {
            id: Uuid::new_v4(),
            comic,
            author: None,
            title: "One".into(),
            chapter_number: 1.0,
            description: String::new(),
            release_date: now,
            pages: vec!["http://cdn.test/p0.jpg".into()],
            nsfw: false,
            paywalled: false,
            stats: Stats::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/catalog.json");

        let c = comic();
        let ch = chapter(c.id);
        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store.save_comic(&c).await.unwrap();
            store.create_chapter(&ch).await.unwrap();
            store.increment_chapter_views(ch.id).await.unwrap();
        }

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(reopened.find_comic(c.id).await.unwrap(), Some(c.clone()));
        let stored = reopened.find_chapter(ch.id).await.unwrap().unwrap();
        assert_eq!(stored.stats.views, 1);
        assert_eq!(reopened.chapters_of_comic(c.id).await.unwrap().len(), 1);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn renaming_a_deleted_chapter_finds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("c.json")).await.unwrap();
        let ch = chapter(Uuid::new_v4());
        store.create_chapter(&ch).await.unwrap();
        assert!(store.delete_chapter(ch.id).await.unwrap());
        assert!(!store.delete_chapter(ch.id).await.unwrap());
        assert!(store.set_chapter_title(ch.id, "Gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_persist_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        let store = JsonFileStore::open(sub.join("c.json")).await.unwrap();
        let c = comic();
        store.save_comic(&c).await.unwrap();

        // A plain file where the parent directory used to be.
        std::fs::remove_dir_all(&sub).unwrap();
        std::fs::write(&sub, b"").unwrap();

        let ch = chapter(c.id);
        let err = store.attach_chapter(&ch).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }), "{err:?}");
        assert!(store.find_chapter(ch.id).await.unwrap().is_none());
        assert!(store.find_comic(c.id).await.unwrap().unwrap().chapters.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let err = JsonFileStore::open(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Serde { .. }), "{err:?}");
    }
}
