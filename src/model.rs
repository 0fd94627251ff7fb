//! Documents and value types shared across the pipeline and the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type ComicId = Uuid;
pub type ChapterId = Uuid;
pub type UserId = Uuid;

/// Text fields of a submitted multipart form, keyed by field name.
pub type FormFields = HashMap<String, String>;

/// One attached file, fully buffered by the HTTP layer.
#[derive(Debug, Clone)]
pub struct PageFile {
    /// Client-supplied file name, used only for messages.
    pub file_name: String,
    /// Declared media type, e.g. `image/png`.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl PageFile {
    pub fn new(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }
}

/// Engagement counters carried by both chapters and comics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub views: u64,
    pub bookmarks: u64,
    pub likes: u64,
    pub comments: u64,
}

/// A series. `chapters` holds chapter ids in publication (insertion) order.
///
/// `stats` is an aggregate recomputed from the chapters and may lag behind
/// them until the next recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comic {
    pub id: ComicId,
    pub title: String,
    pub author: UserId,
    #[serde(default)]
    pub tags: Vec<String>,
    pub cover: String,
    pub release_date: DateTime<Utc>,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub paywalled: bool,
    #[serde(default)]
    pub chapters: Vec<ChapterId>,
    #[serde(default)]
    pub stats: Stats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One installment. `pages` is in reading order, which is always the order
/// the files were submitted in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub comic: ComicId,
    pub author: Option<UserId>,
    pub title: String,
    pub chapter_number: f64,
    #[serde(default)]
    pub description: String,
    pub release_date: DateTime<Utc>,
    pub pages: Vec<String>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub paywalled: bool,
    #[serde(default)]
    pub stats: Stats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated chapter fields, ready to be committed once the pages are stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterDraft {
    pub title: String,
    pub chapter_number: f64,
    pub description: String,
    pub release_date: DateTime<Utc>,
    pub nsfw: bool,
    pub paywalled: bool,
}

/// Validated comic fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ComicDraft {
    pub title: String,
    pub synopsis: String,
    pub tags: Vec<String>,
    pub release_date: DateTime<Utc>,
    pub nsfw: bool,
    pub paywalled: bool,
}

/// A stored image as reported by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    /// Stable retrieval URL.
    pub url: String,
    /// Folder-qualified object key in the remote store.
    pub public_id: String,
    /// Size of the uploaded (normalised) buffer.
    pub bytes: usize,
}

/// Result of [`crate::ingest::Ingestor::delete_chapter`].
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    /// The chapter as it was before deletion.
    pub chapter: Chapter,
    /// The parent comic's recomputed view total, if the comic still exists.
    pub comic_views: Option<u64>,
    /// Remote page objects that could not be removed. The deletion itself
    /// has already been committed.
    pub warnings: Vec<String>,
}

/// A comic together with its chapters sorted by chapter number.
#[derive(Debug, Clone, Serialize)]
pub struct ComicDetail {
    pub comic: Comic,
    pub chapters: Vec<Chapter>,
}
