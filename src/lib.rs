//! # comic-ingest
//!
//! Turn a batch of uploaded page images into a persisted comic chapter.
//!
//! Each page is decoded, downscaled to a maximum width, flattened and
//! re-encoded as JPEG, then stored in a remote image store. Pages are worked
//! on by a small bounded pool, so they finish in any order, but the chapter's
//! page list always follows the order the files were submitted in. A chapter
//! document is written only when every page made it; one bad page fails the
//! whole job.
//!
//! ## Pipeline Overview
//!
//! ```text
//! form fields + files
//!  │
//!  ├─ 1. Intake     validate fields, media types, sizes, page count
//!  ├─ 2. Pool       C workers pull (index, page) from a shared queue
//!  │     ├─ Transform  decode, orient, resize, JPEG (spawn_blocking)
//!  │     └─ Upload     one remote call, unique public id
//!  ├─ 3. Commit     chapter document + link into the comic
//!  └─ 4. Catalog    delete / view / rename / listings
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use comic_ingest::{IngestConfig, Ingestor, LocalStore, MemoryStore, PageFile};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ingestor = Ingestor::new(
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(LocalStore::new("./media", "http://localhost:8080/media")),
//!         IngestConfig::from_env()?,
//!     );
//!     let user = uuid::Uuid::new_v4();
//!
//!     let mut fields = HashMap::new();
//!     fields.insert("title".to_string(), "Moonlit".to_string());
//!     fields.insert("releaseDate".to_string(), "2024-05-01".to_string());
//!     let cover = PageFile::new("cover.png", "image/png", std::fs::read("cover.png")?);
//!     let comic = ingestor.create_comic(&fields, Some(cover), user).await?;
//!
//!     fields.insert("chapterNumber".to_string(), "1".to_string());
//!     let pages = vec![
//!         PageFile::new("01.jpg", "image/jpeg", std::fs::read("01.jpg")?),
//!         PageFile::new("02.jpg", "image/jpeg", std::fs::read("02.jpg")?),
//!     ];
//!     let chapter = ingestor.ingest_chapter(&fields, pages, comic.id, user).await?;
//!     println!("{:#?}", chapter.pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `comic-ingest` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! comic-ingest = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod catalog;
pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod remote;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use catalog::DEFAULT_LATEST_LIMIT;
pub use config::{CloudinaryConfig, IngestConfig, IngestConfigBuilder};
pub use error::{
    CommitError, IngestError, PageError, StoreError, TransformError, UploadError, ValidationError,
};
pub use ingest::Ingestor;
pub use model::{
    Chapter, ChapterId, Comic, ComicDetail, ComicId, DeleteOutcome, FormFields, PageFile, Stats,
    UploadedImage, UserId,
};
pub use progress::{IngestProgressCallback, NoopProgressCallback, ProgressCallback};
pub use remote::{CloudinaryStore, LocalStore, RemoteStore, UploadOptions};
pub use store::{DocumentStore, JsonFileStore, MemoryStore};
