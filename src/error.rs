//! Error types for the comic-ingest library.
//!
//! Failures are layered by stage, and each stage owns one enum:
//!
//! * [`ValidationError`] : bad or missing input. The user corrects the form
//!   and resubmits; nothing was touched.
//! * [`TransformError`] / [`UploadError`] : a single transform or upload call
//!   failed. Inside a chapter job these are recorded as a [`PageError`]
//!   and escalated to [`IngestError::Ingestion`].
//! * [`CommitError`] : every page was stored but the chapter could not be
//!   persisted. The uploaded objects are orphaned (see `DESIGN.md`).
//! * [`StoreError`] : the document store itself failed.
//!
//! [`IngestError`] is the single fatal type returned by the
//! [`crate::ingest::Ingestor`] facade. Its `Display` output is meant to be
//! shown to an end user as-is.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// All fatal errors returned by the ingestion and catalog operations.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Intake ────────────────────────────────────────────────────────────
    /// The submitted form or files were rejected before any work started.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // ── Pool ──────────────────────────────────────────────────────────────
    /// At least one page failed to transform or upload; no chapter was created.
    #[error(
        "{failed}/{total} pages could not be processed; no chapter was created.\n\
         First error: {first_error}"
    )]
    Ingestion {
        failed: usize,
        total: usize,
        first_error: PageError,
    },

    /// The cover image could not be decoded or re-encoded.
    #[error("Cover image rejected: {0}")]
    Transform(#[from] TransformError),

    /// The cover image could not be stored remotely.
    #[error("Cover upload failed: {0}")]
    Upload(#[from] UploadError),

    // ── Commit ────────────────────────────────────────────────────────────
    /// Pages were stored but the chapter could not be persisted.
    #[error(transparent)]
    Commit(#[from] CommitError),

    // ── Catalog ───────────────────────────────────────────────────────────
    /// A comic or chapter referenced by id does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    /// The acting user does not own the comic.
    #[error("You are not allowed to {action}.")]
    Forbidden { action: &'static str },

    /// The document store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Rejected form input or attachments.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required text field is absent or blank.
    #[error("The '{0}' field is required.")]
    MissingField(&'static str),

    /// No page images were attached.
    #[error("Please attach at least one page image.")]
    NoFiles,

    /// A cover image is required to create a comic.
    #[error("A cover image is required.")]
    MissingCover,

    /// Declared media type is not an image type.
    #[error("File {index} ('{file_name}') has type '{media_type}'. Only image files are allowed.")]
    UnsupportedMediaType {
        index: usize,
        file_name: String,
        media_type: String,
    },

    /// A file exceeds the per-file size cap.
    #[error("File {index} ('{file_name}') is {size} bytes; the limit is {limit} bytes.")]
    FileTooLarge {
        index: usize,
        file_name: String,
        size: usize,
        limit: usize,
    },

    /// More files than one job may carry.
    #[error("Too many files uploaded in a single request ({count}, limit {limit}).")]
    TooManyFiles { count: usize, limit: usize },

    /// A numeric field could not be parsed.
    #[error("'{value}' is not a valid {field}.")]
    InvalidNumber { field: &'static str, value: String },

    /// A date field could not be parsed.
    #[error("Invalid release date '{0}'. Use YYYY-MM-DD or an RFC 3339 timestamp.")]
    InvalidDate(String),
}

/// A raw buffer could not be normalised.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The bytes are not a decodable image.
    #[error("not a decodable image: {0}")]
    Decode(String),

    /// Re-encoding the normalised image failed.
    #[error("re-encoding failed: {0}")]
    Encode(String),

    /// The blocking transform task panicked or was cancelled.
    #[error("transform task failed: {0}")]
    Task(String),
}

/// A single remote store call failed.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The request never produced a response (connect, TLS, timeout).
    #[error("request to {store} failed: {detail}")]
    Request { store: String, detail: String },

    /// The remote store answered with a non-success status.
    #[error("{store} returned HTTP {status}: {body}")]
    Status {
        store: String,
        status: u16,
        body: String,
    },

    /// The store accepted the upload but returned no retrieval URL.
    #[error("{store} did not return a URL for the uploaded image")]
    MissingUrl { store: String },

    /// The URL does not belong to this store, so no object can be addressed.
    #[error("'{url}' is not an object of {store}")]
    ForeignUrl { store: String, url: String },

    /// Local filesystem failure.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A non-fatal error for a single page, escalated to a job failure by the pool.
///
/// `page` is the 1-indexed position in the upload request.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PageError {
    /// The page could not be decoded or re-encoded.
    #[error("Page {page} ('{file_name}'): {detail}")]
    TransformFailed {
        page: usize,
        file_name: String,
        detail: String,
    },

    /// The remote store rejected or lost the upload.
    #[error("Page {page} ('{file_name}'): upload failed: {detail}")]
    UploadFailed {
        page: usize,
        file_name: String,
        detail: String,
    },
}

impl PageError {
    /// 1-indexed page number this error refers to.
    pub fn page(&self) -> usize {
        match self {
            PageError::TransformFailed { page, .. } | PageError::UploadFailed { page, .. } => *page,
        }
    }
}

/// Persisting the chapter failed after every page was uploaded.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The parent comic does not exist. `orphaned` lists the page URLs that
    /// were uploaded for this job and are now unreferenced.
    #[error("Comic not found: {comic_id}")]
    ComicNotFound { comic_id: Uuid, orphaned: Vec<String> },

    /// The document store refused the write.
    #[error("Failed to save chapter: {0}")]
    Store(#[from] StoreError),
}

/// Document store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store file '{path}' is not valid JSON: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingestion_display_names_counts_and_first_error() {
        let e = IngestError::Ingestion {
            failed: 1,
            total: 2,
            first_error: PageError::TransformFailed {
                page: 2,
                file_name: "B.corrupt".into(),
                detail: "not a decodable image: unknown format".into(),
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("1/2"), "got: {msg}");
        assert!(msg.contains("B.corrupt"), "got: {msg}");
        assert!(msg.contains("no chapter was created"), "got: {msg}");
    }

    #[test]
    fn validation_is_transparent() {
        let e: IngestError = ValidationError::MissingField("title").into();
        assert_eq!(e.to_string(), "The 'title' field is required.");
    }

    #[test]
    fn commit_error_keeps_orphans() {
        let id = Uuid::new_v4();
        let e = CommitError::ComicNotFound {
            comic_id: id,
            orphaned: vec!["https://cdn/a.webp".into()],
        };
        assert!(e.to_string().contains(&id.to_string()));
        match e {
            CommitError::ComicNotFound { orphaned, .. } => assert_eq!(orphaned.len(), 1),
            _ => unreachable!(),
        }
    }

    #[test]
    fn page_error_reports_page_number() {
        let e = PageError::UploadFailed {
            page: 7,
            file_name: "07.png".into(),
            detail: "HTTP 500".into(),
        };
        assert_eq!(e.page(), 7);
        assert!(e.to_string().starts_with("Page 7"));
    }

    #[test]
    fn forbidden_display() {
        let e = IngestError::Forbidden {
            action: "delete this chapter",
        };
        assert_eq!(e.to_string(), "You are not allowed to delete this chapter.");
    }
}
