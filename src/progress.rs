//! Progress-callback trait for per-page ingestion events.
//!
//! Inject an [`Arc<dyn IngestProgressCallback>`] via
//! [`crate::config::IngestConfigBuilder::progress_callback`] to receive
//! events as the worker pool moves through a chapter's pages. The CLI uses it
//! to drive a terminal progress bar; a web handler could forward events to a
//! websocket.
//!
//! # Example
//!
//! ```rust
//! use comic_ingest::{IngestConfig, IngestProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl IngestProgressCallback for Counter {
//!     fn on_page_complete(&self, _page: usize, _total: usize, _url: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = IngestConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the worker pool as it processes each page.
///
/// Page numbers are 1-indexed positions in the upload request. With more
/// than one worker, `on_page_start`, `on_page_complete` and `on_page_error`
/// interleave in completion order, not page order. All methods default to
/// no-ops.
pub trait IngestProgressCallback: Send + Sync {
    /// Called once, after validation, before any page is transformed.
    fn on_job_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when a worker picks a page off the queue.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page has been transformed and stored.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, url: &str) {
        let _ = (page_num, total_pages, url);
    }

    /// Called when a page fails to transform or upload.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after the pool has drained.
    ///
    /// `success_count < total_pages` means the job failed and no chapter
    /// will be committed.
    fn on_job_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl IngestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::IngestConfig`].
pub type ProgressCallback = Arc<dyn IngestProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        urls: Mutex<Vec<String>>,
    }

    impl IngestProgressCallback for TrackingCallback {
        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, url: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().unwrap().push(url.to_string());
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_job_start(2);
        cb.on_page_start(1, 2);
        cb.on_page_complete(1, 2, "https://cdn/1.webp");
        cb.on_page_error(2, 2, "not a decodable image");
        cb.on_job_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_page_start(1, 2);
        tracker.on_page_complete(1, 2, "u1");
        tracker.on_page_start(2, 2);
        tracker.on_page_error(2, 2, "HTTP 500");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(*tracker.urls.lock().unwrap(), vec!["u1".to_string()]);
    }

    #[test]
    fn callback_is_send_sync_behind_arc() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProgressCallback>();
    }
}
