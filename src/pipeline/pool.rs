//! Bounded-concurrency worker pool: transform and upload every page of a job.
//!
//! ## Shape
//!
//! ```text
//!              ┌──────────── worker 1 ─┐
//! queue (FIFO) ┼──────────── worker 2 ─┼──▶ slots[index] = Some(image)
//! (index,file) └──────────── worker C ─┘
//! ```
//!
//! `C` workers are polled together on the caller's task. Each one pops the
//! next `(index, file)` pair, transforms it, uploads it and writes the result
//! into the pre-sized slot at `index`. Results are never appended, so the
//! output order is the request order no matter which worker finishes first.
//! The queue lock is held only for the pop; slots are written under their own
//! lock once the upload has returned.
//!
//! ## Failure
//!
//! The first page to fail is recorded and the pool stops handing out work.
//! Pages already in flight run to completion and their results are thrown
//! away. Objects that made it to the remote store are not deleted; the
//! caller gets [`IngestError::Ingestion`] and no chapter is written.

use crate::config::IngestConfig;
use crate::error::{IngestError, PageError};
use crate::model::{ComicId, PageFile, UploadedImage};
use crate::pipeline::transform::{transform, ImageRole};
use crate::pipeline::upload::{page_options, upload_image};
use crate::remote::RemoteStore;
use futures::future::join_all;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Shared state of one job. Nothing here outlives the call to [`run_pool`].
struct Job<'a> {
    queue: Mutex<VecDeque<(usize, PageFile)>>,
    slots: Mutex<Vec<Option<UploadedImage>>>,
    failures: Mutex<Vec<PageError>>,
    halted: AtomicBool,
    total: usize,
    comic: ComicId,
    remote: &'a Arc<dyn RemoteStore>,
    config: &'a IngestConfig,
}

/// Transform and upload `files` with at most `config.concurrency` pages in
/// flight. On success the returned images are index-aligned with `files`.
pub async fn run_pool(
    files: Vec<PageFile>,
    comic: ComicId,
    remote: &Arc<dyn RemoteStore>,
    config: &IngestConfig,
) -> Result<Vec<UploadedImage>, IngestError> {
    let start = Instant::now();
    let total = files.len();
    let workers = config.concurrency.max(1).min(total.max(1));
    info!(
        "Processing {} pages with {} workers via {}",
        total,
        workers,
        remote.name()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_job_start(total);
    }

    let job = Job {
        queue: Mutex::new(files.into_iter().enumerate().collect()),
        slots: Mutex::new(vec![None; total]),
        failures: Mutex::new(Vec::new()),
        halted: AtomicBool::new(false),
        total,
        comic,
        remote,
        config,
    };

    join_all((0..workers).map(|id| worker(id, &job))).await;

    let failures = job.failures.into_inner();
    let slots = job.slots.into_inner();
    let stored = slots.iter().filter(|s| s.is_some()).count();

    if let Some(ref cb) = config.progress_callback {
        cb.on_job_complete(total, stored);
    }

    if let Some(first_error) = failures.first().cloned() {
        if stored > 0 {
            warn!(
                "{} already-uploaded pages are left orphaned in {}",
                stored,
                remote.name()
            );
        }
        return Err(IngestError::Ingestion {
            failed: failures.len(),
            total,
            first_error,
        });
    }

    let images: Option<Vec<UploadedImage>> = slots.into_iter().collect();
    let images = images.ok_or_else(|| {
        IngestError::Internal("worker pool drained with unfilled page slots".to_string())
    })?;
    info!(
        "Stored {} pages in {}ms",
        images.len(),
        start.elapsed().as_millis()
    );
    Ok(images)
}

async fn worker(id: usize, job: &Job<'_>) {
    loop {
        if job.halted.load(Ordering::SeqCst) {
            debug!("Worker {} stopping: job already failed", id);
            return;
        }
        let Some((index, file)) = job.queue.lock().await.pop_front() else {
            return;
        };

        let page_num = index + 1;
        if let Some(ref cb) = job.config.progress_callback {
            cb.on_page_start(page_num, job.total);
        }

        match process_page(index, file, job).await {
            Ok(image) => {
                if let Some(ref cb) = job.config.progress_callback {
                    cb.on_page_complete(page_num, job.total, &image.url);
                }
                job.slots.lock().await[index] = Some(image);
            }
            Err(e) => {
                warn!("Worker {}: {}", id, e);
                if let Some(ref cb) = job.config.progress_callback {
                    cb.on_page_error(page_num, job.total, &e.to_string());
                }
                job.halted.store(true, Ordering::SeqCst);
                job.failures.lock().await.push(e);
            }
        }
    }
}

async fn process_page(
    index: usize,
    file: PageFile,
    job: &Job<'_>,
) -> Result<UploadedImage, PageError> {
    let page = index + 1;
    let PageFile {
        file_name, bytes, ..
    } = file;

    let normalised = transform(bytes, ImageRole::Page, job.config)
        .await
        .map_err(|e| PageError::TransformFailed {
            page,
            file_name: file_name.clone(),
            detail: e.to_string(),
        })?;

    let options = page_options(job.comic, index, job.config);
    upload_image(job.remote, normalised, &options)
        .await
        .map_err(|e| PageError::UploadFailed {
            page,
            file_name,
            detail: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UploadError;
    use crate::remote::UploadOptions;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use uuid::Uuid;

    /// Records peak concurrency; sleeps longer for narrower images so later
    /// pages (which are wider) finish first.
    #[derive(Default)]
    struct SlowStore {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        fail_width: Option<u32>,
    }

    #[async_trait]
    impl RemoteStore for SlowStore {
        fn name(&self) -> &str {
            "slow"
        }

        async fn upload(
            &self,
            bytes: Vec<u8>,
            options: &UploadOptions,
        ) -> Result<UploadedImage, UploadError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);

            let width = image::load_from_memory(&bytes).unwrap().width();
            let delay = 200u64.saturating_sub(width as u64 * 10);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if Some(width) == self.fail_width {
                return Err(UploadError::Status {
                    store: "slow".into(),
                    status: 500,
                    body: "boom".into(),
                });
            }
            Ok(UploadedImage {
                url: format!("mem://{}/w{}", options.folder, width),
                public_id: options.public_id.clone(),
                bytes: bytes.len(),
            })
        }

        async fn delete(&self, _url: &str) -> Result<(), UploadError> {
            Ok(())
        }
    }

    fn page(width: u32) -> PageFile {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, 4, Rgb([10, 20, 30])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        PageFile::new(format!("{width}.png"), "image/png", buf)
    }

    fn config(concurrency: usize) -> IngestConfig {
        IngestConfig::builder().concurrency(concurrency).build().unwrap()
    }

    #[tokio::test]
    async fn output_follows_input_order_not_completion_order() {
        let store: Arc<dyn RemoteStore> = Arc::new(SlowStore::default());
        let files = (1..=6).map(page).collect();
        let images = run_pool(files, Uuid::new_v4(), &store, &config(3)).await.unwrap();
        let urls: Vec<_> = images.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "mem://comic_pages/w1",
                "mem://comic_pages/w2",
                "mem://comic_pages/w3",
                "mem://comic_pages/w4",
                "mem://comic_pages/w5",
                "mem://comic_pages/w6"
            ]
        );
    }

    #[tokio::test]
    async fn never_exceeds_configured_concurrency() {
        let slow = Arc::new(SlowStore::default());
        let store: Arc<dyn RemoteStore> = slow.clone();
        let files = (1..=10).map(page).collect();
        run_pool(files, Uuid::new_v4(), &store, &config(3)).await.unwrap();
        assert!(slow.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(slow.calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn single_worker_is_sequential() {
        let slow = Arc::new(SlowStore::default());
        let store: Arc<dyn RemoteStore> = slow.clone();
        run_pool((1..=4).map(page).collect(), Uuid::new_v4(), &store, &config(1))
            .await
            .unwrap();
        assert_eq!(slow.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn corrupt_page_fails_the_job() {
        let store: Arc<dyn RemoteStore> = Arc::new(SlowStore::default());
        let files = vec![page(3), PageFile::new("B.corrupt", "image/png", b"garbage".to_vec())];
        let err = run_pool(files, Uuid::new_v4(), &store, &config(3)).await.unwrap_err();
        match err {
            IngestError::Ingestion {
                failed,
                total,
                first_error,
            } => {
                assert_eq!((failed, total), (1, 2));
                assert!(matches!(first_error, PageError::TransformFailed { page: 2, .. }));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn upload_failure_stops_handing_out_work() {
        let slow = Arc::new(SlowStore {
            fail_width: Some(1),
            ..Default::default()
        });
        let store: Arc<dyn RemoteStore> = slow.clone();
        let files = (1..=12).map(page).collect();
        let err = run_pool(files, Uuid::new_v4(), &store, &config(2)).await.unwrap_err();
        assert!(matches!(
            err,
            IngestError::Ingestion {
                first_error: PageError::UploadFailed { page: 1, .. },
                ..
            }
        ));
        assert!(slow.calls.load(Ordering::SeqCst) < 12);
    }
}
