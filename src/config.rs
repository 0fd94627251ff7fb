//! Configuration types for chapter ingestion.
//!
//! All pipeline behaviour is controlled through [`IngestConfig`], built via
//! its [`IngestConfigBuilder`] or loaded from the process environment with
//! [`IngestConfig::from_env`]. Credentials for the remote image store live in
//! their own struct ([`CloudinaryConfig`]) and are handed to the store's
//! constructor, so two tests can run against two differently configured
//! stores in the same process.

use crate::error::IngestError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Default per-file size cap in MiB (`MAX_UPLOAD_MB`).
pub const DEFAULT_MAX_UPLOAD_MB: usize = 10;
/// Default maximum number of pages in one job (`MAX_PAGES`).
pub const DEFAULT_MAX_PAGES: usize = 100;
/// Default worker count (`PAGE_PROCESS_CONCURRENCY`).
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Configuration for an ingestion job.
///
/// # Example
/// ```rust
/// use comic_ingest::IngestConfig;
///
/// let config = IngestConfig::builder()
///     .concurrency(4)
///     .max_pages(250)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    /// Per-file size cap in MiB. Default: 10.
    pub max_upload_mb: usize,

    /// Maximum number of files accepted in one chapter job. Default: 100.
    pub max_pages: usize,

    /// Number of concurrent transform+upload workers. Default: 3.
    ///
    /// Each in-flight worker holds one decoded image and one open upload, so
    /// this bounds peak memory and connection count as much as it bounds
    /// latency.
    pub concurrency: usize,

    /// Maximum output width in pixels. Wider images are downscaled, narrower
    /// ones are left as they are. Default: 1600.
    pub max_width: u32,

    /// JPEG quality for interior pages (1–100). Default: 80.
    pub page_quality: u8,

    /// JPEG quality for covers (1–100). Default: 75.
    pub cover_quality: u8,

    /// Remote folder for chapter pages. Default: `comic_pages`.
    pub page_folder: String,

    /// Remote folder for cover images. Default: `comic_thumbnails`.
    pub cover_folder: String,

    /// Delivery format requested from the remote store. Default: `webp`.
    pub remote_format: String,

    /// Remote quality hint for pages. Default: `auto:good`.
    pub page_remote_quality: String,

    /// Remote quality hint for covers. Default: `auto:eco`.
    pub cover_remote_quality: String,

    /// Per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            max_pages: DEFAULT_MAX_PAGES,
            concurrency: DEFAULT_CONCURRENCY,
            max_width: 1600,
            page_quality: 80,
            cover_quality: 75,
            page_folder: "comic_pages".to_string(),
            cover_folder: "comic_thumbnails".to_string(),
            remote_format: "webp".to_string(),
            page_remote_quality: "auto:good".to_string(),
            cover_remote_quality: "auto:eco".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("max_upload_mb", &self.max_upload_mb)
            .field("max_pages", &self.max_pages)
            .field("concurrency", &self.concurrency)
            .field("max_width", &self.max_width)
            .field("page_quality", &self.page_quality)
            .field("cover_quality", &self.cover_quality)
            .field("page_folder", &self.page_folder)
            .field("cover_folder", &self.cover_folder)
            .field("remote_format", &self.remote_format)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn IngestProgressCallback>"),
            )
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load the limits from `MAX_UPLOAD_MB`, `MAX_PAGES` and
    /// `PAGE_PROCESS_CONCURRENCY`, falling back to the defaults for unset
    /// variables.
    pub fn from_env() -> Result<Self, IngestError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`IngestConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IngestError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();
        if let Some(mb) = parse_var(&lookup, "MAX_UPLOAD_MB")? {
            builder = builder.max_upload_mb(mb);
        }
        if let Some(n) = parse_var(&lookup, "MAX_PAGES")? {
            builder = builder.max_pages(n);
        }
        if let Some(n) = parse_var(&lookup, "PAGE_PROCESS_CONCURRENCY")? {
            builder = builder.concurrency(n);
        }
        builder.build()
    }

    /// Per-file size cap in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

fn parse_var<F>(lookup: &F, key: &str) -> Result<Option<usize>, IngestError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse::<usize>().map(Some).map_err(|_| {
            IngestError::InvalidConfig(format!("{key} must be a non-negative integer, got '{raw}'"))
        }),
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn max_upload_mb(mut self, mb: usize) -> Self {
        self.config.max_upload_mb = mb;
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_width(mut self, px: u32) -> Self {
        self.config.max_width = px;
        self
    }

    pub fn page_quality(mut self, q: u8) -> Self {
        self.config.page_quality = q.clamp(1, 100);
        self
    }

    pub fn cover_quality(mut self, q: u8) -> Self {
        self.config.cover_quality = q.clamp(1, 100);
        self
    }

    pub fn page_folder(mut self, folder: impl Into<String>) -> Self {
        self.config.page_folder = folder.into();
        self
    }

    pub fn cover_folder(mut self, folder: impl Into<String>) -> Self {
        self.config.cover_folder = folder.into();
        self
    }

    pub fn remote_format(mut self, format: impl Into<String>) -> Self {
        self.config.remote_format = format.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let c = &self.config;
        if c.max_upload_mb == 0 {
            return Err(IngestError::InvalidConfig("MAX_UPLOAD_MB must be ≥ 1".into()));
        }
        if c.max_pages == 0 {
            return Err(IngestError::InvalidConfig("MAX_PAGES must be ≥ 1".into()));
        }
        if c.max_width < 16 {
            return Err(IngestError::InvalidConfig(format!(
                "max width must be ≥ 16 px, got {}",
                c.max_width
            )));
        }
        if c.page_folder.trim().is_empty() || c.cover_folder.trim().is_empty() {
            return Err(IngestError::InvalidConfig("remote folders must not be empty".into()));
        }
        Ok(self.config)
    }
}

/// Credentials and endpoint for [`crate::remote::CloudinaryStore`].
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// API root, overridable for tests and proxies. Default: `https://api.cloudinary.com`.
    pub api_base: String,
    /// Whole-request timeout for a single upload or destroy call. Default: 60.
    pub timeout_secs: u64,
}

impl fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl CloudinaryConfig {
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            api_base: "https://api.cloudinary.com".to_string(),
            timeout_secs: 60,
        }
    }

    /// Read `CLOUDINARY_CLOUD_NAME`, `CLOUDINARY_API_KEY`,
    /// `CLOUDINARY_API_SECRET` and optionally `UPLOAD_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, IngestError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, IngestError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| IngestError::InvalidConfig(format!("{key} is not set")))
        };
        let mut config = Self::new(
            required("CLOUDINARY_CLOUD_NAME")?,
            required("CLOUDINARY_API_KEY")?,
            required("CLOUDINARY_API_SECRET")?,
        );
        if let Some(secs) = parse_var(&lookup, "UPLOAD_TIMEOUT_SECS")? {
            config.timeout_secs = secs as u64;
        }
        Ok(config)
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}
