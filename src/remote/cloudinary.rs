//! Cloudinary-compatible [`RemoteStore`] over signed HTTP uploads.
//!
//! Requests are authenticated with a signature: every signed parameter is
//! sorted by name, joined as `k=v&k=v`, suffixed with the API secret and
//! hashed with SHA-256. The account must be set to SHA-256 signatures.
//! `file`, `api_key` and `signature` itself are never signed.
//!
//! The only timeout on the upload path is the one configured on the HTTP
//! client here.

use super::{RemoteStore, UploadOptions};
use crate::config::CloudinaryConfig;
use crate::error::{IngestError, UploadError};
use crate::model::UploadedImage;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, warn};

const STORE_NAME: &str = "cloudinary";

pub struct CloudinaryStore {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
    public_id: Option<String>,
    bytes: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IngestError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/v1_1/{}/image/{}",
            self.config.api_base, self.config.cloud_name, action
        )
    }

    /// Signed parameters for an upload, already sorted by name.
    fn upload_params(options: &UploadOptions, timestamp: i64) -> Vec<(&'static str, String)> {
        vec![
            ("folder", options.folder.clone()),
            ("format", options.format.clone()),
            ("overwrite", "false".to_string()),
            ("public_id", options.public_id.clone()),
            ("timestamp", timestamp.to_string()),
            ("transformation", format!("q_{}", options.quality)),
        ]
    }

    async fn send(&self, action: &str, form: Form) -> Result<reqwest::Response, UploadError> {
        let response = self
            .client
            .post(self.endpoint(action))
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Request {
                store: STORE_NAME.to_string(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let raw = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ErrorBody>(&raw)
            .map(|b| b.error.message)
            .unwrap_or(raw);
        Err(UploadError::Status {
            store: STORE_NAME.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    fn signed_form(&self, params: &[(&'static str, String)]) -> Form {
        let signature = sign(params, &self.config.api_secret);
        params
            .iter()
            .fold(Form::new(), |form, (k, v)| form.text(*k, v.clone()))
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature)
    }
}

#[async_trait]
impl RemoteStore for CloudinaryStore {
    fn name(&self) -> &str {
        STORE_NAME
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<UploadedImage, UploadError> {
        let size = bytes.len();
        let params = Self::upload_params(options, chrono::Utc::now().timestamp());
        let file = Part::bytes(bytes)
            .file_name(format!("{}.jpg", options.public_id))
            .mime_str("image/jpeg")
            .map_err(|e| UploadError::Request {
                store: STORE_NAME.to_string(),
                detail: e.to_string(),
            })?;
        let form = self.signed_form(&params).part("file", file);

        let parsed: UploadResponse = self
            .send("upload", form)
            .await?
            .json()
            .await
            .map_err(|e| UploadError::Request {
                store: STORE_NAME.to_string(),
                detail: format!("unreadable response: {e}"),
            })?;

        let url = parsed
            .secure_url
            .or(parsed.url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| UploadError::MissingUrl {
                store: STORE_NAME.to_string(),
            })?;
        debug!("Uploaded {} → {}", options.public_id, url);

        Ok(UploadedImage {
            url,
            public_id: parsed
                .public_id
                .unwrap_or_else(|| format!("{}/{}", options.folder, options.public_id)),
            bytes: parsed.bytes.unwrap_or(size),
        })
    }

    async fn delete(&self, url: &str) -> Result<(), UploadError> {
        let public_id = public_id_from_url(url).ok_or_else(|| UploadError::ForeignUrl {
            store: STORE_NAME.to_string(),
            url: url.to_string(),
        })?;
        let params = vec![
            ("public_id", public_id.clone()),
            ("timestamp", chrono::Utc::now().timestamp().to_string()),
        ];
        let parsed: DestroyResponse = self
            .send("destroy", self.signed_form(&params))
            .await?
            .json()
            .await
            .map_err(|e| UploadError::Request {
                store: STORE_NAME.to_string(),
                detail: format!("unreadable response: {e}"),
            })?;

        if parsed.result != "ok" {
            warn!("Destroy of {} answered '{}'", public_id, parsed.result);
            return Err(UploadError::Status {
                store: STORE_NAME.to_string(),
                status: 200,
                body: parsed.result,
            });
        }
        Ok(())
    }
}

/// Hex SHA-256 of the sorted `k=v&k=v` string followed by the secret.
pub(crate) fn sign(params: &[(&str, String)], secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Recover the public id from a delivery URL such as
/// `https://res.cloudinary.com/demo/image/upload/v1712/comic_pages/p_3.webp`
/// → `comic_pages/p_3`. Transformation segments before the version are
/// skipped.
pub(crate) fn public_id_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.collect();
    let upload = segments.iter().position(|s| *s == "upload")?;
    let rest = &segments[upload + 1..];

    let start = rest
        .iter()
        .position(|s| is_version(s))
        .map(|v| v + 1)
        .unwrap_or(0);
    let key = &rest[start..];
    let (last, dirs) = key.split_last()?;
    let last: &str = last;
    let stem = last.rsplit_once('.').map(|(s, _)| s).unwrap_or(last);
    if stem.is_empty() {
        return None;
    }

    let mut parts: Vec<&str> = dirs.to_vec();
    parts.push(stem);
    Some(parts.join("/"))
}

fn is_version(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_order_independent_and_secret_bound() {
        let a = sign(
            &[("timestamp", "1315060510".into()), ("public_id", "sample".into())],
            "abcd",
        );
        let b = sign(
            &[("public_id", "sample".into()), ("timestamp", "1315060510".into())],
            "abcd",
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(
            a,
            sign(&[("public_id", "sample".into()), ("timestamp", "1315060510".into())], "other")
        );
    }

    #[test]
    fn signature_matches_manual_digest() {
        let mut hasher = Sha256::new();
        hasher.update(b"public_id=sample&timestamp=1315060510abcd");
        let expected = hex::encode(hasher.finalize());
        let got = sign(
            &[("timestamp", "1315060510".into()), ("public_id", "sample".into())],
            "abcd",
        );
        assert_eq!(got, expected);
    }

    #[test]
    fn upload_params_are_sorted() {
        let opts = UploadOptions {
            folder: "comic_pages".into(),
            public_id: "p_0".into(),
            format: "webp".into(),
            quality: "auto:good".into(),
        };
        let params = CloudinaryStore::upload_params(&opts, 42);
        let names: Vec<_> = params.iter().map(|(k, _)| *k).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(params.contains(&("transformation", "q_auto:good".to_string())));
    }

    #[test]
    fn public_id_is_recovered_from_delivery_urls() {
        const BASE: &str = "https://res.cloudinary.com/demo/image/upload";
        assert_eq!(
            public_id_from_url(&format!("{BASE}/v1712/comic_pages/p_3.webp")).as_deref(),
            Some("comic_pages/p_3")
        );
        assert_eq!(
            public_id_from_url(&format!("{BASE}/c_fill,w_200/v99/comic_thumbnails/cover_x.jpg"))
                .as_deref(),
            Some("comic_thumbnails/cover_x")
        );
        assert_eq!(
            public_id_from_url("https://res.cloudinary.com/demo/image/upload/plain.png").as_deref(),
            Some("plain")
        );
        assert_eq!(public_id_from_url("https://example.com/some/file.png"), None);
        assert_eq!(public_id_from_url("not a url"), None);
    }

    #[test]
    fn endpoint_uses_configured_base() {
        let store = CloudinaryStore::new(
            CloudinaryConfig::new("demo", "key", "secret").api_base("http://127.0.0.1:9/"),
        )
        .unwrap();
        assert_eq!(store.endpoint("upload"), "http://127.0.0.1:9/v1_1/demo/image/upload");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_request_error() {
        let store = CloudinaryStore::new(
            CloudinaryConfig::new("demo", "key", "secret")
                .api_base("http://127.0.0.1:9")
                .timeout_secs(2),
        )
        .unwrap();
        let opts = UploadOptions {
            folder: "comic_pages".into(),
            public_id: "p_0".into(),
            format: "webp".into(),
            quality: "auto:good".into(),
        };
        let err = store.upload(vec![0xFF, 0xD8], &opts).await.unwrap_err();
        assert!(matches!(err, UploadError::Request { .. }), "{err:?}");
    }
}
