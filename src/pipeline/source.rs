//! Source resolution: classify a photo-reference cell and fetch its bytes.
//!
//! A cell can carry three kinds of reference, and sheets mix them freely:
//!
//! 1. a mounted-drive local path (`/content/drive/...` by default)
//! 2. a Google Drive sharing link: the `open?id=<ID>` query form, the
//!    `/file/d/<ID>/` path form, or the `uc?export=download&id=<ID>`
//!    direct-download form
//! 3. a plain `http(s)://` URL
//!
//! The Drive check runs before the generic URL branch — Drive links are
//! URLs too, and fetching one with a plain GET returns an HTML viewer page
//! instead of the photo. Anything unrecognised is a malformed reference.
//!
//! Every failure here is a [`RowError`]: the resolver never panics and
//! never aborts the run.

use crate::config::GradingConfig;
use crate::error::{GradeError, RowError};
use crate::storage::FileStore;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

// Anchored on the Drive URL shapes, not on a bare `id` parameter — plenty
// of non-Drive photo URLs carry an `id` query too.
static DRIVE_OPEN_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"open\?id=([A-Za-z0-9_-]+)").expect("static regex"));
static DRIVE_PATH_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/file/d/([A-Za-z0-9_-]+)").expect("static regex"));
static DRIVE_UC_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/uc\?(?:[^#\s]*&)?id=([A-Za-z0-9_-]+)").expect("static regex"));

/// One classified photo reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoReference {
    /// A Google Drive file id extracted from a sharing link.
    DriveFile(String),
    /// A plain downloadable URL.
    Url(String),
    /// A path under the configured local prefix.
    LocalPath(PathBuf),
}

/// Classify one cell's text. `local_prefix` marks filesystem references.
///
/// Leading and trailing whitespace is ignored; cells pasted from chat or
/// mail clients often carry it.
pub fn classify_reference(reference: &str, local_prefix: &str) -> Result<PhotoReference, RowError> {
    let reference = reference.trim();

    if reference.starts_with(local_prefix) {
        return Ok(PhotoReference::LocalPath(PathBuf::from(reference)));
    }
    if let Some(caps) = DRIVE_OPEN_ID
        .captures(reference)
        .or_else(|| DRIVE_PATH_ID.captures(reference))
        .or_else(|| DRIVE_UC_ID.captures(reference))
    {
        return Ok(PhotoReference::DriveFile(caps[1].to_string()));
    }
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return Ok(PhotoReference::Url(reference.to_string()));
    }

    Err(RowError::SourceUnreachable {
        reference: reference.to_string(),
        detail: "not a local path, Drive link, or URL".to_string(),
    })
}

/// Fetches raw photo bytes for classified references.
pub struct SourceResolver {
    http: reqwest::Client,
    store: Arc<dyn FileStore>,
    local_prefix: String,
    allow_local: bool,
    http_timeout_secs: u64,
}

impl SourceResolver {
    /// Build a resolver sharing one HTTP client across all rows.
    pub fn new(store: Arc<dyn FileStore>, config: &GradingConfig) -> Result<Self, GradeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| GradeError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            store,
            local_prefix: config.local_prefix.clone(),
            allow_local: config.allow_local_paths,
            http_timeout_secs: config.http_timeout_secs,
        })
    }

    /// Fetch the raw bytes behind one photo-reference cell.
    pub async fn fetch(&self, reference: &str) -> Result<Vec<u8>, RowError> {
        match classify_reference(reference, &self.local_prefix)? {
            PhotoReference::LocalPath(path) => {
                if !self.allow_local {
                    return Err(RowError::SourceUnreachable {
                        reference: reference.to_string(),
                        detail: "local paths are disabled for this run".to_string(),
                    });
                }
                let bytes =
                    tokio::fs::read(&path)
                        .await
                        .map_err(|e| RowError::SourceUnreachable {
                            reference: reference.to_string(),
                            detail: e.to_string(),
                        })?;
                debug!("read {} bytes from {}", bytes.len(), path.display());
                Ok(bytes)
            }
            PhotoReference::DriveFile(file_id) => {
                let bytes = self.store.download(&file_id).await?;
                debug!("downloaded {} bytes for drive file {}", bytes.len(), file_id);
                Ok(bytes)
            }
            PhotoReference::Url(url) => {
                let response = self.http.get(&url).send().await.map_err(|e| {
                    let detail = if e.is_timeout() {
                        format!("timed out after {}s", self.http_timeout_secs)
                    } else {
                        e.to_string()
                    };
                    RowError::SourceUnreachable {
                        reference: reference.to_string(),
                        detail,
                    }
                })?;
                if !response.status().is_success() {
                    return Err(RowError::SourceUnreachable {
                        reference: reference.to_string(),
                        detail: format!("HTTP {}", response.status()),
                    });
                }
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| RowError::SourceUnreachable {
                        reference: reference.to_string(),
                        detail: e.to_string(),
                    })?;
                debug!("downloaded {} bytes from {}", bytes.len(), url);
                Ok(bytes.to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    const PREFIX: &str = "/content/drive/";

    #[test]
    fn local_prefix_wins() {
        let got = classify_reference("/content/drive/MyDrive/nails.jpg", PREFIX).unwrap();
        assert_eq!(
            got,
            PhotoReference::LocalPath(PathBuf::from("/content/drive/MyDrive/nails.jpg"))
        );
    }

    #[test]
    fn drive_query_form() {
        let got = classify_reference(
            "https://drive.google.com/open?id=1AbC_d-EfG",
            PREFIX,
        )
        .unwrap();
        assert_eq!(got, PhotoReference::DriveFile("1AbC_d-EfG".to_string()));
    }

    #[test]
    fn drive_path_form_stops_at_slash() {
        let got = classify_reference(
            "https://drive.google.com/file/d/FILE123/view?usp=sharing",
            PREFIX,
        )
        .unwrap();
        assert_eq!(got, PhotoReference::DriveFile("FILE123".to_string()));
    }

    #[test]
    fn drive_uc_download_form() {
        let got = classify_reference(
            "https://drive.google.com/uc?export=download&id=xYz-9",
            PREFIX,
        )
        .unwrap();
        assert_eq!(got, PhotoReference::DriveFile("xYz-9".to_string()));
    }

    #[test]
    fn drive_beats_generic_url() {
        // Drive links are https URLs; they must still classify as Drive.
        let got = classify_reference("https://drive.google.com/open?id=abc", PREFIX).unwrap();
        assert!(matches!(got, PhotoReference::DriveFile(_)));
    }

    #[test]
    fn non_drive_url_with_id_parameter_stays_a_url() {
        // An `id` query alone is not a Drive link.
        let got = classify_reference("https://example.com/photo.jpg?id=42", PREFIX).unwrap();
        assert_eq!(
            got,
            PhotoReference::Url("https://example.com/photo.jpg?id=42".to_string())
        );

        let got =
            classify_reference("https://cdn.example.com/render?id=abc&size=big", PREFIX).unwrap();
        assert!(matches!(got, PhotoReference::Url(_)));
    }

    #[test]
    fn plain_url_passes_through() {
        let got = classify_reference("https://example.com/photo.jpg", PREFIX).unwrap();
        assert_eq!(
            got,
            PhotoReference::Url("https://example.com/photo.jpg".to_string())
        );
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let got = classify_reference("  https://example.com/p.jpg \n", PREFIX).unwrap();
        assert_eq!(got, PhotoReference::Url("https://example.com/p.jpg".to_string()));
    }

    #[test]
    fn bare_filename_is_malformed() {
        let err = classify_reference("IMG_1234.heic", PREFIX).unwrap_err();
        assert!(matches!(err, RowError::SourceUnreachable { .. }));
    }

    struct NoStore;

    #[async_trait]
    impl FileStore for NoStore {
        async fn download(&self, file_id: &str) -> Result<Vec<u8>, RowError> {
            Err(RowError::SourceUnreachable {
                reference: file_id.to_string(),
                detail: "no store in this test".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn disabled_local_paths_fail_per_row() {
        let config = GradingConfig::builder()
            .allow_local_paths(false)
            .build()
            .unwrap();
        let resolver = SourceResolver::new(Arc::new(NoStore), &config).unwrap();

        let err = resolver
            .fetch("/content/drive/MyDrive/nails.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, RowError::SourceUnreachable { .. }));
    }

    #[tokio::test]
    async fn local_path_reads_file_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("nails.jpg");
        std::fs::write(&photo, b"jpeg-ish bytes").unwrap();

        let config = GradingConfig::builder()
            .local_prefix(dir.path().to_string_lossy().to_string())
            .build()
            .unwrap();
        let resolver = SourceResolver::new(Arc::new(NoStore), &config).unwrap();

        let bytes = resolver.fetch(photo.to_str().unwrap()).await.unwrap();
        assert_eq!(bytes, b"jpeg-ish bytes");
    }
}
