//! File storage: the Google Drive collaborator behind file-sharing links.
//!
//! ## Why chunked downloads?
//!
//! Phone photos and scanned PDFs routinely run to tens of megabytes, and a
//! single hung GET holds a per-request timeout for the whole transfer.
//! Ranged 8 MiB requests bound how much one stall can cost and match how
//! the Drive API expects media to be paged.
//!
//! [`FileStore`] is a trait for the same reason [`crate::oracle::ScoringOracle`]
//! is: tests grade whole sheets against an in-memory store with no network.

use crate::error::{GradeError, RowError};
use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Ranged request size for chunked Drive downloads.
const CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// Per-chunk request timeout. Generous compared to the photo-URL timeout
/// since a chunk can be 8 MiB on a slow uplink.
const CHUNK_TIMEOUT_SECS: u64 = 30;

/// Default location for the materialised service-account file.
pub const DEFAULT_CREDENTIALS_PATH: &str = "credentials.json";

/// Anything that can fetch stored file bytes by identifier.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Download the full contents of one stored file.
    async fn download(&self, file_id: &str) -> Result<Vec<u8>, RowError>;
}

/// How [`DriveStore`] authenticates.
#[derive(Debug, Clone)]
pub enum DriveAuth {
    /// OAuth bearer token, minted externally from the service-account file.
    Bearer(String),
    /// API key; reaches files shared "anyone with the link".
    ApiKey(String),
    /// No credentials: use the public `uc?export=download` endpoint.
    Public,
}

impl DriveAuth {
    /// Pick authentication from the environment.
    ///
    /// Order: `DRIVE_ACCESS_TOKEN` (bearer), then `GOOGLE_API_KEY`, else
    /// public link downloads.
    pub fn from_env() -> Self {
        if let Ok(token) = std::env::var("DRIVE_ACCESS_TOKEN") {
            if !token.is_empty() {
                return DriveAuth::Bearer(token);
            }
        }
        if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
            if !key.is_empty() {
                return DriveAuth::ApiKey(key);
            }
        }
        DriveAuth::Public
    }
}

/// Google Drive implementation of [`FileStore`].
pub struct DriveStore {
    http: reqwest::Client,
    auth: DriveAuth,
}

impl DriveStore {
    pub fn new(auth: DriveAuth) -> Result<Self, GradeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(CHUNK_TIMEOUT_SECS))
            .build()
            .map_err(|e| GradeError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { http, auth })
    }

    /// Build a store authenticated from the environment.
    pub fn from_env() -> Result<Self, GradeError> {
        Self::new(DriveAuth::from_env())
    }

    /// The media URL for one file under the current auth scheme.
    fn file_url(&self, file_id: &str) -> String {
        match &self.auth {
            DriveAuth::Bearer(_) => {
                format!("https://www.googleapis.com/drive/v3/files/{file_id}?alt=media")
            }
            DriveAuth::ApiKey(key) => format!(
                "https://www.googleapis.com/drive/v3/files/{file_id}?alt=media&key={key}"
            ),
            DriveAuth::Public => {
                format!("https://drive.google.com/uc?export=download&id={file_id}")
            }
        }
    }
}

#[async_trait]
impl FileStore for DriveStore {
    async fn download(&self, file_id: &str) -> Result<Vec<u8>, RowError> {
        let url = self.file_url(file_id);
        let mut out: Vec<u8> = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let mut request = self
                .http
                .get(&url)
                .header(RANGE, format!("bytes={}-{}", offset, offset + CHUNK_SIZE - 1));
            if let DriveAuth::Bearer(token) = &self.auth {
                request = request.bearer_auth(token);
            }

            let response = request.send().await.map_err(|e| RowError::SourceUnreachable {
                reference: file_id.to_string(),
                detail: e.to_string(),
            })?;

            match response.status() {
                // Server ignored the range and sent the whole file.
                StatusCode::OK => {
                    let body = response.bytes().await.map_err(|e| {
                        RowError::SourceUnreachable {
                            reference: file_id.to_string(),
                            detail: e.to_string(),
                        }
                    })?;
                    out.extend_from_slice(&body);
                    break;
                }
                StatusCode::PARTIAL_CONTENT => {
                    let total = response
                        .headers()
                        .get(CONTENT_RANGE)
                        .and_then(|v| v.to_str().ok())
                        .and_then(content_range_total);
                    let chunk = response.bytes().await.map_err(|e| {
                        RowError::SourceUnreachable {
                            reference: file_id.to_string(),
                            detail: e.to_string(),
                        }
                    })?;
                    let received = chunk.len() as u64;
                    out.extend_from_slice(&chunk);
                    offset += received;

                    // A zero-length 206 would otherwise loop forever.
                    if received == 0 {
                        break;
                    }
                    match total {
                        Some(total) if offset >= total => break,
                        Some(_) => {}
                        None if received < CHUNK_SIZE => break,
                        None => {}
                    }
                }
                // One past the end of an exact-multiple file.
                StatusCode::RANGE_NOT_SATISFIABLE if offset > 0 => break,
                status => {
                    return Err(RowError::SourceUnreachable {
                        reference: file_id.to_string(),
                        detail: format!("HTTP {status}"),
                    });
                }
            }
        }

        debug!("drive file {}: {} bytes in {} chunk(s)", file_id, out.len(), offset.div_ceil(CHUNK_SIZE).max(1));
        Ok(out)
    }
}

/// Parse the total length out of a `Content-Range` header value.
///
/// `"bytes 0-1023/4096"` → 4096. Servers may report an unknown total as
/// `"bytes 0-1023/*"`, which yields `None`.
fn content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

/// Materialise the service-account file from the environment.
///
/// Hosted runners inject the service-account JSON as a secret env var; this
/// writes it to disk once so external token-minting tooling can pick it up.
/// An existing file is left untouched. Runs before any row processing, and a
/// failure is run-fatal.
pub fn ensure_credentials_file(path: &Path) -> Result<(), GradeError> {
    if path.exists() {
        debug!("credentials already on disk at {}", path.display());
        return Ok(());
    }

    let payload =
        std::env::var("GOOGLE_CREDENTIALS_JSON").map_err(|_| GradeError::CredentialSetup {
            path: path.to_path_buf(),
            detail: "GOOGLE_CREDENTIALS_JSON is not set".to_string(),
        })?;
    if payload.trim().is_empty() {
        return Err(GradeError::CredentialSetup {
            path: path.to_path_buf(),
            detail: "GOOGLE_CREDENTIALS_JSON is empty".to_string(),
        });
    }

    std::fs::write(path, payload).map_err(|e| GradeError::CredentialSetup {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    info!("wrote service-account credentials to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_totals() {
        assert_eq!(content_range_total("bytes 0-1023/4096"), Some(4096));
        assert_eq!(content_range_total("bytes 8388608-16777215/16777216"), Some(16777216));
        assert_eq!(content_range_total("bytes 0-1023/*"), None);
        assert_eq!(content_range_total("garbage"), None);
    }

    #[test]
    fn file_urls_per_auth_scheme() {
        let store = DriveStore::new(DriveAuth::Public).unwrap();
        assert_eq!(
            store.file_url("abc123"),
            "https://drive.google.com/uc?export=download&id=abc123"
        );

        let store = DriveStore::new(DriveAuth::Bearer("tok".into())).unwrap();
        assert_eq!(
            store.file_url("abc123"),
            "https://www.googleapis.com/drive/v3/files/abc123?alt=media"
        );

        let store = DriveStore::new(DriveAuth::ApiKey("k".into())).unwrap();
        assert!(store.file_url("abc123").ends_with("alt=media&key=k"));
    }

    #[test]
    fn existing_credentials_file_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "{\"existing\": true}").unwrap();

        ensure_credentials_file(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"existing\": true}");
    }
}
