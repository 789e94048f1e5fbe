//! Error types for the nailgrade library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`GradeError`] — **Fatal**: the run cannot proceed at all (sheet
//!   unreadable, no photo column, credentials missing, provider not
//!   configured). Returned as `Err(GradeError)` from the top-level `run*`
//!   functions before any row is processed.
//!
//! * [`RowError`] — **Non-fatal**: a single row failed (dead link, image the
//!   decoder cannot read, oracle hiccup) but every other row is fine. Stored
//!   inside [`crate::schema::RowOutcome`] so callers can inspect partial
//!   success rather than losing the whole sheet to one bad photo.
//!
//! Per-row failures are never retried and never abort the run; each one is
//! written back to the sheet as a sentinel value across the six result
//! fields. Which sentinel depends on how far the row got — see
//! [`RowError::sentinel`].

use crate::schema::Sentinel;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the nailgrade library.
///
/// Row-level failures use [`RowError`] and are stored in
/// [`crate::schema::RowOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum GradeError {
    // ── Dataset errors ────────────────────────────────────────────────────
    /// No header contains the substring "photo" (case-insensitive), so there
    /// is no column to read references from. Aborts before any row.
    #[error("no column containing 'photo' found in sheet headers: {headers:?}")]
    DatasetSchema { headers: Vec<String> },

    /// The sheet file could not be read or parsed.
    #[error("failed to read sheet '{path}': {detail}")]
    DatasetIo { path: PathBuf, detail: String },

    /// Could not persist the updated sheet.
    #[error("failed to write sheet '{path}': {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Startup errors ────────────────────────────────────────────────────
    /// The service-account credential file could not be materialised.
    #[error("credential bootstrap failed for '{path}': {detail}")]
    CredentialSetup { path: PathBuf, detail: String },

    /// The configured scoring provider is not usable (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single row.
///
/// The orchestrator converts each of these into a sentinel result written
/// across all six output fields, logs one diagnostic line, and moves on to
/// the next row.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum RowError {
    /// The photo reference could not be resolved to bytes: dead URL,
    /// storage-backend failure, disabled local path, or a reference that
    /// matches no recognised form.
    #[error("source unreachable for '{reference}': {detail}")]
    SourceUnreachable { reference: String, detail: String },

    /// Neither the paginated-document decoder nor the still-image decoders
    /// could make sense of the bytes.
    #[error("unsupported image format: {detail}")]
    UnsupportedFormat { detail: String },

    /// The scoring call itself failed (transport error, quota, content
    /// filter).
    #[error("oracle call failed: {detail}")]
    Oracle { detail: String },

    /// The oracle answered, but no JSON object could be extracted from the
    /// response text.
    #[error("malformed oracle response: {detail}")]
    MalformedResponse { detail: String },
}

impl RowError {
    /// The sentinel literal this failure writes to the six result fields.
    ///
    /// Failures before the scoring call write `"None"` (the row was never
    /// scored); failures during or after the call write `"Error"` (scoring
    /// was attempted and broke). The sheet therefore distinguishes rows that
    /// need a fixed reference from rows that need a re-run.
    pub fn sentinel(&self) -> Sentinel {
        match self {
            RowError::SourceUnreachable { .. } | RowError::UnsupportedFormat { .. } => {
                Sentinel::None
            }
            RowError::Oracle { .. } | RowError::MalformedResponse { .. } => Sentinel::Error,
        }
    }
}
