//! Progress-callback trait for per-row grading events.
//!
//! Inject an [`Arc<dyn RowProgressCallback>`] via
//! [`crate::config::GradingConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline works through the sheet.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a Tokio broadcast channel, a WebSocket, a database record,
//! or a terminal progress bar — without the library knowing anything about how
//! the host application communicates. Rows are graded strictly in order, so
//! events arrive in order too; the trait is still `Send + Sync` because the
//! pipeline hops across `spawn_blocking` boundaries.
//!
//! # Example
//!
//! ```rust
//! use nailgrade::{GradingConfig, RowProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     scored: Arc<AtomicUsize>,
//! }
//!
//! impl RowProgressCallback for CountingCallback {
//!     fn on_row_scored(&self, row: usize, total_rows: usize, overall: &str) {
//!         self.scored.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Row {}/{} scored {}", row, total_rows, overall);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     scored: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = GradingConfig::builder()
//!     .progress_callback(counter as Arc<dyn RowProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the grading pipeline as it works through the sheet.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Row numbers are 1-indexed over data rows; the
/// header row is not counted.
pub trait RowProgressCallback: Send + Sync {
    /// Called once before any row is touched.
    fn on_run_start(&self, total_rows: usize) {
        let _ = total_rows;
    }

    /// Called just before a row's photo is fetched.
    fn on_row_start(&self, row: usize, total_rows: usize) {
        let _ = (row, total_rows);
    }

    /// Called when a row has been scored and reconciled.
    ///
    /// `overall` is the reconciled Overall Score cell text, handy for
    /// progress lines.
    fn on_row_scored(&self, row: usize, total_rows: usize, overall: &str) {
        let _ = (row, total_rows, overall);
    }

    /// Called when a row failed and will receive sentinel values.
    fn on_row_failed(&self, row: usize, total_rows: usize, error: &str) {
        let _ = (row, total_rows, error);
    }

    /// Called when a row was skipped without any fetch or scoring.
    fn on_row_skipped(&self, row: usize, total_rows: usize, reason: &str) {
        let _ = (row, total_rows, reason);
    }

    /// Called once after every row has been attempted.
    fn on_run_complete(&self, total_rows: usize, scored_count: usize) {
        let _ = (total_rows, scored_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RowProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GradingConfig`].
pub type ProgressCallback = Arc<dyn RowProgressCallback>;
