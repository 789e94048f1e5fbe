//! # nailgrade
//!
//! Score manicure photos against a fixed hiring rubric using vision LLMs.
//!
//! ## Why this crate?
//!
//! Recruiting for nail technicians runs on spreadsheets: one row per
//! candidate, one cell pointing at a photo of their work. Scoring those by
//! hand is slow and inconsistent. This crate walks the sheet row by row,
//! fetches each photo (Drive link, plain URL, or mounted path), normalises
//! it to one canonical JPEG, asks a vision model to apply the rubric, and
//! writes six result cells back — tolerating the messy keys and nested
//! values models actually return.
//!
//! ## Pipeline Overview
//!
//! ```text
//! sheet row
//!  │
//!  ├─ 1. Source     classify the reference; fetch bytes (Drive / URL / disk)
//!  ├─ 2. Normalize  PDF page or any image → RGB JPEG (CPU-bound, spawn_blocking)
//!  ├─ 3. Assess     one rubric call to the oracle; extract the JSON object
//!  ├─ 4. Reconcile  messy keys/values → the fixed six fields
//!  └─ 5. Writeback  result cells + optional timestamp, atomically
//! ```
//!
//! A row failure at any stage becomes a sentinel result for that row —
//! `"None"` when the photo never reached the oracle, `"Error"` when the
//! scoring call itself went wrong — and the run continues. Only schema and
//! setup problems abort a run, and only before any row is touched.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nailgrade::{run, GradingConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Oracle auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = GradingConfig::builder()
//!         .timestamp_column("Processed At")
//!         .build()?;
//!     let report = run("submissions.csv", &config).await?;
//!     println!(
//!         "{} scored, {} failed, {} skipped",
//!         report.stats.scored_rows,
//!         report.stats.failed_rows,
//!         report.stats.skipped_rows
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `nailgrade` binary (clap + anyhow + indicatif + tracing-subscriber) |
//! | `heic`  | off     | HEIC/HEIF photo decoding via libheif (needs the system library) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! nailgrade = { version = "0.3", default-features = false }
//! ```
//!
//! ## Environment
//!
//! | Variable | Used for |
//! |----------|----------|
//! | `OPENAI_API_KEY` (etc.) | oracle auto-detection |
//! | `NAILGRADE_LLM_PROVIDER` + `NAILGRADE_MODEL` | explicit oracle choice |
//! | `DRIVE_ACCESS_TOKEN` / `GOOGLE_API_KEY` | Drive downloads (else public links only) |
//! | `GOOGLE_CREDENTIALS_JSON` | one-time `credentials.json` bootstrap |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod dataset;
pub mod error;
pub mod oracle;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;
pub mod schema;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GradingConfig, GradingConfigBuilder, DEFAULT_LOCAL_PREFIX, DEFAULT_MODEL};
pub use dataset::Sheet;
pub use error::{GradeError, RowError};
pub use oracle::{OracleReply, ScoringOracle, VisionOracle};
pub use progress::{NoopProgressCallback, ProgressCallback, RowProgressCallback};
pub use run::{grade_sheet, run};
pub use schema::{
    AssessmentResult, Field, Recommendation, RowOutcome, RunReport, RunStats, Sentinel,
    SkipReason, CATEGORY_COLUMNS, RESULT_COLUMNS,
};
pub use storage::{
    ensure_credentials_file, DriveAuth, DriveStore, FileStore, DEFAULT_CREDENTIALS_PATH,
};
