//! Pipeline stages for grading one submission row.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different storage backend) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ normalize ──▶ assess ──▶ reconcile
//! (cell text)  (→ JPEG)    (oracle)    (→ 6 fields)
//! ```
//!
//! 1. [`source`]    — classify the photo-reference cell and fetch raw bytes
//! 2. [`normalize`] — PDF first page or any decodable image → canonical
//!    RGB JPEG; runs in `spawn_blocking` because pdfium and image codecs
//!    are not async-safe
//! 3. [`assess`]    — one rubric call to the scoring oracle plus JSON
//!    extraction; the only stage that talks to the LLM
//! 4. [`reconcile`] — fold messy keys and nested values into the fixed
//!    six-field result
//!
//! Every stage error is a [`crate::error::RowError`]: one bad row costs one
//! sentinel line in the sheet, never the run.

pub mod assess;
pub mod normalize;
pub mod reconcile;
pub mod source;
