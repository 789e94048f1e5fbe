//! The fixed output schema: six result fields, scoring thresholds, and the
//! per-row / per-run report types.
//!
//! Everything the pipeline ultimately writes back to the sheet lives here.
//! The oracle may answer with messy keys and nested values; by the time data
//! reaches this module it has been reconciled into exactly six display
//! strings. [`AssessmentResult`] is construct-only — there are no setters,
//! and a reconciliation conflict is handled by building a fresh
//! [`AssessmentResult::sentinel`] rather than patching fields.

use crate::error::RowError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four scored categories, in sheet column order.
pub const CATEGORY_COLUMNS: [&str; 4] = [
    "Polish Application",
    "Cuticle Work",
    "Nail Shape",
    "Cleanliness",
];

/// All six result columns, in sheet column order.
pub const RESULT_COLUMNS: [&str; 6] = [
    "Polish Application",
    "Cuticle Work",
    "Nail Shape",
    "Cleanliness",
    "Overall Score",
    "Recommendation",
];

/// One of the six canonical result fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    PolishApplication,
    CuticleWork,
    NailShape,
    Cleanliness,
    OverallScore,
    Recommendation,
}

impl Field {
    /// All fields in sheet column order.
    pub const ALL: [Field; 6] = [
        Field::PolishApplication,
        Field::CuticleWork,
        Field::NailShape,
        Field::Cleanliness,
        Field::OverallScore,
        Field::Recommendation,
    ];

    /// The exact sheet column header for this field.
    pub fn column(self) -> &'static str {
        match self {
            Field::PolishApplication => "Polish Application",
            Field::CuticleWork => "Cuticle Work",
            Field::NailShape => "Nail Shape",
            Field::Cleanliness => "Cleanliness",
            Field::OverallScore => "Overall Score",
            Field::Recommendation => "Recommendation",
        }
    }

    /// True for the four scored categories (not the derived fields).
    pub fn is_category(self) -> bool {
        !matches!(self, Field::OverallScore | Field::Recommendation)
    }

    /// Position in sheet column order (same order as [`Field::ALL`]).
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Placeholder literal written to all six fields when a row cannot be scored.
///
/// `None` marks rows that never reached the oracle (bad reference,
/// undecodable image); `Error` marks rows where the scoring call itself
/// failed or returned garbage. The split lets operators re-run only the
/// rows where a retry could plausibly change the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentinel {
    None,
    Error,
}

impl Sentinel {
    /// The literal cell value.
    pub fn literal(self) -> &'static str {
        match self {
            Sentinel::None => "None",
            Sentinel::Error => "Error",
        }
    }
}

/// Hire recommendation, a pure step function of the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    HighlyRecommendHire,
    RecommendHire,
    FurtherTrainingRequired,
    NotRecommendHire,
}

impl Recommendation {
    /// Map an overall score onto a recommendation.
    ///
    /// Thresholds are half-open from above: exactly 8.5 is "Highly
    /// Recommend Hire", exactly 7.0 is "Recommend Hire", exactly 5.5 is
    /// "Further Training Required".
    pub fn for_overall(overall: f64) -> Self {
        if overall >= 8.5 {
            Recommendation::HighlyRecommendHire
        } else if overall >= 7.0 {
            Recommendation::RecommendHire
        } else if overall >= 5.5 {
            Recommendation::FurtherTrainingRequired
        } else {
            Recommendation::NotRecommendHire
        }
    }

    /// The exact label the rubric instructs the oracle to use.
    pub fn label(self) -> &'static str {
        match self {
            Recommendation::HighlyRecommendHire => "Highly Recommend Hire",
            Recommendation::RecommendHire => "Recommend Hire",
            Recommendation::FurtherTrainingRequired => "Further Training Required",
            Recommendation::NotRecommendHire => "Not Recommend Hire",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Arithmetic mean of the four category scores.
pub fn overall_score(scores: [u8; 4]) -> f64 {
    scores.iter().map(|&s| f64::from(s)).sum::<f64>() / 4.0
}

/// The reconciled six-field result for one row, ready for writeback.
///
/// Category fields hold either a flattened `"<score>, <comment>"` string,
/// the oracle's own flat string, or a sentinel. The two derived fields hold
/// the oracle's overall number and recommendation label as text (the sheet
/// is untyped).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub polish_application: String,
    pub cuticle_work: String,
    pub nail_shape: String,
    pub cleanliness: String,
    pub overall_score: String,
    pub recommendation: String,
}

impl AssessmentResult {
    /// A result carrying the same sentinel literal in all six fields.
    pub fn sentinel(sentinel: Sentinel) -> Self {
        let literal = sentinel.literal().to_string();
        AssessmentResult {
            polish_application: literal.clone(),
            cuticle_work: literal.clone(),
            nail_shape: literal.clone(),
            cleanliness: literal.clone(),
            overall_score: literal.clone(),
            recommendation: literal,
        }
    }

    /// Read one field by name.
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::PolishApplication => &self.polish_application,
            Field::CuticleWork => &self.cuticle_work,
            Field::NailShape => &self.nail_shape,
            Field::Cleanliness => &self.cleanliness,
            Field::OverallScore => &self.overall_score,
            Field::Recommendation => &self.recommendation,
        }
    }

    /// All six values in sheet column order.
    pub fn values(&self) -> [&str; 6] {
        [
            &self.polish_application,
            &self.cuticle_work,
            &self.nail_shape,
            &self.cleanliness,
            &self.overall_score,
            &self.recommendation,
        ]
    }
}

/// Why a row was skipped without fetching or scoring anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The processed-at timestamp cell is already non-empty.
    AlreadyProcessed,
    /// The photo-reference cell is blank.
    BlankReference,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyProcessed => f.write_str("already processed"),
            SkipReason::BlankReference => f.write_str("blank photo reference"),
        }
    }
}

/// Outcome for one row, index-aligned with the sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RowOutcome {
    /// Fully scored and reconciled.
    Scored(AssessmentResult),
    /// A pipeline stage failed; the row gets a sentinel result.
    Failed { error: RowError },
    /// Pre-checks decided not to touch this row at all.
    Skipped { reason: SkipReason },
}

impl RowOutcome {
    pub fn is_scored(&self) -> bool {
        matches!(self, RowOutcome::Scored(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RowOutcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RowOutcome::Skipped { .. })
    }

    /// What this outcome writes back to the sheet: the scored result, the
    /// sentinel result derived from the failure, or nothing for a skip.
    pub fn writeback(&self) -> Option<AssessmentResult> {
        match self {
            RowOutcome::Scored(result) => Some(result.clone()),
            RowOutcome::Failed { error } => Some(AssessmentResult::sentinel(error.sentinel())),
            RowOutcome::Skipped { .. } => None,
        }
    }
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Rows in the sheet (including skipped ones).
    pub total_rows: usize,
    pub scored_rows: usize,
    pub failed_rows: usize,
    pub skipped_rows: usize,
    /// Token usage summed over all oracle calls.
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    /// Wall-clock time for the whole run.
    pub total_duration_ms: u64,
    /// Time spent inside oracle calls only.
    pub oracle_duration_ms: u64,
}

/// Everything a run produced: per-row outcomes plus aggregate stats.
///
/// Serialisable so the CLI can emit it as JSON (`--json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub outcomes: Vec<RowOutcome>,
    pub stats: RunStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommendation_boundaries_are_exact() {
        assert_eq!(
            Recommendation::for_overall(8.5),
            Recommendation::HighlyRecommendHire
        );
        assert_eq!(
            Recommendation::for_overall(8.4999),
            Recommendation::RecommendHire
        );
        assert_eq!(
            Recommendation::for_overall(7.0),
            Recommendation::RecommendHire
        );
        assert_eq!(
            Recommendation::for_overall(6.9999),
            Recommendation::FurtherTrainingRequired
        );
        assert_eq!(
            Recommendation::for_overall(5.5),
            Recommendation::FurtherTrainingRequired
        );
        assert_eq!(
            Recommendation::for_overall(5.4999),
            Recommendation::NotRecommendHire
        );
    }

    #[test]
    fn recommendation_covers_extremes() {
        assert_eq!(
            Recommendation::for_overall(10.0),
            Recommendation::HighlyRecommendHire
        );
        assert_eq!(
            Recommendation::for_overall(1.0),
            Recommendation::NotRecommendHire
        );
    }

    #[test]
    fn labels_match_rubric_wording() {
        assert_eq!(
            Recommendation::HighlyRecommendHire.label(),
            "Highly Recommend Hire"
        );
        assert_eq!(Recommendation::RecommendHire.label(), "Recommend Hire");
        assert_eq!(
            Recommendation::FurtherTrainingRequired.label(),
            "Further Training Required"
        );
        assert_eq!(
            Recommendation::NotRecommendHire.label(),
            "Not Recommend Hire"
        );
    }

    #[test]
    fn overall_is_arithmetic_mean() {
        assert_eq!(overall_score([8, 9, 8, 9]), 8.5);
        assert_eq!(overall_score([7, 7, 7, 7]), 7.0);
        assert_eq!(overall_score([10, 1, 1, 1]), 3.25);
    }

    #[test]
    fn mean_feeds_recommendation_consistently() {
        // The invariant chain: integer categories → mean → label.
        let overall = overall_score([9, 8, 9, 8]);
        assert_eq!(
            Recommendation::for_overall(overall),
            Recommendation::HighlyRecommendHire
        );
    }

    #[test]
    fn sentinel_result_fills_all_six_fields() {
        let r = AssessmentResult::sentinel(Sentinel::None);
        assert!(r.values().iter().all(|v| *v == "None"));
        let r = AssessmentResult::sentinel(Sentinel::Error);
        assert!(r.values().iter().all(|v| *v == "Error"));
    }

    #[test]
    fn field_columns_line_up_with_result_columns() {
        for (field, column) in Field::ALL.iter().zip(RESULT_COLUMNS.iter()) {
            assert_eq!(field.column(), *column);
        }
        assert_eq!(&RESULT_COLUMNS[..4], &CATEGORY_COLUMNS[..]);
    }

    #[test]
    fn failed_outcome_writes_sentinel_fields() {
        let outcome = RowOutcome::Failed {
            error: crate::error::RowError::MalformedResponse {
                detail: "no braces".into(),
            },
        };
        let written = outcome.writeback().expect("failures write back");
        assert!(written.values().iter().all(|v| *v == "Error"));
    }

    #[test]
    fn skipped_outcome_writes_nothing() {
        let outcome = RowOutcome::Skipped {
            reason: SkipReason::AlreadyProcessed,
        };
        assert!(outcome.writeback().is_none());
    }
}
