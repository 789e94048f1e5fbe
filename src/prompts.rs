//! Rubric prompts for the scoring oracle.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the category names, score range, and
//!    recommendation thresholds the oracle is told about must agree with
//!    what [`crate::schema`] and [`crate::pipeline::reconcile`] expect.
//!    One file to edit, one file to review.
//!
//! 2. **Testability** — unit tests can inspect the instruction text without
//!    spinning up a real vision model, making rubric regressions easy to
//!    catch.
//!
//! The composition guard is appended only when
//! [`crate::config::GradingConfig::composition_check`] is enabled.

/// System message sent ahead of every scoring request.
pub const SYSTEM_PROMPT: &str = "You are a precise JSON-only assistant.";

/// The scoring rubric sent alongside the photo.
///
/// The four category names, the integer 1–10 range, and the threshold
/// labels are load-bearing: the reconciler recognises exactly these
/// category spellings, and the recommendation labels are written to the
/// sheet verbatim.
pub const RUBRIC_PROMPT: &str = r#"You are a professional nail technician recruiter. Given this nail job photo, for each of the four categories below, give me:
  • a score from 1 to 10 (integers only)
  • a very brief comment (2–4 words)

Categories:
  – Polish Application
  – Cuticle Work
  – Nail Shape
  – Cleanliness

Then compute the average of these four numeric scores as “Overall Score” (number only), and pick one recommendation:
  • “Highly Recommend Hire” if ≥ 8.5
  • “Recommend Hire” if ≥ 7
  • “Further Training Required” if ≥ 5.5
  • “Not Recommend Hire” if < 5.5

Respond with ONLY a JSON object, no prose, no fences."#;

/// Additional clause for sheets that require the standard swatch layout.
///
/// Training submissions are photographed on a five-nail swatch: one dark
/// polish, two light polishes, two French manicures. When the guard is
/// active, anything else is rejected with a fixed all-zero payload instead
/// of being scored.
pub const COMPOSITION_GUARD: &str = r#"

Before scoring, verify the photo composition: it must show exactly five nails — 1 painted in a dark colour, 2 painted in a light colour, and 2 with a French manicure. If the composition does not match, do not score the work: return 0 for every category score, 0 for “Overall Score”, “Wrong Format” for every comment, and “Wrong Format” as the “Recommendation”."#;

/// Build the full instruction for one scoring request.
pub fn rubric_instruction(composition_check: bool) -> String {
    if composition_check {
        format!("{RUBRIC_PROMPT}{COMPOSITION_GUARD}")
    } else {
        RUBRIC_PROMPT.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Recommendation, CATEGORY_COLUMNS};

    #[test]
    fn rubric_names_every_category_and_label() {
        for column in CATEGORY_COLUMNS {
            assert!(RUBRIC_PROMPT.contains(column), "missing category {column}");
        }
        for rec in [
            Recommendation::HighlyRecommendHire,
            Recommendation::RecommendHire,
            Recommendation::FurtherTrainingRequired,
            Recommendation::NotRecommendHire,
        ] {
            assert!(RUBRIC_PROMPT.contains(rec.label()), "missing {rec}");
        }
    }

    #[test]
    fn composition_guard_is_opt_in() {
        assert!(!rubric_instruction(false).contains("Wrong Format"));
        let guarded = rubric_instruction(true);
        assert!(guarded.starts_with(RUBRIC_PROMPT));
        assert!(guarded.contains("Wrong Format"));
    }
}
