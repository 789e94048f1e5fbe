//! Assessment: one rubric call to the oracle, then JSON extraction.
//!
//! Oracle replies are free text that should contain exactly one JSON
//! object, but models wrap answers in code fences, preambles, and
//! apologies. Extraction takes the substring from the first `{` to the
//! last `}` and parses that; anything less structured is a
//! `MalformedResponse` for the row.
//!
//! Key and value cleanup deliberately does not happen here — that is
//! [`crate::pipeline::reconcile`]'s job. This stage's contract ends at "a
//! parsed JSON object".

use crate::error::RowError;
use crate::oracle::ScoringOracle;
use crate::pipeline::normalize::CanonicalImage;
use crate::prompts::rubric_instruction;
use std::sync::Arc;
use tracing::debug;

/// The parsed-but-unreconciled oracle answer.
pub type RawAssessment = serde_json::Map<String, serde_json::Value>;

/// One scored photo: the raw mapping plus call accounting.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub raw: RawAssessment,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub oracle_ms: u64,
}

/// Drives rubric calls against a fixed instruction.
pub struct AssessmentClient {
    oracle: Arc<dyn ScoringOracle>,
    instruction: String,
}

impl AssessmentClient {
    pub fn new(oracle: Arc<dyn ScoringOracle>, composition_check: bool) -> Self {
        Self {
            oracle,
            instruction: rubric_instruction(composition_check),
        }
    }

    /// Score one canonical image. One oracle call, no retries.
    pub async fn assess(&self, image: &CanonicalImage) -> Result<Assessment, RowError> {
        let reply = self
            .oracle
            .score(&self.instruction, &image.to_image_data())
            .await?;
        debug!(
            "oracle reply: {} chars, {} completion tokens",
            reply.text.len(),
            reply.completion_tokens
        );
        let raw = extract_json(&reply.text)?;
        Ok(Assessment {
            raw,
            prompt_tokens: reply.prompt_tokens,
            completion_tokens: reply.completion_tokens,
            oracle_ms: reply.duration_ms,
        })
    }
}

/// Pull the one JSON object out of a free-text reply.
///
/// The object spans from the first `{` to the last `}`. If either brace is
/// missing, they are inverted, or the substring fails to parse as a JSON
/// object, the reply is malformed.
pub fn extract_json(text: &str) -> Result<RawAssessment, RowError> {
    let (start, end) = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start <= end => (start, end),
        _ => {
            return Err(RowError::MalformedResponse {
                detail: format!("no JSON object in reply: {:?}", snippet(text)),
            });
        }
    };

    serde_json::from_str(&text[start..=end]).map_err(|e| RowError::MalformedResponse {
        detail: format!("JSON parse: {e}"),
    })
}

/// First 120 characters, for error messages.
fn snippet(text: &str) -> String {
    text.chars().take(120).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RowError;
    use crate::oracle::OracleReply;
    use async_trait::async_trait;
    use edgequake_llm::ImageData;

    #[test]
    fn bare_object_parses() {
        let raw = extract_json(r#"{"Overall Score": 8.5}"#).unwrap();
        assert_eq!(raw["Overall Score"], 8.5);
    }

    #[test]
    fn code_fences_are_cut_away() {
        let reply = "```json\n{\"Cleanliness\": {\"score\": 9, \"comment\": \"spotless\"}}\n```";
        let raw = extract_json(reply).unwrap();
        assert!(raw.contains_key("Cleanliness"));
    }

    #[test]
    fn surrounding_prose_is_cut_away() {
        let reply = "Sure! Here is the assessment you asked for: {\"Nail Shape\": 7} Hope it helps.";
        let raw = extract_json(reply).unwrap();
        assert_eq!(raw["Nail Shape"], 7);
    }

    #[test]
    fn braceless_reply_is_malformed() {
        let err = extract_json("I cannot assess this image.").unwrap_err();
        assert!(matches!(err, RowError::MalformedResponse { .. }));
    }

    #[test]
    fn inverted_braces_are_malformed() {
        let err = extract_json("} nothing here {").unwrap_err();
        assert!(matches!(err, RowError::MalformedResponse { .. }));
    }

    #[test]
    fn unparseable_span_is_malformed() {
        // Two objects: the spanned substring is not one valid JSON value.
        let err = extract_json(r#"{"a": 1} and {"b": 2}"#).unwrap_err();
        assert!(matches!(err, RowError::MalformedResponse { .. }));
    }

    #[test]
    fn truncated_json_is_malformed() {
        let err = extract_json(r#"{"Polish Application": {"score": 8"#).unwrap_err();
        assert!(matches!(err, RowError::MalformedResponse { .. }));
    }

    struct CannedOracle(&'static str);

    #[async_trait]
    impl ScoringOracle for CannedOracle {
        async fn score(&self, _instruction: &str, _image: &ImageData) -> Result<OracleReply, RowError> {
            Ok(OracleReply {
                text: self.0.to_string(),
                prompt_tokens: 700,
                completion_tokens: 90,
                duration_ms: 5,
            })
        }
    }

    #[tokio::test]
    async fn assess_returns_raw_map_and_accounting() {
        let client = AssessmentClient::new(
            Arc::new(CannedOracle(r#"{"Polish Application": {"score": 8, "comment": "even coat"}}"#)),
            false,
        );
        let image = CanonicalImage::from_raw(vec![1, 2, 3]);

        let assessment = client.assess(&image).await.unwrap();
        assert!(assessment.raw.contains_key("Polish Application"));
        assert_eq!(assessment.prompt_tokens, 700);
        assert_eq!(assessment.completion_tokens, 90);
    }
}
