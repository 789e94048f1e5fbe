//! The scoring oracle: one narrow trait between the pipeline and the LLM
//! stack.
//!
//! This module converts a canonical JPEG into a vision API call and returns
//! the raw reply text. It is intentionally thin — all rubric wording lives
//! in [`crate::prompts`], and all reply parsing lives in
//! [`crate::pipeline::assess`], so either can change without touching the
//! provider plumbing here.
//!
//! The [`ScoringOracle`] trait exists for tests: grading a sheet against a
//! canned oracle exercises every other stage with zero network traffic.

use crate::config::{GradingConfig, DEFAULT_MODEL};
use crate::error::{GradeError, RowError};
use crate::prompts::SYSTEM_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// What one oracle call returned.
#[derive(Debug, Clone)]
pub struct OracleReply {
    /// Raw reply text, JSON hopefully somewhere inside it.
    pub text: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    /// Wall-clock time for the call.
    pub duration_ms: u64,
}

/// Anything that can look at a manicure photo and answer the rubric.
///
/// Production code uses [`VisionOracle`]; tests substitute canned
/// implementations via [`crate::config::GradingConfigBuilder::oracle`].
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Score one photo against the given rubric instruction.
    ///
    /// A failure here is a per-row event, never a run-fatal one.
    async fn score(&self, instruction: &str, image: &ImageData) -> Result<OracleReply, RowError>;
}

/// The production oracle: a vision-capable LLM provider.
pub struct VisionOracle {
    provider: Arc<dyn LLMProvider>,
    max_tokens: usize,
    temperature: Option<f32>,
}

impl VisionOracle {
    pub fn new(provider: Arc<dyn LLMProvider>, max_tokens: usize, temperature: Option<f32>) -> Self {
        Self {
            provider,
            max_tokens,
            temperature,
        }
    }
}

#[async_trait]
impl ScoringOracle for VisionOracle {
    /// ## Message Layout
    ///
    /// The request contains (in order):
    /// 1. **System message** — the fixed JSON-only instruction
    /// 2. **User message** — the rubric text plus the photo as a base64
    ///    JPEG attachment
    ///
    /// One attempt only. A flaky call turns into a sentinel row that a
    /// later re-run can pick up, so there is nothing to retry here.
    async fn score(&self, instruction: &str, image: &ImageData) -> Result<OracleReply, RowError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user_with_images(instruction, vec![image.clone()]),
        ];
        let options = CompletionOptions {
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        match self.provider.chat(&messages, Some(&options)).await {
            Ok(response) => {
                let duration = start.elapsed();
                debug!(
                    "oracle replied: {} input tokens, {} output tokens, {:?}",
                    response.prompt_tokens, response.completion_tokens, duration
                );
                Ok(OracleReply {
                    text: response.content,
                    prompt_tokens: response.prompt_tokens,
                    completion_tokens: response.completion_tokens,
                    duration_ms: duration.as_millis() as u64,
                })
            }
            Err(e) => {
                warn!("oracle call failed: {e}");
                Err(RowError::Oracle {
                    detail: format!("{e}"),
                })
            }
        }
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, GradeError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        GradeError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the scoring oracle, from most-specific to least-specific.
///
/// The five-level fallback chain lets library users and CLI users each set
/// exactly as much or as little as they need:
///
/// 1. **Pre-built oracle** (`config.oracle`) — used as-is. This is the test
///    seam, and also the hook for custom middleware (caching, rate-limiting).
/// 2. **Pre-built provider** (`config.provider`) — wrapped in a
///    [`VisionOracle`] with the config's token and temperature settings.
/// 3. **Provider name** (`config.provider_name`) — constructed via the
///    provider factory with `config.model` (default [`DEFAULT_MODEL`]).
/// 4. **`NAILGRADE_LLM_PROVIDER` + `NAILGRADE_MODEL`** — both env vars set
///    and non-empty.
/// 5. **Environment auto-detection** — prefers OpenAI when
///    `OPENAI_API_KEY` is present so users holding several provider keys
///    get a deterministic choice, then falls back to the provider
///    factory's own detection.
pub fn resolve_oracle(config: &GradingConfig) -> Result<Arc<dyn ScoringOracle>, GradeError> {
    if let Some(ref oracle) = config.oracle {
        return Ok(Arc::clone(oracle));
    }

    let provider = resolve_provider(config)?;
    Ok(Arc::new(VisionOracle::new(
        provider,
        config.max_tokens,
        config.temperature,
    )))
}

fn resolve_provider(config: &GradingConfig) -> Result<Arc<dyn LLMProvider>, GradeError> {
    // 1) User-provided provider takes priority
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    // 2) Provider name + model
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    // 3) Honour NAILGRADE_LLM_PROVIDER + NAILGRADE_MODEL when both set
    if let (Ok(prov), Ok(model)) = (
        std::env::var("NAILGRADE_LLM_PROVIDER"),
        std::env::var("NAILGRADE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    // Prefer OpenAI explicitly when an OpenAI API key is present, so users
    // with multiple provider keys get OpenAI unless they ask otherwise.
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| GradeError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
