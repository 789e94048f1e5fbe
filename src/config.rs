//! Configuration types for a grading run.
//!
//! All run behaviour is controlled through [`GradingConfig`], built via its
//! [`GradingConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a config across the pipeline stages, log it at startup,
//! and diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::GradeError;
use crate::oracle::ScoringOracle;
use crate::progress::ProgressCallback;
use crate::storage::FileStore;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Local photo paths are resolved under this prefix unless overridden.
///
/// Sheets exported from hosted-notebook environments reference photos by
/// the notebook's mounted-drive path, so that convention is the default.
pub const DEFAULT_LOCAL_PREFIX: &str = "/content/drive/";

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for grading a sheet of manicure photos.
///
/// Built via [`GradingConfig::builder()`] or using
/// [`GradingConfig::default()`].
///
/// # Example
/// ```rust
/// use nailgrade::GradingConfig;
///
/// let config = GradingConfig::builder()
///     .model("gpt-4o")
///     .timestamp_column("Processed At")
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct GradingConfig {
    /// Rendering DPI used when a photo reference turns out to be a PDF.
    /// Range: 72–400. Default: 200.
    ///
    /// Swatch cards scanned to PDF carry small polish-edge detail; 200 DPI
    /// keeps that detail visible to the oracle while the resulting JPEG
    /// stays well below typical API upload limits.
    pub dpi: u32,

    /// JPEG quality for the canonical image sent to the oracle.
    /// Range: 1–100. Default: 90.
    ///
    /// Below ~80, compression artefacts start to read as polish streaks.
    pub jpeg_quality: u8,

    /// Maximum tokens the oracle may generate per photo. Default: 200.
    ///
    /// The rubric answer is a small JSON object; 200 tokens covers it with
    /// headroom. Raising this mostly buys longer stray prose around the
    /// JSON, which the extractor then has to cut away.
    pub max_tokens: usize,

    /// Sampling temperature for the oracle call. Default: None.
    ///
    /// If None, the provider's own default applies. Scores are integer and
    /// rubric-bound either way; temperature mainly varies comment wording.
    pub temperature: Option<f32>,

    /// Timeout for plain HTTPS photo downloads, in seconds. Default: 10.
    ///
    /// Rows are isolated, so a stuck host should cost one sentinel row and
    /// ten seconds, not stall the whole run.
    pub http_timeout_secs: u64,

    /// Model identifier, e.g. "gpt-4o", "claude-sonnet-4-20250514".
    /// If None, falls back to the environment and then [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the environment decides.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed scoring oracle. Takes precedence over `provider`.
    ///
    /// This is the seam tests use to grade sheets without any network.
    pub oracle: Option<Arc<dyn ScoringOracle>>,

    /// Pre-constructed file store for Drive references.
    ///
    /// If None, a Google Drive client is built from the environment the
    /// first time a Drive reference appears.
    pub file_store: Option<Arc<dyn FileStore>>,

    /// Whether photo references under `local_prefix` may be read from the
    /// local filesystem. Default: true.
    ///
    /// Disable when grading sheets from untrusted sources, so a cell can
    /// never name a server-side file.
    pub allow_local_paths: bool,

    /// Path prefix that marks a reference as local. Default:
    /// [`DEFAULT_LOCAL_PREFIX`].
    pub local_prefix: String,

    /// Column stamped with an RFC 3339 time after each attempted row.
    /// Default: None (no stamping, no skip-if-stamped).
    ///
    /// When set, rows whose stamp cell is already non-empty are skipped,
    /// which makes interrupted runs resumable without re-billing scored
    /// rows. Both scored and failed rows are stamped; only skips are not.
    pub timestamp_column: Option<String>,

    /// Require the standard five-nail swatch composition. Default: false.
    ///
    /// When enabled, the rubric instructs the oracle to reject photos that
    /// do not show 1 dark + 2 light + 2 French nails with an all-zero
    /// "Wrong Format" payload instead of scores.
    pub composition_check: bool,

    /// Callback invoked as rows start and finish. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            jpeg_quality: 90,
            max_tokens: 200,
            temperature: None,
            http_timeout_secs: 10,
            model: None,
            provider_name: None,
            provider: None,
            oracle: None,
            file_store: None,
            allow_local_paths: true,
            local_prefix: DEFAULT_LOCAL_PREFIX.to_string(),
            timestamp_column: None,
            composition_check: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GradingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GradingConfig")
            .field("dpi", &self.dpi)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("oracle", &self.oracle.as_ref().map(|_| "<dyn ScoringOracle>"))
            .field("file_store", &self.file_store.as_ref().map(|_| "<dyn FileStore>"))
            .field("allow_local_paths", &self.allow_local_paths)
            .field("local_prefix", &self.local_prefix)
            .field("timestamp_column", &self.timestamp_column)
            .field("composition_check", &self.composition_check)
            .finish()
    }
}

impl GradingConfig {
    /// Create a new builder for `GradingConfig`.
    pub fn builder() -> GradingConfigBuilder {
        GradingConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GradingConfig`].
#[derive(Debug)]
pub struct GradingConfigBuilder {
    config: GradingConfig,
}

impl GradingConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn http_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http_timeout_secs = secs.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn oracle(mut self, oracle: Arc<dyn ScoringOracle>) -> Self {
        self.config.oracle = Some(oracle);
        self
    }

    pub fn file_store(mut self, store: Arc<dyn FileStore>) -> Self {
        self.config.file_store = Some(store);
        self
    }

    pub fn allow_local_paths(mut self, v: bool) -> Self {
        self.config.allow_local_paths = v;
        self
    }

    pub fn local_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.local_prefix = prefix.into();
        self
    }

    pub fn timestamp_column(mut self, column: impl Into<String>) -> Self {
        self.config.timestamp_column = Some(column.into());
        self
    }

    pub fn composition_check(mut self, v: bool) -> Self {
        self.config.composition_check = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GradingConfig, GradeError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(GradeError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
            return Err(GradeError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if c.max_tokens == 0 {
            return Err(GradeError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.allow_local_paths && c.local_prefix.is_empty() {
            return Err(GradeError::InvalidConfig(
                "local_prefix must be non-empty while local paths are allowed".into(),
            ));
        }
        if let Some(column) = &c.timestamp_column {
            if column.trim().is_empty() {
                return Err(GradeError::InvalidConfig(
                    "timestamp_column must not be blank".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = GradingConfig::default();
        assert_eq!(c.dpi, 200);
        assert_eq!(c.jpeg_quality, 90);
        assert_eq!(c.max_tokens, 200);
        assert_eq!(c.http_timeout_secs, 10);
        assert_eq!(c.local_prefix, DEFAULT_LOCAL_PREFIX);
        assert!(c.allow_local_paths);
        assert!(c.timestamp_column.is_none());
        assert!(!c.composition_check);
    }

    #[test]
    fn setters_clamp_out_of_range_values() {
        let c = GradingConfig::builder()
            .dpi(10_000)
            .jpeg_quality(0)
            .temperature(9.0)
            .http_timeout_secs(0)
            .build()
            .unwrap();
        assert_eq!(c.dpi, 400);
        assert_eq!(c.jpeg_quality, 1);
        assert_eq!(c.temperature, Some(2.0));
        assert_eq!(c.http_timeout_secs, 1);
    }

    #[test]
    fn blank_timestamp_column_is_rejected() {
        let err = GradingConfig::builder()
            .timestamp_column("   ")
            .build()
            .unwrap_err();
        assert!(matches!(err, GradeError::InvalidConfig(_)));
    }

    #[test]
    fn empty_local_prefix_needs_local_paths_disabled() {
        assert!(GradingConfig::builder()
            .local_prefix("")
            .build()
            .is_err());
        assert!(GradingConfig::builder()
            .local_prefix("")
            .allow_local_paths(false)
            .build()
            .is_ok());
    }

    #[test]
    fn debug_impl_omits_dyn_fields_gracefully() {
        let rendered = format!("{:?}", GradingConfig::default());
        assert!(rendered.contains("dpi: 200"));
        assert!(!rendered.contains("panicked"));
    }
}
