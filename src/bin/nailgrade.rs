//! CLI binary for nailgrade.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `GradingConfig` and prints per-row results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use nailgrade::{
    ensure_credentials_file, grade_sheet, run, GradingConfig, ProgressCallback,
    RowProgressCallback, Sheet, DEFAULT_CREDENTIALS_PATH,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-row log
/// lines using [indicatif]. Rows are graded strictly in order, but per-row
/// start times are keyed by row number anyway so elapsed reporting stays
/// correct if the pipeline ever reorders.
struct CliProgressCallback {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
    /// Per-row wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Count of rows that failed and received sentinel values.
    errors: AtomicUsize,
    /// Count of rows skipped without fetching or scoring.
    skips: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically
    /// by `on_run_start` (called before any rows are processed).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start

        // Initial style: spinner only (no counter until we know the total).
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading sheet…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
            skips: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} rows  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Grading");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, row: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&row)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0) as f64
            / 1000.0
    }
}

impl RowProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_rows: usize) {
        // Switch from spinner-only style to full progress bar now that we
        // know the actual row count.
        self.activate_bar(total_rows);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting grading of {total_rows} rows…"))
        ));
    }

    fn on_row_start(&self, row: usize, _total_rows: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(row, Instant::now());
        self.bar.set_message(format!("row {row}"));
    }

    fn on_row_scored(&self, row: usize, total_rows: usize, overall: &str) {
        let elapsed = self.elapsed_secs(row);

        self.bar.println(format!(
            "  {} Row {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            row,
            total_rows,
            format!("overall {overall}"),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_row_failed(&self, row: usize, total_rows: usize, error: &str) {
        let elapsed = self.elapsed_secs(row);

        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = truncate_message(error, 80);

        self.bar.println(format!(
            "  {} Row {:>3}/{:<3}  {}  {}",
            red("✗"),
            row,
            total_rows,
            red(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_row_skipped(&self, row: usize, total_rows: usize, reason: &str) {
        self.skips.fetch_add(1, Ordering::SeqCst);

        self.bar.println(format!(
            "  {} Row {:>3}/{:<3}  {}",
            dim("·"),
            row,
            total_rows,
            dim(reason),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_rows: usize, scored_count: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        let skipped = self.skips.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} of {} rows scored  ({} skipped)",
                green("✔"),
                bold(&scored_count.to_string()),
                total_rows,
                skipped,
            );
        } else {
            eprintln!(
                "{} {}/{} rows scored  ({} failed, {} skipped)",
                if scored_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&scored_count.to_string()),
                total_rows,
                red(&failed.to_string()),
                skipped,
            );
        }
    }
}

/// Cap a log message at `max` characters, ellipsising the overflow.
///
/// Counts characters, not bytes: error messages embed photo-reference cells
/// verbatim, and those can hold non-ASCII filenames.
fn truncate_message(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('\u{2026}');
    out
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Grade a sheet in place (needs an API key)
  nailgrade responses.csv

  # Write the graded sheet elsewhere, keep the input untouched
  nailgrade responses.csv -o graded.csv

  # Resumable run: stamp a column; re-runs skip stamped rows
  nailgrade --timestamp-column "Processed At" responses.csv

  # Use a specific model
  nailgrade --model gpt-4o --provider openai responses.csv

  # Enforce the five-nail swatch composition
  nailgrade --composition-check responses.csv

  # Structured JSON report on stdout
  nailgrade --json responses.csv > report.json

PHOTO REFERENCES:
  Each row's photo cell may hold any of:
    /content/drive/…/photo.jpg                          local file
    https://drive.google.com/file/d/<ID>/view           Drive link
    https://drive.google.com/open?id=<ID>               Drive link
    https://example.com/photo.jpg                       plain URL

  Rows whose photo cannot be fetched or decoded are written as "None";
  rows where the model call fails are written as "Error". Both kinds
  leave every other row untouched.

SUPPORTED PROVIDERS & MODELS:
  Provider     Model                      Vision
  ─────────    ─────────────────────────  ──────
  openai       gpt-4o (default)           ✓
  openai       gpt-4.1-mini               ✓
  anthropic    claude-sonnet-4-20250514   ✓
  gemini       gemini-2.0-flash           ✓
  ollama       llava, llama3.2-vision     ✓

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY           OpenAI API key
  ANTHROPIC_API_KEY        Anthropic API key
  GEMINI_API_KEY           Google Gemini API key
  NAILGRADE_LLM_PROVIDER   Override provider (openai, anthropic, gemini, ollama)
  NAILGRADE_MODEL          Override model ID
  DRIVE_ACCESS_TOKEN       OAuth bearer token for private Drive photos
  GOOGLE_API_KEY           API key for link-shared Drive photos
  GOOGLE_CREDENTIALS_JSON  Service-account JSON, written to credentials.json
                           at startup

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Grade:           nailgrade responses.csv

  PDF swatch cards need a pdfium shared library next to the binary or on
  the system path. Without one, PDF rows fail with "None" while ordinary
  image rows are unaffected.
"#;

/// Score manicure photos in a CSV sheet using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "nailgrade",
    version,
    about = "Score manicure photos in a CSV sheet using Vision LLMs",
    long_about = "Grade a sheet of manicure photo submissions against a fixed rubric using a \
Vision Language Model. Each row's photo reference (local path, Google Drive link, or URL) is \
fetched, normalised to JPEG, scored on four categories, and the six result columns are written \
back to the sheet. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any \
OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the CSV sheet to grade.
    input: PathBuf,

    /// Write the graded sheet to this file instead of back to the input.
    #[arg(short, long, env = "NAILGRADE_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4o, claude-sonnet-4-20250514).
    #[arg(
        long,
        env = "NAILGRADE_MODEL",
        long_help = "Vision LLM model to use. Default: gpt-4o.\n\
          Any vision-capable model of the chosen provider works; scores are \
          rubric-bound so cheaper models mostly vary comment wording."
    )]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "NAILGRADE_LLM_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Rendering DPI for PDF swatch cards (72–400).
    #[arg(long, env = "NAILGRADE_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// JPEG quality for the canonical image sent to the model (1–100).
    #[arg(long, env = "NAILGRADE_JPEG_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Max LLM output tokens per photo.
    #[arg(long, env = "NAILGRADE_MAX_TOKENS", default_value_t = 200)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0). Provider default when unset.
    #[arg(long, env = "NAILGRADE_TEMPERATURE")]
    temperature: Option<f32>,

    /// Timeout for plain HTTPS photo downloads, in seconds.
    #[arg(long, env = "NAILGRADE_HTTP_TIMEOUT", default_value_t = 10)]
    http_timeout: u64,

    /// Column stamped with an RFC 3339 time after each attempted row.
    #[arg(
        long,
        env = "NAILGRADE_TIMESTAMP_COLUMN",
        long_help = "Column stamped with an RFC 3339 time after each attempted row.\n\
          Rows whose stamp cell is already non-empty are skipped, making \
          interrupted runs resumable without re-billing scored rows."
    )]
    timestamp_column: Option<String>,

    /// Require the five-nail swatch composition (1 dark + 2 light + 2 French).
    #[arg(long, env = "NAILGRADE_COMPOSITION_CHECK")]
    composition_check: bool,

    /// Refuse to read photo references from the local filesystem.
    #[arg(long, env = "NAILGRADE_NO_LOCAL_PATHS")]
    no_local_paths: bool,

    /// Path prefix that marks a photo reference as a local file.
    #[arg(long, env = "NAILGRADE_LOCAL_PREFIX")]
    local_prefix: Option<String>,

    /// Output the full run report as JSON on stdout.
    #[arg(long, env = "NAILGRADE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "NAILGRADE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "NAILGRADE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "NAILGRADE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    // In verbose mode we always want all logs regardless of progress.
    let filter = if cli.verbose { "debug" } else { filter };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Credential bootstrap ─────────────────────────────────────────────
    // Service-account access to private Drive photos: materialise the JSON
    // from the environment once, before any row needs it.
    if std::env::var_os("GOOGLE_CREDENTIALS_JSON").is_some() {
        ensure_credentials_file(Path::new(DEFAULT_CREDENTIALS_PATH))
            .context("Failed to write Drive credentials file")?;
    }

    // ── Build config ─────────────────────────────────────────────────────
    // The progress bar is initialised with a spinner (no row count yet);
    // `on_run_start` resizes it to the correct total once the sheet has
    // been read. `show_progress` was already computed above.

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn RowProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run grading ──────────────────────────────────────────────────────
    let report = if let Some(ref output_path) = cli.output {
        let mut sheet = Sheet::read_csv(&cli.input)
            .with_context(|| format!("Failed to read sheet {}", cli.input.display()))?;
        let report = grade_sheet(&mut sheet, &config)
            .await
            .context("Grading failed")?;
        sheet
            .write_csv(output_path)
            .with_context(|| format!("Failed to write graded sheet {}", output_path.display()))?;
        report
    } else {
        run(&cli.input, &config).await.context("Grading failed")?
    };

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    }

    // Summary line (the callback already printed the per-row log).
    if !cli.quiet {
        let stats = &report.stats;
        let target = cli.output.as_deref().unwrap_or(&cli.input);
        eprintln!(
            "{}  {}/{} rows scored  {}ms  →  {}",
            if stats.failed_rows == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.scored_rows,
            stats.total_rows,
            stats.total_duration_ms,
            bold(&target.display().to_string()),
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&stats.total_prompt_tokens.to_string()),
            dim(&stats.total_completion_tokens.to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `GradingConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GradingConfig> {
    let mut builder = GradingConfig::builder()
        .dpi(cli.dpi)
        .jpeg_quality(cli.jpeg_quality)
        .max_tokens(cli.max_tokens)
        .http_timeout_secs(cli.http_timeout)
        .allow_local_paths(!cli.no_local_paths)
        .composition_check(cli.composition_check);

    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref prefix) = cli.local_prefix {
        builder = builder.local_prefix(prefix);
    }
    if let Some(ref column) = cli.timestamp_column {
        builder = builder.timestamp_column(column);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
