//! CLI binary for pdf2records.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, writes the JSON export and prints a summary.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2records::{
    export, extract, ExtractionConfig, ExtractionProgressCallback, ExtractionStats,
    ProgressCallback,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── Terminal styling ─────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Tone {
    Ok = 32,
    Fail = 31,
    Review = 33,
    Accent = 36,
    Faint = 2,
    Strong = 1,
}

fn paint(tone: Tone, s: &str) -> String {
    format!("\x1b[{}m{s}\x1b[0m", tone as u8)
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    flagged: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_extraction_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        bar.set_style(
            ProgressStyle::with_template("{spinner:.yellow} {prefix:.bold} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Rasterising");
        bar.set_message("scanned pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            flagged: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.yellow} {prefix:.bold} {wide_bar:.yellow/240} {pos}/{len}  {msg}  [{elapsed}<{eta}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
        .tick_strings(TICKS);

        self.bar.set_style(style);
        self.bar.set_length(total as u64);
        self.bar.set_prefix("OCR + review");
        self.bar.reset_eta();
    }

    fn page_elapsed(&self, page_num: usize) -> f64 {
        let started = match self.start_times.lock() {
            Ok(mut times) => times.remove(&page_num),
            Err(_) => None,
        };
        started
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or_default()
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            paint(Tone::Accent, "◆"),
            paint(Tone::Strong, &format!("Extracting {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(page_num, Instant::now());
        }
        let flagged = self.flagged.load(Ordering::SeqCst);
        self.bar
            .set_message(format!("p.{page_num} ({flagged} flagged so far)"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, is_important: bool) {
        let elapsed = self.page_elapsed(page_num);
        let verdict = if is_important {
            self.flagged.fetch_add(1, Ordering::SeqCst);
            paint(Tone::Review, "review")
        } else {
            paint(Tone::Faint, "routine")
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            paint(Tone::Ok, "✓"),
            page_num,
            total,
            verdict,
            paint(Tone::Faint, &format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let elapsed = self.page_elapsed(page_num);
        self.flagged.fetch_add(1, Ordering::SeqCst);

        // Keep the line short; the full message is in the output record.
        let msg: String = if error.chars().count() > 80 {
            let mut s: String = error.chars().take(79).collect();
            s.push('\u{2026}');
            s
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            paint(Tone::Fail, "✗"),
            page_num,
            total,
            paint(Tone::Fail, &msg),
            paint(Tone::Faint, &format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_pages: usize, transcribed_count: usize) {
        let failed = total_pages.saturating_sub(transcribed_count);
        self.bar.finish_and_clear();

        let flagged = self.flagged.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} pages extracted, {} flagged for review",
                paint(Tone::Ok, "✔"),
                paint(Tone::Strong, &transcribed_count.to_string()),
                paint(Tone::Strong, &flagged.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages extracted  ({} failed, {} flagged for review)",
                if failed == total_pages {
                    paint(Tone::Fail, "✘")
                } else {
                    paint(Tone::Accent, "⚠")
                },
                paint(Tone::Strong, &transcribed_count.to_string()),
                total_pages,
                paint(Tone::Fail, &failed.to_string()),
                paint(Tone::Strong, &flagged.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract to stdout
  pdf2records contract.pdf

  # Extract to a file
  pdf2records contract.pdf -o contract.json

  # Spreadsheet-friendly output
  pdf2records contract.pdf --format csv -o contract.csv

  # Self-hosted OpenAI-compatible endpoint with other models
  pdf2records --provider ollama --ocr-model scb10x/typhoon-ocr-7b \
              --instruct-model scb10x/typhoon2.1-gemma3-12b contract.pdf

  # Stay under a stricter OCR quota, no persisted cache
  pdf2records --ocr-rpm 5 --no-cache contract.pdf

OUTPUT:
  One record per page (a JSON array, or CSV rows with a header):
    page_number, transcribed_contents, optimized_details, is_important
  Pages that could not be transcribed carry the error message and are
  always flagged is_important = true.

CACHE:
  Model responses are cached in .pdf2records/response-cache.json (override
  with --cache). Re-running the same document replays cached answers without
  calling the API or waiting on the rate limiter.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          API key for the openai provider (and compatible endpoints)
  EDGEQUAKE_LLM_PROVIDER  Provider when --provider is not given (default: openai)
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Override the log filter (e.g. pdf2records=debug)
"#;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Csv,
}

/// Extract reviewable per-page records from scanned PDF contracts.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2records",
    version,
    about = "Extract reviewable per-page records from scanned PDF contracts",
    long_about = "Rasterise each page of a scanned PDF, transcribe it with an OCR vision model, \
then summarise it and flag sensitive pages with an instruction model. Output is a JSON array \
with one record per page.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Write the records to this file instead of stdout.
    #[arg(short, long, env = "PDF2RECORDS_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, env = "PDF2RECORDS_FORMAT", default_value_t = Format::Json)]
    format: Format,

    /// edgequake-llm provider: openai, ollama, lmstudio, openrouter, …
    #[arg(long, env = "PDF2RECORDS_PROVIDER")]
    provider: Option<String>,

    /// Vision model for transcription.
    #[arg(long, env = "PDF2RECORDS_OCR_MODEL", default_value = pdf2records::config::DEFAULT_OCR_MODEL)]
    ocr_model: String,

    /// Text model for analysis.
    #[arg(long, env = "PDF2RECORDS_INSTRUCT_MODEL", default_value = pdf2records::config::DEFAULT_INSTRUCT_MODEL)]
    instruct_model: String,

    /// OCR requests per minute (0 = unlimited).
    #[arg(long, env = "PDF2RECORDS_OCR_RPM", default_value_t = 20)]
    ocr_rpm: u32,

    /// Analysis requests per minute (0 = unlimited).
    #[arg(long, env = "PDF2RECORDS_INSTRUCT_RPM", default_value_t = 200)]
    instruct_rpm: u32,

    /// Response cache file.
    #[arg(long, env = "PDF2RECORDS_CACHE", default_value = pdf2records::config::DEFAULT_CACHE_PATH,
          conflicts_with = "no_cache")]
    cache: PathBuf,

    /// Keep cached responses in memory only.
    #[arg(long, env = "PDF2RECORDS_NO_CACHE")]
    no_cache: bool,

    /// Longest rendered page edge in pixels.
    #[arg(long, env = "PDF2RECORDS_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2RECORDS_PASSWORD")]
    password: Option<String>,

    /// Per-call model timeout in seconds.
    #[arg(long, env = "PDF2RECORDS_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "PDF2RECORDS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2RECORDS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2RECORDS_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters, so library INFO
    // logs are suppressed while it is shown. Verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run extraction ───────────────────────────────────────────────────
    let output = extract(&cli.input, &config)
        .await
        .with_context(|| format!("Extraction of {} failed", cli.input.display()))?;

    let rendered = match cli.format {
        Format::Json => export::to_json(&output.records).context("Failed to serialise records")?,
        Format::Csv => export::to_csv(&output.records).context("Failed to write CSV")?,
    };

    match &cli.output {
        Some(path) => {
            pdf2records::extract::write_atomic(path, rendered.as_bytes())
                .await
                .context("Failed to write output")?;
            if !cli.quiet {
                eprintln!("   →  {}", paint(Tone::Strong, &path.display().to_string()));
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .and_then(|_| match cli.format {
                    // CSV rows already end in a newline.
                    Format::Csv => Ok(()),
                    Format::Json => handle.write_all(b"\n"),
                })
                .context("Failed to write to stdout")?;
        }
    }

    if !cli.quiet {
        print_summary(&output.stats, show_progress);
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .ocr_model(&cli.ocr_model)
        .instruct_model(&cli.instruct_model)
        .ocr_requests_per_minute(cli.ocr_rpm)
        .instruct_requests_per_minute(cli.instruct_rpm)
        .max_rendered_pixels(cli.max_pixels)
        .api_timeout_secs(cli.api_timeout);

    builder = if cli.no_cache {
        builder.no_cache()
    } else {
        builder.cache_path(&cli.cache)
    };

    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(stats: &ExtractionStats, progress_shown: bool) {
    // The progress callback already printed the page tally.
    if !progress_shown {
        eprintln!(
            "Extracted {}/{} pages in {}ms ({} flagged for review)",
            stats.transcribed_pages,
            stats.total_pages,
            stats.total_duration_ms,
            stats.important_pages
        );
        if stats.failed_pages > 0 {
            eprintln!("  {} pages failed", stats.failed_pages);
        }
    }
    eprintln!(
        "   {} cached  /  {} API calls  /  {} analysis fallbacks  ·  {}ms total",
        paint(Tone::Faint, &stats.cache_hits.to_string()),
        paint(Tone::Faint, &stats.cache_misses.to_string()),
        paint(Tone::Faint, &stats.analysis_fallbacks.to_string()),
        stats.total_duration_ms,
    );
}
