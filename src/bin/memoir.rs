//! CLI binary for memoir-notes.
//!
//! A thin shim over the library crate: flags map to `PipelineConfig` and
//! collaborator choices, subcommands map to pipeline operations.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use memoir_notes::notion::encode_blocks;
use memoir_notes::pipeline::input::{markdown_path_for, resolve_input};
use memoir_notes::{
    process_inputs_stream, write_atomic, BlockMode, CompletionService, LlmCompletion,
    MarkdownServer, NoteOutput, NotePipeline, NotionPublisher, OcrService, Parent, PdfiumBackend,
    PipelineConfig, PipelineProgressCallback, ProgressCallback, RemoteOcr, SummaryStats,
    TesseractOcr, TextExtractor,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Batch progress bar ───────────────────────────────────────────────────────

/// Terminal progress for batches; documents may finish out of order.
struct CliProgress {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} notes  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        bar.set_prefix("Processing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl PipelineProgressCallback for CliProgress {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_document_start(&self, _index: usize, _total: usize, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_document_complete(&self, _index: usize, _total: usize, name: &str, block_count: usize) {
        self.bar.println(format!(
            "  {} {:<40} {}",
            green("✓"),
            name,
            dim(&format!("{block_count} blocks"))
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, _index: usize, _total: usize, name: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}…", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {:<40} {}", red("✗"), name, red(&msg)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total.saturating_sub(success_count);
        if failed == 0 {
            eprintln!("{} {} notes processed", green("✔"), bold(&total.to_string()));
        } else {
            eprintln!(
                "{} {}/{} notes processed  ({} with errors)",
                yellow("⚠"),
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string())
            );
        }
    }
}

// ── Arguments ────────────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extracted text only (no completion provider needed)
  memoir extract scan.png

  # Markdown summary through a self-hosted generation server
  memoir --markdown-server http://gpu-box:5000 summarize lecture.pdf -o lecture.md

  # Validated blocks as Notion JSON, asking the model for blocks directly
  memoir --block-mode structured blocks --notion notes.pdf

  # Publish into a Notion database
  memoir publish notes.pdf --title "Week 3" --database $NOTION_DATABASE_ID

  # Whole folder, four notes at a time
  memoir batch notes/*.pdf -o summaries/

ENVIRONMENT VARIABLES:
  REMOTE_SERVER_URL       Base URL of a /generate-markdown server
  MEMOIR_OCR_URL          Remote OCR endpoint (with --ocr remote)
  EDGEQUAKE_PROVIDER      Completion provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Completion model ID
  OPENAI_API_KEY          OpenAI API key (auto-detected)
  NOTION_API_KEY          Notion integration token
  NOTION_PARENT_PAGE_ID   Default parent page for publish
  NOTION_DATABASE_ID      Default parent database for publish
  PDFIUM_LIB_PATH         Path to libpdfium
"#;

/// Turn scanned and PDF notes into Markdown summaries and Notion pages.
#[derive(Parser, Debug)]
#[command(
    name = "memoir",
    version,
    about = "Turn scanned and PDF notes into Markdown summaries and Notion pages",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    opts: GlobalOpts,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MEMOIR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "MEMOIR_QUIET")]
    quiet: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "MEMOIR_NO_PROGRESS")]
    no_progress: bool,

    /// OCR engine used for images and scanned PDFs.
    #[arg(long, global = true, value_enum, env = "MEMOIR_OCR", default_value = "tesseract")]
    ocr: OcrArg,

    /// Remote OCR endpoint (required with --ocr remote).
    #[arg(long, global = true, env = "MEMOIR_OCR_URL")]
    ocr_url: Option<String>,

    /// Tesseract language code.
    #[arg(long, global = true, env = "MEMOIR_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Base URL of a /generate-markdown server; bypasses LLM providers.
    #[arg(long, global = true, env = "REMOTE_SERVER_URL")]
    markdown_server: Option<String>,

    /// Completion provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Completion model ID.
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Max tokens generated per completion.
    #[arg(long, global = true, env = "MEMOIR_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// Rasterisation DPI for the OCR fallback (72–400).
    #[arg(long, global = true, env = "MEMOIR_DPI", default_value_t = 100,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// How blocks are produced.
    #[arg(long, global = true, value_enum, env = "MEMOIR_BLOCK_MODE", default_value = "classify")]
    block_mode: BlockModeArg,

    /// Notes processed at once in batch mode.
    #[arg(short, long, global = true, env = "MEMOIR_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per collaborator call timeout in seconds.
    #[arg(long, global = true, env = "MEMOIR_TIMEOUT", default_value_t = 1800)]
    timeout: u64,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, global = true, env = "MEMOIR_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Text file with a custom prompt template containing {input}.
    #[arg(long, global = true, env = "MEMOIR_PROMPT")]
    prompt: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the text extracted from a note.
    Extract {
        /// Local file path or HTTP/HTTPS URL.
        input: String,
        /// Print the extraction result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print (or write) the Markdown summary of a note.
    Summarize {
        input: String,
        /// Write Markdown to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the validated blocks of a note as JSON.
    Blocks {
        input: String,
        /// Emit Notion API block objects instead of the internal model.
        #[arg(long)]
        notion: bool,
    },
    /// Create a Notion page from a note.
    Publish {
        input: String,
        /// Page title (default: file name without extension).
        #[arg(long)]
        title: Option<String>,
        /// Parent page ID.
        #[arg(long, env = "NOTION_PARENT_PAGE_ID", conflicts_with = "database")]
        parent_page: Option<String>,
        /// Parent database ID (title property "Name").
        #[arg(long, env = "NOTION_DATABASE_ID")]
        database: Option<String>,
        /// Notion integration token.
        #[arg(long, env = "NOTION_API_KEY", hide_env_values = true)]
        token: String,
    },
    /// Print word, sentence and reading-time statistics for a note's summary.
    Stats {
        input: String,
        #[arg(long)]
        json: bool,
    },
    /// Summarise many notes, writing `<dir>/<stem>.md` for each.
    Batch {
        #[arg(required = true)]
        inputs: Vec<String>,
        /// Output directory.
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OcrArg {
    Tesseract,
    Remote,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BlockModeArg {
    Classify,
    Structured,
}

impl From<BlockModeArg> for BlockMode {
    fn from(v: BlockModeArg) -> Self {
        match v {
            BlockModeArg::Classify => BlockMode::Classify,
            BlockModeArg::Structured => BlockMode::Structured,
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let opts = &cli.opts;

    let is_batch = matches!(cli.command, Command::Batch { .. });
    let show_progress = is_batch && !opts.quiet && !opts.no_progress;
    let filter = if opts.verbose {
        "debug"
    } else if opts.quiet || show_progress {
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

    let config = build_config(opts).await?;

    match cli.command {
        Command::Extract { ref input, json } => {
            let doc = resolve_input(input, config.download_timeout_secs).await?;
            let extractor = TextExtractor::new(
                Arc::new(PdfiumBackend::new()),
                build_ocr(opts, &config)?,
                &config,
            );
            match extractor.extract(&doc).await {
                Ok(result) if json => print_json(&result)?,
                Ok(result) => print_stdout(&result.text)?,
                Err(e) => {
                    warn!("Extraction failed for {}", doc.name());
                    print_stdout(&e.sentinel_text())?;
                }
            }
        }

        Command::Summarize { ref input, ref output } => {
            let note = build_pipeline(opts, config, None)?.process_input(input).await?;
            report_failures(&note, opts.quiet);
            let markdown = note.summary_text();
            match output {
                Some(path) => {
                    write_atomic(path, format!("{markdown}\n")).await?;
                    if !opts.quiet {
                        eprintln!("{} {}", green("✔"), bold(&path.display().to_string()));
                    }
                }
                None => print_stdout(&markdown)?,
            }
        }

        Command::Blocks { ref input, notion } => {
            let note = build_pipeline(opts, config, None)?.process_input(input).await?;
            report_failures(&note, opts.quiet);
            if notion {
                print_json(&encode_blocks(&note.blocks))?;
            } else {
                print_json(&note.blocks)?;
            }
        }

        Command::Publish {
            ref input,
            ref title,
            ref parent_page,
            ref database,
            ref token,
        } => {
            let publisher = NotionPublisher::new(token.clone(), 60)
                .context("Failed to build Notion client")?;
            let pipeline = build_pipeline(opts, config, None)?.with_publisher(Arc::new(publisher));
            let note = pipeline.process_input(input).await?;
            report_failures(&note, opts.quiet);
            if let Err(e) = &note.summary {
                bail!("Nothing to publish: {}", e.sentinel_text());
            }

            let parent = match (parent_page, database) {
                (Some(page), _) => Parent::Page(page.clone()),
                (None, Some(db)) => Parent::Database(db.clone()),
                (None, None) => Parent::Workspace,
            };
            let title = title.clone().unwrap_or_else(|| stem_of(&note.name));
            let page = pipeline
                .publish(title, note.blocks.clone(), parent)
                .await
                .context("Publishing to Notion failed")?;
            if !opts.quiet {
                eprintln!("{} {} blocks published", green("✔"), note.blocks.len());
            }
            println!("{}", page.url);
        }

        Command::Stats { ref input, json } => {
            let note = build_pipeline(opts, config, None)?.process_input(input).await?;
            report_failures(&note, opts.quiet);
            let stats = match &note.summary {
                Ok(_) => note.stats,
                Err(_) => SummaryStats::default(),
            };
            if json {
                print_json(&stats)?;
            } else {
                println!("Words:          {}", stats.word_count);
                println!("Sentences:      {}", stats.sentence_count);
                println!("Characters:     {}", stats.character_count);
                println!("Reading time:   {} min", stats.estimated_reading_minutes);
            }
        }

        Command::Batch {
            ref inputs,
            ref output_dir,
        } => {
            run_batch(opts, config, inputs.clone(), output_dir, show_progress).await?;
        }
    }

    Ok(())
}

async fn run_batch(
    opts: &GlobalOpts,
    config: PipelineConfig,
    inputs: Vec<String>,
    output_dir: &Path,
    show_progress: bool,
) -> Result<()> {
    let progress = show_progress.then(CliProgress::new);
    let pipeline = Arc::new(build_pipeline(
        opts,
        config,
        progress.clone().map(|p| p as ProgressCallback),
    )?);

    let total = inputs.len();
    if let Some(ref p) = progress {
        p.on_batch_start(total);
    }

    let mut stream = process_inputs_stream(Arc::clone(&pipeline), inputs.clone());
    let mut succeeded = 0;
    let mut unreadable = Vec::new();

    while let Some(done) = stream.next().await {
        let note = match done.item {
            Ok(note) => note,
            Err(e) => {
                if let Some(ref p) = progress {
                    p.on_document_error(done.index, total, &inputs[done.index], &e.to_string());
                } else {
                    eprintln!("{} {}: {}", red("✗"), inputs[done.index], e);
                }
                unreadable.push(inputs[done.index].clone());
                continue;
            }
        };

        if note.is_ok() {
            succeeded += 1;
        } else if progress.is_none() {
            report_failures(&note, opts.quiet);
        }

        let path = markdown_path_for(output_dir, &note.name);
        write_atomic(&path, format!("{}\n", note.summary_text())).await?;
        if progress.is_none() && !opts.quiet {
            eprintln!("{} {}", green("✓"), path.display());
        }
    }

    if let Some(ref p) = progress {
        p.on_batch_complete(total, succeeded);
    } else if !opts.quiet {
        eprintln!("{succeeded}/{total} notes summarised");
    }

    if !unreadable.is_empty() {
        bail!("{} inputs could not be read: {}", unreadable.len(), unreadable.join(", "));
    }
    Ok(())
}

// ── Construction helpers ─────────────────────────────────────────────────────

async fn build_config(opts: &GlobalOpts) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .ocr_dpi(opts.dpi)
        .ocr_language(opts.ocr_lang.clone())
        .max_tokens(opts.max_tokens)
        .block_mode(opts.block_mode.into())
        .concurrency(opts.concurrency)
        .request_timeout_secs(opts.timeout)
        .download_timeout_secs(opts.download_timeout);

    if let Some(ref path) = opts.prompt {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt template from {:?}", path))?;
        builder = builder.prompt_template(template);
    }

    builder.build().context("Invalid configuration")
}

fn build_ocr(opts: &GlobalOpts, config: &PipelineConfig) -> Result<Arc<dyn OcrService>> {
    Ok(match opts.ocr {
        OcrArg::Tesseract => Arc::new(TesseractOcr::new(config.ocr_language.clone())),
        OcrArg::Remote => {
            let url = opts
                .ocr_url
                .as_deref()
                .context("--ocr remote requires --ocr-url (or MEMOIR_OCR_URL)")?;
            Arc::new(RemoteOcr::new(url, config.request_timeout_secs)?)
        }
    })
}

fn build_completion(opts: &GlobalOpts, config: &PipelineConfig) -> Result<Arc<dyn CompletionService>> {
    if let Some(ref url) = opts.markdown_server {
        return Ok(Arc::new(MarkdownServer::new(url.clone(), config.request_timeout_secs)?));
    }
    let completion = LlmCompletion::resolve(
        opts.provider.as_deref(),
        opts.model.as_deref(),
        config.request_timeout_secs,
    )?;
    Ok(Arc::new(completion))
}

fn build_pipeline(
    opts: &GlobalOpts,
    config: PipelineConfig,
    progress: Option<ProgressCallback>,
) -> Result<NotePipeline> {
    let ocr = build_ocr(opts, &config)?;
    let completion = build_completion(opts, &config)?;
    let pipeline = NotePipeline::new(config, Arc::new(PdfiumBackend::new()), ocr, completion);
    Ok(match progress {
        Some(cb) => pipeline.with_progress(cb),
        None => pipeline,
    })
}

// ── Output helpers ───────────────────────────────────────────────────────────

fn report_failures(note: &NoteOutput, quiet: bool) {
    for failure in note.failures() {
        warn!("{} {} failed: {}", note.name, failure.kind, failure.message);
        if !quiet {
            eprintln!("{} {} {}: {}", yellow("⚠"), note.name, failure.kind, failure.message);
        }
    }
}

fn print_stdout(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}

fn stem_of(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
        .to_string()
}
