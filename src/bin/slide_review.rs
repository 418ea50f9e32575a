//! CLI binary for edgequake-slide-review.
//!
//! A thin shim over the library crate: maps CLI flags to `ReviewConfig`,
//! runs one review (or an interactive session) and prints the results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_slide_review::config::{
    DEFAULT_CSV_OUTPUT, DEFAULT_DOCUMENT, DEFAULT_DPI, DEFAULT_MAX_BATCH_PAGES, DEFAULT_PAGE_END,
    DEFAULT_PAGE_START, DEFAULT_SAMPLE_DOCUMENT,
};
use edgequake_slide_review::{
    inspect, render_table, review, write_csv, Issue, LoadedDocument, PageRange, ProgressCallback,
    ReviewConfig, ReviewProgressCallback, Session, SessionEvent, SessionState,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: [&str; 11] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal spinner: one line per rendered page, then "Reviewing…" while
/// the single review call is in flight.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&TICKS);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl ReviewProgressCallback for CliProgressCallback {
    fn on_render_start(&self, total_pages: usize) {
        self.bar.set_prefix("Rendering");
        self.bar.set_message(format!("{total_pages} pages…"));
    }

    fn on_page_rendered(&self, page_num: u32, _total_pages: usize) {
        self.bar
            .println(format!("  {} Page {:>3} rendered", green("✓"), page_num));
    }

    fn on_review_start(&self, pages: &[u32]) {
        self.bar.set_prefix("Reviewing…");
        self.bar.set_message(dim(&format!("{} page(s) in one request", pages.len())));
    }

    fn on_review_complete(&self, issue_count: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} Review complete: {} issue(s)",
            green("✔"),
            bold(&issue_count.to_string())
        );
    }

    fn on_review_error(&self, error: String) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✘"), red(&error));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Review pages 7-8 of test1.pdf, write review_issues.csv
  slide-review

  # Review a specific range of a deck
  slide-review deck.pdf --start 2 --end 4 -o deck_issues.csv

  # Use a specific model
  slide-review --model gpt-4.1 --provider openai deck.pdf

  # JSON output (issues, stats, raw reply)
  slide-review --json deck.pdf > review.json

  # Inspect PDF metadata (no API key needed)
  slide-review --inspect-only deck.pdf

  # Interactive session (sample deck or your own upload)
  slide-review --interactive

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (otherwise ./ then the system library)
  SLIDE_REVIEW_*          Fallback for every flag, e.g. SLIDE_REVIEW_START=3
"#;

/// Review PDF slide decks for formatting, logic and typo issues using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "slide-review",
    version,
    about = "Review PDF slide decks with a Vision LLM",
    long_about = "Render selected pages of a PDF slide deck and ask a Vision Language Model to \
review them for unprofessional formatting, logic problems and typos. Results are printed as a \
table and saved as CSV.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF slide deck to review.
    #[arg(env = "SLIDE_REVIEW_INPUT", default_value = DEFAULT_DOCUMENT)]
    input: PathBuf,

    /// First page to review (1-based).
    #[arg(long, env = "SLIDE_REVIEW_START", default_value_t = DEFAULT_PAGE_START)]
    start: u32,

    /// Last page to review (1-based, inclusive).
    #[arg(long, env = "SLIDE_REVIEW_END", default_value_t = DEFAULT_PAGE_END)]
    end: u32,

    /// CSV file to write the issues to.
    #[arg(short, long, env = "SLIDE_REVIEW_OUTPUT", default_value = DEFAULT_CSV_OUTPUT)]
    output: PathBuf,

    /// LLM model ID (e.g. gpt-5-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Rendering DPI (72–400).
    #[arg(long, env = "SLIDE_REVIEW_DPI", default_value_t = DEFAULT_DPI,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Maximum pages per review.
    #[arg(long, env = "SLIDE_REVIEW_MAX_PAGES", default_value_t = DEFAULT_MAX_BATCH_PAGES)]
    max_pages: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "SLIDE_REVIEW_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "SLIDE_REVIEW_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Path to a text file containing custom review instructions.
    #[arg(long, env = "SLIDE_REVIEW_PROMPT")]
    prompt: Option<PathBuf>,

    /// Max LLM output tokens for the review.
    #[arg(long, env = "SLIDE_REVIEW_MAX_TOKENS")]
    max_tokens: Option<usize>,

    /// LLM temperature (0.0–2.0). Omitted by default; some models reject it.
    #[arg(long, env = "SLIDE_REVIEW_TEMPERATURE")]
    temperature: Option<f32>,

    /// Print the full review output as JSON instead of a table.
    #[arg(long, env = "SLIDE_REVIEW_JSON")]
    json: bool,

    /// Print PDF metadata only, no review.
    #[arg(long)]
    inspect_only: bool,

    /// Start an interactive review session.
    #[arg(short, long)]
    interactive: bool,

    /// Sample deck offered by the interactive session.
    #[arg(long, env = "SLIDE_REVIEW_SAMPLE", default_value = DEFAULT_SAMPLE_DOCUMENT)]
    sample: PathBuf,

    /// Disable the progress spinner.
    #[arg(long, env = "SLIDE_REVIEW_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SLIDE_REVIEW_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, env = "SLIDE_REVIEW_QUIET")]
    quiet: bool,
}

impl Cli {
    fn show_progress(&self) -> bool {
        !self.quiet && !self.no_progress && !self.json
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers progress; library INFO logs would tear it apart.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || cli.show_progress() || cli.interactive {
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

    if cli.interactive {
        let config = build_config(&cli).await?;
        return run_interactive(&cli, config).await;
    }

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input, cli.password.as_deref())
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Scripted review ──────────────────────────────────────────────────
    let mut config = build_config(&cli).await?;
    if cli.show_progress() {
        config.progress_callback = Some(CliProgressCallback::new() as ProgressCallback);
    }

    let output = review(&cli.input, &config)
        .await
        .with_context(|| format!("Review of {} failed", cli.input.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        print_issues(&output.issues);
    }

    let saved = save_issues(&cli.output, &output.issues)?;

    if !cli.quiet && !cli.json {
        if saved {
            eprintln!("Results saved to {}", bold(&cli.output.display().to_string()));
        }
        eprintln!(
            "   {} tokens in  /  {} tokens out  :  {}ms total",
            dim(&output.stats.input_tokens.to_string()),
            dim(&output.stats.output_tokens.to_string()),
            output.stats.total_duration_ms,
        );
        if output.stats.skipped_pages > 0 {
            eprintln!(
                "{} {} requested page(s) beyond the end of the document were skipped",
                yellow("⚠"),
                output.stats.skipped_pages
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ReviewConfig`.
async fn build_config(cli: &Cli) -> Result<ReviewConfig> {
    let mut builder = ReviewConfig::builder()
        .dpi(cli.dpi)
        .pages(PageRange::new(cli.start, cli.end))
        .max_batch_pages(cli.max_pages);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(ref path) = cli.system_prompt {
        builder = builder.system_prompt(read_prompt(path).await?);
    }
    if let Some(ref path) = cli.prompt {
        builder = builder.review_prompt(read_prompt(path).await?);
    }

    builder.build().context("Invalid configuration")
}

async fn read_prompt(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read prompt from {:?}", path))
}

/// Write the CSV only when there is something to report. Returns whether a
/// file was written.
fn save_issues(path: &Path, issues: &[Issue]) -> Result<bool> {
    if issues.is_empty() {
        return Ok(false);
    }
    write_csv(path, issues).context("Failed to save CSV")?;
    Ok(true)
}

fn print_issues(issues: &[Issue]) {
    if issues.is_empty() {
        println!("No issues found.");
    } else {
        print!("{}", render_table(issues));
    }
}

// ── Interactive session ──────────────────────────────────────────────────────

/// Read one trimmed line; `None` on end of input.
fn ask(prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok((read > 0).then(|| line.trim().to_string()))
}

fn ask_page(prompt: &str, default: u32) -> Result<Option<u32>> {
    loop {
        let Some(answer) = ask(&format!("{prompt} [{default}]: "))? else {
            return Ok(None);
        };
        if answer.is_empty() {
            return Ok(Some(default));
        }
        match answer.parse::<u32>() {
            Ok(n) => return Ok(Some(n)),
            Err(_) => eprintln!("{} '{}' is not a page number", red("✘"), answer),
        }
    }
}

async fn load_document(cli: &Cli) -> Result<Option<LoadedDocument>> {
    loop {
        println!();
        println!("{}", bold("Choose a document"));
        println!("  [1] Sample deck ({})", cli.sample.display());
        println!("  [2] Upload a PDF");
        println!("  [q] Quit");
        let Some(choice) = ask("> ")? else {
            return Ok(None);
        };

        let loaded = match choice.as_str() {
            "1" => LoadedDocument::open(&cli.sample, cli.password.as_deref()).await,
            "2" => {
                let Some(path) = ask("Path to PDF: ")? else {
                    return Ok(None);
                };
                let path = PathBuf::from(path);
                let bytes = match tokio::fs::read(&path).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        eprintln!("{} {}: {}", red("✘"), path.display(), e);
                        continue;
                    }
                };
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                LoadedDocument::from_upload(name, &bytes, cli.password.as_deref()).await
            }
            "q" | "quit" => return Ok(None),
            _ => continue,
        };

        match loaded {
            Ok(doc) => return Ok(Some(doc)),
            Err(e) => eprintln!("{} {}", red("✘"), e),
        }
    }
}

async fn run_interactive(cli: &Cli, config: ReviewConfig) -> Result<()> {
    let mut session = Session::new(config.max_batch_pages);

    loop {
        match session.state() {
            SessionState::Idle => {
                let Some(doc) = load_document(cli).await? else {
                    return Ok(());
                };
                session.apply(SessionEvent::LoadDocument(doc))?;
            }

            SessionState::DocumentLoaded => {
                if !choose_range(&mut session)? {
                    return Ok(());
                }
            }

            SessionState::RangeSelected => {
                if let Some(secs) = session.estimated_review_secs() {
                    println!("Estimated time: about {} seconds", secs);
                }
                if session.exceeds_batch_limit() {
                    eprintln!(
                        "{} Please select no more than {} pages",
                        yellow("⚠"),
                        session.max_batch_pages()
                    );
                    if !choose_range(&mut session)? {
                        return Ok(());
                    }
                    continue;
                }
                let Some(answer) = ask("Start review? [Y/n] ")? else {
                    return Ok(());
                };
                if answer.eq_ignore_ascii_case("n") {
                    if !choose_range(&mut session)? {
                        return Ok(());
                    }
                    continue;
                }

                let mut run_config = config.clone();
                if cli.show_progress() {
                    run_config.progress_callback =
                        Some(CliProgressCallback::new() as ProgressCallback);
                }
                // Failures land in the Failed state and are shown there.
                let _ = session.run_review(&run_config).await;
            }

            SessionState::Completed => {
                println!();
                print_issues(session.issues());
                if !results_menu(cli, &mut session)? {
                    return Ok(());
                }
            }

            SessionState::Failed => {
                eprintln!(
                    "{} Review failed: {}",
                    red("✘"),
                    session.error().unwrap_or("unknown error")
                );
                if !results_menu(cli, &mut session)? {
                    return Ok(());
                }
            }

            SessionState::Reviewing => {
                anyhow::bail!("Review session did not leave the reviewing state")
            }
        }
    }
}

/// Ask for a page range until the session accepts one. `false` on end of input.
fn choose_range(session: &mut Session) -> Result<bool> {
    let page_count = session.document().map_or(0, |d| d.page_count());
    if let Some(doc) = session.document() {
        println!(
            "{} {} ({} pages)",
            cyan("◆"),
            bold(doc.name()),
            doc.page_count()
        );
    }

    loop {
        let Some(start) = ask_page("Start page", 1)? else {
            return Ok(false);
        };
        let default_end = start.saturating_add(1).min(page_count as u32).max(start);
        let Some(end) = ask_page("End page", default_end)? else {
            return Ok(false);
        };
        match session.apply(SessionEvent::SelectRange { start, end }) {
            Ok(_) => return Ok(true),
            Err(e) => eprintln!("{} {}", red("✘"), e),
        }
    }
}

/// After a review: save, pick another range, start over or quit.
/// `false` when the user quits.
fn results_menu(cli: &Cli, session: &mut Session) -> Result<bool> {
    loop {
        println!();
        let can_save = session.state() == SessionState::Completed && !session.issues().is_empty();
        if can_save {
            println!("  [s] Save CSV to {}", cli.output.display());
        }
        println!("  [r] Review another range");
        println!("  [n] New document");
        println!("  [q] Quit");
        let Some(choice) = ask("> ")? else {
            return Ok(false);
        };

        match choice.as_str() {
            "s" if can_save => match save_issues(&cli.output, session.issues()) {
                Ok(_) => println!("Results saved to {}", bold(&cli.output.display().to_string())),
                Err(e) => eprintln!("{} {:#}", red("✘"), e),
            },
            "r" => return choose_range(session),
            "n" => {
                session.apply(SessionEvent::Reset)?;
                return Ok(true);
            }
            "q" | "quit" => return Ok(false),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_slide_review::{IssueType, Severity};

    #[test]
    fn clean_review_writes_no_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CSV_OUTPUT);
        assert!(!save_issues(&path, &[]).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn issues_are_saved_to_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CSV_OUTPUT);
        let issues = vec![Issue {
            page: 7,
            issue_type: IssueType::Typo,
            severity: Severity::Low,
            description: "Straegy".into(),
            suggestion: "Strategy".into(),
        }];
        assert!(save_issues(&path, &issues).unwrap());
        let back = edgequake_slide_review::read_csv(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, issues);
    }
}
