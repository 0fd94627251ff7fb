//! CLI binary for comic-ingest.
//!
//! A thin shim over the library crate: every subcommand maps its flags to a
//! form-field map or an id and calls one `Ingestor` method. Documents live in
//! a JSON file, page images in a local directory or on Cloudinary.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use comic_ingest::{
    CloudinaryConfig, CloudinaryStore, FormFields, IngestConfig, IngestProgressCallback, Ingestor,
    JsonFileStore, LocalStore, PageFile, ProgressCallback, RemoteStore, DEFAULT_LATEST_LIMIT,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

/// Live progress bar plus one log line per finished page. Pages finish out
/// of order when more than one worker runs.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl IngestProgressCallback for CliProgressCallback {
    fn on_job_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Uploading");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, url: &str) {
        let secs = self.elapsed(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            green("✓"),
            page_num,
            total,
            dim(url),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_job_complete(&self, total_pages: usize, success_count: usize) {
        self.bar.finish_and_clear();
        if success_count == total_pages {
            eprintln!("{} {} pages stored", green("✔"), bold(&success_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} pages stored ({} failed), no chapter created",
                red("✘"),
                bold(&success_count.to_string()),
                total_pages,
                red(&self.errors.load(Ordering::SeqCst).to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Create a comic, storing images under ./media
  comic-ingest --db catalog.json --local-store ./media \
    create-comic --user $USER_ID --title "Moonlit" --release-date 2024-05-01 --cover cover.png

  # Upload a chapter; pages keep argument order
  comic-ingest --db catalog.json --local-store ./media \
    ingest --user $USER_ID --comic $COMIC_ID --title "Dawn" --number 1 \
    --release-date 2024-05-08 pages/*.jpg

  # Inspect
  comic-ingest --db catalog.json show $COMIC_ID
  comic-ingest --db catalog.json latest --limit 10

ENVIRONMENT VARIABLES:
  CLOUDINARY_CLOUD_NAME     Cloudinary account (used when --local-store is absent)
  CLOUDINARY_API_KEY        Cloudinary API key
  CLOUDINARY_API_SECRET     Cloudinary API secret (SHA-256 signing)
  UPLOAD_TIMEOUT_SECS       Per-request upload timeout (default 60)
  MAX_UPLOAD_MB             Per-file size cap in MiB (default 10)
  MAX_PAGES                 Maximum pages per chapter (default 100)
  PAGE_PROCESS_CONCURRENCY  Concurrent page workers (default 3)
  RUST_LOG                  tracing filter, overrides -v / -q
"#;

/// Ingest comic chapters from page images.
#[derive(Parser, Debug)]
#[command(
    name = "comic-ingest",
    version,
    about = "Validate, normalise, upload and catalogue comic chapters",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// JSON file holding comics and chapters. Created on first write.
    #[arg(long, env = "COMIC_INGEST_DB", default_value = "comic-ingest.json", global = true)]
    db: PathBuf,

    /// Store images in this directory instead of Cloudinary.
    #[arg(long, env = "COMIC_INGEST_LOCAL_STORE", global = true)]
    local_store: Option<PathBuf>,

    /// Public URL prefix for --local-store.
    #[arg(long, env = "COMIC_INGEST_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Disable progress bar.
    #[arg(long, env = "COMIC_INGEST_NO_PROGRESS", global = true)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "COMIC_INGEST_VERBOSE", global = true)]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, env = "COMIC_INGEST_QUIET", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a comic from a cover image.
    CreateComic(CreateComicArgs),
    /// Upload pages as a new chapter of a comic.
    Ingest(IngestArgs),
    /// Delete a chapter and its stored pages.
    DeleteChapter {
        id: Uuid,
        #[arg(long)]
        user: Uuid,
    },
    /// Count one view of a chapter.
    View { id: Uuid },
    /// Change a chapter's title.
    RenameChapter {
        id: Uuid,
        title: String,
        #[arg(long)]
        user: Uuid,
    },
    /// Print a comic and its chapters as JSON.
    Show { id: Uuid },
    /// Print the most recently released chapters as JSON.
    Latest {
        #[arg(long, default_value_t = DEFAULT_LATEST_LIMIT)]
        limit: usize,
    },
    /// Print the comics owned by a user as JSON.
    List {
        #[arg(long)]
        user: Uuid,
    },
}

#[derive(Args, Debug)]
struct CreateComicArgs {
    #[arg(long)]
    user: Uuid,
    #[arg(long)]
    title: String,
    /// RFC 3339 timestamp or YYYY-MM-DD.
    #[arg(long)]
    release_date: String,
    #[arg(long)]
    cover: PathBuf,
    #[arg(long)]
    synopsis: Option<String>,
    /// Comma-separated.
    #[arg(long)]
    tags: Option<String>,
    #[arg(long)]
    nsfw: bool,
    #[arg(long)]
    paywalled: bool,
}

#[derive(Args, Debug)]
struct IngestArgs {
    #[arg(long)]
    user: Uuid,
    #[arg(long)]
    comic: Uuid,
    #[arg(long)]
    title: String,
    /// Chapter number; fractional values such as 12.5 are allowed.
    #[arg(long)]
    number: String,
    #[arg(long)]
    release_date: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    nsfw: bool,
    #[arg(long)]
    paywalled: bool,
    /// Page images in reading order.
    #[arg(required = true)]
    pages: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs while it is on screen.
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

    let mut config = IngestConfig::from_env().context("Invalid ingestion settings")?;
    if show_progress && matches!(cli.command, Command::Ingest(_)) {
        let cb: ProgressCallback = CliProgressCallback::new();
        config.progress_callback = Some(cb);
    }

    let store = JsonFileStore::open(&cli.db)
        .await
        .with_context(|| format!("Failed to open {}", cli.db.display()))?;
    let remote = build_remote(&cli)?;
    let ingestor = Ingestor::new(Arc::new(store), remote, config);

    match cli.command {
        Command::CreateComic(args) => {
            let mut fields = FormFields::new();
            fields.insert("title".into(), args.title);
            fields.insert("releaseDate".into(), args.release_date);
            put_opt(&mut fields, "synopsis", args.synopsis);
            put_opt(&mut fields, "tags", args.tags);
            put_flag(&mut fields, "nsfw", args.nsfw);
            put_flag(&mut fields, "paywalled", args.paywalled);
            let cover = read_page(&args.cover).await?;
            let comic = ingestor
                .create_comic(&fields, Some(cover), args.user)
                .await
                .context("Could not create comic")?;
            print_json(&comic)?;
        }
        Command::Ingest(args) => {
            let mut fields = FormFields::new();
            fields.insert("title".into(), args.title);
            fields.insert("chapterNumber".into(), args.number);
            fields.insert("releaseDate".into(), args.release_date);
            put_opt(&mut fields, "description", args.description);
            put_flag(&mut fields, "nsfw", args.nsfw);
            put_flag(&mut fields, "paywalled", args.paywalled);
            let mut files = Vec::with_capacity(args.pages.len());
            for path in &args.pages {
                files.push(read_page(path).await?);
            }
            let start = Instant::now();
            let chapter = ingestor
                .ingest_chapter(&fields, files, args.comic, args.user)
                .await
                .context("Chapter upload failed")?;
            if !cli.quiet {
                eprintln!(
                    "{}  chapter {}  {} pages  {}ms",
                    green("✔"),
                    bold(&chapter.id.to_string()),
                    chapter.pages.len(),
                    start.elapsed().as_millis()
                );
            }
            print_json(&chapter)?;
        }
        Command::DeleteChapter { id, user } => {
            let outcome = ingestor
                .delete_chapter(id, user)
                .await
                .context("Could not delete chapter")?;
            for w in &outcome.warnings {
                eprintln!("{} {}", cyan("⚠"), w);
            }
            if !cli.quiet {
                eprintln!(
                    "{} deleted chapter {} ({} pages)",
                    green("✔"),
                    outcome.chapter.id,
                    outcome.chapter.pages.len()
                );
            }
            print_json(&outcome)?;
        }
        Command::View { id } => {
            let chapter = ingestor.record_view(id).await.context("Could not record view")?;
            print_json(&chapter)?;
        }
        Command::RenameChapter { id, title, user } => {
            let chapter = ingestor
                .rename_chapter(id, &title, user)
                .await
                .context("Could not rename chapter")?;
            print_json(&chapter)?;
        }
        Command::Show { id } => print_json(&ingestor.comic_detail(id).await?)?,
        Command::Latest { limit } => print_json(&ingestor.latest_releases(limit).await?)?,
        Command::List { user } => print_json(&ingestor.comics_by_author(user).await?)?,
    }

    Ok(())
}

/// `--local-store` wins; otherwise Cloudinary credentials must be present.
fn build_remote(cli: &Cli) -> Result<Arc<dyn RemoteStore>> {
    if let Some(ref root) = cli.local_store {
        let base_url = match cli.base_url {
            Some(ref url) => url.clone(),
            None => {
                let abs = std::path::absolute(root)
                    .with_context(|| format!("Cannot resolve {}", root.display()))?;
                format!("file://{}", abs.display())
            }
        };
        return Ok(Arc::new(LocalStore::new(root, base_url)));
    }
    if cli.base_url.is_some() {
        bail!("--base-url only applies together with --local-store");
    }
    let config = CloudinaryConfig::from_env()
        .context("No --local-store given and Cloudinary credentials are incomplete")?;
    Ok(Arc::new(CloudinaryStore::new(config)?))
}

async fn read_page(path: &Path) -> Result<PageFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(PageFile::new(file_name, media_type_for(path), bytes))
}

/// Guess the declared media type from the extension, the way a browser
/// would fill in a multipart part.
fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

fn put_opt(fields: &mut FormFields, key: &str, value: Option<String>) {
    if let Some(v) = value {
        fields.insert(key.to_string(), v);
    }
}

fn put_flag(fields: &mut FormFields, key: &str, on: bool) {
    if on {
        fields.insert(key.to_string(), "on".to_string());
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}
