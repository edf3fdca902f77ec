// pair-dl - command-line front end for the pair download manager.
//
// Parses arguments into a library Config, acquires a session, and drives
// the pipeline. Exit status: 0 = success, 1 = partial failure (some pairs
// failed), 2 = fatal setup failure (auth or input list unavailable).

use clap::Parser;
use pair_dl::{
    AcquireMode, AuthContext, Config, PairDownloader, RunOptions, SessionProvider, source,
};
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Bulk downloader for paired files from a cookie-authenticated archive.
///
/// Reads URL pairs from a spreadsheet export or CSV, downloads each pair
/// into an organized folder with resume support, extracts document
/// summaries, and optionally marks files online-only afterwards.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Spreadsheet id to fetch URL pairs from
    #[arg(long, help_heading = "URL source (pick one)")]
    sheet_id: Option<String>,

    /// Full spreadsheet URL (the sheet id is extracted automatically)
    #[arg(long, help_heading = "URL source (pick one)")]
    sheet_url: Option<String>,

    /// Path to a local CSV file with URL pairs
    #[arg(long, value_name = "FILE", help_heading = "URL source (pick one)")]
    csv: Option<PathBuf>,

    /// Column name for primary-document URLs
    #[arg(long, default_value = "PDF URL", help_heading = "URL source (pick one)")]
    primary_col: String,

    /// Column name for media URLs
    #[arg(long, default_value = "MOV URL", help_heading = "URL source (pick one)")]
    media_col: String,

    /// Paste cookies manually instead of trying the cache first
    #[arg(long, help_heading = "Authentication")]
    manual: bool,

    /// Run non-interactively (cached session only; fail if absent)
    #[arg(long, help_heading = "Authentication")]
    no_prompt: bool,

    /// Page to open for authentication guidance
    #[arg(long, help_heading = "Authentication")]
    auth_url: Option<String>,

    /// Comma-separated required cookie names
    #[arg(long, help_heading = "Authentication")]
    cookie_names: Option<String>,

    /// Output directory
    #[arg(short, long, default_value = "./library", help_heading = "Download options")]
    output: PathBuf,

    /// Parallel download workers
    #[arg(short, long, default_value_t = 5, help_heading = "Download options")]
    workers: usize,

    /// Process only the first N pairs (0 = all)
    #[arg(long, default_value_t = 0, help_heading = "Download options")]
    limit: usize,

    /// Force re-download of all pairs (ignore ledger and existing folders)
    #[arg(long, help_heading = "Download options")]
    force: bool,

    /// Comma-separated media extensions to probe in order
    #[arg(long, help_heading = "Download options")]
    extensions: Option<String>,

    /// Also probe image extensions (jpg, png, ...) after the video ones
    #[arg(long, help_heading = "Download options")]
    extended_extensions: bool,

    /// Show planned work without downloading anything
    #[arg(long, help_heading = "Download options")]
    dry_run: bool,

    /// Skip document summary extraction
    #[arg(long, help_heading = "Post-processing")]
    no_summary: bool,

    /// Re-generate summaries for all downloaded pairs (no downloading)
    #[arg(long, help_heading = "Post-processing")]
    resummarize: bool,

    /// Mark files online-only after the run to free local space
    #[arg(long, help_heading = "Post-processing")]
    dehydrate: bool,

    /// Only mark existing files online-only (no downloading)
    #[arg(long, help_heading = "Post-processing")]
    dehydrate_only: bool,

    /// Re-fetch the URL list, ignoring the local cache
    #[arg(long, help_heading = "Post-processing")]
    refresh_urls: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("fatal: {e}");
            2
        }
    };
    std::process::exit(code);
}

async fn run(args: Args) -> pair_dl::Result<i32> {
    let config = build_config(&args)?;
    let downloader = PairDownloader::new(config.clone())?;

    // Post-processing-only modes need no session
    if args.dehydrate_only {
        let dehydrated = downloader.dehydrate_only().await?;
        println!("Marked {dehydrated} pairs online-only.");
        return Ok(0);
    }
    if args.resummarize {
        let summarized = downloader.resummarize().await?;
        println!("Regenerated summaries for {summarized} pairs.");
        return Ok(0);
    }

    let auth = acquire_session(&config, &args).await?;

    let options = RunOptions {
        force: args.force,
        dry_run: args.dry_run,
        skip_summaries: args.no_summary,
        dehydrate: args.dehydrate,
        refresh_urls: args.refresh_urls,
    };
    let summary = pair_dl::run_with_shutdown(&downloader, &auth, options).await?;

    println!();
    println!("Declared pairs:    {}", summary.declared);
    println!("Already complete:  {}", summary.already_complete);
    println!("Downloaded:        {}", summary.downloaded);
    println!("Skipped (no media): {}", summary.skipped_no_media);
    println!("Failed:            {}", summary.failed);
    println!("Summarized:        {}", summary.summarized);
    if summary.dehydrated > 0 {
        println!("Dehydrated:        {}", summary.dehydrated);
    }
    println!("Output: {}", config.download.output_dir.display());

    Ok(if summary.has_failures() { 1 } else { 0 })
}

fn build_config(args: &Args) -> pair_dl::Result<Config> {
    let mut config = Config::default();

    config.source.csv_path = args.csv.clone();
    config.source.primary_column = args.primary_col.clone();
    config.source.media_column = args.media_col.clone();
    config.source.sheet_id = match (&args.sheet_id, &args.sheet_url) {
        (Some(id), _) => Some(id.clone()),
        (None, Some(url)) => Some(source::extract_sheet_id(url)?),
        (None, None) => None,
    };

    if let Some(auth_url) = &args.auth_url {
        config.auth.auth_url = auth_url.clone();
    }
    if let Some(names) = &args.cookie_names {
        config.auth.required_cookies = names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
    }

    config.download.output_dir = args.output.clone();
    config.download.workers = args.workers;
    config.download.limit = args.limit;
    if let Some(extensions) = &args.extensions {
        config.download.media_extensions = extensions
            .split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .collect();
    } else if args.extended_extensions {
        config.download.media_extensions = pair_dl::config::extended_media_extensions();
    }

    config.validate()?;
    Ok(config)
}

async fn acquire_session(config: &Config, args: &Args) -> pair_dl::Result<AuthContext> {
    let provider = SessionProvider::new(config.auth.clone(), config.download.request_timeout);

    if args.no_prompt {
        return provider.acquire(AcquireMode::Cached).await;
    }

    if !args.manual {
        match provider.acquire(AcquireMode::Cached).await {
            Ok(auth) => {
                info!("reusing cached session");
                return Ok(auth);
            }
            Err(e) => info!("cached session unusable ({e}), falling back to manual entry"),
        }
    }

    let cookie_text = prompt_for_cookies(&config.auth.auth_url)?;
    provider.acquire(AcquireMode::Manual { cookie_text }).await
}

fn prompt_for_cookies(auth_url: &str) -> pair_dl::Result<String> {
    println!();
    println!("MANUAL COOKIE ENTRY");
    println!("  1. Open {auth_url} in your browser and pass any challenges.");
    println!("  2. DevTools (F12) -> Console tab");
    println!("  3. Type:  document.cookie  -> Enter");
    println!("  4. Copy the entire output and paste below");
    print!("> ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
