//! CLI entry point for the lecture backup tool.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::pin::pin;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::TryStreamExt;
use lecture_backup::config::default_config_path;
use lecture_backup::session::load_cookie_file;
use lecture_backup::{
    ChunkedDownloader, Config, Database, EchoLocator, HttpSession, HttpSessionOptions,
    IndexRecord, IndexStore, RetryPolicy, SyncEngine, SyncOptions, SyncSummary,
};
use tracing::{debug, error, info, warn};

mod cli;
mod progress;

use cli::{Args, Command};
use progress::ProgressReporter;

/// Process outcome mapped to the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    /// The run reached `Done`, possibly with skipped sections or failed items.
    Success,
    /// The run ended `Failed`.
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Failure => ExitCode::FAILURE,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config_path = args
        .config
        .clone()
        .or_else(default_config_path)
        .context("Cannot determine the home directory; pass --config")?;
    let config = Config::from_file(&config_path).with_context(|| {
        format!(
            "Failed to load configuration from '{}'",
            config_path.display()
        )
    })?;

    tokio::fs::create_dir_all(&config.media_path)
        .await
        .with_context(|| {
            format!(
                "Failed to create media directory '{}'",
                config.media_path.display()
            )
        })?;
    let db = Database::new(&config.index_path())
        .await
        .with_context(|| format!("Failed to open index '{}'", config.index_path().display()))?;
    let index = IndexStore::new(db.clone());

    let exit = match args.command() {
        Command::Sync => run_sync(&args, &config, index).await,
        Command::Index { json } => list_index(&index, json).await,
    };
    db.close().await;
    Ok(exit?.into())
}

async fn run_sync(args: &Args, config: &Config, index: IndexStore) -> Result<ProcessExit> {
    info!(
        sections = config.sections.len(),
        media_path = %config.media_path.display(),
        "Lecture backup starting"
    );

    let mut options = HttpSessionOptions::new(config.user_agent.clone())
        .with_timeouts(config.connect_timeout(), config.read_timeout());
    if let Some(cookie_path) = cookie_path(args, config) {
        let parsed = load_cookie_file(&cookie_path).with_context(|| {
            format!("Failed to load cookies from '{}'", cookie_path.display())
        })?;
        for (line, reason) in &parsed.warnings {
            warn!(line, %reason, "Skipped malformed cookie line");
        }
        let missing = parsed.missing_session_cookies();
        if !missing.is_empty() {
            warn!(?missing, "Cookie file lacks expected session cookies");
        }
        debug!(count = parsed.cookies.len(), "Loaded cookies");
        options = options.with_cookie_jar(parsed.to_jar());
    } else {
        warn!("No cookie file configured; requests are sent without a session");
    }

    let session = HttpSession::new(config.base_url.clone(), options)
        .context("Failed to build the HTTP session")?;
    let retry_policy = RetryPolicy::with_max_attempts(config.max_retries);

    let reporter = ProgressReporter::new(!args.quiet && io::stderr().is_terminal());
    let engine = SyncEngine::new(
        Arc::new(session),
        Arc::new(EchoLocator::new(retry_policy.clone())),
        ChunkedDownloader::new(retry_policy),
        index,
        SyncOptions::new(&config.media_path, config.chunk_size)
            .with_concurrency(config.concurrency),
    )?
    .with_observer(Arc::new(reporter));

    match engine.run(&config.sections).await {
        Ok(summary) => {
            print_summary(&summary)?;
            Ok(ProcessExit::Success)
        }
        Err(e) => {
            error!(error = %e, "Sync failed");
            Ok(ProcessExit::Failure)
        }
    }
}

fn cookie_path(args: &Args, config: &Config) -> Option<PathBuf> {
    args.cookies.clone().or_else(|| config.cookie_file.clone())
}

fn print_summary(summary: &SyncSummary) -> Result<()> {
    let mut out = io::stdout().lock();
    writeln!(
        out,
        "Sync complete: {} downloaded, {} already present, {} failed, {} sections skipped",
        summary.committed,
        summary.already_present,
        summary.failed_items,
        summary.sections_skipped()
    )?;
    for skipped in &summary.skipped_sections {
        writeln!(out, "  skipped {}: {}", skipped.section, skipped.reason)?;
    }
    if !summary.is_clean() {
        warn!("Some recordings were not backed up; the next run retries them");
    }
    Ok(())
}

async fn list_index(index: &IndexStore, json: bool) -> Result<ProcessExit> {
    let mut out = io::stdout().lock();
    let mut records = pin!(index.list_all());
    let mut count = 0usize;

    while let Some(record) = records.try_next().await? {
        if json {
            serde_json::to_writer(&mut out, &record)?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}", format_record(&record))?;
        }
        count += 1;
    }

    if !json {
        writeln!(out, "{count} recordings indexed")?;
    }
    Ok(ProcessExit::Success)
}

fn format_record(record: &IndexRecord) -> String {
    format!(
        "{}  {:>12}  {}  {}",
        record.downloaded_at.format("%Y-%m-%d %H:%M:%S"),
        record.size,
        record.key(),
        record.path.display()
    )
}
