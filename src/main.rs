//! CLI entry point for arxin.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use arxin_core::{
    ArxivClient, Backfill, BackfillReport, CategoryTaxonomy, Database, FeedClientOptions,
    FileRejectionSink, KeywordVocabulary, PageThrottle, Synchronizer, resolve_window,
};
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod exit_handler;

use app_config::{FileConfig, LoadedConfig};
use cli::{Args, Command};
use exit_handler::{ProcessExit, determine_exit_outcome};

const DEFAULT_DATABASE_PATH: &str = "arxiv.db";
const DEFAULT_REJECTED_DIR: &str = "log/rejected";
const DEFAULT_REQUEST_DELAY_MS: u64 = 3000;

/// Effective settings after merging CLI flags over file config over defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    database_path: PathBuf,
    rejected_dir: PathBuf,
    request_delay: Duration,
    categories_file: Option<PathBuf>,
    feed: FeedClientOptions,
}

impl Settings {
    fn resolve(args: &Args, file: &FileConfig) -> Self {
        let defaults = FeedClientOptions::default();
        let feed = FeedClientOptions {
            base_url: file.api_base_url.clone().unwrap_or(defaults.base_url),
            page_size: file.page_size.unwrap_or(defaults.page_size),
            connect_timeout: file
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            read_timeout: file
                .read_timeout_secs
                .map_or(defaults.read_timeout, Duration::from_secs),
        };
        let delay_ms = args
            .delay_ms
            .or(file.request_delay_ms)
            .unwrap_or(DEFAULT_REQUEST_DELAY_MS);

        Self {
            database_path: args
                .database
                .clone()
                .or_else(|| file.database_path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            rejected_dir: args
                .rejected_dir
                .clone()
                .or_else(|| file.rejected_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REJECTED_DIR)),
            request_delay: Duration::from_millis(delay_ms),
            categories_file: file.categories_file.clone(),
            feed,
        }
    }
}

/// Log filter when `RUST_LOG` is unset.
///
/// Priority: quiet flag > verbose flag > config verbosity > default (info)
fn default_log_level(args: &Args, file: &FileConfig) -> &'static str {
    if args.quiet {
        return "error";
    }
    match args.verbose {
        0 => file.verbosity.map_or("info", |verbosity| verbosity.filter_level()),
        1 => "debug",
        _ => "trace",
    }
}

fn load_config(args: &Args) -> Result<LoadedConfig> {
    match args.config.as_deref() {
        Some(path) => app_config::load_explicit_file_config(path),
        None => app_config::load_default_file_config(),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let loaded = load_config(&args)?;
    let file_config = loaded.file_config();

    // Priority: RUST_LOG env var > CLI flags > config file > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(default_log_level(&args, &file_config))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, config_path = ?loaded.path, "CLI arguments parsed");
    let settings = Settings::resolve(&args, &file_config);
    debug!(?settings, "settings resolved");

    let taxonomy = match settings.categories_file.as_deref() {
        Some(path) => CategoryTaxonomy::from_path(path)?,
        None => CategoryTaxonomy::bundled()?,
    };
    let vocabulary = KeywordVocabulary::builtin();

    ensure_parent_dir(&settings.database_path)?;
    let db = Database::new(&settings.database_path)
        .await
        .with_context(|| {
            format!(
                "Failed to open database '{}'",
                settings.database_path.display()
            )
        })?;
    db.seed_reference_data(&taxonomy, &vocabulary).await?;

    let outcome = match args.command {
        Command::Init => {
            info!(
                path = %settings.database_path.display(),
                categories = taxonomy.len(),
                keywords = vocabulary.len(),
                "database initialized"
            );
            ProcessExit::Success
        }
        Command::Reset { yes } => {
            if !yes {
                db.close().await;
                bail!("Refusing to reset without --yes: every stored article would be deleted");
            }
            db.reset(&taxonomy, &vocabulary).await?;
            ProcessExit::Success
        }
        Command::Backfill { start, end } => {
            let synchronizer = Synchronizer::new(taxonomy, vocabulary);
            let report = run_backfill(&db, &settings, &synchronizer, start, end).await;
            match report {
                Ok(report) => determine_exit_outcome(&report),
                Err(error) => {
                    db.close().await;
                    return Err(error);
                }
            }
        }
    };

    db.close().await;
    Ok(outcome.into())
}

async fn run_backfill(
    db: &Database,
    settings: &Settings,
    synchronizer: &Synchronizer,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<BackfillReport> {
    let client = ArxivClient::new(&settings.feed)?;
    let throttle = PageThrottle::new(settings.request_delay);
    let sink = FileRejectionSink::new(&settings.rejected_dir);

    let mut conn = db.pool().acquire().await?;
    let window = resolve_window(&mut *conn, start, end, Utc::now()).await?;
    if window.start > window.end {
        bail!(
            "Backfill start {} is after end {}",
            window.start,
            window.end
        );
    }
    if throttle.is_disabled() {
        warn!("page delay disabled; only do this against a local mirror");
    }

    let report = Backfill::new(&client, synchronizer, &sink, &throttle)
        .run(&mut *conn, window)
        .await;
    info!(
        window = %report.window,
        pages = report.pages_fetched,
        entries = report.entries_seen,
        inserted = report.inserted,
        updated = report.updated,
        duplicates = report.duplicates_skipped,
        rejected = report.rejections(),
        stop = %report.stop,
        "backfill summary"
    );
    Ok(report)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory '{}'", parent.display()))?;
    }
    Ok(())
}
