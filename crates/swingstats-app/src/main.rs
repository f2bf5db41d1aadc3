// SwingStats entry point.
//
// Startup sequence:
// 1. Initialize tracing (appending to logs/swingstats.log)
// 2. Load config
// 3. Open database and check it responds
// 4. Ingest the workbooks named on the command line, or the inbox
// 5. Compute per-match metrics and the cross-match analysis
// 6. Write reports to the output directory

use std::path::{Path, PathBuf};

use swingstats_core::cache::AnalyticsCache;
use swingstats_core::config;
use swingstats_core::db::Database;
use swingstats_core::ingest::{BatchSummary, FileReport, Ingestor};
use swingstats_core::metrics::MetricsEngine;
use swingstats_core::report::{self, AnalysisReport};

use anyhow::Context;
use tracing::{info, warn};

const LOG_FILE: &str = "logs/swingstats.log";
const DEFAULT_LOG_FILTER: &str = "swingstats_core=info,swingstats_app=info,warn";

fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("SwingStats starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!("Config loaded: subject={}", config.analysis.subject);

    // 3. Open database
    let db = Database::open_with_busy_timeout(&config.db_path, config.database.busy_timeout_ms)
        .context("failed to open database")?;
    db.ping().context("database did not respond")?;
    info!("Database opened at {}", config.db_path);

    let cache = AnalyticsCache::new();

    // 4. Ingest
    let inputs = input_paths(config.ingest.inbox.as_deref())?;
    if inputs.is_empty() {
        info!("No workbooks to ingest");
    } else {
        let reports = Ingestor::new(&db, &cache).ingest_batch(&inputs);
        print_reports(&reports);
    }

    // 5. Compute
    let engine = MetricsEngine::new(&db, &cache, config.analysis.subject.clone());
    let metrics = engine
        .match_metrics()
        .context("failed to compute match metrics")?;
    let analysis = engine.analysis().context("failed to load analysis tables")?;
    let summary = AnalysisReport::build(&analysis, engine.subject());

    // 6. Write reports
    let out_dir = PathBuf::from(&config.output.dir);
    report::write_all(&out_dir, &metrics, &summary).context("failed to write reports")?;
    println!(
        "{} matches analysed for {}; reports written to {}",
        metrics.len(),
        engine.subject(),
        out_dir.display()
    );

    info!("SwingStats finished");
    Ok(())
}

/// Workbook paths from the command line, or every `.xlsx` in the inbox when
/// none are given.
fn input_paths(inbox: Option<&str>) -> anyhow::Result<Vec<PathBuf>> {
    let args: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if !args.is_empty() {
        return Ok(args);
    }

    let Some(inbox) = inbox else {
        return Ok(Vec::new());
    };
    let dir = Path::new(inbox);
    if !dir.is_dir() {
        warn!("Inbox {} does not exist, nothing to ingest", dir.display());
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("failed to read inbox {}", dir.display()))? {
        let path = entry?.path();
        if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"))
        {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn print_reports(reports: &[FileReport]) {
    for r in reports {
        println!("{}: {}", r.file.display(), r.outcome);
    }
    let s = BatchSummary::from_reports(reports);
    println!(
        "{} uploaded, {} skipped, {} failed",
        s.uploaded, s.skipped, s.failed
    );
}

/// Append this run's log lines to [`LOG_FILE`]. `RUST_LOG` overrides the
/// default filter.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let path = Path::new(LOG_FILE);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
