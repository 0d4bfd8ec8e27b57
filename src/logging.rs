//! Log file setup and the structured log records shared across the pipeline.

use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use chrono::Local;
use tracing::level_filters::LevelFilter;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt as log_fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};

use crate::config::Config;
use crate::diagnostics::{self, Diagnostics};
use crate::progress::ConsoleWriter;

const LOG_PREFIX: &str = "fontsampler_";

/// Files written by the installed subscriber, plus the diagnostics
/// collector it feeds.
#[derive(Debug, Clone)]
pub struct LoggingHandle {
    pub log_file: PathBuf,
    pub error_log_file: PathBuf,
    pub diagnostics: Diagnostics,
}

/// Install the global subscriber: a console layer (WARN, or the configured
/// level when `verbose`), a DEBUG log file, an ERROR-only log file and the
/// diagnostics collector.
pub fn setup_logging(config: &Config, verbose: bool) -> io::Result<LoggingHandle> {
    fs::create_dir_all(&config.log_dir)?;
    let removed = cleanup_old_logs(&config.log_dir, config.log_max_age_days);

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let log_file = config.log_dir.join(format!("{}{}.log", LOG_PREFIX, stamp));
    let error_log_file = config
        .log_dir
        .join(format!("{}errors_{}.log", LOG_PREFIX, stamp));
    let detail = File::create(&log_file)?;
    let errors = File::create(&error_log_file)?;

    let console_level = if verbose {
        config.log_level.parse::<Level>().unwrap_or(Level::INFO)
    } else {
        Level::WARN
    };
    let console_filter =
        filter_fn(move |meta| *meta.level() <= console_level && !diagnostics::is_diagnostic(meta));

    let diagnostics = Diagnostics::new();
    let subscriber = tracing_subscriber::registry()
        .with(
            log_fmt::layer()
                .with_writer(ConsoleWriter::default)
                .with_target(false)
                .with_filter(console_filter),
        )
        .with(
            log_fmt::layer()
                .with_ansi(false)
                .with_line_number(true)
                .with_writer(Mutex::new(detail))
                .with_filter(LevelFilter::DEBUG),
        )
        .with(
            log_fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(errors))
                .with_filter(LevelFilter::ERROR),
        )
        .with(diagnostics.layer());
    tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;

    info!(log_file = %log_file.display(), removed_old_logs = removed, "logging initialised");
    Ok(LoggingHandle {
        log_file,
        error_log_file,
        diagnostics,
    })
}

/// Delete `fontsampler_*.log` files in `dir` at least `max_age_days` old.
/// Returns how many were removed.
pub fn cleanup_old_logs(dir: &Path, max_age_days: u64) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    let max_age = Duration::from_secs(max_age_days * 24 * 60 * 60);
    let now = SystemTime::now();

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(LOG_PREFIX) || !name.ends_with(".log") {
            continue;
        }
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age >= max_age {
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => debug!(file = %name, error = %e, "could not remove old log"),
            }
        }
    }
    removed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStatus {
    Success,
    Failed,
    Skipped,
    ValidationFailed,
}

impl fmt::Display for FontStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FontStatus::Success => "SUCCESS",
            FontStatus::Failed => "FAILED",
            FontStatus::Skipped => "SKIPPED",
            FontStatus::ValidationFailed => "VALIDATION_FAILED",
        })
    }
}

pub fn log_font_processing(path: &Path, status: FontStatus, details: &str) {
    let path = path.display();
    match status {
        FontStatus::Success => debug!(%path, %status, "{}", details),
        FontStatus::Skipped | FontStatus::ValidationFailed => info!(%path, %status, "{}", details),
        FontStatus::Failed => error!(%path, %status, "{}", details),
    }
}

pub fn log_memory_usage(operation: &str, before_mb: f64, after_mb: f64, peak_mb: f64) {
    debug!(
        operation,
        "memory: before {:.1}MB, after {:.1}MB ({:+.1}MB), peak {:.1}MB",
        before_mb,
        after_mb,
        after_mb - before_mb,
        peak_mb
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfStage {
    Start,
    Progress,
    Complete,
    Error,
}

impl fmt::Display for PdfStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PdfStage::Start => "START",
            PdfStage::Progress => "PROGRESS",
            PdfStage::Complete => "COMPLETE",
            PdfStage::Error => "ERROR",
        })
    }
}

pub fn log_pdf_generation(stage: PdfStage, details: &str) {
    match stage {
        PdfStage::Error => error!(%stage, "PDF generation: {}", details),
        _ => info!(%stage, "PDF generation: {}", details),
    }
}

/// A font the PDF layer had trouble with.
pub fn log_pdf_font_issue(fonts: &[&str], issue_type: &str, message: &str, stage: &str) {
    warn!(
        category = diagnostics::EMBEDDING,
        fonts = %fonts.join(", "),
        issue_type,
        stage,
        "{}",
        message
    );
}

/// Outcome of retrying a font with full embedding after subsetting failed.
pub fn log_pdf_font_optimization_retry(message: &str, success: bool, retry_error: Option<&str>) {
    if success {
        info!(original_error = message, "retry without subsetting succeeded");
    } else {
        warn!(
            category = diagnostics::EMBEDDING,
            original_error = message,
            retry_error = retry_error.unwrap_or("unknown"),
            "retry without subsetting failed"
        );
    }
}
