use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::vec;

use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::diagnostics;
use crate::discovery::{FontScanner, count_directories};
use crate::embed::{EmbeddingMode, EmbeddingPolicy};
use crate::error::{CatalogError, FontError};
use crate::logging::{FontStatus, log_font_processing};
use crate::memory::{MemoryMonitor, MemorySource, check_memory_safety, next_batch_size};
use crate::metadata::{FontInfo, extract_font_info};
use crate::progress::{batch_bar, progress_enabled, scan_bar};
use crate::validation::{Validation, log_font_validation_issue, register_font, validate_font};

/// Where the fonts to process come from.
#[derive(Debug, Clone)]
pub enum FontSource {
    Directory(PathBuf),
    Paths(Vec<PathBuf>),
}

/// Counters for one run of a [`StreamingFontProcessor`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessingStats {
    pub processed: usize,
    pub valid: usize,
    pub rejected: usize,
    pub metadata_warnings: usize,
    pub subsetting_issues: usize,
    /// Rejection reason per file name.
    pub errors: BTreeMap<String, String>,
}

/// Validates fonts in memory-bounded batches.
pub struct StreamingFontProcessor<'m> {
    config: Config,
    policy: EmbeddingPolicy,
    memory: &'m dyn MemorySource,
    rejected: Vec<PathBuf>,
    validation_errors: BTreeMap<String, String>,
    processed: usize,
    valid: usize,
    metadata_warnings: usize,
    subsetting_issues: usize,
}

impl<'m> StreamingFontProcessor<'m> {
    pub fn new(config: Config, memory: &'m dyn MemorySource) -> Self {
        let policy = EmbeddingPolicy::from_config(&config);
        StreamingFontProcessor {
            config,
            policy,
            memory,
            rejected: Vec::new(),
            validation_errors: BTreeMap::new(),
            processed: 0,
            valid: 0,
            metadata_warnings: 0,
            subsetting_issues: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Lazily extract, register and validate `paths`, yielding valid fonts
    /// one batch at a time.
    pub fn process(&mut self, paths: Vec<PathBuf>) -> FontStream<'_, 'm> {
        let progress = batch_bar(
            paths.len() as u64,
            "Validating",
            progress_enabled(&self.config),
        );
        let batch_size = self.config.initial_batch_size();
        FontStream {
            processor: self,
            paths: paths.into_iter(),
            batch_size,
            ready: VecDeque::new(),
            done: false,
            progress,
        }
    }

    /// Run one font through the pipeline.
    ///
    /// `Ok(None)` means the font was rejected and skipped.
    pub fn process_font(&mut self, path: &Path) -> Result<Option<FontInfo>, CatalogError> {
        self.processed += 1;

        let mut info = match extract_font_info(path) {
            Ok(info) => info,
            Err(e) => {
                warn!(
                    category = diagnostics::PARSER,
                    path = %path.display(),
                    "metadata extraction failed: {}",
                    e
                );
                return self.reject(path, FontStatus::Failed, e);
            }
        };
        if info.family.is_empty() || info.name.is_empty() {
            self.metadata_warnings += 1;
            warn!(
                category = diagnostics::PARSER,
                file = %info.file,
                "name table lacks family or full name"
            );
        }

        let family = match register_font(path, self.config.min_font_size_bytes) {
            Ok(family) => family,
            Err(e) => {
                let issue_type = match e {
                    FontError::Io(_) => "registration_error",
                    ref other => other.issue_type(),
                };
                log_font_validation_issue(path, issue_type, &e.to_string());
                return self.reject(path, FontStatus::Skipped, e);
            }
        };

        match validate_font(path, &family, &self.policy) {
            Ok(Validation::Ok) => {}
            Ok(Validation::SubsettingIssue(reason)) => {
                self.subsetting_issues += 1;
                debug!(file = %info.file, reason, "font accepted with full embedding");
                info.embedding = Some(EmbeddingMode::Full);
            }
            Err(e) => {
                log_font_validation_issue(path, e.issue_type(), &e.to_string());
                return self.reject(path, FontStatus::ValidationFailed, e);
            }
        }

        info.registered_name = Some(family);
        self.valid += 1;
        log_font_processing(path, FontStatus::Success, info.display_name());
        Ok(Some(info))
    }

    fn reject(
        &mut self,
        path: &Path,
        status: FontStatus,
        error: FontError,
    ) -> Result<Option<FontInfo>, CatalogError> {
        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let reason = error.to_string();
        log_font_processing(path, status, &reason);
        self.rejected.push(path.to_path_buf());
        self.validation_errors.insert(file.clone(), reason.clone());

        if self.config.skip_problematic_fonts {
            Ok(None)
        } else {
            Err(CatalogError::ProblematicFont { file, reason })
        }
    }

    pub fn rejected(&self) -> &[PathBuf] {
        &self.rejected
    }

    pub fn stats(&self) -> ProcessingStats {
        ProcessingStats {
            processed: self.processed,
            valid: self.valid,
            rejected: self.rejected.len(),
            metadata_warnings: self.metadata_warnings,
            subsetting_issues: self.subsetting_issues,
            errors: self.validation_errors.clone(),
        }
    }
}

/// Valid fonts from a [`StreamingFontProcessor`], produced batch by batch.
pub struct FontStream<'p, 'm> {
    processor: &'p mut StreamingFontProcessor<'m>,
    paths: vec::IntoIter<PathBuf>,
    batch_size: usize,
    ready: VecDeque<FontInfo>,
    done: bool,
    progress: ProgressBar,
}

impl FontStream<'_, '_> {
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn run_batch(&mut self) -> Result<bool, CatalogError> {
        let batch: Vec<PathBuf> = self.paths.by_ref().take(self.batch_size).collect();
        if batch.is_empty() {
            return Ok(false);
        }
        let full = batch.len() == self.batch_size;
        let mut monitor = MemoryMonitor::new(self.processor.memory);

        for path in &batch {
            let result = self.processor.process_font(path);
            self.progress.inc(1);
            if let Some(info) = result? {
                self.ready.push_back(info);
            }
            monitor.update_peak();
        }
        monitor.release_batch("font validation batch", batch);

        if full {
            let next = next_batch_size(
                self.processor.memory,
                &self.processor.config,
                self.batch_size,
            );
            if next != self.batch_size {
                info!("Adjusting batch size: {} → {}", self.batch_size, next);
                self.batch_size = next;
            }
        }
        Ok(true)
    }
}

impl Iterator for FontStream<'_, '_> {
    type Item = Result<FontInfo, CatalogError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(info) = self.ready.pop_front() {
                return Some(Ok(info));
            }
            if self.done {
                return None;
            }
            match self.run_batch() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    self.progress.finish_and_clear();
                }
                Err(e) => {
                    self.done = true;
                    self.ready.clear();
                    self.progress.abandon();
                    return Some(Err(e));
                }
            }
        }
    }
}

fn discover(root: &Path, show_progress: bool) -> Vec<PathBuf> {
    let progress = scan_bar(count_directories(root) as u64, show_progress);
    let mut scanner = FontScanner::new(root);
    let mut paths = Vec::new();
    while let Some(path) = scanner.next() {
        paths.push(path);
        progress.set_position(scanner.dirs_visited() as u64);
    }
    progress.finish_and_clear();
    debug!(
        root = %root.display(),
        dirs = scanner.dirs_visited(),
        fonts = paths.len(),
        "scan complete"
    );
    paths
}

/// Discover (or take) the font paths, check the memory estimate and start
/// streaming them through `processor`.
pub fn process_fonts_with_streaming<'p, 'm>(
    processor: &'p mut StreamingFontProcessor<'m>,
    source: FontSource,
) -> Result<FontStream<'p, 'm>, CatalogError> {
    let paths = match source {
        FontSource::Directory(root) => {
            if !root.is_dir() {
                return Err(CatalogError::InvalidDirectory(root));
            }
            discover(&root, progress_enabled(&processor.config))
        }
        FontSource::Paths(paths) => paths,
    };

    if paths.is_empty() {
        warn!("No font files found");
        return Ok(processor.process(paths));
    }
    info!("Found {} font files", paths.len());

    if let Some(message) = check_memory_safety(
        paths.len(),
        processor.config.estimated_memory_per_font,
        processor.memory.available_mb(),
    ) {
        warn!(category = diagnostics::SYSTEM, "{}", message);
    }

    Ok(processor.process(paths))
}
