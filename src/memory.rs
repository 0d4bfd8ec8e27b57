//! Process memory telemetry and the batch sizing rules built on it.

use std::fmt;

use tracing::{debug, info};

use crate::config::Config;

/// Source of memory figures, all in megabytes.
///
/// Any figure may be unavailable, in which case callers keep their previous
/// decisions rather than guessing.
pub trait MemorySource {
    fn rss_mb(&self) -> Option<f64>;
    fn total_mb(&self) -> Option<f64>;
    fn available_mb(&self) -> Option<f64>;
}

/// Reads `/proc/self/status` and `/proc/meminfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcMemory;

/// Value of a `Key:   1234 kB` line, converted to megabytes.
fn parse_kb_field(text: &str, key: &str) -> Option<f64> {
    text.lines().find_map(|line| {
        let rest = line.strip_prefix(key)?.strip_prefix(':')?;
        let kb: f64 = rest.split_whitespace().next()?.parse().ok()?;
        Some(kb / 1024.0)
    })
}

#[cfg(target_os = "linux")]
impl MemorySource for ProcMemory {
    fn rss_mb(&self) -> Option<f64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_kb_field(&status, "VmRSS")
    }

    fn total_mb(&self) -> Option<f64> {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_kb_field(&meminfo, "MemTotal")
    }

    fn available_mb(&self) -> Option<f64> {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_kb_field(&meminfo, "MemAvailable")
    }
}

#[cfg(not(target_os = "linux"))]
impl MemorySource for ProcMemory {
    fn rss_mb(&self) -> Option<f64> {
        None
    }

    fn total_mb(&self) -> Option<f64> {
        None
    }

    fn available_mb(&self) -> Option<f64> {
        None
    }
}

/// Scale `base` down when usage is above `threshold` (a fraction of total
/// memory) and up when below, clamped to `min..=max`.
pub fn adaptive_batch_size(
    current_mb: f64,
    total_mb: f64,
    base: usize,
    threshold: f64,
    min: usize,
    max: usize,
) -> usize {
    if total_mb <= 0.0 {
        return base;
    }
    let pct = current_mb / total_mb;
    if pct > threshold {
        let scaled = (base as f64 * (1.0 - (pct - threshold))).floor().max(0.0) as usize;
        scaled.max(min)
    } else {
        let scaled = (base as f64 * (1.0 + (threshold - pct))).floor() as usize;
        scaled.min(max)
    }
}

/// Recompute the batch size from live telemetry, always scaling from the
/// configured base so repeated adjustments do not compound. `current` is
/// kept when figures are unavailable.
pub(crate) fn next_batch_size(
    memory: &dyn MemorySource,
    config: &Config,
    current: usize,
) -> usize {
    match (memory.rss_mb(), memory.total_mb()) {
        (Some(rss), Some(total)) => adaptive_batch_size(
            rss,
            total,
            config.initial_batch_size(),
            config.memory_threshold,
            config.min_batch_size,
            config.max_batch_size,
        ),
        _ => current,
    }
}

/// Warn when `count` fonts at `per_font_mb` each would use more than 80% of
/// the available memory. Returns `None` when it looks safe or when the
/// available memory is unknown.
pub fn check_memory_safety(
    count: usize,
    per_font_mb: f64,
    available_mb: Option<f64>,
) -> Option<String> {
    let available = available_mb?;
    let estimated = count as f64 * per_font_mb;
    if estimated > available * 0.8 {
        Some(format!(
            "Processing {} fonts may use ~{:.0}MB, only {:.0}MB available",
            count, estimated, available
        ))
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryStats {
    pub start_mb: f64,
    pub current_mb: f64,
    pub peak_mb: f64,
    pub total_increase_mb: f64,
    pub peak_increase_mb: f64,
}

impl fmt::Display for MemoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "start {:.1}MB, current {:.1}MB, peak {:.1}MB (+{:.1}MB)",
            self.start_mb, self.current_mb, self.peak_mb, self.peak_increase_mb
        )
    }
}

/// Tracks the RSS seen at start and the highest RSS seen since.
pub struct MemoryMonitor<'m> {
    source: &'m dyn MemorySource,
    start_mb: f64,
    peak_mb: f64,
}

impl<'m> MemoryMonitor<'m> {
    pub fn new(source: &'m dyn MemorySource) -> Self {
        let start_mb = source.rss_mb().unwrap_or(0.0);
        MemoryMonitor {
            source,
            start_mb,
            peak_mb: start_mb,
        }
    }

    pub fn current_mb(&self) -> f64 {
        self.source.rss_mb().unwrap_or(0.0)
    }

    pub fn update_peak(&mut self) -> f64 {
        let current = self.current_mb();
        if current > self.peak_mb {
            self.peak_mb = current;
        }
        current
    }

    pub fn stats(&self) -> MemoryStats {
        let current_mb = self.current_mb();
        let peak_mb = self.peak_mb.max(current_mb);
        MemoryStats {
            start_mb: self.start_mb,
            current_mb,
            peak_mb,
            total_increase_mb: current_mb - self.start_mb,
            peak_increase_mb: peak_mb - self.start_mb,
        }
    }

    /// Drop a finished batch's buffers and log how much memory that gave back.
    pub fn release_batch<T>(&mut self, operation: &str, batch: Vec<T>) {
        let before = self.update_peak();
        let items = batch.len();
        drop(batch);
        let after = self.current_mb();
        debug!(
            operation,
            items,
            before_mb = before,
            after_mb = after,
            freed_mb = before - after,
            "released batch buffers"
        );
        crate::logging::log_memory_usage(operation, before, after, self.peak_mb);
    }

    pub fn log_summary(&self, operation: &str) {
        let stats = self.stats();
        info!(operation, %stats, "memory usage");
    }
}
