use std::io::{self, IsTerminal, Write};
use std::sync::OnceLock;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::config::Config;

/// Every visible bar is drawn through this one set, so console log lines
/// can clear them first.
fn bars() -> &'static MultiProgress {
    static BARS: OnceLock<MultiProgress> = OnceLock::new();
    BARS.get_or_init(|| MultiProgress::with_draw_target(ProgressDrawTarget::stderr_with_hz(12)))
}

/// stderr writer for the console log layer. Active bars are suspended
/// while a record is written.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ConsoleWriter;

impl Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        bars().suspend(|| io::stderr().write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        bars().suspend(|| io::stderr().write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Bars are drawn only on an interactive stderr and when enabled in config.
pub(crate) fn progress_enabled(config: &Config) -> bool {
    config.show_progress && std::io::stderr().is_terminal()
}

fn bar(len: u64, template: &str, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = bars().add(ProgressBar::new(len));
    pb.set_style(
        ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}

/// Directory scan, counted in directories.
pub(crate) fn scan_bar(dirs: u64, enabled: bool) -> ProgressBar {
    bar(
        dirs,
        "Scanning  [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} dirs {msg}",
        enabled,
    )
}

/// Font validation and specimen rendering, counted in fonts.
pub(crate) fn batch_bar(fonts: u64, label: &str, enabled: bool) -> ProgressBar {
    let pb = bar(
        fonts,
        "{prefix:10} [{elapsed_precise}] {bar:30.green/white} {pos}/{len} fonts ({eta}) {msg}",
        enabled,
    );
    pb.set_prefix(label.to_string());
    pb
}

/// Spinner for the final document write.
pub(crate) fn pdf_spinner(message: &str, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = bars().add(ProgressBar::new_spinner());
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
