use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use fontsampler::{
    CatalogError, CatalogSummary, Config, ConfigBuilder, DEFAULT_OUTPUT, Diagnostics, FontSource,
    LEGACY_BATCH_SIZE, MAX_FONTS, ProcMemory, ProcessingStats, StreamingFontProcessor,
    SubsettingMode, find_fonts, generate_pdf_incremental, process_fonts_with_streaming,
    setup_logging,
};

const EXAMPLES: &str = "\
Examples:
  fontsampler ~/fonts
  fontsampler /usr/share/fonts -o system_fonts.pdf -l 50
  fontsampler ./fonts --scenario typography --subsetting disabled
  fontsampler ./fonts --legacy-mode -v";

#[derive(Parser)]
#[command(name = "fontsampler")]
#[command(about = "Generate a PDF catalog of the fonts in a directory", long_about = None)]
#[command(after_help = EXAMPLES)]
struct Args {
    /// Directory to scan for .ttf and .otf files
    #[arg(value_name = "DIRECTORY")]
    directory: PathBuf,

    /// Output PDF file
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Log progress to the console
    #[arg(short, long)]
    verbose: bool,

    /// Include at most this many fonts
    #[arg(short, long)]
    limit: Option<usize>,

    /// Collect every font up front and process with a fixed batch size
    #[arg(long)]
    legacy_mode: bool,

    /// Sample text scenario (default, typography, international)
    #[arg(long)]
    scenario: Option<String>,

    /// Font subsetting mode
    #[arg(long, value_name = "auto|enabled|disabled")]
    subsetting: Option<SubsettingMode>,

    /// Starting batch size
    #[arg(long)]
    batch_size: Option<usize>,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for log files
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Stop at the first font that cannot be embedded
    #[arg(long)]
    no_skip_problematic: bool,
}

fn build_config(args: &Args) -> Result<Config, fontsampler::ConfigError> {
    let base = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    let mut builder = ConfigBuilder::from_config(base).show_progress(!args.verbose);
    if let Some(scenario) = &args.scenario {
        builder = builder.scenario(scenario.clone());
    }
    if let Some(mode) = args.subsetting {
        builder = builder.font_subsetting(mode);
    }
    if let Some(size) = args.batch_size {
        builder = builder.base_batch_size(size);
    }
    if let Some(dir) = &args.log_dir {
        builder = builder.log_dir(dir.clone());
    }
    if args.no_skip_problematic {
        builder = builder.skip_problematic_fonts(false);
    }
    if args.legacy_mode {
        builder = builder
            .base_batch_size(LEGACY_BATCH_SIZE)
            .batch_bounds(LEGACY_BATCH_SIZE, LEGACY_BATCH_SIZE);
    }
    builder.build()
}

fn check_directory(dir: &Path) -> Result<(), String> {
    if !dir.exists() {
        return Err(format!("Directory '{}' does not exist", dir.display()));
    }
    if !dir.is_dir() {
        return Err(format!("'{}' is not a directory", dir.display()));
    }
    Ok(())
}

fn print_summary(summary: &CatalogSummary, stats: &ProcessingStats) {
    println!();
    println!("PDF written to {}", summary.output.display());
    println!("  Fonts included: {}", summary.fonts_included);
    println!(
        "  Pages: {} ({} table of contents)",
        summary.page_count, summary.toc_pages
    );
    if !summary.full_after_retry.is_empty() {
        println!(
            "  Embedded without subsetting: {}",
            summary.full_after_retry.join(", ")
        );
    }
    let rejected = stats.rejected + summary.rejected.len();
    if rejected > 0 {
        println!("  Fonts skipped: {}", rejected);
    }
    if stats.metadata_warnings > 0 {
        println!("  Fonts with incomplete metadata: {}", stats.metadata_warnings);
    }
    println!("  Memory: {}", summary.memory);
}

/// Legacy mode cuts the discovered paths to `--limit` first and then to
/// [`MAX_FONTS`].
fn limit_legacy_paths(mut paths: Vec<PathBuf>, limit: Option<usize>) -> Vec<PathBuf> {
    if let Some(limit) = limit {
        paths.truncate(limit);
    }
    if paths.len() > MAX_FONTS {
        println!("Limiting to the first {} fonts", MAX_FONTS);
        paths.truncate(MAX_FONTS);
    }
    paths
}

/// Where fonts come from, and how many valid fonts to take from the stream.
///
/// Legacy mode applies `--limit` to discovered paths; streaming mode applies
/// it to the first valid fonts instead.
fn select_fonts(args: &Args) -> Result<(FontSource, usize), CatalogError> {
    if !args.legacy_mode {
        let limit = args.limit.unwrap_or(usize::MAX);
        return Ok((FontSource::Directory(args.directory.clone()), limit));
    }

    let paths = find_fonts(&args.directory);
    if paths.is_empty() {
        println!("No font files (.ttf, .otf) found");
        return Err(CatalogError::NoFonts);
    }
    println!("Found {} font files", paths.len());
    let paths = limit_legacy_paths(paths, args.limit);
    Ok((FontSource::Paths(paths), usize::MAX))
}

fn run(args: &Args, config: &Config) -> Result<(), CatalogError> {
    let memory = ProcMemory;
    let mut processor = StreamingFontProcessor::new(config.clone(), &memory);

    let (source, limit) = select_fonts(args)?;
    let stream = process_fonts_with_streaming(&mut processor, source)?;
    let summary = match generate_pdf_incremental(stream.take(limit), &args.output, config, &memory) {
        Ok(summary) => summary,
        Err(CatalogError::NoFonts) => {
            println!("No compatible fonts found");
            return Err(CatalogError::NoFonts);
        }
        Err(e) => return Err(e),
    };

    print_summary(&summary, &processor.stats());
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    println!("FontSampler - Generate PDF font catalog");
    println!("{}", "=".repeat(40));

    if let Err(message) = check_directory(&args.directory) {
        eprintln!("Error: {}", message);
        return ExitCode::FAILURE;
    }

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let diagnostics = match setup_logging(&config, args.verbose) {
        Ok(handle) => {
            tracing::debug!(log_file = %handle.log_file.display(), "run started");
            handle.diagnostics
        }
        Err(e) => {
            eprintln!("Warning: could not set up log files: {}", e);
            Diagnostics::new()
        }
    };

    let result = run(&args, &config);

    if let Some(summary) = diagnostics.render_summary() {
        println!();
        print!("{}", summary);
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(CatalogError::NoFonts) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
