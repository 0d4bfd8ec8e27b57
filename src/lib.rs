//! Font specimen catalog generator
//!
//! This library scans a directory tree for TrueType and OpenType fonts,
//! validates that each one can be embedded, and writes a single PDF with a
//! table of contents and one specimen per font. Fonts are processed in
//! batches sized from live memory telemetry.

mod catalog;
mod config;
mod data;
mod diagnostics;
mod discovery;
mod embed;
mod error;
mod layout;
mod logging;
mod memory;
mod metadata;
mod processor;
mod progress;
mod specimen;
mod subset;
mod toc;
mod utils;
mod validation;

#[cfg(test)]
mod testutil;

// Re-export error types
pub use error::{CatalogError, ConfigError, FontError, SubsetError};

// Re-export configuration
pub use config::{
    Config, ConfigBuilder, DEFAULT_OUTPUT, LEGACY_BATCH_SIZE, MAX_FONTS, SCENARIOS, Scenario,
    SubsettingMode, testing_scenario,
};

// Re-export the pipeline stages
pub use catalog::{CatalogSummary, extract_font_names_from_error, generate_pdf_incremental};
pub use discovery::{FontScanner, find_fonts, is_font_file};
pub use embed::{EmbeddingMode, EmbeddingPolicy};
pub use metadata::{FontFormat, FontInfo, extract_font_info};
pub use processor::{
    FontSource, FontStream, ProcessingStats, StreamingFontProcessor, process_fonts_with_streaming,
};
pub use validation::{Validation, register_font, validate_font};

// Re-export memory telemetry
pub use memory::{
    MemorySource, MemoryStats, ProcMemory, adaptive_batch_size, check_memory_safety,
};

// Re-export logging and diagnostics
pub use diagnostics::Diagnostics;
pub use logging::{LoggingHandle, cleanup_old_logs, setup_logging};
