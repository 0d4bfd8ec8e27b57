use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::warn;

use crate::error::ConfigError;

pub const SAMPLE_TEXT: &str = "Sphinx of black quartz, judge my vow!";

pub const PARAGRAPH: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. \
     Integer nec odio. Praesent libero. Sed cursus ante dapibus diam. \
     Sed nisi. Nulla quis sem at nibh elementum imperdiet. \
     ABCDEFGHIJKLMNOPQRSTUVWXYZ abcdefghijklmnopqrstuvwxyz 1234567890 !@#$%^&*()_+-=[]{}|;:,.<>?`~";

pub const GLYPH_LINE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ abcdefghijklmnopqrstuvwxyz 0123456789";

pub const DEFAULT_OUTPUT: &str = "font_samples.pdf";

pub const FONT_EXTENSIONS: [&str; 2] = ["ttf", "otf"];

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const MIN_BATCH_SIZE: usize = 10;
pub const MAX_BATCH_SIZE: usize = 500;

/// Fixed batch size and font cap used by legacy mode.
pub const LEGACY_BATCH_SIZE: usize = 100;
pub const MAX_FONTS: usize = 1000;

pub const ESTIMATED_MEMORY_PER_FONT: f64 = 2.0;

// 20mm in points
const DEFAULT_MARGIN: f32 = 20.0 * 72.0 / 25.4;

/// How font programs are written into the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubsettingMode {
    /// Subset, and fall back to full embedding when subsetting fails.
    #[default]
    Auto,
    /// Subset only; a font that cannot be subset is rejected.
    Enabled,
    /// Always embed the complete font program.
    Disabled,
}

impl FromStr for SubsettingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(SubsettingMode::Auto),
            "enabled" => Ok(SubsettingMode::Enabled),
            "disabled" => Ok(SubsettingMode::Disabled),
            other => Err(ConfigError::Invalid(format!(
                "unknown subsetting mode '{}' (expected auto, enabled or disabled)",
                other
            ))),
        }
    }
}

impl fmt::Display for SubsettingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubsettingMode::Auto => "auto",
            SubsettingMode::Enabled => "enabled",
            SubsettingMode::Disabled => "disabled",
        };
        f.write_str(s)
    }
}

/// Main sample line and paragraph printed on every specimen page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub main: String,
    pub paragraph: String,
}

pub const SCENARIOS: [&str; 3] = ["default", "typography", "international"];

/// Look up a text scenario by name. Unknown names fall back to `default`.
pub fn testing_scenario(name: &str) -> Scenario {
    match name {
        "default" => Scenario {
            main: SAMPLE_TEXT.to_string(),
            paragraph: PARAGRAPH.to_string(),
        },
        "typography" => Scenario {
            main: "The five boxing wizards jump quickly. Office fluff, affine coffee.".to_string(),
            paragraph: "Typography rewards attention: ligatures (fi, fl, ffi, ffl), \
                        figures 0123456789, fractions 1/2 3/4, punctuation \u{2018}quotes\u{2019} \
                        \u{201c}double\u{201d} \u{2013} en dash \u{2014} em dash \u{2026} ellipsis, \
                        and symbols \u{a9} \u{ae} \u{2122} \u{a7} \u{b6} \u{2020} \u{2021}."
                .to_string(),
        },
        "international" => Scenario {
            main: "Voix ambigu\u{eb} d\u{2019}un c\u{153}ur qui au z\u{e9}phyr pr\u{e9}f\u{e8}re les jattes de kiwis."
                .to_string(),
            paragraph: "Falsches \u{dc}ben von Xylophonmusik qu\u{e4}lt jeden gr\u{f6}\u{df}eren Zwerg. \
                        El ping\u{fc}ino Wenceslao hizo kil\u{f3}metros bajo exhaustiva lluvia. \
                        \u{3a4}\u{3ac}\u{3c7}\u{3b9}\u{3c3}\u{3c4}\u{3b7} \u{3b1}\u{3bb}\u{3ce}\u{3c0}\u{3b7}\u{3be} \u{3b2}\u{3b1}\u{3c6}\u{3ae}\u{3c2} \u{3c8}\u{3b7}\u{3bc}\u{3ad}\u{3bd}\u{3b7}. \
                        \u{421}\u{44a}\u{435}\u{448}\u{44c} \u{436}\u{435} \u{435}\u{449}\u{451} \u{44d}\u{442}\u{438}\u{445} \u{43c}\u{44f}\u{433}\u{43a}\u{438}\u{445} \u{444}\u{440}\u{430}\u{43d}\u{446}\u{443}\u{437}\u{441}\u{43a}\u{438}\u{445} \u{431}\u{443}\u{43b}\u{43e}\u{43a}."
                .to_string(),
        },
        other => {
            warn!(scenario = other, "unknown text scenario, using default");
            testing_scenario("default")
        }
    }
}

/// Every tunable of a catalog run.
///
/// Values start from [`Config::default`], may be overridden from a JSON file
/// with [`Config::from_json_file`], and finally from [`ConfigBuilder`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub scenario: String,
    pub glyph_line: String,
    pub sample_sizes: Vec<f32>,
    pub paragraph_size: f32,
    pub paragraph_line_height: f32,

    pub base_batch_size: usize,
    pub min_batch_size: usize,
    pub max_batch_size: usize,
    pub memory_threshold: f64,
    pub estimated_memory_per_font: f64,

    pub min_font_size_bytes: u64,
    pub skip_problematic_fonts: bool,
    pub font_subsetting: SubsettingMode,
    pub retry_without_subsetting: bool,

    pub page_width: f32,
    pub page_height: f32,
    pub page_margin: f32,
    pub header_font_size: f32,
    pub metadata_font_size: f32,

    pub log_dir: PathBuf,
    pub log_level: String,
    pub log_max_age_days: u64,

    pub update_interval: usize,
    pub processing_interval: usize,
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scenario: "default".to_string(),
            glyph_line: GLYPH_LINE.to_string(),
            sample_sizes: vec![36.0, 24.0, 18.0, 14.0],
            paragraph_size: 12.0,
            paragraph_line_height: 14.0,
            base_batch_size: DEFAULT_BATCH_SIZE,
            min_batch_size: MIN_BATCH_SIZE,
            max_batch_size: MAX_BATCH_SIZE,
            memory_threshold: 0.7,
            estimated_memory_per_font: ESTIMATED_MEMORY_PER_FONT,
            min_font_size_bytes: 1024,
            skip_problematic_fonts: true,
            font_subsetting: SubsettingMode::Auto,
            retry_without_subsetting: true,
            page_width: 595.28,
            page_height: 841.89,
            page_margin: DEFAULT_MARGIN,
            header_font_size: 24.0,
            metadata_font_size: 9.0,
            log_dir: PathBuf::from("logs"),
            log_level: "info".to_string(),
            log_max_age_days: 7,
            update_interval: 10,
            processing_interval: 100,
            show_progress: true,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Parse a JSON document holding any subset of the config fields.
    pub fn from_json_str(json: &str) -> Result<Config, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::Invalid(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_batch_size == 0 || self.min_batch_size > self.max_batch_size {
            return Err(ConfigError::Invalid(format!(
                "batch size bounds {}..={} are empty",
                self.min_batch_size, self.max_batch_size
            )));
        }
        if !(self.memory_threshold > 0.0 && self.memory_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "memory threshold {} outside (0, 1]",
                self.memory_threshold
            )));
        }
        if self.sample_sizes.is_empty() {
            return Err(ConfigError::Invalid("no sample sizes".to_string()));
        }
        if self.page_margin * 2.0 >= self.page_width.min(self.page_height) {
            return Err(ConfigError::Invalid("page margin leaves no room".to_string()));
        }
        Ok(())
    }

    pub fn scenario(&self) -> Scenario {
        testing_scenario(&self.scenario)
    }

    /// Base batch size clamped into the configured bounds.
    pub fn initial_batch_size(&self) -> usize {
        self.base_batch_size
            .clamp(self.min_batch_size, self.max_batch_size)
    }
}

/// Builder for typed overrides on top of a base [`Config`].
///
/// # Examples
///
/// ```
/// use fontsampler::{Config, SubsettingMode};
///
/// let config = Config::builder()
///     .scenario("typography")
///     .font_subsetting(SubsettingMode::Disabled)
///     .build()?;
/// assert_eq!(config.font_subsetting, SubsettingMode::Disabled);
/// # Ok::<(), fontsampler::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already loaded configuration instead of the defaults.
    pub fn from_config(config: Config) -> Self {
        ConfigBuilder { config }
    }

    pub fn scenario(mut self, scenario: impl Into<String>) -> Self {
        self.config.scenario = scenario.into();
        self
    }

    pub fn base_batch_size(mut self, size: usize) -> Self {
        self.config.base_batch_size = size;
        self
    }

    pub fn batch_bounds(mut self, min: usize, max: usize) -> Self {
        self.config.min_batch_size = min;
        self.config.max_batch_size = max;
        self
    }

    pub fn memory_threshold(mut self, threshold: f64) -> Self {
        self.config.memory_threshold = threshold;
        self
    }

    pub fn min_font_size_bytes(mut self, bytes: u64) -> Self {
        self.config.min_font_size_bytes = bytes;
        self
    }

    pub fn skip_problematic_fonts(mut self, skip: bool) -> Self {
        self.config.skip_problematic_fonts = skip;
        self
    }

    pub fn font_subsetting(mut self, mode: SubsettingMode) -> Self {
        self.config.font_subsetting = mode;
        self
    }

    pub fn retry_without_subsetting(mut self, retry: bool) -> Self {
        self.config.retry_without_subsetting = retry;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.config.show_progress = show;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
