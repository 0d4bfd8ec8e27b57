use std::fmt::Formatter;
use std::path::PathBuf;

/// Failure to load, subset or embed a single font.
#[derive(Debug)]
pub enum FontError {
    Io(std::io::Error),
    Parse(ttf_parser::FaceParsingError),
    MissingTable(&'static str),
    TooSmall(u64),
    Inaccessible,
    Subset(SubsetError),
    Embedding(String),
    /// Subsetting failed with the first message and the full program then
    /// failed too.
    RetryFailed {
        subset_error: String,
        source: Box<FontError>,
    },
}

impl FontError {
    /// Whether this failure came from the font program itself rather than the
    /// environment. Only these are worth retrying without subsetting.
    pub fn is_font_related(&self) -> bool {
        !matches!(self, FontError::Io(_) | FontError::Inaccessible)
    }

    /// Short machine-readable tag used in validation logs.
    pub fn issue_type(&self) -> &'static str {
        match self {
            FontError::Io(_) | FontError::Inaccessible => "file_access",
            FontError::TooSmall(_) => "file_size",
            FontError::Parse(_) | FontError::MissingTable(_) => "parse_failed",
            FontError::Subset(_) => "subsetting_failed",
            FontError::Embedding(_) => "validation_failed",
            FontError::RetryFailed { .. } => "subsetting_retry_failed",
        }
    }
}

impl std::fmt::Display for FontError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            FontError::Io(e) => write!(f, "IO error: {}", e),
            FontError::Parse(e) => write!(f, "font parse error: {}", e),
            FontError::MissingTable(tag) => write!(f, "font missing {} table", tag),
            FontError::TooSmall(size) => {
                write!(f, "Font file too small ({} bytes), likely corrupted", size)
            }
            FontError::Inaccessible => write!(f, "Font file not accessible"),
            FontError::Subset(e) => write!(f, "font subset error: {}", e),
            FontError::Embedding(msg) => write!(f, "font embedding error: {}", msg),
            FontError::RetryFailed {
                subset_error,
                source,
            } => write!(
                f,
                "{} (full embedding retry also failed: {})",
                subset_error, source
            ),
        }
    }
}

impl std::error::Error for FontError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FontError::RetryFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FontError {
    fn from(e: std::io::Error) -> Self {
        FontError::Io(e)
    }
}

impl From<ttf_parser::FaceParsingError> for FontError {
    fn from(e: ttf_parser::FaceParsingError) -> Self {
        FontError::Parse(e)
    }
}

impl From<SubsetError> for FontError {
    fn from(e: SubsetError) -> Self {
        FontError::Subset(e)
    }
}

impl From<lopdf::Error> for FontError {
    fn from(e: lopdf::Error) -> Self {
        FontError::Embedding(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubsetError {
    /// The font has no `glyf` outlines (CFF flavoured OpenType).
    Unsupported,
    MissingTable(&'static str),
    Malformed(&'static str),
}

impl std::fmt::Display for SubsetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            SubsetError::Unsupported => write!(f, "subsetting unsupported for CFF outlines"),
            SubsetError::MissingTable(tag) => write!(f, "missing {} table", tag),
            SubsetError::Malformed(what) => write!(f, "malformed font: {}", what),
        }
    }
}

impl std::error::Error for SubsetError {}

#[derive(Debug)]
pub enum ConfigError {
    Invalid(String),
    Json(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
            ConfigError::Json(e) => write!(f, "configuration file error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

#[derive(Debug)]
pub enum CatalogError {
    IoError(std::io::Error),
    PdfError(lopdf::Error),
    FontError { file: String, source: FontError },
    ConfigError(ConfigError),
    ProblematicFont { file: String, reason: String },
    InvalidDirectory(PathBuf),
    NoFonts,
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            CatalogError::IoError(e) => write!(f, "IO error: {}", e),
            CatalogError::PdfError(e) => write!(f, "PDF error: {}", e),
            CatalogError::FontError { file, source } => write!(f, "{}: {}", file, source),
            CatalogError::ConfigError(e) => write!(f, "{}", e),
            CatalogError::ProblematicFont { file, reason } => {
                write!(f, "Problematic font encountered: {} - {}", file, reason)
            }
            CatalogError::InvalidDirectory(path) => {
                write!(f, "'{}' is not a directory", path.display())
            }
            CatalogError::NoFonts => write!(f, "No fonts found"),
        }
    }
}

impl std::error::Error for CatalogError {}

impl From<std::io::Error> for CatalogError {
    fn from(e: std::io::Error) -> Self {
        CatalogError::IoError(e)
    }
}

impl From<lopdf::Error> for CatalogError {
    fn from(e: lopdf::Error) -> Self {
        CatalogError::PdfError(e)
    }
}

impl From<ConfigError> for CatalogError {
    fn from(e: ConfigError) -> Self {
        CatalogError::ConfigError(e)
    }
}
