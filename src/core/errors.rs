//! Error types for the subdiff library.
//!
//! Errors are split by the boundary that absorbs them: submission-level
//! errors (`Extraction`, `Layout`, `Io` while diffing) are caught by the batch
//! orchestrator and recorded on the submission, pair-level errors
//! (`Comparison`) are recorded on a single matrix cell, and everything else is
//! fatal for the run.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Main result type for subdiff operations.
pub type Result<T> = std::result::Result<T, SubdiffError>;

/// Error type for all subdiff operations.
#[derive(Error, Debug)]
pub enum SubdiffError {
    /// I/O related errors outside of report writing
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Validation errors for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or input that failed validation
        field: Option<String>,
    },

    /// Archive could not be read or unpacked
    #[error("Extraction error in {archive}: {message}")]
    Extraction {
        /// Archive file name
        archive: String,
        /// Error description
        message: String,
        /// Whether the failure happened while unpacking a nested archive
        nested: bool,
    },

    /// Archive unpacked into a single wrapping folder
    #[error("Layout error in {archive}: archive wraps its content in folder '{entry}'")]
    Layout {
        /// Archive file name
        archive: String,
        /// The single top-level directory found after extraction
        entry: String,
    },

    /// Pair-level comparison failure
    #[error("Comparison failed between {left} and {right}: {message}")]
    Comparison {
        /// Left submission identifier
        left: String,
        /// Right submission identifier
        right: String,
        /// Error description
        message: String,
    },

    /// A report page could not be rendered or written
    #[error("Report I/O error: {message}")]
    ReportIo {
        /// Error description
        message: String,
        /// Underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
        /// Additional context
        context: Option<String>,
    },
}

impl SubdiffError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create an I/O error naming the path it happened on
    pub fn io_at(action: &str, path: &Path, source: io::Error) -> Self {
        Self::io(format!("Failed to {action} {}", path.display()), source)
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new validation error with field context
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a top-level extraction error
    pub fn extraction(archive: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            archive: archive.into(),
            message: message.into(),
            nested: false,
        }
    }

    /// Create an extraction error scoped to the nested archive step
    pub fn nested_extraction(archive: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            archive: archive.into(),
            message: message.into(),
            nested: true,
        }
    }

    /// Create a wrapping-folder layout error
    pub fn layout(archive: impl Into<String>, entry: impl Into<String>) -> Self {
        Self::Layout {
            archive: archive.into(),
            entry: entry.into(),
        }
    }

    /// Create a pair-level comparison error
    pub fn comparison(
        left: impl Into<String>,
        right: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Comparison {
            left: left.into(),
            right: right.into(),
            message: message.into(),
        }
    }

    /// Create a report I/O error from any underlying error
    pub fn report_io(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ReportIo {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Short machine-friendly name of the error kind, used in summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "IoError",
            Self::Config { .. } => "ConfigError",
            Self::Validation { .. } => "ValidationError",
            Self::Extraction { .. } => "ExtractionError",
            Self::Layout { .. } => "LayoutError",
            Self::Comparison { .. } => "ComparisonFailure",
            Self::ReportIo { .. } => "ReportIOError",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// Whether this error must abort the whole batch
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ReportIo { .. } | Self::Config { .. } | Self::Validation { .. }
        )
    }

    /// Add context to an existing error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        match &mut self {
            Self::Internal { context: ctx, .. } => {
                *ctx = Some(context.into());
            }
            Self::Io { message, .. } | Self::ReportIo { message, .. } => {
                *message = format!("{}: {message}", context.into());
            }
            _ => {}
        }
        self
    }
}

impl From<io::Error> for SubdiffError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_yaml::Error> for SubdiffError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::config(format!("YAML parsing failed: {err}"))
    }
}

impl From<walkdir::Error> for SubdiffError {
    fn from(err: walkdir::Error) -> Self {
        let path = err
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_else(PathBuf::new);
        match err.into_io_error() {
            Some(source) => Self::io_at("walk", &path, source),
            None => Self::internal(format!("filesystem loop at {}", path.display())),
        }
    }
}

/// Result extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error result
    fn context(self, msg: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<SubdiffError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }

    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| e.into().with_context(msg))
    }
}
