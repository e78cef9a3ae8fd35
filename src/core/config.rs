//! Configuration types and management for subdiff.
//!
//! Every constant the batch needs (archive extensions, scratch names,
//! reserved-word lists, report file names) lives here and is handed to the
//! orchestrator at construction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SubdiffError};

/// Main configuration for a subdiff batch run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubdiffConfig {
    /// Input discovery settings
    #[serde(default)]
    pub input: InputConfig,

    /// Archive staging settings
    #[serde(default)]
    pub staging: StagingConfig,

    /// Tree diff filtering settings
    #[serde(default)]
    pub diff: DiffConfig,

    /// Text normalization word lists
    #[serde(default)]
    pub normalizer: NormalizerConfig,

    /// Similarity strategy settings
    #[serde(default)]
    pub similarity: SimilarityConfig,

    /// Report output settings
    #[serde(default)]
    pub report: ReportConfig,
}

impl SubdiffConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            SubdiffError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;

        serde_yaml::from_str(&content).map_err(Into::into)
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content).map_err(|e| {
            SubdiffError::io(
                format!("Failed to write config file: {}", path.display()),
                e,
            )
        })
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<()> {
        self.input.validate()?;
        self.staging.validate()?;
        self.normalizer.validate()?;
        self.similarity.validate()?;
        self.report.validate()?;
        Ok(())
    }
}

/// Which archives in the submissions folder are considered submissions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Archive file extensions, matched case-insensitively
    pub archive_extensions: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            archive_extensions: vec!["zip".to_string()],
        }
    }
}

impl InputConfig {
    /// Validate input configuration
    pub fn validate(&self) -> Result<()> {
        if self.archive_extensions.is_empty() {
            return Err(SubdiffError::validation_field(
                "archive_extensions cannot be empty",
                "input.archive_extensions",
            ));
        }
        Ok(())
    }

    /// Whether a file name carries one of the configured archive extensions
    pub fn is_archive(&self, file_name: &str) -> bool {
        let lower = file_name.to_ascii_lowercase();
        self.archive_extensions.iter().any(|ext| {
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();
            lower.len() > ext.len() + 1 && lower.ends_with(&format!(".{ext}"))
        })
    }
}

/// Archive staging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Shared scratch directory name, reused for every submission
    pub scratch_dir_name: String,

    /// Names of nested archives to unpack in place after extraction
    pub nested_archive_names: Vec<String>,

    /// Accepted submitters file names, matched case-insensitively
    pub submitters_file_names: Vec<String>,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            scratch_dir_name: "temp_diff".to_string(),
            nested_archive_names: vec!["kernel.tar.gz".to_string()],
            submitters_file_names: vec![
                "submitters.txt".to_string(),
                "submitter.txt".to_string(),
            ],
        }
    }
}

impl StagingConfig {
    /// Validate staging configuration
    pub fn validate(&self) -> Result<()> {
        let name = self.scratch_dir_name.trim();
        let has_separator = name.contains(|c: char| c == '/' || c == '\\');
        if name.is_empty() || has_separator || name == "." || name == ".." {
            return Err(SubdiffError::validation_field(
                format!("scratch_dir_name must be a plain directory name, got '{name}'"),
                "staging.scratch_dir_name",
            ));
        }
        Ok(())
    }
}

/// Tree diff filtering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Suffixes of new files that are never reported (matched case-insensitively)
    pub ignore_suffixes: Vec<String>,

    /// File names excluded from reporting and comparison entirely
    pub filter_files: Vec<String>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            ignore_suffixes: vec!["txt".to_string()],
            filter_files: Vec::new(),
        }
    }
}

/// Word lists driving identifier canonicalization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Language reserved words kept verbatim in signatures
    pub reserved_words: Vec<String>,

    /// Built-in function names kept verbatim when called
    pub builtin_functions: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        let reserved = [
            "if", "inline", "break", "case", "register", "continue", "return", "default",
            "do", "sizeof", "static", "else", "struct", "entry", "switch", "extern",
            "typedef", "union", "for", "unsigned", "goto", "while", "enum", "const",
            "signed", "volatile",
            // primitive types
            "auto", "char", "double", "float", "int", "long", "short", "void",
        ];
        let builtins = ["kmalloc", "kfree", "malloc", "free"];

        Self {
            reserved_words: reserved.iter().map(|w| w.to_string()).collect(),
            builtin_functions: builtins.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl NormalizerConfig {
    /// Validate normalizer configuration
    pub fn validate(&self) -> Result<()> {
        let words = self.reserved_words.iter().chain(&self.builtin_functions);
        for word in words {
            let mut chars = word.chars();
            let valid_start = chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
            if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(SubdiffError::validation_field(
                    format!("'{word}' is not an identifier"),
                    "normalizer",
                ));
            }
        }
        Ok(())
    }
}

/// Similarity strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// In-process longest-matching-block ratio over signatures
    Alignment,
    /// Filtered-tree comparison through a comparison facility
    Delegated,
}

/// Comparison facility used by the delegated strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityKind {
    /// External executable printing "consists for N % of" lines
    External,
    /// In-process token shingle overlap
    TokenOverlap,
}

/// How the lower triangle and diagonal of the matrix are displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixFill {
    /// Neutral placeholder cells
    Blank,
    /// Zero-score cells without links
    Zeroed,
    /// Copy of the upper triangle
    Mirrored,
}

/// Similarity engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Strategy used for the whole batch
    pub strategy: StrategyKind,

    /// Facility used by the delegated strategy
    pub facility: FacilityKind,

    /// External facility executable
    pub command: String,

    /// Arguments passed before the two directory paths
    pub command_args: Vec<String>,

    /// Timeout for one external comparison (seconds)
    pub timeout_seconds: u64,

    /// Deadline for one alignment diff (milliseconds)
    pub alignment_timeout_ms: u64,

    /// Token shingle length for the in-process facility
    pub shingle_size: usize,

    /// Smallest overlap percentage the in-process facility reports
    pub min_percent: u32,

    /// Maximum number of pair comparisons in flight
    pub max_parallel_comparisons: usize,

    /// Display fill for diagonal and lower triangle; strategy default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix_fill: Option<MatrixFill>,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Alignment,
            facility: FacilityKind::External,
            command: "sim_c".to_string(),
            command_args: vec!["-e".to_string(), "-p".to_string(), "-R".to_string()],
            timeout_seconds: 60,
            alignment_timeout_ms: 2000,
            shingle_size: 5,
            min_percent: 1,
            max_parallel_comparisons: 4,
            matrix_fill: None,
        }
    }
}

impl SimilarityConfig {
    /// Validate similarity configuration
    pub fn validate(&self) -> Result<()> {
        if self.timeout_seconds == 0 {
            return Err(SubdiffError::validation_field(
                "timeout_seconds must be greater than 0",
                "similarity.timeout_seconds",
            ));
        }

        if self.alignment_timeout_ms == 0 {
            return Err(SubdiffError::validation_field(
                "alignment_timeout_ms must be greater than 0",
                "similarity.alignment_timeout_ms",
            ));
        }

        if self.shingle_size == 0 {
            return Err(SubdiffError::validation_field(
                "shingle_size must be greater than 0",
                "similarity.shingle_size",
            ));
        }

        if !(1..=100).contains(&self.min_percent) {
            return Err(SubdiffError::validation_field(
                format!("min_percent must be between 1 and 100, got {}", self.min_percent),
                "similarity.min_percent",
            ));
        }

        if self.max_parallel_comparisons == 0 {
            return Err(SubdiffError::validation_field(
                "max_parallel_comparisons must be greater than 0",
                "similarity.max_parallel_comparisons",
            ));
        }

        if self.strategy == StrategyKind::Delegated
            && self.facility == FacilityKind::External
            && self.command.trim().is_empty()
        {
            return Err(SubdiffError::validation_field(
                "command cannot be empty for the external facility",
                "similarity.command",
            ));
        }

        Ok(())
    }

    /// Deadline for one alignment diff
    pub fn alignment_timeout(&self) -> Duration {
        Duration::from_millis(self.alignment_timeout_ms)
    }

    /// Matrix fill in effect, falling back to the strategy default
    pub fn effective_matrix_fill(&self) -> MatrixFill {
        self.matrix_fill.unwrap_or(match self.strategy {
            StrategyKind::Alignment => MatrixFill::Blank,
            StrategyKind::Delegated => MatrixFill::Zeroed,
        })
    }
}

/// Report output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Default report folder name, created inside the submissions folder
    pub dir_name: String,

    /// Global index page name
    pub index_name: String,

    /// Stylesheet file name
    pub stylesheet_name: String,

    /// Similarity figure file name (alignment strategy)
    pub figure_name: String,

    /// Extension of generated pages
    pub page_extension: String,

    /// Directory with `*.hbs` templates overriding the built-in ones
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templates_dir: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir_name: "html_diff".to_string(),
            index_name: "index.html".to_string(),
            stylesheet_name: "report.css".to_string(),
            figure_name: "similarity.svg".to_string(),
            page_extension: "html".to_string(),
            templates_dir: None,
        }
    }
}

impl ReportConfig {
    /// Validate report configuration
    pub fn validate(&self) -> Result<()> {
        let names = [
            ("report.dir_name", &self.dir_name),
            ("report.index_name", &self.index_name),
            ("report.stylesheet_name", &self.stylesheet_name),
            ("report.figure_name", &self.figure_name),
        ];
        for (field, name) in names {
            if name.trim().is_empty() || Path::new(name).components().count() != 1 {
                return Err(SubdiffError::validation_field(
                    format!("'{name}' must be a plain file name"),
                    field,
                ));
            }
        }

        let extension = &self.page_extension;
        if extension.is_empty() || extension.contains(|c: char| c == '.' || c == '/') {
            return Err(SubdiffError::validation_field(
                "page_extension must be a bare extension such as 'html'",
                "report.page_extension",
            ));
        }

        Ok(())
    }
}
