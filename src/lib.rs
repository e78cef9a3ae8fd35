//! # subdiff: batch diff and similarity reports for archived submissions
//!
//! Given a folder of archived source-code submissions and a shared baseline
//! tree, subdiff extracts each archive, works out what every submission added
//! or changed relative to the baseline, scores how similar the submissions are
//! to each other and writes a browsable HTML report.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 API Layer (BatchOrchestrator)                │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Core          │  Detectors            │  I/O                │
//! │ • Config       │ • Tree diff           │ • Archive staging   │
//! │ • Errors       │ • Text normalizer     │ • HTML reports      │
//! │ • Submissions  │ • Similarity scoring  │ • Highlighting      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use subdiff::{BatchOrchestrator, SubdiffConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = BatchOrchestrator::new(SubdiffConfig::default(), "./baseline");
//!     let submissions = Path::new("./submissions");
//!     let report_dir = orchestrator.default_report_dir(submissions);
//!
//!     let summary = orchestrator.run(submissions, &report_dir).await?;
//!     println!("Report: {}", summary.report_index.display());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Configuration, errors and the submission model
pub mod core {
    //! Configuration, error types and shared file helpers.

    pub mod config;
    pub mod errors;
    pub mod file_utils;
    pub mod submission;
}

// Diffing, normalization and scoring
pub mod detectors {
    //! Tree diffing, text normalization and similarity scoring.

    pub mod normalizer;
    pub mod similarity;
    pub mod tree_diff;
}

// Archive staging and reporting
pub mod io {
    //! Archive staging and HTML report generation.

    pub mod reports;
    pub mod staging;
}

// Public API and engine interface
pub mod api {
    //! High-level batch API.

    pub mod engine;
    pub mod results;
}

// Re-export primary types for convenience
pub use api::engine::{BatchOrchestrator, ProgressCallback};
pub use api::results::{BatchSummary, PairFailure, SimilarityMatrix, SubmissionOutcome};
pub use core::config::{FacilityKind, MatrixFill, StrategyKind, SubdiffConfig};
pub use core::errors::{Result, ResultExt, SubdiffError};
pub use core::submission::{Submission, SubmissionStatus};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
