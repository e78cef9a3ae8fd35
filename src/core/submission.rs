//! Submission data model.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::SubdiffError;

/// Placeholder used when an archive carries no submitters file
pub const MISSING_SUBMITTERS: &str = "missing";

/// Processing status of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Enumerated, not yet touched
    Pending,
    /// Archive extracted into the scratch directory
    Staged,
    /// Tree diff, artifacts and signature built
    Diffed,
    /// Included in the pairwise similarity pass
    Scored,
    /// Submission page written
    Reported,
    /// Excluded from every later stage
    Failed,
}

impl SubmissionStatus {
    /// Whether moving to `next` is a legal transition
    pub fn can_advance_to(self, next: SubmissionStatus) -> bool {
        use SubmissionStatus::*;
        matches!(
            (self, next),
            (Pending, Staged)
                | (Staged, Diffed)
                | (Diffed, Scored)
                | (Scored, Reported)
                | (Pending | Staged | Diffed | Scored, Failed)
        )
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Staged => "staged",
            Self::Diffed => "diffed",
            Self::Scored => "scored",
            Self::Reported => "reported",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Why a submission was excluded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    /// Error taxonomy name, e.g. `ExtractionError`
    pub kind: String,
    /// Human-readable message
    pub message: String,
}

impl From<&SubdiffError> for FailureReason {
    fn from(err: &SubdiffError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// One archived project under grading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// Original archive file name
    pub archive: String,
    /// Full path of the archive
    pub archive_path: PathBuf,
    /// Staged root directory while the submission is being processed
    pub staged_root: Option<PathBuf>,
    /// Submitter names, or the missing sentinel
    pub submitters: Vec<String>,
    /// Current processing status
    pub status: SubmissionStatus,
    /// Failure reason when `status` is `Failed`
    pub failure: Option<FailureReason>,
    /// Number of files decoded lossily while building signatures
    pub decode_warnings: usize,
}

impl Submission {
    /// Create a pending submission for an archive
    pub fn new(archive_path: PathBuf) -> Self {
        let archive = archive_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            archive,
            archive_path,
            staged_root: None,
            submitters: vec![MISSING_SUBMITTERS.to_string()],
            status: SubmissionStatus::Pending,
            failure: None,
            decode_warnings: 0,
        }
    }

    /// Advance the status; transitions out of `Failed` are ignored
    pub fn advance(&mut self, next: SubmissionStatus) {
        if self.status.can_advance_to(next) {
            self.status = next;
        }
    }

    /// Freeze the submission at `Failed`, recording the error
    pub fn fail(&mut self, err: &SubdiffError) {
        self.status = SubmissionStatus::Failed;
        self.failure = Some(FailureReason::from(err));
        self.staged_root = None;
    }

    /// Whether the submission still takes part in the batch
    pub fn is_active(&self) -> bool {
        self.status != SubmissionStatus::Failed
    }

    /// Submitter names joined for display
    pub fn submitters_label(&self) -> String {
        self.submitters.join(" & ")
    }
}
