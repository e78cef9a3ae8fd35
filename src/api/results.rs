//! Batch results and reporting structures.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::config::{MatrixFill, StrategyKind};
use crate::core::submission::{FailureReason, Submission, SubmissionStatus};

/// Result of comparing two submissions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRecord {
    /// Row index of the first submission in the matrix
    pub left: usize,

    /// Row index of the second submission, always greater than `left`
    pub right: usize,

    /// Similarity score in `[0, 1]`
    pub score: f64,

    /// Relative link to the pair detail page
    pub detail_page: Option<String>,
}

/// A pair whose comparison could not be completed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairFailure {
    /// Row index of the first submission
    pub left: usize,

    /// Row index of the second submission
    pub right: usize,

    /// Archive name of the first submission
    pub left_archive: String,

    /// Archive name of the second submission
    pub right_archive: String,

    /// Failure message
    pub reason: String,
}

/// Upper-triangle similarity records over the successfully processed submissions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatrix {
    /// Archive names, one per row, in enumeration order
    pub labels: Vec<String>,

    /// One record per pair `i < j`, row by row
    pub records: Vec<SimilarityRecord>,

    /// How the diagonal and lower triangle are rendered
    pub fill: MatrixFill,
}

impl SimilarityMatrix {
    /// Create a matrix with no records
    pub fn new(labels: Vec<String>, fill: MatrixFill) -> Self {
        Self {
            labels,
            records: Vec::new(),
            fill,
        }
    }

    /// Number of rows
    pub fn size(&self) -> usize {
        self.labels.len()
    }

    /// The computed record for `i < j`
    pub fn record(&self, i: usize, j: usize) -> Option<&SimilarityRecord> {
        let (left, right) = (i.min(j), i.max(j));
        self.records
            .iter()
            .find(|record| record.left == left && record.right == right)
    }

    /// Cell value after applying the fill policy; `None` renders blank
    pub fn cell(&self, i: usize, j: usize) -> Option<f64> {
        if i < j {
            return self.record(i, j).map(|record| record.score);
        }
        match self.fill {
            MatrixFill::Blank => None,
            MatrixFill::Zeroed => Some(0.0),
            MatrixFill::Mirrored if i == j => Some(1.0),
            MatrixFill::Mirrored => self.record(j, i).map(|record| record.score),
        }
    }

    /// Highest off-diagonal score, if any pair was scored
    pub fn max_score(&self) -> Option<f64> {
        self.records
            .iter()
            .map(|record| record.score)
            .fold(None, |acc, score| Some(acc.map_or(score, |m: f64| m.max(score))))
    }
}

/// Per-submission outcome reported back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// Archive file name
    pub archive: String,

    /// Final status
    pub status: SubmissionStatus,

    /// Failure reason when the submission failed
    pub failure: Option<FailureReason>,

    /// Submitter names
    pub submitters: Vec<String>,

    /// Number of reported new files
    pub new_files: usize,

    /// Number of reported changed files
    pub changed_files: usize,

    /// Files decoded lossily
    pub decode_warnings: usize,

    /// Relative link to the submission page
    pub page: Option<String>,
}

impl SubmissionOutcome {
    /// Snapshot a submission with its file counts and page
    pub fn from_submission(
        submission: &Submission,
        new_files: usize,
        changed_files: usize,
        page: Option<String>,
    ) -> Self {
        Self {
            archive: submission.archive.clone(),
            status: submission.status,
            failure: submission.failure.clone(),
            submitters: submission.submitters.clone(),
            new_files,
            changed_files,
            decode_warnings: submission.decode_warnings,
            page,
        }
    }
}

/// Everything a batch run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Strategy used for scoring
    pub strategy: StrategyKind,

    /// One outcome per enumerated archive, in enumeration order
    pub submissions: Vec<SubmissionOutcome>,

    /// Similarity over the submissions that were not failed
    pub matrix: SimilarityMatrix,

    /// Pairs whose comparison failed
    pub pair_failures: Vec<PairFailure>,

    /// Path of the global index page
    pub report_index: PathBuf,
}

impl BatchSummary {
    /// Outcomes of submissions that made it into the report
    pub fn reported(&self) -> impl Iterator<Item = &SubmissionOutcome> {
        self.submissions
            .iter()
            .filter(|outcome| outcome.status == SubmissionStatus::Reported)
    }

    /// Outcomes of failed submissions
    pub fn failed(&self) -> impl Iterator<Item = &SubmissionOutcome> {
        self.submissions
            .iter()
            .filter(|outcome| outcome.status == SubmissionStatus::Failed)
    }

    /// Score for two archives, looked up by name
    pub fn score_between(&self, left: &str, right: &str) -> Option<f64> {
        let i = self.matrix.labels.iter().position(|l| l == left)?;
        let j = self.matrix.labels.iter().position(|l| l == right)?;
        self.matrix.record(i, j).map(|record| record.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(fill: MatrixFill) -> SimilarityMatrix {
        let mut matrix = SimilarityMatrix::new(
            vec!["a.zip".into(), "b.zip".into(), "c.zip".into()],
            fill,
        );
        matrix.records = vec![
            SimilarityRecord { left: 0, right: 1, score: 0.9, detail_page: None },
            SimilarityRecord { left: 0, right: 2, score: 0.1, detail_page: None },
            SimilarityRecord { left: 1, right: 2, score: 0.4, detail_page: None },
        ];
        matrix
    }

    #[test]
    fn test_fill_policies() {
        let blank = matrix(MatrixFill::Blank);
        assert_eq!(blank.cell(0, 1), Some(0.9));
        assert_eq!(blank.cell(1, 0), None);
        assert_eq!(blank.cell(1, 1), None);

        let zeroed = matrix(MatrixFill::Zeroed);
        assert_eq!(zeroed.cell(2, 1), Some(0.0));
        assert_eq!(zeroed.cell(0, 0), Some(0.0));

        let mirrored = matrix(MatrixFill::Mirrored);
        assert_eq!(mirrored.cell(2, 1), Some(0.4));
        assert_eq!(mirrored.cell(2, 2), Some(1.0));
    }

    #[test]
    fn test_max_score() {
        assert_eq!(matrix(MatrixFill::Blank).max_score(), Some(0.9));
        assert_eq!(SimilarityMatrix::new(vec![], MatrixFill::Blank).max_score(), None);
    }
}
