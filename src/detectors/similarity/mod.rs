//! Pairwise similarity scoring.
//!
//! Two strategies share one pipeline:
//!
//! - **alignment**: in-process longest-matching-block ratio over submission
//!   signatures, scored in parallel with rayon;
//! - **delegated**: a [`ComparisonFacility`] compares two filtered trees and the
//!   per-file overlaps are aggregated into a size-weighted score.
//!
//! Only pairs `i < j` are computed. Results always come back in pair order.

pub mod alignment;
pub mod facility;
pub mod material;

pub use alignment::{alignment_ratio, alignment_ratio_within, DEFAULT_ALIGNMENT_TIMEOUT};
pub use facility::{ComparisonFacility, ExternalSimTool, FileOverlap, TokenOverlapFacility};
pub use material::{added_lines, ArtifactContent, FileArtifact, SubmissionMaterial};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::core::errors::{Result, SubdiffError};
use crate::core::file_utils::tree_size;
use crate::detectors::normalizer::Signature;

/// Score and evidence for one submission pair
#[derive(Debug, Clone, PartialEq)]
pub struct PairComparison {
    /// Index of the first submission
    pub left: usize,
    /// Index of the second submission, always greater than `left`
    pub right: usize,
    /// Similarity in `[0, 1]`
    pub score: f64,
    /// Facility findings (delegated strategy only)
    pub overlaps: Vec<FileOverlap>,
    /// Failure message when the comparison could not be completed
    pub failure: Option<String>,
}

impl PairComparison {
    fn scored(left: usize, right: usize, score: f64, overlaps: Vec<FileOverlap>) -> Self {
        Self {
            left,
            right,
            score,
            overlaps,
            failure: None,
        }
    }

    fn failed(left: usize, right: usize, err: &SubdiffError) -> Self {
        Self {
            left,
            right,
            score: 0.0,
            overlaps: Vec::new(),
            failure: Some(err.to_string()),
        }
    }
}

/// Index pairs `(i, j)` with `i < j < n`, row by row
pub fn upper_triangle(n: usize) -> Vec<(usize, usize)> {
    (0..n)
        .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
        .collect()
}

/// Score every pair of signatures with the alignment ratio, each diff bounded by `timeout`
pub fn score_alignment(signatures: &[Signature], timeout: Duration) -> Vec<PairComparison> {
    upper_triangle(signatures.len())
        .into_par_iter()
        .map(|(i, j)| {
            let score =
                alignment_ratio_within(signatures[i].as_str(), signatures[j].as_str(), timeout);
            PairComparison::scored(i, j, score, Vec::new())
        })
        .collect()
}

/// Score every pair of filtered trees through `facility`.
///
/// At most `max_parallel` comparisons run at once. A failed comparison scores
/// zero and carries its failure message.
pub async fn score_delegated(
    facility: &dyn ComparisonFacility,
    trees: &[PathBuf],
    max_parallel: usize,
) -> Vec<PairComparison> {
    stream::iter(upper_triangle(trees.len()))
        .map(|(i, j)| async move {
            match compare_trees(facility, &trees[i], &trees[j]).await {
                Ok((score, overlaps)) => PairComparison::scored(i, j, score, overlaps),
                Err(err) => {
                    warn!("Comparison of pair ({i}, {j}) failed: {err}");
                    PairComparison::failed(i, j, &err)
                }
            }
        })
        .buffered(max_parallel.max(1))
        .collect()
        .await
}

async fn compare_trees(
    facility: &dyn ComparisonFacility,
    left: &Path,
    right: &Path,
) -> Result<(f64, Vec<FileOverlap>)> {
    let overlaps = facility.compare(left, right).await?;
    debug!(
        "{} reported {} overlaps for {} vs {}",
        facility.name(),
        overlaps.len(),
        left.display(),
        right.display()
    );
    let score = delegated_score(&overlaps, left, right)?;
    Ok((score, overlaps))
}

/// Size-weighted score of facility findings for two trees
pub fn delegated_score(overlaps: &[FileOverlap], left: &Path, right: &Path) -> Result<f64> {
    let total = tree_size(left)? + tree_size(right)?;
    let mut weighted = Vec::with_capacity(overlaps.len());
    for overlap in overlaps {
        let size = fs::metadata(&overlap.left_file)
            .map_err(|e| {
                SubdiffError::comparison(
                    left.display().to_string(),
                    right.display().to_string(),
                    format!("reported file {} is unreadable: {e}", overlap.left_file.display()),
                )
            })?
            .len();
        weighted.push((overlap.percent, size));
    }
    Ok(weighted_score(&weighted, total))
}

/// `Σ percent·size / total / 100`, clamped to `[0, 1]`; zero when `total` is zero
pub fn weighted_score(weighted: &[(u32, u64)], total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let sum: f64 = weighted
        .iter()
        .map(|&(percent, size)| f64::from(percent) * size as f64)
        .sum();
    (sum / total as f64 / 100.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use async_trait::async_trait;
    use tempfile::tempdir;

    #[test]
    fn test_upper_triangle_order() {
        assert_eq!(upper_triangle(3), vec![(0, 1), (0, 2), (1, 2)]);
        assert!(upper_triangle(1).is_empty());
        assert!(upper_triangle(0).is_empty());
    }

    #[test]
    fn test_weighted_score() {
        assert_relative_eq!(weighted_score(&[(50, 100), (100, 50)], 300), 1.0 / 3.0);
        assert_eq!(weighted_score(&[(100, 10)], 0), 0.0);
        assert_eq!(weighted_score(&[(100, 500), (100, 500)], 400), 1.0);
        assert_eq!(weighted_score(&[], 10), 0.0);
    }

    #[test]
    fn test_score_alignment_pairs_in_order() {
        let sigs = vec![
            Signature::from_normalized("int I;"),
            Signature::from_normalized("int I;"),
            Signature::default(),
        ];
        let scores = score_alignment(&sigs, DEFAULT_ALIGNMENT_TIMEOUT);
        assert_eq!(scores.len(), 3);
        assert_eq!((scores[0].left, scores[0].right), (0, 1));
        assert_eq!(scores[0].score, 1.0);
        assert_eq!(scores[1].score, 0.0);
        assert_eq!(scores[2].score, 0.0);
    }

    struct FlakyFacility;

    #[async_trait]
    impl ComparisonFacility for FlakyFacility {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn compare(&self, left: &Path, right: &Path) -> Result<Vec<FileOverlap>> {
            if right.ends_with("broken") {
                return Err(SubdiffError::comparison(
                    left.display().to_string(),
                    right.display().to_string(),
                    "facility unavailable",
                ));
            }
            Ok(vec![FileOverlap {
                left_file: left.join("a.c"),
                right_file: right.join("a.c"),
                percent: 100,
            }])
        }
    }

    #[tokio::test]
    async fn test_score_delegated_isolates_failures() {
        let root = tempdir().unwrap();
        let mut trees = Vec::new();
        for name in ["one", "two", "broken"] {
            let dir = root.path().join(name);
            fs::create_dir(&dir).unwrap();
            fs::write(dir.join("a.c"), "0123456789").unwrap();
            trees.push(dir);
        }

        let results = score_delegated(&FlakyFacility, &trees, 2).await;

        assert_eq!(results.len(), 3);
        assert_relative_eq!(results[0].score, 0.5);
        assert!(results[0].failure.is_none());
        assert_eq!(results[1].score, 0.0);
        assert!(results[1].failure.as_deref().unwrap().contains("unavailable"));
        assert_eq!((results[2].left, results[2].right), (1, 2));
    }
}
