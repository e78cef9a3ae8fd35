//! Character alignment similarity between two signatures.
//!
//! Matched characters come from a Myers diff over characters. A single space
//! is junk: a run of matched spaces only counts when it belongs to a matching
//! block that also holds a non-space character. Past its deadline the diff
//! stops refining and reports the remainder as changed.

use std::time::Duration;

use similar::{Algorithm, DiffOp, TextDiff};

const JUNK: &str = " ";

/// Deadline used by [`alignment_ratio`]
pub const DEFAULT_ALIGNMENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Similarity ratio `2·M / (|a| + |b|)` in `[0, 1]`; `0.0` when either side is empty
pub fn alignment_ratio(a: &str, b: &str) -> f64 {
    alignment_ratio_within(a, b, DEFAULT_ALIGNMENT_TIMEOUT)
}

/// [`alignment_ratio`] with an explicit diff deadline
pub fn alignment_ratio_within(a: &str, b: &str, timeout: Duration) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .timeout(timeout)
        .diff_chars(a, b);
    let chars = diff.old_slices();

    let matched: usize = diff
        .ops()
        .iter()
        .filter_map(|op| match *op {
            DiffOp::Equal { old_index, len, .. } => Some(&chars[old_index..old_index + len]),
            _ => None,
        })
        .filter(|block| block.iter().any(|ch| *ch != JUNK))
        .map(|block| block.len())
        .sum();

    let total = a.chars().count() + b.chars().count();
    ((2 * matched) as f64 / total as f64).clamp(0.0, 1.0)
}
