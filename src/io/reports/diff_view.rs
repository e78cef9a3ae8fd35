//! Side-by-side rows for diff pages.

use serde::Serialize;
use similar::{DiffOp, TextDiff};

/// How a row differs between baseline and submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    /// Same line on both sides
    Equal,
    /// Baseline line removed
    Delete,
    /// Submission line added
    Insert,
    /// Baseline line rewritten in the submission
    Replace,
}

/// One synchronized row of a side-by-side diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffRow {
    /// Kind of change on this row
    pub kind: RowKind,
    /// 1-based baseline line number, absent for insertions
    pub left_number: Option<usize>,
    /// Baseline text, empty for insertions
    pub left: String,
    /// 1-based submission line number, absent for deletions
    pub right_number: Option<usize>,
    /// Submission text, empty for deletions
    pub right: String,
}

/// Build side-by-side rows, baseline on the left
pub fn side_by_side(baseline: &str, submission: &str) -> Vec<DiffRow> {
    let old: Vec<&str> = baseline.lines().collect();
    let new: Vec<&str> = submission.lines().collect();
    let diff = TextDiff::from_slices(&old, &new);

    let mut rows = Vec::new();
    for op in diff.ops() {
        match *op {
            DiffOp::Equal {
                old_index,
                new_index,
                len,
            } => {
                for k in 0..len {
                    rows.push(row(
                        RowKind::Equal,
                        &old,
                        Some(old_index + k),
                        &new,
                        Some(new_index + k),
                    ));
                }
            }
            DiffOp::Delete {
                old_index, old_len, ..
            } => {
                for k in 0..old_len {
                    rows.push(row(RowKind::Delete, &old, Some(old_index + k), &new, None));
                }
            }
            DiffOp::Insert {
                new_index, new_len, ..
            } => {
                for k in 0..new_len {
                    rows.push(row(RowKind::Insert, &old, None, &new, Some(new_index + k)));
                }
            }
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                for k in 0..old_len.max(new_len) {
                    rows.push(row(
                        RowKind::Replace,
                        &old,
                        (k < old_len).then_some(old_index + k),
                        &new,
                        (k < new_len).then_some(new_index + k),
                    ));
                }
            }
        }
    }
    rows
}

fn row(
    kind: RowKind,
    old: &[&str],
    old_at: Option<usize>,
    new: &[&str],
    new_at: Option<usize>,
) -> DiffRow {
    DiffRow {
        kind,
        left_number: old_at.map(|i| i + 1),
        left: old_at.map(|i| old[i].to_string()).unwrap_or_default(),
        right_number: new_at.map(|i| i + 1),
        right: new_at.map(|i| new[i].to_string()).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_texts_are_all_equal_rows() {
        let rows = side_by_side("a\nb\n", "a\nb\n");
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.kind == RowKind::Equal));
        assert_eq!(rows[1].left_number, Some(2));
        assert_eq!(rows[1].right_number, Some(2));
    }

    #[test]
    fn insertions_and_replacements_are_aligned() {
        let rows = side_by_side("int a;\nint b;\n", "int a;\nint c;\nint d;\n");
        let kinds: Vec<_> = rows.iter().map(|r| r.kind).collect();
        assert_eq!(kinds[0], RowKind::Equal);
        assert!(kinds[1..].iter().all(|k| *k != RowKind::Equal));
        assert_eq!(rows.iter().filter(|r| r.right_number.is_some()).count(), 3);
        assert_eq!(rows.iter().filter(|r| r.left_number.is_some()).count(), 2);
    }

    #[test]
    fn empty_baseline_is_all_insertions() {
        let rows = side_by_side("", "x\ny");
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.kind == RowKind::Insert && r.left.is_empty()));
    }
}
