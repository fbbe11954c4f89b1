//! Token-level alignment between a source and a target sequence.
//!
//! The alignment is a queryable set of opcodes, and it also turns into an
//! [`AnnotatedTokens`] buffer over the source whose annotations rewrite the
//! source into the target.
//!
//! # Example
//!
//! ```
//! use layered_edits::align;
//!
//! let aligned = align("the red fox", "the brown fox");
//! assert_eq!(aligned.annotated_text(true), "the {red=>brown} fox");
//! assert_eq!(aligned.corrected_text(0), "the brown fox");
//! ```

use crate::annotated_tokens::AnnotatedTokens;
use crate::annotation::{Annotation, Meta};
use crate::mutable_tokens::IntoTokens;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Configuration for token alignment.
#[derive(Debug, Clone, Default)]
pub struct AlignmentConfig {
    /// How two tokens are compared.
    pub comparison: TokenComparison,
}

/// How tokens are compared during alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenComparison {
    /// Tokens match only when their text is identical.
    #[default]
    Exact,
    /// Tokens match when they are equal after lowercasing.
    ///
    /// Matched tokens whose text differs still get an annotation carrying the
    /// target's text, so the corrections always rebuild the target.
    IgnoreCase,
}

impl TokenComparison {
    fn key<'t>(&self, token: &'t str) -> Cow<'t, str> {
        match self {
            TokenComparison::Exact => Cow::Borrowed(token),
            TokenComparison::IgnoreCase => Cow::Owned(token.to_lowercase()),
        }
    }
}

/// Kind of a diff run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpTag {
    Equal,
    Replace,
    Insert,
    Delete,
}

/// A run of the diff: source `[i1, i2)` corresponds to target `[j1, j2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opcode {
    pub tag: OpTag,
    pub i1: usize,
    pub i2: usize,
    pub j1: usize,
    pub j2: usize,
}

impl Opcode {
    fn new(tag: OpTag, i1: usize, i2: usize, j1: usize, j2: usize) -> Self {
        Opcode { tag, i1, i2, j1, j2 }
    }
}

/// Opcode partition of a source sequence against a target sequence.
#[derive(Debug, Clone)]
pub struct Alignment {
    source: Vec<String>,
    target: Vec<String>,
    opcodes: Vec<Opcode>,
}

impl Alignment {
    /// Align two token sequences.
    ///
    /// Uses a longest-common-subsequence table over the part of the
    /// sequences left after trimming their common prefix and suffix.
    pub fn compute(
        source: impl IntoTokens,
        target: impl IntoTokens,
        config: &AlignmentConfig,
    ) -> Self {
        let source = source.into_tokens();
        let target = target.into_tokens();

        let left: Vec<Cow<str>> = source.iter().map(|t| config.comparison.key(t)).collect();
        let right: Vec<Cow<str>> = target.iter().map(|t| config.comparison.key(t)).collect();
        let opcodes = group_opcodes(&lcs_diff(&left, &right));

        Alignment {
            source,
            target,
            opcodes,
        }
    }

    /// Every run, in left-to-right order, `Equal` runs included.
    pub fn opcodes(&self) -> &[Opcode] {
        &self.opcodes
    }

    /// Runs that are not `Equal`.
    pub fn changes(&self) -> impl Iterator<Item = &Opcode> {
        self.opcodes.iter().filter(|op| op.tag != OpTag::Equal)
    }

    pub fn source_tokens(&self) -> &[String] {
        &self.source
    }

    pub fn target_tokens(&self) -> &[String] {
        &self.target
    }

    /// Buffer over the source with one annotation per change.
    ///
    /// Each annotation covers `[i1, i2)` and suggests the target tokens
    /// `[j1, j2)`; deletions suggest the empty string and insertions are
    /// zero-length. Inside `Equal` runs, consecutive tokens that only matched
    /// under a loose [`TokenComparison`] are annotated with the target text.
    /// Changes never overlap, so no conflict resolution happens.
    pub fn into_annotated(self) -> AnnotatedTokens {
        let mut changes: Vec<(usize, usize, String)> = Vec::new();
        for op in &self.opcodes {
            if op.tag != OpTag::Equal {
                changes.push((op.i1, op.i2, self.target[op.j1..op.j2].join(" ")));
                continue;
            }
            let mut k = 0;
            while k < op.i2 - op.i1 {
                if self.source[op.i1 + k] == self.target[op.j1 + k] {
                    k += 1;
                    continue;
                }
                let run_start = k;
                while k < op.i2 - op.i1 && self.source[op.i1 + k] != self.target[op.j1 + k] {
                    k += 1;
                }
                let target = &self.target[op.j1 + run_start..op.j1 + k];
                changes.push((op.i1 + run_start, op.i1 + k, target.join(" ")));
            }
        }

        let mut annotated = AnnotatedTokens::new(self.source);
        for (start, end, suggestion) in changes {
            let source_text = annotated.span_text(start, end);
            annotated.push(Annotation::new(start, end, source_text, suggestion, Meta::new()));
        }
        annotated
    }
}

/// Annotate `source` with the edits that turn it into `target`.
pub fn align(source: impl IntoTokens, target: impl IntoTokens) -> AnnotatedTokens {
    align_with(source, target, &AlignmentConfig::default())
}

/// [`align`] with explicit configuration.
pub fn align_with(
    source: impl IntoTokens,
    target: impl IntoTokens,
    config: &AlignmentConfig,
) -> AnnotatedTokens {
    Alignment::compute(source, target, config).into_annotated()
}

// =============================================================================
// Diff Algorithm Implementation (LCS-based)
// =============================================================================

/// Diff operation produced by the diff algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiffOp {
    /// Tokens at (left_idx, right_idx) are equal.
    Equal(usize, usize),
    /// Token at right_idx was inserted.
    Insert(usize),
    /// Token at left_idx was deleted.
    Delete(usize),
}

/// Compute a token diff using a Longest Common Subsequence table.
///
/// Time complexity: O(N*M) over the sequences once the common prefix and
/// suffix are removed.
fn lcs_diff<T: PartialEq>(left: &[T], right: &[T]) -> Vec<DiffOp> {
    let prefix = left
        .iter()
        .zip(right)
        .take_while(|(l, r)| l == r)
        .count();
    let suffix = left[prefix..]
        .iter()
        .rev()
        .zip(right[prefix..].iter().rev())
        .take_while(|(l, r)| l == r)
        .count();

    let mut ops: Vec<DiffOp> = (0..prefix).map(|idx| DiffOp::Equal(idx, idx)).collect();

    let left_mid = &left[prefix..left.len() - suffix];
    let right_mid = &right[prefix..right.len() - suffix];
    let n = left_mid.len();
    let m = right_mid.len();

    if n == 0 {
        ops.extend((0..m).map(|j| DiffOp::Insert(prefix + j)));
    } else if m == 0 {
        ops.extend((0..n).map(|i| DiffOp::Delete(prefix + i)));
    } else {
        // dp[i][j] = length of LCS of left_mid[0..i] and right_mid[0..j]
        let mut dp = vec![vec![0usize; m + 1]; n + 1];
        for i in 1..=n {
            for j in 1..=m {
                if left_mid[i - 1] == right_mid[j - 1] {
                    dp[i][j] = dp[i - 1][j - 1] + 1;
                } else {
                    dp[i][j] = dp[i - 1][j].max(dp[i][j - 1]);
                }
            }
        }

        let mut middle = Vec::new();
        let mut i = n;
        let mut j = m;
        while i > 0 || j > 0 {
            if i > 0 && j > 0 && left_mid[i - 1] == right_mid[j - 1] {
                middle.push(DiffOp::Equal(prefix + i - 1, prefix + j - 1));
                i -= 1;
                j -= 1;
            } else if j > 0 && (i == 0 || dp[i][j - 1] >= dp[i - 1][j]) {
                middle.push(DiffOp::Insert(prefix + j - 1));
                j -= 1;
            } else {
                middle.push(DiffOp::Delete(prefix + i - 1));
                i -= 1;
            }
        }
        middle.reverse();
        ops.extend(middle);
    }

    let left_tail = left.len() - suffix;
    let right_tail = right.len() - suffix;
    ops.extend((0..suffix).map(|k| DiffOp::Equal(left_tail + k, right_tail + k)));
    ops
}

/// Collapse single-token operations into maximal runs.
///
/// Consecutive inserts and deletes between two equal runs form one run, so
/// the non-equal runs partition the source into disjoint spans.
fn group_opcodes(ops: &[DiffOp]) -> Vec<Opcode> {
    let mut opcodes = Vec::new();
    let (mut i, mut j) = (0, 0);
    let mut idx = 0;

    while idx < ops.len() {
        let (i1, j1) = (i, j);
        if let DiffOp::Equal(..) = ops[idx] {
            while let Some(DiffOp::Equal(left, right)) = ops.get(idx) {
                i = left + 1;
                j = right + 1;
                idx += 1;
            }
            opcodes.push(Opcode::new(OpTag::Equal, i1, i, j1, j));
            continue;
        }

        loop {
            match ops.get(idx) {
                Some(DiffOp::Delete(left)) => i = left + 1,
                Some(DiffOp::Insert(right)) => j = right + 1,
                _ => break,
            }
            idx += 1;
        }
        let tag = match (i1 == i, j1 == j) {
            (false, false) => OpTag::Replace,
            (true, false) => OpTag::Insert,
            _ => OpTag::Delete,
        };
        opcodes.push(Opcode::new(tag, i1, i, j1, j));
    }

    opcodes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opcodes(source: &str, target: &str) -> Vec<Opcode> {
        Alignment::compute(source, target, &AlignmentConfig::default())
            .opcodes()
            .to_vec()
    }

    #[test]
    fn test_identical_sequences() {
        let alignment = Alignment::compute("hello world", "hello world", &AlignmentConfig::default());
        assert_eq!(alignment.changes().count(), 0);
        assert_eq!(alignment.opcodes(), &[Opcode::new(OpTag::Equal, 0, 2, 0, 2)]);
    }

    #[test]
    fn test_single_replacement() {
        assert_eq!(
            opcodes("the red fox", "the brown fox"),
            vec![
                Opcode::new(OpTag::Equal, 0, 1, 0, 1),
                Opcode::new(OpTag::Replace, 1, 2, 1, 2),
                Opcode::new(OpTag::Equal, 2, 3, 2, 3),
            ]
        );
    }

    #[test]
    fn test_insert_and_delete() {
        assert_eq!(
            opcodes("the fox", "the red fox"),
            vec![
                Opcode::new(OpTag::Equal, 0, 1, 0, 1),
                Opcode::new(OpTag::Insert, 1, 1, 1, 2),
                Opcode::new(OpTag::Equal, 1, 2, 2, 3),
            ]
        );
        assert_eq!(
            opcodes("the very red fox", "the fox"),
            vec![
                Opcode::new(OpTag::Equal, 0, 1, 0, 1),
                Opcode::new(OpTag::Delete, 1, 3, 1, 1),
                Opcode::new(OpTag::Equal, 3, 4, 1, 2),
            ]
        );
    }

    #[test]
    fn test_separate_changes_stay_separate() {
        assert_eq!(
            opcodes("a b c d", "a x c y"),
            vec![
                Opcode::new(OpTag::Equal, 0, 1, 0, 1),
                Opcode::new(OpTag::Replace, 1, 2, 1, 2),
                Opcode::new(OpTag::Equal, 2, 3, 2, 3),
                Opcode::new(OpTag::Replace, 3, 4, 3, 4),
            ]
        );
    }

    #[test]
    fn test_empty_sequences() {
        assert!(opcodes("", "").is_empty());
        assert_eq!(opcodes("", "a b"), vec![Opcode::new(OpTag::Insert, 0, 0, 0, 2)]);
        assert_eq!(opcodes("a b", ""), vec![Opcode::new(OpTag::Delete, 0, 2, 0, 0)]);
    }

    #[test]
    fn test_ignore_case() {
        let config = AlignmentConfig {
            comparison: TokenComparison::IgnoreCase,
        };
        let alignment = Alignment::compute("The Fox ran", "the fox walked", &config);
        let changes: Vec<_> = alignment.changes().copied().collect();
        assert_eq!(changes, vec![Opcode::new(OpTag::Replace, 2, 3, 2, 3)]);

        let exact = Alignment::compute("The Fox ran", "the fox walked", &AlignmentConfig::default());
        assert_eq!(exact.changes().count(), 1);
        assert_eq!(exact.changes().next().map(|op| (op.i1, op.i2)), Some((0, 3)));
    }

    #[test]
    fn test_ignore_case_keeps_target_casing() {
        let config = AlignmentConfig {
            comparison: TokenComparison::IgnoreCase,
        };
        let aligned = align_with("The Fox ran", "the fox walked", &config);
        assert_eq!(aligned.annotated_text(true), "{The Fox=>the fox} {ran=>walked}");
        assert_eq!(aligned.corrected_text(0), "the fox walked");

        let aligned = align_with("a Big red DOG", "a big red dog barks", &config);
        assert_eq!(
            aligned.annotated_text(true),
            "a {Big=>big} red {DOG=>dog} {=>barks}"
        );
        assert_eq!(aligned.corrected_text(0), "a big red dog barks");

        let mut applied = aligned.clone();
        applied.apply_all_corrections(0).unwrap();
        assert_eq!(applied.original_text(), "a big red dog barks");
    }

    #[test]
    fn test_align_builds_annotations() {
        let aligned = align("the fox jumped over a dog", "the quick fox jumps over the dog");
        assert_eq!(
            aligned.annotated_text(true),
            "the {=>quick} fox {jumped=>jumps} over {a=>the} dog"
        );
        assert_eq!(aligned.corrected_text(0), "the quick fox jumps over the dog");
    }

    #[test]
    fn test_align_deletion_renders_empty_suggestion() {
        let aligned = align("the red fox", "the fox");
        assert_eq!(aligned.annotated_text(true), "the {red=>} fox");
        assert_eq!(aligned.corrected_text(0), "the fox");
    }

    #[test]
    fn test_align_pretokenized_input() {
        let source = vec!["New", "York", "is", "big"];
        let target = vec!["New York".to_string(), "is".to_string(), "huge".to_string()];
        let aligned = align(source, target);
        assert_eq!(aligned.annotated_text(true), "{New York=>New York} is {big=>huge}");
        assert_eq!(aligned.corrected_tokens(0), vec!["New", "York", "is", "huge"]);
    }

    #[test]
    fn test_opcodes_serialize() {
        let json = serde_json::to_string(&Opcode::new(OpTag::Replace, 1, 2, 1, 3)).unwrap();
        assert_eq!(json, r#"{"tag":"replace","i1":1,"i2":2,"j1":1,"j2":3}"#);
    }
}
