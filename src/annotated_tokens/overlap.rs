//! Overlap detection and the policies that resolve conflicting annotations.

use super::AnnotatedTokens;
use crate::annotation::{unique, Annotation, AnnotationId, Meta};
use crate::errors::{AnnotationError, AnnotationResult};
use std::fmt;
use std::str::FromStr;

/// Caller-supplied overlap handling.
///
/// The resolver receives the buffer, the handles of every annotation that
/// intersects the new one, and the new annotation itself. It owns the
/// outcome: whatever it leaves in the buffer is the result of the insertion.
///
/// Implemented for every function or closure with the matching signature:
///
/// ```
/// use layered_edits::{AnnotatedTokens, Annotation, AnnotationId, AnnotationResult, Meta, OnOverlap};
///
/// fn keep_longest(
///     tokens: &mut AnnotatedTokens,
///     overlapping: &[AnnotationId],
///     new: Annotation,
/// ) -> AnnotationResult<Option<AnnotationId>> {
///     let longest = overlapping
///         .iter()
///         .filter_map(|id| tokens.get(*id))
///         .map(|ann| ann.len())
///         .max()
///         .unwrap_or(0);
///     if new.len() <= longest {
///         return Ok(None);
///     }
///     for id in overlapping {
///         tokens.remove(*id)?;
///     }
///     tokens.annotate_with(new.start(), new.end(), new.suggestions(), new.meta().clone(), OnOverlap::Error)
/// }
///
/// let mut tokens = AnnotatedTokens::new("a b c");
/// tokens.annotate(1, 2, "B").unwrap();
/// tokens.annotate_with(0, 3, "x", Meta::new(), OnOverlap::Custom(&keep_longest)).unwrap();
/// assert_eq!(tokens.annotated_text(false), "{a b c=>x}");
/// ```
pub trait OverlapResolver {
    fn resolve(
        &self,
        tokens: &mut AnnotatedTokens,
        overlapping: &[AnnotationId],
        new: Annotation,
    ) -> AnnotationResult<Option<AnnotationId>>;
}

impl<F> OverlapResolver for F
where
    F: Fn(&mut AnnotatedTokens, &[AnnotationId], Annotation) -> AnnotationResult<Option<AnnotationId>>,
{
    fn resolve(
        &self,
        tokens: &mut AnnotatedTokens,
        overlapping: &[AnnotationId],
        new: Annotation,
    ) -> AnnotationResult<Option<AnnotationId>> {
        self(tokens, overlapping, new)
    }
}

/// What to do when a new annotation intersects existing ones.
#[derive(Clone, Copy, Default)]
pub enum OnOverlap<'r> {
    /// Refuse the new annotation.
    #[default]
    Error,
    /// Drop every overlapping annotation and keep the new one.
    Override,
    /// Silently discard the new annotation.
    SaveOld,
    /// Merge with exactly one annotation covering the identical span.
    MergeStrict,
    /// Merge with exactly one annotation, widening the span to cover both.
    MergeExpand,
    /// Hand the conflict to a caller-supplied resolver.
    Custom(&'r dyn OverlapResolver),
}

impl OnOverlap<'_> {
    /// The policy token, `custom` for caller-supplied resolvers.
    pub fn as_str(&self) -> &'static str {
        match self {
            OnOverlap::Error => "error",
            OnOverlap::Override => "override",
            OnOverlap::SaveOld => "save_old",
            OnOverlap::MergeStrict => "merge_strict",
            OnOverlap::MergeExpand => "merge_expand",
            OnOverlap::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for OnOverlap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OnOverlap::{}", self.as_str())
    }
}

impl fmt::Display for OnOverlap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OnOverlap<'static> {
    type Err = AnnotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(OnOverlap::Error),
            "override" => Ok(OnOverlap::Override),
            "save_old" => Ok(OnOverlap::SaveOld),
            "merge_strict" => Ok(OnOverlap::MergeStrict),
            "merge_expand" => Ok(OnOverlap::MergeExpand),
            other => Err(AnnotationError::Argument(format!(
                "unknown on_overlap action: {:?}",
                other
            ))),
        }
    }
}

/// Whether `[a_start, a_end)` and `[b_start, b_end)` conflict.
///
/// Touching boundaries do not count. A zero-length span conflicts with a
/// span it sits strictly inside of, and with another zero-length span at the
/// same point.
pub fn spans_overlap(a: (usize, usize), b: (usize, usize)) -> bool {
    let (a_start, a_end) = a;
    let (b_start, b_end) = b;

    if a_end.min(b_end) > a_start.max(b_start) {
        return true;
    }
    if strictly_inside(a, b) || strictly_inside(b, a) {
        return true;
    }
    a_start == a_end && b_start == b_end && a_start == b_start
}

/// `inner` lies within `outer` without touching its start or end.
fn strictly_inside(inner: (usize, usize), outer: (usize, usize)) -> bool {
    outer.0 < inner.0 && inner.0 <= inner.1 && inner.1 < outer.1
}

/// Dispatch a detected conflict to the chosen policy.
pub(super) fn resolve(
    tokens: &mut AnnotatedTokens,
    overlapping: Vec<AnnotationId>,
    new: Annotation,
    on_overlap: OnOverlap<'_>,
) -> AnnotationResult<Option<AnnotationId>> {
    log::debug!(
        "annotation ({}, {}) overlaps {} existing, resolving with {}",
        new.start(),
        new.end(),
        overlapping.len(),
        on_overlap
    );

    match on_overlap {
        OnOverlap::Error => Err(AnnotationError::Overlap {
            start: new.start(),
            end: new.end(),
            count: overlapping.len(),
        }),
        OnOverlap::SaveOld => Ok(None),
        OnOverlap::Override => {
            for id in &overlapping {
                tokens.remove(*id)?;
            }
            Ok(Some(tokens.push(new)))
        }
        OnOverlap::MergeStrict => merge_strict(tokens, &overlapping, new).map(Some),
        OnOverlap::MergeExpand => merge_expand(tokens, &overlapping, new).map(Some),
        OnOverlap::Custom(resolver) => resolver.resolve(tokens, &overlapping, new),
    }
}

/// Merge two annotations over the exact same span.
///
/// Suggestions become the deduplicated union (existing first); metadata of
/// the new annotation wins on key collisions.
pub fn merge_strict(
    tokens: &mut AnnotatedTokens,
    overlapping: &[AnnotationId],
    new: Annotation,
) -> AnnotationResult<AnnotationId> {
    let (existing_id, existing) = single_overlap(tokens, overlapping)?;
    if existing.span() != new.span() {
        return Err(AnnotationError::MergeSpanMismatch {
            start: new.start(),
            end: new.end(),
            other_start: existing.start(),
            other_end: existing.end(),
        });
    }

    let suggestions = unique(
        existing
            .suggestions()
            .iter()
            .chain(new.suggestions())
            .cloned(),
    );
    let merged = Annotation::new(
        new.start(),
        new.end(),
        existing.source_text(),
        suggestions,
        merged_meta(&existing, &new),
    );
    tokens.swap_for_new(existing_id, merged)
}

/// Merge two intersecting annotations into one covering both spans.
///
/// Each suggestion is padded with the untouched tokens between its own span
/// and the widened span, so it still reads as a replacement of the whole.
pub fn merge_expand(
    tokens: &mut AnnotatedTokens,
    overlapping: &[AnnotationId],
    new: Annotation,
) -> AnnotationResult<AnnotationId> {
    let (existing_id, existing) = single_overlap(tokens, overlapping)?;

    let start = existing.start().min(new.start());
    let end = existing.end().max(new.end());

    let mut suggestions = Vec::new();
    for annotation in [&existing, &new] {
        let prefix = tokens.span_text(start, annotation.start());
        let suffix = tokens.span_text(annotation.end(), end);
        for suggestion in annotation.suggestions() {
            suggestions.push(join_non_empty(&[&prefix, suggestion, &suffix]));
        }
    }

    let merged = Annotation::new(
        start,
        end,
        tokens.span_text(start, end),
        unique(suggestions),
        merged_meta(&existing, &new),
    );
    tokens.swap_for_new(existing_id, merged)
}

fn single_overlap(
    tokens: &AnnotatedTokens,
    overlapping: &[AnnotationId],
) -> AnnotationResult<(AnnotationId, Annotation)> {
    match overlapping {
        [id] => {
            let existing = tokens.get(*id).ok_or(AnnotationError::NotFound(*id))?;
            Ok((*id, existing.clone()))
        }
        _ => Err(AnnotationError::MergeTopology {
            count: overlapping.len(),
        }),
    }
}

fn merged_meta(existing: &Annotation, new: &Annotation) -> Meta {
    let mut meta = existing.meta().clone();
    meta.extend(new.meta().iter().map(|(k, v)| (k.clone(), v.clone())));
    meta
}

fn join_non_empty(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> Meta {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn overlap_rules() {
        assert!(spans_overlap((0, 2), (1, 3)));
        assert!(spans_overlap((1, 3), (0, 2)));
        assert!(spans_overlap((0, 4), (1, 2)));

        // touching boundaries
        assert!(!spans_overlap((0, 2), (2, 4)));
        assert!(!spans_overlap((2, 4), (0, 2)));

        // zero-length spans
        assert!(spans_overlap((2, 2), (2, 2)));
        assert!(!spans_overlap((2, 2), (3, 3)));
        assert!(spans_overlap((2, 2), (1, 3)));
        assert!(spans_overlap((1, 3), (2, 2)));
        assert!(!spans_overlap((2, 2), (2, 4)));
        assert!(!spans_overlap((4, 4), (2, 4)));
    }

    #[test]
    fn policy_tokens_round_trip() {
        for token in &["error", "override", "save_old", "merge_strict", "merge_expand"] {
            let policy: OnOverlap = token.parse().unwrap();
            assert_eq!(policy.to_string(), *token);
        }
        let err = "merge_everything".parse::<OnOverlap>().unwrap_err();
        assert!(matches!(err, AnnotationError::Argument(_)));
        assert_eq!(format!("{:?}", OnOverlap::default()), "OnOverlap::error");
    }

    #[test]
    fn error_policy_names_conflict() {
        let mut tokens = AnnotatedTokens::new("a b c");
        tokens.annotate(0, 2, "x").unwrap();
        let err = tokens.annotate(1, 3, "y").unwrap_err();
        assert_eq!(
            err,
            AnnotationError::Overlap {
                start: 1,
                end: 3,
                count: 1
            }
        );
        assert_eq!(tokens.annotated_text(false), "{a b=>x} c");
    }

    #[test]
    fn override_replaces_all_conflicts() {
        let mut tokens = AnnotatedTokens::new("a b c d");
        tokens.annotate(0, 1, "A").unwrap();
        tokens.annotate(2, 3, "C").unwrap();
        tokens.annotate(3, 4, "D").unwrap();
        let id = tokens
            .annotate_with(0, 3, "all", Meta::new(), OnOverlap::Override)
            .unwrap();

        assert!(id.is_some());
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens.annotated_text(false), "{a b c=>all} {d=>D}");
    }

    #[test]
    fn save_old_discards_new() {
        let mut tokens = AnnotatedTokens::new("a b c");
        tokens.annotate(1, 2, "B").unwrap();
        let id = tokens
            .annotate_with(0, 3, "all", Meta::new(), OnOverlap::SaveOld)
            .unwrap();

        assert_eq!(id, None);
        assert_eq!(tokens.annotated_text(false), "a {b=>B} c");
    }

    #[test]
    fn strict_merge_unions_suggestions_and_meta() {
        let mut tokens = AnnotatedTokens::new("the red fox");
        tokens
            .annotate_with(1, 2, vec!["brown", "white"], meta(&[("a", "1"), ("b", "1")]), OnOverlap::Error)
            .unwrap();
        tokens
            .annotate_with(1, 2, vec!["white", "grey"], meta(&[("b", "2")]), OnOverlap::MergeStrict)
            .unwrap();

        assert_eq!(tokens.len(), 1);
        let merged = tokens.get_annotation_at(1, 2).unwrap();
        assert_eq!(merged.suggestions(), &["brown", "white", "grey"]);
        assert_eq!(merged.meta(), &meta(&[("a", "1"), ("b", "2")]));
        assert_eq!(merged.source_text(), "red");
    }

    #[test]
    fn strict_merge_requires_identical_span() {
        let mut tokens = AnnotatedTokens::new("the red fox");
        tokens.annotate(1, 2, "brown").unwrap();
        let err = tokens
            .annotate_with(1, 3, "dog", Meta::new(), OnOverlap::MergeStrict)
            .unwrap_err();

        assert!(matches!(err, AnnotationError::MergeSpanMismatch { .. }));
        assert!(err.is_overlap());
        assert_eq!(tokens.annotated_text(false), "the {red=>brown} fox");
    }

    #[test]
    fn merges_reject_many_to_one() {
        let mut tokens = AnnotatedTokens::new("a b c");
        tokens.annotate(0, 1, "A").unwrap();
        tokens.annotate(2, 3, "C").unwrap();

        for policy in [OnOverlap::MergeStrict, OnOverlap::MergeExpand] {
            let err = tokens
                .annotate_with(0, 3, "x", Meta::new(), policy)
                .unwrap_err();
            assert_eq!(err, AnnotationError::MergeTopology { count: 2 });
        }
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn expand_merge_pads_suggestions() {
        let mut tokens = AnnotatedTokens::new("a b c d");
        tokens.annotate(0, 2, "X").unwrap();
        tokens
            .annotate_with(1, 3, "Y", Meta::new(), OnOverlap::MergeExpand)
            .unwrap();

        assert_eq!(tokens.len(), 1);
        let merged = tokens.get_annotation_at(0, 3).unwrap();
        assert_eq!(merged.source_text(), "a b c");
        assert_eq!(merged.suggestions(), &["X c", "a Y"]);
    }

    #[test]
    fn expand_merge_of_nested_spans() {
        let mut tokens = AnnotatedTokens::new("a b c d");
        tokens.annotate(1, 2, "").unwrap();
        tokens
            .annotate_with(0, 4, vec!["w x y z"], Meta::new(), OnOverlap::MergeExpand)
            .unwrap();

        let merged = tokens.get_annotation_at(0, 4).unwrap();
        assert_eq!(merged.suggestions(), &["a c d", "w x y z"]);
    }

    #[test]
    fn custom_resolver_owns_outcome() {
        let calls = std::cell::Cell::new(0);
        let resolver = |tokens: &mut AnnotatedTokens,
                        overlapping: &[AnnotationId],
                        new: Annotation|
         -> AnnotationResult<Option<AnnotationId>> {
            calls.set(calls.get() + 1);
            assert_eq!(overlapping.len(), 1);
            let flagged = new.with_suggestions(Vec::<String>::new());
            tokens.remove(overlapping[0])?;
            tokens.annotate_with(flagged.start(), flagged.end(), flagged.suggestions(), Meta::new(), OnOverlap::Error)
        };

        let mut tokens = AnnotatedTokens::new("a b");
        tokens.annotate(0, 1, "A").unwrap();
        tokens
            .annotate_with(0, 2, "AB", Meta::new(), OnOverlap::Custom(&resolver))
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(tokens.annotated_text(false), "{a b=>NO_SUGGESTIONS}");
    }
}
