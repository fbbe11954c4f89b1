//! Tokens plus a set of proposed edits over them.
//!
//! [`AnnotatedTokens`] owns a token list and an unordered collection of
//! [`Annotation`]s. Annotations are added one at a time through
//! [`annotate`](AnnotatedTokens::annotate), conflicts are settled by an
//! [`OnOverlap`] policy, and corrections can be applied one by one with the
//! remaining annotations following the shifted positions.
//!
//! ```
//! use layered_edits::AnnotatedTokens;
//!
//! let mut tokens = AnnotatedTokens::new("helo world !");
//! tokens.annotate(0, 1, "Hello").unwrap();
//! assert_eq!(tokens.annotated_text(true), "{helo=>Hello} world !");
//! assert_eq!(tokens.corrected_text(0), "Hello world !");
//! assert_eq!(tokens.original_text(), "helo world !");
//! ```

mod display;
mod overlap;

pub use display::AnnotatedTokensDisplay;
pub use overlap::{merge_expand, merge_strict, spans_overlap, OnOverlap, OverlapResolver};

use crate::annotation::{Annotation, AnnotationId, Meta, Suggestions};
use crate::errors::{AnnotationError, AnnotationResult};
use crate::mutable_tokens::{IntoTokens, MutableTokens};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Entry {
    id: AnnotationId,
    annotation: Annotation,
}

/// A token list with annotations over it.
///
/// Annotations are addressed by [`AnnotationId`] handles, so two annotations
/// with equal values stay distinct. Handles are never reused.
///
/// Deserialized buffers go through the same span and overlap checks as
/// [`annotate`](Self::annotate); handles must be unique.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RawAnnotatedTokens")]
pub struct AnnotatedTokens {
    tokens: Vec<String>,
    entries: Vec<Entry>,
    next_id: u64,
}

/// Unchecked wire form of [`AnnotatedTokens`].
#[derive(Deserialize)]
struct RawAnnotatedTokens {
    tokens: Vec<String>,
    entries: Vec<Entry>,
    #[serde(default)]
    next_id: u64,
}

impl TryFrom<RawAnnotatedTokens> for AnnotatedTokens {
    type Error = AnnotationError;

    fn try_from(raw: RawAnnotatedTokens) -> Result<Self, Self::Error> {
        let mut tokens = AnnotatedTokens::new(raw.tokens);
        for Entry { id, annotation } in raw.entries {
            if tokens.contains(id) {
                return Err(AnnotationError::Argument(format!(
                    "duplicate annotation handle {}",
                    id
                )));
            }
            tokens.check_span(annotation.start(), annotation.end())?;
            let conflicts = tokens.overlapping(annotation.start(), annotation.end(), None);
            if !conflicts.is_empty() {
                return Err(AnnotationError::Overlap {
                    start: annotation.start(),
                    end: annotation.end(),
                    count: conflicts.len(),
                });
            }
            tokens.next_id = tokens.next_id.max(id.0.saturating_add(1));
            tokens.entries.push(Entry { id, annotation });
        }
        tokens.next_id = tokens.next_id.max(raw.next_id);
        Ok(tokens)
    }
}

impl AnnotatedTokens {
    pub fn new(tokens: impl IntoTokens) -> Self {
        AnnotatedTokens {
            tokens: tokens.into_tokens(),
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// Annotate `[start, end)` with no metadata, failing on overlap.
    ///
    /// ```
    /// use layered_edits::AnnotatedTokens;
    ///
    /// let mut tokens = AnnotatedTokens::new("the red fox");
    /// tokens.annotate(1, 2, vec!["brown", "white"]).unwrap();
    /// assert_eq!(tokens.annotated_text(true), "the {red=>brown|white} fox");
    /// ```
    pub fn annotate(
        &mut self,
        start: usize,
        end: usize,
        suggestions: impl Into<Suggestions>,
    ) -> AnnotationResult<Option<AnnotationId>> {
        self.annotate_with(start, end, suggestions, Meta::new(), OnOverlap::Error)
    }

    /// Annotate `[start, end)` and settle conflicts with `on_overlap`.
    ///
    /// Returns the handle of the annotation that ended up covering the span,
    /// or `None` when the new annotation was discarded (`SaveOld`, or a
    /// custom resolver that chose not to insert). On error the buffer is
    /// unchanged, except for whatever a custom resolver did before failing.
    pub fn annotate_with(
        &mut self,
        start: usize,
        end: usize,
        suggestions: impl Into<Suggestions>,
        meta: Meta,
        on_overlap: OnOverlap<'_>,
    ) -> AnnotationResult<Option<AnnotationId>> {
        self.check_span(start, end)?;
        let annotation = Annotation::new(start, end, self.span_text(start, end), suggestions, meta);

        let overlapping = self.overlapping(start, end, None);
        if overlapping.is_empty() {
            return Ok(Some(self.push(annotation)));
        }
        overlap::resolve(self, overlapping, annotation, on_overlap)
    }

    fn check_span(&self, start: usize, end: usize) -> AnnotationResult<()> {
        if start > end || end > self.tokens.len() {
            return Err(AnnotationError::Range {
                start,
                end,
                len: self.tokens.len(),
            });
        }
        Ok(())
    }

    /// Space-joined tokens of `[start, end)`, clamped to the token list.
    pub(crate) fn span_text(&self, start: usize, end: usize) -> String {
        let end = end.min(self.tokens.len());
        if start >= end {
            return String::new();
        }
        self.tokens[start..end].join(" ")
    }

    /// Handles of annotations conflicting with `[start, end)`.
    fn overlapping(&self, start: usize, end: usize, skip: Option<AnnotationId>) -> Vec<AnnotationId> {
        self.entries
            .iter()
            .filter(|entry| Some(entry.id) != skip)
            .filter(|entry| spans_overlap(entry.annotation.span(), (start, end)))
            .map(|entry| entry.id)
            .collect()
    }

    pub(crate) fn push(&mut self, annotation: Annotation) -> AnnotationId {
        let id = AnnotationId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry { id, annotation });
        id
    }

    /// Remove `old` and insert `annotation` under a fresh handle, as long as
    /// nothing else conflicts with the new span.
    pub(crate) fn swap_for_new(
        &mut self,
        old: AnnotationId,
        annotation: Annotation,
    ) -> AnnotationResult<AnnotationId> {
        let conflicts = self.overlapping(annotation.start(), annotation.end(), Some(old));
        if !conflicts.is_empty() {
            return Err(AnnotationError::Overlap {
                start: annotation.start(),
                end: annotation.end(),
                count: conflicts.len(),
            });
        }
        self.remove(old)?;
        Ok(self.push(annotation))
    }

    fn position(&self, id: AnnotationId) -> AnnotationResult<usize> {
        self.entries
            .iter()
            .position(|entry| entry.id == id)
            .ok_or(AnnotationError::NotFound(id))
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| &entry.annotation)
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.get(id).is_some()
    }

    /// The annotation covering exactly `[start, end)`, if any.
    pub fn get_annotation_at(&self, start: usize, end: usize) -> Option<&Annotation> {
        self.id_at(start, end).and_then(|id| self.get(id))
    }

    /// Handle of the annotation covering exactly `[start, end)`, if any.
    pub fn id_at(&self, start: usize, end: usize) -> Option<AnnotationId> {
        self.entries
            .iter()
            .find(|entry| entry.annotation.span() == (start, end))
            .map(|entry| entry.id)
    }

    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.entries.iter().map(|entry| &entry.annotation)
    }

    /// Snapshot of the current handles.
    pub fn ids(&self) -> Vec<AnnotationId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    /// Number of annotations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start a walk over the annotations that tolerates removing or
    /// correcting the visited annotation between steps.
    ///
    /// Adding or removing other annotations mid-walk is not supported: some
    /// annotations may then be skipped or visited twice.
    ///
    /// ```
    /// use layered_edits::AnnotatedTokens;
    ///
    /// let mut tokens = AnnotatedTokens::new("1 2 3");
    /// tokens.annotate(0, 1, "One").unwrap();
    /// tokens.annotate(1, 2, "Two").unwrap();
    /// tokens.annotate(2, 3, "Three").unwrap();
    ///
    /// let mut cursor = tokens.cursor();
    /// let mut visited = 0;
    /// while let Some(id) = cursor.next(&tokens) {
    ///     if visited == 0 {
    ///         tokens.apply_correction(id, 0).unwrap();
    ///     } else {
    ///         tokens.remove(id).unwrap();
    ///     }
    ///     visited += 1;
    /// }
    /// assert_eq!(visited, 3);
    /// assert_eq!(tokens.annotated_text(true), "One 2 3");
    /// ```
    pub fn cursor(&self) -> AnnotationCursor {
        AnnotationCursor::default()
    }

    /// Remove an annotation, leaving its tokens as they are.
    pub fn remove(&mut self, id: AnnotationId) -> AnnotationResult<Annotation> {
        let idx = self.position(id)?;
        Ok(self.entries.remove(idx).annotation)
    }

    /// Put `annotation` in place of `id`, keeping the handle.
    ///
    /// The new span must be valid and must not conflict with any other
    /// annotation. Returns the replaced annotation.
    pub fn replace_annotation(
        &mut self,
        id: AnnotationId,
        annotation: Annotation,
    ) -> AnnotationResult<Annotation> {
        let idx = self.position(id)?;
        self.check_span(annotation.start(), annotation.end())?;
        let conflicts = self.overlapping(annotation.start(), annotation.end(), Some(id));
        if !conflicts.is_empty() {
            return Err(AnnotationError::Overlap {
                start: annotation.start(),
                end: annotation.end(),
                count: conflicts.len(),
            });
        }
        Ok(std::mem::replace(&mut self.entries[idx].annotation, annotation))
    }

    /// Remove every annotation for which `keep` returns false.
    ///
    /// The predicate also sees the buffer, for decisions that depend on the
    /// surrounding tokens.
    pub fn filter_annotations<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Annotation, &AnnotatedTokens) -> bool,
    {
        let mut cursor = self.cursor();
        while let Some(id) = cursor.next(self) {
            if let Ok(idx) = self.position(id) {
                if !keep(&self.entries[idx].annotation, self) {
                    self.entries.remove(idx);
                }
            }
        }
    }

    /// Apply the `level`-th suggestion of an annotation to the tokens and
    /// drop the annotation.
    ///
    /// Without a `level`-th suggestion the annotation's own source text is
    /// used, so the tokens stay the same. Every other annotation starting at
    /// or after the corrected span is moved by the change in token count.
    /// Zero-length annotations at the start of a non-empty corrected span
    /// stay put, since they precede the replacement. Annotations that start
    /// before the corrected span but reach into it are left untouched and
    /// logged as a warning; their positions may no longer match the tokens.
    ///
    /// ```
    /// use layered_edits::AnnotatedTokens;
    ///
    /// let mut tokens = AnnotatedTokens::new("one too");
    /// let first = tokens.annotate(0, 1, "ONE").unwrap().unwrap();
    /// tokens.annotate(1, 2, "two").unwrap();
    /// tokens.apply_correction(first, 0).unwrap();
    /// assert_eq!(tokens.annotated_text(true), "ONE {too=>two}");
    /// ```
    pub fn apply_correction(&mut self, id: AnnotationId, level: usize) -> AnnotationResult<()> {
        let idx = self.position(id)?;
        let annotation = self.entries.remove(idx).annotation;

        let replacement = annotation
            .suggestions()
            .get(level)
            .map(String::as_str)
            .unwrap_or_else(|| annotation.source_text());

        let before = self.tokens.len();
        let mut tokens = MutableTokens::new(std::mem::take(&mut self.tokens));
        tokens.replace(annotation.start(), annotation.end(), replacement);
        self.tokens = tokens.edited_tokens(false);

        let delta = self.tokens.len() as isize - before as isize;
        log::debug!(
            "applied {} at ({}, {}), shifting later annotations by {}",
            annotation,
            annotation.start(),
            annotation.end(),
            delta
        );

        let (start, end) = annotation.span();
        for entry in self.entries.iter_mut() {
            let (other_start, other_end) = entry.annotation.span();
            if other_start < start {
                if other_end > start {
                    log::warn!(
                        "annotation {} at ({}, {}) straddles the correction at ({}, {}) and was not moved",
                        entry.id,
                        other_start,
                        other_end,
                        start,
                        end
                    );
                }
                continue;
            }
            if start < end && other_start == other_end && other_start == start {
                continue;
            }
            if delta != 0 {
                entry.annotation = entry
                    .annotation
                    .moved_to(shift(other_start, delta), shift(other_end, delta));
            }
        }
        Ok(())
    }

    /// Apply every annotation's `level`-th suggestion, one correction at a time.
    pub fn apply_all_corrections(&mut self, level: usize) -> AnnotationResult<()> {
        let mut cursor = self.cursor();
        while let Some(id) = cursor.next(self) {
            self.apply_correction(id, level)?;
        }
        Ok(())
    }

    /// The current tokens, without any annotation applied.
    pub fn original_tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn original_text(&self) -> String {
        self.tokens.join(" ")
    }

    /// Tokens with every annotation's `level`-th suggestion applied.
    ///
    /// Annotations without that many suggestions are left out. The buffer is
    /// not modified.
    pub fn corrected_tokens(&self, level: usize) -> Vec<String> {
        let mut tokens = MutableTokens::new(self.tokens.as_slice());
        for annotation in self.annotations() {
            if let Some(suggestion) = annotation.suggestions().get(level) {
                tokens.replace(annotation.start(), annotation.end(), suggestion.as_str());
            }
        }
        tokens.edited_tokens(false)
    }

    pub fn corrected_text(&self, level: usize) -> String {
        self.corrected_tokens(level).join(" ")
    }

    /// Text with every annotation rendered as `{source=>s1|s2:::k=v}`.
    ///
    /// ```
    /// use layered_edits::{AnnotatedTokens, Meta, OnOverlap};
    ///
    /// let mut tokens = AnnotatedTokens::new("helo . world!");
    /// let meta: Meta = vec![("key".to_string(), "value".to_string())].into_iter().collect();
    /// tokens.annotate_with(0, 2, "Hello ,", meta, OnOverlap::Error).unwrap();
    /// assert_eq!(tokens.annotated_text(false), "{helo .=>Hello ,} world!");
    /// assert_eq!(tokens.annotated_text(true), "{helo .=>Hello ,:::key=value} world!");
    /// ```
    pub fn annotated_text(&self, with_meta: bool) -> String {
        let mut tokens = MutableTokens::new(self.tokens.as_slice());
        for annotation in self.annotations() {
            tokens.replace(
                annotation.start(),
                annotation.end(),
                annotation.to_annotated_string(with_meta),
            );
        }
        tokens.edited_text(true)
    }

    /// Copy the annotations of `other` into this buffer.
    ///
    /// Both buffers must hold the same tokens. Annotations of `self` win every
    /// conflict: with `discard_overlap` conflicting annotations of `other` are
    /// dropped, otherwise the first conflict fails the whole call and `self`
    /// is left unchanged.
    pub fn combine(&mut self, other: &AnnotatedTokens, discard_overlap: bool) -> AnnotationResult<()> {
        if self.tokens != other.tokens {
            return Err(AnnotationError::Mismatch {
                left: self.original_text(),
                right: other.original_text(),
            });
        }

        let on_overlap = if discard_overlap {
            OnOverlap::SaveOld
        } else {
            OnOverlap::Error
        };

        let mut combined = self.clone();
        for annotation in other.annotations() {
            combined.annotate_with(
                annotation.start(),
                annotation.end(),
                annotation.suggestions(),
                annotation.meta().clone(),
                on_overlap,
            )?;
        }
        *self = combined;
        Ok(())
    }

    /// Column-aligned rendering with one underlined line per annotation.
    pub fn display(&self) -> AnnotatedTokensDisplay<'_> {
        AnnotatedTokensDisplay::new(self)
    }
}

fn shift(pos: usize, delta: isize) -> usize {
    (pos as isize + delta).max(0) as usize
}

impl PartialEq for AnnotatedTokens {
    /// Same tokens and the same annotations, regardless of handles and order.
    fn eq(&self, other: &Self) -> bool {
        self.tokens == other.tokens
            && self.entries.len() == other.entries.len()
            && other.annotations().all(|annotation| {
                self.get_annotation_at(annotation.start(), annotation.end()) == Some(annotation)
            })
    }
}

impl fmt::Display for AnnotatedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.annotated_text(true))
    }
}

impl fmt::Debug for AnnotatedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnnotatedTokens")
            .field(&self.annotated_text(true))
            .finish()
    }
}

/// Position of a walk over a buffer's annotations.
///
/// The cursor keeps the annotation count it last saw and moves its index by
/// the net change in count after every step, so removing (or correcting) the
/// annotation just visited does not skip the next one.
#[derive(Debug, Clone, Default)]
pub struct AnnotationCursor {
    index: usize,
    seen_len: usize,
    started: bool,
}

impl AnnotationCursor {
    /// Handle of the next annotation, or `None` once the walk is over.
    pub fn next(&mut self, tokens: &AnnotatedTokens) -> Option<AnnotationId> {
        let len = tokens.entries.len();
        if self.started {
            let delta = len as isize - self.seen_len as isize;
            self.index = (self.index as isize + delta + 1).max(0) as usize;
        } else {
            self.started = true;
        }
        self.seen_len = len;
        tokens.entries.get(self.index).map(|entry| entry.id)
    }
}
