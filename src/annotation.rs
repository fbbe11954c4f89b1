//! A single proposed edit over a token span.

use crate::errors::AnnotationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Placeholder rendered for annotations that flag a span without proposing anything.
pub const NO_SUGGESTIONS: &str = "NO_SUGGESTIONS";

/// Auxiliary data carried by an annotation. Opaque to the engine.
///
/// Keys are kept sorted so rendering is deterministic.
pub type Meta = BTreeMap<String, String>;

/// Stable handle of an annotation inside an [`AnnotatedTokens`](crate::AnnotatedTokens) buffer.
///
/// Handles are never reused by a buffer, so two annotations with identical
/// values are still told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationId(pub u64);

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Normalized list of candidate replacements.
///
/// Accepts a single string, a list of strings, or nothing at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suggestions(pub Vec<String>);

impl Suggestions {
    /// No suggestion: the span is only flagged.
    pub fn none() -> Self {
        Suggestions(Vec::new())
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for Suggestions {
    fn from(value: &str) -> Self {
        Suggestions(vec![value.to_string()])
    }
}

impl From<String> for Suggestions {
    fn from(value: String) -> Self {
        Suggestions(vec![value])
    }
}

impl From<Vec<String>> for Suggestions {
    fn from(value: Vec<String>) -> Self {
        Suggestions(value)
    }
}

impl From<Vec<&str>> for Suggestions {
    fn from(value: Vec<&str>) -> Self {
        Suggestions(value.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for Suggestions {
    fn from(value: &[&str]) -> Self {
        Suggestions(value.iter().map(|s| s.to_string()).collect())
    }
}

impl From<&[String]> for Suggestions {
    fn from(value: &[String]) -> Self {
        Suggestions(value.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for Suggestions {
    fn from(value: [&str; N]) -> Self {
        Suggestions(value.iter().map(|s| s.to_string()).collect())
    }
}

impl<T: Into<Suggestions>> From<Option<T>> for Suggestions {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// An immutable proposed edit over the half-open token span `[start, end)`.
///
/// `source_text` is captured when the annotation is created and never
/// recomputed. Position changes caused by earlier edits produce a new record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawAnnotation")]
pub struct Annotation {
    start: usize,
    end: usize,
    source_text: String,
    suggestions: Vec<String>,
    meta: Meta,
}

/// Unchecked wire form of [`Annotation`].
#[derive(Deserialize)]
struct RawAnnotation {
    start: usize,
    end: usize,
    source_text: String,
    suggestions: Vec<String>,
    #[serde(default)]
    meta: Meta,
}

impl TryFrom<RawAnnotation> for Annotation {
    type Error = AnnotationError;

    fn try_from(raw: RawAnnotation) -> Result<Self, Self::Error> {
        if raw.start > raw.end {
            return Err(AnnotationError::Argument(format!(
                "inverted annotation span ({}, {})",
                raw.start, raw.end
            )));
        }
        Ok(Annotation {
            start: raw.start,
            end: raw.end,
            source_text: raw.source_text,
            suggestions: raw.suggestions,
            meta: raw.meta,
        })
    }
}

impl Annotation {
    /// Create an annotation. Span validation is the buffer's job.
    pub fn new(
        start: usize,
        end: usize,
        source_text: impl Into<String>,
        suggestions: impl Into<Suggestions>,
        meta: Meta,
    ) -> Self {
        Annotation {
            start,
            end,
            source_text: source_text.into(),
            suggestions: suggestions.into().into_vec(),
            meta,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn span(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    /// Number of covered tokens.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Zero-length annotations mark an insertion point.
    pub fn is_insertion(&self) -> bool {
        self.start == self.end
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// The first suggestion, if any.
    pub fn top_suggestion(&self) -> Option<&str> {
        self.suggestions.first().map(String::as_str)
    }

    /// Same span and source text, different candidates.
    pub fn with_suggestions(&self, suggestions: impl Into<Suggestions>) -> Self {
        Annotation {
            suggestions: suggestions.into().into_vec(),
            ..self.clone()
        }
    }

    /// Same span and candidates, different metadata.
    pub fn with_meta(&self, meta: Meta) -> Self {
        Annotation {
            meta,
            ..self.clone()
        }
    }

    /// Translate the span to `[start, end)` keeping everything else.
    pub(crate) fn moved_to(&self, start: usize, end: usize) -> Self {
        Annotation {
            start,
            end,
            ..self.clone()
        }
    }

    /// Render as `{source=>s1|s2:::k=v}`.
    ///
    /// ```
    /// use layered_edits::{Annotation, Meta};
    ///
    /// let ann = Annotation::new(0, 1, "helo", ["hello", "hola"], Meta::new());
    /// assert_eq!(ann.to_annotated_string(true), "{helo=>hello|hola}");
    /// ```
    pub fn to_annotated_string(&self, with_meta: bool) -> String {
        let replacement = if self.suggestions.is_empty() {
            NO_SUGGESTIONS.to_string()
        } else {
            self.suggestions.join("|")
        };

        let mut out = format!("{{{}=>{}", self.source_text, replacement);
        if with_meta {
            for (key, value) in &self.meta {
                out.push_str(":::");
                out.push_str(key);
                out.push('=');
                out.push_str(value);
            }
        }
        out.push('}');
        out
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_annotated_string(true))
    }
}

/// Order-preserving deduplication.
pub(crate) fn unique(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
