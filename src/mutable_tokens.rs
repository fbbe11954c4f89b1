//! Batch span replacement over a token list.

use crate::annotation::NO_SUGGESTIONS;
use std::fmt;

/// Anything that can be turned into a token list.
///
/// Strings are split on whitespace; token lists are taken as they are.
pub trait IntoTokens {
    fn into_tokens(self) -> Vec<String>;
}

impl IntoTokens for &str {
    fn into_tokens(self) -> Vec<String> {
        self.split_whitespace().map(String::from).collect()
    }
}

impl IntoTokens for String {
    fn into_tokens(self) -> Vec<String> {
        self.as_str().into_tokens()
    }
}

impl IntoTokens for &String {
    fn into_tokens(self) -> Vec<String> {
        self.as_str().into_tokens()
    }
}

impl IntoTokens for Vec<String> {
    fn into_tokens(self) -> Vec<String> {
        self
    }
}

impl IntoTokens for &[String] {
    fn into_tokens(self) -> Vec<String> {
        self.to_vec()
    }
}

impl IntoTokens for Vec<&str> {
    fn into_tokens(self) -> Vec<String> {
        self.into_iter().map(String::from).collect()
    }
}

impl IntoTokens for &[&str] {
    fn into_tokens(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

/// A staged replacement. `None` is the "no suggestion" placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    start: usize,
    end: usize,
    value: Option<String>,
}

/// A token list plus a batch of pending span replacements.
///
/// Edits are staged with [`replace`](Self::replace) and materialized in
/// `(start, end)` order; the source tokens stay untouched until
/// [`apply_edits`](Self::apply_edits).
///
/// ```
/// use layered_edits::MutableTokens;
///
/// let mut tokens = MutableTokens::new("the red fox");
/// tokens.replace(1, 2, "brown");
/// assert_eq!(tokens.edited_text(false), "the brown fox");
/// assert_eq!(tokens.source_text(), "the red fox");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutableTokens {
    tokens: Vec<String>,
    edits: Vec<Edit>,
}

impl MutableTokens {
    pub fn new(tokens: impl IntoTokens) -> Self {
        MutableTokens {
            tokens: tokens.into_tokens(),
            edits: Vec::new(),
        }
    }

    /// Stage replacing `[start, end)` with `value`, split on whitespace.
    ///
    /// An empty value deletes the span; `start == end` inserts.
    pub fn replace(&mut self, start: usize, end: usize, value: impl Into<String>) {
        self.edits.push(Edit {
            start,
            end,
            value: Some(value.into()),
        });
    }

    /// Stage a "no suggestion" placeholder over `[start, end)`.
    pub fn flag(&mut self, start: usize, end: usize) {
        self.edits.push(Edit {
            start,
            end,
            value: None,
        });
    }

    /// Number of staged edits.
    pub fn pending(&self) -> usize {
        self.edits.len()
    }

    /// Materialize all staged edits into the token list.
    pub fn apply_edits(&mut self) {
        self.tokens = self.edited_tokens(false);
        self.edits.clear();
    }

    /// Tokens without pending edits.
    pub fn source_tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn source_text(&self) -> String {
        self.tokens.join(" ")
    }

    /// Tokens with all staged edits applied.
    ///
    /// With `highlight` off, placeholder edits (and any text carrying the
    /// [`NO_SUGGESTIONS`] marker) keep the original tokens. With it on the
    /// marker text is kept.
    pub fn edited_tokens(&self, highlight: bool) -> Vec<String> {
        let mut edits: Vec<&Edit> = self.edits.iter().collect();
        edits.sort_by_key(|edit| (edit.start, edit.end));

        let len = self.tokens.len();
        let mut result = Vec::with_capacity(len);
        let mut cursor = 0;
        for edit in edits {
            let begin = edit.start.min(len);
            let end = edit.end.min(len);
            if cursor < begin {
                result.extend_from_slice(&self.tokens[cursor..begin]);
            }
            match &edit.value {
                None if highlight => result.push(NO_SUGGESTIONS.to_string()),
                Some(text) if highlight || !text.contains(NO_SUGGESTIONS) => {
                    result.extend(text.split_whitespace().map(String::from));
                }
                _ => {
                    if begin < end {
                        result.extend_from_slice(&self.tokens[begin..end]);
                    }
                }
            }
            cursor = end;
        }
        if cursor < len {
            result.extend_from_slice(&self.tokens[cursor..]);
        }
        result
    }

    pub fn edited_text(&self, highlight: bool) -> String {
        self.edited_tokens(highlight).join(" ")
    }
}

impl fmt::Display for MutableTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.edited_text(false))
    }
}
