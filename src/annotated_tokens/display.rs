use super::AnnotatedTokens;
use crate::annotation::Annotation;
use std::fmt::{self, Write};
use unicode_width::UnicodeWidthStr;

const SPACE_PADDING: usize = 2;

/// Column-aligned rendering of a buffer and its annotations.
///
/// The tokens go on the first line, then every annotation gets its own line
/// with an underline below the tokens it covers:
///
/// ```text
/// the  red  fox  jumps
///      ╰─╯ {red=>brown}
///                      ╰ {=>high}
/// ```
///
/// An insertion point is drawn one column after the token it follows.
pub struct AnnotatedTokensDisplay<'a> {
    tokens: &'a AnnotatedTokens,
    with_meta: bool,
}

impl<'a> AnnotatedTokensDisplay<'a> {
    pub fn new(tokens: &'a AnnotatedTokens) -> Self {
        AnnotatedTokensDisplay {
            tokens,
            with_meta: true,
        }
    }

    /// Takes self
    pub fn with_meta(mut self, with_meta: bool) -> Self {
        self.with_meta = with_meta;
        self
    }

    /// Annotations in `(start, end)` order.
    fn sorted_annotations(&self) -> Vec<&'a Annotation> {
        let mut annotations: Vec<&Annotation> = self.tokens.annotations().collect();
        annotations.sort_by_key(|annotation| annotation.span());
        annotations
    }
}

impl<'a> fmt::Display for AnnotatedTokensDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut token_idx_to_start_col = Vec::new();
        let mut token_idx_to_end_col = Vec::new();

        let mut opening_line = String::new();
        for (idx, token) in self.tokens.original_tokens().iter().enumerate() {
            if idx > 0 {
                opening_line.extend(std::iter::repeat(' ').take(SPACE_PADDING));
            }
            token_idx_to_start_col.push(UnicodeWidthStr::width(&*opening_line));
            opening_line.push_str(token);
            token_idx_to_end_col.push(UnicodeWidthStr::width(&*opening_line));
        }

        f.write_str(&opening_line)?;

        for annotation in self.sorted_annotations() {
            f.write_char('\n')?;

            let (start, end) = annotation.span();
            if start >= end || start >= token_idx_to_start_col.len() {
                let col = match start.checked_sub(1) {
                    Some(prev) => token_idx_to_end_col.get(prev).map_or(0, |end_col| end_col + 1),
                    None => 0,
                };
                write_padding(f, col)?;
                f.write_char('╰')?;
            } else {
                let start_col = token_idx_to_start_col[start];
                let end_col = token_idx_to_end_col[(end - 1).min(token_idx_to_end_col.len() - 1)];
                write_padding(f, start_col)?;

                f.write_char('╰')?;
                for _ in (start_col + 1)..end_col.saturating_sub(1) {
                    f.write_char('─')?;
                }
                if end_col - start_col > 1 {
                    f.write_char('╯')?;
                }
            }

            f.write_char(' ')?;
            f.write_str(&annotation.to_annotated_string(self.with_meta))?;
        }

        Ok(())
    }
}

fn write_padding(f: &mut fmt::Formatter<'_>, width: usize) -> fmt::Result {
    for _ in 0..width {
        f.write_char(' ')?;
    }
    Ok(())
}
