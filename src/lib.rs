#![doc(
    html_logo_url = "https://raw.githubusercontent.com/storyscript/layered-nlp/main/assets/layered-nlp.svg",
    issue_tracker_base_url = "https://github.com/storyscript/layered-nlp/issues/"
)]

//! Token-level annotation and alignment for layered-nlp.
//!
//! This crate manages proposed edits over tokenized text: it keeps a token
//! list together with annotations over spans of it, settles conflicting
//! annotations, applies corrections while keeping every other annotation
//! anchored, and derives annotations automatically by diffing a source
//! against a corrected target.
//!
//! Linguistic analysis is not part of this crate. Callers feed it spans and
//! suggestions computed elsewhere.
//!
//! ## Modules
//!
//! - [`align`](mod@align) - LCS opcode diff between two token sequences
//! - [`annotated_tokens`] - the annotated token buffer and overlap policies
//! - [`annotation`] - the immutable annotation record
//! - [`mutable_tokens`] - batch span replacement over a token list
//! - [`errors`] - error types
//!
//! ## Example
//!
//! ```
//! use layered_edits::{align, AnnotatedTokens, Meta, OnOverlap};
//!
//! let mut aligned = align("he go to school", "he goes to school");
//! assert_eq!(aligned.annotated_text(true), "he {go=>goes} to school");
//!
//! let mut extra = AnnotatedTokens::new("he go to school");
//! extra.annotate(1, 2, "went").unwrap();
//! extra.annotate(4, 4, "today").unwrap();
//!
//! aligned.combine(&extra, true).unwrap();
//! assert_eq!(aligned.annotated_text(true), "he {go=>goes} to school {=>today}");
//!
//! let id = aligned.id_at(1, 2).unwrap();
//! aligned
//!     .annotate_with(1, 2, "went", Meta::new(), OnOverlap::MergeStrict)
//!     .unwrap();
//! assert!(!aligned.contains(id));
//! assert_eq!(aligned.corrected_text(1), "he went to school");
//! ```

pub mod align;
pub mod annotated_tokens;
pub mod annotation;
pub mod errors;
pub mod mutable_tokens;

pub use align::{align, align_with, Alignment, AlignmentConfig, OpTag, Opcode, TokenComparison};
pub use annotated_tokens::{
    merge_expand, merge_strict, spans_overlap, AnnotatedTokens, AnnotatedTokensDisplay,
    AnnotationCursor, OnOverlap, OverlapResolver,
};
pub use annotation::{Annotation, AnnotationId, Meta, Suggestions, NO_SUGGESTIONS};
pub use errors::{AnnotationError, AnnotationResult};
pub use mutable_tokens::{IntoTokens, MutableTokens};
