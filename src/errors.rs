//! Error types for annotation and correction.
//!
//! Every operation reports failures synchronously and leaves the buffer
//! untouched when it fails.

use crate::annotation::AnnotationId;
use thiserror::Error;

/// Errors that can occur while annotating or editing a token buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotationError {
    /// Span is inverted or reaches past the end of the token list.
    #[error("invalid span ({start}, {end}) over {len} tokens")]
    Range {
        start: usize,
        end: usize,
        len: usize,
    },

    /// A new annotation intersects existing ones and the policy is `error`.
    #[error("overlap detected: positions ({start}, {end}) with {count} existing annotations")]
    Overlap {
        start: usize,
        end: usize,
        count: usize,
    },

    /// A merge policy was asked to merge with more than one annotation.
    #[error("merge supports only 1-1 merges, call is done for {count}-1 merge")]
    MergeTopology { count: usize },

    /// Strict merge requires both annotations to share the span exactly.
    #[error("strict merge requires identical spans, got ({start}, {end}) and ({other_start}, {other_end})")]
    MergeSpanMismatch {
        start: usize,
        end: usize,
        other_start: usize,
        other_end: usize,
    },

    /// The annotation is not (or no longer) part of the buffer.
    #[error("annotation {0} is not in the buffer")]
    NotFound(AnnotationId),

    /// Two buffers were built over different text.
    #[error("cannot combine annotations over different text: {left:?} vs {right:?}")]
    Mismatch { left: String, right: String },

    /// Malformed argument, such as an unknown overlap policy token.
    #[error("invalid argument: {0}")]
    Argument(String),
}

impl AnnotationError {
    /// True for every flavor of overlap conflict, including merge topology failures.
    pub fn is_overlap(&self) -> bool {
        matches!(
            self,
            AnnotationError::Overlap { .. }
                | AnnotationError::MergeTopology { .. }
                | AnnotationError::MergeSpanMismatch { .. }
        )
    }
}

/// Result type for annotation operations.
pub type AnnotationResult<T> = Result<T, AnnotationError>;
