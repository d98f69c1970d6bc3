use crate::types::Prediction;
use thiserror::Error;

/// Everything the decoder can surface to its caller. All variants are
/// recoverable at the keyboard level; the decoder never retries internally.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Too few accepted points or zero arc length.
    #[error("gesture too short to decode")]
    NotASwipe,

    /// Enumeration ran but every candidate scored zero. Callers usually fall
    /// back to a spelling-correction surface.
    #[error("no candidate survived scoring")]
    NoViableCandidate,

    /// A newer gesture invalidated this decode's generation.
    #[error("decode superseded by a newer gesture")]
    Cancelled,

    /// The deadline passed mid-scoring; whatever ranked so far is attached.
    #[error("deadline exceeded with {} ranked candidates", .partial.len())]
    DeadlineExceeded { partial: Vec<Prediction> },

    /// A candidate referenced a letter the active layout does not carry.
    /// Either a lexicon bug or a layout swap mid-gesture.
    #[error("letter '{letter}' is not on the active layout")]
    LayoutMismatch { letter: char },
}
